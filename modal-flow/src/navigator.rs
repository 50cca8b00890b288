//! Modal navigator
//!
//! ```text
//!   Idle ─▶ StepActive ─▶ Filling ─▶ Submitting ─▶ StepActive (next step)
//!                │                       │
//!                └──────────────┬────────┘
//!                               ▼
//!   Terminal(Completed | MaxStepsReached | ValidationBlocked | Failed)
//! ```
//!
//! One navigator drives one application session, strictly sequentially.
//! Independent sessions run as separate navigators that may share a decision
//! engine and a circuit breaker.

use crate::config::NavigatorConfig;
use crate::fill::StepFiller;
use crate::labels::{ButtonRole, DocumentKind, classify_button, is_validation_error};
use crate::outcome::{FlowOutcome, FlowStatus, NavigatorState};
use crate::progress::DialogProgress;
use crate::surface::{ElementHandle, PageSurface, Selector, WaitState, WidgetKind};
use formpilot_decision::{DecisionEngine, FormScope, JobContext};
use formpilot_resilience::{ResilientExecutor, SUBMIT_OPERATION};
use std::collections::HashSet;
use std::sync::Arc;

const NAVIGATION_MISSING: &str = "Navigation button not found";

pub struct ModalNavigator {
    surface: Arc<dyn PageSurface>,
    engine: Arc<DecisionEngine>,
    executor: ResilientExecutor,
    config: NavigatorConfig,
    scope: FormScope,
    job: Option<JobContext>,
    state: NavigatorState,
    uploaded: HashSet<DocumentKind>,
}

impl std::fmt::Debug for ModalNavigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModalNavigator")
            .field("config", &self.config)
            .field("scope", &self.scope)
            .field("state", &self.state)
            .finish()
    }
}

impl ModalNavigator {
    pub fn new(
        surface: Arc<dyn PageSurface>,
        engine: Arc<DecisionEngine>,
        executor: ResilientExecutor,
        scope: FormScope,
    ) -> Self {
        Self {
            surface,
            engine,
            executor,
            config: NavigatorConfig::default(),
            scope,
            job: None,
            state: NavigatorState::Idle,
            uploaded: HashSet::new(),
        }
    }

    pub fn with_config(mut self, config: NavigatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Job description forwarded to the reasoning service
    pub fn with_job(mut self, job: JobContext) -> Self {
        self.job = Some(job);
        self
    }

    pub fn state(&self) -> &NavigatorState {
        &self.state
    }

    /// Process dialog steps until a terminal status.
    ///
    /// Never fails: page and action errors end the run as
    /// [`FlowStatus::Failed`].
    pub async fn run(&mut self) -> FlowOutcome {
        tracing::info!(
            max_steps = self.config.max_steps,
            should_submit = self.config.should_submit,
            site = %self.scope.site,
            "modal flow started"
        );
        self.uploaded.clear();

        let outcome = self.run_steps().await;
        self.state = NavigatorState::Terminal(outcome.status.clone());
        tracing::info!(
            status = outcome.status.as_str(),
            submitted = outcome.submitted,
            steps = outcome.steps_processed,
            "modal flow finished"
        );
        outcome
    }

    async fn run_steps(&mut self) -> FlowOutcome {
        let timeout = self.config.action_timeout();
        let mut previous = DialogProgress::default();
        let mut navigated = false;
        let dialogs_selector = Selector::Dialogs;

        for index in 0..self.config.max_steps {
            let step = index + 1;
            self.wait_for_spinners().await;

            let surface = self.surface.as_ref();
            let selector = &dialogs_selector;
            let located = self
                .executor
                .execute("locate_dialog", move || surface.locate(selector), timeout, None)
                .await;
            let dialogs = match located {
                Ok(dialogs) => dialogs,
                Err(e) => {
                    let status = FlowStatus::Failed {
                        error: e.to_string(),
                    };
                    return FlowOutcome::new(status, index);
                }
            };
            // The innermost dialog is the active one.
            let Some(dialog) = dialogs.last().cloned() else {
                tracing::info!(step, "no active dialog");
                return FlowOutcome::new(FlowStatus::Completed { submitted: false }, index);
            };
            self.state = NavigatorState::StepActive { step };

            let text = match self.surface.read_text(&dialog).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(step, error = %e, "could not read dialog text");
                    String::new()
                }
            };
            let progress = DialogProgress::parse(step, &text);
            let same_dialog = navigated && progress.same_as(&previous);
            if progress.percent.is_some() {
                previous = progress;
            }
            if same_dialog {
                tracing::warn!(
                    step,
                    percent = ?progress.percent,
                    "dialog did not advance, skipping fields already filled"
                );
            } else {
                tracing::info!(step, percent = ?progress.percent, same_dialog, "modal step");
            }

            let errors = if same_dialog {
                self.validation_errors(&dialog).await
            } else {
                Vec::new()
            };

            self.state = NavigatorState::Filling { step };
            let report = StepFiller {
                surface: self.surface.as_ref(),
                engine: self.engine.as_ref(),
                executor: &self.executor,
                scope: &self.scope,
                job: self.job.as_ref(),
                documents: &self.config.documents,
                uploaded: &mut self.uploaded,
                timeout,
                same_dialog,
            }
            .fill(&dialog)
            .await;
            tracing::info!(
                step,
                mutations = report.mutations,
                skipped = report.skipped,
                failed = report.failed,
                "fields filled"
            );

            if !errors.is_empty() && report.mutations == 0 {
                tracing::warn!(
                    step,
                    errors = ?errors,
                    "validation errors with nothing left to change"
                );
                return FlowOutcome::new(FlowStatus::ValidationBlocked { errors }, step);
            }

            self.state = NavigatorState::Submitting { step };
            let buttons = match self
                .surface
                .locate(&Selector::within(&dialog, WidgetKind::Button))
                .await
            {
                Ok(buttons) => buttons,
                Err(e) => {
                    tracing::warn!(step, error = %e, "button scan failed");
                    Vec::new()
                }
            };
            let find = |role: ButtonRole| {
                buttons
                    .iter()
                    .find(|b| classify_button(&b.label) == Some(role))
            };

            if let Some(submit) = find(ButtonRole::Submit) {
                if !self.config.should_submit {
                    tracing::info!(step, button = %submit.label, "dry run, submit not clicked");
                    return FlowOutcome::new(FlowStatus::Completed { submitted: false }, step);
                }
                tracing::info!(step, button = %submit.label, "submitting");
                let surface = self.surface.as_ref();
                let submitted = self
                    .executor
                    .execute(SUBMIT_OPERATION, move || surface.click(submit), timeout, None)
                    .await;
                let status = match submitted {
                    Ok(()) => FlowStatus::Completed { submitted: true },
                    Err(e) => FlowStatus::Failed { error: e.to_string() },
                };
                return FlowOutcome::new(status, step);
            }

            let Some(next) = find(ButtonRole::Next) else {
                tracing::warn!(step, "no navigation button");
                return FlowOutcome::new(
                    FlowStatus::Failed {
                        error: NAVIGATION_MISSING.to_string(),
                    },
                    step,
                );
            };
            tracing::debug!(step, button = %next.label, "advancing");
            let surface = self.surface.as_ref();
            if let Err(e) = self
                .executor
                .execute("click_next", move || surface.click(next), timeout, None)
                .await
            {
                return FlowOutcome::new(FlowStatus::Failed { error: e.to_string() }, step);
            }
            navigated = true;
        }

        tracing::error!(max_steps = self.config.max_steps, "max steps reached");
        FlowOutcome::new(FlowStatus::MaxStepsReached, self.config.max_steps)
    }

    async fn wait_for_spinners(&self) {
        if let Err(e) = self
            .surface
            .wait_for(&Selector::Spinners, WaitState::Hidden, self.config.action_timeout())
            .await
        {
            tracing::debug!(error = %e, "spinner still visible, continuing");
        }
    }

    /// Visible validation messages inside `dialog`
    async fn validation_errors(&self, dialog: &ElementHandle) -> Vec<String> {
        let candidates = match self
            .surface
            .locate(&Selector::within(dialog, WidgetKind::ErrorMessage))
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(error = %e, "error scan failed");
                return Vec::new();
            }
        };

        let mut errors = Vec::new();
        for candidate in candidates {
            let text = self
                .surface
                .read_text(&candidate)
                .await
                .unwrap_or_else(|_| candidate.label.clone());
            let text = text.trim();
            if !text.is_empty() && is_validation_error(text) {
                tracing::warn!(error = text, "validation error shown");
                errors.push(text.to_string());
            }
        }
        errors
    }
}
