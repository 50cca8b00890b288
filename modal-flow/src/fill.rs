//! Per-widget fill handlers for one dialog step
//!
//! Handlers run in a fixed order: documents, radio groups, checkboxes,
//! comboboxes and selects, number inputs, then free text. Every mutation goes
//! through the resilient executor. A field whose action fails is logged and
//! left alone; it never aborts the step.
//!
//! On a step that re-rendered in place (`same_dialog`), a field already in a
//! non-empty or checked state is skipped outright.

use crate::config::DocumentPaths;
use crate::labels::{
    DocumentKind, best_match, checkbox_question, classify_document, integer_string,
    is_numeric_input_mode, match_option,
};
use crate::outcome::FillReport;
use crate::surface::{ElementHandle, PageSurface, Selector, SurfaceError, WidgetKind};
use formpilot_decision::signature::normalize_option;
use formpilot_decision::{
    DecisionEngine, FieldType, FieldValue, FormScope, JobContext, type_default,
};
use formpilot_resilience::{ActionError, ResilientExecutor};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

pub(crate) struct StepFiller<'a> {
    pub surface: &'a dyn PageSurface,
    pub engine: &'a DecisionEngine,
    pub executor: &'a ResilientExecutor,
    pub scope: &'a FormScope,
    pub job: Option<&'a JobContext>,
    pub documents: &'a DocumentPaths,
    /// Kinds attached earlier in this run
    pub uploaded: &'a mut HashSet<DocumentKind>,
    pub timeout: Duration,
    pub same_dialog: bool,
}

impl StepFiller<'_> {
    pub async fn fill(&mut self, dialog: &ElementHandle) -> FillReport {
        let mut report = FillReport::default();

        let documents = self.attach_documents(dialog).await;
        log_handler("documents", documents);
        report.absorb(documents);

        let radios = self.fill_radio_groups(dialog).await;
        log_handler("radio", radios);
        report.absorb(radios);

        let checkboxes = self.fill_checkboxes(dialog).await;
        log_handler("checkbox", checkboxes);
        report.absorb(checkboxes);

        let comboboxes = self.fill_comboboxes(dialog).await;
        log_handler("combobox", comboboxes);
        report.absorb(comboboxes);

        let selects = self.fill_selects(dialog).await;
        log_handler("select", selects);
        report.absorb(selects);

        let numbers = self.fill_number_inputs(dialog).await;
        log_handler("number", numbers);
        report.absorb(numbers);

        let texts = self.fill_textboxes(dialog).await;
        log_handler("text", texts);
        report.absorb(texts);

        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Handlers
    // ─────────────────────────────────────────────────────────────────────────

    async fn attach_documents(&mut self, dialog: &ElementHandle) -> FillReport {
        let mut report = FillReport::default();
        let documents = self.documents;
        for input in self.scan(dialog, WidgetKind::FileInput).await {
            let Some(kind) = classify_document(&input.label) else {
                continue;
            };
            if self.uploaded.contains(&kind) || self.already_filled(&input).await {
                report.skipped += 1;
                continue;
            }
            let path = match kind {
                DocumentKind::Resume => documents.resume_path.as_ref(),
                DocumentKind::CoverLetter => documents.cover_letter_path.as_ref(),
            };
            let Some(path) = path else {
                continue;
            };
            if !path.is_file() {
                tracing::warn!(
                    document = kind.as_str(),
                    path = %path.display(),
                    "configured document not found"
                );
                continue;
            }

            let surface = self.surface;
            let handle = &input;
            let outcome = self
                .act("attach_document", move || surface.attach(handle, path))
                .await;
            if record(&mut report, &input, outcome) {
                tracing::info!(
                    document = kind.as_str(),
                    path = %path.display(),
                    "document attached"
                );
                self.uploaded.insert(kind);
            }
        }
        report
    }

    async fn fill_radio_groups(&self, dialog: &ElementHandle) -> FillReport {
        let mut report = FillReport::default();
        let radios = self.scan(dialog, WidgetKind::Radio).await;

        let mut groups: Vec<(String, Vec<ElementHandle>)> = Vec::new();
        for (i, radio) in radios.into_iter().enumerate() {
            let name = radio.group.clone().unwrap_or_else(|| format!("group_{i}"));
            match groups.iter_mut().find(|(n, _)| *n == name) {
                Some((_, items)) => items.push(radio),
                None => groups.push((name, vec![radio])),
            }
        }

        for (name, items) in groups {
            let mut checked: Option<&ElementHandle> = None;
            for item in &items {
                if self.surface.is_checked(item).await.unwrap_or(false) {
                    checked = Some(item);
                    break;
                }
            }
            if let Some(current) = checked {
                if self.same_dialog {
                    tracing::info!(
                        group = %name,
                        selected = %current.label,
                        "radio group already filled"
                    );
                    report.skipped += 1;
                    continue;
                }
                if items.len() == 1 || current.label.to_lowercase().contains("deselect") {
                    tracing::debug!(group = %name, "radio group has a fixed pre-selection");
                    report.skipped += 1;
                    continue;
                }
            }

            let Some(first) = items.first() else {
                continue;
            };
            let question = first.legend.clone().unwrap_or_else(|| name.clone());
            let options: Vec<String> = items
                .iter()
                .map(|r| r.label.trim().to_string())
                .filter(|label| !label.is_empty())
                .collect();

            let Some(value) = self.decide(&question, FieldType::Radio, &options).await else {
                tracing::warn!(question = %question, "no decision for radio group");
                continue;
            };
            let Some(target) = match_option(&value.to_string(), &options).or(options.first())
            else {
                continue;
            };
            let wanted = normalize_option(target);
            let Some(radio) = items.iter().find(|r| normalize_option(&r.label) == wanted) else {
                tracing::warn!(question = %question, option = %target, "radio option not found");
                continue;
            };
            if checked.is_some_and(|c| c.id == radio.id) {
                report.skipped += 1;
                continue;
            }

            let surface = self.surface;
            let outcome = self.act("check_radio", move || surface.check(radio)).await;
            record(&mut report, radio, outcome);
        }
        report
    }

    async fn fill_checkboxes(&self, dialog: &ElementHandle) -> FillReport {
        let mut report = FillReport::default();
        for checkbox in self.scan(dialog, WidgetKind::Checkbox).await {
            let question = checkbox_question(checkbox.legend.as_deref(), &checkbox.label);
            let checked = self.surface.is_checked(&checkbox).await.unwrap_or(false);
            if checked && self.same_dialog {
                tracing::info!(question = %question, "checkbox already checked");
                report.skipped += 1;
                continue;
            }

            let wanted = self
                .decide(&question, FieldType::Checkbox, &[])
                .await
                .is_some_and(|v| v.is_truthy());
            // Only ever checks. An already checked box is never toggled off.
            if !wanted {
                continue;
            }
            if checked {
                report.skipped += 1;
                continue;
            }

            let surface = self.surface;
            let handle = &checkbox;
            let outcome = self.act("check_checkbox", move || surface.check(handle)).await;
            record(&mut report, &checkbox, outcome);
        }
        report
    }

    async fn fill_comboboxes(&self, dialog: &ElementHandle) -> FillReport {
        let mut report = FillReport::default();
        for combo in self.scan(dialog, WidgetKind::Combobox).await {
            if self.already_filled(&combo).await {
                report.skipped += 1;
                continue;
            }
            let surface = self.surface;
            let handle = &combo;

            let listed = surface.list_options(&combo).await.unwrap_or_default();
            if !listed.is_empty() {
                let value = self.decide(&combo.label, FieldType::Combobox, &listed).await;
                let Some(target) = value
                    .and_then(|v| match_option(&v.to_string(), &listed).cloned())
                    .or_else(|| listed.first().cloned())
                else {
                    continue;
                };
                let option = target.as_str();
                let outcome = self
                    .act("select_combobox_option", move || surface.select_option(handle, option))
                    .await;
                record(&mut report, &combo, outcome);
                continue;
            }

            // Typeahead: the listbox only appears once something is typed.
            let Some(search) = self.decide_raw(&combo.label, FieldType::Text, &[]).await else {
                tracing::warn!(question = %combo.label, "no decision for combobox, skipping");
                continue;
            };
            let search = search.to_string();
            let text = search.as_str();
            let typed = self.act("fill_combobox", move || surface.fill(handle, text)).await;
            if !record(&mut report, &combo, typed) {
                continue;
            }

            let suggestions = surface.list_options(&combo).await.unwrap_or_default();
            let Some(choice) = best_match(&search, &suggestions).cloned() else {
                tracing::debug!(question = %combo.label, "no listbox, kept typed text");
                continue;
            };
            let option = choice.as_str();
            let outcome = self
                .act("select_combobox_option", move || surface.select_option(handle, option))
                .await;
            record(&mut report, &combo, outcome);
        }
        report
    }

    async fn fill_selects(&self, dialog: &ElementHandle) -> FillReport {
        let mut report = FillReport::default();
        for select in self.scan(dialog, WidgetKind::Select).await {
            let current = self.surface.input_value(&select).await.unwrap_or_default();
            if self.same_dialog && !current.trim().is_empty() {
                report.skipped += 1;
                continue;
            }
            let options = match self.surface.list_options(&select).await {
                Ok(options) if !options.is_empty() => options,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(
                        question = %select.label,
                        error = %e,
                        "could not list select options"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            let value = self.decide(&select.label, FieldType::Select, &options).await;
            let Some(target) = value
                .and_then(|v| match_option(&v.to_string(), &options).cloned())
                .or_else(|| options.first().cloned())
            else {
                continue;
            };
            if normalize_option(&current) == normalize_option(&target) {
                report.skipped += 1;
                continue;
            }

            let surface = self.surface;
            let handle = &select;
            let option = target.as_str();
            let outcome = self
                .act("select_option", move || surface.select_option(handle, option))
                .await;
            record(&mut report, &select, outcome);
        }
        report
    }

    async fn fill_number_inputs(&self, dialog: &ElementHandle) -> FillReport {
        let mut report = FillReport::default();
        for input in self.scan(dialog, WidgetKind::NumberInput).await {
            self.fill_input(&input, FieldType::Number, &mut report).await;
        }
        report
    }

    async fn fill_textboxes(&self, dialog: &ElementHandle) -> FillReport {
        let mut report = FillReport::default();
        for input in self.scan(dialog, WidgetKind::Textbox).await {
            let field_type = if is_numeric_input_mode(input.input_mode.as_deref()) {
                FieldType::Number
            } else {
                FieldType::Text
            };
            self.fill_input(&input, field_type, &mut report).await;
        }
        report
    }

    async fn fill_input(
        &self,
        input: &ElementHandle,
        field_type: FieldType,
        report: &mut FillReport,
    ) {
        let current = self.surface.input_value(input).await.unwrap_or_default();
        if self.same_dialog && !current.trim().is_empty() {
            tracing::info!(question = %input.label, "input already filled");
            report.skipped += 1;
            return;
        }

        let Some(value) = self.decide(&input.label, field_type, &[]).await else {
            return;
        };
        let text = match field_type {
            FieldType::Number => integer_string(&value),
            _ => value.to_string(),
        };
        if current.trim() == text {
            report.skipped += 1;
            return;
        }

        let surface = self.surface;
        let value = text.as_str();
        let operation = match field_type {
            FieldType::Number => "fill_number",
            _ => "fill_text",
        };
        let outcome = self.act(operation, move || surface.fill(input, value)).await;
        record(report, input, outcome);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn scan(&self, dialog: &ElementHandle, kind: WidgetKind) -> Vec<ElementHandle> {
        match self.surface.locate(&Selector::within(dialog, kind)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), error = %e, "widget scan failed");
                Vec::new()
            }
        }
    }

    /// Non-empty input on a re-rendered step
    async fn already_filled(&self, handle: &ElementHandle) -> bool {
        if !self.same_dialog {
            return false;
        }
        self.surface
            .input_value(handle)
            .await
            .is_ok_and(|v| !v.trim().is_empty())
    }

    /// Engine decision. Field-level errors count as no decision.
    async fn decide_raw(
        &self,
        question: &str,
        field_type: FieldType,
        options: &[String],
    ) -> Option<FieldValue> {
        let job = self.job.cloned();
        match self
            .engine
            .decide_for_job(self.scope, question, field_type, options, job)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    question,
                    field_type = field_type.as_str(),
                    category = e.category().as_str(),
                    error = %e,
                    "field decision failed"
                );
                None
            }
        }
    }

    /// Engine decision, or the type default when there is none
    async fn decide(
        &self,
        question: &str,
        field_type: FieldType,
        options: &[String],
    ) -> Option<FieldValue> {
        self.decide_raw(question, field_type, options)
            .await
            .or_else(|| type_default(field_type, options))
    }

    async fn act<F, Fut>(&self, operation: &str, action: F) -> Result<(), ActionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), SurfaceError>>,
    {
        self.executor
            .execute(operation, action, self.timeout, None)
            .await
    }
}

/// Tally one action; true when it went through
fn record(
    report: &mut FillReport,
    handle: &ElementHandle,
    outcome: Result<(), ActionError>,
) -> bool {
    match outcome {
        Ok(()) => {
            report.mutations += 1;
            true
        }
        Err(e) => {
            tracing::warn!(
                field = %handle.label,
                operation = e.operation(),
                attempts = e.attempts(),
                error = %e,
                "field action failed"
            );
            report.failed += 1;
            false
        }
    }
}

fn log_handler(handler: &'static str, report: FillReport) {
    tracing::debug!(
        handler,
        mutations = report.mutations,
        skipped = report.skipped,
        failed = report.failed,
        "handler finished"
    );
}
