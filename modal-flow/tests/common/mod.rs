//! In-memory page for navigator tests

#![allow(dead_code)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use formpilot_decision::{CandidateProfile, DecisionConfig, DecisionEngine, RuleRepository};
use formpilot_decision::rules::InMemoryRuleStorage;
use formpilot_modal_flow::labels::{ButtonRole, classify_button};
use formpilot_modal_flow::{
    ElementHandle, PageSurface, Selector, SurfaceError, WaitState, WidgetKind,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mutating call recorded by [`FakeSurface`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Click(String),
    Check(String),
    Fill(String, String),
    Select(String, String),
    Attach(String, PathBuf),
}

#[derive(Debug, Clone)]
pub struct FakeWidget {
    pub handle: ElementHandle,
    pub checked: bool,
    pub value: String,
    pub options: Vec<String>,
    /// Options only show up once something was typed
    pub typeahead: bool,
}

impl FakeWidget {
    pub fn new(id: &str, kind: WidgetKind, label: &str) -> Self {
        Self {
            handle: ElementHandle::new(id, kind, label),
            checked: false,
            value: String::new(),
            options: Vec::new(),
            typeahead: false,
        }
    }

    pub fn radio(id: &str, group: &str, legend: &str, label: &str) -> Self {
        let mut w = Self::new(id, WidgetKind::Radio, label);
        w.handle = w.handle.with_group(group).with_legend(legend);
        w
    }

    pub fn button(id: &str, label: &str) -> Self {
        Self::new(id, WidgetKind::Button, label)
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn typeahead(mut self) -> Self {
        self.typeahead = true;
        self
    }

    pub fn legend(mut self, legend: &str) -> Self {
        self.handle = self.handle.with_legend(legend);
        self
    }

    pub fn input_mode(mut self, mode: &str) -> Self {
        self.handle = self.handle.with_input_mode(mode);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeStep {
    pub text: String,
    pub widgets: Vec<FakeWidget>,
    /// Next clicks that re-render this step instead of advancing
    pub stuck_for: u32,
}

impl FakeStep {
    pub fn new(text: &str, widgets: Vec<FakeWidget>) -> Self {
        Self {
            text: text.to_string(),
            widgets,
            stuck_for: 0,
        }
    }

    pub fn stuck_for(mut self, clicks: u32) -> Self {
        self.stuck_for = clicks;
        self
    }
}

#[derive(Debug, Default)]
struct PageState {
    steps: Vec<FakeStep>,
    current: usize,
    closed: bool,
    mutations: Vec<Mutation>,
    /// Clicks that fail before one goes through
    failing_clicks: u32,
}

impl PageState {
    fn step(&self) -> Option<&FakeStep> {
        if self.closed {
            return None;
        }
        self.steps.get(self.current)
    }

    fn widget_mut(&mut self, id: &str) -> Result<&mut FakeWidget, SurfaceError> {
        let current = self.current;
        self.steps
            .get_mut(current)
            .and_then(|s| s.widgets.iter_mut().find(|w| w.handle.id == id))
            .ok_or_else(|| SurfaceError::NotFound(id.to_string()))
    }

    fn widget(&self, id: &str) -> Result<&FakeWidget, SurfaceError> {
        self.step()
            .and_then(|s| s.widgets.iter().find(|w| w.handle.id == id))
            .ok_or_else(|| SurfaceError::NotFound(id.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct FakeSurface {
    state: Mutex<PageState>,
}

pub const DIALOG_ID: &str = "dialog";

impl FakeSurface {
    pub fn new(steps: Vec<FakeStep>) -> Self {
        Self {
            state: Mutex::new(PageState {
                steps,
                ..PageState::default()
            }),
        }
    }

    pub fn fail_clicks(&self, count: u32) {
        self.state.lock().unwrap().failing_clicks = count;
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn current_step(&self) -> usize {
        self.state.lock().unwrap().current
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn value_of(&self, step: usize, id: &str) -> (bool, String) {
        let state = self.state.lock().unwrap();
        let widget = state.steps[step]
            .widgets
            .iter()
            .find(|w| w.handle.id == id)
            .expect("widget");
        (widget.checked, widget.value.clone())
    }
}

#[async_trait]
impl PageSurface for FakeSurface {
    async fn locate(&self, selector: &Selector) -> Result<Vec<ElementHandle>, SurfaceError> {
        let state = self.state.lock().unwrap();
        let Some(step) = state.step() else {
            return Ok(Vec::new());
        };
        match selector {
            Selector::Dialogs => Ok(vec![ElementHandle::new(
                DIALOG_ID,
                WidgetKind::Dialog,
                "Apply",
            )]),
            Selector::Spinners => Ok(Vec::new()),
            Selector::Within { kind, .. } => Ok(step
                .widgets
                .iter()
                .filter(|w| w.handle.kind == *kind)
                .map(|w| w.handle.clone())
                .collect()),
        }
    }

    async fn wait_for(
        &self,
        _selector: &Selector,
        _state: WaitState,
        _timeout: Duration,
    ) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn click(&self, handle: &ElementHandle) -> Result<(), SurfaceError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_clicks > 0 {
            state.failing_clicks -= 1;
            return Err(SurfaceError::Rejected(format!("{} intercepted", handle.id)));
        }
        state.widget(&handle.id)?;
        state.mutations.push(Mutation::Click(handle.id.clone()));

        match classify_button(&handle.label) {
            Some(ButtonRole::Submit) => state.closed = true,
            Some(ButtonRole::Next) => {
                let current = state.current;
                let step = &mut state.steps[current];
                if step.stuck_for > 0 {
                    step.stuck_for -= 1;
                } else {
                    state.current += 1;
                }
            }
            None => {}
        }
        Ok(())
    }

    async fn check(&self, handle: &ElementHandle) -> Result<(), SurfaceError> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(Mutation::Check(handle.id.clone()));
        if handle.kind == WidgetKind::Radio {
            let current = state.current;
            for w in &mut state.steps[current].widgets {
                if w.handle.kind == WidgetKind::Radio && w.handle.group == handle.group {
                    w.checked = false;
                }
            }
        }
        state.widget_mut(&handle.id)?.checked = true;
        Ok(())
    }

    async fn fill(&self, handle: &ElementHandle, value: &str) -> Result<(), SurfaceError> {
        let mut state = self.state.lock().unwrap();
        state
            .mutations
            .push(Mutation::Fill(handle.id.clone(), value.to_string()));
        state.widget_mut(&handle.id)?.value = value.to_string();
        Ok(())
    }

    async fn select_option(
        &self,
        handle: &ElementHandle,
        option: &str,
    ) -> Result<(), SurfaceError> {
        let mut state = self.state.lock().unwrap();
        let widget = state.widget_mut(&handle.id)?;
        if !widget.options.iter().any(|o| o == option) {
            return Err(SurfaceError::NotFound(option.to_string()));
        }
        widget.value = option.to_string();
        state
            .mutations
            .push(Mutation::Select(handle.id.clone(), option.to_string()));
        Ok(())
    }

    async fn attach(&self, handle: &ElementHandle, path: &Path) -> Result<(), SurfaceError> {
        let mut state = self.state.lock().unwrap();
        state
            .mutations
            .push(Mutation::Attach(handle.id.clone(), path.to_path_buf()));
        state.widget_mut(&handle.id)?.value = path.display().to_string();
        Ok(())
    }

    async fn read_text(&self, handle: &ElementHandle) -> Result<String, SurfaceError> {
        let state = self.state.lock().unwrap();
        if handle.id == DIALOG_ID {
            return state
                .step()
                .map(|s| s.text.clone())
                .ok_or(SurfaceError::Closed);
        }
        Ok(state.widget(&handle.id)?.handle.label.clone())
    }

    async fn list_options(&self, handle: &ElementHandle) -> Result<Vec<String>, SurfaceError> {
        let state = self.state.lock().unwrap();
        let widget = state.widget(&handle.id)?;
        if widget.typeahead && widget.value.is_empty() {
            return Ok(Vec::new());
        }
        Ok(widget.options.clone())
    }

    async fn is_checked(&self, handle: &ElementHandle) -> Result<bool, SurfaceError> {
        Ok(self.state.lock().unwrap().widget(&handle.id)?.checked)
    }

    async fn input_value(&self, handle: &ElementHandle) -> Result<String, SurfaceError> {
        Ok(self.state.lock().unwrap().widget(&handle.id)?.value.clone())
    }
}

pub fn engine(rules: Vec<Value>, profile: Value) -> Arc<DecisionEngine> {
    let repository = Arc::new(
        RuleRepository::open(Arc::new(InMemoryRuleStorage::new(rules))).expect("rules"),
    );
    let mut config = DecisionConfig::default();
    config.learning.enabled = false;
    Arc::new(
        DecisionEngine::builder(repository, Arc::new(CandidateProfile::new(profile)))
            .config(config)
            .build()
            .expect("engine"),
    )
}
