//! Page automation surface
//!
//! The navigator reaches the page only through [`PageSurface`]. A browser
//! driver implements it in production; tests drive an in-memory page.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Opaque id the surface uses to find an element again
pub type ElementId = String;

/// Widget roles the navigator knows how to scan for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Dialog,
    Spinner,
    Radio,
    Checkbox,
    /// Typeahead input with a listbox
    Combobox,
    /// Native select element
    Select,
    NumberInput,
    /// Text input or textarea, excluding comboboxes
    Textbox,
    FileInput,
    Button,
    /// Inline validation message
    ErrorMessage,
}

impl WidgetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dialog => "dialog",
            Self::Spinner => "spinner",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Combobox => "combobox",
            Self::Select => "select",
            Self::NumberInput => "number",
            Self::Textbox => "textbox",
            Self::FileInput => "file",
            Self::Button => "button",
            Self::ErrorMessage => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Open dialogs, outermost first
    Dialogs,
    /// Loading indicators anywhere on the page
    Spinners,
    /// Visible widgets of one kind inside `container`, in document order
    Within {
        container: ElementId,
        kind: WidgetKind,
    },
}

impl Selector {
    pub fn within(container: &ElementHandle, kind: WidgetKind) -> Self {
        Self::Within {
            container: container.id.clone(),
            kind,
        }
    }
}

/// Snapshot of one located element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: ElementId,
    pub kind: WidgetKind,
    /// Accessible name. For radios this is the option text.
    pub label: String,
    /// Radio group name attribute
    pub group: Option<String>,
    /// Enclosing fieldset legend
    pub legend: Option<String>,
    /// `inputmode` of text inputs
    pub input_mode: Option<String>,
}

impl ElementHandle {
    pub fn new(id: impl Into<ElementId>, kind: WidgetKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            group: None,
            legend: None,
            input_mode: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_legend(mut self, legend: impl Into<String>) -> Self {
        self.legend = Some(legend.into());
        self
    }

    pub fn with_input_mode(mut self, mode: impl Into<String>) -> Self {
        self.input_mode = Some(mode.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("element not found: {0}")]
    NotFound(String),

    /// The element went away between locate and use
    #[error("element detached: {0}")]
    Detached(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("action rejected by the page: {0}")]
    Rejected(String),

    #[error("page closed")]
    Closed,
}

/// Capabilities the navigator needs from a live page.
///
/// Mutating calls are `click`, `check`, `fill`, `select_option` and
/// `attach`; everything else only reads.
#[async_trait]
pub trait PageSurface: Send + Sync {
    async fn locate(&self, selector: &Selector) -> Result<Vec<ElementHandle>, SurfaceError>;

    async fn wait_for(
        &self,
        selector: &Selector,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), SurfaceError>;

    async fn click(&self, handle: &ElementHandle) -> Result<(), SurfaceError>;

    /// Put a radio or checkbox into the checked state
    async fn check(&self, handle: &ElementHandle) -> Result<(), SurfaceError>;

    async fn fill(&self, handle: &ElementHandle, value: &str) -> Result<(), SurfaceError>;

    /// Choose the option labelled `option` in a select or an open listbox
    async fn select_option(&self, handle: &ElementHandle, option: &str) -> Result<(), SurfaceError>;

    async fn attach(&self, handle: &ElementHandle, path: &Path) -> Result<(), SurfaceError>;

    async fn read_text(&self, handle: &ElementHandle) -> Result<String, SurfaceError>;

    /// Option labels of a select, or of the listbox a combobox currently shows
    async fn list_options(&self, handle: &ElementHandle) -> Result<Vec<String>, SurfaceError>;

    async fn is_checked(&self, handle: &ElementHandle) -> Result<bool, SurfaceError>;

    /// Current value of an input, or the selected option label of a select
    async fn input_value(&self, handle: &ElementHandle) -> Result<String, SurfaceError>;
}
