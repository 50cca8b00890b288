//! Navigator for multi-step application dialogs.
//!
//! Each step is read through a [`PageSurface`], its fields are answered by the
//! decision engine and written through the resilient executor, then the
//! navigator clicks next or submit. A step that re-renders unchanged (same
//! progress percentage) is refilled without touching fields that already hold
//! their value.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
mod fill;
pub mod labels;
pub mod navigator;
pub mod outcome;
pub mod progress;
pub mod surface;

pub use config::{DocumentPaths, NavigatorConfig};
pub use navigator::ModalNavigator;
pub use outcome::{FillReport, FlowOutcome, FlowStatus, NavigatorState};
pub use progress::DialogProgress;
pub use surface::{
    ElementHandle, ElementId, PageSurface, Selector, SurfaceError, WaitState, WidgetKind,
};
