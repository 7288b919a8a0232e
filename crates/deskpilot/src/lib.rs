//! Desktop flow automation for third-party client applications
//!
//! Flows are ordered lists of discrete UI actions (launch, wait for a window,
//! click, type, hotkey, close) replayed by a [`Driver`]. Targets are located by
//! screen coordinate, image template or accessibility-tree descriptor, and the
//! interactive capture tools produce those descriptors and templates.

pub mod capture;
pub mod config;
pub mod drivers;
pub mod engine;
pub mod errors;
pub mod flow;
pub mod input;
pub mod library;
pub mod locator;
pub mod logging;
pub mod platforms;
pub mod screenshot;
pub mod service;
pub mod step;
pub mod storage;
pub mod types;

pub use config::Settings;
pub use drivers::{select_driver, Driver, ImageDriver};
pub use engine::{run_steps, FlowContext};
pub use errors::{AutomationError, ErrorKind, LocatorKind, Result};
pub use flow::{FlowAction, FlowConfig};
pub use library::{ResourceItem, ResourceKind, ResourceLibrary};
pub use locator::TemplateMatch;
pub use screenshot::{ForegroundWindow, PrimaryMonitor, ScreenSource, ScreenshotResult};
pub use service::{AgentService, AppStatus, AppSummary, ExecuteResult, LocateResponse};
pub use step::{
    ControlDescriptor, ElementDescriptor, ImageTemplate, RelativeTo, ScreenCoordinate, Step,
};
pub use storage::{FlowStore, ResourceStore, TemplateStore};
pub use tokio_util::sync::CancellationToken;
pub use types::{BlinkHandle, LocateResult, Rect};

#[cfg(target_os = "windows")]
pub use drivers::AccessibilityDriver;
