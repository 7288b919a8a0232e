//! Async facade over storage, the step engine and the interactive sessions.
//!
//! Everything that touches the desktop runs on tokio's blocking pool; the
//! async side only waits for it.

use crate::config::Settings;
use crate::drivers::{select_driver, Driver};
use crate::engine::{run_steps, FlowContext};
use crate::errors::{AutomationError, ErrorKind, Result};
use crate::flow::{FlowAction, FlowConfig};
use crate::library::{not_found, ControlResource, ImageResource, ResourceKind, ResourceLibrary};
use crate::locator::TemplateMatch;
use crate::platforms;
use crate::step::{ControlDescriptor, ImageTemplate};
use crate::capture::region::capture_to_templates;
use crate::screenshot::ForegroundWindow;
use crate::storage::{FlowStore, ResourceStore, TemplateStore};
use crate::types::Rect;
use serde::{Deserialize, Serialize};
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

pub type DriverFactory = Arc<dyn Fn() -> Result<Box<dyn Driver>> + Send + Sync>;

/// Outcome of running an open or close flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ExecuteResult {
    fn ok() -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            error_kind: None,
        }
    }

    fn failed(error: &AutomationError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            error_kind: Some(error.kind()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.error_kind.map_or(true, ErrorKind::is_retryable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStatus {
    pub configured: bool,
    pub running: bool,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSummary {
    pub platform: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateResponse {
    pub matched: bool,
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

fn join_error(e: tokio::task::JoinError) -> AutomationError {
    AutomationError::PlatformError(format!("background task failed: {e}"))
}

pub struct AgentService {
    settings: Settings,
    flows: FlowStore,
    resources: ResourceStore,
    templates: TemplateStore,
    driver_factory: DriverFactory,
    control_capture: Arc<Semaphore>,
    region_capture: Arc<Semaphore>,
}

impl AgentService {
    /// Service using the best driver available on this machine.
    pub fn new(settings: Settings) -> Self {
        Self::with_driver_factory(settings, Arc::new(|| Ok(select_driver())))
    }

    pub fn with_driver_factory(settings: Settings, driver_factory: DriverFactory) -> Self {
        let flows = FlowStore::new(settings.platforms_dir());
        let resources = ResourceStore::new(settings.platforms_dir());
        let templates = TemplateStore::new(settings.templates_dir());
        Self {
            settings,
            flows,
            resources,
            templates,
            driver_factory,
            control_capture: Arc::new(Semaphore::new(1)),
            region_capture: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn flow_context(&self) -> FlowContext {
        FlowContext::from_settings(&self.settings)
    }

    /// Run the open or close flow of `app`. Failures are reported in the
    /// result, never as `Err`.
    #[instrument(skip(self))]
    pub async fn execute(&self, app: &str, action: FlowAction) -> ExecuteResult {
        match self.try_execute(app, action).await {
            Ok(()) => {
                info!("{} flow for {} finished", action, app);
                ExecuteResult::ok()
            }
            Err(e) => {
                error!("{} flow for {} failed: {}", action, app, e);
                ExecuteResult::failed(&e)
            }
        }
    }

    async fn try_execute(&self, app: &str, action: FlowAction) -> Result<()> {
        let config = self.flows.load(app)?.ok_or_else(|| {
            AutomationError::ConfigurationMissing(format!("no flow configured for {app:?}"))
        })?;
        if config.raw_steps(action).is_empty() {
            return Err(AutomationError::ConfigurationMissing(format!(
                "{action} flow is empty"
            )));
        }
        let steps = config.steps(action)?;
        let ctx = self.flow_context();
        let factory = self.driver_factory.clone();

        tokio::task::spawn_blocking(move || {
            let driver = factory()?;
            info!("running {} steps with the {} driver", steps.len(), driver.name());
            run_steps(&steps, driver.as_ref(), &ctx)
        })
        .await
        .map_err(join_error)?
    }

    #[instrument(skip(self))]
    pub fn status(&self, app: &str) -> AppStatus {
        let configured = match self.flows.load(app) {
            Ok(config) => config.is_some(),
            Err(e) => {
                warn!("flow for {} is unreadable: {}", app, e);
                false
            }
        };
        AppStatus {
            configured,
            running: false,
            online: false,
        }
    }

    pub fn list_applications(&self) -> Result<Vec<AppSummary>> {
        let mut apps = Vec::new();
        for id in self.flows.list_ids()? {
            let display_name = match self.flows.load(&id) {
                Ok(Some(config)) => config.display_name.unwrap_or_else(|| id.clone()),
                _ => id.clone(),
            };
            apps.push(AppSummary {
                platform: id,
                display_name,
            });
        }
        Ok(apps)
    }

    pub fn get_flow(&self, app: &str) -> Result<Option<FlowConfig>> {
        self.flows.load(app)
    }

    pub fn save_flow(&self, app: &str, config: &FlowConfig) -> Result<()> {
        self.flows.save(app, config)
    }

    pub fn delete_flow(&self, app: &str) -> Result<()> {
        self.flows.delete(app)
    }

    pub fn resources(&self, app: &str) -> Result<ResourceLibrary> {
        self.resources.load(app)
    }

    #[instrument(skip(self, payload))]
    pub fn create_control(
        &self,
        app: &str,
        name: &str,
        payload: ControlDescriptor,
    ) -> Result<ControlResource> {
        self.resources
            .update(app, |library| library.create_control(name, payload).cloned())
    }

    #[instrument(skip(self, payload))]
    pub fn create_image(&self, app: &str, name: &str, payload: ImageTemplate) -> Result<ImageResource> {
        self.resources
            .update(app, |library| library.create_image(name, payload).cloned())
    }

    #[instrument(skip(self))]
    pub fn rename_resource(&self, app: &str, kind: ResourceKind, id: &str, name: &str) -> Result<()> {
        self.resources
            .update(app, |library| library.rename(kind, id, name))
    }

    #[instrument(skip(self))]
    pub fn delete_resource(&self, app: &str, kind: ResourceKind, id: &str) -> Result<()> {
        self.resources.update(app, |library| {
            if library.delete(kind, id) {
                Ok(())
            } else {
                Err(not_found(kind, id))
            }
        })
    }

    /// Copy an image file into the templates directory and return the name
    /// flows and image resources refer to it by.
    #[instrument(skip(self))]
    pub fn import_template(&self, source: &Path, name: Option<&str>) -> Result<String> {
        self.templates.import(source, name)
    }

    /// Wait `delay`, then save the focused window as a timestamped template.
    #[instrument(skip(self))]
    pub async fn capture_window(&self, delay: Duration) -> Result<String> {
        let templates_dir = self.templates.dir().to_path_buf();
        tokio::task::spawn_blocking(move || {
            std::thread::sleep(delay);
            capture_to_templates(&ForegroundWindow, &templates_dir, Local::now())
        })
        .await
        .map_err(join_error)?
    }

    /// Describe the control under the cursor without running a picker session.
    #[instrument(skip(self))]
    pub async fn pick_control_at_cursor(&self) -> Result<Option<ControlDescriptor>> {
        tokio::task::spawn_blocking(platforms::pick_control_at_cursor)
            .await
            .map_err(join_error)?
    }

    /// Find a saved resource on screen and, when found, flash a frame
    /// around it.
    #[instrument(skip(self))]
    pub async fn locate(&self, app: &str, kind: ResourceKind, id: &str) -> Result<LocateResponse> {
        let library = self.resources.load(app)?;
        let target = match kind {
            ResourceKind::Control => LocateTarget::Control(
                library.control(id).ok_or_else(|| not_found(kind, id))?.payload.clone(),
            ),
            ResourceKind::Image => {
                let template = &library.image(id).ok_or_else(|| not_found(kind, id))?.payload;
                LocateTarget::Image {
                    path: self.flow_context().resolve_image(&template.image),
                    threshold: template.effective_threshold(),
                }
            }
        };
        let factory = self.driver_factory.clone();

        let response = tokio::task::spawn_blocking(move || {
            let driver = factory()?;
            target.locate(driver.as_ref())
        })
        .await
        .map_err(join_error)??;

        if let Some(rect) = response.rect.filter(|_| response.matched) {
            match platforms::blink(rect) {
                Ok(_detached) => debug!("highlighting {:?}", rect),
                Err(e) => debug!("highlight skipped: {}", e),
            }
        }
        Ok(response)
    }

    /// Run the control picker. Concurrent requests wait for the running one.
    #[instrument(skip(self))]
    pub async fn start_control_capture(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Option<ControlDescriptor>> {
        let timeout = timeout.unwrap_or_else(|| self.settings.capture_timeout());
        let permit = self
            .control_capture
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AutomationError::PlatformError(format!("capture gate closed: {e}")))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            platforms::run_control_picker(timeout)
        })
        .await
        .map_err(join_error)?
    }

    /// Run region capture and return the saved template's file name.
    #[instrument(skip(self))]
    pub async fn start_region_capture(&self, timeout: Option<Duration>) -> Result<Option<String>> {
        let timeout = timeout.unwrap_or_else(|| self.settings.capture_timeout());
        let templates_dir = self.templates.dir().to_path_buf();
        let permit = self
            .region_capture
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AutomationError::PlatformError(format!("capture gate closed: {e}")))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            platforms::run_region_capture(&templates_dir, timeout)
        })
        .await
        .map_err(join_error)?
    }
}

enum LocateTarget {
    Control(ControlDescriptor),
    Image {
        path: std::path::PathBuf,
        threshold: f32,
    },
}

impl LocateTarget {
    fn locate(&self, driver: &dyn Driver) -> Result<LocateResponse> {
        match self {
            LocateTarget::Control(control) => {
                let rect = driver.locate_control(control)?;
                Ok(LocateResponse {
                    matched: rect.is_some(),
                    rect,
                    score: None,
                })
            }
            LocateTarget::Image { path, threshold } => {
                let outcome = driver.locate_image(path, *threshold)?;
                Ok(match outcome {
                    TemplateMatch::Found(found) => LocateResponse {
                        matched: true,
                        rect: Some(found.rect),
                        score: found.score,
                    },
                    TemplateMatch::BelowThreshold { best_score } => LocateResponse {
                        matched: false,
                        rect: None,
                        score: Some(best_score),
                    },
                    TemplateMatch::Unavailable(reason) => {
                        debug!("{}: {}", path.display(), reason);
                        LocateResponse {
                            matched: false,
                            rect: None,
                            score: None,
                        }
                    }
                })
            }
        }
    }
}
