//! Sequential step execution against a [`Driver`].

use crate::config::Settings;
use crate::drivers::Driver;
use crate::errors::{AutomationError, LocatorKind, Result};
use crate::locator::{resolve_template_path, TemplateMatch};
use crate::step::{ClickStep, InputTextStep, Locator, Step};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between focusing a field and typing into it.
pub const FOCUS_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Where a flow's relative asset paths are resolved from.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub platforms_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub settle_delay: Duration,
}

impl FlowContext {
    pub fn new(platforms_dir: impl Into<PathBuf>, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            platforms_dir: platforms_dir.into(),
            templates_dir: templates_dir.into(),
            settle_delay: FOCUS_SETTLE_DELAY,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.platforms_dir(), settings.templates_dir())
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn resolve_image(&self, raw: &str) -> PathBuf {
        resolve_template_path(raw, &self.platforms_dir, &self.templates_dir)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or_default()
}

/// Run `steps` in order, stopping at the first failure.
///
/// A failing `close_window` is logged and skipped; every other failure ends
/// the run.
pub fn run_steps(steps: &[Step], driver: &dyn Driver, ctx: &FlowContext) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        let n = i + 1;
        info!("engine step {}: type={}", n, step.kind());
        run_step(n, step, driver, ctx)?;
    }
    Ok(())
}

fn run_step(n: usize, step: &Step, driver: &dyn Driver, ctx: &FlowContext) -> Result<()> {
    match step {
        Step::Launch(launch) => {
            let args = launch.args.as_deref().unwrap_or_default();
            driver.launch(&launch.path, args, launch.cwd.as_deref())
        }
        Step::WaitWindow(wait) => {
            let timeout = seconds(wait.timeout_seconds);
            let found = driver.wait_window(wait.title.as_deref(), wait.class_name.as_deref(), timeout)?;
            if found {
                Ok(())
            } else {
                Err(AutomationError::Timeout(format!(
                    "step {n} (wait_window): no window matching title={:?} class={:?} within {:?}",
                    wait.title, wait.class_name, timeout
                )))
            }
        }
        Step::Click(click) => run_click(click, driver, ctx),
        Step::InputText(input) => run_input(input, driver, ctx),
        Step::Wait(wait) => {
            thread::sleep(seconds(wait.seconds));
            Ok(())
        }
        Step::Hotkey(hotkey) => driver.hotkey(&hotkey.keys),
        Step::CloseWindow(close) => {
            match driver.close_window(
                close.title.as_deref(),
                close.class_name.as_deref(),
                close.kill_process,
            ) {
                Ok(true) => debug!("step {}: window closed", n),
                Ok(false) => warn!(
                    "step {}: close_window found nothing to close (title={:?} class={:?})",
                    n, close.title, close.class_name
                ),
                Err(e) => warn!("step {}: close_window failed, continuing: {}", n, e),
            }
            Ok(())
        }
    }
}

fn run_click(click: &ClickStep, driver: &dyn Driver, ctx: &FlowContext) -> Result<()> {
    let locator = click.locator().ok_or_else(|| {
        AutomationError::InvalidStep("click has no coordinate, image or control".into())
    })?;
    activate(locator, driver, ctx)
}

fn run_input(input: &InputTextStep, driver: &dyn Driver, ctx: &FlowContext) -> Result<()> {
    if let Some(element) = &input.element {
        let locator = element.primary().ok_or_else(|| {
            AutomationError::InvalidStep("input_text element has no coordinate, image or control".into())
        })?;
        activate(locator, driver, ctx)?;
        thread::sleep(ctx.settle_delay);
    }
    if input.text.is_empty() {
        return Ok(());
    }
    // Select-all so the typed text replaces the field contents.
    if input.clear_first && input.element.is_some() {
        driver.hotkey(&["ctrl".to_string(), "a".to_string()])?;
    }
    driver.type_text(&input.text)
}

/// Resolve a locator and click it.
fn activate(locator: Locator<'_>, driver: &dyn Driver, ctx: &FlowContext) -> Result<()> {
    match locator {
        Locator::Point { x, y, window: None } => driver.click(x, y),
        Locator::Point {
            x,
            y,
            window: Some(anchor),
        } => {
            let title = anchor.title.filter(|t| !t.is_empty()).ok_or_else(|| {
                AutomationError::locator(
                    LocatorKind::Window,
                    "window-relative coordinate without window_title",
                )
            })?;
            let rect = driver.window_rect(title)?.ok_or_else(|| {
                AutomationError::locator(LocatorKind::Window, format!("window not found: {title:?}"))
            })?;
            driver.click(rect.left + x, rect.top + y)
        }
        Locator::Image(template) => {
            let path = ctx.resolve_image(&template.image);
            let threshold = template.effective_threshold();
            match driver.find_and_click_image(&path, threshold)? {
                TemplateMatch::Found(found) => {
                    debug!("clicked image {} at {:?}", path.display(), found.rect);
                    Ok(())
                }
                outcome => Err(image_not_found(&path, threshold, &outcome)),
            }
        }
        Locator::Control(control) => {
            if driver.find_and_click_control(control)? {
                Ok(())
            } else {
                Err(AutomationError::locator(
                    LocatorKind::Control,
                    format!("control not found: {}", control.summary()),
                ))
            }
        }
    }
}

fn image_not_found(path: &Path, threshold: f32, outcome: &TemplateMatch) -> AutomationError {
    let detail = match outcome {
        TemplateMatch::BelowThreshold { best_score } => format!(
            "image not found: {} (best score {:.3} < {:.2})",
            path.display(),
            best_score,
            threshold
        ),
        TemplateMatch::Unavailable(reason) => {
            format!("image not found: {} ({reason})", path.display())
        }
        TemplateMatch::Found(_) => format!("image not found: {}", path.display()),
    };
    AutomationError::locator(LocatorKind::Image, detail)
}
