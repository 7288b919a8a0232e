use deskpilot::input::{InputSink, KeyCode};
use deskpilot::step::{ClickStep, CloseWindowStep, ElementDescriptor, HotkeyStep, ImageTemplate};
use deskpilot::{
    run_steps, AutomationError, ControlDescriptor, Driver, FlowContext, ImageDriver, LocatorKind,
    Rect, Result, ScreenSource, ScreenshotResult, Step, TemplateMatch,
};
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingDriver {
    calls: Mutex<Vec<String>>,
    fail_close: bool,
}

impl RecordingDriver {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl Driver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn launch(&self, path: &str, _args: &[String], _cwd: Option<&str>) -> Result<()> {
        self.record(format!("launch {path}"));
        Ok(())
    }

    fn wait_window(&self, _t: Option<&str>, _c: Option<&str>, _d: Duration) -> Result<bool> {
        self.record("wait_window");
        Ok(true)
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        self.record(format!("click {x},{y}"));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.record(format!("type {text}"));
        Ok(())
    }

    fn hotkey(&self, keys: &[String]) -> Result<()> {
        self.record(format!("hotkey {}", keys.join("+")));
        Ok(())
    }

    fn close_window(&self, _t: Option<&str>, _c: Option<&str>, _k: bool) -> Result<bool> {
        self.record("close_window");
        if self.fail_close {
            Err(AutomationError::PlatformError("window refused to close".into()))
        } else {
            Ok(true)
        }
    }

    fn locate_image(&self, path: &Path, _threshold: f32) -> Result<TemplateMatch> {
        self.record(format!("locate_image {}", path.display()));
        Ok(TemplateMatch::BelowThreshold { best_score: 0.1 })
    }

    fn locate_control(&self, _control: &ControlDescriptor) -> Result<Option<Rect>> {
        self.record("locate_control");
        Ok(None)
    }

    fn window_rect(&self, _title: &str) -> Result<Option<Rect>> {
        self.record("window_rect");
        Ok(None)
    }
}

fn ctx(dir: &Path) -> FlowContext {
    FlowContext::new(dir, dir.join("templates")).with_settle_delay(Duration::ZERO)
}

#[test]
fn coordinate_click_is_one_click_and_no_locate() {
    let dir = tempfile::tempdir().unwrap();
    let driver = RecordingDriver::default();
    let steps = vec![Step::Click(ClickStep::at(120, 340))];

    run_steps(&steps, &driver, &ctx(dir.path())).unwrap();

    assert_eq!(driver.calls(), vec!["click 120,340"]);
}

#[test]
fn legacy_xy_wins_over_element() {
    let dir = tempfile::tempdir().unwrap();
    let driver = RecordingDriver::default();
    let step = Step::from_value(&serde_json::json!({
        "type": "click",
        "x": 7,
        "y": 9,
        "element": {"image": "ignored.png"}
    }))
    .unwrap();

    run_steps(&[step], &driver, &ctx(dir.path())).unwrap();

    assert_eq!(driver.calls(), vec!["click 7,9"]);
}

#[test]
fn close_window_failure_does_not_stop_the_flow() {
    let dir = tempfile::tempdir().unwrap();
    let driver = RecordingDriver {
        fail_close: true,
        ..Default::default()
    };
    let steps = vec![
        Step::Click(ClickStep::at(1, 1)),
        Step::CloseWindow(CloseWindowStep {
            title: Some("Chat".into()),
            class_name: None,
            kill_process: false,
        }),
        Step::Hotkey(HotkeyStep {
            keys: vec!["ctrl".into(), "w".into()],
        }),
    ];

    run_steps(&steps, &driver, &ctx(dir.path())).unwrap();

    assert_eq!(driver.calls(), vec!["click 1,1", "close_window", "hotkey ctrl+w"]);
}

#[test]
fn failing_step_stops_the_flow() {
    let dir = tempfile::tempdir().unwrap();
    let driver = RecordingDriver::default();
    let steps = vec![
        Step::Click(ClickStep::on(ElementDescriptor::from_image(ImageTemplate::new(
            "send.png",
        )))),
        Step::Click(ClickStep::at(1, 1)),
    ];

    let err = run_steps(&steps, &driver, &ctx(dir.path())).unwrap_err();

    assert!(matches!(
        err,
        AutomationError::LocatorFailure {
            kind: LocatorKind::Image,
            ..
        }
    ));
    assert_eq!(driver.calls().len(), 1);
}

// Image driver against a synthetic screen.

fn noise(width: u32, height: u32, seed: u64) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let mut h = seed
            ^ u64::from(x / 3).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ u64::from(y / 3).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        h ^= h >> 33;
        h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
        h ^= h >> 33;
        let v = (h & 0xFF) as u8;
        Rgba([v, v.wrapping_mul(3), v.wrapping_add(91), 255])
    })
}

struct StaticScreen(RgbaImage);

impl ScreenSource for StaticScreen {
    fn capture(&self) -> Result<ScreenshotResult> {
        Ok(ScreenshotResult::new(self.0.clone(), (0, 0)))
    }
}

#[derive(Default)]
struct RecordingInput {
    clicks: Mutex<Vec<(i32, i32)>>,
}

impl InputSink for RecordingInput {
    fn click(&self, x: i32, y: i32) -> Result<()> {
        self.clicks.lock().unwrap().push((x, y));
        Ok(())
    }

    fn type_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn chord(&self, _keys: &[KeyCode]) -> Result<()> {
        Ok(())
    }
}

fn image_driver_fixture() -> (tempfile::TempDir, ImageDriver, Arc<RecordingInput>) {
    let dir = tempfile::tempdir().unwrap();
    let screen = noise(200, 150, 7);
    let template = image::imageops::crop_imm(&screen, 50, 40, 30, 20).to_image();
    std::fs::create_dir_all(dir.path().join("templates")).unwrap();
    template.save(dir.path().join("templates/send.png")).unwrap();
    noise(30, 20, 99)
        .save(dir.path().join("templates/elsewhere.png"))
        .unwrap();

    let input = Arc::new(RecordingInput::default());
    let driver = ImageDriver::with_backends(Arc::new(StaticScreen(screen)), input.clone());
    (dir, driver, input)
}

#[test]
fn image_click_lands_on_match_centre() {
    let (dir, driver, input) = image_driver_fixture();
    let steps = vec![Step::Click(ClickStep::on(ElementDescriptor::from_image(
        ImageTemplate::new("send.png"),
    )))];

    run_steps(&steps, &driver, &ctx(dir.path())).unwrap();

    assert_eq!(*input.clicks.lock().unwrap(), vec![(65, 50)]);
}

#[test]
fn image_below_threshold_names_the_template() {
    let (dir, driver, input) = image_driver_fixture();
    let steps = vec![Step::Click(ClickStep::on(ElementDescriptor::from_image(
        ImageTemplate::new("elsewhere.png"),
    )))];

    let err = run_steps(&steps, &driver, &ctx(dir.path())).unwrap_err();

    match err {
        AutomationError::LocatorFailure { kind, detail } => {
            assert_eq!(kind, LocatorKind::Image);
            assert!(detail.contains("elsewhere.png"), "{detail}");
            assert!(detail.contains("best score"), "{detail}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(input.clicks.lock().unwrap().is_empty());
}

#[test]
fn missing_template_is_a_locator_failure() {
    let (dir, driver, _input) = image_driver_fixture();
    let steps = vec![Step::Click(ClickStep::on(ElementDescriptor::from_image(
        ImageTemplate::new("does-not-exist.png"),
    )))];

    let err = run_steps(&steps, &driver, &ctx(dir.path())).unwrap_err();

    assert!(err.to_string().contains("does-not-exist.png"));
    assert!(err.is_retryable());
}
