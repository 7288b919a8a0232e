//! Typed flow steps and the element descriptors they carry.
//!
//! Steps arrive as loosely-typed JSON from flow files. [`Step::from_value`] is
//! the single deserialization boundary: it rejects unknown `type` tags and
//! descriptors with nothing to locate before a flow ever reaches a driver.

use crate::errors::{AutomationError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

pub const DEFAULT_IMAGE_THRESHOLD: f32 = 0.8;
pub const DEFAULT_WAIT_WINDOW_TIMEOUT_SECS: f64 = 30.0;

const STEP_TYPES: &[&str] = &[
    "launch",
    "wait_window",
    "click",
    "input_text",
    "wait",
    "hotkey",
    "close_window",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeTo {
    #[default]
    Screen,
    Window,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenCoordinate {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub relative_to: RelativeTo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,
}

impl ScreenCoordinate {
    pub fn screen(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            relative_to: RelativeTo::Screen,
            window_title: None,
        }
    }
}

fn default_threshold() -> f32 {
    DEFAULT_IMAGE_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTemplate {
    pub image: String,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl ImageTemplate {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            threshold: DEFAULT_IMAGE_THRESHOLD,
        }
    }

    /// A zero or negative threshold in a stored flow means "use the default".
    pub fn effective_threshold(&self) -> f32 {
        if self.threshold > 0.0 {
            self.threshold
        } else {
            DEFAULT_IMAGE_THRESHOLD
        }
    }
}

/// Accessibility-tree description of a control. Every field is optional and
/// matched best-effort; empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl ControlDescriptor {
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(title) = non_empty(&self.window_title) {
            parts.push(format!("window_title={title:?}"));
        }
        if let Some(class) = non_empty(&self.window_class) {
            parts.push(format!("window_class={class:?}"));
        }
        if let Some(id) = self.control_id {
            parts.push(format!("control_id={id}"));
        }
        if let Some(aid) = non_empty(&self.automation_id) {
            parts.push(format!("automation_id={aid:?}"));
        }
        if let Some(name) = non_empty(&self.name) {
            parts.push(format!("name={name:?}"));
        }
        if let Some(ct) = non_empty(&self.control_type) {
            parts.push(format!("control_type={ct:?}"));
        }
        if parts.is_empty() {
            "<empty control descriptor>".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImageRepr {
    Path(String),
    Full(ImageTemplate),
}

fn image_shorthand<'de, D>(deserializer: D) -> std::result::Result<Option<ImageTemplate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<ImageRepr>::deserialize(deserializer)?.map(|repr| match repr {
            ImageRepr::Path(path) => ImageTemplate::new(path),
            ImageRepr::Full(template) => template,
        }),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<ScreenCoordinate>,
    #[serde(
        default,
        deserialize_with = "image_shorthand",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<ImageTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<ControlDescriptor>,
}

/// Where the cursor should land for a click, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Locator<'a> {
    Point {
        x: i32,
        y: i32,
        window: Option<WindowAnchor<'a>>,
    },
    Image(&'a ImageTemplate),
    Control(&'a ControlDescriptor),
}

/// Window whose origin offsets a window-relative coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAnchor<'a> {
    pub title: Option<&'a str>,
}

impl Locator<'_> {
    pub fn kind(&self) -> crate::errors::LocatorKind {
        use crate::errors::LocatorKind;
        match self {
            Locator::Point { .. } => LocatorKind::Coordinate,
            Locator::Image(_) => LocatorKind::Image,
            Locator::Control(_) => LocatorKind::Control,
        }
    }
}

impl ElementDescriptor {
    pub fn from_coord(coord: ScreenCoordinate) -> Self {
        Self {
            coord: Some(coord),
            ..Default::default()
        }
    }

    pub fn from_image(image: ImageTemplate) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }

    pub fn from_control(control: ControlDescriptor) -> Self {
        Self {
            control: Some(control),
            ..Default::default()
        }
    }

    pub fn has_any(&self) -> bool {
        self.coord.is_some() || self.image.is_some() || self.control.is_some()
    }

    /// The locator to use: coordinate, then image, then control.
    pub fn primary(&self) -> Option<Locator<'_>> {
        if let Some(coord) = &self.coord {
            let window = match coord.relative_to {
                RelativeTo::Screen => None,
                RelativeTo::Window => Some(WindowAnchor {
                    title: coord.window_title.as_deref(),
                }),
            };
            return Some(Locator::Point {
                x: coord.x,
                y: coord.y,
                window,
            });
        }
        if let Some(image) = &self.image {
            return Some(Locator::Image(image));
        }
        self.control.as_ref().map(Locator::Control)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchStep {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

fn default_wait_window_timeout() -> f64 {
    DEFAULT_WAIT_WINDOW_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitWindowStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default = "default_wait_window_timeout")]
    pub timeout_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

impl ClickStep {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            element: Some(ElementDescriptor::from_coord(ScreenCoordinate::screen(x, y))),
            x: None,
            y: None,
        }
    }

    pub fn on(element: ElementDescriptor) -> Self {
        Self {
            element: Some(element),
            x: None,
            y: None,
        }
    }

    /// Bare `x`/`y` win over `element`.
    pub fn locator(&self) -> Option<Locator<'_>> {
        if let (Some(x), Some(y)) = (self.x, self.y) {
            return Some(Locator::Point { x, y, window: None });
        }
        self.element.as_ref().and_then(ElementDescriptor::primary)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTextStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementDescriptor>,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_true")]
    pub clear_first: bool,
}

fn default_wait_seconds() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitStep {
    #[serde(default = "default_wait_seconds")]
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyStep {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseWindowStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub kill_process: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Launch(LaunchStep),
    WaitWindow(WaitWindowStep),
    Click(ClickStep),
    InputText(InputTextStep),
    Wait(WaitStep),
    Hotkey(HotkeyStep),
    CloseWindow(CloseWindowStep),
}

impl Step {
    /// Parse one step, rejecting unknown tags and steps that cannot run.
    pub fn from_value(value: &Value) -> Result<Step> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AutomationError::InvalidStep("step has no \"type\" field".into()))?;
        if !STEP_TYPES.contains(&kind) {
            return Err(AutomationError::UnknownStep(kind.to_string()));
        }
        let step: Step = serde_json::from_value(value.clone())
            .map_err(|e| AutomationError::InvalidStep(format!("{kind}: {e}")))?;
        step.validate()?;
        Ok(step)
    }

    pub fn parse_all(values: &[Value]) -> Result<Vec<Step>> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                Step::from_value(value).map_err(|e| match e {
                    AutomationError::InvalidStep(msg) => {
                        AutomationError::InvalidStep(format!("step {}: {msg}", i + 1))
                    }
                    other => other,
                })
            })
            .collect()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Step::Launch(_) => "launch",
            Step::WaitWindow(_) => "wait_window",
            Step::Click(_) => "click",
            Step::InputText(_) => "input_text",
            Step::Wait(_) => "wait",
            Step::Hotkey(_) => "hotkey",
            Step::CloseWindow(_) => "close_window",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Step::Launch(step) if step.path.trim().is_empty() => {
                Err(AutomationError::InvalidStep("launch: empty path".into()))
            }
            Step::Click(step) if step.locator().is_none() => Err(AutomationError::InvalidStep(
                "click: needs x/y or an element with coord, image or control".into(),
            )),
            Step::InputText(InputTextStep {
                element: Some(element),
                ..
            }) if !element.has_any() => Err(AutomationError::InvalidStep(
                "input_text: element has no coord, image or control".into(),
            )),
            Step::Hotkey(step) if step.keys.is_empty() => {
                Err(AutomationError::InvalidStep("hotkey: no keys".into()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_type_is_rejected_at_the_boundary() {
        let err = Step::from_value(&json!({"type": "double_click", "x": 1, "y": 2})).unwrap_err();
        assert!(matches!(err, AutomationError::UnknownStep(ref t) if t == "double_click"));
        assert_eq!(err.to_string(), "unknown step type: double_click");
    }

    #[test]
    fn defaults_are_filled_in() {
        let step = Step::from_value(&json!({"type": "wait_window", "title": "客服"})).unwrap();
        match step {
            Step::WaitWindow(w) => {
                assert_eq!(w.timeout_seconds, 30.0);
                assert_eq!(w.class_name, None);
            }
            other => panic!("unexpected step {other:?}"),
        }

        let step = Step::from_value(&json!({"type": "input_text"})).unwrap();
        assert_eq!(
            step,
            Step::InputText(InputTextStep {
                element: None,
                text: String::new(),
                clear_first: true,
            })
        );
    }

    #[test]
    fn image_accepts_bare_string() {
        let step = Step::from_value(&json!({
            "type": "click",
            "element": {"image": "login.png"}
        }))
        .unwrap();
        let Step::Click(click) = step else {
            panic!("expected click")
        };
        match click.locator() {
            Some(Locator::Image(t)) => {
                assert_eq!(t.image, "login.png");
                assert_eq!(t.threshold, DEFAULT_IMAGE_THRESHOLD);
            }
            other => panic!("unexpected locator {other:?}"),
        }
    }

    #[test]
    fn legacy_xy_wins_over_element() {
        let step = Step::from_value(&json!({
            "type": "click",
            "x": 5,
            "y": 6,
            "element": {"image": {"image": "a.png", "threshold": 0.9}}
        }))
        .unwrap();
        let Step::Click(click) = step else {
            panic!("expected click")
        };
        assert_eq!(
            click.locator(),
            Some(Locator::Point {
                x: 5,
                y: 6,
                window: None
            })
        );
    }

    #[test]
    fn coordinate_beats_image_beats_control() {
        let element = ElementDescriptor {
            coord: None,
            image: Some(ImageTemplate::new("b.png")),
            control: Some(ControlDescriptor {
                name: Some("OK".into()),
                ..Default::default()
            }),
        };
        assert!(matches!(element.primary(), Some(Locator::Image(_))));

        let element = ElementDescriptor {
            coord: Some(ScreenCoordinate {
                x: 10,
                y: 20,
                relative_to: RelativeTo::Window,
                window_title: Some("Chat".into()),
            }),
            ..element
        };
        assert_eq!(
            element.primary(),
            Some(Locator::Point {
                x: 10,
                y: 20,
                window: Some(WindowAnchor {
                    title: Some("Chat")
                })
            })
        );
    }

    #[test]
    fn click_without_locator_is_invalid() {
        let err = Step::from_value(&json!({"type": "click", "element": {}})).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidStep(_)));
    }

    #[test]
    fn parse_all_numbers_the_failing_step() {
        let err = Step::parse_all(&[
            json!({"type": "wait", "seconds": 0.5}),
            json!({"type": "hotkey", "keys": []}),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("step 2"), "{err}");
    }

    #[test]
    fn serializes_with_snake_case_tag() {
        let step = Step::CloseWindow(CloseWindowStep {
            title: Some("Chat".into()),
            class_name: None,
            kill_process: true,
        });
        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            json!({"type": "close_window", "title": "Chat", "kill_process": true})
        );
    }

    #[test]
    fn zero_threshold_falls_back_to_default() {
        let template = ImageTemplate {
            image: "x.png".into(),
            threshold: 0.0,
        };
        assert_eq!(template.effective_threshold(), DEFAULT_IMAGE_THRESHOLD);
    }
}
