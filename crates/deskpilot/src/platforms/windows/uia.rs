//! UI Automation access: top-level window lookup, descendant enumeration and
//! element-at-point resolution with the raw/control/legacy backends.

use crate::capture::hit_test::{
    prefer_legacy, smallest_at_point, HitTestNode, FALLBACK_WALK_DEPTH, RAW_WALK_DEPTH,
};
use crate::errors::{AutomationError, Result};
use crate::locator::{window_matches, ControlProps};
use crate::step::ControlDescriptor;
use crate::types::Rect;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use uiautomation::types::Point;
use uiautomation::{UIAutomation, UIElement, UITreeWalker};
use windows::Win32::Foundation::{HWND, POINT, RECT};
use windows::Win32::UI::WindowsAndMessaging::{
    GetAncestor, GetClassNameW, GetDlgCtrlID, GetWindowRect, GetWindowTextW, WindowFromPoint,
    GA_ROOT,
};

/// Polling interval for window waits.
pub(crate) const WINDOW_POLL_INTERVAL: Duration = Duration::from_millis(500);

const MAX_DESCENDANT_DEPTH: usize = 32;
const MAX_DESCENDANTS: usize = 5000;
const MAX_SIBLINGS: usize = 1024;

/// UI Automation client objects are free-threaded once COM is initialized
/// for the multithreaded apartment, which `UIAutomation::new` does.
pub(crate) struct ThreadSafeAutomation(UIAutomation);

unsafe impl Send for ThreadSafeAutomation {}
unsafe impl Sync for ThreadSafeAutomation {}

fn uia_err(what: &str, e: uiautomation::Error) -> AutomationError {
    AutomationError::PlatformError(format!("{what}: {e}"))
}

pub(crate) fn element_rect(element: &UIElement) -> Option<Rect> {
    element.get_bounding_rectangle().ok().map(|r| {
        Rect::from_origin_size(r.get_left(), r.get_top(), r.get_width(), r.get_height())
    })
}

fn native_control_id(element: &UIElement) -> Option<i32> {
    let handle = element.get_native_window_handle().ok()?;
    let hwnd = HWND(handle as *mut _);
    if hwnd.is_invalid() {
        return None;
    }
    let id = unsafe { GetDlgCtrlID(hwnd) };
    (id != 0).then_some(id)
}

pub(crate) fn control_props(element: &UIElement) -> ControlProps {
    ControlProps {
        automation_id: element.get_automation_id().unwrap_or_default(),
        control_id: native_control_id(element),
        name: element.get_name().unwrap_or_default(),
        control_type: element
            .get_control_type()
            .map(|ct| ct.to_string())
            .unwrap_or_default(),
        localized_control_type: element.get_localized_control_type().unwrap_or_default(),
        rect: element_rect(element),
    }
}

fn children_of(walker: &UITreeWalker, parent: &UIElement) -> Vec<UIElement> {
    let mut out = Vec::new();
    let mut next = walker.get_first_child(parent).ok();
    while let Some(child) = next {
        if out.len() >= MAX_SIBLINGS {
            break;
        }
        next = walker.get_next_sibling(&child).ok();
        out.push(child);
    }
    out
}

struct UiaNode<'w> {
    element: UIElement,
    walker: &'w UITreeWalker,
}

impl HitTestNode for UiaNode<'_> {
    fn rect(&self) -> Option<Rect> {
        element_rect(&self.element)
    }

    fn children(&self) -> Vec<Self> {
        children_of(self.walker, &self.element)
            .into_iter()
            .map(|element| UiaNode {
                element,
                walker: self.walker,
            })
            .collect()
    }
}

fn window_text(hwnd: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn class_name(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Deepest legacy window under a point and its rectangle.
fn legacy_window_at(x: i32, y: i32) -> Option<(HWND, Rect)> {
    unsafe {
        let hwnd = WindowFromPoint(POINT { x, y });
        if hwnd.is_invalid() {
            return None;
        }
        let mut rect = RECT::default();
        GetWindowRect(hwnd, &mut rect).ok()?;
        Some((hwnd, Rect::new(rect.left, rect.top, rect.right, rect.bottom)))
    }
}

/// Title and class of the top-level window under a point.
fn top_level_at(x: i32, y: i32) -> (Option<String>, Option<String>) {
    unsafe {
        let hwnd = WindowFromPoint(POINT { x, y });
        if hwnd.is_invalid() {
            return (None, None);
        }
        let root = GetAncestor(hwnd, GA_ROOT);
        let root = if root.is_invalid() { hwnd } else { root };
        (non_empty(window_text(root)), non_empty(class_name(root)))
    }
}

/// Element found under the cursor.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PointHit {
    pub rect: Rect,
    pub descriptor: ControlDescriptor,
}

pub(crate) struct UiaBackend {
    automation: ThreadSafeAutomation,
}

impl UiaBackend {
    pub(crate) fn new() -> Result<Self> {
        let automation =
            UIAutomation::new().map_err(|e| uia_err("UI Automation initialization failed", e))?;
        Ok(Self {
            automation: ThreadSafeAutomation(automation),
        })
    }

    fn uia(&self) -> &UIAutomation {
        &self.automation.0
    }

    /// First top-level window matching title (else class), in z-order.
    pub(crate) fn find_window(
        &self,
        title: Option<&str>,
        class: Option<&str>,
    ) -> Result<Option<UIElement>> {
        let root = self
            .uia()
            .get_root_element()
            .map_err(|e| uia_err("failed to get desktop root", e))?;
        let walker = self
            .uia()
            .get_control_view_walker()
            .map_err(|e| uia_err("failed to create tree walker", e))?;

        for window in children_of(&walker, &root) {
            let name = window.get_name().unwrap_or_default();
            let class_name = window.get_classname().unwrap_or_default();
            if window_matches(&name, &class_name, title, class) {
                trace!("window match: {:?} [{}]", name, class_name);
                return Ok(Some(window));
            }
        }
        Ok(None)
    }

    /// Poll for a window every [`WINDOW_POLL_INTERVAL`] until `timeout`.
    pub(crate) fn wait_for_window(
        &self,
        title: Option<&str>,
        class: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<UIElement>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(window) = self.find_window(title, class)? {
                return Ok(Some(window));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(WINDOW_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Attributes of every descendant of `window`, depth-first.
    pub(crate) fn descendants(&self, window: &UIElement) -> Result<Vec<ControlProps>> {
        let walker = self
            .uia()
            .get_raw_view_walker()
            .map_err(|e| uia_err("failed to create raw walker", e))?;

        let mut out = Vec::new();
        let mut stack: Vec<(UIElement, usize)> = children_of(&walker, window)
            .into_iter()
            .rev()
            .map(|child| (child, 1))
            .collect();

        while let Some((element, depth)) = stack.pop() {
            if out.len() >= MAX_DESCENDANTS {
                debug!("descendant walk capped at {} elements", MAX_DESCENDANTS);
                break;
            }
            if depth < MAX_DESCENDANT_DEPTH {
                for child in children_of(&walker, &element).into_iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
            out.push(control_props(&element));
        }
        Ok(out)
    }

    /// Resolve the smallest element under a screen point.
    ///
    /// The raw view is tried first; when it yields nothing usable the control
    /// view is walked instead, and a large control-view result is swapped for
    /// the legacy window under the point when that is strictly smaller.
    pub(crate) fn element_at(&self, x: i32, y: i32) -> Option<PointHit> {
        let (window_title, window_class) = top_level_at(x, y);
        let hit = self
            .raw_element_at(x, y)
            .or_else(|| self.fallback_element_at(x, y))?;
        let mut descriptor = hit.descriptor;
        descriptor.window_title = window_title;
        descriptor.window_class = window_class;
        Some(PointHit {
            rect: hit.rect,
            descriptor,
        })
    }

    fn descend(&self, walker: &UITreeWalker, x: i32, y: i32, depth: usize) -> Option<(UIElement, Rect)> {
        let start = self.uia().element_from_point(Point::new(x, y)).ok()?;
        let node = smallest_at_point(
            UiaNode {
                element: start,
                walker,
            },
            x,
            y,
            depth,
        );
        let rect = element_rect(&node.element).filter(|r| !r.is_degenerate())?;
        Some((node.element, rect))
    }

    fn raw_element_at(&self, x: i32, y: i32) -> Option<PointHit> {
        let walker = self.uia().get_raw_view_walker().ok()?;
        let (element, rect) = self.descend(&walker, x, y, RAW_WALK_DEPTH)?;
        Some(PointHit {
            rect,
            descriptor: descriptor_of(&element),
        })
    }

    fn fallback_element_at(&self, x: i32, y: i32) -> Option<PointHit> {
        let walker = self.uia().get_control_view_walker().ok()?;
        let (element, rect) = self.descend(&walker, x, y, FALLBACK_WALK_DEPTH)?;

        let legacy = legacy_window_at(x, y);
        if prefer_legacy(rect, legacy.map(|(_, r)| r)) {
            if let Some((hwnd, legacy_rect)) = legacy {
                debug!(
                    "legacy window {:?} replaces {}px² control-view result",
                    legacy_rect,
                    rect.area()
                );
                let id = unsafe { GetDlgCtrlID(hwnd) };
                return Some(PointHit {
                    rect: legacy_rect,
                    descriptor: ControlDescriptor {
                        control_id: (id != 0).then_some(id),
                        name: non_empty(window_text(hwnd)),
                        ..Default::default()
                    },
                });
            }
        }
        Some(PointHit {
            rect,
            descriptor: descriptor_of(&element),
        })
    }
}

fn descriptor_of(element: &UIElement) -> ControlDescriptor {
    let props = control_props(element);
    let control_type = if props.localized_control_type.is_empty() {
        props.control_type
    } else {
        props.localized_control_type
    };
    ControlDescriptor {
        window_title: None,
        window_class: None,
        control_id: props.control_id,
        automation_id: non_empty(props.automation_id),
        control_type: non_empty(control_type),
        name: non_empty(props.name),
    }
}

/// Whether UI Automation can be initialized on this machine.
pub fn is_available() -> bool {
    UIAutomation::new().is_ok()
}
