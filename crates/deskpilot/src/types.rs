//! Geometry and handle types shared by locators, drivers and capture tools

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Screen rectangle in physical pixels, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// A `size`×`size` square centred on a point.
    pub fn centered_on(x: i32, y: i32, size: i32) -> Self {
        let half = size / 2;
        Self::new(x - half, y - half, x - half + size, y - half + size)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        if self.is_degenerate() {
            return 0;
        }
        i64::from(self.width()) * i64::from(self.height())
    }

    pub fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn center(&self) -> (i32, i32) {
        (self.left + self.width() / 2, self.top + self.height() / 2)
    }

    /// Edge-inclusive containment, matching how hit-testing reports points on
    /// a control's border.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.left <= x && x <= self.right && self.top <= y && y <= self.bottom
    }

    pub fn inflate(&self, by: i32) -> Self {
        Self::new(
            self.left - by,
            self.top - by,
            self.right + by,
            self.bottom + by,
        )
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let rect = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!rect.is_degenerate()).then_some(rect)
    }
}

/// Outcome of a successful locate: where the target is, and how confident the
/// match was when the strategy produces a score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocateResult {
    pub rect: Rect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl LocateResult {
    pub fn new(rect: Rect) -> Self {
        Self { rect, score: None }
    }

    pub fn scored(rect: Rect, score: f32) -> Self {
        Self {
            rect,
            score: Some(score),
        }
    }
}

/// Handle for a running highlight blink. Dropping it detaches the blink
/// thread, which stops by itself once its duration has elapsed.
#[derive(Debug)]
pub struct BlinkHandle {
    pub(crate) should_close: Arc<AtomicBool>,
    pub(crate) handle: Option<thread::JoinHandle<()>>,
}

impl BlinkHandle {
    /// Stop blinking now and wait for the overlay to be destroyed.
    pub fn close(mut self) {
        self.should_close.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_blink_is_inactive() {
        let handle = BlinkHandle {
            should_close: Arc::new(AtomicBool::new(false)),
            handle: Some(thread::spawn(|| {})),
        };
        let formatted = format!("{handle:?}");
        assert!(formatted.contains("should_close"), "{formatted}");
        handle.close();

        let detached = BlinkHandle {
            should_close: Arc::new(AtomicBool::new(false)),
            handle: None,
        };
        assert!(!detached.is_active());
    }

    #[test]
    fn center_and_area() {
        let rect = Rect::new(10, 20, 110, 70);
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
        assert_eq!(rect.area(), 5000);
        assert_eq!(rect.center(), (60, 45));
    }

    #[test]
    fn degenerate_rects_have_no_area() {
        assert!(Rect::new(5, 5, 5, 40).is_degenerate());
        assert!(Rect::new(5, 40, 30, 10).is_degenerate());
        assert_eq!(Rect::new(5, 40, 30, 10).area(), 0);
    }

    #[test]
    fn contains_is_edge_inclusive() {
        let rect = Rect::new(0, 0, 10, 10);
        assert!(rect.contains(0, 0));
        assert!(rect.contains(10, 10));
        assert!(!rect.contains(11, 5));
    }

    #[test]
    fn centered_square() {
        let rect = Rect::centered_on(100, 100, 60);
        assert_eq!(rect, Rect::new(70, 70, 130, 130));
        assert_eq!(rect.center(), (100, 100));
    }

    #[test]
    fn intersect_clips_to_overlap() {
        let screen = Rect::new(0, 0, 1920, 1080);
        assert_eq!(
            Rect::new(1900, 1000, 2000, 1200).intersect(&screen),
            Some(Rect::new(1900, 1000, 1920, 1080))
        );
        assert_eq!(Rect::new(2000, 0, 2100, 10).intersect(&screen), None);
    }
}
