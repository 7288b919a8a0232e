//! Smallest-element-at-point descent over any element tree.

use crate::types::Rect;
use std::time::{Duration, Instant};

/// Depth limit for the raw accessibility view.
pub const RAW_WALK_DEPTH: usize = 12;
/// Depth limit for the control-view fallback.
pub const FALLBACK_WALK_DEPTH: usize = 8;
/// Fallback results larger than this (px²) are cross-checked against the
/// legacy window hierarchy.
pub const LARGE_AREA_THRESHOLD: i64 = 200_000;

/// Fixed-rate schedule for re-resolving the element under the cursor.
///
/// Ticks regardless of cursor movement, so the hover frame follows menus
/// and dialogs that open under a still pointer.
#[derive(Debug, Clone, Copy)]
pub struct HoverRefresh {
    interval: Duration,
    last: Option<Instant>,
}

impl HoverRefresh {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True on the first call and whenever `interval` has passed since the
    /// last tick that returned true.
    pub fn due(&mut self, now: Instant) -> bool {
        let due = self
            .last
            .map_or(true, |t| now.saturating_duration_since(t) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }
}

pub trait HitTestNode: Sized {
    fn rect(&self) -> Option<Rect>;
    fn children(&self) -> Vec<Self>;
}

/// Descend from `start`, repeatedly stepping into the smallest child whose
/// rectangle contains `(x, y)` and is smaller than the current element.
/// Stops when no such child exists or after `max_depth` steps.
pub fn smallest_at_point<N: HitTestNode>(start: N, x: i32, y: i32, max_depth: usize) -> N {
    let mut current = start;
    for _ in 0..max_depth {
        let bound = match current.rect() {
            Some(rect) if !rect.is_degenerate() => rect.area(),
            _ => i64::MAX,
        };

        let mut best: Option<(i64, N)> = None;
        for child in current.children() {
            let Some(rect) = child.rect() else { continue };
            if rect.is_degenerate() || !rect.contains(x, y) {
                continue;
            }
            let area = rect.area();
            let best_area = best.as_ref().map_or(bound, |(a, _)| *a);
            if area < best_area {
                best = Some((area, child));
            }
        }

        match best {
            Some((_, child)) => current = child,
            None => break,
        }
    }
    current
}

/// Whether a legacy-window rectangle should replace a fallback result.
pub fn prefer_legacy(fallback: Rect, legacy: Option<Rect>) -> bool {
    if fallback.area() <= LARGE_AREA_THRESHOLD {
        return false;
    }
    legacy.is_some_and(|legacy| !legacy.is_degenerate() && legacy.area() < fallback.area())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hover_refresh_ticks_at_a_fixed_rate() {
        let start = Instant::now();
        let mut refresh = HoverRefresh::new(Duration::from_millis(50));
        assert!(refresh.due(start));
        assert!(!refresh.due(start + Duration::from_millis(20)));
        assert!(refresh.due(start + Duration::from_millis(50)));
        assert!(!refresh.due(start + Duration::from_millis(99)));
        assert!(refresh.due(start + Duration::from_millis(100)));
    }

    #[derive(Debug, Clone)]
    struct Node {
        id: &'static str,
        rect: Option<Rect>,
        children: Vec<Node>,
    }

    impl Node {
        fn new(id: &'static str, rect: Rect, children: Vec<Node>) -> Self {
            Self {
                id,
                rect: Some(rect),
                children,
            }
        }
    }

    impl HitTestNode for Node {
        fn rect(&self) -> Option<Rect> {
            self.rect
        }

        fn children(&self) -> Vec<Self> {
            self.children.clone()
        }
    }

    fn window() -> Node {
        Node::new(
            "window",
            Rect::new(0, 0, 800, 600),
            vec![
                Node::new(
                    "toolbar",
                    Rect::new(0, 0, 800, 40),
                    vec![
                        Node::new("send", Rect::new(700, 5, 780, 35), vec![]),
                        Node::new("send-icon", Rect::new(705, 10, 725, 30), vec![]),
                    ],
                ),
                Node::new("body", Rect::new(0, 40, 800, 600), vec![]),
                Node {
                    id: "broken",
                    rect: None,
                    children: vec![],
                },
            ],
        )
    }

    #[test]
    fn descends_to_smallest_containing_child() {
        assert_eq!(smallest_at_point(window(), 710, 20, RAW_WALK_DEPTH).id, "send-icon");
        assert_eq!(smallest_at_point(window(), 750, 20, RAW_WALK_DEPTH).id, "send");
        assert_eq!(smallest_at_point(window(), 300, 300, RAW_WALK_DEPTH).id, "body");
    }

    #[test]
    fn depth_limit_stops_descent() {
        assert_eq!(smallest_at_point(window(), 710, 20, 1).id, "toolbar");
        assert_eq!(smallest_at_point(window(), 710, 20, 0).id, "window");
    }

    #[test]
    fn child_larger_than_parent_is_ignored() {
        let root = Node::new(
            "panel",
            Rect::new(100, 100, 200, 200),
            vec![Node::new("overflow", Rect::new(0, 0, 1000, 1000), vec![])],
        );
        assert_eq!(smallest_at_point(root, 150, 150, RAW_WALK_DEPTH).id, "panel");
    }

    #[test]
    fn legacy_substitution_rules() {
        let huge = Rect::new(0, 0, 1000, 800);
        let small = Rect::new(10, 10, 200, 40);
        assert!(prefer_legacy(huge, Some(small)));
        assert!(!prefer_legacy(huge, Some(Rect::new(10, 10, 10, 40))));
        assert!(!prefer_legacy(huge, Some(huge)));
        assert!(!prefer_legacy(small, Some(Rect::new(12, 12, 20, 20))));
        assert!(!prefer_legacy(huge, None));
    }
}
