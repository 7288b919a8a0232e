//! Windows-only backends.

pub mod highlight;
pub mod input;
pub(crate) mod overlay;
pub mod picker;
pub mod region;
pub(crate) mod uia;

pub use highlight::blink_rect;
pub use picker::{pick_control_at_cursor, run_control_picker};
pub use region::run_region_capture;
