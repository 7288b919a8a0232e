//! Interactive capture: sessions, element-at-point descent and region
//! selection. The native overlays live under `platforms::windows`.

pub mod hit_test;
pub mod region;
pub mod session;

pub use hit_test::{smallest_at_point, HitTestNode, HoverRefresh};
pub use region::{capture_to_templates, save_capture, save_selection, DragSelection, RegionPhase};
pub use session::{CaptureSession, SessionContext};
