//! GPUI integration.
//!
//! [`SurfaceView`] lays out a plotting surface inside a GPUI canvas,
//! replays its render commands, and turns pointer gestures into new
//! aspects through the surface's navigator.

mod config;
mod paint;
mod state;
mod text;
mod view;

pub use config::SurfaceViewConfig;
pub use state::PlotLayer;
pub use text::GpuiCaptioner;
pub use view::{SurfaceHandle, SurfaceView};
