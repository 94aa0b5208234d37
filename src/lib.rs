//! gpui_plotsurface provides plotting surfaces for GPUI: two-dimensional
//! planes, time series, rotatable 3-D cubes and projected celestial
//! spheres.
//!
//! A surface combines device bounds with a fixed [`Profile`](SurfaceFactory::Profile)
//! and a navigable [`Aspect`](SurfaceFactory::Aspect). It maps data
//! positions to pixels and back, and paints axes, ticks and grids into a
//! backend-agnostic [`RenderList`]. Navigators turn pointer gestures into
//! new aspects; [`gpui_backend::SurfaceView`] hosts the whole cycle in a
//! GPUI window.

#![forbid(unsafe_code)]

pub mod axis;
pub mod captioner;
pub mod error;
pub mod factory;
pub mod geom;
pub mod gpui_backend;
pub mod grid;
pub mod matrix;
pub mod navigation;
pub mod projection;
pub mod range;
pub mod render;
pub mod surface;
pub mod tick;

pub use axis::{Axis, AxisScale};
pub use captioner::{CaptionBounds, Captioner, FixedCaptioner, Orientation};
pub use error::{GridError, SurfaceError};
pub use factory::{
    AxisLimits, CubeConfig, CubeSurfaceFactory, PlaneConfig, PlaneSurfaceFactory, SkyConfig, SkySurfaceFactory,
    Subrange, SurfaceFactory, TimeConfig, TimeSurfaceFactory,
};
pub use geom::{Affine, Insets, ScreenPoint, ScreenRect};
pub use grid::{GridKind, GridLine, GridLiner};
pub use gpui_backend::{GpuiCaptioner, SurfaceHandle, SurfaceView, SurfaceViewConfig};
pub use navigation::{AxisNavigation, CubeNavigator, NavButton, Navigator, PlaneNavigator, SkyNavigator, TimeNavigator};
pub use projection::Projection;
pub use range::Range;
pub use render::{Color, FillStyle, LineSegment, LineStyle, RenderCommand, RenderList, TextStyle};
pub use surface::{
    Corner, CubeAspect, CubeProfile, CubeSurface, PlaneAspect, PlaneProfile, PlaneSurface, PositionSupplier,
    SecondaryAxis, SkyAspect, SkyFov, SkyProfile, SkySurface, Surface, TimeAspect, TimeProfile, TimeSurface,
};
pub use tick::time::TimeFormat;
pub use tick::{BasicTicker, Tick, TickRun, Ticker};
