//! Navigation: mouse gestures turned into new aspects.
//!
//! A navigator never mutates anything. Drags are always measured from the
//! surface as it was when the drag began, so repeated calls during one drag
//! give the view for the whole movement so far.

use std::fmt;

use crate::geom::{ScreenPoint, ScreenRect};
use crate::surface::{
    CubeAspect, CubeSurface, PlaneAspect, PlaneSurface, PositionSupplier, SkyAspect, SkySurface,
    Surface, TimeAspect, TimeSurface,
};

/// Zoom step applied per wheel click.
pub const DEFAULT_ZOOM_FACTOR: f64 = 1.2;

const MIN_DRAG_ZOOM: f64 = 0.1;
const MAX_DRAG_ZOOM: f64 = 10.0;

/// Mouse button responsible for a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavButton {
    /// Usually the left button.
    Primary,
    /// Usually the right button.
    Secondary,
    /// Middle button or wheel press.
    Middle,
}

/// Part of the canvas a gesture started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HitRegion {
    /// Plot data area.
    Plot,
    /// Below the plot, beside the X axis.
    XAxis,
    /// Left of the plot, beside the Y axis.
    YAxis,
    /// Anywhere else.
    Outside,
}

/// Determine which region of `bounds` contains `point`.
pub(crate) fn hit_test(bounds: ScreenRect, point: ScreenPoint) -> HitRegion {
    let in_x = point.x >= bounds.min.x && point.x <= bounds.max.x;
    let in_y = point.y >= bounds.min.y && point.y <= bounds.max.y;
    match (in_x, in_y) {
        (true, true) => HitRegion::Plot,
        (true, false) if point.y > bounds.max.y => HitRegion::XAxis,
        (false, true) if point.x < bounds.min.x => HitRegion::YAxis,
        _ => HitRegion::Outside,
    }
}

/// Which of two axes a gesture at `region` acts on, or `None` for neither.
fn region_flags(region: HitRegion, x: bool, y: bool) -> Option<[bool; 2]> {
    let flags = match region {
        HitRegion::Plot => [x, y],
        HitRegion::XAxis => [x, false],
        HitRegion::YAxis => [false, y],
        HitRegion::Outside => return None,
    };
    (flags[0] || flags[1]).then_some(flags)
}

/// Zoom factor for a stretch drag of `delta` pixels along an axis
/// `length` pixels long; positive deltas zoom in.
pub(crate) fn drag_zoom_factor(delta: f64, length: f64) -> f64 {
    if !(length > 0.0) {
        return 1.0;
    }
    (1.0 + delta / length).clamp(MIN_DRAG_ZOOM, MAX_DRAG_ZOOM)
}

/// Zoom factor for `rotation` wheel clicks; positive rotation zooms out.
pub fn wheel_zoom_factor(step: f64, rotation: f64) -> f64 {
    step.powf(-rotation)
}

/// Turns gestures on a surface into a replacement aspect.
pub trait Navigator: fmt::Debug {
    /// Surface type navigated.
    type Surface: Surface;
    /// Aspect type produced.
    type Aspect;

    /// Aspect for a drag from `origin` to `pos` on the surface shown when
    /// the drag started.
    fn drag(
        &self,
        surface: &Self::Surface,
        origin: ScreenPoint,
        pos: ScreenPoint,
        button: NavButton,
    ) -> Option<Self::Aspect>;

    /// Aspect after `rotation` wheel clicks at `pos`.
    fn wheel(&self, surface: &Self::Surface, pos: ScreenPoint, rotation: f64) -> Option<Self::Aspect>;

    /// Aspect after a click at `pos`; plotted positions help pin down the
    /// clicked data position where the surface needs them.
    fn click(
        &self,
        surface: &Self::Surface,
        pos: ScreenPoint,
        button: NavButton,
        positions: Option<&dyn PositionSupplier>,
    ) -> Option<Self::Aspect>;
}

/// Gestures shared by surfaces with one horizontal and one vertical axis.
pub trait PlanarGestures: Surface {
    /// View description.
    type Aspect;

    /// Drag from `g0` to `g1`, per-axis enabled by `flags`.
    fn pan_axes(&self, g0: ScreenPoint, g1: ScreenPoint, flags: [bool; 2]) -> Self::Aspect;

    /// Zoom about `gpos` by per-axis factors.
    fn zoom_axes(&self, gpos: ScreenPoint, factors: [f64; 2]) -> Self::Aspect;

    /// Centre on `dpos`, per-axis enabled by `flags`.
    fn center_axes(&self, dpos: &[f64], flags: [bool; 2]) -> Option<Self::Aspect>;

    /// Centre on `dpos` and zoom by `factor`.
    fn reframe_axes(&self, dpos: &[f64], factor: f64) -> Option<Self::Aspect>;

    /// Cover a graphics rectangle.
    fn zoom_to_rect(&self, rect: ScreenRect) -> Option<Self::Aspect>;
}

impl PlanarGestures for PlaneSurface {
    type Aspect = PlaneAspect;

    fn pan_axes(&self, g0: ScreenPoint, g1: ScreenPoint, flags: [bool; 2]) -> PlaneAspect {
        self.pan(g0, g1, flags[0], flags[1])
    }

    fn zoom_axes(&self, gpos: ScreenPoint, factors: [f64; 2]) -> PlaneAspect {
        self.zoom(gpos, factors[0], factors[1])
    }

    fn center_axes(&self, dpos: &[f64], flags: [bool; 2]) -> Option<PlaneAspect> {
        self.center(dpos, flags[0], flags[1])
    }

    fn reframe_axes(&self, dpos: &[f64], factor: f64) -> Option<PlaneAspect> {
        self.reframe(dpos, factor)
    }

    fn zoom_to_rect(&self, rect: ScreenRect) -> Option<PlaneAspect> {
        self.zoom_rect(rect)
    }
}

impl PlanarGestures for TimeSurface {
    type Aspect = TimeAspect;

    fn pan_axes(&self, g0: ScreenPoint, g1: ScreenPoint, flags: [bool; 2]) -> TimeAspect {
        self.pan(g0, g1, flags[0], flags[1])
    }

    fn zoom_axes(&self, gpos: ScreenPoint, factors: [f64; 2]) -> TimeAspect {
        self.zoom(gpos, factors[0], factors[1])
    }

    fn center_axes(&self, dpos: &[f64], flags: [bool; 2]) -> Option<TimeAspect> {
        self.center(dpos, flags[0], flags[1])
    }

    fn reframe_axes(&self, dpos: &[f64], factor: f64) -> Option<TimeAspect> {
        self.reframe(dpos, factor)
    }

    fn zoom_to_rect(&self, rect: ScreenRect) -> Option<TimeAspect> {
        self.zoom_rect(rect)
    }
}

/// Per-axis permissions and zoom step for two-axis navigation.
///
/// Primary drags pan, secondary drags stretch-zoom about the drag start
/// and middle drags zoom to the dragged-out box. Gestures starting beside
/// an axis act on that axis only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisNavigation {
    /// Allow panning horizontally.
    pub x_pan: bool,
    /// Allow panning vertically.
    pub y_pan: bool,
    /// Allow zooming horizontally.
    pub x_zoom: bool,
    /// Allow zooming vertically.
    pub y_zoom: bool,
    /// Zoom step per wheel click.
    pub zoom_factor: f64,
}

impl Default for AxisNavigation {
    fn default() -> Self {
        Self {
            x_pan: true,
            y_pan: true,
            x_zoom: true,
            y_zoom: true,
            zoom_factor: DEFAULT_ZOOM_FACTOR,
        }
    }
}

impl AxisNavigation {
    fn drag<S: PlanarGestures>(
        &self,
        surface: &S,
        origin: ScreenPoint,
        pos: ScreenPoint,
        button: NavButton,
    ) -> Option<S::Aspect> {
        let bounds = surface.plot_bounds();
        let region = hit_test(bounds, origin);
        match button {
            NavButton::Primary => {
                let flags = region_flags(region, self.x_pan, self.y_pan)?;
                Some(surface.pan_axes(origin, pos, flags))
            }
            NavButton::Secondary => {
                let [x, y] = region_flags(region, self.x_zoom, self.y_zoom)?;
                let fx = if x { drag_zoom_factor(pos.x - origin.x, bounds.width()) } else { 1.0 };
                let fy = if y { drag_zoom_factor(origin.y - pos.y, bounds.height()) } else { 1.0 };
                Some(surface.zoom_axes(origin, [fx, fy]))
            }
            NavButton::Middle => {
                if region != HitRegion::Plot {
                    return None;
                }
                let rect = ScreenRect::new(
                    ScreenPoint::new(origin.x.min(pos.x), origin.y.min(pos.y)),
                    ScreenPoint::new(origin.x.max(pos.x), origin.y.max(pos.y)),
                );
                surface.zoom_to_rect(rect)
            }
        }
    }

    fn wheel<S: PlanarGestures>(&self, surface: &S, pos: ScreenPoint, rotation: f64) -> Option<S::Aspect> {
        let [x, y] = region_flags(hit_test(surface.plot_bounds(), pos), self.x_zoom, self.y_zoom)?;
        let factor = wheel_zoom_factor(self.zoom_factor, rotation);
        let pick = |on: bool| if on { factor } else { 1.0 };
        Some(surface.zoom_axes(pos, [pick(x), pick(y)]))
    }

    fn click<S: PlanarGestures>(
        &self,
        surface: &S,
        pos: ScreenPoint,
        button: NavButton,
        positions: Option<&dyn PositionSupplier>,
    ) -> Option<S::Aspect> {
        if hit_test(surface.plot_bounds(), pos) != HitRegion::Plot {
            return None;
        }
        let dpos = surface.graphics_to_data(pos, positions)?;
        match button {
            NavButton::Primary => surface.center_axes(&dpos, [self.x_pan, self.y_pan]),
            NavButton::Secondary => surface.reframe_axes(&dpos, self.zoom_factor),
            NavButton::Middle => None,
        }
    }
}

/// Navigator for plane surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaneNavigator(pub AxisNavigation);

impl Navigator for PlaneNavigator {
    type Surface = PlaneSurface;
    type Aspect = PlaneAspect;

    fn drag(&self, surface: &PlaneSurface, origin: ScreenPoint, pos: ScreenPoint, button: NavButton) -> Option<PlaneAspect> {
        self.0.drag(surface, origin, pos, button)
    }

    fn wheel(&self, surface: &PlaneSurface, pos: ScreenPoint, rotation: f64) -> Option<PlaneAspect> {
        self.0.wheel(surface, pos, rotation)
    }

    fn click(
        &self,
        surface: &PlaneSurface,
        pos: ScreenPoint,
        button: NavButton,
        positions: Option<&dyn PositionSupplier>,
    ) -> Option<PlaneAspect> {
        self.0.click(surface, pos, button, positions)
    }
}

/// Navigator for time surfaces; X is the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeNavigator(pub AxisNavigation);

impl Navigator for TimeNavigator {
    type Surface = TimeSurface;
    type Aspect = TimeAspect;

    fn drag(&self, surface: &TimeSurface, origin: ScreenPoint, pos: ScreenPoint, button: NavButton) -> Option<TimeAspect> {
        self.0.drag(surface, origin, pos, button)
    }

    fn wheel(&self, surface: &TimeSurface, pos: ScreenPoint, rotation: f64) -> Option<TimeAspect> {
        self.0.wheel(surface, pos, rotation)
    }

    fn click(
        &self,
        surface: &TimeSurface,
        pos: ScreenPoint,
        button: NavButton,
        positions: Option<&dyn PositionSupplier>,
    ) -> Option<TimeAspect> {
        self.0.click(surface, pos, button, positions)
    }
}

/// Navigator for cube surfaces.
///
/// Primary drags rotate, secondary drags pan the data along the two
/// screen-facing axes and middle drags stretch-zoom. In isotropic mode
/// every zoom acts on all three axes about the cube centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeNavigator {
    /// Keep equal scaling on all axes.
    pub isotropic: bool,
    /// Zoom step per wheel click.
    pub zoom_factor: f64,
}

impl Default for CubeNavigator {
    fn default() -> Self {
        Self {
            isotropic: false,
            zoom_factor: DEFAULT_ZOOM_FACTOR,
        }
    }
}

impl Navigator for CubeNavigator {
    type Surface = CubeSurface;
    type Aspect = CubeAspect;

    fn drag(&self, surface: &CubeSurface, origin: ScreenPoint, pos: ScreenPoint, button: NavButton) -> Option<CubeAspect> {
        let bounds = surface.plot_bounds();
        if !bounds.contains(origin) {
            return None;
        }
        match button {
            NavButton::Primary => Some(surface.pan(origin, pos)),
            NavButton::Secondary => surface.point_pan(origin, pos),
            NavButton::Middle if self.isotropic => {
                let factor = drag_zoom_factor(origin.y - pos.y, bounds.height());
                Some(surface.center_zoom(factor, [true; 3]))
            }
            NavButton::Middle => surface.point_zoom(
                origin,
                drag_zoom_factor(pos.x - origin.x, bounds.width()),
                drag_zoom_factor(origin.y - pos.y, bounds.height()),
            ),
        }
    }

    fn wheel(&self, surface: &CubeSurface, pos: ScreenPoint, rotation: f64) -> Option<CubeAspect> {
        let factor = wheel_zoom_factor(self.zoom_factor, rotation);
        if self.isotropic || !surface.plot_bounds().contains(pos) {
            Some(surface.center_zoom(factor, [true; 3]))
        } else {
            surface.point_zoom(pos, factor, factor)
        }
    }

    fn click(
        &self,
        surface: &CubeSurface,
        pos: ScreenPoint,
        button: NavButton,
        positions: Option<&dyn PositionSupplier>,
    ) -> Option<CubeAspect> {
        if button != NavButton::Primary || !surface.plot_bounds().contains(pos) {
            return None;
        }
        let dpos = surface.graphics_to_data(pos, positions)?;
        surface.center(&dpos)
    }
}

/// Navigator for sky surfaces.
///
/// Primary drags rotate the sky (or slide the plane for projections that
/// cannot rotate), secondary drags zoom about the drag start and middle
/// drags slide the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyNavigator {
    /// Zoom step per wheel click.
    pub zoom_factor: f64,
}

impl Default for SkyNavigator {
    fn default() -> Self {
        Self {
            zoom_factor: DEFAULT_ZOOM_FACTOR,
        }
    }
}

impl Navigator for SkyNavigator {
    type Surface = SkySurface;
    type Aspect = SkyAspect;

    fn drag(&self, surface: &SkySurface, origin: ScreenPoint, pos: ScreenPoint, button: NavButton) -> Option<SkyAspect> {
        match button {
            NavButton::Primary => surface.pan(origin, pos),
            NavButton::Secondary => {
                let factor = drag_zoom_factor(origin.y - pos.y, surface.plot_bounds().height());
                surface.zoom(origin, factor)
            }
            NavButton::Middle => surface
                .plot_bounds()
                .contains(origin)
                .then(|| surface.flat_pan(origin, pos)),
        }
    }

    fn wheel(&self, surface: &SkySurface, pos: ScreenPoint, rotation: f64) -> Option<SkyAspect> {
        surface.zoom(pos, wheel_zoom_factor(self.zoom_factor, rotation))
    }

    fn click(
        &self,
        surface: &SkySurface,
        pos: ScreenPoint,
        button: NavButton,
        positions: Option<&dyn PositionSupplier>,
    ) -> Option<SkyAspect> {
        let dpos = surface.graphics_to_data(pos, positions)?;
        match button {
            NavButton::Primary => surface.center(&dpos),
            NavButton::Secondary => surface.reframe(&dpos, self.zoom_factor),
            NavButton::Middle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix;
    use crate::range::Range;
    use crate::surface::{CubeProfile, PlaneProfile, SkyProfile};

    fn bounds() -> ScreenRect {
        ScreenRect::from_origin_size(100.0, 0.0, 400.0, 300.0)
    }

    fn plane() -> PlaneSurface {
        PlaneSurface::new(bounds(), &PlaneProfile::default(), &PlaneAspect::new(0.0, 10.0, 0.0, 100.0))
            .expect("valid surface")
    }

    #[test]
    fn hit_test_regions() {
        let b = bounds();
        assert_eq!(hit_test(b, ScreenPoint::new(300.0, 150.0)), HitRegion::Plot);
        assert_eq!(hit_test(b, ScreenPoint::new(300.0, 310.0)), HitRegion::XAxis);
        assert_eq!(hit_test(b, ScreenPoint::new(90.0, 150.0)), HitRegion::YAxis);
        assert_eq!(hit_test(b, ScreenPoint::new(90.0, 310.0)), HitRegion::Outside);
    }

    #[test]
    fn drag_zoom_factor_is_clamped() {
        assert_eq!(drag_zoom_factor(0.0, 100.0), 1.0);
        assert_eq!(drag_zoom_factor(50.0, 100.0), 1.5);
        assert_eq!(drag_zoom_factor(-500.0, 100.0), MIN_DRAG_ZOOM);
        assert_eq!(drag_zoom_factor(5000.0, 100.0), MAX_DRAG_ZOOM);
        assert_eq!(drag_zoom_factor(10.0, 0.0), 1.0);
    }

    #[test]
    fn plane_drag_respects_region() {
        let s = plane();
        let nav = PlaneNavigator::default();
        let inside = nav
            .drag(&s, ScreenPoint::new(300.0, 150.0), ScreenPoint::new(340.0, 180.0), NavButton::Primary)
            .expect("pan in plot");
        assert!((inside.x.min + 1.0).abs() < 1e-9);
        assert!((inside.y.min - 10.0).abs() < 1e-9);
        let below = nav
            .drag(&s, ScreenPoint::new(300.0, 310.0), ScreenPoint::new(340.0, 340.0), NavButton::Primary)
            .expect("pan on x axis");
        assert!((below.x.min + 1.0).abs() < 1e-9);
        assert_eq!(below.y, Range::new(0.0, 100.0));
        let locked = PlaneNavigator(AxisNavigation {
            x_pan: false,
            ..AxisNavigation::default()
        });
        assert_eq!(
            locked.drag(&s, ScreenPoint::new(300.0, 310.0), ScreenPoint::new(340.0, 310.0), NavButton::Primary),
            None
        );
    }

    #[test]
    fn plane_box_and_wheel_zoom() {
        let s = plane();
        let nav = PlaneNavigator::default();
        let boxed = nav
            .drag(&s, ScreenPoint::new(300.0, 150.0), ScreenPoint::new(140.0, 30.0), NavButton::Middle)
            .expect("box zoom");
        assert!((boxed.x.min - 1.0).abs() < 1e-9 && (boxed.x.max - 5.0).abs() < 1e-9);
        assert!((boxed.y.min - 50.0).abs() < 1e-9 && (boxed.y.max - 90.0).abs() < 1e-9);
        let zoomed = nav.wheel(&s, ScreenPoint::new(300.0, 150.0), -1.0).expect("zoom in");
        assert!(zoomed.x.span() < 10.0 && zoomed.y.span() < 100.0);
        let beside_y = nav.wheel(&s, ScreenPoint::new(50.0, 150.0), 1.0).expect("zoom y only");
        assert_eq!(beside_y.x, Range::new(0.0, 10.0));
        assert!(beside_y.y.span() > 100.0);
    }

    #[test]
    fn plane_click_centres() {
        let s = plane();
        let nav = PlaneNavigator::default();
        let centred = nav
            .click(&s, ScreenPoint::new(140.0, 150.0), NavButton::Primary, None)
            .expect("centre");
        assert!((centred.x.min + 4.0).abs() < 1e-9);
        assert_eq!(nav.click(&s, ScreenPoint::new(10.0, 10.0), NavButton::Primary, None), None);
    }

    #[test]
    fn cube_wheel_and_click() {
        let limits = [Range::new(-1.0, 1.0); 3];
        let s = CubeSurface::new(
            ScreenRect::from_origin_size(0.0, 0.0, 400.0, 400.0),
            &CubeProfile::default(),
            &CubeAspect::new(limits, matrix::IDENTITY),
        )
        .expect("valid surface");
        let nav = CubeNavigator::default();
        let zoomed = nav.wheel(&s, ScreenPoint::new(200.0, 200.0), -1.0).expect("zoom");
        assert!(zoomed.limits[0].span() < 2.0);
        assert_eq!(zoomed.limits[1], limits[1]);
        let iso = CubeNavigator {
            isotropic: true,
            ..CubeNavigator::default()
        };
        let zoomed = iso.wheel(&s, ScreenPoint::new(200.0, 200.0), -1.0).expect("zoom");
        assert!(zoomed.limits.iter().all(|r| r.span() < 2.0));
        let centred = nav
            .click(&s, ScreenPoint::new(315.0, 200.0), NavButton::Primary, None)
            .expect("centre");
        assert!((centred.limits[0].min).abs() < 1e-9 && (centred.limits[0].max - 2.0).abs() < 1e-9);
        let rotated = nav
            .drag(&s, ScreenPoint::new(200.0, 200.0), ScreenPoint::new(250.0, 200.0), NavButton::Primary)
            .expect("rotate");
        assert_eq!(rotated.limits, limits);
        assert_ne!(rotated.rotation, matrix::IDENTITY);
    }

    #[test]
    fn sky_wheel_zooms_in() {
        let profile = SkyProfile::default();
        let aspect = SkyAspect::default_view(profile.projection, profile.reflect);
        let s = SkySurface::new(ScreenRect::from_origin_size(0.0, 0.0, 400.0, 400.0), &profile, &aspect)
            .expect("valid surface");
        let nav = SkyNavigator::default();
        let zoomed = nav.wheel(&s, ScreenPoint::new(200.0, 200.0), -2.0).expect("zoom");
        assert!((zoomed.zoom - aspect.zoom * 1.44).abs() < 1e-9);
        assert_eq!(nav.wheel(&s, ScreenPoint::new(500.0, 200.0), -1.0), None);
        let slid = nav
            .drag(&s, ScreenPoint::new(200.0, 200.0), ScreenPoint::new(210.0, 200.0), NavButton::Middle)
            .expect("slide");
        assert_eq!(slid.rotation, aspect.rotation);
        assert!(slid.x_offset > aspect.x_offset);
    }
}
