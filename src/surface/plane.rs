//! Two-dimensional Cartesian surface with optional twin axes.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{
    AxisAnnotation, PositionSupplier, Surface, format_axis_value, hash_f64s, insets_for,
    same_captioner,
};
use crate::axis::{Axis, AxisScale};
use crate::captioner::{Captioner, FixedCaptioner, Orientation};
use crate::error::SurfaceError;
use crate::geom::{Insets, ScreenPoint, ScreenRect};
use crate::range::Range;
use crate::render::{
    Color, FillStyle, LineSegment, LineStyle, RenderCommand, RenderList, clip_segments,
};
use crate::tick::{BasicTicker, Tick, Ticker};

/// Bisection steps used to place secondary ticks.
const BISECT_ITERATIONS: usize = 64;

/// Current view of a plane surface: the visible data ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneAspect {
    /// Visible X range.
    pub x: Range,
    /// Visible Y range.
    pub y: Range,
}

impl PlaneAspect {
    /// Create an aspect from its limits.
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            x: Range::new(xmin, xmax),
            y: Range::new(ymin, ymax),
        }
    }
}

/// Monotonic mapping from a primary axis to a secondary (twin) axis.
#[derive(Clone)]
pub struct SecondaryAxis {
    mapping: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
    scale: AxisScale,
    label: Option<String>,
}

impl SecondaryAxis {
    /// Twin axis showing `mapping(primary)`, ticked linearly.
    pub fn new(mapping: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            mapping: Arc::new(mapping),
            scale: AxisScale::Linear,
            label: None,
        }
    }

    /// Tick the mapped values on this scale.
    pub fn with_scale(mut self, scale: AxisScale) -> Self {
        self.scale = scale;
        self
    }

    /// Set the axis title.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Map a primary data value.
    pub fn map(&self, value: f64) -> f64 {
        (self.mapping)(value)
    }

    /// Axis title.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Ticks in mapped space, repositioned at the primary values they map from.
    pub(crate) fn ticks(
        &self,
        axis: &Axis,
        npix: u32,
        crowding: f64,
        minor: bool,
        captioner: &dyn Captioner,
        orient: Orientation,
    ) -> Vec<Tick> {
        let range = axis.data_range();
        let m0 = self.map(range.min);
        let m1 = self.map(range.max);
        let run = BasicTicker::for_scale(self.scale).get_ticks(
            m0.min(m1),
            m0.max(m1),
            minor,
            captioner,
            &[orient],
            npix,
            crowding,
        );
        run.ticks
            .into_iter()
            .filter_map(|tick| {
                let value = self.invert(tick.value, range, axis.scale())?;
                Some(Tick { value, ..tick })
            })
            .collect()
    }

    /// Primary value mapping onto `target`, by bisection within `range`.
    fn invert(&self, target: f64, range: Range, scale: AxisScale) -> Option<f64> {
        let f = |a: f64| self.map(scale.invert_value(a)) - target;
        let (mut a, mut b) = (scale.map_value(range.min), scale.map_value(range.max));
        let (fa, fb) = (f(a), f(b));
        if fa == 0.0 {
            return Some(range.min);
        }
        if fb == 0.0 {
            return Some(range.max);
        }
        if !(fa * fb < 0.0) {
            return None;
        }
        let positive_at_a = fa > 0.0;
        for _ in 0..BISECT_ITERATIONS {
            let mid = 0.5 * (a + b);
            if (f(mid) > 0.0) == positive_at_a {
                a = mid;
            } else {
                b = mid;
            }
        }
        Some(scale.invert_value(0.5 * (a + b)))
    }
}

impl fmt::Debug for SecondaryAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryAxis")
            .field("scale", &self.scale)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SecondaryAxis {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.mapping), Arc::as_ptr(&other.mapping))
            && self.scale == other.scale
            && self.label == other.label
    }
}

/// Fixed styling of a plane surface.
#[derive(Debug, Clone)]
pub struct PlaneProfile {
    /// X axis scale.
    pub x_scale: AxisScale,
    /// Y axis scale.
    pub y_scale: AxisScale,
    /// Reverse the X axis.
    pub x_flip: bool,
    /// Reverse the Y axis.
    pub y_flip: bool,
    /// X axis title.
    pub x_label: Option<String>,
    /// Y axis title.
    pub y_label: Option<String>,
    /// Twin axis along the top edge.
    pub x2: Option<SecondaryAxis>,
    /// Twin axis along the right edge.
    pub y2: Option<SecondaryAxis>,
    /// Mirror unlabelled primary ticks on the opposite edges.
    pub shadow_ticks: bool,
    /// Draw grid lines at major ticks.
    pub grid: bool,
    /// Tick density multiplier for X.
    pub x_crowd: f64,
    /// Tick density multiplier for Y.
    pub y_crowd: f64,
    /// Draw minor ticks.
    pub minor: bool,
    /// Fixed ratio of X to Y pixels per data unit, when set.
    pub xy_factor: Option<f64>,
    /// Grid line colour.
    pub grid_color: Color,
    /// Axis and frame colour.
    pub axis_color: Color,
    /// Plot background colour.
    pub background: Color,
    /// Text metrics and style.
    pub captioner: Arc<dyn Captioner>,
}

impl Default for PlaneProfile {
    fn default() -> Self {
        Self {
            x_scale: AxisScale::Linear,
            y_scale: AxisScale::Linear,
            x_flip: false,
            y_flip: false,
            x_label: None,
            y_label: None,
            x2: None,
            y2: None,
            shadow_ticks: false,
            grid: false,
            x_crowd: 1.0,
            y_crowd: 1.0,
            minor: true,
            xy_factor: None,
            grid_color: Color::GRID_GREY,
            axis_color: Color::BLACK,
            background: Color::WHITE,
            captioner: Arc::new(FixedCaptioner::default()),
        }
    }
}

impl PartialEq for PlaneProfile {
    fn eq(&self, other: &Self) -> bool {
        self.x_scale == other.x_scale
            && self.y_scale == other.y_scale
            && self.x_flip == other.x_flip
            && self.y_flip == other.y_flip
            && self.x_label == other.x_label
            && self.y_label == other.y_label
            && self.x2 == other.x2
            && self.y2 == other.y2
            && self.shadow_ticks == other.shadow_ticks
            && self.grid == other.grid
            && self.x_crowd == other.x_crowd
            && self.y_crowd == other.y_crowd
            && self.minor == other.minor
            && self.xy_factor == other.xy_factor
            && self.grid_color == other.grid_color
            && self.axis_color == other.axis_color
            && self.background == other.background
            && same_captioner(&self.captioner, &other.captioner)
    }
}

/// Pixel bounds with an axis in each direction.
///
/// Shared by the plane and time surfaces. Y runs up the screen unless
/// flipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlaneGeometry {
    pub bounds: ScreenRect,
    pub x_axis: Axis,
    pub y_axis: Axis,
}

impl PlaneGeometry {
    pub fn new(bounds: ScreenRect, x: Range, y: Range, scales: [AxisScale; 2], flips: [bool; 2]) -> Self {
        Self {
            bounds,
            x_axis: Axis::new(bounds.min.x, bounds.max.x, x.min, x.max, scales[0], flips[0]),
            y_axis: Axis::new(bounds.min.y, bounds.max.y, y.min, y.max, scales[1], !flips[1]),
        }
    }

    pub fn data_to_graphics(&self, dpos: &[f64], visible_only: bool) -> Option<ScreenPoint> {
        let (&dx, &dy) = (dpos.first()?, dpos.get(1)?);
        let gp = ScreenPoint::new(self.x_axis.data_to_graphics(dx), self.y_axis.data_to_graphics(dy));
        if visible_only && !self.bounds.contains(gp) {
            return None;
        }
        gp.is_finite().then_some(gp)
    }

    pub fn graphics_to_data(&self, gpos: ScreenPoint) -> Vec<f64> {
        vec![self.x_axis.graphics_to_data(gpos.x), self.y_axis.graphics_to_data(gpos.y)]
    }

    /// Offset of an X data value along the bottom edge.
    pub fn along_x(&self, value: f64) -> f64 {
        self.x_axis.data_to_graphics(value) - self.bounds.min.x
    }

    /// Offset of a Y data value up the left edge.
    pub fn along_y(&self, value: f64) -> f64 {
        self.bounds.max.y - self.y_axis.data_to_graphics(value)
    }

    /// Ranges after dragging from `g0` to `g1`, per-axis enabled by `flags`.
    pub fn pan(&self, g0: ScreenPoint, g1: ScreenPoint, flags: [bool; 2]) -> (Range, Range) {
        let x = if flags[0] {
            self.x_axis
                .data_pan(self.x_axis.graphics_to_data(g0.x), self.x_axis.graphics_to_data(g1.x))
        } else {
            self.x_axis.data_range()
        };
        let y = if flags[1] {
            self.y_axis
                .data_pan(self.y_axis.graphics_to_data(g0.y), self.y_axis.graphics_to_data(g1.y))
        } else {
            self.y_axis.data_range()
        };
        (x, y)
    }

    /// Ranges after zooming about `gpos`; a factor of one leaves an axis alone.
    pub fn zoom(&self, gpos: ScreenPoint, x_factor: f64, y_factor: f64) -> (Range, Range) {
        (
            self.x_axis.data_zoom(self.x_axis.graphics_to_data(gpos.x), x_factor),
            self.y_axis.data_zoom(self.y_axis.graphics_to_data(gpos.y), y_factor),
        )
    }

    /// Ranges putting `dpos` at the middle of the plot.
    pub fn center(&self, dpos: &[f64], flags: [bool; 2]) -> Option<(Range, Range)> {
        let gp = self.data_to_graphics(dpos, false)?;
        Some(self.pan(gp, self.bounds.center(), flags))
    }

    /// Ranges covering a graphics rectangle; tiny rectangles are ignored.
    pub fn zoom_rect(&self, rect: ScreenRect) -> Option<(Range, Range)> {
        if rect.width().abs() < 2.0 || rect.height().abs() < 2.0 {
            return None;
        }
        let lo = self.graphics_to_data(rect.min);
        let hi = self.graphics_to_data(rect.max);
        Some((Range::new(lo[0], hi[0]), Range::new(lo[1], hi[1])))
    }

    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        let b = self.bounds;
        let (x, y) = (self.x_axis.data_range(), self.y_axis.data_range());
        hash_f64s(state, &[b.min.x, b.min.y, b.max.x, b.max.y, x.min, x.max, y.min, y.max]);
        self.x_axis.scale().hash(state);
        self.y_axis.scale().hash(state);
        self.x_axis.is_flipped().hash(state);
        self.y_axis.is_flipped().hash(state);
    }
}

/// Check a range is usable on an axis before building a surface.
pub(crate) fn check_range(axis: &'static str, range: Range, scale: AxisScale) -> Result<(), SurfaceError> {
    if !range.is_finite() || !(range.span() > 0.0) {
        return Err(SurfaceError::NoRange { axis });
    }
    if scale.is_log() && range.min <= 0.0 {
        return Err(SurfaceError::NonPositiveLog {
            axis,
            lo: range.min,
            hi: range.max,
        });
    }
    Ok(())
}

pub(crate) fn check_bounds(bounds: ScreenRect) -> Result<(), SurfaceError> {
    if bounds.is_valid() {
        Ok(())
    } else {
        Err(SurfaceError::EmptyBounds {
            width: bounds.width(),
            height: bounds.height(),
        })
    }
}

/// Widen one of the ranges so that the X:Y pixels-per-unit ratio is `factor`.
pub(crate) fn lock_aspect(bounds: ScreenRect, x: Range, y: Range, factor: f64, log: bool) -> (Range, Range) {
    let extent = |r: Range| if log { (r.max / r.min).ln() } else { r.span() };
    let (gx, gy) = (bounds.width(), bounds.height());
    let (dx, dy) = (extent(x), extent(y));
    let fadj = factor * (gy / dy) / (gx / dx);
    let widen = |r: Range, d: f64| {
        if log {
            Range::new(r.min * (-0.5 * d).exp(), r.max * (0.5 * d).exp())
        } else {
            Range::new(r.min - 0.5 * d, r.max + 0.5 * d)
        }
    };
    if fadj > 1.0 {
        (x, widen(y, dy * (fadj - 1.0)))
    } else {
        (widen(x, dx * (1.0 / fadj - 1.0)), y)
    }
}

/// Cartesian surface with linear or logarithmic axes.
#[derive(Debug, Clone)]
pub struct PlaneSurface {
    geom: PlaneGeometry,
    profile: PlaneProfile,
    x_ticks: Vec<Tick>,
    y_ticks: Vec<Tick>,
    x2_ticks: Option<Vec<Tick>>,
    y2_ticks: Option<Vec<Tick>>,
}

impl PlaneSurface {
    /// Build a surface for the given bounds, profile and view.
    pub fn new(bounds: ScreenRect, profile: &PlaneProfile, aspect: &PlaneAspect) -> Result<Self, SurfaceError> {
        check_bounds(bounds)?;
        check_range("x", aspect.x, profile.x_scale)?;
        check_range("y", aspect.y, profile.y_scale)?;
        let (x, y) = match profile.xy_factor {
            Some(factor) if factor > 0.0 && profile.x_scale.is_log() == profile.y_scale.is_log() => {
                lock_aspect(bounds, aspect.x, aspect.y, factor, profile.x_scale.is_log())
            }
            _ => (aspect.x, aspect.y),
        };
        let geom = PlaneGeometry::new(
            bounds,
            x,
            y,
            [profile.x_scale, profile.y_scale],
            [profile.x_flip, profile.y_flip],
        );
        let captioner = profile.captioner.as_ref();
        let (npx, npy) = (bounds.width() as u32, bounds.height() as u32);
        let x_ticks = BasicTicker::for_scale(profile.x_scale)
            .get_ticks(x.min, x.max, profile.minor, captioner, &[Orientation::X], npx, profile.x_crowd)
            .ticks;
        let y_ticks = BasicTicker::for_scale(profile.y_scale)
            .get_ticks(y.min, y.max, profile.minor, captioner, &[Orientation::Y], npy, profile.y_crowd)
            .ticks;
        let x2_ticks = profile.x2.as_ref().map(|sec| {
            sec.ticks(&geom.x_axis, npx, profile.x_crowd, profile.minor, captioner, Orientation::X)
        });
        let y2_ticks = profile.y2.as_ref().map(|sec| {
            sec.ticks(&geom.y_axis, npy, profile.y_crowd, profile.minor, captioner, Orientation::Y)
        });
        Ok(Self {
            geom,
            profile: profile.clone(),
            x_ticks,
            y_ticks,
            x2_ticks,
            y2_ticks,
        })
    }

    /// Profile this surface was built with.
    pub fn profile(&self) -> &PlaneProfile {
        &self.profile
    }

    /// Ranges actually displayed, after any aspect lock.
    pub fn aspect(&self) -> PlaneAspect {
        PlaneAspect {
            x: self.geom.x_axis.data_range(),
            y: self.geom.y_axis.data_range(),
        }
    }

    /// X axis.
    pub fn x_axis(&self) -> &Axis {
        &self.geom.x_axis
    }

    /// Y axis.
    pub fn y_axis(&self) -> &Axis {
        &self.geom.y_axis
    }

    /// Ticks along X, majors then minors.
    pub fn x_ticks(&self) -> &[Tick] {
        &self.x_ticks
    }

    /// Ticks along Y, majors then minors.
    pub fn y_ticks(&self) -> &[Tick] {
        &self.y_ticks
    }

    /// Secondary X ticks, placed at primary data values.
    pub fn x2_ticks(&self) -> Option<&[Tick]> {
        self.x2_ticks.as_deref()
    }

    /// Secondary Y ticks, placed at primary data values.
    pub fn y2_ticks(&self) -> Option<&[Tick]> {
        self.y2_ticks.as_deref()
    }

    /// View after dragging from `g0` to `g1`.
    pub fn pan(&self, g0: ScreenPoint, g1: ScreenPoint, x_flag: bool, y_flag: bool) -> PlaneAspect {
        let (x, y) = self.geom.pan(g0, g1, [x_flag, y_flag]);
        PlaneAspect { x, y }
    }

    /// View after zooming about `gpos` by per-axis factors.
    pub fn zoom(&self, gpos: ScreenPoint, x_factor: f64, y_factor: f64) -> PlaneAspect {
        let (x, y) = self.geom.zoom(gpos, x_factor, y_factor);
        PlaneAspect { x, y }
    }

    /// View centred on `dpos`.
    pub fn center(&self, dpos: &[f64], x_flag: bool, y_flag: bool) -> Option<PlaneAspect> {
        let (x, y) = self.geom.center(dpos, [x_flag, y_flag])?;
        Some(PlaneAspect { x, y })
    }

    /// View centred on `dpos` and zoomed by `factor`.
    pub fn reframe(&self, dpos: &[f64], factor: f64) -> Option<PlaneAspect> {
        let centred = self.center(dpos, true, true)?;
        let (dx, dy) = (*dpos.first()?, *dpos.get(1)?);
        Some(PlaneAspect {
            x: Axis::zoom_range(centred.x.min, centred.x.max, dx, factor, self.profile.x_scale.is_log()),
            y: Axis::zoom_range(centred.y.min, centred.y.max, dy, factor, self.profile.y_scale.is_log()),
        })
    }

    /// View covering a dragged-out graphics rectangle.
    pub fn zoom_rect(&self, rect: ScreenRect) -> Option<PlaneAspect> {
        let (x, y) = self.geom.zoom_rect(rect)?;
        Some(PlaneAspect { x, y })
    }

    fn edges(&self) -> Vec<Edge<'_>> {
        let bounds = self.geom.bounds;
        let captioner = self.profile.captioner.as_ref();
        let mut edges = vec![
            Edge {
                annotation: AxisAnnotation::bottom(bounds, captioner),
                ticks: Cow::Borrowed(self.x_ticks.as_slice()),
                vertical: false,
                title: self.profile.x_label.as_deref(),
            },
            Edge {
                annotation: AxisAnnotation::left(bounds, captioner),
                ticks: Cow::Borrowed(self.y_ticks.as_slice()),
                vertical: true,
                title: self.profile.y_label.as_deref(),
            },
        ];
        let top = match &self.x2_ticks {
            Some(ticks) => Some((Cow::Borrowed(ticks.as_slice()), self.profile.x2.as_ref().and_then(SecondaryAxis::label))),
            None if self.profile.shadow_ticks => Some((Cow::Owned(shadow(&self.x_ticks)), None)),
            None => None,
        };
        if let Some((ticks, title)) = top {
            edges.push(Edge {
                annotation: AxisAnnotation::top(bounds, captioner),
                ticks,
                vertical: false,
                title,
            });
        }
        let right = match &self.y2_ticks {
            Some(ticks) => Some((Cow::Borrowed(ticks.as_slice()), self.profile.y2.as_ref().and_then(SecondaryAxis::label))),
            None if self.profile.shadow_ticks => Some((Cow::Owned(shadow(&self.y_ticks)), None)),
            None => None,
        };
        if let Some((ticks, title)) = right {
            edges.push(Edge {
                annotation: AxisAnnotation::right(bounds, captioner),
                ticks,
                vertical: true,
                title,
            });
        }
        edges
    }

    fn along(&self, vertical: bool) -> impl Fn(f64) -> f64 + '_ {
        move |v| if vertical { self.geom.along_y(v) } else { self.geom.along_x(v) }
    }
}

/// Annotation for one edge of the plot.
struct Edge<'a> {
    annotation: AxisAnnotation<'a>,
    ticks: Cow<'a, [Tick]>,
    vertical: bool,
    title: Option<&'a str>,
}

/// Unlabelled copies of `ticks`.
fn shadow(ticks: &[Tick]) -> Vec<Tick> {
    ticks.iter().map(|t| Tick::minor(t.value)).collect()
}

impl Surface for PlaneSurface {
    fn plot_bounds(&self) -> ScreenRect {
        self.geom.bounds
    }

    fn plot_insets(&self) -> Insets {
        let boxes: Vec<_> = self
            .edges()
            .iter()
            .flat_map(|edge| edge.annotation.label_boxes(&edge.ticks, &self.along(edge.vertical), edge.title))
            .collect();
        let insets = insets_for(self.geom.bounds, &boxes);
        Insets::new(insets.top, insets.left + 2.0, insets.bottom + 2.0, insets.right)
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn data_to_graphics(&self, dpos: &[f64], visible_only: bool) -> Option<ScreenPoint> {
        self.geom.data_to_graphics(dpos, visible_only)
    }

    fn graphics_to_data(&self, gpos: ScreenPoint, _positions: Option<&dyn PositionSupplier>) -> Option<Vec<f64>> {
        Some(self.geom.graphics_to_data(gpos))
    }

    fn format_position(&self, dpos: &[f64]) -> String {
        match (dpos.first(), dpos.get(1)) {
            (Some(&x), Some(&y)) => format!(
                "{}, {}",
                format_axis_value(&self.geom.x_axis, x),
                format_axis_value(&self.geom.y_axis, y)
            ),
            _ => String::new(),
        }
    }

    fn paint_background(&self, out: &mut RenderList) {
        let bounds = self.geom.bounds;
        out.push(RenderCommand::Rect {
            rect: bounds,
            style: FillStyle::solid(self.profile.background),
        });
        if self.profile.grid {
            let mut lines = Vec::new();
            for tick in self.x_ticks.iter().filter(|t| t.is_major()) {
                let gx = self.geom.x_axis.data_to_graphics(tick.value);
                lines.push(LineSegment::new(ScreenPoint::new(gx, bounds.min.y), ScreenPoint::new(gx, bounds.max.y)));
            }
            for tick in self.y_ticks.iter().filter(|t| t.is_major()) {
                let gy = self.geom.y_axis.data_to_graphics(tick.value);
                lines.push(LineSegment::new(ScreenPoint::new(bounds.min.x, gy), ScreenPoint::new(bounds.max.x, gy)));
            }
            out.segments(clip_segments(&lines, bounds), LineStyle::thin(self.profile.grid_color));
        }
    }

    fn paint_foreground(&self, out: &mut RenderList) {
        let style = LineStyle::thin(self.profile.axis_color);
        for edge in self.edges() {
            edge.annotation
                .draw(&edge.ticks, &self.along(edge.vertical), edge.title, style, out);
        }
        out.push(RenderCommand::Rect {
            rect: self.geom.bounds,
            style: FillStyle {
                fill: Color::TRANSPARENT,
                stroke: self.profile.axis_color,
                stroke_width: 1.0,
            },
        });
    }

    fn captioner(&self) -> &dyn Captioner {
        self.profile.captioner.as_ref()
    }
}

impl PartialEq for PlaneSurface {
    fn eq(&self, other: &Self) -> bool {
        self.geom == other.geom
            && self.profile == other.profile
            && self.x_ticks == other.x_ticks
            && self.y_ticks == other.y_ticks
            && self.x2_ticks == other.x2_ticks
            && self.y2_ticks == other.y2_ticks
    }
}

impl Hash for PlaneSurface {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.geom.hash_into(state);
        for tick in self.x_ticks.iter().chain(&self.y_ticks) {
            tick.hash_into(state);
        }
        self.profile.x_label.hash(state);
        self.profile.y_label.hash(state);
        self.profile.grid.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(profile: &PlaneProfile) -> PlaneSurface {
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 400.0, 300.0);
        PlaneSurface::new(bounds, profile, &PlaneAspect::new(0.0, 10.0, 0.0, 100.0)).expect("valid surface")
    }

    #[test]
    fn center_and_origin_map_as_expected() {
        let s = surface(&PlaneProfile::default());
        assert_eq!(s.data_to_graphics(&[5.0, 50.0], false), Some(ScreenPoint::new(200.0, 150.0)));
        assert_eq!(s.data_to_graphics(&[0.0, 0.0], false), Some(ScreenPoint::new(0.0, 300.0)));
        // bottom edge is outside the half-open bounds
        assert_eq!(s.data_to_graphics(&[0.0, 0.0], true), None);
        assert_eq!(s.data_to_graphics(&[20.0, 50.0], true), None);
    }

    #[test]
    fn graphics_roundtrip() {
        let s = surface(&PlaneProfile::default());
        for &(x, y) in &[(1.5, 3.0), (9.9, 97.0), (0.1, 50.5)] {
            let gp = s.data_to_graphics(&[x, y], true).expect("visible");
            let d = s.graphics_to_data(gp, None).expect("invertible");
            assert!((d[0] - x).abs() < 1e-9 && (d[1] - y).abs() < 1e-9);
        }
    }

    #[test]
    fn log_axis_rejects_nonpositive() {
        let profile = PlaneProfile {
            y_scale: AxisScale::Log,
            ..PlaneProfile::default()
        };
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 400.0, 300.0);
        let err = PlaneSurface::new(bounds, &profile, &PlaneAspect::new(0.0, 1.0, 0.0, 10.0));
        assert!(matches!(err, Err(SurfaceError::NonPositiveLog { axis: "y", .. })));
        let empty = ScreenRect::from_origin_size(0.0, 0.0, 0.0, 300.0);
        assert!(matches!(
            PlaneSurface::new(empty, &PlaneProfile::default(), &PlaneAspect::new(0.0, 1.0, 0.0, 1.0)),
            Err(SurfaceError::EmptyBounds { .. })
        ));
    }

    #[test]
    fn aspect_lock_equalises_scales() {
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 400.0, 300.0);
        let (x, y) = lock_aspect(bounds, Range::new(0.0, 10.0), Range::new(0.0, 10.0), 1.0, false);
        assert_eq!(y, Range::new(0.0, 10.0));
        assert!(((400.0 / x.span()) - (300.0 / y.span())).abs() < 1e-9);
        assert!((x.min + x.max - 10.0).abs() < 1e-9);
    }

    #[test]
    fn pan_and_zoom_gestures() {
        let s = surface(&PlaneProfile::default());
        let panned = s.pan(ScreenPoint::new(200.0, 150.0), ScreenPoint::new(240.0, 150.0), true, true);
        assert!((panned.x.min + 1.0).abs() < 1e-9);
        assert!((panned.y.min).abs() < 1e-9);
        let zoomed = s.zoom(ScreenPoint::new(200.0, 150.0), 2.0, 1.0);
        assert!((zoomed.x.min - 2.5).abs() < 1e-9 && (zoomed.x.max - 7.5).abs() < 1e-9);
        assert_eq!(zoomed.y, Range::new(0.0, 100.0));
        let centred = s.center(&[2.0, 20.0], true, false).expect("mappable");
        assert!((centred.x.min + 3.0).abs() < 1e-9);
        assert_eq!(centred.y, Range::new(0.0, 100.0));
    }

    #[test]
    fn secondary_ticks_land_on_mapped_values() {
        let profile = PlaneProfile {
            x2: Some(SecondaryAxis::new(|x| x * 1000.0)),
            ..PlaneProfile::default()
        };
        let s = surface(&profile);
        let ticks = s.x2_ticks().expect("secondary ticks");
        let majors: Vec<_> = ticks.iter().filter(|t| t.is_major()).collect();
        assert!(majors.len() >= 2);
        let two = majors
            .iter()
            .find(|t| t.label.as_deref() == Some("2000"))
            .expect("2000 labelled");
        assert!((two.value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn foreground_draws_frame_and_labels() {
        let s = surface(&PlaneProfile {
            x_label: Some("X".to_owned()),
            ..PlaneProfile::default()
        });
        let mut out = RenderList::new();
        s.paint_foreground(&mut out);
        let texts = out
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::Text { .. }))
            .count();
        assert!(texts > 4);
        let insets = s.plot_insets();
        assert!(insets.bottom > 14.0 && insets.left > 0.0);
    }

    #[test]
    fn equal_surfaces_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        let profile = PlaneProfile::default();
        let (a, b) = (surface(&profile), surface(&profile));
        assert_eq!(a, b);
        let hash = |s: &PlaneSurface| {
            let mut h = DefaultHasher::new();
            s.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }
}
