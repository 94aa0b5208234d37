//! Surface with a horizontal time axis and a vertical data axis.

use std::borrow::Cow;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::plane::{PlaneGeometry, SecondaryAxis, check_bounds, check_range};
use super::{AxisAnnotation, PositionSupplier, Surface, format_axis_value, insets_for, same_captioner};
use crate::axis::{Axis, AxisScale};
use crate::captioner::{Captioner, FixedCaptioner, Orientation};
use crate::error::SurfaceError;
use crate::geom::{Insets, ScreenPoint, ScreenRect};
use crate::range::Range;
use crate::render::{
    Color, FillStyle, LineSegment, LineStyle, RenderCommand, RenderList, clip_segments,
};
use crate::tick::time::TimeFormat;
use crate::tick::{BasicTicker, Tick, Ticker};

/// Current view of a time surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAspect {
    /// Visible time range in Unix seconds.
    pub t: Range,
    /// Visible Y range.
    pub y: Range,
}

impl TimeAspect {
    /// Create an aspect from its limits, times in Unix seconds.
    pub fn new(tmin: f64, tmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            t: Range::new(tmin, tmax),
            y: Range::new(ymin, ymax),
        }
    }
}

/// Fixed styling of a time surface.
#[derive(Debug, Clone)]
pub struct TimeProfile {
    /// Y axis scale.
    pub y_scale: AxisScale,
    /// Reverse the Y axis.
    pub y_flip: bool,
    /// Time axis title.
    pub t_label: Option<String>,
    /// Y axis title.
    pub y_label: Option<String>,
    /// Twin axis along the right edge.
    pub y2: Option<SecondaryAxis>,
    /// Labels and ticks for the time axis.
    pub t_format: TimeFormat,
    /// Mirror unlabelled primary ticks on the opposite edges.
    pub shadow_ticks: bool,
    /// Draw grid lines at major ticks.
    pub grid: bool,
    /// Tick density multiplier for time.
    pub t_crowd: f64,
    /// Tick density multiplier for Y.
    pub y_crowd: f64,
    /// Draw minor ticks.
    pub minor: bool,
    /// Grid line colour.
    pub grid_color: Color,
    /// Axis and frame colour.
    pub axis_color: Color,
    /// Plot background colour.
    pub background: Color,
    /// Text metrics and style.
    pub captioner: Arc<dyn Captioner>,
}

impl Default for TimeProfile {
    fn default() -> Self {
        Self {
            y_scale: AxisScale::Linear,
            y_flip: false,
            t_label: None,
            y_label: None,
            y2: None,
            t_format: TimeFormat::default(),
            shadow_ticks: false,
            grid: false,
            t_crowd: 1.0,
            y_crowd: 1.0,
            minor: true,
            grid_color: Color::GRID_GREY,
            axis_color: Color::BLACK,
            background: Color::WHITE,
            captioner: Arc::new(FixedCaptioner::default()),
        }
    }
}

impl PartialEq for TimeProfile {
    fn eq(&self, other: &Self) -> bool {
        self.y_scale == other.y_scale
            && self.y_flip == other.y_flip
            && self.t_label == other.t_label
            && self.y_label == other.y_label
            && self.y2 == other.y2
            && self.t_format == other.t_format
            && self.shadow_ticks == other.shadow_ticks
            && self.grid == other.grid
            && self.t_crowd == other.t_crowd
            && self.y_crowd == other.y_crowd
            && self.minor == other.minor
            && self.grid_color == other.grid_color
            && self.axis_color == other.axis_color
            && self.background == other.background
            && same_captioner(&self.captioner, &other.captioner)
    }
}

/// Time series surface: Unix seconds along X, a linear or log axis up Y.
#[derive(Debug, Clone)]
pub struct TimeSurface {
    geom: PlaneGeometry,
    profile: TimeProfile,
    t_ticks: Vec<Tick>,
    y_ticks: Vec<Tick>,
    y2_ticks: Option<Vec<Tick>>,
}

impl TimeSurface {
    /// Build a surface for the given bounds, profile and view.
    pub fn new(bounds: ScreenRect, profile: &TimeProfile, aspect: &TimeAspect) -> Result<Self, SurfaceError> {
        check_bounds(bounds)?;
        check_range("t", aspect.t, AxisScale::Time)?;
        check_range("y", aspect.y, profile.y_scale)?;
        let geom = PlaneGeometry::new(
            bounds,
            aspect.t,
            aspect.y,
            [AxisScale::Time, profile.y_scale],
            [false, profile.y_flip],
        );
        let captioner = profile.captioner.as_ref();
        let (npx, npy) = (bounds.width() as u32, bounds.height() as u32);
        let t_ticks = profile
            .t_format
            .get_ticks(aspect.t.min, aspect.t.max, profile.minor, captioner, &[Orientation::X], npx, profile.t_crowd)
            .ticks;
        let y_ticks = BasicTicker::for_scale(profile.y_scale)
            .get_ticks(aspect.y.min, aspect.y.max, profile.minor, captioner, &[Orientation::Y], npy, profile.y_crowd)
            .ticks;
        let y2_ticks = profile.y2.as_ref().map(|sec| {
            sec.ticks(&geom.y_axis, npy, profile.y_crowd, profile.minor, captioner, Orientation::Y)
        });
        Ok(Self {
            geom,
            profile: profile.clone(),
            t_ticks,
            y_ticks,
            y2_ticks,
        })
    }

    /// Profile this surface was built with.
    pub fn profile(&self) -> &TimeProfile {
        &self.profile
    }

    /// Ranges displayed.
    pub fn aspect(&self) -> TimeAspect {
        TimeAspect {
            t: self.geom.x_axis.data_range(),
            y: self.geom.y_axis.data_range(),
        }
    }

    /// Time axis.
    pub fn t_axis(&self) -> &Axis {
        &self.geom.x_axis
    }

    /// Y axis.
    pub fn y_axis(&self) -> &Axis {
        &self.geom.y_axis
    }

    /// Ticks along the time axis, majors then minors.
    pub fn t_ticks(&self) -> &[Tick] {
        &self.t_ticks
    }

    /// Ticks along Y, majors then minors.
    pub fn y_ticks(&self) -> &[Tick] {
        &self.y_ticks
    }

    /// View after dragging from `g0` to `g1`.
    pub fn pan(&self, g0: ScreenPoint, g1: ScreenPoint, t_flag: bool, y_flag: bool) -> TimeAspect {
        let (t, y) = self.geom.pan(g0, g1, [t_flag, y_flag]);
        TimeAspect { t, y }
    }

    /// View after zooming about `gpos` by per-axis factors.
    pub fn zoom(&self, gpos: ScreenPoint, t_factor: f64, y_factor: f64) -> TimeAspect {
        let (t, y) = self.geom.zoom(gpos, t_factor, y_factor);
        TimeAspect { t, y }
    }

    /// View centred on `dpos`.
    pub fn center(&self, dpos: &[f64], t_flag: bool, y_flag: bool) -> Option<TimeAspect> {
        let (t, y) = self.geom.center(dpos, [t_flag, y_flag])?;
        Some(TimeAspect { t, y })
    }

    /// View centred on `dpos` and zoomed by `factor`.
    pub fn reframe(&self, dpos: &[f64], factor: f64) -> Option<TimeAspect> {
        let centred = self.center(dpos, true, true)?;
        let (dt, dy) = (*dpos.first()?, *dpos.get(1)?);
        Some(TimeAspect {
            t: Axis::zoom_range(centred.t.min, centred.t.max, dt, factor, false),
            y: Axis::zoom_range(centred.y.min, centred.y.max, dy, factor, self.profile.y_scale.is_log()),
        })
    }

    /// View covering a dragged-out graphics rectangle.
    pub fn zoom_rect(&self, rect: ScreenRect) -> Option<TimeAspect> {
        let (t, y) = self.geom.zoom_rect(rect)?;
        Some(TimeAspect { t, y })
    }

    fn edges(&self) -> Vec<(AxisAnnotation<'_>, Cow<'_, [Tick]>, bool, Option<&str>)> {
        let bounds = self.geom.bounds;
        let captioner = self.profile.captioner.as_ref();
        let mut edges = vec![
            (
                AxisAnnotation::bottom(bounds, captioner),
                Cow::Borrowed(self.t_ticks.as_slice()),
                false,
                self.profile.t_label.as_deref(),
            ),
            (
                AxisAnnotation::left(bounds, captioner),
                Cow::Borrowed(self.y_ticks.as_slice()),
                true,
                self.profile.y_label.as_deref(),
            ),
        ];
        if self.profile.shadow_ticks {
            edges.push((
                AxisAnnotation::top(bounds, captioner),
                Cow::Owned(self.t_ticks.iter().map(|t| Tick::minor(t.value)).collect()),
                false,
                None,
            ));
        }
        match &self.y2_ticks {
            Some(ticks) => edges.push((
                AxisAnnotation::right(bounds, captioner),
                Cow::Borrowed(ticks.as_slice()),
                true,
                self.profile.y2.as_ref().and_then(SecondaryAxis::label),
            )),
            None if self.profile.shadow_ticks => edges.push((
                AxisAnnotation::right(bounds, captioner),
                Cow::Owned(self.y_ticks.iter().map(|t| Tick::minor(t.value)).collect()),
                true,
                None,
            )),
            None => {}
        }
        edges
    }

    fn along(&self, vertical: bool) -> impl Fn(f64) -> f64 + '_ {
        move |v| if vertical { self.geom.along_y(v) } else { self.geom.along_x(v) }
    }
}

impl Surface for TimeSurface {
    fn plot_bounds(&self) -> ScreenRect {
        self.geom.bounds
    }

    fn plot_insets(&self) -> Insets {
        let boxes: Vec<_> = self
            .edges()
            .iter()
            .flat_map(|(annotation, ticks, vertical, title)| {
                annotation.label_boxes(ticks, &self.along(*vertical), *title)
            })
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
        let (Some(&t), Some(&y)) = (dpos.first(), dpos.get(1)) else {
            return String::new();
        };
        let axis = &self.geom.x_axis;
        let sec_precision = (axis.graphics_to_data(axis.data_to_graphics(t) + 1.0) - t).abs();
        format!(
            "{}, {}",
            self.profile.t_format.format_time(t, sec_precision),
            format_axis_value(&self.geom.y_axis, y)
        )
    }

    fn paint_background(&self, out: &mut RenderList) {
        let bounds = self.geom.bounds;
        out.push(RenderCommand::Rect {
            rect: bounds,
            style: FillStyle::solid(self.profile.background),
        });
        if self.profile.grid {
            let verticals = self.t_ticks.iter().filter(|t| t.is_major()).map(|tick| {
                let gx = self.geom.x_axis.data_to_graphics(tick.value);
                LineSegment::new(ScreenPoint::new(gx, bounds.min.y), ScreenPoint::new(gx, bounds.max.y))
            });
            let horizontals = self.y_ticks.iter().filter(|t| t.is_major()).map(|tick| {
                let gy = self.geom.y_axis.data_to_graphics(tick.value);
                LineSegment::new(ScreenPoint::new(bounds.min.x, gy), ScreenPoint::new(bounds.max.x, gy))
            });
            let lines: Vec<_> = verticals.chain(horizontals).collect();
            out.segments(clip_segments(&lines, bounds), LineStyle::thin(self.profile.grid_color));
        }
    }

    fn paint_foreground(&self, out: &mut RenderList) {
        let style = LineStyle::thin(self.profile.axis_color);
        for (annotation, ticks, vertical, title) in self.edges() {
            annotation.draw(&ticks, &self.along(vertical), title, style, out);
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

impl PartialEq for TimeSurface {
    fn eq(&self, other: &Self) -> bool {
        self.geom == other.geom
            && self.profile == other.profile
            && self.t_ticks == other.t_ticks
            && self.y_ticks == other.y_ticks
            && self.y2_ticks == other.y2_ticks
    }
}

impl Hash for TimeSurface {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.geom.hash_into(state);
        for tick in self.t_ticks.iter().chain(&self.y_ticks) {
            tick.hash_into(state);
        }
        self.profile.t_format.hash(state);
        self.profile.grid.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2020-01-01T00:00:00Z
    const JAN_2020: f64 = 1_577_836_800.0;

    fn surface(profile: &TimeProfile) -> TimeSurface {
        let bounds = ScreenRect::from_origin_size(50.0, 10.0, 600.0, 300.0);
        let aspect = TimeAspect::new(JAN_2020, JAN_2020 + 366.0 * 86400.0, 0.0, 1.0);
        TimeSurface::new(bounds, profile, &aspect).expect("valid surface")
    }

    #[test]
    fn time_roundtrip() {
        let s = surface(&TimeProfile::default());
        let t = JAN_2020 + 100.0 * 86400.0;
        let gp = s.data_to_graphics(&[t, 0.25], true).expect("visible");
        let d = s.graphics_to_data(gp, None).expect("invertible");
        assert!((d[0] - t).abs() < 1e-3);
        assert!((d[1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn year_of_ticks_has_date_labels() {
        let s = surface(&TimeProfile::default());
        let labels: Vec<_> = s.t_ticks().iter().filter_map(|t| t.label.as_deref()).collect();
        assert!(labels.len() >= 2);
        assert!(labels[0].starts_with("2020-"), "{}", labels[0]);
        assert!(s.t_ticks().windows(2).all(|w| !w[1].is_major() || w[0].value < w[1].value));
    }

    #[test]
    fn position_uses_time_format() {
        let iso = surface(&TimeProfile::default());
        let text = iso.format_position(&[JAN_2020 + 0.5 * 86400.0, 0.5]);
        assert!(text.starts_with("2020-01-01T"), "{text}");
        let mjd = surface(&TimeProfile {
            t_format: TimeFormat::Mjd,
            ..TimeProfile::default()
        });
        let text = mjd.format_position(&[JAN_2020, 0.5]);
        assert!(text.starts_with("58849"), "{text}");
    }

    #[test]
    fn time_only_zoom_keeps_y() {
        let s = surface(&TimeProfile::default());
        let zoomed = s.zoom(s.plot_bounds().center(), 2.0, 1.0);
        assert_eq!(zoomed.y, Range::new(0.0, 1.0));
        assert!((zoomed.t.span() - 183.0 * 86400.0).abs() < 1.0);
    }

    #[test]
    fn empty_time_range_is_rejected() {
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 100.0, 100.0);
        let aspect = TimeAspect::new(JAN_2020, JAN_2020, 0.0, 1.0);
        assert!(matches!(
            TimeSurface::new(bounds, &TimeProfile::default(), &aspect),
            Err(SurfaceError::NoRange { axis: "t" })
        ));
    }
}
