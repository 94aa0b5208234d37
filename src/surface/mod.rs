//! Plotting surfaces: the data to graphics transform contract.
//!
//! A surface is an immutable combination of device bounds, a profile (fixed
//! style) and an aspect (current view). It is rebuilt whenever either
//! changes; navigation gestures return new aspects rather than mutating.

pub mod cube;
pub mod plane;
pub mod sky;
pub mod time;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::axis::Axis;
use crate::captioner::{CaptionBounds, Captioner, Orientation};
use crate::geom::{Affine, Insets, ScreenPoint, ScreenRect};
use crate::render::{LineSegment, LineStyle, RenderList};
use crate::tick::Tick;

pub use cube::{Corner, CubeAspect, CubeProfile, CubeSurface};
pub use plane::{PlaneAspect, PlaneProfile, PlaneSurface, SecondaryAxis};
pub use sky::{SkyAspect, SkyFov, SkyProfile, SkySurface};
pub use time::{TimeAspect, TimeProfile, TimeSurface};

/// Number of positions handed out per chunk by slice suppliers.
pub const POSITION_CHUNK: usize = 4096;

/// Repeatable, chunked source of data positions.
///
/// Chunks may be visited in any order and from several threads.
pub trait PositionSupplier: Sync {
    /// Number of chunks.
    fn chunk_count(&self) -> usize;

    /// Call `f` with every position of chunk `index`.
    fn for_each_in_chunk(&self, index: usize, f: &mut dyn FnMut(&[f64]));
}

fn slice_chunk_count<const N: usize>(positions: &[[f64; N]]) -> usize {
    positions.len().div_ceil(POSITION_CHUNK)
}

fn for_each_in_slice_chunk<const N: usize>(positions: &[[f64; N]], index: usize, f: &mut dyn FnMut(&[f64])) {
    let start = index * POSITION_CHUNK;
    let end = (start + POSITION_CHUNK).min(positions.len());
    for pos in positions.get(start..end).unwrap_or(&[]) {
        f(pos);
    }
}

impl<const N: usize> PositionSupplier for Vec<[f64; N]> {
    fn chunk_count(&self) -> usize {
        slice_chunk_count(self.as_slice())
    }

    fn for_each_in_chunk(&self, index: usize, f: &mut dyn FnMut(&[f64])) {
        for_each_in_slice_chunk(self.as_slice(), index, f);
    }
}

impl<const N: usize> PositionSupplier for &[[f64; N]] {
    fn chunk_count(&self) -> usize {
        slice_chunk_count(*self)
    }

    fn for_each_in_chunk(&self, index: usize, f: &mut dyn FnMut(&[f64])) {
        for_each_in_slice_chunk(*self, index, f);
    }
}

/// Data to graphics transform and decoration painter for one plot.
pub trait Surface: fmt::Debug {
    /// Rectangle within which data is plotted.
    fn plot_bounds(&self) -> ScreenRect;

    /// Space needed outside the plot bounds for axis annotation.
    fn plot_insets(&self) -> Insets;

    /// Number of data coordinates per position.
    fn dimensions(&self) -> usize;

    /// Map a data position to graphics space.
    ///
    /// With `visible_only` set, positions outside the plot bounds give
    /// `None`; otherwise `None` means the position cannot be mapped at all.
    fn data_to_graphics(&self, dpos: &[f64], visible_only: bool) -> Option<ScreenPoint>;

    /// Map `dpos1` given that nearby `dpos0` is already plotted at `gpos0`.
    ///
    /// Surfaces with discontinuities use this to keep `dpos1` on the same
    /// side of a seam as its neighbour.
    fn data_to_graphics_offset(
        &self,
        _dpos0: &[f64],
        _gpos0: ScreenPoint,
        dpos1: &[f64],
        visible_only: bool,
    ) -> Option<ScreenPoint> {
        self.data_to_graphics(dpos1, visible_only)
    }

    /// Map a graphics position back to data space.
    ///
    /// Where the inverse is underdetermined, `positions` may be supplied so
    /// that nearby plotted points can pin down the answer.
    fn graphics_to_data(
        &self,
        gpos: ScreenPoint,
        positions: Option<&dyn PositionSupplier>,
    ) -> Option<Vec<f64>>;

    /// Whether a line between two data positions is drawn unbroken.
    fn is_continuous_line(&self, _dpos0: &[f64], _dpos1: &[f64]) -> bool {
        true
    }

    /// Human-readable position, to a precision matched to the pixel size.
    fn format_position(&self, dpos: &[f64]) -> String;

    /// Paint anything that goes behind the data.
    fn paint_background(&self, out: &mut RenderList);

    /// Paint anything that goes in front of the data.
    fn paint_foreground(&self, out: &mut RenderList);

    /// Text metrics used for annotation.
    fn captioner(&self) -> &dyn Captioner;
}

pub(crate) fn hash_f64s<H: Hasher>(state: &mut H, values: &[f64]) {
    for value in values {
        value.to_bits().hash(state);
    }
}

pub(crate) fn same_captioner(a: &Arc<dyn Captioner>, b: &Arc<dyn Captioner>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Position on one axis formatted to about one pixel's precision.
pub(crate) fn format_axis_value(axis: &Axis, value: f64) -> String {
    let dp2 = axis.graphics_to_data(axis.data_to_graphics(value) + 2.0);
    let prec = (dp2 - value).abs() * 0.5;
    let aval = value.abs();
    if value == 0.0 {
        return "0".to_owned();
    }
    if !prec.is_finite() || !value.is_finite() || prec == 0.0 {
        return format!("{value}");
    }
    if aval >= 1e6 || aval <= 1e-4 {
        let nsf = (-(prec / aval).log10()).round().clamp(0.0, 16.0) as usize;
        exponent_format(value, nsf)
    } else if prec >= 0.9 {
        format!("{}", value.round() as i64)
    } else {
        let ndp = (-prec.log10()).max(0.0).round().min(16.0) as usize;
        if ndp == 0 {
            format!("{}", value.round() as i64)
        } else {
            format!("{value:.ndp$}")
        }
    }
}

/// `d.dddEn` with at most `max_frac` fraction digits and no trailing zeros.
pub(crate) fn exponent_format(value: f64, max_frac: usize) -> String {
    let text = format!("{value:.max_frac$e}");
    match text.split_once('e') {
        Some((mantissa, exp)) if mantissa.contains('.') => {
            let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
            format!("{mantissa}E{exp}")
        }
        Some((mantissa, exp)) => format!("{mantissa}E{exp}"),
        None => text,
    }
}

/// Insets needed to contain `boxes` outside `bounds`.
pub(crate) fn insets_for(bounds: ScreenRect, boxes: &[ScreenRect]) -> Insets {
    boxes.iter().fold(Insets::default(), |acc, b| {
        acc.union(Insets::new(
            bounds.min.y - b.min.y,
            bounds.min.x - b.min.x,
            b.max.y - bounds.max.y,
            b.max.x - bounds.max.x,
        ))
    })
}

/// Length of major tick marks in pixels.
const MAJOR_TICK_LEN: f64 = 4.0;
/// Length of minor tick marks in pixels.
const MINOR_TICK_LEN: f64 = 2.0;

/// Draws tick marks, tick labels and a title along one axis.
///
/// Works in an axis frame whose x runs along the axis from its start and
/// whose y points away from the plot; `frame` carries that into graphics
/// space.
pub(crate) struct AxisAnnotation<'a> {
    pub frame: Affine,
    pub length: f64,
    pub orientation: Orientation,
    pub captioner: &'a dyn Captioner,
}

impl<'a> AxisAnnotation<'a> {
    /// Annotation along the bottom edge of `bounds`, left to right.
    pub fn bottom(bounds: ScreenRect, captioner: &'a dyn Captioner) -> Self {
        Self {
            frame: Affine::translate(bounds.min.x, bounds.max.y),
            length: bounds.width(),
            orientation: Orientation::X,
            captioner,
        }
    }

    /// Annotation along the left edge of `bounds`, bottom to top.
    pub fn left(bounds: ScreenRect, captioner: &'a dyn Captioner) -> Self {
        Self {
            frame: Affine::new(0.0, -1.0, -1.0, 0.0, bounds.min.x, bounds.max.y),
            length: bounds.height(),
            orientation: Orientation::Y,
            captioner,
        }
    }

    /// Annotation along the top edge of `bounds`, labels above.
    pub fn top(bounds: ScreenRect, captioner: &'a dyn Captioner) -> Self {
        Self {
            frame: Affine::new(1.0, 0.0, 0.0, -1.0, bounds.min.x, bounds.min.y),
            length: bounds.width(),
            orientation: Orientation::X,
            captioner,
        }
    }

    /// Annotation along the right edge of `bounds`, labels to the right.
    pub fn right(bounds: ScreenRect, captioner: &'a dyn Captioner) -> Self {
        Self {
            frame: Affine::new(0.0, -1.0, 1.0, 0.0, bounds.max.x, bounds.max.y),
            length: bounds.height(),
            orientation: Orientation::Y,
            captioner,
        }
    }

    fn caption_frame(&self, along: f64, across: f64, text: &str) -> (Affine, CaptionBounds) {
        let bounds = self.captioner.caption_bounds(text);
        let local = Affine::translate(along, across)
            .concat(&self.orientation.caption_transform(bounds, self.captioner.pad()));
        (local, bounds)
    }

    fn caption_corners(local: &Affine, bounds: CaptionBounds) -> [ScreenPoint; 4] {
        [
            (0.0, 0.0),
            (bounds.width, 0.0),
            (bounds.width, bounds.height),
            (0.0, bounds.height),
        ]
        .map(|(x, y)| local.apply(ScreenPoint::new(x, y)))
    }

    fn screen_box(&self, corners: &[ScreenPoint; 4]) -> ScreenRect {
        let screen = corners.map(|p| self.frame.apply(p));
        let mut min = screen[0];
        let mut max = screen[0];
        for p in &screen[1..] {
            min = ScreenPoint::new(min.x.min(p.x), min.y.min(p.y));
            max = ScreenPoint::new(max.x.max(p.x), max.y.max(p.y));
        }
        ScreenRect::new(min, max)
    }

    /// Labelled ticks inside the axis with their along-axis offsets.
    fn placed<'t>(
        &self,
        ticks: &'t [Tick],
        along: &dyn Fn(f64) -> f64,
    ) -> impl Iterator<Item = (f64, &'t Tick)> {
        let length = self.length;
        ticks
            .iter()
            .map(move |tick| (along(tick.value), tick))
            .filter(move |(a, _)| a.is_finite() && *a >= -0.5 && *a <= length + 0.5)
    }

    /// Graphics-space boxes of every label and the title.
    pub fn label_boxes(
        &self,
        ticks: &[Tick],
        along: &dyn Fn(f64) -> f64,
        title: Option<&str>,
    ) -> Vec<ScreenRect> {
        let mut boxes = Vec::new();
        let mut extent: f64 = 0.0;
        for (a, tick) in self.placed(ticks, along) {
            if let Some(label) = &tick.label {
                let (local, bounds) = self.caption_frame(a, 0.0, label);
                let corners = Self::caption_corners(&local, bounds);
                extent = corners.iter().fold(extent, |e, p| e.max(p.y));
                boxes.push(self.screen_box(&corners));
            }
        }
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            let (local, bounds) = self.caption_frame(self.length * 0.5, extent, title);
            boxes.push(self.screen_box(&Self::caption_corners(&local, bounds)));
        }
        boxes
    }

    /// Draw tick marks, labels and the title.
    pub fn draw(
        &self,
        ticks: &[Tick],
        along: &dyn Fn(f64) -> f64,
        title: Option<&str>,
        style: LineStyle,
        out: &mut RenderList,
    ) {
        let marks = self
            .placed(ticks, along)
            .map(|(a, tick)| {
                let len = if tick.is_major() {
                    MAJOR_TICK_LEN
                } else {
                    MINOR_TICK_LEN
                };
                LineSegment::new(
                    self.frame.apply(ScreenPoint::new(a, 0.0)),
                    self.frame.apply(ScreenPoint::new(a, -len)),
                )
            })
            .collect();
        out.segments(marks, style);
        let boxes = self.label_boxes(ticks, along, title);
        let texts = self
            .placed(ticks, along)
            .filter_map(|(_, tick)| tick.label.as_deref())
            .chain(title.filter(|t| !t.is_empty()));
        for (text, rect) in texts.zip(boxes) {
            self.captioner.draw_caption(text, rect.min, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captioner::FixedCaptioner;

    #[test]
    fn slice_supplier_chunks() {
        let positions = vec![[0.0; 3]; POSITION_CHUNK + 10];
        let supplier: &dyn PositionSupplier = &positions;
        assert_eq!(supplier.chunk_count(), 2);
        let mut n = 0;
        supplier.for_each_in_chunk(1, &mut |_| n += 1);
        assert_eq!(n, 10);
        let head = &positions[..5];
        let borrowed: &dyn PositionSupplier = &head;
        assert_eq!(borrowed.chunk_count(), 1);
    }

    #[test]
    fn axis_value_precision_follows_pixels() {
        let axis = Axis::new(0.0, 400.0, 0.0, 10.0, crate::axis::AxisScale::Linear, false);
        assert_eq!(format_axis_value(&axis, 5.0), "5.00");
        let wide = Axis::new(0.0, 100.0, 0.0, 1e4, crate::axis::AxisScale::Linear, false);
        assert_eq!(format_axis_value(&wide, 1234.5), "1235");
        let huge = Axis::new(0.0, 100.0, 0.0, 1e8, crate::axis::AxisScale::Linear, false);
        assert_eq!(format_axis_value(&huge, 2.5e7), "2.5E7");
    }

    #[test]
    fn left_labels_sit_left_of_axis() {
        let bounds = ScreenRect::from_origin_size(100.0, 0.0, 200.0, 100.0);
        let captioner = FixedCaptioner::default();
        let annotation = AxisAnnotation::left(bounds, &captioner);
        let ticks = [Tick::major(0.5, "0.5")];
        let boxes = annotation.label_boxes(&ticks, &|v| v * 100.0, None);
        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert!(b.max.x <= 100.0);
        assert!((b.center().y - 50.0).abs() < 1e-9);
        let insets = insets_for(bounds, &boxes);
        assert!(insets.left > 0.0);
        assert_eq!(insets.bottom, 0.0);
    }

    #[test]
    fn bottom_labels_sit_below_axis() {
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 200.0, 100.0);
        let captioner = FixedCaptioner::default();
        let annotation = AxisAnnotation::bottom(bounds, &captioner);
        let ticks = [Tick::major(1.0, "1"), Tick::minor(1.5)];
        let mut out = RenderList::new();
        annotation.draw(&ticks, &|v| v * 100.0, Some("x"), LineStyle::default(), &mut out);
        let texts: Vec<_> = out
            .commands()
            .iter()
            .filter_map(|c| match c {
                crate::render::RenderCommand::Text { position, text, .. } => {
                    Some((text.clone(), *position))
                }
                _ => None,
            })
            .collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].0, "1");
        assert_eq!(texts[0].1, ScreenPoint::new(96.5, 103.0));
        assert!(texts[1].1.y > texts[0].1.y);
    }
}
