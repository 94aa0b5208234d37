//! Rendering primitives and clipping helpers.
//!
//! Surfaces describe what they draw as a backend-agnostic [`RenderList`];
//! render backends (such as the GPUI backend) replay it.

use crate::geom::{Affine, ScreenPoint, ScreenRect};

/// RGBA color in linear space.
///
/// All components are expected to be in the 0.0..=1.0 range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl Color {
    /// Create a new color.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Light grey used for hidden wire-frame edges.
    pub const LIGHT_GREY: Self = Self::new(0.75, 0.75, 0.75, 1.0);
    /// Default grid line colour.
    pub const GRID_GREY: Self = Self::new(0.72, 0.72, 0.72, 1.0);
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
}

/// Line stroke styling.
///
/// The width is expressed in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    /// Stroke color.
    pub color: Color,
    /// Stroke width in pixels.
    pub width: f32,
}

impl LineStyle {
    /// One-pixel line of the given colour.
    pub const fn thin(color: Color) -> Self {
        Self { color, width: 1.0 }
    }
}

impl Default for LineStyle {
    fn default() -> Self {
        Self::thin(Color::BLACK)
    }
}

/// Fill and outline styling for rectangles and polygons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillStyle {
    /// Fill color.
    pub fill: Color,
    /// Stroke color.
    pub stroke: Color,
    /// Stroke width; zero for no outline.
    pub stroke_width: f32,
}

impl FillStyle {
    /// Solid fill without an outline.
    pub const fn solid(fill: Color) -> Self {
        Self {
            fill,
            stroke: Color::TRANSPARENT,
            stroke_width: 0.0,
        }
    }
}

impl Default for FillStyle {
    fn default() -> Self {
        Self {
            fill: Color::TRANSPARENT,
            stroke: Color::BLACK,
            stroke_width: 1.0,
        }
    }
}

/// Text styling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Text color.
    pub color: Color,
    /// Font size in pixels.
    pub size: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            size: 12.0,
        }
    }
}

/// A line segment in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    /// Segment start.
    pub start: ScreenPoint,
    /// Segment end.
    pub end: ScreenPoint,
}

impl LineSegment {
    /// Create a new line segment.
    pub const fn new(start: ScreenPoint, end: ScreenPoint) -> Self {
        Self { start, end }
    }
}

/// Render command list.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Start clipping to a rectangle (in the current transform's space).
    ClipRect(ScreenRect),
    /// End clipping.
    ClipEnd,
    /// Apply an affine transform to subsequent commands.
    PushTransform(Affine),
    /// Drop the innermost transform.
    PopTransform,
    /// Draw unconnected line segments.
    LineSegments {
        /// Segments to draw.
        segments: Vec<LineSegment>,
        /// Styling for the segments.
        style: LineStyle,
    },
    /// Draw a connected polyline.
    Polyline {
        /// Vertices in order.
        points: Vec<ScreenPoint>,
        /// Styling for the line.
        style: LineStyle,
    },
    /// Fill and/or outline a closed polygon.
    Polygon {
        /// Vertices in order.
        points: Vec<ScreenPoint>,
        /// Fill styling.
        style: FillStyle,
    },
    /// Draw a rectangle.
    Rect {
        /// Rectangle bounds.
        rect: ScreenRect,
        /// Rectangle styling.
        style: FillStyle,
    },
    /// Draw text.
    Text {
        /// Top-left corner of the text box.
        position: ScreenPoint,
        /// Text content.
        text: String,
        /// Text styling.
        style: TextStyle,
    },
}

/// Aggregated render commands.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RenderList {
    commands: Vec<RenderCommand>,
}

impl RenderList {
    /// Create an empty render list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a render command.
    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    /// Access all render commands.
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Whether nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Push a single line.
    pub fn line(&mut self, start: ScreenPoint, end: ScreenPoint, style: LineStyle) {
        self.push(RenderCommand::LineSegments {
            segments: vec![LineSegment::new(start, end)],
            style,
        });
    }

    /// Push segments, skipping the command when there are none.
    pub fn segments(&mut self, segments: Vec<LineSegment>, style: LineStyle) {
        if !segments.is_empty() {
            self.push(RenderCommand::LineSegments { segments, style });
        }
    }

    /// Run `f` with commands clipped to `rect`.
    pub fn clipped(&mut self, rect: ScreenRect, f: impl FnOnce(&mut Self)) {
        self.push(RenderCommand::ClipRect(rect));
        f(self);
        self.push(RenderCommand::ClipEnd);
    }

    /// Run `f` with commands transformed by `affine`.
    pub fn transformed(&mut self, affine: Affine, f: impl FnOnce(&mut Self)) {
        self.push(RenderCommand::PushTransform(affine));
        f(self);
        self.push(RenderCommand::PopTransform);
    }
}

/// Clip a set of segments to a rectangle, dropping those fully outside.
pub fn clip_segments(segments: &[LineSegment], clip: ScreenRect) -> Vec<LineSegment> {
    segments
        .iter()
        .filter_map(|segment| clip_segment(segment.start, segment.end, clip))
        .map(|(start, end)| LineSegment::new(start, end))
        .collect()
}

fn clip_segment(
    mut start: ScreenPoint,
    mut end: ScreenPoint,
    rect: ScreenRect,
) -> Option<(ScreenPoint, ScreenPoint)> {
    const LEFT: u8 = 1;
    const RIGHT: u8 = 2;
    const TOP: u8 = 4;
    const BOTTOM: u8 = 8;

    if !start.is_finite() || !end.is_finite() {
        return None;
    }
    let mut out_start = region_code(start, rect, LEFT, RIGHT, TOP, BOTTOM);
    let mut out_end = region_code(end, rect, LEFT, RIGHT, TOP, BOTTOM);

    loop {
        if (out_start | out_end) == 0 {
            return Some((start, end));
        }
        if (out_start & out_end) != 0 {
            return None;
        }

        let out_code = if out_start != 0 { out_start } else { out_end };
        let (mut x, mut y) = (0.0_f64, 0.0_f64);

        if (out_code & TOP) != 0 {
            x = start.x + (end.x - start.x) * (rect.min.y - start.y) / (end.y - start.y);
            y = rect.min.y;
        } else if (out_code & BOTTOM) != 0 {
            x = start.x + (end.x - start.x) * (rect.max.y - start.y) / (end.y - start.y);
            y = rect.max.y;
        } else if (out_code & RIGHT) != 0 {
            y = start.y + (end.y - start.y) * (rect.max.x - start.x) / (end.x - start.x);
            x = rect.max.x;
        } else if (out_code & LEFT) != 0 {
            y = start.y + (end.y - start.y) * (rect.min.x - start.x) / (end.x - start.x);
            x = rect.min.x;
        }

        let new_point = ScreenPoint::new(x, y);
        if out_code == out_start {
            start = new_point;
            out_start = region_code(start, rect, LEFT, RIGHT, TOP, BOTTOM);
        } else {
            end = new_point;
            out_end = region_code(end, rect, LEFT, RIGHT, TOP, BOTTOM);
        }
    }
}

fn region_code(
    point: ScreenPoint,
    rect: ScreenRect,
    left: u8,
    right: u8,
    top: u8,
    bottom: u8,
) -> u8 {
    let mut code = 0;
    if point.x < rect.min.x {
        code |= left;
    } else if point.x > rect.max.x {
        code |= right;
    }
    if point.y < rect.min.y {
        code |= top;
    } else if point.y > rect.max.y {
        code |= bottom;
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_segment_inside() {
        let rect = ScreenRect::new(ScreenPoint::new(0.0, 0.0), ScreenPoint::new(10.0, 10.0));
        let start = ScreenPoint::new(2.0, 2.0);
        let end = ScreenPoint::new(8.0, 8.0);
        let clipped = clip_segment(start, end, rect).expect("segment should clip");
        assert_eq!(clipped.0, start);
        assert_eq!(clipped.1, end);
    }

    #[test]
    fn clip_segments_trims_and_drops() {
        let rect = ScreenRect::from_origin_size(0.0, 0.0, 10.0, 10.0);
        let segments = [
            LineSegment::new(ScreenPoint::new(-5.0, 5.0), ScreenPoint::new(5.0, 5.0)),
            LineSegment::new(ScreenPoint::new(20.0, 20.0), ScreenPoint::new(30.0, 20.0)),
        ];
        let out = clip_segments(&segments, rect);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start, ScreenPoint::new(0.0, 5.0));
    }

    #[test]
    fn clipped_brackets_commands() {
        let mut list = RenderList::new();
        let rect = ScreenRect::from_origin_size(0.0, 0.0, 1.0, 1.0);
        list.clipped(rect, |list| list.segments(Vec::new(), LineStyle::default()));
        assert_eq!(
            list.commands(),
            &[RenderCommand::ClipRect(rect), RenderCommand::ClipEnd]
        );
    }
}
