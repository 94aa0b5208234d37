//! Text metrics and caption drawing.

use std::fmt;

use crate::geom::{Affine, ScreenPoint};
use crate::render::{Color, RenderCommand, RenderList, TextStyle};

/// Size of a rendered caption, measured from its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CaptionBounds {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

/// Measures and draws short text labels.
pub trait Captioner: fmt::Debug {
    /// Bounds of a caption when drawn.
    fn caption_bounds(&self, text: &str) -> CaptionBounds;

    /// Padding to leave between a caption and whatever it annotates.
    fn pad(&self) -> f64;

    /// Style used for drawn captions.
    fn text_style(&self) -> TextStyle;

    /// Draw a caption with its top-left corner at `position`.
    fn draw_caption(&self, text: &str, position: ScreenPoint, out: &mut RenderList) {
        if text.is_empty() {
            return;
        }
        out.push(RenderCommand::Text {
            position,
            text: text.to_owned(),
            style: self.text_style(),
        });
    }
}

/// Captioner with fixed per-character metrics.
///
/// Used where no text system is available and in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCaptioner {
    /// Advance per character in pixels.
    pub char_width: f64,
    /// Line height in pixels.
    pub line_height: f64,
    /// Caption padding in pixels.
    pub pad: f64,
    /// Text style for drawing.
    pub style: TextStyle,
}

impl Default for FixedCaptioner {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            line_height: 14.0,
            pad: 3.0,
            style: TextStyle {
                color: Color::BLACK,
                size: 12.0,
            },
        }
    }
}

impl Captioner for FixedCaptioner {
    fn caption_bounds(&self, text: &str) -> CaptionBounds {
        CaptionBounds {
            width: text.chars().count() as f64 * self.char_width,
            height: self.line_height,
        }
    }

    fn pad(&self) -> f64 {
        self.pad
    }

    fn text_style(&self) -> TextStyle {
        self.style
    }
}

/// Placement of tick labels relative to their axis.
///
/// Transforms map a caption box into an axis frame whose x coordinate
/// runs along the axis and whose y coordinate points away from the plot.
/// The vertical axis frame is a reflection of screen space (x up, y left),
/// so both orientations leave captions upright on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Horizontal labels centred below a horizontal axis.
    X,
    /// Horizontal labels to the left of a vertical axis, centred on the tick.
    Y,
}

impl Orientation {
    /// Transform from caption coordinates to the axis frame.
    pub fn caption_transform(self, bounds: CaptionBounds, pad: f64) -> Affine {
        match self {
            Self::X => Affine::translate(-bounds.width * 0.5, pad),
            Self::Y => Affine::new(0.0, -1.0, -1.0, 0.0, bounds.height * 0.5, pad + bounds.width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_metrics_scale_with_length() {
        let captioner = FixedCaptioner::default();
        let bounds = captioner.caption_bounds("1000");
        assert_eq!(bounds.width, 28.0);
        assert_eq!(bounds.height, 14.0);
    }

    #[test]
    fn y_orientation_spans_height_along_axis() {
        let bounds = CaptionBounds {
            width: 30.0,
            height: 10.0,
        };
        let t = Orientation::Y.caption_transform(bounds, 2.0);
        let a = t.apply(ScreenPoint::new(0.0, 0.0));
        let b = t.apply(ScreenPoint::new(30.0, 10.0));
        assert_eq!((a.x, b.x), (5.0, -5.0));
        assert_eq!((a.y, b.y), (32.0, 2.0));
    }
}
