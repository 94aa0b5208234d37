use std::fmt;
use std::sync::Arc;

use gpui::{TextRun, Window, WindowTextSystem, font, px};

use crate::captioner::{CaptionBounds, Captioner};
use crate::render::TextStyle;

use super::paint::to_hsla;

/// Captioner measuring text with a window's text system.
///
/// Captions are still emitted as render commands; the painter shapes
/// them again when the frame is drawn.
#[derive(Clone)]
pub struct GpuiCaptioner {
    text_system: Arc<WindowTextSystem>,
    style: TextStyle,
    pad: f64,
}

impl GpuiCaptioner {
    /// Captioner for text drawn in `window` with the given style.
    pub fn new(window: &Window, style: TextStyle) -> Self {
        Self {
            text_system: Arc::clone(window.text_system()),
            style,
            pad: (f64::from(style.size) * 0.25).round().max(2.0),
        }
    }
}

impl fmt::Debug for GpuiCaptioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuiCaptioner")
            .field("style", &self.style)
            .field("pad", &self.pad)
            .finish_non_exhaustive()
    }
}

impl Captioner for GpuiCaptioner {
    fn caption_bounds(&self, text: &str) -> CaptionBounds {
        if text.is_empty() {
            return CaptionBounds::default();
        }
        let run = TextRun {
            len: text.len(),
            font: font(".SystemUIFont"),
            color: to_hsla(self.style.color),
            background_color: None,
            underline: None,
            strikethrough: None,
        };
        let shaped = self
            .text_system
            .shape_line(text.to_string().into(), px(self.style.size), &[run], None);
        let height = f32::from(shaped.ascent + shaped.descent).max(self.style.size * 1.2);
        CaptionBounds {
            width: f64::from(f32::from(shaped.width)),
            height: f64::from(height),
        }
    }

    fn pad(&self) -> f64 {
        self.pad
    }

    fn text_style(&self) -> TextStyle {
        self.style
    }
}
