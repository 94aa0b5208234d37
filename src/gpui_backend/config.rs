use crate::render::{Color, TextStyle};

/// Configuration for the GPUI surface view.
#[derive(Debug, Clone)]
pub struct SurfaceViewConfig {
    /// Pixel threshold for starting a drag.
    pub drag_threshold_px: f64,
    /// Scroll distance, in pixels, counted as one wheel click.
    pub wheel_click_px: f32,
    /// Extra space kept around the axis annotations.
    pub padding_px: f64,
    /// Canvas background outside the plot.
    pub background: Color,
    /// Style of annotation text.
    pub text: TextStyle,
    /// Measure and draw annotation text with the window's text system
    /// instead of the profile's captioner.
    pub window_text: bool,
    /// Show the data position under the cursor.
    pub show_position: bool,
}

impl Default for SurfaceViewConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: 4.0,
            wheel_click_px: 16.0,
            padding_px: 4.0,
            background: Color::WHITE,
            text: TextStyle::default(),
            window_text: true,
            show_position: true,
        }
    }
}
