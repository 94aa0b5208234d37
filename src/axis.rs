//! One-dimensional mapping between a data range and a pixel range.

use crate::range::Range;

/// Axis scale type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AxisScale {
    /// Linear scaling.
    #[default]
    Linear,
    /// Logarithmic scaling. Data values must be positive.
    Log,
    /// Time axis, in seconds since the Unix epoch (mapped linearly).
    Time,
}

impl AxisScale {
    /// Whether the scale is logarithmic.
    pub fn is_log(self) -> bool {
        self == Self::Log
    }

    /// Map a value into axis space.
    pub fn map_value(self, value: f64) -> f64 {
        match self {
            Self::Linear | Self::Time => value,
            Self::Log => value.ln(),
        }
    }

    /// Invert a value from axis space back into data space.
    pub fn invert_value(self, value: f64) -> f64 {
        match self {
            Self::Linear | Self::Time => value,
            Self::Log => value.exp(),
        }
    }

    /// Check whether a data range is usable for this scale.
    pub fn is_range_valid(self, range: Range) -> bool {
        if !range.is_valid() {
            return false;
        }
        match self {
            Self::Linear | Self::Time => true,
            Self::Log => range.min > 0.0,
        }
    }
}

/// Maps one data dimension onto one pixel dimension.
///
/// Log axes with non-positive limits give NaN results; callers validate
/// ranges upstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    glo: f64,
    ghi: f64,
    dlo: f64,
    dhi: f64,
    scale: AxisScale,
    flip: bool,
    // Precomputed axis-space offsets and pixels-per-unit.
    alo: f64,
    factor: f64,
}

impl Axis {
    /// Create an axis mapping `dlo..dhi` onto pixels `glo..ghi`.
    ///
    /// With `flip` set the data range runs from `ghi` down to `glo`.
    pub fn new(glo: f64, ghi: f64, dlo: f64, dhi: f64, scale: AxisScale, flip: bool) -> Self {
        let alo = scale.map_value(dlo);
        let ahi = scale.map_value(dhi);
        Self {
            glo,
            ghi,
            dlo,
            dhi,
            scale,
            flip,
            alo,
            factor: (ghi - glo) / (ahi - alo),
        }
    }

    /// Lower pixel bound.
    pub fn glo(&self) -> f64 {
        self.glo
    }

    /// Upper pixel bound.
    pub fn ghi(&self) -> f64 {
        self.ghi
    }

    /// Data limits as a range.
    pub fn data_range(&self) -> Range {
        Range::new(self.dlo, self.dhi)
    }

    /// Scale type.
    pub fn scale(&self) -> AxisScale {
        self.scale
    }

    /// Whether the axis is reversed.
    pub fn is_flipped(&self) -> bool {
        self.flip
    }

    /// Whether data maps to pixels linearly.
    pub fn is_linear(&self) -> bool {
        !self.scale.is_log()
    }

    /// Map a data value to a pixel coordinate.
    pub fn data_to_graphics(&self, d: f64) -> f64 {
        let offset = (self.scale.map_value(d) - self.alo) * self.factor;
        if self.flip {
            self.ghi - offset
        } else {
            self.glo + offset
        }
    }

    /// Map a pixel coordinate to a data value.
    pub fn graphics_to_data(&self, g: f64) -> f64 {
        let offset = if self.flip {
            self.ghi - g
        } else {
            g - self.glo
        };
        self.scale.invert_value(self.alo + offset / self.factor)
    }

    /// Data range after panning so that data value `d0` moves to where `d1` is.
    pub fn data_pan(&self, d0: f64, d1: f64) -> Range {
        Self::pan_range(self.dlo, self.dhi, d0, d1, self.scale.is_log())
    }

    /// Data range after zooming about `d0` by `factor` (greater than one zooms in).
    pub fn data_zoom(&self, d0: f64, factor: f64) -> Range {
        Self::zoom_range(self.dlo, self.dhi, d0, factor, self.scale.is_log())
    }

    /// Pan arithmetic on a bare range.
    pub fn pan_range(dlo: f64, dhi: f64, d0: f64, d1: f64, log: bool) -> Range {
        if log {
            let f = d0 / d1;
            Range::new(dlo * f, dhi * f)
        } else {
            let shift = d0 - d1;
            Range::new(dlo + shift, dhi + shift)
        }
    }

    /// Zoom arithmetic on a bare range.
    pub fn zoom_range(dlo: f64, dhi: f64, d0: f64, factor: f64, log: bool) -> Range {
        if log {
            let a0 = d0.ln();
            Range::new(
                (a0 + (dlo.ln() - a0) / factor).exp(),
                (a0 + (dhi.ln() - a0) / factor).exp(),
            )
        } else {
            Range::new(d0 + (dlo - d0) / factor, d0 + (dhi - d0) / factor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_maps_ends_and_middle() {
        let axis = Axis::new(0.0, 400.0, 0.0, 10.0, AxisScale::Linear, false);
        assert_eq!(axis.data_to_graphics(0.0), 0.0);
        assert_eq!(axis.data_to_graphics(5.0), 200.0);
        assert_eq!(axis.data_to_graphics(10.0), 400.0);
    }

    #[test]
    fn flipped_axis_runs_backwards() {
        let axis = Axis::new(0.0, 300.0, 0.0, 100.0, AxisScale::Linear, true);
        assert_eq!(axis.data_to_graphics(0.0), 300.0);
        assert!((axis.graphics_to_data(300.0)).abs() < 1e-12);
    }

    #[test]
    fn log_roundtrip() {
        let axis = Axis::new(10.0, 110.0, 1.0, 1000.0, AxisScale::Log, false);
        let g = axis.data_to_graphics(31.6);
        assert!((axis.graphics_to_data(g) - 31.6).abs() < 1e-9);
        assert!((axis.data_to_graphics(10.0) - (10.0 + 100.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn pan_moves_point() {
        let axis = Axis::new(0.0, 100.0, 0.0, 10.0, AxisScale::Linear, false);
        let range = axis.data_pan(4.0, 5.0);
        assert!((range.min + 1.0).abs() < 1e-12);
        assert!((range.max - 9.0).abs() < 1e-12);
    }

    #[test]
    fn zoom_keeps_center_fixed() {
        let range = Axis::zoom_range(1.0, 100.0, 10.0, 2.0, true);
        assert!((range.min - 10f64.powf(0.5)).abs() < 1e-9);
        assert!((range.max - 10f64.powf(1.5)).abs() < 1e-9);
        let linear = Axis::zoom_range(0.0, 10.0, 5.0, 2.0, false);
        assert_eq!(linear, Range::new(2.5, 7.5));
    }
}
