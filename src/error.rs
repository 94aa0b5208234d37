//! Error types raised at the configuration boundary.
//!
//! Per-point geometry never returns these: transforms signal unmappable
//! positions with `None` and let NaN propagate.

use thiserror::Error;

/// Failure to build a profile, aspect or surface from configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// Plot bounds have no area.
    #[error("plot bounds have no area: {width} x {height}")]
    EmptyBounds {
        /// Bounds width in pixels.
        width: f64,
        /// Bounds height in pixels.
        height: f64,
    },

    /// A data range could not be resolved for the named axis.
    #[error("no usable data range for {axis} axis")]
    NoRange {
        /// Axis name.
        axis: &'static str,
    },

    /// A logarithmic axis was given a range touching zero or below.
    #[error("log axis {axis} needs positive limits, got {lo} .. {hi}")]
    NonPositiveLog {
        /// Axis name.
        axis: &'static str,
        /// Lower limit.
        lo: f64,
        /// Upper limit.
        hi: f64,
    },

    /// A scalar aspect value was out of range.
    #[error("invalid {name}: {value}")]
    InvalidValue {
        /// Value name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
}

/// Failure while generating sky grid lines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// No point of the plot bounds maps onto the sky.
    #[error("no sky positions inside {width} x {height} pixel bounds")]
    NoSkyInBounds {
        /// Bounds width in pixels.
        width: f64,
        /// Bounds height in pixels.
        height: f64,
    },

    /// Sampled coordinate limits were not finite.
    #[error("non-finite grid limits: lon {lon_min} .. {lon_max}, lat {lat_min} .. {lat_max}")]
    BadLimits {
        /// Minimum longitude in degrees.
        lon_min: f64,
        /// Maximum longitude in degrees.
        lon_max: f64,
        /// Minimum latitude in degrees.
        lat_min: f64,
        /// Maximum latitude in degrees.
        lat_max: f64,
    },
}
