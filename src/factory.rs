//! Surface factories: configuration in, profiles, aspects and surfaces out.
//!
//! Each surface kind has a configuration struct holding its fixed styling
//! (the profile) alongside the settings that determine the initial view.
//! Where the configuration does not pin the view down, data ranges read
//! from the plotted positions fill the gaps.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;

use crate::axis::AxisScale;
use crate::captioner::Captioner;
use crate::error::SurfaceError;
use crate::geom::ScreenRect;
use crate::matrix;
use crate::navigation::{
    AxisNavigation, CubeNavigator, DEFAULT_ZOOM_FACTOR, Navigator, PlaneNavigator, SkyNavigator, TimeNavigator,
};
use crate::projection::Projection;
use crate::range::Range;
use crate::surface::{
    CubeAspect, CubeProfile, CubeSurface, PlaneAspect, PlaneProfile, PlaneSurface, PositionSupplier, SecondaryAxis,
    SkyAspect, SkyFov, SkyProfile, SkySurface, Surface, TimeAspect, TimeProfile, TimeSurface,
};
use crate::tick::time::TimeFormat;

/// Width of the time window shown when nothing else fixes it.
const DEFAULT_TIME_RANGE_SEC: f64 = 2.0 * 365.25 * 24.0 * 60.0 * 60.0;

/// Isotropic cube centres closer to zero than this fraction of the data
/// extent are snapped to zero.
pub const ISO_CENTER_TOLERANCE: f64 = 0.1;

/// Fractional part of an axis range to display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subrange {
    /// Lower fraction.
    pub lo: f64,
    /// Upper fraction.
    pub hi: f64,
}

impl Default for Subrange {
    fn default() -> Self {
        Self { lo: 0.0, hi: 1.0 }
    }
}

impl Subrange {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    fn is_identity(&self) -> bool {
        self.lo == 0.0 && self.hi == 1.0
    }

    fn apply(&self, range: Range, log: bool) -> Range {
        if self.is_identity() {
            range
        } else {
            range.subrange(self.lo, self.hi, log)
        }
    }
}

/// Requested limits for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisLimits {
    /// Explicit lower bound.
    pub min: Option<f64>,
    /// Explicit upper bound.
    pub max: Option<f64>,
    /// Part of the resolved range actually shown.
    pub subrange: Subrange,
}

impl AxisLimits {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            subrange: Subrange::default(),
        }
    }

    /// Whether the explicit bounds alone give a usable range.
    fn explicit(&self, log: bool) -> Option<Range> {
        let (lo, hi) = (self.min?, self.max?);
        let usable = lo < hi && lo.is_finite() && hi.is_finite() && !(log && lo <= 0.0);
        usable.then(|| Range::new(lo, hi))
    }
}

/// Resolve the displayed range of one axis.
///
/// Explicit bounds are used when they form a valid range. Otherwise the
/// data range, narrowed by whichever bound is given, is used. Without a
/// data range the result is `None`. The subrange is applied last.
pub fn get_limits(limits: &AxisLimits, log: bool, range: Option<Range>) -> Option<Range> {
    let base = match limits.explicit(log) {
        Some(explicit) => explicit,
        None => {
            let usable = |v: &f64| !log || *v > 0.0;
            finite_bounds(range?.limited(limits.min.filter(usable), limits.max.filter(usable)), log)
        }
    };
    Some(limits.subrange.apply(base, log))
}

/// Definite bounds from a range that may be empty, half-open or degenerate.
fn finite_bounds(range: Range, log: bool) -> Range {
    let usable = |v: f64| v.is_finite() && !(log && v <= 0.0);
    let lo = usable(range.min).then_some(range.min);
    let hi = usable(range.max).then_some(range.max);
    match (lo, hi) {
        (Some(lo), Some(hi)) => Range::new(lo, hi).widened(log),
        (Some(v), None) | (None, Some(v)) => Range::new(v, v).widened(log),
        (None, None) if log => Range::new(1.0, 10.0),
        (None, None) => Range::new(0.0, 1.0),
    }
}

/// Accumulate per-coordinate ranges over all supplied positions.
///
/// Coordinates on log axes only count when positive.
pub fn read_ranges(positions: &dyn PositionSupplier, logs: &[bool]) -> Vec<Range> {
    let dims = logs.len();
    (0..positions.chunk_count())
        .into_par_iter()
        .map(|index| {
            let mut ranges = vec![Range::empty(); dims];
            positions.for_each_in_chunk(index, &mut |pos| {
                for ((range, &log), &value) in ranges.iter_mut().zip(logs).zip(pos) {
                    if !log || value > 0.0 {
                        range.submit(value);
                    }
                }
            });
            ranges
        })
        .reduce(
            || vec![Range::empty(); dims],
            |a, b| a.into_iter().zip(b).map(|(a, b)| Range::union(a, b)).collect(),
        )
}

/// Builds the pieces of one kind of plotting surface.
pub trait SurfaceFactory: fmt::Debug {
    /// User-facing configuration.
    type Config: Clone + fmt::Debug;
    /// Fixed styling.
    type Profile: Clone + fmt::Debug;
    /// Navigable view.
    type Aspect: Clone + fmt::Debug + PartialEq;
    /// Surface built from bounds, profile and aspect.
    type Surface: Surface + Clone;
    /// Turns gestures on the surface into new aspects.
    type Navigator: Navigator<Surface = Self::Surface, Aspect = Self::Aspect> + Clone;

    /// Fixed styling from a configuration.
    fn create_profile(&self, config: &Self::Config) -> Self::Profile;

    /// Whether data ranges are needed to create the aspect.
    fn use_ranges(&self, config: &Self::Config) -> bool;

    /// Data ranges of the supplied positions, one per data coordinate.
    fn read_ranges(&self, profile: &Self::Profile, positions: &dyn PositionSupplier) -> Vec<Range>;

    /// Initial view, using data ranges where the configuration leaves the
    /// view open.
    fn create_aspect(&self, config: &Self::Config, ranges: Option<&[Range]>) -> Result<Self::Aspect, SurfaceError>;

    /// Surface for the given plot bounds.
    fn create_surface(
        &self,
        bounds: ScreenRect,
        profile: &Self::Profile,
        aspect: &Self::Aspect,
    ) -> Result<Self::Surface, SurfaceError>;

    /// Navigator for surfaces of this kind.
    fn create_navigator(&self, config: &Self::Config) -> Self::Navigator;

    /// Profile with text handled by `captioner`.
    fn with_captioner(&self, profile: &Self::Profile, captioner: Arc<dyn Captioner>) -> Self::Profile;
}

fn range_at(ranges: Option<&[Range]>, i: usize) -> Range {
    ranges.and_then(|r| r.get(i).copied()).unwrap_or_default()
}

/// Configuration of a plane surface.
#[derive(Debug, Clone, Default)]
pub struct PlaneConfig {
    /// Fixed styling.
    pub profile: PlaneProfile,
    /// Requested X limits.
    pub x: AxisLimits,
    /// Requested Y limits.
    pub y: AxisLimits,
    /// Navigation permissions.
    pub navigation: AxisNavigation,
}

impl PlaneConfig {
    pub fn with_x_scale(mut self, scale: AxisScale) -> Self {
        self.profile.x_scale = scale;
        self
    }

    pub fn with_y_scale(mut self, scale: AxisScale) -> Self {
        self.profile.y_scale = scale;
        self
    }

    pub fn with_flips(mut self, x_flip: bool, y_flip: bool) -> Self {
        self.profile.x_flip = x_flip;
        self.profile.y_flip = y_flip;
        self
    }

    pub fn with_labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.profile.x_label = Some(x_label.into());
        self.profile.y_label = Some(y_label.into());
        self
    }

    pub fn with_x_limits(mut self, limits: AxisLimits) -> Self {
        self.x = limits;
        self
    }

    pub fn with_y_limits(mut self, limits: AxisLimits) -> Self {
        self.y = limits;
        self
    }

    pub fn with_grid(mut self, grid: bool) -> Self {
        self.profile.grid = grid;
        self
    }

    /// Fix the ratio of X to Y pixels per data unit.
    pub fn with_xy_factor(mut self, factor: f64) -> Self {
        self.profile.xy_factor = Some(factor);
        self
    }

    pub fn with_secondary_x(mut self, axis: SecondaryAxis) -> Self {
        self.profile.x2 = Some(axis);
        self
    }

    pub fn with_secondary_y(mut self, axis: SecondaryAxis) -> Self {
        self.profile.y2 = Some(axis);
        self
    }

    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.profile.captioner = captioner;
        self
    }

    pub fn with_navigation(mut self, navigation: AxisNavigation) -> Self {
        self.navigation = navigation;
        self
    }
}

/// Factory for [`PlaneSurface`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneSurfaceFactory;

impl PlaneSurfaceFactory {
    fn unranged_aspect(config: &PlaneConfig) -> Option<PlaneAspect> {
        let p = &config.profile;
        Some(PlaneAspect {
            x: get_limits(&config.x, p.x_scale.is_log(), None)?,
            y: get_limits(&config.y, p.y_scale.is_log(), None)?,
        })
    }
}

impl SurfaceFactory for PlaneSurfaceFactory {
    type Config = PlaneConfig;
    type Profile = PlaneProfile;
    type Aspect = PlaneAspect;
    type Surface = PlaneSurface;
    type Navigator = PlaneNavigator;

    fn create_profile(&self, config: &PlaneConfig) -> PlaneProfile {
        config.profile.clone()
    }

    fn use_ranges(&self, config: &PlaneConfig) -> bool {
        Self::unranged_aspect(config).is_none()
    }

    fn read_ranges(&self, profile: &PlaneProfile, positions: &dyn PositionSupplier) -> Vec<Range> {
        read_ranges(positions, &[profile.x_scale.is_log(), profile.y_scale.is_log()])
    }

    fn create_aspect(&self, config: &PlaneConfig, ranges: Option<&[Range]>) -> Result<PlaneAspect, SurfaceError> {
        if let Some(aspect) = Self::unranged_aspect(config) {
            return Ok(aspect);
        }
        let p = &config.profile;
        Ok(PlaneAspect {
            x: get_limits(&config.x, p.x_scale.is_log(), Some(range_at(ranges, 0))).ok_or(SurfaceError::NoRange { axis: "x" })?,
            y: get_limits(&config.y, p.y_scale.is_log(), Some(range_at(ranges, 1))).ok_or(SurfaceError::NoRange { axis: "y" })?,
        })
    }

    fn create_surface(
        &self,
        bounds: ScreenRect,
        profile: &PlaneProfile,
        aspect: &PlaneAspect,
    ) -> Result<PlaneSurface, SurfaceError> {
        PlaneSurface::new(bounds, profile, aspect)
    }

    fn create_navigator(&self, config: &PlaneConfig) -> PlaneNavigator {
        PlaneNavigator(config.navigation)
    }

    fn with_captioner(&self, profile: &PlaneProfile, captioner: Arc<dyn Captioner>) -> PlaneProfile {
        PlaneProfile {
            captioner,
            ..profile.clone()
        }
    }
}

/// Configuration of a time surface.
#[derive(Debug, Clone, Default)]
pub struct TimeConfig {
    /// Fixed styling.
    pub profile: TimeProfile,
    /// Requested time limits, in Unix seconds.
    pub t: AxisLimits,
    /// Requested Y limits.
    pub y: AxisLimits,
    /// Navigation permissions; X refers to the time axis.
    pub navigation: AxisNavigation,
}

impl TimeConfig {
    pub fn with_time_format(mut self, format: TimeFormat) -> Self {
        self.profile.t_format = format;
        self
    }

    pub fn with_y_scale(mut self, scale: AxisScale) -> Self {
        self.profile.y_scale = scale;
        self
    }

    pub fn with_t_limits(mut self, limits: AxisLimits) -> Self {
        self.t = limits;
        self
    }

    pub fn with_y_limits(mut self, limits: AxisLimits) -> Self {
        self.y = limits;
        self
    }

    pub fn with_labels(mut self, t_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.profile.t_label = Some(t_label.into());
        self.profile.y_label = Some(y_label.into());
        self
    }

    pub fn with_grid(mut self, grid: bool) -> Self {
        self.profile.grid = grid;
        self
    }

    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.profile.captioner = captioner;
        self
    }

    pub fn with_navigation(mut self, navigation: AxisNavigation) -> Self {
        self.navigation = navigation;
        self
    }
}

/// Factory for [`TimeSurface`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSurfaceFactory;

impl TimeSurfaceFactory {
    fn unranged_aspect(config: &TimeConfig) -> Option<TimeAspect> {
        Some(TimeAspect {
            t: get_limits(&config.t, false, None)?,
            y: get_limits(&config.y, config.profile.y_scale.is_log(), None)?,
        })
    }
}

/// Time range from data narrowed by explicit bounds, completed with a
/// default-width window relative to `now` where either end is missing.
fn time_limits(limits: &AxisLimits, range: Range, now: f64) -> Range {
    let pick = |explicit: Option<f64>, data: f64| {
        explicit
            .filter(|v| v.is_finite())
            .or(data.is_finite().then_some(data))
    };
    let base = match (pick(limits.min, range.min), pick(limits.max, range.max)) {
        (Some(lo), Some(hi)) if lo < hi => Range::new(lo, hi),
        (Some(lo), None) => Range::new(lo, if now > lo { now } else { lo + DEFAULT_TIME_RANGE_SEC }),
        (None, Some(hi)) => Range::new(if now < hi { now } else { hi - DEFAULT_TIME_RANGE_SEC }, hi),
        _ => Range::new(now - DEFAULT_TIME_RANGE_SEC, now),
    };
    limits.subrange.apply(base, false)
}

impl SurfaceFactory for TimeSurfaceFactory {
    type Config = TimeConfig;
    type Profile = TimeProfile;
    type Aspect = TimeAspect;
    type Surface = TimeSurface;
    type Navigator = TimeNavigator;

    fn create_profile(&self, config: &TimeConfig) -> TimeProfile {
        config.profile.clone()
    }

    fn use_ranges(&self, config: &TimeConfig) -> bool {
        Self::unranged_aspect(config).is_none()
    }

    fn read_ranges(&self, profile: &TimeProfile, positions: &dyn PositionSupplier) -> Vec<Range> {
        read_ranges(positions, &[false, profile.y_scale.is_log()])
    }

    fn create_aspect(&self, config: &TimeConfig, ranges: Option<&[Range]>) -> Result<TimeAspect, SurfaceError> {
        if let Some(aspect) = Self::unranged_aspect(config) {
            return Ok(aspect);
        }
        let now = Utc::now().timestamp_millis() as f64 * 0.001;
        Ok(TimeAspect {
            t: time_limits(&config.t, range_at(ranges, 0), now),
            y: get_limits(&config.y, config.profile.y_scale.is_log(), Some(range_at(ranges, 1)))
                .ok_or(SurfaceError::NoRange { axis: "y" })?,
        })
    }

    fn create_surface(&self, bounds: ScreenRect, profile: &TimeProfile, aspect: &TimeAspect) -> Result<TimeSurface, SurfaceError> {
        TimeSurface::new(bounds, profile, aspect)
    }

    fn create_navigator(&self, config: &TimeConfig) -> TimeNavigator {
        TimeNavigator(config.navigation)
    }

    fn with_captioner(&self, profile: &TimeProfile, captioner: Arc<dyn Captioner>) -> TimeProfile {
        TimeProfile {
            captioner,
            ..profile.clone()
        }
    }
}

/// Configuration of a cube surface.
#[derive(Debug, Clone)]
pub struct CubeConfig {
    /// Fixed styling.
    pub profile: CubeProfile,
    /// Requested X, Y and Z limits when not isotropic.
    pub limits: [AxisLimits; 3],
    /// Use one linear scale for all three axes.
    pub isotropic: bool,
    /// Common axis extent in isotropic mode.
    pub scale: Option<f64>,
    /// Axis centres in isotropic mode.
    pub center: [Option<f64>; 3],
    /// Euler angles (phi, theta, psi) of the view in degrees.
    pub euler: [f64; 3],
    /// Magnification.
    pub zoom: f64,
    /// Horizontal offset of the cube centre, in units of the plot size.
    pub x_offset: f64,
    /// Vertical offset of the cube centre, in units of the plot size.
    pub y_offset: f64,
    /// Zoom step per wheel click.
    pub zoom_factor: f64,
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            profile: CubeProfile::default(),
            limits: [AxisLimits::default(); 3],
            isotropic: false,
            scale: None,
            center: [None; 3],
            euler: [30.0, -15.0, 0.0],
            zoom: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
            zoom_factor: DEFAULT_ZOOM_FACTOR,
        }
    }
}

impl CubeConfig {
    pub fn with_scales(mut self, scales: [AxisScale; 3]) -> Self {
        self.profile.scales = scales;
        self
    }

    pub fn with_limits(mut self, limits: [AxisLimits; 3]) -> Self {
        self.limits = limits;
        self
    }

    /// Switch to isotropic mode with an optional fixed extent and centre.
    pub fn with_isotropic(mut self, scale: Option<f64>, center: [Option<f64>; 3]) -> Self {
        self.isotropic = true;
        self.scale = scale;
        self.center = center;
        self
    }

    pub fn with_euler(mut self, phi: f64, theta: f64, psi: f64) -> Self {
        self.euler = [phi, theta, psi];
        self
    }

    pub fn with_zoom(mut self, zoom: f64, x_offset: f64, y_offset: f64) -> Self {
        self.zoom = zoom;
        self.x_offset = x_offset;
        self.y_offset = y_offset;
        self
    }

    pub fn with_labels(mut self, labels: [&str; 3]) -> Self {
        self.profile.labels = labels.map(|label| Some(label.to_owned()));
        self
    }

    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.profile.captioner = captioner;
        self
    }
}

/// Factory for [`CubeSurface`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubeSurfaceFactory;

/// Centre of `lo .. hi`, or zero if it is close to zero relative to the extent.
fn iso_center(lo: f64, hi: f64, tolerance: f64) -> f64 {
    let c0 = 0.5 * (lo + hi);
    if c0.abs() / (hi - lo) <= tolerance { 0.0 } else { c0 }
}

impl CubeSurfaceFactory {
    fn unranged_limits(config: &CubeConfig, profile: &CubeProfile) -> Option<[Range; 3]> {
        if config.isotropic {
            let s2 = config.scale? * 0.5;
            let [xc, yc, zc] = config.center;
            let (xc, yc, zc) = (xc?, yc?, zc?);
            Some([xc, yc, zc].map(|c| Range::new(c - s2, c + s2)))
        } else {
            let x = get_limits(&config.limits[0], profile.scales[0].is_log(), None)?;
            let y = get_limits(&config.limits[1], profile.scales[1].is_log(), None)?;
            let z = get_limits(&config.limits[2], profile.scales[2].is_log(), None)?;
            Some([x, y, z])
        }
    }

    fn ranged_limits(config: &CubeConfig, profile: &CubeProfile, ranges: Option<&[Range]>) -> Result<[Range; 3], SurfaceError> {
        if config.isotropic {
            let bounds = [0, 1, 2].map(|i| finite_bounds(range_at(ranges, i), false));
            let centers = [0, 1, 2].map(|i| {
                config.center[i].unwrap_or_else(|| iso_center(bounds[i].min, bounds[i].max, ISO_CENTER_TOLERANCE))
            });
            let scale = config.scale.unwrap_or_else(|| {
                2.0 * bounds
                    .iter()
                    .zip(centers)
                    .map(|(b, c)| (b.max - c).max(c - b.min))
                    .fold(f64::NEG_INFINITY, f64::max)
            });
            Ok(centers.map(|c| Range::new(c - 0.5 * scale, c + 0.5 * scale)))
        } else {
            let mut out = [Range::empty(); 3];
            for (i, name) in ["x", "y", "z"].into_iter().enumerate() {
                out[i] = get_limits(&config.limits[i], profile.scales[i].is_log(), Some(range_at(ranges, i)))
                    .ok_or(SurfaceError::NoRange { axis: name })?;
            }
            Ok(out)
        }
    }
}

impl SurfaceFactory for CubeSurfaceFactory {
    type Config = CubeConfig;
    type Profile = CubeProfile;
    type Aspect = CubeAspect;
    type Surface = CubeSurface;
    type Navigator = CubeNavigator;

    fn create_profile(&self, config: &CubeConfig) -> CubeProfile {
        let mut profile = config.profile.clone();
        if config.isotropic {
            profile.scales = [AxisScale::Linear; 3];
            profile.crowds = [profile.crowds[0]; 3];
        }
        profile
    }

    fn use_ranges(&self, config: &CubeConfig) -> bool {
        Self::unranged_limits(config, &self.create_profile(config)).is_none()
    }

    fn read_ranges(&self, profile: &CubeProfile, positions: &dyn PositionSupplier) -> Vec<Range> {
        read_ranges(positions, &profile.scales.map(AxisScale::is_log))
    }

    fn create_aspect(&self, config: &CubeConfig, ranges: Option<&[Range]>) -> Result<CubeAspect, SurfaceError> {
        if let Some(scale) = config.scale.filter(|s| !(*s > 0.0 && s.is_finite())) {
            return Err(SurfaceError::InvalidValue {
                name: "cube scale",
                value: scale,
            });
        }
        if !(config.zoom > 0.0 && config.zoom.is_finite()) {
            return Err(SurfaceError::InvalidValue {
                name: "zoom",
                value: config.zoom,
            });
        }
        let profile = self.create_profile(config);
        let limits = match Self::unranged_limits(config, &profile) {
            Some(limits) => limits,
            None => Self::ranged_limits(config, &profile, ranges)?,
        };
        let [phi, theta, psi] = config.euler;
        Ok(CubeAspect {
            limits,
            rotation: matrix::euler_to_rotation_degrees(phi, theta, psi),
            zoom: config.zoom,
            x_offset: config.x_offset,
            y_offset: config.y_offset,
        })
    }

    fn create_surface(&self, bounds: ScreenRect, profile: &CubeProfile, aspect: &CubeAspect) -> Result<CubeSurface, SurfaceError> {
        CubeSurface::new(bounds, profile, aspect)
    }

    fn create_navigator(&self, config: &CubeConfig) -> CubeNavigator {
        CubeNavigator {
            isotropic: config.isotropic,
            zoom_factor: config.zoom_factor,
        }
    }

    fn with_captioner(&self, profile: &CubeProfile, captioner: Arc<dyn Captioner>) -> CubeProfile {
        CubeProfile {
            captioner,
            ..profile.clone()
        }
    }
}

/// Configuration of a sky surface.
#[derive(Debug, Clone)]
pub struct SkyConfig {
    /// Fixed styling, including the projection.
    pub profile: SkyProfile,
    /// Field of view to show initially.
    pub fov: Option<SkyFov>,
    /// Zoom step per wheel click.
    pub zoom_factor: f64,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            profile: SkyProfile::default(),
            fov: None,
            zoom_factor: DEFAULT_ZOOM_FACTOR,
        }
    }
}

impl SkyConfig {
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.profile.projection = projection;
        self
    }

    pub fn with_reflect(mut self, reflect: bool) -> Self {
        self.profile.reflect = reflect;
        self
    }

    pub fn with_fov(mut self, lon: f64, lat: f64, radius: f64) -> Self {
        self.fov = Some(SkyFov::new(lon, lat, radius));
        self
    }

    pub fn with_sexagesimal(mut self, sexagesimal: bool) -> Self {
        self.profile.sexagesimal = sexagesimal;
        self
    }

    pub fn with_grid(mut self, grid: bool) -> Self {
        self.profile.grid = grid;
        self
    }

    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.profile.captioner = captioner;
        self
    }
}

/// Factory for [`SkySurface`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkySurfaceFactory;

impl SkySurfaceFactory {
    fn fov_aspect(config: &SkyConfig) -> Option<SkyAspect> {
        let p = &config.profile;
        SkyAspect::from_fov(p.projection, p.reflect, config.fov.as_ref()?)
    }
}

impl SurfaceFactory for SkySurfaceFactory {
    type Config = SkyConfig;
    type Profile = SkyProfile;
    type Aspect = SkyAspect;
    type Surface = SkySurface;
    type Navigator = SkyNavigator;

    fn create_profile(&self, config: &SkyConfig) -> SkyProfile {
        config.profile.clone()
    }

    fn use_ranges(&self, config: &SkyConfig) -> bool {
        Self::fov_aspect(config).is_none()
    }

    fn read_ranges(&self, _profile: &SkyProfile, positions: &dyn PositionSupplier) -> Vec<Range> {
        read_ranges(positions, &[false; 3])
    }

    fn create_aspect(&self, config: &SkyConfig, ranges: Option<&[Range]>) -> Result<SkyAspect, SurfaceError> {
        if let Some(aspect) = Self::fov_aspect(config) {
            return Ok(aspect);
        }
        let p = &config.profile;
        Ok(match ranges {
            Some(&[x, y, z, ..]) => SkyAspect::from_ranges(p.projection, p.reflect, &[x, y, z]),
            _ => SkyAspect::default_view(p.projection, p.reflect),
        })
    }

    fn create_surface(&self, bounds: ScreenRect, profile: &SkyProfile, aspect: &SkyAspect) -> Result<SkySurface, SurfaceError> {
        SkySurface::new(bounds, profile, aspect)
    }

    fn create_navigator(&self, config: &SkyConfig) -> SkyNavigator {
        SkyNavigator {
            zoom_factor: config.zoom_factor,
        }
    }

    fn with_captioner(&self, profile: &SkyProfile, captioner: Arc<dyn Captioner>) -> SkyProfile {
        SkyProfile {
            captioner,
            ..profile.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_limits_win_over_data() {
        let limits = AxisLimits::new(2.0, 4.0);
        assert_eq!(get_limits(&limits, false, Some(Range::new(0.0, 100.0))), Some(Range::new(2.0, 4.0)));
        assert_eq!(get_limits(&limits, false, None), Some(Range::new(2.0, 4.0)));
        assert_eq!(get_limits(&AxisLimits::default(), false, None), None);
    }

    #[test]
    fn partial_limits_narrow_the_data_range() {
        let limits = AxisLimits {
            min: Some(10.0),
            ..AxisLimits::default()
        };
        assert_eq!(get_limits(&limits, false, Some(Range::new(0.0, 100.0))), Some(Range::new(10.0, 100.0)));
        let halves = AxisLimits {
            subrange: Subrange::new(0.5, 1.0),
            ..AxisLimits::default()
        };
        assert_eq!(get_limits(&halves, false, Some(Range::new(0.0, 100.0))), Some(Range::new(50.0, 100.0)));
    }

    #[test]
    fn log_limits_reject_non_positive_bounds() {
        let limits = AxisLimits::new(0.0, 100.0);
        let r = get_limits(&limits, true, Some(Range::new(1.0, 1000.0))).expect("ranged");
        assert_eq!(r, Range::new(1.0, 100.0));
        assert_eq!(get_limits(&AxisLimits::default(), true, Some(Range::empty())), Some(Range::new(1.0, 10.0)));
        assert_eq!(get_limits(&AxisLimits::default(), false, Some(Range::empty())), Some(Range::new(0.0, 1.0)));
    }

    #[test]
    fn ranges_skip_non_positive_log_values() {
        let positions = vec![[-1.0, 5.0], [2.0, 0.0], [3.0, f64::NAN]];
        let ranges = read_ranges(&positions, &[false, true]);
        assert_eq!(ranges[0], Range::new(-1.0, 3.0));
        assert_eq!(ranges[1], Range::new(5.0, 5.0));
    }

    #[test]
    fn plane_aspect_from_config_or_data() {
        let factory = PlaneSurfaceFactory;
        let fixed = PlaneConfig::default()
            .with_x_limits(AxisLimits::new(0.0, 1.0))
            .with_y_limits(AxisLimits::new(5.0, 6.0));
        assert!(!factory.use_ranges(&fixed));
        assert_eq!(factory.create_aspect(&fixed, None), Ok(PlaneAspect::new(0.0, 1.0, 5.0, 6.0)));
        let open = PlaneConfig::default();
        assert!(factory.use_ranges(&open));
        let ranges = [Range::new(-3.0, 3.0), Range::new(10.0, 20.0)];
        assert_eq!(factory.create_aspect(&open, Some(&ranges)), Ok(PlaneAspect::new(-3.0, 3.0, 10.0, 20.0)));
    }

    #[test]
    fn time_window_defaults_around_now() {
        let now = 1.7e9;
        let open = AxisLimits::default();
        assert_eq!(time_limits(&open, Range::empty(), now), Range::new(now - DEFAULT_TIME_RANGE_SEC, now));
        let start = AxisLimits {
            min: Some(now + 100.0),
            ..AxisLimits::default()
        };
        let r = time_limits(&start, Range::empty(), now);
        assert_eq!(r, Range::new(now + 100.0, now + 100.0 + DEFAULT_TIME_RANGE_SEC));
        assert_eq!(time_limits(&open, Range::new(1e9, 1.1e9), now), Range::new(1e9, 1.1e9));
    }

    #[test]
    fn time_aspect_ends_now_without_data() {
        let aspect = TimeSurfaceFactory
            .create_aspect(&TimeConfig::default(), None)
            .expect("default aspect");
        let now = Utc::now().timestamp() as f64;
        assert!((aspect.t.max - now).abs() < 60.0);
        assert!((aspect.t.span() - DEFAULT_TIME_RANGE_SEC).abs() < 1e-3);
        assert_eq!(aspect.y, Range::new(0.0, 1.0));
    }

    #[test]
    fn isotropic_cube_snaps_centre_to_zero() {
        assert_eq!(iso_center(-1.0, 1.2, ISO_CENTER_TOLERANCE), 0.0);
        assert_eq!(iso_center(4.0, 6.0, ISO_CENTER_TOLERANCE), 5.0);
        let config = CubeConfig::default().with_isotropic(None, [None; 3]);
        let ranges = [Range::new(-1.0, 1.2), Range::new(4.0, 6.0), Range::new(-0.5, 0.5)];
        let aspect = CubeSurfaceFactory.create_aspect(&config, Some(&ranges)).expect("aspect");
        let near = |r: Range, lo: f64, hi: f64| (r.min - lo).abs() < 1e-9 && (r.max - hi).abs() < 1e-9;
        assert!(near(aspect.limits[0], -1.2, 1.2), "{:?}", aspect.limits[0]);
        assert!(near(aspect.limits[1], 3.8, 6.2), "{:?}", aspect.limits[1]);
        assert!(near(aspect.limits[2], -1.2, 1.2), "{:?}", aspect.limits[2]);
    }

    #[test]
    fn cube_defaults_and_validation() {
        let factory = CubeSurfaceFactory;
        let config = CubeConfig::default().with_limits([AxisLimits::new(0.0, 1.0); 3]);
        assert!(!factory.use_ranges(&config));
        let aspect = factory.create_aspect(&config, None).expect("aspect");
        let euler = aspect.euler_degrees();
        assert!((euler[0] - 30.0).abs() < 1e-6 && (euler[1] + 15.0).abs() < 1e-6);
        let bad = config.clone().with_zoom(0.0, 0.0, 0.0);
        assert!(matches!(factory.create_aspect(&bad, None), Err(SurfaceError::InvalidValue { name: "zoom", .. })));
        let iso = CubeConfig::default().with_isotropic(Some(2.0), [Some(0.0), Some(1.0), Some(2.0)]);
        assert!(!factory.use_ranges(&iso));
        let aspect = factory.create_aspect(&iso, None).expect("aspect");
        assert_eq!(aspect.limits[2], Range::new(1.0, 3.0));
    }

    #[test]
    fn sky_prefers_field_of_view() {
        let factory = SkySurfaceFactory;
        let open = SkyConfig::default().with_projection(Projection::Tan);
        assert!(factory.use_ranges(&open));
        let all_sky = [Range::new(-1.0, 1.0); 3];
        let default = SkyAspect::default_view(Projection::Tan, false);
        assert_eq!(factory.create_aspect(&open, Some(&all_sky)), Ok(default));
        let fov = open.clone().with_fov(10.0, 20.0, 5.0);
        assert!(!factory.use_ranges(&fov));
        let aspect = factory.create_aspect(&fov, None).expect("fov aspect");
        assert!(aspect.zoom > default.zoom);
    }
}
