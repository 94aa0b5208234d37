//! Three-dimensional surface viewed as a rotated, orthographically
//! projected cube.
//!
//! Data coordinates are normalised into `-1..=1` on each axis (after any
//! log and flip), rotated by the aspect's matrix and projected by dropping
//! the rotated Y component, which becomes the depth. Screen X increases
//! left to right, data Z points up the screen and Y into it.

use std::f64::consts::FRAC_PI_2;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rayon::prelude::*;

use super::{
    AxisAnnotation, PositionSupplier, Surface, format_axis_value, hash_f64s, same_captioner,
};
use super::plane::{check_bounds, check_range};
use crate::axis::{Axis, AxisScale};
use crate::captioner::{Captioner, FixedCaptioner, Orientation};
use crate::error::SurfaceError;
use crate::geom::{Affine, Insets, ScreenPoint, ScreenRect};
use crate::matrix::{self, Matrix3, Vector3};
use crate::range::Range;
use crate::render::{Color, FillStyle, LineSegment, LineStyle, RenderCommand, RenderList};
use crate::tick::{BasicTicker, Tick, Ticker};

const NEIGHBOUR_LEVELS: usize = 4;

/// Pixel radii searched, smallest first, when picking nearby data points.
const NEIGHBOUR_RADII: [f64; NEIGHBOUR_LEVELS] = [2.0, 4.0, 8.0, 16.0];

/// Attempts at turning axis text the right way round before settling for
/// whatever the last attempt gave.
const ORIENTATION_ATTEMPTS: usize = 6;

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// A vertex of the data cube.
///
/// Bit `i` of the index is set when the corner sits at the normalised
/// upper end of axis `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Corner(u8);

impl Corner {
    /// Corner at the normalised lower end of every axis.
    pub const ORIGIN: Self = Self(0);

    /// All eight corners in index order.
    pub const ALL: [Self; 8] = [
        Self(0),
        Self(1),
        Self(2),
        Self(3),
        Self(4),
        Self(5),
        Self(6),
        Self(7),
    ];

    /// Index in `0..8`.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Whether the corner is at the upper end of each axis.
    pub fn flags(self) -> [bool; 3] {
        [self.0 & 1 != 0, self.0 & 2 != 0, self.0 & 4 != 0]
    }

    /// Corners sharing an edge with this one; element `i` differs along
    /// axis `i`.
    pub fn adjacent(self) -> [Self; 3] {
        [Self(self.0 ^ 1), Self(self.0 ^ 2), Self(self.0 ^ 4)]
    }

    /// Position in normalised space.
    pub fn normalised(self) -> Vector3 {
        self.flags().map(|upper| if upper { 1.0 } else { -1.0 })
    }
}

/// Current view of a cube surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeAspect {
    /// Data limits on X, Y and Z.
    pub limits: [Range; 3],
    /// Rotation applied to normalised coordinates.
    pub rotation: Matrix3,
    /// Magnification; 1 fits the cube in the bounds at any rotation.
    pub zoom: f64,
    /// Horizontal shift in units of the pixel scale.
    pub x_offset: f64,
    /// Vertical shift in units of the pixel scale.
    pub y_offset: f64,
}

impl CubeAspect {
    /// Unzoomed, unshifted view of the given limits.
    pub fn new(limits: [Range; 3], rotation: Matrix3) -> Self {
        Self {
            limits,
            rotation,
            zoom: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }

    /// ZXZ Euler angles of the rotation, in degrees.
    pub fn euler_degrees(&self) -> [f64; 3] {
        matrix::rotation_to_euler_degrees(&self.rotation)
    }
}

/// Fixed styling of a cube surface.
#[derive(Debug, Clone)]
pub struct CubeProfile {
    /// Scale on each axis; only the log flag affects the geometry.
    pub scales: [AxisScale; 3],
    /// Reverse each axis.
    pub flips: [bool; 3],
    /// Axis titles.
    pub labels: [Option<String>; 3],
    /// Tick density multiplier per axis.
    pub crowds: [f64; 3],
    /// Draw the wire frame and its labelled axes.
    pub frame: bool,
    /// Draw minor ticks on the frame axes.
    pub minor: bool,
    /// Colour of frame edges in front of the data.
    pub frame_color: Color,
    /// Colour of frame edges behind the data.
    pub hidden_frame_color: Color,
    /// Plot background colour.
    pub background: Color,
    /// Text metrics and style.
    pub captioner: Arc<dyn Captioner>,
}

impl CubeProfile {
    fn log_flags(&self) -> [bool; 3] {
        self.scales.map(AxisScale::is_log)
    }
}

impl Default for CubeProfile {
    fn default() -> Self {
        Self {
            scales: [AxisScale::Linear; 3],
            flips: [false; 3],
            labels: [None, None, None],
            crowds: [1.0; 3],
            frame: true,
            minor: true,
            frame_color: Color::BLACK,
            hidden_frame_color: Color::LIGHT_GREY,
            background: Color::WHITE,
            captioner: Arc::new(FixedCaptioner::default()),
        }
    }
}

impl PartialEq for CubeProfile {
    fn eq(&self, other: &Self) -> bool {
        self.scales == other.scales
            && self.flips == other.flips
            && self.labels == other.labels
            && self.crowds == other.crowds
            && self.frame == other.frame
            && self.minor == other.minor
            && self.frame_color == other.frame_color
            && self.hidden_frame_color == other.hidden_frame_color
            && self.background == other.background
            && same_captioner(&self.captioner, &other.captioner)
    }
}

/// Rough pixel length of a cube edge that always fits in the bounds.
fn pixel_scale(width: f64, height: f64) -> f64 {
    (width.min(height) / 3f64.sqrt()).trunc()
}

/// Post-multiply `base` by rotations about the screen vertical and
/// horizontal axes.
fn rotate_xz(base: &Matrix3, phi: f64, psi: f64) -> Matrix3 {
    let around_z = matrix::screen_rotation(base, &[0.0, 0.0, 1.0], phi);
    let around_x = matrix::screen_rotation(base, &[1.0, 0.0, 0.0], psi);
    matrix::mm_mult(&matrix::mm_mult(base, &around_x), &around_z)
}

fn triple(dpos: &[f64]) -> Option<Vector3> {
    <[f64; 3]>::try_from(dpos.get(..3)?).ok()
}

/// The numeric core of a cube surface, free of styling so that it can be
/// shared across threads.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CubeGeometry {
    bounds: ScreenRect,
    limits: [Range; 3],
    logs: [bool; 3],
    rotation: Matrix3,
    g_scale: f64,
    g_zoom: f64,
    gx_off: f64,
    gy_off: f64,
    d_offs: [f64; 3],
    d_scales: [f64; 3],
}

impl CubeGeometry {
    fn new(bounds: ScreenRect, aspect: &CubeAspect, logs: [bool; 3], flips: [bool; 3]) -> Self {
        let g_scale = pixel_scale(bounds.width(), bounds.height());
        let mut d_offs = [0.0; 3];
        let mut d_scales = [0.0; 3];
        for i in 0..3 {
            let r = aspect.limits[i];
            let (lo, hi) = if logs[i] {
                (r.min.ln(), r.max.ln())
            } else {
                (r.min, r.max)
            };
            let flip = if flips[i] { -1.0 } else { 1.0 };
            d_offs[i] = -(lo + hi) * 0.5;
            d_scales[i] = flip * 2.0 / (hi - lo);
        }
        Self {
            bounds,
            limits: aspect.limits,
            logs,
            rotation: aspect.rotation,
            g_scale,
            g_zoom: aspect.zoom * g_scale * 0.5,
            gx_off: bounds.min.x + (aspect.x_offset * g_scale).trunc() + (bounds.width() * 0.5).trunc(),
            gy_off: bounds.min.y + (aspect.y_offset * g_scale).trunc() + (bounds.height() * 0.5).trunc(),
            d_offs,
            d_scales,
        }
    }

    fn normalise(&self, value: f64, i: usize) -> f64 {
        let v = if self.logs[i] { value.ln() } else { value };
        self.d_scales[i] * (self.d_offs[i] + v)
    }

    fn unnormalise(&self, norm: f64, i: usize) -> f64 {
        let v = norm / self.d_scales[i] - self.d_offs[i];
        if self.logs[i] { v.exp() } else { v }
    }

    fn in_range(&self, dpos: &Vector3) -> bool {
        dpos.iter()
            .zip(&self.limits)
            .all(|(&d, r)| r.min <= d && d <= r.max)
    }

    fn project_normalised(&self, npos: &Vector3) -> (ScreenPoint, f64) {
        let [rx, ry, rz] = matrix::mv_mult(&self.rotation, npos);
        (
            ScreenPoint::new(self.gx_off + rx * self.g_zoom, self.gy_off - rz * self.g_zoom),
            ry,
        )
    }

    fn data_to_graphic_z(&self, dpos: &Vector3, visible_only: bool) -> Option<(ScreenPoint, f64)> {
        if visible_only && !self.in_range(dpos) {
            return None;
        }
        let npos = [0, 1, 2].map(|i| self.normalise(dpos[i], i));
        let (gp, z) = self.project_normalised(&npos);
        if visible_only && !self.bounds.contains(gp) {
            return None;
        }
        Some((gp, z))
    }

    /// Data axes most nearly aligned with screen X, screen Y and depth.
    fn screen_directions(&self) -> [usize; 3] {
        let rotated = [0, 1, 2].map(|i| matrix::mv_mult(&self.rotation, &matrix::unit(i)));
        let mut ix = 0;
        for i in 1..3 {
            if rotated[i][0].abs() > rotated[ix][0].abs() {
                ix = i;
            }
        }
        let mut iy = usize::MAX;
        for i in (0..3).filter(|&i| i != ix) {
            if iy == usize::MAX || rotated[i][2].abs() > rotated[iy][2].abs() {
                iy = i;
            }
        }
        let depth = 3 - ix - iy;
        [ix, iy, depth]
    }

    /// Data position under `gpos` on the plane through the cube centre
    /// spanned by the two most screen-facing axes.
    fn facing_position(&self, gpos: ScreenPoint) -> Option<Vector3> {
        let [ix, iy, _] = self.screen_directions();
        let (g0, _) = self.project_normalised(&[0.0; 3]);
        let along = |axis: usize| {
            let (gu, _) = self.project_normalised(&matrix::unit(axis));
            let (dux, duy) = (gu.x - g0.x, gu.y - g0.y);
            let (dpx, dpy) = (gpos.x - g0.x, gpos.y - g0.y);
            (dpx * dux + dpy * duy) / (dux * dux + duy * duy)
        };
        let mut npos = [0.0; 3];
        npos[ix] = along(ix);
        npos[iy] = along(iy);
        let dpos = [0, 1, 2].map(|i| self.unnormalise(npos[i], i));
        dpos.iter().all(|d| d.is_finite()).then_some(dpos)
    }

    /// Mean position of plotted points near `gpos`, from the smallest
    /// search radius that catches any.
    fn neighbour_position(&self, gpos: ScreenPoint, positions: &dyn PositionSupplier) -> Option<Vector3> {
        let sums = (0..positions.chunk_count())
            .into_par_iter()
            .fold(Neighbours::default, |mut acc, chunk| {
                positions.for_each_in_chunk(chunk, &mut |dpos| self.accumulate(gpos, dpos, &mut acc));
                acc
            })
            .reduce(Neighbours::default, Neighbours::combine);
        sums.mean().map(|mean| {
            let mut dpos = mean;
            for (d, &log) in dpos.iter_mut().zip(&self.logs) {
                if log {
                    *d = d.exp();
                }
            }
            dpos
        })
    }

    fn accumulate(&self, gpos: ScreenPoint, dpos: &[f64], acc: &mut Neighbours) {
        let Some(dpos) = triple(dpos) else {
            return;
        };
        let Some((gp, _)) = self.data_to_graphic_z(&dpos, true) else {
            return;
        };
        let d2 = gpos.distance_sq(gp);
        let max = NEIGHBOUR_RADII[NEIGHBOUR_LEVELS - 1];
        if d2 > max * max {
            return;
        }
        let linear = [0, 1, 2].map(|i| if self.logs[i] { dpos[i].ln() } else { dpos[i] });
        for (k, radius) in NEIGHBOUR_RADII.iter().enumerate() {
            if d2 <= radius * radius {
                acc.counts[k] += 1;
                for i in 0..3 {
                    acc.totals[k][i] += linear[i];
                }
            }
        }
    }

    fn depth_vector(&self) -> Vector3 {
        matrix::mv_mult(&matrix::invert(&self.rotation), &[0.0, 1.0, 0.0])
    }

    /// The corner furthest from the viewer, if any lies behind the centre.
    fn back_corner(&self) -> Option<Corner> {
        let mut back = None;
        let mut zmax = 0.0;
        for corner in Corner::ALL {
            let (_, z) = self.project_normalised(&corner.normalised());
            if z > zmax {
                zmax = z;
                back = Some(corner);
            }
        }
        back
    }
}

/// Per-radius point counts and coordinate totals.
///
/// Log axes are totalled in log space.
#[derive(Debug, Clone, Copy, Default)]
struct Neighbours {
    counts: [u64; NEIGHBOUR_LEVELS],
    totals: [Vector3; NEIGHBOUR_LEVELS],
}

impl Neighbours {
    fn combine(mut self, other: Self) -> Self {
        for k in 0..NEIGHBOUR_LEVELS {
            self.counts[k] += other.counts[k];
            for i in 0..3 {
                self.totals[k][i] += other.totals[k][i];
            }
        }
        self
    }

    fn mean(&self) -> Option<Vector3> {
        let k = self.counts.iter().position(|&n| n > 0)?;
        let scale = 1.0 / self.counts[k] as f64;
        Some(self.totals[k].map(|t| t * scale))
    }
}

/// Surface plotting three data coordinates inside a rotatable cube.
#[derive(Debug, Clone)]
pub struct CubeSurface {
    geom: CubeGeometry,
    aspect: CubeAspect,
    profile: CubeProfile,
    ticks: [Vec<Tick>; 3],
}

impl CubeSurface {
    /// Build a surface for the given bounds, profile and view.
    pub fn new(bounds: ScreenRect, profile: &CubeProfile, aspect: &CubeAspect) -> Result<Self, SurfaceError> {
        check_bounds(bounds)?;
        for (i, &name) in AXIS_NAMES.iter().enumerate() {
            check_range(name, aspect.limits[i], profile.scales[i])?;
        }
        if !aspect.rotation.iter().all(|v| v.is_finite()) {
            return Err(SurfaceError::InvalidValue {
                name: "cube rotation",
                value: matrix::det(&aspect.rotation),
            });
        }
        if !(aspect.zoom > 0.0) || !aspect.zoom.is_finite() {
            return Err(SurfaceError::InvalidValue {
                name: "zoom",
                value: aspect.zoom,
            });
        }
        let geom = CubeGeometry::new(bounds, aspect, profile.log_flags(), profile.flips);
        let captioner = profile.captioner.as_ref();
        let npix = geom.g_scale.max(0.0) as u32;
        let ticks = [0, 1, 2].map(|i| {
            let r = aspect.limits[i];
            BasicTicker::for_scale(profile.scales[i])
                .get_ticks(r.min, r.max, profile.minor, captioner, &[Orientation::X], npix, profile.crowds[i])
                .ticks
        });
        Ok(Self {
            geom,
            aspect: *aspect,
            profile: profile.clone(),
            ticks,
        })
    }

    /// Profile this surface was built with.
    pub fn profile(&self) -> &CubeProfile {
        &self.profile
    }

    /// View this surface displays.
    pub fn aspect(&self) -> CubeAspect {
        self.aspect
    }

    /// Ticks on each frame axis, majors then minors.
    pub fn ticks(&self) -> &[Vec<Tick>; 3] {
        &self.ticks
    }

    /// Pixel length of a cube edge at zoom 1.
    pub fn pixel_scale(&self) -> f64 {
        self.geom.g_scale
    }

    /// Map a data position to graphics space along with its depth.
    ///
    /// Larger depths are further from the viewer.
    pub fn data_to_graphic_z(&self, dpos: &[f64], visible_only: bool) -> Option<(ScreenPoint, f64)> {
        self.geom.data_to_graphic_z(&triple(dpos)?, visible_only)
    }

    /// Map a normalised position to graphics space along with its depth.
    pub fn normalised_to_graphic_z(&self, npos: &Vector3) -> (ScreenPoint, f64) {
        self.geom.project_normalised(npos)
    }

    /// Normalised coordinate of data value `value` on axis `i`.
    pub fn normalise(&self, value: f64, i: usize) -> f64 {
        self.geom.normalise(value, i)
    }

    /// Whether a data position lies inside the cube limits.
    pub fn in_range(&self, dpos: &[f64]) -> bool {
        triple(dpos).is_some_and(|d| self.geom.in_range(&d))
    }

    /// Indices of the data axes closest to screen X, screen Y and the
    /// line of sight, in that order.
    pub fn screen_directions(&self) -> [usize; 3] {
        self.geom.screen_directions()
    }

    /// View rotated by dragging from `pos0` to `pos1`.
    pub fn pan(&self, pos0: ScreenPoint, pos1: ScreenPoint) -> CubeAspect {
        let scale = self.geom.g_scale * self.aspect.zoom;
        let phi = (pos0.x - pos1.x) / scale * FRAC_PI_2;
        let psi = (pos0.y - pos1.y) / scale * FRAC_PI_2;
        CubeAspect {
            rotation: rotate_xz(&self.aspect.rotation, phi, psi),
            ..self.aspect
        }
    }

    /// Limits zoomed about the cube centre on the axes selected by `flags`.
    pub fn center_zoom(&self, factor: f64, flags: [bool; 3]) -> CubeAspect {
        let mid = [0, 1, 2].map(|i| self.aspect.limits[i].center(self.geom.logs[i]));
        let factors = flags.map(|on| if on { factor } else { 1.0 });
        self.zoom_data(&mid, factors)
    }

    /// Limits zoomed about the data under `gpos` on the two screen-facing
    /// axes; the depth axis is left alone.
    pub fn point_zoom(&self, gpos: ScreenPoint, x_factor: f64, y_factor: f64) -> Option<CubeAspect> {
        let [ix, iy, _] = self.geom.screen_directions();
        let mut factors = [1.0; 3];
        factors[ix] = x_factor;
        factors[iy] = y_factor;
        let dpos = self.geom.facing_position(gpos)?;
        Some(self.zoom_data(&dpos, factors))
    }

    /// Limits shifted so that the data under `g0` moves to `g1`.
    pub fn point_pan(&self, g0: ScreenPoint, g1: ScreenPoint) -> Option<CubeAspect> {
        let d0 = self.geom.facing_position(g0)?;
        let d1 = self.geom.facing_position(g1)?;
        let limits = [0, 1, 2].map(|i| {
            let r = self.aspect.limits[i];
            Axis::pan_range(r.min, r.max, d0[i], d1[i], self.geom.logs[i])
        });
        Some(CubeAspect { limits, ..self.aspect })
    }

    /// Limits with the same extent, centred on `dpos`.
    pub fn center(&self, dpos: &[f64]) -> Option<CubeAspect> {
        let dpos = triple(dpos)?;
        let limits = [0, 1, 2].map(|i| {
            let r = self.aspect.limits[i];
            if self.geom.logs[i] {
                let offset = dpos[i] / (r.min * r.max).sqrt();
                Range::new(r.min * offset, r.max * offset)
            } else {
                let offset = dpos[i] - (r.min + r.max) * 0.5;
                Range::new(r.min + offset, r.max + offset)
            }
        });
        Some(CubeAspect { limits, ..self.aspect })
    }

    /// Limits zoomed about `dpos` by a factor per axis.
    pub fn zoom_data(&self, dpos: &Vector3, factors: [f64; 3]) -> CubeAspect {
        let limits = [0, 1, 2].map(|i| {
            let r = self.aspect.limits[i];
            Axis::zoom_range(r.min, r.max, dpos[i], factors[i], self.geom.logs[i])
        });
        CubeAspect { limits, ..self.aspect }
    }

    fn plot_frame(&self, front: bool, out: &mut RenderList) {
        let back = self.geom.back_corner();
        let color = if front {
            self.profile.frame_color
        } else {
            self.profile.hidden_frame_color
        };
        let style = LineStyle::thin(color);
        let mut edges = Vec::new();
        for c0 in Corner::ALL {
            for (iaxis, c1) in c0.adjacent().into_iter().enumerate() {
                if c1 < c0 {
                    continue;
                }
                let hidden = back == Some(c0) || back == Some(c1);
                if hidden == front {
                    continue;
                }
                if c0 == Corner::ORIGIN {
                    self.draw_frame_axis(iaxis, style, out);
                } else {
                    let (g0, _) = self.geom.project_normalised(&c0.normalised());
                    let (g1, _) = self.geom.project_normalised(&c1.normalised());
                    edges.push(LineSegment::new(g0, g1));
                }
            }
        }
        out.segments(edges, style);
    }

    /// Transform taking an axis frame onto the cube edge from the origin
    /// along `iaxis`, with the flag saying whether it runs forwards.
    ///
    /// Text in the frame ends up the right way up and not mirrored, unless
    /// the projection is too degenerate to settle within
    /// `ORIENTATION_ATTEMPTS`.
    fn axis_frame(&self, iaxis: usize, sx: f64, sy: f64) -> (Affine, bool) {
        let mut up = matrix::normalise(&matrix::cross(&self.geom.depth_vector(), &matrix::unit(iaxis)));
        let mut forward = true;
        let mut attempt = 0;
        loop {
            let settle = attempt >= ORIENTATION_ATTEMPTS;
            attempt += 1;
            let sense = if forward { 1.0 } else { -1.0 };
            let mut n00 = Corner::ORIGIN.normalised();
            let mut n10 = n00;
            n00[iaxis] = -sense;
            n10[iaxis] = sense;
            let uscale = (n10[iaxis] - n00[iaxis]) * sy / sx;
            let n01 = [0, 1, 2].map(|i| n00[i] + uscale * up[i]);
            let (t00, _) = self.geom.project_normalised(&n00);
            let (t10, _) = self.geom.project_normalised(&n10);
            let (t01, _) = self.geom.project_normalised(&n01);
            if t01.y < t00.y && !settle {
                up = matrix::scale(&up, -1.0);
                continue;
            }
            let frame = Affine::new(
                (t10.x - t00.x) / sx,
                (t10.y - t00.y) / sx,
                (t01.x - t00.x) / sy,
                (t01.y - t00.y) / sy,
                t00.x,
                t00.y,
            );
            if frame.determinant() < 0.0 && !settle {
                forward = !forward;
                continue;
            }
            return (frame, forward);
        }
    }

    fn draw_frame_axis(&self, iaxis: usize, style: LineStyle, out: &mut RenderList) {
        let captioner = self.profile.captioner.as_ref();
        let sx = self.geom.g_scale;
        let sy = captioner.caption_bounds("0").height;
        if !(sx > 0.0 && sy > 0.0) {
            return;
        }
        let (frame, forward) = self.axis_frame(iaxis, sx, sy);
        let det = frame.determinant();
        if det == 0.0 || det.is_nan() {
            return;
        }
        let r = self.aspect.limits[iaxis];
        let axis = Axis::new(
            0.0,
            sx,
            r.min,
            r.max,
            self.profile.scales[iaxis],
            !forward ^ self.profile.flips[iaxis],
        );
        out.line(
            frame.apply(ScreenPoint::new(0.0, 0.0)),
            frame.apply(ScreenPoint::new(sx, 0.0)),
            style,
        );
        let annotation = AxisAnnotation {
            frame,
            length: sx,
            orientation: Orientation::X,
            captioner,
        };
        annotation.draw(
            &self.ticks[iaxis],
            &|v| axis.data_to_graphics(v),
            self.profile.labels[iaxis].as_deref(),
            style,
            out,
        );
    }
}

impl Surface for CubeSurface {
    fn plot_bounds(&self) -> ScreenRect {
        self.geom.bounds
    }

    fn plot_insets(&self) -> Insets {
        Insets::default()
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn data_to_graphics(&self, dpos: &[f64], visible_only: bool) -> Option<ScreenPoint> {
        self.data_to_graphic_z(dpos, visible_only).map(|(gp, _)| gp)
    }

    fn graphics_to_data(&self, gpos: ScreenPoint, positions: Option<&dyn PositionSupplier>) -> Option<Vec<f64>> {
        let dpos = match positions {
            Some(positions) => self.geom.neighbour_position(gpos, positions)?,
            None => self.geom.facing_position(gpos)?,
        };
        Some(dpos.to_vec())
    }

    fn format_position(&self, dpos: &[f64]) -> String {
        let Some(dpos) = triple(dpos) else {
            return String::new();
        };
        let length = self.geom.g_scale * self.aspect.zoom;
        let texts: Vec<String> = (0..3)
            .map(|i| {
                let r = self.aspect.limits[i];
                let axis = Axis::new(0.0, length, r.min, r.max, self.profile.scales[i], false);
                format_axis_value(&axis, dpos[i])
            })
            .collect();
        texts.join(", ")
    }

    fn paint_background(&self, out: &mut RenderList) {
        let bounds = self.geom.bounds;
        out.push(RenderCommand::Rect {
            rect: bounds,
            style: FillStyle::solid(self.profile.background),
        });
        if self.profile.frame {
            out.clipped(bounds, |out| self.plot_frame(false, out));
        }
    }

    fn paint_foreground(&self, out: &mut RenderList) {
        if self.profile.frame {
            out.clipped(self.geom.bounds, |out| self.plot_frame(true, out));
        }
    }

    fn captioner(&self) -> &dyn Captioner {
        self.profile.captioner.as_ref()
    }
}

impl PartialEq for CubeSurface {
    fn eq(&self, other: &Self) -> bool {
        self.geom == other.geom
            && self.aspect == other.aspect
            && self.profile == other.profile
            && self.ticks == other.ticks
    }
}

impl Hash for CubeSurface {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let b = self.geom.bounds;
        hash_f64s(state, &[b.min.x, b.min.y, b.max.x, b.max.y]);
        for r in &self.aspect.limits {
            hash_f64s(state, &[r.min, r.max]);
        }
        hash_f64s(state, &self.aspect.rotation);
        hash_f64s(state, &[self.aspect.zoom, self.aspect.x_offset, self.aspect.y_offset]);
        self.profile.scales.hash(state);
        self.profile.flips.hash(state);
        self.profile.labels.hash(state);
        self.profile.frame.hash(state);
        for tick in self.ticks.iter().flatten() {
            tick.hash_into(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> ScreenRect {
        ScreenRect::from_origin_size(0.0, 0.0, 400.0, 400.0)
    }

    fn unit_cube() -> [Range; 3] {
        [Range::new(-1.0, 1.0); 3]
    }

    fn surface(profile: &CubeProfile, aspect: &CubeAspect) -> CubeSurface {
        CubeSurface::new(square(), profile, aspect).expect("valid surface")
    }

    fn near(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn corners_and_adjacency() {
        assert_eq!(Corner::ORIGIN.normalised(), [-1.0; 3]);
        assert_eq!(Corner::ALL[7].flags(), [true; 3]);
        let adjacent = Corner::ORIGIN.adjacent();
        assert_eq!(adjacent.map(Corner::index), [1, 2, 4]);
        for corner in Corner::ALL {
            for (i, other) in corner.adjacent().into_iter().enumerate() {
                assert_eq!(other.adjacent()[i], corner);
            }
        }
    }

    #[test]
    fn upper_corner_lands_right_and_up() {
        let s = surface(&CubeProfile::default(), &CubeAspect::new(unit_cube(), matrix::IDENTITY));
        assert_eq!(s.pixel_scale(), 230.0);
        let (centre, z0) = s.data_to_graphic_z(&[0.0, 0.0, 0.0], true).expect("visible");
        assert_eq!(centre, ScreenPoint::new(200.0, 200.0));
        assert_eq!(z0, 0.0);
        let (gp, z) = s.data_to_graphic_z(&[1.0, 1.0, 1.0], false).expect("mappable");
        assert_eq!(gp, ScreenPoint::new(315.0, 85.0));
        assert_eq!(z, 1.0);
        assert_eq!(s.data_to_graphics(&[1.5, 0.0, 0.0], true), None);

        let flipped = CubeProfile {
            flips: [true, false, false],
            ..CubeProfile::default()
        };
        let s = surface(&flipped, &CubeAspect::new(unit_cube(), matrix::IDENTITY));
        let gp = s.data_to_graphics(&[1.0, 1.0, 1.0], false).expect("mappable");
        assert!(gp.x < 200.0 && gp.y < 200.0);
    }

    #[test]
    fn log_axes_normalise_in_log_space() {
        let profile = CubeProfile {
            scales: [AxisScale::Log, AxisScale::Linear, AxisScale::Linear],
            ..CubeProfile::default()
        };
        let limits = [Range::new(1.0, 100.0), Range::new(-1.0, 1.0), Range::new(-1.0, 1.0)];
        let s = surface(&profile, &CubeAspect::new(limits, matrix::IDENTITY));
        assert!(near(s.normalise(10.0, 0), 0.0));
        assert!(near(s.normalise(100.0, 0), 1.0));
        let touching_zero = CubeAspect::new([Range::new(0.0, 1.0); 3], matrix::IDENTITY);
        assert!(matches!(
            CubeSurface::new(square(), &profile, &touching_zero),
            Err(SurfaceError::NonPositiveLog { axis: "x", .. })
        ));
    }

    #[test]
    fn facing_axes_roundtrip() {
        let limits = [Range::new(0.0, 10.0), Range::new(-1.0, 1.0), Range::new(100.0, 200.0)];
        for rotation in [matrix::IDENTITY, matrix::axial_rotation(&[0.0, 0.3, 0.0])] {
            let s = surface(&CubeProfile::default(), &CubeAspect::new(limits, rotation));
            assert_eq!(s.screen_directions(), [0, 2, 1]);
            for &(x, z) in &[(3.0, 150.0), (9.5, 110.0), (5.0, 199.0)] {
                let gp = s.data_to_graphics(&[x, 0.0, z], true).expect("visible");
                let d = s.graphics_to_data(gp, None).expect("invertible");
                assert!((d[0] - x).abs() < 1e-9, "{d:?}");
                assert!((d[2] - z).abs() < 1e-9, "{d:?}");
                assert!(near(d[1], 0.0));
            }
        }
    }

    #[test]
    fn nearby_points_fix_the_depth() {
        let s = surface(&CubeProfile::default(), &CubeAspect::new(unit_cube(), matrix::IDENTITY));
        let positions = vec![
            [0.5, 0.0, 0.5],
            [0.5, 0.9, 0.5],
            [0.52, 0.1, 0.5],
            [-0.5, 0.0, -0.5],
        ];
        let gp = s.data_to_graphics(&positions[0], true).expect("visible");
        let d = s
            .graphics_to_data(gp, Some(&positions))
            .expect("neighbours found");
        assert!(near(d[0], 0.5) && near(d[1], 0.45) && near(d[2], 0.5), "{d:?}");

        let between = ScreenPoint::new(gp.x + 1.15, gp.y);
        let d = s
            .graphics_to_data(between, Some(&positions))
            .expect("neighbours found");
        assert!(near(d[1], (0.9 + 0.1) / 3.0), "{d:?}");

        let empty = ScreenPoint::new(50.0, 350.0);
        assert_eq!(s.graphics_to_data(empty, Some(&positions)), None);
    }

    #[test]
    fn drag_rotates_without_touching_limits() {
        let aspect = CubeAspect::new(unit_cube(), matrix::euler_to_rotation_degrees(30.0, -15.0, 0.0));
        let s = surface(&CubeProfile::default(), &aspect);
        let still = s.pan(ScreenPoint::new(100.0, 100.0), ScreenPoint::new(100.0, 100.0));
        assert!(still.rotation.iter().zip(&aspect.rotation).all(|(a, b)| near(*a, *b)));
        let moved = s.pan(ScreenPoint::new(100.0, 100.0), ScreenPoint::new(160.0, 80.0));
        assert_eq!(moved.limits, aspect.limits);
        assert!((matrix::det(&moved.rotation) - 1.0).abs() < 1e-9);
        assert!(moved.rotation.iter().zip(&aspect.rotation).any(|(a, b)| !near(*a, *b)));
    }

    #[test]
    fn point_gestures_leave_depth_axis() {
        let s = surface(&CubeProfile::default(), &CubeAspect::new(unit_cube(), matrix::IDENTITY));
        let zoomed = s.point_zoom(ScreenPoint::new(200.0, 200.0), 2.0, 2.0).expect("zoomable");
        assert_eq!(zoomed.limits[0], Range::new(-0.5, 0.5));
        assert_eq!(zoomed.limits[1], Range::new(-1.0, 1.0));
        assert_eq!(zoomed.limits[2], Range::new(-0.5, 0.5));

        let panned = s
            .point_pan(ScreenPoint::new(200.0, 200.0), ScreenPoint::new(315.0, 200.0))
            .expect("pannable");
        assert!(near(panned.limits[0].min, -2.0) && near(panned.limits[0].max, 0.0));
        assert_eq!(panned.limits[1], Range::new(-1.0, 1.0));
        assert!(near(panned.limits[2].min, -1.0));
    }

    #[test]
    fn centring_and_centre_zoom() {
        let profile = CubeProfile {
            scales: [AxisScale::Linear, AxisScale::Linear, AxisScale::Log],
            ..CubeProfile::default()
        };
        let limits = [Range::new(0.0, 10.0), Range::new(-1.0, 1.0), Range::new(1.0, 100.0)];
        let s = surface(&profile, &CubeAspect::new(limits, matrix::IDENTITY));
        let centred = s.center(&[2.0, 0.0, 100.0]).expect("three coordinates");
        assert!(near(centred.limits[0].min, -3.0) && near(centred.limits[0].max, 7.0));
        assert!(near(centred.limits[2].min, 10.0) && near(centred.limits[2].max, 1000.0));
        assert_eq!(s.center(&[1.0, 2.0]), None);

        let zoomed = s.center_zoom(2.0, [true, false, true]);
        assert!(near(zoomed.limits[0].min, 2.5) && near(zoomed.limits[0].max, 7.5));
        assert_eq!(zoomed.limits[1], limits[1]);
        assert!(near(zoomed.limits[2].min, 10f64.sqrt()) && near(zoomed.limits[2].max, 1000f64.sqrt()));
    }

    #[test]
    fn back_corner_follows_rotation() {
        let s = surface(&CubeProfile::default(), &CubeAspect::new(unit_cube(), matrix::IDENTITY));
        assert_eq!(s.geom.back_corner().map(Corner::flags), Some([false, true, false]));
    }

    #[test]
    fn frame_splits_between_passes() {
        let aspect = CubeAspect::new(unit_cube(), matrix::euler_to_rotation_degrees(30.0, -15.0, 0.0));
        let profile = CubeProfile {
            labels: [Some("X".to_owned()), Some("Y".to_owned()), Some("Z".to_owned())],
            ..CubeProfile::default()
        };
        let s = surface(&profile, &aspect);
        let mut back = RenderList::new();
        s.paint_background(&mut back);
        let mut front = RenderList::new();
        s.paint_foreground(&mut front);
        assert!(matches!(back.commands()[0], RenderCommand::Rect { .. }));
        assert!(matches!(front.commands()[0], RenderCommand::ClipRect(_)));
        let texts = back
            .commands()
            .iter()
            .chain(front.commands())
            .filter(|c| matches!(c, RenderCommand::Text { .. }))
            .count();
        assert!(texts >= 6, "{texts}");

        let bare = surface(
            &CubeProfile {
                frame: false,
                ..CubeProfile::default()
            },
            &aspect,
        );
        let mut out = RenderList::new();
        bare.paint_foreground(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn position_text_has_three_parts() {
        let s = surface(&CubeProfile::default(), &CubeAspect::new(unit_cube(), matrix::IDENTITY));
        assert_eq!(s.format_position(&[0.0, 0.5, -0.25]).split(", ").count(), 3);
        assert_eq!(s.format_position(&[0.0]), "");
    }

    #[test]
    fn bad_views_are_rejected() {
        let mut aspect = CubeAspect::new(unit_cube(), matrix::IDENTITY);
        aspect.zoom = 0.0;
        assert!(matches!(
            CubeSurface::new(square(), &CubeProfile::default(), &aspect),
            Err(SurfaceError::InvalidValue { name: "zoom", .. })
        ));
        let empty = CubeAspect::new([Range::new(1.0, 1.0); 3], matrix::IDENTITY);
        assert!(matches!(
            CubeSurface::new(square(), &CubeProfile::default(), &empty),
            Err(SurfaceError::NoRange { axis: "x" })
        ));
    }
}
