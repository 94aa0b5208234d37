//! Celestial-sphere surface.
//!
//! Data positions are unit vectors. A rotation matrix carries them into the
//! view frame, the projection maps that onto a dimensionless plane, and a
//! zoom and offset scale the plane into the plot bounds.

use std::f64::consts::PI;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::warn;

use super::{PositionSupplier, Surface, hash_f64s, insets_for, same_captioner};
use crate::captioner::{Captioner, FixedCaptioner};
use crate::error::SurfaceError;
use crate::geom::{Insets, ScreenPoint, ScreenRect};
use crate::grid::{GridKind, GridLine, GridLiner};
use crate::matrix::{self, Matrix3, Vector3};
use crate::projection::{
    PlanePoint, Projection, ProjectionShape, is_reflected, lon_lat_vector, rotate_to_center,
    vertical_rotate,
};
use crate::range::Range;
use crate::render::{Color, FillStyle, LineStyle, RenderCommand, RenderList};

use super::plane::check_bounds;

/// Largest zoom chosen when fitting a view to data ranges.
const MAX_RANGE_ZOOM: f64 = 1e7;

/// Extent on every unit-vector axis above which data is treated as all-sky.
const ALL_SKY_SPAN: f64 = 0.9;

/// Smallest plot side, in pixels, on which a grid is drawn.
const MIN_GRID_PIXELS: f64 = 32.0;

/// Vertices used to outline elliptical projection shapes.
const OUTLINE_VERTICES: usize = 120;

/// Distance in pixels within which a grid line end counts as on an edge.
const EDGE_TOLERANCE: f64 = 0.5;

const SIGHT: Vector3 = [1.0, 0.0, 0.0];
const SKY_OUTLINE: Color = Color::new(0.5, 0.5, 0.5, 1.0);

/// Current view of a sky surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyAspect {
    /// Rotation from data vectors to the view frame.
    pub rotation: Matrix3,
    /// Magnification; 1 fits the whole projection inside the bounds.
    pub zoom: f64,
    /// Horizontal offset of the projection centre, in units of the
    /// unzoomed plane scale.
    pub x_offset: f64,
    /// Vertical offset of the projection centre, downwards.
    pub y_offset: f64,
}

impl SkyAspect {
    pub fn new(rotation: Matrix3, zoom: f64, x_offset: f64, y_offset: f64) -> Self {
        Self {
            rotation,
            zoom,
            x_offset,
            y_offset,
        }
    }

    /// Whole-sky view used when nothing better is known.
    pub fn default_view(projection: Projection, reflect: bool) -> Self {
        let rotation = projection.fixed_rotation(reflect).unwrap_or_else(|| {
            vertical_rotate((-15f64).to_radians(), (-10f64).to_radians(), reflect)
        });
        Self::new(rotation, 1.0, 0.0, 0.0)
    }

    /// View centred on a field of view.
    ///
    /// Gives `None` if the field is not usable.
    pub fn from_fov(projection: Projection, reflect: bool, fov: &SkyFov) -> Option<Self> {
        let radius = fov.radius.to_radians();
        if !(radius > 0.0) || !fov.lon.is_finite() || !fov.lat.is_finite() {
            return None;
        }
        let r = lon_lat_vector(fov.lon.to_radians(), fov.lat.to_radians());
        let half = projection.shape().half_height();
        match projection.fixed_rotation(reflect) {
            Some(rotation) => {
                let p = projection.project(&matrix::mv_mult(&rotation, &r))?;
                let zoom = half / radius;
                Some(Self::new(rotation, zoom, -p.x * zoom, p.y * zoom))
            }
            None => {
                let rotation = rotate_to_center(&r, reflect);
                let zoom = projection
                    .zenithal_radius(radius)
                    .filter(|rho| *rho > 0.0)
                    .map_or(1.0, |rho| half / rho);
                Some(Self::new(rotation, zoom, 0.0, 0.0))
            }
        }
    }

    /// View covering the given ranges of the three unit-vector components.
    pub fn from_ranges(projection: Projection, reflect: bool, ranges: &[Range; 3]) -> Self {
        let default = Self::default_view(projection, reflect);
        if is_all_sky(ranges) {
            return default;
        }
        let Some(center) = range_center(ranges) else {
            return default;
        };
        let shape = projection.shape();
        match projection.fixed_rotation(reflect) {
            Some(rotation) => {
                let (px, py) = projected_ranges(projection, &rotation, ranges);
                if !px.is_finite() || !py.is_finite() {
                    return default;
                }
                let fit = |half: f64, span: f64| half / (0.5 * span).max(half / MAX_RANGE_ZOOM);
                let zoom = fit(shape.half_width(), px.span())
                    .min(fit(shape.half_height(), py.span()))
                    .max(1.0);
                Self::new(rotation, zoom, -px.center(false) * zoom, py.center(false) * zoom)
            }
            None => {
                let rotation = rotate_to_center(&center, reflect);
                if is_single_point(ranges) {
                    return Self::new(rotation, 1.0, 0.0, 0.0);
                }
                let (px, py) = projected_ranges(projection, &rotation, ranges);
                let half = shape.half_height();
                let pmax = [px.min, px.max, py.min, py.max]
                    .into_iter()
                    .filter(|v| v.is_finite())
                    .fold(half / MAX_RANGE_ZOOM, |acc, v| acc.max(v.abs()));
                Self::new(rotation, half / pmax, 0.0, 0.0)
            }
        }
    }

    fn is_finite(&self) -> bool {
        self.rotation.iter().all(|v| v.is_finite())
            && self.zoom.is_finite()
            && self.x_offset.is_finite()
            && self.y_offset.is_finite()
    }
}

/// Field of view: a centre and radius in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyFov {
    /// Central longitude.
    pub lon: f64,
    /// Central latitude.
    pub lat: f64,
    /// Radius.
    pub radius: f64,
}

impl SkyFov {
    pub fn new(lon: f64, lat: f64, radius: f64) -> Self {
        Self { lon, lat, radius }
    }
}

fn is_all_sky(ranges: &[Range; 3]) -> bool {
    ranges.iter().all(|r| r.span() >= ALL_SKY_SPAN)
}

fn is_single_point(ranges: &[Range; 3]) -> bool {
    ranges.iter().all(|r| r.is_finite() && r.span() == 0.0)
}

/// Unit vector towards the middle of the ranges, if they are not spread
/// round the whole sphere.
fn range_center(ranges: &[Range; 3]) -> Option<Vector3> {
    let center = ranges.map(|r| 0.5 * (r.min + r.max));
    if center.iter().any(|c| !c.is_finite()) || matrix::norm(&center) < 0.3 {
        return None;
    }
    Some(matrix::normalise(&center))
}

/// Plane extents reached by the corners of the range box.
fn projected_ranges(projection: Projection, rotation: &Matrix3, ranges: &[Range; 3]) -> (Range, Range) {
    let mut px = Range::empty();
    let mut py = Range::empty();
    for corner in 0..8 {
        let r = [0, 1, 2].map(|i| {
            if corner & (1 << i) == 0 {
                ranges[i].min
            } else {
                ranges[i].max
            }
        });
        let s = matrix::normalise(&matrix::mv_mult(rotation, &r));
        if let Some(p) = projection.project(&s) {
            px.submit(p.x);
            py.submit(p.y);
        }
    }
    (px, py)
}

/// Fixed styling of a sky surface.
#[derive(Debug, Clone)]
pub struct SkyProfile {
    /// Projection from the sphere to the plane.
    pub projection: Projection,
    /// Longitude increases right to left.
    pub reflect: bool,
    /// Show coordinates as hours/degrees, minutes and seconds.
    pub sexagesimal: bool,
    /// Draw the coordinate grid.
    pub grid: bool,
    /// Label the coordinate grid.
    pub labels: bool,
    /// Grid line density multiplier.
    pub crowd: f64,
    /// Grid line colour.
    pub grid_color: Color,
    /// Grid label colour.
    pub axis_color: Color,
    /// Sky background colour.
    pub background: Color,
    /// Text metrics and style.
    pub captioner: Arc<dyn Captioner>,
}

impl Default for SkyProfile {
    fn default() -> Self {
        Self {
            projection: Projection::Sin,
            reflect: true,
            sexagesimal: false,
            grid: true,
            labels: true,
            crowd: 1.0,
            grid_color: Color::GRID_GREY,
            axis_color: Color::BLACK,
            background: Color::WHITE,
            captioner: Arc::new(FixedCaptioner::default()),
        }
    }
}

impl PartialEq for SkyProfile {
    fn eq(&self, other: &Self) -> bool {
        self.projection == other.projection
            && self.reflect == other.reflect
            && self.sexagesimal == other.sexagesimal
            && self.grid == other.grid
            && self.labels == other.labels
            && self.crowd == other.crowd
            && self.grid_color == other.grid_color
            && self.axis_color == other.axis_color
            && self.background == other.background
            && same_captioner(&self.captioner, &other.captioner)
    }
}

/// Which plot edge a grid label is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Bottom,
    Left,
    Top,
    Right,
}

/// Surface showing part of the celestial sphere through a projection.
#[derive(Debug, Clone)]
pub struct SkySurface {
    bounds: ScreenRect,
    profile: SkyProfile,
    aspect: SkyAspect,
    unrotation: Matrix3,
    g_scale: f64,
    g_center: ScreenPoint,
    g_zoom: f64,
    sky_fills_bounds: bool,
}

impl SkySurface {
    /// Build a surface for the given bounds, profile and view.
    pub fn new(bounds: ScreenRect, profile: &SkyProfile, aspect: &SkyAspect) -> Result<Self, SurfaceError> {
        check_bounds(bounds)?;
        if !aspect.is_finite() {
            return Err(SurfaceError::InvalidValue {
                name: "sky aspect",
                value: f64::NAN,
            });
        }
        if !(aspect.zoom > 0.0) {
            return Err(SurfaceError::InvalidValue {
                name: "zoom",
                value: aspect.zoom,
            });
        }
        let shape = profile.projection.shape();
        let (w, h) = (bounds.width(), bounds.height());
        let g_scale = (w / (2.0 * shape.half_width())).min(h / (2.0 * shape.half_height()));
        // pixel-aligned projection centre
        let g_center = ScreenPoint::new(
            bounds.min.x + (aspect.x_offset * g_scale + w * 0.5).trunc(),
            bounds.min.y + (aspect.y_offset * g_scale + h * 0.5).trunc(),
        );
        let g_zoom = aspect.zoom * g_scale;
        let mut surface = Self {
            bounds,
            profile: profile.clone(),
            aspect: *aspect,
            unrotation: matrix::invert(&aspect.rotation),
            g_scale,
            g_center,
            g_zoom,
            sky_fills_bounds: false,
        };
        surface.sky_fills_bounds = [
            bounds.min,
            ScreenPoint::new(bounds.max.x, bounds.min.y),
            bounds.max,
            ScreenPoint::new(bounds.min.x, bounds.max.y),
        ]
        .iter()
        .all(|&corner| shape.contains(surface.graphics_to_plane(corner)));
        Ok(surface)
    }

    /// Profile this surface was built with.
    pub fn profile(&self) -> &SkyProfile {
        &self.profile
    }

    /// View this surface was built with.
    pub fn aspect(&self) -> SkyAspect {
        self.aspect
    }

    /// Graphics position of the projection centre; may lie outside the bounds.
    pub fn sky_center(&self) -> ScreenPoint {
        self.g_center
    }

    /// Whether every point of the plot bounds shows sky.
    pub fn sky_fills_bounds(&self) -> bool {
        self.sky_fills_bounds
    }

    fn graphics_to_plane(&self, gpos: ScreenPoint) -> PlanePoint {
        PlanePoint::new(
            (gpos.x - self.g_center.x) / self.g_zoom,
            (gpos.y - self.g_center.y) / -self.g_zoom,
        )
    }

    fn plane_to_graphics(&self, p: PlanePoint) -> ScreenPoint {
        ScreenPoint::new(self.g_center.x + p.x * self.g_zoom, self.g_center.y - p.y * self.g_zoom)
    }

    fn rotate(&self, dpos: &[f64]) -> Option<Vector3> {
        let d: Vector3 = [*dpos.first()?, *dpos.get(1)?, *dpos.get(2)?];
        Some(matrix::mv_mult(&self.aspect.rotation, &d))
    }

    fn in_bounds(&self, pos: ScreenPoint) -> bool {
        let b = self.bounds;
        pos.x >= b.min.x && pos.x <= b.max.x && pos.y >= b.min.y && pos.y <= b.max.y
    }

    fn with_view(&self, rotation: Matrix3, zoom: f64, x_offset: f64, y_offset: f64) -> SkyAspect {
        debug_assert!(matrix::det(&self.aspect.rotation) * matrix::det(&rotation) >= 0.0);
        SkyAspect::new(rotation, zoom, x_offset, y_offset)
    }

    /// View after dragging from `pos0` to `pos1`, or `None` if the drag
    /// starts outside the plot.
    pub fn pan(&self, pos0: ScreenPoint, pos1: ScreenPoint) -> Option<SkyAspect> {
        self.in_bounds(pos0).then(|| self.proj_pan(pos0, pos1))
    }

    /// View after zooming about `pos`, or `None` outside the plot.
    pub fn zoom(&self, pos: ScreenPoint, factor: f64) -> Option<SkyAspect> {
        self.in_bounds(pos).then(|| self.proj_zoom(pos, factor))
    }

    /// Rotate the sky under the cursor, translating the plane for
    /// projections that cannot rotate.
    pub fn proj_pan(&self, pos0: ScreenPoint, pos1: ScreenPoint) -> SkyAspect {
        let a = &self.aspect;
        match self.profile.projection.cursor_rotate(
            &a.rotation,
            self.graphics_to_plane(pos0),
            self.graphics_to_plane(pos1),
        ) {
            Some(rotation) => self.with_view(rotation, a.zoom, a.x_offset, a.y_offset),
            None => self.flat_pan(pos0, pos1),
        }
    }

    /// Zoom keeping the sky position under the cursor fixed, magnifying
    /// the plane for projections that cannot rotate.
    pub fn proj_zoom(&self, pos: ScreenPoint, factor: f64) -> SkyAspect {
        let a = &self.aspect;
        let p0 = self.graphics_to_plane(pos);
        let p1 = PlanePoint::new(p0.x / factor, p0.y / factor);
        match self.profile.projection.proj_rotate(&a.rotation, p0, p1) {
            Some(rotation) => self.with_view(rotation, a.zoom * factor, a.x_offset, a.y_offset),
            None => self.flat_zoom(pos, factor),
        }
    }

    /// Translate the whole plane.
    pub fn flat_pan(&self, pos0: ScreenPoint, pos1: ScreenPoint) -> SkyAspect {
        let a = &self.aspect;
        self.with_view(
            a.rotation,
            a.zoom,
            a.x_offset + (pos1.x - pos0.x) / self.g_scale,
            a.y_offset + (pos1.y - pos0.y) / self.g_scale,
        )
    }

    /// Magnify the whole plane about `pos`.
    pub fn flat_zoom(&self, pos: ScreenPoint, factor: f64) -> SkyAspect {
        let a = &self.aspect;
        let dz = a.zoom * (1.0 - factor);
        self.with_view(
            a.rotation,
            a.zoom * factor,
            a.x_offset + (pos.x - self.g_center.x) / self.g_zoom * dz,
            a.y_offset + (pos.y - self.g_center.y) / self.g_zoom * dz,
        )
    }

    /// View with the sky position at graphics point `gpos` moved to the
    /// middle of the plot and the zoom multiplied by `factor`.
    pub fn reframe_at(&self, gpos: ScreenPoint, factor: f64) -> SkyAspect {
        let a = &self.aspect;
        let zoom = a.zoom * factor;
        let p0 = self.graphics_to_plane(gpos);
        let p1 = self.graphics_to_plane(self.bounds.center());
        match self.profile.projection.proj_rotate(&a.rotation, p0, p1) {
            Some(rotation) => self.with_view(rotation, zoom, a.x_offset, a.y_offset),
            None => self.with_view(a.rotation, zoom, -p0.x * zoom, p0.y * zoom),
        }
    }

    /// View centred on data position `dpos` and zoomed by `factor`.
    pub fn reframe(&self, dpos: &[f64], factor: f64) -> Option<SkyAspect> {
        let gpos = self.data_to_graphics(dpos, false)?;
        Some(self.reframe_at(gpos, factor))
    }

    /// View with `dpos` moved to the middle of the plot.
    pub fn center(&self, dpos: &[f64]) -> Option<SkyAspect> {
        let gpos = self.data_to_graphics(dpos, false)?;
        self.pan(gpos, self.bounds.center())
    }

    /// Field of view currently shown, or `None` for the default view.
    pub fn fov(&self) -> Option<SkyFov> {
        let projection = self.profile.projection;
        let reflect = is_reflected(&self.aspect.rotation);
        if self.aspect == SkyAspect::default_view(projection, reflect) {
            return None;
        }
        let center = if projection.is_rotatable() {
            matrix::mv_mult(&self.unrotation, &SIGHT)
        } else {
            self.graphics_to_data(self.bounds.center(), None)
                .map(|d| [d[0], d[1], d[2]])?
        };
        let half = projection.shape().half_height();
        let rho = half / self.aspect.zoom;
        let radius = projection.zenithal_angle(rho).unwrap_or(rho).to_degrees();
        let npix = self.bounds.width().max(self.bounds.height());
        let pix_deg = (1.0 / self.g_zoom).to_degrees();
        let (lon, lat) = lon_lat_degrees(&center);
        Some(SkyFov {
            lon: round_number(lon, pix_deg * 0.1),
            lat: round_number(lat, pix_deg * 0.1),
            radius: round_number(radius, radius / (10.0 * npix)),
        })
    }

    fn grid_liner(&self) -> GridLiner {
        GridLiner::new(
            self.bounds,
            self.aspect.rotation,
            self.profile.projection,
            self.g_center,
            self.g_zoom,
            self.profile.sexagesimal,
            self.profile.crowd,
            self.profile.crowd,
        )
    }

    /// Grid lines for the current view; failures are logged and give none.
    pub fn grid_lines(&self) -> Vec<GridLine> {
        if self.bounds.width() < MIN_GRID_PIXELS || self.bounds.height() < MIN_GRID_PIXELS {
            return Vec::new();
        }
        match self.grid_liner().grid() {
            Ok(lines) => lines,
            Err(err) => {
                warn!("sky grid not drawn: {err}");
                Vec::new()
            }
        }
    }

    /// Label boxes for grid lines that reach the plot edges.
    ///
    /// Labels sit outside the bounds when the sky fills them, otherwise
    /// just inside.
    fn grid_labels(&self, lines: &[GridLine]) -> Vec<(String, ScreenRect)> {
        let captioner = self.profile.captioner.as_ref();
        let pad = captioner.pad();
        let b = self.bounds;
        let external = self.sky_fills_bounds;
        let mut placed: Vec<(String, ScreenRect)> = Vec::new();
        for line in lines {
            if placed.iter().any(|(text, _)| *text == line.label) {
                continue;
            }
            let ends = [line.points.first(), line.points.last()];
            let found = ends.into_iter().flatten().find_map(|&p| {
                let edge = edge_of(b, p)?;
                let wanted = match (external, line.kind) {
                    (false, _) => true,
                    (true, GridKind::Meridian) => edge == Edge::Bottom,
                    (true, GridKind::Parallel) => edge == Edge::Left,
                };
                wanted.then_some((p, edge))
            });
            let Some((p, edge)) = found else {
                continue;
            };
            let size = captioner.caption_bounds(&line.label);
            let (w, h) = (size.width, size.height);
            let origin = match (external, edge) {
                (true, Edge::Bottom) => ScreenPoint::new(p.x - w * 0.5, b.max.y + pad),
                (true, Edge::Left) => ScreenPoint::new(b.min.x - pad - w, p.y - h * 0.5),
                (true, Edge::Top) => ScreenPoint::new(p.x - w * 0.5, b.min.y - pad - h),
                (true, Edge::Right) => ScreenPoint::new(b.max.x + pad, p.y - h * 0.5),
                (false, Edge::Bottom) => ScreenPoint::new(p.x - w * 0.5, b.max.y - pad - h),
                (false, Edge::Left) => ScreenPoint::new(b.min.x + pad, p.y - h * 0.5),
                (false, Edge::Top) => ScreenPoint::new(p.x - w * 0.5, b.min.y + pad),
                (false, Edge::Right) => ScreenPoint::new(b.max.x - pad - w, p.y - h * 0.5),
            };
            let rect = ScreenRect::from_origin_size(origin.x, origin.y, w, h);
            if placed.iter().all(|(_, other)| !overlaps(rect, *other)) {
                placed.push((line.label.clone(), rect));
            }
        }
        placed
    }

    fn outline(&self) -> Vec<ScreenPoint> {
        match self.profile.projection.shape() {
            ProjectionShape::Ellipse { rx, ry } => (0..OUTLINE_VERTICES)
                .map(|i| {
                    let t = 2.0 * PI * i as f64 / OUTLINE_VERTICES as f64;
                    self.plane_to_graphics(PlanePoint::new(rx * t.cos(), ry * t.sin()))
                })
                .collect(),
            ProjectionShape::Rect {
                half_width,
                half_height,
            } => [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .into_iter()
                .map(|(sx, sy)| self.plane_to_graphics(PlanePoint::new(sx * half_width, sy * half_height)))
                .collect(),
        }
    }
}

fn edge_of(b: ScreenRect, p: ScreenPoint) -> Option<Edge> {
    if (p.y - b.max.y).abs() < EDGE_TOLERANCE {
        Some(Edge::Bottom)
    } else if (p.x - b.min.x).abs() < EDGE_TOLERANCE {
        Some(Edge::Left)
    } else if (p.y - b.min.y).abs() < EDGE_TOLERANCE {
        Some(Edge::Top)
    } else if (p.x - b.max.x).abs() < EDGE_TOLERANCE {
        Some(Edge::Right)
    } else {
        None
    }
}

fn overlaps(a: ScreenRect, b: ScreenRect) -> bool {
    a.min.x < b.max.x && b.min.x < a.max.x && a.min.y < b.max.y && b.min.y < a.max.y
}

/// Longitude in `[0, 360)` and latitude of a unit vector, in degrees.
fn lon_lat_degrees(v: &Vector3) -> (f64, f64) {
    let mut lon = v[1].atan2(v[0]);
    if lon < 0.0 {
        lon += 2.0 * PI;
    }
    let lat = 0.5 * PI - v[2].clamp(-1.0, 1.0).acos();
    (lon.to_degrees(), lat.to_degrees())
}

/// Round `value` to the decimal places that `epsilon` calls for.
fn round_number(value: f64, epsilon: f64) -> f64 {
    if !(epsilon > 0.0) || !value.is_finite() {
        return value;
    }
    let ndp = decimal_places(epsilon).clamp(0, 15);
    let scale = 10f64.powi(ndp);
    (value * scale).round() / scale
}

/// Places after the decimal point needed to show `value` to one
/// significant figure; negative for values above ten.
fn decimal_places(value: f64) -> i32 {
    -(value.log10().floor() as i32)
}

/// `hh:mm:ss.s` style text for a non-negative value, wrapping at `wrap`.
fn sexagesimal_text(value: f64, dp: usize, wrap: i64) -> String {
    let scale = 10f64.powi(dp as i32);
    let total = (value * 3600.0 * scale).round() / scale;
    let whole = total.floor() as i64;
    let (mut units, minutes) = (whole / 3600, (whole % 3600) / 60);
    let seconds = total - (units * 3600 + minutes * 60) as f64;
    if units >= wrap {
        units -= wrap;
    }
    let width = if dp == 0 { 2 } else { dp + 3 };
    format!("{units:02}:{minutes:02}:{seconds:0width$.dp$}")
}

fn drop_seconds(mut text: String) -> String {
    if let Some(i) = text.rfind(':') {
        text.truncate(i);
    }
    text
}

fn format_position_sexagesimal(lon_rad: f64, lat_rad: f64, pix_rad: f64) -> String {
    let second_dp = decimal_places(pix_rad / PI * 12.0 * 3600.0);
    let arcsec_dp = decimal_places(pix_rad / PI * 180.0 * 3600.0);
    let mut lon = sexagesimal_text(lon_rad.to_degrees() / 15.0, second_dp.max(0) as usize, 24);
    if second_dp < -1 {
        lon = drop_seconds(lon);
    }
    let sign = if lat_rad < 0.0 { '-' } else { '+' };
    let mut lat = sexagesimal_text(lat_rad.to_degrees().abs(), arcsec_dp.max(0) as usize, i64::MAX);
    if arcsec_dp < -1 {
        lat = drop_seconds(lat);
    }
    format!("{lon}, {sign}{lat}")
}

fn format_position_decimal(lon_rad: f64, lat_rad: f64, pix_rad: f64) -> String {
    let (lon, lat, pix) = (lon_rad.to_degrees(), lat_rad.to_degrees(), pix_rad.to_degrees());
    let (slon, slat) = if pix >= 1.0 {
        (format!("{}", lon.round() as i64), format!("{}", lat.round() as i64))
    } else {
        let ndp = decimal_places(pix).max(0) as usize;
        (format!("{lon:.ndp$}"), format!("{lat:.ndp$}"))
    };
    if slat.starts_with('-') || slat.starts_with('+') {
        format!("{slon}, {slat}")
    } else {
        format!("{slon}, +{slat}")
    }
}

/// Image of `b` on the other side of `a`, by the rotation taking `b` to `a`.
fn reflect_point(a: &Vector3, b: &Vector3) -> Vector3 {
    let axial = matrix::scale(&matrix::cross(a, b), -1.0);
    let m = matrix::axial_rotation(&axial);
    matrix::mv_mult(&matrix::transpose(&m), a)
}

impl Surface for SkySurface {
    fn plot_bounds(&self) -> ScreenRect {
        self.bounds
    }

    fn plot_insets(&self) -> Insets {
        if !(self.profile.labels && self.sky_fills_bounds) {
            return Insets::default();
        }
        let boxes: Vec<_> = self
            .grid_labels(&self.grid_lines())
            .into_iter()
            .map(|(_, rect)| rect)
            .collect();
        insets_for(self.bounds, &boxes)
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn data_to_graphics(&self, dpos: &[f64], visible_only: bool) -> Option<ScreenPoint> {
        let r = self.rotate(dpos)?;
        let gp = self.plane_to_graphics(self.profile.projection.project(&r)?);
        if visible_only && !self.bounds.contains(gp) {
            return None;
        }
        Some(gp)
    }

    fn data_to_graphics_offset(
        &self,
        dpos0: &[f64],
        gpos0: ScreenPoint,
        dpos1: &[f64],
        visible_only: bool,
    ) -> Option<ScreenPoint> {
        let direct = self.data_to_graphics(dpos1, visible_only);
        let a: Vector3 = [*dpos0.first()?, *dpos0.get(1)?, *dpos0.get(2)?];
        let b: Vector3 = [*dpos1.first()?, *dpos1.get(1)?, *dpos1.get(2)?];
        let reflected = self.data_to_graphics(&reflect_point(&a, &b), visible_only);
        let mirror = |p: ScreenPoint| ScreenPoint::new(2.0 * gpos0.x - p.x, 2.0 * gpos0.y - p.y);
        match (direct, reflected) {
            (Some(ap), Some(bp)) => {
                if ap.distance_sq(gpos0) <= bp.distance_sq(gpos0) {
                    Some(ap)
                } else {
                    Some(mirror(bp))
                }
            }
            (Some(ap), None) => Some(ap),
            (None, Some(bp)) => Some(mirror(bp)),
            (None, None) => None,
        }
    }

    fn graphics_to_data(&self, gpos: ScreenPoint, _positions: Option<&dyn PositionSupplier>) -> Option<Vec<f64>> {
        let r = self.profile.projection.unproject(self.graphics_to_plane(gpos))?;
        Some(matrix::mv_mult(&self.unrotation, &r).to_vec())
    }

    fn is_continuous_line(&self, dpos0: &[f64], dpos1: &[f64]) -> bool {
        match (self.rotate(dpos0), self.rotate(dpos1)) {
            (Some(a), Some(b)) => self.profile.projection.is_continuous_line(&a, &b),
            _ => true,
        }
    }

    fn format_position(&self, dpos: &[f64]) -> String {
        let (Some(&x), Some(&y), Some(&z)) = (dpos.first(), dpos.get(1), dpos.get(2)) else {
            return String::new();
        };
        let pix_rad = 2.0 * PI / self.g_zoom;
        let lat = 0.5 * PI - z.clamp(-1.0, 1.0).acos();
        let mut lon = y.atan2(x);
        if lon < 0.0 {
            lon += 2.0 * PI;
        }
        if self.profile.sexagesimal {
            format_position_sexagesimal(lon, lat, pix_rad)
        } else {
            format_position_decimal(lon, lat, pix_rad)
        }
    }

    fn paint_background(&self, out: &mut RenderList) {
        let style = FillStyle {
            fill: self.profile.background,
            stroke: SKY_OUTLINE,
            stroke_width: 1.0,
        };
        if self.sky_fills_bounds {
            out.push(RenderCommand::Rect {
                rect: self.bounds,
                style,
            });
        } else {
            let points = self.outline();
            out.clipped(self.bounds, |out| {
                out.push(RenderCommand::Polygon { points, style });
            });
        }
    }

    fn paint_foreground(&self, out: &mut RenderList) {
        if !(self.profile.grid || self.profile.labels) {
            return;
        }
        let lines = self.grid_lines();
        if self.profile.grid {
            let style = LineStyle::thin(self.profile.grid_color);
            for line in &lines {
                out.push(RenderCommand::Polyline {
                    points: line.points.clone(),
                    style,
                });
            }
        }
        if self.profile.labels {
            let captioner = self.profile.captioner.as_ref();
            for (text, rect) in self.grid_labels(&lines) {
                captioner.draw_caption(&text, rect.min, out);
            }
        }
    }

    fn captioner(&self) -> &dyn Captioner {
        self.profile.captioner.as_ref()
    }
}

impl PartialEq for SkySurface {
    fn eq(&self, other: &Self) -> bool {
        self.bounds == other.bounds && self.aspect == other.aspect && self.profile == other.profile
    }
}

impl Hash for SkySurface {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let b = self.bounds;
        hash_f64s(state, &[b.min.x, b.min.y, b.max.x, b.max.y]);
        hash_f64s(state, &self.aspect.rotation);
        hash_f64s(state, &[self.aspect.zoom, self.aspect.x_offset, self.aspect.y_offset, self.profile.crowd]);
        self.profile.projection.hash(state);
        self.profile.reflect.hash(state);
        self.profile.sexagesimal.hash(state);
        self.profile.grid.hash(state);
        self.profile.labels.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> ScreenRect {
        ScreenRect::from_origin_size(0.0, 0.0, 400.0, 400.0)
    }

    fn surface(profile: &SkyProfile, aspect: &SkyAspect) -> SkySurface {
        SkySurface::new(square(), profile, aspect).expect("valid surface")
    }

    fn unreflected() -> SkyProfile {
        SkyProfile {
            reflect: false,
            ..SkyProfile::default()
        }
    }

    fn near(a: ScreenPoint, b: ScreenPoint, tol: f64) -> bool {
        a.distance_sq(b) < tol * tol
    }

    #[test]
    fn view_centre_maps_to_middle() {
        let s = surface(&unreflected(), &SkyAspect::new(matrix::IDENTITY, 1.0, 0.0, 0.0));
        assert_eq!(s.data_to_graphics(&[1.0, 0.0, 0.0], true), Some(ScreenPoint::new(200.0, 200.0)));
        assert_eq!(s.data_to_graphics(&[0.0, 0.0, 1.0], false), Some(ScreenPoint::new(200.0, 0.0)));
        assert_eq!(s.data_to_graphics(&[0.0, 1.0, 0.0], false), Some(ScreenPoint::new(400.0, 200.0)));
        assert_eq!(s.data_to_graphics(&[-1.0, 0.0, 0.0], false), None);
        assert!(!s.sky_fills_bounds());
    }

    #[test]
    fn graphics_roundtrip() {
        let profile = SkyProfile::default();
        let s = surface(&profile, &SkyAspect::default_view(Projection::Sin, true));
        for gpos in [ScreenPoint::new(200.0, 200.0), ScreenPoint::new(120.5, 260.0), ScreenPoint::new(310.0, 90.0)] {
            let d = s.graphics_to_data(gpos, None).expect("on sky");
            assert!((matrix::norm(&[d[0], d[1], d[2]]) - 1.0).abs() < 1e-12);
            let back = s.data_to_graphics(&d, true).expect("visible");
            assert!(near(back, gpos, 1e-9), "{back:?}");
        }
        assert_eq!(s.graphics_to_data(ScreenPoint::new(1.0, 1.0), None), None);
    }

    #[test]
    fn fov_roundtrip() {
        let profile = SkyProfile::default();
        let fov = SkyFov::new(30.0, 20.0, 10.0);
        let aspect = SkyAspect::from_fov(Projection::Sin, true, &fov).expect("usable fov");
        let s = surface(&profile, &aspect);
        let back = s.fov().expect("not the default view");
        assert!((back.lon - 30.0).abs() < 1e-3);
        assert!((back.lat - 20.0).abs() < 1e-3);
        assert!((back.radius - 10.0).abs() < 1e-3);
        let centre = s
            .data_to_graphics(&lon_lat_vector(30f64.to_radians(), 20f64.to_radians()), true)
            .expect("visible");
        assert!(near(centre, ScreenPoint::new(200.0, 200.0), 1e-6));
        let default = surface(&profile, &SkyAspect::default_view(Projection::Sin, true));
        assert_eq!(default.fov(), None);
    }

    #[test]
    fn ranges_choose_view() {
        let all = [Range::new(-1.0, 1.0), Range::new(-1.0, 1.0), Range::new(-1.0, 1.0)];
        assert_eq!(
            SkyAspect::from_ranges(Projection::Sin, true, &all),
            SkyAspect::default_view(Projection::Sin, true)
        );
        let small = [Range::new(0.98, 0.99), Range::new(0.05, 0.1), Range::new(0.1, 0.15)];
        let aspect = SkyAspect::from_ranges(Projection::Sin, true, &small);
        assert!(aspect.zoom > 5.0);
        let s = surface(&SkyProfile::default(), &aspect);
        for corner in 0..8 {
            let v = matrix::normalise(&[0, 1, 2].map(|i| {
                if corner & (1 << i) == 0 { small[i].min } else { small[i].max }
            }));
            let g = s.data_to_graphics(&v, false).expect("in front");
            assert!(g.x > -1e-6 && g.x < 400.0 + 1e-6 && g.y > -1e-6 && g.y < 400.0 + 1e-6, "{g:?}");
        }
    }

    #[test]
    fn pan_keeps_point_under_cursor() {
        let s = surface(&SkyProfile::default(), &SkyAspect::default_view(Projection::Sin, true));
        let (g0, g1) = (ScreenPoint::new(200.0, 200.0), ScreenPoint::new(240.0, 220.0));
        let d = s.graphics_to_data(g0, None).expect("on sky");
        let panned = surface(s.profile(), &s.pan(g0, g1).expect("in bounds"));
        let moved = panned.data_to_graphics(&d, false).expect("visible");
        assert!(near(moved, g1, 1e-3), "{moved:?}");
        assert!(s.pan(ScreenPoint::new(-5.0, 10.0), g1).is_none());
    }

    #[test]
    fn zoom_keeps_point_under_cursor() {
        let s = surface(&SkyProfile::default(), &SkyAspect::default_view(Projection::Sin, true));
        let pos = ScreenPoint::new(250.0, 180.0);
        let d = s.graphics_to_data(pos, None).expect("on sky");
        let zoomed = surface(s.profile(), &s.zoom(pos, 2.0).expect("in bounds"));
        assert!((zoomed.aspect().zoom - 2.0).abs() < 1e-12);
        let moved = zoomed.data_to_graphics(&d, false).expect("visible");
        assert!(near(moved, pos, 1e-3), "{moved:?}");
    }

    #[test]
    fn fixed_projection_pans_flat() {
        let profile = SkyProfile {
            projection: Projection::Car0,
            ..SkyProfile::default()
        };
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 400.0, 200.0);
        let s = SkySurface::new(bounds, &profile, &SkyAspect::default_view(Projection::Car0, true)).expect("valid");
        let (g0, g1) = (ScreenPoint::new(100.0, 100.0), ScreenPoint::new(140.0, 90.0));
        let d = s.graphics_to_data(g0, None).expect("on sky");
        let aspect = s.pan(g0, g1).expect("in bounds");
        assert_eq!(aspect.rotation, s.aspect().rotation);
        let panned = SkySurface::new(bounds, &profile, &aspect).expect("valid");
        let moved = panned.data_to_graphics(&d, false).expect("mappable");
        assert!(near(moved, g1, 1.5), "{moved:?}");
    }

    #[test]
    fn offset_mapping_stays_beside_neighbour_across_seam() {
        let profile = SkyProfile {
            projection: Projection::Car0,
            ..SkyProfile::default()
        };
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 400.0, 200.0);
        let s = SkySurface::new(bounds, &profile, &SkyAspect::default_view(Projection::Car0, true)).expect("valid");
        let d0 = lon_lat_vector(179.9f64.to_radians(), 0.0);
        let d1 = lon_lat_vector((-179.9f64).to_radians(), 0.0);
        let g0 = s.data_to_graphics(&d0, false).expect("mappable");
        let direct = s.data_to_graphics(&d1, false).expect("mappable");
        assert!(direct.distance_sq(g0) > 100.0 * 100.0);
        assert!(!s.is_continuous_line(&d0, &d1));
        let offset = s.data_to_graphics_offset(&d0, g0, &d1, false).expect("mappable");
        assert!(offset.distance_sq(g0) < 5.0 * 5.0, "{offset:?}");
    }

    #[test]
    fn position_text_follows_pixel_size() {
        let aspect = SkyAspect::new(matrix::IDENTITY, 100.0, 0.0, 0.0);
        let d = lon_lat_vector(10f64.to_radians(), 20f64.to_radians());
        let s = surface(&unreflected(), &aspect);
        assert_eq!(s.format_position(&d), "10.00, +20.00");
        let sex = surface(
            &SkyProfile {
                sexagesimal: true,
                ..unreflected()
            },
            &aspect,
        );
        assert_eq!(sex.format_position(&d), "00:40:00, +20:00:00");
        let wide = surface(&unreflected(), &SkyAspect::new(matrix::IDENTITY, 1.0, 0.0, 0.0));
        assert_eq!(wide.format_position(&lon_lat_vector(0.0, (-5f64).to_radians())), "0, -5");
    }

    #[test]
    fn background_shape_depends_on_coverage() {
        let profile = SkyProfile::default();
        let whole = surface(&profile, &SkyAspect::default_view(Projection::Sin, true));
        let mut out = RenderList::new();
        whole.paint_background(&mut out);
        assert!(out.commands().iter().any(|c| matches!(c, RenderCommand::Polygon { .. })));
        let close = surface(&profile, &SkyAspect::new(matrix::IDENTITY, 10.0, 0.0, 0.0));
        assert!(close.sky_fills_bounds());
        let mut out = RenderList::new();
        close.paint_background(&mut out);
        assert!(matches!(out.commands(), [RenderCommand::Rect { .. }]));
    }

    #[test]
    fn foreground_draws_grid_and_labels() {
        let s = surface(&SkyProfile::default(), &SkyAspect::new(matrix::IDENTITY, 4.0, 0.0, 0.0));
        let mut out = RenderList::new();
        s.paint_foreground(&mut out);
        let polylines = out
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::Polyline { .. }))
            .count();
        assert!(polylines > 4);
        assert!(out.commands().iter().any(|c| matches!(c, RenderCommand::Text { .. })));
        let insets = s.plot_insets();
        assert!(insets.bottom > 0.0 || insets.left > 0.0);
    }

    #[test]
    fn bad_zoom_is_rejected() {
        let err = SkySurface::new(square(), &SkyProfile::default(), &SkyAspect::new(matrix::IDENTITY, 0.0, 0.0, 0.0));
        assert!(matches!(err, Err(SurfaceError::InvalidValue { name: "zoom", .. })));
    }
}
