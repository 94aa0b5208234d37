//! Sky projections between unit vectors and a dimensionless plane.
//!
//! Vectors are given in the rotated (view) frame, where `+x` points at the
//! viewer. Plane `x` runs right and plane `y` runs up; the surface applies
//! the pixel scaling and the screen's downward `y`.

use std::f64::consts::{FRAC_PI_2, PI, SQRT_2};
use std::fmt;

use log::debug;

use crate::matrix::{self, Matrix3, Vector3};

/// Iteration cap for the Newton solver used by rotation gestures.
pub const NEWTON_MAX_ITERATIONS: usize = 24;

/// Convergence threshold of the Newton solver: one micro-arcsecond.
pub const NEWTON_TOLERANCE: f64 = PI / 180.0 / 3600.0 * 1e-6;

/// Half-width of the square plane region shown by the gnomonic projection.
const TAN_LIMIT: f64 = 4.0;

/// Radius of the plane region shown by the stereographic projection.
const STG_LIMIT: f64 = 4.0;

const NORTH: Vector3 = [0.0, 0.0, 1.0];
const SIGHT: Vector3 = [1.0, 0.0, 0.0];

/// Position on the projection plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanePoint {
    pub x: f64,
    pub y: f64,
}

impl PlanePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Region of the plane onto which the sky is projected, centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionShape {
    /// Ellipse with the given semi-axes.
    Ellipse { rx: f64, ry: f64 },
    /// Rectangle with the given half-sizes.
    Rect { half_width: f64, half_height: f64 },
}

impl ProjectionShape {
    /// Whether a plane point lies inside the region (boundary included).
    pub fn contains(self, p: PlanePoint) -> bool {
        match self {
            Self::Ellipse { rx, ry } => (p.x / rx).powi(2) + (p.y / ry).powi(2) <= 1.0,
            Self::Rect {
                half_width,
                half_height,
            } => p.x.abs() <= half_width && p.y.abs() <= half_height,
        }
    }

    /// Half the width of the bounding box.
    pub fn half_width(self) -> f64 {
        match self {
            Self::Ellipse { rx, .. } => rx,
            Self::Rect { half_width, .. } => half_width,
        }
    }

    /// Half the height of the bounding box.
    pub fn half_height(self) -> f64 {
        match self {
            Self::Ellipse { ry, .. } => ry,
            Self::Rect { half_height, .. } => half_height,
        }
    }
}

/// Supported sky projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Projection {
    /// Orthographic: a rotatable sphere.
    #[default]
    Sin,
    /// Hammer-Aitoff, longitude 180 at the centre.
    Aitoff,
    /// Hammer-Aitoff, longitude 0 at the centre.
    Aitoff0,
    /// Plate carrée, longitude 180 at the centre.
    Car,
    /// Plate carrée, longitude 0 at the centre.
    Car0,
    /// Gnomonic.
    Tan,
    /// Zenithal equidistant.
    Arc,
    /// Stereographic.
    Stg,
}

impl Projection {
    /// All supported projections.
    pub const ALL: [Self; 8] = [
        Self::Sin,
        Self::Aitoff,
        Self::Aitoff0,
        Self::Car,
        Self::Car0,
        Self::Tan,
        Self::Arc,
        Self::Stg,
    ];

    /// Short name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Aitoff => "aitoff",
            Self::Aitoff0 => "aitoff0",
            Self::Car => "car",
            Self::Car0 => "car0",
            Self::Tan => "tan",
            Self::Arc => "arc",
            Self::Stg => "stg",
        }
    }

    /// One-line description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Sin => "rotatable sphere",
            Self::Aitoff => "Hammer-Aitoff projection",
            Self::Aitoff0 => "Hammer-Aitoff projection with lon=0 at center",
            Self::Car => "Plate Carree projection (lon/lat on Cartesian axes)",
            Self::Car0 => "Plate Carree with lon=0 at center",
            Self::Tan => "gnomonic projection",
            Self::Arc => "zenithal equidistant projection",
            Self::Stg => "stereographic projection",
        }
    }

    /// Look a projection up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Whether the view can be rotated interactively.
    pub fn is_rotatable(self) -> bool {
        matches!(self, Self::Sin | Self::Tan | Self::Arc | Self::Stg)
    }

    /// Whether every view is free of seams.
    pub fn is_continuous(self) -> bool {
        self.is_rotatable()
    }

    /// Whether a straight screen line between two rotated vectors stays
    /// on one side of any seam.
    pub fn is_continuous_line(self, a: &Vector3, b: &Vector3) -> bool {
        if self.is_continuous() {
            return true;
        }
        !(a[0] < 0.0 && b[0] < 0.0 && (a[1] >= 0.0) != (b[1] >= 0.0))
    }

    /// Plane region covered by the projection.
    pub fn shape(self) -> ProjectionShape {
        match self {
            Self::Sin => ProjectionShape::Ellipse { rx: 1.0, ry: 1.0 },
            Self::Aitoff | Self::Aitoff0 => ProjectionShape::Ellipse {
                rx: 2.0 * SQRT_2,
                ry: SQRT_2,
            },
            Self::Car | Self::Car0 => ProjectionShape::Rect {
                half_width: PI,
                half_height: FRAC_PI_2,
            },
            Self::Tan => ProjectionShape::Rect {
                half_width: TAN_LIMIT,
                half_height: TAN_LIMIT,
            },
            Self::Arc => ProjectionShape::Ellipse { rx: PI, ry: PI },
            Self::Stg => ProjectionShape::Ellipse {
                rx: STG_LIMIT,
                ry: STG_LIMIT,
            },
        }
    }

    /// Project a rotated unit vector onto the plane.
    ///
    /// Gives `None` where the vector lies outside the projection's domain,
    /// such as the far hemisphere of the orthographic projection.
    pub fn project(self, r: &Vector3) -> Option<PlanePoint> {
        let [rx, ry, rz] = *r;
        let p = match self {
            Self::Sin => (rx >= 0.0).then_some(PlanePoint::new(ry, rz))?,
            Self::Tan => (rx > 0.0).then(|| PlanePoint::new(ry / rx, rz / rx))?,
            Self::Arc => {
                let theta = rx.clamp(-1.0, 1.0).acos();
                if theta == 0.0 {
                    PlanePoint::new(0.0, 0.0)
                } else {
                    let s = theta / theta.sin();
                    if !s.is_finite() {
                        return None;
                    }
                    PlanePoint::new(ry * s, rz * s)
                }
            }
            Self::Stg => {
                let k = 2.0 / (1.0 + rx);
                (1.0 + rx > 0.0 && k.is_finite()).then(|| PlanePoint::new(ry * k, rz * k))?
            }
            Self::Aitoff | Self::Aitoff0 => {
                let alpha = ry.atan2(rx);
                let delta = rz.clamp(-1.0, 1.0).asin();
                let half = 0.5 * alpha;
                let z = (1.0 + delta.cos() * half.cos()).sqrt();
                PlanePoint::new(2.0 * SQRT_2 * delta.cos() * half.sin() / z, SQRT_2 * delta.sin() / z)
            }
            Self::Car | Self::Car0 => PlanePoint::new(ry.atan2(rx), rz.clamp(-1.0, 1.0).asin()),
        };
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }

    /// Recover a rotated unit vector from a plane position inside the shape.
    pub fn unproject(self, p: PlanePoint) -> Option<Vector3> {
        if !self.shape().contains(p) {
            return None;
        }
        let PlanePoint { x, y } = p;
        let r = match self {
            Self::Sin => [(1.0 - x * x - y * y).max(0.0).sqrt(), x, y],
            Self::Tan => matrix::normalise(&[1.0, x, y]),
            Self::Arc => {
                let rho = x.hypot(y);
                if rho == 0.0 {
                    SIGHT
                } else {
                    let s = rho.sin() / rho;
                    [rho.cos(), x * s, y * s]
                }
            }
            Self::Stg => {
                let rho2 = x * x + y * y;
                let k = 4.0 / (4.0 + rho2);
                [(4.0 - rho2) / (4.0 + rho2), x * k, y * k]
            }
            Self::Aitoff | Self::Aitoff0 => {
                let z = (1.0 - (x / 4.0).powi(2) - (y / 2.0).powi(2)).sqrt();
                let alpha = 2.0 * (z * x).atan2(2.0 * (2.0 * z * z - 1.0));
                let delta = (y * z).clamp(-1.0, 1.0).asin();
                lon_lat_vector(alpha, delta)
            }
            Self::Car | Self::Car0 => lon_lat_vector(x, y),
        };
        r.iter().all(|c| c.is_finite()).then_some(r)
    }

    /// Rotation used by projections that cannot be rotated.
    pub fn fixed_rotation(self, reflect: bool) -> Option<Matrix3> {
        match self {
            Self::Aitoff | Self::Car => Some(vertical_rotate(0.0, PI, reflect)),
            Self::Aitoff0 | Self::Car0 => Some(vertical_rotate(0.0, 0.0, reflect)),
            _ => None,
        }
    }

    /// Plane distance from the centre of a point `theta` radians away,
    /// for zenithal projections.
    pub fn zenithal_radius(self, theta: f64) -> Option<f64> {
        match self {
            Self::Sin => Some(theta.min(FRAC_PI_2).sin()),
            Self::Tan => (theta < FRAC_PI_2).then(|| theta.tan()),
            Self::Arc => Some(theta.min(PI)),
            Self::Stg => Some(2.0 * (0.5 * theta.min(PI * 0.999)).tan()),
            _ => None,
        }
    }

    /// Angle from the centre of a point at plane distance `rho`.
    pub fn zenithal_angle(self, rho: f64) -> Option<f64> {
        match self {
            Self::Sin => Some(rho.min(1.0).asin()),
            Self::Tan => Some(rho.atan()),
            Self::Arc => Some(rho),
            Self::Stg => Some(2.0 * (0.5 * rho).atan()),
            _ => None,
        }
    }

    /// Rotation that drags the sky so the point under `pos0` moves to `pos1`.
    ///
    /// Falls back to a heuristic drag when no exact rotation exists.
    /// Fixed projections give `None`.
    pub fn cursor_rotate(self, rot0: &Matrix3, pos0: PlanePoint, pos1: PlanePoint) -> Option<Matrix3> {
        if !self.is_rotatable() {
            return None;
        }
        match self.generic_rotate(rot0, pos0, pos1) {
            Some(rot1) => Some(rot1),
            None => {
                debug!("no exact rotation from {pos0:?} to {pos1:?}, dragging instead");
                Some(drag_rotate(rot0, pos0, pos1))
            }
        }
    }

    /// Rotation taking the point under `pos0` to `pos1`, or the original
    /// rotation when that cannot be done. Fixed projections give `None`.
    pub fn proj_rotate(self, rot0: &Matrix3, pos0: PlanePoint, pos1: PlanePoint) -> Option<Matrix3> {
        if !self.is_rotatable() {
            return None;
        }
        Some(self.generic_rotate(rot0, pos0, pos1).unwrap_or(*rot0))
    }

    fn generic_rotate(self, rot0: &Matrix3, pos0: PlanePoint, pos1: PlanePoint) -> Option<Matrix3> {
        let rv0 = self.unproject(pos0)?;
        let target = self.unproject(pos1)?;
        let ru0 = matrix::mv_mult(&matrix::invert(rot0), &rv0);
        rotation_onto(&ru0, &target, rot0)
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit vector for a longitude and latitude in radians.
pub fn lon_lat_vector(lon: f64, lat: f64) -> Vector3 {
    let (slon, clon) = lon.sin_cos();
    let (slat, clat) = lat.sin_cos();
    [clat * clon, clat * slon, slat]
}

/// Rotation keeping the north pole on the vertical through the centre.
///
/// `delta` tilts the pole from vertical and `alpha` turns about it; with
/// `reflect` longitude increases right to left.
pub fn vertical_rotate(delta: f64, alpha: f64, reflect: bool) -> Matrix3 {
    let fr = if reflect { -1.0 } else { 1.0 };
    let (sa, ca) = alpha.sin_cos();
    let (sd, cd) = delta.sin_cos();
    [
        cd * ca,
        cd * sa * fr,
        -sd,
        -sa,
        ca * fr,
        0.0,
        sd * ca,
        sd * sa * fr,
        cd,
    ]
}

/// Rotation bringing unit vector `r` to the centre of the plane.
pub fn rotate_to_center(r: &Vector3, reflect: bool) -> Matrix3 {
    let fr = if reflect { -1.0 } else { 1.0 };
    let alpha = r[1].atan2(r[0]);
    let (sa, ca) = alpha.sin_cos();
    let delta = (-r[2]).atan2(ca * r[0] + sa * r[1]);
    vertical_rotate(delta, fr * alpha, reflect)
}

/// Whether a rotation matrix mirrors the sky.
pub fn is_reflected(rot: &Matrix3) -> bool {
    matrix::det(rot) < 0.0
}

/// Find `x` with `f(x) == 0` from `x0`, where `f` returns the value and
/// its derivative. Gives `None` if no root is found within
/// [`NEWTON_MAX_ITERATIONS`] steps.
pub fn newton_solve(x0: f64, f: impl Fn(f64) -> (f64, f64)) -> Option<f64> {
    let mut x = x0;
    for _ in 0..NEWTON_MAX_ITERATIONS {
        let (f0, f1) = f(x);
        if f0.abs() <= NEWTON_TOLERANCE {
            return Some(x);
        }
        x -= f0 / f1;
        if !x.is_finite() {
            return None;
        }
    }
    None
}

/// Vertical rotation that carries data-frame vector `ru` onto the rotated
/// vector `target`, starting the search from `rot0`.
fn rotation_onto(ru: &Vector3, target: &Vector3, rot0: &Matrix3) -> Option<Matrix3> {
    let reflect = is_reflected(rot0);
    let fr = if reflect { -1.0 } else { 1.0 };
    let [rx, ry, rz] = *ru;
    let (px, py) = (target[1], target[2]);
    let delta0 = (-rot0[2]).atan2(rot0[8]);
    let alpha0 = (-rot0[3]).atan2(rot0[4] * fr);
    let alpha = newton_solve(alpha0, |a| {
        let (sa, ca) = a.sin_cos();
        (-sa * rx + ca * ry * fr - px, -ca * rx - sa * ry * fr)
    })?;
    let (sa, ca) = alpha.sin_cos();
    let horiz = ca * rx + sa * ry * fr;
    let delta = newton_solve(delta0, |d| {
        let (sd, cd) = d.sin_cos();
        (sd * horiz + cd * rz - py, cd * horiz - sd * rz)
    })?;
    let rot1 = vertical_rotate(delta, alpha, reflect);
    let moved = matrix::mv_mult(&rot1, ru);
    let upright = matrix::mv_mult(&rot1, &NORTH)[2] > 0.0;
    (moved[0] * target[0] >= 0.0 && upright).then_some(rot1)
}

/// Rotation that feels like rolling the sphere by the plane displacement.
fn drag_rotate(rot0: &Matrix3, pos0: PlanePoint, pos1: PlanePoint) -> Matrix3 {
    let reflect = is_reflected(rot0);
    let fr = if reflect { -1.0 } else { 1.0 };
    let phi = pos1.x - pos0.x;
    let psi = pos1.y - pos0.y;
    let sight = matrix::mv_mult(&matrix::invert(rot0), &SIGHT);
    let hvec = matrix::normalise(&matrix::cross(&sight, &NORTH));
    let mut rm = *rot0;
    if hvec.iter().all(|c| c.is_finite()) {
        rm = matrix::rotate_around(&rm, &hvec, -psi);
    }
    rm = matrix::rotate_around(&rm, &NORTH, -phi * fr);
    if matrix::mv_mult(&rm, &NORTH)[2] >= 0.0 {
        rm
    } else {
        let delta = (-rm[2]).atan2(rm[8]).clamp(-FRAC_PI_2, FRAC_PI_2);
        let alpha = (-rm[3]).atan2(rm[4] * fr);
        vertical_rotate(delta, alpha, reflect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Vector3, b: &Vector3, tol: f64) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn sin_rejects_far_hemisphere() {
        assert_eq!(Projection::Sin.project(&[0.6, 0.8, 0.0]), Some(PlanePoint::new(0.8, 0.0)));
        assert_eq!(Projection::Sin.project(&[-0.1, 0.0, 0.99]), None);
        assert_eq!(Projection::Sin.unproject(PlanePoint::new(0.9, 0.9)), None);
    }

    #[test]
    fn unproject_inverts_project() {
        let r = matrix::normalise(&[0.8, -0.3, 0.4]);
        for projection in Projection::ALL {
            let p = projection.project(&r).expect("projectable");
            let back = projection.unproject(p).expect("inside shape");
            assert!(close(&back, &r, 1e-9), "{projection}: {back:?}");
        }
    }

    #[test]
    fn aitoff_fills_its_ellipse() {
        let edge = Projection::Aitoff0.project(&lon_lat_vector(PI * 0.999_999, 0.0)).expect("projectable");
        assert!((edge.x - 2.0 * SQRT_2).abs() < 1e-4);
        let pole = Projection::Aitoff0.project(&NORTH).expect("projectable");
        assert!(pole.x.abs() < 1e-12 && (pole.y - SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn fixed_projections_see_seam() {
        let a = lon_lat_vector(PI - 0.01, 0.0);
        let b = lon_lat_vector(-PI + 0.01, 0.0);
        assert!(!Projection::Car0.is_continuous_line(&a, &b));
        assert!(Projection::Car0.is_continuous_line(&a, &lon_lat_vector(PI - 0.2, 0.1)));
        assert!(Projection::Sin.is_continuous_line(&a, &b));
        assert!(Projection::Car.cursor_rotate(&matrix::IDENTITY, PlanePoint::default(), PlanePoint::new(0.1, 0.0)).is_none());
    }

    #[test]
    fn generic_rotation_moves_point_to_target() {
        let rot0 = vertical_rotate(-0.2, 0.3, true);
        let pos0 = PlanePoint::new(0.1, 0.2);
        let pos1 = PlanePoint::new(-0.2, 0.25);
        for projection in [Projection::Sin, Projection::Arc, Projection::Stg, Projection::Tan] {
            let rot1 = projection.cursor_rotate(&rot0, pos0, pos1).expect("rotatable");
            let data = matrix::mv_mult(&matrix::invert(&rot0), &projection.unproject(pos0).expect("inside"));
            let moved = projection.project(&matrix::mv_mult(&rot1, &data)).expect("visible");
            assert!((moved.x - pos1.x).abs() < 1e-9 && (moved.y - pos1.y).abs() < 1e-9, "{projection}");
            assert!(is_reflected(&rot1));
        }
    }

    #[test]
    fn drag_outside_sphere_keeps_north_up() {
        let rot0 = vertical_rotate(-0.3, 0.5, false);
        let rot1 = Projection::Sin
            .cursor_rotate(&rot0, PlanePoint::new(1.5, 0.0), PlanePoint::new(1.5, 0.4))
            .expect("rotatable");
        assert!(matrix::mv_mult(&rot1, &NORTH)[2] >= 0.0);
        assert_ne!(rot1, rot0);
    }

    #[test]
    fn newton_gives_up_without_root() {
        assert_eq!(newton_solve(0.5, |x| (x * x + 1.0, 2.0 * x)), None);
        let root = newton_solve(1.0, |x| (x * x - 2.0, 2.0 * x)).expect("converges");
        assert!((root - SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn center_rotation_points_at_target() {
        let r = lon_lat_vector(1.0, 0.4);
        let rot = rotate_to_center(&r, true);
        assert!(close(&matrix::mv_mult(&rot, &r), &SIGHT, 1e-12));
        assert!(matrix::mv_mult(&rot, &NORTH)[1].abs() < 1e-12);
    }
}
