//! 3x3 matrix and 3-vector algebra.
//!
//! Matrices are row-major `[f64; 9]`. Nothing here checks for singular or
//! zero-length inputs: NaN and infinities propagate to the caller.

/// Row-major 3x3 matrix.
pub type Matrix3 = [f64; 9];

/// Three-element vector.
pub type Vector3 = [f64; 3];

/// The identity matrix.
pub const IDENTITY: Matrix3 = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Matrix product `a * b`.
pub fn mm_mult(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = [0.0; 9];
    for i in 0..3 {
        for j in 0..3 {
            out[i * 3 + j] = (0..3).map(|k| a[i * 3 + k] * b[k * 3 + j]).sum();
        }
    }
    out
}

/// Matrix-vector product `m * v`.
pub fn mv_mult(m: &Matrix3, v: &Vector3) -> Vector3 {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

/// Determinant.
pub fn det(m: &Matrix3) -> f64 {
    m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
        + m[2] * (m[3] * m[7] - m[4] * m[6])
}

/// Inverse by adjugate over determinant.
///
/// A singular input yields infinities or NaN.
pub fn invert(m: &Matrix3) -> Matrix3 {
    let d = det(m);
    [
        (m[4] * m[8] - m[5] * m[7]) / d,
        (m[2] * m[7] - m[1] * m[8]) / d,
        (m[1] * m[5] - m[2] * m[4]) / d,
        (m[5] * m[6] - m[3] * m[8]) / d,
        (m[0] * m[8] - m[2] * m[6]) / d,
        (m[2] * m[3] - m[0] * m[5]) / d,
        (m[3] * m[7] - m[4] * m[6]) / d,
        (m[1] * m[6] - m[0] * m[7]) / d,
        (m[0] * m[4] - m[1] * m[3]) / d,
    ]
}

/// Transpose.
pub fn transpose(m: &Matrix3) -> Matrix3 {
    [m[0], m[3], m[6], m[1], m[4], m[7], m[2], m[5], m[8]]
}

/// Cross product.
pub fn cross(a: &Vector3, b: &Vector3) -> Vector3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Scalar product.
pub fn dot(a: &Vector3, b: &Vector3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean norm.
pub fn norm(v: &Vector3) -> f64 {
    dot(v, v).sqrt()
}

/// Scale a vector.
pub fn scale(v: &Vector3, factor: f64) -> Vector3 {
    [v[0] * factor, v[1] * factor, v[2] * factor]
}

/// Divide by the Euclidean norm. A zero vector comes back NaN-filled.
pub fn normalise(v: &Vector3) -> Vector3 {
    scale(v, 1.0 / norm(v))
}

/// Unit basis vector along dimension `i`.
pub fn unit(i: usize) -> Vector3 {
    let mut v = [0.0; 3];
    v[i] = 1.0;
    v
}

/// Rotation matrix for an axial vector whose direction is the rotation
/// axis and whose length is the angle in radians.
///
/// The result rotates the coordinate frame, so applying it to a vector
/// turns the vector by minus the angle.
pub fn axial_rotation(axial: &Vector3) -> Matrix3 {
    let angle = norm(axial);
    if angle == 0.0 {
        return IDENTITY;
    }
    let [x, y, z] = scale(axial, 1.0 / angle);
    let (s, c) = angle.sin_cos();
    let w = 1.0 - c;
    [
        x * x * w + c,
        x * y * w + z * s,
        x * z * w - y * s,
        x * y * w - z * s,
        y * y * w + c,
        y * z * w + x * s,
        x * z * w + y * s,
        y * z * w - x * s,
        z * z * w + c,
    ]
}

/// Post-multiply `base` by a rotation of `angle` radians about `unit_axis`.
pub fn rotate_around(base: &Matrix3, unit_axis: &Vector3, angle: f64) -> Matrix3 {
    mm_mult(base, &axial_rotation(&scale(unit_axis, angle)))
}

/// Rotation about an axis given in screen (rotated) space.
///
/// The axis is carried back into data space through the inverse of `base`
/// before the rotation matrix is built.
pub fn screen_rotation(base: &Matrix3, screen_axis: &Vector3, angle: f64) -> Matrix3 {
    let axis = normalise(&mv_mult(&invert(base), screen_axis));
    axial_rotation(&scale(&axis, angle))
}

/// Build a rotation matrix from ZXZ Euler angles in degrees.
pub fn euler_to_rotation_degrees(phi: f64, theta: f64, psi: f64) -> Matrix3 {
    let (s1, c1) = phi.to_radians().sin_cos();
    let (s2, c2) = theta.to_radians().sin_cos();
    let (s3, c3) = psi.to_radians().sin_cos();
    [
        c1 * c3 - c2 * s1 * s3,
        c3 * s1 + c1 * c2 * s3,
        s2 * s3,
        -c1 * s3 - c2 * c3 * s1,
        c1 * c2 * c3 - s1 * s3,
        c3 * s2,
        s1 * s2,
        -c1 * s2,
        c2,
    ]
}

/// Threshold below which theta is treated as zero when recovering angles.
const POLE_THETA_RAD: f64 = 0.1 * std::f64::consts::PI / 180.0;

/// Recover ZXZ Euler angles in degrees from a rotation matrix.
///
/// The inversion is many-to-one and theta comes back in `0..=180`. When
/// theta is within 0.1 degrees of zero, psi is forced to zero and phi is
/// taken from `acos(m[0])`, which cannot distinguish `phi` from `-phi`.
pub fn rotation_to_euler_degrees(m: &Matrix3) -> [f64; 3] {
    let theta = m[8].clamp(-1.0, 1.0).acos();
    let (phi, psi) = if theta.abs() < POLE_THETA_RAD {
        (m[0].clamp(-1.0, 1.0).acos(), 0.0)
    } else {
        (m[6].atan2(-m[7]), m[2].atan2(m[5]))
    };
    [phi.to_degrees(), theta.to_degrees(), psi.to_degrees()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_matrix_close(a: &Matrix3, b: &Matrix3, tol: f64) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn zero_angles_give_identity() {
        assert_matrix_close(&euler_to_rotation_degrees(0.0, 0.0, 0.0), &IDENTITY, 1e-15);
    }

    #[test]
    fn euler_matrices_are_orthonormal() {
        let mut angle = -180.0;
        while angle <= 180.0 {
            let m = euler_to_rotation_degrees(angle, angle * 0.7 - 20.0, 45.0 - angle);
            let product = mm_mult(&m, &transpose(&m));
            assert_matrix_close(&product, &IDENTITY, 1e-12);
            assert!((det(&m).abs() - 1.0).abs() < 1e-12);
            angle += 15.0;
        }
    }

    #[test]
    fn euler_roundtrip_gives_same_rotation() {
        for &(phi, theta, psi) in &[(30.0, -15.0, 0.0), (-120.0, 80.0, 33.0), (170.0, 5.0, -90.0)] {
            let m = euler_to_rotation_degrees(phi, theta, psi);
            let [p, t, s] = rotation_to_euler_degrees(&m);
            assert_matrix_close(&euler_to_rotation_degrees(p, t, s), &m, 1e-9);
        }
    }

    #[test]
    fn pole_branch_forces_psi_to_zero() {
        let m = euler_to_rotation_degrees(40.0, 0.0, 0.0);
        let [phi, theta, psi] = rotation_to_euler_degrees(&m);
        assert!((phi - 40.0).abs() < 1e-9);
        assert!(theta.abs() < 1e-6);
        assert_eq!(psi, 0.0);
    }

    #[test]
    fn inverse_of_rotation_is_transpose() {
        let m = euler_to_rotation_degrees(12.0, 34.0, 56.0);
        assert_matrix_close(&invert(&m), &transpose(&m), 1e-12);
    }

    #[test]
    fn normalise_zero_is_nan() {
        assert!(normalise(&[0.0, 0.0, 0.0]).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn axial_rotation_turns_frame() {
        let rot = axial_rotation(&[0.0, 0.0, std::f64::consts::FRAC_PI_2]);
        let v = mv_mult(&rot, &[1.0, 0.0, 0.0]);
        assert!(v[0].abs() < 1e-12);
        assert!((v[1] + 1.0).abs() < 1e-12);
    }
}
