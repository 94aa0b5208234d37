//! Geometric primitives in graphics (device pixel) space.
//!
//! Data-space positions are plain `&[f64]` slices whose length is the
//! dimensionality of the surface; the types here describe where things
//! land on screen.

/// A point in graphics space (pixel coordinates, y increasing downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    /// X value in pixels.
    pub x: f64,
    /// Y value in pixels.
    pub y: f64,
}

impl ScreenPoint {
    /// Create a new screen point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point.
    pub fn distance_sq(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Check whether both coordinates are finite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A rectangle in graphics space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    /// Top-left corner.
    pub min: ScreenPoint,
    /// Bottom-right corner.
    pub max: ScreenPoint,
}

impl ScreenRect {
    /// Create a new screen rectangle from corners.
    pub const fn new(min: ScreenPoint, max: ScreenPoint) -> Self {
        Self { min, max }
    }

    /// Create a rectangle from its origin and size.
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ScreenPoint::new(x, y), ScreenPoint::new(x + width, y + height))
    }

    /// Rectangle width in pixels.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Rectangle height in pixels.
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Check whether the rectangle has positive area.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// Center of the rectangle.
    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    /// Half-open containment test: the low edges are inside, the high edges are not.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }

    /// Shrink the rectangle by the given insets.
    pub fn inset(&self, insets: Insets) -> Self {
        Self::new(
            ScreenPoint::new(self.min.x + insets.left, self.min.y + insets.top),
            ScreenPoint::new(self.max.x - insets.right, self.max.y - insets.bottom),
        )
    }
}

/// Space needed around a plot rectangle for axis annotations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Insets {
    /// Space above.
    pub top: f64,
    /// Space to the left.
    pub left: f64,
    /// Space below.
    pub bottom: f64,
    /// Space to the right.
    pub right: f64,
}

impl Insets {
    /// Create insets.
    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Elementwise maximum of two insets.
    pub fn union(self, other: Self) -> Self {
        Self {
            top: self.top.max(other.top),
            left: self.left.max(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.max(other.right),
        }
    }
}

/// Two-dimensional affine transform.
///
/// Maps `(x, y)` to `(m00*x + m01*y + m02, m10*x + m11*y + m12)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    /// X scale.
    pub m00: f64,
    /// Y shear.
    pub m10: f64,
    /// X shear.
    pub m01: f64,
    /// Y scale.
    pub m11: f64,
    /// X translation.
    pub m02: f64,
    /// Y translation.
    pub m12: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    /// The identity transform.
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    /// Create a transform from its coefficients, in column order.
    pub const fn new(m00: f64, m10: f64, m01: f64, m11: f64, m02: f64, m12: f64) -> Self {
        Self {
            m00,
            m10,
            m01,
            m11,
            m02,
            m12,
        }
    }

    /// Pure translation.
    pub const fn translate(dx: f64, dy: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, dx, dy)
    }

    /// Rotation by an angle in radians (positive is clockwise on screen).
    pub fn rotate(theta: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    /// Apply the transform to a point.
    pub fn apply(&self, point: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(
            self.m00 * point.x + self.m01 * point.y + self.m02,
            self.m10 * point.x + self.m11 * point.y + self.m12,
        )
    }

    /// Compose so that `other` is applied first, then `self`.
    pub fn concat(&self, other: &Self) -> Self {
        Self::new(
            self.m00 * other.m00 + self.m01 * other.m10,
            self.m10 * other.m00 + self.m11 * other.m10,
            self.m00 * other.m01 + self.m01 * other.m11,
            self.m10 * other.m01 + self.m11 * other.m11,
            self.m00 * other.m02 + self.m01 * other.m12 + self.m02,
            self.m10 * other.m02 + self.m11 * other.m12 + self.m12,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let rect = ScreenRect::from_origin_size(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(ScreenPoint::new(0.0, 0.0)));
        assert!(!rect.contains(ScreenPoint::new(10.0, 5.0)));
        assert!(!rect.contains(ScreenPoint::new(5.0, 10.0)));
    }

    #[test]
    fn affine_composition_order() {
        let shift = Affine::translate(5.0, 0.0);
        let quarter = Affine::rotate(std::f64::consts::FRAC_PI_2);
        let p = quarter.concat(&shift).apply(ScreenPoint::new(1.0, 0.0));
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 6.0).abs() < 1e-12);
    }
}
