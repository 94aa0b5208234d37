//! Data ranges accumulated from data or configuration.

/// Numeric range with inclusive bounds.
///
/// An empty range has `min = +inf` and `max = -inf`; submitting values
/// extends it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
}

impl Default for Range {
    fn default() -> Self {
        Self::empty()
    }
}

impl Range {
    /// Create a new range, swapping bounds if needed.
    pub fn new(mut min: f64, mut max: f64) -> Self {
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        Self { min, max }
    }

    /// Range that contains nothing.
    pub const fn empty() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Span of the range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Check whether both bounds are finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Check whether the range has positive span and finite bounds.
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.span() > 0.0
    }

    /// Extend the range to include a value. Non-finite values are ignored.
    pub fn submit(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Union two ranges.
    pub fn union(a: Self, b: Self) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Restrict this range by optional explicit bounds.
    ///
    /// A supplied bound replaces the corresponding limit; the result is
    /// re-ordered if the replacement inverted it.
    pub fn limited(&self, lo: Option<f64>, hi: Option<f64>) -> Self {
        let min = lo.filter(|v| v.is_finite()).unwrap_or(self.min);
        let max = hi.filter(|v| v.is_finite()).unwrap_or(self.max);
        Self::new(min, max)
    }

    /// Range covering the fractional sub-range `lo_frac .. hi_frac`.
    ///
    /// Fractions are applied in log space when `log` is set.
    pub fn subrange(&self, lo_frac: f64, hi_frac: f64, log: bool) -> Self {
        if log {
            let (a, b) = (self.min.ln(), self.max.ln());
            let span = b - a;
            Self::new((a + lo_frac * span).exp(), (a + hi_frac * span).exp())
        } else {
            let span = self.span();
            Self::new(self.min + lo_frac * span, self.min + hi_frac * span)
        }
    }

    /// Midpoint, geometric for log ranges.
    pub fn center(&self, log: bool) -> f64 {
        if log {
            (self.min * self.max).sqrt()
        } else {
            (self.min + self.max) * 0.5
        }
    }

    /// Ensure the range has at least the given span.
    pub fn with_min_span(&self, min_span: f64) -> Self {
        let span = self.span();
        if span >= min_span {
            return *self;
        }
        let center = (self.min + self.max) * 0.5;
        let half = min_span * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Widen a degenerate or single-valued range so it can be plotted.
    ///
    /// Log ranges are widened multiplicatively and lose non-positive parts.
    pub fn widened(&self, log: bool) -> Self {
        if log {
            let min = if self.min > 0.0 { self.min } else { self.max.min(1.0) };
            let max = self.max.max(min);
            if max > min {
                Self { min, max }
            } else if min > 0.0 {
                Self::new(min * 0.5, min * 2.0)
            } else {
                Self::new(1.0, 10.0)
            }
        } else if self.span() > 0.0 {
            *self
        } else {
            let half = if self.min != 0.0 { self.min.abs() * 0.5 } else { 1.0 };
            Self::new(self.min - half, self.min + half)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_with_min_span_expands() {
        let range = Range::new(2.0, 2.0);
        let expanded = range.with_min_span(1.0);
        assert!(expanded.span() >= 1.0);
        assert!(((expanded.min + expanded.max) * 0.5 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn submit_ignores_non_finite() {
        let mut range = Range::empty();
        range.submit(3.0);
        range.submit(f64::NAN);
        range.submit(-1.0);
        assert_eq!(range, Range::new(-1.0, 3.0));
    }

    #[test]
    fn log_subrange_is_geometric() {
        let range = Range::new(1.0, 100.0);
        let sub = range.subrange(0.5, 1.0, true);
        assert!((sub.min - 10.0).abs() < 1e-9);
        assert!((sub.max - 100.0).abs() < 1e-9);
    }

    #[test]
    fn widened_single_value() {
        let range = Range::new(4.0, 4.0).widened(false);
        assert!(range.is_valid());
        let log = Range::new(4.0, 4.0).widened(true);
        assert!(log.min > 0.0 && log.max > log.min);
    }
}
