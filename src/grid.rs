//! Longitude and latitude grid lines for sky surfaces.
//!
//! Visible coordinate limits are found by sampling the plot bounds, round
//! grid values are chosen inside them, and each grid curve is sampled
//! finely enough to look smooth before being cut into the pieces that lie
//! inside the bounds.

use crate::error::GridError;
use crate::geom::{ScreenPoint, ScreenRect};
use crate::matrix::{self, Matrix3, Vector3};
use crate::projection::{PlanePoint, Projection, lon_lat_vector};

/// Initial side of the sampling grid used to find coordinate limits.
const GRID_SAMPLE: usize = 10;
/// Largest side of the sampling grid.
const MAX_SAMPLE: usize = 400;
/// Sky samples needed before limits are trusted.
const MIN_POINTS: usize = GRID_SAMPLE * GRID_SAMPLE;
/// Initial number of elements per grid curve.
const LINE_ELEMENT_MIN: usize = 8;
/// Largest number of elements per grid curve.
const LINE_ELEMENT_MAX: usize = 1024;
/// Angular tolerance in degrees when bisecting towards a boundary.
const BOUNDARY_LIMIT: f64 = 1e-5;
/// Fraction by which limits are widened before lines are drawn.
const LIMIT_EXTENSION: f64 = 0.4;
/// Squared step growth that marks a jump across a discontinuity.
const JUMP_RATIO: f64 = 100.0;
/// Offset either side of a meridian, avoiding projection singularities.
const MERIDIAN_NUDGE: f64 = 1e-10;
/// Approximate number of grid lines per axis at unit crowding.
const TARGET_LINES: f64 = 6.0;

/// Cosine of the largest bend allowed between consecutive curve elements.
fn max_curve() -> f64 {
    1f64.to_radians().cos()
}

const ARCSEC: f64 = 1.0 / 3600.0;
const ARCMIN: f64 = 1.0 / 60.0;

/// Round spacings in degrees.
const DEGREE_STEPS: [f64; 10] = [1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 45.0, 90.0, 180.0, 360.0];

/// Round sexagesimal spacings in degrees or hours.
const SEXAGESIMAL_STEPS: [f64; 22] = [
    ARCSEC,
    2.0 * ARCSEC,
    5.0 * ARCSEC,
    10.0 * ARCSEC,
    15.0 * ARCSEC,
    30.0 * ARCSEC,
    ARCMIN,
    2.0 * ARCMIN,
    5.0 * ARCMIN,
    10.0 * ARCMIN,
    15.0 * ARCMIN,
    30.0 * ARCMIN,
    1.0,
    2.0,
    5.0,
    10.0,
    15.0,
    30.0,
    45.0,
    90.0,
    180.0,
    360.0,
];

/// Round spacings in hours, above one hour.
const HOUR_STEPS: [f64; 7] = [1.0, 2.0, 3.0, 4.0, 6.0, 12.0, 24.0];

/// Which coordinate a grid line holds constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridKind {
    /// Constant longitude.
    Meridian,
    /// Constant latitude.
    Parallel,
}

/// One visible piece of a grid curve in graphics coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    /// Points along the curve, at least three.
    pub points: Vec<ScreenPoint>,
    /// Coordinate value label.
    pub label: String,
    /// Kind of curve.
    pub kind: GridKind,
}

/// Generates grid lines for one sky view.
#[derive(Debug, Clone)]
pub struct GridLiner {
    bounds: ScreenRect,
    rotation: Matrix3,
    unrotation: Matrix3,
    projection: Projection,
    center: ScreenPoint,
    zoom: f64,
    sexagesimal: bool,
    lon_crowd: f64,
    lat_crowd: f64,
}

/// Longitude and latitude limits in degrees; longitude may wrap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Limits {
    lon: [f64; 2],
    lat: [f64; 2],
}

type Pixel = [f64; 2];

impl GridLiner {
    /// Grid generator for a view in which plane position `p` sits at
    /// graphics position `center + zoom * (p.x, -p.y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bounds: ScreenRect,
        rotation: Matrix3,
        projection: Projection,
        center: ScreenPoint,
        zoom: f64,
        sexagesimal: bool,
        lon_crowd: f64,
        lat_crowd: f64,
    ) -> Self {
        Self {
            bounds,
            rotation,
            unrotation: matrix::invert(&rotation),
            projection,
            center,
            zoom,
            sexagesimal,
            lon_crowd,
            lat_crowd,
        }
    }

    /// Generate the grid lines.
    pub fn grid(&self) -> Result<Vec<GridLine>, GridError> {
        let mut limits = self.limits()?;
        let lat_span = crowded_span(limits.lat[0], limits.lat[1], self.lat_crowd, 360.0);
        let lat_step = angle_step(lat_span, self.sexagesimal, false);
        let lon_step = if self.sexagesimal {
            let span = crowded_span(limits.lon[0] / 15.0, limits.lon[1] / 15.0, self.lon_crowd, 24.0);
            angle_step(span, true, true) * 15.0
        } else {
            angle_step(crowded_span(limits.lon[0], limits.lon[1], self.lon_crowd, 360.0), false, false)
        };
        limits.extend(LIMIT_EXTENSION);
        let mut lines = Vec::new();
        if lon_step < 360.0 {
            let lon_max = if limits.lon[0] > limits.lon[1] {
                limits.lon[1] + 360.0
            } else {
                limits.lon[1]
            };
            let mut qlon = (limits.lon[0] / lon_step).floor() * lon_step;
            while qlon <= lon_max {
                let mut lon = if qlon > 360.0 { qlon - 360.0 } else { qlon };
                if (lon - 360.0).abs() < 1e-8 {
                    lon = 0.0;
                }
                let label = if self.sexagesimal {
                    sexagesimal_label(lon / 15.0, lon_step / 15.0, ["h", "m", "s"])
                } else {
                    degree_label(lon, lon_step)
                };
                for nudge in [MERIDIAN_NUDGE, -MERIDIAN_NUDGE] {
                    let l = lon + nudge;
                    self.draw_line(l, l, limits.lat[0], limits.lat[1], GridKind::Meridian, &label, &mut lines);
                }
                qlon += lon_step;
            }
        }
        if lat_step < 180.0 {
            let mut lat = (limits.lat[0] / lat_step).floor() * lat_step;
            while lat <= limits.lat[1] {
                if lat.abs() < 90.0 {
                    let label = if self.sexagesimal {
                        sexagesimal_label(lat, lat_step, ["°", "'", "\""])
                    } else {
                        degree_label(lat, lat_step)
                    };
                    self.draw_line(limits.lon[0], limits.lon[1], lat, lat, GridKind::Parallel, &label, &mut lines);
                }
                lat += lat_step;
            }
        }
        Ok(lines)
    }

    fn width(&self) -> f64 {
        self.bounds.width()
    }

    fn height(&self) -> f64 {
        self.bounds.height()
    }

    /// Pixel position relative to the bounds origin, NaN if unprojectable.
    fn forward(&self, lon_deg: f64, lat_deg: f64) -> Pixel {
        let r = matrix::mv_mult(&self.rotation, &lon_lat_vector(lon_deg.to_radians(), lat_deg.to_radians()));
        match self.projection.project(&r) {
            Some(p) => [
                self.center.x - self.bounds.min.x + p.x * self.zoom,
                self.center.y - self.bounds.min.y - p.y * self.zoom,
            ],
            None => [f64::NAN, f64::NAN],
        }
    }

    fn reverse(&self, px: f64, py: f64) -> Option<Vector3> {
        let plane = PlanePoint::new(
            (px + self.bounds.min.x - self.center.x) / self.zoom,
            -(py + self.bounds.min.y - self.center.y) / self.zoom,
        );
        let r = self.projection.unproject(plane)?;
        Some(matrix::mv_mult(&self.unrotation, &r))
    }

    fn outside(&self, p: Pixel) -> bool {
        p[0] < 0.0 || p[0] > self.width() || p[1] < 0.0 || p[1] > self.height()
    }

    fn limits(&self) -> Result<Limits, GridError> {
        let mut npt = GRID_SAMPLE;
        loop {
            let last = npt * 2 > MAX_SAMPLE;
            if let Some(limits) = self.limit_grid(npt, last) {
                let finite = limits.lon.iter().chain(&limits.lat).all(|v| v.is_finite());
                return if finite {
                    Ok(limits)
                } else {
                    Err(GridError::BadLimits {
                        lon_min: limits.lon[0],
                        lon_max: limits.lon[1],
                        lat_min: limits.lat[0],
                        lat_max: limits.lat[1],
                    })
                };
            }
            if last {
                return Err(GridError::NoSkyInBounds {
                    width: self.width(),
                    height: self.height(),
                });
            }
            npt *= 2;
        }
    }

    fn limit_grid(&self, npts: usize, try_regardless: bool) -> Option<Limits> {
        let dx = self.width() / (npts - 1) as f64;
        let dy = self.height() / (npts - 1) as f64;
        let samples: Vec<Vector3> = (0..npts)
            .flat_map(|ix| (0..npts).map(move |iy| (ix, iy)))
            .filter_map(|(ix, iy)| self.reverse(ix as f64 * dx, iy as f64 * dy))
            .collect();
        if samples.is_empty() || (samples.len() < MIN_POINTS && !try_regardless) {
            return None;
        }
        let (minz, maxz) = samples
            .iter()
            .fold((2.0_f64, -2.0_f64), |(lo, hi), v| (lo.min(v[2]), hi.max(v[2])));
        let mut lat = [
            minz.clamp(-1.0, 1.0).asin().to_degrees(),
            maxz.clamp(-1.0, 1.0).asin().to_degrees(),
        ];
        let mut lon = [720.0_f64, -720.0_f64];
        let (mut max_lon180, mut min_lon180) = (-720.0_f64, 720.0_f64);
        let pole = samples.iter().any(|v| 1.0 - v[2] * v[2] <= 0.0);
        if pole {
            lon = [0.0, 359.999];
        } else {
            for v in &samples {
                let mut l = v[1].atan2(v[0]).to_degrees();
                if l < 0.0 {
                    l += 360.0;
                }
                lon = [lon[0].min(l), lon[1].max(l)];
                if l < 180.0 {
                    max_lon180 = max_lon180.max(l);
                }
                if l > 180.0 {
                    min_lon180 = min_lon180.min(l);
                }
            }
            // all samples facing +x: the range wraps through zero
            if lon[1] - lon[0] > 240.0 && samples.iter().all(|v| v[0] >= 0.0) {
                lon = [min_lon180, max_lon180];
            }
        }
        if lon[0] < lon[1] && lon[1] - lon[0] > 200.0 {
            lon = [0.0, 359.999];
        }
        if lat[1] - lat[0] > 100.0 {
            lat = [-90.0, 90.0];
        }
        Some(Limits { lon, lat })
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_line(&self, l0: f64, l1: f64, b0: f64, b1: f64, kind: GridKind, label: &str, out: &mut Vec<GridLine>) {
        let mut npt = LINE_ELEMENT_MIN;
        let mut line = self.sample_line(None, l0, l1, b0, b1, npt);
        while npt < LINE_ELEMENT_MAX && self.curvature(&line) {
            npt *= 2;
            line = self.sample_line(Some(&line), l0, l1, b0, b1, npt);
        }
        self.parse_line(line, l0, l1, b0, b1, npt, kind, label, out);
    }

    /// Sample `npt` elements of a curve, reusing the even points of a
    /// previous sampling at half the density.
    fn sample_line(&self, previous: Option<&[Pixel]>, l0: f64, l1: f64, b0: f64, b1: f64, npt: usize) -> Vec<Pixel> {
        let mut dl = l1 - l0;
        if l0 > l1 {
            dl += 360.0;
        }
        let dl = dl / npt as f64;
        let db = (b1 - b0) / npt as f64;
        let point = |i: usize| self.forward(l0 + dl * i as f64, b0 + db * i as f64);
        match previous {
            Some(old) if old.len() * 2 - 1 == npt + 1 => (0..=npt)
                .map(|i| if i % 2 == 0 { old[i / 2] } else { point(i) })
                .collect(),
            _ => (0..=npt).map(point).collect(),
        }
    }

    /// Whether a sampled curve bends too sharply anywhere visible.
    fn curvature(&self, points: &[Pixel]) -> bool {
        let (mut consec, mut max_consec, mut real_count) = (0, 0, 0);
        for p in points {
            if p[1].is_nan() {
                consec = 0;
            } else {
                consec += 1;
                max_consec = max_consec.max(consec);
                real_count += 1;
            }
        }
        if real_count == 0 {
            return false;
        }
        if max_consec < 3 {
            return true;
        }
        let limit = max_curve();
        points.windows(3).any(|w| {
            let (p, q, r) = (w[0], w[1], w[2]);
            let (dx0, dx1) = (q[0] - p[0], r[0] - q[0]);
            let (dy0, dy1) = (q[1] - p[1], r[1] - q[1]);
            if (dx0 + dx1 + dy0 + dy1).is_nan() {
                return false;
            }
            if dx0.abs() + dy0.abs() < 1.0 || dx1.abs() + dy1.abs() < 1.0 {
                return false;
            }
            if self.outside(p) && self.outside(q) && self.outside(r) {
                return false;
            }
            let costh = (dx0 * dx1 + dy0 * dy1) / (dx0.hypot(dy0) * dx1.hypot(dy1));
            costh < limit
        })
    }

    /// Cut a sampled curve into pieces inside the bounds.
    #[allow(clippy::too_many_arguments)]
    fn parse_line(
        &self,
        mut line: Vec<Pixel>,
        l0: f64,
        l1: f64,
        b0: f64,
        b1: f64,
        npt: usize,
        kind: GridKind,
        label: &str,
        out: &mut Vec<GridLine>,
    ) {
        let (nx, ny) = (self.width(), self.height());
        let mut dl = l1 - l0;
        if l0 > l1 {
            dl += 360.0;
        }
        let dl = dl / npt as f64;
        let db = (b1 - b0) / npt as f64;
        let inside = |p: Pixel| p[0] > 0.0 && p[0] < nx && p[1] > 0.0 && p[1] < ny;
        let step_coords = |i: usize| {
            let lx = (l0 + i as f64 * dl) % 360.0;
            ((lx, b0 + i as f64 * db), ((lx + dl) % 360.0, b0 + (i + 1) as f64 * db))
        };
        let n = npt + 1;
        let mut min = 0;
        let mut seg_start = 0;
        let mut beginning = true;
        while min < n {
            beginning = true;
            let mut last_dist_sq = -1.0;
            let mut i = min;
            while i < n {
                let p = line[i];
                if inside(p) {
                    if beginning {
                        if i != min {
                            let ((lx, bx), (lxx, bxx)) = step_coords(i - 1);
                            let prev = line[i - 1];
                            line[i - 1] = if prev[0].is_nan() || prev[1].is_nan() {
                                self.fix_nan((lxx, bxx), (lx, bx), p)
                            } else {
                                self.fix_out(p, prev)
                            };
                            seg_start = i - 1;
                        } else {
                            seg_start = i;
                        }
                        beginning = false;
                    } else {
                        let pm = line[i - 1];
                        let dist_sq = (pm[0] - p[0]).powi(2) + (pm[1] - p[1]).powi(2);
                        if last_dist_sq > 0.0 && dist_sq / last_dist_sq > JUMP_RATIO {
                            self.add_segment(&line, seg_start, i - 1, None, kind, label, out);
                            beginning = true;
                            break;
                        }
                        last_dist_sq = dist_sq;
                    }
                } else if !beginning {
                    let ((lx, bx), (lxx, bxx)) = step_coords(i - 1);
                    let (good, bad) = (line[i - 1], line[i]);
                    let end = if bad[0].is_nan() || bad[1].is_nan() {
                        Some(self.fix_nan((lx, bx), (lxx, bxx), good))
                    } else {
                        let jump = (bad[0] - good[0]).powi(2) + (bad[1] - good[1]).powi(2);
                        (last_dist_sq <= 0.0 || jump / last_dist_sq <= JUMP_RATIO).then(|| self.fix_out(good, bad))
                    };
                    self.add_segment(&line, seg_start, i - 1, end, kind, label, out);
                    beginning = true;
                    i += 1;
                    break;
                }
                i += 1;
            }
            min = i;
        }
        if !beginning {
            self.add_segment(&line, seg_start, npt, None, kind, label, out);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_segment(
        &self,
        line: &[Pixel],
        mut seg_start: usize,
        seg_end: usize,
        last: Option<Pixel>,
        kind: GridKind,
        label: &str,
        out: &mut Vec<GridLine>,
    ) {
        if seg_end >= seg_start + 3 {
            let (p, q, r) = (line[seg_start], line[seg_start + 1], line[seg_start + 2]);
            let sq1 = (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2);
            let sq2 = (r[0] - q[0]).powi(2) + (r[1] - q[1]).powi(2);
            if sq2 > 0.0 && sq1 / sq2 > JUMP_RATIO {
                seg_start += 1;
            }
        }
        if seg_end < seg_start {
            return;
        }
        let count = seg_end - seg_start + 1 + usize::from(last.is_some());
        if count < 3 {
            return;
        }
        let origin = self.bounds.min;
        let points = line[seg_start..=seg_end]
            .iter()
            .copied()
            .chain(last)
            .map(|p| ScreenPoint::new(p[0] + origin.x, p[1] + origin.y))
            .collect();
        out.push(GridLine {
            points,
            label: label.to_owned(),
            kind,
        });
    }

    /// Bisect from a good point towards an unprojectable one to find the
    /// last projectable pixel, or the bounds crossing if that comes first.
    fn fix_nan(&self, from: (f64, f64), to: (f64, f64), good: Pixel) -> Pixel {
        let (mut dl, mut db) = (to.0 - from.0, to.1 - from.1);
        if dl.abs() > 180.0 {
            dl = if dl > 0.0 { 360.0 - dl } else { -360.0 - dl };
        }
        let (mut last_l, mut last_b) = from;
        let mut last_pix = good;
        while dl.abs() > BOUNDARY_LIMIT || db.abs() > BOUNDARY_LIMIT {
            dl *= 0.5;
            db *= 0.5;
            let mut test_l = last_l + dl;
            if test_l > 360.0 {
                test_l -= 360.0;
            }
            if test_l < 0.0 {
                test_l += 360.0;
            }
            let test_b = last_b + db;
            let pix = self.forward(test_l, test_b);
            if !(pix[0] + pix[1]).is_nan() {
                if self.outside(pix) {
                    return self.fix_out(good, pix);
                }
                last_l = test_l;
                last_b = test_b;
                last_pix = pix;
            }
        }
        last_pix
    }

    /// Point where the segment from `good` (inside) to `bound` (outside)
    /// first crosses the bounds.
    fn fix_out(&self, good: Pixel, bound: Pixel) -> Pixel {
        let (nx, ny) = (self.width(), self.height());
        let mut frac: f64 = 1.0;
        if bound[0] < 0.0 {
            frac = frac.min(good[0] / (good[0] - bound[0]));
        } else if bound[0] > nx {
            frac = frac.min((nx - good[0]) / (bound[0] - good[0]));
        }
        if bound[1] < 0.0 {
            frac = frac.min(good[1] / (good[1] - bound[1]));
        } else if bound[1] > ny {
            frac = frac.min((ny - good[1]) / (bound[1] - good[1]));
        }
        [
            good[0] + frac * (bound[0] - good[0]),
            good[1] + frac * (bound[1] - good[1]),
        ]
    }
}

impl Limits {
    fn extend(&mut self, amount: f64) {
        let db = 0.5 * amount * (self.lat[1] - self.lat[0]);
        self.lat = [(self.lat[0] - db).max(-90.0), (self.lat[1] + db).min(90.0)];
        if self.lon[0] > self.lon[1] {
            let dl = 0.5 * amount * (360.0 + self.lon[1] - self.lon[0]);
            self.lon = [self.lon[0] - dl, self.lon[1] + dl];
            if self.lon[1] > self.lon[0] {
                self.lon = [0.0, 360.0];
            }
        } else {
            let dl = 0.5 * amount * (self.lon[1] - self.lon[0]);
            self.lon = [self.lon[0] - dl, self.lon[1] + dl];
            if self.lon[1] - self.lon[0] > 360.0 {
                self.lon = [0.0, 360.0];
            } else {
                if self.lon[0] < 0.0 {
                    self.lon[0] += 360.0;
                }
                if self.lon[1] > 360.0 {
                    self.lon[1] -= 360.0;
                }
            }
        }
    }
}

/// Extent between two limits, unwrapping through `period`, shrunk by crowding.
fn crowded_span(min: f64, max: f64, crowd: f64, period: f64) -> f64 {
    let mut delta = max - min;
    if min > max {
        delta += period;
    }
    delta / crowd
}

/// Round spacing for grid lines covering `span` degrees (or hours).
pub fn angle_step(span: f64, sexagesimal: bool, hours: bool) -> f64 {
    let min_step = span / TARGET_LINES;
    let ladder: &[f64] = if hours {
        &HOUR_STEPS
    } else if sexagesimal {
        &SEXAGESIMAL_STEPS
    } else {
        &DEGREE_STEPS
    };
    if hours && min_step < 1.0 {
        return angle_step(span, true, false);
    }
    if !(min_step > 0.0) {
        return ladder[0];
    }
    if min_step < ladder[0] {
        return decimal_step(min_step);
    }
    ladder
        .iter()
        .copied()
        .find(|&s| s >= min_step)
        .unwrap_or(ladder[ladder.len() - 1])
}

/// Smallest value of the form {1, 2, 5} x 10^n not below `x`.
fn decimal_step(x: f64) -> f64 {
    let scale = 10f64.powf(x.log10().floor());
    let mantissa = x / scale;
    let m = if mantissa <= 1.0 {
        1.0
    } else if mantissa <= 2.0 {
        2.0
    } else if mantissa <= 5.0 {
        5.0
    } else {
        10.0
    };
    m * scale
}

/// Decimal places needed to show multiples of `step`.
fn step_decimals(step: f64) -> usize {
    if step >= 1.0 {
        0
    } else {
        (-step.log10() - 1e-9).ceil().max(0.0) as usize
    }
}

/// Decimal degree label such as `30°` or `2.5°`.
pub fn degree_label(value: f64, step: f64) -> String {
    let ndp = step_decimals(step);
    let mut text = format!("{value:.ndp$}");
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_owned();
    }
    if text == "-0" {
        text = "0".to_owned();
    }
    format!("{text}°")
}

/// Sexagesimal label with the given unit markers, showing only the
/// fields that `step` needs.
pub fn sexagesimal_label(value: f64, step: f64, units: [&str; 3]) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let v = value.abs();
    if step >= 1.0 {
        return format!("{sign}{}{}", v.round() as i64, units[0]);
    }
    if step >= ARCMIN {
        let total = (v * 60.0).round() as i64;
        return format!("{sign}{}{}{:02}{}", total / 60, units[0], total % 60, units[1]);
    }
    let ndp = step_decimals(step * 3600.0);
    let scale = 10f64.powi(ndp as i32);
    let total = (v * 3600.0 * scale).round() / scale;
    let whole = total.floor() as i64;
    let (deg, min) = (whole / 3600, (whole % 3600) / 60);
    let sec = total - (deg * 3600 + min * 60) as f64;
    let width = if ndp == 0 { 2 } else { ndp + 3 };
    format!("{sign}{deg}{}{min:02}{}{sec:0width$.ndp$}{}", units[0], units[1], units[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::vertical_rotate;

    fn liner(projection: Projection, zoom: f64) -> GridLiner {
        let bounds = ScreenRect::from_origin_size(20.0, 10.0, 400.0, 400.0);
        let rotation = vertical_rotate(-0.3, 0.4, true);
        GridLiner::new(bounds, rotation, projection, bounds.center(), 200.0 * zoom, false, 1.0, 1.0)
    }

    #[test]
    fn steps_are_round() {
        assert_eq!(angle_step(100.0, false, false), 30.0);
        assert_eq!(angle_step(180.0, false, false), 30.0);
        assert_eq!(angle_step(1.0, false, false), 0.2);
        assert_eq!(angle_step(0.4, true, false), 5.0 * ARCMIN);
        assert_eq!(angle_step(20.0, true, true), 4.0);
    }

    #[test]
    fn labels() {
        assert_eq!(degree_label(30.0, 30.0), "30°");
        assert_eq!(degree_label(2.5, 0.5), "2.5°");
        assert_eq!(degree_label(-0.0, 0.2), "0°");
        assert_eq!(sexagesimal_label(12.5, 0.5, ["h", "m", "s"]), "12h30m");
        assert_eq!(sexagesimal_label(-30.0, 15.0, ["°", "'", "\""]), "-30°");
        assert_eq!(sexagesimal_label(1.0 + 2.0 * ARCMIN + 3.0 * ARCSEC, ARCSEC, ["°", "'", "\""]), "1°02'03\"");
    }

    #[test]
    fn hemisphere_grid_segments_are_valid() {
        let gl = liner(Projection::Sin, 1.0);
        let lines = gl.grid().expect("grid");
        assert!(lines.iter().any(|l| l.kind == GridKind::Meridian));
        assert!(lines.iter().any(|l| l.kind == GridKind::Parallel));
        let b = gl.bounds;
        for line in &lines {
            assert!(line.points.len() >= 3);
            assert!(line.label.ends_with('°'));
            for p in &line.points {
                assert!(p.x >= b.min.x - 1e-6 && p.x <= b.max.x + 1e-6, "{p:?}");
                assert!(p.y >= b.min.y - 1e-6 && p.y <= b.max.y + 1e-6, "{p:?}");
            }
        }
    }

    #[test]
    fn zoomed_grid_uses_fine_steps() {
        let lines = liner(Projection::Sin, 200.0).grid().expect("grid");
        assert!(!lines.is_empty());
        assert!(lines.iter().any(|l| l.label.contains('.')));
    }

    #[test]
    fn aitoff_grid_splits_at_seam() {
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 600.0, 300.0);
        let rotation = Projection::Aitoff0.fixed_rotation(true).expect("fixed");
        let gl = GridLiner::new(bounds, rotation, Projection::Aitoff0, bounds.center(), 100.0, false, 1.0, 1.0);
        let lines = gl.grid().expect("grid");
        for line in &lines {
            for w in line.points.windows(2) {
                assert!(w[0].distance_sq(w[1]) < 300.0 * 300.0);
            }
        }
    }

    #[test]
    fn no_step_jumps_far_beyond_line_average() {
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 500.0, 400.0);
        let eulers = [(0.0, 0.0, 0.0), (120.0, 20.0, 200.0), (-40.0, 35.0, 10.0)];
        let mut checked = 0;
        for projection in Projection::ALL {
            for (phi, theta, psi) in eulers {
                let rotation = matrix::euler_to_rotation_degrees(phi, theta, psi);
                for scale in [80.0, 200.0] {
                    let gl = GridLiner::new(bounds, rotation, projection, bounds.center(), scale, false, 1.0, 1.0);
                    let Ok(lines) = gl.grid() else {
                        continue;
                    };
                    for line in &lines {
                        let steps: Vec<f64> = line.points.windows(2).map(|w| w[0].distance_sq(w[1])).collect();
                        let mean = steps.iter().sum::<f64>() / steps.len() as f64;
                        for step in &steps {
                            assert!(
                                *step <= JUMP_RATIO * mean,
                                "{projection:?} euler ({phi}, {theta}, {psi}) scale {scale}: {step} vs mean {mean}"
                            );
                        }
                        checked += 1;
                    }
                }
            }
        }
        assert!(checked > 100);
    }

    #[test]
    fn empty_view_is_an_error() {
        let bounds = ScreenRect::from_origin_size(0.0, 0.0, 100.0, 100.0);
        let gl = GridLiner::new(
            bounds,
            matrix::IDENTITY,
            Projection::Sin,
            ScreenPoint::new(5000.0, 5000.0),
            10.0,
            false,
            1.0,
            1.0,
        );
        assert!(matches!(gl.grid(), Err(GridError::NoSkyInBounds { .. })));
    }
}
