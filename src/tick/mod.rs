//! Tick mark generation at round-number positions.
//!
//! A [`Ticker`] produces a [`Rule`] for a data range: an indexed family of
//! major tick values with labels and minor subdivisions. The rule is
//! coarsened until labels drawn with the supplied [`Captioner`] no longer
//! overlap.

pub mod time;

use std::fmt;

use crate::axis::{Axis, AxisScale};
use crate::captioner::{Captioner, Orientation};
use crate::geom::ScreenPoint;

/// Most coarsening steps tried before accepting overlapping labels.
const MAX_ADJUST: i32 = -5;

/// Hard cap on the number of ticks walked for one range.
const MAX_TICKS: usize = 10_000;

/// A tick mark: a data value with an optional label.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Data value.
    pub value: f64,
    /// Label text for major ticks.
    pub label: Option<String>,
}

impl Tick {
    /// Labelled major tick.
    pub fn major(value: f64, label: impl Into<String>) -> Self {
        Self {
            value,
            label: Some(label.into()),
        }
    }

    /// Unlabelled minor tick.
    pub fn minor(value: f64) -> Self {
        Self { value, label: None }
    }

    /// Whether this is a labelled major tick.
    pub fn is_major(&self) -> bool {
        self.label.is_some()
    }

    pub(crate) fn hash_into<H: std::hash::Hasher>(&self, state: &mut H) {
        use std::hash::Hash;
        self.value.to_bits().hash(state);
        self.label.hash(state);
    }
}

/// Ticks for one axis together with the label orientation chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRun {
    /// Major ticks followed by minor ticks.
    pub ticks: Vec<Tick>,
    /// Orientation the labels were laid out for.
    pub orientation: Orientation,
}

/// Indexed family of tick positions.
pub trait Rule {
    /// Index of the largest major tick not greater than `value`.
    fn floor_index(&self, value: f64) -> i64;

    /// Minor tick values between major `index` and the next.
    fn minors(&self, index: i64) -> Vec<f64>;

    /// Data value of major tick `index`.
    fn index_to_value(&self, index: i64) -> f64;

    /// Label of major tick `index`.
    fn index_to_label(&self, index: i64) -> String;

    /// Context shared by neighbouring labels, written once where it changes.
    fn index_to_prefix(&self, _index: i64) -> Option<String> {
        None
    }
}

/// Chooses tick rules for data ranges.
pub trait Ticker: fmt::Debug + Send + Sync {
    /// Rule spacing roughly `approx_major_count` majors over `dlo..dhi`.
    ///
    /// Negative `adjust` asks for progressively sparser ticks.
    fn create_rule(&self, dlo: f64, dhi: f64, approx_major_count: f64, adjust: i32)
    -> Box<dyn Rule>;

    /// Scale used when positioning labels for the overlap test.
    fn scale(&self) -> AxisScale;

    /// Generate ticks for an axis `npix` pixels long.
    fn get_ticks(
        &self,
        dlo: f64,
        dhi: f64,
        with_minor: bool,
        captioner: &dyn Captioner,
        orients: &[Orientation],
        npix: u32,
        crowding: f64,
    ) -> TickRun {
        let orientation = orients.first().copied().unwrap_or(Orientation::X);
        if !(dhi > dlo) || !dlo.is_finite() || !dhi.is_finite() {
            let ticks = if dlo.is_finite() {
                vec![Tick::major(dlo, format!("{dlo}"))]
            } else {
                Vec::new()
            };
            return TickRun { ticks, orientation };
        }
        // unusable crowding counts as normal density
        let crowding = if crowding.is_finite() && crowding > 0.0 { crowding } else { 1.0 };
        let approx_major_count = (i64::from(npix) / 80).max(1) as f64 * crowding;
        let axis = Axis::new(0.0, f64::from(npix), dlo, dhi, self.scale(), false);
        for adjust in (MAX_ADJUST + 1..=0).rev() {
            let rule = self.create_rule(dlo, dhi, approx_major_count, adjust);
            let majors = major_ticks(rule.as_ref(), dlo, dhi);
            for &orient in orients {
                if !overlaps(&majors, &axis, captioner, orient) {
                    return assemble(rule.as_ref(), majors, dlo, dhi, with_minor, orient);
                }
            }
        }
        log::debug!("tick labels still overlap on {dlo} .. {dhi} at {npix}px");
        let rule = self.create_rule(dlo, dhi, approx_major_count, MAX_ADJUST);
        let majors = major_ticks(rule.as_ref(), dlo, dhi);
        assemble(rule.as_ref(), majors, dlo, dhi, with_minor, orientation)
    }
}

fn assemble(
    rule: &dyn Rule,
    mut ticks: Vec<Tick>,
    dlo: f64,
    dhi: f64,
    with_minor: bool,
    orientation: Orientation,
) -> TickRun {
    if with_minor {
        ticks.extend(minor_ticks(rule, dlo, dhi));
    }
    TickRun { ticks, orientation }
}

/// Labelled major ticks of `rule` inside `dlo..=dhi`.
pub fn major_ticks(rule: &dyn Rule, dlo: f64, dhi: f64) -> Vec<Tick> {
    let mut ticks = Vec::new();
    let mut last_prefix: Option<String> = None;
    let mut index = rule.floor_index(dlo);
    for _ in 0..MAX_TICKS {
        let value = rule.index_to_value(index);
        if !(value <= dhi) {
            break;
        }
        if value >= dlo {
            let mut label = rule.index_to_label(index);
            if let Some(prefix) = rule.index_to_prefix(index) {
                if last_prefix.as_deref() != Some(prefix.as_str()) {
                    label = format!("{prefix}{label}");
                    last_prefix = Some(prefix);
                }
            }
            ticks.push(Tick::major(value, label));
        }
        index += 1;
    }
    ticks
}

/// Unlabelled minor ticks of `rule` inside `dlo..=dhi`.
pub fn minor_ticks(rule: &dyn Rule, dlo: f64, dhi: f64) -> Vec<Tick> {
    let mut ticks = Vec::new();
    let mut index = rule.floor_index(dlo);
    for _ in 0..MAX_TICKS {
        if !(rule.index_to_value(index) <= dhi) {
            break;
        }
        ticks.extend(
            rule.minors(index)
                .into_iter()
                .filter(|minor| *minor >= dlo && *minor <= dhi)
                .map(Tick::minor),
        );
        index += 1;
    }
    ticks
}

/// The two general-purpose numeric tickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicTicker {
    /// Round decimal values.
    Linear,
    /// Powers of ten and their round multiples.
    Log,
}

impl BasicTicker {
    /// Ticker appropriate for an axis scale.
    pub fn for_scale(scale: AxisScale) -> Self {
        if scale.is_log() { Self::Log } else { Self::Linear }
    }
}

impl Ticker for BasicTicker {
    fn create_rule(
        &self,
        dlo: f64,
        dhi: f64,
        approx_major_count: f64,
        adjust: i32,
    ) -> Box<dyn Rule> {
        raw_rule(dlo, dhi, approx_major_count, adjust, *self == Self::Log)
    }

    fn scale(&self) -> AxisScale {
        match self {
            Self::Linear => AxisScale::Linear,
            Self::Log => AxisScale::Log,
        }
    }
}

pub(crate) fn raw_rule(
    dlo: f64,
    dhi: f64,
    approx_major_count: f64,
    adjust: i32,
    log: bool,
) -> Box<dyn Rule> {
    // Log labelling only pays off across more than a decade.
    if log && (dhi / dlo).log10() > 1.0 {
        let n_decade = (dhi.log10() - dlo.log10()) / approx_major_count;
        let base = if n_decade >= 1.0 {
            -(n_decade as i32)
        } else if n_decade >= 0.5 {
            0
        } else if n_decade >= 0.2 {
            1
        } else {
            2
        };
        let ispacer = base + adjust;
        if ispacer < 0 {
            return Box::new(DecadeLogRule::new(-ispacer));
        } else if ispacer < 2 {
            return Box::new(SpacerLogRule::new(&LOG_SPACERS[ispacer as usize]));
        }
    }
    let approx_interval = (dhi - dlo) / approx_major_count;
    let exp = approx_interval.log10().floor() as i32;
    let oversize = approx_interval / exp10(exp);
    let nlevel = LINEAR_SPACERS.len() as i32;
    let num = exp * nlevel + LinearSpacer::index_for(oversize) - adjust;
    let (whole, part) = div_floor(num, nlevel);
    Box::new(LinearRule::new(whole, &LINEAR_SPACERS[part as usize]))
}

struct LinearSpacer {
    thresh: f64,
    major: i64,
    minor: f64,
}

const LINEAR_SPACERS: [LinearSpacer; 3] = [
    LinearSpacer {
        thresh: 2.5,
        major: 1,
        minor: 0.2,
    },
    LinearSpacer {
        thresh: 4.5,
        major: 2,
        minor: 0.5,
    },
    LinearSpacer {
        thresh: 7.5,
        major: 5,
        minor: 1.0,
    },
];

impl LinearSpacer {
    fn index_for(oversize: f64) -> i32 {
        LINEAR_SPACERS
            .iter()
            .position(|spacer| oversize <= spacer.thresh)
            .unwrap_or(LINEAR_SPACERS.len()) as i32
    }

    fn minor_offsets(&self) -> Vec<f64> {
        let n = (self.major as f64 / self.minor).round() as i64;
        (1..n).map(|i| self.minor * i as f64).collect()
    }
}

struct LinearRule {
    exp: i32,
    major: i64,
    mult: f64,
    minor_offsets: Vec<f64>,
}

impl LinearRule {
    fn new(exp: i32, spacer: &LinearSpacer) -> Self {
        Self {
            exp,
            major: spacer.major,
            mult: exp10(exp) * spacer.major as f64,
            minor_offsets: spacer.minor_offsets(),
        }
    }
}

impl Rule for LinearRule {
    fn floor_index(&self, value: f64) -> i64 {
        (value / self.mult).floor() as i64
    }

    fn minors(&self, index: i64) -> Vec<f64> {
        let major = self.index_to_value(index);
        let unit = exp10(self.exp);
        self.minor_offsets.iter().map(|m| major + unit * m).collect()
    }

    fn index_to_value(&self, index: i64) -> f64 {
        index as f64 * self.mult
    }

    fn index_to_label(&self, index: i64) -> String {
        linear_label(index * self.major, self.exp)
    }
}

struct LogSpacer {
    majors: &'static [i64],
    minors: &'static [&'static [f64]],
}

const LOG_SPACERS: [LogSpacer; 2] = [
    LogSpacer {
        majors: &[1, 2, 5],
        minors: &[&[1.5], &[3.0, 4.0], &[6.0, 7.0, 8.0, 9.0]],
    },
    LogSpacer {
        majors: &[1, 2, 3, 4, 5],
        minors: &[&[1.5], &[2.5], &[3.5], &[4.5], &[6.0, 7.0, 8.0, 9.0]],
    },
];

struct DecadeLogRule {
    n_decade: i32,
    abs_floor: i64,
    minor_factors: Vec<f64>,
}

impl DecadeLogRule {
    fn new(n_decade: i32) -> Self {
        let minor_factors = match n_decade {
            1 => (2..=9).map(f64::from).collect(),
            2 => (1..=9).map(|i| f64::from(i) * 10.0).collect(),
            3..=10 => (1..n_decade).map(exp10).collect(),
            _ => Vec::new(),
        };
        Self {
            n_decade,
            abs_floor: (f64::MIN_POSITIVE.log10() / f64::from(n_decade)).ceil() as i64,
            minor_factors,
        }
    }
}

impl Rule for DecadeLogRule {
    fn floor_index(&self, value: f64) -> i64 {
        ((value.log10() / f64::from(self.n_decade)).floor() as i64).max(self.abs_floor)
    }

    fn minors(&self, index: i64) -> Vec<f64> {
        let major = self.index_to_value(index);
        self.minor_factors.iter().map(|f| major * f).collect()
    }

    fn index_to_value(&self, index: i64) -> f64 {
        exp10(index as i32 * self.n_decade)
    }

    fn index_to_label(&self, index: i64) -> String {
        log_label(1, index as i32 * self.n_decade)
    }
}

struct SpacerLogRule {
    majors: &'static [i64],
    minors: &'static [&'static [f64]],
}

impl SpacerLogRule {
    fn new(spacer: &LogSpacer) -> Self {
        Self {
            majors: spacer.majors,
            minors: spacer.minors,
        }
    }

    fn split(&self, index: i64) -> (i32, usize) {
        let (exp, ik) = div_floor(index as i32, self.majors.len() as i32);
        (exp, ik as usize)
    }
}

impl Rule for SpacerLogRule {
    fn floor_index(&self, value: f64) -> i64 {
        let exp_floor = value.log10().floor() as i32;
        let mult = value / exp10(exp_floor);
        let ik = self
            .majors
            .iter()
            .rposition(|&major| mult >= major as f64)
            .unwrap_or(0);
        i64::from(exp_floor) * self.majors.len() as i64 + ik as i64
    }

    fn minors(&self, index: i64) -> Vec<f64> {
        let (exp, ik) = self.split(index);
        let base = exp10(exp);
        self.minors[ik].iter().map(|m| base * m).collect()
    }

    fn index_to_value(&self, index: i64) -> f64 {
        let (exp, ik) = self.split(index);
        self.majors[ik] as f64 * exp10(exp)
    }

    fn index_to_label(&self, index: i64) -> String {
        let (exp, ik) = self.split(index);
        log_label(self.majors[ik], exp)
    }
}

/// Label for the value `mantissa * 10^exp`, switching to `me±n` notation
/// beyond three decimal places either side.
pub fn linear_label(mantissa: i64, exp: i32) -> String {
    const SCI_LIMIT: i32 = 3;
    if mantissa == 0 {
        return "0".to_owned();
    }
    let sign = if mantissa < 0 { "-" } else { "" };
    let digits = mantissa.unsigned_abs().to_string();
    let ndigit = digits.len() as i32;
    if (0..=SCI_LIMIT).contains(&exp) {
        format!("{sign}{digits}{}", zeros(exp))
    } else if (-SCI_LIMIT..0).contains(&exp) {
        let point = ndigit + exp;
        if point <= 0 {
            format!("{sign}0.{}{digits}", zeros(-point))
        } else {
            let (whole, frac) = digits.split_at(point as usize);
            if frac.is_empty() {
                format!("{sign}{whole}")
            } else {
                format!("{sign}{whole}.{frac}")
            }
        }
    } else if exp > SCI_LIMIT {
        sci_label(sign, &digits, exp + ndigit - 1)
    } else {
        let pexp = exp + ndigit;
        if pexp > 0 {
            let (whole, frac) = digits.split_at(pexp as usize);
            format!("{sign}{whole}.{frac}")
        } else if pexp >= -SCI_LIMIT {
            format!("{sign}0.{}{digits}", zeros(-pexp))
        } else {
            sci_label(sign, &digits, pexp - 1)
        }
    }
}

fn sci_label(sign: &str, digits: &str, exp: i32) -> String {
    let (lead, rest) = digits.split_at(1);
    if rest.is_empty() {
        format!("{sign}{lead}e{exp}")
    } else {
        format!("{sign}{lead}.{rest}e{exp}")
    }
}

fn log_label(mantissa: i64, exponent: i32) -> String {
    if exponent == 0 {
        mantissa.to_string()
    } else if (-3..0).contains(&exponent) {
        format!("0.{}{mantissa}", zeros(-exponent - 1))
    } else if (1..4).contains(&exponent) {
        format!("{mantissa}{}", zeros(exponent))
    } else {
        format!("{mantissa}e{exponent}")
    }
}

/// Whether any two consecutive labels of `ticks` would overlap when drawn.
pub fn overlaps(ticks: &[Tick], axis: &Axis, captioner: &dyn Captioner, orient: Orientation) -> bool {
    let pad = captioner.pad();
    let mut last_box: Option<[ScreenPoint; 4]> = None;
    for tick in ticks {
        let Some(label) = &tick.label else {
            continue;
        };
        let gx = axis.data_to_graphics(tick.value).floor();
        let mut bounds = captioner.caption_bounds(label);
        bounds.width += pad;
        let transform = orient.caption_transform(bounds, pad);
        let corners = [
            (0.0, 0.0),
            (bounds.width, 0.0),
            (bounds.width, bounds.height),
            (0.0, bounds.height),
        ];
        let label_box = corners.map(|(x, y)| {
            let p = transform.apply(ScreenPoint::new(x, y));
            ScreenPoint::new(p.x + gx, p.y)
        });
        if let Some(previous) = &last_box {
            if convex_polygons_intersect(&label_box, previous) {
                return true;
            }
        }
        last_box = Some(label_box);
    }
    false
}

/// Separating-axis test on two convex polygons.
fn convex_polygons_intersect(a: &[ScreenPoint], b: &[ScreenPoint]) -> bool {
    for (poly, other) in [(a, b), (b, a)] {
        let n = poly.len();
        for i in 0..n {
            let (p0, p1) = (poly[i], poly[(i + 1) % n]);
            if side_of(p0, p1, poly) * side_of(p0, p1, other) == -1 {
                return false;
            }
        }
    }
    true
}

/// +1 or -1 if every point lies on that side of the line (or on it), else 0.
fn side_of(p0: ScreenPoint, p1: ScreenPoint, points: &[ScreenPoint]) -> i32 {
    let mut kside = 0;
    for p in points {
        let cross = (p.x - p0.x) * (p1.y - p0.y) - (p.y - p0.y) * (p1.x - p0.x);
        let iside = if cross > 0.0 {
            1
        } else if cross < 0.0 {
            -1
        } else {
            0
        };
        if iside != 0 {
            if kside == 0 {
                kside = iside;
            } else if kside != iside {
                return 0;
            }
        }
    }
    kside
}

pub(crate) fn exp10(exp: i32) -> f64 {
    if exp >= 0 {
        10f64.powi(exp)
    } else {
        1.0 / 10f64.powi(-exp)
    }
}

fn zeros(n: i32) -> String {
    "0".repeat(n.max(0) as usize)
}

pub(crate) fn div_floor(numerator: i32, divisor: i32) -> (i32, i32) {
    (numerator.div_euclid(divisor), numerator.rem_euclid(divisor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captioner::FixedCaptioner;

    fn values(run: &TickRun) -> Vec<f64> {
        run.ticks.iter().filter(|t| t.is_major()).map(|t| t.value).collect()
    }

    #[test]
    fn linear_labels() {
        assert_eq!(linear_label(0, 5), "0");
        assert_eq!(linear_label(25, 1), "250");
        assert_eq!(linear_label(-25, -1), "-2.5");
        assert_eq!(linear_label(5, -3), "0.005");
        assert_eq!(linear_label(2, 6), "2e6");
        assert_eq!(linear_label(15, 4), "1.5e5");
        assert_eq!(linear_label(125, -6), "0.000125");
        assert_eq!(linear_label(2, -9), "2e-9");
        assert_eq!(linear_label(10, -1), "1.0");
        assert_eq!(linear_label(10, 4), "1.0e5");
    }

    #[test]
    fn log_labels() {
        assert_eq!(log_label(1, 0), "1");
        assert_eq!(log_label(2, -2), "0.02");
        assert_eq!(log_label(5, 3), "5000");
        assert_eq!(log_label(1, 6), "1e6");
    }

    #[test]
    fn linear_ticks_are_round_and_increasing() {
        let run = BasicTicker::Linear.get_ticks(
            0.0,
            10.0,
            true,
            &FixedCaptioner::default(),
            &[Orientation::X],
            400,
            1.0,
        );
        let majors = values(&run);
        assert!(majors.len() >= 2);
        assert!(majors.windows(2).all(|w| w[0] < w[1]));
        assert!(majors.iter().all(|v| (0.0..=10.0).contains(v)));
        assert_eq!(majors.first(), Some(&0.0));
        let labels: Vec<_> = run.ticks.iter().filter_map(|t| t.label.clone()).collect();
        assert!(labels.contains(&"10".to_owned()));
        assert!(run.ticks.iter().any(|t| !t.is_major()));
    }

    #[test]
    fn crowding_increases_density() {
        let captioner = FixedCaptioner::default();
        let sparse =
            BasicTicker::Linear.get_ticks(0.0, 1.0, false, &captioner, &[Orientation::X], 800, 0.5);
        let dense =
            BasicTicker::Linear.get_ticks(0.0, 1.0, false, &captioner, &[Orientation::X], 800, 2.0);
        assert!(dense.ticks.len() > sparse.ticks.len());
    }

    #[test]
    fn unusable_crowding_ticks_as_normal() {
        let captioner = FixedCaptioner::default();
        let normal = values(&BasicTicker::Linear.get_ticks(0.0, 10.0, false, &captioner, &[Orientation::X], 400, 1.0));
        for crowding in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let run = BasicTicker::Linear.get_ticks(0.0, 10.0, false, &captioner, &[Orientation::X], 400, crowding);
            assert_eq!(values(&run), normal, "crowding {crowding}");
        }
        let dated = time::TimeFormat::Iso8601.get_ticks(0.0, 86_400.0, false, &captioner, &[Orientation::X], 400, 0.0);
        assert!(!dated.ticks.is_empty());
    }

    #[test]
    fn log_ticks_over_decades() {
        let run = BasicTicker::Log.get_ticks(
            1.0,
            1e6,
            false,
            &FixedCaptioner::default(),
            &[Orientation::X],
            400,
            1.0,
        );
        let majors = values(&run);
        assert!(majors.len() >= 2);
        for v in &majors {
            let l = v.log10();
            assert!((l - l.round()).abs() < 1e-9, "{v} is not a power of ten");
        }
    }

    #[test]
    fn narrow_log_range_falls_back_to_linear() {
        let run = BasicTicker::Log.get_ticks(
            2.0,
            3.0,
            false,
            &FixedCaptioner::default(),
            &[Orientation::X],
            400,
            1.0,
        );
        assert!(values(&run).len() >= 2);
    }

    #[test]
    fn zero_width_range_gives_single_tick() {
        let run = BasicTicker::Linear.get_ticks(
            3.0,
            3.0,
            true,
            &FixedCaptioner::default(),
            &[Orientation::X],
            400,
            1.0,
        );
        assert_eq!(run.ticks, vec![Tick::major(3.0, "3")]);
    }

    #[test]
    fn wide_labels_are_thinned() {
        let wide = FixedCaptioner {
            char_width: 40.0,
            ..FixedCaptioner::default()
        };
        let run = BasicTicker::Linear.get_ticks(0.0, 100.0, false, &wide, &[Orientation::X], 400, 4.0);
        let axis = Axis::new(0.0, 400.0, 0.0, 100.0, AxisScale::Linear, false);
        assert!(!overlaps(&run.ticks, &axis, &wide, Orientation::X));
    }

    #[test]
    fn disjoint_boxes_do_not_intersect() {
        let square = |x: f64| {
            [
                ScreenPoint::new(x, 0.0),
                ScreenPoint::new(x + 1.0, 0.0),
                ScreenPoint::new(x + 1.0, 1.0),
                ScreenPoint::new(x, 1.0),
            ]
        };
        assert!(!convex_polygons_intersect(&square(0.0), &square(2.0)));
        assert!(convex_polygons_intersect(&square(0.0), &square(0.5)));
    }
}
