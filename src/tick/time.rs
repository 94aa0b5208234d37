//! Time value formatting and tick placement.
//!
//! Time axes store seconds since the Unix epoch. A [`TimeFormat`] decides
//! how those values are written out and where ticks fall: ISO-8601 ticks
//! land on calendar boundaries, numeric formats use round values in their
//! own scale.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use super::{Rule, Ticker, raw_rule};
use crate::axis::AxisScale;

const MINUTE_SECS: i64 = 60;
const HOUR_SECS: i64 = 60 * MINUTE_SECS;
const DAY_SECS: i64 = 24 * HOUR_SECS;
const WEEK_SECS: i64 = 7 * DAY_SECS;
const YEAR_SECS: i64 = (365 * 4 + 1) * DAY_SECS / 4;

/// Unix time of the first Monday after the epoch.
const EPOCH_MONDAY: i64 = 4 * DAY_SECS;

/// Unix time of the MJD zero point expressed in days.
const MJD_UNIX_EPOCH: f64 = 40587.0;

/// Beyond this many seconds from the epoch calendar arithmetic is skipped.
const CALENDAR_LIMIT: f64 = 1e10;

const DATE_PREFIX: &str = "%Y-%m-%dT";

/// Representation of time values for labels and position reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeFormat {
    /// ISO 8601 date, of the form `yyyy-mm-ddThh:mm:ss.s`.
    #[default]
    Iso8601,
    /// Decimal year.
    DecimalYear,
    /// Modified Julian Date.
    Mjd,
    /// Seconds since midnight of 1 Jan 1970.
    UnixSeconds,
}

impl TimeFormat {
    /// All supported formats.
    pub const ALL: [Self; 4] = [Self::Iso8601, Self::DecimalYear, Self::Mjd, Self::UnixSeconds];

    /// Short name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Iso8601 => "ISO-8601",
            Self::DecimalYear => "Year",
            Self::Mjd => "MJD",
            Self::UnixSeconds => "Unix",
        }
    }

    /// One-line description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Iso8601 => "ISO 8601 date, of the form yyyy-mm-ddThh:mm:ss.s",
            Self::DecimalYear => "Decimal year",
            Self::Mjd => "Modified Julian Date",
            Self::UnixSeconds => "Seconds since midnight of 1 Jan 1970",
        }
    }

    /// Look a format up by its short name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(name))
    }

    /// Convert Unix seconds into this format's numeric scale.
    ///
    /// ISO-8601 has no numeric scale and returns the input.
    pub fn from_unix_seconds(self, unix_sec: f64) -> f64 {
        match self {
            Self::Iso8601 | Self::UnixSeconds => unix_sec,
            Self::DecimalYear => unix_to_decimal_year(unix_sec),
            Self::Mjd => unix_sec / DAY_SECS as f64 + MJD_UNIX_EPOCH,
        }
    }

    /// Convert a value in this format's numeric scale back to Unix seconds.
    pub fn to_unix_seconds(self, value: f64) -> f64 {
        match self {
            Self::Iso8601 | Self::UnixSeconds => value,
            Self::DecimalYear => decimal_year_to_unix(value),
            Self::Mjd => (value - MJD_UNIX_EPOCH) * DAY_SECS as f64,
        }
    }

    /// Format a time to roughly `sec_precision` seconds.
    pub fn format_time(self, unix_sec: f64, sec_precision: f64) -> String {
        match self {
            Self::Iso8601 => format_iso(unix_sec, sec_precision),
            _ => self.format_numeric(unix_sec, sec_precision),
        }
    }

    fn format_numeric(self, unix_sec: f64, sec_precision: f64) -> String {
        let val = self.from_unix_seconds(unix_sec);
        let prec = self.from_unix_seconds(unix_sec + sec_precision) - val;
        let ndp = (-prec.abs().log10()).max(0.0).round().min(15.0) as usize;
        if ndp == 0 {
            format!("{}", val.round() as i64)
        } else {
            format!("{val:.ndp$}")
        }
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Ticker for TimeFormat {
    fn create_rule(
        &self,
        dlo: f64,
        dhi: f64,
        approx_major_count: f64,
        adjust: i32,
    ) -> Box<dyn Rule> {
        match self {
            Self::Iso8601 => iso_rule(dlo, dhi, approx_major_count, adjust),
            Self::UnixSeconds => raw_rule(dlo, dhi, approx_major_count, adjust, false),
            format => Box::new(ConvertedRule {
                inner: raw_rule(
                    format.from_unix_seconds(dlo),
                    format.from_unix_seconds(dhi),
                    approx_major_count,
                    adjust,
                    false,
                ),
                format: *format,
            }),
        }
    }

    fn scale(&self) -> AxisScale {
        AxisScale::Time
    }
}

/// Fractional year, using the calendar year length for ordinary dates.
pub fn unix_to_decimal_year(unix_sec: f64) -> f64 {
    if unix_sec.abs() < CALENDAR_LIMIT {
        if let Some(dt) = DateTime::from_timestamp(unix_sec.floor() as i64, 0) {
            let year = dt.year();
            if let (Some(start), Some(end)) = (year_start(year), year_start(year + 1)) {
                return f64::from(year) + (unix_sec - start as f64) / (end - start) as f64;
            }
        }
    }
    1970.0 + unix_sec / (365.25 * DAY_SECS as f64)
}

/// Inverse of [`unix_to_decimal_year`].
pub fn decimal_year_to_unix(decimal_year: f64) -> f64 {
    let year = decimal_year.trunc();
    if year.abs() < 200_000.0 {
        let iyear = year as i32;
        if let (Some(start), Some(end)) = (year_start(iyear), year_start(iyear + 1)) {
            return start as f64 + (decimal_year - year) * (end - start) as f64;
        }
    }
    (decimal_year - 1970.0) * 365.25 * DAY_SECS as f64
}

fn year_start(year: i32) -> Option<i64> {
    Some(NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

fn month_start(months_since_epoch: i64) -> Option<i64> {
    let year = i32::try_from(1970 + months_since_epoch.div_euclid(12)).ok()?;
    let month = months_since_epoch.rem_euclid(12) as u32 + 1;
    Some(NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

fn utc(unix_sec: f64) -> Option<DateTime<Utc>> {
    if !unix_sec.is_finite() {
        return None;
    }
    DateTime::from_timestamp(unix_sec.floor() as i64, 0)
}

fn format_iso(unix_sec: f64, sec_precision: f64) -> String {
    let level = &LEVELS[level_index(sec_precision).clamp(0, LEVELS.len() as i32 - 1) as usize];
    let text = level.format(unix_sec, true, true);
    if sec_precision <= 0.1 {
        let ndp = (-sec_precision.log10()).max(0.0).round().min(9.0) as i32;
        let scale = 10i64.pow(ndp as u32);
        // A fraction rounding up to a whole second reads as .0 of the same
        // second: the carry into the seconds field is not propagated.
        let frac = unix_sec - unix_sec.floor();
        let digits = ((scale as f64) * (1.0 + frac)).round() as i64;
        format!("{text}.{}", &digits.to_string()[1..])
    } else {
        text
    }
}

/// Calendar step between major ticks of a date level.
#[derive(Debug, Clone, Copy)]
enum Step {
    Years,
    Months(i64),
    Weeks,
    Seconds(i64),
}

/// One rung of the ladder of calendar tick spacings.
#[derive(Debug)]
struct DateLevel {
    step: Step,
    minor_secs: i64,
    prefix: &'static str,
    suffix: &'static str,
}

const fn level(
    step: Step,
    minor_secs: i64,
    prefix: &'static str,
    suffix: &'static str,
) -> DateLevel {
    DateLevel {
        step,
        minor_secs,
        prefix,
        suffix,
    }
}

static LEVELS: [DateLevel; 13] = [
    level(Step::Years, 0, "", "%Y"),
    level(Step::Months(4), 0, "%Y-", "%m"),
    level(Step::Months(1), 0, "%Y-", "%m"),
    level(Step::Weeks, DAY_SECS, "%Y-", "%m-%d"),
    level(Step::Seconds(DAY_SECS), 6 * HOUR_SECS, "%Y-%m-", "%d"),
    level(Step::Seconds(6 * HOUR_SECS), HOUR_SECS, DATE_PREFIX, "%H"),
    level(Step::Seconds(HOUR_SECS), 15 * MINUTE_SECS, DATE_PREFIX, "%H"),
    level(Step::Seconds(15 * MINUTE_SECS), 5 * MINUTE_SECS, DATE_PREFIX, "%H:%M"),
    level(Step::Seconds(5 * MINUTE_SECS), MINUTE_SECS, DATE_PREFIX, "%H:%M"),
    level(Step::Seconds(MINUTE_SECS), 15, DATE_PREFIX, "%H:%M"),
    level(Step::Seconds(15), 5, "%Y-%m-%dT%H:", "%M:%S"),
    level(Step::Seconds(5), 1, "%Y-%m-%dT%H:", "%M:%S"),
    level(Step::Seconds(1), 0, "%Y-%m-%dT%H:%M:", "%S"),
];

/// Level used for sub-second prefixes.
const SECOND_LEVEL: usize = 12;

/// Index of the coarsest level no coarser than `sec_gap`.
///
/// Returns -1 above a year and `LEVELS.len()` below a second.
fn level_index(sec_gap: f64) -> i32 {
    if sec_gap > YEAR_SECS as f64 {
        return -1;
    }
    LEVELS
        .iter()
        .position(|level| sec_gap >= level.nominal_secs() as f64)
        .unwrap_or(LEVELS.len()) as i32
}

impl DateLevel {
    fn nominal_secs(&self) -> i64 {
        match self.step {
            Step::Years => YEAR_SECS,
            Step::Months(n) => n * YEAR_SECS / 12,
            Step::Weeks => WEEK_SECS,
            Step::Seconds(s) => s,
        }
    }

    fn floor_index(&self, unix_sec: f64) -> i64 {
        let fallback = (unix_sec / self.nominal_secs() as f64).floor() as i64;
        match self.step {
            Step::Years => utc(unix_sec).map_or(fallback, |dt| i64::from(dt.year()) - 1970),
            Step::Months(n) => utc(unix_sec).map_or(fallback, |dt| {
                let months = (i64::from(dt.year()) - 1970) * 12 + i64::from(dt.month0());
                months.div_euclid(n)
            }),
            Step::Weeks => ((unix_sec - EPOCH_MONDAY as f64) / WEEK_SECS as f64).floor() as i64,
            Step::Seconds(s) => (unix_sec / s as f64).floor() as i64,
        }
    }

    fn index_to_value(&self, index: i64) -> f64 {
        let secs = match self.step {
            Step::Years => i32::try_from(1970 + index).ok().and_then(year_start),
            Step::Months(n) => month_start(index * n),
            Step::Weeks => Some(EPOCH_MONDAY + index * WEEK_SECS),
            Step::Seconds(s) => Some(index * s),
        };
        secs.map_or(f64::NAN, |s| s as f64)
    }

    fn minors(&self, index: i64) -> Vec<f64> {
        let base = self.index_to_value(index);
        if !base.is_finite() {
            return Vec::new();
        }
        let offsets: Vec<Option<i64>> = match self.step {
            Step::Years => (1..4).map(|q| month_start(index * 12 + q * 3)).collect(),
            Step::Months(1) => (1..4).map(|w| Some(base as i64 + w * WEEK_SECS)).collect(),
            Step::Months(n) => (1..n).map(|m| month_start(index * n + m)).collect(),
            Step::Weeks | Step::Seconds(_) if self.minor_secs > 0 => {
                let major = self.nominal_secs();
                (1..major / self.minor_secs)
                    .map(|i| Some(base as i64 + i * self.minor_secs))
                    .collect()
            }
            _ => Vec::new(),
        };
        offsets.into_iter().flatten().map(|s| s as f64).collect()
    }

    fn format(&self, unix_sec: f64, prefix: bool, suffix: bool) -> String {
        let Some(dt) = utc(unix_sec) else {
            return format!("{unix_sec}");
        };
        let mut text = String::new();
        if prefix {
            text.push_str(&dt.format(self.prefix).to_string());
        }
        if suffix {
            text.push_str(&dt.format(self.suffix).to_string());
        }
        text
    }
}

fn iso_rule(dlo: f64, dhi: f64, approx_major_count: f64, adjust: i32) -> Box<dyn Rule> {
    let sec_gap = (dhi - dlo) / approx_major_count;
    let ilevel = level_index(sec_gap);
    let nlevel = LEVELS.len() as i32;
    if ilevel < 0 {
        TimeFormat::DecimalYear.create_rule(dlo, dhi, approx_major_count, adjust)
    } else if ilevel < nlevel {
        let index = (ilevel + adjust).clamp(0, nlevel - 1);
        Box::new(DateRule {
            level: &LEVELS[index as usize],
        })
    } else {
        let inner = raw_rule(dlo, dhi, approx_major_count, adjust, false);
        let sec_per_index = inner.index_to_value(1) - inner.index_to_value(0);
        let index_per_min = ((60.0 / sec_per_index).round() as i64).max(1);
        Box::new(SubSecondRule {
            inner,
            sec_per_index,
            index_per_min,
        })
    }
}

struct DateRule {
    level: &'static DateLevel,
}

impl Rule for DateRule {
    fn floor_index(&self, value: f64) -> i64 {
        self.level.floor_index(value)
    }

    fn minors(&self, index: i64) -> Vec<f64> {
        self.level.minors(index)
    }

    fn index_to_value(&self, index: i64) -> f64 {
        self.level.index_to_value(index)
    }

    fn index_to_label(&self, index: i64) -> String {
        self.level.format(self.index_to_value(index), false, true)
    }

    fn index_to_prefix(&self, index: i64) -> Option<String> {
        Some(self.level.format(self.index_to_value(index), true, false))
    }
}

/// Seconds within the minute, labelled below a `yyyy-mm-ddThh:mm:` prefix.
struct SubSecondRule {
    inner: Box<dyn Rule>,
    sec_per_index: f64,
    index_per_min: i64,
}

impl SubSecondRule {
    fn minute_floor_index(&self, index: i64) -> i64 {
        index.div_euclid(self.index_per_min) * self.index_per_min
    }
}

impl Rule for SubSecondRule {
    fn floor_index(&self, value: f64) -> i64 {
        self.inner.floor_index(value)
    }

    fn minors(&self, index: i64) -> Vec<f64> {
        self.inner.minors(index)
    }

    fn index_to_value(&self, index: i64) -> f64 {
        self.inner.index_to_value(index)
    }

    fn index_to_label(&self, index: i64) -> String {
        self.inner
            .index_to_label(index - self.minute_floor_index(index))
    }

    fn index_to_prefix(&self, index: i64) -> Option<String> {
        let minute_sec = self.minute_floor_index(index) as f64 * self.sec_per_index;
        Some(LEVELS[SECOND_LEVEL].format(minute_sec, true, false))
    }
}

/// Linear rule in a numeric time scale, reporting Unix seconds.
struct ConvertedRule {
    inner: Box<dyn Rule>,
    format: TimeFormat,
}

impl Rule for ConvertedRule {
    fn floor_index(&self, value: f64) -> i64 {
        self.inner.floor_index(self.format.from_unix_seconds(value))
    }

    fn minors(&self, index: i64) -> Vec<f64> {
        self.inner
            .minors(index)
            .into_iter()
            .map(|m| self.format.to_unix_seconds(m))
            .collect()
    }

    fn index_to_value(&self, index: i64) -> f64 {
        self.format.to_unix_seconds(self.inner.index_to_value(index))
    }

    fn index_to_label(&self, index: i64) -> String {
        self.inner.index_to_label(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captioner::{FixedCaptioner, Orientation};

    fn unix(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> f64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .map(|dt| dt.and_utc().timestamp() as f64)
            .expect("valid date")
    }

    #[test]
    fn decimal_year_roundtrip() {
        let t = unix(2021, 7, 2, 12, 0, 0);
        let year = unix_to_decimal_year(t);
        assert!((year - 2021.5).abs() < 1e-9);
        assert!((decimal_year_to_unix(year) - t).abs() < 1e-3);
        assert_eq!(unix_to_decimal_year(unix(2000, 1, 1, 0, 0, 0)), 2000.0);
    }

    #[test]
    fn mjd_epoch() {
        assert_eq!(TimeFormat::Mjd.from_unix_seconds(0.0), 40587.0);
        assert_eq!(TimeFormat::Mjd.to_unix_seconds(40588.0), 86400.0);
    }

    #[test]
    fn iso_format_tracks_precision() {
        let t = unix(2013, 4, 25, 13, 7, 21) + 0.25;
        assert_eq!(TimeFormat::Iso8601.format_time(t, 1.0), "2013-04-25T13:07:21");
        assert_eq!(TimeFormat::Iso8601.format_time(t, 0.01), "2013-04-25T13:07:21.25");
        assert_eq!(TimeFormat::Iso8601.format_time(t, 86400.0), "2013-04-25");
        assert_eq!(TimeFormat::Iso8601.format_time(t, 1e9), "2013");
    }

    #[test]
    fn iso_fraction_does_not_carry_into_seconds() {
        assert_eq!(TimeFormat::Iso8601.format_time(0.96, 0.1), "1970-01-01T00:00:00.0");
        assert_eq!(TimeFormat::Iso8601.format_time(0.94, 0.1), "1970-01-01T00:00:00.9");
    }

    #[test]
    fn numeric_format_decimal_places() {
        assert_eq!(TimeFormat::UnixSeconds.format_time(1234.5678, 0.01), "1234.57");
        assert_eq!(TimeFormat::UnixSeconds.format_time(1234.5678, 10.0), "1235");
        assert_eq!(TimeFormat::Mjd.format_time(0.0, 86400.0), "40587");
    }

    #[test]
    fn names_resolve() {
        assert_eq!(TimeFormat::from_name("mjd"), Some(TimeFormat::Mjd));
        assert_eq!(TimeFormat::from_name("iso-8601"), Some(TimeFormat::Iso8601));
        assert_eq!(TimeFormat::from_name("julian"), None);
    }

    #[test]
    fn monthly_ticks_fall_on_first_of_month() {
        let lo = unix(2020, 1, 10, 0, 0, 0);
        let hi = unix(2020, 9, 10, 0, 0, 0);
        let run = TimeFormat::Iso8601.get_ticks(
            lo,
            hi,
            false,
            &FixedCaptioner::default(),
            &[Orientation::X],
            800,
            1.0,
        );
        assert!(!run.ticks.is_empty());
        for tick in &run.ticks {
            let dt = utc(tick.value).expect("in range");
            assert_eq!(dt.day(), 1);
        }
        let first = run.ticks[0].label.as_deref().expect("labelled");
        assert!(first.starts_with("2020-"), "{first}");
        assert!(!run.ticks[1].label.as_deref().unwrap_or("").contains('-'));
    }

    #[test]
    fn sub_second_ticks_carry_minute_prefix() {
        let lo = unix(2001, 2, 3, 4, 5, 6);
        let run = TimeFormat::Iso8601.get_ticks(
            lo,
            lo + 2.0,
            false,
            &FixedCaptioner::default(),
            &[Orientation::X],
            600,
            1.0,
        );
        let first = run.ticks[0].label.as_deref().expect("labelled");
        assert!(first.starts_with("2001-02-03T04:05:"), "{first}");
        assert_eq!(first, "2001-02-03T04:05:6.0");
    }

    #[test]
    fn decimal_year_ticks_for_long_spans() {
        let lo = unix(1900, 1, 1, 0, 0, 0);
        let hi = unix(2000, 1, 1, 0, 0, 0);
        let run = TimeFormat::Iso8601.get_ticks(
            lo,
            hi,
            false,
            &FixedCaptioner::default(),
            &[Orientation::X],
            400,
            1.0,
        );
        let labels: Vec<_> = run.ticks.iter().filter_map(|t| t.label.clone()).collect();
        assert!(labels.contains(&"1950".to_owned()), "{labels:?}");
    }
}
