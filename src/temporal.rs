//! Timestamps and context-tagged time ranges.
//!
//! Every fact in the store is true over a half-open range `[start, stop)`.
//! Timestamps distinguish four cases:
//!
//! - **Na** — not applicable; matches and is matched by everything
//! - **NegInf** / **PosInf** — unbounded endpoints for timeless facts
//! - **At** — a specific instant, in seconds since the UNIX epoch
//!
//! A [`TimeRange`] also carries the [`ContextId`] of the context the fact
//! belongs to, which retrieval uses for visibility checks.
//!
//! Civil date conversion uses the days-from-civil algorithm (Howard Hinnant's
//! public-domain formulation), so no calendar crate is needed for the
//! `YYYYMMDD` forms the knowledge syntax uses.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::ContextId;
use crate::error::TemporalError;

const SECS_PER_DAY: i64 = 86_400;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// A point in time, or one of the sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timestamp {
    /// Not applicable. A query at `Na` ignores time entirely.
    Na,
    /// Unboundedly far in the past.
    NegInf,
    /// Seconds since the UNIX epoch.
    At(i64),
    /// Unboundedly far in the future.
    PosInf,
}

static RE_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})(?:T(\d{2})(\d{2})(\d{2}))?$").unwrap());

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Timestamp::At(secs as i64)
    }

    pub fn is_na(self) -> bool {
        matches!(self, Timestamp::Na)
    }

    /// Whether this is an actual instant rather than a sentinel.
    pub fn is_specific(self) -> bool {
        matches!(self, Timestamp::At(_))
    }

    /// Numeric value for comparisons. `Na` has none; the infinities clamp to
    /// the extremes of `i64`.
    pub fn value(self) -> Option<i64> {
        match self {
            Timestamp::Na => None,
            Timestamp::NegInf => Some(i64::MIN),
            Timestamp::At(secs) => Some(secs),
            Timestamp::PosInf => Some(i64::MAX),
        }
    }

    /// Parse a timestamp from its textual form.
    ///
    /// Accepts `na`, `-inf`, `inf`, `now`, `YYYYMMDD`, and `YYYYMMDDTHHMMSS`.
    pub fn parse(text: &str) -> Result<Self, TemporalError> {
        match text {
            "na" => return Ok(Timestamp::Na),
            "-inf" => return Ok(Timestamp::NegInf),
            "inf" | "+inf" => return Ok(Timestamp::PosInf),
            "now" => return Ok(Timestamp::now()),
            _ => {}
        }
        let caps = RE_STAMP.captures(text).ok_or_else(|| {
            TemporalError::InvalidTimestamp {
                text: text.to_string(),
            }
        })?;
        let field = |i: usize| -> i64 {
            caps.get(i)
                .map(|m| m.as_str().parse().unwrap_or(0))
                .unwrap_or(0)
        };
        let (year, month, day) = (field(1), field(2), field(3));
        let (hour, min, sec) = (field(4), field(5), field(6));
        let valid = (1..=12).contains(&month)
            && (1..=31).contains(&day)
            && (0..24).contains(&hour)
            && (0..60).contains(&min)
            && (0..60).contains(&sec);
        if !valid {
            return Err(TemporalError::InvalidTimestamp {
                text: text.to_string(),
            });
        }
        let days = days_from_civil(year, month as u32, day as u32);
        Ok(Timestamp::At(days * SECS_PER_DAY + hour * 3600 + min * 60 + sec))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timestamp::Na => write!(f, "na"),
            Timestamp::NegInf => write!(f, "-inf"),
            Timestamp::PosInf => write!(f, "inf"),
            Timestamp::At(secs) => {
                let days = secs.div_euclid(SECS_PER_DAY);
                let sod = secs.rem_euclid(SECS_PER_DAY);
                let (y, m, d) = civil_from_days(days);
                if sod == 0 {
                    write!(f, "{y:04}{m:02}{d:02}")
                } else {
                    let (h, mi, s) = (sod / 3600, (sod / 60) % 60, sod % 60);
                    write!(f, "{y:04}{m:02}{d:02}T{h:02}{mi:02}{s:02}")
                }
            }
        }
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian civil date.
fn days_from_civil(mut y: i64, m: u32, d: u32) -> i64 {
    let m = m as i64;
    let d = d as i64;
    if m <= 2 {
        y -= 1;
    }
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`].
fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let mut y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    if m <= 2 {
        y += 1;
    }
    (y, m, d)
}

// ---------------------------------------------------------------------------
// Time ranges
// ---------------------------------------------------------------------------

/// A half-open interval `[start, stop)` tagged with its owning context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub stop: Timestamp,
    pub context: ContextId,
}

impl TimeRange {
    pub fn new(start: Timestamp, stop: Timestamp, context: ContextId) -> Self {
        Self {
            start,
            stop,
            context,
        }
    }

    /// The timeless range `[-inf, inf)`.
    pub fn always(context: ContextId) -> Self {
        Self {
            start: Timestamp::NegInf,
            stop: Timestamp::PosInf,
            context,
        }
    }

    /// A single-instant range.
    ///
    /// For a specific instant the stop is bumped one second past the start so
    /// that the half-open match test can hit it.
    pub fn point(ts: Timestamp, context: ContextId) -> Self {
        let stop = match ts {
            Timestamp::At(secs) => Timestamp::At(secs + 1),
            other => other,
        };
        Self {
            start: ts,
            stop,
            context,
        }
    }

    /// Whether a point query at `ts` falls inside this range.
    ///
    /// `Na` on either side is unbounded; a query at `Na` matches any range.
    pub fn matches(&self, ts: Timestamp) -> bool {
        let Some(t) = ts.value() else {
            return true;
        };
        self.start.value().map_or(true, |s| t >= s) && self.stop.value().map_or(true, |e| t < e)
    }

    /// Whether two ranges share an instant.
    ///
    /// Identical ranges overlap even when degenerate, so two equal point
    /// ranges count as overlapping.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        if self.start == other.start && self.stop == other.stop {
            return true;
        }
        let s1 = self.start.value().unwrap_or(i64::MIN);
        let e1 = self.stop.value().unwrap_or(i64::MAX);
        let s2 = other.start.value().unwrap_or(i64::MIN);
        let e2 = other.stop.value().unwrap_or(i64::MAX);
        (s1 >= s2 && s1 < e2) || (e1 > s2 && e1 <= e2) || (s2 >= s1 && s2 < e1)
    }

    /// Parse `start:stop` or a single point timestamp.
    pub fn parse(text: &str, context: ContextId) -> Result<Self, TemporalError> {
        if text.is_empty() {
            return Err(TemporalError::InvalidRange {
                text: text.to_string(),
            });
        }
        match text.split_once(':') {
            Some((start, stop)) => {
                let start = Timestamp::parse(start)?;
                let stop = Timestamp::parse(stop)?;
                Ok(Self {
                    start,
                    stop,
                    context,
                })
            }
            None => Ok(Self::point(Timestamp::parse(text)?, context)),
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}:{}", self.start, self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx() -> ContextId {
        ContextId::ROOT
    }

    #[test]
    fn epoch_is_day_zero() {
        assert_eq!(Timestamp::parse("19700101").unwrap(), Timestamp::At(0));
    }

    #[test]
    fn parse_date_and_datetime() {
        let date = Timestamp::parse("19940101").unwrap();
        let datetime = Timestamp::parse("19940101T120000").unwrap();
        let Timestamp::At(d) = date else { panic!() };
        let Timestamp::At(dt) = datetime else { panic!() };
        assert_eq!(dt - d, 12 * 3600);
    }

    #[test]
    fn parse_sentinels() {
        assert_eq!(Timestamp::parse("na").unwrap(), Timestamp::Na);
        assert_eq!(Timestamp::parse("-inf").unwrap(), Timestamp::NegInf);
        assert_eq!(Timestamp::parse("inf").unwrap(), Timestamp::PosInf);
        assert!(Timestamp::parse("now").unwrap().is_specific());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Timestamp::parse("1994-01-01").is_err());
        assert!(Timestamp::parse("19941301").is_err());
        assert!(Timestamp::parse("19940132").is_err());
        assert!(Timestamp::parse("19940101T250000").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn display_round_trips() {
        for text in ["19700101", "19940315", "20260822T093015", "na", "-inf", "inf"] {
            let ts = Timestamp::parse(text).unwrap();
            assert_eq!(ts.to_string(), text);
            assert_eq!(Timestamp::parse(&ts.to_string()).unwrap(), ts);
        }
    }

    #[test]
    fn civil_conversion_handles_leap_years() {
        let feb29 = Timestamp::parse("20240229").unwrap();
        assert_eq!(feb29.to_string(), "20240229");
        let mar1 = Timestamp::parse("20240301").unwrap();
        let (Timestamp::At(a), Timestamp::At(b)) = (feb29, mar1) else {
            panic!()
        };
        assert_eq!(b - a, SECS_PER_DAY);
    }

    #[test]
    fn pre_epoch_dates_work() {
        let ts = Timestamp::parse("19611115").unwrap();
        let Timestamp::At(secs) = ts else { panic!() };
        assert!(secs < 0);
        assert_eq!(ts.to_string(), "19611115");
    }

    #[test]
    fn match_is_half_open() {
        let range = TimeRange::new(Timestamp::At(100), Timestamp::At(200), cx());
        assert!(!range.matches(Timestamp::At(99)));
        assert!(range.matches(Timestamp::At(100)));
        assert!(range.matches(Timestamp::At(199)));
        assert!(!range.matches(Timestamp::At(200)));
    }

    #[test]
    fn na_query_matches_everything() {
        let range = TimeRange::new(Timestamp::At(100), Timestamp::At(200), cx());
        assert!(range.matches(Timestamp::Na));
        assert!(TimeRange::always(cx()).matches(Timestamp::Na));
    }

    #[test]
    fn na_endpoints_are_unbounded() {
        let open = TimeRange::new(Timestamp::Na, Timestamp::Na, cx());
        assert!(open.matches(Timestamp::At(i64::MIN)));
        assert!(open.matches(Timestamp::At(0)));
        assert!(open.matches(Timestamp::At(i64::MAX)));
    }

    #[test]
    fn point_range_is_matchable() {
        let range = TimeRange::point(Timestamp::At(100), cx());
        assert!(range.matches(Timestamp::At(100)));
        assert!(!range.matches(Timestamp::At(101)));
    }

    #[test]
    fn overlap_of_disjoint_ranges_is_false() {
        let a = TimeRange::new(Timestamp::At(0), Timestamp::At(10), cx());
        let b = TimeRange::new(Timestamp::At(10), Timestamp::At(20), cx());
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn overlap_of_nested_ranges_is_true() {
        let outer = TimeRange::new(Timestamp::At(0), Timestamp::At(100), cx());
        let inner = TimeRange::new(Timestamp::At(40), Timestamp::At(60), cx());
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn equal_point_ranges_overlap() {
        let a = TimeRange::new(Timestamp::At(5), Timestamp::At(5), cx());
        let b = TimeRange::new(Timestamp::At(5), Timestamp::At(5), cx());
        assert!(a.overlaps(&b));
    }

    #[test]
    fn degenerate_point_at_range_start_overlaps() {
        let point = TimeRange::new(Timestamp::At(5), Timestamp::At(5), cx());
        let range = TimeRange::new(Timestamp::At(5), Timestamp::At(10), cx());
        assert!(point.overlaps(&range));
    }

    #[test]
    fn always_overlaps_anything() {
        let always = TimeRange::always(cx());
        let narrow = TimeRange::new(Timestamp::At(7), Timestamp::At(8), cx());
        assert!(always.overlaps(&narrow));
        assert!(narrow.overlaps(&always));
    }

    #[test]
    fn range_parse_forms() {
        let pair = TimeRange::parse("19940101:19950101", cx()).unwrap();
        assert_eq!(pair.start, Timestamp::parse("19940101").unwrap());
        assert_eq!(pair.stop, Timestamp::parse("19950101").unwrap());

        let point = TimeRange::parse("19940101", cx()).unwrap();
        assert!(point.matches(Timestamp::parse("19940101").unwrap()));

        let open = TimeRange::parse("19940101:inf", cx()).unwrap();
        assert_eq!(open.stop, Timestamp::PosInf);

        assert!(TimeRange::parse("", cx()).is_err());
        assert!(TimeRange::parse("bogus:inf", cx()).is_err());
    }
}
