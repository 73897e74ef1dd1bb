//! Time-window resolution.
//!
//! A report never reads the clock itself: the caller captures `now` once and
//! every sub-query of that report shares the resulting [`TimeWindow`].

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

// ─── Period ──────────────────────────────────────────────────────────────────

/// A relative look-back period.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display,
  EnumString,
)]
pub enum Period {
  #[serde(rename = "7d")]
  #[strum(serialize = "7d")]
  Week,
  #[default]
  #[serde(rename = "30d")]
  #[strum(serialize = "30d")]
  Month,
  #[serde(rename = "90d")]
  #[strum(serialize = "90d")]
  Quarter,
  #[serde(rename = "1y")]
  #[strum(serialize = "1y")]
  Year,
  #[serde(rename = "all")]
  #[strum(serialize = "all")]
  All,
}

impl Period {
  /// Length of the period in days; `None` for [`Period::All`].
  pub fn days(self) -> Option<i64> {
    match self {
      Self::Week => Some(7),
      Self::Month => Some(30),
      Self::Quarter => Some(90),
      Self::Year => Some(365),
      Self::All => None,
    }
  }

  /// The bucket size trend series use when the caller does not pick one.
  pub fn default_granularity(self) -> Granularity {
    match self {
      Self::Week | Self::Month => Granularity::Day,
      Self::Quarter => Granularity::Week,
      Self::Year | Self::All => Granularity::Month,
    }
  }
}

// ─── Granularity ─────────────────────────────────────────────────────────────

/// Width of one time-series bucket.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Granularity {
  #[default]
  Day,
  Week,
  Month,
}

// ─── TimeWindow ──────────────────────────────────────────────────────────────

/// A half-open `[start, end)` range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

impl TimeWindow {
  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.start <= at && at < self.end
  }
}

/// Caller-supplied calendar bounds; both ends are inclusive dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start_date: Option<NaiveDate>,
  pub end_date:   Option<NaiveDate>,
}

impl DateRange {
  pub fn is_empty(&self) -> bool {
    self.start_date.is_none() && self.end_date.is_none()
  }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
  date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Resolve `period` against `now`.
pub fn resolve_period(period: Period, now: DateTime<Utc>) -> TimeWindow {
  let start = match period.days() {
    Some(days) => now - TimeDelta::days(days),
    None => DateTime::<Utc>::UNIX_EPOCH,
  };
  TimeWindow { start, end: now }
}

/// Resolve `period`, letting any explicit date in `range` override the
/// corresponding bound. An explicit `end_date` covers that whole day.
pub fn resolve(
  period: Period,
  range: DateRange,
  now: DateTime<Utc>,
) -> Result<TimeWindow> {
  let mut window = resolve_period(period, now);

  if let Some(start) = range.start_date {
    window.start = start_of_day(start);
  }
  if let Some(end) = range.end_date {
    window.end = end
      .checked_add_days(Days::new(1))
      .map(start_of_day)
      .unwrap_or(DateTime::<Utc>::MAX_UTC);
  }

  if window.start >= window.end {
    return Err(Error::EmptyWindow { start: window.start, end: window.end });
  }
  Ok(window)
}
