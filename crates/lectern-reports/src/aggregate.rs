//! Pure reducers shared by every report.
//!
//! Nothing here reads the clock or touches the store. Rates and averages are
//! returned raw unless the function name says otherwise; callers round once,
//! when the final report field is composed.

use std::{
  cmp::Ordering,
  collections::{BTreeMap, HashSet, btree_map::Entry},
};

use chrono::{DateTime, Datelike, Utc};
use lectern_core::{
  enrollment::{Enrollment, EnrollmentStatus, LessonWatchRecord},
  window::Granularity,
};
use serde::Serialize;
use uuid::Uuid;

// ─── Arithmetic ───────────────────────────────────────────────────────────────

pub fn count_where<T>(items: &[T], predicate: impl Fn(&T) -> bool) -> usize {
  items.iter().filter(|item| predicate(item)).count()
}

/// `num / den × 100`, or `0` when `den` is zero.
pub fn percent(num: usize, den: usize) -> f64 {
  if den == 0 { 0.0 } else { num as f64 / den as f64 * 100.0 }
}

/// [`percent`] rounded to two decimals.
pub fn rate(num: usize, den: usize) -> f64 { round2(percent(num, den)) }

/// Two decimals, half away from zero.
pub fn round2(x: f64) -> f64 { (x * 100.0).round() / 100.0 }

pub fn hours(seconds: u64) -> f64 { seconds as f64 / 3600.0 }

pub fn seconds_to_hours(seconds: u64) -> f64 { round2(hours(seconds)) }

/// Arithmetic mean; `0` for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
  let (sum, n) = values
    .into_iter()
    .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
  if n == 0 { 0.0 } else { sum / n as f64 }
}

// ─── Watch records ────────────────────────────────────────────────────────────

/// Everything known about one student's viewing of one lesson.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchSummary {
  pub student_id:      Uuid,
  pub lesson_id:       Uuid,
  /// Furthest position reached across all records for the pair.
  pub watched_seconds: u64,
  /// Earliest completion, if any record completed the lesson.
  pub completed_at:    Option<DateTime<Utc>>,
  pub last_watched_at: DateTime<Utc>,
}

/// Collapse raw records to one [`WatchSummary`] per `(student, lesson)`.
///
/// Watch time is a high-water mark, so the maximum wins over the most recent.
pub fn farthest_watched<'a>(
  records: impl IntoIterator<Item = &'a LessonWatchRecord>,
) -> BTreeMap<(Uuid, Uuid), WatchSummary> {
  let mut out = BTreeMap::new();
  for r in records {
    match out.entry((r.student_id, r.lesson_id)) {
      Entry::Vacant(slot) => {
        slot.insert(WatchSummary {
          student_id:      r.student_id,
          lesson_id:       r.lesson_id,
          watched_seconds: r.watched_seconds,
          completed_at:    r.completed_at,
          last_watched_at: r.last_watched_at,
        });
      }
      Entry::Occupied(mut slot) => {
        let s = slot.get_mut();
        s.watched_seconds = s.watched_seconds.max(r.watched_seconds);
        s.completed_at = match (s.completed_at, r.completed_at) {
          (Some(a), Some(b)) => Some(a.min(b)),
          (a, b) => a.or(b),
        };
        s.last_watched_at = s.last_watched_at.max(r.last_watched_at);
      }
    }
  }
  out
}

pub fn total_watched_seconds<'a>(
  summaries: impl IntoIterator<Item = &'a WatchSummary>,
) -> u64 {
  summaries.into_iter().map(|s| s.watched_seconds).sum()
}

// ─── Time buckets ─────────────────────────────────────────────────────────────

/// Sortable label for the bucket containing `at`.
///
/// Days are `YYYY-MM-DD`, weeks are the date of the Sunday that opens them,
/// months are `YYYY-MM`. Lexicographic order is chronological order.
pub fn bucket_key(at: DateTime<Utc>, granularity: Granularity) -> String {
  let date = at.date_naive();
  match granularity {
    Granularity::Day => date.format("%Y-%m-%d").to_string(),
    Granularity::Week => {
      let back = u64::from(date.weekday().num_days_from_sunday());
      date
        .checked_sub_days(chrono::Days::new(back))
        .unwrap_or(date)
        .format("%Y-%m-%d")
        .to_string()
    }
    Granularity::Month => date.format("%Y-%m").to_string(),
  }
}

/// Partition `items` by bucket. Every item lands in exactly one bucket.
pub fn bucket<T>(
  items: impl IntoIterator<Item = T>,
  date_fn: impl Fn(&T) -> DateTime<Utc>,
  granularity: Granularity,
) -> BTreeMap<String, Vec<T>> {
  group_by(items, |item| bucket_key(date_fn(item), granularity))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
  pub bucket:     String,
  pub count:      usize,
  pub cumulative: usize,
}

/// Running totals over `counts`.
pub fn cumulative(counts: impl IntoIterator<Item = usize>) -> Vec<usize> {
  counts
    .into_iter()
    .scan(0usize, |total, n| {
      *total += n;
      Some(*total)
    })
    .collect()
}

/// Per-bucket counts with a running total, oldest bucket first.
pub fn series<T>(
  items: impl IntoIterator<Item = T>,
  date_fn: impl Fn(&T) -> DateTime<Utc>,
  granularity: Granularity,
) -> Vec<SeriesPoint> {
  let buckets = bucket(items, date_fn, granularity);
  let totals = cumulative(buckets.values().map(Vec::len));
  buckets
    .into_iter()
    .zip(totals)
    .map(|((bucket, items), cumulative)| SeriesPoint {
      bucket,
      count: items.len(),
      cumulative,
    })
    .collect()
}

// ─── Ranking ──────────────────────────────────────────────────────────────────

/// The first `n` items by descending `key`. Equal keys keep input order.
pub fn top_n_by<T, K: PartialOrd>(
  mut items: Vec<T>,
  key: impl Fn(&T) -> K,
  n: usize,
) -> Vec<T> {
  items.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
  items.truncate(n);
  items
}

/// Largest by `key`; the first of equal maxima wins.
pub fn max_by_strict<T, K: PartialOrd>(
  items: &[T],
  key: impl Fn(&T) -> K,
) -> Option<&T> {
  extremum(items, key, Ordering::Greater)
}

/// Smallest by `key`; the first of equal minima wins.
pub fn min_by_strict<T, K: PartialOrd>(
  items: &[T],
  key: impl Fn(&T) -> K,
) -> Option<&T> {
  extremum(items, key, Ordering::Less)
}

fn extremum<T, K: PartialOrd>(
  items: &[T],
  key: impl Fn(&T) -> K,
  wanted: Ordering,
) -> Option<&T> {
  let mut best: Option<(&T, K)> = None;
  for item in items {
    let k = key(item);
    let better = match &best {
      None => true,
      Some((_, current)) => k.partial_cmp(current) == Some(wanted),
    };
    if better {
      best = Some((item, k));
    }
  }
  best.map(|(item, _)| item)
}

// ─── Grouping ─────────────────────────────────────────────────────────────────

pub fn group_by<T, K: Ord>(
  items: impl IntoIterator<Item = T>,
  key: impl Fn(&T) -> K,
) -> BTreeMap<K, Vec<T>> {
  let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
  for item in items {
    groups.entry(key(&item)).or_default().push(item);
  }
  groups
}

/// Mean elapsed time in fractional days over pairs that have an end.
pub fn average_elapsed_days(
  pairs: impl IntoIterator<Item = (DateTime<Utc>, Option<DateTime<Utc>>)>,
) -> f64 {
  mean(pairs.into_iter().filter_map(|(start, end)| {
    end.map(|end| (end - start).num_seconds() as f64 / 86_400.0)
  }))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
  pub total:     usize,
  pub active:    usize,
  pub completed: usize,
  pub dropped:   usize,
}

impl StatusCounts {
  pub fn completion_rate(&self) -> f64 { rate(self.completed, self.total) }
}

pub fn status_counts<'a>(
  enrollments: impl IntoIterator<Item = &'a Enrollment>,
) -> StatusCounts {
  let mut counts = StatusCounts::default();
  for e in enrollments {
    counts.total += 1;
    match e.status {
      EnrollmentStatus::Active => counts.active += 1,
      EnrollmentStatus::Completed => counts.completed += 1,
      EnrollmentStatus::Dropped => counts.dropped += 1,
    }
  }
  counts
}

/// Number of distinct ids produced by `key`.
pub fn distinct<T>(items: &[T], key: impl Fn(&T) -> Uuid) -> usize {
  items.iter().map(key).collect::<HashSet<_>>().len()
}
