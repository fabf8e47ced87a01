use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  local_date,
  local_midnight
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TimelineView {
  Day,
  #[default]
  Week,
  Month
}

impl TimelineView {
  pub fn as_key(self) -> &'static str {
    match self {
      | TimelineView::Day => "day",
      | TimelineView::Week => "week",
      | TimelineView::Month => "month"
    }
  }

  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "day" => Some(TimelineView::Day),
      | "week" => {
        Some(TimelineView::Week)
      }
      | "month" => {
        Some(TimelineView::Month)
      }
      | _ => None
    }
  }

  /// Moves `anchor` by `step` whole
  /// views, for previous/next paging.
  #[must_use]
  pub fn shift(
    self,
    anchor: NaiveDate,
    step: i64
  ) -> NaiveDate {
    match self {
      | TimelineView::Day => {
        add_days(anchor, step)
      }
      | TimelineView::Week => {
        add_days(
          anchor,
          step.saturating_mul(7)
        )
      }
      | TimelineView::Month => {
        shift_months(anchor, step)
      }
    }
  }
}

impl fmt::Display for TimelineView {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for TimelineView {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::from_key(s).ok_or_else(|| {
      anyhow!(
        "unknown timeline view: {s} \
         (expected day, week or month)"
      )
    })
  }
}

/// Half-open display window
/// `[start, end)`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct TimelineRange {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>
}

impl TimelineRange {
  pub fn new(
    start: DateTime<Utc>,
    end: DateTime<Utc>
  ) -> anyhow::Result<Self> {
    if start >= end {
      return Err(anyhow!(
        "timeline range must start \
         before it ends: {start} >= \
         {end}"
      ));
    }
    Ok(Self { start, end })
  }

  pub fn contains(
    &self,
    instant: DateTime<Utc>
  ) -> bool {
    instant >= self.start
      && instant < self.end
  }

  pub fn length_seconds(&self) -> i64 {
    (self.end - self.start)
      .num_seconds()
  }
}

/// Window of `view` granularity that
/// contains `anchor`, with calendar
/// boundaries taken in `tz`.
#[tracing::instrument(skip(anchor, tz))]
pub fn resolve(
  view: TimelineView,
  anchor: DateTime<Utc>,
  tz: Tz
) -> TimelineRange {
  let day = local_date(anchor, tz);
  let (first, after) = match view {
    | TimelineView::Day => {
      (day, add_days(day, 1))
    }
    | TimelineView::Week => {
      let monday = add_days(
        day,
        -(day
          .weekday()
          .num_days_from_monday()
          as i64)
      );
      (monday, add_days(monday, 7))
    }
    | TimelineView::Month => {
      let first = first_day_of_month(
        day.year(),
        day.month()
      );
      (first, shift_months(first, 1))
    }
  };

  let range = TimelineRange {
    start: local_midnight(first, tz),
    end:   local_midnight(after, tz)
  };
  tracing::debug!(
    start = %range.start,
    end = %range.end,
    "resolved timeline range"
  );
  range
}

/// Local midnights from the range start
/// up to, not including, its end.
pub fn enumerate_days(
  range: TimelineRange,
  tz: Tz
) -> impl Iterator<Item = DateTime<Utc>>
+ Clone {
  let TimelineRange { start, end } =
    range;
  local_date(start, tz)
    .iter_days()
    .map(move |day| {
      local_midnight(day, tz)
    })
    .skip_while(move |midnight| {
      *midnight < start
    })
    .take_while(move |midnight| {
      *midnight < end
    })
}

pub fn enumerate_hours(
  range: TimelineRange
) -> impl Iterator<Item = DateTime<Utc>>
+ Clone {
  let end = range.end;
  std::iter::successors(
    Some(range.start),
    |hour| {
      hour.checked_add_signed(
        Duration::hours(1)
      )
    }
  )
  .take_while(move |hour| *hour < end)
}

fn shift_months(
  date: NaiveDate,
  months: i64
) -> NaiveDate {
  let total = i64::from(date.year())
    * 12
    + i64::from(date.month0())
    + months;
  let Ok(year) =
    i32::try_from(total.div_euclid(12))
  else {
    return date;
  };
  let month =
    total.rem_euclid(12) as u32 + 1;

  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
  .day()
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  Duration::try_days(days)
    .and_then(|delta| {
      date.checked_add_signed(delta)
    })
    .unwrap_or(date)
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::*;

  fn utc(
    y: i32,
    m: u32,
    d: u32,
    h: u32
  ) -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(y, m, d, h, 0, 0)
      .single()
      .expect("valid instant")
  }

  #[test]
  fn day_view_spans_local_day() {
    let range = resolve(
      TimelineView::Day,
      utc(2024, 1, 1, 15),
      chrono_tz::UTC
    );
    assert_eq!(
      range.start,
      utc(2024, 1, 1, 0)
    );
    assert_eq!(range.end, utc(2024, 1, 2, 0));
  }

  #[test]
  fn week_view_on_sunday_starts_previous_monday()
  {
    // 2024-01-07 is a Sunday.
    let range = resolve(
      TimelineView::Week,
      utc(2024, 1, 7, 18),
      chrono_tz::UTC
    );
    assert_eq!(
      range.start,
      utc(2024, 1, 1, 0)
    );
    assert_eq!(range.end, utc(2024, 1, 8, 0));
  }

  #[test]
  fn week_view_uses_local_midnight() {
    let tz = chrono_tz::Europe::Berlin;
    let range = resolve(
      TimelineView::Week,
      utc(2024, 1, 7, 12),
      tz
    );
    assert_eq!(
      range.start,
      utc(2023, 12, 31, 23)
    );
    assert_eq!(
      range.end,
      utc(2024, 1, 7, 23)
    );
  }

  #[test]
  fn month_view_handles_leap_february() {
    let range = resolve(
      TimelineView::Month,
      utc(2024, 2, 14, 9),
      chrono_tz::UTC
    );
    assert_eq!(
      range.start,
      utc(2024, 2, 1, 0)
    );
    assert_eq!(range.end, utc(2024, 3, 1, 0));
    assert_eq!(
      enumerate_days(
        range,
        chrono_tz::UTC
      )
      .count(),
      29
    );
  }

  #[test]
  fn december_rolls_into_next_year() {
    let range = resolve(
      TimelineView::Month,
      utc(2023, 12, 31, 23),
      chrono_tz::UTC
    );
    assert_eq!(range.end, utc(2024, 1, 1, 0));
  }

  #[test]
  fn dst_day_has_twenty_three_hours() {
    let tz = chrono_tz::Europe::Berlin;
    let range = resolve(
      TimelineView::Day,
      utc(2024, 3, 31, 12),
      tz
    );
    assert_eq!(
      enumerate_hours(range).count(),
      23
    );
    assert_eq!(
      enumerate_days(range, tz).count(),
      1
    );
  }

  #[test]
  fn repeated_midnight_uses_earliest_instant()
  {
    // Havana fell back from 01:00 to
    // 00:00 on 2019-11-03, so midnight
    // happened twice.
    let tz = chrono_tz::America::Havana;
    let date =
      NaiveDate::from_ymd_opt(2019, 11, 3)
        .expect("valid date");
    assert_eq!(
      local_midnight(date, tz),
      utc(2019, 11, 3, 4)
    );

    let range = resolve(
      TimelineView::Day,
      utc(2019, 11, 3, 12),
      tz
    );
    assert_eq!(
      range.start,
      utc(2019, 11, 3, 4)
    );
    assert_eq!(
      range.end,
      utc(2019, 11, 4, 5)
    );
    assert_eq!(
      range.length_seconds(),
      25 * 3_600
    );
  }

  #[test]
  fn range_contains_start_but_not_end() {
    let range = TimelineRange::new(
      utc(2024, 1, 1, 0),
      utc(2024, 1, 2, 0)
    )
    .expect("range");
    assert!(range.contains(range.start));
    assert!(
      range.contains(utc(2024, 1, 1, 23))
    );
    assert!(!range.contains(range.end));
    assert!(
      !range.contains(utc(2023, 12, 31, 23))
    );
  }

  #[test]
  fn day_iterator_is_restartable() {
    let range = resolve(
      TimelineView::Week,
      utc(2024, 1, 3, 0),
      chrono_tz::UTC
    );
    let days =
      enumerate_days(range, chrono_tz::UTC);
    let first: Vec<_> =
      days.clone().collect();
    let second: Vec<_> = days.collect();
    assert_eq!(first.len(), 7);
    assert_eq!(first, second);
  }

  #[test]
  fn month_shift_clamps_day() {
    let jan31 =
      NaiveDate::from_ymd_opt(2024, 1, 31)
        .expect("valid date");
    assert_eq!(
      TimelineView::Month.shift(jan31, 1),
      NaiveDate::from_ymd_opt(2024, 2, 29)
        .expect("valid date")
    );
    assert_eq!(
      TimelineView::Month.shift(jan31, -2),
      NaiveDate::from_ymd_opt(2023, 11, 30)
        .expect("valid date")
    );
  }

  #[test]
  fn range_rejects_empty_interval() {
    let at = utc(2024, 1, 1, 0);
    assert!(
      TimelineRange::new(at, at).is_err()
    );
  }

  #[test]
  fn view_parses_case_insensitively() {
    assert_eq!(
      "Month"
        .parse::<TimelineView>()
        .expect("parse view"),
      TimelineView::Month
    );
    assert!(
      "year"
        .parse::<TimelineView>()
        .is_err()
    );
  }
}
