use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "SHIFTLINE_TIMEZONE";

/// Picks the calendar zone used for
/// every window and weekday
/// computation. The first source that
/// parses wins; UTC is the fallback.
pub fn resolve_timezone(
  flag: Option<&str>,
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = flag
    && let Some(tz) =
      parse_timezone(raw, "--tz")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timeline timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Converts epoch seconds, clamping
/// values chrono cannot represent.
#[must_use]
pub fn epoch_to_utc(
  seconds: i64
) -> DateTime<Utc> {
  DateTime::<Utc>::from_timestamp(
    seconds, 0
  )
  .unwrap_or(if seconds < 0 {
    DateTime::<Utc>::MIN_UTC
  } else {
    DateTime::<Utc>::MAX_UTC
  })
}

#[must_use]
pub fn local_date(
  instant: DateTime<Utc>,
  tz: Tz
) -> NaiveDate {
  instant.with_timezone(&tz).date_naive()
}

/// ISO weekday number of `instant` in
/// `tz`: Monday is 1, Sunday is 7.
#[must_use]
pub fn iso_weekday(
  instant: DateTime<Utc>,
  tz: Tz
) -> u8 {
  instant
    .with_timezone(&tz)
    .weekday()
    .number_from_monday() as u8
}

/// First instant of `date` in `tz`.
///
/// Zones that skip midnight for DST
/// start the day at the first local
/// hour that exists.
#[must_use]
pub fn local_midnight(
  date: NaiveDate,
  tz: Tz
) -> DateTime<Utc> {
  for hour in 0..24 {
    let Some(naive) =
      date.and_hms_opt(hour, 0, 0)
    else {
      continue;
    };
    if let Ok(instant) =
      local_to_utc(naive, tz, "midnight")
    {
      return instant;
    }
  }

  tracing::warn!(
    %date,
    timezone = %tz,
    "no local hour exists for date; \
     treating it as UTC"
  );
  Utc.from_utc_datetime(
    &date.and_time(
      chrono::NaiveTime::MIN
    )
  )
}

pub fn local_to_utc(
  local_naive: NaiveDateTime,
  tz: Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz.from_local_datetime(
    &local_naive
  ) {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime {local_naive} \
         does not exist in {tz}: \
         {context}"
      ))
    }
  }
}

#[tracing::instrument(skip(now, tz), fields(timezone = %tz))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return Ok(local_midnight(
        local_date(now, tz),
        tz
      ));
    }
    | "tomorrow" => {
      let today = local_date(now, tz);
      return Ok(local_midnight(
        today
          .succ_opt()
          .unwrap_or(today),
        tz
      ));
    }
    | "yesterday" => {
      let today = local_date(now, tz);
      return Ok(local_midnight(
        today
          .pred_opt()
          .unwrap_or(today),
        tz
      ));
    }
    | _ => {}
  }

  if let Some(raw) =
    token.strip_prefix('@')
  {
    let seconds: i64 =
      raw.parse().with_context(|| {
        format!(
          "invalid epoch seconds: {raw}"
        )
      })?;
    return Ok(epoch_to_utc(seconds));
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    let target_date = next_weekday_date(
      local_date(now, tz),
      target_weekday
    );
    return Ok(local_midnight(
      target_date,
      tz
    ));
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let duration = match unit {
      | "d" => Duration::try_days(num),
      | "h" => Duration::try_hours(num),
      | "m" => {
        Duration::try_minutes(num)
      }
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ))
      }
    }
    .ok_or_else(|| {
      anyhow!(
        "relative offset out of range: \
         {token}"
      )
    })?;

    let shifted = if sign == "-" {
      now.checked_sub_signed(duration)
    } else {
      now.checked_add_signed(duration)
    };
    return shifted.ok_or_else(|| {
      anyhow!(
        "relative offset out of range: \
         {token}"
      )
    });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(local_midnight(date, tz));
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return local_to_utc(ndt, tz, fmt);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     @EPOCH_SECONDS, +Nd/+Nh/+Nm, \
     RFC3339, YYYY-MM-DD, \
     YYYY-MM-DDTHH:MM, \
     YYYY-MM-DD HH:MM"
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
