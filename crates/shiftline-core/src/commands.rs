use std::io::{self, Write};

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cli::{Command, OncallArgs, RangeArgs, TimelineArgs, WindowArgs};
use crate::config::Config;
use crate::datastore::ScheduleDocument;
use crate::datetime::{local_date, local_midnight, parse_date_expr};
use crate::present::{SlotPosition, slot_position};
use crate::render::Renderer;
use crate::slots::RotationSlot;
use crate::timeline::{TimelineRange, enumerate_days, enumerate_hours, resolve};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleTimeline<'a> {
    schedule_id: &'a str,
    schedule_name: &'a str,
    range: TimelineRange,
    slots: Vec<PositionedSlot>,
}

#[derive(Debug, Serialize)]
struct PositionedSlot {
    #[serde(flatten)]
    slot: RotationSlot,
    position: SlotPosition,
}

#[instrument(skip(command, cfg, renderer, now))]
pub fn dispatch(
    command: Command,
    cfg: &Config,
    tz: Tz,
    renderer: &Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match command {
        Command::Timeline(args) => cmd_timeline(args, cfg, tz, renderer, now),
        Command::Oncall(args) => cmd_oncall(args, tz, renderer, now),
        Command::Range(args) => cmd_range(args, cfg, tz, renderer, now),
    }
}

/// Window for `--view`/`--date`/`--shift`, falling back to the configured view.
pub fn window_for(
    args: &WindowArgs,
    cfg: &Config,
    tz: Tz,
    now: DateTime<Utc>,
) -> anyhow::Result<TimelineRange> {
    let view = args.view.unwrap_or(cfg.view);
    let anchor = parse_date_expr(&args.date, now, tz)
        .with_context(|| format!("invalid --date: {}", args.date))?;

    let anchor = if args.shift == 0 {
        anchor
    } else {
        local_midnight(view.shift(local_date(anchor, tz), args.shift), tz)
    };

    let range = resolve(view, anchor, tz);
    debug!(%view, start = %range.start, end = %range.end, "timeline window");
    Ok(range)
}

#[instrument(skip_all, fields(file = %args.file.display()))]
fn cmd_timeline(
    args: TimelineArgs,
    cfg: &Config,
    tz: Tz,
    renderer: &Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let range = window_for(&args.window, cfg, tz, now)?;
    let document = ScheduleDocument::load(&args.file)?;
    let members = document.member_directory();
    let schedules = document.select(args.schedule.as_deref())?;

    let mut timelines = Vec::with_capacity(schedules.len());
    for schedule in schedules {
        let slots = schedule.project(range, tz, &members);
        info!(schedule = %schedule.id, slots = slots.len(), "projected schedule");
        timelines.push(ScheduleTimeline {
            schedule_id: &schedule.id,
            schedule_name: schedule.display_name(),
            range,
            slots: slots
                .into_iter()
                .map(|slot| PositionedSlot {
                    position: slot_position(&slot, range),
                    slot,
                })
                .collect(),
        });
    }

    if args.json {
        return print_json(&timelines);
    }

    let mut out = io::stdout().lock();
    renderer.write_range(&mut out, range)?;
    for timeline in timelines {
        writeln!(out)?;
        writeln!(out, "{} [{}]", timeline.schedule_name, timeline.schedule_id)?;
        let slots: Vec<RotationSlot> = timeline.slots.into_iter().map(|p| p.slot).collect();
        renderer.write_slots(&mut out, range, &slots)?;
    }
    Ok(())
}

#[instrument(skip_all, fields(file = %args.file.display()))]
fn cmd_oncall(
    args: OncallArgs,
    tz: Tz,
    renderer: &Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let at = parse_date_expr(&args.at, now, tz)
        .with_context(|| format!("invalid --at: {}", args.at))?;
    let document = ScheduleDocument::load(&args.file)?;
    let members = document.member_directory();
    let schedules = document.select(args.schedule.as_deref())?;

    let mut on_call = Vec::new();
    for schedule in schedules {
        let slots = schedule.on_call_at(at, tz, &members);
        debug!(schedule = %schedule.id, slots = slots.len(), "on call lookup");
        on_call.push((schedule, slots));
    }

    if args.json {
        let payload: Vec<_> = on_call
            .iter()
            .map(|(schedule, slots)| {
                serde_json::json!({
                    "scheduleId": schedule.id,
                    "at": at,
                    "slots": slots,
                })
            })
            .collect();
        return print_json(&payload);
    }

    let mut out = io::stdout().lock();
    renderer.write_instant(&mut out, "on call at", at)?;
    for (schedule, slots) in on_call {
        let names = if slots.is_empty() {
            "-".to_string()
        } else {
            slots
                .iter()
                .map(|slot| {
                    if slot.is_override {
                        format!("{} (override)", slot.member_name)
                    } else {
                        slot.member_name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(out, "{}: {names}", schedule.display_name())?;
    }
    Ok(())
}

#[instrument(skip_all)]
fn cmd_range(
    args: RangeArgs,
    cfg: &Config,
    tz: Tz,
    renderer: &Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let range = window_for(&args.window, cfg, tz, now)?;
    let mut out = io::stdout().lock();
    renderer.write_range(&mut out, range)?;

    if args.days {
        renderer.write_ticks(&mut out, enumerate_days(range, tz))?;
    } else if args.hours {
        renderer.write_ticks(&mut out, enumerate_hours(range))?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).context("failed to encode json")?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::timeline::TimelineView;

    fn args(view: Option<TimelineView>, date: &str, shift: i64) -> WindowArgs {
        WindowArgs {
            view,
            date: date.to_string(),
            shift,
        }
    }

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn window_uses_configured_view_by_default() {
        let cfg = Config::default();
        let range = window_for(&args(None, "2024-01-03", 0), &cfg, chrono_tz::UTC, utc(2030, 1, 1))
            .expect("window");
        assert_eq!(range.start, utc(2024, 1, 1));
        assert_eq!(range.end, utc(2024, 1, 8));
    }

    #[test]
    fn window_shift_pages_by_view() {
        let cfg = Config::default();
        let range = window_for(
            &args(Some(TimelineView::Month), "2024-03-31", -1),
            &cfg,
            chrono_tz::UTC,
            utc(2030, 1, 1),
        )
        .expect("window");
        assert_eq!(range.start, utc(2024, 2, 1));
        assert_eq!(range.end, utc(2024, 3, 1));
    }

    #[test]
    fn bad_date_is_reported() {
        let cfg = Config::default();
        let err = window_for(&args(None, "someday", 0), &cfg, chrono_tz::UTC, utc(2030, 1, 1))
            .expect_err("invalid date");
        assert!(format!("{err:#}").contains("invalid --date"));
    }
}
