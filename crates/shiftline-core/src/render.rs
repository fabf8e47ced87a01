use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::present::{Locale, Palette, duration_text, slot_position, time_range_text};
use crate::slots::RotationSlot;
use crate::timeline::TimelineRange;

const BAR_WIDTH: usize = 32;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    locale: Locale,
    palette: Palette,
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config, tz: Tz) -> Self {
        let color = cfg.color && io::stdout().is_terminal();
        Self::with_options(color, cfg.locale, cfg.palette.clone(), tz)
    }

    pub fn with_options(color: bool, locale: Locale, palette: Palette, tz: Tz) -> Self {
        Self {
            color,
            locale,
            palette,
            tz,
        }
    }

    #[tracing::instrument(skip(self, out, range))]
    pub fn write_range<W: Write>(&self, mut out: W, range: TimelineRange) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} .. {} ({}, {})",
            self.local_stamp(range.start),
            self.local_stamp(range.end),
            duration_text(range.length_seconds(), self.locale),
            self.tz
        )?;
        Ok(())
    }

    pub fn write_ticks<W: Write>(
        &self,
        mut out: W,
        ticks: impl Iterator<Item = DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        for tick in ticks {
            writeln!(out, "{}", self.local_stamp(tick))?;
        }
        Ok(())
    }

    /// One row per slot, with a bar showing where it sits in the window.
    #[tracing::instrument(skip(self, out, range, slots), fields(count = slots.len()))]
    pub fn write_slots<W: Write>(
        &self,
        out: W,
        range: TimelineRange,
        slots: &[RotationSlot],
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Member".to_string(),
            "Time".to_string(),
            "Length".to_string(),
            "Kind".to_string(),
            "Description".to_string(),
            "Timeline".to_string(),
        ];

        let mut rows = Vec::with_capacity(slots.len());
        for slot in slots {
            let color = self.palette.color(slot.rotation_index);
            let kind = if slot.is_override {
                format!("override #{}", slot.rotation_index)
            } else {
                format!("rotation #{}", slot.rotation_index)
            };

            rows.push(vec![
                self.paint(&slot.member_name, color),
                time_range_text(slot.start, slot.end, self.tz),
                duration_text(slot.duration_seconds(), self.locale),
                kind,
                slot.description.clone(),
                self.paint(&bar(slot, range), color),
            ]);
        }

        write_table(out, headers, rows)
    }

    pub fn write_instant<W: Write>(
        &self,
        mut out: W,
        label: &str,
        instant: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{label} {} ({})", self.local_stamp(instant), self.tz)?;
        Ok(())
    }

    fn local_stamp(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.tz)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }

    fn paint(&self, text: &str, hex: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        match hex_to_rgb(hex) {
            Some((r, g, b)) => format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m"),
            None => text.to_string(),
        }
    }
}

fn bar(slot: &RotationSlot, range: TimelineRange) -> String {
    let position = slot_position(slot, range);
    let cells = BAR_WIDTH as f64;
    let first = ((position.left / 100.0 * cells).floor() as usize).min(BAR_WIDTH - 1);
    let last = (((position.left + position.width) / 100.0 * cells).ceil() as usize)
        .clamp(first + 1, BAR_WIDTH);

    let mut out = String::with_capacity(BAR_WIDTH);
    for idx in 0..BAR_WIDTH {
        out.push(if idx >= first && idx < last { '#' } else { '.' });
    }
    out
}

fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(digits.get(at..at + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
