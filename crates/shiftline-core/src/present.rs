use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::slots::RotationSlot;
use crate::timeline::TimelineRange;

const SECONDS_PER_DAY: i64 = 86_400;

pub const DEFAULT_PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl FromStr for Locale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "ru" => Ok(Locale::Ru),
            other => Err(anyhow!("unsupported locale: {other}")),
        }
    }
}

/// `HH:MM-HH:MM` within one local day, otherwise `DD.MM HH:MM - DD.MM HH:MM`.
pub fn time_range_text(start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> String {
    let start = start.with_timezone(&tz);
    let end = end.with_timezone(&tz);
    if start.date_naive() == end.date_naive() {
        format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
    } else {
        format!(
            "{} - {}",
            start.format("%d.%m %H:%M"),
            end.format("%d.%m %H:%M")
        )
    }
}

pub fn duration_text(seconds: i64, locale: Locale) -> String {
    if seconds <= 0 {
        return minutes_text(0, locale);
    }

    if seconds % SECONDS_PER_DAY == 0 {
        let days = seconds / SECONDS_PER_DAY;
        return format!("{days} {}", day_noun(days, locale));
    }

    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let hour_unit = match locale {
        Locale::En => "h",
        Locale::Ru => "ч",
    };

    match (hours, minutes) {
        (0, minutes) => minutes_text(minutes, locale),
        (hours, 0) => format!("{hours} {hour_unit}"),
        (hours, minutes) => format!("{hours} {hour_unit} {}", minutes_text(minutes, locale)),
    }
}

fn minutes_text(minutes: i64, locale: Locale) -> String {
    match locale {
        Locale::En => format!("{minutes} min"),
        Locale::Ru => format!("{minutes} мин"),
    }
}

fn day_noun(days: i64, locale: Locale) -> &'static str {
    match locale {
        Locale::En => {
            if days == 1 {
                "day"
            } else {
                "days"
            }
        }
        Locale::Ru => {
            let last_two = days % 100;
            let last = days % 10;
            if last == 1 && last_two != 11 {
                "день"
            } else if (2..=4).contains(&last) && !(12..=14).contains(&last_two) {
                "дня"
            } else {
                "дней"
            }
        }
    }
}

/// Horizontal placement of a slot, in percent of the window width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlotPosition {
    pub left: f64,
    pub width: f64,
}

pub fn slot_position(slot: &RotationSlot, range: TimelineRange) -> SlotPosition {
    let total = (range.end - range.start).num_milliseconds() as f64;
    if total <= 0.0 {
        return SlotPosition {
            left: 0.0,
            width: 0.0,
        };
    }

    let offset = (slot.start - range.start).num_milliseconds() as f64;
    let length = (slot.end - slot.start).num_milliseconds() as f64;
    SlotPosition {
        left: offset / total * 100.0,
        width: length / total * 100.0,
    }
}

/// Fixed colour cycle keyed by member or rotation ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<String>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Palette {
    /// An empty list keeps the default colours.
    pub fn new(colors: Vec<String>) -> Self {
        if colors.is_empty() {
            Self::default()
        } else {
            Self { colors }
        }
    }

    pub fn color(&self, index: usize) -> &str {
        &self.colors[index % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, min, 0)
            .single()
            .expect("valid instant")
    }

    fn slot(start: DateTime<Utc>, end: DateTime<Utc>) -> RotationSlot {
        RotationSlot {
            member_id: "u1".to_string(),
            member_name: "Alice".to_string(),
            start,
            end,
            rotation_index: 0,
            is_override: false,
            description: String::new(),
        }
    }

    #[test]
    fn same_day_range_is_compact() {
        assert_eq!(
            time_range_text(utc(2, 12, 0), utc(2, 13, 30), chrono_tz::UTC),
            "12:00-13:30"
        );
    }

    #[test]
    fn multi_day_range_includes_dates() {
        assert_eq!(
            time_range_text(utc(2, 9, 0), utc(4, 9, 0), chrono_tz::UTC),
            "02.01 09:00 - 04.01 09:00"
        );
    }

    #[test]
    fn range_text_follows_zone() {
        // 23:30 UTC is already the next day in Berlin.
        assert_eq!(
            time_range_text(utc(2, 22, 0), utc(2, 23, 30), chrono_tz::Europe::Berlin),
            "02.01 23:00 - 03.01 00:30"
        );
    }

    #[test]
    fn english_durations() {
        assert_eq!(duration_text(86_400, Locale::En), "1 day");
        assert_eq!(duration_text(7 * 86_400, Locale::En), "7 days");
        assert_eq!(duration_text(3 * 3_600, Locale::En), "3 h");
        assert_eq!(duration_text(5_400, Locale::En), "1 h 30 min");
        assert_eq!(duration_text(2_700, Locale::En), "45 min");
        assert_eq!(duration_text(0, Locale::En), "0 min");
    }

    #[test]
    fn russian_day_plurals() {
        let cases = [
            (1, "1 день"),
            (2, "2 дня"),
            (4, "4 дня"),
            (5, "5 дней"),
            (11, "11 дней"),
            (12, "12 дней"),
            (21, "21 день"),
            (22, "22 дня"),
        ];
        for (days, expected) in cases {
            assert_eq!(duration_text(days * 86_400, Locale::Ru), expected);
        }
        assert_eq!(duration_text(5_400, Locale::Ru), "1 ч 30 мин");
    }

    #[test]
    fn position_is_linear_in_window() {
        let range = TimelineRange::new(utc(1, 0, 0), utc(2, 0, 0)).expect("range");
        let position = slot_position(&slot(utc(1, 6, 0), utc(1, 12, 0)), range);
        assert_eq!(position.left, 25.0);
        assert_eq!(position.width, 25.0);

        let full = slot_position(&slot(range.start, range.end), range);
        assert_eq!(full.left, 0.0);
        assert_eq!(full.width, 100.0);
    }

    #[test]
    fn palette_cycles() {
        let palette = Palette::default();
        assert_eq!(palette.color(0), palette.color(palette.len()));
        assert_ne!(palette.color(0), palette.color(1));

        let custom = Palette::new(vec!["#000000".to_string(), "#ffffff".to_string()]);
        assert_eq!(custom.color(3), "#ffffff");
        assert_eq!(custom.len(), 2);
        assert!(!custom.is_empty());
        assert_eq!(Palette::new(Vec::new()), Palette::default());
    }
}
