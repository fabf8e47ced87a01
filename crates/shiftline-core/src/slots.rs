use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{trace, warn};

use crate::datetime::{epoch_to_utc, iso_weekday};
use crate::schedule::{MemberDirectory, OverrideDefinition, RotationDefinition};
use crate::timeline::TimelineRange;

/// A member assignment clipped to a display window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationSlot {
    pub member_id: String,
    pub member_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rotation_index: usize,
    pub is_override: bool,
    pub description: String,
}

impl RotationSlot {
    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Enumerates the slots of `rotation` that overlap `range`.
///
/// The k-th slot since `since` belongs to `members[k % members.len()]`.
/// Whole slots before the window are skipped arithmetically, so old anchors
/// cost nothing.
pub fn project_rotation(
    rotation: &RotationDefinition,
    range: TimelineRange,
    rotation_index: usize,
    members: &MemberDirectory,
    tz: Tz,
) -> Vec<RotationSlot> {
    if rotation.members.is_empty() {
        return Vec::new();
    }
    let Some(step) = positive_seconds(rotation.duration) else {
        warn!(
            rotation_index,
            duration = rotation.duration,
            "rotation duration must be positive; skipping"
        );
        return Vec::new();
    };

    let member_count = rotation.members.len();
    let anchor = epoch_to_utc(rotation.since);

    let (mut cursor, mut member_idx) = if range.start > anchor {
        let skipped = (range.start - anchor).num_seconds() / rotation.duration;
        let offset = Duration::seconds(skipped * rotation.duration);
        let member_idx = (skipped % member_count as i64) as usize;
        trace!(rotation_index, skipped, member_idx, "skipped ahead");
        (anchor + offset, member_idx)
    } else {
        (anchor, 0)
    };

    let mut slots = Vec::new();
    while cursor < range.end {
        let Some(slot_end) = cursor.checked_add_signed(step) else {
            break;
        };

        if rotation.is_active_on(iso_weekday(cursor, tz)) {
            if let Some((start, end)) = clip(cursor, slot_end, range) {
                let member_id = &rotation.members[member_idx];
                slots.push(RotationSlot {
                    member_id: member_id.clone(),
                    member_name: members.display_name(member_id),
                    start,
                    end,
                    rotation_index,
                    is_override: false,
                    description: rotation.description.clone(),
                });
            }
        }

        cursor = slot_end;
        member_idx = (member_idx + 1) % member_count;
    }

    trace!(rotation_index, count = slots.len(), "projected rotation");
    slots
}

/// Clipped slot of a single override, if it overlaps `range`.
pub fn project_override(
    definition: &OverrideDefinition,
    range: TimelineRange,
    override_index: usize,
    members: &MemberDirectory,
) -> Vec<RotationSlot> {
    let Some(length) = positive_seconds(definition.duration) else {
        warn!(
            override_index,
            duration = definition.duration,
            "override duration must be positive; skipping"
        );
        return Vec::new();
    };

    let start = epoch_to_utc(definition.since);
    let Some(end) = start.checked_add_signed(length) else {
        return Vec::new();
    };
    let Some((start, end)) = clip(start, end, range) else {
        return Vec::new();
    };

    vec![RotationSlot {
        member_id: definition.member.clone(),
        member_name: members.display_name(&definition.member),
        start,
        end,
        rotation_index: override_index,
        is_override: true,
        description: definition.description.clone(),
    }]
}

/// Half-open intersection of `[start, end)` with `range`, if non-empty.
fn clip(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    range: TimelineRange,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = start.max(range.start);
    let end = end.min(range.end);
    (start < end).then_some((start, end))
}

fn positive_seconds(seconds: i64) -> Option<Duration> {
    if seconds <= 0 {
        return None;
    }
    Duration::try_seconds(seconds)
}
