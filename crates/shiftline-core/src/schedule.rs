use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::slots::{RotationSlot, project_override, project_rotation};
use crate::timeline::TimelineRange;

/// Recurring round-robin assignment anchored at `since`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationDefinition {
    /// ISO weekdays, 1 = Monday .. 7 = Sunday.
    #[serde(default)]
    pub days: BTreeSet<u8>,

    #[serde(default)]
    pub description: String,

    /// Slot length in seconds.
    pub duration: i64,

    #[serde(default)]
    pub members: Vec<String>,

    /// Epoch seconds of the first slot.
    pub since: i64,
}

impl RotationDefinition {
    pub fn is_active_on(&self, iso_weekday: u8) -> bool {
        self.days.contains(&iso_weekday)
    }
}

/// Single substitution covering `[since, since + duration)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDefinition {
    #[serde(default)]
    pub description: String,

    pub duration: i64,

    pub member: String,

    pub since: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
}

/// Member id to display name lookup.
#[derive(Debug, Clone, Default)]
pub struct MemberDirectory {
    names: HashMap<String, String>,
}

impl MemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    /// Unknown ids display as themselves.
    pub fn display_name(&self, id: &str) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

impl<K, V> FromIterator<(K, V)> for MemberDirectory
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut directory = Self::new();
        for (id, name) in iter {
            directory.insert(id, name);
        }
        directory
    }
}

impl<'a> FromIterator<&'a Member> for MemberDirectory {
    fn from_iter<I: IntoIterator<Item = &'a Member>>(iter: I) -> Self {
        iter.into_iter()
            .map(|member| (member.id.clone(), member.name.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub rotations: Vec<RotationDefinition>,

    #[serde(default)]
    pub overrides: Vec<OverrideDefinition>,
}

impl Schedule {
    /// All slots of this schedule inside `range`: override slots first,
    /// then rotation slots, each group in definition order.
    #[tracing::instrument(skip(self, range, tz, members), fields(schedule = %self.id))]
    pub fn project(
        &self,
        range: TimelineRange,
        tz: Tz,
        members: &MemberDirectory,
    ) -> Vec<RotationSlot> {
        let mut slots = Vec::new();

        for (idx, definition) in self.overrides.iter().enumerate() {
            slots.extend(project_override(definition, range, idx, members));
        }
        let override_count = slots.len();

        for (idx, definition) in self.rotations.iter().enumerate() {
            slots.extend(project_rotation(definition, range, idx, members, tz));
        }

        tracing::debug!(
            overrides = override_count,
            rotations = slots.len() - override_count,
            "projected schedule"
        );
        slots
    }

    /// Slots covering `at`. Overrides are listed before rotation slots; both
    /// are returned so the caller can apply its own precedence.
    pub fn on_call_at(
        &self,
        at: DateTime<Utc>,
        tz: Tz,
        members: &MemberDirectory,
    ) -> Vec<RotationSlot> {
        let Some(end) = at.checked_add_signed(Duration::seconds(1)) else {
            return Vec::new();
        };
        let range = TimelineRange { start: at, end };
        self.project(range, tz, members)
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}
