use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::schedule::{Member, MemberDirectory, Schedule};

/// Schedules and tenant members as fetched from the portal backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub members: Vec<Member>,

    #[serde(default)]
    pub schedules: Vec<Schedule>,
}

impl ScheduleDocument {
    #[tracing::instrument(skip(path), fields(file = %path.display()))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let document = Self::from_json_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display()))?;

        info!(
            members = document.members.len(),
            schedules = document.schedules.len(),
            "loaded schedule document"
        );
        Ok(document)
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).map_err(|err| {
            anyhow!(
                "invalid schedule document at line {} column {}: {err}",
                err.line(),
                err.column()
            )
        })
    }

    pub fn member_directory(&self) -> MemberDirectory {
        self.members.iter().collect()
    }

    pub fn schedule(&self, id: &str) -> anyhow::Result<&Schedule> {
        self.schedules
            .iter()
            .find(|schedule| schedule.id == id)
            .ok_or_else(|| {
                let known = self
                    .schedules
                    .iter()
                    .map(|schedule| schedule.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                anyhow!("schedule not found: {id} (known: {known})")
            })
    }

    /// One schedule by id, or every schedule when no id is given.
    pub fn select(&self, id: Option<&str>) -> anyhow::Result<Vec<&Schedule>> {
        let selected = match id {
            Some(id) => vec![self.schedule(id)?],
            None => self.schedules.iter().collect(),
        };
        debug!(count = selected.len(), "selected schedules");
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "members": [{"id": "u1", "name": "Alice"}],
        "schedules": [
            {"id": "primary", "name": "Primary",
             "rotations": [{"days": [1, 2, 3, 4, 5], "duration": 86400,
                            "members": ["u1", "u2"], "since": 1704067200}]},
            {"id": "secondary"}
        ]
    }"#;

    #[test]
    fn parses_document_with_defaults() {
        let doc = ScheduleDocument::from_json_str(DOC).expect("parse document");
        assert_eq!(doc.schedules.len(), 2);
        let secondary = doc.schedule("secondary").expect("secondary");
        assert!(secondary.rotations.is_empty());
        assert!(secondary.overrides.is_empty());
        assert_eq!(secondary.display_name(), "secondary");
        assert_eq!(doc.member_directory().display_name("u1"), "Alice");
    }

    #[test]
    fn missing_schedule_lists_known_ids() {
        let doc = ScheduleDocument::from_json_str(DOC).expect("parse document");
        let err = doc.schedule("tertiary").expect_err("missing schedule");
        assert!(err.to_string().contains("primary, secondary"));
    }

    #[test]
    fn select_without_id_returns_all() {
        let doc = ScheduleDocument::from_json_str(DOC).expect("parse document");
        assert_eq!(doc.select(None).expect("select").len(), 2);
        assert_eq!(doc.select(Some("primary")).expect("select")[0].name, "Primary");
    }

    #[test]
    fn reports_parse_position() {
        let err = ScheduleDocument::from_json_str("{\n  \"schedules\": [1]\n}")
            .expect_err("invalid document");
        assert!(err.to_string().contains("line 2"));
    }
}
