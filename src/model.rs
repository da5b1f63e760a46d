use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// A disk file found on a datastore during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskFileRecord {
    pub datastore: String,
    /// `[<datastore>] <folder/>`, always ending in a space or a `/`.
    pub folder_path: String,
    pub file_name: String,
    /// Zero when the platform did not report a size.
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl DiskFileRecord {
    pub fn full_path(&self) -> String {
        format!("{}{}", self.folder_path, self.file_name)
    }
}

/// A disk file that no VM references and that no exclusion rule protects.
///
/// Only the orphan resolver constructs these, and the action executor takes
/// them by value, so each candidate is acted on at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanCandidate {
    record: DiskFileRecord,
}

impl OrphanCandidate {
    pub(crate) fn new(record: DiskFileRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &DiskFileRecord {
        &self.record
    }

    pub fn full_path(&self) -> String {
        self.record.full_path()
    }

    pub fn size_bytes(&self) -> u64 {
        self.record.size_bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMode {
    Report,
    Rename,
    Delete,
}

impl ActionMode {
    pub fn is_destructive(self) -> bool {
        !matches!(self, ActionMode::Report)
    }
}

impl FromStr for ActionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "report" => Ok(ActionMode::Report),
            "rename" => Ok(ActionMode::Rename),
            "delete" => Ok(ActionMode::Delete),
            other => Err(format!(
                "unknown action '{}', expected one of: report, rename, delete",
                other
            )),
        }
    }
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionMode::Report => "report",
            ActionMode::Rename => "rename",
            ActionMode::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// What was done (or proposed) for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Report { proposed_name: String },
    Rename { new_name: String },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed { detail: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failed { .. } => f.write_str("failed"),
        }
    }
}

/// One row of the audit trail. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub candidate: OrphanCandidate,
    pub kind: ActionKind,
    pub outcome: Outcome,
}

impl ActionResult {
    pub fn mode(&self) -> ActionMode {
        match self.kind {
            ActionKind::Report { .. } => ActionMode::Report,
            ActionKind::Rename { .. } => ActionMode::Rename,
            ActionKind::Delete => ActionMode::Delete,
        }
    }

    pub fn proposed_new_name(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Report { proposed_name } => Some(proposed_name),
            ActionKind::Rename { new_name } => Some(new_name),
            ActionKind::Delete => None,
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failed { detail } => Some(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_mode_parse_ignores_case() {
        assert_eq!("Report".parse::<ActionMode>().unwrap(), ActionMode::Report);
        assert_eq!("RENAME".parse::<ActionMode>().unwrap(), ActionMode::Rename);
        assert_eq!(" delete ".parse::<ActionMode>().unwrap(), ActionMode::Delete);
        assert!("purge".parse::<ActionMode>().is_err());
    }

    #[test]
    fn test_full_path_concatenates_folder_and_name() {
        let record = DiskFileRecord {
            datastore: "ds1".to_string(),
            folder_path: "[ds1] vm1/".to_string(),
            file_name: "vm1.vmdk".to_string(),
            size_bytes: 0,
            modified: None,
        };
        assert_eq!(record.full_path(), "[ds1] vm1/vm1.vmdk");
    }
}
