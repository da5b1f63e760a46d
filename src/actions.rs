use crate::model::{ActionKind, ActionMode, ActionResult, OrphanCandidate, Outcome};
use crate::platform::Platform;
use chrono::{Days, NaiveDate};
use tracing::{debug, error, info};

pub const MARK_INFIX: &str = "_ToDelete_";
pub const MARK_DATE_FORMAT: &str = "%m-%d-%Y";
pub const DEFAULT_GRACE_DAYS: u32 = 15;

const DISK_EXTENSION: &str = ".vmdk";

/// `foo.vmdk` -> `foo_ToDelete_<run_date + grace_days as MM-dd-yyyy>.vmdk`
pub fn marked_name(file_name: &str, run_date: NaiveDate, grace_days: u32) -> String {
    let split = file_name.len().saturating_sub(DISK_EXTENSION.len());
    let base = match file_name.get(split..) {
        Some(ext) if ext.eq_ignore_ascii_case(DISK_EXTENSION) => &file_name[..split],
        _ => file_name,
    };

    let due = run_date
        .checked_add_days(Days::new(u64::from(grace_days)))
        .unwrap_or(NaiveDate::MAX);

    format!(
        "{}{}{}{}",
        base,
        MARK_INFIX,
        due.format(MARK_DATE_FORMAT),
        DISK_EXTENSION
    )
}

/// Applies one action mode to orphan candidates, one at a time.
///
/// Platform failures are captured in the returned `ActionResult`; they never
/// escape `execute`, so one bad file cannot stop the rest of the run.
pub struct ActionExecutor<'a> {
    platform: &'a dyn Platform,
    mode: ActionMode,
    run_date: NaiveDate,
    grace_days: u32,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(platform: &'a dyn Platform, mode: ActionMode, run_date: NaiveDate) -> Self {
        Self {
            platform,
            mode,
            run_date,
            grace_days: DEFAULT_GRACE_DAYS,
        }
    }

    pub fn with_grace_days(mut self, grace_days: u32) -> Self {
        self.grace_days = grace_days;
        self
    }

    pub fn mode(&self) -> ActionMode {
        self.mode
    }

    pub fn execute(&self, candidate: OrphanCandidate) -> ActionResult {
        let path = candidate.full_path();

        let (kind, outcome) = match self.mode {
            ActionMode::Report => {
                let proposed_name =
                    marked_name(&candidate.record().file_name, self.run_date, self.grace_days);
                debug!("Would rename {} to {}", path, proposed_name);
                (ActionKind::Report { proposed_name }, Outcome::Success)
            }
            ActionMode::Rename => {
                let new_name =
                    marked_name(&candidate.record().file_name, self.run_date, self.grace_days);
                let outcome = match self.platform.rename_file(&path, &new_name) {
                    Ok(()) => {
                        info!("Renamed {} to {}", path, new_name);
                        Outcome::Success
                    }
                    Err(e) => {
                        error!("Failed to rename '{}': {}", path, e);
                        Outcome::Failed {
                            detail: e.to_string(),
                        }
                    }
                };
                (ActionKind::Rename { new_name }, outcome)
            }
            ActionMode::Delete => {
                let outcome = match self.platform.delete_file(&path) {
                    Ok(()) => {
                        info!("Deleted {}", path);
                        Outcome::Success
                    }
                    Err(e) => {
                        error!("Failed to delete '{}': {}", path, e);
                        Outcome::Failed {
                            detail: e.to_string(),
                        }
                    }
                };
                (ActionKind::Delete, outcome)
            }
        };

        ActionResult {
            candidate,
            kind,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_marked_name_adds_fifteen_days() {
        assert_eq!(
            marked_name("foo.vmdk", date(2024, 1, 1), DEFAULT_GRACE_DAYS),
            "foo_ToDelete_01-16-2024.vmdk"
        );
    }

    #[test]
    fn test_marked_name_crosses_month_and_year() {
        assert_eq!(
            marked_name("vm_1.vmdk", date(2023, 12, 25), 15),
            "vm_1_ToDelete_01-09-2024.vmdk"
        );
        assert_eq!(
            marked_name("leap.vmdk", date(2024, 2, 20), 15),
            "leap_ToDelete_03-06-2024.vmdk"
        );
    }

    #[test]
    fn test_marked_name_extension_handling() {
        assert_eq!(
            marked_name("UPPER.VMDK", date(2024, 1, 1), 0),
            "UPPER_ToDelete_01-01-2024.vmdk"
        );
        assert_eq!(
            marked_name("noext", date(2024, 1, 1), 0),
            "noext_ToDelete_01-01-2024.vmdk"
        );
    }
}
