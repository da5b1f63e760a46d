use crate::model::{DiskFileRecord, OrphanCandidate};
use crate::usage::UsageSnapshot;
use tracing::debug;

pub const DEFAULT_EXCLUDE_MARKERS: &[&str] = &["-ctk", "-rdm"];
pub const DEFAULT_RESERVED_NAMES: &[&str] = &["esxconsole.vmdk"];

/// File names that are never orphan candidates, whatever their reference status.
///
/// A name is excluded when it contains any marker or equals any reserved name,
/// ignoring ASCII case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRules {
    markers: Vec<String>,
    reserved_names: Vec<String>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDE_MARKERS, DEFAULT_RESERVED_NAMES)
    }
}

impl ExclusionRules {
    pub fn new<S: AsRef<str>>(markers: &[S], reserved_names: &[S]) -> Self {
        Self {
            markers: markers
                .iter()
                .map(|m| m.as_ref().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            reserved_names: reserved_names
                .iter()
                .map(|n| n.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn excludes(&self, file_name: &str) -> bool {
        let file_name = file_name.to_ascii_lowercase();
        self.markers.iter().any(|marker| file_name.contains(marker.as_str()))
            || self.reserved_names.iter().any(|name| *name == file_name)
    }
}

#[derive(Debug, Default)]
pub struct Resolution {
    /// In enumeration order.
    pub candidates: Vec<OrphanCandidate>,
    pub excluded: usize,
    pub referenced: usize,
}

impl Resolution {
    pub fn total_bytes(&self) -> u64 {
        self.candidates.iter().map(OrphanCandidate::size_bytes).sum()
    }
}

/// Diff enumerated files against the usage snapshot.
pub fn resolve_orphans<I>(records: I, usage: &UsageSnapshot, rules: &ExclusionRules) -> Resolution
where
    I: IntoIterator<Item = DiskFileRecord>,
{
    let mut resolution = Resolution::default();

    for record in records {
        if rules.excludes(&record.file_name) {
            debug!("Excluded by name: {}", record.full_path());
            resolution.excluded += 1;
            continue;
        }

        if usage.is_referenced(&record.full_path()) {
            resolution.referenced += 1;
            continue;
        }

        debug!("Orphan: {}", record.full_path());
        resolution.candidates.push(OrphanCandidate::new(record));
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(folder: &str, name: &str, size: u64) -> DiskFileRecord {
        DiskFileRecord {
            datastore: "ds1".to_string(),
            folder_path: format!("[ds1] {}", folder),
            file_name: name.to_string(),
            size_bytes: size,
            modified: None,
        }
    }

    #[test]
    fn test_unreferenced_file_is_orphan() {
        let usage = UsageSnapshot::from_paths(["[ds1] vm1/vm1.vmdk"]);
        let resolution = resolve_orphans(
            vec![record("vm1/", "vm1.vmdk", 10), record("vm1/", "old.vmdk", 20)],
            &usage,
            &ExclusionRules::default(),
        );

        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.candidates[0].full_path(), "[ds1] vm1/old.vmdk");
        assert_eq!(resolution.referenced, 1);
        assert_eq!(resolution.total_bytes(), 20);
    }

    #[test]
    fn test_change_tracking_file_never_orphan() {
        let usage = UsageSnapshot::from_paths(Vec::<String>::new());
        let resolution = resolve_orphans(
            vec![record("vm1/", "disk-ctk.vmdk", 1)],
            &usage,
            &ExclusionRules::default(),
        );
        assert!(resolution.candidates.is_empty());
        assert_eq!(resolution.excluded, 1);
    }

    #[test]
    fn test_reserved_console_disk_never_orphan() {
        let usage = UsageSnapshot::from_paths(Vec::<String>::new());
        let resolution = resolve_orphans(
            vec![
                record("esxconsole-abc/", "esxconsole.vmdk", 1),
                record("vm1/", "my-esxconsole.vmdk", 1),
            ],
            &usage,
            &ExclusionRules::default(),
        );
        // Reserved names match exactly, not as substrings.
        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.candidates[0].record().file_name, "my-esxconsole.vmdk");
    }

    #[test]
    fn test_rdm_mapping_files_excluded() {
        let usage = UsageSnapshot::from_paths(Vec::<String>::new());
        let resolution = resolve_orphans(
            vec![record("vm1/", "vm1-rdm.vmdk", 1), record("vm1/", "vm1-rdmp.vmdk", 1)],
            &usage,
            &ExclusionRules::default(),
        );
        assert!(resolution.candidates.is_empty());
    }

    #[test]
    fn test_same_name_in_other_folder_is_still_orphan() {
        let usage = UsageSnapshot::from_paths(["[ds1] vm1/disk.vmdk"]);
        let resolution = resolve_orphans(
            vec![record("vm2/", "disk.vmdk", 5)],
            &usage,
            &ExclusionRules::default(),
        );
        assert_eq!(resolution.candidates.len(), 1);
    }

    #[test]
    fn test_order_follows_enumeration() {
        let usage = UsageSnapshot::from_paths(Vec::<String>::new());
        let names = ["z.vmdk", "a.vmdk", "m.vmdk"];
        let resolution = resolve_orphans(
            names.iter().map(|n| record("", n, 1)),
            &usage,
            &ExclusionRules::default(),
        );
        let got: Vec<_> = resolution
            .candidates
            .iter()
            .map(|c| c.record().file_name.as_str())
            .collect();
        assert_eq!(got, names);
    }

    #[test]
    fn test_exclusions_ignore_case() {
        let usage = UsageSnapshot::from_paths(Vec::<String>::new());
        let resolution = resolve_orphans(
            vec![
                record("vm/", "vm-CTK.vmdk", 1),
                record("vm/", "vm-Rdmp.vmdk", 1),
                record("console/", "ESXConsole.vmdk", 1),
            ],
            &usage,
            &ExclusionRules::default(),
        );
        assert!(resolution.candidates.is_empty());
        assert_eq!(resolution.excluded, 3);

        let rules = ExclusionRules::new(&["-KEEP"], &["Pinned.vmdk"]);
        assert!(rules.excludes("vm-keep.vmdk"));
        assert!(rules.excludes("pinned.VMDK"));
    }

    #[test]
    fn test_custom_rules_ignore_empty_markers() {
        let rules = ExclusionRules::new(&["", "-keep"], &[]);
        assert!(!rules.excludes("vm.vmdk"));
        assert!(rules.excludes("vm-keep.vmdk"));
    }
}
