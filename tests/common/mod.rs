#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use vmdk_sweep::platform::{DatastoreFile, Platform};
use vmdk_sweep::{ActionResult, AppConfig, Error, ReportWriter};

/// In-memory platform with scripted failures and a log of every call.
#[derive(Default)]
pub struct ScriptedPlatform {
    vm_disks: Mutex<Vec<String>>,
    datastores: Vec<String>,
    files: HashMap<String, Vec<DatastoreFile>>,
    fail_snapshot: bool,
    fail_listing: bool,
    failing_datastores: HashSet<String>,
    failing_paths: HashSet<String>,
    late_reference: Option<String>,
    cancel_after_mutations: Option<(usize, Arc<AtomicBool>)>,
    pub calls: Mutex<Vec<String>>,
    pub renamed: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vm_disk(self, path: &str) -> Self {
        self.vm_disks.lock().unwrap().push(path.to_string());
        self
    }

    /// Adds a datastore with `(folder, file, size)` entries.
    pub fn with_datastore(mut self, name: &str, files: &[(&str, &str, Option<u64>)]) -> Self {
        self.datastores.push(name.to_string());
        self.files.insert(
            name.to_string(),
            files
                .iter()
                .map(|(folder, file, size)| DatastoreFile {
                    folder_path: if folder.is_empty() {
                        format!("[{}] ", name)
                    } else {
                        format!("[{}] {}/", name, folder)
                    },
                    file_name: file.to_string(),
                    size_bytes: *size,
                    modified: None,
                })
                .collect(),
        );
        self
    }

    pub fn failing_snapshot(mut self) -> Self {
        self.fail_snapshot = true;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_datastore(mut self, name: &str) -> Self {
        self.failing_datastores.insert(name.to_string());
        self
    }

    pub fn failing_path(mut self, path: &str) -> Self {
        self.failing_paths.insert(path.to_string());
        self
    }

    /// A VM starts referencing `path` while datastores are being searched.
    pub fn with_late_reference(mut self, path: &str) -> Self {
        self.late_reference = Some(path.to_string());
        self
    }

    pub fn cancel_after_mutations(mut self, count: usize, flag: Arc<AtomicBool>) -> Self {
        self.cancel_after_mutations = Some((count, flag));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn after_mutation(&self) {
        if let Some((count, flag)) = &self.cancel_after_mutations {
            let done = self.renamed.lock().unwrap().len() + self.deleted.lock().unwrap().len();
            if done >= *count {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl Platform for ScriptedPlatform {
    fn vm_disk_paths(&self) -> Result<Vec<String>, Error> {
        self.log("vm_disk_paths".to_string());
        if self.fail_snapshot {
            return Err(Error::platform("list vm disks", "session expired"));
        }
        Ok(self.vm_disks.lock().unwrap().clone())
    }

    fn datastores(&self, location: &str) -> Result<Vec<String>, Error> {
        self.log(format!("datastores {}", location));
        if self.fail_listing {
            return Err(Error::platform("list datastores", "location not found"));
        }
        Ok(self.datastores.clone())
    }

    fn search_datastore(&self, datastore: &str, pattern: &str) -> Result<Vec<DatastoreFile>, Error> {
        self.log(format!("search {} {}", datastore, pattern));
        if let Some(path) = &self.late_reference {
            self.vm_disks.lock().unwrap().push(path.clone());
        }
        if self.failing_datastores.contains(datastore) {
            return Err(Error::platform("search datastore", "browser timed out"));
        }
        Ok(self.files.get(datastore).cloned().unwrap_or_default())
    }

    fn rename_file(&self, path: &str, new_name: &str) -> Result<(), Error> {
        self.log(format!("rename {}", path));
        if self.failing_paths.contains(path) {
            return Err(Error::platform("rename", "file is locked"));
        }
        self.renamed
            .lock()
            .unwrap()
            .push((path.to_string(), new_name.to_string()));
        self.after_mutation();
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<(), Error> {
        self.log(format!("delete {}", path));
        if self.failing_paths.contains(path) {
            return Err(Error::platform("delete", "permission denied"));
        }
        self.deleted.lock().unwrap().push(path.to_string());
        self.after_mutation();
        Ok(())
    }
}

pub fn sequential_config() -> AppConfig {
    AppConfig {
        parallel_volumes: false,
        ..AppConfig::default()
    }
}

/// Keeps persisted rows in memory. Optionally fails once `fail_after` rows
/// have been written.
#[derive(Default)]
pub struct RecordingWriter {
    pub rows: Mutex<Vec<String>>,
    pub totals: Mutex<Vec<u64>>,
    fail_after: Option<usize>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(rows: usize) -> Self {
        Self {
            fail_after: Some(rows),
            ..Self::default()
        }
    }
}

impl ReportWriter for RecordingWriter {
    fn append_row(&self, row: &ActionResult) -> Result<(), Error> {
        let mut rows = self.rows.lock().unwrap();
        if self.fail_after.is_some_and(|limit| rows.len() >= limit) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        rows.push(row.candidate.full_path());
        Ok(())
    }

    fn append_total(&self, total_bytes: u64) -> Result<(), Error> {
        self.totals.lock().unwrap().push(total_bytes);
        Ok(())
    }
}
