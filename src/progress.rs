/// Trait for reporting sweep progress.
///
/// The CLI implements it with indicatif; tests use `SilentReporter`.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_snapshot_start(&self) {}
    fn on_snapshot_complete(&self, _referenced_paths: usize, _duration_secs: f64) {}
    fn on_enumerate_start(&self, _datastores: usize) {}
    fn on_datastore_searched(&self, _datastore: &str, _files_found: usize) {}
    fn on_enumerate_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_actions_start(&self, _candidates: usize) {}
    fn on_action_complete(&self, _processed: usize, _total: usize, _path: &str) {}
    fn on_actions_complete(&self, _succeeded: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
