use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use vmdk_sweep::ProgressReporter;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif.
///
/// - Snapshot phase: spinner
/// - Enumerate phase: bar over datastores
/// - Action phase: bar over candidates
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn bar(len: u64, label: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {{msg}}",
            label
        );
        if let Ok(style) = ProgressStyle::with_template(&template) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }
}

impl ProgressReporter for CliReporter {
    fn on_snapshot_start(&self) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message("Collecting VM disk usage...");
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_snapshot_complete(&self, referenced_paths: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Usage snapshot: {} referenced disks in {:.2}s",
            referenced_paths, duration_secs
        );
    }

    fn on_enumerate_start(&self, datastores: usize) {
        self.set_bar(Self::bar(datastores as u64, "Datastores"));
    }

    fn on_datastore_searched(&self, datastore: &str, _files_found: usize) {
        self.with_bar(|pb| {
            pb.set_message(datastore.to_string());
            pb.inc(1);
        });
    }

    fn on_enumerate_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Enumeration: {} disk files in {:.2}s",
            total_files, duration_secs
        );
    }

    fn on_actions_start(&self, candidates: usize) {
        self.set_bar(Self::bar(candidates as u64, "Orphans"));
    }

    fn on_action_complete(&self, processed: usize, _total: usize, _path: &str) {
        self.with_bar(|pb| pb.set_position(processed as u64));
    }

    fn on_actions_complete(&self, succeeded: usize, failed: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Actions: {} succeeded, {} failed in {:.2}s",
            succeeded, failed, duration_secs
        );
    }
}
