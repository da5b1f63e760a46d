use crate::actions::ActionExecutor;
use crate::analysis::resolve_orphans;
use crate::config::AppConfig;
use crate::error::Error;
use crate::model::ActionMode;
use crate::platform::Platform;
use crate::progress::ProgressReporter;
use crate::report::{OrphanReport, ReportWriter};
use crate::scanner::{self, VolumeFailure};
use crate::usage;
use chrono::{Local, NaiveDate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct SweepEngine<'a> {
    platform: &'a dyn Platform,
    config: AppConfig,
    location: String,
    mode: ActionMode,
    run_date: NaiveDate,
    cancel: Option<Arc<AtomicBool>>,
    report_writer: Option<&'a dyn ReportWriter>,
}

#[derive(Debug)]
pub struct SweepResult {
    pub report: OrphanReport,
    pub referenced_paths: usize,
    pub records_enumerated: usize,
    pub excluded: usize,
    pub still_referenced: usize,
    pub volume_failures: Vec<VolumeFailure>,
    /// Candidates left untouched because the run was cancelled.
    pub unprocessed: usize,
    pub cancelled: bool,
    pub snapshot_duration: Duration,
    pub enumerate_duration: Duration,
    pub action_duration: Duration,
}

impl<'a> SweepEngine<'a> {
    pub fn new(platform: &'a dyn Platform, config: AppConfig, location: &str) -> Self {
        Self {
            platform,
            config,
            location: location.to_string(),
            mode: ActionMode::Report,
            run_date: Local::now().date_naive(),
            cancel: None,
            report_writer: None,
        }
    }

    pub fn with_mode(mut self, mode: ActionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fixes the date used for mark-for-deletion names.
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    /// Checked before each candidate; once set, no further file is touched.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Each row is persisted as soon as its action completes, and the total
    /// after the last one. A row that cannot be persisted stops the run
    /// before the next file is touched.
    pub fn with_report_writer(mut self, writer: &'a dyn ReportWriter) -> Self {
        self.report_writer = Some(writer);
        self
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Run the reconciliation:
    /// 1. Usage snapshot (fatal on failure, nothing else runs)
    /// 2. Datastore enumeration for the location
    /// 3. Diff against the snapshot from step 1
    /// 4. One action per orphan, sequentially, each recorded in the report
    ///    and streamed to the report writer, if one is set
    pub fn sweep(&self, reporter: &dyn ProgressReporter) -> Result<SweepResult, Error> {
        // Phase 1: Snapshot
        info!("Collecting VM disk usage...");
        reporter.on_snapshot_start();
        let snapshot_start = Instant::now();
        let usage = usage::collect_usage(self.platform)?;
        let snapshot_duration = snapshot_start.elapsed();
        reporter.on_snapshot_complete(usage.len(), snapshot_duration.as_secs_f64());

        // Phase 2: Enumerate
        info!("Enumerating disk files in '{}'...", self.location);
        let enumerate_start = Instant::now();
        let enumeration = scanner::enumerate_location(
            self.platform,
            &self.location,
            &self.config.disk_pattern,
            self.config.parallel_volumes,
            reporter,
        )?;
        let enumerate_duration = enumerate_start.elapsed();
        let records_enumerated = enumeration.records.len();
        reporter.on_enumerate_complete(records_enumerated, enumerate_duration.as_secs_f64());
        for failure in &enumeration.failures {
            warn!(
                "Datastore '{}' was not searched: {}",
                failure.datastore, failure.error
            );
        }

        // Phase 3: Resolve
        let rules = self.config.exclusion_rules();
        let resolution = resolve_orphans(enumeration.records, &usage, &rules);
        info!(
            "{} orphaned disks ({} referenced, {} excluded by name)",
            resolution.candidates.len(),
            resolution.referenced,
            resolution.excluded,
        );

        // Phase 4: Act
        let executor = ActionExecutor::new(self.platform, self.mode, self.run_date)
            .with_grace_days(self.config.grace_days);
        let total = resolution.candidates.len();
        reporter.on_actions_start(total);
        let action_start = Instant::now();

        let mut report = OrphanReport::new();
        let mut cancelled = false;
        let mut unprocessed = 0;

        for (index, candidate) in resolution.candidates.into_iter().enumerate() {
            if self.is_cancelled() {
                cancelled = true;
                unprocessed = total - index;
                warn!("Cancelled with {} candidates left untouched", unprocessed);
                break;
            }

            let path = candidate.full_path();
            let result = executor.execute(candidate);
            debug!("{} -> {}", path, result.outcome);
            if let Some(writer) = self.report_writer {
                if let Err(e) = writer.append_row(&result) {
                    error!("Could not persist report row for {}: {}", path, e);
                    return Err(e);
                }
            }
            report.record(result);
            reporter.on_action_complete(index + 1, total, &path);
        }

        if let Some(writer) = self.report_writer {
            writer.append_total(report.total_bytes())?;
        }

        let action_duration = action_start.elapsed();
        reporter.on_actions_complete(
            report.succeeded(),
            report.failed(),
            action_duration.as_secs_f64(),
        );

        Ok(SweepResult {
            report,
            referenced_paths: usage.len(),
            records_enumerated,
            excluded: resolution.excluded,
            still_referenced: resolution.referenced,
            volume_failures: enumeration.failures,
            unprocessed,
            cancelled,
            snapshot_duration,
            enumerate_duration,
            action_duration,
        })
    }
}
