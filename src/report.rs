use crate::error::Error;
use crate::model::ActionResult;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Accumulated results of one run plus the byte total of every candidate seen.
#[derive(Debug, Default, Clone)]
pub struct OrphanReport {
    rows: Vec<ActionResult>,
    total_bytes: u64,
}

impl OrphanReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes come from enumeration, so the total is the same in every mode
    /// and counts failed actions too.
    pub fn record(&mut self, result: ActionResult) {
        self.total_bytes += result.candidate.size_bytes();
        self.rows.push(result);
    }

    pub fn rows(&self) -> &[ActionResult] {
        &self.rows
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.rows.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.rows.len() - self.succeeded()
    }

    /// Write every row and the total in one go. Runs that stream rows as
    /// they happen use [`ReportWriter::append_row`] instead.
    pub fn persist(&self, writer: &dyn ReportWriter) -> Result<(), Error> {
        writer.write(&self.rows, self.total_bytes)
    }
}

/// Durable storage for report rows.
pub trait ReportWriter {
    /// Persist one row. Called right after the row's action completes.
    fn append_row(&self, row: &ActionResult) -> Result<(), Error>;

    /// Close a run with its byte total.
    fn append_total(&self, total_bytes: u64) -> Result<(), Error>;

    fn write(&self, rows: &[ActionResult], total_bytes: u64) -> Result<(), Error> {
        for row in rows {
            self.append_row(row)?;
        }
        self.append_total(total_bytes)
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    mode: String,
    datastore: &'a str,
    folder_path: &'a str,
    file_name: &'a str,
    size_bytes: u64,
    modified: String,
    proposed_name: &'a str,
    outcome: String,
    error: &'a str,
}

impl<'a> From<&'a ActionResult> for CsvRow<'a> {
    fn from(result: &'a ActionResult) -> Self {
        let record = result.candidate.record();
        CsvRow {
            mode: result.mode().to_string(),
            datastore: &record.datastore,
            folder_path: &record.folder_path,
            file_name: &record.file_name,
            size_bytes: record.size_bytes,
            modified: record.modified.map(|m| m.to_rfc3339()).unwrap_or_default(),
            proposed_name: result.proposed_new_name().unwrap_or_default(),
            outcome: result.outcome.to_string(),
            error: result.error_detail().unwrap_or_default(),
        }
    }
}

/// Appends report rows to a CSV file. A header is written only when the file
/// is new, so repeated runs with the same file name accumulate.
pub struct CsvReportWriter {
    path: PathBuf,
}

impl CsvReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

const CSV_HEADER: [&str; 9] = [
    "mode",
    "datastore",
    "folder_path",
    "file_name",
    "size_bytes",
    "modified",
    "proposed_name",
    "outcome",
    "error",
];

impl CsvReportWriter {
    /// Open for appending. The flag is true when the file is new or empty
    /// and still needs its header.
    fn open(&self) -> Result<(csv::Writer<fs::File>, bool), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let wtr = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        Ok((wtr, needs_header))
    }
}

impl ReportWriter for CsvReportWriter {
    fn append_row(&self, row: &ActionResult) -> Result<(), Error> {
        let (mut wtr, _) = self.open()?;
        wtr.serialize(CsvRow::from(row))?;
        wtr.flush()?;
        debug!("Appended {} to {}", row.candidate.full_path(), self.path.display());
        Ok(())
    }

    fn append_total(&self, total_bytes: u64) -> Result<(), Error> {
        let (mut wtr, needs_header) = self.open()?;
        if needs_header {
            wtr.write_record(CSV_HEADER)?;
        }
        let total = total_bytes.to_string();
        wtr.write_record(["TOTAL", "", "", "", total.as_str(), "", "", "", ""])?;
        wtr.flush()?;

        info!("Report total written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionKind, DiskFileRecord, OrphanCandidate, Outcome};
    use tempfile::tempdir;

    fn result(name: &str, size: u64, outcome: Outcome) -> ActionResult {
        ActionResult {
            candidate: OrphanCandidate::new(DiskFileRecord {
                datastore: "ds1".to_string(),
                folder_path: "[ds1] vm/".to_string(),
                file_name: name.to_string(),
                size_bytes: size,
                modified: None,
            }),
            kind: ActionKind::Delete,
            outcome,
        }
    }

    #[test]
    fn test_total_counts_failed_rows() {
        let mut report = OrphanReport::new();
        report.record(result("a.vmdk", 100, Outcome::Success));
        report.record(result(
            "b.vmdk",
            50,
            Outcome::Failed {
                detail: "locked".to_string(),
            },
        ));

        assert_eq!(report.total_bytes(), 150);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_csv_appends_without_repeating_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("report.csv");
        let writer = CsvReportWriter::new(&path);

        writer
            .write(&[result("a.vmdk", 100, Outcome::Success)], 100)
            .unwrap();
        writer
            .write(
                &[result(
                    "b.vmdk",
                    7,
                    Outcome::Failed {
                        detail: "locked".to_string(),
                    },
                )],
                7,
            )
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("mode,datastore,folder_path"));
        assert_eq!(contents.matches("mode,datastore").count(), 1);
        assert!(lines[1].contains("a.vmdk") && lines[1].contains("success"));
        assert_eq!(lines[2], "TOTAL,,,,100,,,,");
        assert!(lines[3].contains("failed") && lines[3].ends_with("locked"));
        assert_eq!(lines[4], "TOTAL,,,,7,,,,");
    }

    #[test]
    fn test_empty_report_still_gets_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        CsvReportWriter::new(&path).write(&[], 0).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("mode,"));
        assert_eq!(lines[1], "TOTAL,,,,0,,,,");
    }

    #[test]
    fn test_rows_are_on_disk_before_the_total() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("streamed.csv");
        let writer = CsvReportWriter::new(&path);

        writer
            .append_row(&result("a.vmdk", 3, Outcome::Success))
            .unwrap();
        let after_one = fs::read_to_string(&path).unwrap();
        assert_eq!(after_one.lines().count(), 2);
        assert!(after_one.lines().nth(1).unwrap().contains("a.vmdk"));

        writer
            .append_row(&result("b.vmdk", 4, Outcome::Success))
            .unwrap();
        writer.append_total(7).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(contents.matches("mode,datastore").count(), 1);
        assert_eq!(lines[3], "TOTAL,,,,7,,,,");
    }
}
