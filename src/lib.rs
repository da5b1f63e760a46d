pub mod actions;
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod platform;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod usage;

pub use config::AppConfig;
pub use engine::{SweepEngine, SweepResult};
pub use error::Error;
pub use model::{ActionKind, ActionMode, ActionResult, DiskFileRecord, OrphanCandidate, Outcome};
pub use platform::{FsPlatform, Platform};
pub use progress::{ProgressReporter, SilentReporter};
pub use report::{CsvReportWriter, OrphanReport, ReportWriter};
