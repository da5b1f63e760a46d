//! Console output for the operator plus a plain-text log file. Every rename
//! and delete is logged at `info`, so the file is the audit trail of a run.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/vmdk-sweep.log";
const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. `TRACING_LEVEL` takes an `EnvFilter`
/// directive, `LOG_FILE_PATH` the log file. Hold the guard until exit.
pub fn init_logger() -> WorkerGuard {
    let filter_layer = EnvFilter::try_from_env("TRACING_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let log_file = env::var("LOG_FILE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_FILE));
    let (mut log_dir, file_name) = split_log_path(&log_file);

    // The appender cannot create missing directories itself.
    let dir_error = fs::create_dir_all(&log_dir).err();
    if dir_error.is_some() {
        log_dir = PathBuf::from(".");
    }

    let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(false)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    if let Some(e) = dir_error {
        warn!(
            "Cannot create log directory for {}: {}",
            log_file.display(),
            e
        );
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_dir.join(&file_name).display(),
        "vmdk-sweep starting"
    );

    guard
}

/// `(directory, file name)`; a bare file name lives in the working directory.
fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("vmdk-sweep.log"));
    (dir, file_name)
}
