use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Report error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Platform error during {op}: {detail}")]
    Platform { op: &'static str, detail: String },

    /// The referenced-disk snapshot could not be completed. Always fatal.
    #[error("Usage snapshot failed: {0}")]
    Snapshot(String),

    #[error("Invalid datastore path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn platform(op: &'static str, detail: impl ToString) -> Self {
        Error::Platform {
            op,
            detail: detail.to_string(),
        }
    }
}
