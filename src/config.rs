use crate::actions::DEFAULT_GRACE_DAYS;
use crate::analysis::orphans::{ExclusionRules, DEFAULT_EXCLUDE_MARKERS, DEFAULT_RESERVED_NAMES};
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

pub const DEFAULT_DISK_PATTERN: &str = "*.vmdk";
pub const ENV_PREFIX: &str = "VMDK_SWEEP";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Glob matched against file names during datastore search.
    pub disk_pattern: String,
    pub exclude_markers: Vec<String>,
    pub reserved_names: Vec<String>,
    /// Days added to the run date in mark-for-deletion names.
    pub grace_days: u32,
    pub parallel_volumes: bool,
    pub report_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            disk_pattern: DEFAULT_DISK_PATTERN.to_string(),
            exclude_markers: DEFAULT_EXCLUDE_MARKERS.iter().map(|s| s.to_string()).collect(),
            reserved_names: DEFAULT_RESERVED_NAMES.iter().map(|s| s.to_string()).collect(),
            grace_days: DEFAULT_GRACE_DAYS,
            parallel_volumes: true,
            report_dir: None,
        }
    }
}

impl AppConfig {
    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules::new(&self.exclude_markers, &self.reserved_names)
    }
}

/// `Config.toml` in the working directory (optional), then `VMDK_SWEEP_*`
/// environment variables. List values in the environment are comma separated.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("exclude_markers")
                .with_list_parse_key("reserved_names"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
