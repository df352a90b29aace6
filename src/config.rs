use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::credential_names;
use crate::error::{CalendarError, Result};
use crate::pipeline::RunSettings;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn default_per_source_timeout_secs() -> u64 {
    30
}

fn default_run_budget_secs() -> u64 {
    120
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("registry.toml")
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_per_source_timeout_secs")]
    pub per_source_timeout_secs: u64,
    #[serde(default = "default_run_budget_secs")]
    pub run_budget_secs: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    #[serde(default)]
    pub ticketmaster: TicketmasterConfig,
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub venue_calendars: VenueCalendarsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TicketmasterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// "lat,lon" centre of the search
    pub latlong: String,
    pub radius_miles: u32,
    /// Days ahead of the run date to request
    pub days_ahead: i64,
    pub page_size: u32,
}

impl Default for TicketmasterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latlong: "35.1495,-90.0490".to_string(),
            radius_miles: 30,
            days_ahead: 7,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Used when the published sheet URL is unset or unreachable
    #[serde(default)]
    pub local_csv: Option<PathBuf>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            local_csv: Some(PathBuf::from("manual_events.csv")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("artifacts"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueCalendarsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Restrict scraping to these venue ids; empty means every venue with a calendar_url
    #[serde(default)]
    pub only: Vec<String>,
}

impl Default for VenueCalendarsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            only: Vec::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            per_source_timeout_secs: default_per_source_timeout_secs(),
            run_budget_secs: default_run_budget_secs(),
            output_dir: default_output_dir(),
            registry_path: default_registry_path(),
            ticketmaster: TicketmasterConfig::default(),
            sheet: SheetConfig::default(),
            artifacts: ArtifactsConfig::default(),
            venue_calendars: VenueCalendarsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load the config file, or defaults when the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            CalendarError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        if config.per_source_timeout_secs == 0 || config.run_budget_secs == 0 {
            return Err(CalendarError::Config(
                "per_source_timeout_secs and run_budget_secs must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            per_source_timeout: Duration::from_secs(self.per_source_timeout_secs),
            run_budget: Duration::from_secs(self.run_budget_secs),
        }
    }
}

/// Read every known credential from the environment. Unset or blank values are skipped.
pub fn credentials_from_env() -> Vec<(String, String)> {
    credential_names()
        .into_iter()
        .filter_map(|name| match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => Some((name.to_string(), value)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.per_source_timeout_secs, 30);
        assert_eq!(config.run_budget_secs, 120);
        assert_eq!(config.output_dir, PathBuf::from("docs"));
        assert!(config.ticketmaster.enabled);
        assert_eq!(config.ticketmaster.radius_miles, 30);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
per_source_timeout_secs = 5
output_dir = "out"

[ticketmaster]
enabled = false
latlong = "35.0,-90.0"
radius_miles = 10
days_ahead = 14
page_size = 50

[venue_calendars]
only = ["hi-tone"]
"#,
        )
        .unwrap();
        assert_eq!(config.run_settings().per_source_timeout, Duration::from_secs(5));
        assert_eq!(config.run_settings().run_budget, Duration::from_secs(120));
        assert!(!config.ticketmaster.enabled);
        assert_eq!(config.ticketmaster.days_ahead, 14);
        assert_eq!(config.venue_calendars.only, vec!["hi-tone"]);
        assert!(config.venue_calendars.enabled);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(AppConfig::from_toml_str("run_budget_secs = 0").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.registry_path, PathBuf::from("registry.toml"));
    }
}
