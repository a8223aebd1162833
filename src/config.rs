//! `config.toml` in the data directory. Every section and key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schedule::{CalendarGrid, DEFAULT_WEEKLY_CAPACITY_HOURS};

pub const CONFIG_FILE: &str = "config.toml";
pub const STORE_FILE: &str = "spm.json";
pub const BLOB_DIR: &str = "blobs";
pub const DATA_DIR_ENV: &str = "SPM_DATA_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub plan: PlanConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_grid_start_hour")]
    pub grid_start_hour: u32,
    #[serde(default = "default_grid_hours")]
    pub grid_hours: u32,
    #[serde(default = "default_hour_height_px")]
    pub hour_height_px: f64,
    #[serde(default = "default_weekly_capacity")]
    pub weekly_capacity_hours: f64,
}

fn default_grid_start_hour() -> u32 {
    CalendarGrid::default().start_hour
}

fn default_grid_hours() -> u32 {
    CalendarGrid::default().hours
}

fn default_hour_height_px() -> f64 {
    CalendarGrid::default().hour_height
}

fn default_weekly_capacity() -> f64 {
    DEFAULT_WEEKLY_CAPACITY_HOURS
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            grid_start_hour: default_grid_start_hour(),
            grid_hours: default_grid_hours(),
            hour_height_px: default_hour_height_px(),
            weekly_capacity_hours: default_weekly_capacity(),
        }
    }
}

/// Plan suggestions are disabled unless an endpoint is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the bearer key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_key_env() -> String {
    "SPM_PLAN_API_KEY".to_string()
}

impl Default for PlanConfig {
    fn default() -> Self {
        PlanConfig {
            endpoint: None,
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Read `config.toml` from `data_dir`. A missing file yields the defaults.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let cal = &self.calendar;
        if cal.grid_hours == 0 || cal.grid_start_hour + cal.grid_hours > 24 {
            return Err(Error::Config(format!(
                "calendar grid {}h + {}h does not fit in a day",
                cal.grid_start_hour, cal.grid_hours
            )));
        }
        if !(cal.hour_height_px > 0.0) {
            return Err(Error::Config("calendar.hour_height_px must be positive".into()));
        }
        if cal.weekly_capacity_hours < 0.0 {
            return Err(Error::Config("calendar.weekly_capacity_hours must not be negative".into()));
        }
        Ok(())
    }

    pub fn grid(&self) -> CalendarGrid {
        CalendarGrid {
            start_hour: self.calendar.grid_start_hour,
            hours: self.calendar.grid_hours,
            hour_height: self.calendar.hour_height_px,
        }
    }

    /// The bearer key for the plan service, if its variable is set and non-empty.
    pub fn plan_api_key(&self) -> Option<String> {
        std::env::var(&self.plan.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

/// `--data-dir`, else `$SPM_DATA_DIR`, else `$HOME/.spm`.
pub fn data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    resolve_data_dir(
        flag,
        std::env::var_os(DATA_DIR_ENV).map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

fn resolve_data_dir(flag: Option<PathBuf>, env: Option<PathBuf>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag.or(env).filter(|p| !p.as_os_str().is_empty()) {
        return Ok(dir);
    }
    home.map(|h| h.join(".spm"))
        .ok_or_else(|| Error::Config(format!("cannot find a data directory: set --data-dir or {DATA_DIR_ENV}")))
}
