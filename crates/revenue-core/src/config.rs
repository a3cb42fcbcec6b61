use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHART_TITLE: &str = "Daily sales revenue";
pub const DEFAULT_CHART_WIDTH: u32 = 1200;
pub const DEFAULT_CHART_HEIGHT: u32 = 600;
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 120;

/// Top-level config (revenue.toml + REVENUE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevenueConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// The relational store holding `orders`, `order_details` and `products`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
        }
    }
}

/// Fixed locations of the two snapshots and the rendered chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_raw_snapshot")]
    pub raw_snapshot: PathBuf,
    #[serde(default = "default_revenue_snapshot")]
    pub revenue_snapshot: PathBuf,
    #[serde(default = "default_chart_path")]
    pub chart: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            raw_snapshot: default_raw_snapshot(),
            revenue_snapshot: default_revenue_snapshot(),
            chart: default_chart_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_chart_title")]
    pub title: String,
    #[serde(default = "default_chart_width")]
    pub width: u32,
    #[serde(default = "default_chart_height")]
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: default_chart_title(),
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
        }
    }
}

/// Daily cadence (UTC) and the retry policy applied to each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub hour: u8,
    #[serde(default)]
    pub minute: u8,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: 0,
            minute: 0,
            retries: DEFAULT_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

/// Scheduler state (jobs and task history), separate from the sales source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_chart_title() -> String {
    DEFAULT_CHART_TITLE.to_string()
}
fn default_chart_width() -> u32 {
    DEFAULT_CHART_WIDTH
}
fn default_chart_height() -> u32 {
    DEFAULT_CHART_HEIGHT
}
fn default_retries() -> u32 {
    DEFAULT_RETRIES
}
fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}
fn default_source_path() -> PathBuf {
    home_dir().join("sales.db")
}
fn default_raw_snapshot() -> PathBuf {
    home_dir().join("data").join("daily_sales.csv")
}
fn default_revenue_snapshot() -> PathBuf {
    home_dir().join("data").join("daily_revenue.csv")
}
fn default_chart_path() -> PathBuf {
    home_dir().join("images").join("daily_revenue.svg")
}
fn default_db_path() -> PathBuf {
    home_dir().join("scheduler.db")
}

fn home_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".daily-revenue")
}

impl RevenueConfig {
    /// Load config from a TOML file with REVENUE_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g. `REVENUE_SCHEDULE__HOUR=6`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&Path>) -> crate::error::Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| home_dir().join("revenue.toml"));

        let config: RevenueConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("REVENUE_").split("__"))
            .extract()
            .map_err(|e| crate::error::RevenueError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// A config whose source, snapshots, chart and scheduler state all live
    /// under `root`, using the default file names.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            source: SourceConfig {
                path: root.join("sales.db"),
            },
            output: OutputConfig {
                raw_snapshot: root.join("data").join("daily_sales.csv"),
                revenue_snapshot: root.join("data").join("daily_revenue.csv"),
                chart: root.join("images").join("daily_revenue.svg"),
            },
            chart: ChartConfig::default(),
            schedule: ScheduleConfig::default(),
            database: DatabaseConfig {
                path: root.join("scheduler.db"),
            },
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::RevenueError;

        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            return Err(RevenueError::Config(format!(
                "schedule time {:02}:{:02} is out of range",
                self.schedule.hour, self.schedule.minute
            )));
        }
        if self.chart.width == 0 || self.chart.height == 0 {
            return Err(RevenueError::Config(
                "chart dimensions must be non-zero".to_string(),
            ));
        }
        let out = &self.output;
        if out.raw_snapshot == out.revenue_snapshot
            || out.raw_snapshot == out.chart
            || out.revenue_snapshot == out.chart
        {
            return Err(RevenueError::Config(
                "snapshot and chart paths must be distinct".to_string(),
            ));
        }
        Ok(())
    }
}
