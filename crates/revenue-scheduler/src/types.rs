use std::time::Duration;

use chrono::{DateTime, Utc};
use revenue_core::{config::ScheduleConfig, types::RunState, Stage};
use serde::{Deserialize, Serialize};

/// Defines when and how often a job should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run exactly once at the given UTC instant.
    Once { at: DateTime<Utc> },

    /// Run repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },

    /// Run every day at the given hour and minute (UTC).
    Daily { hour: u8, minute: u8 },
}

impl Schedule {
    pub fn daily(config: &ScheduleConfig) -> Self {
        Schedule::Daily {
            hour: config.hour,
            minute: config.minute,
        }
    }
}

/// How a failed stage is retried before the run is given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for RetryPolicy {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            retries: config.retries,
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Outcome of one attempt at one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Attempt in progress.
    Running,
    /// Stage finished and its output is in place.
    Success,
    /// Attempt failed; another attempt follows after the retry delay.
    UpForRetry,
    /// Final attempt failed; the run stops here.
    Failed,
    /// Never started because an earlier stage failed.
    UpstreamFailed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::UpForRetry => "up_for_retry",
            TaskStatus::Failed => "failed",
            TaskStatus::UpstreamFailed => "upstream_failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskStatus::Running),
            "success" => Ok(TaskStatus::Success),
            "up_for_retry" => Ok(TaskStatus::UpForRetry),
            "failed" => Ok(TaskStatus::Failed),
            "upstream_failed" => Ok(TaskStatus::UpstreamFailed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A persisted job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// UUID v4 string — primary key.
    pub id: String,
    /// Unique human-readable label, e.g. `daily_sales_revenue`.
    pub name: String,
    pub schedule: Schedule,
    /// ISO-8601 timestamp of the most recent run start, if any.
    pub last_run: Option<String>,
    /// ISO-8601 timestamp of the next planned run, if any.
    pub next_run: Option<String>,
    /// Total number of runs started.
    pub run_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// One attempt of one stage within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub run_id: String,
    pub job_id: String,
    pub stage: Stage,
    /// 1-based attempt number; 0 for stages that never started.
    pub attempt: u32,
    pub status: TaskStatus,
    pub error_code: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Final state of a run driven by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub state: RunState,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done
    }
}
