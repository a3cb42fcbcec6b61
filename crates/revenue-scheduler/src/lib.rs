//! `revenue-scheduler` — runs the daily revenue pipeline on a schedule with
//! per-stage retries, persisting job state and task history to SQLite.
//!
//! # Overview
//!
//! A job is a named pipeline with a [`Schedule`]. The
//! [`engine::SchedulerEngine`] polls the `jobs` table every second and, when a
//! job's `next_run` arrives, executes its stages in order through a
//! [`StageExecutor`]. Every attempt is written to `task_runs`.
//!
//! | Setting       | Default   | Behaviour                                   |
//! |---------------|-----------|---------------------------------------------|
//! | `Daily`       | 00:00 UTC | One run per day                             |
//! | `retries`     | 1         | Extra attempts for a failing stage          |
//! | `retry_delay` | 120 s     | Pause between attempts                      |
//! | catch-up      | off       | Windows missed while offline are skipped    |

pub mod db;
pub mod engine;
pub mod error;
pub mod executor;
pub mod schedule;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use executor::StageExecutor;
pub use types::{Job, RetryPolicy, RunOutcome, Schedule, TaskRun, TaskStatus};

/// Job name the pipeline is registered under.
pub const PIPELINE_JOB_NAME: &str = "daily_sales_revenue";
