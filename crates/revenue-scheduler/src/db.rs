use revenue_core::Stage;
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use crate::{
    error::{Result, SchedulerError},
    types::{Job, Schedule, TaskRun, TaskStatus},
};

pub(crate) const JOB_SELECT_SQL: &str = "SELECT id, name, schedule, last_run, next_run,
        run_count, created_at, updated_at
 FROM jobs";

const TASK_RUN_SELECT_SQL: &str = "SELECT run_id, job_id, stage, attempt, status,
        error_code, error, started_at, finished_at
 FROM task_runs";

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `jobs` and `task_runs` tables (idempotent) plus the indexes
/// used by the polling and history queries.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id          TEXT    NOT NULL PRIMARY KEY,
            name        TEXT    NOT NULL UNIQUE,
            schedule    TEXT    NOT NULL,   -- JSON-encoded Schedule enum
            last_run    TEXT,               -- ISO-8601 or NULL
            next_run    TEXT,               -- ISO-8601 or NULL
            run_count   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        -- Efficient polling: SELECT … WHERE next_run <= ?
        CREATE INDEX IF NOT EXISTS idx_jobs_next_run ON jobs (next_run);

        CREATE TABLE IF NOT EXISTS task_runs (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id      TEXT    NOT NULL,
            job_id      TEXT    NOT NULL,
            stage       TEXT    NOT NULL,
            attempt     INTEGER NOT NULL,
            status      TEXT    NOT NULL,
            error_code  TEXT,
            error       TEXT,
            started_at  TEXT,
            finished_at TEXT
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_task_runs_run ON task_runs (run_id, id);
        ",
    )?;
    Ok(())
}

/// Map a row selected with `JOB_SELECT_SQL` to a [`Job`].
pub(crate) fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let schedule_json: String = row.get(2)?;
    let schedule: Schedule = serde_json::from_str(&schedule_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        schedule,
        last_run: row.get(3)?,
        next_run: row.get(4)?,
        run_count: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Like [`row_to_job`], but logs and skips a row whose schedule no longer
/// decodes instead of failing the whole query.
pub(crate) fn readable_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<Job>> {
    match row_to_job(row) {
        Ok(job) => Ok(Some(job)),
        Err(e) => {
            let id: String = row.get(0)?;
            warn!(job_id = %id, "skipping unreadable job row: {e}");
            Ok(None)
        }
    }
}

fn row_to_task_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRun> {
    use std::str::FromStr;
    let text_error = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
    };
    let stage = row
        .get::<_, String>(2)?
        .parse::<Stage>()
        .map_err(|e| text_error(2, e))?;
    let status = TaskStatus::from_str(&row.get::<_, String>(4)?).map_err(|e| text_error(4, e))?;
    Ok(TaskRun {
        run_id: row.get(0)?,
        job_id: row.get(1)?,
        stage,
        attempt: row.get(3)?,
        status,
        error_code: row.get(5)?,
        error: row.get(6)?,
        started_at: row.get(7)?,
        finished_at: row.get(8)?,
    })
}

pub(crate) fn schedule_json(schedule: &Schedule) -> Result<String> {
    serde_json::to_string(schedule).map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))
}

/// All jobs, oldest first. Rows with an unreadable schedule are logged and
/// skipped.
pub fn list_jobs(conn: &Connection) -> Result<Vec<Job>> {
    let mut stmt = conn.prepare(&format!("{JOB_SELECT_SQL} ORDER BY created_at"))?;
    let jobs = stmt
        .query_map([], readable_job)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(jobs.into_iter().flatten().collect())
}

pub fn find_job(conn: &Connection, name: &str) -> Result<Option<Job>> {
    let job = conn
        .query_row(
            &format!("{JOB_SELECT_SQL} WHERE name = ?1"),
            [name],
            row_to_job,
        )
        .optional()?;
    Ok(job)
}

/// The most recent `limit` task attempts, newest first.
pub fn recent_task_runs(conn: &Connection, limit: usize) -> Result<Vec<TaskRun>> {
    let mut stmt = conn.prepare(&format!("{TASK_RUN_SELECT_SQL} ORDER BY id DESC LIMIT ?1"))?;
    let runs = stmt
        .query_map([limit as i64], row_to_task_run)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(runs)
}

/// Every task attempt of one run, in execution order.
pub fn task_runs_for(conn: &Connection, run_id: &str) -> Result<Vec<TaskRun>> {
    let mut stmt = conn.prepare(&format!("{TASK_RUN_SELECT_SQL} WHERE run_id = ?1 ORDER BY id"))?;
    let runs = stmt
        .query_map([run_id], row_to_task_run)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(runs)
}
