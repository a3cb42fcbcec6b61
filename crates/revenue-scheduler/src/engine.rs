use std::sync::Arc;

use chrono::{DateTime, Utc};
use revenue_core::{RunState, Stage};
use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::{self, init_db, readable_job, schedule_json, JOB_SELECT_SQL},
    error::{Result, SchedulerError},
    executor::StageExecutor,
    schedule::compute_next_run,
    types::{Job, RetryPolicy, RunOutcome, Schedule, TaskRun, TaskStatus},
};

/// Drives pipeline runs on a schedule and records every stage attempt in SQLite.
///
/// Runs execute inline in the polling loop, so at most one run is ever in
/// flight per engine.
pub struct SchedulerEngine<E: StageExecutor> {
    conn: Connection,
    executor: Arc<E>,
    policy: RetryPolicy,
}

impl<E: StageExecutor> SchedulerEngine<E> {
    /// Create a new engine, initialising the DB schema if needed.
    pub fn new(conn: Connection, executor: Arc<E>, policy: RetryPolicy) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn,
            executor,
            policy,
        })
    }

    /// Register `name` with `schedule`, replacing any previous schedule.
    ///
    /// `next_run` is always recomputed from now: windows missed while the
    /// engine was down are not caught up.
    pub fn register(&self, name: &str, schedule: Schedule) -> Result<Job> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next = compute_next_run(&schedule, now).map(|dt| dt.to_rfc3339());
        let id = Uuid::new_v4().to_string();
        let schedule_json = schedule_json(&schedule)?;

        self.conn.execute(
            "INSERT INTO jobs (id, name, schedule, last_run, next_run, run_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, 0, ?5, ?5)
             ON CONFLICT(name) DO UPDATE SET
                schedule = excluded.schedule,
                next_run = excluded.next_run,
                updated_at = excluded.updated_at",
            rusqlite::params![id, name, schedule_json, next, now_str],
        )?;

        let job = db::find_job(&self.conn, name)?.ok_or_else(|| SchedulerError::JobNotFound {
            name: name.to_string(),
        })?;
        info!(job_id = %job.id, %name, next_run = ?job.next_run, "job registered");
        Ok(job)
    }

    /// Return all known jobs ordered by creation time.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        db::list_jobs(&self.conn)
    }

    /// The most recent `limit` task attempts, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<TaskRun>> {
        db::recent_task_runs(&self.conn, limit)
    }

    /// Start a run of `name` immediately, outside its schedule.
    pub async fn trigger(&mut self, name: &str) -> Result<RunOutcome> {
        let job = db::find_job(&self.conn, name)?.ok_or_else(|| SchedulerError::JobNotFound {
            name: name.to_string(),
        })?;
        self.mark_started(&job, Utc::now(), job.next_run.clone())?;
        self.run_job(&job).await
    }

    /// Main event loop. Polls every second until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        self.skip_missed_on_startup();

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Execute every stage of one run in order.
    ///
    /// Each stage gets `policy.max_attempts()` tries; once a stage gives up,
    /// the remaining stages are recorded as `upstream_failed` without running.
    pub async fn run_job(&mut self, job: &Job) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let mut state = RunState::NotStarted;
        info!(job_id = %job.id, name = %job.name, %run_id, "run started");

        for stage in Stage::ALL {
            if let RunState::Failed { .. } = state {
                let status = TaskStatus::UpstreamFailed;
                self.insert_task_run(&run_id, &job.id, stage, 0, status, None)?;
                continue;
            }
            state = if self.execute_with_retry(&run_id, &job.id, stage).await? {
                RunState::completed(stage)
            } else {
                RunState::Failed { stage }
            };
        }

        match state {
            RunState::Done => info!(%run_id, "run succeeded"),
            other => warn!(%run_id, state = %other, "run failed"),
        }
        Ok(RunOutcome { run_id, state })
    }

    // --- private helpers ---------------------------------------------------

    /// Returns `Ok(false)` once the stage has exhausted its attempts.
    async fn execute_with_retry(
        &mut self,
        run_id: &str,
        job_id: &str,
        stage: Stage,
    ) -> Result<bool> {
        let max_attempts = self.policy.max_attempts();
        for attempt in 1..=max_attempts {
            let started = Utc::now().to_rfc3339();
            let row_id = self.insert_task_run(
                run_id,
                job_id,
                stage,
                attempt,
                TaskStatus::Running,
                Some(&started),
            )?;
            info!(%run_id, task = stage.task_id(), attempt, "task started");

            let executor = Arc::clone(&self.executor);
            let result = tokio::task::spawn_blocking(move || executor.execute(stage)).await;
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some((e.code().to_string(), e.to_string())),
                Err(e) => Some(("TASK_PANICKED".to_string(), e.to_string())),
            };

            let Some((code, message)) = failure else {
                self.finish_task_run(row_id, TaskStatus::Success, None)?;
                info!(%run_id, task = stage.task_id(), attempt, "task succeeded");
                return Ok(true);
            };

            if attempt == max_attempts {
                let failure = Some((code.as_str(), message.as_str()));
                self.finish_task_run(row_id, TaskStatus::Failed, failure)?;
                error!(%run_id, task = stage.task_id(), attempt, %code, "task failed: {message}");
                return Ok(false);
            }

            let failure = Some((code.as_str(), message.as_str()));
            self.finish_task_run(row_id, TaskStatus::UpForRetry, failure)?;
            warn!(
                %run_id,
                task = stage.task_id(),
                attempt,
                %code,
                retry_in_secs = self.policy.delay.as_secs(),
                "task failed, will retry: {message}"
            );
            tokio::time::sleep(self.policy.delay).await;
        }
        Ok(false)
    }

    fn insert_task_run(
        &self,
        run_id: &str,
        job_id: &str,
        stage: Stage,
        attempt: u32,
        status: TaskStatus,
        started_at: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO task_runs (run_id, job_id, stage, attempt, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                run_id,
                job_id,
                stage.to_string(),
                attempt,
                status.to_string(),
                started_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_task_run(
        &self,
        row_id: i64,
        status: TaskStatus,
        failure: Option<(&str, &str)>,
    ) -> Result<()> {
        let (code, message) = failure.unzip();
        self.conn.execute(
            "UPDATE task_runs SET status = ?1, error_code = ?2, error = ?3, finished_at = ?4
             WHERE id = ?5",
            rusqlite::params![
                status.to_string(),
                code,
                message,
                Utc::now().to_rfc3339(),
                row_id
            ],
        )?;
        Ok(())
    }

    fn mark_started(&self, job: &Job, now: DateTime<Utc>, next: Option<String>) -> Result<()> {
        let now_str = now.to_rfc3339();
        self.conn.execute(
            "UPDATE jobs SET last_run = ?1, next_run = ?2, run_count = run_count + 1, updated_at = ?1
             WHERE id = ?3",
            rusqlite::params![now_str, next, job.id],
        )?;
        Ok(())
    }

    /// On startup, move every overdue `next_run` forward instead of firing it.
    fn skip_missed_on_startup(&mut self) {
        let now = Utc::now();
        let overdue = match self.due_jobs(now) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("missed-on-startup query failed: {e}");
                return;
            }
        };
        for job in overdue {
            let next = compute_next_run(&job.schedule, now).map(|dt| dt.to_rfc3339());
            warn!(
                job_id = %job.id,
                name = %job.name,
                missed = ?job.next_run,
                next_run = ?next,
                "skipping missed window"
            );
            if let Err(e) = self.conn.execute(
                "UPDATE jobs SET next_run = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![next, now.to_rfc3339(), job.id],
            ) {
                error!(job_id = %job.id, "failed to reschedule missed job: {e}");
            }
        }
    }

    fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{JOB_SELECT_SQL} WHERE next_run IS NOT NULL AND next_run <= ?1 ORDER BY next_run"
        ))?;
        let jobs = stmt
            .query_map([now.to_rfc3339()], readable_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs.into_iter().flatten().collect())
    }

    /// Start every job whose next_run has arrived.
    async fn tick(&mut self) -> Result<()> {
        let now = Utc::now();
        for job in self.due_jobs(now)? {
            let next = compute_next_run(&job.schedule, now).map(|dt| dt.to_rfc3339());
            self.mark_started(&job, now, next.clone())?;
            info!(job_id = %job.id, name = %job.name, next_run = ?next, "executing job");
            self.run_job(&job).await?;
        }
        Ok(())
    }
}
