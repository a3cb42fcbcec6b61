use std::path::PathBuf;

use revenue_core::{
    config::RevenueConfig,
    error::RevenueError,
    types::{RunState, Stage},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::{aggregate, extract, render};

/// What a single stage produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    /// Rows written to the raw snapshot.
    Extracted(usize),
    /// Days written to the revenue snapshot.
    Aggregated(usize),
    /// Path of the rendered chart.
    Rendered(PathBuf),
}

/// A stage failed; nothing downstream of it ran.
#[derive(Debug, Error)]
#[error("{} failed: {error}", .stage.task_id())]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: RevenueError,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub rows_extracted: usize,
    pub days_aggregated: usize,
    pub chart_path: Option<PathBuf>,
}

/// The extract → aggregate → render job bound to one configuration.
///
/// Stages only communicate through the snapshot files named in the config.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: RevenueConfig,
}

impl Pipeline {
    pub fn new(config: RevenueConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RevenueConfig {
        &self.config
    }

    /// Run exactly one stage against whatever its input file holds now.
    pub fn run_stage(&self, stage: Stage) -> Result<StageOutput, RevenueError> {
        match stage {
            Stage::Extract => extract::fetch_order_data(&self.config).map(StageOutput::Extracted),
            Stage::Aggregate => {
                aggregate::process_daily_revenue(&self.config).map(StageOutput::Aggregated)
            }
            Stage::Render => render::plot_daily_revenue(&self.config).map(StageOutput::Rendered),
        }
    }

    /// Run all three stages in order, stopping at the first failure.
    ///
    /// There is no resume: a failed run starts again from extraction.
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<RunReport, StageFailure> {
        let mut report = RunReport::default();
        for stage in Stage::ALL {
            report.state = RunState::running(stage);
            info!(state = %report.state, task = stage.task_id(), "stage started");

            match self.run_stage(stage) {
                Ok(output) => {
                    match output {
                        StageOutput::Extracted(n) => report.rows_extracted = n,
                        StageOutput::Aggregated(n) => report.days_aggregated = n,
                        StageOutput::Rendered(path) => report.chart_path = Some(path),
                    }
                    report.state = RunState::completed(stage);
                }
                Err(e) => {
                    report.state = RunState::Failed { stage };
                    error!(state = %report.state, code = e.code(), "stage failed: {e}");
                    return Err(StageFailure { stage, error: e });
                }
            }
        }
        info!(
            rows = report.rows_extracted,
            days = report.days_aggregated,
            "pipeline run complete"
        );
        Ok(report)
    }
}
