use revenue_core::{error::Result, Stage};
use revenue_pipeline::Pipeline;

/// Runs a single stage to completion on the calling thread.
///
/// The engine calls this from a blocking task, one stage at a time, and never
/// calls a stage whose predecessor failed.
pub trait StageExecutor: Send + Sync + 'static {
    fn execute(&self, stage: Stage) -> Result<()>;
}

impl StageExecutor for Pipeline {
    fn execute(&self, stage: Stage) -> Result<()> {
        self.run_stage(stage).map(|_| ())
    }
}
