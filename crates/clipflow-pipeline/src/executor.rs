//! Linear pipeline executor.
//!
//! Runs stages in index order for one subject, persisting progress after
//! every stage so an interrupted run resumes where it stopped:
//! - completed stages below the start index are skipped and their payloads
//!   are restored into the working state
//! - a stage whose output already exists is recorded without running
//! - the first failure is logged to the checkpoint and halts the run

use std::time::Instant;
use tracing::Instrument;

use clipflow_checkpoint::{CheckpointRecord, CheckpointStore, StageRegistry};

use crate::error::{PipelineError, PipelineResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::payload::StagePayload;
use crate::stages::StageHandler;
use crate::state::PipelineState;

/// How a run picks its starting point.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Explicit start index; defaults to the checkpoint's resume point
    pub start_stage: Option<usize>,
    /// Reset the checkpoint before running
    pub reset: bool,
}

/// What a run did.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Checkpoint as persisted at the end of the run
    pub checkpoint: CheckpointRecord,
    /// Stages whose handler ran (including the one that failed)
    pub executed: Vec<usize>,
    /// Stages below the start index
    pub skipped: Vec<usize>,
    /// Stages recorded from output an earlier stage already produced
    pub satisfied: Vec<usize>,
}

pub struct LinearPipeline {
    store: CheckpointStore,
    stages: Vec<Box<dyn StageHandler>>,
}

impl LinearPipeline {
    /// Create a pipeline. Stage indices must be unique.
    pub fn new(store: CheckpointStore, mut stages: Vec<Box<dyn StageHandler>>) -> PipelineResult<Self> {
        stages.sort_by_key(|s| s.index());
        if let Some(pair) = stages.windows(2).find(|w| w[0].index() == w[1].index()) {
            return Err(PipelineError::invalid_stages(format!(
                "stage index {} used by both '{}' and '{}'",
                pair[0].index(),
                pair[0].name(),
                pair[1].name()
            )));
        }
        Ok(Self { store, stages })
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Stage indices in execution order.
    pub fn indices(&self) -> Vec<usize> {
        self.stages.iter().map(|s| s.index()).collect()
    }

    /// Descriptors of every stage.
    pub fn registry(&self) -> PipelineResult<StageRegistry> {
        let registry = StageRegistry::from_descriptors(
            self.stages
                .iter()
                .map(|s| (s.index(), s.name(), s.description())),
        )?;
        Ok(registry)
    }

    /// Run the pipeline for the subject of `state`.
    ///
    /// Stage failures end up in `state.error` and the checkpoint's error log;
    /// only checkpoint persistence failures are returned as `Err`.
    pub async fn run(
        &self,
        state: &mut PipelineState,
        options: RunOptions,
    ) -> PipelineResult<PipelineOutcome> {
        let logger = RunLogger::new(&state.subject, "linear");
        let span = logger.create_span();
        self.run_inner(state, options, &logger).instrument(span).await
    }

    async fn run_inner(
        &self,
        state: &mut PipelineState,
        options: RunOptions,
        logger: &RunLogger,
    ) -> PipelineResult<PipelineOutcome> {
        let video = state.video_path.display().to_string();
        let mut record = self.store.open(&state.subject, &video).await;
        if options.reset {
            record = self.store.reset(&record).await?;
            logger.log_progress("checkpoint reset");
        }
        self.store.register(&mut record, &self.registry()?).await?;

        let start = options.start_stage.unwrap_or_else(|| record.next_stage());
        logger.log_start(&format!(
            "stage {} ({}), {} stage(s) already complete",
            start,
            record.stage_name(start),
            record.stages_completed.len()
        ));

        state.error = None;
        rehydrate(&record, state, start, logger);

        let mut executed = Vec::new();
        let mut skipped = Vec::new();
        let mut satisfied = Vec::new();

        for stage in &self.stages {
            let index = stage.index();
            let name = stage.name();

            if index < start {
                skipped.push(index);
                continue;
            }

            if let Some(payload) = stage.already_satisfied(state) {
                logger.log_progress(&format!("stage {} ({}) already satisfied", index, name));
                self.store
                    .mark_stage_complete(&mut record, index, name, Some(payload.to_value()?))
                    .await?;
                satisfied.push(index);
                continue;
            }

            logger.log_progress(&format!("running stage {} ({})", index, name));
            let started = Instant::now();
            let result = stage.execute(state).await;
            let elapsed = started.elapsed().as_secs_f64();
            executed.push(index);

            let error = match result {
                Ok(payload) if state.error.is_none() => {
                    metrics::record_stage(name, elapsed, true);
                    self.store
                        .mark_stage_complete(&mut record, index, name, Some(payload.to_value()?))
                        .await?;
                    continue;
                }
                Ok(_) => PipelineError::stage(state.error.clone().unwrap_or_default()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => e,
            };
            let failure = error.to_string();

            metrics::record_stage(name, elapsed, false);
            logger.log_error(&format!("stage {} ({}) failed: {}", index, name, failure));
            self.store
                .add_error(&mut record, index, name, &failure, false)
                .await?;
            state.error = Some(failure);
            break;
        }

        if state.error.is_none() {
            logger.log_completion(&format!(
                "{} executed, {} skipped, {} already satisfied",
                executed.len(),
                skipped.len(),
                satisfied.len()
            ));
        }

        Ok(PipelineOutcome {
            checkpoint: record,
            executed,
            skipped,
            satisfied,
        })
    }
}

/// Restore payloads of completed stages below `start` into `state`.
fn rehydrate(
    record: &CheckpointRecord,
    state: &mut PipelineState,
    start: usize,
    logger: &RunLogger,
) {
    for index in record.stages_completed.iter().copied().filter(|i| *i < start) {
        let Some(value) = record.stage_data(index) else {
            continue;
        };
        match StagePayload::from_value(value) {
            Ok(payload) => payload.apply_to(state),
            Err(e) => logger.log_warning(&format!(
                "ignoring undecodable payload of stage {}: {}",
                index, e
            )),
        }
    }
}
