//! Block dispatch with step recording.
//!
//! Leaf blocks get one step each. A condition block gets one step for its
//! own evaluation and then dispatches the chosen branch recursively,
//! stopping at the first failing child.

use futures::future::{BoxFuture, FutureExt};
use runbook_tools::block::ConditionConfig;
use runbook_tools::{Block, BlockResult, BlockSpec, ExecutionEnvironment, Executors};
use std::sync::Arc;
use uuid::Uuid;

use crate::condition::ConditionEvaluator;
use crate::error::EngineResult;
use crate::model::Step;
use crate::store::JobStore;

const EVALUATING: &str = "Evaluating condition...";

/// Routes blocks to executors and records their steps.
#[derive(Clone)]
pub struct BlockDispatcher {
    jobs: Arc<dyn JobStore>,
    executors: Arc<Executors>,
    conditions: ConditionEvaluator,
}

impl BlockDispatcher {
    pub fn new(jobs: Arc<dyn JobStore>, executors: Arc<Executors>) -> Self {
        Self {
            jobs,
            conditions: ConditionEvaluator::new(executors.clone()),
            executors,
        }
    }

    /// Dispatch one block. Returns whether it (and any branch it ran) succeeded.
    ///
    /// Errors are storage failures only; block failures come back as `false`.
    pub fn dispatch<'a>(
        &'a self,
        job_id: Uuid,
        block: &'a Block,
        environment: Option<&'a ExecutionEnvironment>,
    ) -> BoxFuture<'a, EngineResult<bool>> {
        async move {
            match &block.spec {
                BlockSpec::Condition(config) => {
                    self.dispatch_condition(job_id, block, config, environment)
                        .await
                }
                BlockSpec::Unknown { kind, .. } => {
                    tracing::warn!(%job_id, block_id = %block.id, kind = %kind, "Block type not yet supported, skipping");
                    Ok(true)
                }
                _ => self.dispatch_leaf(job_id, block, environment).await,
            }
        }
        .boxed()
    }

    async fn dispatch_leaf(
        &self,
        job_id: Uuid,
        block: &Block,
        environment: Option<&ExecutionEnvironment>,
    ) -> EngineResult<bool> {
        let mut step = Step::running(job_id, block.id, "");
        self.jobs.insert_step(&step).await?;

        let result = self.executors.execute(block, environment).await;
        let success = result.is_success();
        tracing::info!(
            %job_id,
            block_id = %block.id,
            kind = %block.kind(),
            status = %result.status,
            exit_code = result.exit_code,
            "Block finished"
        );

        step.finish(result);
        self.jobs.update_step(&step).await?;
        Ok(success)
    }

    async fn dispatch_condition(
        &self,
        job_id: Uuid,
        block: &Block,
        config: &ConditionConfig,
        environment: Option<&ExecutionEnvironment>,
    ) -> EngineResult<bool> {
        let mut step = Step::running(job_id, block.id, EVALUATING);
        self.jobs.insert_step(&step).await?;

        let outcome = self.conditions.evaluate(&config.predicate, environment).await;
        step.finish(BlockResult::success(outcome.step_output(), 0));
        self.jobs.update_step(&step).await?;

        let (branch, label) = if outcome.met {
            (&config.nested_blocks, "nested")
        } else {
            (&config.else_blocks, "else")
        };
        tracing::info!(
            %job_id,
            block_id = %block.id,
            met = outcome.met,
            branch = label,
            blocks = branch.len(),
            "Condition evaluated"
        );

        for child in branch {
            if !self.dispatch(job_id, child, environment).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
