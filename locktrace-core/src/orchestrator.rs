// Drives a WorkflowState through its phases against the reasoning service

use crate::error::LocktraceError;
use crate::frontier::pending_ids;
use crate::graph::ExecutionPlan;
use crate::model::{Endpoint, Outcome};
use crate::normalize::normalize_entries;
use crate::prompts::{analysis_prompt, endpoint_prompt, synthesis_prompt};
use crate::workflow::{
    Artifact, EndpointResult, Phase, StateDelta, Transition, WorkflowState, decide,
};
use futures::future::join_all;
use locktrace_reasoning::{Prompt, ReasoningClient, ReasoningServiceError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

pub const MAX_BATCH_SIZE: usize = 25;
pub const DEFAULT_ARTIFACT_PATH: &str = "./forged-integration.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontierMode {
    /// One endpoint per frontier pass
    SingleStep,
    /// Up to the given number of endpoints per pass, concurrently. `None`
    /// takes the whole frontier, capped at [`MAX_BATCH_SIZE`].
    Batch(Option<usize>),
}

impl FrontierMode {
    pub fn batch_size(&self, frontier_len: usize) -> usize {
        match self {
            FrontierMode::SingleStep => 1,
            FrontierMode::Batch(Some(size)) => (*size).clamp(1, MAX_BATCH_SIZE),
            FrontierMode::Batch(None) => frontier_len.clamp(1, MAX_BATCH_SIZE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub mode: FrontierMode,
    pub artifact_path: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: FrontierMode::Batch(None),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_mode(mut self, mode: FrontierMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }
}

pub struct Orchestrator {
    client: Arc<ReasoningClient>,
    config: OrchestratorConfig,
    progress_callback: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(client: Arc<ReasoningClient>, config: OrchestratorConfig) -> Self {
        Self {
            client,
            config,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn report(&self, message: String) {
        debug!("{}", message);
        if let Some(ref callback) = self.progress_callback {
            callback(message);
        }
    }

    /// Runs transitions until the workflow is finished.
    ///
    /// Nothing past trace loading is fatal: reasoning and write failures end
    /// up in the state's warnings.
    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        info!("Starting workflow for \"{}\"", state.target());
        while decide(&state) != Transition::Finished {
            state = self.step(state).await;
        }
        state
    }

    /// Applies exactly one transition.
    pub async fn step(&self, state: WorkflowState) -> WorkflowState {
        match decide(&state) {
            Transition::Analyze => self.analyze(state).await,
            Transition::BuildGraph => self.build_graph(state),
            Transition::ProcessFrontier => self.process_frontier(state).await,
            Transition::Synthesize => self.synthesize(state).await,
            Transition::Complete => self.complete(state),
            Transition::Finished => state,
        }
    }

    pub async fn analyze(&self, state: WorkflowState) -> WorkflowState {
        let normalized = normalize_entries(state.entries());
        self.report(format!(
            "Analyzed {} requests, kept {}",
            normalized.summary.total, normalized.summary.kept
        ));

        let mut delta = StateDelta::to(Phase::Analyzed)
            .request_count(state.request_count())
            .warnings(normalized.summary.diagnostics.iter().map(ToString::to_string));

        if !normalized.endpoints.is_empty() {
            let prompt = analysis_prompt(state.target(), &normalized.endpoints);
            match self.client.invoke(&prompt).await {
                Ok(invocation) => delta = delta.analysis(invocation.content),
                Err(e) => {
                    warn!("Trace analysis failed: {}", e);
                    delta = delta.warning(format!("Trace analysis failed: {}", e));
                }
            }
        }

        state.advance(delta.endpoints(normalized.endpoints))
    }

    pub fn build_graph(&self, state: WorkflowState) -> WorkflowState {
        let plan = ExecutionPlan::build(state.endpoints().to_vec());
        let master = plan.select_master(state.target()).map(|endpoint| endpoint.id);
        let frontier = pending_ids(&plan);

        match master.and_then(|id| plan.get(id)) {
            Some(endpoint) => info!("Master endpoint: {}", endpoint.name()),
            None => info!("No master endpoint found"),
        }
        self.report(format!(
            "Built plan with {} endpoints and {} edges, {} ready",
            plan.len(),
            plan.edges().len(),
            frontier.len()
        ));

        state.advance(
            StateDelta::to(Phase::GraphBuilt)
                .plan(plan)
                .master(master)
                .frontier(frontier),
        )
    }

    /// Processes one batch of the frontier and consumes one step.
    ///
    /// Each endpoint goes through its own retrying invocation, so a failure
    /// only marks that endpoint completed-with-error.
    pub async fn process_frontier(&self, state: WorkflowState) -> WorkflowState {
        let mut plan = state.plan().clone();
        let size = self.config.mode.batch_size(state.frontier().len());
        let batch: Vec<usize> = state.frontier().iter().copied().take(size).collect();

        self.report(format!(
            "Step {}/{}: processing {} of {} ready endpoints",
            state.steps_taken() + 1,
            state.max_steps(),
            batch.len(),
            state.frontier().len()
        ));

        let prompts: Vec<(usize, Prompt)> = batch
            .iter()
            .filter_map(|&id| plan.get(id).map(|endpoint| (id, self.prompt_for(&state, &plan, endpoint))))
            .collect();

        let invocations = join_all(prompts.iter().map(|(_, prompt)| self.client.invoke(prompt))).await;

        let mut results = Vec::with_capacity(prompts.len());
        let mut warnings = Vec::new();

        for ((id, _), invocation) in prompts.iter().zip(invocations) {
            let Some(endpoint) = plan.get(*id) else {
                continue;
            };

            let result = match invocation {
                Ok(invocation) => {
                    debug!("Endpoint {} answered by {}", endpoint.name(), invocation.model);
                    EndpointResult::for_endpoint(endpoint, Outcome::Extracted(invocation.content))
                        .answered_by(
                            invocation.model,
                            invocation.attempts,
                            invocation.switched_to_fallback,
                        )
                }
                Err(e) => {
                    warn!("Endpoint {} failed: {}", endpoint.name(), e);
                    warnings.push(format!("Endpoint {} failed: {}", endpoint.name(), e));
                    let mut result =
                        EndpointResult::for_endpoint(endpoint, Outcome::Failed(e.to_string()));
                    if let ReasoningServiceError::Exhausted { attempts, .. } = e {
                        result.attempts = attempts;
                    }
                    result
                }
            };

            plan.mark_completed(*id, result.outcome.clone());
            results.push(result);
        }

        let frontier = pending_ids(&plan);
        let completed = plan.statistics().completed;
        self.report(format!(
            "Completed {}/{} endpoints, {} ready",
            completed,
            plan.len(),
            frontier.len()
        ));

        state.advance(
            StateDelta::to(Phase::ProcessingFrontier)
                .plan(plan)
                .frontier(frontier)
                .results(results)
                .warnings(warnings)
                .consume_step(),
        )
    }

    fn prompt_for(&self, state: &WorkflowState, plan: &ExecutionPlan, endpoint: &Endpoint) -> Prompt {
        let prerequisites: Vec<(&Endpoint, &Outcome)> = plan
            .prerequisites_of(endpoint.id)
            .into_iter()
            .filter_map(|id| plan.get(id))
            .filter_map(|prerequisite| prerequisite.outcome().map(|outcome| (prerequisite, outcome)))
            .collect();

        endpoint_prompt(
            state.target(),
            endpoint,
            &prerequisites,
            state.variables(),
            state.credential_hints(),
        )
    }

    pub async fn synthesize(&self, state: WorkflowState) -> WorkflowState {
        self.report("Synthesizing integration code".to_string());

        let plan = state.plan();
        let completed: Vec<&Endpoint> = plan
            .topological_order()
            .into_iter()
            .filter_map(|id| plan.get(id))
            .filter(|endpoint| endpoint.is_completed())
            .collect();

        let prompt = synthesis_prompt(state.target(), state.master(), &completed, state.variables());
        let mut delta = StateDelta::to(Phase::ArtifactSynthesized);

        match self.client.invoke(&prompt).await {
            Ok(invocation) => {
                let path = &self.config.artifact_path;
                match write_artifact(path, &invocation.content).await {
                    Ok(()) => {
                        info!("Integration code written to {}", path.display());
                        delta = delta.artifact(Artifact {
                            content: invocation.content,
                            path: Some(path.clone()),
                        });
                    }
                    Err(e) => {
                        warn!("{}", e);
                        delta = delta.warning(e.to_string()).artifact(Artifact {
                            content: invocation.content,
                            path: None,
                        });
                    }
                }
            }
            Err(e) => {
                warn!("Synthesis failed: {}", e);
                delta = delta.warning(format!("Synthesis failed: {}", e));
            }
        }

        state.advance(delta)
    }

    pub fn complete(&self, state: WorkflowState) -> WorkflowState {
        let status = state.completion_status();
        let stats = state.plan().statistics();
        info!(
            "Workflow {}: {}/{} endpoints completed ({} failed) in {} steps",
            status.as_str(),
            stats.completed,
            stats.total,
            stats.failed,
            state.steps_taken()
        );
        self.report(format!("Workflow {}", status.as_str()));

        state.advance(StateDelta::to(Phase::Complete).status(status))
    }
}

async fn write_artifact(path: &Path, content: &str) -> Result<(), LocktraceError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|error| LocktraceError::ArtifactWrite {
            path: path.to_path_buf(),
            error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_defaults_to_frontier() {
        assert_eq!(FrontierMode::Batch(None).batch_size(7), 7);
        assert_eq!(FrontierMode::Batch(None).batch_size(40), MAX_BATCH_SIZE);
    }

    #[test]
    fn test_configured_batch_size_is_clamped() {
        assert_eq!(FrontierMode::Batch(Some(0)).batch_size(3), 1);
        assert_eq!(FrontierMode::Batch(Some(100)).batch_size(3), MAX_BATCH_SIZE);
        assert_eq!(FrontierMode::SingleStep.batch_size(10), 1);
    }

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.mode, FrontierMode::Batch(None));
        assert_eq!(config.artifact_path, PathBuf::from("./forged-integration.js"));
    }
}
