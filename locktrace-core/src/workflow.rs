//! Workflow state and the decision function that drives it.
//!
//! [`WorkflowState`] is never mutated in place: every phase produces a
//! [`StateDelta`] and [`WorkflowState::advance`] builds the next state from
//! it. [`decide`] looks only at the state, so the next transition can always
//! be re-derived from a snapshot.

use crate::frontier;
use crate::graph::ExecutionPlan;
use crate::model::{Endpoint, Outcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_MAX_STEPS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialized,
    Analyzed,
    GraphBuilt,
    ProcessingFrontier,
    ArtifactSynthesized,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initialized => "initialized",
            Phase::Analyzed => "analyzed",
            Phase::GraphBuilt => "graph_built",
            Phase::ProcessingFrontier => "processing_frontier",
            Phase::ArtifactSynthesized => "artifact_synthesized",
            Phase::Complete => "complete",
        }
    }
}

/// What the orchestrator should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Analyze,
    BuildGraph,
    ProcessFrontier,
    Synthesize,
    Complete,
    /// The run is over
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    Partial,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Complete => "complete",
            CompletionStatus::Partial => "partial",
        }
    }
}

/// Outcome of processing one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointResult {
    pub endpoint_id: usize,
    pub name: String,
    pub method: String,
    pub url: String,
    pub difficulty: u8,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub attempts: u32,
    pub fallback_used: bool,
}

impl EndpointResult {
    pub fn for_endpoint(endpoint: &Endpoint, outcome: Outcome) -> Self {
        Self {
            endpoint_id: endpoint.id,
            name: endpoint.name(),
            method: endpoint.method.clone(),
            url: endpoint.url.clone(),
            difficulty: endpoint.difficulty(),
            outcome,
            model: None,
            attempts: 0,
            fallback_used: false,
        }
    }

    pub fn answered_by(mut self, model: String, attempts: u32, fallback_used: bool) -> Self {
        self.model = Some(model);
        self.attempts = attempts;
        self.fallback_used = fallback_used;
        self
    }
}

/// Generated integration code and where it was written, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub content: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WorkflowState {
    target: String,
    variables: BTreeMap<String, String>,
    credential_hints: Vec<String>,
    max_steps: usize,
    synthesize: bool,
    phase: Phase,
    entries: Vec<Value>,
    endpoints: Vec<Endpoint>,
    request_count: usize,
    analysis: Option<String>,
    plan: ExecutionPlan,
    master: Option<usize>,
    frontier: Vec<usize>,
    results: Vec<EndpointResult>,
    steps_taken: usize,
    artifact: Option<Artifact>,
    warnings: Vec<String>,
    status: Option<CompletionStatus>,
}

impl WorkflowState {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            variables: BTreeMap::new(),
            credential_hints: Vec::new(),
            max_steps: DEFAULT_MAX_STEPS,
            synthesize: false,
            phase: Phase::Initialized,
            entries: Vec::new(),
            endpoints: Vec::new(),
            request_count: 0,
            analysis: None,
            plan: ExecutionPlan::default(),
            master: None,
            frontier: Vec::new(),
            results: Vec::new(),
            steps_taken: 0,
            artifact: None,
            warnings: Vec::new(),
            status: None,
        }
    }

    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_credential_hints(mut self, hints: Vec<String>) -> Self {
        self.credential_hints = hints;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_synthesis(mut self, synthesize: bool) -> Self {
        self.synthesize = synthesize;
        self
    }

    /// Raw trace entries to analyze. Also sets the request count.
    pub fn with_entries(mut self, entries: Vec<Value>) -> Self {
        self.request_count = entries.len();
        self.entries = entries;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Builds the successor state. Fields absent from `delta` carry over;
    /// results and warnings are appended.
    pub fn advance(self, delta: StateDelta) -> Self {
        let mut results = self.results;
        results.extend(delta.results);
        let mut warnings = self.warnings;
        warnings.extend(delta.warnings);

        Self {
            target: self.target,
            variables: self.variables,
            credential_hints: self.credential_hints,
            max_steps: self.max_steps,
            synthesize: self.synthesize,
            phase: delta.phase,
            entries: self.entries,
            endpoints: delta.endpoints.unwrap_or(self.endpoints),
            request_count: delta.request_count.unwrap_or(self.request_count),
            analysis: delta.analysis.or(self.analysis),
            plan: delta.plan.unwrap_or(self.plan),
            master: delta.master.unwrap_or(self.master),
            frontier: delta.frontier.unwrap_or(self.frontier),
            results,
            steps_taken: self.steps_taken + delta.steps,
            artifact: delta.artifact.or(self.artifact),
            warnings,
            status: delta.status.or(self.status),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn credential_hints(&self) -> &[String] {
        &self.credential_hints
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn synthesis_requested(&self) -> bool {
        self.synthesize
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    /// Normalized endpoints, available once the trace has been analyzed.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn request_count(&self) -> usize {
        self.request_count
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn master(&self) -> Option<&Endpoint> {
        self.master.and_then(|id| self.plan.get(id))
    }

    pub fn master_id(&self) -> Option<usize> {
        self.master
    }

    pub fn frontier(&self) -> &[usize] {
        &self.frontier
    }

    pub fn results(&self) -> &[EndpointResult] {
        &self.results
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn status(&self) -> Option<CompletionStatus> {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// `Complete` when every endpoint of the plan has an outcome.
    pub fn completion_status(&self) -> CompletionStatus {
        if self.plan.endpoints().iter().all(Endpoint::is_completed) {
            CompletionStatus::Complete
        } else {
            CompletionStatus::Partial
        }
    }

    /// Frontier recomputed from the plan, for use after completions.
    pub fn current_frontier(&self) -> Vec<usize> {
        frontier::pending_ids(&self.plan)
    }
}

/// Changes produced by one phase.
#[derive(Debug, Clone)]
pub struct StateDelta {
    phase: Phase,
    endpoints: Option<Vec<Endpoint>>,
    request_count: Option<usize>,
    analysis: Option<String>,
    plan: Option<ExecutionPlan>,
    master: Option<Option<usize>>,
    frontier: Option<Vec<usize>>,
    results: Vec<EndpointResult>,
    steps: usize,
    artifact: Option<Artifact>,
    warnings: Vec<String>,
    status: Option<CompletionStatus>,
}

impl StateDelta {
    pub fn to(phase: Phase) -> Self {
        Self {
            phase,
            endpoints: None,
            request_count: None,
            analysis: None,
            plan: None,
            master: None,
            frontier: None,
            results: Vec::new(),
            steps: 0,
            artifact: None,
            warnings: Vec::new(),
            status: None,
        }
    }

    pub fn endpoints(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn request_count(mut self, count: usize) -> Self {
        self.request_count = Some(count);
        self
    }

    pub fn analysis(mut self, analysis: String) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn plan(mut self, plan: ExecutionPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn master(mut self, master: Option<usize>) -> Self {
        self.master = Some(master);
        self
    }

    pub fn frontier(mut self, frontier: Vec<usize>) -> Self {
        self.frontier = Some(frontier);
        self
    }

    pub fn results(mut self, results: Vec<EndpointResult>) -> Self {
        self.results.extend(results);
        self
    }

    pub fn consume_step(mut self) -> Self {
        self.steps += 1;
        self
    }

    pub fn artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn status(mut self, status: CompletionStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Chooses the next transition from the state alone.
pub fn decide(state: &WorkflowState) -> Transition {
    match state.phase {
        Phase::Initialized => Transition::Analyze,
        Phase::Analyzed => Transition::BuildGraph,
        Phase::GraphBuilt | Phase::ProcessingFrontier => {
            if !state.frontier.is_empty() && state.steps_taken < state.max_steps {
                Transition::ProcessFrontier
            } else if state.synthesize && state.artifact.is_none() {
                Transition::Synthesize
            } else {
                Transition::Complete
            }
        }
        Phase::ArtifactSynthesized => Transition::Complete,
        Phase::Complete => Transition::Finished,
    }
}
