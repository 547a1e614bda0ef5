pub mod credentials;
pub mod error;
pub mod frontier;
pub mod graph;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod report;
pub mod trace;
pub mod workflow;

pub use credentials::CredentialStore;
pub use error::{EntryParseError, LocktraceError};
pub use graph::{DependencyEdge, EdgeReason, ExecutionPlan, PlanStatistics};
pub use model::{Body, Endpoint, EndpointKind, Outcome};
pub use normalize::{NormalizeSummary, Normalized, normalize_entries};
pub use orchestrator::{FrontierMode, Orchestrator, OrchestratorConfig, ProgressCallback};
pub use report::{ReportFormat, ReportSources, RunReport};
pub use trace::{Trace, load_trace};
pub use workflow::{CompletionStatus, Phase, Transition, WorkflowState, decide};
