// Run report generation from the final workflow state

use crate::error::{LocktraceError, Result};
use crate::workflow::{CompletionStatus, EndpointResult, WorkflowState};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

/// Inputs of the run that are not part of the workflow state.
#[derive(Debug, Clone, Default)]
pub struct ReportSources {
    pub trace_file: Option<PathBuf>,
    pub credential_store: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    pub analysis: AnalysisSummary,
    pub results: ResultsSummary,
    pub endpoints: Vec<EndpointResult>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub run_id: String,
    pub target: String,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_store: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub request_count: usize,
    pub endpoint_count: usize,
    pub security_endpoint_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_endpoint: Option<String>,
    pub edge_count: usize,
    pub average_difficulty: f64,
    /// Method + path patterns shared by several endpoints
    pub repeated_patterns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub steps_taken: usize,
    pub status: CompletionStatus,
    pub artifact_produced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}

pub fn gather_report_data(state: &WorkflowState, sources: &ReportSources) -> RunReport {
    let plan = state.plan();
    let stats = plan.statistics();

    let metadata = ReportMetadata {
        run_id: uuid::Uuid::new_v4().to_string(),
        target: state.target().to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        trace_file: sources
            .trace_file
            .as_ref()
            .map(|p| p.display().to_string()),
        credential_store: sources
            .credential_store
            .as_ref()
            .map(|p| p.display().to_string()),
    };

    let analysis = AnalysisSummary {
        request_count: state.request_count(),
        endpoint_count: plan.len(),
        security_endpoint_count: plan.security_endpoint_count(),
        master_endpoint: state.master().map(|endpoint| endpoint.name()),
        edge_count: stats.edges,
        average_difficulty: stats.average_difficulty,
        repeated_patterns: plan
            .similar_groups()
            .into_iter()
            .map(|group| format!("{} (x{})", group.pattern, group.endpoint_ids.len()))
            .collect(),
        overview: state.analysis().map(String::from),
    };

    let artifact = state.artifact();
    let results = ResultsSummary {
        total: stats.total,
        completed: stats.completed,
        failed: stats.failed,
        pending: stats.pending,
        steps_taken: state.steps_taken(),
        status: state
            .status()
            .unwrap_or_else(|| state.completion_status()),
        artifact_produced: artifact.is_some(),
        artifact_path: artifact
            .and_then(|a| a.path.as_ref())
            .map(|p| p.display().to_string()),
    };

    RunReport {
        metadata,
        analysis,
        results,
        endpoints: state.results().to_vec(),
        warnings: state.warnings().to_vec(),
    }
}

pub fn generate_text_report(data: &RunReport) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                          LOCKTRACE RUN REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Run ID:       {}\n", data.metadata.run_id));
    report.push_str(&format!("Target:       {}\n", data.metadata.target));
    report.push_str(&format!("Generated:    {}\n", data.metadata.generated_at));
    if let Some(ref trace) = data.metadata.trace_file {
        report.push_str(&format!("Trace:        {}\n", trace));
    }
    if let Some(ref store) = data.metadata.credential_store {
        report.push_str(&format!("Credentials:  {}\n", store));
    }
    report.push('\n');

    report.push_str(RULE);
    report.push_str("ANALYSIS\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Requests captured:    {}\n", data.analysis.request_count));
    report.push_str(&format!("Endpoints scheduled:  {}\n", data.analysis.endpoint_count));
    report.push_str(&format!(
        "Security endpoints:   {}\n",
        data.analysis.security_endpoint_count
    ));
    report.push_str(&format!(
        "Master endpoint:      {}\n",
        data.analysis.master_endpoint.as_deref().unwrap_or("Not found")
    ));
    report.push_str(&format!("Dependencies:         {}\n", data.analysis.edge_count));
    report.push_str(&format!(
        "Average difficulty:   {:.1}/10\n",
        data.analysis.average_difficulty
    ));

    if !data.analysis.repeated_patterns.is_empty() {
        report.push_str("\nRepeated patterns:\n");
        for pattern in &data.analysis.repeated_patterns {
            report.push_str(&format!("  {}\n", pattern));
        }
    }

    if let Some(ref overview) = data.analysis.overview {
        report.push_str("\nOverview:\n");
        report.push_str(&wrap_text(overview, 80, "  "));
    }
    report.push('\n');

    report.push_str(RULE);
    report.push_str("RESULTS\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!(
        "Status:       {}\n",
        data.results.status.as_str().to_uppercase()
    ));
    report.push_str(&format!(
        "Completed:    {}/{}\n",
        data.results.completed, data.results.total
    ));
    report.push_str(&format!("Failed:       {}\n", data.results.failed));
    report.push_str(&format!("Pending:      {}\n", data.results.pending));
    report.push_str(&format!("Steps:        {}\n", data.results.steps_taken));
    match data.results.artifact_path {
        Some(ref path) => report.push_str(&format!("Artifact:     {}\n", path)),
        None if data.results.artifact_produced => {
            report.push_str("Artifact:     generated, not written\n")
        }
        None => report.push_str("Artifact:     none\n"),
    }
    report.push('\n');

    if !data.endpoints.is_empty() {
        for (idx, result) in data.endpoints.iter().enumerate() {
            let marker = if result.outcome.is_failed() { "✗" } else { "✓" };
            report.push_str(&format!(
                "[{}] {} {} {}  (difficulty {})\n",
                idx + 1,
                marker,
                result.method,
                result.url,
                result.difficulty
            ));
            if let Some(ref model) = result.model {
                report.push_str(&format!(
                    "    answered by {} after {} attempt(s)\n",
                    model, result.attempts
                ));
            }
        }
        report.push('\n');
    }

    if !data.warnings.is_empty() {
        report.push_str(RULE);
        report.push_str("WARNINGS\n");
        report.push_str(RULE);
        report.push('\n');
        for warning in &data.warnings {
            report.push_str(&format!("  ⚠ {}\n", warning));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                             End of Report\n");
    report.push_str(RULE);

    report
}

pub fn generate_json_report(data: &RunReport) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "generator": "LockTrace",
            "version": env!("CARGO_PKG_VERSION"),
            "metadata": data.metadata,
            "analysis": data.analysis,
            "results": data.results,
            "endpoints": data.endpoints,
            "warnings": data.warnings
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(data: &RunReport) -> String {
    let mut report = String::new();

    report.push_str("# LockTrace Run Report\n\n");
    report.push_str(&format!("- **Run ID:** `{}`\n", data.metadata.run_id));
    report.push_str(&format!("- **Target:** {}\n", data.metadata.target));
    report.push_str(&format!("- **Generated:** {}\n", data.metadata.generated_at));
    if let Some(ref trace) = data.metadata.trace_file {
        report.push_str(&format!("- **Trace:** `{}`\n", trace));
    }
    if let Some(ref store) = data.metadata.credential_store {
        report.push_str(&format!("- **Credentials:** `{}`\n", store));
    }

    report.push_str("\n## Analysis\n\n");
    report.push_str("| Metric | Value |\n|---|---|\n");
    report.push_str(&format!("| Requests captured | {} |\n", data.analysis.request_count));
    report.push_str(&format!("| Endpoints scheduled | {} |\n", data.analysis.endpoint_count));
    report.push_str(&format!(
        "| Security endpoints | {} |\n",
        data.analysis.security_endpoint_count
    ));
    report.push_str(&format!(
        "| Master endpoint | {} |\n",
        data.analysis.master_endpoint.as_deref().unwrap_or("not found")
    ));
    report.push_str(&format!("| Dependencies | {} |\n", data.analysis.edge_count));
    report.push_str(&format!(
        "| Average difficulty | {:.1} |\n",
        data.analysis.average_difficulty
    ));

    report.push_str("\n## Results\n\n");
    report.push_str(&format!(
        "**Status:** {} ({}/{} completed, {} failed, {} pending, {} steps)\n\n",
        data.results.status.as_str(),
        data.results.completed,
        data.results.total,
        data.results.failed,
        data.results.pending,
        data.results.steps_taken
    ));

    if !data.endpoints.is_empty() {
        report.push_str("| # | Request | Difficulty | Outcome |\n|---|---|---|---|\n");
        for (idx, result) in data.endpoints.iter().enumerate() {
            let outcome = if result.outcome.is_failed() { "failed" } else { "ok" };
            report.push_str(&format!(
                "| {} | `{} {}` | {} | {} |\n",
                idx + 1,
                result.method,
                result.url,
                result.difficulty,
                outcome
            ));
        }
        report.push('\n');
    }

    if let Some(ref path) = data.results.artifact_path {
        report.push_str(&format!("Integration code written to `{}`.\n\n", path));
    }

    if !data.warnings.is_empty() {
        report.push_str("## Warnings\n\n");
        for warning in &data.warnings {
            report.push_str(&format!("- {}\n", warning));
        }
    }

    report
}

pub fn render_report(data: &RunReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => Ok(generate_json_report(data)?),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn save_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content).map_err(|error| LocktraceError::ArtifactWrite {
        path: path.to_path_buf(),
        error,
    })
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.len() && !current_line.is_empty() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
