// Tests for report generation functionality

use locktrace_core::error::LocktraceError;
use locktrace_core::graph::ExecutionPlan;
use locktrace_core::model::{Endpoint, Outcome};
use locktrace_core::report::{
    ReportFormat, ReportSources, RunReport, gather_report_data, generate_json_report,
    generate_markdown_report, generate_text_report, render_report, save_report,
};
use locktrace_core::workflow::{
    CompletionStatus, EndpointResult, Phase, StateDelta, WorkflowState,
};
use std::path::PathBuf;
use tempfile::TempDir;

/// Finished state for a login + account run where the account call failed.
fn finished_state() -> WorkflowState {
    let mut plan = ExecutionPlan::build(vec![
        Endpoint::new(0, "POST", "https://bank.example/login"),
        Endpoint::new(1, "GET", "https://bank.example/account").with_header("Cookie", "sid=1"),
        Endpoint::new(2, "GET", "https://bank.example/news"),
    ]);

    let login = plan.get(0).cloned().unwrap();
    let account = plan.get(1).cloned().unwrap();
    plan.mark_completed(0, Outcome::Extracted("sid cookie".to_string()));
    plan.mark_completed(1, Outcome::Failed("model refused".to_string()));

    let results = vec![
        EndpointResult::for_endpoint(&login, Outcome::Extracted("sid cookie".to_string()))
            .answered_by("gpt-4o".to_string(), 1, false),
        EndpointResult::for_endpoint(&account, Outcome::Failed("model refused".to_string())),
    ];

    WorkflowState::new("check account balance")
        .with_entries(vec![serde_json::json!({}); 5])
        .advance(
            StateDelta::to(Phase::GraphBuilt)
                .plan(plan)
                .master(Some(1))
                .frontier(vec![0]),
        )
        .advance(
            StateDelta::to(Phase::ProcessingFrontier)
                .frontier(vec![2])
                .results(results)
                .warning("Endpoint get_account failed: model refused")
                .consume_step(),
        )
        .advance(StateDelta::to(Phase::Complete).status(CompletionStatus::Partial))
}

fn sources() -> ReportSources {
    ReportSources {
        trace_file: Some(PathBuf::from("./digital_vault.har")),
        credential_store: None,
    }
}

fn report() -> RunReport {
    gather_report_data(&finished_state(), &sources())
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str_text() {
    assert!(matches!(ReportFormat::from_str("text"), Some(ReportFormat::Text)));
}

#[test]
fn test_report_format_from_str_json() {
    assert!(matches!(ReportFormat::from_str("json"), Some(ReportFormat::Json)));
}

#[test]
fn test_report_format_from_str_markdown() {
    assert!(matches!(
        ReportFormat::from_str("markdown"),
        Some(ReportFormat::Markdown)
    ));
    assert!(matches!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown)));
}

#[test]
fn test_report_format_from_str_case_insensitive() {
    assert!(matches!(ReportFormat::from_str("TEXT"), Some(ReportFormat::Text)));
    assert!(matches!(ReportFormat::from_str("Json"), Some(ReportFormat::Json)));
}

#[test]
fn test_report_format_from_str_invalid() {
    assert!(ReportFormat::from_str("invalid").is_none());
    assert!(ReportFormat::from_str("html").is_none());
}

// ============================================================================
// Report Data Tests
// ============================================================================

#[test]
fn test_gather_counts() {
    let report = report();

    assert_eq!(report.metadata.target, "check account balance");
    assert_eq!(report.metadata.trace_file.as_deref(), Some("./digital_vault.har"));
    assert!(report.metadata.credential_store.is_none());

    assert_eq!(report.analysis.request_count, 5);
    assert_eq!(report.analysis.endpoint_count, 3);
    // Login by URL, account by its cookie header
    assert_eq!(report.analysis.security_endpoint_count, 2);
    assert_eq!(report.analysis.master_endpoint.as_deref(), Some("get_account"));

    assert_eq!(report.results.total, 3);
    assert_eq!(report.results.completed, 2);
    assert_eq!(report.results.failed, 1);
    assert_eq!(report.results.pending, 1);
    assert_eq!(report.results.steps_taken, 1);
    assert_eq!(report.results.status, CompletionStatus::Partial);
    assert!(!report.results.artifact_produced);

    assert_eq!(report.endpoints.len(), 2);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn test_run_ids_are_unique() {
    let state = finished_state();
    let a = gather_report_data(&state, &sources());
    let b = gather_report_data(&state, &sources());
    assert_ne!(a.metadata.run_id, b.metadata.run_id);
}

#[test]
fn test_status_derived_when_run_unfinished() {
    let state = WorkflowState::new("goal");
    let report = gather_report_data(&state, &ReportSources::default());
    assert_eq!(report.results.status, CompletionStatus::Complete);
    assert_eq!(report.analysis.average_difficulty, 0.0);
}

// ============================================================================
// Rendering Tests
// ============================================================================

#[test]
fn test_text_report_sections() {
    let text = generate_text_report(&report());

    assert!(text.contains("LOCKTRACE RUN REPORT"));
    assert!(text.contains("Target:       check account balance"));
    assert!(text.contains("Status:       PARTIAL"));
    assert!(text.contains("Completed:    2/3"));
    assert!(text.contains("WARNINGS"));
    assert!(text.contains("End of Report"));
}

#[test]
fn test_json_report_structure() {
    let json = generate_json_report(&report()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["report"]["generator"], "LockTrace");
    assert_eq!(value["report"]["results"]["status"], "partial");
    assert_eq!(value["report"]["results"]["failed"], 1);
    assert_eq!(value["report"]["analysis"]["request_count"], 5);
    assert_eq!(value["report"]["endpoints"][1]["outcome"]["status"], "failed");
    // Absent optional fields are omitted
    assert!(value["report"]["metadata"].get("credential_store").is_none());
}

#[test]
fn test_markdown_report() {
    let markdown = generate_markdown_report(&report());

    assert!(markdown.starts_with("# LockTrace Run Report"));
    assert!(markdown.contains("| Security endpoints | 2 |"));
    assert!(markdown.contains("## Warnings"));
}

#[test]
fn test_render_dispatches_on_format() {
    let data = report();
    let text = render_report(&data, ReportFormat::Text).unwrap();
    let json = render_report(&data, ReportFormat::Json).unwrap();

    assert!(text.contains("LOCKTRACE RUN REPORT"));
    assert!(json.trim_start().starts_with('{'));
}

// ============================================================================
// Saving Tests
// ============================================================================

#[test]
fn test_save_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.md");

    save_report("# hello", &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hello");
}

#[test]
fn test_save_report_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope").join("report.md");

    let result = save_report("x", &path);
    assert!(matches!(result, Err(LocktraceError::ArtifactWrite { .. })));
}

#[test]
fn test_save_report_failure_message_names_cause_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope").join("report.md");

    let error = save_report("x", &path).unwrap_err();
    let message = error.to_string();
    assert!(message.starts_with("Failed to write"));
    assert!(message.contains("report.md"));
    assert_eq!(message.matches("os error").count(), 1);
    // Nothing chained, so `{:#}` in the binary prints the cause once
    assert!(std::error::Error::source(&error).is_none());
}
