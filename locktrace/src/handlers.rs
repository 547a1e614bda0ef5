use anyhow::Context;
use clap::ArgMatches;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use locktrace_core::credentials::CredentialStore;
use locktrace_core::error::LocktraceError;
use locktrace_core::orchestrator::{FrontierMode, Orchestrator, OrchestratorConfig, ProgressCallback};
use locktrace_core::report::{
    ReportFormat, ReportSources, RunReport, gather_report_data, render_report, save_report,
};
use locktrace_core::trace::load_trace;
use locktrace_core::workflow::{CompletionStatus, WorkflowState};
use locktrace_reasoning::http::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use locktrace_reasoning::{
    HttpReasoningService, ModelProfile, ReasoningClient, ReasoningConfig, ReasoningService,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const API_KEY_VARS: [&str; 2] = ["LOCKTRACE_API_KEY", "OPENAI_API_KEY"];
pub const API_BASE_VAR: &str = "LOCKTRACE_API_BASE";

/// Everything `locktrace run` needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub target: String,
    pub trace_path: PathBuf,
    pub credentials_path: PathBuf,
    pub max_steps: usize,
    pub variables: BTreeMap<String, String>,
    pub synthesize: bool,
    pub artifact_path: PathBuf,
    pub mode: FrontierMode,
    pub model: String,
    pub fallback_model: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            trace_path: PathBuf::from("./digital_vault.har"),
            credentials_path: PathBuf::from("./master_keys.json"),
            max_steps: locktrace_core::workflow::DEFAULT_MAX_STEPS,
            variables: BTreeMap::new(),
            synthesize: false,
            artifact_path: PathBuf::from(locktrace_core::orchestrator::DEFAULT_ARTIFACT_PATH),
            mode: FrontierMode::Batch(None),
            model: locktrace_reasoning::profile::DEFAULT_MODEL.to_string(),
            fallback_model: locktrace_reasoning::profile::FALLBACK_MODEL.to_string(),
            max_retries: locktrace_reasoning::profile::DEFAULT_MAX_RETRIES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            format: ReportFormat::Text,
            output: None,
        }
    }

    pub fn from_matches(args: &ArgMatches) -> Result<Self, String> {
        let target = args
            .get_one::<String>("TARGET")
            .ok_or_else(|| "a target description is required".to_string())?;
        let mut options = RunOptions::new(target.as_str());

        if let Some(trace) = args.get_one::<String>("trace") {
            options.trace_path = expand_path(trace);
        }
        if let Some(credentials) = args.get_one::<String>("credentials") {
            options.credentials_path = expand_path(credentials);
        }
        if let Some(&max_steps) = args.get_one::<usize>("max-steps") {
            options.max_steps = max_steps;
        }
        if let Some(values) = args.get_many::<String>("var") {
            options.variables = parse_variables(values.map(String::as_str))?;
        }
        options.synthesize = args.get_flag("synthesize");
        if let Some(artifact) = args.get_one::<String>("artifact") {
            options.artifact_path = expand_path(artifact);
        }
        options.mode = frontier_mode(
            args.get_flag("single-step"),
            args.get_one::<usize>("batch-size").copied(),
        );
        if let Some(model) = args.get_one::<String>("model") {
            options.model = model.clone();
        }
        if let Some(model) = args.get_one::<String>("fallback-model") {
            options.fallback_model = model.clone();
        }
        if let Some(&retries) = args.get_one::<u32>("max-retries") {
            options.max_retries = retries;
        }
        if let Some(&timeout) = args.get_one::<u64>("timeout") {
            options.timeout_secs = timeout;
        }
        if let Some(format) = args.get_one::<String>("format") {
            options.format = ReportFormat::from_str(format)
                .ok_or_else(|| format!("unknown report format: {}", format))?;
        }
        options.output = args.get_one::<PathBuf>("output").cloned();

        Ok(options)
    }
}

/// Splits a `key=value` binding. Only the first `=` separates; the value may
/// itself contain `=` or be empty.
pub fn parse_variable(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid variable '{}': expected key=value", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid variable '{}': key is empty", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Later bindings for the same key win.
pub fn parse_variables<'a>(
    values: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeMap<String, String>, String> {
    values.into_iter().map(parse_variable).collect()
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

pub fn frontier_mode(single_step: bool, batch_size: Option<usize>) -> FrontierMode {
    if single_step {
        FrontierMode::SingleStep
    } else {
        FrontierMode::Batch(batch_size)
    }
}

/// First non-blank value among the candidates, in order.
pub fn resolve_api_key(candidates: &[Option<String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|key| !key.trim().is_empty())
        .cloned()
}

pub fn api_key_from_env() -> Option<String> {
    let candidates: Vec<Option<String>> = API_KEY_VARS
        .iter()
        .map(|var| std::env::var(var).ok())
        .collect();
    resolve_api_key(&candidates)
}

pub fn api_base_from_env() -> String {
    std::env::var(API_BASE_VAR)
        .ok()
        .filter(|base| !base.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

pub fn build_reasoning_config(options: &RunOptions) -> ReasoningConfig {
    ReasoningConfig::default()
        .with_max_retries(options.max_retries)
        .with_primary(ModelProfile::new(options.model.clone()))
        .with_fallback(ModelProfile::new(options.fallback_model.clone()))
}

/// Credential hints for the store at `path`. A missing or unreadable store is
/// not fatal; the second element carries the warning instead.
pub fn load_credential_hints(path: &Path) -> (Vec<String>, Option<String>) {
    match CredentialStore::load(path) {
        Ok(store) => {
            tracing::info!("Loaded {} stored credentials", store.len());
            (store.hints(), None)
        }
        Err(e) => {
            tracing::warn!("{}", e);
            (Vec::new(), Some(e.to_string()))
        }
    }
}

/// Loads the inputs, runs the workflow to completion and gathers the report.
///
/// Only an unusable trace or a misconfigured reasoning client is fatal.
pub async fn execute_run(
    options: &RunOptions,
    service: Arc<dyn ReasoningService>,
    reasoning: ReasoningConfig,
    progress: Option<ProgressCallback>,
) -> Result<(WorkflowState, RunReport), LocktraceError> {
    let trace = load_trace(&options.trace_path)?;
    let (hints, credential_warning) = load_credential_hints(&options.credentials_path);

    let client = ReasoningClient::new(service, reasoning)?;
    let config = OrchestratorConfig::default()
        .with_mode(options.mode)
        .with_artifact_path(options.artifact_path.clone());
    let mut orchestrator = Orchestrator::new(Arc::new(client), config);
    if let Some(callback) = progress {
        orchestrator = orchestrator.with_progress_callback(callback);
    }

    let mut state = WorkflowState::new(options.target.clone())
        .with_entries(trace.entries)
        .with_variables(options.variables.clone())
        .with_credential_hints(hints)
        .with_max_steps(options.max_steps)
        .with_synthesis(options.synthesize);
    if let Some(warning) = credential_warning {
        state = state.with_warning(warning);
    }

    let state = orchestrator.run(state).await;

    let sources = ReportSources {
        trace_file: Some(options.trace_path.clone()),
        credential_store: Some(options.credentials_path.clone()),
    };
    let report = gather_report_data(&state, &sources);
    Ok((state, report))
}

pub async fn handle_run(args: &ArgMatches) -> anyhow::Result<()> {
    let options = RunOptions::from_matches(args).map_err(anyhow::Error::msg)?;

    let api_key = api_key_from_env().with_context(|| {
        format!(
            "no API key for the reasoning service; set {} or {}",
            API_KEY_VARS[0], API_KEY_VARS[1]
        )
    })?;
    let base_url = api_base_from_env();
    let service = HttpReasoningService::with_base_url(&base_url, api_key, options.timeout_secs)
        .map_err(|e| anyhow::anyhow!("failed to build the reasoning service: {}", e))?;

    println!("{} Target: {}", "→".blue(), options.target.bold());
    println!(
        "{} Trace: {}",
        "→".blue(),
        options.trace_path.display().to_string().cyan()
    );
    println!("{} Max steps: {}", "→".blue(), options.max_steps);
    if !options.variables.is_empty() {
        println!("{} Variables: {}", "→".blue(), options.variables.len());
    }
    println!();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("invalid spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Loading trace...");

    let progress_spinner = spinner.clone();
    let progress: ProgressCallback = Arc::new(move |message: String| {
        progress_spinner.set_message(message);
    });

    let result = execute_run(
        &options,
        Arc::new(service),
        build_reasoning_config(&options),
        Some(progress),
    )
    .await;
    spinner.finish_and_clear();

    let (state, report) = result?;

    let rendered = render_report(&report, options.format)?;
    deliver_report(&rendered, options.output.as_deref());

    print_summary(&state, &report);
    Ok(())
}

/// Writes the report to `output`, or prints it. A failed write is not fatal:
/// the report goes to stdout instead. Returns whether the file was written.
pub fn deliver_report(rendered: &str, output: Option<&Path>) -> bool {
    let Some(path) = output else {
        println!("{}", rendered);
        return false;
    };

    match save_report(rendered, path) {
        Ok(()) => {
            println!(
                "{} Report saved to: {}",
                "✓".green().bold(),
                path.display().to_string().cyan()
            );
            true
        }
        Err(e) => {
            tracing::warn!("{}", e);
            println!("{} Report could not be saved: {}", "⚠".yellow().bold(), e);
            println!("{}", rendered);
            false
        }
    }
}

fn print_summary(state: &WorkflowState, report: &RunReport) {
    println!();
    let results = &report.results;
    match results.status {
        CompletionStatus::Complete => println!(
            "{} Workflow complete: {}/{} endpoints in {} step(s)",
            "✓".green().bold(),
            results.completed,
            results.total,
            results.steps_taken
        ),
        CompletionStatus::Partial => println!(
            "{} Workflow partial: {}/{} endpoints in {} step(s)",
            "⚠".yellow().bold(),
            results.completed,
            results.total,
            results.steps_taken
        ),
    }

    if results.failed > 0 {
        println!(
            "{} {} endpoint(s) failed",
            "✗".red().bold(),
            results.failed
        );
    }

    if let Some(artifact) = state.artifact() {
        match &artifact.path {
            Some(path) => println!(
                "{} Integration written to: {}",
                "✓".green().bold(),
                path.display().to_string().cyan()
            ),
            None => println!("{} Integration generated but not saved", "⚠".yellow()),
        }
    }

    if !report.warnings.is_empty() {
        println!(
            "{} {} warning(s), see report",
            "⚠".yellow(),
            report.warnings.len()
        );
    }
}

pub fn print_banner() {
    let rule = "═".repeat(60).bright_blue().bold();
    println!("{}", rule);
    println!(
        "  {} {}",
        "LockTrace".bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!("  {}", "captured sessions in, ordered integrations out".dimmed());
    println!("{}", rule);
    println!();
}
