// Loading captured interaction traces from disk

use crate::error::{LocktraceError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// Raw entries of a HAR-style capture, not yet normalized.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub source: Option<PathBuf>,
    pub entries: Vec<Value>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both the full HAR layout and a bare entry list are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum TraceDocument {
    Har { log: EntryList },
    Bare(EntryList),
}

#[derive(Deserialize)]
struct EntryList {
    #[serde(default)]
    entries: Vec<Value>,
}

pub fn load_trace(path: &Path) -> Result<Trace> {
    if !path.exists() {
        return Err(LocktraceError::Validation(format!(
            "Trace file not found: {}",
            path.display()
        )));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        LocktraceError::Validation(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let mut trace = parse_trace(&contents)?;
    trace.source = Some(path.to_path_buf());

    info!("Loaded {} entries from {}", trace.len(), path.display());
    Ok(trace)
}

pub fn parse_trace(contents: &str) -> Result<Trace> {
    let document: TraceDocument = serde_json::from_str(contents)
        .map_err(|e| LocktraceError::Validation(format!("Invalid trace file: {}", e)))?;

    let entries = match document {
        TraceDocument::Har { log } => log.entries,
        TraceDocument::Bare(list) => list.entries,
    };

    Ok(Trace {
        source: None,
        entries,
    })
}
