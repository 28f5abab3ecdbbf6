//! orgwarden root library
//!
//! Glue between the configuration file, the CSV policy store and the
//! decision engine, plus the line-oriented batch evaluator used by the
//! `orgwarden batch` command.

pub mod config;
pub mod error;

pub use config::{EnforcerConfig, RootConfig};
pub use error::{RootError, RootResult};

use orgwarden_core::{SubjectDescriptor, Timestamp};
use orgwarden_policy::{CsvFilePolicyStore, Decision, Enforcer, SnapshotVersion};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

// ---------------------------------------------------------------------------
// Engine construction
// ---------------------------------------------------------------------------

/// Open the configured policy file, creating it first when
/// `create_if_missing` is set.
pub fn open_store(config: &RootConfig) -> RootResult<CsvFilePolicyStore> {
    let store = if config.create_if_missing {
        CsvFilePolicyStore::open_or_create(&config.policy_file)?
    } else {
        CsvFilePolicyStore::open(&config.policy_file)?
    };
    Ok(store)
}

/// Build an enforcer over the configured policy file. Any load failure is
/// returned; there is no partially initialized engine.
pub fn build_enforcer(config: &RootConfig) -> RootResult<Enforcer> {
    config.validate()?;
    let store = open_store(config)?;
    let enforcer = Enforcer::with_options(Box::new(store), config.enforcer_options())?;
    tracing::info!(
        policy_file = %config.policy_file.display(),
        bootstrap = config.enforcer.bootstrap_owner_role,
        "enforcer ready"
    );
    Ok(enforcer)
}

/// Counts reported by `orgwarden validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub policies: usize,
    pub groupings: usize,
    pub snapshot_version: SnapshotVersion,
    pub loaded_at: Timestamp,
}

impl PolicySummary {
    pub fn of(enforcer: &Enforcer) -> Self {
        let snapshot = enforcer.snapshot();
        Self {
            policies: snapshot.policies().len(),
            groupings: snapshot.roles().len(),
            snapshot_version: snapshot.version,
            loaded_at: snapshot.loaded_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch evaluation
// ---------------------------------------------------------------------------

/// One line of batch input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub subject: SubjectDescriptor,
    pub object: String,
    pub action: String,
}

/// One line of batch output. A record carrying `error` is always a deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub line: usize,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchRecord {
    fn failed(line: usize, error: impl std::fmt::Display) -> Self {
        Self {
            line,
            allowed: false,
            decision: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub allowed: usize,
    pub denied: usize,
    pub errors: usize,
}

/// Evaluate a single JSON line. Blank lines yield `None`.
pub fn evaluate_batch_line(enforcer: &Enforcer, line_no: usize, line: &str) -> Option<BatchRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let request: BatchRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(line = line_no, error = %e, "malformed batch line");
            return Some(BatchRecord::failed(line_no, e));
        }
    };
    let result = enforcer.evaluate_explained(&request.subject, &request.object, &request.action);
    let allowed = Decision::deny_on_error(&result);
    Some(match result {
        Ok(decision) => BatchRecord {
            line: line_no,
            allowed,
            decision: Some(decision),
            error: None,
        },
        Err(e) => BatchRecord::failed(line_no, e),
    })
}

/// Evaluate every line of `input`, writing one JSON record per line to
/// `output`. Malformed lines become error records and never stop the run.
pub fn evaluate_batch(
    enforcer: &Enforcer,
    input: impl BufRead,
    mut output: impl Write,
) -> RootResult<BatchSummary> {
    let mut summary = BatchSummary::default();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let Some(record) = evaluate_batch_line(enforcer, idx + 1, &line) else {
            continue;
        };
        if record.error.is_some() {
            summary.errors += 1;
        } else if record.allowed {
            summary.allowed += 1;
        } else {
            summary.denied += 1;
        }
        writeln!(output, "{}", serde_json::to_string(&record)?)?;
    }
    tracing::info!(
        allowed = summary.allowed,
        denied = summary.denied,
        errors = summary.errors,
        "batch complete"
    );
    Ok(summary)
}
