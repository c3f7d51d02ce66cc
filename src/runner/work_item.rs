//! Work items and their results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crew::Persona;

// ─────────────────────────────────────────────────────────────────
// Work Item
// ─────────────────────────────────────────────────────────────────

/// One configured unit of work: a prompt and the persona that answers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Unique within a run
    pub id: String,

    /// Name of the agent the item was assigned to (informational)
    pub agent: String,

    /// Prompt description
    pub description: String,

    /// Advisory guidance appended to the prompt
    pub expected_output: String,

    pub persona: Persona,

    /// Identifiers of earlier items whose output this item needs
    pub depends_on: Vec<String>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, description: impl Into<String>, persona: Persona) -> Self {
        Self {
            id: id.into(),
            agent: String::new(),
            description: description.into(),
            expected_output: String::new(),
            persona,
            depends_on: Vec::new(),
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────

/// Outcome of a single work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkItemStatus {
    Succeeded,
    Failed { reason: String },
    /// Not attempted because an earlier item it depends on did not succeed
    DependencyFailed { dependency: String, reason: String },
}

impl WorkItemStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkItemStatus::Succeeded)
    }

    /// Short label used in logs and dependency messages
    pub fn label(&self) -> &'static str {
        match self {
            WorkItemStatus::Succeeded => "succeeded",
            WorkItemStatus::Failed { .. } => "failed",
            WorkItemStatus::DependencyFailed { .. } => "dependency failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            WorkItemStatus::Succeeded => None,
            WorkItemStatus::Failed { reason } | WorkItemStatus::DependencyFailed { reason, .. } => {
                Some(reason)
            }
        }
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result recorded exactly once per attempted work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemResult {
    pub id: String,
    pub agent: String,
    pub description: String,

    /// Raw generated text; empty unless the item succeeded
    pub output: String,

    #[serde(flatten)]
    pub status: WorkItemStatus,

    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl WorkItemResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Everything one run produced, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Set when the host cancelled before every item was attempted
    pub cancelled: bool,

    pub results: Vec<WorkItemResult>,

    /// Succeeded outputs, each under its identifier
    pub aggregated_text: String,
}

impl RunResult {
    pub fn get(&self, id: &str) -> Option<&WorkItemResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.succeeded_count()
    }
}

/// Concatenate succeeded outputs as `## {id}` blocks separated by a blank line.
pub fn aggregate(results: &[WorkItemResult]) -> String {
    results
        .iter()
        .filter(|r| r.is_success())
        .map(|r| format!("## {}\n{}", r.id, r.output))
        .collect::<Vec<_>>()
        .join("\n\n")
}
