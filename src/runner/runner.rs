//! Sequential agent runner
//!
//! Executes configured work items one at a time through a
//! `TextGenerationClient`, recording exactly one result per attempted item.
//! Per-item failures never abort the run; only configuration problems and
//! misuse of the one-shot contract are returned as errors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::TextGenerationClient;
use crate::error::{Error, Result};

use super::work_item::{aggregate, RunResult, WorkItem, WorkItemResult, WorkItemStatus};

/// Reason recorded for an item interrupted by cancellation
pub const CANCELLED_REASON: &str = "cancelled";

/// Lifecycle of a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Completed,
}

pub struct SequentialAgentRunner {
    client: Arc<dyn TextGenerationClient>,
    items: Vec<WorkItem>,
    state: RunState,
    result: Option<RunResult>,
}

impl SequentialAgentRunner {
    pub fn new(client: Arc<dyn TextGenerationClient>) -> Self {
        Self {
            client,
            items: Vec::new(),
            state: RunState::Pending,
            result: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Result of the completed run, if any
    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    /// Validate and install the ordered work items.
    ///
    /// Fails with a configuration error naming the first violation; nothing
    /// is installed in that case.
    pub fn configure(&mut self, items: Vec<WorkItem>) -> Result<()> {
        if self.state != RunState::Pending {
            return Err(Error::AlreadyRun);
        }

        validate_work_items(&items)?;

        debug!(count = items.len(), "Work items configured");
        self.items = items;
        Ok(())
    }

    /// Run every configured item to completion.
    pub async fn run(&mut self) -> Result<RunResult> {
        // Sender stays alive for the whole run so cancellation never fires.
        let (_never, cancel) = watch::channel(false);
        self.run_with_cancel(cancel).await
    }

    /// Run until done or until `cancel` flips to `true`.
    ///
    /// Cancellation is checked before each item starts; an in-flight
    /// generation call is abandoned and recorded as `Failed("cancelled")`.
    pub async fn run_with_cancel(&mut self, mut cancel: watch::Receiver<bool>) -> Result<RunResult> {
        match self.state {
            RunState::Pending if self.items.is_empty() => return Err(Error::NotConfigured),
            RunState::Pending => {}
            RunState::Running | RunState::Completed => return Err(Error::AlreadyRun),
        }
        self.state = RunState::Running;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut results: Vec<WorkItemResult> = Vec::with_capacity(self.items.len());
        let mut index_by_id: HashMap<String, usize> = HashMap::new();
        let mut cancelled = false;

        info!(
            run_id = %run_id,
            items = self.items.len(),
            client = self.client.name(),
            "Run started"
        );

        for (position, item) in self.items.iter().enumerate() {
            if *cancel.borrow() {
                info!(run_id = %run_id, next = %item.id, "Run cancelled before item start");
                cancelled = true;
                break;
            }

            let item_started = Utc::now();
            let timer = Instant::now();

            let (output, status) = match blocking_dependency(item, &results, &index_by_id) {
                Some((dependency, dependency_status)) => {
                    let reason = Error::DependencyFailed {
                        dependency: dependency.clone(),
                        status: dependency_status,
                    }
                    .to_string();
                    warn!(item = %item.id, dependency = %dependency, "Skipping item: {}", reason);
                    (String::new(), WorkItemStatus::DependencyFailed { dependency, reason })
                }
                None => {
                    let prompt = compose_prompt(item, &results, &index_by_id);
                    info!(
                        item = %item.id,
                        position = position + 1,
                        agent = %item.agent,
                        role = %item.persona.role,
                        "Generating"
                    );

                    let outcome = tokio::select! {
                        biased;
                        outcome = self.client.generate(&item.persona, &prompt) => Some(outcome),
                        _ = wait_for_cancel(&mut cancel) => None,
                    };

                    match outcome {
                        Some(Ok(text)) => (text, WorkItemStatus::Succeeded),
                        Some(Err(e)) => {
                            warn!(item = %item.id, error = %e.format_for_log(), "Item failed");
                            (String::new(), WorkItemStatus::Failed { reason: e.to_string() })
                        }
                        None => {
                            info!(item = %item.id, "In-flight item cancelled");
                            cancelled = true;
                            (
                                String::new(),
                                WorkItemStatus::Failed {
                                    reason: CANCELLED_REASON.to_string(),
                                },
                            )
                        }
                    }
                }
            };

            let duration_ms = timer.elapsed().as_millis() as u64;
            info!(item = %item.id, status = %status, duration_ms, "Item finished");

            index_by_id.insert(item.id.clone(), results.len());
            results.push(WorkItemResult {
                id: item.id.clone(),
                agent: item.agent.clone(),
                description: item.description.clone(),
                output,
                status,
                started_at: item_started,
                duration_ms,
            });

            if cancelled {
                break;
            }
        }

        let result = RunResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            aggregated_text: aggregate(&results),
            results,
        };

        info!(
            run_id = %run_id,
            succeeded = result.succeeded_count(),
            failed = result.failed_count(),
            cancelled,
            "Run completed"
        );

        self.state = RunState::Completed;
        self.result = Some(result.clone());
        Ok(result)
    }
}

/// Check the one-shot input rules: non-empty, unique identifiers usable as
/// file names, non-empty prompts and personas, dependencies pointing only
/// at earlier items.
pub fn validate_work_items(items: &[WorkItem]) -> Result<()> {
    if items.is_empty() {
        return Err(Error::config_validation("no work items configured"));
    }

    let all_ids: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for (position, item) in items.iter().enumerate() {
        let id = item.id.as_str();

        if id.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "id",
                format!("work item {} has an empty identifier", position + 1),
            ));
        }
        if id != id.trim() || id == "." || id == ".." || id.contains(['/', '\\']) {
            return Err(Error::config_field_invalid(
                "id",
                format!("work item identifier '{}' is not a valid file name", id),
            ));
        }
        if !seen.insert(id) {
            return Err(Error::config_field_invalid(
                "id",
                format!("duplicate work item identifier '{}'", id),
            ));
        }
        if item.description.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "description",
                format!("work item '{}' has an empty prompt description", id),
            ));
        }
        if let Some(field) = item.persona.first_empty_field() {
            return Err(Error::config_field_invalid(
                field,
                format!("work item '{}' has a persona with an empty {}", id, field),
            ));
        }

        for dep in &item.depends_on {
            if dep == id {
                return Err(Error::config_field_invalid(
                    "depends_on",
                    format!("work item '{}' depends on itself", id),
                ));
            }
            if !seen.contains(dep.as_str()) {
                let message = if all_ids.contains(dep.as_str()) {
                    format!("work item '{}' depends on '{}', which runs later", id, dep)
                } else {
                    format!("work item '{}' depends on unknown item '{}'", id, dep)
                };
                return Err(Error::config_field_invalid("depends_on", message));
            }
        }
    }

    Ok(())
}

/// First dependency of `item` whose result is not `Succeeded`, with its status
fn blocking_dependency(
    item: &WorkItem,
    results: &[WorkItemResult],
    index_by_id: &HashMap<String, usize>,
) -> Option<(String, String)> {
    item.depends_on.iter().find_map(|dep| {
        match index_by_id.get(dep).map(|&i| &results[i]) {
            Some(r) if r.is_success() => None,
            Some(r) => Some((dep.clone(), r.status.label().to_string())),
            None => Some((dep.clone(), "not run".to_string())),
        }
    })
}

/// Prompt text for one item: description, expected output guidance, then
/// the output of each dependency labelled by identifier.
pub fn compose_prompt(
    item: &WorkItem,
    results: &[WorkItemResult],
    index_by_id: &HashMap<String, usize>,
) -> String {
    let mut prompt = item.description.trim().to_string();

    if !item.expected_output.trim().is_empty() {
        prompt.push_str("\n\nThis is the expected criteria for your final answer: ");
        prompt.push_str(item.expected_output.trim());
    }

    let context: Vec<&WorkItemResult> = item
        .depends_on
        .iter()
        .filter_map(|dep| index_by_id.get(dep).map(|&i| &results[i]))
        .filter(|r| r.is_success())
        .collect();

    if !context.is_empty() {
        prompt.push_str("\n\nThis is the context you're working with:");
        for r in context {
            prompt.push_str(&format!("\n\n## {}\n{}", r.id, r.output.trim_end()));
        }
    }

    prompt
}

/// Resolves once the flag is `true`; never resolves if the sender is gone.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
