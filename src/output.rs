//! Run output persistence
//!
//! Writes the aggregated text, one file per attempted work item, and
//! optionally a JSON report of the full run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::OutputSettings;
use crate::crew::persona::normalize_whitespace;
use crate::error::{Error, Result};
use crate::runner::{RunResult, WorkItemResult, WorkItemStatus};

/// Paths written for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub aggregate: PathBuf,
    pub items: Vec<PathBuf>,
    pub report: Option<PathBuf>,
}

pub struct OutputWriter {
    dir: PathBuf,
    aggregate_file: String,
    item_file_pattern: String,
    report_file: Option<String>,
}

impl OutputWriter {
    pub fn new(settings: &OutputSettings) -> Self {
        Self {
            dir: PathBuf::from(&settings.dir),
            aggregate_file: settings.aggregate_file.clone(),
            item_file_pattern: settings.item_file_pattern.clone(),
            report_file: settings
                .write_report
                .then(|| settings.report_file.clone()),
        }
    }

    /// File name for an item's output
    pub fn item_file_name(&self, id: &str) -> String {
        self.item_file_pattern.replace("{id}", id)
    }

    /// Reject item ids whose output file would overwrite the aggregate, the
    /// report, or another item's file. Names are compared ASCII-lowercased
    /// for case-insensitive filesystems.
    pub fn check_file_names<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut taken: HashMap<String, String> = HashMap::new();
        taken.insert(
            self.aggregate_file.to_ascii_lowercase(),
            "the aggregate output".to_string(),
        );
        if let Some(ref report) = self.report_file {
            if taken
                .insert(report.to_ascii_lowercase(), "the run report".to_string())
                .is_some()
            {
                return Err(Error::config_field_invalid(
                    "output.report_file",
                    format!("report_file '{}' is the same file as aggregate_file", report),
                ));
            }
        }

        for id in ids {
            let name = self.item_file_name(id);
            if let Some(owner) = taken.insert(name.to_ascii_lowercase(), format!("task '{}'", id)) {
                return Err(Error::config_field_invalid(
                    "tasks.name",
                    format!(
                        "task '{}' would write '{}', which is already used by {}",
                        id, name, owner
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Persist a run. The output directory is created if missing.
    pub fn write(&self, result: &RunResult) -> Result<WrittenFiles> {
        self.check_file_names(result.results.iter().map(|r| r.id.as_str()))?;

        fs::create_dir_all(&self.dir).map_err(|e| Error::IoWrite {
            path: self.dir.clone(),
            source: e,
        })?;

        let aggregate = self.dir.join(&self.aggregate_file);
        write_file(&aggregate, &result.aggregated_text)?;

        let mut items = Vec::with_capacity(result.results.len());
        for (index, item) in result.results.iter().enumerate() {
            let path = self.dir.join(self.item_file_name(&item.id));
            write_file(&path, &render_item(index + 1, item))?;
            items.push(path);
        }

        let report = match self.report_file {
            Some(ref name) => {
                let path = self.dir.join(name);
                write_file(&path, &serde_json::to_string_pretty(result)?)?;
                Some(path)
            }
            None => None,
        };

        info!(
            dir = %self.dir.display(),
            files = items.len() + 1 + usize::from(report.is_some()),
            "Run output written"
        );

        Ok(WrittenFiles {
            aggregate,
            items,
            report,
        })
    }
}

/// Per-item file body: a header line naming the item and its prompt, then
/// the generated text or the reason it is missing.
pub fn render_item(position: usize, result: &WorkItemResult) -> String {
    let body = match &result.status {
        WorkItemStatus::Succeeded => result.output.clone(),
        WorkItemStatus::Failed { reason } => format!("FAILED: {}", reason),
        WorkItemStatus::DependencyFailed { reason, .. } => format!("DEPENDENCY FAILED: {}", reason),
    };

    let mut text = format!(
        "Task {} [{}] - {}\n{}",
        position,
        result.id,
        normalize_whitespace(&result.description),
        body
    );
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    debug!(path = %path.display(), bytes = content.len(), "Writing output file");
    fs::write(path, content).map_err(|e| Error::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
