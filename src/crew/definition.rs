//! Agent and task definitions as they appear in configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::runner::WorkItem;

use super::persona::Persona;

// ─────────────────────────────────────────────────────────────────
// Definitions
// ─────────────────────────────────────────────────────────────────

/// An `[[agents]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Key referenced by `tasks.agent`
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl AgentDefinition {
    pub fn persona(&self) -> Persona {
        Persona::new(&self.role, &self.goal, &self.backstory)
    }
}

/// A `[[tasks]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique task name; also the output file stem
    pub name: String,

    /// Prompt sent to the agent
    pub description: String,

    /// Advisory guidance appended to the prompt
    #[serde(default)]
    pub expected_output: String,

    /// Name of the agent that runs this task
    pub agent: String,

    /// Earlier tasks whose successful output this task needs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

/// The agents and tasks of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewDefinition {
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,

    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

impl CrewDefinition {
    /// Parse a crew from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            source: Some(e),
        })
    }

    pub fn agent(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Keep only the named tasks, preserving configured order.
    pub fn select(mut self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }

        for name in names {
            if !self.tasks.iter().any(|t| &t.name == name) {
                return Err(Error::config_field_invalid(
                    "tasks",
                    format!("unknown task '{}' requested", name),
                ));
            }
        }

        self.tasks.retain(|t| names.contains(&t.name));
        Ok(self)
    }

    /// Resolve every task against its agent and build the ordered work items.
    ///
    /// Only agent resolution is checked here; identifier and dependency rules
    /// are enforced when the items are handed to the runner.
    pub fn work_items(&self) -> Result<Vec<WorkItem>> {
        let mut agents: HashMap<&str, &AgentDefinition> = HashMap::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(Error::config_field_invalid("agents.name", "agent name cannot be empty"));
            }
            if agents.insert(agent.name.as_str(), agent).is_some() {
                return Err(Error::config_field_invalid(
                    "agents.name",
                    format!("duplicate agent name '{}'", agent.name),
                ));
            }
        }

        self.tasks
            .iter()
            .map(|task| {
                let agent = agents.get(task.agent.as_str()).ok_or_else(|| {
                    Error::config_field_invalid(
                        "tasks.agent",
                        format!("task '{}' references unknown agent '{}'", task.name, task.agent),
                    )
                })?;

                Ok(WorkItem::new(&task.name, &task.description, agent.persona())
                    .with_agent(&agent.name)
                    .with_expected_output(&task.expected_output)
                    .with_dependencies(task.context.iter().cloned()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREW: &str = r#"
[[agents]]
name = "writer"
role = "Writer"
goal = "Write"
backstory = "Writes things"

[[agents]]
name = "editor"
role = "Editor"
goal = "Edit"
backstory = "Edits things"

[[tasks]]
name = "draft"
agent = "writer"
description = "Draft a post"
expected_output = "A post"

[[tasks]]
name = "review"
agent = "editor"
description = "Review the draft"
context = ["draft"]
"#;

    #[test]
    fn test_parse_crew() {
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        assert_eq!(crew.agents.len(), 2);
        assert_eq!(crew.tasks.len(), 2);
        assert_eq!(crew.tasks[1].context, vec!["draft"]);
        assert!(crew.tasks[1].expected_output.is_empty());
        assert_eq!(crew.agent("editor").unwrap().role, "Editor");
    }

    #[test]
    fn test_work_items_resolve_agents() {
        let items = CrewDefinition::from_toml(CREW).unwrap().work_items().unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "draft");
        assert_eq!(items[0].agent, "writer");
        assert_eq!(items[0].persona.role, "Writer");
        assert_eq!(items[0].expected_output, "A post");
        assert_eq!(items[1].depends_on, vec!["draft"]);
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let mut crew = CrewDefinition::from_toml(CREW).unwrap();
        crew.tasks[0].agent = "ghost".to_string();

        let err = crew.work_items().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("unknown agent 'ghost'"));
    }

    #[test]
    fn test_duplicate_agent_rejected() {
        let mut crew = CrewDefinition::from_toml(CREW).unwrap();
        crew.agents[1].name = "writer".to_string();

        let err = crew.work_items().unwrap_err();
        assert!(err.to_string().contains("duplicate agent name 'writer'"));
    }

    #[test]
    fn test_select_keeps_order() {
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        let selected = crew
            .select(&["review".to_string(), "draft".to_string()])
            .unwrap();
        let names: Vec<_> = selected.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["draft", "review"]);
    }

    #[test]
    fn test_select_unknown_task() {
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        assert!(crew.select(&["missing".to_string()]).is_err());
    }
}
