//! Agent personas.
//!
//! A persona is the role/goal/backstory triple that conditions every
//! generation call made on an agent's behalf.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Voice and instructions for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Job title the model should assume (e.g. "Data Modeler").
    pub role: String,

    /// What the agent is trying to achieve.
    pub goal: String,

    /// Background that shapes tone and priorities.
    pub backstory: String,
}

impl Persona {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
        }
    }

    /// Name of the first blank field, if any.
    pub fn first_empty_field(&self) -> Option<&'static str> {
        if self.role.trim().is_empty() {
            Some("role")
        } else if self.goal.trim().is_empty() {
            Some("goal")
        } else if self.backstory.trim().is_empty() {
            Some("backstory")
        } else {
            None
        }
    }

    /// Render the system prompt sent ahead of every task prompt.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role.trim(),
            normalize_whitespace(&self.backstory),
            normalize_whitespace(&self.goal),
        )
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role.trim())
    }
}

/// Collapse runs of whitespace (including newlines from TOML multi-line strings).
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
