//! Mock client for testing and offline runs
//!
//! Answers deterministically: a scripted outcome queue first, then
//! role-based failures, then a fixed response, then an echo.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::config::MockSettings;
use crate::crew::Persona;
use crate::error::{Error, GenerationFailureKind, Result};

use super::TextGenerationClient;

// ─────────────────────────────────────────────────────────────────
// Mock Client Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock client behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Fixed response text (for deterministic testing)
    pub fixed_response: Option<String>,

    /// Personas whose role is listed here always fail
    pub fail_roles: Vec<String>,

    /// Simulated latency per call
    pub latency_ms: u64,
}

impl From<&MockSettings> for MockConfig {
    fn from(settings: &MockSettings) -> Self {
        Self {
            fixed_response: settings.response.clone(),
            fail_roles: settings.fail_roles.clone(),
            latency_ms: settings.latency_ms,
        }
    }
}

/// One scripted answer
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Respond(String),
    Fail(GenerationFailureKind, String),
}

/// A call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub role: String,
    pub prompt: String,
}

// ─────────────────────────────────────────────────────────────────
// Mock Client
// ─────────────────────────────────────────────────────────────────

pub struct MockClient {
    config: MockConfig,
    script: Mutex<VecDeque<MockOutcome>>,
    calls: RwLock<Vec<MockCall>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            script: Mutex::new(VecDeque::new()),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Mock that plays back `outcomes` in call order.
    pub fn scripted(outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        let client = Self::new();
        client.script.lock().extend(outcomes);
        client
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().clone()
    }

    fn next_outcome(&self, persona: &Persona, prompt: &str) -> MockOutcome {
        if let Some(outcome) = self.script.lock().pop_front() {
            return outcome;
        }

        let role = persona.role.trim();
        if self.config.fail_roles.iter().any(|r| r.trim() == role) {
            return MockOutcome::Fail(
                GenerationFailureKind::ServerError,
                format!("mock failure for role '{}'", role),
            );
        }

        if let Some(ref fixed) = self.config.fixed_response {
            return MockOutcome::Respond(fixed.clone());
        }

        let first_line = prompt.lines().next().unwrap_or_default();
        MockOutcome::Respond(format!("[{}] {}", role, first_line))
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerationClient for MockClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, persona: &Persona, prompt: &str) -> Result<String> {
        self.calls.write().push(MockCall {
            role: persona.role.clone(),
            prompt: prompt.to_string(),
        });

        let outcome = self.next_outcome(persona, prompt);

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        match outcome {
            MockOutcome::Respond(text) => Ok(text),
            MockOutcome::Fail(kind, reason) => Err(Error::generation(kind, reason)),
        }
    }
}
