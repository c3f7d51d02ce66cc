//! Text generation client trait
//!
//! Defines the contract every model provider implements for the runner.

use async_trait::async_trait;

use crate::crew::Persona;
use crate::error::Result;

/// A remote (or simulated) text generation capability.
///
/// Implementations own their transport concerns (timeouts, retries, auth).
/// A failure must be reported as `Error::GenerationFailed`; the runner
/// records it against the current work item and moves on.
#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &'static str;

    /// Generate a response to `prompt` in the voice of `persona`.
    ///
    /// Returns non-empty text on success.
    async fn generate(&self, persona: &Persona, prompt: &str) -> Result<String>;
}
