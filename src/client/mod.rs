//! Text generation clients
//!
//! The runner only sees `TextGenerationClient`; the concrete provider is
//! picked from the `[llm]` configuration section.

mod mock;
mod openai;
mod traits;

use std::sync::Arc;

use tracing::info;

use crate::config::{LlmSettings, Provider};
use crate::error::Result;

pub use mock::{MockCall, MockClient, MockConfig, MockOutcome};
pub use openai::OpenAiClient;
pub use traits::TextGenerationClient;

/// Construct the client selected by `settings.provider`.
///
/// Credential and endpoint problems surface here, before any request is sent.
pub fn build_client(settings: &LlmSettings) -> Result<Arc<dyn TextGenerationClient>> {
    let client: Arc<dyn TextGenerationClient> = match settings.provider {
        Provider::OpenAi => Arc::new(OpenAiClient::new(settings)?),
        Provider::Mock => Arc::new(MockClient::with_config(MockConfig::from(&settings.mock))),
    };

    info!(provider = client.name(), "Text generation client ready");
    Ok(client)
}
