//! Chat model implementations.
//!
//! Contains the concrete [`ChatModel`](cadence_core::llm::model::ChatModel)
//! implementation (Gemini) and a factory that builds the boxed model the
//! agents share from configuration.

pub mod gemini;

use secrecy::SecretString;

use cadence_core::llm::box_model::BoxChatModel;
use cadence_types::config::ModelConfig;
use cadence_types::llm::LlmError;

use self::gemini::GeminiChatModel;

/// Build the [`BoxChatModel`] described by `config`.
pub fn create_chat_model(config: &ModelConfig, api_key: SecretString) -> Result<BoxChatModel, LlmError> {
    let model = GeminiChatModel::new(api_key, config)?;
    tracing::info!(provider = "gemini", model = %config.name, "Chat model configured");
    Ok(BoxChatModel::new(model))
}
