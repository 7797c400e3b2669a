//! ChatModel trait definition.

use cadence_types::llm::{LlmError, ModelRequest, ModelResponse};

/// Trait for chat model backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in cadence-infra (e.g., `GeminiChatModel`).
pub trait ChatModel: Send + Sync {
    /// Provider name (e.g., "gemini").
    fn provider(&self) -> &str;

    /// Model identifier sent with every request.
    fn model_name(&self) -> &str;

    /// Send the transcript and tool declarations, receive one assistant turn.
    ///
    /// The response carries the raw provider metadata so usage callbacks
    /// can inspect it.
    fn invoke(
        &self,
        request: &ModelRequest,
    ) -> impl std::future::Future<Output = Result<ModelResponse, LlmError>> + Send;
}
