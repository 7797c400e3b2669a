//! Tool-calling agents.
//!
//! `ToolAgent` drives the model/tool loop for one invocation.
//! `ContextAnalyzer` is the environmental sub-agent behind the
//! `get_context_insights` tool.

pub mod analyzer;
pub mod executor;

use cadence_types::llm::{ChatMessage, LlmError};

/// Errors from an agent invocation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("model error: {0}")]
    Model(#[from] LlmError),

    #[error("agent exceeded {max_steps} model steps without a final answer")]
    StepLimit { max_steps: usize },
}

/// Result of a completed agent invocation.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Plain text of the final assistant message.
    pub reply: String,
    /// Full transcript including the input messages, tool calls and results.
    pub messages: Vec<ChatMessage>,
    /// Model round-trips used.
    pub steps: usize,
}
