//! Chat orchestration: one user turn from message to reply and usage.

pub mod service;
pub mod shortcut;
pub mod thread;

use cadence_types::usage::Expense;

use crate::agent::AgentError;

/// Longest accepted user message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

pub const QUOTA_EXCEEDED_MESSAGE: &str = "Gemini API quota exceeded (429 RESOURCE_EXHAUSTED). \
     Check your Google AI Studio quotas/billing or try again later.";

/// Stages of a chat turn, logged as the turn progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    ContextEstablished,
    MemoryRetrieved,
    ModelInvoked,
    MemoryPersisted,
    Responded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub expense: Expense,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(
        "Gemini API quota exceeded (429 RESOURCE_EXHAUSTED). Check your Google AI Studio quotas/billing or try again later."
    )]
    QuotaExceeded(#[source] AgentError),

    #[error("agent error: {0}")]
    Agent(#[source] AgentError),

    #[error("invalid message: {0}")]
    Validation(String),
}

impl ChatError {
    /// Classify an agent failure: provider quota and rate-limit errors become
    /// `QuotaExceeded`, everything else stays an agent error.
    pub fn from_agent(err: AgentError) -> Self {
        let quota = match &err {
            AgentError::Model(cadence_types::llm::LlmError::RateLimited { .. }) => true,
            other => {
                let text = other.to_string();
                text.contains("RESOURCE_EXHAUSTED") || text.contains("429")
            }
        };
        if quota {
            ChatError::QuotaExceeded(err)
        } else {
            ChatError::Agent(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_types::llm::LlmError;

    #[test]
    fn test_quota_classification() {
        let rate_limited = AgentError::Model(LlmError::RateLimited {
            retry_after_ms: Some(1000),
            message: "slow down".to_string(),
        });
        assert!(matches!(ChatError::from_agent(rate_limited), ChatError::QuotaExceeded(_)));

        let by_text = AgentError::Model(LlmError::Provider {
            message: "HTTP 429: RESOURCE_EXHAUSTED".to_string(),
        });
        assert!(matches!(ChatError::from_agent(by_text), ChatError::QuotaExceeded(_)));

        let other = AgentError::Model(LlmError::AuthenticationFailed);
        assert!(matches!(ChatError::from_agent(other), ChatError::Agent(_)));

        let steps = AgentError::StepLimit { max_steps: 8 };
        assert!(matches!(ChatError::from_agent(steps), ChatError::Agent(_)));
    }

    #[test]
    fn test_quota_message() {
        let err = ChatError::QuotaExceeded(AgentError::StepLimit { max_steps: 1 });
        assert_eq!(err.to_string(), QUOTA_EXCEEDED_MESSAGE);
    }
}
