//! Token usage types: per-call entries and the per-request expense summary.

use serde::{Deserialize, Serialize};

/// Token counts normalized from a provider response. Any field may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// True when at least one count is present.
    pub fn is_populated(&self) -> bool {
        self.input_tokens.is_some() || self.output_tokens.is_some() || self.total_tokens.is_some()
    }
}

/// One completed model call, attributed to the agent that made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub agent: String,
    #[serde(flatten)]
    pub usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Summed usage for one agent label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUsage {
    pub agent: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Per-request expense returned alongside every chat reply.
///
/// `total` only carries the fields whose grand total is non-zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub total: TokenUsage,
    pub breakdown: Vec<AgentUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_flat() {
        let entry = UsageEntry {
            agent: "main_agent".to_string(),
            usage: TokenUsage {
                input_tokens: Some(12),
                output_tokens: Some(8),
                total_tokens: None,
            },
            model: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["input_tokens"], 12);
        assert!(value.get("total_tokens").is_none());
        assert!(value.get("model").is_none());
    }

    #[test]
    fn test_empty_expense_shape() {
        let value = serde_json::to_value(Expense::default()).unwrap();
        assert_eq!(value, serde_json::json!({"total": {}, "breakdown": []}));
    }

    #[test]
    fn test_is_populated() {
        assert!(!TokenUsage::default().is_populated());
        let usage = TokenUsage {
            total_tokens: Some(1),
            ..Default::default()
        };
        assert!(usage.is_populated());
    }
}
