//! Token usage accounting for model calls made during a request.
//!
//! `UsageRecorder` is registered as a [`ModelCallback`] in the request
//! scope. After each completed call it normalizes whatever usage shape the
//! provider returned and appends a [`UsageEntry`] labelled with the agent
//! that was active at call time. Calls without extractable usage produce no
//! entry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use cadence_types::llm::{InvocationParams, RawCompletion};
use cadence_types::usage::{AgentUsage, Expense, TokenUsage, UsageEntry};

use crate::context;

/// Observer notified after every completed model call.
pub trait ModelCallback: Send + Sync {
    fn on_model_end(&self, completion: &RawCompletion, invocation: &InvocationParams);
}

/// Notify every callback registered in the current context.
pub fn notify_model_end(completion: &RawCompletion, invocation: &InvocationParams) {
    for callback in context::current_callbacks() {
        callback.on_model_end(completion, invocation);
    }
}

/// Collects usage entries for one request.
#[derive(Debug, Default)]
pub struct UsageRecorder {
    entries: Mutex<Vec<UsageEntry>>,
}

impl UsageRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, entry: UsageEntry) {
        self.entries.lock().push(entry);
    }

    /// Snapshot of the entries recorded so far, in arrival order.
    pub fn entries(&self) -> Vec<UsageEntry> {
        self.entries.lock().clone()
    }

    pub fn breakdown(&self) -> UsageBreakdown {
        UsageBreakdown::from_entries(&self.entries())
    }
}

impl ModelCallback for UsageRecorder {
    fn on_model_end(&self, completion: &RawCompletion, invocation: &InvocationParams) {
        let Some(usage) = extract_usage(completion) else {
            tracing::debug!("Model call completed without usage metadata");
            return;
        };
        self.record(UsageEntry {
            agent: context::current_agent_label(),
            usage,
            model: invocation.model_id().map(str::to_string),
        });
    }
}

type Strategy = fn(&RawCompletion) -> Option<TokenUsage>;

/// Tried in order; the first populated result wins.
const EXTRACTION_STRATEGIES: [Strategy; 3] = [
    nested_in_llm_output,
    flat_llm_output,
    message_metadata,
];

const LLM_OUTPUT_USAGE_KEYS: [&str; 4] = ["usage_metadata", "token_usage", "usage", "usageMetadata"];
const METADATA_USAGE_KEYS: [&str; 3] = ["usage_metadata", "token_usage", "usage"];

/// Extract normalized usage from a completed call.
pub fn extract_usage(completion: &RawCompletion) -> Option<TokenUsage> {
    EXTRACTION_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(completion))
}

fn nested_in_llm_output(completion: &RawCompletion) -> Option<TokenUsage> {
    let output = completion.llm_output.as_ref()?.as_object()?;
    LLM_OUTPUT_USAGE_KEYS
        .iter()
        .filter_map(|key| output.get(*key))
        .find_map(normalize_usage)
}

fn flat_llm_output(completion: &RawCompletion) -> Option<TokenUsage> {
    normalize_usage(completion.llm_output.as_ref()?)
}

fn message_metadata(completion: &RawCompletion) -> Option<TokenUsage> {
    [
        &completion.usage_metadata,
        &completion.response_metadata,
        &completion.additional_kwargs,
    ]
    .into_iter()
    .flatten()
    .find_map(|meta| {
        let obj = meta.as_object();
        METADATA_USAGE_KEYS
            .iter()
            .filter_map(|key| obj.and_then(|o| o.get(*key)))
            .chain(std::iter::once(meta))
            .find_map(normalize_usage)
    })
}

/// Read a usage object in any of the known key conventions.
///
/// Normalized keys win; Gemini camelCase and OpenAI keys fill the gaps.
/// Values that are not non-negative integers are ignored.
pub fn normalize_usage(value: &Value) -> Option<TokenUsage> {
    let obj = value.as_object()?;
    let usage = TokenUsage {
        input_tokens: first_count(obj, &["input_tokens", "promptTokenCount", "prompt_tokens"]),
        output_tokens: first_count(
            obj,
            &["output_tokens", "candidatesTokenCount", "completion_tokens"],
        ),
        total_tokens: first_count(obj, &["total_tokens", "totalTokenCount"]),
    };
    usage.is_populated().then_some(usage)
}

fn first_count(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_u64))
}

/// Usage grouped by agent label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageBreakdown {
    agents: Vec<AgentUsage>,
}

impl UsageBreakdown {
    /// Group entries by agent. Groups are ordered by label; each count is
    /// summed independently with absent values contributing nothing. A
    /// group's model is reported only when its entries name exactly one.
    pub fn from_entries(entries: &[UsageEntry]) -> Self {
        let mut groups: BTreeMap<&str, (AgentUsage, BTreeSet<&str>)> = BTreeMap::new();

        for entry in entries {
            let (sum, models) = groups.entry(entry.agent.as_str()).or_insert_with(|| {
                (
                    AgentUsage {
                        agent: entry.agent.clone(),
                        input_tokens: 0,
                        output_tokens: 0,
                        total_tokens: 0,
                        model: None,
                    },
                    BTreeSet::new(),
                )
            });
            sum.input_tokens = sum.input_tokens.saturating_add(entry.usage.input_tokens.unwrap_or(0));
            sum.output_tokens = sum
                .output_tokens
                .saturating_add(entry.usage.output_tokens.unwrap_or(0));
            sum.total_tokens = sum.total_tokens.saturating_add(entry.usage.total_tokens.unwrap_or(0));
            if let Some(model) = entry.model.as_deref() {
                models.insert(model);
            }
        }

        let agents = groups
            .into_values()
            .map(|(mut sum, models)| {
                if models.len() == 1 {
                    sum.model = models.first().map(|m| m.to_string());
                }
                sum
            })
            .collect();

        Self { agents }
    }

    pub fn agents(&self) -> &[AgentUsage] {
        &self.agents
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Grand totals; a field is present only when its sum is non-zero.
    pub fn totals(&self) -> TokenUsage {
        let sum = |f: fn(&AgentUsage) -> u64| {
            let total = self.agents.iter().map(f).fold(0u64, u64::saturating_add);
            (total > 0).then_some(total)
        };
        TokenUsage {
            input_tokens: sum(|a| a.input_tokens),
            output_tokens: sum(|a| a.output_tokens),
            total_tokens: sum(|a| a.total_tokens),
        }
    }

    pub fn into_expense(self) -> Expense {
        Expense {
            total: self.totals(),
            breakdown: self.agents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RequestScope, with_agent_label};
    use serde_json::json;

    fn entry(agent: &str, input: Option<u64>, output: Option<u64>, total: Option<u64>) -> UsageEntry {
        UsageEntry {
            agent: agent.to_string(),
            usage: TokenUsage {
                input_tokens: input,
                output_tokens: output,
                total_tokens: total,
            },
            model: None,
        }
    }

    #[test]
    fn test_gemini_usage_metadata_in_llm_output() {
        let completion = RawCompletion {
            llm_output: Some(json!({"usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 8}})),
            ..Default::default()
        };
        let usage = extract_usage(&completion).unwrap();
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(8));
        assert_eq!(usage.total_tokens, None);
    }

    #[test]
    fn test_flat_llm_output() {
        let completion = RawCompletion {
            llm_output: Some(json!({"input_tokens": 3, "output_tokens": 4, "total_tokens": 7})),
            ..Default::default()
        };
        assert_eq!(
            extract_usage(&completion),
            Some(TokenUsage {
                input_tokens: Some(3),
                output_tokens: Some(4),
                total_tokens: Some(7),
            })
        );
    }

    #[test]
    fn test_llm_output_preferred_over_message_metadata() {
        let completion = RawCompletion {
            llm_output: Some(json!({"token_usage": {"prompt_tokens": 1, "completion_tokens": 2}})),
            usage_metadata: Some(json!({"input_tokens": 100})),
            ..Default::default()
        };
        let usage = extract_usage(&completion).unwrap();
        assert_eq!(usage.input_tokens, Some(1));
        assert_eq!(usage.output_tokens, Some(2));
    }

    #[test]
    fn test_response_metadata_nested_usage() {
        let completion = RawCompletion {
            llm_output: Some(json!({"model": "x"})),
            response_metadata: Some(json!({"usage": {"total_tokens": 30}})),
            ..Default::default()
        };
        assert_eq!(extract_usage(&completion).unwrap().total_tokens, Some(30));
    }

    #[test]
    fn test_empty_nested_key_falls_through_to_next_key() {
        let completion = RawCompletion {
            response_metadata: Some(json!({"usage_metadata": {}, "usage": {"input_tokens": 5}})),
            ..Default::default()
        };
        assert_eq!(extract_usage(&completion).and_then(|u| u.input_tokens), Some(5));

        let flat = RawCompletion {
            additional_kwargs: Some(json!({"usage": null, "output_tokens": 9})),
            ..Default::default()
        };
        assert_eq!(extract_usage(&flat).and_then(|u| u.output_tokens), Some(9));
    }

    #[test]
    fn test_non_integer_counts_ignored() {
        let completion = RawCompletion {
            usage_metadata: Some(json!({"input_tokens": "12", "output_tokens": -1})),
            ..Default::default()
        };
        assert_eq!(extract_usage(&completion), None);
    }

    #[test]
    fn test_no_usage_records_nothing() {
        let recorder = UsageRecorder::new();
        recorder.on_model_end(&RawCompletion::default(), &InvocationParams::default());
        assert!(recorder.entries().is_empty());
    }

    #[test]
    fn test_breakdown_is_order_independent() {
        let entries = vec![
            entry("main_agent", Some(10), Some(5), Some(15)),
            entry("context_agent", Some(4), Some(2), Some(6)),
            entry("main_agent", Some(1), None, Some(1)),
        ];
        let mut reversed = entries.clone();
        reversed.reverse();

        let a = UsageBreakdown::from_entries(&entries);
        let b = UsageBreakdown::from_entries(&reversed);
        assert_eq!(a, b);
        assert_eq!(a.totals(), b.totals());
        assert_eq!(a.agents()[0].agent, "context_agent");
        assert_eq!(a.agents()[1].input_tokens, 11);
    }

    #[test]
    fn test_missing_total_contributes_zero_for_that_entry_only() {
        let entries = vec![
            entry("main_agent", Some(10), Some(5), None),
            entry("main_agent", Some(2), Some(1), Some(3)),
            entry("context_agent", Some(4), Some(2), Some(6)),
        ];
        let breakdown = UsageBreakdown::from_entries(&entries);
        let main = &breakdown.agents()[1];
        assert_eq!(main.agent, "main_agent");
        assert_eq!(main.input_tokens, 12);
        assert_eq!(main.total_tokens, 3);
        assert_eq!(breakdown.agents()[0].total_tokens, 6);
        assert_eq!(breakdown.totals().total_tokens, Some(9));
    }

    #[test]
    fn test_totals_omit_zero_fields() {
        let breakdown =
            UsageBreakdown::from_entries(&[entry("main_agent", Some(12), Some(8), None)]);
        let totals = breakdown.totals();
        assert_eq!(totals.input_tokens, Some(12));
        assert_eq!(totals.output_tokens, Some(8));
        assert_eq!(totals.total_tokens, None);
    }

    #[test]
    fn test_model_attached_only_when_unique() {
        let mut a = entry("main_agent", Some(1), None, None);
        a.model = Some("gemini-2.0-flash".to_string());
        let mut b = a.clone();
        let single = UsageBreakdown::from_entries(&[a.clone(), b.clone()]);
        assert_eq!(single.agents()[0].model.as_deref(), Some("gemini-2.0-flash"));

        b.model = Some("gemini-2.5-pro".to_string());
        let mixed = UsageBreakdown::from_entries(&[a, b]);
        assert_eq!(mixed.agents()[0].model, None);
    }

    #[test]
    fn test_empty_breakdown_expense() {
        let expense = UsageBreakdown::from_entries(&[]).into_expense();
        assert_eq!(expense, Expense::default());
    }

    #[tokio::test]
    async fn test_recorder_stamps_label_active_at_call_time() {
        let recorder = UsageRecorder::new();
        let completion = RawCompletion {
            llm_output: Some(json!({"usageMetadata": {"promptTokenCount": 5, "totalTokenCount": 9}})),
            ..Default::default()
        };
        let invocation = InvocationParams {
            model: Some("gemini-2.0-flash".to_string()),
            ..Default::default()
        };

        RequestScope::new()
            .with_callback(recorder.clone())
            .run(async {
                notify_model_end(&completion, &invocation);
                with_agent_label("context_agent", async {
                    notify_model_end(&completion, &invocation);
                })
                .await;
                notify_model_end(&completion, &invocation);
            })
            .await;

        let labels: Vec<String> = recorder.entries().into_iter().map(|e| e.agent).collect();
        assert_eq!(labels, vec!["main_agent", "context_agent", "main_agent"]);

        let breakdown = recorder.breakdown();
        assert_eq!(breakdown.agents()[1].total_tokens, 18);
        assert_eq!(breakdown.agents()[1].model.as_deref(), Some("gemini-2.0-flash"));
    }

    #[tokio::test]
    async fn test_concurrent_recording_keeps_every_entry() {
        let recorder = UsageRecorder::new();
        let mut handles = Vec::new();
        for i in 0..16u64 {
            let recorder = recorder.clone();
            handles.push(tokio::spawn(async move {
                recorder.record(entry("main_agent", Some(i), None, None));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let breakdown = recorder.breakdown();
        assert_eq!(recorder.entries().len(), 16);
        assert_eq!(breakdown.agents()[0].input_tokens, (0..16).sum::<u64>());
    }
}
