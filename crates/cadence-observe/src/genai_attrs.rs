//! OpenTelemetry GenAI semantic-convention field names.
//!
//! Spans that describe model work declare these fields (usually as
//! `tracing::field::Empty`) and fill them with `Span::record` once the
//! values are known.

pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";
pub const GEN_AI_REQUEST_TEMPERATURE: &str = "gen_ai.request.temperature";

pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
/// Not part of the upstream conventions; Gemini reports it directly.
pub const GEN_AI_USAGE_TOTAL_TOKENS: &str = "gen_ai.usage.total_tokens";

/// Agent label (`main_agent`, `context_agent`).
pub const GEN_AI_AGENT_NAME: &str = "gen_ai.agent.name";

pub const OP_CHAT: &str = "chat";
pub const OP_INVOKE_AGENT: &str = "invoke_agent";

pub const PROVIDER_GEMINI: &str = "gemini";

/// `"{operation} {model}"`, e.g. `"chat gemini-2.0-flash"`.
pub fn span_name(operation: &str, model: &str) -> String {
    format!("{operation} {model}")
}
