use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};

use cadence_types::llm::ToolSpec;

use crate::agent::analyzer::ContextAnalyzer;
use crate::tools::{Tool, parse_args, spec};

#[derive(Debug, Default, Deserialize)]
struct InsightsArgs {
    #[serde(default, alias = "user_query")]
    query: String,
}

/// Delegates to the environmental sub-agent.
pub struct ContextInsightsTool {
    analyzer: Arc<ContextAnalyzer>,
}

impl ContextInsightsTool {
    pub fn new(analyzer: Arc<ContextAnalyzer>) -> Self {
        Self { analyzer }
    }
}

impl Tool for ContextInsightsTool {
    fn spec(&self) -> ToolSpec {
        spec(
            "get_context_insights",
            "Consulta al agente especializado en contexto ambiental para obtener insights \
             sobre cómo el clima, la hora y la ubicación influyen en la música apropiada.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Mood o actividad mencionada por el usuario"}
                }
            }),
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'_, String> {
        Box::pin(async move {
            match parse_args::<InsightsArgs>("get_context_insights", args) {
                Ok(args) => self.analyzer.analyze(&args.query).await,
                Err(msg) => msg,
            }
        })
    }
}
