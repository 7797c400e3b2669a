//! Tool surface exposed to the chat model.
//!
//! Every tool answers with a human-readable string, including on failure,
//! so the model can relay problems instead of aborting the turn.

pub mod environment;
pub mod insights;
pub mod memory;
pub mod playlist;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use cadence_types::llm::ToolSpec;

pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    fn call(&self, args: Value) -> BoxFuture<'_, String>;
}

/// Name-indexed set of tools handed to an agent.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any earlier tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.spec().name;
        self.tools.retain(|t| t.spec().name != name);
        self.tools.push(tool);
        self
    }

    pub fn extend(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> &mut Self {
        for tool in tools {
            self.register(tool);
        }
        self
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.spec().name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn call(&self, name: &str, args: Value) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.spec().name == name) else {
            tracing::warn!(tool = name, "Model requested an unknown tool");
            return format!("Herramienta desconocida: {name}");
        };
        tracing::debug!(tool = name, "Calling tool");
        tool.call(args).await
    }
}

/// Decode tool arguments. A missing or `null` argument object is treated as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, String> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| format!("Argumentos inválidos para {tool}: {e}"))
}

pub(crate) fn spec(name: &str, description: &str, parameters: Value) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

pub(crate) fn no_parameters() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}
