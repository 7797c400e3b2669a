//! Environmental context sub-agent.
//!
//! Runs with only the environment tools and its own system prompt. Each
//! analysis is spawned on a separate task carrying the caller's context,
//! relabelled as [`CONTEXT_AGENT_LABEL`] so usage is attributed to it.

use std::sync::Arc;

use cadence_types::llm::ChatMessage;

use crate::context::{spawn_scoped, with_agent_label};

use super::executor::ToolAgent;

pub const CONTEXT_AGENT_LABEL: &str = "context_agent";

pub const INSIGHTS_UNAVAILABLE: &str = "Insights de contexto no disponibles";

const NO_INSIGHTS: &str = "No se pudieron generar insights del contexto";

pub struct ContextAnalyzer {
    agent: ToolAgent,
    system_prompt: String,
}

impl ContextAnalyzer {
    pub fn new(agent: ToolAgent, system_prompt: impl Into<String>) -> Self {
        Self {
            agent,
            system_prompt: system_prompt.into(),
        }
    }

    /// Insights on how the current environment should shape the music choice.
    /// Never fails; problems produce [`INSIGHTS_UNAVAILABLE`].
    pub async fn analyze(self: &Arc<Self>, user_query: &str) -> String {
        let this = Arc::clone(self);
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(analysis_prompt(user_query)),
        ];
        let handle = spawn_scoped(async move {
            with_agent_label(CONTEXT_AGENT_LABEL, this.agent.invoke(messages)).await
        });

        match handle.await {
            Ok(Ok(outcome)) if outcome.reply.trim().is_empty() => NO_INSIGHTS.to_string(),
            Ok(Ok(outcome)) => outcome.reply,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Context analysis failed");
                INSIGHTS_UNAVAILABLE.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Context analysis task failed");
                INSIGHTS_UNAVAILABLE.to_string()
            }
        }
    }
}

fn analysis_prompt(user_query: &str) -> String {
    let extra = match user_query.trim() {
        "" => String::new(),
        query => format!("Contexto adicional del usuario: {query}"),
    };
    format!(
        "Analiza el contexto ambiental actual y genera insights profundos sobre cómo influye en la selección musical.\n\n\
         {extra}\n\n\
         Genera insights específicos sobre cómo el clima, hora del día y ubicación se relacionan con el estado de ánimo esperado y el tipo de música apropiada."
    )
}
