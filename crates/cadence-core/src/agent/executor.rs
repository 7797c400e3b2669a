//! The model/tool loop.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{Instrument, debug, info_span};

use cadence_types::llm::{ChatMessage, ModelRequest};

use crate::context;
use crate::llm::box_model::BoxChatModel;
use crate::tools::ToolRegistry;
use crate::usage::notify_model_end;

use super::{AgentError, AgentOutcome};

pub struct ToolAgent {
    model: Arc<BoxChatModel>,
    tools: ToolRegistry,
    max_steps: usize,
}

impl ToolAgent {
    pub fn new(model: Arc<BoxChatModel>, tools: ToolRegistry, max_steps: usize) -> Self {
        Self {
            model,
            tools,
            max_steps: max_steps.max(1),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the loop over `messages` until the model answers without tool calls.
    ///
    /// Every completed model call is reported to the callbacks of the
    /// current context before its tool calls run.
    pub async fn invoke(&self, messages: Vec<ChatMessage>) -> Result<AgentOutcome, AgentError> {
        let mut request = ModelRequest {
            messages,
            tools: self.tools.specs(),
        };

        for step in 1..=self.max_steps {
            let span = info_span!(
                "gen_ai.complete",
                gen_ai.system = self.model.provider(),
                gen_ai.request.model = %self.model.model_name(),
                agent = %context::current_agent_label(),
                step,
            );
            let response = self.model.invoke(&request).instrument(span).await?;
            notify_model_end(&response.completion, &response.invocation);
            request.messages.push(response.to_message());

            if response.tool_calls.is_empty() {
                return Ok(AgentOutcome {
                    reply: response.content.to_text(),
                    messages: request.messages,
                    steps: step,
                });
            }

            debug!(
                step,
                tools = ?response.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Running tool calls"
            );
            let results = join_all(
                response
                    .tool_calls
                    .iter()
                    .map(|call| self.tools.call(&call.name, call.arguments.clone())),
            )
            .await;
            for (call, content) in response.tool_calls.iter().zip(results) {
                request.messages.push(ChatMessage::Tool {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    content,
                });
            }
        }

        Err(AgentError::StepLimit {
            max_steps: self.max_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestScope;
    use crate::repository::playlist::PlaylistRepository;
    use crate::testing::{InMemoryPlaylists, ScriptedModel, text_response, tool_call_response, usage};
    use crate::tools::playlist::playlist_tools;
    use crate::usage::UsageRecorder;
    use cadence_types::llm::LlmError;
    use cadence_types::user::UserId;
    use serde_json::json;

    fn agent(model: Arc<ScriptedModel>, max_steps: usize) -> (Arc<InMemoryPlaylists>, ToolAgent) {
        let repo = Arc::new(InMemoryPlaylists::default());
        let mut tools = ToolRegistry::new();
        tools.extend(playlist_tools(Arc::clone(&repo)));
        (repo, ToolAgent::new(Arc::new(BoxChatModel::new(model)), tools, max_steps))
    }

    #[tokio::test]
    async fn test_tool_results_feed_next_step() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_call_response(
                &[("add_playlist", json!({"name": "Focus Pro", "description": "lo-fi"}))],
                usage(10, 2),
            )),
            Ok(text_response("Listo, agregué Focus Pro", usage(20, 5))),
        ]));
        let (repo, agent) = agent(Arc::clone(&model), 8);
        let recorder = UsageRecorder::new();

        let outcome = RequestScope::new()
            .with_user_id(Some(UserId(1)))
            .with_callback(recorder.clone())
            .run(agent.invoke(vec![ChatMessage::user("agregá Focus Pro")]))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Listo, agregué Focus Pro");
        assert_eq!(outcome.steps, 2);
        assert!(repo.find_by_name(UserId(1), "Focus Pro").await.unwrap().is_some());

        let second = &model.requests()[1];
        assert!(matches!(
            second.messages.last(),
            Some(ChatMessage::Tool { name, content, .. })
                if name == "add_playlist" && content == "Playlist 'Focus Pro' agregada exitosamente: lo-fi"
        ));
        assert_eq!(second.tools.len(), 4);

        let entries = recorder.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.agent == "main_agent"));
    }

    #[tokio::test]
    async fn test_parallel_tool_calls_keep_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_call_response(
                &[("list_playlists", json!({})), ("unknown_tool", json!({}))],
                None,
            )),
            Ok(text_response("ok", None)),
        ]));
        let (_repo, agent) = agent(Arc::clone(&model), 8);
        let outcome = agent.invoke(vec![ChatMessage::user("hola")]).await.unwrap();

        let names: Vec<&str> = outcome
            .messages
            .iter()
            .filter_map(|m| match m {
                ChatMessage::Tool { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["list_playlists", "unknown_tool"]);
    }

    #[tokio::test]
    async fn test_step_limit() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_call_response(&[("list_playlists", json!({}))], None)),
            Ok(tool_call_response(&[("list_playlists", json!({}))], None)),
        ]));
        let (_repo, agent) = agent(model, 2);
        let err = agent.invoke(vec![ChatMessage::user("hola")]).await.unwrap_err();
        assert!(matches!(err, AgentError::StepLimit { max_steps: 2 }));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = Arc::new(ScriptedModel::new(vec![Err(LlmError::RateLimited {
            retry_after_ms: None,
            message: "RESOURCE_EXHAUSTED".to_string(),
        })]));
        let (_repo, agent) = agent(model, 8);
        let err = agent.invoke(vec![ChatMessage::user("hola")]).await.unwrap_err();
        assert!(matches!(err, AgentError::Model(LlmError::RateLimited { .. })));
    }
}
