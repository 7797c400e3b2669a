//! ChatService -- runs one chat turn end to end.
//!
//! A turn enters a fresh request scope (user id plus a new usage recorder),
//! answers shortcuts directly, and otherwise retrieves relevant memories,
//! runs the tool agent, saves a compact summary of the exchange to semantic
//! memory and appends both messages to the persistent history.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cadence_types::config::AppConfig;
use cadence_types::llm::ChatMessage;
use cadence_types::message::HistoryRole;
use cadence_types::user::UserId;

use crate::agent::executor::ToolAgent;
use crate::context::{self, RequestScope};
use crate::memory::index::MemoryIndex;
use crate::memory::service::SemanticMemory;
use crate::repository::message::MessageRepository;
use crate::repository::playlist::PlaylistRepository;
use crate::tools::playlist::describe_playlists;
use crate::usage::UsageRecorder;

use super::shortcut::{HELP_TEXT, Shortcut};
use super::thread::{ConversationThreads, DEFAULT_THREAD_CAPACITY, thread_key};
use super::{ChatError, ChatPhase, ChatReply, MAX_MESSAGE_CHARS};

/// Tunables for a chat turn.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub context_top_k: usize,
    pub recall_top_k: usize,
    pub summary_max_chars: usize,
    pub thread_capacity: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ChatSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            context_top_k: config.memory.context_top_k,
            recall_top_k: config.memory.recall_top_k,
            summary_max_chars: config.agent.summary_max_chars,
            thread_capacity: DEFAULT_THREAD_CAPACITY,
        }
    }
}

pub struct ChatService<I: MemoryIndex, P: PlaylistRepository, M: MessageRepository> {
    memory: Arc<SemanticMemory<I>>,
    playlists: Arc<P>,
    messages: Arc<M>,
    agent: Arc<ToolAgent>,
    system_prompt: String,
    settings: ChatSettings,
    threads: ConversationThreads,
}

impl<I, P, M> ChatService<I, P, M>
where
    I: MemoryIndex,
    P: PlaylistRepository,
    M: MessageRepository,
{
    pub fn new(
        memory: Arc<SemanticMemory<I>>,
        playlists: Arc<P>,
        messages: Arc<M>,
        agent: Arc<ToolAgent>,
        system_prompt: impl Into<String>,
        settings: ChatSettings,
    ) -> Self {
        let threads = ConversationThreads::new(settings.thread_capacity);
        Self {
            memory,
            playlists,
            messages,
            agent,
            system_prompt: system_prompt.into(),
            settings,
            threads,
        }
    }

    pub fn threads(&self) -> &ConversationThreads {
        &self.threads
    }

    /// Answer `message` on behalf of `user`.
    ///
    /// Values already in the caller's context (environment mocks, extra
    /// callbacks) stay visible to the turn. The usage in the returned
    /// `Expense` covers only this turn.
    pub async fn respond(
        &self,
        user: Option<UserId>,
        message: &str,
    ) -> Result<ChatReply, ChatError> {
        self.respond_in_thread(user, message, &thread_key(user)).await
    }

    /// Like [`respond`](Self::respond), but continues the conversation thread
    /// `thread` instead of the user's default one.
    pub async fn respond_in_thread(
        &self,
        user: Option<UserId>,
        message: &str,
        thread: &str,
    ) -> Result<ChatReply, ChatError> {
        validate(message)?;
        let recorder = UsageRecorder::new();
        let scope = RequestScope::capture()
            .with_user_id(user)
            .with_callback(recorder.clone());

        let reply = scope.run(self.turn(user, message, thread)).await?;

        if let Some(user) = user {
            self.record_history(user, message, &reply).await;
        }
        Ok(ChatReply {
            reply,
            expense: recorder.breakdown().into_expense(),
        })
    }

    async fn turn(
        &self,
        user: Option<UserId>,
        message: &str,
        thread: &str,
    ) -> Result<String, ChatError> {
        let mut phase = ChatPhase::Idle;
        advance(&mut phase, ChatPhase::ContextEstablished);

        if let Some(shortcut) = Shortcut::parse(message) {
            debug!(?shortcut, "Answering shortcut");
            let reply = match shortcut {
                Shortcut::Help => HELP_TEXT.to_string(),
                Shortcut::Playlists => describe_playlists(self.playlists.as_ref(), user).await,
                Shortcut::Memory => {
                    self.memory
                        .retrieve_similar("", self.settings.recall_top_k)
                        .await
                }
            };
            advance(&mut phase, ChatPhase::Responded);
            return Ok(reply);
        }

        let memory = self
            .memory
            .retrieve_similar(message, self.settings.context_top_k)
            .await;
        advance(&mut phase, ChatPhase::MemoryRetrieved);

        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::system(format!("Memoria relevante del usuario (si existe):\n{memory}")),
        ];
        messages.extend(self.threads.history(thread));
        messages.push(ChatMessage::user(message));

        advance(&mut phase, ChatPhase::ModelInvoked);
        let outcome = match self.agent.invoke(messages).await {
            Ok(outcome) => outcome,
            Err(e) => {
                advance(&mut phase, ChatPhase::Failed);
                warn!(error = %e, user_id = ?user, "Agent invocation failed");
                return Err(ChatError::from_agent(e));
            }
        };
        let reply = outcome.reply;

        let summary = summarize(message, &reply, self.settings.summary_max_chars);
        let saved = self.memory.save(&summary).await;
        debug!(result = %saved, "Persisted interaction summary");
        advance(&mut phase, ChatPhase::MemoryPersisted);

        self.threads.append_exchange(thread, message, &reply);
        advance(&mut phase, ChatPhase::Responded);
        info!(
            user_id = ?context::current_user_id(),
            steps = outcome.steps,
            reply_chars = reply.chars().count(),
            "Chat turn completed"
        );
        Ok(reply)
    }

    async fn record_history(&self, user: UserId, message: &str, reply: &str) {
        for (role, content) in [(HistoryRole::User, message), (HistoryRole::Assistant, reply)] {
            if let Err(e) = self.messages.append(user, role, content).await {
                warn!(error = %e, user_id = %user, "Failed to append chat history");
            }
        }
    }
}

fn advance(phase: &mut ChatPhase, next: ChatPhase) {
    debug!(from = ?phase, to = ?next, "Chat phase");
    *phase = next;
}

fn validate(message: &str) -> Result<(), ChatError> {
    if message.is_empty() {
        return Err(ChatError::Validation("message must not be empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::Validation(format!(
            "message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

/// `"Usuario: {message}\nAsistente: {reply}"`, cut to `max_chars` characters.
pub fn summarize(message: &str, reply: &str, max_chars: usize) -> String {
    let summary = format!("Usuario: {}\nAsistente: {}", message.trim(), reply.trim());
    if summary.chars().count() > max_chars {
        summary.chars().take(max_chars).collect()
    } else {
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_model::BoxChatModel;
    use crate::memory::box_embedder::BoxEmbedder;
    use crate::repository::playlist::seed_default_playlists;
    use crate::testing::{
        BagOfWordsEmbedder, InMemoryMemoryIndex, InMemoryMessages, InMemoryPlaylists,
        ScriptedModel, text_response, tool_call_response, usage,
    };
    use crate::tools::ToolRegistry;
    use crate::tools::playlist::playlist_tools;
    use cadence_types::llm::LlmError;
    use cadence_types::usage::Expense;
    use serde_json::json;

    type TestService = ChatService<InMemoryMemoryIndex, InMemoryPlaylists, InMemoryMessages>;

    struct Fixture {
        service: TestService,
        model: Arc<ScriptedModel>,
        memory: Arc<SemanticMemory<InMemoryMemoryIndex>>,
        playlists: Arc<InMemoryPlaylists>,
        messages: Arc<InMemoryMessages>,
    }

    fn fixture(responses: Vec<Result<cadence_types::llm::ModelResponse, LlmError>>) -> Fixture {
        let model = Arc::new(ScriptedModel::new(responses));
        let memory = Arc::new(SemanticMemory::new(
            Arc::new(InMemoryMemoryIndex::default()),
            Arc::new(BoxEmbedder::new(BagOfWordsEmbedder)),
        ));
        let playlists = Arc::new(InMemoryPlaylists::default());
        let messages = Arc::new(InMemoryMessages::default());
        let mut tools = ToolRegistry::new();
        tools.extend(playlist_tools(Arc::clone(&playlists)));
        let agent = Arc::new(ToolAgent::new(
            Arc::new(BoxChatModel::new(Arc::clone(&model))),
            tools,
            8,
        ));
        let service = ChatService::new(
            Arc::clone(&memory),
            Arc::clone(&playlists),
            Arc::clone(&messages),
            agent,
            "Sos un recomendador musical.",
            ChatSettings::default(),
        );
        Fixture {
            service,
            model,
            memory,
            playlists,
            messages,
        }
    }

    #[tokio::test]
    async fn test_shortcuts_skip_the_model() {
        let f = fixture(vec![]);
        seed_default_playlists(f.playlists.as_ref(), UserId(1)).await.unwrap();

        let help = f.service.respond(Some(UserId(1)), " Help ").await.unwrap();
        assert_eq!(help.reply, HELP_TEXT);
        assert_eq!(help.expense, Expense::default());

        let playlists = f.service.respond(Some(UserId(1)), "playlists").await.unwrap();
        assert!(playlists.reply.starts_with("Playlists disponibles:\n- "));
        assert!(playlists.reply.contains("Focus Flow"));

        let memory = f.service.respond(Some(UserId(1)), "MEMORIA").await.unwrap();
        assert_eq!(memory.reply, "No hay contextos previos almacenados");

        assert!(f.model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_turn_builds_prompt_and_saves_summary() {
        let f = fixture(vec![Ok(text_response(
            "Te recomiendo Focus Flow",
            usage(100, 20),
        ))]);

        let reply = f
            .service
            .respond(Some(UserId(1)), "quiero estudiar")
            .await
            .unwrap();
        assert_eq!(reply.reply, "Te recomiendo Focus Flow");
        assert_eq!(reply.expense.total.total_tokens, Some(120));
        assert_eq!(reply.expense.breakdown.len(), 1);
        assert_eq!(reply.expense.breakdown[0].agent, "main_agent");
        assert_eq!(
            reply.expense.breakdown[0].model.as_deref(),
            Some("gemini-2.0-flash")
        );

        let request = &f.model.requests()[0];
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0], ChatMessage::system("Sos un recomendador musical."));
        assert_eq!(
            request.messages[1],
            ChatMessage::system(
                "Memoria relevante del usuario (si existe):\nNo hay contextos previos almacenados"
            )
        );
        assert_eq!(request.messages[2], ChatMessage::user("quiero estudiar"));

        let records = f.memory.index().records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].text,
            "Usuario: quiero estudiar\nAsistente: Te recomiendo Focus Flow"
        );
        assert_eq!(records[0].user_id, Some(UserId(1)));

        let history = f.messages.list(UserId(1), 10, 0).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, HistoryRole::Assistant);
        assert_eq!(history[1].content, "quiero estudiar");
    }

    #[tokio::test]
    async fn test_follow_up_sees_previous_exchange() {
        let f = fixture(vec![
            Ok(text_response("Probá Rainy Mood", None)),
            Ok(text_response("Claro, algo más tranquilo", None)),
        ]);
        f.service.respond(Some(UserId(5)), "llueve").await.unwrap();
        f.service.respond(Some(UserId(5)), "algo más tranquilo").await.unwrap();

        let second = &f.model.requests()[1];
        assert_eq!(second.messages.len(), 5);
        assert_eq!(second.messages[2], ChatMessage::user("llueve"));
        assert_eq!(second.messages[3], ChatMessage::assistant("Probá Rainy Mood"));
        assert!(matches!(
            &second.messages[1],
            ChatMessage::System { content } if content.contains("Contextos similares a 'algo más tranquilo'")
        ));
    }

    #[tokio::test]
    async fn test_separate_threads_do_not_share_history() {
        let f = fixture(vec![
            Ok(text_response("Probá Rainy Mood", None)),
            Ok(text_response("Gym Boost", None)),
        ]);
        f.service
            .respond_in_thread(Some(UserId(5)), "llueve", "user:5:case:C01")
            .await
            .unwrap();
        f.service
            .respond_in_thread(Some(UserId(5)), "voy al gym", "user:5:case:C02")
            .await
            .unwrap();

        assert_eq!(f.model.requests()[1].messages.len(), 3);
        assert_eq!(f.service.threads().history("user:5:case:C01").len(), 2);
        assert!(f.service.threads().history("user:5").is_empty());
    }

    #[tokio::test]
    async fn test_tool_usage_and_playlist_change() {
        let f = fixture(vec![
            Ok(tool_call_response(
                &[("add_playlist", json!({"name": "Focus Pro", "description": "lo-fi"}))],
                usage(50, 5),
            )),
            Ok(text_response("Agregada", usage(70, 3))),
        ]);
        let reply = f
            .service
            .respond(Some(UserId(2)), "Agregá Focus Pro")
            .await
            .unwrap();
        assert_eq!(reply.expense.total.input_tokens, Some(120));
        assert_eq!(reply.expense.breakdown[0].total_tokens, 128);
        assert!(
            f.playlists
                .find_by_name(UserId(2), "Focus Pro")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_quota_error_and_state_restored() {
        let f = fixture(vec![Err(LlmError::Provider {
            message: "429 RESOURCE_EXHAUSTED".to_string(),
        })]);
        let err = f.service.respond(Some(UserId(1)), "hola").await.unwrap_err();
        assert!(matches!(err, ChatError::QuotaExceeded(_)));
        assert!(f.memory.index().records().is_empty());
        assert_eq!(context::current_user_id(), None);
    }

    #[tokio::test]
    async fn test_validation() {
        let f = fixture(vec![]);
        assert!(matches!(
            f.service.respond(None, "").await,
            Err(ChatError::Validation(_))
        ));
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            f.service.respond(None, &long).await,
            Err(ChatError::Validation(_))
        ));
    }

    #[test]
    fn test_summary_is_truncated_by_chars() {
        let summary = summarize(" hola ", &"é".repeat(2000), 900);
        assert_eq!(summary.chars().count(), 900);
        assert!(summary.starts_with("Usuario: hola\nAsistente: é"));
    }
}
