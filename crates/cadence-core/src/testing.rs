//! In-memory fakes for the ports, shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Value, json};

use cadence_types::error::RepositoryError;
use cadence_types::knowledge::{KnowledgeRecord, ScoredKnowledge};
use cadence_types::llm::{
    InvocationParams, LlmError, MessageContent, ModelRequest, ModelResponse, RawCompletion,
    ToolCall,
};
use cadence_types::memory::{MemoryRecord, OwnerScope, ScoredMemory};
use cadence_types::message::{HistoryMessage, HistoryRole};
use cadence_types::playlist::Playlist;
use cadence_types::user::UserId;

use crate::environment::EnvironmentProvider;
use crate::knowledge::KnowledgeIndex;
use crate::llm::model::ChatModel;
use crate::memory::embedder::Embedder;
use crate::memory::index::MemoryIndex;
use crate::repository::message::MessageRepository;
use crate::repository::playlist::PlaylistRepository;

const BAG_DIMENSION: usize = 64;

/// Hashes lowercase word tokens into a fixed-size, L2-normalized vector.
/// Texts sharing words end up close; texts without tokens map to zeros.
pub struct BagOfWordsEmbedder;

impl BagOfWordsEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; BAG_DIMENSION];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let bucket = token
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ u32::from(b)).wrapping_mul(16777619));
            vector[bucket as usize % BAG_DIMENSION] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Embedder for BagOfWordsEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dimension(&self) -> usize {
        BAG_DIMENSION
    }
}

/// Embedder that always fails.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        Err(RepositoryError::Embedding("model unavailable".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        BAG_DIMENSION
    }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[derive(Default)]
pub struct InMemoryMemoryIndex {
    rows: Mutex<Vec<(MemoryRecord, Vec<f32>)>>,
}

impl InMemoryMemoryIndex {
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.rows.lock().iter().map(|(r, _)| r.clone()).collect()
    }
}

impl MemoryIndex for InMemoryMemoryIndex {
    async fn add(&self, record: &MemoryRecord, embedding: &[f32]) -> Result<(), RepositoryError> {
        self.rows.lock().push((record.clone(), embedding.to_vec()));
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        scope: OwnerScope,
    ) -> Result<Vec<ScoredMemory>, RepositoryError> {
        let mut hits: Vec<ScoredMemory> = self
            .rows
            .lock()
            .iter()
            .filter(|(record, _)| match scope {
                OwnerScope::Global => true,
                OwnerScope::User(id) => record.user_id == Some(id),
            })
            .map(|(record, vector)| ScoredMemory {
                record: record.clone(),
                score: cosine(embedding, vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.rows.lock().len())
    }
}

#[derive(Default)]
pub struct InMemoryKnowledgeIndex {
    rows: Mutex<Vec<(KnowledgeRecord, Vec<f32>)>>,
}

impl KnowledgeIndex for InMemoryKnowledgeIndex {
    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.rows.lock().len())
    }

    async fn add(
        &self,
        records: &[KnowledgeRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock();
        for (record, vector) in records.iter().zip(embeddings) {
            rows.push((record.clone(), vector.clone()));
        }
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredKnowledge>, RepositoryError> {
        let mut hits: Vec<ScoredKnowledge> = self
            .rows
            .lock()
            .iter()
            .map(|(record, vector)| ScoredKnowledge {
                record: record.clone(),
                score: cosine(embedding, vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[derive(Default)]
pub struct InMemoryPlaylists {
    rows: Mutex<Vec<Playlist>>,
    next_id: AtomicI64,
}

impl PlaylistRepository for InMemoryPlaylists {
    async fn list(&self, user: UserId) -> Result<Vec<Playlist>, RepositoryError> {
        let mut playlists: Vec<Playlist> = self
            .rows
            .lock()
            .iter()
            .filter(|p| p.user_id == user)
            .cloned()
            .collect();
        playlists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(playlists)
    }

    async fn upsert(
        &self,
        user: UserId,
        name: &str,
        description: &str,
    ) -> Result<Playlist, RepositoryError> {
        let mut rows = self.rows.lock();
        let now = Utc::now();
        if let Some(existing) = rows.iter_mut().find(|p| p.user_id == user && p.name == name) {
            existing.description = description.to_string();
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let playlist = Playlist {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: user,
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        rows.push(playlist.clone());
        Ok(playlist)
    }

    async fn find_by_name(
        &self,
        user: UserId,
        name: &str,
    ) -> Result<Option<Playlist>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|p| p.user_id == user && p.name == name)
            .cloned())
    }

    async fn update_description(
        &self,
        user: UserId,
        id: i64,
        description: &str,
    ) -> Result<Option<Playlist>, RepositoryError> {
        let mut rows = self.rows.lock();
        Ok(rows
            .iter_mut()
            .find(|p| p.user_id == user && p.id == id)
            .map(|p| {
                p.description = description.to_string();
                p.updated_at = Utc::now();
                p.clone()
            }))
    }

    async fn delete(&self, user: UserId, id: i64) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|p| !(p.user_id == user && p.id == id));
        Ok(rows.len() != before)
    }
}

#[derive(Default)]
pub struct InMemoryMessages {
    rows: Mutex<Vec<HistoryMessage>>,
}

impl MessageRepository for InMemoryMessages {
    async fn append(
        &self,
        user: UserId,
        role: HistoryRole,
        content: &str,
    ) -> Result<HistoryMessage, RepositoryError> {
        let mut rows = self.rows.lock();
        let message = HistoryMessage {
            id: rows.len() as i64 + 1,
            user_id: user,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        rows.push(message.clone());
        Ok(message)
    }

    async fn list(
        &self,
        user: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryMessage>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .rev()
            .filter(|m| m.user_id == user)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

/// Returns queued responses in order and records every request it saw.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<ModelResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

impl ChatModel for ScriptedModel {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(text_response("(sin respuesta)", None)))
    }
}

/// Share a `ScriptedModel` between a `BoxChatModel` and the test body.
impl ChatModel for std::sync::Arc<ScriptedModel> {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        self.as_ref().invoke(request).await
    }
}

fn completion_with(usage: Option<Value>) -> RawCompletion {
    RawCompletion {
        usage_metadata: usage,
        ..Default::default()
    }
}

fn invocation() -> InvocationParams {
    InvocationParams {
        model: Some("gemini-2.0-flash".to_string()),
        model_name: None,
        temperature: Some(0.7),
    }
}

/// Final assistant turn, optionally carrying `usage_metadata`.
pub fn text_response(text: &str, usage: Option<Value>) -> ModelResponse {
    ModelResponse {
        content: MessageContent::Text(text.to_string()),
        tool_calls: Vec::new(),
        completion: completion_with(usage),
        invocation: invocation(),
    }
}

/// Assistant turn requesting one tool call per `(name, args)` pair.
pub fn tool_call_response(calls: &[(&str, Value)], usage: Option<Value>) -> ModelResponse {
    ModelResponse {
        content: MessageContent::default(),
        tool_calls: calls
            .iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{i}"),
                name: (*name).to_string(),
                arguments: arguments.clone(),
            })
            .collect(),
        completion: completion_with(usage),
        invocation: invocation(),
    }
}

pub fn usage(input: u64, output: u64) -> Option<Value> {
    Some(json!({
        "input_tokens": input,
        "output_tokens": output,
        "total_tokens": input + output,
    }))
}

/// Environment with fixed answers.
pub struct FixedEnvironment;

impl EnvironmentProvider for FixedEnvironment {
    async fn location_and_weather(&self) -> String {
        "Ubicación: Montevideo, Uruguay | Clima: despejado, 21.0°C".to_string()
    }

    fn time_context(&self) -> String {
        "Monday, 9:30 (mañana)".to_string()
    }
}
