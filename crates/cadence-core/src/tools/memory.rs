//! Memory and knowledge tools.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};

use cadence_types::llm::ToolSpec;

use crate::knowledge::{KnowledgeBase, KnowledgeIndex};
use crate::memory::index::MemoryIndex;
use crate::memory::service::SemanticMemory;
use crate::tools::{Tool, parse_args, spec};

#[derive(Debug, Deserialize)]
struct SaveArgs {
    #[serde(alias = "context")]
    text: String,
}

pub struct SaveContextTool<I: MemoryIndex> {
    memory: Arc<SemanticMemory<I>>,
}

impl<I: MemoryIndex + 'static> Tool for SaveContextTool<I> {
    fn spec(&self) -> ToolSpec {
        spec(
            "save_context",
            "Guarda información del contexto actual (clima, hora, día, mood, playlist recomendada) \
             en la memoria semántica del usuario.",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Resumen del contexto. Puede incluir 'Mood:', 'Clima:', 'Hora:' y 'Playlist:'"}
                },
                "required": ["text"]
            }),
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'_, String> {
        Box::pin(async move {
            match parse_args::<SaveArgs>("save_context", args) {
                Ok(args) => self.memory.save(&args.text).await,
                Err(msg) => msg,
            }
        })
    }
}

fn default_similar_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize)]
struct SimilarArgs {
    #[serde(default)]
    query: String,
    #[serde(default = "default_similar_top_k")]
    top_k: usize,
}

pub struct SimilarContextsTool<I: MemoryIndex> {
    memory: Arc<SemanticMemory<I>>,
}

impl<I: MemoryIndex + 'static> Tool for SimilarContextsTool<I> {
    fn spec(&self) -> ToolSpec {
        spec(
            "get_similar_contexts",
            "Busca contextos previos similares usando búsqueda semántica. \
             Si query está vacío, devuelve los últimos contextos guardados.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Mood, actividad o situación a buscar"},
                    "top_k": {"type": "integer", "description": "Máximo de resultados (por defecto 5)"}
                }
            }),
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'_, String> {
        Box::pin(async move {
            match parse_args::<SimilarArgs>("get_similar_contexts", args) {
                Ok(args) => self.memory.retrieve_similar(&args.query, args.top_k).await,
                Err(msg) => msg,
            }
        })
    }
}

fn default_knowledge_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize)]
struct KnowledgeArgs {
    query: String,
    #[serde(default = "default_knowledge_top_k")]
    top_k: usize,
}

pub struct KnowledgeSearchTool<K: KnowledgeIndex> {
    knowledge: Arc<KnowledgeBase<K>>,
}

impl<K: KnowledgeIndex + 'static> Tool for KnowledgeSearchTool<K> {
    fn spec(&self) -> ToolSpec {
        spec(
            "search_musical_knowledge",
            "Busca en la base de conocimiento musical información sobre géneros, actividades \
             y condiciones ambientales.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Consulta sobre música, actividad o mood"},
                    "top_k": {"type": "integer", "description": "Máximo de resultados (por defecto 3)"}
                },
                "required": ["query"]
            }),
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'_, String> {
        Box::pin(async move {
            match parse_args::<KnowledgeArgs>("search_musical_knowledge", args) {
                Ok(args) => self.knowledge.search(&args.query, args.top_k).await,
                Err(msg) => msg,
            }
        })
    }
}

pub fn memory_tools<I, K>(
    memory: Arc<SemanticMemory<I>>,
    knowledge: Arc<KnowledgeBase<K>>,
) -> Vec<Arc<dyn Tool>>
where
    I: MemoryIndex + 'static,
    K: KnowledgeIndex + 'static,
{
    vec![
        Arc::new(SaveContextTool {
            memory: Arc::clone(&memory),
        }),
        Arc::new(SimilarContextsTool { memory }),
        Arc::new(KnowledgeSearchTool { knowledge }),
    ]
}
