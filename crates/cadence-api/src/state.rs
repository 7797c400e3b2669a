//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both the CLI and the
//! REST API. Services in cadence-core are generic over their ports; the type
//! aliases below pin them to the cadence-infra implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use cadence_core::agent::analyzer::ContextAnalyzer;
use cadence_core::agent::executor::ToolAgent;
use cadence_core::chat::service::{ChatService, ChatSettings};
use cadence_core::environment::EnvironmentProvider;
use cadence_core::knowledge::KnowledgeBase;
use cadence_core::llm::box_model::BoxChatModel;
use cadence_core::memory::box_embedder::BoxEmbedder;
use cadence_core::memory::service::SemanticMemory;
use cadence_core::tools::ToolRegistry;
use cadence_core::tools::environment::environment_tools;
use cadence_core::tools::insights::ContextInsightsTool;
use cadence_core::tools::memory::memory_tools;
use cadence_core::tools::playlist::playlist_tools;
use cadence_infra::config::api_key;
use cadence_infra::environment::HttpEnvironment;
use cadence_infra::llm::create_chat_model;
use cadence_infra::sqlite::message::SqliteMessageRepository;
use cadence_infra::sqlite::playlist::SqlitePlaylistRepository;
use cadence_infra::sqlite::pool::DatabasePool;
use cadence_infra::sqlite::user::SqliteUserRepository;
use cadence_infra::vector::embedder::FastEmbedder;
use cadence_infra::vector::knowledge::{LanceKnowledgeIndex, load_knowledge_source};
use cadence_infra::vector::memory::LanceMemoryIndex;
use cadence_types::config::{AgentConfig, AppConfig};

pub type ConcreteChatService =
    ChatService<LanceMemoryIndex, SqlitePlaylistRepository, SqliteMessageRepository>;

pub type ConcreteMemory = SemanticMemory<LanceMemoryIndex>;

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../../../prompts/system_prompt.txt");
const DEFAULT_CONTEXT_PROMPT: &str = include_str!("../../../prompts/context_analyzer.txt");

/// Relational storage. Enough for commands that never talk to the model.
#[derive(Clone)]
pub struct Storage {
    pub db_pool: DatabasePool,
    pub users: Arc<SqliteUserRepository>,
    pub playlists: Arc<SqlitePlaylistRepository>,
    pub messages: Arc<SqliteMessageRepository>,
}

impl Storage {
    pub async fn open(data_dir: &Path, config: &AppConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_pool = DatabasePool::new(&config.database.resolve_url(data_dir)).await?;
        Ok(Self::from_pool(db_pool))
    }

    pub fn from_pool(db_pool: DatabasePool) -> Self {
        Self {
            users: Arc::new(SqliteUserRepository::new(db_pool.clone())),
            playlists: Arc::new(SqlitePlaylistRepository::new(db_pool.clone())),
            messages: Arc::new(SqliteMessageRepository::new(db_pool.clone())),
            db_pool,
        }
    }
}

/// System prompts of the two agents.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub system: String,
    pub context_analyzer: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_analyzer: DEFAULT_CONTEXT_PROMPT.to_string(),
        }
    }
}

impl Prompts {
    /// Built-in prompts, replaced by the files named in `[agent]` when readable.
    pub async fn load(agent: &AgentConfig) -> Self {
        let defaults = Self::default();
        Self {
            system: read_prompt(agent.system_prompt_path.as_deref(), defaults.system).await,
            context_analyzer: read_prompt(
                agent.context_prompt_path.as_deref(),
                defaults.context_analyzer,
            )
            .await,
        }
    }
}

async fn read_prompt(path: Option<&Path>, fallback: String) -> String {
    let Some(path) = path else {
        return fallback;
    };
    match tokio::fs::read_to_string(path).await {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Prompt file not readable, using built-in prompt");
            fallback
        }
    }
}

/// Everything [`AppState::assemble`] needs besides storage.
pub struct Components<E> {
    pub model: BoxChatModel,
    pub embedder: BoxEmbedder,
    pub environment: Arc<E>,
    pub prompts: Prompts,
}

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub memory: Arc<ConcreteMemory>,
    pub memory_index: Arc<LanceMemoryIndex>,
    pub storage: Storage,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Production wiring: Gemini, fastembed, LanceDB and the HTTP environment.
    ///
    /// Fails before anything is opened when `GOOGLE_API_KEY` is missing.
    pub async fn init(data_dir: PathBuf, config: AppConfig) -> anyhow::Result<Self> {
        let key = api_key()?;
        let storage = Storage::open(&data_dir, &config).await?;
        let model = create_chat_model(&config.model, key)?;
        let embedder = FastEmbedder::load(data_dir.join("models")).await?;
        let environment = Arc::new(HttpEnvironment::new()?);
        let prompts = Prompts::load(&config.agent).await;

        let components = Components {
            model,
            embedder: BoxEmbedder::new(embedder),
            environment,
            prompts,
        };
        Ok(Self::assemble(storage, config, data_dir, components).await)
    }

    /// Wire the agents, tools and services over already-built components.
    pub async fn assemble<E: EnvironmentProvider + 'static>(
        storage: Storage,
        config: AppConfig,
        data_dir: PathBuf,
        components: Components<E>,
    ) -> Self {
        let Components {
            model,
            embedder,
            environment,
            prompts,
        } = components;
        let model = Arc::new(model);
        let embedder = Arc::new(embedder);
        let max_steps = config.agent.max_steps;

        let memory_index = Arc::new(LanceMemoryIndex::new(
            config.memory.resolve_index_dir(&data_dir),
        ));
        let memory = Arc::new(SemanticMemory::new(
            Arc::clone(&memory_index),
            Arc::clone(&embedder),
        ));

        let knowledge = Arc::new(KnowledgeBase::new(
            Arc::new(LanceKnowledgeIndex::new(
                config.knowledge.resolve_index_dir(&data_dir),
            )),
            Arc::clone(&embedder),
        ));
        let source = config.knowledge.source.clone();
        match knowledge.ensure_loaded(|| load_knowledge_source(&source)).await {
            Ok(records) => info!(records, "Knowledge store ready"),
            Err(e) => warn!(error = %e, "Knowledge store unavailable"),
        }

        let mut context_tools = ToolRegistry::new();
        context_tools.extend(environment_tools(Arc::clone(&environment)));
        let analyzer = Arc::new(ContextAnalyzer::new(
            ToolAgent::new(Arc::clone(&model), context_tools, max_steps),
            prompts.context_analyzer,
        ));

        let mut tools = ToolRegistry::new();
        tools
            .extend(environment_tools(environment))
            .extend(playlist_tools(Arc::clone(&storage.playlists)))
            .extend(memory_tools(Arc::clone(&memory), knowledge))
            .register(Arc::new(ContextInsightsTool::new(analyzer)));
        info!(tools = ?tools.names(), "Main agent tools registered");

        let agent = Arc::new(ToolAgent::new(model, tools, max_steps));
        let chat_service = ChatService::new(
            Arc::clone(&memory),
            Arc::clone(&storage.playlists),
            Arc::clone(&storage.messages),
            agent,
            prompts.system,
            ChatSettings::from(&config),
        );

        Self {
            chat_service: Arc::new(chat_service),
            memory,
            memory_index,
            storage,
            config: Arc::new(config),
            data_dir,
        }
    }
}
