//! Switchboard Server
//!
//! HTTP gateway for multi-agent chat sessions. This is a library crate; the
//! server is started via `start_server()`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::Method,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use switchboard_core::agent::default_registry;
use switchboard_core::ai::AiClient;
use switchboard_core::tools::ToolRegistry;
use switchboard_core::{
    AgentEngine, AgentRegistry, CompletionEngine, ConversationRunner, SessionStore,
    TokenAuthenticator,
};

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod types;

pub use config::ServerConfig;

use types::HealthResponse;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<TokenAuthenticator>,
    pub agents: Arc<AgentRegistry>,
    pub store: SessionStore,
    /// None when no model credentials are configured.
    pub runner: Option<ConversationRunner>,
}

impl AppState {
    pub fn new(
        authenticator: TokenAuthenticator,
        agents: Arc<AgentRegistry>,
        store: SessionStore,
        engine: Option<Arc<dyn CompletionEngine>>,
    ) -> Self {
        let runner =
            engine.map(|engine| ConversationRunner::new(store.clone(), agents.clone(), engine));
        Self {
            authenticator: Arc::new(authenticator),
            agents,
            store,
            runner,
        }
    }

    /// Wire the default agent graph and an OpenAI-backed engine from config.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let tools = Arc::new(ToolRegistry::with_builtin_tools());
        let agents = Arc::new(default_registry(&tools, None)?);
        let store = SessionStore::new(config.session_store_config());

        if config.api_secret.is_none() {
            tracing::warn!("API_SECRET is not set; session tokens will not be checked");
        }

        let engine: Option<Arc<dyn CompletionEngine>> = match &config.openai_api_key {
            Some(api_key) => {
                let client = AiClient::new(config.ai_client_config(), api_key.clone());
                let engine: Arc<dyn CompletionEngine> = Arc::new(
                    AgentEngine::new(Arc::new(client), tools, agents.clone())
                        .with_max_turns(config.max_turns),
                );
                Some(engine)
            }
            None => {
                tracing::warn!("OPENAI_API_KEY is not set; chat API will be unavailable");
                None
            }
        };

        Ok(Self::new(
            TokenAuthenticator::new(config.api_secret.as_deref()),
            agents,
            store,
            engine,
        ))
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and block until shutdown.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let sweeper = config
        .session_idle_ttl
        .map(|ttl| state.store.spawn_sweeper(ttl.min(MAX_SWEEP_INTERVAL)));

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!(
        agents = state.agents.len(),
        "Switchboard server listening on http://{}",
        listener.local_addr()?
    );

    let result = axum::serve(listener, build_router(state)).await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_enabled: state.authenticator.is_enabled(),
        engine_configured: state.runner.is_some(),
    })
}
