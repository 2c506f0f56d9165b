//! Main Entrypoint for the Tutoring API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the challenge API and LLM clients and the two agents.
//! 3. Starting the idle-session eviction sweep.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tutor_api::{
    config::Config, conversation_log::ConversationLogger, router::create_router,
    state::AppState, store::SessionStore, tutoring::TutoringService,
};
use tutor_core::{
    challenge::{ChallengeApi, HttpChallengeClient},
    llm_client::{LLMClient, OpenAICompatibleClient, RetryingLLMClient},
    prompts::PromptSet,
    tutor::TutorAgent,
    understanding::UnderstandingAgent,
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Loads prompt overrides from a directory. A missing directory means no
/// overrides.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    if !prompts_path.is_dir() {
        warn!(path = %prompts_path.display(), "Prompts directory not found, using built-in prompts");
        return Ok(prompts);
    }
    for entry in fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt {}", path.display()))?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let prompts = Arc::new(PromptSet::with_overrides(load_prompts(&config.prompts_path)?));

    info!(provider = ?config.provider, api_base = %config.llm_api_base, "Using LLM provider.");
    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.llm_api_key)
        .with_api_base(&config.llm_api_base);
    let llm_client: Arc<dyn LLMClient> = Arc::new(RetryingLLMClient::new(
        Arc::new(OpenAICompatibleClient::new(
            openai_config,
            config.chat_model.clone(),
        )),
        config.retry.clone(),
    ));

    let challenge: Arc<dyn ChallengeApi> = Arc::new(HttpChallengeClient::new(
        &config.challenge_api_base,
        &config.challenge_api_key,
        config.upstream_timeout,
        config.retry.clone(),
    )?);

    let conversation_log = Arc::new(
        ConversationLogger::new(&config.log_dir)
            .await
            .context("Failed to initialize conversation log")?,
    );
    info!(path = %conversation_log.path().display(), "Conversation log ready.");

    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    tokio::spawn(sessions.clone().sweep_forever(config.sweep_interval));

    let tutoring = Arc::new(TutoringService::new(
        challenge.clone(),
        UnderstandingAgent::new(llm_client.clone(), prompts.clone()),
        TutorAgent::new(llm_client, prompts),
        sessions,
        conversation_log.clone(),
        config.max_turns,
    ));

    let app_state = Arc::new(AppState {
        tutoring,
        challenge,
        conversation_log,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        max_turns = config.max_turns,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
