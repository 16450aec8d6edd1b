//! Main Entrypoint for the Folio API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the knowledge base and the prompt files.
//! 3. Initializing shared services (the LLM and Gemini clients).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use folio_api::{config::Config, router::create_router, state::AppState};
use folio_core::{
    KnowledgeBase, Orchestrator, ToolRegistry,
    gemini::{DocumentAnalyst, GeminiClient, SpeechSynthesizer},
    llm_client::{LLMClient, OpenAICompatibleClient},
};
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in std::fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
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

    // --- 3. Load Knowledge Base and Prompts ---
    let knowledge = Arc::new(
        KnowledgeBase::from_json_file(&config.knowledge_path)
            .context("Failed to load knowledge base")?,
    );
    info!(
        projects = knowledge.projects.len(),
        experience = knowledge.experience.len(),
        "Knowledge base loaded."
    );

    let prompts = load_prompts(&config.prompts_path)?;
    let chat_prompt = prompts
        .get("system_prompt")
        .context("system_prompt.md not found in prompts directory")?
        .clone();
    let document_prompt = prompts
        .get("document_query")
        .context("document_query.md not found in prompts directory")?
        .clone();

    // --- 4. Initialize Shared Services ---
    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.gemini_api_key)
        .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai");
    let llm_client: Arc<dyn LLMClient> = Arc::new(
        OpenAICompatibleClient::new(openai_config, config.chat_model.clone())
            .context("Failed to initialize the chat completion client")?,
    );

    let gemini = Arc::new(
        GeminiClient::new(
            config.gemini_api_key.clone(),
            config.chat_model.clone(),
            config.tts_model.clone(),
            config.tts_voice.clone(),
        )
        .context("Failed to build Gemini client")?,
    );
    let documents: Arc<dyn DocumentAnalyst> = gemini.clone();
    let speech: Arc<dyn SpeechSynthesizer> = gemini;

    let orchestrator = Arc::new(Orchestrator::new(
        llm_client,
        Arc::new(ToolRegistry::new(knowledge)),
        documents,
        speech,
        chat_prompt,
        document_prompt,
    ));

    let app_state = Arc::new(AppState {
        orchestrator,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.chat_model,
        tts_model = %config.tts_model,
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
