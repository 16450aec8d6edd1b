//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ChatPayload, ChatResponse, ChatRole, DocumentQueryPayload, DocumentQueryResponse,
        ErrorResponse, HistoryEntry, SpeechPayload, SuggestionPrompt,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::chat,
        handlers::query_document,
        handlers::synthesize_speech,
        handlers::list_suggestions,
    ),
    components(
        schemas(ChatPayload, ChatResponse, ChatRole, HistoryEntry, DocumentQueryPayload, DocumentQueryResponse, SpeechPayload, SuggestionPrompt, ErrorResponse)
    ),
    tags(
        (name = "Folio API", description = "Conversational assistant for the portfolio site")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/document", post(handlers::query_document))
        .route("/speech", post(handlers::synthesize_speech))
        .route("/suggestions", get(handlers::list_suggestions))
        .route("/ws", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
