//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for the chat,
//! document query, and speech endpoints. It uses `utoipa` doc comments to
//! generate OpenAPI documentation.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use folio_core::{ConversationTurn, OrchestratorError, voice};
use std::sync::Arc;
use tracing::{error, warn};

use crate::{
    models::{
        ChatPayload, ChatResponse, ChatRole, DocumentQueryPayload, DocumentQueryResponse,
        ErrorResponse, SUGGESTION_PROMPTS, SpeechPayload, SuggestionPrompt,
    },
    state::AppState,
};
use base64::Engine;

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl ApiError {
    /// Input rejections become 400s with the validation message; upstream
    /// failures become opaque 500s.
    fn from_turn_error(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidInput(message) => ApiError::BadRequest(message),
            OrchestratorError::External(err) => ApiError::InternalServerError(err),
        }
    }
}

/// Ask the portfolio assistant a question.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatPayload,
    responses(
        (status = 200, description = "Assistant response", body = ChatResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponse>, ApiError> {
    let history: Vec<ConversationTurn> = payload
        .history
        .iter()
        .map(|entry| match entry.role {
            ChatRole::User => ConversationTurn::user(entry.content.clone()),
            ChatRole::Assistant => ConversationTurn::assistant(entry.content.clone()),
        })
        .collect();

    let response = state
        .orchestrator
        .answer_from_knowledge(&payload.query, &history)
        .await
        .map_err(ApiError::from_turn_error)?;

    // Voice-mode synthesis is best effort: a TTS failure never fails the turn.
    let audio = if payload.voice {
        let plain = voice::strip_markup(&response);
        match state.orchestrator.synthesize_speech(&plain).await {
            Ok(wav) => Some(base64::engine::general_purpose::STANDARD.encode(wav)),
            Err(e) => {
                warn!(error = %e, "Speech synthesis failed; returning text only");
                None
            }
        }
    } else {
        None
    };

    Ok(Json(ChatResponse {
        success: true,
        response,
        audio,
    }))
}

/// Ask a question about an uploaded document.
#[utoipa::path(
    post,
    path = "/document",
    request_body = DocumentQueryPayload,
    responses(
        (status = 200, description = "Answer grounded in the document", body = DocumentQueryResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn query_document(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DocumentQueryPayload>,
) -> Result<Json<DocumentQueryResponse>, ApiError> {
    let response = state
        .orchestrator
        .answer_from_document(&payload.document_data_uri, &payload.query)
        .await
        .map_err(ApiError::from_turn_error)?;

    Ok(Json(DocumentQueryResponse {
        success: true,
        response,
    }))
}

/// Synthesize speech for a piece of text.
#[utoipa::path(
    post,
    path = "/speech",
    request_body = SpeechPayload,
    responses(
        (status = 200, description = "WAV audio", content_type = "audio/wav"),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn synthesize_speech(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SpeechPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let plain = voice::strip_markup(&payload.text);
    let wav = state
        .orchestrator
        .synthesize_speech(&plain)
        .await
        .map_err(ApiError::from_turn_error)?;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav))
}

/// List the conversation starter prompts shown by the widget.
#[utoipa::path(
    get,
    path = "/suggestions",
    responses(
        (status = 200, description = "Suggestion prompts", body = [SuggestionPrompt])
    )
)]
pub async fn list_suggestions() -> Json<Vec<SuggestionPrompt>> {
    Json(SUGGESTION_PROMPTS.to_vec())
}
