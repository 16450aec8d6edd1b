//! API Models
//!
//! This module defines the data structures for the REST surface and the
//! message lifecycle tracked by the WebSocket session. `utoipa` derives
//! generate the OpenAPI documentation for the REST types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// The assistant's opening line when a session starts.
pub const GREETING: &str = "Hello! I'm Alex, your AI assistant. How can I help you today?";

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Where a message is in its display lifecycle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    /// Generated but not yet shown.
    Pending,
    /// Progressive text reveal in progress.
    Revealing,
    /// Fully displayed.
    Settled,
}

/// A message in the conversation transcript, with its render lifecycle.
///
/// Ids are session-scoped and strictly increasing, so the client can
/// correlate reveal and playback callbacks with the right message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub role: ChatRole,
    pub content: String,
    pub render_state: RenderState,
    /// Whether this message is eligible for speech synthesis.
    pub speakable: bool,
    /// Locked messages are still animating and cannot be edited or re-sent.
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn pending(id: u64, role: ChatRole, content: impl Into<String>, speakable: bool) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            render_state: RenderState::Pending,
            speakable,
            locked: true,
            created_at: Utc::now(),
        }
    }

    /// A message that appears fully rendered, like the greeting.
    pub fn settled(id: u64, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            render_state: RenderState::Settled,
            speakable: false,
            locked: false,
            created_at: Utc::now(),
        }
    }

    pub fn begin_reveal(&mut self) {
        self.render_state = RenderState::Revealing;
        self.locked = true;
    }

    pub fn settle(&mut self) {
        self.render_state = RenderState::Settled;
        self.locked = false;
    }
}

/// A document staged for the next user query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedAttachment {
    pub name: String,
    pub data_uri: String,
}

/// One prior turn supplied by a REST client.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HistoryEntry {
    #[schema(example = "user")]
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatPayload {
    #[schema(example = "Tell me about the AutoSQL project.")]
    pub query: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// When set, the response also carries synthesized speech audio.
    #[serde(default)]
    pub voice: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    /// Base64-encoded WAV audio, present only for voice-mode requests where
    /// synthesis succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DocumentQueryPayload {
    /// The document as a `data:<mimetype>;base64,<encoded_data>` URI.
    pub document_data_uri: String,
    #[schema(example = "Summarize this document.")]
    pub query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentQueryResponse {
    pub success: bool,
    pub response: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SpeechPayload {
    #[schema(example = "Hello! How can I help you today?")]
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

/// A conversation starter offered by the widget before the first turn.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SuggestionPrompt {
    pub title: &'static str,
    pub description: &'static str,
}

pub const SUGGESTION_PROMPTS: [SuggestionPrompt; 6] = [
    SuggestionPrompt {
        title: "Summarize your professional experience.",
        description: "Get a quick overview of Ankit's roles and companies.",
    },
    SuggestionPrompt {
        title: "What are your top 3 machine learning skills?",
        description: "Find out which ML technologies Ankit is most proficient in.",
    },
    SuggestionPrompt {
        title: "Tell me about the AutoSQL project.",
        description: "Learn more about the text-to-SQL generation project.",
    },
    SuggestionPrompt {
        title: "How can I contact you for work?",
        description: "Get information on how to reach out for opportunities.",
    },
    SuggestionPrompt {
        title: "What are you passionate about outside of work?",
        description: "Discover Ankit's personal interests and hobbies.",
    },
    SuggestionPrompt {
        title: "Which certifications do you hold?",
        description: "Ask about professional credentials and certifications.",
    },
];
