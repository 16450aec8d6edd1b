//! Core engine for the portfolio assistant: the knowledge base and its
//! retrieval tools, the dialogue orchestrator, media codecs, and the
//! turn-taking state machine. Transport concerns live in the API service.

pub mod audio;
pub mod gemini;
pub mod history;
pub mod knowledge;
pub mod llm_client;
pub mod orchestrator;
pub mod tools;
pub mod turn;
pub mod voice;

pub use history::{ConversationHistory, ConversationTurn, Role};
pub use knowledge::KnowledgeBase;
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use tools::ToolRegistry;
pub use turn::{Effect, TurnEvent, TurnMachine, TurnState};
