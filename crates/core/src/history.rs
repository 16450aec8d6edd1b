//! In-memory conversation history for a single assistant session.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered conversation turns. The first turn is always the fixed system
/// instruction and survives every reset.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn {
                role: Role::System,
                content: system_instruction.into(),
            }],
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.turns[0].content
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::assistant(content));
    }

    /// The user and assistant turns, excluding the system instruction.
    pub fn visible(&self) -> &[ConversationTurn] {
        &self.turns[1..]
    }

    /// Drops every turn except the system instruction. Safe to call when
    /// already empty.
    pub fn clear(&mut self) {
        self.turns.truncate(1);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible().is_empty()
    }
}
