//! Defines the WebSocket message protocol between the browser client and the API server.

use crate::models;
use folio_core::{turn::TurnState, voice::VoiceDescriptor};
use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the widget and starts a session. This must be the first message.
    Init {
        /// Speech synthesis voices offered by the client platform.
        #[serde(default)]
        voices: Vec<VoiceDescriptor>,
    },
    /// A typed query from the user.
    UserMessage { text: String },
    /// A speech recognition transcript. Interim transcripts are display-only;
    /// a final transcript submits the turn.
    Transcript { text: String, is_final: bool },
    /// Toggles voice mode. The voice list may be refreshed alongside.
    SetVoiceEnabled {
        enabled: bool,
        #[serde(default)]
        voices: Vec<VoiceDescriptor>,
    },
    /// Stages a document for the next query.
    StageAttachment { name: String, data_uri: String },
    /// Removes the staged document.
    RemoveAttachment,
    /// The microphone actually started capturing.
    CaptureStarted,
    /// The microphone failed or permission was denied.
    CaptureError { reason: String },
    /// The progressive reveal of a message finished on screen.
    RevealComplete { message_id: u64 },
    /// Speech playback for the current message finished.
    PlaybackComplete,
    /// Speech playback failed.
    PlaybackError { reason: String },
    /// Clears the conversation.
    Clear,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms session start and delivers the greeting message.
    Initialized { greeting: models::Message },
    /// The turn-taking state after the latest event.
    StateUpdate { state: TurnState },
    /// Signals the beginning of a response reveal.
    ResponseStart { message_id: u64, speakable: bool },
    /// The response text to reveal.
    ResponseChunk { chunk: String },
    /// Signals the end of a response.
    ResponseEnd { message_id: u64 },
    /// Asks the client to speak a message. `audio` carries base64 WAV when
    /// server-side synthesis succeeded; otherwise the client falls back to
    /// local synthesis with the selected voice.
    Speak {
        message_id: u64,
        text: String,
        audio: Option<String>,
    },
    /// Asks the client to start microphone capture after a settle delay.
    StartListening { delay_ms: u64 },
    /// The voice picked for local synthesis, with utterance parameters.
    VoiceSelected {
        name: String,
        lang: String,
        rate: f32,
        pitch: f32,
        volume: f32,
    },
    /// Confirms a staged attachment, with the line to show in the transcript.
    AttachmentStaged { name: String, message: String },
    /// Confirms the staged attachment was removed.
    AttachmentRemoved,
    /// Confirms the conversation was cleared.
    Cleared,
    /// A non-fatal notice to surface inline.
    Notice { message: String },
    /// Reports a fatal error to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_init_parses_with_voices() {
        let raw = r#"{"type": "init", "voices": [{"name": "Daniel", "lang": "en-GB"}]}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Init { voices } => {
                assert_eq!(voices.len(), 1);
                assert_eq!(voices[0].name, "Daniel");
            }
            other => panic!("Expected Init, got {:?}", other),
        }
    }

    #[test]
    fn test_client_message_init_voices_default_empty() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "init"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Init { voices } if voices.is_empty()));
    }

    #[test]
    fn test_client_message_transcript() {
        let raw = r#"{"type": "transcript", "text": "tell me about autosql", "is_final": true}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Transcript { is_final: true, .. }
        ));
    }

    #[test]
    fn test_client_message_unknown_type_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "reboot_server"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_speak_serialization() {
        let msg = ServerMessage::Speak {
            message_id: 7,
            text: "Hello there".to_string(),
            audio: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "speak");
        assert_eq!(value["message_id"], 7);
        assert_eq!(value["audio"], serde_json::Value::Null);
    }

    #[test]
    fn test_server_message_state_update_serialization() {
        let msg = ServerMessage::StateUpdate {
            state: TurnState::Thinking,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "state_update");
        assert_eq!(value["state"], "thinking");
    }
}
