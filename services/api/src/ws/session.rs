//! Manages the WebSocket connection lifecycle for an assistant session.
//!
//! Each connection owns a turn-taking machine, the conversation history, and
//! at most one in-flight generation task plus one in-flight synthesis task.
//! Every client event funnels through the machine; this module only performs
//! the effects the machine returns.

use super::protocol::{ClientMessage, ServerMessage};
use crate::{
    models::{ChatRole, GREETING, Message as ChatMessage, StagedAttachment},
    state::AppState,
};
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use base64::Engine;
use folio_core::{
    ConversationHistory, OrchestratorError,
    turn::{CAPTURE_REARM_DELAY_MS, Effect, TurnEvent, TurnMachine, TurnState},
    voice::{
        SPEECH_LANG, SPEECH_PITCH, SPEECH_RATE, SPEECH_VOLUME, VoiceDescriptor, select_voice,
        strip_markup,
    },
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::{
    sync::Mutex,
    task::{JoinError, JoinHandle},
};
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

type TurnResult = Result<String, OrchestratorError>;
type SpeechResult = Result<Vec<u8>, OrchestratorError>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Performs the `init` handshake, sends the greeting, and then spawns the
/// session event loop.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", session_id.to_string());
    info!("New WebSocket connection. Awaiting initialization...");

    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx = Arc::new(Mutex::new(socket_tx));

    // The first message from the client must be `init`.
    let voices = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Init { voices }) => voices,
            _ => {
                warn!("First message was not a valid `init` message.");
                let mut sink = socket_tx.lock().await;
                let _ = send_msg(
                    &mut sink,
                    ServerMessage::Error {
                        message: "First message must be `init`".to_string(),
                    },
                )
                .await;
                return;
            }
        },
        _ => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };

    let mut session = Session::new(state, socket_tx, voices);
    session.machine.handle(TurnEvent::Open);

    let greeting = ChatMessage::settled(0, ChatRole::Assistant, GREETING);
    if session
        .send(ServerMessage::Initialized { greeting })
        .await
        .is_err()
    {
        error!("Failed to send Initialized message to client.");
        return;
    }
    let _ = session.send_state().await;

    let session_span = tracing::info_span!("assistant_session", %session_id);
    tokio::spawn(
        async move {
            if let Err(e) = run_session(session, socket_rx).await {
                error!(error = ?e, "Assistant session terminated with error.");
            }
            info!("Assistant session finished.");
        }
        .instrument(session_span),
    );
}

/// Per-connection state: the machine, the transcript, and the staging area.
struct Session {
    state: Arc<AppState>,
    socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    machine: TurnMachine,
    history: ConversationHistory,
    voices: Vec<VoiceDescriptor>,
    staged: Option<StagedAttachment>,
    /// The assistant message currently revealing or speaking.
    current: Option<ChatMessage>,
    next_message_id: u64,
}

impl Session {
    fn new(
        state: Arc<AppState>,
        socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
        voices: Vec<VoiceDescriptor>,
    ) -> Self {
        let history = ConversationHistory::new(state.orchestrator.chat_prompt());
        Self {
            state,
            socket_tx,
            machine: TurnMachine::new(),
            history,
            voices,
            staged: None,
            current: None,
            // Id 0 is the greeting.
            next_message_id: 1,
        }
    }

    async fn send(&self, msg: ServerMessage) -> Result<()> {
        let mut sink = self.socket_tx.lock().await;
        send_msg(&mut sink, msg).await
    }

    async fn send_state(&self) -> Result<()> {
        self.send(ServerMessage::StateUpdate {
            state: self.machine.state(),
        })
        .await
    }

    async fn notice(&self, message: impl Into<String>) -> Result<()> {
        self.send(ServerMessage::Notice {
            message: message.into(),
        })
        .await
    }

    /// Validates and submits a typed or transcribed query.
    async fn submit(
        &mut self,
        text: &str,
        event: TurnEvent,
        pending_turn: &mut Option<JoinHandle<TurnResult>>,
    ) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.notice("Query is required and must be a non-empty string")
                .await?;
            return Ok(());
        }

        let effects = self.machine.handle(event);
        if effects.contains(&Effect::BeginTurn) {
            self.start_turn(trimmed.to_string(), pending_turn);
        } else {
            debug!("Submission ignored while a turn is in flight.");
        }
        self.send_state().await
    }

    /// Spawns response generation for the submitted query. A staged document
    /// routes the turn through document analysis instead of knowledge chat.
    fn start_turn(&mut self, query: String, pending_turn: &mut Option<JoinHandle<TurnResult>>) {
        let orchestrator = self.state.orchestrator.clone();
        // The orchestrator appends the query itself, so capture the history
        // before recording the new user turn.
        let prior_turns = self.history.visible().to_vec();
        self.history.push_user(query.clone());

        let handle = match self.staged.take() {
            Some(attachment) => {
                info!(document = %attachment.name, "Starting document turn");
                tokio::spawn(async move {
                    orchestrator
                        .answer_from_document(&attachment.data_uri, &query)
                        .await
                })
            }
            None => tokio::spawn(async move {
                orchestrator.answer_from_knowledge(&query, &prior_turns).await
            }),
        };
        *pending_turn = Some(handle);
    }

    /// Handles the completion of a generation task.
    async fn finish_turn(&mut self, result: Result<TurnResult, JoinError>) -> Result<()> {
        if self.machine.state() != TurnState::Thinking {
            debug!("Discarding response for a turn that is no longer active.");
            return Ok(());
        }

        let content = match result {
            Ok(Ok(text)) => text,
            Ok(Err(OrchestratorError::InvalidInput(message))) => message,
            Ok(Err(OrchestratorError::External(e))) => {
                warn!(error = ?e, "Turn generation failed");
                "I'm sorry, something went wrong while generating a response. Please try again."
                    .to_string()
            }
            Err(e) => {
                error!(error = ?e, "Turn generation task panicked or was aborted");
                "I'm sorry, something went wrong while generating a response. Please try again."
                    .to_string()
            }
        };

        self.history.push_assistant(content.clone());
        let id = self.next_message_id;
        self.next_message_id += 1;

        let speakable = self.machine.voice_mode();
        let effects = self.machine.handle(TurnEvent::ResponseArrived { speakable });
        if effects.contains(&Effect::Reveal) {
            let mut message =
                ChatMessage::pending(id, ChatRole::Assistant, content.clone(), speakable);
            message.begin_reveal();
            debug!(message_id = message.id, role = %message.role, "Revealing assistant response");
            self.current = Some(message);
            self.send(ServerMessage::ResponseStart {
                message_id: id,
                speakable,
            })
            .await?;
            self.send(ServerMessage::ResponseChunk { chunk: content }).await?;
            self.send(ServerMessage::ResponseEnd { message_id: id }).await?;
        }
        self.send_state().await
    }

    /// Handles the client reporting that a reveal finished.
    async fn reveal_complete(
        &mut self,
        message_id: u64,
        pending_speech: &mut Option<JoinHandle<SpeechResult>>,
    ) -> Result<()> {
        if self.current.as_ref().map(|c| c.id) != Some(message_id) {
            debug!(message_id, "Reveal callback for an unknown message; ignored.");
            return Ok(());
        }

        if let Some(message) = self.current.as_mut() {
            message.settle();
        }
        let effects = self.machine.handle(TurnEvent::RevealComplete);
        if effects.contains(&Effect::Synthesize) {
            self.begin_speech(pending_speech);
        } else {
            self.current = None;
        }
        self.send_state().await
    }

    /// Spawns speech synthesis for the message that just finished revealing.
    fn begin_speech(&mut self, pending_speech: &mut Option<JoinHandle<SpeechResult>>) {
        let Some(current) = &self.current else {
            return;
        };
        let plain = strip_markup(&current.content);
        let orchestrator = self.state.orchestrator.clone();
        *pending_speech =
            Some(tokio::spawn(
                async move { orchestrator.synthesize_speech(&plain).await },
            ));
    }

    /// Handles the completion of a synthesis task. Synthesis failures fall
    /// back to client-side speech rather than breaking the voice cycle.
    async fn finish_speech(&mut self, result: Result<SpeechResult, JoinError>) -> Result<()> {
        if self.machine.state() != TurnState::Speaking {
            debug!("Discarding audio for a turn that is no longer speaking.");
            return Ok(());
        }
        let Some(current) = &self.current else {
            return Ok(());
        };

        let audio = match result {
            Ok(Ok(wav)) => Some(base64::engine::general_purpose::STANDARD.encode(wav)),
            Ok(Err(e)) => {
                warn!(error = %e, "Speech synthesis failed; falling back to client voice");
                None
            }
            Err(e) => {
                error!(error = ?e, "Speech synthesis task panicked or was aborted");
                None
            }
        };

        self.send(ServerMessage::Speak {
            message_id: current.id,
            text: strip_markup(&current.content),
            audio,
        })
        .await
    }

    /// Handles playback finishing or failing on the client.
    async fn playback_done(&mut self, event: TurnEvent) -> Result<()> {
        let effects = self.machine.handle(event);
        self.current = None;
        if effects.contains(&Effect::StartCapture) {
            self.send(ServerMessage::StartListening {
                delay_ms: CAPTURE_REARM_DELAY_MS,
            })
            .await?;
        }
        self.send_state().await
    }

    async fn set_voice_enabled(
        &mut self,
        enabled: bool,
        voices: Vec<VoiceDescriptor>,
        pending_speech: &mut Option<JoinHandle<SpeechResult>>,
    ) -> Result<()> {
        if !voices.is_empty() {
            self.voices = voices;
        }

        if enabled {
            self.machine.handle(TurnEvent::VoiceOn);
            match select_voice(&self.voices) {
                Some(voice) => {
                    info!(voice = %voice.name, "Voice mode enabled");
                    self.send(ServerMessage::VoiceSelected {
                        name: voice.name.clone(),
                        lang: voice.lang.clone(),
                        rate: SPEECH_RATE,
                        pitch: SPEECH_PITCH,
                        volume: SPEECH_VOLUME,
                    })
                    .await?;
                }
                None => {
                    warn!("Voice mode enabled but the client offered no voices.");
                    self.send(ServerMessage::VoiceSelected {
                        name: String::new(),
                        lang: SPEECH_LANG.to_string(),
                        rate: SPEECH_RATE,
                        pitch: SPEECH_PITCH,
                        volume: SPEECH_VOLUME,
                    })
                    .await?;
                }
            }
        } else {
            let effects = self.machine.handle(TurnEvent::VoiceOff);
            if effects.contains(&Effect::CancelPlayback) {
                abort_pending(pending_speech);
            }
            info!("Voice mode disabled by client.");
        }
        self.send_state().await
    }

    async fn stage_attachment(&mut self, name: String, data_uri: String) -> Result<()> {
        if !data_uri.starts_with("data:") {
            self.notice("Invalid document data URI format").await?;
            return Ok(());
        }
        let message = format!("Loaded \"{}\". What would you like to know about it?", name);
        self.staged = Some(StagedAttachment {
            name: name.clone(),
            data_uri,
        });
        self.send(ServerMessage::AttachmentStaged { name, message })
            .await
    }

    /// Clears the conversation: cancels in-flight work, resets the history to
    /// its system turn, and drops the staged attachment.
    async fn clear(
        &mut self,
        pending_turn: &mut Option<JoinHandle<TurnResult>>,
        pending_speech: &mut Option<JoinHandle<SpeechResult>>,
    ) -> Result<()> {
        let effects = self.machine.handle(TurnEvent::Clear);
        if effects.contains(&Effect::CancelPlayback) {
            abort_pending(pending_speech);
        }
        if effects.contains(&Effect::DiscardPending) {
            abort_pending(pending_turn);
            abort_pending(pending_speech);
        }
        self.history.clear();
        self.staged = None;
        self.current = None;

        // The widget stays open, so the machine is immediately re-armed.
        self.machine.handle(TurnEvent::Open);
        self.send(ServerMessage::Cleared).await?;
        self.send_state().await
    }
}

/// The main event loop for an active WebSocket session.
async fn run_session(mut session: Session, mut socket_rx: SplitStream<WebSocket>) -> Result<()> {
    let mut pending_turn: Option<JoinHandle<TurnResult>> = None;
    let mut pending_speech: Option<JoinHandle<SpeechResult>> = None;

    loop {
        tokio::select! {
            msg_result = socket_rx.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                handle_client_message(
                                    &mut session,
                                    msg,
                                    &mut pending_turn,
                                    &mut pending_speech,
                                )
                                .await?;
                            }
                            Err(e) => warn!(error = %e, "Ignoring unparseable client message."),
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client sent close frame. Shutting down session.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                    None => break,
                }
            },
            result = next_completion(&mut pending_turn) => {
                session.finish_turn(result).await?;
            },
            result = next_completion(&mut pending_speech) => {
                session.finish_speech(result).await?;
            },
        }
    }

    session.machine.handle(TurnEvent::Close);
    abort_pending(&mut pending_turn);
    abort_pending(&mut pending_speech);
    info!("WebSocket connection closed and session terminated.");
    Ok(())
}

async fn handle_client_message(
    session: &mut Session,
    msg: ClientMessage,
    pending_turn: &mut Option<JoinHandle<TurnResult>>,
    pending_speech: &mut Option<JoinHandle<SpeechResult>>,
) -> Result<()> {
    match msg {
        ClientMessage::Init { .. } => {
            warn!("Ignoring repeated `init` message.");
            Ok(())
        }
        ClientMessage::UserMessage { text } => {
            session.submit(&text, TurnEvent::Submit, pending_turn).await
        }
        ClientMessage::Transcript { text, is_final } => {
            if is_final {
                session
                    .submit(&text, TurnEvent::TranscriptFinal, pending_turn)
                    .await
            } else {
                // Interim transcripts are rendered locally by the client.
                Ok(())
            }
        }
        ClientMessage::SetVoiceEnabled { enabled, voices } => {
            session
                .set_voice_enabled(enabled, voices, pending_speech)
                .await
        }
        ClientMessage::StageAttachment { name, data_uri } => {
            session.stage_attachment(name, data_uri).await
        }
        ClientMessage::RemoveAttachment => {
            session.staged = None;
            session.send(ServerMessage::AttachmentRemoved).await
        }
        ClientMessage::CaptureStarted => {
            session.machine.handle(TurnEvent::CaptureStarted);
            session.send_state().await
        }
        ClientMessage::CaptureError { reason } => {
            warn!(%reason, "Client reported a capture error");
            session.machine.handle(TurnEvent::CaptureError);
            session
                .notice(format!("Speech recognition error: {}", reason))
                .await?;
            session.send_state().await
        }
        ClientMessage::RevealComplete { message_id } => {
            session.reveal_complete(message_id, pending_speech).await
        }
        ClientMessage::PlaybackComplete => {
            session.playback_done(TurnEvent::PlaybackComplete).await
        }
        ClientMessage::PlaybackError { reason } => {
            warn!(%reason, "Client reported a playback error");
            session.playback_done(TurnEvent::PlaybackError).await
        }
        ClientMessage::Clear => session.clear(pending_turn, pending_speech).await,
    }
}

/// Resolves when the task in `slot` completes, clearing the slot. Pends
/// forever while the slot is empty so it can sit in a `select!` arm.
async fn next_completion<T>(slot: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match slot.as_mut() {
        Some(handle) => {
            let result = handle.await;
            *slot = None;
            result
        }
        None => std::future::pending().await,
    }
}

fn abort_pending<T>(slot: &mut Option<JoinHandle<T>>) {
    if let Some(handle) = slot.take() {
        handle.abort();
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
