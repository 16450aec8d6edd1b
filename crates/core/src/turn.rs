//! Turn-taking state machine for the conversation widget.
//!
//! Every device event funnels through [`TurnMachine::handle`], which returns
//! the side effects the caller must perform. The machine itself does no IO,
//! so the full conversation cycle is testable without a transport.

use serde::Serialize;

/// Delay before re-arming the microphone after playback finishes, giving the
/// output device time to settle so the mic does not capture trailing audio.
pub const CAPTURE_REARM_DELAY_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Widget closed or conversation cleared.
    Idle,
    /// Open and waiting for the user.
    AwaitingInput,
    /// Microphone is capturing speech.
    Listening,
    /// A response is being generated.
    Thinking,
    /// The response text is being revealed to the user.
    Revealing,
    /// The response is being spoken aloud.
    Speaking,
}

/// An input to the machine: user actions and device callbacks alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// The widget was opened.
    Open,
    /// The user submitted a typed query.
    Submit,
    /// The microphone actually started capturing.
    CaptureStarted,
    /// Speech recognition produced a final transcript.
    TranscriptFinal,
    /// The microphone failed or was denied.
    CaptureError,
    /// A generated response is ready to display.
    ResponseArrived { speakable: bool },
    /// The progressive text reveal finished.
    RevealComplete,
    /// Audio playback finished.
    PlaybackComplete,
    /// Audio playback failed.
    PlaybackError,
    /// The user enabled voice mode.
    VoiceOn,
    /// The user disabled voice mode.
    VoiceOff,
    /// The conversation was cleared.
    Clear,
    /// The widget was closed.
    Close,
}

/// A side effect the caller must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start generating a response for the submitted input.
    BeginTurn,
    /// Begin the progressive text reveal of the arrived response.
    Reveal,
    /// Synthesize speech for the revealed response.
    Synthesize,
    /// Ask the client to start microphone capture after the settle delay.
    StartCapture,
    /// Stop any in-flight or playing speech audio.
    CancelPlayback,
    /// Stop microphone capture.
    CancelCapture,
    /// Discard the in-flight response generation.
    DiscardPending,
}

/// The per-session turn-taking machine.
#[derive(Debug, Clone)]
pub struct TurnMachine {
    state: TurnState,
    voice_mode: bool,
    /// Whether the response currently revealing should be spoken when done.
    speakable: bool,
}

impl Default for TurnMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnMachine {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            voice_mode: false,
            speakable: false,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn voice_mode(&self) -> bool {
        self.voice_mode
    }

    /// Applies one event, returning the effects to perform. Events that are
    /// not valid in the current state are ignored and return no effects.
    pub fn handle(&mut self, event: TurnEvent) -> Vec<Effect> {
        use TurnEvent::*;
        use TurnState::*;

        match event {
            Open => {
                if self.state == Idle {
                    self.state = AwaitingInput;
                }
                vec![]
            }
            Submit => match self.state {
                Idle | AwaitingInput => {
                    self.state = Thinking;
                    vec![Effect::BeginTurn]
                }
                // Submissions while a turn is in flight are dropped, not queued.
                _ => vec![],
            },
            CaptureStarted => {
                if self.state == AwaitingInput {
                    self.state = Listening;
                }
                vec![]
            }
            TranscriptFinal => {
                if self.state == Listening {
                    self.state = Thinking;
                    vec![Effect::BeginTurn]
                } else {
                    vec![]
                }
            }
            CaptureError => {
                if self.state == Listening {
                    self.state = AwaitingInput;
                }
                vec![]
            }
            ResponseArrived { speakable } => {
                if self.state == Thinking {
                    self.state = Revealing;
                    self.speakable = speakable;
                    vec![Effect::Reveal]
                } else {
                    vec![]
                }
            }
            RevealComplete => {
                if self.state != Revealing {
                    return vec![];
                }
                if self.speakable && self.voice_mode {
                    self.state = Speaking;
                    vec![Effect::Synthesize]
                } else {
                    self.state = AwaitingInput;
                    vec![]
                }
            }
            // A failed playback re-arms the mic the same way a finished one
            // does, so a voice conversation survives synthesis hiccups.
            PlaybackComplete | PlaybackError => {
                if self.state != Speaking {
                    return vec![];
                }
                if self.voice_mode {
                    self.state = Listening;
                    vec![Effect::StartCapture]
                } else {
                    self.state = AwaitingInput;
                    vec![]
                }
            }
            VoiceOn => {
                self.voice_mode = true;
                vec![]
            }
            VoiceOff => {
                self.voice_mode = false;
                match self.state {
                    Speaking => {
                        self.state = AwaitingInput;
                        vec![Effect::CancelPlayback]
                    }
                    Listening => {
                        self.state = AwaitingInput;
                        vec![Effect::CancelCapture]
                    }
                    _ => vec![],
                }
            }
            Clear | Close => {
                let mut effects = match self.state {
                    Speaking => vec![Effect::CancelPlayback],
                    Listening => vec![Effect::CancelCapture],
                    Thinking => vec![Effect::DiscardPending],
                    _ => vec![],
                };
                if self.state == Revealing {
                    effects.push(Effect::DiscardPending);
                }
                self.state = Idle;
                self.speakable = false;
                effects
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_machine() -> TurnMachine {
        let mut machine = TurnMachine::new();
        machine.handle(TurnEvent::Open);
        machine
    }

    #[test]
    fn test_open_transitions_to_awaiting_input() {
        let mut machine = TurnMachine::new();
        assert_eq!(machine.state(), TurnState::Idle);
        assert!(machine.handle(TurnEvent::Open).is_empty());
        assert_eq!(machine.state(), TurnState::AwaitingInput);
    }

    #[test]
    fn test_submit_begins_turn() {
        let mut machine = open_machine();
        let effects = machine.handle(TurnEvent::Submit);
        assert_eq!(effects, vec![Effect::BeginTurn]);
        assert_eq!(machine.state(), TurnState::Thinking);
    }

    #[test]
    fn test_submit_is_rejected_while_busy() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::Submit);
        assert!(machine.handle(TurnEvent::Submit).is_empty());
        assert_eq!(machine.state(), TurnState::Thinking);

        machine.handle(TurnEvent::ResponseArrived { speakable: false });
        assert!(machine.handle(TurnEvent::Submit).is_empty());
        assert_eq!(machine.state(), TurnState::Revealing);
    }

    #[test]
    fn test_text_turn_settles_without_speech() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::Submit);
        assert_eq!(
            machine.handle(TurnEvent::ResponseArrived { speakable: false }),
            vec![Effect::Reveal]
        );
        assert!(machine.handle(TurnEvent::RevealComplete).is_empty());
        assert_eq!(machine.state(), TurnState::AwaitingInput);
    }

    #[test]
    fn test_voice_cycle_hands_turn_back_to_mic() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::VoiceOn);
        machine.handle(TurnEvent::CaptureStarted);
        assert_eq!(machine.state(), TurnState::Listening);

        assert_eq!(
            machine.handle(TurnEvent::TranscriptFinal),
            vec![Effect::BeginTurn]
        );
        machine.handle(TurnEvent::ResponseArrived { speakable: true });
        assert_eq!(
            machine.handle(TurnEvent::RevealComplete),
            vec![Effect::Synthesize]
        );
        assert_eq!(machine.state(), TurnState::Speaking);

        assert_eq!(
            machine.handle(TurnEvent::PlaybackComplete),
            vec![Effect::StartCapture]
        );
        assert_eq!(machine.state(), TurnState::Listening);
    }

    #[test]
    fn test_playback_error_still_rearms_mic() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::VoiceOn);
        machine.handle(TurnEvent::Submit);
        machine.handle(TurnEvent::ResponseArrived { speakable: true });
        machine.handle(TurnEvent::RevealComplete);

        assert_eq!(
            machine.handle(TurnEvent::PlaybackError),
            vec![Effect::StartCapture]
        );
        assert_eq!(machine.state(), TurnState::Listening);
    }

    #[test]
    fn test_voice_off_during_reveal_skips_speech() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::VoiceOn);
        machine.handle(TurnEvent::Submit);
        machine.handle(TurnEvent::ResponseArrived { speakable: true });
        machine.handle(TurnEvent::VoiceOff);

        assert!(machine.handle(TurnEvent::RevealComplete).is_empty());
        assert_eq!(machine.state(), TurnState::AwaitingInput);
    }

    #[test]
    fn test_voice_off_while_speaking_cancels_playback() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::VoiceOn);
        machine.handle(TurnEvent::Submit);
        machine.handle(TurnEvent::ResponseArrived { speakable: true });
        machine.handle(TurnEvent::RevealComplete);
        assert_eq!(machine.state(), TurnState::Speaking);

        assert_eq!(
            machine.handle(TurnEvent::VoiceOff),
            vec![Effect::CancelPlayback]
        );
        assert_eq!(machine.state(), TurnState::AwaitingInput);
    }

    #[test]
    fn test_voice_off_while_listening_cancels_capture() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::VoiceOn);
        machine.handle(TurnEvent::CaptureStarted);

        assert_eq!(
            machine.handle(TurnEvent::VoiceOff),
            vec![Effect::CancelCapture]
        );
        assert_eq!(machine.state(), TurnState::AwaitingInput);
    }

    #[test]
    fn test_capture_error_returns_to_awaiting_input() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::VoiceOn);
        machine.handle(TurnEvent::CaptureStarted);

        assert!(machine.handle(TurnEvent::CaptureError).is_empty());
        assert_eq!(machine.state(), TurnState::AwaitingInput);
    }

    #[test]
    fn test_response_after_clear_is_ignored() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::Submit);
        assert_eq!(
            machine.handle(TurnEvent::Clear),
            vec![Effect::DiscardPending]
        );
        assert_eq!(machine.state(), TurnState::Idle);

        // The late response for the discarded turn must not revive it.
        assert!(
            machine
                .handle(TurnEvent::ResponseArrived { speakable: false })
                .is_empty()
        );
        assert_eq!(machine.state(), TurnState::Idle);
    }

    #[test]
    fn test_clear_while_speaking_cancels_playback() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::VoiceOn);
        machine.handle(TurnEvent::Submit);
        machine.handle(TurnEvent::ResponseArrived { speakable: true });
        machine.handle(TurnEvent::RevealComplete);

        assert_eq!(
            machine.handle(TurnEvent::Clear),
            vec![Effect::CancelPlayback]
        );
        assert_eq!(machine.state(), TurnState::Idle);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::Clear);
        assert!(machine.handle(TurnEvent::Clear).is_empty());
        assert_eq!(machine.state(), TurnState::Idle);
    }

    #[test]
    fn test_submit_allowed_directly_from_idle() {
        let mut machine = TurnMachine::new();
        assert_eq!(machine.handle(TurnEvent::Submit), vec![Effect::BeginTurn]);
        assert_eq!(machine.state(), TurnState::Thinking);
    }

    #[test]
    fn test_voice_mode_survives_clear() {
        let mut machine = open_machine();
        machine.handle(TurnEvent::VoiceOn);
        machine.handle(TurnEvent::Clear);
        assert!(machine.voice_mode());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let value = serde_json::to_value(TurnState::AwaitingInput).unwrap();
        assert_eq!(value, "awaiting_input");
    }
}
