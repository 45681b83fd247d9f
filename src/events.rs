use serde::{Deserialize, Serialize};

use crate::controller::TurnOutcome;
use crate::error::StateError;

/// Internal application events delivered to the UI loop from background tasks
#[derive(Debug)]
pub enum AppEvent {
    /// Network part of a turn finished
    TurnCompleted(TurnOutcome),

    /// Speech recognition produced a transcript
    Transcript(String),

    /// Speech recognition failed or heard nothing
    SpeechFailed(String),
}

/// How the next piece of user input is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingInput {
    /// Regular chat message
    #[default]
    Normal,
    /// Next input is the user's phone number
    AwaitingPhone,
    /// Next input is the one-time password sent to that phone
    AwaitingOtp,
}

impl PendingInput {
    pub fn display_name(&self) -> &'static str {
        match self {
            PendingInput::Normal => "Chat",
            PendingInput::AwaitingPhone => "Phone number",
            PendingInput::AwaitingOtp => "One-time password",
        }
    }

    pub fn can_transition_to(&self, next: PendingInput) -> bool {
        matches!(
            (self, next),
            (PendingInput::Normal, PendingInput::AwaitingPhone)
                | (PendingInput::AwaitingPhone, PendingInput::AwaitingOtp)
                | (PendingInput::AwaitingOtp, PendingInput::Normal)
        )
    }

    /// Validated transition; anything outside the login flow is rejected.
    pub fn transition(self, next: PendingInput) -> Result<PendingInput, StateError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StateError::InvalidTransition { from: self, to: next })
        }
    }
}

/// Author of an entry in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}
