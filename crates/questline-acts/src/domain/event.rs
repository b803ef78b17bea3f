//! Inbound events and their routing.

use questline_core::progress::StateId;
use serde::{Deserialize, Serialize};

use super::script::{QuestScript, normalize};

/// Callback payload of the greeting's affirmative button.
pub const START_QUEST_CALLBACK: &str = "start_quest";

/// Shape of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A typed chat message.
    Message,
    /// A pressed inline button.
    Callback,
}

/// An event delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Opaque, stable user identity.
    pub identity: String,
    pub channel_id: i64,
    pub message_id: i64,
    pub kind: EventKind,
    /// Message text or callback data.
    #[serde(default)]
    pub payload: String,
    /// Name to greet the user by.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// How a state was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Message,
    Callback,
}

/// What the state machine is asked to do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Run a state's entry action.
    Enter { state: StateId, trigger: Trigger },
    /// Force progress back to the initial code.
    Reset,
    Help,
    About,
    /// Unknown slash command or callback payload.
    Unknown,
    /// Free text for the current state; already normalised.
    Input(String),
}

impl InboundEvent {
    /// Routes the event against the script's commands and keywords.
    #[must_use]
    pub fn route(&self, script: &QuestScript) -> Route {
        match self.kind {
            EventKind::Callback => route_callback(self.payload.trim()),
            EventKind::Message => route_message(&normalize(&self.payload), script),
        }
    }
}

fn route_callback(data: &str) -> Route {
    if data == START_QUEST_CALLBACK {
        return Route::Enter {
            state: StateId::Info,
            trigger: Trigger::Callback,
        };
    }
    match StateId::from_label(data) {
        Some(state) if state.is_act() || state.is_terminal() => Route::Enter {
            state,
            trigger: Trigger::Callback,
        },
        _ => Route::Unknown,
    }
}

fn route_message(text: &str, script: &QuestScript) -> Route {
    let commands = &script.commands;
    let keywords = &script.keywords;

    if text == commands.start {
        Route::Enter {
            state: StateId::PreCheck,
            trigger: Trigger::Message,
        }
    } else if text == commands.reset {
        Route::Reset
    } else if text == commands.help || keywords.help_words.iter().any(|w| w == text) {
        Route::Help
    } else if text == commands.info {
        Route::About
    } else if text.starts_with('/') {
        Route::Unknown
    } else if keywords.start_words.iter().any(|w| w == text) {
        Route::Enter {
            state: StateId::Start,
            trigger: Trigger::Message,
        }
    } else {
        Route::Input(text.to_owned())
    }
}
