//! Progress codes and conversation states.
//!
//! A [`ProgressCode`] is the durable record of how far a user has advanced;
//! a [`StateId`] is the behavioural mode the conversation is in. The mapping
//! between the two lives in [`crate::resolver`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Persisted progress marker for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProgressCode {
    /// Fresh user; nothing activated yet.
    #[default]
    #[serde(rename = "000")]
    Default,
    /// First act activated.
    #[serde(rename = "100")]
    FirstAct,
    /// Second act reached.
    #[serde(rename = "110")]
    SecondAct,
    /// Third act reached.
    #[serde(rename = "111")]
    ThirdAct,
    /// Final act reached.
    #[serde(rename = "final")]
    Final,
    /// Quest completed.
    #[serde(rename = "present")]
    Present,
}

impl ProgressCode {
    /// Every code, in quest order.
    pub const ALL: [Self; 6] = [
        Self::Default,
        Self::FirstAct,
        Self::SecondAct,
        Self::ThirdAct,
        Self::Final,
        Self::Present,
    ];

    /// The string form stored in the `users.progress_code` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "000",
            Self::FirstAct => "100",
            Self::SecondAct => "110",
            Self::ThirdAct => "111",
            Self::Final => "final",
            Self::Present => "present",
        }
    }

    /// Returns `true` for the initial code.
    #[must_use]
    pub fn is_default(self) -> bool {
        self == Self::Default
    }
}

impl fmt::Display for ProgressCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown progress code: {s:?}")))
    }
}

/// Runtime conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateId {
    /// Dispatch-only state that re-resolves the stored code.
    #[serde(rename = "pre_check")]
    PreCheck,
    /// Greeting.
    #[serde(rename = "start")]
    Start,
    /// Quest briefing shown before the first act is activated.
    #[serde(rename = "default_scene")]
    Info,
    #[serde(rename = "first_act")]
    FirstAct,
    #[serde(rename = "second_act")]
    SecondAct,
    #[serde(rename = "third_act")]
    ThirdAct,
    #[serde(rename = "final")]
    Final,
    /// Terminal state.
    #[serde(rename = "present")]
    Present,
}

impl StateId {
    /// Every state, from initial to terminal.
    pub const ALL: [Self; 8] = [
        Self::PreCheck,
        Self::Start,
        Self::Info,
        Self::FirstAct,
        Self::SecondAct,
        Self::ThirdAct,
        Self::Final,
        Self::Present,
    ];

    /// Label written to history rows and used as callback payload.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PreCheck => "pre_check",
            Self::Start => "start",
            Self::Info => "default_scene",
            Self::FirstAct => "first_act",
            Self::SecondAct => "second_act",
            Self::ThirdAct => "third_act",
            Self::Final => "final",
            Self::Present => "present",
        }
    }

    /// Looks a state up by its label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.label() == label)
    }

    /// Returns `true` for the states that accept a secret.
    #[must_use]
    pub fn is_act(self) -> bool {
        matches!(
            self,
            Self::FirstAct | Self::SecondAct | Self::ThirdAct | Self::Final
        )
    }

    /// Returns `true` for the terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Present
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
