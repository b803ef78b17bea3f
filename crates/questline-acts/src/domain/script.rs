//! The quest script: every line of narrative, every keyword, and every
//! pacing hint the state machine emits.
//!
//! Scripts are YAML documents. The default script is embedded at compile
//! time; an operator can point the server at another file.

use std::path::Path;

use questline_core::error::DomainError;
use questline_core::progress::StateId;
use serde::Deserialize;

const EMBEDDED_SCRIPT: &str = include_str!("../../script/quest.yaml");

/// Placeholder substituted with the user's display name in the greeting.
pub const USER_NAME_PLACEHOLDER: &str = "{user_name}";
/// Placeholder substituted with the act title in the "already active" notice.
pub const ACT_PLACEHOLDER: &str = "{act}";

/// Trims and lower-cases user input before keyword matching.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// The complete narrative table the state machine is built from.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestScript {
    pub commands: Commands,
    pub keywords: Keywords,
    pub messages: Messages,
    pub pacing: Pacing,
    pub acts: Acts,
    pub present: PresentScene,
}

/// Slash commands recognised in any state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commands {
    /// Resume from the stored progress code.
    pub start: String,
    /// Force progress back to the initial code.
    pub reset: String,
    pub help: String,
    pub info: String,
}

/// Free-text keywords recognised outside of act secrets.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Keywords {
    /// Requests the current act's hint.
    pub hint: String,
    /// Re-enter the greeting.
    pub start_words: Vec<String>,
    pub help_words: Vec<String>,
}

/// Fixed messages not tied to a single act.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Messages {
    pub greeting: String,
    pub unknown_user_name: String,
    pub affirmative_label: String,
    pub info: String,
    pub activate_label: String,
    pub already_active: String,
    pub already_active_unnamed: String,
    pub win: String,
    pub unrecognized: String,
    pub unknown_command: String,
    pub help: String,
    pub about: String,
    pub reset: String,
    pub data_error: String,
    pub generic_failure: String,
    pub quest_complete: String,
}

/// Delivery pauses, in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pacing {
    /// Pause before the quest briefing.
    pub info_ms: u64,
    /// Pause between an act title and its body.
    pub line_ms: u64,
}

/// The four secret-bearing acts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Acts {
    pub first_act: ActScene,
    pub second_act: ActScene,
    pub third_act: ActScene,
    #[serde(rename = "final")]
    pub final_act: ActScene,
}

/// One narrative act.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActScene {
    pub title: String,
    pub body: String,
    /// Any of these advances to the next act.
    pub secrets: Vec<String>,
    /// Reply sent when a secret is entered.
    pub confirmation: String,
    pub hint: String,
    /// Illustration sent along with the hint.
    pub illustration: String,
    /// Pause before the title when the act is entered by message.
    pub intro_delay_ms: u64,
    /// Keyword sets that earn a reply without advancing.
    #[serde(default)]
    pub detours: Vec<Detour>,
}

/// A near-miss answer: recognised, answered, but not a transition.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Detour {
    pub keywords: Vec<String>,
    pub reply: String,
    /// Send as a reply to the user's message rather than a plain message.
    #[serde(default)]
    pub as_reply: bool,
}

/// Content of the terminal state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresentScene {
    pub title: String,
    pub body: String,
    pub delay_ms: u64,
}

impl QuestScript {
    /// Loads the script bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the bundled script is malformed.
    pub fn embedded() -> Result<Self, DomainError> {
        Self::from_yaml(EMBEDDED_SCRIPT)
    }

    /// Parses and validates a YAML script.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the document does not parse or
    /// fails validation.
    pub fn from_yaml(source: &str) -> Result<Self, DomainError> {
        let script: Self = serde_yaml::from_str(source)
            .map_err(|e| DomainError::Validation(format!("quest script does not parse: {e}")))?;
        script.validate()?;
        Ok(script)
    }

    /// Reads, parses and validates a script file.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the file cannot be read or the
    /// script is invalid.
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Validation(format!(
                "cannot read quest script {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&source)
    }

    /// Returns the act scene for a secret-bearing state.
    #[must_use]
    pub fn act(&self, state: StateId) -> Option<&ActScene> {
        match state {
            StateId::FirstAct => Some(&self.acts.first_act),
            StateId::SecondAct => Some(&self.acts.second_act),
            StateId::ThirdAct => Some(&self.acts.third_act),
            StateId::Final => Some(&self.acts.final_act),
            StateId::PreCheck | StateId::Start | StateId::Info | StateId::Present => None,
        }
    }

    /// Returns the display title of an act or of the terminal scene.
    #[must_use]
    pub fn title(&self, state: StateId) -> Option<&str> {
        match state {
            StateId::Present => Some(self.present.title.as_str()),
            other => self.act(other).map(|scene| scene.title.as_str()),
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        for command in [
            &self.commands.start,
            &self.commands.reset,
            &self.commands.help,
            &self.commands.info,
        ] {
            if !command.starts_with('/') || normalize(command) != *command {
                return Err(invalid(format!(
                    "command {command:?} must be a lower-case slash command"
                )));
            }
        }

        require_keyword(&self.keywords.hint, "hint keyword")?;
        for word in self.keywords.start_words.iter().chain(&self.keywords.help_words) {
            require_keyword(word, "keyword")?;
        }

        if !self.messages.greeting.contains(USER_NAME_PLACEHOLDER) {
            return Err(invalid(format!(
                "greeting must contain {USER_NAME_PLACEHOLDER}"
            )));
        }
        if !self.messages.already_active.contains(ACT_PLACEHOLDER) {
            return Err(invalid(format!(
                "already_active must contain {ACT_PLACEHOLDER}"
            )));
        }

        for (state, scene) in [
            (StateId::FirstAct, &self.acts.first_act),
            (StateId::SecondAct, &self.acts.second_act),
            (StateId::ThirdAct, &self.acts.third_act),
            (StateId::Final, &self.acts.final_act),
        ] {
            validate_scene(state, scene, &self.keywords.hint)?;
        }
        Ok(())
    }
}

fn validate_scene(state: StateId, scene: &ActScene, hint: &str) -> Result<(), DomainError> {
    if scene.secrets.is_empty() {
        return Err(invalid(format!("{state} has no secrets")));
    }
    for secret in &scene.secrets {
        require_keyword(secret, "secret")?;
        if secret == hint {
            return Err(invalid(format!("{state} secret collides with the hint keyword")));
        }
    }
    for detour in &scene.detours {
        if detour.keywords.is_empty() {
            return Err(invalid(format!("{state} has a detour without keywords")));
        }
        for keyword in &detour.keywords {
            require_keyword(keyword, "detour keyword")?;
            if scene.secrets.contains(keyword) {
                return Err(invalid(format!(
                    "{state} detour keyword {keyword:?} is also a secret"
                )));
            }
        }
    }
    Ok(())
}

fn require_keyword(keyword: &str, what: &str) -> Result<(), DomainError> {
    if keyword.is_empty() || normalize(keyword) != keyword {
        return Err(invalid(format!(
            "{what} {keyword:?} must be non-empty, trimmed and lower-case"
        )));
    }
    Ok(())
}

fn invalid(message: String) -> DomainError {
    DomainError::Validation(format!("invalid quest script: {message}"))
}
