//! Outbound content produced by the state machine.
//!
//! Each [`Output`] carries a pause hint: how long the transport should wait
//! after the previous item before delivering it. The engine never sleeps
//! itself.

use std::time::Duration;

use serde::Serialize;

/// One deliverable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Output {
    /// Milliseconds to wait after the previous item.
    pub pause_ms: u64,
    #[serde(flatten)]
    pub content: OutputContent,
}

/// What to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    /// Plain text, optionally threaded as a reply to the inbound message.
    Text { text: String, reply: bool },
    /// Text with an inline set of choices.
    Choice {
        text: String,
        options: Vec<ChoiceOption>,
    },
    /// Reference to an illustration the transport knows how to resolve.
    Illustration { reference: String },
    /// Short acknowledgment of a pressed button.
    CallbackAck { text: String },
}

/// A single button in a [`OutputContent::Choice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub label: String,
    /// Callback payload returned when the option is picked.
    pub data: String,
}

impl Output {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::immediate(OutputContent::Text {
            text: text.into(),
            reply: false,
        })
    }

    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self::immediate(OutputContent::Text {
            text: text.into(),
            reply: true,
        })
    }

    #[must_use]
    pub fn choice(text: impl Into<String>, options: Vec<ChoiceOption>) -> Self {
        Self::immediate(OutputContent::Choice {
            text: text.into(),
            options,
        })
    }

    #[must_use]
    pub fn illustration(reference: impl Into<String>) -> Self {
        Self::immediate(OutputContent::Illustration {
            reference: reference.into(),
        })
    }

    #[must_use]
    pub fn callback_ack(text: impl Into<String>) -> Self {
        Self::immediate(OutputContent::CallbackAck { text: text.into() })
    }

    /// Sets the pause hint.
    #[must_use]
    pub fn after(mut self, pause_ms: u64) -> Self {
        self.pause_ms = pause_ms;
        self
    }

    /// Returns the text body, if this item has one.
    #[must_use]
    pub fn text_body(&self) -> Option<&str> {
        match &self.content {
            OutputContent::Text { text, .. }
            | OutputContent::Choice { text, .. }
            | OutputContent::CallbackAck { text } => Some(text),
            OutputContent::Illustration { .. } => None,
        }
    }

    fn immediate(content: OutputContent) -> Self {
        Self {
            pause_ms: 0,
            content,
        }
    }
}

impl ChoiceOption {
    #[must_use]
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Cumulative delivery offsets for `outputs`, measured from the moment the
/// first item may be sent.
#[must_use]
pub fn delivery_schedule(outputs: &[Output]) -> Vec<Duration> {
    outputs
        .iter()
        .scan(0u64, |elapsed, output| {
            *elapsed = elapsed.saturating_add(output.pause_ms);
            Some(Duration::from_millis(*elapsed))
        })
        .collect()
}
