//! Turning a transcript into something a person can read.
//!
//! Two surfaces share the same per-message view: the HTML page (through the
//! minijinja templates in `templates/`) and the plain terminal lines.

use minijinja::{context, Environment};
use serde::Serialize;

use crate::constants::{APP_TITLE, ASSISTANT_LABEL, INPUT_PLACEHOLDER, TYPING_INDICATOR};
use crate::message::{Message, Origin};
use crate::transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Everything a surface needs to draw one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub content: String,
    pub side: Side,
    /// Only assistant messages carry a label.
    pub label: Option<&'static str>,
    /// CSS classes for the message bubble.
    pub bubble_class: &'static str,
    pub time: String,
}

pub fn render_message(message: &Message) -> RenderedMessage {
    let (side, label, bubble_class) = match message.origin {
        Origin::User => (Side::Right, None, "bubble user"),
        Origin::Assistant => (Side::Left, Some(ASSISTANT_LABEL), "bubble assistant"),
    };
    RenderedMessage {
        content: message.content.clone(),
        side,
        label,
        bubble_class,
        time: message.time_of_day(),
    }
}

/// One terminal line per message, e.g. `[14:03:27] AI Therapist: Hello`.
pub fn render_terminal_line(message: &Message) -> String {
    let sender = match message.origin {
        Origin::User => "You",
        Origin::Assistant => ASSISTANT_LABEL,
    };
    format!("[{}] {}: {}", message.time_of_day(), sender, message.content)
}

/// Compiled page templates. Autoescaping is on for `.html` names, so message
/// content can never inject markup.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("transcript.html", include_str!("../templates/transcript.html"))?;
        env.add_template("index.html", include_str!("../templates/index.html"))?;
        Ok(Self { env })
    }

    /// The message list plus the typing indicator when a reply is pending.
    pub fn render_transcript(
        &self,
        transcript: &Transcript,
        pending: bool,
    ) -> Result<String, minijinja::Error> {
        let messages: Vec<RenderedMessage> =
            transcript.messages().iter().map(render_message).collect();
        self.env.get_template("transcript.html")?.render(context! {
            messages => messages,
            pending => pending,
            typing_indicator => TYPING_INDICATOR,
        })
    }

    /// The full chat page, with `transcript` drawn server-side.
    pub fn render_index(
        &self,
        transcript: &Transcript,
        pending: bool,
    ) -> Result<String, minijinja::Error> {
        let messages: Vec<RenderedMessage> =
            transcript.messages().iter().map(render_message).collect();
        self.env.get_template("index.html")?.render(context! {
            title => APP_TITLE,
            placeholder => INPUT_PLACEHOLDER,
            messages => messages,
            pending => pending,
            typing_indicator => TYPING_INDICATOR,
        })
    }
}
