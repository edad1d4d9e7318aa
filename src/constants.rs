// Fixed texts and defaults, overridable from the environment where it makes sense.

use std::env;

/// Seed message every transcript starts with.
pub const GREETING: &str = "Hello! I'm your AI therapist. How are you feeling today?";

/// Shown in place of a reply whenever the backend call fails for any reason.
pub const FALLBACK_REPLY: &str = "Oops! Something went wrong. Please try again later.";

/// Label rendered above assistant messages.
pub const ASSISTANT_LABEL: &str = "AI Therapist";

pub const TYPING_INDICATOR: &str = "AI Therapist is typing...";

/// Printed by the terminal chat when a line arrives while a reply is pending.
pub const BUSY_NOTICE: &str = "(AI Therapist is still replying; that message was not sent)";

pub const INPUT_PLACEHOLDER: &str = "Type your message here...";

pub const APP_TITLE: &str = "EmpathyAI";

/// Path of the single backend endpoint, relative to the API base URL.
pub const CHAT_PATH: &str = "/chat";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8002";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PORT: u16 = 5173;

// Use lazy_static so the environment is only read once.
lazy_static::lazy_static! {
    pub static ref API_URL: String = env::var("EMPATHY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    pub static ref TIMEOUT_SECS: u64 = env::var("EMPATHY_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
}
