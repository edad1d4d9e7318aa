use chrono::{DateTime, Local};
use serde::Serialize;

/// Who wrote a message. Decides the side it is drawn on and its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub content: String,
    pub origin: Origin,
    /// Captured when the message is created, never taken from the backend.
    pub timestamp: DateTime<Local>,
}

impl Message {
    pub fn new(origin: Origin, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin,
            timestamp: Local::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Origin::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Origin::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }

    /// Human readable time of day, e.g. `14:03:27`.
    pub fn time_of_day(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_constructors_set_origin() {
        let user = Message::user("Hello");
        let assistant = Message::assistant("Hi there!");

        assert_eq!(user.origin, Origin::User);
        assert!(user.is_user());
        assert_eq!(user.content, "Hello");
        assert_eq!(assistant.origin, Origin::Assistant);
        assert!(!assistant.is_user());
    }

    #[test]
    fn test_timestamp_is_taken_at_creation() {
        let before = Local::now();
        let msg = Message::user("now");
        let after = Local::now();

        assert!(msg.timestamp >= before);
        assert!(msg.timestamp <= after);
    }

    #[test]
    fn test_time_of_day_format() {
        let mut msg = Message::assistant("fixed");
        msg.timestamp = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 9).unwrap();

        assert_eq!(msg.time_of_day(), "07:05:09");
    }

    #[test]
    fn test_origin_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Origin::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Origin::Assistant).unwrap(), "\"assistant\"");
    }
}
