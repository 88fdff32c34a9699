//! Conversation transcript and the message record shared with the UI layer.
//!
//! The serialized shape (`content`, `isUser`, `timestamp`, `isError`,
//! `reasoning?`, `sourceDocuments?`) is the export/import schema existing
//! chat snapshots already use and must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// One turn of the conversation. Messages are immutable once created; edits
/// are modeled as new messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Vec<String>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            timestamp: Utc::now(),
            is_error: false,
            reasoning: None,
            source_documents: None,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        reasoning: Option<String>,
        source_documents: Option<Vec<String>>,
    ) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            timestamp: Utc::now(),
            is_error: false,
            reasoning,
            source_documents,
        }
    }

    /// Error messages never carry reasoning or sources.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            timestamp: Utc::now(),
            is_error: true,
            reasoning: None,
            source_documents: None,
        }
    }
}

/// Ordered, append-only conversation history.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Serialize for export, preserving the external snapshot schema.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(&self.messages)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let messages: Vec<Message> = serde_json::from_str(raw)?;
        Ok(Self { messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_schema_uses_camel_case_fields() {
        let message = Message::assistant(
            "Paris.",
            Some("The question asks for a capital.".to_string()),
            Some(vec!["geography.txt".to_string()]),
        );

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"isUser\":false"));
        assert!(json.contains("\"isError\":false"));
        assert!(json.contains("\"sourceDocuments\""));
        assert!(json.contains("\"reasoning\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(!json.contains("reasoning"));
        assert!(!json.contains("sourceDocuments"));
    }

    #[test]
    fn error_messages_never_carry_reasoning() {
        let message = Message::error("model file missing");
        assert!(message.is_error);
        assert!(message.reasoning.is_none());
        assert!(message.source_documents.is_none());
    }

    #[test]
    fn transcript_round_trips_through_json() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("What is the capital of France?"));
        transcript.push(Message::assistant("Paris.", None, None));

        let json = transcript.to_json().unwrap();
        let restored = Transcript::from_json(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(restored.messages()[0].is_user);
        assert_eq!(restored.messages()[1].content, "Paris.");
    }

    #[test]
    fn import_tolerates_missing_optional_fields() {
        let raw = r#"[{"content":"hi","isUser":true,"timestamp":"2024-03-01T12:00:00Z"}]"#;
        let transcript = Transcript::from_json(raw).unwrap();
        assert_eq!(transcript.len(), 1);
        assert!(!transcript.messages()[0].is_error);
    }
}
