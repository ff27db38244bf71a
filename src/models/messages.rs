use serde::{Deserialize, Serialize};

/// Edit sent by a client over the document socket.
///
/// Clients may attach extra fields (cursor positions, client ids, ...);
/// everything except `content` is ignored. A missing `content` field is
/// treated as clearing the document.
#[derive(Deserialize, Debug)]
pub struct EditMessage {
    #[serde(default)]
    pub content: String,
}

impl EditMessage {
    /// Parse a raw text frame into an edit. Anything that is not a JSON
    /// object yields a typed failure the caller can drop.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InitialMessage {
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateMessage {
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "initial")]
    Initial(InitialMessage),
    #[serde(rename = "update")]
    Update(UpdateMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
}

impl ServerMessage {
    pub fn initial(content: impl Into<String>) -> Self {
        ServerMessage::Initial(InitialMessage { content: content.into() })
    }

    pub fn update(content: impl Into<String>) -> Self {
        ServerMessage::Update(UpdateMessage { content: content.into() })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage { message: message.into() })
    }

    /// Serialize for the wire. These enums only hold strings, so
    /// serialization cannot fail.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_message_is_tagged() {
        let encoded = ServerMessage::initial("hello").encode();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["type"], "initial");
        assert_eq!(value["content"], "hello");
    }

    #[test]
    fn error_message_carries_message_field() {
        let encoded = ServerMessage::error("denied").encode();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "denied");
    }

    #[test]
    fn edit_ignores_unknown_fields() {
        let edit = EditMessage::parse(r#"{"content": "abc", "cursor": 42}"#).unwrap();
        assert_eq!(edit.content, "abc");
    }

    #[test]
    fn edit_without_content_is_empty() {
        let edit = EditMessage::parse(r#"{"client": "web"}"#).unwrap();
        assert_eq!(edit.content, "");
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(EditMessage::parse("not json at all").is_err());
        assert!(EditMessage::parse(r#"["content"]"#).is_err());
        assert!(EditMessage::parse("42").is_err());
    }
}
