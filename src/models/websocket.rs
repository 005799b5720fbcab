use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "reset")]
    Reset,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "transcript")] Transcript {
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "response")] Response {
        content: String,
        /// RFC 3339, same encoding as `ChatMessage::timestamp` in transcripts.
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "notice")] Notice {
        message: String,
        dismiss_after_ms: u64,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "busy")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_type_tagged() {
        let chat: ClientMessage = serde_json
            ::from_str(r#"{"type":"chat","content":"hi there"}"#)
            .unwrap();
        assert!(matches!(chat, ClientMessage::Chat { ref content } if content == "hi there"));

        let reset: ClientMessage = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert!(matches!(reset, ClientMessage::Reset));
    }

    #[test]
    fn unit_server_messages_carry_only_the_tag() {
        assert_eq!(serde_json::to_string(&ServerMessage::Busy).unwrap(), r#"{"type":"busy"}"#);
        assert_eq!(
            serde_json::to_string(&ServerMessage::Processing).unwrap(),
            r#"{"type":"processing"}"#
        );
    }

    #[test]
    fn response_timestamp_matches_transcript_encoding() {
        let turn = ChatMessage::assistant("hello");
        let response = serde_json
            ::to_value(&ServerMessage::Response {
                content: turn.content.clone(),
                timestamp: turn.timestamp,
            })
            .unwrap();
        let transcript = serde_json
            ::to_value(&ServerMessage::Transcript { messages: vec![turn] })
            .unwrap();

        assert!(response["timestamp"].is_string());
        assert_eq!(response["timestamp"], transcript["messages"][0]["timestamp"]);
        let raw = response["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(raw).is_ok());
    }

    #[test]
    fn notice_carries_dismiss_interval() {
        let json = serde_json
            ::to_value(&ServerMessage::Notice {
                message: "boom".to_string(),
                dismiss_after_ms: 5000,
            })
            .unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["dismiss_after_ms"], 5000);
    }
}
