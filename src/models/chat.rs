use chrono::{ DateTime, Local, Utc };
use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversational turn. The timestamp is only used for display.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Local wall-clock time as `HH:MM`, the way the widget renders it.
    pub fn display_time(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }
}

/// Ordered transcript of one widget session, oldest first.
///
/// Updates never mutate the receiver: `append` and `reset` hand back a new
/// conversation, so a snapshot given to the transport stays valid while the
/// widget moves on.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(greeting: &str) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(greeting)],
        }
    }

    pub fn append(&self, turn: ChatMessage) -> Conversation {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(turn);
        Conversation { messages }
    }

    pub fn reset(&self, greeting: &str) -> Conversation {
        Conversation::seeded(greeting)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order_and_length() {
        let contents = ["first", "second", "third", "fourth", "fifth"];
        let mut conversation = Conversation::new();
        for (i, content) in contents.iter().enumerate() {
            let turn = if i % 2 == 0 {
                ChatMessage::user(*content)
            } else {
                ChatMessage::assistant(*content)
            };
            conversation = conversation.append(turn);
        }

        assert_eq!(conversation.len(), contents.len());
        let stored: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(stored, contents);
    }

    #[test]
    fn append_does_not_modify_the_receiver() {
        let before = Conversation::seeded("hello");
        let after = before.append(ChatMessage::user("hi"));

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn append_keeps_duplicates_and_any_role_order() {
        let conversation = Conversation::new()
            .append(ChatMessage::user("same"))
            .append(ChatMessage::user("same"))
            .append(ChatMessage::assistant("a"))
            .append(ChatMessage::assistant("b"));

        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::User, Role::Assistant, Role::Assistant]);
    }

    #[test]
    fn reset_yields_single_assistant_greeting() {
        let busy = Conversation::seeded("hello")
            .append(ChatMessage::user("one"))
            .append(ChatMessage::assistant("two"));

        let once = busy.reset("hello");
        let twice = once.reset("hello");

        for state in [&once, &twice, &Conversation::new().reset("hello")] {
            assert_eq!(state.len(), 1);
            let only = state.last().unwrap();
            assert_eq!(only.role, Role::Assistant);
            assert_eq!(only.content, "hello");
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hey")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn display_time_is_hours_and_minutes() {
        let shown = ChatMessage::assistant("x").display_time();
        assert_eq!(shown.len(), 5);
        assert_eq!(&shown[2..3], ":");
    }
}
