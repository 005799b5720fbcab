use std::io;

/// Failures of a single chat round trip. None of them end the session.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("API configuration error. Please check your API key.")]
    Configuration,
    #[error("Invalid API key. Please check your {provider} API key.")]
    Authentication {
        provider: String,
    },
    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimit,
    #[error("Failed to get response: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("Email relay is not configured.")]
    Configuration,
    #[error("{0}")] Invalid(String),
    #[error("email delivery failed: {0}")] Delivery(String),
}

impl From<reqwest::Error> for ContactError {
    fn from(err: reqwest::Error) -> Self {
        ContactError::Delivery(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    #[error("Persona file IO error: {0}")] Io(#[from] io::Error),
    #[error("Persona JSON parsing error: {0}")] Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_error_messages_are_user_facing() {
        assert_eq!(
            ChatError::Configuration.to_string(),
            "API configuration error. Please check your API key."
        );
        assert_eq!(
            (ChatError::Authentication { provider: "OpenAI".to_string() }).to_string(),
            "Invalid API key. Please check your OpenAI API key."
        );
        assert!(ChatError::RateLimit.to_string().contains("try again in a moment"));
        assert_eq!(
            ChatError::Transport("model overloaded".to_string()).to_string(),
            "Failed to get response: model overloaded"
        );
    }

    #[test]
    fn contact_invalid_shows_reason_only() {
        let err = ContactError::Invalid("name is required".to_string());
        assert_eq!(err.to_string(), "name is required");
    }

    #[test]
    fn persona_error_wraps_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PersonaError = json_err.into();
        assert!(err.to_string().starts_with("Persona JSON parsing error"));
    }
}
