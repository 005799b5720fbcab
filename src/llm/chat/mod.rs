pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use log::warn;
use reqwest::{ Response, StatusCode };
use serde::Deserialize;
use std::error::Error as StdError;
use std::sync::Arc;

use super::{ LlmConfig, LlmType };
use self::gemini::GeminiChatClient;
use self::openai::OpenAIChatClient;
use crate::error::ChatError;
use crate::models::chat::{ Conversation, Role };

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Provider-neutral outbound payload: the persona instruction followed by
/// the prior turns, in order, and the new user utterance last.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_instruction: String,
    pub turns: Vec<ChatTurn>,
}

impl ChatRequest {
    pub fn build(system_instruction: &str, history: &Conversation, utterance: &str) -> Self {
        let mut turns: Vec<ChatTurn> = history
            .messages()
            .iter()
            .map(|msg| ChatTurn {
                role: msg.role,
                content: msg.content.clone(),
            })
            .collect();
        turns.push(ChatTurn {
            role: Role::User,
            content: utterance.to_string(),
        });

        Self {
            system_instruction: system_instruction.to_string(),
            turns,
        }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// One network round trip. `Ok(None)` means the provider answered but
    /// gave no usable text.
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest
    ) -> Result<Option<String>, ChatError>;

    /// Drops any provider-side session. Clients that re-send the full
    /// history on every call have nothing to drop.
    fn reset_session(&self) {}

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
    fn get_llm_type(&self) -> LlmType;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Deserialize)]
struct ProviderErrorDetail {
    message: Option<String>,
}

/// Maps a non-success provider status onto the chat error taxonomy.
pub fn classify_status(provider: LlmType, status: StatusCode, body: &str) -> ChatError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return ChatError::Authentication {
                provider: provider.display_name().to_string(),
            };
        }
        StatusCode::TOO_MANY_REQUESTS => {
            return ChatError::RateLimit;
        }
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => {
            return ChatError::Authentication {
                provider: provider.display_name().to_string(),
            };
        }
        _ => {}
    }

    let detail = serde_json
        ::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.to_string()
            }
        });

    ChatError::Transport(
        format!("{} API error {}: {}", provider.display_name(), status.as_u16(), detail)
    )
}

pub(crate) async fn classify_failure(provider: LlmType, response: Response) -> ChatError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!("{} request failed with status {}", provider.display_name(), status);
    classify_status(provider, status, &body)
}
