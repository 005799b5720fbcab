use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ classify_failure, ChatClient, ChatRequest };
use crate::error::ChatError;
use crate::llm::{ LlmConfig, LlmType };

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIResponseMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(
        model: Option<String>,
        base_url: Option<String>,
        temperature: f32,
        max_tokens: u32
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            temperature,
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(
            config.completion_model.clone(),
            config.base_url.clone(),
            config.temperature,
            config.max_tokens
        )
    }

    fn to_messages(request: &ChatRequest) -> Vec<OpenAIMessage> {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: request.system_instruction.clone(),
        });
        messages.extend(
            request.turns.iter().map(|turn| OpenAIMessage {
                role: turn.role.as_str().to_string(),
                content: turn.content.clone(),
            })
        );
        messages
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest
    ) -> Result<Option<String>, ChatError> {
        let url = if self.base_url.ends_with("/v1/chat/completions") {
            self.base_url.clone()
        } else {
            format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
        };

        let req = OpenAIChatRequest {
            model: self.model.clone(),
            messages: Self::to_messages(request),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!(
            "OpenAIChatClient::complete() → model={} turns={}",
            self.model,
            request.turns.len()
        );

        let resp = self.http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .json(&req)
            .send().await?;

        if !resp.status().is_success() {
            return Err(classify_failure(LlmType::OpenAI, resp).await);
        }

        let body = resp
            .json::<OpenAIResponse>().await
            .map_err(|e| ChatError::Transport(format!("Malformed OpenAI response: {}", e)))?;
        debug!("OpenAI returned {} choice(s)", body.choices.len());

        Ok(
            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .and_then(|m| m.content)
        )
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }

    fn get_llm_type(&self) -> LlmType {
        LlmType::OpenAI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ ChatMessage, Conversation };

    #[test]
    fn system_instruction_is_prepended() {
        let history = Conversation::new().append(ChatMessage::assistant("hello"));
        let request = ChatRequest::build("persona", &history, "hi");
        let messages = OpenAIChatClient::to_messages(&request);

        let roles: Vec<&str> = messages
            .iter()
            .map(|m| m.role.as_str())
            .collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
        assert_eq!(messages[0].content, "persona");
        assert_eq!(messages[2].content, "hi");
    }

    #[test]
    fn defaults_apply_when_unset() {
        let client = OpenAIChatClient::from_config(&LlmConfig::default()).unwrap();
        assert_eq!(client.get_model(), DEFAULT_OPENAI_MODEL);
        assert_eq!(client.get_base_url(), DEFAULT_OPENAI_BASE_URL);
    }
}
