use async_trait::async_trait;
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ classify_failure, ChatClient, ChatRequest };
use crate::error::ChatError;
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::Role;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiInstruction,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

pub struct GeminiChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiChatClient {
    pub fn new(
        model: Option<String>,
        base_url: Option<String>,
        temperature: f32,
        max_tokens: u32
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());
        let http = HttpClient::builder()
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

    fn to_payload(&self, request: &ChatRequest) -> GeminiRequest {
        let contents = request.turns
            .iter()
            .map(|turn| GeminiContent {
                role: (
                    match turn.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    }
                ).to_string(),
                parts: vec![GeminiPart { text: turn.content.clone() }],
            })
            .collect();

        GeminiRequest {
            system_instruction: GeminiInstruction {
                parts: vec![GeminiPart { text: request.system_instruction.clone() }],
            },
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_k: 1,
                top_p: 1.0,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest
    ) -> Result<Option<String>, ChatError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        info!(
            "GeminiChatClient::complete() → model={} turns={}",
            self.model,
            request.turns.len()
        );

        let resp = self.http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&self.to_payload(request))
            .send().await?;

        if !resp.status().is_success() {
            return Err(classify_failure(LlmType::Gemini, resp).await);
        }

        let body = resp
            .json::<GoogleResponse>().await
            .map_err(|e| ChatError::Transport(format!("Malformed Gemini response: {}", e)))?;
        debug!("Gemini returned {} candidate(s)", body.candidates.len());

        let text: String = body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(text).filter(|t| !t.is_empty()))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }

    fn get_llm_type(&self) -> LlmType {
        LlmType::Gemini
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ ChatMessage, Conversation };

    #[test]
    fn payload_maps_assistant_turns_to_model_role() {
        let client = GeminiChatClient::from_config(&LlmConfig::default()).unwrap();
        let history = Conversation::new()
            .append(ChatMessage::user("q1"))
            .append(ChatMessage::assistant("a1"));
        let payload = client.to_payload(&ChatRequest::build("persona", &history, "q2"));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "persona");
        let roles: Vec<&str> = json["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(json["contents"][2]["parts"][0]["text"], "q2");
        assert_eq!(json["generationConfig"]["topK"], 1);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
    }
}
