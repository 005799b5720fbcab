use clap::Parser;
use std::path::PathBuf;

use crate::contact::EmailJsConfig;
use crate::llm::{ LlmConfig, LlmType, ParseLlmTypeError };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider behind the chat widget (openai, gemini)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.openai.com)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. When empty every chat submission fails with a configuration error.
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-3.5-turbo, gemini-pro)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Sampling temperature sent with every chat request.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.9")]
    pub chat_temperature: f32,

    /// Upper bound on reply length, in tokens.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "500")]
    pub chat_max_tokens: u32,

    // --- Persona Args ---
    /// Path to the persona JSON file (system instruction, greeting, fallback texts, contact details).
    /// The built-in persona is used when unset.
    #[arg(long, env = "PERSONA_PATH")]
    pub persona_path: Option<PathBuf>,

    /// How long a failure notice stays visible in the widget, in seconds.
    #[arg(long, env = "NOTICE_DISMISS_SECS", default_value = "5")]
    pub notice_dismiss_secs: u64,

    // --- Contact Relay Args ---
    /// EmailJS service id for the contact form relay.
    #[arg(long, env = "EMAILJS_SERVICE_ID")]
    pub emailjs_service_id: Option<String>,

    /// EmailJS template id for the contact form relay.
    #[arg(long, env = "EMAILJS_TEMPLATE_ID")]
    pub emailjs_template_id: Option<String>,

    /// EmailJS public key (sent as user_id).
    #[arg(long, env = "EMAILJS_PUBLIC_KEY", hide_env_values = true)]
    pub emailjs_public_key: Option<String>,

    /// Optional EmailJS private key (sent as accessToken) for strict-mode accounts.
    #[arg(long, env = "EMAILJS_PRIVATE_KEY", hide_env_values = true)]
    pub emailjs_private_key: Option<String>,

    /// Base URL of the EmailJS REST API.
    #[arg(long, env = "EMAILJS_BASE_URL")]
    pub emailjs_base_url: Option<String>,

    /// Recipient of contact submissions. Defaults to the persona contact email.
    #[arg(long, env = "CONTACT_TO_EMAIL")]
    pub contact_to_email: Option<String>,

    /// Maximum accepted contact submissions per minute, across all visitors.
    #[arg(long, env = "CONTACT_RATE_PER_MINUTE", default_value = "5")]
    pub contact_rate_per_minute: u32,

    // --- Server Args ---
    /// Host address and port for the chat WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Port for the HTTP API (contact form, persona reload, health). Disabled when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS/HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS/HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn llm_config(&self) -> Result<LlmConfig, ParseLlmTypeError> {
        let llm_type: LlmType = self.chat_llm_type.parse()?;
        let api_key = if !self.chat_api_key.trim().is_empty() {
            Some(self.chat_api_key.clone())
        } else {
            None
        };
        Ok(LlmConfig {
            llm_type,
            api_key,
            completion_model: self.chat_model.clone(),
            base_url: self.chat_base_url.clone(),
            temperature: self.chat_temperature,
            max_tokens: self.chat_max_tokens,
        })
    }

    pub fn emailjs_config(&self) -> EmailJsConfig {
        EmailJsConfig {
            service_id: self.emailjs_service_id.clone(),
            template_id: self.emailjs_template_id.clone(),
            public_key: self.emailjs_public_key.clone(),
            private_key: self.emailjs_private_key.clone(),
            base_url: self.emailjs_base_url.clone(),
        }
    }
}
