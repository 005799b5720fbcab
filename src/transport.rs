use log::{ info, warn };
use std::sync::Arc;

use crate::config::persona::Persona;
use crate::error::ChatError;
use crate::llm::chat::{ ChatClient, ChatRequest };
use crate::models::chat::Conversation;

/// Turns an utterance plus prior history into one assistant reply.
///
/// Every call re-sends the whole history, so the transport holds no
/// provider-side session of its own.
#[derive(Clone)]
pub struct ChatTransport {
    client: Arc<dyn ChatClient>,
    api_key: Option<String>,
    persona: Arc<Persona>,
}

impl ChatTransport {
    pub fn new(client: Arc<dyn ChatClient>, api_key: Option<String>, persona: Arc<Persona>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Self { client, api_key, persona }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub async fn send_message(
        &self,
        utterance: &str,
        history: &Conversation
    ) -> Result<String, ChatError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            warn!("Chat API key not configured. Set CHAT_API_KEY to enable the chat widget.");
            ChatError::Configuration
        })?;

        let request = ChatRequest::build(&self.persona.system_instruction, history, utterance);
        let reply = self.client.complete(api_key, &request).await?;

        match reply {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => {
                info!(
                    "{} returned no usable text, answering with the empty-completion literal",
                    self.client.get_llm_type().display_name()
                );
                Ok(self.persona.empty_completion.clone())
            }
        }
    }

    pub fn reset_session(&self) {
        self.client.reset_session();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::LlmType;
    use crate::models::chat::{ ChatMessage, Role };
    use async_trait::async_trait;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use std::sync::Mutex;

    /// Provider stand-in that records every request it receives.
    pub(crate) struct StubClient {
        pub calls: AtomicUsize,
        pub resets: AtomicUsize,
        pub requests: Mutex<Vec<ChatRequest>>,
        reply: fn() -> Result<Option<String>, ChatError>,
    }

    impl StubClient {
        pub(crate) fn replying(reply: fn() -> Result<Option<String>, ChatError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                resets: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl ChatClient for StubClient {
        async fn complete(
            &self,
            _api_key: &str,
            request: &ChatRequest
        ) -> Result<Option<String>, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            (self.reply)()
        }

        fn reset_session(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn get_model(&self) -> String {
            "stub".to_string()
        }

        fn get_base_url(&self) -> String {
            "http://stub".to_string()
        }

        fn get_llm_type(&self) -> LlmType {
            LlmType::OpenAI
        }
    }

    fn transport(client: Arc<StubClient>, key: Option<&str>) -> ChatTransport {
        ChatTransport::new(client, key.map(str::to_string), Arc::new(Persona::default()))
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_call() {
        let stub = StubClient::replying(|| Ok(Some("never".to_string())));
        for key in [None, Some(""), Some("   ")] {
            let err = transport(stub.clone(), key)
                .send_message("hello", &Conversation::new()).await
                .unwrap_err();
            assert!(matches!(err, ChatError::Configuration));
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_completion_is_a_success() {
        let replies: [fn() -> Result<Option<String>, ChatError>; 3] = [
            || Ok(None),
            || Ok(Some(String::new())),
            || Ok(Some("  \n".to_string())),
        ];
        for reply in replies {
            let stub = StubClient::replying(reply);
            let text = transport(stub, Some("key"))
                .send_message("hello", &Conversation::new()).await
                .unwrap();
            assert_eq!(text, "Sorry, I could not generate a response.");
        }
    }

    #[tokio::test]
    async fn first_question_payload_is_system_then_user() {
        let stub = StubClient::replying(|| Ok(Some("I work mainly with React and Node.js.".to_string())));
        let reply = transport(stub.clone(), Some("key"))
            .send_message("What technologies do you use?", &Conversation::new()).await
            .unwrap();

        assert_eq!(reply, "I work mainly with React and Node.js.");
        let requests = stub.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system_instruction, Persona::default().system_instruction);
        assert_eq!(requests[0].turns.len(), 1);
        assert_eq!(requests[0].turns[0].role, Role::User);
        assert_eq!(requests[0].turns[0].content, "What technologies do you use?");
    }

    #[tokio::test]
    async fn provider_errors_pass_through_unretried() {
        let stub = StubClient::replying(|| Err(ChatError::RateLimit));
        let history = Conversation::new().append(ChatMessage::assistant("hi"));
        let err = transport(stub.clone(), Some("key"))
            .send_message("hello", &history).await
            .unwrap_err();

        assert!(matches!(err, ChatError::RateLimit));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_session_is_forwarded_to_the_client() {
        let stub = StubClient::replying(|| Ok(None));
        let t = transport(stub.clone(), Some("key"));
        t.reset_session();
        t.reset_session();
        assert_eq!(stub.resets.load(Ordering::SeqCst), 2);
    }
}
