use crate::cli::Args;
use crate::config::persona::{ self, Persona };
use crate::contact::{ EmailJsRelay, EmailRelay };
use crate::error::{ ContactError, PersonaError };
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::models::contact::ContactForm;
use crate::transport::ChatTransport;
use crate::widget::ChatWidget;

use log::{ info, warn };
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Process-wide factory for chat widgets plus the contact relay.
///
/// Holds no per-widget state: each widget gets its own transport built
/// from the current persona snapshot.
pub struct PortfolioAgent {
    chat_client: Arc<dyn ChatClient>,
    chat_api_key: Option<String>,
    persona: RwLock<Arc<Persona>>,
    persona_path: Option<PathBuf>,
    notice_ttl: Duration,
    contact_relay: Arc<dyn EmailRelay>,
    contact_to_email: Option<String>,
}

impl PortfolioAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = args.llm_config()?;
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url()
        );
        if chat_config.api_key.is_none() {
            warn!("CHAT_API_KEY is not set. Chat submissions will answer with the fallback reply.");
        }

        let persona = persona::load_or_default(args.persona_path.as_ref())?;
        let contact_relay = Arc::new(EmailJsRelay::new(&args.emailjs_config()));
        if !contact_relay.is_configured() {
            warn!("EmailJS credentials missing. The contact form relay is disabled.");
        }

        Ok(
            Self::from_parts(
                chat_client,
                chat_config.api_key,
                persona,
                args.persona_path.clone(),
                Duration::from_secs(args.notice_dismiss_secs),
                contact_relay,
                args.contact_to_email.clone()
            )
        )
    }

    pub fn from_parts(
        chat_client: Arc<dyn ChatClient>,
        chat_api_key: Option<String>,
        persona: Persona,
        persona_path: Option<PathBuf>,
        notice_ttl: Duration,
        contact_relay: Arc<dyn EmailRelay>,
        contact_to_email: Option<String>
    ) -> Self {
        Self {
            chat_client,
            chat_api_key,
            persona: RwLock::new(Arc::new(persona)),
            persona_path,
            notice_ttl,
            contact_relay,
            contact_to_email: contact_to_email.filter(|e| !e.trim().is_empty()),
        }
    }

    pub async fn persona(&self) -> Arc<Persona> {
        self.persona.read().await.clone()
    }

    pub async fn open_widget(&self) -> ChatWidget {
        let transport = ChatTransport::new(
            self.chat_client.clone(),
            self.chat_api_key.clone(),
            self.persona().await
        );
        let widget = ChatWidget::open(transport, self.notice_ttl);
        info!("Opened chat widget {}", widget.id());
        widget
    }

    /// Re-reads the persona file when it changed. Widgets already open keep
    /// the persona they started with.
    pub async fn reload_persona_if_changed(&self) -> Result<bool, PersonaError> {
        let Some(path) = self.persona_path.as_ref() else {
            return Ok(false);
        };

        let mut guard = self.persona.write().await;
        match persona::reload_persona_if_changed(path, &guard)? {
            Some(fresh) => {
                *guard = Arc::new(fresh);
                info!("Persona reloaded from {}", path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn submit_contact(&self, form: ContactForm) -> Result<(), ContactError> {
        if !self.contact_relay.is_configured() {
            return Err(ContactError::Configuration);
        }
        let form = form.validated()?;
        let to_email = match &self.contact_to_email {
            Some(email) => email.clone(),
            None => self.persona().await.contact.email.clone(),
        };
        self.contact_relay.send(&form, &to_email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::EmailJsConfig;
    use crate::llm::chat::openai::OpenAIChatClient;
    use std::io::Write;
    use std::time::SystemTime;

    fn agent(persona_path: Option<PathBuf>, persona: Persona) -> PortfolioAgent {
        let client = Arc::new(OpenAIChatClient::new(None, None, 0.9, 500).unwrap());
        PortfolioAgent::from_parts(
            client,
            Some("key".to_string()),
            persona,
            persona_path,
            Duration::from_secs(5),
            Arc::new(EmailJsRelay::new(&EmailJsConfig::default())),
            None
        )
    }

    #[tokio::test]
    async fn widgets_are_independent() {
        let agent = agent(None, Persona::default());
        let a = agent.open_widget().await;
        let b = agent.open_widget().await;

        a.append(crate::models::chat::ChatMessage::user("only in a"));
        assert_eq!(a.conversation().len(), 2);
        assert_eq!(b.conversation().len(), 1);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn reload_swaps_persona_for_new_widgets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"greeting": "Welcome back"}}"#).unwrap();

        let stale = Persona {
            last_loaded: Some(SystemTime::UNIX_EPOCH),
            ..Persona::default()
        };
        let agent = agent(Some(file.path().to_path_buf()), stale);
        let before = agent.open_widget().await;

        assert!(agent.reload_persona_if_changed().await.unwrap());
        let after = agent.open_widget().await;

        assert_eq!(after.conversation().last().unwrap().content, "Welcome back");
        assert_ne!(before.conversation().last().unwrap().content, "Welcome back");
    }

    #[tokio::test]
    async fn reload_without_path_is_a_no_op() {
        let agent = agent(None, Persona::default());
        assert!(!agent.reload_persona_if_changed().await.unwrap());
    }

    #[tokio::test]
    async fn contact_without_relay_config_is_rejected_first() {
        let agent = agent(None, Persona::default());
        let form = ContactForm {
            name: String::new(),
            email: String::new(),
            subject: String::new(),
            message: String::new(),
        };
        assert!(matches!(agent.submit_contact(form).await, Err(ContactError::Configuration)));
    }
}
