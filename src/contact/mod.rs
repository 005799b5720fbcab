pub mod emailjs;

use async_trait::async_trait;

use crate::error::ContactError;
use crate::models::contact::ContactForm;

pub use self::emailjs::{ EmailJsConfig, EmailJsRelay };

#[async_trait]
pub trait EmailRelay: Send + Sync {
    /// Delivers one validated submission to `to_email`.
    async fn send(&self, form: &ContactForm, to_email: &str) -> Result<(), ContactError>;

    fn is_configured(&self) -> bool;
}
