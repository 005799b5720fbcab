use async_trait::async_trait;
use log::{ info, warn };
use reqwest::Client as HttpClient;
use serde::Serialize;

use super::EmailRelay;
use crate::error::ContactError;
use crate::models::contact::ContactForm;

pub const DEFAULT_EMAILJS_BASE_URL: &str = "https://api.emailjs.com";

#[derive(Debug, Clone, Default)]
pub struct EmailJsConfig {
    pub service_id: Option<String>,
    pub template_id: Option<String>,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: TemplateParams<'a>,
}

#[derive(Serialize)]
struct TemplateParams<'a> {
    from_name: &'a str,
    from_email: &'a str,
    subject: &'a str,
    message: &'a str,
    to_email: &'a str,
}

struct Credentials {
    service_id: String,
    template_id: String,
    public_key: String,
}

pub struct EmailJsRelay {
    http: HttpClient,
    credentials: Option<Credentials>,
    private_key: Option<String>,
    base_url: String,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl EmailJsRelay {
    pub fn new(config: &EmailJsConfig) -> Self {
        let credentials = match
            (non_blank(&config.service_id), non_blank(&config.template_id), non_blank(&config.public_key))
        {
            (Some(service_id), Some(template_id), Some(public_key)) =>
                Some(Credentials { service_id, template_id, public_key }),
            _ => None,
        };

        Self {
            http: HttpClient::new(),
            credentials,
            private_key: non_blank(&config.private_key),
            base_url: config.base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_EMAILJS_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl EmailRelay for EmailJsRelay {
    async fn send(&self, form: &ContactForm, to_email: &str) -> Result<(), ContactError> {
        let credentials = self.credentials.as_ref().ok_or(ContactError::Configuration)?;
        let url = format!("{}/api/v1.0/email/send", self.base_url.trim_end_matches('/'));

        let req = EmailJsRequest {
            service_id: &credentials.service_id,
            template_id: &credentials.template_id,
            user_id: &credentials.public_key,
            access_token: self.private_key.as_deref(),
            template_params: TemplateParams {
                from_name: &form.name,
                from_email: &form.email,
                subject: &form.subject,
                message: &form.message,
                to_email,
            },
        };

        let resp = self.http.post(&url).json(&req).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!("EmailJS rejected contact submission: {} {}", status, text);
            return Err(ContactError::Delivery(format!("EmailJS error {}: {}", status, text.trim())));
        }

        info!("Contact submission from {} relayed", form.email);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_three_ids_are_required() {
        let partial = EmailJsConfig {
            service_id: Some("svc".to_string()),
            template_id: Some("tpl".to_string()),
            public_key: Some("  ".to_string()),
            ..EmailJsConfig::default()
        };
        assert!(!EmailJsRelay::new(&partial).is_configured());

        let full = EmailJsConfig {
            public_key: Some("pub".to_string()),
            ..partial
        };
        assert!(EmailJsRelay::new(&full).is_configured());
    }

    #[tokio::test]
    async fn unconfigured_relay_refuses_to_send() {
        let relay = EmailJsRelay::new(&EmailJsConfig::default());
        let form = ContactForm {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            subject: "Hi".to_string(),
            message: "Hello".to_string(),
        };
        let err = relay.send(&form, "me@example.com").await.unwrap_err();
        assert!(matches!(err, ContactError::Configuration));
    }
}
