use serde::Deserialize;
use std::fs;
use std::path::{ Path, PathBuf };
use std::time::SystemTime;
use log::info;

use crate::error::PersonaError;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are Alex Rivera, a passionate full-stack developer. When greeting someone for the first time, introduce yourself: \"Hi! I'm Alex Rivera, nice to meet you!\"

Key information about you (Alex):
- Current Role: Software Developer building production web applications
- Specializes in React, Next.js, Tailwind CSS, Node.js, Express, MongoDB and PostgreSQL
- Tools: Git, GitHub, Vercel, Postman, Docker
- Has completed 50+ projects and worked with 30+ happy clients
- Core values: Quality First, User-Centric design, Continuous Learning, and Collaboration
- Contact: hello@example.com, +1 555 0100

What you do:
- Build responsive and high-performance web applications
- Design clean and reusable UI components
- Integrate APIs and third-party services
- Deploy and maintain production-ready applications

When answering questions:
1. Be friendly, professional, and speak in first person (I, my, me)
2. Share your skills and experience naturally
3. If asked about projects, mention the portfolio section on the website
4. If asked about contact, provide email and phone number
5. Keep responses concise, engaging, and helpful
6. If you don't know something specific, be honest and suggest direct contact

Remember: You ARE Alex Rivera, not an assistant talking about Alex.";

pub const DEFAULT_GREETING: &str = "Hi! I'm Alex Rivera, nice to meet you! How can I help you today?";

pub const DEFAULT_FALLBACK_REPLY: &str =
    "I apologize, but I encountered a technical error. Please try again, or feel free to contact me directly at {email} or {phone}.";

pub const DEFAULT_EMPTY_COMPLETION: &str = "Sorry, I could not generate a response.";

pub const DEFAULT_CONTACT_EMAIL: &str = "hello@example.com";
pub const DEFAULT_CONTACT_PHONE: &str = "+1 555 0100";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ContactDetails {
    pub email: String,
    pub phone: String,
}

impl Default for ContactDetails {
    fn default() -> Self {
        Self {
            email: DEFAULT_CONTACT_EMAIL.to_string(),
            phone: DEFAULT_CONTACT_PHONE.to_string(),
        }
    }
}

/// Persona texts the chat surface speaks with. Pure data: nothing here
/// decides control flow.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Persona {
    pub system_instruction: String,
    pub greeting: String,
    pub fallback_reply: String,
    pub empty_completion: String,
    pub contact: ContactDetails,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            empty_completion: DEFAULT_EMPTY_COMPLETION.to_string(),
            contact: ContactDetails::default(),
            last_loaded: None,
        }
    }
}

impl Persona {
    /// The canned apology with `{email}` and `{phone}` filled in.
    pub fn fallback_message(&self) -> String {
        self.fallback_reply
            .replace("{email}", &self.contact.email)
            .replace("{phone}", &self.contact.phone)
    }
}

pub fn load_persona<P: AsRef<Path>>(path: P) -> Result<Persona, PersonaError> {
    let json_str = fs::read_to_string(path)?;
    let mut persona: Persona = serde_json::from_str(&json_str)?;
    persona.last_loaded = Some(SystemTime::now());
    Ok(persona)
}

/// Built-in persona when no path is configured.
pub fn load_or_default(path: Option<&PathBuf>) -> Result<Persona, PersonaError> {
    match path {
        Some(p) => {
            info!("Loading persona from {}", p.display());
            load_persona(p)
        }
        None => {
            info!("No persona file configured, using built-in persona");
            Ok(Persona::default())
        }
    }
}

/// Returns a freshly loaded persona when the file changed since `current`
/// was loaded, `None` otherwise.
pub fn reload_persona_if_changed<P: AsRef<Path>>(
    path: P,
    current: &Persona
) -> Result<Option<Persona>, PersonaError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        match current.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Persona file changed, reloading...");
                return Ok(Some(load_persona(path)?));
            }
            None => {
                info!("No last_loaded timestamp, reloading persona...");
                return Ok(Some(load_persona(path)?));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn fallback_message_substitutes_contact_details() {
        let persona = Persona {
            contact: ContactDetails {
                email: "me@site.dev".to_string(),
                phone: "+44 20 0000".to_string(),
            },
            ..Persona::default()
        };
        let text = persona.fallback_message();
        assert!(text.contains("me@site.dev"));
        assert!(text.contains("+44 20 0000"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"greeting": "Hey there", "contact": {{"email": "x@y.z"}}}}"#).unwrap();

        let persona = load_persona(file.path()).unwrap();
        assert_eq!(persona.greeting, "Hey there");
        assert_eq!(persona.contact.email, "x@y.z");
        assert_eq!(persona.contact.phone, DEFAULT_CONTACT_PHONE);
        assert_eq!(persona.empty_completion, DEFAULT_EMPTY_COMPLETION);
        assert!(persona.last_loaded.is_some());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(load_persona(file.path()), Err(PersonaError::Json(_))));
    }

    #[test]
    fn reload_only_when_file_is_newer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"greeting": "one"}}"#).unwrap();

        let mut current = load_persona(file.path()).unwrap();
        current.last_loaded = Some(SystemTime::now() + Duration::from_secs(3600));
        assert!(reload_persona_if_changed(file.path(), &current).unwrap().is_none());

        current.last_loaded = Some(SystemTime::UNIX_EPOCH);
        let fresh = reload_persona_if_changed(file.path(), &current).unwrap().unwrap();
        assert_eq!(fresh.greeting, "one");
    }

    #[test]
    fn missing_path_uses_builtin_persona() {
        let persona = load_or_default(None).unwrap();
        assert_eq!(persona.greeting, DEFAULT_GREETING);
        assert!(persona.last_loaded.is_none());
    }
}
