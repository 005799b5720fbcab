use serde::{ Serialize, Deserialize };

use crate::error::ContactError;

/// Every field defaults to empty so an absent field is reported by
/// `validated` like a blank one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    /// Trims every field and rejects blank ones or an address without `@`.
    pub fn validated(self) -> Result<ContactForm, ContactError> {
        let form = ContactForm {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
        };

        for (field, value) in [
            ("name", &form.name),
            ("email", &form.email),
            ("subject", &form.subject),
            ("message", &form.message),
        ] {
            if value.is_empty() {
                return Err(ContactError::Invalid(format!("{} is required", field)));
            }
        }

        match form.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(form),
            _ => Err(ContactError::Invalid("email address is not valid".to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
}
