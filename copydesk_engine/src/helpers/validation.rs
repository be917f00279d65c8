use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::NewOrder;

pub const MAX_SPECIALTIES: usize = 5;

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

fn is_valid_email(email: &str) -> bool {
    // Deliberately loose: the identity provider performs the real verification.
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex");
    re.is_match(email)
}

/// Boundary validation for incoming orders. Anything not passing here never reaches storage.
pub fn validate_new_order(order: &NewOrder) -> Result<(), ValidationError> {
    if !is_valid_email(&order.client_email) {
        return Err(ValidationError::new("client_email", "not a valid email address"));
    }
    if order.word_count <= 0 {
        return Err(ValidationError::new("word_count", "must be greater than zero"));
    }
    if order.title.trim().is_empty() {
        return Err(ValidationError::new("title", "must not be empty"));
    }
    if order.description.trim().is_empty() {
        return Err(ValidationError::new("description", "must not be empty"));
    }
    if let Some(keywords) = &order.keywords {
        if keywords.len() > 1024 {
            return Err(ValidationError::new("keywords", "keyword list too long"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{ContentType, DeadlineTier};

    fn valid_order() -> NewOrder {
        NewOrder::new(
            "alice@example.com",
            ContentType::BlogPost,
            1000,
            "Rust for copywriters",
            "A 1000 word introduction.",
            DeadlineTier::Rush48h,
        )
    }

    #[test]
    fn accepts_a_valid_order() {
        assert!(validate_new_order(&valid_order()).is_ok());
    }

    #[test]
    fn rejects_bad_fields() {
        let mut o = valid_order();
        o.client_email = "not-an-email".into();
        assert_eq!(validate_new_order(&o).unwrap_err().field, "client_email");

        let mut o = valid_order();
        o.word_count = 0;
        assert_eq!(validate_new_order(&o).unwrap_err().field, "word_count");

        let mut o = valid_order();
        o.title = "  ".into();
        assert_eq!(validate_new_order(&o).unwrap_err().field, "title");

        let mut o = valid_order();
        o.description = String::new();
        assert_eq!(validate_new_order(&o).unwrap_err().field, "description");
    }
}
