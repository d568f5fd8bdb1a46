use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Phone number normalised to an optional `+` followed by 7-15 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient(String);

impl Recipient {
    const MIN_DIGITS: usize = 7;
    const MAX_DIGITS: usize = 15;

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let (plus, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' | '.' => {}
                _ => {
                    return Err(DomainError::Validation(format!(
                        "recipient '{raw}' contains invalid character '{c}'"
                    )));
                }
            }
        }

        if digits.len() < Self::MIN_DIGITS || digits.len() > Self::MAX_DIGITS {
            return Err(DomainError::Validation(format!(
                "recipient '{raw}' must have between {} and {} digits",
                Self::MIN_DIGITS,
                Self::MAX_DIGITS
            )));
        }

        Ok(Self(if plus { format!("+{digits}") } else { digits }))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses every address, dropping repeats while keeping first-seen order.
pub fn parse_recipients(raw: &[String]) -> Result<Vec<Recipient>, DomainError> {
    if raw.is_empty() {
        return Err(DomainError::Validation(
            "at least one recipient is required".to_string(),
        ));
    }

    let mut recipients: Vec<Recipient> = Vec::with_capacity(raw.len());
    for address in raw {
        let recipient = Recipient::parse(address)?;
        if !recipients.contains(&recipient) {
            recipients.push(recipient);
        }
    }
    Ok(recipients)
}

/// Alphanumeric sender name or short code shown to the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderId(String);

impl SenderId {
    const MAX_LENGTH: usize = 16;

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::Validation("sender id cannot be empty".into()));
        }
        if value.chars().count() > Self::MAX_LENGTH {
            return Err(DomainError::Validation(format!(
                "sender id exceeds {} characters",
                Self::MAX_LENGTH
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '+')
        {
            return Err(DomainError::Validation(
                "sender id may only contain letters, digits, spaces and '+'".into(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
