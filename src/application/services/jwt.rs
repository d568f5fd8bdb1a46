use anyhow::Context;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Tokens are issued by the account service; this side only verifies them.
#[derive(Clone)]
pub struct JwtServiceConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct JwtService {
    decoding: DecodingKey,
    validation: Validation,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account reference the scheduled messages are owned by.
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

impl JwtService {
    pub fn new(config: &JwtServiceConfig) -> Self {
        Self {
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .context("failed to verify JWT")
    }
}
