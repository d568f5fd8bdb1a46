use poem::{Error as PoemError, Result as PoemResult, http::StatusCode};
use poem_openapi::SecurityScheme;
use poem_openapi::auth::Bearer;
use tracing::debug;

use crate::application::services::jwt::{JwtService, JwtServiceConfig};

#[derive(SecurityScheme)]
#[oai(ty = "bearer", bearer_format = "JWT")]
pub struct JwtAuth(pub Bearer);

pub struct AuthenticatedUser {
    /// Owner reference attached to every message the caller schedules.
    pub owner_ref: String,
}

impl JwtAuth {
    pub fn into_user(self, config: &JwtServiceConfig) -> PoemResult<AuthenticatedUser> {
        let service = JwtService::new(config);
        match service.verify(&self.0.token) {
            Ok(claims) if !claims.sub.trim().is_empty() => Ok(AuthenticatedUser {
                owner_ref: claims.sub,
            }),
            Ok(_) => Err(PoemError::from_string(
                "token has no subject",
                StatusCode::UNAUTHORIZED,
            )),
            Err(err) => {
                debug!(error = %err, "rejected bearer token");
                Err(PoemError::from_string(
                    "invalid or expired token",
                    StatusCode::UNAUTHORIZED,
                ))
            }
        }
    }
}
