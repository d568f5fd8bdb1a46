pub mod form_api;
pub mod jetstream;
pub mod json_api;
pub mod local;

use std::time::Duration;

pub use form_api::FormApiProvider;
pub use jetstream::{JetstreamBus, JetstreamConfig, JetstreamTrigger};
pub use json_api::JsonApiProvider;
pub use local::LocalBus;

/// Connection details shared by the HTTP delivery backends.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub username: Option<String>,
    pub timeout: Duration,
}

impl ProviderEndpoint {
    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_without_double_slashes() {
        let endpoint = ProviderEndpoint {
            name: "primary".into(),
            base_url: "https://sms.example.com/v1/".into(),
            api_key: "key".into(),
            username: None,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(endpoint.url("/messages"), "https://sms.example.com/v1/messages");
        assert_eq!(endpoint.url("health"), "https://sms.example.com/v1/health");
    }
}
