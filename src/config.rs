use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};

use crate::{
    application::{
        handlers::{dispatch_worker::WorkerConfig, message_dispatcher::RetryPolicy},
        services::delivery::GatewayConfig,
        usecases::schedule_message::ScheduleMessageConfig,
    },
    domain::models::RateCard,
    infrastructure::messaging::{JetstreamConfig, ProviderEndpoint},
};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub providers: ProvidersConfig,
    pub billing: BillingConfig,
    pub dispatch: DispatchConfig,
    pub event_bus: EventBusConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub scheme: String,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// In-memory store when absent.
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderProtocol {
    Json,
    Form,
}

impl FromStr for ProviderProtocol {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(ProviderProtocol::Json),
            "form" => Ok(ProviderProtocol::Form),
            other => Err(anyhow!("unknown provider protocol {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub url: String,
    pub api_key: String,
    pub username: Option<String>,
    pub protocol: ProviderProtocol,
}

#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub primary: ProviderSettings,
    pub backup: Option<ProviderSettings>,
    pub backup_enabled: bool,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub health_recheck: Duration,
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub rates: RateCard,
    pub home_prefix: String,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub max_in_flight: usize,
    pub default_max_retries: u32,
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
    pub claim_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// In-process broadcast bus when absent.
    pub nats_url: Option<String>,
    pub stream: String,
    pub subject: String,
    pub durable: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let backup = match env.optional("BACKUP_PROVIDER_URL") {
            Some(url) => Some(ProviderSettings {
                url,
                api_key: env.required("BACKUP_PROVIDER_API_KEY")?,
                username: env.optional("BACKUP_PROVIDER_USERNAME"),
                protocol: env.parsed("BACKUP_PROVIDER_PROTOCOL", ProviderProtocol::Json)?,
            }),
            None => None,
        };

        Ok(Self {
            server: ServerConfig {
                port: env.parsed("PORT", 8080)?,
                scheme: env.or("SCHEME", "http"),
                host: env.or("HOST", "localhost"),
            },
            storage: StorageConfig {
                database_url: env.optional("DATABASE_URL"),
                max_connections: env.parsed("DB_MAX_CONNECTIONS", 10)?,
            },
            auth: AuthConfig {
                jwt_secret: env.required("JWT_SECRET")?,
            },
            providers: ProvidersConfig {
                primary: ProviderSettings {
                    url: env.required("PRIMARY_PROVIDER_URL")?,
                    api_key: env.required("PRIMARY_PROVIDER_API_KEY")?,
                    username: env.optional("PRIMARY_PROVIDER_USERNAME"),
                    protocol: env.parsed("PRIMARY_PROVIDER_PROTOCOL", ProviderProtocol::Json)?,
                },
                backup_enabled: env.parsed("BACKUP_PROVIDER_ENABLED", backup.is_some())?,
                backup,
                timeout: Duration::from_millis(env.parsed("PROVIDER_TIMEOUT_MS", 10_000)?),
                retry_attempts: env.parsed("PROVIDER_RETRY_ATTEMPTS", 1)?,
                retry_delay: Duration::from_millis(env.parsed("PROVIDER_RETRY_DELAY_MS", 500)?),
                health_recheck: Duration::from_secs(env.parsed("PROVIDER_HEALTH_RECHECK_SECS", 60)?),
            },
            billing: BillingConfig {
                rates: RateCard {
                    domestic: env.parsed("DOMESTIC_RATE", RateCard::default().domestic)?,
                    international: env.parsed("INTERNATIONAL_RATE", RateCard::default().international)?,
                    voice: env.parsed("VOICE_RATE", RateCard::default().voice)?,
                },
                home_prefix: env.or("HOME_COUNTRY_PREFIX", "+254"),
            },
            dispatch: DispatchConfig {
                enabled: env.parsed("DISPATCH_ENABLED", true)?,
                poll_interval: Duration::from_millis(env.parsed("POLL_INTERVAL_MS", 5_000)?),
                batch_size: env.parsed("BATCH_SIZE", 50)?,
                max_in_flight: env.parsed("MAX_IN_FLIGHT", 10)?,
                default_max_retries: env.parsed("DEFAULT_MAX_RETRIES", 3)?,
                retry_backoff: Duration::from_secs(env.parsed("RETRY_BACKOFF_SECS", 30)?),
                retry_backoff_max: Duration::from_secs(env.parsed("RETRY_BACKOFF_MAX_SECS", 900)?),
                claim_timeout: Duration::from_secs(env.parsed("CLAIM_TIMEOUT_SECS", 600)?),
            },
            event_bus: EventBusConfig {
                nats_url: env.optional("NATS_URL"),
                stream: env.or("NATS_STREAM", "SCHEDULED_MESSAGES"),
                subject: env.or("NATS_SUBJECT", "messages.scheduled"),
                durable: env.or("NATS_DURABLE", "dispatch-trigger"),
            },
            log_format: match env.or("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => return Err(anyhow!("LOG_FORMAT must be json or pretty, got {other}")),
            },
        })
    }

    pub fn server_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.server.scheme, self.server.host, self.server.port
        )
    }

    pub fn provider_endpoint(&self, name: &str, settings: &ProviderSettings) -> ProviderEndpoint {
        ProviderEndpoint {
            name: name.to_string(),
            base_url: settings.url.clone(),
            api_key: settings.api_key.clone(),
            username: settings.username.clone(),
            timeout: self.providers.timeout,
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            request_timeout: self.providers.timeout,
            retry_attempts: self.providers.retry_attempts,
            retry_delay: self.providers.retry_delay,
            health_recheck: self.providers.health_recheck,
            backup_enabled: self.providers.backup_enabled,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            name: "dispatch".to_string(),
            enabled: self.dispatch.enabled,
            poll_interval: self.dispatch.poll_interval,
            batch_size: self.dispatch.batch_size,
            max_in_flight: self.dispatch.max_in_flight,
            claim_timeout: self.dispatch.claim_timeout,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: self.dispatch.retry_backoff,
            max_delay: self.dispatch.retry_backoff_max,
        }
    }

    pub fn schedule_config(&self) -> ScheduleMessageConfig {
        ScheduleMessageConfig {
            default_max_retries: self.dispatch.default_max_retries,
            ..ScheduleMessageConfig::default()
        }
    }

    pub fn jetstream_config(&self) -> Option<JetstreamConfig> {
        self.event_bus.nats_url.as_ref().map(|url| JetstreamConfig {
            url: url.clone(),
            stream: self.event_bus.stream.clone(),
            subject: self.event_bus.subject.clone(),
            durable: self.event_bus.durable.clone(),
            pull_batch: 32,
            ack_wait_seconds: 30,
            max_deliver: 5,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> anyhow::Result<String> {
        self.optional(key)
            .ok_or_else(|| anyhow!("{key} environment variable is required"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|err| anyhow!("{err}"))
                .with_context(|| format!("{key} has an invalid value {raw:?}")),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("JWT_SECRET", "secret"),
        ("PRIMARY_PROVIDER_URL", "https://sms.example.com"),
        ("PRIMARY_PROVIDER_API_KEY", "key"),
    ];

    #[test]
    fn defaults_apply_to_a_minimal_environment() {
        let config = load(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.storage.database_url.is_none());
        assert!(config.providers.backup.is_none());
        assert!(!config.providers.backup_enabled);
        assert_eq!(config.billing.rates, RateCard::default());
        assert_eq!(config.billing.home_prefix, "+254");
        assert_eq!(config.dispatch.poll_interval, Duration::from_secs(5));
        assert_eq!(config.dispatch.default_max_retries, 3);
        assert!(config.jetstream_config().is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = load(&MINIMAL[1..]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn bad_numbers_name_the_variable() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("BATCH_SIZE", "lots"));
        let err = load(&pairs).unwrap_err();
        assert!(err.to_string().contains("BATCH_SIZE"));
    }

    #[test]
    fn backup_is_enabled_when_configured() {
        let mut pairs = MINIMAL.to_vec();
        pairs.extend([
            ("BACKUP_PROVIDER_URL", "https://backup.example.com"),
            ("BACKUP_PROVIDER_API_KEY", "other"),
            ("BACKUP_PROVIDER_PROTOCOL", "form"),
        ]);
        let config = load(&pairs).unwrap();
        let backup = config.providers.backup.as_ref().unwrap();
        assert_eq!(backup.protocol, ProviderProtocol::Form);
        assert!(config.gateway_config().backup_enabled);

        pairs.push(("BACKUP_PROVIDER_ENABLED", "false"));
        assert!(!load(&pairs).unwrap().gateway_config().backup_enabled);
    }
}
