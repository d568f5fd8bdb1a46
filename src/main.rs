use std::sync::Arc;

use anyhow::Context;
use poem::{Server, listener::TcpListener};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scheduled_messaging::{
    app::{App, AppSettings},
    application::services::{
        cost::CostCalculator,
        delivery::{DeliveryProvider, ProviderGateway},
        event_bus::MessageBus,
    },
    config::{Config, LogFormat, ProviderProtocol, ProviderSettings},
    domain::repositories::ScheduledMessageRepository,
    infrastructure::{
        messaging::{FormApiProvider, JetstreamBus, JsonApiProvider, LocalBus},
        repositories::{InMemoryScheduledMessageRepository, PostgresScheduledMessageRepository, postgres},
    },
    presentation::http::routes,
};

const LOCAL_BUS_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let repo: Arc<dyn ScheduledMessageRepository> = match config.storage.database_url.as_deref() {
        Some(url) => {
            let pool = postgres::connect(url, config.storage.max_connections)
                .await
                .context("failed to connect to the database")?;
            info!("database pool created");
            PostgresScheduledMessageRepository::new(pool)
        }
        None => {
            warn!("DATABASE_URL not set, messages are kept in memory only");
            Arc::new(InMemoryScheduledMessageRepository::new())
        }
    };

    let primary = build_provider(&config, "primary", &config.providers.primary)?;
    let backup = config
        .providers
        .backup
        .as_ref()
        .map(|settings| build_provider(&config, "backup", settings))
        .transpose()?;
    let gateway = Arc::new(ProviderGateway::new(primary, backup, config.gateway_config()));

    let calculator = CostCalculator::new(config.billing.rates, config.billing.home_prefix.clone());

    let local_bus = LocalBus::new(LOCAL_BUS_CAPACITY);
    let (bus, jetstream_trigger): (Arc<dyn MessageBus>, _) = match config.jetstream_config() {
        Some(jetstream) => {
            let (bus, trigger) = JetstreamBus::new(&jetstream)
                .await
                .context("failed to connect to NATS")?;
            info!(subject = %jetstream.subject, "publishing scheduling events to jetstream");
            (bus as Arc<dyn MessageBus>, Some(trigger))
        }
        None => (local_bus.clone() as Arc<dyn MessageBus>, None),
    };

    let app = App::assemble(repo, gateway, bus, calculator, AppSettings::from(&config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();
    tasks.extend(app.worker.clone().spawn_interval(shutdown_rx.clone()));
    match jetstream_trigger {
        Some(trigger) => tasks.extend(trigger.spawn(app.worker.clone(), shutdown_rx.clone())),
        None => tasks.extend(
            app.worker
                .clone()
                .spawn_event_driven(local_bus.subscribe(), shutdown_rx.clone()),
        ),
    }
    tasks.push(
        app.gateway
            .clone()
            .spawn_health_probe(config.providers.health_recheck, shutdown_rx.clone()),
    );

    let server_url = config.server_url();
    let routes = routes(app.api_state.clone(), &server_url);
    info!(url = %server_url, "starting server");

    Server::new(TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    )))
    .run_with_graceful_shutdown(
        routes,
        async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for ctrl-c");
            }
        },
        None,
    )
    .await?;

    info!("shutting down background loops");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(err) = task.await {
            warn!(error = %err, "background task ended abnormally");
        }
    }
    app.worker.drain().await;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scheduled_messaging=info,poem=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn build_provider(
    config: &Config,
    name: &str,
    settings: &ProviderSettings,
) -> anyhow::Result<Arc<dyn DeliveryProvider>> {
    let endpoint = config.provider_endpoint(name, settings);
    match settings.protocol {
        ProviderProtocol::Json => JsonApiProvider::new(endpoint),
        ProviderProtocol::Form => FormApiProvider::new(endpoint),
    }
    .with_context(|| format!("failed to build {name} provider client"))
}
