use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mashaheer_core::adapters::postgres_store;
use mashaheer_core::cli::{self, Cli, Commands, DbCommands};
use mashaheer_core::config::Config;
use mashaheer_core::gateway::HesabeClient;
use mashaheer_core::health::{GatewayChecker, HealthChecks, PostgresChecker};
use mashaheer_core::middleware::request_logger::RequestLogSettings;
use mashaheer_core::notifications::HttpNotificationDispatcher;
use mashaheer_core::services::SweepScheduler;
use mashaheer_core::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging; LOG_FORMAT=json switches to structured output
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Sweep => {
            let state = build_state(&config).await?;
            cli::handle_sweep(&state.executor).await
        }
        Commands::Refund {
            booking_id,
            amount,
            reason,
            initiated_by,
        } => {
            let state = build_state(&config).await?;
            cli::handle_refund(&state.refunds, booking_id, amount.as_deref(), &reason, initiated_by).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let pool = db::create_pool(config).await?;
    db::run_migrations(&pool).await?;

    let gateway = HesabeClient::new(config.gateway.clone());
    tracing::info!("Hesabe client initialized with URL: {}", config.gateway.base_url);

    let notifier = Arc::new(HttpNotificationDispatcher::new(config.notifications.clone()));

    let health = HealthChecks::new()
        .with("postgres", true, Arc::new(PostgresChecker::new(pool.clone())))
        .with("hesabe", false, Arc::new(GatewayChecker::new(gateway.clone())));

    Ok(AppState::new(
        postgres_store(pool),
        gateway,
        notifier,
        config.default_currency.clone(),
        &config.admin_api_key,
    )
    .with_health(health)
    .with_cors_origins(config.cors_allowed_origins.clone())
    .with_request_logging(RequestLogSettings {
        log_body: config.log_request_body,
    }))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config).await?;

    if config.sweep_enabled {
        let scheduler = SweepScheduler::new(state.executor.clone(), &config.sweep_schedule)?;
        scheduler.start();
        tracing::info!("Automation sweep scheduled: {}", config.sweep_schedule);
    } else {
        tracing::warn!("Automation sweep scheduler disabled");
    }

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
