use bigdecimal::BigDecimal;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::Config;
use crate::services::{RefundCommand, RefundInitiator, TransitionExecutor};
use crate::utils::sanitize::mask;

#[derive(Parser)]
#[command(name = "mashaheer-core")]
#[command(about = "Mashaheer booking automation and payment reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and the sweep scheduler (default)
    Serve,

    /// Run one automation sweep and print its summary
    Sweep,

    /// Refund the completed payment of a booking
    Refund {
        /// Booking UUID
        #[arg(value_name = "BOOKING_ID")]
        booking_id: Uuid,

        /// Partial amount; defaults to the full payment
        #[arg(short, long)]
        amount: Option<String>,

        #[arg(short, long)]
        reason: String,

        /// Operator UUID recorded on the refund
        #[arg(long)]
        initiated_by: Option<Uuid>,
    },

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_sweep(executor: &TransitionExecutor) -> anyhow::Result<()> {
    let summary = executor.run_sweep(Utc::now()).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.errors.is_empty() {
        anyhow::bail!("sweep finished with {} errors", summary.errors.len());
    }
    Ok(())
}

pub async fn handle_refund(
    refunds: &RefundInitiator,
    booking_id: Uuid,
    amount: Option<&str>,
    reason: &str,
    initiated_by: Option<Uuid>,
) -> anyhow::Result<()> {
    let amount = amount
        .map(|raw| BigDecimal::from_str(raw.trim()))
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid amount: {}", e))?;

    let outcome = refunds
        .initiate(RefundCommand {
            booking_id,
            amount,
            reason: reason.to_string(),
            initiated_by,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.success {
        anyhow::bail!("refund {} failed", outcome.refund_id);
    }
    println!("✓ Refund {} is {}", outcome.refund_id, outcome.status);
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Hesabe URL: {}", config.gateway.base_url);
    println!("  Hesabe Merchant: {}", config.gateway.merchant_code);
    println!("  Hesabe Access Code: {}", mask(&config.gateway.access_code));
    println!("  Notification URL: {}", config.notifications.url);
    println!("  Default Currency: {}", config.default_currency);
    println!(
        "  Sweep: {} ({})",
        config.sweep_schedule,
        if config.sweep_enabled { "enabled" } else { "disabled" }
    );

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
