use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::gateway::HesabeClient;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DependencyStatus::Healthy { .. })
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

/// Reports the payment gateway unhealthy while its circuit breaker is open.
pub struct GatewayChecker {
    client: HesabeClient,
}

impl GatewayChecker {
    pub fn new(client: HesabeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DependencyChecker for GatewayChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.client.circuit_state().as_str() {
            "closed" => DependencyStatus::healthy(start),
            state => DependencyStatus::unhealthy(format!("circuit breaker {}", state)),
        }
    }
}

#[derive(Clone)]
pub struct NamedCheck {
    pub name: String,
    /// A failing critical dependency makes the service unhealthy rather than degraded.
    pub critical: bool,
    pub checker: Arc<dyn DependencyChecker>,
}

#[derive(Clone)]
pub struct HealthChecks {
    checks: Vec<NamedCheck>,
    start_time: Instant,
}

impl HealthChecks {
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn with(mut self, name: &str, critical: bool, checker: Arc<dyn DependencyChecker>) -> Self {
        self.checks.push(NamedCheck {
            name: name.to_string(),
            critical,
            checker,
        });
        self
    }

    pub async fn run(&self) -> HealthResponse {
        let results = futures::future::join_all(self.checks.iter().map(|check| async move {
            let status = timeout(CHECK_TIMEOUT, check.checker.check())
                .await
                .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
            (check, status)
        }))
        .await;

        let mut dependencies = HashMap::new();
        let mut critical_failure = false;
        let mut other_failure = false;
        for (check, status) in results {
            if !status.is_healthy() {
                if check.critical {
                    critical_failure = true;
                } else {
                    other_failure = true;
                }
            }
            dependencies.insert(check.name.clone(), status);
        }

        HealthResponse {
            status: overall_status(critical_failure, other_failure).to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            dependencies,
        }
    }
}

impl Default for HealthChecks {
    fn default() -> Self {
        Self::new()
    }
}

fn overall_status(critical_failure: bool, other_failure: bool) -> &'static str {
    if critical_failure {
        "unhealthy"
    } else if other_failure {
        "degraded"
    } else {
        "healthy"
    }
}
