pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod notifications;
pub mod ports;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::gateway::HesabeClient;
use crate::health::HealthChecks;
use crate::middleware::request_logger::RequestLogSettings;
use crate::notifications::NotificationDispatcher;
use crate::ports::Store;
use crate::services::{PaymentReconciler, RefundInitiator, TransitionExecutor};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub executor: TransitionExecutor,
    pub reconciler: PaymentReconciler,
    pub refunds: RefundInitiator,
    pub health: HealthChecks,
    pub admin_api_key: Arc<str>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub request_logging: RequestLogSettings,
}

impl AppState {
    /// Wires the services over one store, gateway client and notifier.
    pub fn new(
        store: Store,
        gateway: HesabeClient,
        notifier: Arc<dyn NotificationDispatcher>,
        default_currency: String,
        admin_api_key: &str,
    ) -> Self {
        let refunds = RefundInitiator::new(store.clone(), gateway);
        let executor = TransitionExecutor::new(store.clone(), refunds.clone(), notifier.clone());
        let reconciler = PaymentReconciler::new(store.clone(), notifier, default_currency);

        Self {
            store,
            executor,
            reconciler,
            refunds,
            health: HealthChecks::new(),
            admin_api_key: Arc::from(admin_api_key),
            cors_allowed_origins: None,
            request_logging: RequestLogSettings::default(),
        }
    }

    pub fn with_health(mut self, health: HealthChecks) -> Self {
        self.health = health;
        self
    }

    pub fn with_cors_origins(mut self, origins: Option<Vec<String>>) -> Self {
        self.cors_allowed_origins = origins;
        self
    }

    pub fn with_request_logging(mut self, settings: RequestLogSettings) -> Self {
        self.request_logging = settings;
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/automation/sweep", post(handlers::automation::run_sweep))
        .route("/refunds", post(handlers::refunds::create_refund))
        .route("/bookings/:id/refunds", get(handlers::refunds::list_refunds))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth,
        ));

    let cors = cors_layer(state.cors_allowed_origins.as_deref());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/hesabe", post(handlers::webhook::hesabe_callback))
        .merge(admin)
        .layer(axum_middleware::from_fn_with_state(
            state.request_logging,
            middleware::request_logger::request_logger,
        ))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origins {
        Some(origins) if !origins.is_empty() => {
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            layer.allow_origin(allowed)
        }
        _ => layer.allow_origin(Any),
    }
}
