//! JSON HTTP API over the treasury and CRM services.

mod accounts;
mod crm;
pub mod error;
mod forecasts;
mod movements;
mod treasury;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::application::{CrmService, TreasuryService};

pub use error::{ApiError, ApiResult};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub treasury: TreasuryService,
    pub crm: CrmService,
}

impl AppState {
    pub fn new(treasury: TreasuryService) -> Self {
        let crm = CrmService::new(treasury.repository().clone());
        Self { treasury, crm }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(treasury::health_check))
        // Accounts
        .route(
            "/api/comptes-bancaires",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route(
            "/api/comptes-bancaires/:id",
            get(accounts::get_account).delete(accounts::close_account),
        )
        .route(
            "/api/comptes-bancaires/:id/mouvements",
            get(movements::list_account_movements).post(movements::record_movement),
        )
        .route(
            "/api/comptes-bancaires/:id/projection",
            get(forecasts::project_balance),
        )
        // Movements
        .route(
            "/api/mouvements/:id",
            put(movements::update_movement).delete(movements::delete_movement),
        )
        .route("/api/mouvements/:id/statut", post(movements::change_status))
        // Forecasts
        .route(
            "/api/previsions",
            get(forecasts::list_forecasts).post(forecasts::create_forecast),
        )
        .route("/api/previsions/:id/expansion", post(forecasts::expand_forecast))
        .route(
            "/api/previsions/:id/realisations",
            post(forecasts::record_realization),
        )
        // Treasury
        .route("/api/tresorerie/position", get(treasury::position))
        .route("/api/tresorerie/integrite", get(treasury::integrity))
        // CRM
        .route(
            "/api/crm/customers",
            get(crm::list_customers).post(crm::create_customer),
        )
        .route(
            "/api/crm/customers/update-intelligence",
            post(crm::score_all),
        )
        .route("/api/crm/customers/high-churn-risk", get(crm::high_churn_risk))
        .route("/api/crm/customers/high-value", get(crm::high_value))
        .route("/api/crm/customers/inactive", get(crm::inactive))
        .route(
            "/api/crm/customers/:id",
            get(crm::get_customer)
                .put(crm::update_customer)
                .delete(crm::deactivate_customer),
        )
        .route("/api/crm/customers/:id/purchases", post(crm::record_purchase))
        .route("/api/crm/customers/:id/intelligence", post(crm::score_customer))
        .route("/api/crm/analytics/segmentation", get(crm::segmentation))
        .route(
            "/api/crm/analytics/payment-behavior",
            get(crm::payment_behavior),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the API until ctrl-c or SIGTERM.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "HTTP server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
