use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::alerts::rollback::GitHubRollback;
use crate::alerts::slack::SlackNotifier;
use crate::alerts::{Notifier, RollbackTrigger};
use crate::config::AppConfig;

/// Read-only state shared by every request.
pub struct AppState {
    pub config: AppConfig,
    pub notifier: Arc<dyn Notifier>,
    pub rollback: Arc<dyn RollbackTrigger>,
}

impl AppState {
    pub fn new(config: AppConfig) -> crate::error::Result<Self> {
        let notifier = Arc::new(SlackNotifier::new(&config)?);
        let rollback = Arc::new(GitHubRollback::new(&config)?);

        if !notifier.is_configured() {
            tracing::warn!("No Slack webhook URL configured; failure alerts will be skipped");
        }
        if !rollback.is_configured() {
            tracing::warn!("No GitHub token configured; rollbacks will be skipped");
        }

        Ok(Self::with_components(config, notifier, rollback))
    }

    pub fn with_components(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        rollback: Arc<dyn RollbackTrigger>,
    ) -> Self {
        Self {
            config,
            notifier,
            rollback,
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/github-webhook", post(crate::webhook::handler::handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({ "message": "Pipeline Monitor Running 🚀" }))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "environment": state.config.environment,
        "slack_configured": state.notifier.is_configured(),
        "rollback_configured": state.rollback.is_configured(),
    }))
}
