use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::Result;

use super::{DispatchOutcome, RollbackTrigger};

const EVENT_TYPE: &str = "rollback";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const CLIENT_USER_AGENT: &str = concat!("pipewatch/", env!("CARGO_PKG_VERSION"));

/// Fires a `repository_dispatch` event that a rollback workflow listens for.
pub struct GitHubRollback {
    client: Client,
    token: Option<String>,
    api_base_url: String,
    environment: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    event_type: &'a str,
    client_payload: ClientPayload<'a>,
}

#[derive(Debug, Serialize)]
struct ClientPayload<'a> {
    reason: &'a str,
    timestamp: String,
    environment: &'a str,
}

impl GitHubRollback {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let timeout = config.outbound_timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            token: config.github_token().map(str::to_string),
            api_base_url: config.github.api_base_url.trim_end_matches('/').to_string(),
            environment: config.environment.clone(),
            timeout,
        })
    }

    /// Split `owner/name`, accepting only characters GitHub allows in
    /// account and repository names so the parts are safe as path segments.
    fn parse_repo(repo_full_name: &str) -> Option<(&str, &str)> {
        let (owner, repo) = repo_full_name.split_once('/')?;
        let valid = |part: &str| {
            !part.is_empty()
                && part != "."
                && part != ".."
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        };
        (valid(owner) && valid(repo)).then_some((owner, repo))
    }
}

#[async_trait]
impl RollbackTrigger for GitHubRollback {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn trigger_rollback(
        &self,
        repository_full_name: Option<&str>,
        reason: &str,
    ) -> DispatchOutcome {
        // Missing token takes precedence over a missing or invalid repository
        let Some(token) = self.token.as_deref() else {
            tracing::warn!(repo = ?repository_full_name, "GitHub token not configured, skipping rollback");
            return DispatchOutcome::skipped("github token not configured");
        };

        let Some(repository_full_name) = repository_full_name else {
            tracing::warn!("Failure event has no repository, skipping rollback");
            return DispatchOutcome::skipped("repository not present in payload");
        };

        let Some((owner, repo)) = Self::parse_repo(repository_full_name) else {
            tracing::warn!(repo = %repository_full_name, "Invalid repository name, skipping rollback");
            return DispatchOutcome::skipped(format!(
                "invalid repository name: {repository_full_name:?}"
            ));
        };

        let url = format!("{}/repos/{owner}/{repo}/dispatches", self.api_base_url);
        let body = DispatchRequest {
            event_type: EVENT_TYPE,
            client_payload: ClientPayload {
                reason,
                timestamp: chrono::Utc::now().to_rfc3339(),
                environment: &self.environment,
            },
        };

        let result = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("token {token}"))
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&body)
            .send()
            .await;

        let outcome = match result {
            Ok(response) => DispatchOutcome::from_status(response.status(), StatusCode::NO_CONTENT),
            Err(e) => DispatchOutcome::from_transport_error(&e, self.timeout),
        };

        if outcome.succeeded {
            tracing::info!(repo = %repository_full_name, "Rollback dispatch accepted");
        } else {
            tracing::warn!(
                repo = %repository_full_name,
                detail = %outcome.detail,
                "Rollback dispatch failed"
            );
        }

        outcome
    }
}
