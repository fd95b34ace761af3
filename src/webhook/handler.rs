use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::Result;
use crate::server::AppState;
use crate::webhook::events::{classify, parse_payload, ClassifiedEvent};

/// Body returned for every accepted webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WebhookResponse {
    /// Not a workflow run or finished job.
    Ignored,
    /// Recognized, but not a failure.
    Ok {
        workflow_status: Option<String>,
        processed: bool,
    },
    /// A failure; side effects were attempted.
    Processed {
        workflow_status: Option<String>,
        notifications: NotificationSummary,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    pub slack_sent: bool,
    pub rollback_triggered: bool,
}

pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    let event_type = headers.get("x-github-event").and_then(|v| v.to_str().ok());
    let delivery = headers.get("x-github-delivery").and_then(|v| v.to_str().ok());

    let payload = parse_payload(&body).inspect_err(|e| {
        tracing::warn!(error = %e, event_type = ?event_type, delivery = ?delivery, "Rejecting webhook");
    })?;

    let event = classify(&payload);

    tracing::info!(
        event_type = ?event_type,
        delivery = ?delivery,
        kind = event.kind.as_str(),
        repo = ?event.repository_full_name,
        conclusion = ?event.conclusion,
        "Received webhook event"
    );

    Ok(Json(process_event(&state, &event).await))
}

/// Decide what to do with a classified event and run the failure side effects.
pub async fn process_event(state: &AppState, event: &ClassifiedEvent) -> WebhookResponse {
    if !event.is_recognized() {
        tracing::debug!("Ignoring unrecognized webhook payload");
        return WebhookResponse::Ignored;
    }

    if !event.is_failure() {
        return WebhookResponse::Ok {
            workflow_status: event.conclusion.clone(),
            processed: false,
        };
    }

    tracing::info!(
        repo = ?event.repository_full_name,
        actor = ?event.actor_login,
        workflow = ?event.workflow_name,
        branch = ?event.branch,
        "Pipeline failure detected"
    );

    let message = event.alert_message(&state.config.environment);
    let reason = event.rollback_reason();

    // Independent side effects; neither short-circuits the other
    let (slack, rollback) = tokio::join!(
        state.notifier.notify(&message),
        state
            .rollback
            .trigger_rollback(event.repository_full_name.as_deref(), &reason),
    );

    tracing::info!(
        slack_attempted = slack.attempted,
        slack_sent = slack.succeeded,
        slack_detail = %slack.detail,
        rollback_attempted = rollback.attempted,
        rollback_triggered = rollback.succeeded,
        rollback_detail = %rollback.detail,
        "Failure handling complete"
    );

    WebhookResponse::Processed {
        workflow_status: event.conclusion.clone(),
        notifications: NotificationSummary {
            slack_sent: slack.succeeded,
            rollback_triggered: rollback.succeeded,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::alerts::{DispatchOutcome, Notifier, RollbackTrigger};
    use crate::config::AppConfig;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: AtomicUsize,
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn is_configured(&self) -> bool {
            true
        }

        async fn notify(&self, message: &str) -> DispatchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.messages.lock().unwrap().push(message.to_string());
            if self.fail {
                DispatchOutcome::failed("connection failed")
            } else {
                DispatchOutcome::delivered("HTTP 200")
            }
        }
    }

    #[derive(Default)]
    struct RecordingRollback {
        calls: AtomicUsize,
        repos: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl RollbackTrigger for RecordingRollback {
        fn is_configured(&self) -> bool {
            true
        }

        async fn trigger_rollback(
            &self,
            repository_full_name: Option<&str>,
            _reason: &str,
        ) -> DispatchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.repos
                .lock()
                .unwrap()
                .push(repository_full_name.map(str::to_string));
            match repository_full_name {
                Some(_) => DispatchOutcome::delivered("HTTP 204"),
                None => DispatchOutcome::skipped("repository not present in payload"),
            }
        }
    }

    fn state_with(notifier: Arc<RecordingNotifier>, rollback: Arc<RecordingRollback>) -> AppState {
        AppState::with_components(AppConfig::default(), notifier, rollback)
    }

    #[tokio::test]
    async fn test_failure_invokes_both_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let rollback = Arc::new(RecordingRollback::default());
        let state = state_with(Arc::clone(&notifier), Arc::clone(&rollback));

        let event = classify(&json!({
            "workflow_run": {"conclusion": "failure", "name": "CI", "head_branch": "main"},
            "repository": {"full_name": "org/repo"},
            "sender": {"login": "alice"}
        }));
        let response = process_event(&state, &event).await;

        assert_eq!(
            response,
            WebhookResponse::Processed {
                workflow_status: Some("failure".to_string()),
                notifications: NotificationSummary {
                    slack_sent: true,
                    rollback_triggered: true,
                },
            }
        );
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rollback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *rollback.repos.lock().unwrap(),
            vec![Some("org/repo".to_string())]
        );
        assert!(notifier.messages.lock().unwrap()[0].contains("org/repo by alice"));
    }

    #[tokio::test]
    async fn test_success_invokes_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let rollback = Arc::new(RecordingRollback::default());
        let state = state_with(Arc::clone(&notifier), Arc::clone(&rollback));

        let event = classify(&json!({"workflow_run": {"conclusion": "success"}}));
        let response = process_event(&state, &event).await;

        assert_eq!(
            response,
            WebhookResponse::Ok {
                workflow_status: Some("success".to_string()),
                processed: false,
            }
        );
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(rollback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_is_ignored() {
        let notifier = Arc::new(RecordingNotifier::default());
        let rollback = Arc::new(RecordingRollback::default());
        let state = state_with(Arc::clone(&notifier), Arc::clone(&rollback));

        let event = classify(&json!({"action": "opened", "issue": {"number": 1}}));
        assert_eq!(process_event(&state, &event).await, WebhookResponse::Ignored);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(rollback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_block_rollback() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let rollback = Arc::new(RecordingRollback::default());
        let state = state_with(Arc::clone(&notifier), Arc::clone(&rollback));

        let event = classify(&json!({
            "action": "completed",
            "workflow_job": {"conclusion": "failure", "name": "build"},
            "repository": {"full_name": "org/repo"}
        }));
        let response = process_event(&state, &event).await;

        assert_eq!(
            response,
            WebhookResponse::Processed {
                workflow_status: Some("failure".to_string()),
                notifications: NotificationSummary {
                    slack_sent: false,
                    rollback_triggered: true,
                },
            }
        );
        assert_eq!(rollback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_repository_still_invokes_both() {
        let notifier = Arc::new(RecordingNotifier::default());
        let rollback = Arc::new(RecordingRollback::default());
        let state = state_with(Arc::clone(&notifier), Arc::clone(&rollback));

        let event = classify(&json!({
            "workflow_run": {"conclusion": "failure"},
            "sender": {"login": "x"}
        }));
        let response = process_event(&state, &event).await;

        assert_eq!(
            response,
            WebhookResponse::Processed {
                workflow_status: Some("failure".to_string()),
                notifications: NotificationSummary {
                    slack_sent: true,
                    rollback_triggered: false,
                },
            }
        );
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rollback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*rollback.repos.lock().unwrap(), vec![None]);
    }

    #[test]
    fn test_response_serialization() {
        assert_eq!(
            serde_json::to_value(WebhookResponse::Ignored).unwrap(),
            json!({"status": "ignored"})
        );
        assert_eq!(
            serde_json::to_value(WebhookResponse::Ok {
                workflow_status: None,
                processed: false,
            })
            .unwrap(),
            json!({"status": "ok", "workflow_status": null, "processed": false})
        );
        assert_eq!(
            serde_json::to_value(WebhookResponse::Processed {
                workflow_status: Some("failure".to_string()),
                notifications: NotificationSummary {
                    slack_sent: true,
                    rollback_triggered: false,
                },
            })
            .unwrap(),
            json!({
                "status": "processed",
                "workflow_status": "failure",
                "notifications": {"slack_sent": true, "rollback_triggered": false}
            })
        );
    }
}
