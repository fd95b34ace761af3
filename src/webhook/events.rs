use serde_json::Value;

use crate::error::{AppError, Result};

/// Conclusion GitHub reports for a failed run or job.
pub const FAILURE: &str = "failure";

/// Which GitHub Actions payload shape an inbound webhook matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    WorkflowRun,
    WorkflowJob,
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::WorkflowRun => "workflow_run",
            EventKind::WorkflowJob => "workflow_job",
            EventKind::Unknown => "unknown",
        }
    }
}

/// Fields extracted from a webhook payload. Anything the payload did not
/// carry (or carried with the wrong type) is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub action: Option<String>,
    pub conclusion: Option<String>,
    pub repository_full_name: Option<String>,
    pub actor_login: Option<String>,
    /// Workflow name for runs, job name for jobs.
    pub workflow_name: Option<String>,
    pub branch: Option<String>,
}

/// Parse a raw request body into a webhook payload.
///
/// Only a JSON object is accepted; nothing about its contents is validated.
pub fn parse_payload(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::InvalidPayload("request body is empty".to_string()));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidPayload(format!("body is not valid JSON: {e}")))?;

    if !value.is_object() {
        return Err(AppError::InvalidPayload(
            "expected a JSON object at the top level".to_string(),
        ));
    }

    Ok(value)
}

/// Job actions that mark a finished job. GitHub only ever sends `completed`;
/// `failed` is accepted for senders that use it.
fn is_finished_job_action(action: &str) -> bool {
    matches!(action, "completed" | "failed")
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |current, key| current.get(*key))
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Determine the event shape and pull out the fields used for alerting.
pub fn classify(event: &Value) -> ClassifiedEvent {
    let repository_full_name = string_at(event, &["repository", "full_name"]);
    let actor_login = string_at(event, &["sender", "login"]);
    let action = string_at(event, &["action"]);

    if event.get("workflow_run").is_some() {
        return ClassifiedEvent {
            kind: EventKind::WorkflowRun,
            action,
            conclusion: string_at(event, &["workflow_run", "conclusion"]),
            repository_full_name,
            actor_login,
            workflow_name: string_at(event, &["workflow_run", "name"]),
            branch: string_at(event, &["workflow_run", "head_branch"]),
        };
    }

    let job_conclusion = string_at(event, &["workflow_job", "conclusion"]);
    if action.as_deref().is_some_and(is_finished_job_action) && job_conclusion.is_some() {
        return ClassifiedEvent {
            kind: EventKind::WorkflowJob,
            action,
            conclusion: job_conclusion,
            repository_full_name,
            actor_login,
            workflow_name: string_at(event, &["workflow_job", "name"]),
            branch: string_at(event, &["workflow_job", "head_branch"]),
        };
    }

    ClassifiedEvent {
        kind: EventKind::Unknown,
        action,
        conclusion: None,
        repository_full_name,
        actor_login,
        workflow_name: None,
        branch: None,
    }
}

impl ClassifiedEvent {
    pub fn is_recognized(&self) -> bool {
        self.kind != EventKind::Unknown
    }

    /// Whether this event should fire the failure side effects.
    pub fn is_failure(&self) -> bool {
        let failed = self.conclusion.as_deref() == Some(FAILURE);
        match self.kind {
            EventKind::WorkflowRun => failed,
            EventKind::WorkflowJob => {
                failed && self.action.as_deref().is_some_and(is_finished_job_action)
            }
            EventKind::Unknown => false,
        }
    }

    /// Render the chat alert for a failed run or job.
    pub fn alert_message(&self, environment: &str) -> String {
        let repo = self.repository_full_name.as_deref().unwrap_or("unknown");
        let actor = self.actor_login.as_deref().unwrap_or("unknown");
        let name = self.workflow_name.as_deref().unwrap_or("unknown");
        let label = match self.kind {
            EventKind::WorkflowJob => "Job",
            _ => "Workflow",
        };

        let mut message = format!("❌ CI/CD pipeline failed in {repo} by {actor}\n• {label}: {name}");
        if let Some(branch) = &self.branch {
            message.push_str(&format!("\n• Branch: {branch}"));
        }
        message.push_str(&format!("\n• Environment: {environment}"));
        message
    }

    /// Reason recorded in the rollback dispatch payload.
    pub fn rollback_reason(&self) -> String {
        let name = self.workflow_name.as_deref().unwrap_or("unknown");
        match &self.branch {
            Some(branch) => format!("{} '{name}' failed on {branch}", self.kind.as_str()),
            None => format!("{} '{name}' failed", self.kind.as_str()),
        }
    }
}
