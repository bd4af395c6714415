//! Structured audit logging for transfers and the tools they run
//!
//! Events are emitted as single-line JSON on the `audit` log target.

use chrono::Utc;
use std::path::Path;

/// Audit log entry
#[derive(Debug, serde::Serialize)]
struct AuditEvent {
    timestamp: String,
    process_id: u32,
    operation: String,
    resource: String,
    result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AuditEvent {
    fn new(operation: &str, resource: &str, result: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            process_id: std::process::id(),
            operation: operation.to_string(),
            resource: resource.to_string(),
            result: result.to_string(),
            details: None,
        }
    }

    fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "pid={} operation={} resource={} result={}",
                self.process_id, self.operation, self.resource, self.result
            )
        })
    }

    fn log(&self) {
        log::info!(target: "audit", "{}", self.to_json());
    }
}

fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "failure" }
}

/// Record an external tool run made on behalf of a transfer
pub fn log_tool_invocation(tool: &Path, args: &[&str], success: bool) {
    AuditEvent::new("run_tool", &tool.display().to_string(), outcome(success))
        .with_details(format!("args: {}", args.join(" ")))
        .log();
}

/// Record the start of a transfer attempt
pub fn log_transfer_started(source: &str, target: &str) {
    AuditEvent::new("transfer", "pipeline", "started")
        .with_details(format!("source: {source}; target: {target}"))
        .log();
}

/// Record a transfer attempt that ran every stage
pub fn log_transfer_completed(elapsed_secs: f64) {
    AuditEvent::new("transfer", "pipeline", outcome(true))
        .with_details(format!("elapsed: {elapsed_secs:.1}s"))
        .log();
}

/// Record a transfer attempt aborted by a stage error
pub fn log_transfer_failed(stage: &str, error: &str) {
    AuditEvent::new("transfer", stage, outcome(false))
        .with_details(format!("error: {error}"))
        .log();
}
