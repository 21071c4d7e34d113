//! Domain-level error taxonomy for the healer.
//!
//! The split mirrors the recovery policy: plan- and fix-local errors are
//! recovered by excluding the offending plan, while errors that touch
//! repository integrity (branch creation, commit, an enabled build gate)
//! abort the whole run. Push and review-request failures are surfaced as
//! warnings, never as terminal errors.

/// Errors produced while screening fix plans.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("fix plan {issue_key} missing required field: {field}")]
    MissingField { issue_key: String, field: String },

    #[error("fix plan {issue_key} has line number {line} (must be >= 1)")]
    InvalidLine { issue_key: String, line: i64 },

    #[error("fix plan {issue_key} confidence {score} outside [0, 1]")]
    ConfidenceOutOfRange { issue_key: String, score: f64 },

    #[error("fix plan {issue_key} confidence {score} below threshold {threshold}")]
    BelowThreshold {
        issue_key: String,
        score: f64,
        threshold: f64,
    },
}

/// Healer domain errors.
#[derive(Debug, thiserror::Error)]
pub enum HealerError {
    #[error("invalid fix plan: {0}")]
    Plan(#[from] PlanError),

    #[error("cannot apply fix {issue_key}: {reason}")]
    Application { issue_key: String, reason: String },

    #[error("syntax validation failed: {0}")]
    SyntaxValidation(String),

    #[error("git {operation} failed: {detail}")]
    GitCommand { operation: String, detail: String },

    #[error("git {operation} timed out after {timeout_secs}s")]
    GitTimeout { operation: String, timeout_secs: u64 },

    #[error("{tool} build failed with exit code {exit_code}")]
    BuildFailed { tool: String, exit_code: i32 },

    #[error("build timed out after {timeout_secs}s")]
    BuildTimeout { timeout_secs: u64 },

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("push failed: {0}")]
    Push(String),

    #[error("review request failed: {0}")]
    ReviewRequest(String),

    #[error("issue source error: {0}")]
    IssueSource(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HealerError {
    /// Whether this error leaves the repository in a state where further
    /// git operations must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HealerError::GitCommand { .. }
                | HealerError::GitTimeout { .. }
                | HealerError::BuildFailed { .. }
                | HealerError::BuildTimeout { .. }
                | HealerError::Commit(_)
        )
    }
}

/// Result type for healer domain operations.
pub type Result<T> = std::result::Result<T, HealerError>;
