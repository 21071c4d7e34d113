//! Version-control adapter.
//!
//! The workflow engine depends only on the [`Vcs`] trait; [`git::GitCli`]
//! shells out to a real `git`, and [`fake::FakeVcs`] satisfies the contract
//! in memory so workflow logic is testable without a repository.

pub mod fake;
pub mod git;
pub mod review;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::Result;

/// Whether `commit` recorded anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Clean tree; reported as success, not failure.
    NothingToCommit,
}

/// Review-request payload sent to the hosting platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
    /// Squash on merge for a clean history.
    pub squash: bool,
}

/// Result of checking preconditions for an atomic run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreconditionReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PreconditionReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Minimal branch/commit/push/review operations over one working tree.
///
/// All operations execute under a bounded wall-clock timeout; a timeout is
/// reported as a distinct error kind from a command-exit failure.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Check out `from_ref`, pull it up to date, then create and switch to
    /// `name`. Fails when the tree has uncommitted changes or the remote is
    /// unreachable.
    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<()>;

    /// Stage the full working tree and commit. A clean tree is a successful
    /// no-op.
    async fn commit(&self, message: &str) -> Result<CommitOutcome>;

    /// Push the branch upstream. Callers treat failure as non-fatal: the
    /// branch remains valid locally.
    async fn push(&self, branch: &str) -> Result<()>;

    /// Best-effort review-request creation; `Ok(None)` when no review API
    /// is configured.
    async fn create_review_request(&self, request: &ReviewRequest) -> Result<Option<String>>;

    async fn current_branch(&self) -> Result<String>;

    async fn has_uncommitted_changes(&self) -> Result<bool>;

    /// Files changed relative to HEAD.
    async fn changed_files(&self) -> Result<Vec<String>>;

    /// Verify the tree is fit for an atomic run: inside a work tree, clean,
    /// remote reachable (reachability problems are warnings only).
    async fn validate_preconditions(&self) -> Result<PreconditionReport>;
}
