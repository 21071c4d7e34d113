//! In-memory [`Vcs`] double for exercising the workflow without a real
//! repository. Failure modes are scriptable per operation so tests can walk
//! every fatal and non-fatal branch of the run.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::{HealerError, Result};

use super::{CommitOutcome, PreconditionReport, ReviewRequest, Vcs};

/// How a scripted operation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Command ran and exited non-zero.
    CommandError,
    /// Command exceeded its time budget.
    Timeout,
}

#[derive(Debug, Default)]
struct FakeState {
    branches: Vec<String>,
    current_branch: String,
    commits: Vec<String>,
    pushes: Vec<String>,
    review_requests: Vec<ReviewRequest>,
    dirty: bool,
    changed_files: Vec<String>,
}

/// Scriptable in-memory VCS.
#[derive(Debug)]
pub struct FakeVcs {
    state: Mutex<FakeState>,
    fail_create_branch: Option<FailureMode>,
    fail_commit: Option<FailureMode>,
    fail_push: Option<FailureMode>,
    fail_review: bool,
    review_url: Option<String>,
    precondition_warnings: Vec<String>,
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeVcs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                current_branch: "main".to_string(),
                ..FakeState::default()
            }),
            fail_create_branch: None,
            fail_commit: None,
            fail_push: None,
            fail_review: false,
            review_url: Some("https://git.example.com/p/-/merge_requests/1".to_string()),
            precondition_warnings: Vec::new(),
        }
    }

    /// Start with local modifications already present.
    pub fn with_dirty_tree(self) -> Self {
        self.state.lock().unwrap().dirty = true;
        self
    }

    pub fn with_precondition_warning(mut self, warning: &str) -> Self {
        self.precondition_warnings.push(warning.to_string());
        self
    }

    pub fn failing_create_branch(mut self, mode: FailureMode) -> Self {
        self.fail_create_branch = Some(mode);
        self
    }

    pub fn failing_commit(mut self, mode: FailureMode) -> Self {
        self.fail_commit = Some(mode);
        self
    }

    pub fn failing_push(mut self, mode: FailureMode) -> Self {
        self.fail_push = Some(mode);
        self
    }

    pub fn failing_review(mut self) -> Self {
        self.fail_review = true;
        self
    }

    /// Simulate a deployment with no review API configured.
    pub fn without_review_api(mut self) -> Self {
        self.review_url = None;
        self
    }

    pub fn with_changed_files(self, files: &[&str]) -> Self {
        self.state.lock().unwrap().changed_files =
            files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn created_branches(&self) -> Vec<String> {
        self.state.lock().unwrap().branches.clone()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn pushed_branches(&self) -> Vec<String> {
        self.state.lock().unwrap().pushes.clone()
    }

    pub fn review_requests(&self) -> Vec<ReviewRequest> {
        self.state.lock().unwrap().review_requests.clone()
    }

    fn fail(mode: FailureMode, operation: &str) -> HealerError {
        match mode {
            FailureMode::CommandError => HealerError::GitCommand {
                operation: operation.to_string(),
                detail: "scripted failure".to_string(),
            },
            FailureMode::Timeout => HealerError::GitTimeout {
                operation: operation.to_string(),
                timeout_secs: 30,
            },
        }
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn create_branch(&self, name: &str, _from_ref: &str) -> Result<()> {
        if let Some(mode) = self.fail_create_branch {
            return Err(Self::fail(mode, "checkout"));
        }
        let mut state = self.state.lock().unwrap();
        state.branches.push(name.to_string());
        state.current_branch = name.to_string();
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<CommitOutcome> {
        if let Some(mode) = self.fail_commit {
            return Err(HealerError::Commit(Self::fail(mode, "commit").to_string()));
        }
        let mut state = self.state.lock().unwrap();
        if state.changed_files.is_empty() && !state.dirty {
            return Ok(CommitOutcome::NothingToCommit);
        }
        state.commits.push(message.to_string());
        state.dirty = false;
        Ok(CommitOutcome::Committed)
    }

    async fn push(&self, branch: &str) -> Result<()> {
        if let Some(mode) = self.fail_push {
            return Err(match mode {
                FailureMode::CommandError => {
                    HealerError::Push("scripted push failure".to_string())
                }
                FailureMode::Timeout => HealerError::GitTimeout {
                    operation: "push".to_string(),
                    timeout_secs: 120,
                },
            });
        }
        self.state.lock().unwrap().pushes.push(branch.to_string());
        Ok(())
    }

    async fn create_review_request(&self, request: &ReviewRequest) -> Result<Option<String>> {
        if self.fail_review {
            return Err(HealerError::ReviewRequest(
                "scripted review failure".to_string(),
            ));
        }
        let url = match &self.review_url {
            Some(url) => url,
            None => return Ok(None),
        };
        self.state
            .lock()
            .unwrap()
            .review_requests
            .push(request.clone());
        Ok(Some(url.clone()))
    }

    async fn current_branch(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().current_branch.clone())
    }

    async fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().dirty)
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().changed_files.clone())
    }

    async fn validate_preconditions(&self) -> Result<PreconditionReport> {
        let mut report = PreconditionReport::default();
        report.warnings = self.precondition_warnings.clone();
        if self.state.lock().unwrap().dirty {
            report
                .errors
                .push("working tree has uncommitted changes".to_string());
        }
        Ok(report)
    }
}
