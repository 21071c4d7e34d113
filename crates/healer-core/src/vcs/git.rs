//! Git adapter shelling out to the `git` binary.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::error::{HealerError, Result};
use crate::vcs::review::ReviewClient;
use crate::vcs::{CommitOutcome, PreconditionReport, ReviewRequest, Vcs};

/// Output of one git invocation.
#[derive(Debug, Clone)]
struct GitOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl GitOutput {
    fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Subprocess-backed [`Vcs`] implementation over one working tree.
pub struct GitCli {
    repo_path: PathBuf,
    remote_name: String,
    /// Local operations (checkout, add, commit, status).
    local_timeout_secs: u64,
    /// Network operations (pull, push, ls-remote).
    network_timeout_secs: u64,
    review: Option<ReviewClient>,
}

impl GitCli {
    pub fn new(repo_path: PathBuf, remote_name: String) -> Self {
        Self {
            repo_path,
            remote_name,
            local_timeout_secs: 30,
            network_timeout_secs: 120,
            review: None,
        }
    }

    pub fn with_timeouts(mut self, local_secs: u64, network_secs: u64) -> Self {
        self.local_timeout_secs = local_secs;
        self.network_timeout_secs = network_secs;
        self
    }

    pub fn with_review_client(mut self, review: ReviewClient) -> Self {
        self.review = Some(review);
        self
    }

    /// Run `git <args>` in the repository with a bounded wall-clock limit.
    /// A timeout maps to [`HealerError::GitTimeout`], distinct from a
    /// non-zero exit.
    async fn run_git(&self, operation: &str, args: &[&str], timeout_secs: u64) -> Result<GitOutput> {
        debug!(operation, ?args, "running git");

        let child = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A hung git must not outlive the timeout below.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HealerError::GitCommand {
                operation: operation.to_string(),
                detail: format!("failed to spawn git: {e}"),
            })?;

        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| HealerError::GitTimeout {
                operation: operation.to_string(),
                timeout_secs,
            })?
            .map_err(|e| HealerError::GitCommand {
                operation: operation.to_string(),
                detail: e.to_string(),
            })?;

        Ok(GitOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn expect_success(&self, operation: &str, args: &[&str], timeout_secs: u64) -> Result<GitOutput> {
        let output = self.run_git(operation, args, timeout_secs).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(HealerError::GitCommand {
                operation: operation.to_string(),
                detail: output.stderr.trim().to_string(),
            })
        }
    }

    async fn is_work_tree(&self) -> bool {
        self.run_git(
            "rev-parse",
            &["rev-parse", "--is-inside-work-tree"],
            self.local_timeout_secs,
        )
        .await
        .map(|o| o.success())
        .unwrap_or(false)
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        if self.has_uncommitted_changes().await? {
            return Err(HealerError::GitCommand {
                operation: "create-branch".to_string(),
                detail: "working tree has uncommitted changes".to_string(),
            });
        }

        self.expect_success("checkout", &["checkout", from_ref], self.local_timeout_secs)
            .await?;
        self.expect_success(
            "pull",
            &["pull", &self.remote_name, from_ref],
            self.network_timeout_secs,
        )
        .await?;
        self.expect_success(
            "checkout-branch",
            &["checkout", "-b", name],
            self.local_timeout_secs,
        )
        .await?;

        info!(branch = name, from_ref, "created branch");
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<CommitOutcome> {
        let status = self
            .run_git("status", &["status", "--porcelain"], self.local_timeout_secs)
            .await
            .map_err(|e| HealerError::Commit(e.to_string()))?;
        if !status.success() {
            return Err(HealerError::Commit(status.stderr.trim().to_string()));
        }
        if status.stdout.trim().is_empty() {
            debug!("nothing to commit; clean tree");
            return Ok(CommitOutcome::NothingToCommit);
        }

        let add = self
            .run_git("add", &["add", "."], self.local_timeout_secs)
            .await
            .map_err(|e| HealerError::Commit(e.to_string()))?;
        if !add.success() {
            return Err(HealerError::Commit(add.stderr.trim().to_string()));
        }

        let commit = self
            .run_git("commit", &["commit", "-m", message], self.local_timeout_secs)
            .await
            .map_err(|e| HealerError::Commit(e.to_string()))?;
        if !commit.success() {
            return Err(HealerError::Commit(commit.stderr.trim().to_string()));
        }

        info!("committed staged changes");
        Ok(CommitOutcome::Committed)
    }

    async fn push(&self, branch: &str) -> Result<()> {
        let output = self
            .run_git(
                "push",
                &["push", "-u", &self.remote_name, branch],
                self.network_timeout_secs,
            )
            .await
            .map_err(|e| match e {
                timeout @ HealerError::GitTimeout { .. } => timeout,
                other => HealerError::Push(other.to_string()),
            })?;
        if !output.success() {
            return Err(HealerError::Push(output.stderr.trim().to_string()));
        }
        info!(branch, "pushed branch upstream");
        Ok(())
    }

    async fn create_review_request(&self, request: &ReviewRequest) -> Result<Option<String>> {
        match &self.review {
            Some(client) => client.create(request).await.map(Some),
            None => {
                warn!("no review API configured; branch is ready for manual review");
                Ok(None)
            }
        }
    }

    async fn current_branch(&self) -> Result<String> {
        let output = self
            .expect_success(
                "current-branch",
                &["branch", "--show-current"],
                self.local_timeout_secs,
            )
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn has_uncommitted_changes(&self) -> Result<bool> {
        let output = self
            .expect_success("status", &["status", "--porcelain"], self.local_timeout_secs)
            .await?;
        Ok(!output.stdout.trim().is_empty())
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        let output = self
            .expect_success(
                "diff",
                &["diff", "--name-only", "HEAD"],
                self.local_timeout_secs,
            )
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn validate_preconditions(&self) -> Result<PreconditionReport> {
        let mut report = PreconditionReport::default();

        if !self.is_work_tree().await {
            report.errors.push("not a git repository".to_string());
            return Ok(report);
        }

        match self.has_uncommitted_changes().await {
            Ok(true) => report
                .errors
                .push("working tree has uncommitted changes".to_string()),
            Ok(false) => {}
            Err(e) => report.errors.push(e.to_string()),
        }

        // Reachability is advisory: push failure later degrades to a warning
        // anyway.
        match self
            .run_git(
                "ls-remote",
                &["ls-remote", "--exit-code", &self.remote_name, "HEAD"],
                10,
            )
            .await
        {
            Ok(output) if output.success() => {}
            Ok(_) => report
                .warnings
                .push(format!("remote '{}' not reachable", self.remote_name)),
            Err(_) => report
                .warnings
                .push("could not verify remote connectivity".to_string()),
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    fn adapter(dir: &tempfile::TempDir) -> GitCli {
        GitCli::new(dir.path().to_path_buf(), "origin".to_string())
    }

    #[tokio::test]
    async fn test_current_branch_after_init() {
        let repo = make_git_repo();
        let branch = adapter(&repo).current_branch().await.unwrap();
        assert_eq!(branch, "main");
    }

    #[tokio::test]
    async fn test_expired_deadline_reports_git_timeout() {
        let repo = make_git_repo();
        let git = adapter(&repo).with_timeouts(0, 0);
        let err = git.current_branch().await.unwrap_err();
        assert!(matches!(err, HealerError::GitTimeout { .. }));
    }

    #[tokio::test]
    async fn test_clean_tree_has_no_uncommitted_changes() {
        let repo = make_git_repo();
        assert!(!adapter(&repo).has_uncommitted_changes().await.unwrap());

        std::fs::write(repo.path().join("new.txt"), "hello").unwrap();
        assert!(adapter(&repo).has_uncommitted_changes().await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_on_clean_tree_is_noop_success() {
        let repo = make_git_repo();
        let outcome = adapter(&repo).commit("empty").await.unwrap();
        assert_eq!(outcome, CommitOutcome::NothingToCommit);
    }

    #[tokio::test]
    async fn test_commit_stages_whole_tree() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("a.txt"), "a").unwrap();
        std::fs::write(repo.path().join("b.txt"), "b").unwrap();

        let outcome = adapter(&repo).commit("add files").await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);
        assert!(!adapter(&repo).has_uncommitted_changes().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_branch_refuses_dirty_tree() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("dirty.txt"), "x").unwrap();

        let err = adapter(&repo)
            .create_branch("fixes-x", "main")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("uncommitted"));
    }

    #[tokio::test]
    async fn test_changed_files_lists_modified_paths() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("tracked.txt"), "v1").unwrap();
        adapter(&repo).commit("v1").await.unwrap();

        std::fs::write(repo.path().join("tracked.txt"), "v2").unwrap();
        let changed = adapter(&repo).changed_files().await.unwrap();
        assert_eq!(changed, vec!["tracked.txt"]);
    }

    #[tokio::test]
    async fn test_preconditions_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let report = adapter_for(dir.path()).validate_preconditions().await.unwrap();
        assert!(!report.is_ok());
        assert!(report.errors[0].contains("not a git repository"));
    }

    #[tokio::test]
    async fn test_preconditions_warn_on_missing_remote() {
        let repo = make_git_repo();
        let report = adapter(&repo).validate_preconditions().await.unwrap();
        assert!(report.is_ok());
        assert!(!report.warnings.is_empty());
    }

    fn adapter_for(path: &Path) -> GitCli {
        GitCli::new(path.to_path_buf(), "origin".to_string())
    }
}
