//! The atomic fix-application workflow.
//!
//! A linear state machine: INIT, VALIDATE_PLANS, CREATE_BRANCH, APPLY_FIXES,
//! VALIDATE_CHANGES, BUILD_GATE, COMMIT_PUSH, CREATE_REVIEW, FINALIZE, with
//! ERROR as the terminal failure state. Each stage takes the run by value
//! and hands it back with an [`Outcome`] that drives the loop. Per-fix
//! failures are recorded and the batch continues; failures that touch
//! repository integrity stop the run.

use std::fs;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::apply;
use crate::build_gate::{BuildGate, CommandExec};
use crate::config::HealerConfig;
use crate::domain::error::HealerError;
use crate::domain::plan::FixPlan;
use crate::domain::run::{AppliedFix, BuildStatus, FailedFix, RunReport, RunStatus, WorkflowRun};
use crate::plan_gate;
use crate::publish;
use crate::validate::ChangeValidator;
use crate::vcs::{CommitOutcome, ReviewRequest, Vcs};

/// Workflow stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ValidatePlans,
    CreateBranch,
    ApplyFixes,
    ValidateChanges,
    BuildGate,
    CommitPush,
    CreateReview,
    Finalize,
}

impl Stage {
    fn next(self) -> Stage {
        match self {
            Stage::Init => Stage::ValidatePlans,
            Stage::ValidatePlans => Stage::CreateBranch,
            Stage::CreateBranch => Stage::ApplyFixes,
            Stage::ApplyFixes => Stage::ValidateChanges,
            Stage::ValidateChanges => Stage::BuildGate,
            Stage::BuildGate => Stage::CommitPush,
            Stage::CommitPush => Stage::CreateReview,
            Stage::CreateReview => Stage::Finalize,
            Stage::Finalize => Stage::Finalize,
        }
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Advance to the next stage.
    Continue,
    /// Nothing left to do; jump straight to finalization with success.
    Skip,
    /// Fatal; the run transitions to the error state.
    Fail(String),
}

/// Drives one atomic run over a set of fix plans.
pub struct HealWorkflow {
    config: HealerConfig,
    vcs: Arc<dyn Vcs>,
    validator: ChangeValidator,
    build_exec: Option<Arc<dyn CommandExec>>,
}

impl HealWorkflow {
    pub fn new(config: HealerConfig, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            config,
            vcs,
            validator: ChangeValidator::with_default_syntax(),
            build_exec: None,
        }
    }

    pub fn with_validator(mut self, validator: ChangeValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_build_exec(mut self, exec: Arc<dyn CommandExec>) -> Self {
        self.build_exec = Some(exec);
        self
    }

    /// Run the whole workflow. Fatal stage failures are folded into the
    /// report, not returned, so callers always get the exit contract.
    pub async fn run(&self, plans: Vec<FixPlan>) -> RunReport {
        let mut run = WorkflowRun::new(plans);
        let mut stage = Stage::Init;

        loop {
            debug!(?stage, "entering stage");
            let (next_run, outcome) = self.step(stage, run).await;
            run = next_run;
            match outcome {
                Outcome::Continue => {
                    if stage == Stage::Finalize {
                        break;
                    }
                    stage = stage.next();
                }
                Outcome::Skip => {
                    info!(?stage, "nothing to do, finalizing");
                    stage = Stage::Finalize;
                }
                Outcome::Fail(message) => {
                    error!(?stage, %message, "run failed");
                    run.status = RunStatus::Error;
                    run.error_message = Some(message);
                    stage = Stage::Finalize;
                }
            }
        }

        RunReport::from_run(&run)
    }

    async fn step(&self, stage: Stage, run: WorkflowRun) -> (WorkflowRun, Outcome) {
        match stage {
            Stage::Init => self.init(run).await,
            Stage::ValidatePlans => self.validate_plans(run),
            Stage::CreateBranch => self.create_branch(run).await,
            Stage::ApplyFixes => self.apply_fixes(run),
            Stage::ValidateChanges => self.validate_changes(run),
            Stage::BuildGate => self.build_gate(run).await,
            Stage::CommitPush => self.commit_push(run).await,
            Stage::CreateReview => self.create_review(run).await,
            Stage::Finalize => self.finalize(run),
        }
    }

    async fn init(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        if let Err(e) = self.config.validate() {
            return (run, Outcome::Fail(e.to_string()));
        }
        match self.vcs.validate_preconditions().await {
            Ok(report) => {
                let ok = report.is_ok();
                let errors = report.errors.join("; ");
                for warning in report.warnings {
                    run.warn(warning);
                }
                if !ok {
                    return (run, Outcome::Fail(errors));
                }
                (run, Outcome::Continue)
            }
            Err(e) => (run, Outcome::Fail(e.to_string())),
        }
    }

    fn validate_plans(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        let plans = std::mem::take(&mut run.fix_plans);
        let screened = plan_gate::screen_plans(plans, self.config.confidence_threshold);
        for rejected in screened.rejected {
            let reason = rejected.reason();
            debug!(issue = %rejected.plan.issue_key, %reason, "plan rejected");
            run.rejected_plans.push(FailedFix {
                plan: rejected.plan,
                reason,
            });
        }
        run.fix_plans = screened.valid;
        if run.fix_plans.is_empty() {
            info!(
                rejected = run.rejected_plans.len(),
                "no plans passed the gate"
            );
            return (run, Outcome::Skip);
        }
        info!(
            valid = run.fix_plans.len(),
            rejected = run.rejected_plans.len(),
            "plans screened"
        );
        (run, Outcome::Continue)
    }

    async fn create_branch(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        let name = format!("fixes-{}", Utc::now().format("%Y%m%d-%H%M%S"));
        match self
            .vcs
            .create_branch(&name, &self.config.base_branch)
            .await
        {
            Ok(()) => {
                info!(branch = %name, "created fix branch");
                run.branch_name = Some(name);
                (run, Outcome::Continue)
            }
            Err(e) => (run, Outcome::Fail(format!("branch creation failed: {e}"))),
        }
    }

    /// Apply each plan read-modify-write, so later fixes to the same file
    /// see earlier ones. A fix whose result fails syntax validation is
    /// never written.
    fn apply_fixes(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        let branch = run.branch_name.clone().unwrap_or_default();
        let plans = std::mem::take(&mut run.fix_plans);

        for plan in &plans {
            let path = self.config.repo_path.join(&plan.file_path);
            let original = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(issue = %plan.issue_key, file = %plan.file_path, %e, "cannot read target");
                    run.failed_fixes.push(FailedFix {
                        plan: plan.clone(),
                        reason: format!("cannot read file: {e}"),
                    });
                    continue;
                }
            };

            let applied = match apply::apply_plan(&original, plan) {
                Ok(applied) => applied,
                Err(e) => {
                    warn!(issue = %plan.issue_key, %e, "fix not applicable");
                    run.failed_fixes.push(FailedFix {
                        plan: plan.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let validation = self.validator.validate_content(&path, &applied.content);
            if !validation.is_valid {
                warn!(
                    issue = %plan.issue_key,
                    errors = ?validation.syntax_errors,
                    "fix result fails syntax validation"
                );
                run.failed_fixes.push(FailedFix {
                    plan: plan.clone(),
                    reason: format!(
                        "syntax validation failed: {}",
                        validation.syntax_errors.join("; ")
                    ),
                });
                continue;
            }
            for finding in &validation.security_warnings {
                run.warn(finding.clone());
            }

            if let Err(e) = fs::write(&path, &applied.content) {
                run.failed_fixes.push(FailedFix {
                    plan: plan.clone(),
                    reason: format!("cannot write file: {e}"),
                });
                continue;
            }

            info!(issue = %plan.issue_key, file = %plan.file_path, "fix applied");
            run.applied_fixes.push(AppliedFix {
                plan: plan.clone(),
                original_content: original,
                fixed_content: applied.content,
                diff: applied.diff,
                validation_passed: true,
                validation_errors: Vec::new(),
                branch_name: branch.clone(),
            });
        }

        run.fix_plans = plans;
        if run.applied_fixes.is_empty() {
            return (
                run,
                Outcome::Fail("no fixes could be applied".to_string()),
            );
        }
        (run, Outcome::Continue)
    }

    fn validate_changes(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        let changed = run.changed_files();
        match self
            .validator
            .validate_changes(&self.config.repo_path, &changed)
        {
            Ok(batch) => {
                for warning in batch.warnings {
                    run.warn(warning);
                }
                if !batch.passed {
                    return (
                        run,
                        Outcome::Fail(format!(
                            "changed files fail validation: {}",
                            batch.errors.join("; ")
                        )),
                    );
                }
                (run, Outcome::Continue)
            }
            Err(e) => (run, Outcome::Fail(e.to_string())),
        }
    }

    async fn build_gate(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        let mut gate = BuildGate::new(
            &self.config.repo_path,
            self.config.build_gate_enabled,
            self.config.build_timeout_secs,
        );
        if let Some(exec) = &self.build_exec {
            gate = gate.with_exec(exec.clone());
        }
        match gate.run().await {
            Ok(status) => {
                run.build_status = status;
                (run, Outcome::Continue)
            }
            Err(e) => {
                run.build_status = match e {
                    HealerError::BuildTimeout { .. } => BuildStatus::Timeout,
                    _ => BuildStatus::Failed,
                };
                (run, Outcome::Fail(e.to_string()))
            }
        }
    }

    async fn commit_push(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        let message = publish::commit_message(&run, Utc::now());
        match self.vcs.commit(&message).await {
            Ok(CommitOutcome::Committed) => {}
            Ok(CommitOutcome::NothingToCommit) => {
                // Applied fixes can net-cancel in one file; the tree is
                // clean, so there is nothing to push or review.
                warn!("working tree clean after applying fixes, nothing to commit");
                run.warn("fixes netted out to no change, nothing was committed".to_string());
                return (run, Outcome::Skip);
            }
            Err(e) => return (run, Outcome::Fail(e.to_string())),
        }

        let branch = run.branch_name.clone().unwrap_or_default();
        if let Err(e) = self.vcs.push(&branch).await {
            warn!(%e, "push failed, branch remains local");
            run.warn(format!("push failed, branch {branch} remains local: {e}"));
        }
        (run, Outcome::Continue)
    }

    async fn create_review(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        let source_branch = run.branch_name.clone().unwrap_or_default();
        let target_branch = self
            .config
            .review
            .as_ref()
            .map(|r| r.target_branch.clone())
            .unwrap_or_else(|| self.config.base_branch.clone());
        let request = ReviewRequest {
            source_branch,
            target_branch,
            title: publish::review_title(Utc::now()),
            description: publish::review_description(&run),
            squash: true,
        };
        match self.vcs.create_review_request(&request).await {
            Ok(Some(url)) => {
                info!(url = %url, "review request created");
                run.review_request_url = Some(url);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%e, "review request failed");
                run.warn(format!("review request failed: {e}"));
            }
        }
        (run, Outcome::Continue)
    }

    fn finalize(&self, mut run: WorkflowRun) -> (WorkflowRun, Outcome) {
        if run.status != RunStatus::Error {
            run.status = RunStatus::Completed;
        }
        info!(
            applied = run.applied_fixes.len(),
            failed = run.failed_fixes.len(),
            rejected = run.rejected_plans.len(),
            status = ?run.status,
            "run finalized"
        );
        (run, Outcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_linear() {
        let mut stage = Stage::Init;
        let mut seen = vec![stage];
        while stage != Stage::Finalize {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Init,
                Stage::ValidatePlans,
                Stage::CreateBranch,
                Stage::ApplyFixes,
                Stage::ValidateChanges,
                Stage::BuildGate,
                Stage::CommitPush,
                Stage::CreateReview,
                Stage::Finalize,
            ]
        );
    }
}
