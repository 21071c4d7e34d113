//! Workflow run aggregate and the exit contract it finalizes into.

use serde::{Deserialize, Serialize};

use crate::domain::plan::FixPlan;

/// Before/after content and diff from applying one fix plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedFix {
    pub plan: FixPlan,
    pub original_content: String,
    pub fixed_content: String,
    /// Line-based diff of the change.
    pub diff: String,
    pub validation_passed: bool,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    pub branch_name: String,
}

/// A plan that could not be applied, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedFix {
    pub plan: FixPlan,
    pub reason: String,
}

/// Outcome of the build gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Skipped,
    Success,
    Failed,
    Timeout,
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

/// Aggregate root for one atomic fix-application run.
///
/// Owns exactly one branch; either every applied fix is committed to it or
/// nothing is pushed. Created at run start, finalized exactly once, never
/// resumed. The stage functions take it by value and hand it back, so there
/// is no shared mutable workflow state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub branch_name: Option<String>,
    pub fix_plans: Vec<FixPlan>,
    pub applied_fixes: Vec<AppliedFix>,
    pub failed_fixes: Vec<FailedFix>,
    /// Plans excluded by the gate; reported, never applied.
    pub rejected_plans: Vec<FailedFix>,
    pub build_status: BuildStatus,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub warnings: Vec<String>,
    pub review_request_url: Option<String>,
}

impl WorkflowRun {
    pub fn new(fix_plans: Vec<FixPlan>) -> Self {
        Self {
            branch_name: None,
            fix_plans,
            applied_fixes: Vec::new(),
            failed_fixes: Vec::new(),
            rejected_plans: Vec::new(),
            build_status: BuildStatus::Skipped,
            status: RunStatus::Running,
            error_message: None,
            warnings: Vec::new(),
            review_request_url: None,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Files touched by applied fixes, deduplicated in application order.
    pub fn changed_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        for fix in &self.applied_fixes {
            if !files.contains(&fix.plan.file_path) {
                files.push(fix.plan.file_path.clone());
            }
        }
        files
    }

    /// Mean confidence over applied fixes, 0.0 when none.
    pub fn average_confidence(&self) -> f64 {
        if self.applied_fixes.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .applied_fixes
            .iter()
            .map(|f| f.plan.confidence_score)
            .sum();
        total / self.applied_fixes.len() as f64
    }
}

/// Terminal status in the exit contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Error,
}

/// The structured result surrounding tooling depends on. Nothing else about
/// the run is contractual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub status: ReportStatus,
    pub fixes_applied: usize,
    pub fixes_failed: usize,
    pub fixes_rejected: usize,
    pub branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_request_url: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RunReport {
    /// Finalize a run into the exit contract. Partial success is explicit:
    /// both applied and failed fixes are enumerated, never silently dropped.
    pub fn from_run(run: &WorkflowRun) -> Self {
        let status = match run.status {
            RunStatus::Error => ReportStatus::Error,
            _ => ReportStatus::Success,
        };
        let mut errors: Vec<String> = run
            .failed_fixes
            .iter()
            .map(|f| format!("{}: {}", f.plan.issue_key, f.reason))
            .collect();
        if let Some(msg) = &run.error_message {
            errors.push(msg.clone());
        }
        Self {
            status,
            fixes_applied: run.applied_fixes.len(),
            fixes_failed: run.failed_fixes.len(),
            fixes_rejected: run.rejected_plans.len(),
            branch_name: run.branch_name.clone(),
            review_request_url: run.review_request_url.clone(),
            warnings: run.warnings.clone(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::issue::Severity;
    use crate::domain::plan::{Effort, FixType};
    use chrono::Utc;

    fn plan(key: &str, file: &str, confidence: f64) -> FixPlan {
        FixPlan {
            issue_key: key.to_string(),
            file_path: file.to_string(),
            line_number: 1,
            description: "desc".to_string(),
            problem_analysis: "analysis".to_string(),
            proposed_solution: "solution".to_string(),
            confidence_score: confidence,
            estimated_effort: Effort::Low,
            fix_type: FixType::Replace,
            severity: Severity::Minor,
            side_effects: vec![],
            created_at: Utc::now(),
        }
    }

    fn applied(p: FixPlan) -> AppliedFix {
        AppliedFix {
            plan: p,
            original_content: "a".to_string(),
            fixed_content: "b".to_string(),
            diff: String::new(),
            validation_passed: true,
            validation_errors: vec![],
            branch_name: "fixes-x".to_string(),
        }
    }

    #[test]
    fn test_changed_files_deduplicates_preserving_order() {
        let mut run = WorkflowRun::new(vec![]);
        run.applied_fixes.push(applied(plan("A", "src/a.py", 0.9)));
        run.applied_fixes.push(applied(plan("B", "src/b.py", 0.9)));
        run.applied_fixes.push(applied(plan("C", "src/a.py", 0.9)));
        assert_eq!(run.changed_files(), vec!["src/a.py", "src/b.py"]);
    }

    #[test]
    fn test_average_confidence() {
        let mut run = WorkflowRun::new(vec![]);
        assert_eq!(run.average_confidence(), 0.0);
        run.applied_fixes.push(applied(plan("A", "a", 0.8)));
        run.applied_fixes.push(applied(plan("B", "b", 1.0)));
        assert!((run.average_confidence() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_report_enumerates_partial_success() {
        let mut run = WorkflowRun::new(vec![]);
        run.status = RunStatus::Completed;
        run.applied_fixes.push(applied(plan("A", "a", 0.9)));
        run.failed_fixes.push(FailedFix {
            plan: plan("B", "b", 0.9),
            reason: "line out of range".to_string(),
        });
        run.warn("push failed: remote unreachable");

        let report = RunReport::from_run(&run);
        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.fixes_applied, 1);
        assert_eq!(report.fixes_failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("B"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_report_status_serializes_lowercase() {
        let json = serde_json::to_string(&ReportStatus::Error).unwrap();
        assert_eq!(json, "\"error\"");
    }
}
