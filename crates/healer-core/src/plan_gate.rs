//! Fix-plan gate.
//!
//! Screens a raw batch of [`FixPlan`]s before anything touches the working
//! tree: structural completeness, confidence range, and the auto-apply
//! confidence threshold. Pure and side-effect free; the workflow engine
//! decides what an empty valid set means (a skip, not an error).

use serde::{Deserialize, Serialize};

use crate::domain::plan::FixPlan;

/// Default auto-apply confidence threshold.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// A single screening rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanRule {
    /// issue_key, file_path, description, proposed_solution non-empty.
    RequiredFields,
    /// line_number >= 1.
    LineNumber,
    /// confidence_score within [0, 1].
    ConfidenceRange,
    /// confidence_score >= the configured auto-apply threshold.
    ConfidenceThreshold,
}

/// One rule violation for one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanViolation {
    pub rule: PlanRule,
    pub reason: String,
}

/// A plan excluded by the gate, with every violated rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPlan {
    pub plan: FixPlan,
    pub violations: Vec<PlanViolation>,
}

impl RejectedPlan {
    /// Single-line reason suitable for the final report.
    pub fn reason(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.reason.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Result of screening a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenOutcome {
    pub valid: Vec<FixPlan>,
    pub rejected: Vec<RejectedPlan>,
}

impl ScreenOutcome {
    /// Whether no plan survived the gate.
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }
}

/// Screen a batch of plans against all rules.
///
/// A plan below the threshold is excluded from application entirely; it is
/// reported as rejected and never reaches the applier.
pub fn screen_plans(plans: Vec<FixPlan>, threshold: f64) -> ScreenOutcome {
    let mut valid = Vec::new();
    let mut rejected = Vec::new();

    for plan in plans {
        let violations = check_plan(&plan, threshold);
        if violations.is_empty() {
            valid.push(plan);
        } else {
            rejected.push(RejectedPlan { plan, violations });
        }
    }

    ScreenOutcome { valid, rejected }
}

fn check_plan(plan: &FixPlan, threshold: f64) -> Vec<PlanViolation> {
    let mut violations = Vec::new();

    for (field, value) in plan.required_text_fields() {
        if value.trim().is_empty() {
            violations.push(PlanViolation {
                rule: PlanRule::RequiredFields,
                reason: format!("required field '{field}' is empty"),
            });
        }
    }

    if plan.line_number < 1 {
        violations.push(PlanViolation {
            rule: PlanRule::LineNumber,
            reason: format!("line number {} is invalid", plan.line_number),
        });
    }

    if !(0.0..=1.0).contains(&plan.confidence_score) {
        violations.push(PlanViolation {
            rule: PlanRule::ConfidenceRange,
            reason: format!("confidence {} outside [0, 1]", plan.confidence_score),
        });
    } else if plan.confidence_score < threshold {
        violations.push(PlanViolation {
            rule: PlanRule::ConfidenceThreshold,
            reason: format!(
                "confidence {:.2} below auto-apply threshold {:.2}",
                plan.confidence_score, threshold
            ),
        });
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::issue::Severity;
    use crate::domain::plan::{Effort, FixType};
    use chrono::Utc;

    fn plan_with(confidence: f64) -> FixPlan {
        FixPlan {
            issue_key: "KEY-1".to_string(),
            file_path: "src/main.py".to_string(),
            line_number: 3,
            description: "Remove unused import".to_string(),
            problem_analysis: "unused".to_string(),
            proposed_solution: "Delete the import".to_string(),
            confidence_score: confidence,
            estimated_effort: Effort::Low,
            fix_type: FixType::Delete,
            severity: Severity::Minor,
            side_effects: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_above_threshold_passes() {
        let outcome = screen_plans(vec![plan_with(0.85)], DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(outcome.valid.len(), 1);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn test_low_confidence_plans_never_reach_the_applier() {
        let outcome = screen_plans(
            vec![plan_with(0.79), plan_with(0.5), plan_with(0.8)],
            DEFAULT_CONFIDENCE_THRESHOLD,
        );
        assert_eq!(outcome.valid.len(), 1);
        assert_eq!(outcome.rejected.len(), 2);
        for rejected in &outcome.rejected {
            assert!(rejected
                .violations
                .iter()
                .any(|v| v.rule == PlanRule::ConfidenceThreshold));
        }
    }

    #[test]
    fn test_confidence_out_of_range_is_not_a_threshold_violation() {
        let outcome = screen_plans(vec![plan_with(1.5)], DEFAULT_CONFIDENCE_THRESHOLD);
        let rejected = &outcome.rejected[0];
        assert_eq!(rejected.violations.len(), 1);
        assert_eq!(rejected.violations[0].rule, PlanRule::ConfidenceRange);
    }

    #[test]
    fn test_empty_required_field_rejects() {
        let mut plan = plan_with(0.95);
        plan.proposed_solution = "   ".to_string();
        let outcome = screen_plans(vec![plan], DEFAULT_CONFIDENCE_THRESHOLD);
        assert!(outcome.is_empty());
        assert!(outcome.rejected[0].reason().contains("proposed_solution"));
    }

    #[test]
    fn test_invalid_line_number_rejects() {
        let mut plan = plan_with(0.95);
        plan.line_number = 0;
        let outcome = screen_plans(vec![plan], DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(outcome.rejected[0].violations[0].rule, PlanRule::LineNumber);
    }

    #[test]
    fn test_multiple_violations_all_reported() {
        let mut plan = plan_with(2.0);
        plan.description = String::new();
        plan.line_number = 0;
        let outcome = screen_plans(vec![plan], DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(outcome.rejected[0].violations.len(), 3);
    }
}
