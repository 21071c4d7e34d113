//! Turning detected issues into fix plans.
//!
//! [`RuleBasedProposer`] covers the rule families with a mechanical fix; the
//! trait seam leaves room for smarter proposers without touching the
//! pipeline.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::domain::error::Result;
use crate::domain::issue::Issue;
use crate::domain::plan::{Effort, FixPlan, FixType};

/// Produces a fix plan for one issue. `Ok(None)` means the proposer has no
/// fix to offer and the issue is skipped, not failed.
#[async_trait]
pub trait FixProposer: Send + Sync {
    async fn propose(&self, issue: &Issue) -> Result<Option<FixPlan>>;
}

struct RuleRecipe {
    rule: &'static str,
    fix_type: FixType,
    solution: &'static str,
    confidence: f64,
    effort: Effort,
}

/// Mechanical recipes for rules whose fix is unambiguous. Confidence
/// reflects how often the recipe is the right call, not certainty about any
/// one instance.
const RECIPES: [RuleRecipe; 6] = [
    RuleRecipe {
        rule: "python:S125",
        fix_type: FixType::Delete,
        solution: "Delete the commented-out code line",
        confidence: 0.8,
        effort: Effort::Low,
    },
    RuleRecipe {
        rule: "python:S1481",
        fix_type: FixType::Delete,
        solution: "Delete the unused local variable declaration",
        confidence: 0.9,
        effort: Effort::Low,
    },
    RuleRecipe {
        rule: "python:S1854",
        fix_type: FixType::Delete,
        solution: "Delete the useless assignment",
        confidence: 0.8,
        effort: Effort::Low,
    },
    RuleRecipe {
        rule: "python:S101",
        fix_type: FixType::Replace,
        solution: "Replace with: a class name in CapWords convention",
        confidence: 0.7,
        effort: Effort::Medium,
    },
    RuleRecipe {
        rule: "java:S1161",
        fix_type: FixType::Insert,
        solution: "Use: @Override",
        confidence: 0.85,
        effort: Effort::Low,
    },
    RuleRecipe {
        rule: "python:S103",
        fix_type: FixType::Replace,
        solution: "Replace with: the statement split across continuation lines",
        confidence: 0.6,
        effort: Effort::Medium,
    },
];

const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Proposer backed by the static recipe table, with a low-confidence
/// replace fallback for unrecognized rules.
#[derive(Debug, Default)]
pub struct RuleBasedProposer {
    /// When false, issues without a recipe are skipped instead of getting
    /// the fallback plan.
    pub with_fallback: bool,
}

impl RuleBasedProposer {
    pub fn new() -> Self {
        Self {
            with_fallback: false,
        }
    }

    pub fn with_fallback(mut self) -> Self {
        self.with_fallback = true;
        self
    }

    fn plan_from(issue: &Issue, fix_type: FixType, solution: String, confidence: f64, effort: Effort) -> FixPlan {
        FixPlan {
            issue_key: issue.key.clone(),
            file_path: issue.file_path.clone(),
            line_number: issue.line.max(1),
            description: issue.message.clone(),
            problem_analysis: format!("Rule {} flagged: {}", issue.rule, issue.message),
            proposed_solution: solution,
            confidence_score: confidence,
            estimated_effort: effort,
            fix_type,
            severity: issue.severity,
            side_effects: vec![],
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl FixProposer for RuleBasedProposer {
    async fn propose(&self, issue: &Issue) -> Result<Option<FixPlan>> {
        if let Some(recipe) = RECIPES.iter().find(|r| r.rule == issue.rule) {
            debug!(issue = %issue.key, rule = %issue.rule, "recipe matched");
            return Ok(Some(Self::plan_from(
                issue,
                recipe.fix_type,
                recipe.solution.to_string(),
                recipe.confidence,
                recipe.effort,
            )));
        }
        if !self.with_fallback {
            debug!(issue = %issue.key, rule = %issue.rule, "no recipe, skipping");
            return Ok(None);
        }
        Ok(Some(Self::plan_from(
            issue,
            FixType::Replace,
            format!("Replace with: a corrected line addressing: {}", issue.message),
            FALLBACK_CONFIDENCE,
            Effort::Medium,
        )))
    }
}

/// Run the proposer over a batch, dropping issues it declines.
pub async fn propose_all(proposer: &dyn FixProposer, issues: &[Issue]) -> Result<Vec<FixPlan>> {
    let mut plans = Vec::new();
    for issue in issues {
        if let Some(plan) = proposer.propose(issue).await? {
            plans.push(plan);
        }
    }
    info!(
        issues = issues.len(),
        plans = plans.len(),
        "proposed fix plans"
    );
    Ok(plans)
}
