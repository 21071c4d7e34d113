//! Commit-message and review-request text built from a finished run.
//!
//! Plain text only, grouped by severity, with per-fix diff excerpts in the
//! review body so a reviewer can judge each change without checking out the
//! branch.

use chrono::{DateTime, Utc};

use crate::diff;
use crate::domain::issue::Severity;
use crate::domain::run::WorkflowRun;

const DESCRIPTION_TRUNCATE: usize = 60;
const DIFF_EXCERPT_LINES: usize = 12;

/// Severities in reporting order, most severe first.
const SEVERITY_ORDER: [Severity; 5] = [
    Severity::Blocker,
    Severity::Critical,
    Severity::Major,
    Severity::Minor,
    Severity::Info,
];

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// Commit message for the applied fixes: a dated header, fixes grouped by
/// severity, and a confidence footer.
pub fn commit_message(run: &WorkflowRun, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        format!(
            "Apply {} automated code-quality fixes ({})",
            run.applied_fixes.len(),
            now.format("%Y-%m-%d %H:%M")
        ),
        String::new(),
    ];

    for severity in SEVERITY_ORDER {
        let fixes: Vec<_> = run
            .applied_fixes
            .iter()
            .filter(|f| f.plan.severity == severity)
            .collect();
        if fixes.is_empty() {
            continue;
        }
        lines.push(format!("{}:", severity.as_str()));
        for fix in fixes {
            lines.push(format!(
                "- {} ({}:{})",
                truncate(&fix.plan.description, DESCRIPTION_TRUNCATE),
                fix.plan.file_path,
                fix.plan.line_number
            ));
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "Average confidence: {:.2} across {} fixes",
        run.average_confidence(),
        run.applied_fixes.len()
    ));
    lines.join("\n")
}

/// Title for the review request.
pub fn review_title(now: DateTime<Utc>) -> String {
    format!(
        "Automated code-quality fixes - {}",
        now.format("%Y-%m-%d %H:%M")
    )
}

/// Review-request body: summary counts, then each applied fix with its diff
/// excerpt, then any fixes that could not be applied.
pub fn review_description(run: &WorkflowRun) -> String {
    let mut sections = vec![format!(
        "## Summary\n\n\
         - Fixes applied: {}\n\
         - Fixes failed: {}\n\
         - Files changed: {}\n\
         - Average confidence: {:.2}",
        run.applied_fixes.len(),
        run.failed_fixes.len(),
        run.changed_files().len(),
        run.average_confidence()
    )];

    if !run.applied_fixes.is_empty() {
        let mut body = String::from("## Applied fixes\n");
        for fix in &run.applied_fixes {
            body.push_str(&format!(
                "\n### {} ({}:{})\n\n{}\n\nSeverity: {} | Confidence: {:.2}\n",
                fix.plan.description,
                fix.plan.file_path,
                fix.plan.line_number,
                fix.plan.problem_analysis,
                fix.plan.severity.as_str(),
                fix.plan.confidence_score
            ));
            let excerpt = diff::excerpt(&fix.diff, DIFF_EXCERPT_LINES);
            if !excerpt.is_empty() {
                body.push_str(&format!("\n```diff\n{excerpt}\n```\n"));
            }
        }
        sections.push(body);
    }

    if !run.failed_fixes.is_empty() {
        let mut body = String::from("## Not applied\n\n");
        for failed in &run.failed_fixes {
            body.push_str(&format!(
                "- {} ({}:{}): {}\n",
                truncate(&failed.plan.description, DESCRIPTION_TRUNCATE),
                failed.plan.file_path,
                failed.plan.line_number,
                failed.reason
            ));
        }
        sections.push(body.trim_end().to_string());
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::domain::plan::{Effort, FixPlan, FixType};
    use crate::domain::run::{AppliedFix, FailedFix};

    use super::*;

    fn plan(key: &str, severity: Severity, confidence: f64) -> FixPlan {
        FixPlan {
            issue_key: key.to_string(),
            file_path: "src/service.py".to_string(),
            line_number: 10,
            description: format!("Fix for {key}"),
            problem_analysis: "Rule violation".to_string(),
            proposed_solution: "Replace with: pass".to_string(),
            confidence_score: confidence,
            estimated_effort: Effort::Low,
            fix_type: FixType::Replace,
            severity,
            side_effects: vec![],
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn applied(key: &str, severity: Severity, confidence: f64) -> AppliedFix {
        AppliedFix {
            plan: plan(key, severity, confidence),
            original_content: "a\n".to_string(),
            fixed_content: "b\n".to_string(),
            diff: "- a\n+ b".to_string(),
            validation_passed: true,
            validation_errors: vec![],
            branch_name: "fixes-20250601-120000".to_string(),
        }
    }

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_commit_message_groups_by_severity_most_severe_first() {
        let mut run = WorkflowRun::new(vec![]);
        run.applied_fixes.push(applied("A", Severity::Minor, 0.8));
        run.applied_fixes.push(applied("B", Severity::Blocker, 0.9));
        let message = commit_message(&run, timestamp());
        let blocker = message.find("BLOCKER:").unwrap();
        let minor = message.find("MINOR:").unwrap();
        assert!(blocker < minor);
        assert!(message.starts_with("Apply 2 automated code-quality fixes"));
        assert!(message.contains("Average confidence: 0.85"));
    }

    #[test]
    fn test_commit_message_truncates_long_descriptions() {
        let mut run = WorkflowRun::new(vec![]);
        let mut fix = applied("A", Severity::Major, 0.9);
        fix.plan.description = "x".repeat(200);
        run.applied_fixes.push(fix);
        let message = commit_message(&run, timestamp());
        let bullet = message
            .lines()
            .find(|l| l.starts_with("- "))
            .unwrap();
        assert!(bullet.contains("..."));
        assert!(bullet.len() < 100);
    }

    #[test]
    fn test_review_title_carries_timestamp() {
        assert_eq!(
            review_title(timestamp()),
            "Automated code-quality fixes - 2025-06-01 12:00"
        );
    }

    #[test]
    fn test_review_description_lists_applied_and_failed() {
        let mut run = WorkflowRun::new(vec![]);
        run.applied_fixes.push(applied("A", Severity::Major, 0.9));
        run.failed_fixes.push(FailedFix {
            plan: plan("B", Severity::Minor, 0.85),
            reason: "line out of range".to_string(),
        });
        let body = review_description(&run);
        assert!(body.contains("Fixes applied: 1"));
        assert!(body.contains("Fixes failed: 1"));
        assert!(body.contains("```diff"));
        assert!(body.contains("line out of range"));
    }
}
