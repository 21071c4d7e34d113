//! Fix applier: transforms one file's content according to one fix plan.
//!
//! Dispatches exhaustively on [`FixType`]. The whole file is rebuilt in
//! memory and returned as a single value; callers write it once, so a plan
//! can never leave a partially-written file. A plan that cannot be applied
//! fails alone and does not abort the batch.

use regex::RegexBuilder;
use tracing::debug;

use crate::diff::line_diff;
use crate::domain::error::{HealerError, Result};
use crate::domain::plan::{FixPlan, FixType};

/// Prefixes stripped from `proposed_solution` before content extraction.
const SOLUTION_PREFIXES: &[&str] = &[
    "Replace with:",
    "Change to:",
    "Use:",
    "Replace line with:",
    "Fix:",
    "Solution:",
    "Correction:",
    "Updated code:",
];

/// Context lines rendered around each diff hunk.
const DIFF_CONTEXT: usize = 2;

/// New full file content plus a line-based diff.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedContent {
    pub content: String,
    pub diff: String,
}

/// Apply one fix plan to the file's current content.
///
/// Errors when the target line is out of range or when extraction produces
/// empty or no-op content.
pub fn apply_plan(original: &str, plan: &FixPlan) -> Result<AppliedContent> {
    let lines: Vec<String> = original.split('\n').map(str::to_string).collect();
    let target = plan.line_number as usize;

    if target < 1 || target > lines.len() {
        return Err(application_error(
            plan,
            format!(
                "line {} out of range for file with {} lines",
                plan.line_number,
                lines.len()
            ),
        ));
    }

    let fixed = match plan.fix_type {
        FixType::Replace => apply_replace(lines, plan)?,
        FixType::Insert => apply_insert(lines, plan)?,
        FixType::Delete => apply_delete(lines, target),
        FixType::Regex => apply_regex(original, lines, plan)?,
        FixType::Heuristic => apply_heuristic(lines, plan)?,
    };

    if fixed == original {
        return Err(application_error(plan, "fix produced no change".to_string()));
    }

    let diff = line_diff(original, &fixed, DIFF_CONTEXT);
    Ok(AppliedContent {
        content: fixed,
        diff,
    })
}

fn application_error(plan: &FixPlan, reason: String) -> HealerError {
    HealerError::Application {
        issue_key: plan.issue_key.clone(),
        reason,
    }
}

fn apply_replace(mut lines: Vec<String>, plan: &FixPlan) -> Result<String> {
    let idx = plan.line_number as usize - 1;
    let content = extract_fix_content(&plan.proposed_solution);
    if content.trim().is_empty() {
        return Err(application_error(
            plan,
            "no code content extracted from proposed solution".to_string(),
        ));
    }

    // Keep the replaced line at the original line's indentation.
    let indentation = leading_whitespace(&lines[idx]);
    lines[idx] = format!("{indentation}{}", content.trim());
    Ok(lines.join("\n"))
}

fn apply_insert(mut lines: Vec<String>, plan: &FixPlan) -> Result<String> {
    let idx = plan.line_number as usize - 1;
    let content = extract_fix_content(&plan.proposed_solution);
    if content.trim().is_empty() {
        return Err(application_error(
            plan,
            "no code content extracted from proposed solution".to_string(),
        ));
    }

    let indentation = contextual_indentation(&lines, idx);
    lines.insert(idx, format!("{indentation}{}", content.trim()));
    Ok(lines.join("\n"))
}

fn apply_delete(mut lines: Vec<String>, target: usize) -> String {
    lines.remove(target - 1);
    lines.join("\n")
}

/// Parse `pattern -> replacement` out of the solution text and substitute
/// globally. Falls back to the heuristic path when the form does not parse
/// or the pattern is not a valid regex.
fn apply_regex(original: &str, lines: Vec<String>, plan: &FixPlan) -> Result<String> {
    let solution = plan.proposed_solution.as_str();

    if let Some((raw_pattern, replacement)) = solution.split_once(" -> ") {
        let pattern = raw_pattern
            .trim()
            .strip_prefix("Replace:")
            .unwrap_or(raw_pattern)
            .trim();

        match RegexBuilder::new(pattern).multi_line(true).build() {
            Ok(re) => return Ok(re.replace_all(original, replacement.trim()).into_owned()),
            Err(err) => {
                debug!(issue_key = %plan.issue_key, pattern, %err, "regex fix unparseable, falling back to heuristic");
            }
        }
    } else {
        debug!(issue_key = %plan.issue_key, "no 'pattern -> replacement' form in solution, falling back to heuristic");
    }

    apply_heuristic(lines, plan)
}

/// Keyword-driven fallback: inspects the issue description and proposed
/// solution to choose delete, insert, or replace. The least reliable path.
fn apply_heuristic(mut lines: Vec<String>, plan: &FixPlan) -> Result<String> {
    let idx = plan.line_number as usize - 1;
    let description = plan.description.to_lowercase();
    let solution = plan.proposed_solution.to_lowercase();
    let original_line = lines[idx].clone();

    if description.contains("unused import") || description.contains("unused variable") {
        debug!(issue_key = %plan.issue_key, "heuristic chose delete");
        lines.remove(idx);
    } else if solution.contains("missing") || solution.contains("add") {
        debug!(issue_key = %plan.issue_key, "heuristic chose insert");
        let content = extract_fix_content(&plan.proposed_solution);
        let indentation = leading_whitespace(&original_line);
        lines.insert(idx, format!("{indentation}{}", content.trim()));
    } else if solution.contains("replace") || solution.contains("change") {
        debug!(issue_key = %plan.issue_key, "heuristic chose replace");
        let content = extract_fix_content(&plan.proposed_solution);
        let indentation = leading_whitespace(&original_line);
        lines[idx] = format!("{indentation}{}", content.trim());
    } else {
        let content = extract_fix_content(&plan.proposed_solution);
        if content.trim().is_empty() || content.trim() == original_line.trim() {
            return Err(application_error(
                plan,
                "heuristic could not derive a change from the proposed solution".to_string(),
            ));
        }
        debug!(issue_key = %plan.issue_key, "heuristic defaulted to replace");
        let indentation = leading_whitespace(&original_line);
        lines[idx] = format!("{indentation}{}", content.trim());
    }

    Ok(lines.join("\n"))
}

/// Extract the actual code content from a free-text proposed solution:
/// strip known prefixes, unwrap fenced code blocks, trim wrapping quotes.
pub fn extract_fix_content(proposed_solution: &str) -> String {
    let mut solution = proposed_solution.trim().to_string();

    for prefix in SOLUTION_PREFIXES {
        if solution.to_lowercase().starts_with(&prefix.to_lowercase()) {
            solution = solution[prefix.len()..].trim().to_string();
            break;
        }
    }

    if solution.contains("```") {
        let parts: Vec<&str> = solution.split("```").collect();
        if parts.len() >= 3 {
            let block = parts[1].trim();
            let mut block_lines: Vec<&str> = block.split('\n').collect();
            // First line may be a bare language identifier ("python", "rust").
            if block_lines.len() > 1 {
                let first = block_lines[0].trim();
                if !first.is_empty() && first.chars().all(|c| c.is_ascii_alphanumeric()) {
                    block_lines.remove(0);
                }
            }
            return block_lines.join("\n").trim().to_string();
        }
    }

    for quote in ['"', '\''] {
        if solution.len() >= 2 && solution.starts_with(quote) && solution.ends_with(quote) {
            solution = solution[1..solution.len() - 1].to_string();
            break;
        }
    }

    solution
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed_len = line.trim_start().len();
    &line[..line.len() - trimmed_len]
}

/// Indentation for an inserted line: nearest non-blank line looking
/// backward first, then forward.
fn contextual_indentation(lines: &[String], idx: usize) -> String {
    for line in lines[..idx].iter().rev() {
        if !line.trim().is_empty() {
            return leading_whitespace(line).to_string();
        }
    }
    for line in lines[idx..].iter() {
        if !line.trim().is_empty() {
            return leading_whitespace(line).to_string();
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::issue::Severity;
    use crate::domain::plan::Effort;
    use chrono::Utc;

    fn plan(fix_type: FixType, line: u32, solution: &str) -> FixPlan {
        FixPlan {
            issue_key: "KEY-1".to_string(),
            file_path: "src/app.py".to_string(),
            line_number: line,
            description: "issue description".to_string(),
            problem_analysis: "analysis".to_string(),
            proposed_solution: solution.to_string(),
            confidence_score: 0.9,
            estimated_effort: Effort::Low,
            fix_type,
            severity: Severity::Major,
            side_effects: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_replace_preserves_indentation_and_line_count() {
        let original = "def f():\n    x = 1\n    return x\n";
        let p = plan(FixType::Replace, 2, "Replace with: x = 2");
        let applied = apply_plan(original, &p).unwrap();
        assert_eq!(applied.content, "def f():\n    x = 2\n    return x\n");
        assert_eq!(
            applied.content.split('\n').count(),
            original.split('\n').count()
        );
    }

    #[test]
    fn test_replace_out_of_range_fails_that_plan_only() {
        let p = plan(FixType::Replace, 50, "Replace with: x = 2");
        let err = apply_plan("a\nb\n", &p).unwrap_err();
        assert!(matches!(err, HealerError::Application { .. }));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_delete_line_10_of_20_line_file() {
        let original: String = (1..=20)
            .map(|i| format!("line{i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let p = plan(FixType::Delete, 10, "Delete the line");
        let applied = apply_plan(&original, &p).unwrap();
        let lines: Vec<&str> = applied.content.split('\n').collect();
        assert_eq!(lines.len(), 19);
        assert!(!lines.contains(&"line10"));
        assert_eq!(lines[8], "line9");
        assert_eq!(lines[9], "line11");
        assert_eq!(lines[18], "line20");
    }

    #[test]
    fn test_insert_takes_indentation_from_previous_line() {
        let original = "def f():\n    x = 1\n    return x";
        let p = plan(FixType::Insert, 3, "Use: y = 2");
        let applied = apply_plan(original, &p).unwrap();
        assert_eq!(
            applied.content,
            "def f():\n    x = 1\n    y = 2\n    return x"
        );
    }

    #[test]
    fn test_insert_falls_forward_when_no_previous_content() {
        let original = "\n    x = 1";
        let p = plan(FixType::Insert, 1, "Use: import os");
        let applied = apply_plan(original, &p).unwrap();
        assert!(applied.content.starts_with("    import os"));
    }

    #[test]
    fn test_regex_substitutes_globally() {
        let original = "print \"a\"\nprint \"b\"\n";
        let mut p = plan(FixType::Regex, 1, "");
        p.proposed_solution = "Replace: print \"(\\w+)\" -> println(\"$1\")".to_string();
        let applied = apply_plan(original, &p).unwrap();
        assert_eq!(applied.content, "println(\"a\")\nprintln(\"b\")\n");
    }

    #[test]
    fn test_regex_parse_failure_falls_back_to_heuristic() {
        let original = "import os\nx = 1\n";
        let mut p = plan(FixType::Regex, 1, "no arrow form here");
        p.description = "Remove unused import".to_string();
        let applied = apply_plan(original, &p).unwrap();
        assert_eq!(applied.content, "x = 1\n");
    }

    #[test]
    fn test_heuristic_unused_variable_deletes_line() {
        let original = "a = 1\nb = 2\nprint(a)\n";
        let mut p = plan(FixType::Heuristic, 2, "Remove it");
        p.description = "Unused variable 'b'".to_lowercase();
        let applied = apply_plan(original, &p).unwrap();
        assert_eq!(applied.content, "a = 1\nprint(a)\n");
    }

    #[test]
    fn test_heuristic_no_op_extraction_fails() {
        let original = "x = 1\n";
        let p = plan(FixType::Heuristic, 1, "x = 1");
        let err = apply_plan(original, &p).unwrap_err();
        assert!(err.to_string().contains("could not derive"));
    }

    #[test]
    fn test_extract_strips_prefix_and_quotes() {
        assert_eq!(extract_fix_content("Replace with: \"x = 2\""), "x = 2");
        assert_eq!(extract_fix_content("Fix: x = 2"), "x = 2");
    }

    #[test]
    fn test_extract_unwraps_fenced_block_with_language() {
        let solution = "Use the following:\n```python\nimport os\n```";
        assert_eq!(extract_fix_content(solution), "import os");
    }

    #[test]
    fn test_extract_unwraps_fence_without_language() {
        let solution = "```\nlet x = 2;\n```";
        assert_eq!(extract_fix_content(solution), "let x = 2;");
    }

    #[test]
    fn test_replace_empty_extraction_is_failure() {
        let p = plan(FixType::Replace, 1, "Replace with: \"\"");
        let err = apply_plan("x = 1\n", &p).unwrap_err();
        assert!(err.to_string().contains("no code content"));
    }
}
