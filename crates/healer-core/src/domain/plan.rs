//! Fix plan model: a proposed, not-yet-applied code change for one issue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::issue::Severity;

/// How a plan transforms the target file.
///
/// A closed set so a new fix kind is a compile-time-checked addition; the
/// applier matches exhaustively on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixType {
    /// Substitute the target line, keeping its indentation.
    Replace,
    /// Insert a new line at the target position.
    Insert,
    /// Remove the target line.
    Delete,
    /// Global `pattern -> replacement` substitution across the file.
    Regex,
    /// Keyword-driven fallback; the least reliable path.
    Heuristic,
}

impl Default for FixType {
    fn default() -> Self {
        FixType::Heuristic
    }
}

/// Relative effort estimate attached by the proposer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Effort {
    Low,
    Medium,
    High,
}

/// A proposed code change tied to one detected issue.
///
/// Immutable once created: produced by a proposer, screened by the plan
/// gate, consumed by the applier. Serializes field-for-field to the
/// persistence format (one JSON array per project key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixPlan {
    pub issue_key: String,

    /// Target file, relative to the repository root.
    pub file_path: String,

    /// 1-based target line.
    pub line_number: u32,

    /// Short human description of the issue being fixed.
    pub description: String,

    pub problem_analysis: String,

    /// Free-text solution; the applier extracts code content from it.
    pub proposed_solution: String,

    /// Proposer confidence in `[0, 1]`.
    pub confidence_score: f64,

    pub estimated_effort: Effort,

    #[serde(default)]
    pub fix_type: FixType,

    pub severity: Severity,

    #[serde(default)]
    pub side_effects: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl FixPlan {
    /// Fields that must be non-empty for the plan to be applicable.
    pub(crate) fn required_text_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("issue_key", self.issue_key.as_str()),
            ("file_path", self.file_path.as_str()),
            ("description", self.description.as_str()),
            ("proposed_solution", self.proposed_solution.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_plan() -> FixPlan {
        FixPlan {
            issue_key: "PROJ-42".to_string(),
            file_path: "src/service.py".to_string(),
            line_number: 10,
            description: "Remove unused variable".to_string(),
            problem_analysis: "Rule violation: python:S1481".to_string(),
            proposed_solution: "Delete unused variable declarations".to_string(),
            confidence_score: 0.9,
            estimated_effort: Effort::Low,
            fix_type: FixType::Delete,
            severity: Severity::Major,
            side_effects: vec![],
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_fix_plan_json_round_trip_is_field_for_field_equal() {
        let plan = sample_plan();
        let json = serde_json::to_string_pretty(&plan).unwrap();
        let back: FixPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, back);
    }

    #[test]
    fn test_fix_type_serde_names() {
        assert_eq!(
            serde_json::to_string(&FixType::Replace).unwrap(),
            "\"REPLACE\""
        );
        assert_eq!(
            serde_json::from_str::<FixType>("\"HEURISTIC\"").unwrap(),
            FixType::Heuristic
        );
    }

    #[test]
    fn test_fix_type_defaults_to_heuristic_when_absent() {
        let mut value = serde_json::to_value(sample_plan()).unwrap();
        value.as_object_mut().unwrap().remove("fix_type");
        let back: FixPlan = serde_json::from_value(value).unwrap();
        assert_eq!(back.fix_type, FixType::Heuristic);
    }

    #[test]
    fn test_created_at_is_iso8601() {
        let json = serde_json::to_value(sample_plan()).unwrap();
        let created = json["created_at"].as_str().unwrap();
        assert!(created.starts_with("2025-06-01T12:00:00"));
    }
}
