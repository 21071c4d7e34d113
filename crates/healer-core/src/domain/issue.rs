//! Static-analysis issue model as reported by the code-quality server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue severity, ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Blocker,
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocker => "BLOCKER",
            Severity::Critical => "CRITICAL",
            Severity::Major => "MAJOR",
            Severity::Minor => "MINOR",
            Severity::Info => "INFO",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BLOCKER" => Ok(Severity::Blocker),
            "CRITICAL" => Ok(Severity::Critical),
            "MAJOR" => Ok(Severity::Major),
            "MINOR" => Ok(Severity::Minor),
            "INFO" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    Bug,
    Vulnerability,
    CodeSmell,
}

/// A static-analysis finding tied to one file location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Server-assigned unique key.
    pub key: String,

    /// Rule identifier, e.g. `python:S1481`.
    pub rule: String,

    pub severity: Severity,

    #[serde(rename = "type")]
    pub issue_type: IssueType,

    /// Path of the offending file, relative to the repository root.
    pub file_path: String,

    /// 1-based line of the finding.
    pub line: u32,

    pub message: String,

    /// Server-side lifecycle status (OPEN, CONFIRMED, ...).
    pub status: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub creation_date: Option<DateTime<Utc>>,
}
