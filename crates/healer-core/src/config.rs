//! Runtime configuration, loaded from environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::error::{HealerError, Result};
use crate::plan_gate::DEFAULT_CONFIDENCE_THRESHOLD;

/// Coordinates for the review-request API of the hosting platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewApiConfig {
    /// API base, e.g. `https://gitlab.example.com`.
    pub base_url: String,
    pub token: String,
    pub project_id: String,
    /// Branch review requests target.
    pub target_branch: String,
}

/// Coordinates for the code-quality server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityServerConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub project_key: String,
}

/// Healer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealerConfig {
    /// Working-tree checkout the run mutates. One run owns one tree.
    pub repo_path: PathBuf,
    pub remote_name: String,
    pub base_branch: String,

    /// Auto-apply confidence threshold for the plan gate.
    pub confidence_threshold: f64,

    /// Whether the build gate runs at all.
    pub build_gate_enabled: bool,

    /// Timeout for local git operations.
    pub git_timeout_secs: u64,
    /// Timeout for network git operations (pull, push, ls-remote).
    pub push_timeout_secs: u64,
    /// Timeout for the clean build.
    pub build_timeout_secs: u64,

    /// Directory holding per-project fix-plan JSON files.
    pub plans_dir: PathBuf,

    pub review: Option<ReviewApiConfig>,
    pub quality_server: Option<QualityServerConfig>,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            remote_name: "origin".to_string(),
            base_branch: "main".to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            build_gate_enabled: false,
            git_timeout_secs: 30,
            push_timeout_secs: 120,
            build_timeout_secs: 300,
            plans_dir: PathBuf::from("fixplan"),
            review: None,
            quality_server: None,
        }
    }
}

impl HealerConfig {
    /// Load settings from `HEALER_*` environment variables, falling back to
    /// defaults. Review and quality-server sections are only present when
    /// their required variables are all set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = env_var("HEALER_REPO_PATH") {
            config.repo_path = PathBuf::from(path);
        }
        if let Some(remote) = env_var("HEALER_REMOTE") {
            config.remote_name = remote;
        }
        if let Some(branch) = env_var("HEALER_BASE_BRANCH") {
            config.base_branch = branch;
        }
        if let Some(threshold) = env_var("HEALER_CONFIDENCE_THRESHOLD") {
            config.confidence_threshold = threshold
                .parse()
                .map_err(|_| HealerError::Config(format!("bad HEALER_CONFIDENCE_THRESHOLD: {threshold}")))?;
        }
        if let Some(enabled) = env_var("HEALER_BUILD_GATE") {
            config.build_gate_enabled = matches!(enabled.as_str(), "1" | "true" | "yes");
        }
        if let Some(secs) = env_var("HEALER_GIT_TIMEOUT_SECS") {
            config.git_timeout_secs = secs
                .parse()
                .map_err(|_| HealerError::Config(format!("bad HEALER_GIT_TIMEOUT_SECS: {secs}")))?;
        }
        if let Some(secs) = env_var("HEALER_PUSH_TIMEOUT_SECS") {
            config.push_timeout_secs = secs
                .parse()
                .map_err(|_| HealerError::Config(format!("bad HEALER_PUSH_TIMEOUT_SECS: {secs}")))?;
        }
        if let Some(secs) = env_var("HEALER_BUILD_TIMEOUT_SECS") {
            config.build_timeout_secs = secs
                .parse()
                .map_err(|_| HealerError::Config(format!("bad HEALER_BUILD_TIMEOUT_SECS: {secs}")))?;
        }
        if let Some(dir) = env_var("HEALER_PLANS_DIR") {
            config.plans_dir = PathBuf::from(dir);
        }

        config.review = match (
            env_var("HEALER_REVIEW_URL"),
            env_var("HEALER_REVIEW_TOKEN"),
            env_var("HEALER_REVIEW_PROJECT_ID"),
        ) {
            (Some(base_url), Some(token), Some(project_id)) => Some(ReviewApiConfig {
                base_url,
                token,
                project_id,
                target_branch: env_var("HEALER_REVIEW_TARGET_BRANCH")
                    .unwrap_or_else(|| config.base_branch.clone()),
            }),
            _ => None,
        };

        config.quality_server = match (env_var("HEALER_SONAR_URL"), env_var("HEALER_SONAR_PROJECT")) {
            (Some(base_url), Some(project_key)) => Some(QualityServerConfig {
                base_url,
                token: env_var("HEALER_SONAR_TOKEN"),
                project_key,
            }),
            _ => None,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(HealerError::Config(format!(
                "confidence threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.git_timeout_secs == 0 || self.push_timeout_secs == 0 || self.build_timeout_secs == 0
        {
            return Err(HealerError::Config("timeouts must be non-zero".to_string()));
        }
        if self.base_branch.trim().is_empty() {
            return Err(HealerError::Config("base branch must not be empty".to_string()));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
