//! Fetching open issues from the code-quality server.
//!
//! [`SonarClient`] speaks the SonarQube web API; [`IssueSource`] is the seam
//! the proposer and CLI depend on, so tests feed issues from memory.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::QualityServerConfig;
use crate::domain::error::{HealerError, Result};
use crate::domain::issue::{Issue, IssueType, Severity};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 100;
const MAX_PAGES: u32 = 20;

/// Severities fetched when the caller does not narrow them.
pub const DEFAULT_SEVERITIES: [Severity; 3] =
    [Severity::Blocker, Severity::Critical, Severity::Major];

/// Provider of open issues for one project.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Issues awaiting a fix, most severe first.
    async fn fetch_issues(&self, severities: &[Severity]) -> Result<Vec<Issue>>;

    /// Cheap reachability probe.
    async fn test_connection(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total: u64,
    issues: Vec<IssueDto>,
}

#[derive(Debug, Deserialize)]
struct SystemStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct IssueDto {
    key: String,
    rule: String,
    severity: Severity,
    #[serde(rename = "type")]
    issue_type: IssueType,
    /// Qualified as `<project_key>:<path>`.
    component: String,
    line: Option<u32>,
    message: String,
    status: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(rename = "creationDate")]
    creation_date: Option<DateTime<Utc>>,
}

impl IssueDto {
    fn into_issue(self, project_key: &str) -> Issue {
        let file_path = self
            .component
            .strip_prefix(project_key)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(&self.component)
            .to_string();
        Issue {
            key: self.key,
            rule: self.rule,
            severity: self.severity,
            issue_type: self.issue_type,
            file_path,
            // File-level issues carry no line; target the top of the file.
            line: self.line.unwrap_or(1),
            message: self.message,
            status: self.status,
            tags: self.tags,
            creation_date: self.creation_date,
        }
    }
}

/// SonarQube issue-search client for one project key.
#[derive(Debug, Clone)]
pub struct SonarClient {
    http: reqwest::Client,
    config: QualityServerConfig,
}

impl SonarClient {
    pub fn new(config: QualityServerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn project_key(&self) -> &str {
        &self.config.project_key
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.http.get(url);
        match &self.config.token {
            // Sonar token auth is HTTP basic with an empty password.
            Some(token) => builder.basic_auth(token, None::<&str>),
            None => builder,
        }
    }

    async fn fetch_page(&self, severities: &str, page: u32) -> Result<SearchResponse> {
        let url = format!(
            "{}/api/issues/search",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .request(&url)
            .query(&[
                ("componentKeys", self.config.project_key.as_str()),
                ("severities", severities),
                ("statuses", "OPEN,CONFIRMED,REOPENED"),
                ("ps", &PAGE_SIZE.to_string()),
                ("p", &page.to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HealerError::IssueSource(format!(
                "issue search returned {status}: {body}"
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl IssueSource for SonarClient {
    async fn fetch_issues(&self, severities: &[Severity]) -> Result<Vec<Issue>> {
        let chosen = if severities.is_empty() {
            &DEFAULT_SEVERITIES[..]
        } else {
            severities
        };
        let severities_param = chosen
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut issues = Vec::new();
        let mut page = 1;
        loop {
            let response = self.fetch_page(&severities_param, page).await?;
            let fetched = response.issues.len();
            issues.extend(
                response
                    .issues
                    .into_iter()
                    .map(|dto| dto.into_issue(&self.config.project_key)),
            );
            debug!(page, fetched, total = response.total, "fetched issue page");
            if fetched < PAGE_SIZE as usize || issues.len() as u64 >= response.total {
                break;
            }
            page += 1;
            if page > MAX_PAGES {
                warn!(
                    total = response.total,
                    "issue search capped at {} pages", MAX_PAGES
                );
                break;
            }
        }

        issues.sort_by(|a, b| a.severity.cmp(&b.severity));
        info!(
            project = %self.config.project_key,
            count = issues.len(),
            "fetched open issues"
        );
        Ok(issues)
    }

    async fn test_connection(&self) -> Result<()> {
        let url = format!(
            "{}/api/system/status",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self.request(&url).send().await?;
        if !response.status().is_success() {
            return Err(HealerError::IssueSource(format!(
                "system status returned {}",
                response.status()
            )));
        }
        let status: SystemStatus = response.json().await?;
        if status.status != "UP" {
            return Err(HealerError::IssueSource(format!(
                "server status is {}",
                status.status
            )));
        }
        Ok(())
    }
}
