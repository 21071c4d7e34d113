//! HTTP client for creating review requests on the hosting platform.
//!
//! Speaks the GitLab merge-request API shape. Failures here are surfaced as
//! [`HealerError::ReviewRequest`], which callers treat as non-fatal: the
//! pushed branch stays reviewable by hand.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ReviewApiConfig;
use crate::domain::error::{HealerError, Result};

use super::ReviewRequest;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ReviewCreated {
    web_url: Option<String>,
    iid: Option<u64>,
}

/// Client for the review-request endpoint of a single project.
#[derive(Debug, Clone)]
pub struct ReviewClient {
    http: reqwest::Client,
    config: ReviewApiConfig,
}

impl ReviewClient {
    pub fn new(config: ReviewApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    /// Branch that review requests target when the caller does not override
    /// it.
    pub fn target_branch(&self) -> &str {
        &self.config.target_branch
    }

    /// Create a review request and return its URL.
    pub async fn create(&self, request: &ReviewRequest) -> Result<String> {
        let url = format!(
            "{}/api/v4/projects/{}/merge_requests",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id
        );
        debug!(url = %url, source = %request.source_branch, "creating review request");

        let response = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.config.token)
            .json(request)
            .send()
            .await
            .map_err(|e| HealerError::ReviewRequest(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HealerError::ReviewRequest(format!(
                "server returned {status}: {body}"
            )));
        }

        let created: ReviewCreated = response
            .json()
            .await
            .map_err(|e| HealerError::ReviewRequest(format!("malformed response: {e}")))?;

        let url = created.web_url.ok_or_else(|| {
            HealerError::ReviewRequest("response carried no web_url".to_string())
        })?;
        info!(url = %url, iid = ?created.iid, "review request created");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> ReviewApiConfig {
        ReviewApiConfig {
            base_url: "https://gitlab.example.com/".to_string(),
            token: "glpat-test".to_string(),
            project_id: "42".to_string(),
            target_branch: "main".to_string(),
        }
    }

    #[test]
    fn test_client_construction() {
        let client = ReviewClient::new(make_config()).unwrap();
        assert_eq!(client.target_branch(), "main");
    }

    #[test]
    fn test_created_response_parses_web_url() {
        let created: ReviewCreated = serde_json::from_str(
            r#"{"iid": 7, "web_url": "https://gitlab.example.com/g/p/-/merge_requests/7"}"#,
        )
        .unwrap();
        assert_eq!(created.iid, Some(7));
        assert_eq!(
            created.web_url.as_deref(),
            Some("https://gitlab.example.com/g/p/-/merge_requests/7")
        );
    }

    #[test]
    fn test_created_response_tolerates_missing_fields() {
        let created: ReviewCreated = serde_json::from_str("{}").unwrap();
        assert!(created.web_url.is_none());
        assert!(created.iid.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_review_request_error() {
        let mut config = make_config();
        config.base_url = "http://127.0.0.1:1".to_string();
        let client = ReviewClient::new(config).unwrap();
        let request = ReviewRequest {
            source_branch: "fixes-20250601-120000".to_string(),
            target_branch: "main".to_string(),
            title: "Automated fixes".to_string(),
            description: "body".to_string(),
            squash: true,
        };
        let err = client.create(&request).await.unwrap_err();
        assert!(matches!(err, HealerError::ReviewRequest(_)));
        assert!(!err.is_fatal());
    }
}
