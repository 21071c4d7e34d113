//! Core library for the healer: automated remediation of static-analysis
//! findings.
//!
//! The pipeline is: fetch open issues from the quality server, propose fix
//! plans, screen them through the confidence gate, then run the atomic
//! workflow that applies every surviving fix on one branch, validates and
//! build-gates the result, and publishes it as a review request.
//!
//! [`workflow::HealWorkflow`] is the entry point; everything else supports
//! it or the CLI around it.

pub mod apply;
pub mod build_gate;
pub mod config;
pub mod diff;
pub mod domain;
pub mod issues;
pub mod plan_gate;
pub mod propose;
pub mod publish;
pub mod storage;
pub mod telemetry;
pub mod validate;
pub mod vcs;
pub mod workflow;

pub use config::{HealerConfig, QualityServerConfig, ReviewApiConfig};
pub use domain::error::{HealerError, PlanError, Result};
pub use domain::issue::{Issue, IssueType, Severity};
pub use domain::plan::{Effort, FixPlan, FixType};
pub use domain::run::{
    AppliedFix, BuildStatus, FailedFix, ReportStatus, RunReport, RunStatus, WorkflowRun,
};
pub use plan_gate::DEFAULT_CONFIDENCE_THRESHOLD;
pub use workflow::HealWorkflow;

/// Library version, from the crate metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
