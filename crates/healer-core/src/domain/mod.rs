//! Domain model: issues, fix plans, run aggregate, and the error taxonomy.

pub mod error;
pub mod issue;
pub mod plan;
pub mod run;

pub use error::{HealerError, PlanError, Result};
pub use issue::{Issue, IssueType, Severity};
pub use plan::{Effort, FixPlan, FixType};
pub use run::{
    AppliedFix, BuildStatus, FailedFix, ReportStatus, RunReport, RunStatus, WorkflowRun,
};
