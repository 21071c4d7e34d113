//! File-backed store for fix plans: one JSON array per project key.
//!
//! Layout is `<dir>/<project_key>.json`. Saves append to the existing array
//! so repeated proposal runs accumulate instead of clobbering.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::error::{HealerError, Result};
use crate::domain::plan::FixPlan;

/// Plan counts by project and by severity, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_plans: usize,
    pub plans_by_project: BTreeMap<String, usize>,
    pub plans_by_severity: BTreeMap<String, usize>,
}

/// Directory-backed fix-plan store.
#[derive(Debug, Clone)]
pub struct PlanStore {
    dir: PathBuf,
}

impl PlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn project_file(&self, project_key: &str) -> Result<PathBuf> {
        if project_key.is_empty()
            || project_key.contains(['/', '\\'])
            || project_key.contains("..")
        {
            return Err(HealerError::Storage(format!(
                "invalid project key: {project_key:?}"
            )));
        }
        Ok(self.dir.join(format!("{project_key}.json")))
    }

    /// Append `plans` to the project's array, creating the file and the
    /// store directory on first save.
    pub fn save(&self, project_key: &str, plans: &[FixPlan]) -> Result<()> {
        let path = self.project_file(project_key)?;
        fs::create_dir_all(&self.dir)?;
        let mut all = if path.is_file() {
            self.read_array(&path)?
        } else {
            Vec::new()
        };
        all.extend_from_slice(plans);
        let json = serde_json::to_string_pretty(&all)?;
        fs::write(&path, json)?;
        info!(
            project = project_key,
            added = plans.len(),
            total = all.len(),
            "saved fix plans"
        );
        Ok(())
    }

    /// All plans for one project. Missing file means no plans, not an error.
    pub fn load_project(&self, project_key: &str) -> Result<Vec<FixPlan>> {
        let path = self.project_file(project_key)?;
        if !path.is_file() {
            debug!(project = project_key, "no stored plans");
            return Ok(Vec::new());
        }
        self.read_array(&path)
    }

    /// Look up one plan by issue key within a project.
    pub fn load_plan(&self, project_key: &str, issue_key: &str) -> Result<Option<FixPlan>> {
        let plans = self.load_project(project_key)?;
        Ok(plans.into_iter().find(|p| p.issue_key == issue_key))
    }

    /// Project keys with stored plans, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut projects = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                projects.push(stem.to_string());
            }
        }
        projects.sort();
        Ok(projects)
    }

    /// Counts across every stored project.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for project in self.list_projects()? {
            let plans = self.load_project(&project)?;
            stats.total_plans += plans.len();
            stats.plans_by_project.insert(project, plans.len());
            for plan in &plans {
                *stats
                    .plans_by_severity
                    .entry(plan.severity.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
        Ok(stats)
    }

    fn read_array(&self, path: &Path) -> Result<Vec<FixPlan>> {
        let raw = fs::read_to_string(path)?;
        let plans = serde_json::from_str(&raw).map_err(|e| {
            HealerError::Storage(format!("corrupt plan file {}: {e}", path.display()))
        })?;
        Ok(plans)
    }
}
