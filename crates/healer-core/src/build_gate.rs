//! Build gate: after fixes are applied, run the project's clean build and
//! stop the run when it breaks.
//!
//! The build tool is inferred from marker files in the repository root. An
//! unresolvable tool downgrades the gate to a skip with a warning; a failing
//! or timed-out build from an enabled gate is fatal.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::error::{HealerError, Result};
use crate::domain::run::BuildStatus;

const PROBE_TIMEOUT_SECS: u64 = 15;

/// Build system inferred from the repository layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectKind {
    Maven,
    Gradle { wrapper: bool },
    Node,
    /// Python projects have no compile step to gate on.
    Python,
    Unknown,
}

impl ProjectKind {
    /// Inspect marker files in `root`.
    pub fn detect(root: &Path) -> Self {
        if root.join("pom.xml").is_file() {
            return ProjectKind::Maven;
        }
        if root.join("build.gradle").is_file() || root.join("build.gradle.kts").is_file() {
            let wrapper = root.join("gradlew").is_file();
            return ProjectKind::Gradle { wrapper };
        }
        if root.join("package.json").is_file() {
            return ProjectKind::Node;
        }
        if root.join("requirements.txt").is_file() || root.join("setup.py").is_file() {
            return ProjectKind::Python;
        }
        ProjectKind::Unknown
    }

    /// The build invocation for this project kind, if it has one.
    fn build_command(&self, root: &Path) -> Option<BuildCommand> {
        match self {
            ProjectKind::Maven => Some(BuildCommand {
                tool: "mvn".to_string(),
                program: "mvn".to_string(),
                args: vec!["clean".to_string(), "install".to_string()],
            }),
            ProjectKind::Gradle { wrapper: true } => Some(BuildCommand {
                tool: "gradle".to_string(),
                program: root.join("gradlew").to_string_lossy().into_owned(),
                args: vec!["clean".to_string(), "build".to_string()],
            }),
            ProjectKind::Gradle { wrapper: false } => Some(BuildCommand {
                tool: "gradle".to_string(),
                program: "gradle".to_string(),
                args: vec!["clean".to_string(), "build".to_string()],
            }),
            ProjectKind::Node => Some(BuildCommand {
                tool: "npm".to_string(),
                program: "npm".to_string(),
                args: vec!["run".to_string(), "build".to_string()],
            }),
            ProjectKind::Python | ProjectKind::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    /// Short tool name used in errors and logs.
    pub tool: String,
    pub program: String,
    pub args: Vec<String>,
}

/// Outcome of one bounded command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Exited { code: i32, stderr_tail: String },
    TimedOut,
}

/// Seam for running build commands, so tests never shell out.
#[async_trait]
pub trait CommandExec: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout_secs: u64,
    ) -> Result<ExecOutcome>;
}

/// Runs commands through the system shell environment.
#[derive(Debug, Default)]
pub struct SystemExec;

#[async_trait]
impl CommandExec for SystemExec {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout_secs: u64,
    ) -> Result<ExecOutcome> {
        debug!(program, ?args, "running build command");
        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();
        let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), child).await {
            Ok(result) => result?,
            Err(_) => return Ok(ExecOutcome::TimedOut),
        };
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr_tail = stderr
            .lines()
            .rev()
            .take(20)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ExecOutcome::Exited {
            code: output.status.code().unwrap_or(-1),
            stderr_tail,
        })
    }
}

/// Gate on a clean build of the repository after fixes are written.
pub struct BuildGate {
    repo_path: PathBuf,
    enabled: bool,
    timeout_secs: u64,
    exec: Arc<dyn CommandExec>,
}

impl BuildGate {
    pub fn new(repo_path: impl Into<PathBuf>, enabled: bool, timeout_secs: u64) -> Self {
        Self {
            repo_path: repo_path.into(),
            enabled,
            timeout_secs,
            exec: Arc::new(SystemExec),
        }
    }

    pub fn with_exec(mut self, exec: Arc<dyn CommandExec>) -> Self {
        self.exec = exec;
        self
    }

    /// Run the gate. `Ok(Skipped)` when disabled, the project has no build
    /// step, or the tool is not installed. A failing or timed-out build is
    /// an error; callers record the matching [`BuildStatus`] from it.
    pub async fn run(&self) -> Result<BuildStatus> {
        if !self.enabled {
            debug!("build gate disabled");
            return Ok(BuildStatus::Skipped);
        }

        let kind = ProjectKind::detect(&self.repo_path);
        let command = match kind.build_command(&self.repo_path) {
            Some(command) => command,
            None => {
                info!(?kind, "no build step for project, skipping gate");
                return Ok(BuildStatus::Skipped);
            }
        };

        if !self.tool_available(&command).await {
            warn!(tool = %command.tool, "build tool not available, skipping gate");
            return Ok(BuildStatus::Skipped);
        }

        info!(tool = %command.tool, "running clean build");
        let outcome = self
            .exec
            .run(&command.program, &command.args, &self.repo_path, self.timeout_secs)
            .await?;
        match outcome {
            ExecOutcome::Exited { code: 0, .. } => {
                info!(tool = %command.tool, "build passed");
                Ok(BuildStatus::Success)
            }
            ExecOutcome::Exited { code, stderr_tail } => {
                warn!(tool = %command.tool, code, %stderr_tail, "build failed");
                Err(HealerError::BuildFailed {
                    tool: command.tool,
                    exit_code: code,
                })
            }
            ExecOutcome::TimedOut => Err(HealerError::BuildTimeout {
                timeout_secs: self.timeout_secs,
            }),
        }
    }

    /// Short `--version` probe so a missing tool skips instead of failing.
    async fn tool_available(&self, command: &BuildCommand) -> bool {
        let probe = self
            .exec
            .run(
                &command.program,
                &["--version".to_string()],
                &self.repo_path,
                PROBE_TIMEOUT_SECS,
            )
            .await;
        matches!(probe, Ok(ExecOutcome::Exited { code: 0, .. }))
    }
}
