//! `healer` command-line interface.
//!
//! Subcommands:
//! - `heal`: apply stored fix plans for a project as one atomic run
//! - `plans`: inspect the fix-plan store
//! - `issues`: fetch open issues from the quality server
//! - `propose`: turn fetched issues into stored fix plans

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use healer_core::config::HealerConfig;
use healer_core::domain::run::ReportStatus;
use healer_core::issues::{IssueSource, SonarClient, DEFAULT_SEVERITIES};
use healer_core::propose::{propose_all, RuleBasedProposer};
use healer_core::storage::PlanStore;
use healer_core::telemetry::init_tracing;
use healer_core::vcs::git::GitCli;
use healer_core::vcs::review::ReviewClient;
use healer_core::workflow::HealWorkflow;
use healer_core::Severity;

#[derive(Parser)]
#[command(name = "healer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated remediation of static-analysis findings", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as newline-delimited JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Repository to operate on (default from HEALER_REPO_PATH)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply stored fix plans for a project as one atomic run
    Heal {
        /// Project key whose stored plans to apply
        project: String,

        /// Read plans from a JSON array file instead of the store
        #[arg(long)]
        plans_file: Option<PathBuf>,

        /// Override the auto-apply confidence threshold
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Inspect the fix-plan store
    Plans {
        #[command(subcommand)]
        command: PlansCommand,
    },

    /// Fetch open issues from the quality server
    Issues {
        /// Severities to fetch (default: BLOCKER, CRITICAL, MAJOR)
        #[arg(long, value_delimiter = ',')]
        severities: Vec<Severity>,
    },

    /// Fetch issues and store fix plans for them
    Propose {
        /// Also plan low-confidence fallback fixes for unrecognized rules
        #[arg(long)]
        fallback: bool,

        /// Severities to fetch (default: BLOCKER, CRITICAL, MAJOR)
        #[arg(long, value_delimiter = ',')]
        severities: Vec<Severity>,
    },
}

#[derive(Subcommand)]
enum PlansCommand {
    /// List stored projects, or the plans of one project
    List {
        /// Project key to list plans for
        project: Option<String>,
    },

    /// Show one stored plan
    Show {
        project: String,
        issue_key: String,
    },

    /// Plan counts by project and severity
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json_logs, level);

    let mut config = HealerConfig::from_env().context("loading configuration")?;
    if let Some(repo) = cli.repo {
        config.repo_path = repo;
    }

    match cli.command {
        Commands::Heal {
            project,
            plans_file,
            threshold,
        } => {
            if let Some(threshold) = threshold {
                config.confidence_threshold = threshold;
            }
            heal(config, &project, plans_file).await
        }
        Commands::Plans { command } => plans(config, command),
        Commands::Issues { severities } => issues(config, &severities).await,
        Commands::Propose {
            fallback,
            severities,
        } => propose(config, fallback, &severities).await,
    }
}

async fn heal(config: HealerConfig, project: &str, plans_file: Option<PathBuf>) -> Result<()> {
    let plans = match plans_file {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => {
            let store = PlanStore::new(&config.plans_dir);
            store
                .load_project(project)
                .with_context(|| format!("loading plans for {project}"))?
        }
    };
    if plans.is_empty() {
        bail!("no stored fix plans for project {project}");
    }
    info!(project, plans = plans.len(), "starting heal run");

    let mut git = GitCli::new(config.repo_path.clone(), config.remote_name.clone())
        .with_timeouts(config.git_timeout_secs, config.push_timeout_secs);
    if let Some(review) = config.review.clone() {
        git = git.with_review_client(ReviewClient::new(review)?);
    }

    let workflow = HealWorkflow::new(config, Arc::new(git));
    let report = workflow.run(plans).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.status == ReportStatus::Error {
        std::process::exit(1);
    }
    Ok(())
}

fn plans(config: HealerConfig, command: PlansCommand) -> Result<()> {
    let store = PlanStore::new(&config.plans_dir);
    match command {
        PlansCommand::List { project: None } => {
            for project in store.list_projects()? {
                println!("{project}");
            }
        }
        PlansCommand::List {
            project: Some(project),
        } => {
            let plans = store.load_project(&project)?;
            for plan in &plans {
                println!(
                    "{}  {}  {}:{}  confidence {:.2}",
                    plan.issue_key,
                    plan.severity.as_str(),
                    plan.file_path,
                    plan.line_number,
                    plan.confidence_score
                );
            }
            info!(project, count = plans.len(), "plans listed");
        }
        PlansCommand::Show { project, issue_key } => {
            match store.load_plan(&project, &issue_key)? {
                Some(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
                None => bail!("no plan {issue_key} in project {project}"),
            }
        }
        PlansCommand::Stats => {
            let stats = store.stats()?;
            println!("total plans: {}", stats.total_plans);
            for (project, count) in &stats.plans_by_project {
                println!("  {project}: {count}");
            }
            for (severity, count) in &stats.plans_by_severity {
                println!("  {severity}: {count}");
            }
        }
    }
    Ok(())
}

fn quality_client(config: &HealerConfig) -> Result<SonarClient> {
    let server = config
        .quality_server
        .clone()
        .context("quality server not configured (set HEALER_SONAR_URL and HEALER_SONAR_PROJECT)")?;
    Ok(SonarClient::new(server)?)
}

async fn issues(config: HealerConfig, severities: &[Severity]) -> Result<()> {
    let client = quality_client(&config)?;
    client.test_connection().await?;
    let issues = client.fetch_issues(severities).await?;
    println!("{}", serde_json::to_string_pretty(&issues)?);
    Ok(())
}

async fn propose(config: HealerConfig, fallback: bool, severities: &[Severity]) -> Result<()> {
    let client = quality_client(&config)?;
    let project = client.project_key().to_string();
    let chosen: Vec<Severity> = if severities.is_empty() {
        DEFAULT_SEVERITIES.to_vec()
    } else {
        severities.to_vec()
    };
    let issues = client.fetch_issues(&chosen).await?;
    if issues.is_empty() {
        info!(project, "no open issues");
        return Ok(());
    }

    let proposer = if fallback {
        RuleBasedProposer::new().with_fallback()
    } else {
        RuleBasedProposer::new()
    };
    let plans = propose_all(&proposer, &issues).await?;
    if plans.is_empty() {
        info!(project, issues = issues.len(), "no applicable fix recipes");
        return Ok(());
    }

    let store = PlanStore::new(&config.plans_dir);
    store.save(&project, &plans)?;
    println!(
        "stored {} fix plans for {} (from {} issues)",
        plans.len(),
        project,
        issues.len()
    );
    Ok(())
}
