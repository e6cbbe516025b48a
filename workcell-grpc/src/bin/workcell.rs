//! Workcell CLI - inspect skills, processes, blackboards and logs of a solution

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workcell::logs::acquisition_time;
use workcell::BehaviorTree;
use workcell_grpc::output::{
    LogSourceSummary, ProcessSummary, SkillDetail, SkillSummary, TreeCheck,
};
use workcell_grpc::{ClientConfig, Solution};

const DEFAULT_CONFIG_PATH: &str = "config/workcell.yaml";

#[derive(Parser)]
#[command(name = "workcell")]
#[command(about = "Inspect and manage the skills and processes of a robot solution")]
#[command(version)]
struct Args {
    /// Path to the client configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Installed skills
    #[command(subcommand)]
    Skills(SkillsCommand),
    /// Behavior trees stored in the solution
    #[command(subcommand)]
    Processes(ProcessesCommand),
    /// Behavior tree files
    #[command(subcommand)]
    Tree(TreeCommand),
    /// Blackboard of a running operation
    #[command(subcommand)]
    Blackboard(BlackboardCommand),
    /// Structured logs
    #[command(subcommand)]
    Logs(LogsCommand),
}

#[derive(Subcommand)]
enum SkillsCommand {
    List,
    Show { id: String },
}

#[derive(Subcommand)]
enum ProcessesCommand {
    List,
    Get {
        name: String,
        /// Write the binary tree to this file instead of printing a summary
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Delete { name: String },
}

#[derive(Subcommand)]
enum TreeCommand {
    /// Decode a binary behavior tree and validate its ids
    Check { file: PathBuf },
}

#[derive(Subcommand)]
enum BlackboardCommand {
    List {
        #[arg(long)]
        operation: String,
        #[arg(long)]
        scope: Option<String>,
    },
}

#[derive(Subcommand)]
enum LogsCommand {
    Sources,
}

impl Args {
    /// `--config`, then `WORKCELL_CONFIG`, then the default path if it exists.
    fn get_config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os("WORKCELL_CONFIG").map(PathBuf::from))
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            })
    }

    fn load_config(&self) -> Result<ClientConfig> {
        match self.get_config_path() {
            Some(path) => {
                info!("Using config: {}", path.display());
                ClientConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))
            }
            None => {
                info!("No config file found, using defaults");
                Ok(ClientConfig::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Command::Tree(TreeCommand::Check { file }) = &args.command {
        return check_tree(file, args.json);
    }

    let config = args.load_config()?;
    let solution = Solution::connect(config)
        .await
        .context("Failed to connect to solution")?;

    match args.command {
        Command::Skills(SkillsCommand::List) => list_skills(&solution, args.json),
        Command::Skills(SkillsCommand::Show { id }) => show_skill(&solution, &id, args.json),
        Command::Processes(ProcessesCommand::List) => list_processes(&solution, args.json).await,
        Command::Processes(ProcessesCommand::Get { name, out }) => {
            get_process(&solution, &name, out.as_deref(), args.json).await
        }
        Command::Processes(ProcessesCommand::Delete { name }) => {
            solution
                .processes()
                .delete(&name)
                .await
                .with_context(|| format!("Failed to delete process '{}'", name))?;
            info!("Deleted process '{}'", name);
            Ok(())
        }
        Command::Blackboard(BlackboardCommand::List { operation, scope }) => {
            let entries = solution
                .blackboard(operation)
                .list(scope.as_deref())
                .await
                .context("Failed to list blackboard values")?;
            for entry in entries {
                let type_url = entry.value.map(|v| v.type_url).unwrap_or_default();
                println!("{}\t{}\t{}", entry.scope, entry.key, type_url);
            }
            Ok(())
        }
        Command::Logs(LogsCommand::Sources) => list_log_sources(&solution, args.json).await,
        Command::Tree(_) => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_skills(solution: &Solution, json: bool) -> Result<()> {
    let mut summaries = Vec::new();
    for id in solution.skills().skill_ids() {
        match solution.skills().get(&id) {
            Ok(class) => summaries.push(SkillSummary::from_class(&class)),
            Err(e) => tracing::warn!("Skipping skill {}: {}", id, e),
        }
    }
    if json {
        return print_json(&summaries);
    }
    for summary in summaries {
        println!(
            "{}\t{}\t{}",
            summary.id,
            summary.version.as_deref().unwrap_or("-"),
            summary.description.lines().next().unwrap_or_default()
        );
    }
    Ok(())
}

fn show_skill(solution: &Solution, id: &str, json: bool) -> Result<()> {
    let class = solution
        .skills()
        .get(id)
        .with_context(|| format!("Unknown skill '{}'", id))?;
    if json {
        return print_json(&SkillDetail::from_class(&class));
    }
    print!("{}", class.doc());
    Ok(())
}

async fn list_processes(solution: &Solution, json: bool) -> Result<()> {
    let summaries: Vec<ProcessSummary> = solution
        .processes()
        .items()
        .await
        .context("Failed to list processes")?
        .iter()
        .map(|(name, tree)| ProcessSummary::from_tree(name, tree))
        .collect();
    if json {
        return print_json(&summaries);
    }
    for summary in summaries {
        println!(
            "{}\t{}\t{}\t{} nodes",
            summary.name,
            summary.storage,
            summary.version.as_deref().unwrap_or("-"),
            summary.node_count
        );
    }
    Ok(())
}

async fn get_process(solution: &Solution, name: &str, out: Option<&Path>, json: bool) -> Result<()> {
    let tree = solution
        .processes()
        .get(name)
        .await
        .with_context(|| format!("Failed to get process '{}'", name))?;
    if let Some(path) = out {
        std::fs::write(path, tree.to_bytes()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote '{}' to {}", name, path.display());
        return Ok(());
    }
    let summary = ProcessSummary::from_tree(name, &tree);
    if json {
        return print_json(&summary);
    }
    println!("{} ({}, {} nodes)", summary.name, summary.storage, summary.node_count);
    Ok(())
}

fn check_tree(file: &Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let tree = BehaviorTree::from_bytes(&bytes)
        .with_context(|| format!("{} is not a behavior tree", file.display()))?;
    let check = TreeCheck::of(&tree);
    if json {
        print_json(&check)?;
    } else {
        println!("{}: {} nodes", check.name, check.node_count);
        if let Some(error) = &check.error {
            println!("{}", error);
        }
    }
    if !check.ids_unique {
        anyhow::bail!("{} has duplicate ids", file.display());
    }
    Ok(())
}

async fn list_log_sources(solution: &Solution, json: bool) -> Result<()> {
    let logger = solution.data_logger();
    let sources = logger.list_sources().await.context("Failed to list log sources")?;
    let latest = join_all(sources.iter().map(|source| logger.get_most_recent_item(source))).await;
    let summaries: Vec<LogSourceSummary> = sources
        .into_iter()
        .zip(latest)
        .map(|(event_source, item)| LogSourceSummary {
            event_source,
            last_item_time: item
                .ok()
                .as_ref()
                .and_then(acquisition_time)
                .map(|t| t.to_rfc3339()),
        })
        .collect();
    if json {
        return print_json(&summaries);
    }
    for summary in summaries {
        println!(
            "{}\t{}",
            summary.event_source,
            summary.last_item_time.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
