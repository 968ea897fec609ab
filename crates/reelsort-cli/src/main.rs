//! Reelsort CLI - scans, analyses and cleans up TV and movie libraries.
//!
//! Analyses only write plan files; nothing on disk changes until a plan is
//! executed.

mod engine;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engine::{default_config_path, Engine};
use reelsort_core::plans::{AuditGenerator, ConsolidatePlan, DuplicatePlan, PlanKind};
use reelsort_core::scanner::ScanProgress;
use reelsort_core::{
    analyze_scattered, ActivityLogger, CancellationToken, DuplicateAnalyzer, EngineConfig,
    EventHandler, FileScanner, IndexingHandler, MediaType, MediaWatcher, PeriodicScanner,
    ScanOptions,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "reelsort")]
#[command(about = "Media library classification and duplicate cleanup")]
struct Args {
    /// Path to config.json (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every configured library root
    Scan,
    /// Watch libraries and rescan intake folders until Ctrl-C
    Watch,
    /// Find copies of the same movie or episode
    Duplicates {
        /// Write the plan to duplicates.json
        #[arg(long)]
        save: bool,
    },
    /// Find titles spread across library roots
    Consolidate {
        /// Write the plan to consolidate.json
        #[arg(long)]
        save: bool,
    },
    /// Manage saved plans
    Plans {
        #[command(subcommand)]
        action: PlansCommand,
    },
    /// Review low-confidence files with the AI
    Audit {
        #[command(subcommand)]
        action: AuditCommand,
    },
    /// Show index and plan state
    Status,
}

#[derive(Subcommand, Debug)]
enum PlansCommand {
    /// Rename a plan to <name>.json.old
    Archive { kind: PlanKind },
    /// Remove a plan file
    Delete { kind: PlanKind },
    /// Delete the redundant copies listed in duplicates.json
    ExecuteDuplicates {
        #[arg(long)]
        dry_run: bool,
    },
    /// Move scattered files to the target roots listed in consolidate.json
    ExecuteConsolidate {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Build audit.json from files below a confidence threshold
    Generate {
        #[arg(long, default_value = "0.8")]
        threshold: f64,
        #[arg(long, default_value = "100")]
        limit: usize,
    },
    /// Apply the actions in audit.json
    Execute {
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug, args.json_logs);

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = EngineConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    info!("Data directory: {}", config.paths.data_dir.display());

    let engine = Engine::open(config)?;

    match args.command {
        Command::Scan => scan(&engine).await,
        Command::Watch => watch(&engine).await,
        Command::Duplicates { save } => duplicates(&engine, save),
        Command::Consolidate { save } => consolidate(&engine, save),
        Command::Plans { action } => plans(&engine, action),
        Command::Audit { action } => audit(&engine, action).await,
        Command::Status => status(&engine, config_path),
    }
}

fn init_logging(debug: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// Reports go to stdout, logs to stderr.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            token.cancel();
        }
    });
    cancel
}

async fn scan(engine: &Engine) -> Result<()> {
    let options = ScanOptions::from_libraries(&engine.config.libraries)
        .with_progress(Arc::new(|p: &ScanProgress| {
            if !p.current_path.as_os_str().is_empty() {
                info!(
                    "[{}/{}] {} files, at {}",
                    p.libraries_done,
                    p.libraries_total,
                    p.files_scanned,
                    p.current_path.display()
                );
            }
        }))
        .with_cancel(cancel_on_ctrl_c());

    let scanner = FileScanner::new(engine.index.clone(), engine.pipeline.clone());
    let result = scanner.scan_with_options(&options).await?;
    if let Err(e) = engine.index.checkpoint_wal() {
        warn!("WAL checkpoint failed: {}", e);
    }
    print_json(&result)
}

async fn watch(engine: &Engine) -> Result<()> {
    let config = &engine.config;
    let activity = Arc::new(ActivityLogger::new(config.paths.activity_dir())?);
    let handler: Arc<dyn EventHandler> = Arc::new(IndexingHandler::new(
        engine.index.clone(),
        engine.pipeline.clone(),
        config.libraries.clone(),
        Some(activity),
    ));

    let roots: Vec<PathBuf> = engine
        .library_roots()
        .into_iter()
        .chain(config.periodic.watch_paths.iter().cloned())
        .filter(|root| {
            let ok = root.is_dir();
            if !ok {
                warn!("Not watching missing directory {}", root.display());
            }
            ok
        })
        .collect();
    let watcher = MediaWatcher::new(&roots, handler.clone())?;

    let cancel = cancel_on_ctrl_c();
    if config.periodic.enabled {
        let periodic = PeriodicScanner::new(
            handler,
            config.periodic.watch_paths.clone(),
            config.paths.activity_dir(),
            config.periodic.interval(),
        );
        periodic.run(cancel.clone()).await;
        if let Some(error) = periodic.status().last_error {
            warn!("Last periodic scan failed: {}", error);
        }
    } else {
        cancel.cancelled().await;
    }

    watcher.stop().await;
    Ok(())
}

fn duplicates(engine: &Engine, save: bool) -> Result<()> {
    let analysis = DuplicateAnalyzer::new(engine.index.clone()).analyze()?;
    let plan = DuplicatePlan::from_analysis(&analysis);
    if save {
        let path = engine.plans.save_duplicates(&plan)?;
        info!("Plan written to {}", path.display());
    }
    print_json(&plan)
}

fn consolidate(engine: &Engine, save: bool) -> Result<()> {
    let analysis = analyze_scattered(&engine.index)?;
    let plan = ConsolidatePlan::from_analysis(&analysis);
    if save {
        let path = engine.plans.save_consolidate(&plan)?;
        info!("Plan written to {}", path.display());
    }
    print_json(&plan)
}

fn plans(engine: &Engine, action: PlansCommand) -> Result<()> {
    match action {
        PlansCommand::Archive { kind } => {
            if !engine.plans.archive(kind)? {
                info!("No {} plan to archive", kind);
            }
        }
        PlansCommand::Delete { kind } => engine.plans.delete(kind)?,
        PlansCommand::ExecuteDuplicates { dry_run } => {
            let Some(plan) = engine.plans.load_duplicates()? else {
                bail!("no duplicates plan; run `reelsort duplicates --save` first");
            };
            let report = engine.executor()?.execute_duplicates(&plan, dry_run);
            print_json(&report.outcomes)?;
            if report.failed() > 0 {
                bail!("{} of {} deletes failed", report.failed(), plan.plans.len());
            }
            if !dry_run {
                engine.plans.archive(PlanKind::Duplicates)?;
            }
        }
        PlansCommand::ExecuteConsolidate { dry_run } => {
            let Some(plan) = engine.plans.load_consolidate()? else {
                bail!("no consolidation plan; run `reelsort consolidate --save` first");
            };
            let report = engine.executor()?.execute_consolidate(&plan, dry_run);
            print_json(&report.outcomes)?;
            for (conflict_id, error) in &report.failures {
                warn!("Conflict {} move failed: {}", conflict_id, error);
            }
            if report.failed() > 0 {
                bail!(
                    "{} of {} moves failed",
                    report.failed(),
                    plan.summary.total_moves
                );
            }
            if !dry_run {
                engine.plans.archive(PlanKind::Consolidate)?;
            }
        }
    }
    Ok(())
}

async fn audit(engine: &Engine, action: AuditCommand) -> Result<()> {
    match action {
        AuditCommand::Generate { threshold, limit } => {
            let Some(ai) = engine.ai.clone() else {
                bail!("audit needs the AI fallback; set ai.enabled in the config");
            };
            let generator = AuditGenerator::new(
                engine.index.clone(),
                ai,
                engine.config.ai.confidence_threshold,
            );
            let plan = generator.generate(threshold, limit).await?;
            let path = engine.plans.save_audit(&plan)?;
            info!("Plan written to {}", path.display());
            print_json(&plan.summary)
        }
        AuditCommand::Execute { dry_run } => {
            let Some(plan) = engine.plans.load_audit()? else {
                bail!("no audit plan; run `reelsort audit generate` first");
            };
            let report = engine.executor()?.execute_plan(&plan, dry_run);
            print_json(&report.outcomes)?;
            for (id, error) in &report.failures {
                warn!("Item {} failed: {}", id, error);
            }
            if report.failed() > 0 {
                bail!("{} of {} actions failed", report.failed(), plan.actions.len());
            }
            if !dry_run {
                engine.plans.archive(PlanKind::Audit)?;
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct StatusReport {
    config_path: PathBuf,
    database: PathBuf,
    movies: usize,
    episodes: usize,
    ai_enabled: bool,
    ai_circuit: Option<String>,
    plans: Vec<PlanStatus>,
}

#[derive(Serialize)]
struct PlanStatus {
    kind: String,
    present: bool,
}

fn status(engine: &Engine, config_path: PathBuf) -> Result<()> {
    let report = StatusReport {
        config_path,
        database: engine.config.paths.database_path(),
        movies: engine.index.count_by_type(MediaType::Movie)?,
        episodes: engine.index.count_by_type(MediaType::Episode)?,
        ai_enabled: engine.ai.is_some(),
        ai_circuit: engine.ai.as_ref().map(|ai| ai.breaker().state().to_string()),
        plans: PlanKind::ALL
            .iter()
            .map(|kind| PlanStatus {
                kind: kind.to_string(),
                present: engine.plans.path(*kind).exists(),
            })
            .collect(),
    };
    print_json(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::parse_from(["reelsort", "--debug", "duplicates", "--save"]);
        assert!(args.debug);
        assert!(matches!(args.command, Command::Duplicates { save: true }));

        let args = Args::parse_from(["reelsort", "plans", "archive", "audit"]);
        assert!(matches!(
            args.command,
            Command::Plans {
                action: PlansCommand::Archive {
                    kind: PlanKind::Audit
                }
            }
        ));

        let args = Args::parse_from(["reelsort", "plans", "execute-consolidate", "--dry-run"]);
        assert!(matches!(
            args.command,
            Command::Plans {
                action: PlansCommand::ExecuteConsolidate { dry_run: true }
            }
        ));

        let args = Args::parse_from(["reelsort", "audit", "execute", "--dry-run"]);
        assert!(matches!(
            args.command,
            Command::Audit {
                action: AuditCommand::Execute { dry_run: true }
            }
        ));
    }
}
