mod commands;
mod logging;
mod progress;

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use cbin_core::config::{self as core_config, AppConfig};
use cbin_core::{HostIdentity, JournalLocks, RecycleOutcome, Recycler, Restorer, StagingRoot};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, ListArgs, RecycleArgs, RestoreArgs};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};

const EXIT_FAILURES: i32 = 1;
const EXIT_FATAL: i32 = 2;

/// Everything resolved before a command can run.
struct Setup {
    config_path: PathBuf,
    config: AppConfig,
    host: HostIdentity,
    root: StagingRoot,
}

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let config_path = args.config.clone();
    let Some(command) = args.into_command() else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let setup = prepare(config_path);
    let _guards = logging::init_logger(setup.as_ref().ok().map(|s| s.root.path()));

    let setup = match setup {
        Ok(setup) => setup,
        Err(err) => {
            error!("Error during startup: {:#}", err);
            process::exit(EXIT_FATAL);
        }
    };

    let result = match command {
        Commands::Recycle(recycle_args) => run_recycle(&setup, &recycle_args),
        Commands::Restore(restore_args) => run_restore(&setup, &restore_args),
        Commands::List(list_args) => run_list(&setup, &list_args),
        Commands::PrintConfig => {
            println!("Configuration file: {}", setup.config_path.display());
            println!("Configuration: {:?}", setup.config);
            println!("Host: {}", setup.host.dir_name());
            println!("Staging root: {}", setup.root.path().display());
            Ok(true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_FAILURES),
        Err(err) => {
            error!("Error: {:#}", err);
            process::exit(EXIT_FATAL);
        }
    }
}

fn prepare(explicit_config: Option<PathBuf>) -> Result<Setup> {
    let config_path = core_config::config_path(explicit_config.as_deref());
    let config = core_config::load_configuration(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let host = HostIdentity::resolve().context("resolving host identity")?;
    let root = StagingRoot::for_host(&config.recycle_bin_dir, &host)
        .context("opening the recycle bin")?;

    Ok(Setup {
        config_path,
        config,
        host,
        root,
    })
}

/// Returns `Ok(false)` when at least one target failed.
fn run_recycle(setup: &Setup, args: &RecycleArgs) -> Result<bool> {
    let targets = args.targets();
    if targets.is_empty() {
        bail!("no files specified; pass paths or -f file1,file2");
    }

    let workers = args.workers.unwrap_or(setup.config.num_workers);
    let recycler = Recycler::new(setup.root.clone(), JournalLocks::new());
    let reporter = CliReporter::new();
    let report = recycler.recycle(&targets, workers, &reporter)?;

    for outcome in &report.outcomes {
        match outcome {
            RecycleOutcome::PartiallyRecycled { entry, source_error } => eprintln!(
                "  {} {} copied to the recycle bin but not removed: {}",
                "!".yellow(),
                entry.original_path.display(),
                source_error
            ),
            RecycleOutcome::Failed { target, error } => {
                eprintln!("  {} {}: {}", "✗".red(), target, error)
            }
            _ => {}
        }
    }

    println!();
    info!(
        "{} recycled, {} partially recycled, {} skipped, {} failed",
        format!("{}", report.recycled()).green(),
        format!("{}", report.partial()).yellow(),
        format!("{}", report.skipped()).cyan(),
        format!("{}", report.failed()).red(),
    );

    Ok(!report.has_failures())
}

fn run_restore(setup: &Setup, args: &RestoreArgs) -> Result<bool> {
    let restorer = Restorer::new(setup.root.clone(), JournalLocks::new());
    let report = restorer.restore(args.date.as_deref(), args.single_file.as_deref())?;

    for entry in &report.restored {
        println!("  {} {}", "✓".green(), entry.original_path.display());
    }
    if report.restored.is_empty() {
        match &args.single_file {
            Some(name) => println!("No restorable file named {} found", name),
            None => println!("Nothing to restore"),
        }
    }

    info!(
        "{} restored, {} skipped, {} failed, {} left in the recycle bin",
        format!("{}", report.restored.len()).green(),
        format!("{}", report.skipped).cyan(),
        format!("{}", report.failed).red(),
        format!("{}", report.left_in_bin).yellow(),
    );

    Ok(report.failed == 0)
}

fn run_list(setup: &Setup, args: &ListArgs) -> Result<bool> {
    let restorer = Restorer::new(setup.root.clone(), JournalLocks::new());
    let listing = restorer.list(args.date.as_deref())?;

    if listing.is_empty() {
        println!("The recycle bin is empty");
    }
    for (date, entries) in listing {
        println!("{}", date.to_string().bold());
        for entry in entries {
            println!(
                "  {}  {}  {:>10}  {}  {}",
                entry.deleted_at.format("%H:%M:%S"),
                entry.current_name.cyan(),
                entry.file_size,
                entry.file_type.dimmed(),
                entry.original_path.display()
            );
        }
    }

    Ok(true)
}
