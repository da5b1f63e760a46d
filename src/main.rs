mod cli;

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::commands::{Cli, Commands, SweepArgs};
use cli::progress::CliReporter;
use cli::prompt::prompt_confirm;
use colored::*;
use dotenv::dotenv;
use indicatif::HumanBytes;
use tracing::{error, info, warn};
use vmdk_sweep::actions::MARK_DATE_FORMAT;
use vmdk_sweep::{ActionMode, AppConfig, CsvReportWriter, FsPlatform, SweepEngine};

fn main() {
    dotenv().ok();

    let guard = cli::logging::init_logger();

    let config = match vmdk_sweep::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            drop(guard);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Sweep(sweep_args)) => {
            if let Err(err) = run_sweep(&config, &sweep_args) {
                error!("Error: {:#}", err);
                drop(guard);
                process::exit(1);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }
}

fn run_sweep(config: &AppConfig, args: &SweepArgs) -> anyhow::Result<()> {
    let platform = FsPlatform::open(&args.server)
        .with_context(|| format!("connecting to {}", args.server.display()))?;
    info!(
        location = %args.location,
        mode = %args.action,
        server = %args.server.display(),
        "Starting sweep"
    );

    if args.action == ActionMode::Delete && !args.yes {
        let confirmed = prompt_confirm(
            &format!(
                "Permanently delete orphaned disks in '{}'?",
                args.location
            ),
            Some(false),
        )?;
        if !confirmed {
            info!("Delete not confirmed, nothing done");
            return Ok(());
        }
    }

    let run_date = chrono::Local::now().date_naive();
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| config.report_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_report_dir);
    let report_path = output_dir.join(format!(
        "{}-orphaned-disks-{}.csv",
        args.location,
        run_date.format(MARK_DATE_FORMAT)
    ));
    let writer = CsvReportWriter::new(&report_path);

    let engine = SweepEngine::new(&platform, config.clone(), &args.location)
        .with_mode(args.action)
        .with_run_date(run_date)
        .with_report_writer(&writer);
    let reporter = CliReporter::new();
    let result = engine
        .sweep(&reporter)
        .with_context(|| format!("sweeping '{}' (report: {})", args.location, report_path.display()))?;

    println!();
    info!(
        "Snapshot: {}, Enumerate: {}, Actions: {}",
        format!("{:.2}s", result.snapshot_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.enumerate_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.action_duration.as_secs_f64()).green(),
    );
    info!(
        "{} disk files, {} referenced, {} excluded, {} orphaned ({})",
        result.records_enumerated,
        result.still_referenced,
        result.excluded,
        format!("{}", result.report.len()).red(),
        format!("{}", HumanBytes(result.report.total_bytes())).red(),
    );
    if result.report.failed() > 0 {
        warn!(
            "{} of {} {} actions failed, see {}",
            format!("{}", result.report.failed()).red(),
            result.report.len(),
            args.action,
            report_path.display()
        );
    }
    if !result.volume_failures.is_empty() {
        warn!(
            "{} datastores could not be searched",
            format!("{}", result.volume_failures.len()).yellow()
        );
    }
    info!("Report written to {}", report_path.display().to_string().cyan());

    Ok(())
}

fn default_report_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vmdk-sweep")
}
