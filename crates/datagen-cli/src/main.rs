mod pipeline;
mod registry;
mod toolchain;
mod workspace;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use datagen_codegen::{CodegenEngine, CodegenError, CodegenOptions};
use datagen_core::{Error as CoreError, collect_dg_dir};
use datagen_runtime::{Format, SinkKind};
use pipeline::{UnitReport, analyze_tree, render_report};
use registry::{RunContext, RunReport, RunSettings, init_logging, start_run, write_report};
use thiserror::Error;
use toolchain::{ToolchainError, binary_path, cargo_build, run_program};
use tracing::info;
use uuid::Uuid;
use workspace::{Settings, load_settings, write_bytes_atomic};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("workspace error: {0}")]
    Workspace(#[from] workspace::WorkspaceError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
    #[error("toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),
    #[error("{failed} unit(s) failed:\n{details}")]
    Units { failed: usize, details: String },
}

#[derive(Parser, Debug)]
#[command(name = "datagen", version, about = "Transpile .dg models into a data generator program")]
struct Cli {
    /// Settings file; defaults to ./datagen.toml when present.
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate records to files or stdout.
    Gen(GenArgs),
    /// Generate records and load them into the configured sinks.
    Execute(ExecuteArgs),
    /// Parse and validate the sources without generating anything.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// A .dg file or a directory of them.
    path: PathBuf,
    /// Write the generated crate without building or running it.
    #[arg(long)]
    noexec: bool,
    /// Where the generated crate is written.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
    /// Sink backends compiled into the program; repeatable.
    #[arg(long = "sink", value_name = "KIND", value_parser = parse_sink_name)]
    sinks: Vec<String>,
    /// Build the program with the release profile.
    #[arg(long)]
    release: bool,
}

#[derive(Args, Debug)]
struct GenArgs {
    #[command(flatten)]
    build: BuildArgs,
    /// Records per model, overriding each model's count.
    #[arg(short = 'n', long)]
    count: Option<usize>,
    /// Only generate models whose metadata tags match, as key=value pairs.
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,
    /// Output file or directory.
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,
    #[arg(short, long)]
    format: Option<Format>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct ExecuteArgs {
    #[command(flatten)]
    build: BuildArgs,
    /// JSON sink configuration.
    #[arg(short, long, value_name = "CONFIG")]
    config: PathBuf,
    #[arg(long)]
    seed: Option<u64>,
    /// Clear target tables before loading.
    #[arg(long)]
    clear: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// A .dg file or a directory of them.
    path: PathBuf,
}

fn parse_sink_name(value: &str) -> Result<String, String> {
    value
        .parse::<SinkKind>()
        .map(|kind| kind.as_str().to_string())
        .map_err(|_| format!("unsupported sink {value:?}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(cli.settings.as_deref())?;
    let verbose = cli.verbose;

    match cli.command {
        Command::Check(args) => run_check(args, verbose),
        Command::Gen(args) => {
            let forwarded = gen_arguments(&args, verbose);
            run_transpile("gen", args.build, forwarded, settings, verbose)
        }
        Command::Execute(args) => {
            let forwarded = execute_arguments(&args, verbose);
            run_transpile("execute", args.build, forwarded, settings, verbose)
        }
    }
}

fn run_check(args: CheckArgs, verbose: bool) -> Result<(), CliError> {
    init_logging(None, verbose)?;

    let tree = collect_dg_dir(&args.path)?;
    let analysis = analyze_tree(&args.path, &tree);
    for report in &analysis.reports {
        print!("{}", render_report(report));
    }

    let failures: Vec<&UnitReport> = analysis.failures().collect();
    if !failures.is_empty() {
        return Err(units_failed(&failures));
    }
    println!("{} unit(s) ok", analysis.reports.len());
    Ok(())
}

/// Artifacts gathered while a run progresses, kept for `report.json` even on failure.
#[derive(Default)]
struct RunOutcome {
    units: Vec<UnitReport>,
    files_written: Vec<PathBuf>,
    built: bool,
}

fn run_transpile(
    command: &str,
    build: BuildArgs,
    forwarded: Vec<String>,
    settings: Settings,
    verbose: bool,
) -> Result<(), CliError> {
    let BuildArgs {
        path,
        noexec,
        out_dir,
        sinks,
        release,
    } = build;

    let run_settings = RunSettings {
        input: path,
        output_dir: out_dir.unwrap_or(settings.output_dir),
        package_name: settings.package_name,
        sinks: if sinks.is_empty() { settings.sinks } else { sinks },
        release: release || settings.release,
        noexec,
        forwarded,
    };
    let options = CodegenOptions {
        package_name: run_settings.package_name.clone(),
        ..CodegenOptions::default()
    }
    .with_sink_names(&run_settings.sinks)?;

    let ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: Utc::now(),
        command: command.to_string(),
        run_dir: settings.run_dir,
        settings: run_settings,
    };
    let paths = start_run(&ctx)?;
    init_logging(Some(&paths.logs_path), verbose)?;

    info!(
        event = "run_started",
        run_id = %ctx.run_id,
        command = %ctx.command,
        input = %ctx.settings.input.display(),
        run_dir = %paths.root.display(),
        "run started"
    );

    let started = Instant::now();
    let mut outcome = RunOutcome::default();
    let result = transpile(&ctx, options, &settings.cargo, &mut outcome);

    let duration_ms = started.elapsed().as_millis() as u64;
    let report = RunReport {
        run_id: ctx.run_id.clone(),
        command: ctx.command.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        finished_at: Utc::now().to_rfc3339(),
        duration_ms,
        success: result.is_ok(),
        error: result.as_ref().err().map(ToString::to_string),
        units: outcome.units,
        files_written: outcome.files_written,
        built: outcome.built,
    };
    write_report(&paths, &report)?;

    info!(
        event = "run_finished",
        run_id = %ctx.run_id,
        success = report.success,
        duration_ms,
        report = %paths.report_path.display(),
        "run finished"
    );
    result
}

fn transpile(
    ctx: &RunContext,
    options: CodegenOptions,
    cargo: &str,
    outcome: &mut RunOutcome,
) -> Result<(), CliError> {
    let settings = &ctx.settings;
    let tree = collect_dg_dir(&settings.input)?;
    let analysis = analyze_tree(&settings.input, &tree);
    outcome.units = analysis.reports.clone();

    let failures: Vec<&UnitReport> = analysis.failures().collect();
    if !failures.is_empty() {
        return Err(units_failed(&failures));
    }

    let engine = CodegenEngine::new(options)?;
    let project = engine.generate(&analysis.models, &tree)?;
    outcome.files_written = project.write_to(&settings.output_dir, write_bytes_atomic)?;
    info!(
        files = outcome.files_written.len(),
        out_dir = %settings.output_dir.display(),
        "wrote generated crate"
    );

    if settings.noexec {
        return Ok(());
    }

    cargo_build(cargo, &settings.output_dir, settings.release)?;
    outcome.built = true;
    let binary = binary_path(&settings.output_dir, &settings.package_name, settings.release);
    run_program(&binary, &settings.forwarded)?;
    Ok(())
}

fn units_failed(failures: &[&UnitReport]) -> CliError {
    let details = failures
        .iter()
        .map(|report| format!("  - {}", report.failure_summary()))
        .collect::<Vec<_>>()
        .join("\n");
    CliError::Units {
        failed: failures.len(),
        details,
    }
}

fn gen_arguments(args: &GenArgs, verbose: bool) -> Vec<String> {
    let mut out = vec!["gen".to_string()];
    if verbose {
        out.push("-v".to_string());
    }
    if let Some(count) = args.count {
        out.extend(["-n".to_string(), count.to_string()]);
    }
    if let Some(tags) = &args.tags {
        out.extend(["-t".to_string(), tags.clone()]);
    }
    if let Some(output) = &args.output {
        out.extend(["-o".to_string(), output.display().to_string()]);
    }
    if let Some(format) = args.format {
        out.extend(["-f".to_string(), format.as_str().to_string()]);
    }
    if let Some(seed) = args.seed {
        out.extend(["--seed".to_string(), seed.to_string()]);
    }
    out
}

fn execute_arguments(args: &ExecuteArgs, verbose: bool) -> Vec<String> {
    let mut out = vec!["execute".to_string()];
    if verbose {
        out.push("-v".to_string());
    }
    out.extend(["-c".to_string(), args.config.display().to_string()]);
    if let Some(seed) = args.seed {
        out.extend(["--seed".to_string(), seed.to_string()]);
    }
    if args.clear {
        out.push("--clear".to_string());
    }
    out
}
