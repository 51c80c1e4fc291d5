use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use rayon::prelude::*;

use validate_arxml::{
    AppError, CheckSummary, Cli, Command, Config, ConfigManager, DocumentOutcome, DocumentReport,
    ErrorReporter, Output, TreeBuilder, VerbosityLevel, diff, index,
};

/// Everything checked out
const EXIT_CLEAN: u8 = 0;
/// A critical finding or a difference was reported
const EXIT_FINDINGS: u8 = 1;
/// A document could not be read or parsed, or the invocation was invalid
const EXIT_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    cli.setup_logging();

    let reporter = ErrorReporter::new(cli.verbosity());
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            match error.downcast_ref::<AppError>() {
                Some(app_error) => reporter.report_error(app_error),
                None => eprintln!("Error: {:#}", error),
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    cli.validate().map_err(anyhow::Error::msg)?;

    let config = ConfigManager::load_config(&cli).await.map_err(AppError::from)?;
    tracing::debug!(?config, "configuration loaded");

    let verbosity = if config.output.quiet {
        VerbosityLevel::Quiet
    } else if config.output.verbose {
        VerbosityLevel::Verbose
    } else {
        VerbosityLevel::Normal
    };
    let output = Output::new(verbosity, config.output.format.into());

    match &cli.command {
        Command::Check { files } => run_check(&cli, &config, files, &output, verbosity).await,
        Command::Diff { left, right } => run_diff(&config, left, right, &output).await,
    }
}

async fn read_document(path: &Path) -> Result<Vec<u8>, AppError> {
    tokio::fs::read(path).await.map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn run_check(
    cli: &Cli,
    config: &Config,
    files: &[PathBuf],
    output: &Output,
    verbosity: VerbosityLevel,
) -> anyhow::Result<u8> {
    let started = Instant::now();
    let reporter = ErrorReporter::new(verbosity);
    let builder = ConfigManager::tree_builder(config);
    let rules = ConfigManager::rule_set(config).map_err(AppError::from)?;

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let bytes = read_document(path).await;
        if let Err(error) = &bytes {
            tracing::warn!(%error, "skipping unreadable document");
        }
        documents.push((path.clone(), bytes));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cli.get_thread_count())
        .build()
        .context("failed to start worker threads")?;
    tracing::info!(files = files.len(), threads = pool.current_num_threads(), "checking documents");

    let reports: Vec<DocumentReport> = tokio::task::spawn_blocking(move || {
        pool.install(|| {
            documents
                .into_par_iter()
                .map(|(source, bytes)| match bytes {
                    Ok(bytes) => DocumentReport::check(source, &bytes, &builder, &rules),
                    Err(error) => DocumentReport {
                        source,
                        outcome: DocumentOutcome::Failed {
                            error: error.to_string(),
                        },
                    },
                })
                .collect()
        })
    })
    .await
    .context("check worker panicked")?;

    print!("{}", output.format_check(&reports)?);

    let summary = CheckSummary::from_reports(&reports, started.elapsed());
    reporter.report_summary(&summary);

    Ok(if summary.failed_count > 0 {
        EXIT_FAILURE
    } else if summary.critical_count > 0 {
        EXIT_FINDINGS
    } else {
        EXIT_CLEAN
    })
}

async fn run_diff(config: &Config, left: &Path, right: &Path, output: &Output) -> anyhow::Result<u8> {
    let builder = ConfigManager::tree_builder(config);

    let left_tree = index(parse_document(&builder, left).await?);
    let right_tree = index(parse_document(&builder, right).await?);

    let differences = diff(&left_tree, &right_tree);
    print!("{}", output.format_diff(left, right, &differences)?);

    Ok(if differences.is_empty() {
        EXIT_CLEAN
    } else {
        EXIT_FINDINGS
    })
}

async fn parse_document(
    builder: &TreeBuilder,
    path: &Path,
) -> Result<validate_arxml::ConfigTree, AppError> {
    let bytes = read_document(path).await?;
    builder.build(&bytes).map_err(|source| AppError::Parse {
        file: path.to_path_buf(),
        source,
    })
}
