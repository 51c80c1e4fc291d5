use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical findings
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// JSON records
    Json,
}

/// Check and compare AUTOSAR-style configuration documents
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-arxml")]
#[command(about = "Validate configuration documents against a rule set and diff them by path")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(short = 'f', long = "format", value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (critical findings and summaries only)
    #[arg(
        short = 'q',
        long = "quiet",
        conflicts_with = "verbose",
        global = true
    )]
    pub quiet: bool,

    /// Tag suffix marking the child that names its parent
    #[arg(long = "identity-suffix", global = true)]
    pub identity_suffix: Option<String>,

    /// Required top-level tag (repeatable; replaces the configured set)
    #[arg(long = "require", action = ArgAction::Append, global = true)]
    pub required_tags: Vec<String>,

    /// Number of documents processed concurrently
    #[arg(short = 't', long = "threads", global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate one or more documents against the rule set
    Check {
        /// Documents to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Compare two documents path by path
    Diff {
        /// Reference document
        left: PathBuf,
        /// Document compared against the reference
        right: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose > 0 {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Input paths named by the subcommand
    pub fn inputs(&self) -> Vec<&PathBuf> {
        match &self.command {
            Command::Check { files } => files.iter().collect(),
            Command::Diff { left, right } => vec![left, right],
        }
    }

    /// Reject invocations that cannot run at all. A missing `check` input
    /// is not one of them: it is reported with the other documents.
    pub fn validate(&self) -> Result<(), String> {
        if let Command::Diff { left, right } = &self.command {
            for path in [left, right] {
                if !path.is_file() {
                    return Err(format!("File does not exist: {}", path.display()));
                }
            }
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Install the stderr log subscriber; `RUST_LOG` directives still apply
    pub fn setup_logging(&self) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }

    pub fn get_thread_count(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}
