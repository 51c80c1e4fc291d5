use crate::cli::VerbosityLevel;
use crate::config::ConfigError;
use crate::error::{AppError, ParseError};
use crate::output::DocumentReport;
use crate::rules::RuleError;

/// Error reporter with configurable verbosity
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
}

impl ErrorReporter {
    /// Create a new error reporter with specified verbosity
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Report an application error on stderr
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.format_error(error));
    }

    /// Report a summary of check results on stderr
    pub fn report_summary(&self, summary: &CheckSummary) {
        if let Some(formatted) = self.format_summary(summary) {
            eprintln!("{}", formatted);
        }
    }

    /// Format an error according to verbosity
    pub fn format_error(&self, error: &AppError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => self.format_error_brief(error),
            VerbosityLevel::Normal => self.format_error_normal(error),
            VerbosityLevel::Verbose => self.format_error_verbose(error),
        }
    }

    pub fn format_summary(&self, summary: &CheckSummary) -> Option<String> {
        match self.verbosity {
            VerbosityLevel::Quiet => (summary.critical_count > 0 || summary.failed_count > 0)
                .then(|| {
                    format!(
                        "Critical: {} Failed: {}",
                        summary.critical_count, summary.failed_count
                    )
                }),
            VerbosityLevel::Normal => Some(format!(
                "Check Summary:\n  Total files: {}\n  Clean: {}\n  With critical findings: {}\n  Failed to parse: {}",
                summary.total_files, summary.clean_count, summary.critical_count, summary.failed_count
            )),
            VerbosityLevel::Verbose => Some(format!(
                "Check Summary:\n  Total files processed: {}\n  Clean files: {}\n  Files with critical findings: {}\n  Files that failed to parse: {}\n  Findings reported: {}\n  Duration: {:?}",
                summary.total_files,
                summary.clean_count,
                summary.critical_count,
                summary.failed_count,
                summary.finding_count,
                summary.duration
            )),
        }
    }

    /// Format error for brief output (quiet mode)
    fn format_error_brief(&self, error: &AppError) -> String {
        match error {
            AppError::Parse { file, .. } => format!("INVALID: {}", file.display()),
            AppError::Io { path, .. } => format!("UNREADABLE: {}", path.display()),
            _ => format!("ERROR: {}", error),
        }
    }

    fn format_error_normal(&self, error: &AppError) -> String {
        match error {
            AppError::Config(config_error) => format!(
                "Configuration Error: {}\n{}",
                config_error,
                self.get_config_help(config_error)
            ),
            _ => error.to_string(),
        }
    }

    /// Format error with suggestions and the full source chain
    fn format_error_verbose(&self, error: &AppError) -> String {
        let mut output = self.format_error_normal(error);

        match error {
            AppError::Parse { file, source } => {
                output.push_str(&format!("\nFile: {}", file.display()));
                output.push_str(&format!("\nSuggestion: {}", self.get_parse_help(source)));
            }
            AppError::Io { path, .. } => {
                output.push_str(&format!(
                    "\nSuggestion: Check that {} exists and is readable",
                    path.display()
                ));
            }
            AppError::Rule(rule_error) => {
                output.push_str(&format!("\nSuggestion: {}", self.get_rule_help(rule_error)));
            }
            AppError::Config(_) => {}
        }

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }

    fn get_parse_help(&self, error: &ParseError) -> &'static str {
        match error {
            ParseError::Syntax { .. } => "Check that every element is closed and properly nested",
            ParseError::Empty => "The document contains no markup; check the file was written completely",
            ParseError::Encoding(_) => "Re-save the document as UTF-8 or UTF-16",
        }
    }

    fn get_rule_help(&self, error: &RuleError) -> String {
        match error {
            RuleError::InvalidPattern { id, .. } => {
                format!("Fix the regular expression of rule '{}'", id)
            }
            RuleError::EmptyField { id, field } => {
                format!("Add at least one entry to '{}' of rule '{}'", field, id)
            }
        }
    }

    /// Get helpful suggestions for configuration errors
    fn get_config_help(&self, error: &ConfigError) -> String {
        match error {
            ConfigError::Io(_) => "Check that the configuration file exists and is readable".to_string(),
            ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
                "Check the configuration file syntax (TOML/JSON format expected)".to_string()
            }
            ConfigError::UnsupportedFormat(ext) => {
                format!("Rename the configuration file: '.{}' is not supported, use .toml or .json", ext)
            }
            ConfigError::Environment(_) => {
                "Fix or unset the VALIDATE_ARXML_* environment variable".to_string()
            }
            ConfigError::Validation(_) => {
                "Resolve conflicting configuration values between file, environment, and CLI"
                    .to_string()
            }
        }
    }
}

/// Summary of check results for reporting
#[derive(Debug, Clone, Default)]
pub struct CheckSummary {
    pub total_files: usize,
    pub clean_count: usize,
    pub critical_count: usize,
    pub failed_count: usize,
    pub finding_count: usize,
    pub duration: std::time::Duration,
}

impl CheckSummary {
    pub fn from_reports(reports: &[DocumentReport], duration: std::time::Duration) -> Self {
        use crate::output::DocumentOutcome;

        let mut summary = Self {
            total_files: reports.len(),
            duration,
            ..Self::default()
        };

        for report in reports {
            match &report.outcome {
                DocumentOutcome::Failed { .. } => summary.failed_count += 1,
                DocumentOutcome::Validated { findings, .. } => {
                    summary.finding_count += findings.len();
                    if findings.is_empty() {
                        summary.clean_count += 1;
                    }
                    if report.has_critical() {
                        summary.critical_count += 1;
                    }
                }
            }
        }

        summary
    }

    /// Check passed: nothing failed to parse and nothing critical was found
    pub fn is_successful(&self) -> bool {
        self.failed_count == 0 && self.critical_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PathKey;
    use crate::output::DocumentOutcome;
    use crate::validator::{Finding, Severity};
    use std::path::PathBuf;
    use std::time::Duration;

    fn parse_error() -> AppError {
        AppError::Parse {
            file: PathBuf::from("ecu.arxml"),
            source: ParseError::Empty,
        }
    }

    #[test]
    fn test_error_formatting_by_verbosity() {
        let error = parse_error();

        let quiet = ErrorReporter::new(VerbosityLevel::Quiet).format_error(&error);
        assert_eq!(quiet, "INVALID: ecu.arxml");

        let normal = ErrorReporter::new(VerbosityLevel::Normal).format_error(&error);
        assert_eq!(normal, "Failed to parse ecu.arxml: Document is empty");

        let verbose = ErrorReporter::new(VerbosityLevel::Verbose).format_error(&error);
        assert!(verbose.contains("Suggestion:"));
        assert!(verbose.contains("Error Chain:\n  1: Document is empty"));
    }

    #[test]
    fn test_config_error_help() {
        let error = AppError::Config(ConfigError::UnsupportedFormat("yaml".to_string()));
        let formatted = ErrorReporter::new(VerbosityLevel::Normal).format_error(&error);
        assert!(formatted.starts_with("Configuration Error:"));
        assert!(formatted.contains(".toml or .json"));
    }

    #[test]
    fn test_check_summary_from_reports() {
        let critical = Finding::new(PathKey::root(), "Missing required configuration: ECU", Severity::Critical);
        let warning = Finding::new(PathKey::root(), "minor", Severity::Warning);
        let reports = vec![
            DocumentReport {
                source: PathBuf::from("clean.arxml"),
                outcome: DocumentOutcome::Validated { nodes: 5, findings: vec![] },
            },
            DocumentReport {
                source: PathBuf::from("bad.arxml"),
                outcome: DocumentOutcome::Validated { nodes: 1, findings: vec![critical, warning] },
            },
            DocumentReport {
                source: PathBuf::from("broken.arxml"),
                outcome: DocumentOutcome::Failed { error: "Document is empty".to_string() },
            },
        ];

        let summary = CheckSummary::from_reports(&reports, Duration::from_millis(3));
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.clean_count, 1);
        assert_eq!(summary.critical_count, 1);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.finding_count, 2);
        assert!(!summary.is_successful());
    }

    #[test]
    fn test_quiet_summary_only_when_something_is_wrong() {
        let reporter = ErrorReporter::new(VerbosityLevel::Quiet);
        assert!(reporter.format_summary(&CheckSummary::default()).is_none());

        let summary = CheckSummary {
            critical_count: 2,
            ..CheckSummary::default()
        };
        assert_eq!(
            reporter.format_summary(&summary).as_deref(),
            Some("Critical: 2 Failed: 0")
        );
    }
}
