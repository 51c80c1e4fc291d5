//! Report Formatting
//!
//! Renders findings and differences for people (coloured text) or for
//! machines (JSON records). The core never synthesizes a "clean" finding;
//! that happens here.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::builder::TreeBuilder;
use crate::cli::{OutputFormat, VerbosityLevel};
use crate::differ::{DiffSummary, Difference, DifferenceKind};
use crate::index::{PathKey, index};
use crate::rules::RuleSet;
use crate::validator::{Finding, Severity, validate};

/// Message shown in place of an empty finding list
pub const CLEAN_MESSAGE: &str = "No inconsistencies found.";

/// Message shown in place of an empty difference list
pub const IDENTICAL_MESSAGE: &str = "No differences found between the documents.";

/// Outcome of checking one document
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DocumentOutcome {
    /// The document parsed; these are its findings
    Validated { nodes: usize, findings: Vec<Finding> },
    /// The document did not parse; no findings are shown for it
    Failed { error: String },
}

/// Check result for one input document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub source: PathBuf,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

impl DocumentReport {
    /// Build, index and validate one document
    pub fn check(source: PathBuf, bytes: &[u8], builder: &TreeBuilder, rules: &RuleSet) -> Self {
        let outcome = match builder.build(bytes) {
            Ok(tree) => {
                let indexed = index(tree);
                DocumentOutcome::Validated {
                    nodes: indexed.len(),
                    findings: validate(&indexed, rules),
                }
            }
            Err(error) => {
                tracing::info!(source = %source.display(), %error, "document rejected");
                DocumentOutcome::Failed {
                    error: error.to_string(),
                }
            }
        };
        Self { source, outcome }
    }

    pub fn has_critical(&self) -> bool {
        match &self.outcome {
            DocumentOutcome::Validated { findings, .. } => findings.iter().any(Finding::is_critical),
            DocumentOutcome::Failed { .. } => false,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, DocumentOutcome::Failed { .. })
    }
}

#[derive(Serialize)]
struct DiffReport<'a> {
    left: &'a Path,
    right: &'a Path,
    summary: DiffSummary,
    differences: &'a [Difference],
}

/// Findings as they should be presented: a lone Info entry for a clean tree
pub fn presented_findings(findings: &[Finding]) -> Vec<Finding> {
    if findings.is_empty() {
        vec![Finding::new(PathKey::root(), CLEAN_MESSAGE, Severity::Info)]
    } else {
        findings.to_vec()
    }
}

/// Output formatter for check and diff results
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: format == OutputFormat::Human && atty::is(atty::Stream::Stdout),
        }
    }

    /// Formatter that never emits colour codes
    pub fn plain(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: false,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn severity_label(&self, severity: Severity) -> String {
        match severity {
            Severity::Critical => self.colorize("✗ CRITICAL", "31"),
            Severity::Warning => self.colorize("⚠ WARNING", "33"),
            Severity::Info => self.colorize("✓ INFO", "32"),
        }
    }

    pub fn format_finding(&self, finding: &Finding) -> String {
        format!(
            "{}  {}  {}",
            self.severity_label(finding.severity),
            finding.path,
            finding.message
        )
    }

    pub fn format_difference(&self, difference: &Difference) -> String {
        let value = |v: &Option<String>| v.clone().unwrap_or_else(|| "∅".to_string());
        match difference.kind {
            DifferenceKind::Added => format!(
                "{}  {}  {}",
                self.colorize("+ ADDED", "32"),
                difference.path,
                value(&difference.right_value)
            ),
            DifferenceKind::Removed => format!(
                "{}  {}  {}",
                self.colorize("- REMOVED", "31"),
                difference.path,
                value(&difference.left_value)
            ),
            DifferenceKind::Changed => format!(
                "{}  {}  {} → {}",
                self.colorize("~ CHANGED", "33"),
                difference.path,
                value(&difference.left_value),
                value(&difference.right_value)
            ),
        }
    }

    /// Render the results of `check` for several documents
    pub fn format_check(&self, reports: &[DocumentReport]) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Json => {
                let presented: Vec<DocumentReport> = reports
                    .iter()
                    .map(|report| match &report.outcome {
                        DocumentOutcome::Validated { nodes, findings } => DocumentReport {
                            source: report.source.clone(),
                            outcome: DocumentOutcome::Validated {
                                nodes: *nodes,
                                findings: presented_findings(findings),
                            },
                        },
                        DocumentOutcome::Failed { .. } => report.clone(),
                    })
                    .collect();
                serde_json::to_string_pretty(&presented)
            }
            OutputFormat::Human => {
                let mut output = String::new();
                for report in reports {
                    output.push_str(&self.format_document(report));
                }
                Ok(output)
            }
        }
    }

    fn format_document(&self, report: &DocumentReport) -> String {
        let mut output = String::new();
        let source = report.source.display();

        match &report.outcome {
            DocumentOutcome::Failed { error } => {
                output.push_str(&format!(
                    "{}  {} - {}\n",
                    self.colorize("⚠ ERROR", "33"),
                    source,
                    error
                ));
            }
            DocumentOutcome::Validated { nodes, findings } => {
                if self.verbosity == VerbosityLevel::Quiet {
                    for finding in findings.iter().filter(|f| f.is_critical()) {
                        output.push_str(&format!("{}: {}\n", source, self.format_finding(finding)));
                    }
                    return output;
                }

                output.push_str(&format!("{}\n", source));
                if self.verbosity >= VerbosityLevel::Verbose {
                    output.push_str(&format!("  Nodes: {}\n", nodes));
                }
                for finding in presented_findings(findings) {
                    output.push_str(&format!("  {}\n", self.format_finding(&finding)));
                }
            }
        }

        output
    }

    /// Render the result of `diff`
    pub fn format_diff(
        &self,
        left: &Path,
        right: &Path,
        differences: &[Difference],
    ) -> serde_json::Result<String> {
        let summary = DiffSummary::from_differences(differences);

        if self.format == OutputFormat::Json {
            return serde_json::to_string_pretty(&DiffReport {
                left,
                right,
                summary,
                differences,
            });
        }

        let mut output = String::new();
        if self.verbosity != VerbosityLevel::Quiet {
            output.push_str(&format!("{} → {}\n", left.display(), right.display()));
            if differences.is_empty() {
                output.push_str(&format!("  {}\n", IDENTICAL_MESSAGE));
            }
            for difference in differences {
                output.push_str(&format!("  {}\n", self.format_difference(difference)));
            }
        }
        output.push_str(&format!(
            "Added: {} Removed: {} Changed: {}\n",
            summary.added, summary.removed, summary.changed
        ));

        Ok(output)
    }
}
