//! Validator
//!
//! Runs an ordered rule sequence over an indexed tree. Rules execute in the
//! given order and their findings are concatenated in that order, so the
//! same tree and rules always yield the same list. A structurally empty tree
//! still goes through every rule.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::index::{IndexedTree, PathKey};
use crate::rules::Rule;

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// One validation issue at a given path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub path: PathKey,
    pub message: String,
    pub severity: Severity,
}

impl Finding {
    pub fn new(path: PathKey, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            path,
            message: message.into(),
            severity,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Run `rules` against `tree` in order.
///
/// Returns an empty list for a clean tree; rendering "clean" is up to the
/// caller. Rules are assumed well-formed: a rule that panics is a caller bug.
pub fn validate(tree: &IndexedTree, rules: &[Box<dyn Rule>]) -> Vec<Finding> {
    if tree.tree().is_structurally_empty() {
        tracing::debug!("validating structurally empty tree");
    }

    let mut findings = Vec::new();
    for rule in rules {
        let found = rule.check(tree);
        tracing::debug!(rule = rule.id(), findings = found.len(), "rule checked");
        findings.extend(found);
    }
    findings
}

/// Highest severity among `findings`, if any
pub fn max_severity(findings: &[Finding]) -> Option<Severity> {
    findings.iter().map(|f| f.severity).max()
}
