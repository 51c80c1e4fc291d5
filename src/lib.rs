//! # validate-arxml Library
//!
//! Builds configuration trees from AUTOSAR-style XML documents, gives every
//! node a stable path key, checks trees against a pluggable rule set and
//! compares two trees path by path.
//!
//! ```
//! use validate_arxml::{RuleSet, build, diff, index, validate};
//!
//! let left = index(build(b"<ECU><SHORT-NAME>E1</SHORT-NAME></ECU>").unwrap());
//! let right = index(build(b"<ECU><SHORT-NAME>E2</SHORT-NAME></ECU>").unwrap());
//!
//! let differences = diff(&left, &right);
//! assert_eq!(differences[0].path.to_string(), "/SHORT-NAME[#0]");
//!
//! let findings = validate(&left, &RuleSet::baseline());
//! assert_eq!(findings.len(), 3);
//! ```

pub mod builder;
pub mod cli;
pub mod config;
pub mod differ;
pub mod encoding;
pub mod error;
pub mod error_reporter;
pub mod index;
pub mod output;
pub mod rules;
pub mod scanner;
pub mod tree;
pub mod validator;

pub use builder::{IdentityMarker, TreeBuilder, build};
pub use cli::{Cli, Command, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use differ::{DiffSummary, Difference, DifferenceKind, diff};
pub use error::{AppError, ParseError, TextPosition};
pub use error_reporter::{CheckSummary, ErrorReporter};
pub use index::{IndexedTree, PathKey, index};
pub use output::{DocumentOutcome, DocumentReport, Output};
pub use rules::{Rule, RuleConfig, RuleError, RuleSet};
pub use tree::{ConfigTree, Element, NodeId};
pub use validator::{Finding, Severity, validate};
