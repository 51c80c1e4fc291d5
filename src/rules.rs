//! Validation rules
//!
//! A [`Rule`] inspects a whole [`IndexedTree`] and returns findings, which
//! lets a rule be structural ("some node with tag X exists") or relational
//! ("every reference names a node that exists"). Rule sets are data: they
//! are built from [`RuleConfig`] records and never mutated afterwards.

use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::{IndexedTree, PathKey};
use crate::validator::{Finding, Severity};

/// Top-level categories every configuration is expected to contain
pub const DEFAULT_REQUIRED_TAGS: [&str; 4] =
    ["ECU", "Software-Component", "Diagnostic", "Communication"];

/// Default tag suffix marking reference elements
pub const DEFAULT_REFERENCE_SUFFIX: &str = "-REF";

/// A check over an indexed tree
pub trait Rule: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn description(&self) -> &str;
    fn check(&self, tree: &IndexedTree) -> Vec<Finding>;
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Rule '{id}': invalid pattern '{pattern}' - {source}")]
    InvalidPattern {
        id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule '{id}': '{field}' must not be empty")]
    EmptyField { id: String, field: String },
}

/// Every configured tag must occur somewhere in the tree (root included)
#[derive(Debug, Clone)]
pub struct RequiredTags {
    id: String,
    description: String,
    tags: Vec<String>,
    severity: Severity,
}

impl RequiredTags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let tags: Vec<String> = tags
            .into_iter()
            .map(Into::into)
            .filter(|tag: &String| seen.insert(tag.clone()))
            .collect();

        Self {
            id: "required-tags".to_string(),
            description: format!("Required configuration present: {}", tags.join(", ")),
            tags,
            severity: Severity::Critical,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl Default for RequiredTags {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_TAGS)
    }
}

impl Rule for RequiredTags {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn check(&self, tree: &IndexedTree) -> Vec<Finding> {
        self.tags
            .iter()
            .filter(|tag| !tree.has_tag(tag))
            .map(|tag| {
                Finding::new(
                    PathKey::root(),
                    format!("Missing required configuration: {}", tag),
                    self.severity,
                )
            })
            .collect()
    }
}

/// Reference elements must point at a name that exists in the tree.
///
/// A reference is any element whose tag ends with the suffix; its target is
/// the last non-empty `/`-separated segment of its text.
#[derive(Debug, Clone)]
pub struct ResolvedReferences {
    id: String,
    suffix: String,
    severity: Severity,
}

impl ResolvedReferences {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            id: "resolved-references".to_string(),
            suffix: suffix.into(),
            severity: Severity::Warning,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl Default for ResolvedReferences {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_SUFFIX)
    }
}

impl Rule for ResolvedReferences {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "References resolve to a named element"
    }

    fn check(&self, tree: &IndexedTree) -> Vec<Finding> {
        let names: HashSet<&str> = tree.iter().filter_map(|(_, e)| e.name()).collect();

        tree.iter()
            .filter(|(_, element)| element.tag().ends_with(self.suffix.as_str()))
            .filter_map(|(path, element)| {
                let Some(text) = element.text() else {
                    return Some(Finding::new(
                        path.clone(),
                        format!("Empty reference <{}>", element.tag()),
                        self.severity,
                    ));
                };
                let target = text.rsplit('/').find(|segment| !segment.is_empty());
                match target {
                    Some(target) if names.contains(target) => None,
                    _ => Some(Finding::new(
                        path.clone(),
                        format!("Unresolved reference '{}'", text),
                        self.severity,
                    )),
                }
            })
            .collect()
    }
}

/// Same-tag siblings should not share a name
#[derive(Debug, Clone)]
pub struct UniqueNames {
    id: String,
    severity: Severity,
}

impl UniqueNames {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl Default for UniqueNames {
    fn default() -> Self {
        Self {
            id: "unique-names".to_string(),
            severity: Severity::Warning,
        }
    }
}

impl Rule for UniqueNames {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Sibling names are unique per tag"
    }

    fn check(&self, tree: &IndexedTree) -> Vec<Finding> {
        let config = tree.tree();
        let mut findings = Vec::new();

        for (parent, _) in config.iter() {
            let mut seen: HashSet<(&str, &str)> = HashSet::new();
            for (child, element) in config.children(parent) {
                let Some(name) = element.name() else {
                    continue;
                };
                if !seen.insert((element.tag(), name)) {
                    findings.push(Finding::new(
                        tree.key(child).clone(),
                        format!("Duplicate name '{}' among <{}> siblings", name, element.tag()),
                        self.severity,
                    ));
                }
            }
        }

        findings
    }
}

/// Elements with the configured tags must carry a value
#[derive(Debug, Clone)]
pub struct RequiredValue {
    id: String,
    tags: Vec<String>,
    severity: Severity,
}

impl RequiredValue {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: "required-value".to_string(),
            tags: tags.into_iter().map(Into::into).collect(),
            severity: Severity::Warning,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl Rule for RequiredValue {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Value-bearing elements are not empty"
    }

    fn check(&self, tree: &IndexedTree) -> Vec<Finding> {
        self.tags
            .iter()
            .flat_map(|tag| tree.nodes_with_tag(tag))
            .filter(|&&id| tree.tree().element(id).text().is_none())
            .map(|&id| {
                Finding::new(
                    tree.key(id).clone(),
                    format!("Missing value for <{}>", tree.tree().element(id).tag()),
                    self.severity,
                )
            })
            .collect()
    }
}

/// Values of elements with a given tag must match a regular expression
#[derive(Debug, Clone)]
pub struct ValuePattern {
    id: String,
    tag: String,
    pattern: Regex,
    severity: Severity,
}

impl ValuePattern {
    pub fn new(tag: impl Into<String>, pattern: &str) -> Result<Self, RuleError> {
        let id = "value-pattern".to_string();
        let pattern = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            id: id.clone(),
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            id,
            tag: tag.into(),
            pattern,
            severity: Severity::Warning,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl Rule for ValuePattern {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Values match their expected format"
    }

    fn check(&self, tree: &IndexedTree) -> Vec<Finding> {
        tree.nodes_with_tag(&self.tag)
            .iter()
            .filter_map(|&id| {
                let message = match tree.tree().element(id).text() {
                    None => format!(
                        "Missing value for <{}>, expected pattern '{}'",
                        self.tag, self.pattern
                    ),
                    Some(value) if !self.pattern.is_match(value) => format!(
                        "Value '{}' of <{}> does not match pattern '{}'",
                        value, self.tag, self.pattern
                    ),
                    Some(_) => return None,
                };
                Some(Finding::new(tree.key(id).clone(), message, self.severity))
            })
            .collect()
    }
}

/// Serializable description of one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleConfig {
    RequiredTags {
        #[serde(default)]
        id: Option<String>,
        tags: Vec<String>,
        #[serde(default)]
        severity: Option<Severity>,
    },
    ResolvedReferences {
        #[serde(default)]
        id: Option<String>,
        #[serde(default = "default_reference_suffix")]
        suffix: String,
        #[serde(default)]
        severity: Option<Severity>,
    },
    UniqueNames {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        severity: Option<Severity>,
    },
    RequiredValue {
        #[serde(default)]
        id: Option<String>,
        tags: Vec<String>,
        #[serde(default)]
        severity: Option<Severity>,
    },
    ValuePattern {
        #[serde(default)]
        id: Option<String>,
        tag: String,
        pattern: String,
        #[serde(default)]
        severity: Option<Severity>,
    },
}

fn default_reference_suffix() -> String {
    DEFAULT_REFERENCE_SUFFIX.to_string()
}

impl RuleConfig {
    /// The baseline rule: the default required top-level categories
    pub fn baseline() -> Self {
        RuleConfig::RequiredTags {
            id: None,
            tags: DEFAULT_REQUIRED_TAGS.iter().map(|t| t.to_string()).collect(),
            severity: None,
        }
    }

    /// Id the built rule will report
    pub fn id(&self) -> &str {
        let (id, fallback) = match self {
            RuleConfig::RequiredTags { id, .. } => (id, "required-tags"),
            RuleConfig::ResolvedReferences { id, .. } => (id, "resolved-references"),
            RuleConfig::UniqueNames { id, .. } => (id, "unique-names"),
            RuleConfig::RequiredValue { id, .. } => (id, "required-value"),
            RuleConfig::ValuePattern { id, .. } => (id, "value-pattern"),
        };
        id.as_deref().unwrap_or(fallback)
    }

    pub fn build(&self) -> Result<Box<dyn Rule>, RuleError> {
        let id = self.id().to_string();
        let empty = |field: &str| RuleError::EmptyField {
            id: id.clone(),
            field: field.to_string(),
        };

        let rule: Box<dyn Rule> = match self {
            RuleConfig::RequiredTags { tags, severity, .. } => {
                if tags.is_empty() {
                    return Err(empty("tags"));
                }
                let rule = RequiredTags::new(tags.iter().cloned()).with_id(&id);
                Box::new(match severity {
                    Some(severity) => rule.with_severity(*severity),
                    None => rule,
                })
            }
            RuleConfig::ResolvedReferences {
                suffix, severity, ..
            } => {
                if suffix.is_empty() {
                    return Err(empty("suffix"));
                }
                let rule = ResolvedReferences::new(suffix.clone()).with_id(&id);
                Box::new(match severity {
                    Some(severity) => rule.with_severity(*severity),
                    None => rule,
                })
            }
            RuleConfig::UniqueNames { severity, .. } => {
                let rule = UniqueNames::default().with_id(&id);
                Box::new(match severity {
                    Some(severity) => rule.with_severity(*severity),
                    None => rule,
                })
            }
            RuleConfig::RequiredValue { tags, severity, .. } => {
                if tags.is_empty() {
                    return Err(empty("tags"));
                }
                let rule = RequiredValue::new(tags.iter().cloned()).with_id(&id);
                Box::new(match severity {
                    Some(severity) => rule.with_severity(*severity),
                    None => rule,
                })
            }
            RuleConfig::ValuePattern {
                tag,
                pattern,
                severity,
                ..
            } => {
                let rule = ValuePattern::new(tag.clone(), pattern)
                    .map_err(|e| match e {
                        RuleError::InvalidPattern {
                            pattern, source, ..
                        } => RuleError::InvalidPattern {
                            id: id.clone(),
                            pattern,
                            source,
                        },
                        other => other,
                    })?
                    .with_id(&id);
                Box::new(match severity {
                    Some(severity) => rule.with_severity(*severity),
                    None => rule,
                })
            }
        };

        Ok(rule)
    }
}

/// An immutable, ordered, cheaply clonable sequence of rules.
///
/// To change the rules in use, build a new set and swap it in whole.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Arc<[Box<dyn Rule>]>,
}

impl RuleSet {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    /// Only the required-top-level-category rule with its default tags
    pub fn baseline() -> Self {
        Self::new(vec![Box::new(RequiredTags::default())])
    }

    pub fn from_configs(configs: &[RuleConfig]) -> Result<Self, RuleError> {
        let rules = configs
            .iter()
            .map(RuleConfig::build)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.id()).collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::baseline()
    }
}

impl Deref for RuleSet {
    type Target = [Box<dyn Rule>];

    fn deref(&self) -> &Self::Target {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::index::index;

    fn indexed(doc: &str) -> IndexedTree {
        index(build(doc.as_bytes()).unwrap())
    }

    fn messages(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.message.as_str()).collect()
    }

    #[test]
    fn test_required_tags_reports_each_missing_tag_in_order() {
        let tree = indexed("<AUTOSAR><AR-PACKAGES/></AUTOSAR>");
        let findings = RequiredTags::default().check(&tree);

        assert_eq!(
            messages(&findings),
            vec![
                "Missing required configuration: ECU",
                "Missing required configuration: Software-Component",
                "Missing required configuration: Diagnostic",
                "Missing required configuration: Communication",
            ]
        );
        assert!(findings.iter().all(|f| f.severity == Severity::Critical && f.path.is_root()));
    }

    #[test]
    fn test_required_tags_nested_and_root_count() {
        let tree = indexed("<ECU><A><B><Diagnostic/></B></A></ECU>");
        let findings = RequiredTags::new(["ECU", "Diagnostic", "Communication"]).check(&tree);
        assert_eq!(messages(&findings), vec!["Missing required configuration: Communication"]);
    }

    #[test]
    fn test_required_tags_deduplicates_configuration() {
        let rule = RequiredTags::new(["ECU", "ECU", "Diagnostic"]);
        assert_eq!(rule.tags(), &["ECU".to_string(), "Diagnostic".to_string()]);
        assert_eq!(rule.check(&indexed("<R/>")).len(), 2);
    }

    #[test]
    fn test_resolved_references() {
        let tree = indexed(
            "<AUTOSAR>\
               <ECU-INSTANCE><SHORT-NAME>Gateway</SHORT-NAME></ECU-INSTANCE>\
               <CONNECTOR>\
                 <ECU-REF DEST='ECU-INSTANCE'>/Vehicle/Gateway</ECU-REF>\
                 <ECU-REF DEST='ECU-INSTANCE'>/Vehicle/Missing</ECU-REF>\
                 <PORT-REF/>\
               </CONNECTOR>\
             </AUTOSAR>",
        );
        let findings = ResolvedReferences::default().check(&tree);

        assert_eq!(
            messages(&findings),
            vec!["Unresolved reference '/Vehicle/Missing'", "Empty reference <PORT-REF>"]
        );
        assert_eq!(findings[0].path.to_string(), "/CONNECTOR[#0]/ECU-REF[#1]");
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_unique_names() {
        let tree = indexed(
            "<R>\
               <ECU><SHORT-NAME>A</SHORT-NAME></ECU>\
               <ECU><SHORT-NAME>A</SHORT-NAME></ECU>\
               <BUS><SHORT-NAME>A</SHORT-NAME></BUS>\
             </R>",
        );
        let findings = UniqueNames::default().check(&tree);
        assert_eq!(messages(&findings), vec!["Duplicate name 'A' among <ECU> siblings"]);
        assert_eq!(findings[0].path.to_string(), "/ECU[#1]");
    }

    #[test]
    fn test_required_value() {
        let tree = indexed("<R><VALUE>1</VALUE><VALUE/><VALUE>  </VALUE></R>");
        let findings = RequiredValue::new(["VALUE"]).check(&tree);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].path.to_string(), "/VALUE[#1]");
        assert_eq!(findings[1].path.to_string(), "/VALUE[#2]");
    }

    #[test]
    fn test_value_pattern() {
        let tree = indexed("<R><BAUDRATE>500000</BAUDRATE><BAUDRATE>fast</BAUDRATE><BAUDRATE/></R>");
        let rule = ValuePattern::new("BAUDRATE", r"^\d+$").unwrap();
        let findings = rule.check(&tree);

        assert_eq!(findings.len(), 2);
        assert!(findings[0].message.contains("'fast'"));
        assert!(findings[1].message.starts_with("Missing value"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected_up_front() {
        let config = RuleConfig::ValuePattern {
            id: Some("baudrate".to_string()),
            tag: "BAUDRATE".to_string(),
            pattern: "(".to_string(),
            severity: None,
        };
        match config.build() {
            Err(RuleError::InvalidPattern { id, .. }) => assert_eq!(id, "baudrate"),
            other => panic!("Expected InvalidPattern, got {:?}", other.map(|r| r.id().to_string())),
        }
    }

    #[test]
    fn test_rule_config_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            rules: Vec<RuleConfig>,
        }

        let wrapper: Wrapper = toml::from_str(
            r#"
[[rules]]
kind = "required_tags"
tags = ["ECU", "Diagnostic"]

[[rules]]
kind = "resolved_references"
severity = "Critical"

[[rules]]
kind = "value_pattern"
id = "baudrate-numeric"
tag = "BAUDRATE"
pattern = '^\d+$'
"#,
        )
        .unwrap();

        let rules = RuleSet::from_configs(&wrapper.rules).unwrap();
        assert_eq!(
            rules.ids(),
            vec!["required-tags", "resolved-references", "baudrate-numeric"]
        );

        let tree = indexed("<R><X-REF>/nowhere</X-REF></R>");
        let findings = rules[1].check(&tree);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn test_empty_tag_list_is_rejected() {
        let config = RuleConfig::RequiredTags {
            id: None,
            tags: vec![],
            severity: None,
        };
        assert!(matches!(config.build(), Err(RuleError::EmptyField { .. })));
    }

    #[test]
    fn test_rule_set_clones_share_rules() {
        let rules = RuleSet::baseline();
        let clone = rules.clone();
        assert!(Arc::ptr_eq(&rules.rules, &clone.rules));
        assert_eq!(clone.len(), 1);
    }
}
