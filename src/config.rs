use crate::builder::{IdentityMarker, TreeBuilder};
use crate::cli::{Cli, OutputFormat};
use crate::rules::{RuleConfig, RuleError, RuleSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub builder: BuilderConfig,
    pub rules: Vec<RuleConfig>,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            builder: BuilderConfig::default(),
            rules: vec![RuleConfig::baseline()],
            output: OutputConfig::default(),
        }
    }
}

/// Tree builder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BuilderConfig {
    /// Which child elements name their parent
    pub identity: IdentityMarker,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormatConfig,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (critical findings only)
    pub quiet: bool,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    Human,
    Json,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;
        tracing::debug!("Loading configuration from {}", path.display());

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "validate-arxml.toml",
            "validate-arxml.json",
            ".validate-arxml.toml",
            ".validate-arxml.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("validate-arxml");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(suffix) = env.get("VALIDATE_ARXML_IDENTITY_SUFFIX") {
            config.builder.identity = IdentityMarker::Suffix(suffix);
        }

        if let Some(tags) = env.get("VALIDATE_ARXML_REQUIRED_TAGS") {
            config.rules = Self::with_required_tags(config.rules, split_list(&tags));
        }

        if let Some(verbose) = env.get("VALIDATE_ARXML_VERBOSE") {
            config.output.verbose = verbose.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid VALIDATE_ARXML_VERBOSE value: {}",
                    verbose
                ))
            })?;
        }

        if let Some(quiet) = env.get("VALIDATE_ARXML_QUIET") {
            config.output.quiet = quiet.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid VALIDATE_ARXML_QUIET value: {}", quiet))
            })?;
        }

        if let Some(format) = env.get("VALIDATE_ARXML_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid VALIDATE_ARXML_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(suffix) = &cli.identity_suffix {
            config.builder.identity = IdentityMarker::Suffix(suffix.clone());
        }
        if !cli.required_tags.is_empty() {
            config.rules = Self::with_required_tags(config.rules, cli.required_tags.clone());
        }

        if let Some(format) = cli.format {
            config.output.format = format.into();
        }
        if cli.verbose > 0 {
            config.output.verbose = true;
        }
        if cli.quiet {
            config.output.quiet = true;
        }

        config
    }

    /// Merge two configurations (second takes precedence)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        base.builder.identity = override_config.builder.identity;

        if !override_config.rules.is_empty() {
            base.rules = override_config.rules;
        }

        base.output.format = override_config.output.format;
        base.output.verbose = override_config.output.verbose;
        base.output.quiet = override_config.output.quiet;

        base
    }

    /// Replace the tag list of the first required-tags rule, or put a new
    /// required-tags rule in front when there is none.
    fn with_required_tags(mut rules: Vec<RuleConfig>, new_tags: Vec<String>) -> Vec<RuleConfig> {
        let existing = rules
            .iter_mut()
            .find_map(|rule| match rule {
                RuleConfig::RequiredTags { tags, .. } => Some(tags),
                _ => None,
            });

        match existing {
            Some(tags) => *tags = new_tags,
            None => rules.insert(
                0,
                RuleConfig::RequiredTags {
                    id: None,
                    tags: new_tags,
                    severity: None,
                },
            ),
        }
        rules
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        match &config.builder.identity {
            IdentityMarker::Suffix(suffix) if suffix.trim().is_empty() => {
                return Err(ConfigError::Validation(
                    "Identity suffix must not be empty".to_string(),
                ));
            }
            IdentityMarker::Tags(tags) if tags.is_empty() => {
                return Err(ConfigError::Validation(
                    "At least one identity tag must be specified".to_string(),
                ));
            }
            _ => {}
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Self::rule_set(config).map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(())
    }

    /// Build the tree builder described by the configuration
    pub fn tree_builder(config: &Config) -> TreeBuilder {
        TreeBuilder::new(config.builder.identity.clone())
    }

    /// Build the rule set described by the configuration
    pub fn rule_set(config: &Config) -> std::result::Result<RuleSet, RuleError> {
        RuleSet::from_configs(&config.rules)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::DEFAULT_REQUIRED_TAGS;
    use crate::validator::Severity;
    use clap::Parser;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    fn required_tags(config: &Config) -> Vec<String> {
        config
            .rules
            .iter()
            .find_map(|rule| match rule {
                RuleConfig::RequiredTags { tags, .. } => Some(tags.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(
            config.builder.identity,
            IdentityMarker::Suffix("SHORT-NAME".to_string())
        );
        assert_eq!(required_tags(&config), DEFAULT_REQUIRED_TAGS.to_vec());
        assert_eq!(config.output.format, OutputFormatConfig::Human);
        assert!(!config.output.verbose);
        assert!(!config.output.quiet);
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let toml_content = r#"
[builder.identity]
suffix = "NAME"

[[rules]]
kind = "required_tags"
tags = ["ECU", "Gateway"]

[[rules]]
kind = "unique_names"
severity = "Critical"

[output]
format = "json"
verbose = true
"#;

        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();

        assert_eq!(config.builder.identity, IdentityMarker::Suffix("NAME".to_string()));
        assert_eq!(required_tags(&config), vec!["ECU", "Gateway"]);
        assert_eq!(
            config.rules[1],
            RuleConfig::UniqueNames {
                id: None,
                severity: Some(Severity::Critical)
            }
        );
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert!(config.output.verbose);
        assert!(!config.output.quiet);
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json_content = r#"{
  "builder": { "identity": "disabled" },
  "rules": [
    { "kind": "required_value", "tags": ["BAUDRATE"] }
  ]
}"#;

        fs::write(&config_path, json_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();
        assert_eq!(config.builder.identity, IdentityMarker::Disabled);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[tokio::test]
    async fn test_unsupported_config_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "rules: []").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"));
    }

    #[tokio::test]
    async fn test_malformed_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[output\nformat = ").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::TomlParsing(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let mut env = MockEnvProvider::default();
        env.set("VALIDATE_ARXML_IDENTITY_SUFFIX", "LABEL");
        env.set("VALIDATE_ARXML_REQUIRED_TAGS", "ECU, Bus ,");
        env.set("VALIDATE_ARXML_FORMAT", "JSON");
        env.set("VALIDATE_ARXML_QUIET", "true");

        let config =
            ConfigManager::apply_environment_overrides_with(&env, Config::default()).unwrap();

        assert_eq!(config.builder.identity, IdentityMarker::Suffix("LABEL".to_string()));
        assert_eq!(required_tags(&config), vec!["ECU", "Bus"]);
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert!(config.output.quiet);
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut env = MockEnvProvider::default();
        env.set("VALIDATE_ARXML_VERBOSE", "maybe");
        let result = ConfigManager::apply_environment_overrides_with(&env, Config::default());
        assert!(matches!(result, Err(ConfigError::Environment(_))));

        let mut env = MockEnvProvider::default();
        env.set("VALIDATE_ARXML_FORMAT", "xml");
        let result = ConfigManager::apply_environment_overrides_with(&env, Config::default());
        assert!(matches!(result, Err(ConfigError::Environment(_))));
    }

    #[test]
    fn test_required_tags_inserted_when_absent() {
        let config = Config {
            rules: vec![RuleConfig::UniqueNames {
                id: None,
                severity: None,
            }],
            ..Config::default()
        };
        let cli = Cli::try_parse_from(["validate-arxml", "--require", "ECU", "check", "a.arxml"])
            .unwrap();

        let config = ConfigManager::merge_with_cli(config, &cli);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].id(), "required-tags");
        assert_eq!(required_tags(&config), vec!["ECU"]);
    }

    #[test]
    fn test_cli_takes_precedence() {
        let mut config = Config::default();
        config.output.format = OutputFormatConfig::Json;

        let cli = Cli::try_parse_from([
            "validate-arxml",
            "--format",
            "human",
            "--identity-suffix",
            "ID",
            "-v",
            "diff",
            "a.arxml",
            "b.arxml",
        ])
        .unwrap();

        let config = ConfigManager::merge_with_cli(config, &cli);
        assert_eq!(config.output.format, OutputFormatConfig::Human);
        assert_eq!(config.builder.identity, IdentityMarker::Suffix("ID".to_string()));
        assert!(config.output.verbose);
    }

    #[test]
    fn test_merge_keeps_base_rules_when_override_has_none() {
        let override_config = Config {
            rules: vec![],
            ..Config::default()
        };
        let merged = ConfigManager::merge_configs(Config::default(), override_config);
        assert_eq!(merged.rules, vec![RuleConfig::baseline()]);
    }

    #[test]
    fn test_validate_config_rejections() {
        let mut config = Config::default();
        config.output.verbose = true;
        config.output.quiet = true;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = Config::default();
        config.builder.identity = IdentityMarker::Suffix("  ".to_string());
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = Config::default();
        config.rules.push(RuleConfig::ValuePattern {
            id: None,
            tag: "X".to_string(),
            pattern: "[unclosed".to_string(),
            severity: None,
        });
        let err = ConfigManager::validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn test_rule_set_and_builder_from_config() {
        let config = Config::default();
        let rules = ConfigManager::rule_set(&config).unwrap();
        assert_eq!(rules.ids(), vec!["required-tags"]);

        let builder = ConfigManager::tree_builder(&config);
        assert_eq!(builder.identity(), &config.builder.identity);
    }
}
