//! Configuration loading and the classification scan filter.
//!
//! Configuration is read from a TOML file and controls which top-level
//! directories are treated as projects, the descriptor file name, the
//! backup behavior, and the external extraction command.
//!
//! # Configuration File Format
//!
//! ```toml
//! [classify]
//! descriptor = "project.json"
//! create_mapping = false
//!
//! [classify.exclude]
//! names = ["scene", "video"]
//! extensions = ["py", "md"]
//! patterns = ["tmp_*"]
//! regex = []
//!
//! [classify.include]
//! patterns = []
//!
//! [backup]
//! auto_backup = true
//! package_extension = "pkg"
//!
//! [extract]
//! program = "/opt/tools/extractor"
//! args = ["extract", "-o", "{output}", "{package}"]
//! recursive = true
//! ```
//!
//! `Unknown`, `.unified_backup` and every dotted name are never classified,
//! whatever the configuration says.

use crate::backup::BACKUP_DIR_NAME;
use crate::metadata::UNKNOWN_CATEGORY;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

/// Classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Name of the sidecar descriptor inside each project directory.
    #[serde(default = "default_descriptor")]
    pub descriptor: String,

    /// Whether to create mapping links after classifying.
    #[serde(default)]
    pub create_mapping: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    #[serde(default)]
    pub include: IncludeRules,
}

fn default_descriptor() -> String {
    "project.json".to_string()
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor(),
            create_mapping: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding top-level directories from classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact directory names that are not projects.
    #[serde(default = "default_excluded_names")]
    pub names: Vec<String>,

    /// Script or document extensions (without the dot).
    #[serde(default = "default_excluded_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns matched against the directory name.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Regex patterns matched against the directory name.
    #[serde(default)]
    pub regex: Vec<String>,
}

fn default_excluded_names() -> Vec<String> {
    vec!["scene".to_string(), "video".to_string()]
}

fn default_excluded_extensions() -> Vec<String> {
    vec!["py".to_string(), "md".to_string()]
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self {
            names: default_excluded_names(),
            extensions: default_excluded_extensions(),
            patterns: Vec::new(),
            regex: Vec::new(),
        }
    }
}

/// Rules that re-admit directories the configurable excludes would drop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Backup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Snapshot projects before an in-place extraction.
    #[serde(default = "default_true")]
    pub auto_backup: bool,

    /// Extension of package-source files, which restore never deletes.
    #[serde(default = "default_package_extension")]
    pub package_extension: String,
}

fn default_true() -> bool {
    true
}

fn default_package_extension() -> String {
    "pkg".to_string()
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            auto_backup: true,
            package_extension: default_package_extension(),
        }
    }
}

/// External extraction command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Path to the extraction executable. Empty means not configured.
    #[serde(default)]
    pub program: String,

    /// Arguments; `{package}` and `{output}` are substituted per package.
    #[serde(default = "default_extract_args")]
    pub args: Vec<String>,

    /// Scan the input root recursively for packages.
    #[serde(default = "default_true")]
    pub recursive: bool,
}

fn default_extract_args() -> Vec<String> {
    ["extract", "-o", "{output}", "{package}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: default_extract_args(),
            recursive: true,
        }
    }
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.pkgtidyrc.toml` in the current directory
    /// 3. Look for `~/.config/pkgtidy/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".pkgtidyrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("pkgtidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compile the classification rules into a [`ScanFilter`].
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn scan_filter(&self) -> Result<ScanFilter, ConfigError> {
        ScanFilter::new(&self.classify)
    }
}

/// Compiled rules deciding which top-level directories are classification
/// candidates.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    exclude_names: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl Default for ScanFilter {
    fn default() -> Self {
        // The default rules contain no patterns, so compilation cannot fail.
        Self::from_rules(&ClassifyConfig::default(), Vec::new(), Vec::new(), Vec::new())
    }
}

impl ScanFilter {
    fn new(rules: &ClassifyConfig) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_rules(
            rules,
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        ))
    }

    fn from_rules(
        rules: &ClassifyConfig,
        exclude_patterns: Vec<Pattern>,
        exclude_regexes: Vec<Regex>,
        include_patterns: Vec<Pattern>,
    ) -> Self {
        Self {
            exclude_names: rules.exclude.names.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        }
    }

    /// Returns true if a top-level directory named `name` is a project that
    /// classification should move.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Reserved names and dotted names - always excluded
    /// 2. Include patterns (whitelist) - if matched, include
    /// 3. Exact name match - if matched, exclude
    /// 4. Extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, name: &str) -> bool {
        if is_reserved_name(name) {
            return false;
        }

        if self.include_patterns.iter().any(|p| p.matches(name)) {
            return true;
        }

        if self.exclude_names.contains(name) {
            return false;
        }

        if let Some(ext) = Path::new(name).extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.exclude_patterns.iter().any(|p| p.matches(name)) {
            return false;
        }

        !self.exclude_regexes.iter().any(|r| r.is_match(name))
    }
}

/// Names that are never treated as projects.
pub fn is_reserved_name(name: &str) -> bool {
    name == UNKNOWN_CATEGORY || name == BACKUP_DIR_NAME || name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_excludes_reserved_names() {
        let filter = ScanFilter::default();

        assert!(!filter.should_include("Unknown"));
        assert!(!filter.should_include("scene"));
        assert!(!filter.should_include("video"));
        assert!(!filter.should_include(".unified_backup"));
        assert!(!filter.should_include(".git"));
        assert!(!filter.should_include("tools.py"));
        assert!(!filter.should_include("README.MD")); // Case-insensitive
        assert!(filter.should_include("1234567890"));
        assert!(filter.should_include("Foo"));
    }

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [classify]
            create_mapping = true

            [backup]
            auto_backup = false
            "#,
        )
        .unwrap();

        assert!(config.classify.create_mapping);
        assert_eq!(config.classify.descriptor, "project.json");
        assert_eq!(config.classify.exclude.names, vec!["scene", "video"]);
        assert!(!config.backup.auto_backup);
        assert_eq!(config.backup.package_extension, "pkg");
        assert!(config.extract.recursive);
        assert!(config.extract.program.is_empty());
    }

    #[test]
    fn test_exclude_glob_and_regex() {
        let config = Config::from_toml(
            r#"
            [classify.exclude]
            patterns = ["tmp_*"]
            regex = ['^\d+_old$']
            "#,
        )
        .unwrap();
        let filter = config.scan_filter().unwrap();

        assert!(!filter.should_include("tmp_project"));
        assert!(!filter.should_include("123_old"));
        assert!(filter.should_include("123_new"));
    }

    #[test]
    fn test_include_overrides_configurable_excludes_only() {
        let config = Config::from_toml(
            r#"
            [classify.include]
            patterns = ["scene", ".*", "Unknown"]
            "#,
        )
        .unwrap();
        let filter = config.scan_filter().unwrap();

        assert!(filter.should_include("scene"));
        assert!(!filter.should_include(".hidden"));
        assert!(!filter.should_include("Unknown"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let config = Config::from_toml(
            r#"
            [classify.exclude]
            regex = ["[invalid"]
            "#,
        )
        .unwrap();

        let result = config.scan_filter();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        let config = Config::from_toml(
            r#"
            [classify.exclude]
            patterns = ["[a-"]
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.scan_filter(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let result = Config::from_toml("[classify\ncreate_mapping = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/non/existent/pkgtidy.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }
}
