use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dialect::{self, Dialect};
use crate::error::SqlembedError;
use crate::mode::Mode;

/// Casing rule applied by the baseline formatter to one class of words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordCase {
    #[default]
    Upper,
    Lower,
    Preserve,
}

impl KeywordCase {
    pub fn apply(self, word: &str) -> String {
        match self {
            Self::Upper => word.to_ascii_uppercase(),
            Self::Lower => word.to_ascii_lowercase(),
            Self::Preserve => word.to_string(),
        }
    }
}

impl std::str::FromStr for KeywordCase {
    type Err = SqlembedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upper" => Ok(Self::Upper),
            "lower" => Ok(Self::Lower),
            "preserve" => Ok(Self::Preserve),
            _ => Err(SqlembedError::Config(format!("Unknown case rule: {}", s))),
        }
    }
}

/// Immutable formatting configuration, shared read-only by every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "default_dialect", rename = "dialect")]
    pub dialect_name: String,

    #[serde(default)]
    pub keyword_case: KeywordCase,

    #[serde(default)]
    pub data_type_case: KeywordCase,

    #[serde(default)]
    pub function_case: KeywordCase,

    /// Width of one indentation unit. Every structural offset is a multiple of it.
    #[serde(default = "default_tab_width")]
    pub tab_width: usize,

    /// Blank lines emitted between statements separated by `;`.
    #[serde(default = "default_lines_between_queries")]
    pub lines_between_queries: usize,
}

fn default_dialect() -> String {
    "bigquery".to_string()
}
fn default_tab_width() -> usize {
    4
}
fn default_lines_between_queries() -> usize {
    2
}

impl FormatConfig {
    /// Create the dialect for the configured dialect name.
    pub fn dialect(&self) -> Result<Box<dyn Dialect>, SqlembedError> {
        dialect::dialect_from_name(&self.dialect_name)
    }

    /// Indentation unit, never zero.
    pub fn indent_unit(&self) -> usize {
        self.tab_width.max(1)
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            dialect_name: default_dialect(),
            keyword_case: KeywordCase::Upper,
            data_type_case: KeywordCase::Upper,
            function_case: KeywordCase::Upper,
            tab_width: default_tab_width(),
            lines_between_queries: default_lines_between_queries(),
        }
    }
}

const CONFIG_FILE_NAME: &str = "sqlembed.toml";

/// Load sqlembed configuration.
/// An explicit path wins; otherwise parent directories of the inputs are searched
/// for pyproject.toml / sqlembed.toml, then the user config directory.
pub fn load_config(files: &[PathBuf], config_path: Option<&Path>) -> Result<Mode, SqlembedError> {
    let mut mode = Mode::default();

    let config_file = match config_path {
        Some(path) => {
            if path.exists() {
                Some(path.to_path_buf())
            } else {
                return Err(SqlembedError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        }
        None => find_config_file(files).or_else(user_config_file),
    };

    if let Some(path) = config_file {
        tracing::debug!(path = %path.display(), "loading config");
        let raw = load_config_from_path(&path)?;
        apply_config(&mut mode, &raw)?;
    }

    Ok(mode)
}

/// Search for a pyproject.toml with a [tool.sqlembed] table, or a sqlembed.toml,
/// in the common parent directories of the given files.
fn find_config_file(files: &[PathBuf]) -> Option<PathBuf> {
    for parent in get_common_parents(files) {
        let pyproject = parent.join("pyproject.toml");
        if pyproject.exists() && has_tool_section(&pyproject) {
            return Some(pyproject);
        }
        let config = parent.join(CONFIG_FILE_NAME);
        if config.exists() {
            return Some(config);
        }
    }
    None
}

fn has_tool_section(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.parse::<toml::Value>().ok())
        .map(|parsed| parsed.get("tool").and_then(|t| t.get("sqlembed")).is_some())
        .unwrap_or(false)
}

fn user_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("sqlembed").join(CONFIG_FILE_NAME);
    path.exists().then_some(path)
}

/// Get the common parent directories of the given file paths, ordered
/// from most specific to least specific.
fn get_common_parents(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut parents = Vec::new();

    for file in files {
        let parent = if file.is_dir() {
            file.clone()
        } else {
            file.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        };

        let mut current = Some(parent.as_path());
        while let Some(dir) = current {
            let dir_buf = dir.to_path_buf();
            if !parents.contains(&dir_buf) {
                parents.push(dir_buf);
            }
            current = dir.parent();
        }
    }

    parents
}

/// Load and parse a TOML config file into a flat key map.
fn load_config_from_path(path: &Path) -> Result<HashMap<String, toml::Value>, SqlembedError> {
    let content = std::fs::read_to_string(path)?;
    let parsed: toml::Value = content
        .parse()
        .map_err(|e| SqlembedError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    let section = parsed
        .get("tool")
        .and_then(|t| t.get("sqlembed"))
        .or_else(|| {
            let is_own_file = path
                .file_name()
                .map(|n| n == CONFIG_FILE_NAME)
                .unwrap_or(false);
            is_own_file.then_some(&parsed)
        });

    match section {
        Some(toml::Value::Table(table)) => Ok(table
            .iter()
            .map(|(k, v)| (k.to_lowercase().replace('-', "_"), v.clone()))
            .collect()),
        _ => Ok(HashMap::new()),
    }
}

/// Apply configuration values to a Mode.
fn apply_config(mode: &mut Mode, config: &HashMap<String, toml::Value>) -> Result<(), SqlembedError> {
    let known_keys = [
        "dialect",
        "keyword_case",
        "data_type_case",
        "function_case",
        "tab_width",
        "lines_between_queries",
        "exclude",
    ];
    for key in config.keys() {
        if !known_keys.contains(&key.as_str()) {
            return Err(SqlembedError::Config(format!(
                "Unknown config option: {}",
                key
            )));
        }
    }

    if let Some(toml::Value::String(d)) = config.get("dialect") {
        mode.format.dialect_name = d.clone();
    }
    if let Some(toml::Value::String(c)) = config.get("keyword_case") {
        mode.format.keyword_case = c.parse()?;
    }
    if let Some(toml::Value::String(c)) = config.get("data_type_case") {
        mode.format.data_type_case = c.parse()?;
    }
    if let Some(toml::Value::String(c)) = config.get("function_case") {
        mode.format.function_case = c.parse()?;
    }
    if let Some(toml::Value::Integer(n)) = config.get("tab_width") {
        if *n <= 0 {
            return Err(SqlembedError::Config(format!(
                "tab_width must be positive, got {}",
                n
            )));
        }
        mode.format.tab_width = *n as usize;
    }
    if let Some(toml::Value::Integer(n)) = config.get("lines_between_queries") {
        mode.format.lines_between_queries = (*n).max(0) as usize;
    }
    if let Some(toml::Value::Array(arr)) = config.get("exclude") {
        mode.exclude = arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
    }

    // Fail early on an unknown dialect rather than once per span.
    mode.format.dialect()?;

    Ok(())
}
