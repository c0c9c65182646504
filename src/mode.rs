use serde::Deserialize;

use crate::config::FormatConfig;

/// Mode holds the run options for sqlembed plus the formatting configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mode {
    #[serde(default)]
    pub format: FormatConfig,

    #[serde(default)]
    pub check: bool,

    #[serde(default)]
    pub diff: bool,

    /// Glob patterns to exclude.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub quiet: bool,

    #[serde(default)]
    pub no_progressbar: bool,

    #[serde(default)]
    pub no_color: bool,

    #[serde(default)]
    pub force_color: bool,

    /// Number of threads for parallel processing (0 = all cores).
    #[serde(default)]
    pub threads: usize,

    #[serde(default)]
    pub single_process: bool,
}

impl Mode {
    /// Whether color output is enabled.
    pub fn color(&self) -> bool {
        if self.force_color {
            return true;
        }
        if self.no_color {
            return false;
        }
        if std::env::var("NO_COLOR").is_ok() {
            return false;
        }
        true
    }

    /// Whether formatted output is written back to disk.
    pub fn writes_files(&self) -> bool {
        !self.check && !self.diff
    }

    /// Whether a progress bar is drawn for a run over `total` files.
    /// Diffs share stderr with the bar, so they turn it off.
    pub fn shows_progress(&self, total: usize) -> bool {
        !self.quiet && !self.no_progressbar && !self.verbose && !self.diff && total > 1
    }

    /// File extensions holding whole-file SQL.
    pub fn sql_extensions(&self) -> &[&str] {
        &["sql", "bq", "ddl", "dml"]
    }

    /// File extensions holding marked SQL strings.
    pub fn host_extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    /// File extensions of notebook documents.
    pub fn notebook_extensions(&self) -> &[&str] {
        &["ipynb"]
    }
}
