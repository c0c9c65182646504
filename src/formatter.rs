use std::sync::LazyLock;

use regex::Regex;

use crate::baseline::{BaselineFormatter, StandardFormatter};
use crate::config::FormatConfig;
use crate::context::IndentationContext;
use crate::error::Result;
use crate::line::LineBuffer;
use crate::passes::{self, Pass};

/// The marker that tags a string literal as SQL.
pub const SQL_MARKER: &str = "--sql";

static MARKER: LazyLock<Regex> = LazyLock::new(|| passes::compile(r"^\s*--sql\b"));

/// True if `text` starts (after whitespace) with the `--sql` marker.
pub fn has_marker(text: &str) -> bool {
    MARKER.is_match(text)
}

/// `text` without its leading marker.
pub fn strip_marker(text: &str) -> &str {
    match MARKER.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Runs the structural passes, in order, over baseline-formatted SQL.
/// Every pass gets a fresh `IndentationContext`.
pub struct StructuralNormalizer {
    passes: Vec<Box<dyn Pass>>,
    unit: usize,
}

impl StructuralNormalizer {
    pub fn new(config: &FormatConfig) -> Self {
        Self::with_passes(config, passes::standard_passes())
    }

    pub fn with_passes(config: &FormatConfig, passes: Vec<Box<dyn Pass>>) -> Self {
        Self {
            passes,
            unit: config.indent_unit(),
        }
    }

    pub fn run(&self, text: &str) -> String {
        let mut buffer = LineBuffer::from_text(text);
        for pass in &self.passes {
            let mut ctx = IndentationContext::new(self.unit);
            let before = buffer.len();
            let next = pass.apply(buffer.clone(), &mut ctx);
            if next != buffer {
                tracing::debug!(
                    pass = pass.name(),
                    lines_before = before,
                    lines_after = next.len(),
                    "pass rewrote buffer"
                );
            }
            buffer = next;
        }
        buffer.to_text()
    }
}

/// Baseline formatter followed by the structural normalizer.
pub struct SqlFormatter<B = StandardFormatter> {
    config: FormatConfig,
    baseline: B,
    normalizer: StructuralNormalizer,
}

impl SqlFormatter<StandardFormatter> {
    pub fn new(config: FormatConfig) -> Self {
        Self::with_baseline(config, StandardFormatter)
    }
}

impl<B: BaselineFormatter> SqlFormatter<B> {
    pub fn with_baseline(config: FormatConfig, baseline: B) -> Self {
        let normalizer = StructuralNormalizer::new(&config);
        Self {
            config,
            baseline,
            normalizer,
        }
    }

    /// Format one span of SQL. A leading `--sql` marker is stripped before
    /// formatting and re-added as exactly `--sql\n`.
    pub fn normalize(&self, raw_sql: &str) -> Result<String> {
        let marked = has_marker(raw_sql);
        let sql = strip_marker(raw_sql).trim();
        let baseline = self.baseline.format(sql, &self.config)?;
        let formatted = self.normalizer.run(&baseline);
        if marked {
            Ok(format!("{}\n{}", SQL_MARKER, formatted))
        } else {
            Ok(formatted)
        }
    }
}

/// Format one span of SQL with the standard baseline formatter.
pub fn normalize(raw_sql: &str, config: &FormatConfig) -> Result<String> {
    SqlFormatter::new(config.clone()).normalize(raw_sql)
}
