use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::edit::{apply_edits, TextEdit};
use crate::error::{Result, SqlembedError};
use crate::formatter::{has_marker, strip_marker, SqlFormatter, SQL_MARKER};
use crate::mode::Mode;
use crate::notebook::Notebook;
use crate::region::{self, DocumentKind, SqlSpan};
use crate::report::{FileResult, FileStatus, Report};

/// Format a single piece of SQL according to the given mode.
/// This is the core API function.
pub fn format_string(source: &str, mode: &Mode) -> Result<String> {
    SqlFormatter::new(mode.format.clone()).normalize(source)
}

/// A span left as it was because its SQL could not be formatted.
#[derive(Debug)]
pub struct SpanFailure {
    /// Notebook cell index, for spans inside notebooks.
    pub cell: Option<usize>,
    /// 1-based line of the span start, within the cell for notebooks.
    pub line: usize,
    pub error: SqlembedError,
}

impl fmt::Display for SpanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell {
            Some(cell) => write!(f, "cell {}, line {}: {}", cell, self.line, self.error),
            None => write!(f, "line {}: {}", self.line, self.error),
        }
    }
}

/// Result of formatting every SQL span of one document.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub text: String,
    pub spans: usize,
    pub failures: Vec<SpanFailure>,
}

/// Format every SQL span of `source`. Spans whose SQL fails to format are
/// left untouched and reported in `failures`; the rest are still rewritten.
pub fn format_document(source: &str, kind: DocumentKind, mode: &Mode) -> Result<DocumentOutcome> {
    let formatter = SqlFormatter::new(mode.format.clone());
    match kind {
        DocumentKind::Notebook => format_notebook(source, &formatter),
        DocumentKind::Sql | DocumentKind::Host => {
            let spans = region::find_spans(source, kind);
            let mut failures = Vec::new();
            let text = rewrite_spans(source, &spans, &formatter, None, &mut failures)?;
            Ok(DocumentOutcome {
                text,
                spans: spans.len(),
                failures,
            })
        }
    }
}

fn format_notebook(source: &str, formatter: &SqlFormatter) -> Result<DocumentOutcome> {
    let mut notebook = Notebook::parse(source)?;
    let mut spans = 0;
    let mut failures = Vec::new();
    let mut fatal = None;

    let changed = notebook.rewrite_code_cells(|index, cell| {
        if fatal.is_some() {
            return None;
        }
        let cell_spans = match region::magic_cell_span(cell) {
            Some(span) => vec![span],
            None => region::find_marked_strings(cell),
        };
        spans += cell_spans.len();
        match rewrite_spans(cell, &cell_spans, formatter, Some(index), &mut failures) {
            Ok(text) => Some(text),
            Err(e) => {
                fatal = Some(e);
                None
            }
        }
    });
    if let Some(e) = fatal {
        return Err(e);
    }

    let text = if changed > 0 {
        notebook.to_json()?
    } else {
        source.to_string()
    };
    Ok(DocumentOutcome {
        text,
        spans,
        failures,
    })
}

/// Replace each span with its formatted SQL in one batch of edits.
fn rewrite_spans(
    source: &str,
    spans: &[SqlSpan],
    formatter: &SqlFormatter,
    cell: Option<usize>,
    failures: &mut Vec<SpanFailure>,
) -> Result<String> {
    let mut edits = Vec::new();
    for span in spans.iter().filter(|s| !s.is_empty()) {
        match formatter.normalize(&span.text) {
            Ok(formatted) => {
                let replacement = format!("{}{}", formatted, span.trailing_whitespace());
                let edit = TextEdit::replace(span.start, span.end, replacement);
                if !edit.is_noop(source) {
                    edits.push(edit);
                }
            }
            Err(error) if error.is_dialect_error() => {
                let line = source[..span.start].matches('\n').count() + 1;
                tracing::warn!(?cell, line, %error, "leaving SQL block unformatted");
                failures.push(SpanFailure { cell, line, error });
            }
            Err(error) => return Err(error),
        }
    }
    apply_edits(source, edits)
}

/// Format an editor selection. Returns `None` when the selection does not
/// read as SQL. A selection without the `--sql` marker comes back without one.
pub fn format_selection(selection: &str, mode: &Mode) -> Result<Option<String>> {
    if !region::looks_like_sql(selection) {
        return Ok(None);
    }
    if has_marker(selection) {
        return format_string(selection, mode).map(Some);
    }
    let formatted = format_string(&format!("{}\n{}", SQL_MARKER, selection), mode)?;
    let body = strip_marker(&formatted);
    Ok(Some(body.strip_prefix('\n').unwrap_or(body).to_string()))
}

/// Run the formatter on a collection of files.
pub fn run(files: &[PathBuf], mode: &Mode) -> Report {
    let matching_paths = get_matching_paths(files, mode);
    let mut report = Report::new();

    let progress = mode
        .shows_progress(matching_paths.len())
        .then(|| progress_bar(matching_paths.len()));
    let format_one = |path: &PathBuf| {
        let result = format_file(path, mode);
        if let Some(bar) = &progress {
            bar.inc(1);
        }
        result
    };

    let pool = if mode.single_process || matching_paths.len() <= 1 {
        None
    } else {
        // 0 lets rayon pick one thread per core
        match rayon::ThreadPoolBuilder::new()
            .num_threads(mode.threads)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(error = %e, "falling back to sequential formatting");
                None
            }
        }
    };

    let results: Vec<FileResult> = match pool {
        Some(pool) => {
            use rayon::prelude::*;
            pool.install(|| matching_paths.par_iter().map(format_one).collect())
        }
        None => matching_paths.iter().map(format_one).collect(),
    };
    for result in results {
        report.add(result);
    }

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    report
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} files") {
        bar.set_style(style);
    }
    bar
}

/// Format a single file.
pub fn format_file(path: &Path, mode: &Mode) -> FileResult {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => return FileResult::failed(path.to_path_buf(), format!("Read error: {}", e)),
    };

    let kind = DocumentKind::from_path(path, mode);
    let outcome = match format_document(&source, kind, mode) {
        Ok(outcome) => outcome,
        Err(e) => return FileResult::failed(path.to_path_buf(), e.to_string()),
    };

    let mut result = FileResult::new(path.to_path_buf(), FileStatus::Unchanged);
    result.spans = outcome.spans;
    result.span_errors = outcome.failures.iter().map(ToString::to_string).collect();

    if outcome.text == source {
        return result;
    }
    result.status = FileStatus::Changed;

    if mode.diff {
        if let Err(e) = print_diff(path, &source, &outcome.text, mode) {
            tracing::warn!(error = %e, "could not print diff");
        }
    }
    if mode.writes_files() {
        if let Err(e) = std::fs::write(path, &outcome.text) {
            result.status = FileStatus::Error;
            result.error = Some(format!("Write error: {}", e));
        }
    }
    result
}

/// Get all file paths with SQL to format. Explicitly named files are always
/// included; directories are walked for known extensions.
pub fn get_matching_paths(paths: &[PathBuf], mode: &Mode) -> Vec<PathBuf> {
    let extensions: Vec<&str> = mode
        .sql_extensions()
        .iter()
        .chain(mode.host_extensions())
        .chain(mode.notebook_extensions())
        .copied()
        .collect();
    let mut result = HashSet::new();

    for path in paths {
        if path.is_file() {
            result.insert(path.clone());
        } else if path.is_dir() {
            collect_files(path, &extensions, &mode.exclude, &mut result);
        }
    }

    let mut sorted: Vec<PathBuf> = result.into_iter().collect();
    sorted.sort();
    sorted
}

/// Check if a file has one of the given extensions.
fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

fn is_excluded(path: &Path, name: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|p| p.matches(name) || p.matches_path(path))
            .unwrap_or(false)
    })
}

/// Recursively collect matching files from a directory.
fn collect_files(
    dir: &Path,
    extensions: &[&str],
    exclude: &[String],
    result: &mut HashSet<PathBuf>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if name.starts_with('.') || is_excluded(&path, &name, exclude) {
            continue;
        }

        if path.is_dir() {
            collect_files(&path, extensions, exclude, result);
        } else if has_extension(&path, extensions) {
            result.insert(path);
        }
    }
}

fn color_choice(mode: &Mode) -> ColorChoice {
    if mode.force_color {
        ColorChoice::Always
    } else if mode.color() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Print a diff between original and formatted content to stderr.
fn print_diff(path: &Path, original: &str, formatted: &str, mode: &Mode) -> std::io::Result<()> {
    use similar::{ChangeTag, TextDiff};

    let stderr = StandardStream::stderr(color_choice(mode));
    let mut out = stderr.lock();
    writeln!(out, "--- {}", path.display())?;
    writeln!(out, "+++ {}", path.display())?;

    let diff = TextDiff::from_lines(original, formatted);
    for change in diff.iter_all_changes() {
        let (sign, color) = match change.tag() {
            ChangeTag::Delete => ("-", Some(Color::Red)),
            ChangeTag::Insert => ("+", Some(Color::Green)),
            ChangeTag::Equal => (" ", None),
        };
        match color {
            Some(c) => out.set_color(ColorSpec::new().set_fg(Some(c)))?,
            None => out.reset()?,
        }
        write!(out, "{}{}", sign, change)?;
        if change.missing_newline() {
            writeln!(out)?;
        }
    }
    out.reset()?;
    Ok(())
}
