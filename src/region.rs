use std::path::Path;
use std::sync::LazyLock;

use memchr::{memchr, memchr2};
use regex::Regex;

use crate::formatter::has_marker;
use crate::mode::Mode;
use crate::passes::compile;

static SQL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\b(?:SELECT|FROM|WHERE|INSERT|UPDATE|DELETE|WITH|JOIN|UNION|CREATE|ALTER|DROP|CASE|WHEN|THEN)\b")
});

/// Cell magics whose body is SQL.
const SQL_MAGICS: &[&str] = &["%%sql", "%%bigquery"];

/// What kind of document a piece of text is, which decides where its SQL lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A standalone SQL file: the whole text is one span.
    Sql,
    /// Host source code: spans are marked triple-quoted strings.
    Host,
    /// A notebook document: spans live inside code cells.
    Notebook,
}

impl DocumentKind {
    /// Classify a path by extension. Unknown extensions are host source.
    pub fn from_path(path: &Path, mode: &Mode) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if mode.sql_extensions().contains(&ext.as_str()) {
            Self::Sql
        } else if mode.notebook_extensions().contains(&ext.as_str()) {
            Self::Notebook
        } else {
            Self::Host
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql" => Ok(Self::Sql),
            "python" | "host" | "py" => Ok(Self::Host),
            "notebook" | "ipynb" => Ok(Self::Notebook),
            _ => Err(format!("unknown document kind: {}", s)),
        }
    }
}

/// How a span is delimited in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanDelimiter {
    TripleDouble,
    TripleSingle,
    WholeFile,
    NotebookCell,
}

/// A region of a document recognized as SQL. `start..end` are byte offsets
/// of the span content, excluding any quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub delimiter: SpanDelimiter,
    /// The content begins with the `--sql` marker.
    pub marked: bool,
}

impl SqlSpan {
    fn new(source: &str, start: usize, end: usize, delimiter: SpanDelimiter) -> Self {
        let text = source[start..end].to_string();
        let marked = has_marker(&text);
        Self {
            start,
            end,
            text,
            delimiter,
            marked,
        }
    }

    /// True if there is no SQL once the marker is removed.
    pub fn is_empty(&self) -> bool {
        crate::formatter::strip_marker(&self.text).trim().is_empty()
    }

    /// Trailing whitespace of the content, kept when the span is replaced.
    pub fn trailing_whitespace(&self) -> &str {
        &self.text[self.text.trim_end().len()..]
    }
}

/// Spans of `source` for a text document of the given kind.
pub fn find_spans(source: &str, kind: DocumentKind) -> Vec<SqlSpan> {
    match kind {
        DocumentKind::Sql => vec![SqlSpan::new(source, 0, source.len(), SpanDelimiter::WholeFile)],
        DocumentKind::Host | DocumentKind::Notebook => find_marked_strings(source),
    }
}

/// Triple-quoted string literals whose content starts with `--sql`.
/// Comments and ordinary string literals are skipped, so quotes inside
/// them never open a span.
pub fn find_marked_strings(source: &str) -> Vec<SqlSpan> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                i += memchr(b'\n', &bytes[i..]).unwrap_or(bytes.len() - i);
            }
            q @ (b'"' | b'\'') => {
                if bytes[i..].starts_with(&[q, q, q]) {
                    let start = i + 3;
                    let Some(end) = find_triple_close(bytes, start, q) else {
                        break;
                    };
                    if has_marker(&source[start..end]) {
                        let delimiter = if q == b'"' {
                            SpanDelimiter::TripleDouble
                        } else {
                            SpanDelimiter::TripleSingle
                        };
                        tracing::debug!(start, end, "found marked string");
                        spans.push(SqlSpan::new(source, start, end, delimiter));
                    }
                    i = end + 3;
                } else {
                    i = skip_short_string(bytes, i + 1, q);
                }
            }
            _ => i += 1,
        }
    }

    spans
}

/// Offset of the closing triple quote, honoring backslash escapes.
fn find_triple_close(bytes: &[u8], from: usize, q: u8) -> Option<usize> {
    let mut i = from;
    loop {
        let p = i + memchr2(b'\\', q, bytes.get(i..)?)?;
        if bytes[p] == b'\\' {
            i = p + 2;
        } else if bytes[p..].starts_with(&[q, q, q]) {
            return Some(p);
        } else {
            i = p + 1;
        }
    }
}

/// Index just past a single-quoted string that started before `from`.
/// Short strings end at an unescaped quote or at the end of the line.
fn skip_short_string(bytes: &[u8], from: usize, q: u8) -> usize {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i + 1,
            b if b == q => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// The SQL body of a `%%sql` or `%%bigquery` cell.
pub fn magic_cell_span(source: &str) -> Option<SqlSpan> {
    let first_line_end = memchr(b'\n', source.as_bytes())?;
    let magic = source[..first_line_end].trim_end();
    let is_sql_magic = SQL_MAGICS.iter().any(|m| {
        magic
            .strip_prefix(m)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    });
    is_sql_magic.then(|| {
        SqlSpan::new(
            source,
            first_line_end + 1,
            source.len(),
            SpanDelimiter::NotebookCell,
        )
    })
}

/// Whether a selection reads as SQL.
pub fn looks_like_sql(text: &str) -> bool {
    SQL_KEYWORDS.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marked_strings_found() {
        let source = "a = \"\"\"--sql\nSELECT 1\n\"\"\"\nb = '''  --sql select 2'''\nc = \"\"\"plain\"\"\"\n";
        let spans = find_marked_strings(source);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "--sql\nSELECT 1\n");
        assert_eq!(spans[0].delimiter, SpanDelimiter::TripleDouble);
        assert_eq!(spans[0].trailing_whitespace(), "\n");
        assert_eq!(spans[1].text, "  --sql select 2");
        assert_eq!(spans[1].delimiter, SpanDelimiter::TripleSingle);
        assert!(spans.iter().all(|s| s.marked));
        assert_eq!(&source[spans[0].start..spans[0].end], spans[0].text);
    }

    #[test]
    fn test_prefixed_strings_found() {
        let source = "q = f\"\"\"--sql\nSELECT * FROM {table}\"\"\"";
        let spans = find_marked_strings(source);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "--sql\nSELECT * FROM {table}");
    }

    #[test]
    fn test_comments_and_short_strings_ignored() {
        let source = "# \"\"\"--sql SELECT 1\"\"\"\nx = \"'''\"\ny = \"\"\"--sqlite\"\"\"\n";
        assert!(find_marked_strings(source).is_empty());
    }

    #[test]
    fn test_escaped_quotes_inside_string() {
        let source = "q = \"\"\"--sql\nSELECT '\\\"\\\"\\\"'\"\"\"";
        let spans = find_marked_strings(source);
        assert_eq!(spans.len(), 1);
        assert!(spans[0].text.ends_with("'\\\"\\\"\\\"'"));
    }

    #[test]
    fn test_whole_file_span() {
        let spans = find_spans("select 1\n", DocumentKind::Sql);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].delimiter, SpanDelimiter::WholeFile);
        assert!(!spans[0].marked);
        assert!(!spans[0].is_empty());
        assert!(find_spans("--sql\n  ", DocumentKind::Sql)[0].is_empty());
    }

    #[test]
    fn test_magic_cells() {
        let span = magic_cell_span("%%bigquery df\nselect 1").unwrap();
        assert_eq!(span.text, "select 1");
        assert_eq!(span.delimiter, SpanDelimiter::NotebookCell);
        assert!(magic_cell_span("%%sql\nselect 1").is_some());
        assert!(magic_cell_span("%%sqlite\nselect 1").is_none());
        assert!(magic_cell_span("print(1)\n").is_none());
    }

    #[test]
    fn test_document_kind() {
        let mode = Mode::default();
        assert_eq!(DocumentKind::from_path(Path::new("a.sql"), &mode), DocumentKind::Sql);
        assert_eq!(DocumentKind::from_path(Path::new("a.BQ"), &mode), DocumentKind::Sql);
        assert_eq!(DocumentKind::from_path(Path::new("a.ipynb"), &mode), DocumentKind::Notebook);
        assert_eq!(DocumentKind::from_path(Path::new("a.py"), &mode), DocumentKind::Host);
        assert_eq!("python".parse::<DocumentKind>(), Ok(DocumentKind::Host));
        assert!("yaml".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_looks_like_sql() {
        assert!(looks_like_sql("select a from t"));
        assert!(!looks_like_sql("print('hello')"));
    }
}
