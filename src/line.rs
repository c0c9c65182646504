use std::sync::LazyLock;

use crate::lexer::{self, MASK_BYTE};

/// Pre-computed indentation strings for common indent sizes (0..=200).
static INDENT_CACHE: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    (0..=200)
        .map(|n| {
            let s = " ".repeat(n);
            &*Box::leak(s.into_boxed_str())
        })
        .collect()
});

/// Return `n` spaces. Cached for n <= 200.
pub fn indent_str(n: usize) -> std::borrow::Cow<'static, str> {
    if n <= 200 {
        std::borrow::Cow::Borrowed(INDENT_CACHE[n])
    } else {
        std::borrow::Cow::Owned(" ".repeat(n))
    }
}

/// Number of leading whitespace characters of a line. Tabs count as one column.
pub fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// `text` placed at column `indent`.
pub fn indented(indent: usize, text: &str) -> String {
    let mut out = String::with_capacity(indent + text.len());
    out.push_str(&indent_str(indent));
    out.push_str(text);
    out
}

/// The working representation between passes: an ordered sequence of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
}

impl LineBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(String::from).collect(),
        }
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Analyze every line against the masked text of the whole buffer.
    pub fn views(&self) -> Vec<LineView> {
        let text = self.to_text();
        let masked = lexer::mask(&text);
        let mut views = Vec::with_capacity(self.lines.len());
        let mut offset = 0;
        let mut depth: i64 = 0;
        let mut literal_newlines = masked.literal_newlines.iter().peekable();

        for line in &self.lines {
            let end = offset + line.len();
            let code = &masked.code[offset..end];

            // The line starts inside a literal if the newline before it did.
            let mut verbatim = false;
            while let Some(&&pos) = literal_newlines.peek() {
                if pos + 1 < offset {
                    literal_newlines.next();
                } else {
                    verbatim = pos + 1 == offset;
                    break;
                }
            }

            let start_depth = depth.max(0) as usize;
            for b in code.bytes() {
                match b {
                    b'(' => depth += 1,
                    b')' => depth -= 1,
                    _ => {}
                }
            }

            views.push(LineView {
                indent: leading_spaces(line),
                code: code.trim().to_string(),
                depth: start_depth,
                verbatim,
            });
            offset = end + 1;
        }

        views
    }
}

/// Structural facts about one line, derived from the masked buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineView {
    /// Leading whitespace width of the raw line.
    pub indent: usize,
    /// Trimmed masked text: keywords here are real keywords.
    pub code: String,
    /// Parenthesis depth at the start of the line.
    pub depth: usize,
    /// The line begins inside a multi-line string or block comment.
    pub verbatim: bool,
}

impl LineView {
    pub fn is_blank(&self) -> bool {
        self.code.is_empty()
    }

    /// True if the line is nothing but a comment.
    pub fn is_comment_only(&self) -> bool {
        !self.code.is_empty() && self.code.bytes().all(|b| b == MASK_BYTE)
    }

    /// Masked code with any trailing comment removed.
    pub fn code_before_comment(&self) -> &str {
        self.code.trim_end_matches(MASK_BYTE as char).trim_end()
    }
}
