use std::sync::LazyLock;

use regex::Regex;

use super::{compile, Pass};
use crate::context::IndentationContext;
use crate::lexer;
use crate::line::LineBuffer;

/// Whitespace around separators inside a backtick-quoted path.
static QUOTED_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| compile(r"\s*([-.])\s*"));

/// Two or three dotted parts on one line; parts may contain spaced hyphens.
static DOTTED_CHAIN: LazyLock<Regex> = LazyLock::new(|| {
    let part = r"\w+(?:[ \t]*-[ \t]*\w+)*";
    compile(&format!(r"{part}(?:[ \t]*\.[ \t]*{part}){{1,2}}"))
});

static SPACED_HYPHEN: LazyLock<Regex> = LazyLock::new(|| compile(r"[ \t]*-[ \t]*"));

/// Keywords after which a dotted name is a table reference.
static TABLE_POSITION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(?:FROM|JOIN|INTO|UPDATE|TABLE)[ \t]*$"));

/// Repairs hyphenated BigQuery project names the baseline formatter split
/// apart: `my - project.dataset.table` becomes `my-project.dataset.table`,
/// and whitespace inside backtick paths is removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierPass;

impl Pass for IdentifierPass {
    fn name(&self) -> &'static str {
        "identifier"
    }

    fn apply(&self, buffer: LineBuffer, _ctx: &mut IndentationContext) -> LineBuffer {
        let text = buffer.to_text();
        let text = collapse_quoted_paths(&text);
        let text = join_dotted_chains(&text);
        LineBuffer::from_text(&text)
    }
}

/// Remove whitespace around `-` and `.` inside backtick identifiers.
fn collapse_quoted_paths(text: &str) -> String {
    let masked = lexer::mask(text);
    let code = masked.code.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;

    while i < code.len() {
        if code[i] != b'`' {
            i += 1;
            continue;
        }
        let Some(len) = code[i + 1..].iter().position(|&b| b == b'`') else {
            break;
        };
        let close = i + 1 + len;
        let inner = &text[i + 1..close];
        out.push_str(&text[last..i + 1]);
        out.push_str(&QUOTED_SEPARATOR.replace_all(inner, "$1"));
        last = close;
        i = close + 1;
    }

    out.push_str(&text[last..]);
    out
}

/// Rewrite hyphenated dotted names. Outside table position a hyphen in a
/// later part is indistinguishable from subtraction (`t.a - s.b`), so there
/// only three-part chains with a hyphenated leading part qualify. Where a
/// table name is expected, a hyphen in any part does.
fn join_dotted_chains(text: &str) -> String {
    let masked = lexer::mask(text);
    let code = masked.code.as_str();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for m in DOTTED_CHAIN.find_iter(code) {
        let (start, end) = (m.start(), m.end());
        let before = code[..start].bytes().next_back();
        let after = code[end..].bytes().next();
        if before.is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'`'))
            || after.is_some_and(|b| matches!(b, b'.' | b'`' | b'('))
        {
            continue;
        }

        let parts: Vec<&str> = text[start..end].split('.').collect();
        let qualifies = if parts[0].contains('-') {
            parts.len() == 3 || in_table_position(code, start)
        } else {
            parts.iter().any(|p| p.contains('-')) && in_table_position(code, start)
        };
        if !qualifies {
            continue;
        }

        let rebuilt = parts
            .iter()
            .map(|p| SPACED_HYPHEN.replace_all(p.trim(), "-").into_owned())
            .collect::<Vec<_>>()
            .join(".");
        out.push_str(&text[last..start]);
        out.push_str(&rebuilt);
        last = end;
    }

    out.push_str(&text[last..]);
    out
}

/// True if the chain starting at `start` follows FROM/JOIN/INTO/UPDATE/TABLE,
/// either earlier on its own line or at the end of the previous line.
fn in_table_position(code: &str, start: usize) -> bool {
    let line_start = code[..start].rfind('\n').map_or(0, |p| p + 1);
    let prefix = &code[line_start..start];
    if !prefix.trim().is_empty() {
        return TABLE_POSITION.is_match(prefix.trim_end());
    }
    let previous = code[..line_start.saturating_sub(1)]
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty());
    previous.is_some_and(|l| TABLE_POSITION.is_match(l.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(text: &str) -> String {
        let mut ctx = IndentationContext::new(4);
        IdentifierPass.apply(LineBuffer::from_text(text), &mut ctx).to_text()
    }

    #[test]
    fn test_three_part_name_rejoined() {
        assert_eq!(
            run("SELECT *\nFROM\n    my - project.dataset.table"),
            "SELECT *\nFROM\n    my-project.dataset.table"
        );
    }

    #[test]
    fn test_multiple_hyphens_and_spaced_dots() {
        assert_eq!(
            run("FROM a - b - c . ds . t"),
            "FROM a-b-c.ds.t"
        );
    }

    #[test]
    fn test_quoted_path_collapsed() {
        assert_eq!(
            run("FROM `my - project . dataset.table`"),
            "FROM `my-project.dataset.table`"
        );
    }

    #[test]
    fn test_two_part_only_in_table_position() {
        assert_eq!(run("FROM my - project.dataset"), "FROM my-project.dataset");
        assert_eq!(run("JOIN\n    my - project.ds"), "JOIN\n    my-project.ds");
        assert_eq!(run("SELECT a - t.b"), "SELECT a - t.b");
    }

    #[test]
    fn test_hyphenated_dataset_in_table_position() {
        assert_eq!(
            run("SELECT *\nFROM\n    proj.my - ds.tbl"),
            "SELECT *\nFROM\n    proj.my-ds.tbl"
        );
        assert_eq!(
            run("LEFT JOIN a - b.c - d.e ON x"),
            "LEFT JOIN a-b.c-d.e ON x"
        );
        assert_eq!(run("SELECT proj.my - ds.tbl"), "SELECT proj.my - ds.tbl");
    }

    #[test]
    fn test_subtraction_between_columns_untouched() {
        assert_eq!(run("SELECT t.a - s.b"), "SELECT t.a - s.b");
        assert_eq!(run("SELECT x.y - 1"), "SELECT x.y - 1");
    }

    #[test]
    fn test_strings_and_comments_untouched() {
        let input = "SELECT 'my - project.ds.t' -- a - b.c.d\nFROM t";
        assert_eq!(run(input), input);
    }
}
