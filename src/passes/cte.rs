use std::sync::LazyLock;

use regex::Regex;

use super::{compile, starts_with_any, starts_with_word, Pass};
use crate::context::IndentationContext;
use crate::line::{indented, leading_spaces, LineBuffer, LineView};

/// `name AS (` at the end of a line, optionally led by `WITH` or a comma.
static OPENER: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)^(?:WITH\s+(?:RECURSIVE\s+)?)?,?\s*(?:\w+|`#*`)\s+AS\s*\($")
});

static BARE_WITH: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)^WITH(?:\s+RECURSIVE)?$"));

/// Pulls CTE definitions flush with their `WITH`: `WITH name AS (` on one
/// line, bodies one unit in, closers at the `WITH` column and one blank
/// line between consecutive definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CtePass;

#[derive(Debug, Clone, Copy)]
struct CteSpan {
    opener: usize,
    closer: usize,
    anchor: usize,
    list: usize,
}

impl Pass for CtePass {
    fn name(&self) -> &'static str {
        "cte"
    }

    fn apply(&self, buffer: LineBuffer, ctx: &mut IndentationContext) -> LineBuffer {
        let unit = ctx.unit();
        let buffer = merge_bare_with(buffer);
        let views = buffer.views();
        let spans = find_spans(&views);
        if spans.is_empty() {
            return buffer;
        }

        let mut lines = buffer.into_lines();
        for span in spans.iter().rev() {
            reindent_span(&mut lines, &views, span, unit);
        }
        LineBuffer::from_lines(normalize_blank_lines(lines, &views, &spans))
    }
}

/// Join a lone `WITH` line with the definition that follows it.
fn merge_bare_with(buffer: LineBuffer) -> LineBuffer {
    let views = buffer.views();
    let lines = buffer.into_lines();
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let view = &views[i];
        if !view.verbatim && BARE_WITH.is_match(&view.code) {
            let next = (i + 1..lines.len()).find(|&j| !views[j].is_blank());
            if let Some(j) = next {
                let candidate = &views[j];
                if !candidate.verbatim
                    && OPENER.is_match(&candidate.code)
                    && !starts_with_word(&candidate.code, "WITH")
                {
                    out.push(format!("{} {}", lines[i].trim_end(), lines[j].trim()));
                    i = j + 1;
                    continue;
                }
            }
        }
        out.push(lines[i].clone());
        i += 1;
    }

    LineBuffer::from_lines(out)
}

/// Locate every CTE definition: its opener line, the line holding its
/// closing parenthesis, and the column of the governing `WITH`.
fn find_spans(views: &[LineView]) -> Vec<CteSpan> {
    // (depth, anchor, id) of each open CTE list.
    let mut lists: Vec<(usize, usize, usize)> = Vec::new();
    let mut next_list = 0;
    let mut spans = Vec::new();

    for (i, view) in views.iter().enumerate() {
        if view.verbatim || view.is_blank() || view.is_comment_only() {
            continue;
        }
        while lists.last().is_some_and(|&(depth, _, _)| depth > view.depth) {
            lists.pop();
        }

        let opens_list = starts_with_word(&view.code, "WITH");
        if opens_list {
            if lists.last().is_some_and(|&(depth, _, _)| depth == view.depth) {
                lists.pop();
            }
            lists.push((view.depth, view.indent, next_list));
            next_list += 1;
        }

        let Some(&(depth, anchor, list)) = lists.last() else {
            continue;
        };
        if depth != view.depth {
            continue;
        }

        if OPENER.is_match(&view.code) {
            if let Some(closer) = find_closer(views, i, depth) {
                spans.push(CteSpan {
                    opener: i,
                    closer,
                    anchor,
                    list,
                });
            }
        } else if !opens_list {
            lists.pop();
        }
    }

    spans
}

/// The first later line at the body's depth that starts with `)`.
fn find_closer(views: &[LineView], opener: usize, depth: usize) -> Option<usize> {
    for (k, view) in views.iter().enumerate().skip(opener + 1) {
        if view.verbatim || view.is_blank() {
            continue;
        }
        if view.depth <= depth {
            return None;
        }
        if view.depth == depth + 1 && view.code.starts_with(')') {
            return Some(k);
        }
    }
    None
}

fn reindent_span(lines: &mut [String], views: &[LineView], span: &CteSpan, unit: usize) {
    let anchor = span.anchor;
    let mut where_indent: Option<usize> = None;

    for k in span.opener + 1..span.closer {
        if views[k].verbatim || lines[k].trim().is_empty() {
            continue;
        }
        let indent = leading_spaces(&lines[k]);
        let new_indent = if indent >= anchor + 2 * unit {
            indent - unit
        } else {
            anchor + unit
        };
        lines[k] = indented(new_indent, lines[k].trim_start());

        let code = &views[k].code;
        if starts_with_word(code, "WHERE") {
            where_indent = Some(new_indent);
        } else if starts_with_any(code, &["AND", "OR"]) {
            if let Some(w) = where_indent {
                if new_indent < w + unit {
                    lines[k] = indented(w + unit, lines[k].trim_start());
                }
            }
        }
    }

    lines[span.opener] = indented(anchor, lines[span.opener].trim_start());
    lines[span.closer] = indented(anchor, lines[span.closer].trim_start());
}

/// No blank lines at the top of a body; exactly one blank line between a
/// `),` closer and the next definition of the same list.
fn normalize_blank_lines(lines: Vec<String>, views: &[LineView], spans: &[CteSpan]) -> Vec<String> {
    let mut drop = vec![false; lines.len()];
    let mut blank_after = vec![false; lines.len()];

    for span in spans {
        for k in span.opener + 1..span.closer {
            if !lines[k].trim().is_empty() {
                break;
            }
            drop[k] = true;
        }
    }

    for prev in spans {
        // Nested lists may sit between two definitions of the same list.
        let Some(next) = spans
            .iter()
            .filter(|s| s.list == prev.list && s.opener > prev.closer)
            .min_by_key(|s| s.opener)
        else {
            continue;
        };
        let separated = views[prev.closer].code_before_comment().ends_with(',')
            || views[next.opener].code.starts_with(',');
        let gap = prev.closer + 1..next.opener;
        if separated && gap.clone().all(|k| lines[k].trim().is_empty()) {
            for k in gap {
                drop[k] = true;
            }
            blank_after[prev.closer] = true;
        }
    }

    let mut out = Vec::with_capacity(lines.len() + spans.len());
    for (k, line) in lines.into_iter().enumerate() {
        if drop[k] {
            continue;
        }
        out.push(line);
        if blank_after[k] {
            out.push(String::new());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(text: &str) -> String {
        let mut ctx = IndentationContext::new(4);
        CtePass.apply(LineBuffer::from_text(text), &mut ctx).to_text()
    }

    #[test]
    fn test_definitions_pulled_to_with_column() {
        let input = "WITH\n    foo AS (\n        SELECT\n            1\n    ),\n    bar AS (\n        SELECT\n            2\n    )\nSELECT\n    *\nFROM\n    foo";
        let expected = "WITH foo AS (\n    SELECT\n        1\n),\n\nbar AS (\n    SELECT\n        2\n)\nSELECT\n    *\nFROM\n    foo";
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_blank_lines_between_definitions_collapse_to_one() {
        let input = "WITH a AS (\n\n    SELECT 1\n),\n\n\nb AS (\n    SELECT 2\n)\nSELECT 3";
        let expected = "WITH a AS (\n    SELECT 1\n),\n\nb AS (\n    SELECT 2\n)\nSELECT 3";
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_where_conditions_stay_below_where() {
        let input = "WITH\n    a AS (\n        SELECT x\n        FROM t\n        WHERE x = 1\n        AND y = 2\n    )\nSELECT * FROM a";
        let expected = "WITH a AS (\n    SELECT x\n    FROM t\n    WHERE x = 1\n        AND y = 2\n)\nSELECT * FROM a";
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_nested_with_in_subquery_uses_its_own_anchor() {
        let input = "SELECT * FROM (\n    WITH\n        a AS (\n            SELECT 1\n        )\n    SELECT * FROM a\n)";
        let expected = "SELECT * FROM (\n    WITH a AS (\n        SELECT 1\n    )\n    SELECT * FROM a\n)";
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_sibling_after_nested_with_gets_blank_line() {
        let input = "WITH\n    a AS (\n        WITH\n            b AS (\n                SELECT\n                    1\n            )\n        SELECT\n            x\n        FROM\n            b\n    ),\n    c AS (\n        SELECT\n            2\n    )\nSELECT\n    3";
        let expected = "WITH a AS (\n    WITH b AS (\n        SELECT\n            1\n    )\n    SELECT\n        x\n    FROM\n        b\n),\n\nc AS (\n    SELECT\n        2\n)\nSELECT\n    3";
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_closer_with_trailing_comment_gets_blank_line() {
        let input = "WITH a AS (\n    SELECT 1\n), -- note\nb AS (\n    SELECT 2\n)\nSELECT 3";
        let expected = "WITH a AS (\n    SELECT 1\n), -- note\n\nb AS (\n    SELECT 2\n)\nSELECT 3";
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_unclosed_definition_is_left_alone() {
        let input = "WITH a AS (\n    SELECT 1)\nSELECT 2";
        assert_eq!(run(input), input);
    }

    #[test]
    fn test_no_cte_is_noop() {
        let input = "SELECT\n    a\nFROM\n    t";
        assert_eq!(run(input), input);
    }
}
