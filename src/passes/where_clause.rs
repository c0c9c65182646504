use std::sync::LazyLock;

use regex::Regex;

use super::{case_column, case_delta, compile, starts_with_any, starts_with_word, Pass};
use crate::context::IndentationContext;
use crate::lexer::MASK_BYTE;
use crate::line::{indented, leading_spaces, LineBuffer, LineView};

static TAUTOLOGY: LazyLock<Regex> = LazyLock::new(|| compile(r"^1\s*=\s*1$"));

static LEADING_TAUTOLOGY: LazyLock<Regex> = LazyLock::new(|| compile(r"^1\s*=\s*1(?:\s|$)"));

/// Clause keywords that end the conditions of a WHERE.
const CLAUSE_RESET: &[&str] = &[
    "SELECT", "FROM", "GROUP", "ORDER", "HAVING", "LIMIT", "WITH", "QUALIFY", "WINDOW", "UNION",
    "INTERSECT", "EXCEPT",
];

/// Rewrites every WHERE clause into the `WHERE 1 = 1` / `AND <cond>` shape
/// so conditions can be commented out one line at a time, and aligns the
/// following AND/OR lines one unit under their WHERE.
#[derive(Debug, Clone, Copy, Default)]
pub struct WherePass;

impl Pass for WherePass {
    fn name(&self) -> &'static str {
        "where"
    }

    fn apply(&self, buffer: LineBuffer, ctx: &mut IndentationContext) -> LineBuffer {
        let unit = ctx.unit();
        let views = buffer.views();
        let lines = buffer.into_lines();
        let mut out = Vec::with_capacity(lines.len() + 4);
        let mut moved: Option<MovedCase> = None;
        let mut i = 0;

        while i < lines.len() {
            let view = &views[i];
            let raw = &lines[i];
            if let Some(block) = moved.as_mut() {
                if !view.verbatim {
                    block.open += case_delta(&view.code);
                    ctx.track_case(case_delta(&view.code));
                }
                out.push(block.shift(raw));
                if block.open <= 0 {
                    moved = None;
                }
                i += 1;
                continue;
            }
            if view.verbatim || view.is_blank() || view.is_comment_only() {
                out.push(raw.clone());
                i += 1;
                continue;
            }
            ctx.leave_deeper_than(view.depth);

            let mut next = i + 1;
            if starts_with_word(&view.code, "WHERE") {
                ctx.set_anchor(view.depth, view.indent);
                next = rewrite_where(&lines, &views, i, unit, &mut out);
            } else if starts_with_any(&view.code, &["AND", "OR"]) {
                match ctx.anchor_at(view.depth) {
                    Some(w) if !ctx.in_case() => out.push(indented(w + unit, raw.trim())),
                    _ => out.push(raw.clone()),
                }
            } else {
                out.push(raw.clone());
                if starts_with_any(&view.code, CLAUSE_RESET)
                    && ctx.anchor_at(view.depth).is_some_and(|w| view.indent <= w)
                {
                    ctx.clear_anchor(view.depth);
                }
            }

            for view in &views[i..next] {
                if !view.verbatim {
                    ctx.track_case(case_delta(&view.code));
                }
            }
            moved = out
                .last()
                .and_then(|placed| MovedCase::detect(&lines[next - 1], &views[next - 1], placed));
            i = next;
        }

        LineBuffer::from_lines(out)
    }
}

/// A CASE block whose opening line was moved: the rest of the block
/// follows it until its `END`.
struct MovedCase {
    offset: isize,
    open: i64,
}

impl MovedCase {
    fn detect(source: &str, view: &LineView, placed: &str) -> Option<Self> {
        let open = case_delta(&view.code);
        if view.verbatim || open <= 0 {
            return None;
        }
        let offset = case_column(placed)? as isize - case_column(source)? as isize;
        (offset != 0).then_some(Self { offset, open })
    }

    fn shift(&self, raw: &str) -> String {
        if raw.trim().is_empty() {
            return raw.to_string();
        }
        let indent = leading_spaces(raw) as isize + self.offset;
        indented(indent.max(0) as usize, raw.trim_start())
    }
}

/// Emit the normalized form of the WHERE on line `i` and return the index
/// of the first line not consumed.
fn rewrite_where(
    lines: &[String],
    views: &[LineView],
    i: usize,
    unit: usize,
    out: &mut Vec<String>,
) -> usize {
    let view = &views[i];
    let raw = &lines[i];
    let w = view.indent;
    let rest_code = view.code["WHERE".len()..].trim();
    let rest_raw = raw.trim_start()["WHERE".len()..].trim();
    let keyword = &raw.trim_start()[.."WHERE".len()];
    let and = if keyword.bytes().all(|b| b.is_ascii_lowercase()) {
        "and"
    } else {
        "AND"
    };
    // A trailing comment stays on the header line.
    let comment = (!rest_code.is_empty() && rest_code.bytes().all(|b| b == MASK_BYTE))
        .then_some(rest_raw);
    let header = match comment {
        Some(comment) => indented(w, &format!("{} 1 = 1 {}", keyword, comment)),
        None => indented(w, &format!("{} 1 = 1", keyword)),
    };

    if comment.is_none() && !rest_code.is_empty() {
        if LEADING_TAUTOLOGY.is_match(rest_code) || rest_code.starts_with('(') {
            out.push(raw.clone());
        } else {
            out.push(header);
            out.push(indented(w + unit, &format!("{} {}", and, rest_raw)));
        }
        return i + 1;
    }

    let Some(n) = (i + 1..lines.len()).find(|&k| !views[k].is_blank()) else {
        out.push(raw.clone());
        return i + 1;
    };
    let cond = &views[n];
    let leave_alone = cond.verbatim
        || cond.is_comment_only()
        || cond.code.starts_with('(')
        || starts_with_any(&cond.code, CLAUSE_RESET);

    if leave_alone {
        out.push(raw.clone());
        i + 1
    } else if TAUTOLOGY.is_match(cond.code_before_comment()) {
        match comment {
            Some(comment) => out.push(indented(
                w,
                &format!("{} {} {}", keyword, lines[n].trim(), comment),
            )),
            None => out.push(format!("{} {}", raw.trim_end(), lines[n].trim())),
        }
        n + 1
    } else if starts_with_any(&cond.code, &["AND", "OR"]) {
        out.push(header);
        n
    } else {
        out.push(header);
        out.push(indented(w + unit, &format!("{} {}", and, lines[n].trim())));
        n + 1
    }
}
