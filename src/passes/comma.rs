use std::sync::LazyLock;

use regex::Regex;

use super::{compile, Pass};
use crate::context::IndentationContext;
use crate::lexer;
use crate::line::LineBuffer;

/// A trailing comma, a line break, horizontal indentation and the first
/// character of an identifier.
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| compile(r",\n([ \t]+)[A-Za-z_`]"));

/// Converts trailing commas into leading commas: `a,\n    b` becomes
/// `a\n    ,b`. Only lines that continue at a non-zero indent qualify, so
/// the `),` between CTE definitions stays put.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadingCommaPass;

impl Pass for LeadingCommaPass {
    fn name(&self) -> &'static str {
        "leading_comma"
    }

    fn apply(&self, buffer: LineBuffer, _ctx: &mut IndentationContext) -> LineBuffer {
        let text = buffer.to_text();
        let masked = lexer::mask(&text);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in TRAILING_COMMA.captures_iter(&masked.code) {
            let (Some(whole), Some(indent)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            out.push('\n');
            out.push_str(&text[indent.start()..indent.end()]);
            out.push(',');
            last = indent.end();
        }

        out.push_str(&text[last..]);
        LineBuffer::from_text(&out)
    }
}
