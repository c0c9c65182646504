use std::sync::LazyLock;

use regex::Regex;

use super::{compile, starts_with_any, starts_with_word, Pass};
use crate::context::IndentationContext;
use crate::line::{indented, LineBuffer};

static JOIN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)^(?:(?:LEFT|RIGHT|INNER|OUTER|FULL|CROSS)\s+)*JOIN\b")
});

/// Moves JOIN lines to the column of the FROM they extend.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinPass;

impl Pass for JoinPass {
    fn name(&self) -> &'static str {
        "join"
    }

    fn apply(&self, buffer: LineBuffer, ctx: &mut IndentationContext) -> LineBuffer {
        let views = buffer.views();
        let mut lines = buffer.into_lines();

        for (line, view) in lines.iter_mut().zip(&views) {
            if view.verbatim || view.is_blank() || view.is_comment_only() {
                continue;
            }
            ctx.leave_deeper_than(view.depth);

            if starts_with_word(&view.code, "FROM") {
                ctx.set_anchor(view.depth, view.indent);
            } else if JOIN_LINE.is_match(&view.code) {
                if let Some(from) = ctx.anchor_at(view.depth) {
                    *line = indented(from, line.trim());
                }
            } else if starts_with_any(&view.code, &["SELECT", "WITH"]) {
                ctx.clear_anchor(view.depth);
            }
        }

        LineBuffer::from_lines(lines)
    }
}
