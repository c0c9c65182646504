use super::{case_column, case_delta, starts_with_any, starts_with_word, Pass};
use crate::context::IndentationContext;
use crate::line::{indented, LineBuffer, LineView};

/// Re-indents multi-line CASE blocks against the column of their `CASE`:
/// WHEN/THEN/ELSE one unit in, AND/OR two units in, END back at the anchor.
#[derive(Debug, Clone, Copy, Default)]
pub struct CasePass;

impl Pass for CasePass {
    fn name(&self) -> &'static str {
        "case"
    }

    fn apply(&self, buffer: LineBuffer, ctx: &mut IndentationContext) -> LineBuffer {
        let views = buffer.views();
        let lines = buffer.into_lines();
        let mut out = Vec::with_capacity(lines.len());
        let block = CaseBlock {
            lines: &lines,
            views: &views,
            unit: ctx.unit(),
        };

        let mut i = 0;
        while i < lines.len() {
            if opens_block(&views[i]) {
                ctx.track_case(1);
                i = block.format(i, lines[i].clone(), &mut out, ctx);
            } else {
                out.push(lines[i].clone());
                i += 1;
            }
        }
        LineBuffer::from_lines(out)
    }
}

fn opens_block(view: &LineView) -> bool {
    !view.verbatim && case_delta(&view.code) > 0
}

struct CaseBlock<'a> {
    lines: &'a [String],
    views: &'a [LineView],
    unit: usize,
}

impl CaseBlock<'_> {
    /// Place a line that belongs directly to a block anchored at `anchor`.
    fn place(&self, anchor: usize, raw: &str, code: &str) -> String {
        let trimmed = raw.trim();
        if starts_with_any(code, &["WHEN", "THEN", "ELSE"]) {
            indented(anchor + self.unit, trimmed)
        } else if starts_with_any(code, &["AND", "OR"]) {
            indented(anchor + 2 * self.unit, trimmed)
        } else {
            raw.to_string()
        }
    }

    /// Emit the block opened on line `start` (already placed as `opener`)
    /// and return the index of the first line after its `END`.
    fn format(
        &self,
        start: usize,
        opener: String,
        out: &mut Vec<String>,
        ctx: &mut IndentationContext,
    ) -> usize {
        let Some(anchor) = case_column(&opener) else {
            out.push(opener);
            return start + 1;
        };
        out.push(opener);

        let mut after_when = false;
        let mut j = start + 1;
        while j < self.lines.len() {
            let view = &self.views[j];
            let raw = &self.lines[j];

            if view.verbatim {
                out.push(raw.clone());
                j += 1;
                continue;
            }
            if raw.trim().is_empty() {
                if !after_when {
                    out.push(raw.clone());
                }
                j += 1;
                continue;
            }

            let delta = case_delta(&view.code);
            if delta < 0 {
                let closing = if starts_with_word(&view.code, "END") {
                    indented(anchor, raw.trim())
                } else {
                    self.place(anchor, raw, &view.code)
                };
                out.push(closing);
                ctx.track_case(-1);
                return j + 1;
            }

            let placed = self.place(anchor, raw, &view.code);
            if delta > 0 {
                ctx.track_case(1);
                j = self.format(j, placed, out, ctx);
                after_when = false;
                continue;
            }

            after_when = starts_with_word(&view.code, "WHEN");
            out.push(placed);
            j += 1;
        }
        j
    }
}
