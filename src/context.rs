use smallvec::SmallVec;

/// Column of a governing keyword, tagged with the parenthesis depth it lives at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub depth: usize,
    pub column: usize,
}

/// Ephemeral state threaded through one pass invocation: the anchor columns
/// of governing keywords (`WITH`, `WHERE`, `FROM`, `CASE`) per parenthesis
/// depth, and the number of open `CASE` blocks.
///
/// A fresh context is created for every pass; nothing survives between passes
/// or between spans.
#[derive(Debug, Clone)]
pub struct IndentationContext {
    unit: usize,
    anchors: SmallVec<[Anchor; 8]>,
    case_depth: usize,
}

impl IndentationContext {
    pub fn new(unit: usize) -> Self {
        Self {
            unit: unit.max(1),
            anchors: SmallVec::new(),
            case_depth: 0,
        }
    }

    /// Width of one indentation level.
    pub fn unit(&self) -> usize {
        self.unit
    }

    /// Record `column` as the anchor for `depth`, replacing any previous one
    /// at that depth and discarding anchors nested deeper.
    pub fn set_anchor(&mut self, depth: usize, column: usize) {
        self.leave_deeper_than(depth);
        if let Some(last) = self.anchors.last_mut() {
            if last.depth == depth {
                last.column = column;
                return;
            }
        }
        self.anchors.push(Anchor { depth, column });
    }

    /// The anchor governing lines at exactly `depth`.
    pub fn anchor_at(&self, depth: usize) -> Option<usize> {
        self.anchors
            .iter()
            .rev()
            .find(|a| a.depth == depth)
            .map(|a| a.column)
    }

    /// Forget the anchor at `depth`.
    pub fn clear_anchor(&mut self, depth: usize) {
        self.anchors.retain(|a| a.depth != depth);
    }

    /// Drop anchors belonging to parentheses that have closed.
    pub fn leave_deeper_than(&mut self, depth: usize) {
        while self.anchors.last().is_some_and(|a| a.depth > depth) {
            self.anchors.pop();
        }
    }

    pub fn case_depth(&self) -> usize {
        self.case_depth
    }

    /// Apply the net number of `CASE` openers minus `END`s seen on a line.
    pub fn track_case(&mut self, delta: i64) {
        self.case_depth = (self.case_depth as i64 + delta).max(0) as usize;
    }

    pub fn in_case(&self) -> bool {
        self.case_depth > 0
    }
}
