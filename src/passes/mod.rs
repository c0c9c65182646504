//! Structural normalization passes.
//!
//! Each pass rewrites the line buffer produced by the baseline formatter
//! and hands the result to the next. Passes only move whitespace and line
//! breaks, with two exceptions: the WHERE pass injects `1 = 1` and `AND`,
//! and the comma pass moves commas to the start of the following line.

mod case;
mod comma;
mod cte;
mod identifier;
mod join;
mod where_clause;

pub use case::CasePass;
pub use comma::LeadingCommaPass;
pub use cte::CtePass;
pub use identifier::IdentifierPass;
pub use join::JoinPass;
pub use where_clause::WherePass;

use regex::Regex;

use crate::context::IndentationContext;
use crate::lexer;
use crate::line::LineBuffer;

/// One line-rewriting stage of the structural normalizer.
pub trait Pass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite `buffer`. `ctx` is fresh for every call.
    fn apply(&self, buffer: LineBuffer, ctx: &mut IndentationContext) -> LineBuffer;
}

/// The passes in the order they must run: CTE, CASE, identifier, WHERE,
/// JOIN, leading comma.
pub fn standard_passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(CtePass),
        Box::new(CasePass),
        Box::new(IdentifierPass),
        Box::new(WherePass),
        Box::new(JoinPass),
        Box::new(LeadingCommaPass),
    ]
}

/// Compile a pattern that is fixed at build time.
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid regex '{}': {}", pattern, e))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// True if `code` begins with `word` as a whole word, ignoring case.
pub(crate) fn starts_with_word(code: &str, word: &str) -> bool {
    let Some(head) = code.get(..word.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(word)
        && code
            .as_bytes()
            .get(word.len())
            .map_or(true, |&b| !is_word_byte(b))
}

/// True if `code` begins with any of `words`.
pub(crate) fn starts_with_any(code: &str, words: &[&str]) -> bool {
    words.iter().any(|w| starts_with_word(code, w))
}

/// Occurrences of `word` as a whole word in masked code.
pub(crate) fn count_word(code: &str, word: &str) -> usize {
    code.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| w.eq_ignore_ascii_case(word))
        .count()
}

/// Net `CASE` openers on a line of masked code.
pub(crate) fn case_delta(code: &str) -> i64 {
    count_word(code, "CASE") as i64 - count_word(code, "END") as i64
}

/// Column of the last `CASE` keyword on a raw line.
pub(crate) fn case_column(line: &str) -> Option<usize> {
    let masked = lexer::mask(line);
    let code = masked.code.as_bytes();
    let mut found = None;
    let mut i = 0;
    while i + 4 <= code.len() {
        let before_ok = i == 0 || !is_word_byte(code[i - 1]);
        let after_ok = code.get(i + 4).map_or(true, |&b| !is_word_byte(b));
        if before_ok && after_ok && code[i..i + 4].eq_ignore_ascii_case(b"CASE") {
            found = Some(line[..i].chars().count());
        }
        i += 1;
    }
    found
}
