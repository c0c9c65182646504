use crate::error::{Result, SqlembedError};

/// Replace the bytes `start..end` of a document with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl TextEdit {
    pub fn replace(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
        }
    }

    /// The edit would not change `document`.
    pub fn is_noop(&self, document: &str) -> bool {
        document.get(self.start..self.end) == Some(self.replacement.as_str())
    }
}

/// Apply a batch of edits in one pass. Offsets refer to the original
/// document; edits may arrive in any order but must not overlap.
pub fn apply_edits(document: &str, mut edits: Vec<TextEdit>) -> Result<String> {
    edits.sort_by_key(|e| (e.start, e.end));

    let mut prev_end = 0;
    for edit in &edits {
        if edit.start > edit.end || edit.end > document.len() {
            return Err(SqlembedError::Edit(format!(
                "edit {}..{} is outside the document ({} bytes)",
                edit.start,
                edit.end,
                document.len()
            )));
        }
        if !document.is_char_boundary(edit.start) || !document.is_char_boundary(edit.end) {
            return Err(SqlembedError::Edit(format!(
                "edit {}..{} splits a character",
                edit.start, edit.end
            )));
        }
        if edit.start < prev_end {
            return Err(SqlembedError::Edit(format!(
                "edit {}..{} overlaps the previous edit ending at {}",
                edit.start, edit.end, prev_end
            )));
        }
        prev_end = edit.end;
    }

    let mut out = String::with_capacity(document.len());
    let mut last = 0;
    for edit in &edits {
        out.push_str(&document[last..edit.start]);
        out.push_str(&edit.replacement);
        last = edit.end;
    }
    out.push_str(&document[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edits_applied_in_offset_order() {
        let doc = "a = 'x'; b = 'y'";
        let edits = vec![
            TextEdit::replace(14, 15, "YY"),
            TextEdit::replace(5, 6, "XX"),
        ];
        assert_eq!(apply_edits(doc, edits).unwrap(), "a = 'XX'; b = 'YY'");
    }

    #[test]
    fn test_overlap_rejected() {
        let edits = vec![TextEdit::replace(0, 5, "a"), TextEdit::replace(3, 6, "b")];
        let err = apply_edits("0123456789", edits).unwrap_err();
        assert!(matches!(err, SqlembedError::Edit(_)));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(apply_edits("abc", vec![TextEdit::replace(2, 9, "")]).is_err());
        assert!(apply_edits("é", vec![TextEdit::replace(1, 2, "")]).is_err());
    }

    #[test]
    fn test_noop_detection() {
        assert!(TextEdit::replace(0, 3, "abc").is_noop("abcdef"));
        assert!(!TextEdit::replace(0, 3, "xyz").is_noop("abcdef"));
        assert_eq!(apply_edits("same", Vec::new()).unwrap(), "same");
    }
}
