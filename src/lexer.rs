use memchr::{memchr, memchr2};

use crate::dialect::Dialect;
use crate::error::{Result, SqlembedError};
use crate::token::{Pos, Token, TokenType};

/// Filler byte written over the contents of literals and comments by [`mask`].
pub const MASK_BYTE: u8 = b'#';

// ---- Scanners ----
// Each returns the byte length of the construct starting at bytes[0] and
// whether it was properly terminated. Unterminated constructs run to the end.

/// Scan an identifier (word characters: alphanumeric + underscore).
/// Returns byte length of the identifier.
#[inline]
fn scan_word(bytes: &[u8]) -> usize {
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80 {
            i += 1;
        } else {
            break;
        }
    }
    i
}

/// Scan a number: hex literals, decimals with optional fraction and exponent.
fn scan_number(bytes: &[u8]) -> usize {
    let len = bytes.len();
    let mut i = 0;

    if len > 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
        i = 2;
        while i < len && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
        return i;
    }

    while i < len && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < len && bytes[i] == b'.' {
        i += 1;
        while i < len && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < len && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < len && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < len && bytes[j].is_ascii_digit() {
            i = j;
            while i < len && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

/// Scan a quoted literal or identifier with backslash escapes.
fn scan_quoted(bytes: &[u8]) -> (usize, bool) {
    let quote = bytes[0];
    let mut i = 1;
    while i < bytes.len() {
        match memchr2(quote, b'\\', &bytes[i..]) {
            Some(offset) => {
                let pos = i + offset;
                if bytes[pos] == b'\\' {
                    i = pos + 2;
                    continue;
                }
                return (pos + 1, true);
            }
            None => return (bytes.len(), false),
        }
    }
    (bytes.len(), false)
}

/// Scan a triple-quoted string (''' or """).
fn scan_triple_string(bytes: &[u8]) -> (usize, bool) {
    let quote = bytes[0];
    let mut i = 3;
    while i + 2 < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote && bytes[i + 1] == quote && bytes[i + 2] == quote {
            return (i + 3, true);
        }
        i += 1;
    }
    (bytes.len(), false)
}

fn is_triple_quote(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[1] == bytes[0] && bytes[2] == bytes[0]
}

/// Scan a string literal of either quoting style.
fn scan_string(bytes: &[u8]) -> (usize, bool) {
    if is_triple_quote(bytes) {
        scan_triple_string(bytes)
    } else {
        scan_quoted(bytes)
    }
}

/// Scan a line comment up to (not including) the newline.
fn scan_line_comment(bytes: &[u8]) -> usize {
    memchr(b'\n', bytes).unwrap_or(bytes.len())
}

/// Scan a block comment. `bytes` starts at `/*`.
fn scan_block_comment(bytes: &[u8]) -> (usize, bool) {
    let mut i = 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return (i + 2, true);
        }
        i += 1;
    }
    (bytes.len(), false)
}

/// Scan a host interpolation placeholder, `{name}` or `{{ expr }}`, with nesting.
fn scan_placeholder(bytes: &[u8]) -> (usize, bool) {
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return (i + 1, true);
                }
            }
            b'\'' | b'"' => {
                let (len, _) = scan_quoted(&bytes[i..]);
                i += len;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    (bytes.len(), false)
}

/// Scan an operator, preferring the two-character forms.
fn scan_operator(bytes: &[u8]) -> usize {
    if bytes.len() >= 2 {
        match &bytes[..2] {
            b"<=" | b">=" | b"<>" | b"!=" | b"||" | b"<<" | b">>" | b"=>" | b"->" | b"::" => {
                return 2
            }
            _ => {}
        }
    }
    1
}

fn is_line_comment_start(bytes: &[u8], hash_comments: bool) -> bool {
    (bytes.len() >= 2 && bytes[0] == b'-' && bytes[1] == b'-') || (hash_comments && bytes[0] == b'#')
}

fn is_string_prefix(word: &[u8]) -> bool {
    matches!(
        word.to_ascii_lowercase().as_slice(),
        b"r" | b"b" | b"rb" | b"br"
    )
}

/// Tokenize SQL source. Fails on anything the baseline formatter cannot
/// faithfully reproduce: unterminated literals or comments and stray characters.
pub fn tokenize(source: &str, dialect: &dyn Dialect) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let quote_ident = dialect.identifier_quote();
    let hash_comments = dialect.hash_comments();
    let mut tokens: Vec<Token> = Vec::new();
    let mut newline_before = false;
    let mut i: Pos = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let rest = &bytes[i..];

        if b.is_ascii_whitespace() {
            if b == b'\n' {
                newline_before = true;
            }
            i += 1;
            continue;
        }

        let (token_type, len) = if is_line_comment_start(rest, hash_comments) {
            (TokenType::LineComment, scan_line_comment(rest))
        } else if rest.starts_with(b"/*") {
            let (len, closed) = scan_block_comment(rest);
            if !closed {
                return Err(SqlembedError::dialect(i, "unterminated block comment"));
            }
            (TokenType::BlockComment, len)
        } else if b == b'\'' || b == b'"' {
            let (len, closed) = scan_string(rest);
            if !closed {
                return Err(SqlembedError::dialect(i, "unterminated string literal"));
            }
            (TokenType::String, len)
        } else if b == quote_ident {
            let (len, closed) = scan_quoted(rest);
            if !closed {
                return Err(SqlembedError::dialect(i, "unterminated quoted identifier"));
            }
            (TokenType::QuotedName, len)
        } else if b.is_ascii_digit() || (b == b'.' && rest.len() > 1 && rest[1].is_ascii_digit() && !follows_operand(&tokens)) {
            (TokenType::Number, scan_number(rest))
        } else if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 {
            let word_len = scan_word(rest);
            let next = rest.get(word_len).copied();
            if is_string_prefix(&rest[..word_len]) && matches!(next, Some(b'\'') | Some(b'"')) {
                let (len, closed) = scan_string(&rest[word_len..]);
                if !closed {
                    return Err(SqlembedError::dialect(i, "unterminated string literal"));
                }
                (TokenType::String, word_len + len)
            } else {
                (TokenType::Word, word_len)
            }
        } else {
            match b {
                b'(' => (TokenType::BracketOpen, 1),
                b')' => (TokenType::BracketClose, 1),
                b'[' => (TokenType::SquareOpen, 1),
                b']' => (TokenType::SquareClose, 1),
                b',' => (TokenType::Comma, 1),
                b';' => (TokenType::Semicolon, 1),
                b'.' => (TokenType::Dot, 1),
                b'*' => (TokenType::Star, 1),
                b'?' => (TokenType::Parameter, 1),
                b'@' => {
                    let sigils = if rest.len() > 1 && rest[1] == b'@' { 2 } else { 1 };
                    let name_len = scan_word(&rest[sigils..]);
                    if name_len == 0 {
                        return Err(SqlembedError::dialect(i, "parameter without a name"));
                    }
                    (TokenType::Parameter, sigils + name_len)
                }
                b'{' => {
                    let (len, closed) = scan_placeholder(rest);
                    if !closed {
                        return Err(SqlembedError::dialect(i, "unterminated placeholder"));
                    }
                    (TokenType::Placeholder, len)
                }
                b'+' | b'-' | b'/' | b'%' | b'=' | b'<' | b'>' | b'!' | b'|' | b'&' | b'^'
                | b'~' | b':' => (TokenType::Operator, scan_operator(rest)),
                _ => {
                    let ch = source[i..].chars().next().unwrap_or('?');
                    return Err(SqlembedError::dialect(
                        i,
                        format!("unexpected character '{}'", ch),
                    ));
                }
            }
        };

        let text = source[i..i + len].trim_end();
        tokens.push(Token::new(token_type, text, i, i + len, newline_before));
        newline_before = false;
        i += len;
    }

    Ok(tokens)
}

fn follows_operand(tokens: &[Token]) -> bool {
    tokens
        .last()
        .map(|t| t.token_type.ends_operand())
        .unwrap_or(false)
}

/// Source text with literal contents and comments blanked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedText {
    /// Same byte length as the input. String and quoted-identifier delimiters
    /// are kept; their contents and whole comments become [`MASK_BYTE`].
    /// Newlines are always kept.
    pub code: String,
    /// Byte offsets of newlines that sit inside a string or block comment.
    pub literal_newlines: Vec<Pos>,
}

fn blank(out: &mut [u8], from: usize, to: usize, literal_newlines: &mut Vec<Pos>) {
    for (pos, byte) in out.iter_mut().enumerate().take(to).skip(from) {
        if *byte == b'\n' {
            literal_newlines.push(pos);
        } else {
            *byte = MASK_BYTE;
        }
    }
}

/// Mask literals and comments so structural keywords can be matched on the
/// result without false hits. Unlike [`tokenize`] this never fails: an
/// unterminated construct masks to the end of the text.
pub fn mask(text: &str) -> MaskedText {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut literal_newlines = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        match bytes[i] {
            b'\'' | b'"' => {
                let (len, closed) = scan_string(rest);
                let delim = if is_triple_quote(rest) { 3 } else { 1 };
                let inner_end = if closed { i + len - delim } else { i + len };
                blank(&mut out, (i + delim).min(inner_end), inner_end, &mut literal_newlines);
                i += len;
            }
            b'`' => {
                let (len, closed) = scan_quoted(rest);
                let inner_end = if closed { i + len - 1 } else { i + len };
                blank(&mut out, i + 1, inner_end, &mut literal_newlines);
                i += len;
            }
            b'/' if rest.starts_with(b"/*") => {
                let (len, _) = scan_block_comment(rest);
                blank(&mut out, i, i + len, &mut literal_newlines);
                i += len;
            }
            _ if is_line_comment_start(rest, true) => {
                let len = scan_line_comment(rest);
                blank(&mut out, i, i + len, &mut Vec::new());
                i += len;
            }
            _ => i += 1,
        }
    }

    let code = String::from_utf8(out)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    MaskedText {
        code,
        literal_newlines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::BigQuery;

    fn types(sql: &str) -> Vec<TokenType> {
        tokenize(sql, &BigQuery)
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_scan_word() {
        assert_eq!(scan_word(b"hello world"), 5);
        assert_eq!(scan_word(b"foo_bar123+"), 10);
        assert_eq!(scan_word(b"+abc"), 0);
    }

    #[test]
    fn test_scan_number() {
        assert_eq!(scan_number(b"42 "), 2);
        assert_eq!(scan_number(b"3.14)"), 4);
        assert_eq!(scan_number(b"1e10,"), 4);
        assert_eq!(scan_number(b"0xFF "), 4);
    }

    #[test]
    fn test_scan_string() {
        assert_eq!(scan_string(b"'hello' rest"), (7, true));
        assert_eq!(scan_string(b"'it\\'s' rest"), (7, true));
        assert_eq!(scan_string(b"'''a'b''' x"), (9, true));
        assert_eq!(scan_string(b"'open"), (5, false));
    }

    #[test]
    fn test_lex_simple_select() {
        assert_eq!(
            types("SELECT a, b FROM t;"),
            vec![
                TokenType::Word,
                TokenType::Word,
                TokenType::Comma,
                TokenType::Word,
                TokenType::Word,
                TokenType::Word,
                TokenType::Semicolon,
            ]
        );
    }

    #[test]
    fn test_lex_bigquery_literals() {
        let tokens = tokenize("SELECT r'\\d+', b\"x\", `my-project.ds.t`", &BigQuery).unwrap();
        assert_eq!(tokens[1].token_type, TokenType::String);
        assert_eq!(tokens[1].text, "r'\\d+'");
        assert_eq!(tokens[3].token_type, TokenType::String);
        assert_eq!(tokens[5].token_type, TokenType::QuotedName);
        assert_eq!(tokens[5].text, "`my-project.ds.t`");
    }

    #[test]
    fn test_lex_comments_and_newline_flag() {
        let tokens = tokenize("SELECT 1 -- one\n# two\nFROM t", &BigQuery).unwrap();
        assert_eq!(tokens[2].token_type, TokenType::LineComment);
        assert_eq!(tokens[2].text, "-- one");
        assert!(!tokens[2].newline_before);
        assert_eq!(tokens[3].token_type, TokenType::LineComment);
        assert!(tokens[3].newline_before);
        assert!(tokens[4].newline_before);
    }

    #[test]
    fn test_lex_operators_and_parameters() {
        assert_eq!(
            types("a >= @start AND b <> ? AND {table}"),
            vec![
                TokenType::Word,
                TokenType::Operator,
                TokenType::Parameter,
                TokenType::Word,
                TokenType::Word,
                TokenType::Operator,
                TokenType::Parameter,
                TokenType::Word,
                TokenType::Placeholder,
            ]
        );
    }

    #[test]
    fn test_lex_errors() {
        let err = tokenize("SELECT 'open", &BigQuery).unwrap_err();
        assert!(matches!(err, SqlembedError::Dialect { position: 7, .. }));
        assert!(tokenize("SELECT /* open", &BigQuery).is_err());
        assert!(tokenize("SELECT `open", &BigQuery).is_err());
        assert!(tokenize("SELECT $x", &BigQuery).is_err());
        assert!(tokenize("SELECT {open", &BigQuery).is_err());
    }

    #[test]
    fn test_mask_hides_literals_and_comments() {
        let masked = mask("SELECT 'WHERE' AS x -- FROM y\nFROM `a b`");
        assert_eq!(masked.code, "SELECT '#####' AS x #########\nFROM `###`");
        assert!(masked.literal_newlines.is_empty());
    }

    #[test]
    fn test_mask_keeps_newlines_inside_literals() {
        let text = "SELECT '''a\nb''' /* c\nd */ x";
        let masked = mask(text);
        assert_eq!(masked.code.len(), text.len());
        assert_eq!(masked.literal_newlines.len(), 2);
        assert!(masked.code.ends_with(" x"));
    }

    #[test]
    fn test_mask_is_total() {
        let masked = mask("SELECT 'never closed");
        assert_eq!(masked.code, "SELECT '############");
    }
}
