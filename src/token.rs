use compact_str::CompactString;

/// Position in source string (byte offset).
pub type Pos = usize;

/// All token types recognized by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Bare word: keyword, identifier or function name.
    Word,
    /// Backtick-quoted identifier.
    QuotedName,
    /// String or bytes literal, including any prefix and delimiters.
    String,
    Number,
    Operator,
    Star,
    Comma,
    Dot,
    Semicolon,
    BracketOpen,
    BracketClose,
    SquareOpen,
    SquareClose,
    /// `@param`, `@@system_var` or `?`.
    Parameter,
    /// Host-language interpolation such as `{table}` or `{{ ref }}`.
    Placeholder,
    LineComment,
    BlockComment,
}

impl TokenType {
    pub fn is_comment(self) -> bool {
        matches!(self, Self::LineComment | Self::BlockComment)
    }

    /// Tokens that can end an operand, so a following `-` or `*` is binary.
    pub fn ends_operand(self) -> bool {
        matches!(
            self,
            Self::Word
                | Self::QuotedName
                | Self::String
                | Self::Number
                | Self::BracketClose
                | Self::SquareClose
                | Self::Parameter
                | Self::Placeholder
        )
    }

    /// Tokens that never have a space before them.
    pub fn is_never_preceded_by_space(self) -> bool {
        matches!(
            self,
            Self::Comma | Self::Dot | Self::Semicolon | Self::BracketClose | Self::SquareClose
        )
    }

    /// Tokens that never have a space after them.
    pub fn is_never_followed_by_space(self) -> bool {
        matches!(self, Self::Dot | Self::BracketOpen | Self::SquareOpen)
    }
}

/// An immutable token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub text: CompactString,
    pub spos: Pos,
    pub epos: Pos,
    /// True when a newline separates this token from the previous one in the source.
    pub newline_before: bool,
}

impl Token {
    pub fn new(token_type: TokenType, text: &str, spos: Pos, epos: Pos, newline_before: bool) -> Self {
        Self {
            token_type,
            text: CompactString::from(text),
            spos,
            epos,
            newline_before,
        }
    }

    /// True if this is a bare word equal to `keyword`, ignoring case.
    pub fn is_word(&self, keyword: &str) -> bool {
        self.token_type == TokenType::Word && self.text.eq_ignore_ascii_case(keyword)
    }
}
