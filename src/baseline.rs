use crate::config::FormatConfig;
use crate::dialect::Dialect;
use crate::error::{Result, SqlembedError};
use crate::lexer;
use crate::line::indent_str;
use crate::token::{Token, TokenType};

/// The generic formatter that runs before structural normalization.
/// Same input and config must always give the same output.
pub trait BaselineFormatter: Send + Sync {
    fn format(&self, sql: &str, config: &FormatConfig) -> Result<String>;
}

/// Token-driven formatter: one clause keyword per line, clause content one
/// indent unit deeper, one item per line after top-level commas.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFormatter;

impl BaselineFormatter for StandardFormatter {
    fn format(&self, sql: &str, config: &FormatConfig) -> Result<String> {
        let dialect = config.dialect()?;
        let tokens = lexer::tokenize(sql, dialect.as_ref())?;
        let items = classify(&tokens, dialect.as_ref(), config);
        Layout::new(config).run(&items, sql.len())
    }
}

/// Layout role of a classified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Clause,
    SetOp,
    Join,
    Logical,
    Between,
    Case,
    When,
    Then,
    Else,
    End,
    Keyword,
    Name,
    Literal,
    Operator,
    Star,
    Comma,
    Dot,
    Semicolon,
    Open,
    Close,
    SquareOpen,
    SquareClose,
    LineComment,
    BlockComment,
}

#[derive(Debug, Clone)]
struct Item {
    role: Role,
    text: String,
    newline_before: bool,
    spos: usize,
    /// A word glued to the bracket that follows it, as in `COUNT(` or `CAST(`.
    callable: bool,
}

/// Keyword phrases, longest first within each leading word.
const PHRASES: &[(&[&str], Role)] = &[
    (&["LEFT", "OUTER", "JOIN"], Role::Join),
    (&["RIGHT", "OUTER", "JOIN"], Role::Join),
    (&["FULL", "OUTER", "JOIN"], Role::Join),
    (&["LEFT", "JOIN"], Role::Join),
    (&["RIGHT", "JOIN"], Role::Join),
    (&["FULL", "JOIN"], Role::Join),
    (&["INNER", "JOIN"], Role::Join),
    (&["CROSS", "JOIN"], Role::Join),
    (&["JOIN"], Role::Join),
    (&["SELECT", "AS", "STRUCT"], Role::Clause),
    (&["SELECT", "DISTINCT"], Role::Clause),
    (&["SELECT"], Role::Clause),
    (&["GROUP", "BY"], Role::Clause),
    (&["ORDER", "BY"], Role::Clause),
    (&["PARTITION", "BY"], Role::Keyword),
    (&["INSERT", "INTO"], Role::Clause),
    (&["INSERT"], Role::Clause),
    (&["DELETE", "FROM"], Role::Clause),
    (&["DELETE"], Role::Clause),
    (&["WITH", "RECURSIVE"], Role::Clause),
    (&["WITH", "OFFSET"], Role::Keyword),
    (&["WITH"], Role::Clause),
    (&["FROM"], Role::Clause),
    (&["WHERE"], Role::Clause),
    (&["HAVING"], Role::Clause),
    (&["QUALIFY"], Role::Clause),
    (&["WINDOW"], Role::Clause),
    (&["LIMIT"], Role::Clause),
    (&["OFFSET"], Role::Clause),
    (&["VALUES"], Role::Clause),
    (&["UPDATE"], Role::Clause),
    (&["SET"], Role::Clause),
    (&["UNION", "ALL"], Role::SetOp),
    (&["UNION", "DISTINCT"], Role::SetOp),
    (&["UNION"], Role::SetOp),
    (&["INTERSECT", "DISTINCT"], Role::SetOp),
    (&["EXCEPT", "DISTINCT"], Role::SetOp),
    (&["AND"], Role::Logical),
    (&["OR"], Role::Logical),
    (&["BETWEEN"], Role::Between),
    (&["CASE"], Role::Case),
    (&["WHEN"], Role::When),
    (&["THEN"], Role::Then),
    (&["ELSE"], Role::Else),
    (&["END"], Role::End),
];

/// Reserved words written like function calls, with no space before `(`.
const CALLABLE_KEYWORDS: &[&str] = &[
    "ARRAY", "CAST", "EXTRACT", "GROUPING", "IF", "STRUCT", "UNNEST",
];

/// Reserved words that are values rather than connectives.
const VALUE_KEYWORDS: &[&str] = &["TRUE", "FALSE", "NULL"];

fn match_phrase(tokens: &[Token], start: usize) -> Option<(usize, Role)> {
    PHRASES.iter().find_map(|(words, role)| {
        let window = tokens.get(start..start + words.len())?;
        let matched = window
            .iter()
            .zip(words.iter())
            .all(|(tok, word)| tok.is_word(word));
        matched.then_some((words.len(), *role))
    })
}

/// Turn tokens into layout items: combine keyword phrases and apply casing.
fn classify(tokens: &[Token], dialect: &dyn Dialect, config: &FormatConfig) -> Vec<Item> {
    let mut items = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let tok = &tokens[i];
        let next = tokens.get(i + 1);
        let item = |role: Role, text: String| Item {
            role,
            text,
            newline_before: tok.newline_before,
            spos: tok.spos,
            callable: false,
        };

        let role = match tok.token_type {
            TokenType::Word => None,
            TokenType::QuotedName | TokenType::Parameter | TokenType::Placeholder => {
                Some(Role::Name)
            }
            TokenType::String | TokenType::Number => Some(Role::Literal),
            TokenType::Operator => Some(Role::Operator),
            TokenType::Star => Some(Role::Star),
            TokenType::Comma => Some(Role::Comma),
            TokenType::Dot => Some(Role::Dot),
            TokenType::Semicolon => Some(Role::Semicolon),
            TokenType::BracketOpen => Some(Role::Open),
            TokenType::BracketClose => Some(Role::Close),
            TokenType::SquareOpen => Some(Role::SquareOpen),
            TokenType::SquareClose => Some(Role::SquareClose),
            TokenType::LineComment => Some(Role::LineComment),
            TokenType::BlockComment => Some(Role::BlockComment),
        };
        if let Some(role) = role {
            items.push(item(role, tok.text.to_string()));
            i += 1;
            continue;
        }

        // Words next to a dot are always identifier parts: `dataset.table`.
        let prev_is_dot = i > 0 && tokens[i - 1].token_type == TokenType::Dot;
        let next_is_dot = next.is_some_and(|t| t.token_type == TokenType::Dot);
        if prev_is_dot || next_is_dot {
            items.push(item(Role::Name, tok.text.to_string()));
            i += 1;
            continue;
        }

        let upper = tok.text.to_ascii_uppercase();
        let next_is_open = next.is_some_and(|t| t.token_type == TokenType::BracketOpen);
        let next_is_square = next.is_some_and(|t| t.token_type == TokenType::SquareOpen);

        // OFFSET(n) inside array subscripts is a function, not a clause.
        let offset_call = upper == "OFFSET" && next_is_open;
        if !offset_call {
            if let Some((len, role)) = match_phrase(tokens, i) {
                let text = tokens[i..i + len]
                    .iter()
                    .map(|t| config.keyword_case.apply(&t.text))
                    .collect::<Vec<_>>()
                    .join(" ");
                items.push(item(role, text));
                i += len;
                continue;
            }
        }

        let mut word = if dialect.is_keyword(&upper) && !offset_call {
            let mut kw = item(Role::Keyword, config.keyword_case.apply(&tok.text));
            let glued = CALLABLE_KEYWORDS.contains(&upper.as_str()) || dialect.is_function(&upper);
            kw.callable = glued && (next_is_open || (next_is_square && upper == "ARRAY"));
            kw
        } else if next_is_open {
            let text = if dialect.is_function(&upper) {
                config.function_case.apply(&tok.text)
            } else if dialect.is_data_type(&upper) {
                config.data_type_case.apply(&tok.text)
            } else {
                tok.text.to_string()
            };
            item(Role::Name, text)
        } else if dialect.is_data_type(&upper) {
            item(Role::Name, config.data_type_case.apply(&tok.text))
        } else {
            item(Role::Name, tok.text.to_string())
        };
        if word.role == Role::Name {
            word.callable = next_is_open;
        }
        items.push(word);
        i += 1;
    }

    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// A query level: clause keywords at `base`, their content one unit deeper.
    /// `close_indent` is the column of the `)` closing a subquery.
    Query {
        base: usize,
        close_indent: Option<usize>,
    },
    /// Parentheses laid out on one line.
    Inline,
    /// An open CASE; `block` cases put WHEN/ELSE/END on their own lines.
    Case { base: usize, block: bool },
}

const ROOT: Frame = Frame::Query {
    base: 0,
    close_indent: None,
};

#[derive(Debug, Default)]
struct OutLine {
    indent: usize,
    text: String,
    comment: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Prev {
    role: Role,
    callable: bool,
    operand: bool,
    unary: bool,
}

struct Layout {
    unit: usize,
    lines_between_queries: usize,
    lines: Vec<OutLine>,
    frames: Vec<Frame>,
    /// The next token starts a new line at this indent.
    pending: Option<usize>,
    blank_before_next: usize,
    prev: Option<Prev>,
    between_pending: bool,
}

impl Layout {
    fn new(config: &FormatConfig) -> Self {
        Self {
            unit: config.indent_unit(),
            lines_between_queries: config.lines_between_queries,
            lines: Vec::new(),
            frames: vec![ROOT],
            pending: None,
            blank_before_next: 0,
            prev: None,
            between_pending: false,
        }
    }

    fn run(mut self, items: &[Item], source_len: usize) -> Result<String> {
        for (idx, item) in items.iter().enumerate() {
            let rest = &items[idx + 1..];
            self.push_item(item, rest)?;
        }
        if self.has_open_brackets() {
            return Err(SqlembedError::dialect(source_len, "unclosed parenthesis"));
        }
        Ok(self.render())
    }

    fn innermost(&self) -> Frame {
        self.frames.last().copied().unwrap_or(ROOT)
    }

    fn has_open_brackets(&self) -> bool {
        self.frames.iter().any(|f| {
            matches!(
                f,
                Frame::Inline
                    | Frame::Query {
                        close_indent: Some(_),
                        ..
                    }
            )
        })
    }

    fn current_indent(&self) -> usize {
        self.lines.last().map(|l| l.indent).unwrap_or(0)
    }

    fn break_line(&mut self, indent: usize) {
        self.pending = Some(indent);
    }

    /// Append `text` to the current line, or start a new one if a break is pending.
    fn emit(&mut self, text: &str, space: bool) {
        let start_new = self.pending.is_some() || self.lines.is_empty();
        if start_new {
            let indent = self.pending.take().unwrap_or(0);
            for _ in 0..std::mem::take(&mut self.blank_before_next) {
                self.lines.push(OutLine::default());
            }
            self.lines.push(OutLine {
                indent,
                text: text.to_string(),
                comment: None,
            });
        } else if let Some(line) = self.lines.last_mut() {
            if space && !line.text.is_empty() {
                line.text.push(' ');
            }
            line.text.push_str(text);
        }
    }

    fn space_before(&self, item: &Item) -> bool {
        let Some(prev) = self.prev else {
            return false;
        };
        match item.role {
            Role::Comma | Role::Dot | Role::Semicolon | Role::Close | Role::SquareClose => false,
            _ if matches!(prev.role, Role::Dot | Role::Open | Role::SquareOpen) => false,
            _ if prev.unary => false,
            Role::Open => !prev.callable,
            Role::SquareOpen => !(prev.operand || prev.callable),
            _ => true,
        }
    }

    fn emit_inline(&mut self, item: &Item) {
        let space = self.space_before(item);
        self.emit(&item.text, space);
    }

    fn prev_is_operand(&self) -> bool {
        self.prev.is_some_and(|p| p.operand)
    }

    fn push_item(&mut self, item: &Item, rest: &[Item]) -> Result<()> {
        let unit = self.unit;
        let mut unary = false;
        let mut operand = false;

        match item.role {
            Role::LineComment => {
                self.line_comment(item);
                return Ok(());
            }
            Role::BlockComment => {
                self.emit(&item.text, !self.lines.is_empty());
                return Ok(());
            }
            Role::Clause => match self.innermost() {
                Frame::Query { base, .. } => {
                    self.between_pending = false;
                    self.break_line(base);
                    self.emit(&item.text, false);
                    self.break_line(base + unit);
                }
                _ => self.emit_inline(item),
            },
            Role::SetOp => match self.innermost() {
                Frame::Query { base, .. } => {
                    self.break_line(base);
                    self.emit(&item.text, false);
                    self.break_line(base);
                }
                _ => self.emit_inline(item),
            },
            Role::Join => match self.innermost() {
                Frame::Query { base, .. } => {
                    self.break_line(base + unit);
                    self.emit(&item.text, false);
                }
                _ => self.emit_inline(item),
            },
            Role::Logical => {
                if self.between_pending {
                    self.between_pending = false;
                    self.emit_inline(item);
                } else {
                    match self.innermost() {
                        Frame::Query { base, .. } => {
                            self.break_line(base + unit);
                            self.emit(&item.text, false);
                        }
                        Frame::Case { base, block: true } => {
                            self.break_line(base + 2 * unit);
                            self.emit(&item.text, false);
                        }
                        _ => self.emit_inline(item),
                    }
                }
            }
            Role::Between => {
                self.emit_inline(item);
                self.between_pending = true;
            }
            Role::Case => match self.innermost() {
                Frame::Inline | Frame::Case { block: false, .. } => {
                    self.emit_inline(item);
                    self.frames.push(Frame::Case {
                        base: 0,
                        block: false,
                    });
                }
                Frame::Case { base, block: true }
                    if self
                        .prev
                        .is_some_and(|p| matches!(p.role, Role::Then | Role::Else)) =>
                {
                    let nested = base + 2 * unit;
                    self.break_line(nested);
                    self.emit(&item.text, false);
                    self.frames.push(Frame::Case {
                        base: nested,
                        block: true,
                    });
                }
                _ => {
                    self.emit_inline(item);
                    let base = self.current_indent();
                    self.frames.push(Frame::Case { base, block: true });
                }
            },
            Role::When | Role::Else => match self.innermost() {
                Frame::Case { base, block: true } => {
                    self.break_line(base + unit);
                    self.emit(&item.text, false);
                }
                _ => self.emit_inline(item),
            },
            Role::End => {
                operand = true;
                match self.innermost() {
                    Frame::Case { base, block: true } => {
                        self.frames.pop();
                        self.break_line(base);
                        self.emit(&item.text, false);
                    }
                    Frame::Case { block: false, .. } => {
                        self.frames.pop();
                        self.emit_inline(item);
                    }
                    _ => self.emit_inline(item),
                }
            }
            Role::Open => {
                let opens_subquery = rest
                    .iter()
                    .find(|it| !matches!(it.role, Role::LineComment | Role::BlockComment))
                    .is_some_and(|it| {
                        let upper = it.text.to_ascii_uppercase();
                        it.role == Role::Clause
                            && (upper.starts_with("SELECT") || upper.starts_with("WITH"))
                    });
                self.emit_inline(item);
                if opens_subquery {
                    let open_indent = self.current_indent();
                    self.frames.push(Frame::Query {
                        base: open_indent + unit,
                        close_indent: Some(open_indent),
                    });
                    self.break_line(open_indent + unit);
                } else {
                    self.frames.push(Frame::Inline);
                }
            }
            Role::Close => {
                operand = true;
                self.close_bracket(item)?;
            }
            Role::Comma => match self.innermost() {
                Frame::Query { base, .. } => {
                    self.attach_comma();
                    self.break_line(base + unit);
                }
                _ => self.emit_inline(item),
            },
            Role::Semicolon => {
                if self.has_open_brackets() {
                    return Err(SqlembedError::dialect(
                        item.spos,
                        "unclosed parenthesis before ';'",
                    ));
                }
                self.emit(&item.text, false);
                self.frames.truncate(1);
                self.between_pending = false;
                self.prev = None;
                if !rest.is_empty() {
                    self.blank_before_next = self.lines_between_queries;
                    self.break_line(0);
                }
                return Ok(());
            }
            Role::Operator => {
                unary = matches!(item.text.as_str(), "-" | "+" | "~" | "!")
                    && !self.prev_is_operand();
                self.emit_inline(item);
            }
            Role::Star => {
                operand = !self.prev_is_operand();
                self.emit_inline(item);
            }
            Role::Name | Role::Literal | Role::SquareClose => {
                operand = true;
                self.emit_inline(item);
            }
            Role::Keyword => {
                operand = VALUE_KEYWORDS
                    .iter()
                    .any(|kw| item.text.eq_ignore_ascii_case(kw));
                self.emit_inline(item);
            }
            Role::Then | Role::Dot | Role::SquareOpen => self.emit_inline(item),
        }

        self.prev = Some(Prev {
            role: item.role,
            callable: item.callable,
            operand,
            unary,
        });
        Ok(())
    }

    fn close_bracket(&mut self, item: &Item) -> Result<()> {
        loop {
            match self.frames.pop() {
                Some(Frame::Case { .. }) => continue,
                Some(Frame::Inline) => {
                    self.emit(&item.text, false);
                    return Ok(());
                }
                Some(Frame::Query {
                    close_indent: Some(indent),
                    ..
                }) => {
                    self.break_line(indent);
                    self.emit(&item.text, false);
                    return Ok(());
                }
                Some(root) => {
                    self.frames.push(root);
                    return Err(SqlembedError::dialect(
                        item.spos,
                        "unbalanced closing parenthesis",
                    ));
                }
                None => {
                    self.frames.push(ROOT);
                    return Err(SqlembedError::dialect(
                        item.spos,
                        "unbalanced closing parenthesis",
                    ));
                }
            }
        }
    }

    /// A comma after a trailing comment (or a comment line) belongs on the
    /// last line that holds SQL, before its comment.
    fn attach_comma(&mut self) {
        let after_break = self.pending.is_some()
            || self
                .lines
                .last()
                .is_some_and(|l| l.text.is_empty() && l.comment.is_some());
        if after_break {
            if let Some(line) = self.lines.iter_mut().rev().find(|l| !l.text.is_empty()) {
                line.text.push(',');
                return;
            }
        }
        self.emit(",", false);
    }

    fn line_comment(&mut self, item: &Item) {
        let own_line = item.newline_before || self.lines.is_empty();
        if own_line {
            let indent = self.pending.unwrap_or_else(|| self.current_indent());
            self.pending = Some(indent);
            self.emit("", false);
            if let Some(line) = self.lines.last_mut() {
                line.comment = Some(item.text.clone());
            }
            self.pending = Some(indent);
        } else {
            let indent = self.current_indent();
            if let Some(line) = self.lines.last_mut() {
                match line.comment.as_mut() {
                    Some(existing) => {
                        existing.push(' ');
                        existing.push_str(&item.text);
                    }
                    None => line.comment = Some(item.text.clone()),
                }
            }
            if self.pending.is_none() {
                self.pending = Some(indent);
            }
        }
    }

    fn render(&self) -> String {
        let rendered: Vec<String> = self
            .lines
            .iter()
            .map(|line| {
                let mut out = String::new();
                if line.text.is_empty() && line.comment.is_none() {
                    return out;
                }
                out.push_str(&indent_str(line.indent));
                out.push_str(&line.text);
                if let Some(comment) = &line.comment {
                    if !line.text.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(comment);
                }
                out.trim_end().to_string()
            })
            .collect();

        let start = rendered.iter().position(|l| !l.is_empty());
        let end = rendered.iter().rposition(|l| !l.is_empty());
        match (start, end) {
            (Some(s), Some(e)) => rendered[s..=e].join("\n"),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordCase;
    use pretty_assertions::assert_eq;

    fn fmt(sql: &str) -> String {
        StandardFormatter
            .format(sql, &FormatConfig::default())
            .unwrap()
    }

    #[test]
    fn test_simple_select() {
        assert_eq!(
            fmt("select a, b from t where x = 1 and y = 2"),
            "SELECT\n    a,\n    b\nFROM\n    t\nWHERE\n    x = 1\n    AND y = 2"
        );
    }

    #[test]
    fn test_cte_layout() {
        assert_eq!(
            fmt("with foo as (select 1) select * from foo"),
            "WITH\n    foo AS (\n        SELECT\n            1\n    )\nSELECT\n    *\nFROM\n    foo"
        );
    }

    #[test]
    fn test_case_layout() {
        assert_eq!(
            fmt("select case when a = 1 and b = 2 then 'x' else 'y' end as c from t"),
            "SELECT\n    CASE\n        WHEN a = 1\n            AND b = 2 THEN 'x'\n        ELSE 'y'\n    END AS c\nFROM\n    t"
        );
    }

    #[test]
    fn test_nested_case_after_then_starts_own_line() {
        assert_eq!(
            fmt("select case when a then case when b then 1 end else 2 end"),
            "SELECT\n    CASE\n        WHEN a THEN\n            CASE\n                WHEN b THEN 1\n            END\n        ELSE 2\n    END"
        );
    }

    #[test]
    fn test_case_inside_function_stays_inline() {
        assert_eq!(
            fmt("select coalesce(case when a then 1 end, 0) from t"),
            "SELECT\n    COALESCE(CASE WHEN a THEN 1 END, 0)\nFROM\n    t"
        );
    }

    #[test]
    fn test_hyphenated_name_gets_spaced() {
        assert_eq!(
            fmt("select * from my-project.dataset.table"),
            "SELECT\n    *\nFROM\n    my - project.dataset.table"
        );
    }

    #[test]
    fn test_joins_and_between() {
        assert_eq!(
            fmt("select a from t left outer join u on t.id = u.id where d between 1 and 2"),
            "SELECT\n    a\nFROM\n    t\n    LEFT OUTER JOIN u ON t.id = u.id\nWHERE\n    d BETWEEN 1 AND 2"
        );
    }

    #[test]
    fn test_unary_minus_and_functions() {
        assert_eq!(
            fmt("select -1, count(*), cast(x as int64), arr[offset(0)] from t"),
            "SELECT\n    -1,\n    COUNT(*),\n    CAST(x AS INT64),\n    arr[OFFSET(0)]\nFROM\n    t"
        );
    }

    #[test]
    fn test_subquery_in_where() {
        assert_eq!(
            fmt("select a from t where a in (select b from u)"),
            "SELECT\n    a\nFROM\n    t\nWHERE\n    a IN (\n        SELECT\n            b\n        FROM\n            u\n    )"
        );
    }

    #[test]
    fn test_statements_separated_by_blank_lines() {
        assert_eq!(fmt("select 1; select 2;"), "SELECT\n    1;\n\n\nSELECT\n    2;");
    }

    #[test]
    fn test_comments_are_kept() {
        assert_eq!(
            fmt("-- top\nselect a -- first\n, b\nfrom t"),
            "-- top\nSELECT\n    a, -- first\n    b\nFROM\n    t"
        );
    }

    #[test]
    fn test_keyword_case_lower() {
        let config = FormatConfig {
            keyword_case: KeywordCase::Lower,
            ..FormatConfig::default()
        };
        let out = StandardFormatter.format("SELECT a FROM t", &config).unwrap();
        assert_eq!(out, "select\n    a\nfrom\n    t");
    }

    #[test]
    fn test_whitespace_insensitive() {
        let a = fmt("select a,b from t");
        let b = fmt("SELECT\n\n   a ,\n b\n FROM     t");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unbalanced_parentheses_fail() {
        let config = FormatConfig::default();
        assert!(StandardFormatter.format("select (1", &config).is_err());
        let err = StandardFormatter.format("select 1)", &config).unwrap_err();
        assert!(err.is_dialect_error());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(fmt("   \n  "), "");
    }

    #[test]
    fn test_placeholders_survive() {
        assert_eq!(
            fmt("select * from {table} where id = @id"),
            "SELECT\n    *\nFROM\n    {table}\nWHERE\n    id = @id"
        );
    }
}
