use thiserror::Error;

/// User-facing errors.
#[derive(Error, Debug)]
pub enum SqlembedError {
    /// The baseline formatter could not tokenize or lay out the SQL.
    /// The span it came from is left untouched.
    #[error("sqlembed dialect error at position {position}: {message}")]
    Dialect { position: usize, message: String },

    #[error("sqlembed config error: {0}")]
    Config(String),

    #[error("sqlembed notebook error: {0}")]
    Notebook(String),

    #[error("sqlembed edit error: {0}")]
    Edit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SqlembedError {
    pub(crate) fn dialect(position: usize, message: impl Into<String>) -> Self {
        Self::Dialect {
            position,
            message: message.into(),
        }
    }

    /// True for errors raised by the baseline formatter on unparseable SQL.
    pub fn is_dialect_error(&self) -> bool {
        matches!(self, Self::Dialect { .. })
    }
}

pub type Result<T> = std::result::Result<T, SqlembedError>;
