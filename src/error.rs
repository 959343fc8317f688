use thiserror::Error;

/// Main error type for tagdex operations
#[derive(Error, Debug)]
pub enum TagdexError {
    #[error("query has {0} unclosed parentheses")]
    UnclosedParens(usize),

    #[error("input is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("input contains a NUL byte at offset {0}")]
    NulByte(usize),

    #[error("invalid metatag name: {0}")]
    InvalidMetatagName(String),
}

/// Result type alias for tagdex operations
pub type Result<T> = std::result::Result<T, TagdexError>;
