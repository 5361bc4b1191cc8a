//! Errors raised while reading view definitions

/// Result alias for SQL structure operations
pub type Result<T> = std::result::Result<T, SqlError>;

/// Error raised by the parser and the inliner
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlError {
    /// An expected structural token is absent
    #[error("malformed SQL: {0}")]
    MalformedInput(Malformed),
}

/// Which structural token was missing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    /// No `CREATE [OR REPLACE] VIEW <name>` header in the text
    #[error("no CREATE VIEW header found")]
    MissingHeader,

    /// A CTE name is not followed by `(`
    #[error("expected '(' after CTE name `{name}`")]
    MissingCteBody { name: String },

    /// The text ended before the parenthesis opened at `offset` was closed
    #[error("parenthesis opened at offset {offset} is never closed")]
    UnclosedParen { offset: usize },

    /// The consumer body has no `FROM` keyword to anchor reference rewriting
    #[error("view `{view}` has no FROM clause")]
    MissingFrom { view: String },
}

impl From<Malformed> for SqlError {
    fn from(reason: Malformed) -> Self {
        SqlError::MalformedInput(reason)
    }
}

impl SqlError {
    /// The missing-token reason behind this error
    pub fn reason(&self) -> &Malformed {
        match self {
            SqlError::MalformedInput(reason) => reason,
        }
    }
}
