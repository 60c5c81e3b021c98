use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RlpError {
    #[error("empty input")]
    Empty,
    #[error("input truncated")]
    Truncated,
    #[error("non-canonical length encoding")]
    NonCanonicalLength,
    #[error("expected a byte string, found a list")]
    UnexpectedList,
    #[error("expected a list, found a byte string")]
    ExpectedList,
    #[error("trailing bytes after a complete item")]
    TrailingBytes,
    #[error("integer does not fit in the requested width")]
    IntegerTooWide,
    #[error("list has unexpected arity: got {got}, expected {expected}")]
    ArityMismatch { got: usize, expected: usize },
}
