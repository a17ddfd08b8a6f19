//! 词法错误

use thiserror::Error;

/// 词法错误类型，每一类被拒绝的字符都有独立的错误码
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unknown character")]
    Letter,
    #[error("identifier cannot contain a dot")]
    Ident,
    #[error("the number {0} is out of range")]
    OutOfRange(String),
    #[error("invalid char literal")]
    Char,
    #[error("invalid syntax of double quotes")]
    DoubleQuotes,
    #[error("wrong environment name, expecting ${{NAME}}")]
    EnvName,
    #[error("unclosed comment")]
    Comment,
    #[error("unclosed back quote")]
    BackQuote,
}

/// 词法错误：类型 + 字节偏移
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub offset: usize,
}

impl LexError {
    pub fn new(kind: LexErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}
