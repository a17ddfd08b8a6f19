//! 通用工具包

pub mod lexer;
