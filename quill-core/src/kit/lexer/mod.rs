//! 词法分析器
//!
//! 输出 token 流、位置索引（字节偏移 → 行列）以及文件头元数据。

pub mod error;
pub mod header;
pub mod position;
pub mod scanner;
pub mod token;

pub use error::{LexError, LexErrorKind};
pub use header::Header;
pub use position::{Coordinate, LineIndex};
pub use scanner::{tokenize, LexOptions, LexOutput};
pub use token::{TemplatePart, Token, TokenKind};
