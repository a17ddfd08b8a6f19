//! 编译前端：语法分析、符号表与多单元管理

pub mod error;
pub mod module;
pub mod parser;
pub mod symbols;

pub use error::{CompileError, ErrorKind};
pub use module::{Program, Workspace};
