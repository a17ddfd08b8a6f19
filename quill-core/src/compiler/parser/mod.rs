//! 语法分析：token 流 → AST

pub mod expr;
pub mod module;
pub mod parser;
pub mod stmt;
pub mod type_expr;
mod utils;

pub use expr::{Arg, BinaryOp, Expr, ExprKind, FieldInit, TemplateSegment, UnaryOp};
pub use module::{
    ConstDecl, ConstItem, Decl, DeclKind, FieldDecl, FnTypeDecl, FuncDecl, ImportItem, Module,
    ParamDecl, PathLit, RunDecl, StructDecl,
};
pub use parser::Parser;
pub use stmt::{AssignOp, Block, Case, Stmt, StmtKind};
pub use type_expr::{TypeExpr, TypeExprKind};
