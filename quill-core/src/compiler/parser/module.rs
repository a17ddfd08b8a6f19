//! 顶层声明

use super::expr::Expr;
use super::stmt::Block;
use super::type_expr::TypeExpr;

#[derive(Debug, Clone, PartialEq)]
pub struct PathLit {
    pub path: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportItem {
    pub path: PathLit,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstItem {
    pub name: String,
    pub value: Option<Expr>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstDecl {
    /// `const NAME = expr` 或 `const { ... }`
    Items(Vec<ConstItem>),
    /// `const IOTA * 2 { A B C }`：每个名字用递增的 IOTA 求值同一表达式
    Enum {
        expr: Expr,
        names: Vec<(String, usize)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub ty: TypeExpr,
    pub name: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnTypeDecl {
    pub name: String,
    pub params: Vec<TypeExpr>,
    pub ret: Option<TypeExpr>,
}

/// 形参；带 `default` 的是可选参数
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub ty: TypeExpr,
    pub name: String,
    pub default: Option<Expr>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    /// 最后一个形参为 `T name...`
    pub variadic: bool,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunDecl {
    pub ret: Option<TypeExpr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Include(Vec<PathLit>),
    Import(Vec<ImportItem>),
    /// 单独一行的 `pub`
    PubAll,
    Const(ConstDecl),
    Struct(StructDecl),
    FnType(FnTypeDecl),
    Func(FuncDecl),
    Run(RunDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub kind: DeclKind,
    pub public: bool,
    pub offset: usize,
}

/// 一个源文件的 AST
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub decls: Vec<Decl>,
}
