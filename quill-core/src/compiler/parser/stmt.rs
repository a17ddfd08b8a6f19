//! 语句节点

use super::expr::{Arg, BinaryOp, Expr};
use super::module::{FuncDecl, ParamDecl};
use super::type_expr::TypeExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`：值拷贝
    Set,
    /// `&=`：容器别名
    Alias,
    /// `+=` 等
    Compound(BinaryOp),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub values: Vec<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    VarDecl {
        ty: TypeExpr,
        name: String,
        init: Option<Expr>,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        branches: Vec<(Expr, Block)>,
        otherwise: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    For {
        value: String,
        index: Option<String>,
        iter: Expr,
        body: Block,
    },
    Break,
    Continue,
    Block(Block),
    Switch {
        value: Expr,
        cases: Vec<Case>,
        default: Option<Block>,
    },
    Try {
        body: Block,
        err: Option<String>,
        catch: Block,
    },
    Recover,
    Retry,
    Go {
        args: Vec<Arg>,
        body: Block,
    },
    Func(FuncDecl),
    Optional(Vec<ParamDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub offset: usize,
}

impl Stmt {
    pub fn new(kind: StmtKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}
