//! 表达式节点

use super::type_expr::TypeExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    /// `*x`：长度
    Len,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Range,
}

impl BinaryOp {
    /// 运算符对应的函数名，用于错误信息
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Mul => "Mul",
            BinaryOp::Div => "Div",
            BinaryOp::Mod => "Mod",
            BinaryOp::BitAnd => "BitAnd",
            BinaryOp::BitOr => "BitOr",
            BinaryOp::BitXor => "BitXor",
            BinaryOp::Shl => "LShift",
            BinaryOp::Shr => "RShift",
            BinaryOp::Eq => "Equal",
            BinaryOp::NotEq => "NotEqual",
            BinaryOp::Lt => "Less",
            BinaryOp::Le => "LessEqual",
            BinaryOp::Gt => "Greater",
            BinaryOp::Ge => "GreaterEqual",
            BinaryOp::Range => "Range",
        }
    }
}

impl UnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "Sign",
            UnaryOp::Not => "Not",
            UnaryOp::BitNot => "BitNot",
            UnaryOp::Len => "Len",
        }
    }
}

/// 调用实参；`name: value` 形式为命名实参
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
    pub offset: usize,
}

/// 结构体字面量中的 `Field: value`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Template(Vec<TemplateSegment>),
    Ident(String),
    Iota,
    Array(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    StructLit {
        ty: TypeExpr,
        fields: Vec<FieldInit>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Field {
        target: Box<Expr>,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    /// `?(cond, a, b)`
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `&name.FnType`
    AddrFunc {
        name: String,
        fn_type: TypeExpr,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub offset: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// 可以出现在赋值左侧、可以被索引的表达式
    pub fn is_place(&self) -> bool {
        match &self.kind {
            ExprKind::Ident(_) => true,
            ExprKind::Field { target, .. } | ExprKind::Index { target, .. } => target.is_place(),
            _ => false,
        }
    }
}
