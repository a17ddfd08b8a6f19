//! 全局对象表中的记录

use super::types::{TypeId, TypeObject};
use crate::compiler::parser::{BinaryOp, Expr, UnaryOp};
use crate::runtime::bytecode::Chunk;
use crate::runtime::stdlib::NativeFn;
use crate::runtime::value::Value;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
    pub optional: bool,
}

/// 编译完成的函数体
#[derive(Debug, Clone)]
pub struct FuncCode {
    pub chunk: Rc<Chunk>,
    pub locals: usize,
}

#[derive(Debug, Clone)]
pub struct FuncObject {
    pub name: String,
    pub unit: u32,
    pub public: bool,
    /// 必选参数在前，可选参数（含 `optional {}` 块）在后；变参为最后一个必选参数
    pub params: Vec<Param>,
    pub variadic: bool,
    pub ret: Option<TypeId>,
    /// 局部函数或 go 块生成的函数，不进入命名空间
    pub local: bool,
    pub code: Option<FuncCode>,
}

impl FuncObject {
    pub fn required(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| !p.optional)
    }

    pub fn has_optional(&self) -> bool {
        self.params.iter().any(|p| p.optional)
    }

    /// 重载判定使用的签名
    pub fn signature(&self) -> (Vec<TypeId>, bool) {
        (self.required().map(|p| p.ty).collect(), self.variadic)
    }
}

/// 原生函数绑定的运算类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Call,
    Binary(BinaryOp),
    Unary(UnaryOp),
}

/// 原生函数形参：精确类型或通配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamPattern {
    Exact(TypeId),
    /// `arr*`
    AnyArr,
    /// `map*`
    AnyMap,
    /// `*`
    Any,
}

#[derive(Clone)]
pub struct NativeObject {
    pub name: String,
    pub op: OpKind,
    pub params: Vec<ParamPattern>,
    pub ret: Option<TypeId>,
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeObject")
            .field("name", &self.name)
            .field("op", &self.op)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish()
    }
}

impl NativeObject {
    pub fn is_exact(&self) -> bool {
        self.params
            .iter()
            .all(|p| matches!(p, ParamPattern::Exact(_)))
    }
}

#[derive(Debug, Clone)]
pub enum ConstState {
    /// 尚未求值；`iota` 是枚举块中的序号
    Pending { expr: Expr, iota: Option<i64> },
    /// 正在求值，用于检测循环引用
    Evaluating,
    Ready { value: Value, ty: TypeId },
}

#[derive(Debug, Clone)]
pub struct ConstObject {
    pub name: String,
    pub unit: u32,
    pub public: bool,
    pub offset: usize,
    pub state: ConstState,
}

#[derive(Debug, Clone)]
pub enum Object {
    Func(FuncObject),
    Native(NativeObject),
    Type(TypeObject),
    Const(ConstObject),
}

impl Object {
    pub fn name(&self) -> &str {
        match self {
            Object::Func(f) => &f.name,
            Object::Native(n) => &n.name,
            Object::Type(t) => &t.name,
            Object::Const(c) => &c.name,
        }
    }

    /// 所属单元；原生函数都属于 stdlib 单元
    pub fn unit(&self) -> u32 {
        match self {
            Object::Func(f) => f.unit,
            Object::Native(_) => 0,
            Object::Type(t) => t.unit,
            Object::Const(c) => c.unit,
        }
    }

    pub fn is_public(&self) -> bool {
        match self {
            Object::Func(f) => f.public && !f.local,
            Object::Native(_) => true,
            Object::Type(t) => t.public,
            Object::Const(c) => c.public,
        }
    }

    /// 可被重载的对象（同名共存）
    pub fn is_callable(&self) -> bool {
        matches!(self, Object::Func(_) | Object::Native(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::Func(_) => "func",
            Object::Native(_) => "native",
            Object::Type(_) => "type",
            Object::Const(_) => "const",
        }
    }
}
