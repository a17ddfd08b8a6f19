//! 标准库实现
//!
//! 所有原生函数都通过统一的注册接口进入 stdlib 单元：
//! 名称（或运算类别）、形参类型串 `"int,arr*"`、返回类型名以及实现函数。
//! 运算符绑定进入 [`NativeRegistry`]，命名函数进入 stdlib 命名空间。

pub mod buffer;
pub mod collections;
pub mod convert;
pub mod obj;
pub mod ops;
pub mod registry;
pub mod set;
pub mod system;

pub use registry::{native_key, NativeRegistry};

use crate::compiler::parser::{BinaryOp, UnaryOp};
use crate::compiler::symbols::OpKind;
use crate::runtime::fault::Fault;
use crate::runtime::value::Value;
use quill_config::LimitConfig;
use std::time::Duration;

/// 原生函数执行时可访问的宿主状态
pub struct NativeCtx<'a> {
    /// `Print`/`Println` 的输出缓冲
    pub output: &'a mut String,
    /// `sleep` 写入的挂起时长，由调度器消费
    pub sleep: &'a mut Option<Duration>,
    pub limits: &'a LimitConfig,
}

/// 原生函数指针类型；无返回值的函数返回 `Ok(None)`
pub type NativeFn = fn(&mut NativeCtx<'_>, &[Value]) -> Result<Option<Value>, Fault>;

/// 一条待注册的原生绑定
#[derive(Clone, Copy)]
pub struct NativeDef {
    pub name: &'static str,
    pub op: OpKind,
    pub params: &'static str,
    pub ret: &'static str,
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}) {}", self.name, self.params, self.ret)
    }
}

/// 命名函数
pub(crate) fn call(name: &'static str, params: &'static str, ret: &'static str, func: NativeFn) -> NativeDef {
    NativeDef {
        name,
        op: OpKind::Call,
        params,
        ret,
        func,
    }
}

/// 二元运算符
pub(crate) fn binary(op: BinaryOp, params: &'static str, ret: &'static str, func: NativeFn) -> NativeDef {
    NativeDef {
        name: op.name(),
        op: OpKind::Binary(op),
        params,
        ret,
        func,
    }
}

/// 一元运算符
pub(crate) fn unary(op: UnaryOp, params: &'static str, ret: &'static str, func: NativeFn) -> NativeDef {
    NativeDef {
        name: op.name(),
        op: OpKind::Unary(op),
        params,
        ret,
        func,
    }
}

/// 完整的标准库定义，按模块顺序排列
pub fn definitions() -> Vec<NativeDef> {
    let mut defs = Vec::new();
    ops::register(&mut defs);
    convert::register(&mut defs);
    buffer::register(&mut defs);
    set::register(&mut defs);
    collections::register(&mut defs);
    obj::register(&mut defs);
    system::register(&mut defs);
    defs
}

/// 取第 `idx` 个实参；参数个数由编译器保证，缺失属于内部错误
pub(crate) fn arg(args: &[Value], idx: usize) -> Result<&Value, Fault> {
    args.get(idx)
        .ok_or_else(|| Fault::internal(format!("missing native argument {idx}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// 在独立上下文中调用原生函数
    pub fn invoke(func: NativeFn, args: &[Value]) -> Result<Option<Value>, Fault> {
        let mut output = String::new();
        let mut sleep = None;
        let limits = LimitConfig::default();
        let mut ctx = NativeCtx {
            output: &mut output,
            sleep: &mut sleep,
            limits: &limits,
        };
        func(&mut ctx, args)
    }

    pub fn value(func: NativeFn, args: &[Value]) -> Value {
        invoke(func, args)
            .expect("native call failed")
            .expect("native returned nothing")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::symbols::SymbolTable;

    #[test]
    fn test_every_signature_parses() {
        let mut symbols = SymbolTable::new();
        for def in definitions() {
            registry::parse_params(&mut symbols, def.params)
                .unwrap_or_else(|bad| panic!("{def:?}: unknown type {bad}"));
            registry::parse_ret(&mut symbols, def.ret)
                .unwrap_or_else(|bad| panic!("{def:?}: unknown type {bad}"));
        }
    }
}
