//! Quill 运行时
//!
//! 字节码定义、单元编译器、值模型、标准库与虚拟机。

// ==================== 核心类型 ====================

/// 字节码与指令块
pub mod bytecode;

/// 运行时故障
pub mod fault;

/// obj 动态值
pub mod object;

/// 值模型与拷贝语义
pub mod value;

// ==================== 实现模块 ====================

/// 单元编译器（AST -> 字节码）
pub mod compiler;

/// 标准库
pub mod stdlib;

/// 虚拟机与调度器
pub mod vm;

pub use crate::compiler::module::Program;
pub use compiler::compile_unit;
pub use fault::{Fault, FaultKind, RunError};
pub use value::Value;
pub use vm::{run, RunOutput, RunSettings};
