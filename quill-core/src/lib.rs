//! Quill Core - 编译器与虚拟机（纯逻辑，不做终端输出）
//!
//! 包含词法分析、语法分析、多单元工作区、链接器与字节码虚拟机。
//! 源码读取通过 `quill-vfs` 抽象完成；配置通过参数显式传入，不使用全局状态。

pub mod compiler;
pub mod kit;
pub mod runtime;

// 常用类型
pub use compiler::{CompileError, ErrorKind, Program, Workspace};
pub use runtime::bytecode::Chunk;
pub use runtime::{run, Fault, FaultKind, RunError, RunOutput, RunSettings, Value};

// 来自 quill-config 的配置类型
pub use quill_config::{CompilerConfig, LimitConfig, VmConfig};
