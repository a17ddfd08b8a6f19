//! Quill Config - Pure configuration data structures
//!
//! 仅包含数据结构，不含逻辑与全局状态。
//! 作为所有 Quill crate 共享的配置词汇表。

use serde::{Deserialize, Serialize};

/// 编译器行为配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// 是否为每条指令记录源码位置
    pub emit_debug_info: bool,
    /// 是否在词法阶段展开 `${NAME}` 环境变量
    pub expand_env: bool,
    /// include/import 的最大嵌套深度
    pub max_include_depth: usize,
}

/// 执行限制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// 单帧操作数栈上限
    pub max_stack_size: usize,
    /// 最大调用深度
    pub max_recursion_depth: usize,
    /// set 类型可寻址的最大下标（不含）
    pub max_set_size: usize,
}

/// 虚拟机调度配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// 执行超时（毫秒），0 表示不限制
    pub timeout_ms: u64,
    /// 每个任务一次连续执行允许经过的挂起点数量
    pub quantum: u32,
}

/// 顶层配置，对应 package.json 中的同名字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    pub compiler: CompilerConfig,
    pub limits: LimitConfig,
    pub vm: VmConfig,
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Lexer,
    Parser,
    Compiler,
    Linker,
    Vm,
}

impl Phase {
    /// 全部阶段，按流水线顺序
    pub const ALL: [Phase; 5] = [
        Phase::Lexer,
        Phase::Parser,
        Phase::Compiler,
        Phase::Linker,
        Phase::Vm,
    ];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lexer => "lexer",
            Phase::Parser => "parser",
            Phase::Compiler => "compiler",
            Phase::Linker => "linker",
            Phase::Vm => "vm",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> &'static str {
        match self {
            Phase::Lexer => "quill::lexer",
            Phase::Parser => "quill::parser",
            Phase::Compiler => "quill::compiler",
            Phase::Linker => "quill::linker",
            Phase::Vm => "quill::vm",
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            emit_debug_info: true,
            expand_env: true,
            max_include_depth: 64,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 1024,
            max_recursion_depth: 256,
            max_set_size: 1 << 20,
        }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            quantum: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_compiler_config() {
        let cfg = CompilerConfig::default();
        assert!(cfg.emit_debug_info);
        assert!(cfg.expand_env);
    }

    #[test]
    fn test_default_limit_config() {
        let cfg = LimitConfig::default();
        assert_eq!(cfg.max_stack_size, 1024);
        assert_eq!(cfg.max_recursion_depth, 256);
        assert_eq!(cfg.max_set_size, 1 << 20);
    }

    #[test]
    fn test_phase_targets() {
        assert_eq!(Phase::Lexer.as_str(), "lexer");
        assert_eq!(Phase::Vm.target(), "quill::vm");
        assert_eq!(Phase::Linker.target(), "quill::linker");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: QuillConfig =
            serde_json::from_str(r#"{ "vm": { "timeout_ms": 250 } }"#).unwrap();
        assert_eq!(cfg.vm.timeout_ms, 250);
        assert_eq!(cfg.vm.quantum, 64);
        assert_eq!(cfg.limits, LimitConfig::default());
    }
}
