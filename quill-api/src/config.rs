//! API 层配置
//!
//! 包含执行配置 RunConfig 和全局单例（供 CLI 使用）

use once_cell::sync::OnceCell;
use quill_config::{CompilerConfig, LimitConfig, QuillConfig, VmConfig};
use quill_core::runtime::stdlib::{native_key, NativeFn};
use quill_core::RunSettings;
use std::collections::HashMap;

/// 执行配置
#[derive(Clone, Default)]
pub struct RunConfig {
    /// 只编译和链接，不执行
    pub compile_only: bool,
    /// 链接后输出反汇编
    pub dump_bytecode: bool,
    pub compiler: CompilerConfig,
    pub limits: LimitConfig,
    pub vm: VmConfig,
    /// 按名字替换原生函数的实现
    pub natives: HashMap<String, NativeFn>,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("compile_only", &self.compile_only)
            .field("dump_bytecode", &self.dump_bytecode)
            .field("compiler", &self.compiler)
            .field("limits", &self.limits)
            .field("vm", &self.vm)
            .field("natives", &self.natives.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RunConfig {
    pub fn from_quill_config(config: &QuillConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            limits: config.limits.clone(),
            vm: config.vm.clone(),
            ..Self::default()
        }
    }

    /// 覆盖一个原生函数；`ins` 与注册时的形参类型串写法相同，如 `"float"`
    pub fn with_native(mut self, name: &str, ins: &str, func: NativeFn) -> Self {
        self.natives.insert(native_key(name, ins), func);
        self
    }

    /// VM 需要的设置
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            vm: self.vm.clone(),
            limits: self.limits.clone(),
            natives: self.natives.clone(),
        }
    }
}

// 全局配置，CLI 启动时设置一次
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// 设置全局配置；已经设置过时原样返回传入的配置
pub fn init(config: RunConfig) -> Result<(), RunConfig> {
    GLOBAL_CONFIG.set(config)
}

/// 全局配置；未设置时使用默认值
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get_or_init(RunConfig::default)
}

pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::runtime::stdlib::NativeCtx;
    use quill_core::{Fault, Value};

    fn noop(_: &mut NativeCtx<'_>, _: &[Value]) -> Result<Option<Value>, Fault> {
        Ok(None)
    }

    #[test]
    fn test_default_run_config() {
        let cfg = RunConfig::default();
        assert!(!cfg.compile_only);
        assert!(!cfg.dump_bytecode);
        assert!(cfg.compiler.emit_debug_info);
        assert_eq!(cfg.vm.timeout_ms, 0);
        assert_eq!(cfg.limits.max_recursion_depth, 256);
    }

    #[test]
    fn test_settings_carry_overrides() {
        let mut cfg = RunConfig::default().with_native("sleep", "int", noop);
        cfg.vm.timeout_ms = 250;
        let settings = cfg.settings();
        assert_eq!(settings.vm.timeout_ms, 250);
        assert!(settings.natives.contains_key("sleep(int)"));
        assert!(format!("{cfg:?}").contains("sleep"));
    }

    #[test]
    fn test_from_quill_config() {
        let mut quill = QuillConfig::default();
        quill.limits.max_set_size = 8;
        quill.compiler.expand_env = false;
        let cfg = RunConfig::from_quill_config(&quill);
        assert_eq!(cfg.limits.max_set_size, 8);
        assert!(!cfg.compiler.expand_env);
    }

    #[test]
    fn test_global_config_is_set_once() {
        // 全局状态在同一进程的测试之间共享
        let current = config();
        assert!(is_initialized());
        assert!(init(RunConfig::default()).is_err());
        assert_eq!(current.vm, config().vm);
    }
}
