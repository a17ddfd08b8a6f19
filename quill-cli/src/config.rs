//! CLI 配置
//!
//! `package.json` 的结构，以及它到 [`RunConfig`] 和 [`LogConfig`] 的转换。

use crate::logging::LogFormat;
use quill_api::RunConfig;
use quill_config::{CompilerConfig, LimitConfig, Phase, VmConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// package.json 结构
#[derive(Debug, Default, Deserialize)]
pub struct PackageJson {
    /// 入口文件路径，相对 package.json 所在目录
    pub entry: String,
    #[serde(default)]
    pub compiler: Option<CompilerSection>,
    #[serde(default)]
    pub limits: Option<LimitConfig>,
    #[serde(default)]
    pub vm: Option<VmConfig>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
}

/// `compiler` 字段
#[derive(Debug, Default, Deserialize)]
pub struct CompilerSection {
    /// 是否仅编译，不执行
    pub compile_only: Option<bool>,
    /// 是否输出反汇编
    pub dump_bytecode: Option<bool>,
    /// 全局日志级别: "silent", "error", "warn", "info", "debug", "trace"
    pub log_level: Option<String>,
    pub emit_debug_info: Option<bool>,
    pub expand_env: Option<bool>,
    pub max_include_depth: Option<usize>,
}

/// `logging` 字段；各阶段级别缺省时沿用全局级别
#[derive(Debug, Default, Deserialize)]
pub struct LoggingSection {
    pub format: Option<LogFormat>,
    pub file: Option<PathBuf>,
    pub lexer: Option<String>,
    pub parser: Option<String>,
    pub compiler: Option<String>,
    pub linker: Option<String>,
    pub vm: Option<String>,
}

/// CLI 日志配置
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub global: LevelFilter,
    pub lexer: Option<LevelFilter>,
    pub parser: Option<LevelFilter>,
    pub compiler: Option<LevelFilter>,
    pub linker: Option<LevelFilter>,
    pub vm: Option<LevelFilter>,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: LevelFilter::WARN,
            lexer: None,
            parser: None,
            compiler: None,
            linker: None,
            vm: None,
            format: LogFormat::Compact,
            file: None,
        }
    }
}

impl LogConfig {
    /// 某个阶段的日志级别
    pub fn level_for(&self, phase: Phase) -> LevelFilter {
        let specific = match phase {
            Phase::Lexer => self.lexer,
            Phase::Parser => self.parser,
            Phase::Compiler => self.compiler,
            Phase::Linker => self.linker,
            Phase::Vm => self.vm,
        };
        specific.unwrap_or(self.global)
    }
}

/// 日志级别字符串；"silent" 关闭日志
pub fn parse_log_level(s: &str) -> Result<LevelFilter, String> {
    match s.to_lowercase().as_str() {
        "silent" | "off" => Ok(LevelFilter::OFF),
        "error" => Ok(LevelFilter::ERROR),
        "warn" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        "trace" => Ok(LevelFilter::TRACE),
        other => Err(format!("未知的日志级别 '{other}'")),
    }
}

fn phase_level(value: &Option<String>) -> Result<Option<LevelFilter>, String> {
    value.as_deref().map(parse_log_level).transpose()
}

/// 读取并解析 package.json
pub fn read_package_json(path: &Path) -> Result<PackageJson, String> {
    if !path.exists() {
        return Err(format!(
            "未找到 '{}'\n\n当前目录不是一个 Quill 项目。\n提示: 创建 '{}' 文件并指定 'entry' 字段",
            path.display(),
            path.display()
        ));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("无法读取 '{}': {}", path.display(), e))?;
    parse_package_json(&content).map_err(|e| format!("解析 '{}' 失败: {}", path.display(), e))
}

pub fn parse_package_json(content: &str) -> Result<PackageJson, String> {
    let package: PackageJson = serde_json::from_str(content).map_err(|e| e.to_string())?;
    if package.entry.trim().is_empty() {
        return Err("'entry' 字段不能为空".to_string());
    }
    Ok(package)
}

/// 入口文件相对 package.json 所在目录
pub fn resolve_entry_path(package_path: &Path, entry: &str) -> PathBuf {
    let base_dir = package_path.parent().unwrap_or(Path::new("."));
    base_dir.join(entry)
}

impl PackageJson {
    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::default();
        if let Some(compiler) = &self.compiler {
            config.compile_only = compiler.compile_only.unwrap_or(false);
            config.dump_bytecode = compiler.dump_bytecode.unwrap_or(false);
            let defaults = CompilerConfig::default();
            config.compiler = CompilerConfig {
                emit_debug_info: compiler.emit_debug_info.unwrap_or(defaults.emit_debug_info),
                expand_env: compiler.expand_env.unwrap_or(defaults.expand_env),
                max_include_depth: compiler
                    .max_include_depth
                    .unwrap_or(defaults.max_include_depth),
            };
        }
        if let Some(limits) = &self.limits {
            config.limits = limits.clone();
        }
        if let Some(vm) = &self.vm {
            config.vm = vm.clone();
        }
        config
    }

    pub fn log_config(&self) -> Result<LogConfig, String> {
        let mut log = LogConfig::default();
        if let Some(level) = self.compiler.as_ref().and_then(|c| c.log_level.as_ref()) {
            log.global = parse_log_level(level)?;
        }
        if let Some(logging) = &self.logging {
            log.lexer = phase_level(&logging.lexer)?;
            log.parser = phase_level(&logging.parser)?;
            log.compiler = phase_level(&logging.compiler)?;
            log.linker = phase_level(&logging.linker)?;
            log.vm = phase_level(&logging.vm)?;
            if let Some(format) = logging.format {
                log.format = format;
            }
            log.file = logging.file.clone();
        }
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_package() {
        let package = parse_package_json(r#"{ "entry": "main.ql" }"#).unwrap();
        let config = package.run_config();
        assert!(!config.compile_only);
        assert_eq!(config.limits, LimitConfig::default());
        assert_eq!(package.log_config().unwrap(), LogConfig::default());
    }

    #[test]
    fn test_empty_entry() {
        assert!(parse_package_json(r#"{ "entry": "  " }"#).is_err());
        assert!(parse_package_json(r#"{ "compiler": {} }"#).is_err());
    }

    #[test]
    fn test_full_package() {
        let package = parse_package_json(
            r#"{
                "entry": "src/main.ql",
                "compiler": { "compile_only": true, "dump_bytecode": true, "log_level": "debug", "max_include_depth": 8 },
                "limits": { "max_recursion_depth": 32 },
                "vm": { "timeout_ms": 500 },
                "logging": { "format": "json", "vm": "trace", "lexer": "silent" }
            }"#,
        )
        .unwrap();
        let config = package.run_config();
        assert!(config.compile_only && config.dump_bytecode);
        assert_eq!(config.compiler.max_include_depth, 8);
        assert!(config.compiler.expand_env);
        assert_eq!(config.limits.max_recursion_depth, 32);
        assert_eq!(config.limits.max_stack_size, LimitConfig::default().max_stack_size);
        assert_eq!(config.vm.timeout_ms, 500);
        assert_eq!(config.vm.quantum, VmConfig::default().quantum);

        let log = package.log_config().unwrap();
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.level_for(Phase::Vm), LevelFilter::TRACE);
        assert_eq!(log.level_for(Phase::Parser), LevelFilter::DEBUG);
        assert_eq!(log.level_for(Phase::Lexer), LevelFilter::OFF);
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(parse_log_level("WARN").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_log_level("silent").unwrap(), LevelFilter::OFF);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_entry_is_relative_to_package() {
        let entry = resolve_entry_path(Path::new("proj/package.json"), "src/main.ql");
        assert_eq!(entry, PathBuf::from("proj/src/main.ql"));
        let entry = resolve_entry_path(Path::new("package.json"), "main.ql");
        assert_eq!(entry, PathBuf::from("main.ql"));
    }
}
