//! Quill API - Execution orchestration layer
//!
//! Provides the embedding pipeline:
//! - `compile` / `link` / `run` over an explicit [`Workspace`]
//! - `run_source` / `run_file` one-shot helpers driven by [`RunConfig`]
//! - Unified error handling ([`QuillError`], [`ErrorReport`])
//!
//! For CLI convenience, this crate also keeps a global [`RunConfig`].

use quill_core::runtime::stdlib::NativeFn;
use quill_vfs::{MemoryFileSystem, NativeFileSystem, VirtualFileSystem};
use std::rc::Rc;
use tracing::{debug, info};

const TARGET: &str = "quill::api";

pub mod config;
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};

pub use quill_config::{CompilerConfig, LimitConfig, Phase, QuillConfig, VmConfig};

pub mod error;
pub mod types;
pub use error::{ErrorReport, QuillError};
pub use types::{CompileOutput, ExecuteOutput};

pub use quill_core::{Program, Value, Workspace};

/// 按配置创建工作区
pub fn workspace(config: &RunConfig, vfs: Box<dyn VirtualFileSystem>) -> Result<Workspace, QuillError> {
    Ok(Workspace::new(config.compiler.clone(), vfs)?)
}

/// 编译一段源码，返回单元下标
pub fn compile(ws: &mut Workspace, name: &str, source: &str) -> Result<u32, QuillError> {
    let unit = ws.compile_source(name, source)?;
    debug!(target: TARGET, unit, name, "unit compiled");
    Ok(unit)
}

/// 链接单元及其依赖
pub fn link(ws: &mut Workspace, unit: u32) -> Result<Rc<Program>, QuillError> {
    let program = ws.link(unit)?;
    debug!(
        target: TARGET,
        unit,
        funcs = program.funcs.len(),
        natives = program.natives.len(),
        "unit linked"
    );
    Ok(program)
}

/// 执行已链接的程序
pub fn run(program: &Program, config: &RunConfig) -> Result<ExecuteOutput, QuillError> {
    info!(target: TARGET, timeout_ms = config.vm.timeout_ms, "starting execution");
    let output = quill_core::run(program, &config.settings())?;
    info!(target: TARGET, "execution completed");
    Ok(ExecuteOutput {
        value: output.value,
        stdout: output.output,
    })
}

/// 注册一个命名原生函数
pub fn register_native(
    ws: &mut Workspace,
    name: &str,
    func: NativeFn,
    ins: &str,
    out: &str,
) -> Result<(), QuillError> {
    ws.register_native(name, func, ins, out)?;
    Ok(())
}

fn finish(program: &Program, config: &RunConfig) -> Result<ExecuteOutput, QuillError> {
    if config.dump_bytecode {
        println!("{}", program.disassemble());
    }
    if config.compile_only {
        return Ok(ExecuteOutput {
            value: None,
            stdout: String::new(),
        });
    }
    run(program, config)
}

/// 编译并链接入口文件
pub fn build_file(ws: &mut Workspace, path: &str) -> Result<CompileOutput, QuillError> {
    let unit = ws.compile_file(path)?;
    let program = link(ws, unit)?;
    Ok(CompileOutput { unit, program })
}

/// 编译、链接并执行一段源码（单元名为 `main.ql`）
pub fn run_source(source: &str, config: &RunConfig) -> Result<ExecuteOutput, QuillError> {
    let mut ws = workspace(config, Box::new(MemoryFileSystem::new()))?;
    let unit = compile(&mut ws, "main.ql", source)?;
    let program = link(&mut ws, unit)?;
    finish(&program, config)
}

/// 从本地文件系统读取入口文件并执行
pub fn run_file(path: &str, config: &RunConfig) -> Result<ExecuteOutput, QuillError> {
    let mut ws = workspace(config, Box::new(NativeFileSystem::new()))?;
    let built = build_file(&mut ws, path)?;
    finish(&built.program, config)
}

/// 使用全局配置执行
pub fn quick_run(source: &str) -> Result<ExecuteOutput, QuillError> {
    run_source(source, get_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::runtime::stdlib::NativeCtx;
    use quill_core::{ErrorKind, Fault, RunError};

    fn answer(_: &mut NativeCtx<'_>, _: &[Value]) -> Result<Option<Value>, Fault> {
        Ok(Some(Value::Int(42)))
    }

    #[test]
    fn test_run_source() {
        let output = run_source("run int {\n  Print(\"hi\")\n  return 6 * 7\n}", &RunConfig::default()).unwrap();
        assert_eq!(output.value, Some(Value::Int(42)));
        assert_eq!(output.stdout, "hi");
    }

    #[test]
    fn test_compile_only_skips_execution() {
        let config = RunConfig {
            compile_only: true,
            ..RunConfig::default()
        };
        let output = run_source("run {\n  error(1, \"never\")\n}", &config).unwrap();
        assert_eq!(output.value, None);
    }

    #[test]
    fn test_pipeline_steps() {
        let config = RunConfig::default();
        let mut ws = workspace(&config, Box::new(MemoryFileSystem::new())).unwrap();
        register_native(&mut ws, "Answer", answer, "", "int").unwrap();
        let unit = compile(&mut ws, "main.ql", "run int { return Answer() }").unwrap();
        let program = link(&mut ws, unit).unwrap();
        let output = run(&program, &config).unwrap();
        assert_eq!(output.value, Some(Value::Int(42)));
    }

    #[test]
    fn test_errors_are_unified() {
        let err = run_source("run {\n  x = 1\n}", &RunConfig::default()).unwrap_err();
        assert!(matches!(&err, QuillError::Compile(e) if e.kind == ErrorKind::UnknownIdent("x".into())));
        assert_eq!(err.to_string(), "main.ql:2:3: unknown identifier x");

        let err = run_source("run int { return 1 / 0 }", &RunConfig::default()).unwrap_err();
        assert!(matches!(err, QuillError::Run(RunError::Fault(_))));
        assert_eq!(err.to_report().error_id, Some(3));
    }

    #[test]
    fn test_build_file_from_memory() {
        let vfs = MemoryFileSystem::with_sources([
            ("app/main.ql", "include \"util.ql\"\nrun int { return Util() }"),
            ("app/util.ql", "pub func Util() int { return 9 }"),
        ]);
        let mut ws = workspace(&RunConfig::default(), Box::new(vfs)).unwrap();
        let built = build_file(&mut ws, "app/main.ql").unwrap();
        assert_eq!(ws.unit(built.unit).map(|u| u.path.as_str()), Some("app/main.ql"));
        let output = run(&built.program, &RunConfig::default()).unwrap();
        assert_eq!(output.value, Some(Value::Int(9)));
    }

    #[test]
    fn test_quick_run_uses_global_config() {
        let output = quick_run("run bool { return true }").unwrap();
        assert_eq!(output.value, Some(Value::Bool(true)));
    }
}
