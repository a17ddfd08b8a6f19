//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数：编译 → 链接 → 执行

#![allow(dead_code)]

use quill_core::compiler::module::Workspace;
use quill_core::runtime::{run, RunOutput, RunSettings};
use quill_core::{CompileError, ErrorKind, RunError, Value};
use quill_vfs::MemoryFileSystem;

/// 执行错误
#[derive(Debug)]
pub enum ExecError {
    Compile(CompileError),
    Run(RunError),
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Compile(err) => write!(f, "Compile error: {err}"),
            ExecError::Run(err) => write!(f, "Runtime error: {err}"),
        }
    }
}

impl std::error::Error for ExecError {}

/// 以默认设置执行一个单元
///
/// # Example
/// ```ignore
/// let output = run_code("run int { return 1 }").unwrap();
/// assert_eq!(output.value, Some(Value::Int(1)));
/// ```
pub fn run_code(code: &str) -> Result<RunOutput, ExecError> {
    run_with(code, &RunSettings::default())
}

pub fn run_with(code: &str, settings: &RunSettings) -> Result<RunOutput, ExecError> {
    let mut ws = Workspace::with_defaults().map_err(ExecError::Compile)?;
    let unit = ws.compile_source("main.ql", code).map_err(ExecError::Compile)?;
    let program = ws.link(unit).map_err(ExecError::Compile)?;
    run(&program, settings).map_err(ExecError::Run)
}

/// 在内存文件系统中执行 `entry`
pub fn run_files(files: &[(&str, &str)], entry: &str) -> Result<RunOutput, ExecError> {
    let vfs = MemoryFileSystem::with_sources(files.iter().copied());
    let mut ws = Workspace::new(Default::default(), Box::new(vfs)).map_err(ExecError::Compile)?;
    let unit = ws.compile_file(entry).map_err(ExecError::Compile)?;
    let program = ws.link(unit).map_err(ExecError::Compile)?;
    run(&program, &RunSettings::default()).map_err(ExecError::Run)
}

/// 编译必须失败，返回错误类别
pub fn compile_err(code: &str) -> ErrorKind {
    compile_error(code).kind
}

pub fn compile_error(code: &str) -> CompileError {
    let mut ws = Workspace::with_defaults().unwrap();
    match ws.compile_source("main.ql", code) {
        Ok(unit) => match ws.link(unit) {
            Ok(_) => panic!("compilation should fail:\n{code}"),
            Err(err) => err,
        },
        Err(err) => err,
    }
}

/// 运行必须以故障结束
pub fn run_fault(code: &str) -> quill_core::Fault {
    match run_code(code) {
        Err(ExecError::Run(RunError::Fault(fault))) => fault,
        other => panic!("expecting runtime fault, got {other:?}"),
    }
}

/// 返回值
pub fn value(code: &str) -> Value {
    match run_code(code) {
        Ok(output) => output.value.expect("run returned no value"),
        Err(err) => panic!("{err}"),
    }
}

pub fn get_int(code: &str) -> i64 {
    match value(code) {
        Value::Int(v) => v,
        other => panic!("expecting int, got {other:?}"),
    }
}

pub fn get_str(code: &str) -> String {
    match value(code) {
        Value::Str(s) => s.to_string(),
        other => panic!("expecting str, got {other:?}"),
    }
}

pub fn get_bool(code: &str) -> bool {
    match value(code) {
        Value::Bool(b) => b,
        other => panic!("expecting bool, got {other:?}"),
    }
}
