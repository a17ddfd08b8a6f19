//! API 错误类型
//!
//! 提供统一的错误类型和结构化错误报告。

use quill_core::{CompileError, ErrorKind, RunError};
use serde::Serialize;
use thiserror::Error;

/// Quill 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuillError {
    /// 词法、语法、语义或链接错误
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// 运行时错误
    #[error("{0}")]
    Run(#[from] RunError),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),
}

/// 枚举变体名，如 `FuncExists { .. }` → `FuncExists`
fn variant_name(debug: &str) -> String {
    debug
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// `path:line:column` 拆分
fn split_location(location: &str) -> (Option<String>, Option<usize>, Option<usize>) {
    let mut parts = location.rsplitn(3, ':');
    let column = parts.next().and_then(|c| c.parse().ok());
    let line = parts.next().and_then(|l| l.parse().ok());
    match (parts.next(), line, column) {
        (Some(path), Some(line), Some(column)) => (Some(path.to_string()), Some(line), Some(column)),
        _ => (Some(location.to_string()), None, None),
    }
}

impl QuillError {
    /// 错误阶段名称
    pub fn phase(&self) -> &'static str {
        match self {
            QuillError::Compile(err) => match err.kind {
                ErrorKind::Letter
                | ErrorKind::Ident
                | ErrorKind::OutOfRange(_)
                | ErrorKind::Char
                | ErrorKind::DoubleQuotes
                | ErrorKind::EnvName
                | ErrorKind::Comment
                | ErrorKind::BackQuote => "lexer",
                ErrorKind::Unexpected(_)
                | ErrorKind::Expected { .. }
                | ErrorKind::NotKeyValue
                | ErrorKind::KeyValue
                | ErrorKind::PositionalAfterNamed
                | ErrorKind::NotCase
                | ErrorKind::Catch
                | ErrorKind::ForIn
                | ErrorKind::NoIndex
                | ErrorKind::GoParam
                | ErrorKind::ImportStr => "parser",
                ErrorKind::LinkIndex(_) | ErrorKind::NoRun => "linker",
                _ => "compiler",
            },
            QuillError::Run(_) => "runtime",
            QuillError::Config(_) => "config",
        }
    }

    /// 错误行号（如果有）
    pub fn line(&self) -> Option<usize> {
        self.to_report().line
    }

    /// 错误列号（如果有）
    pub fn column(&self) -> Option<usize> {
        self.to_report().column
    }

    /// 转换为结构化错误报告
    ///
    /// 适用于 Web API、LSP 等需要结构化数据的场景。
    ///
    /// # Example
    /// ```ignore
    /// match run_source(source, &config) {
    ///     Err(e) => println!("{}", e.to_report().to_json()),
    ///     Ok(_) => {}
    /// }
    /// ```
    pub fn to_report(&self) -> ErrorReport {
        let phase = self.phase();
        match self {
            QuillError::Compile(err) => {
                let positioned = err.line > 0;
                ErrorReport {
                    phase,
                    path: Some(err.path.clone()),
                    line: positioned.then_some(err.line),
                    column: positioned.then_some(err.column),
                    error_kind: variant_name(&format!("{:?}", err.kind)),
                    error_id: None,
                    message: err.kind.to_string(),
                }
            }
            QuillError::Run(RunError::Fault(fault)) => {
                let (path, line, column) = fault
                    .location
                    .as_deref()
                    .map(split_location)
                    .unwrap_or((None, None, None));
                ErrorReport {
                    phase,
                    path,
                    line,
                    column,
                    error_kind: format!("{:?}", fault.kind),
                    error_id: Some(fault.id),
                    message: fault.message.clone(),
                }
            }
            QuillError::Run(RunError::Timeout { location, .. }) => {
                let (path, line, column) = split_location(location);
                ErrorReport {
                    phase,
                    path,
                    line,
                    column,
                    error_kind: "Timeout".to_string(),
                    error_id: None,
                    message: self.to_string(),
                }
            }
            QuillError::Run(RunError::Internal(message)) => ErrorReport {
                phase,
                path: None,
                line: None,
                column: None,
                error_kind: "Internal".to_string(),
                error_id: None,
                message: message.clone(),
            },
            QuillError::Config(message) => ErrorReport {
                phase,
                path: None,
                line: None,
                column: None,
                error_kind: "Config".to_string(),
                error_id: None,
                message: message.clone(),
            },
        }
    }
}

/// 结构化错误报告
///
/// 上层应用（CLI、Web、LSP）可以根据自己的需求格式化。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: lexer, parser, compiler, linker, runtime, config
    pub phase: &'static str,
    pub path: Option<String>,
    /// 行号（1-based，如果有）
    pub line: Option<usize>,
    /// 列号（1-based，如果有）
    pub column: Option<usize>,
    /// 错误类型（可用于程序化处理）
    pub error_kind: String,
    /// 运行时错误的 ErrID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_id: Option<i64>,
    /// 人类可读的错误消息
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    /// 默认的 CLI 友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.path, self.line, self.column) {
            (Some(path), Some(line), Some(col)) => {
                write!(f, "[{path}:{line}:{col}] {} error: {}", self.phase, self.message)
            }
            _ => write!(f, "[{}] error: {}", self.phase, self.message),
        }
    }
}

impl ErrorReport {
    /// 转换为 JSON 格式（Web API 使用）
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            serde_json::json!({ "phase": self.phase, "message": err.to_string() }).to_string()
        })
    }

    /// 简洁格式（适合终端）
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{Fault, FaultKind};

    fn compile_error(kind: ErrorKind, line: usize, column: usize) -> QuillError {
        QuillError::Compile(CompileError {
            kind,
            path: "main.ql".to_string(),
            line,
            column,
        })
    }

    #[test]
    fn test_compile_error_report() {
        let err = compile_error(
            ErrorKind::FuncExists {
                name: "f".into(),
                params: "int".into(),
            },
            3,
            1,
        );
        assert_eq!(err.phase(), "compiler");
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.column(), Some(1));
        let report = err.to_report();
        assert_eq!(report.error_kind, "FuncExists");
        assert_eq!(report.message, "function f(int) has already been defined");
        assert_eq!(
            report.to_string(),
            "[main.ql:3:1] compiler error: function f(int) has already been defined"
        );
    }

    #[test]
    fn test_phases() {
        assert_eq!(compile_error(ErrorKind::Letter, 1, 1).phase(), "lexer");
        assert_eq!(compile_error(ErrorKind::NotCase, 1, 1).phase(), "parser");
        assert_eq!(compile_error(ErrorKind::NoRun, 0, 0).phase(), "linker");
        assert_eq!(QuillError::Config("x".into()).phase(), "config");
    }

    #[test]
    fn test_unpositioned_error_has_no_line() {
        let err = compile_error(ErrorKind::NoRun, 0, 0);
        assert_eq!(err.line(), None);
        assert_eq!(err.to_report().to_string(), "[linker] error: run function has not been found");
    }

    #[test]
    fn test_fault_report() {
        let fault = Fault::custom(42, "boom").at(|| "lib/a.ql:7:3".to_string());
        let err = QuillError::Run(RunError::Fault(fault));
        let report = err.to_report();
        assert_eq!(report.phase, "runtime");
        assert_eq!(report.path.as_deref(), Some("lib/a.ql"));
        assert_eq!(report.line, Some(7));
        assert_eq!(report.column, Some(3));
        assert_eq!(report.error_kind, "Custom");
        assert_eq!(report.error_id, Some(42));
        assert_eq!(err.to_string(), "lib/a.ql:7:3: boom");
        assert_eq!(report.to_short(), "runtime: boom");
    }

    #[test]
    fn test_json_report() {
        let err = QuillError::Run(RunError::Fault(Fault::new(FaultKind::DivZero, "say \"hi\"")));
        let json = err.to_report().to_json();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["phase"], "runtime");
        assert_eq!(parsed["error_kind"], "DivZero");
        assert_eq!(parsed["error_id"], 3);
        assert_eq!(parsed["message"], "say \"hi\"");
        assert!(parsed["line"].is_null());

        let compile = compile_error(ErrorKind::Break, 2, 5).to_report().to_json();
        assert!(!compile.contains("error_id"));
    }

    #[test]
    fn test_timeout_report() {
        let err = QuillError::Run(RunError::Timeout {
            location: "main.ql:4:9".to_string(),
            timeout_ms: 50,
        });
        let report = err.to_report();
        assert_eq!(report.error_kind, "Timeout");
        assert_eq!(report.line, Some(4));
        assert!(report.message.contains("50 ms"));
    }

    #[test]
    fn test_variant_name() {
        assert_eq!(variant_name("Letter"), "Letter");
        assert_eq!(variant_name("UnknownIdent(\"x\")"), "UnknownIdent");
        assert_eq!(variant_name("Expected { expected: \"a\" }"), "Expected");
    }
}
