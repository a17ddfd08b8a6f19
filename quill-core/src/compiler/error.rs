//! 编译错误
//!
//! 所有编译期错误都落到 [`ErrorKind`] 的某一个变体，
//! 最终以 `path:line:column: message` 的形式呈现给调用方。

use crate::kit::lexer::{LexError, LexErrorKind, LineIndex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // ===== 词法 =====
    #[error("unknown character")]
    Letter,
    #[error("identifier cannot contain a dot")]
    Ident,
    #[error("the number {0} is out of range")]
    OutOfRange(String),
    #[error("invalid char literal")]
    Char,
    #[error("invalid syntax of double quotes")]
    DoubleQuotes,
    #[error("wrong environment name, expecting ${{NAME}}")]
    EnvName,
    #[error("unclosed comment")]
    Comment,
    #[error("unclosed back quote")]
    BackQuote,

    // ===== 语法 =====
    #[error("unexpected {0}")]
    Unexpected(String),
    #[error("expecting {expected}, found {found}")]
    Expected { expected: String, found: String },
    #[error("expecting key: value pair")]
    NotKeyValue,
    #[error("key: value pair is not allowed in array")]
    KeyValue,
    #[error("positional argument follows named argument")]
    PositionalAfterNamed,

    // ===== 标识符与声明 =====
    #[error("unknown identifier {0}")]
    UnknownIdent(String),
    #[error("unknown type {0}")]
    UnknownType(String),
    #[error("{0} has already been declared")]
    UsedName(String),
    #[error("type {0} has already been defined")]
    TypeExists(String),
    #[error("{0} has already been declared in another unit")]
    DupObject(String),
    #[error("function {name}({params}) has not been found")]
    Function { name: String, params: String },
    #[error("function {name}({params}) has already been defined")]
    FuncExists { name: String, params: String },
    #[error("run function has already been defined")]
    Run,
    #[error("run function has not been found")]
    NoRun,

    // ===== 可选参数 =====
    #[error("optional parameters must be at the end of the parameter list")]
    EndOptional,
    #[error("optional parameter {0} has been declared twice")]
    TwiceOptional(String),
    #[error("optional parameter {name} must be {expected}, found {found}")]
    TypeOptional {
        name: String,
        expected: String,
        found: String,
    },
    #[error("optional parameters can be declared only at the top level of a function")]
    Optional,
    #[error("function {func} doesn't have optional parameter {name}")]
    FuncOptional { func: String, name: String },

    // ===== fn 类型 =====
    #[error("function {name} returns {found}, fn type {fn_type} expects {expected}")]
    FnReturn {
        name: String,
        fn_type: String,
        expected: String,
        found: String,
    },
    #[error("function {name} doesn't match parameters of fn type {fn_type}")]
    FnCall { name: String, fn_type: String },
    #[error("fn variable cannot refer to variadic function {0}")]
    FnVariadic(String),
    #[error("fn variable cannot refer to built-in function {0}")]
    FnBuildIn(String),
    #[error("fn variable cannot refer to function {0} with optional parameters")]
    FnOptional(String),
    #[error("expecting &name.type")]
    AddrFunc,

    // ===== 局部函数 =====
    #[error("local function {0} cannot be variadic")]
    LocalVariadic(String),
    #[error("local function {0} has already been declared")]
    LocalName(String),

    // ===== 结构体 =====
    #[error("{0} is not a struct type")]
    StructType(String),
    #[error("{ty} type doesn't have {field} field")]
    Struct { ty: String, field: String },
    #[error("there is not {field} field in {ty} struct")]
    WrongField { field: String, ty: String },
    #[error("cannot initialize field {0}")]
    InitField(String),
    #[error("field {0} has been defined twice")]
    StructField(String),
    #[error("cannot assign {found} to {expected}")]
    StructAssign { expected: String, found: String },
    #[error("struct {0} cannot contain itself")]
    RecursiveStruct(String),

    // ===== 常量 =====
    #[error("constant name {0} must be in upper case")]
    ConstName(String),
    #[error("constant {0} must be assigned")]
    MustAssign(String),
    #[error("constant {0} has already been defined")]
    ConstDef(String),
    #[error("IOTA can be used only in constant expressions")]
    Iota,
    #[error("constant expression expected")]
    NotConst,

    // ===== 索引 =====
    #[error("type {0} doesn't support indexing")]
    SupportIndex(String),
    #[error("{ty} cannot be indexed by {index}")]
    TypeIndex { ty: String, index: String },
    #[error("index is missing")]
    NoIndex,
    #[error("only variables can be indexed")]
    VarIndex,

    // ===== 语句 =====
    #[error("break must be inside of while or for")]
    Break,
    #[error("continue must be inside of while or for")]
    Continue,
    #[error("expecting in")]
    ForIn,
    #[error("type {0} cannot be iterated")]
    NotIterable(String),
    #[error("switch doesn't support {0} type")]
    SwitchType(String),
    #[error("expecting case")]
    NotCase,
    #[error("expecting catch")]
    Catch,
    #[error("recover must be inside of catch")]
    Recover,
    #[error("retry must be inside of catch")]
    Retry,
    #[error("parameters of go must be named")]
    GoParam,
    #[error("left operand must be a variable")]
    LValue,
    #[error("function {0} must return a value")]
    MustReturn(String),
    #[error("function {0} doesn't return a value")]
    NoReturnValue(String),

    // ===== 类型检查 =====
    #[error("expecting {expected} type, found {found}")]
    WrongType { expected: String, found: String },
    #[error("boolean expression expected")]
    BoolExp,
    #[error("operands of && and || must be bool")]
    BoolOper,
    #[error("&= requires a variable of the same container type")]
    Alias,

    // ===== 多单元 =====
    #[error("cannot include {path}: {reason}")]
    IncludeFile { path: String, reason: String },
    #[error("incorrect link index {0}")]
    LinkIndex(u32),
    #[error("only plain string literals are allowed here")]
    ImportStr,

    /// 内部不变量被破坏，不属于用户错误
    #[error("you have found a compiler bug [{0}]. Let us know, please")]
    Compiler(String),
}

impl From<LexErrorKind> for ErrorKind {
    fn from(kind: LexErrorKind) -> Self {
        match kind {
            LexErrorKind::Letter => ErrorKind::Letter,
            LexErrorKind::Ident => ErrorKind::Ident,
            LexErrorKind::OutOfRange(text) => ErrorKind::OutOfRange(text),
            LexErrorKind::Char => ErrorKind::Char,
            LexErrorKind::DoubleQuotes => ErrorKind::DoubleQuotes,
            LexErrorKind::EnvName => ErrorKind::EnvName,
            LexErrorKind::Comment => ErrorKind::Comment,
            LexErrorKind::BackQuote => ErrorKind::BackQuote,
        }
    }
}

/// 带字节偏移的错误，尚未解析为行列
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorAt {
    pub kind: ErrorKind,
    pub offset: usize,
}

impl ErrorAt {
    pub fn new(kind: ErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// 通过位置索引解析为完整的编译错误
    pub fn locate(self, path: &str, lines: &LineIndex) -> CompileError {
        let coord = lines.coordinate(self.offset);
        CompileError {
            kind: self.kind,
            path: path.to_string(),
            line: coord.line,
            column: coord.column,
        }
    }
}

impl From<LexError> for ErrorAt {
    fn from(err: LexError) -> Self {
        ErrorAt::new(err.kind.into(), err.offset)
    }
}

/// 编译阶段内部使用的结果类型
pub type CResult<T> = Result<T, ErrorAt>;

/// 对外的编译错误：`path:line:column: message`
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}:{line}:{column}: {kind}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub path: String,
    pub line: usize,
    pub column: usize,
}

impl CompileError {
    /// 无源码位置的错误（例如链接阶段）
    pub fn without_position(kind: ErrorKind, path: &str) -> Self {
        Self {
            kind,
            path: path.to_string(),
            line: 0,
            column: 0,
        }
    }

    /// 是否属于 "compiler bug" 类别
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::Compiler(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let lines = LineIndex::new("run {\n  x = 1\n}");
        let err = ErrorAt::new(ErrorKind::UnknownIdent("x".into()), 8).locate("main.ql", &lines);
        assert_eq!(err.to_string(), "main.ql:2:3: unknown identifier x");
        assert!(!err.is_internal());
    }

    #[test]
    fn test_message_templates() {
        let kind = ErrorKind::FuncExists {
            name: "f".into(),
            params: "int, str".into(),
        };
        assert_eq!(kind.to_string(), "function f(int, str) has already been defined");
        assert_eq!(
            ErrorKind::Compiler("bad slot".into()).to_string(),
            "you have found a compiler bug [bad slot]. Let us know, please"
        );
        assert_eq!(
            ErrorKind::EnvName.to_string(),
            "wrong environment name, expecting ${NAME}"
        );
    }
}
