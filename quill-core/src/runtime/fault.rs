//! 运行时错误
//!
//! [`Fault`] 可以被 `try/catch` 捕获；[`RunError`] 是交给宿主的最终错误。

use thiserror::Error;

/// 运行时错误分类，`id()` 即脚本中 `ErrID` 的返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// 用户通过 `error(id, msg)` 抛出
    Custom,
    IndexOut,
    DivZero,
    ObjNil,
    ObjValue,
    ObjType,
    InvalidParam,
    ByteOut,
    StackOverflow,
    KeyNotFound,
    FnNil,
    /// VM 内部不变量被破坏，不可捕获
    Internal,
}

impl FaultKind {
    pub fn id(self) -> i64 {
        match self {
            FaultKind::Internal => 0,
            FaultKind::Custom => 1,
            FaultKind::IndexOut => 2,
            FaultKind::DivZero => 3,
            FaultKind::ObjNil => 4,
            FaultKind::ObjValue => 5,
            FaultKind::ObjType => 6,
            FaultKind::InvalidParam => 7,
            FaultKind::ByteOut => 8,
            FaultKind::StackOverflow => 9,
            FaultKind::KeyNotFound => 10,
            FaultKind::FnNil => 11,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub kind: FaultKind,
    pub id: i64,
    pub message: String,
    /// `path:line:column`，抛出时由 VM 填写
    pub location: Option<String>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            id: kind.id(),
            message: message.into(),
            location: None,
        }
    }

    pub fn custom(id: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::new(FaultKind::Custom, message)
        }
    }

    pub fn index_out(index: i64) -> Self {
        Self::new(FaultKind::IndexOut, format!("index out of range [{index}]"))
    }

    pub fn div_zero() -> Self {
        Self::new(FaultKind::DivZero, "divided by zero")
    }

    pub fn obj_nil() -> Self {
        Self::new(FaultKind::ObjNil, "object holds no value")
    }

    pub fn obj_value() -> Self {
        Self::new(FaultKind::ObjValue, "wrong object value")
    }

    pub fn obj_type() -> Self {
        Self::new(FaultKind::ObjType, "unsupported object type")
    }

    pub fn invalid_param() -> Self {
        Self::new(FaultKind::InvalidParam, "invalid value of parameter(s)")
    }

    pub fn byte_out(value: i64) -> Self {
        Self::new(FaultKind::ByteOut, format!("byte value {value} is out of range"))
    }

    pub fn stack_overflow(depth: usize) -> Self {
        Self::new(
            FaultKind::StackOverflow,
            format!("maximum recursion depth {depth} has been reached"),
        )
    }

    pub fn operand_overflow(limit: usize) -> Self {
        Self::new(
            FaultKind::StackOverflow,
            format!("operand stack limit {limit} has been exceeded"),
        )
    }

    pub fn key_not_found(key: &str) -> Self {
        Self::new(FaultKind::KeyNotFound, format!("key {key} has not been found"))
    }

    pub fn fn_nil() -> Self {
        Self::new(FaultKind::FnNil, "fn variable has not been assigned")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Internal, message)
    }

    pub fn is_catchable(&self) -> bool {
        self.kind != FaultKind::Internal
    }

    /// 只在第一次抛出时记录位置，重新抛出保持原位置
    pub fn at(mut self, location: impl FnOnce() -> String) -> Self {
        if self.location.is_none() {
            self.location = Some(location());
        }
        self
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Fault {}

/// `Run` 的错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("{0}")]
    Fault(Fault),
    #[error("you have found a VM bug [{0}]. Let us know, please")]
    Internal(String),
    #[error("{location}: execution has exceeded the timeout of {timeout_ms} ms")]
    Timeout { location: String, timeout_ms: u64 },
}

impl From<Fault> for RunError {
    fn from(fault: Fault) -> Self {
        if fault.is_catchable() {
            RunError::Fault(fault)
        } else {
            RunError::Internal(fault.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_errid_table() {
        assert_eq!(Fault::index_out(3).id, 2);
        assert_eq!(Fault::div_zero().id, 3);
        assert_eq!(Fault::obj_nil().id, 4);
        assert_eq!(Fault::key_not_found("k").id, 10);
        assert_eq!(Fault::fn_nil().id, 11);
        assert_eq!(Fault::custom(77, "boom").id, 77);
    }

    #[test]
    fn test_location_is_sticky() {
        let fault = Fault::div_zero()
            .at(|| "a.ql:1:2".to_string())
            .at(|| "b.ql:9:9".to_string());
        assert_eq!(fault.to_string(), "a.ql:1:2: divided by zero");
    }

    #[test]
    fn test_internal_fault_is_not_catchable() {
        let err: RunError = Fault::internal("bad stack").into();
        assert!(matches!(err, RunError::Internal(_)));
        let err: RunError = Fault::obj_nil().into();
        assert!(matches!(err, RunError::Fault(_)));
    }
}
