//! API 类型定义
//!
//! 编译和执行的输出类型。

use quill_core::{Program, Value};
use std::rc::Rc;

/// 编译并链接的结果
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// 入口单元在工作区中的下标
    pub unit: u32,
    pub program: Rc<Program>,
}

/// 执行输出
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOutput {
    /// run 函数的返回值
    pub value: Option<Value>,
    /// `Print`/`Println` 的输出
    pub stdout: String,
}
