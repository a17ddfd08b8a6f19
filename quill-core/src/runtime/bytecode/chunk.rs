//! 字节码块

use super::Op;
use crate::runtime::value::Value;
use std::fmt::Write;

/// 跳转占位目标，补丁前不会被执行
pub const UNPATCHED: u32 = u32::MAX;

#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<Op>,
    pub constants: Vec<Value>,
    /// 每条指令对应的源码字节偏移（与 code 一一对应）
    pub offsets: Vec<usize>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入指令，返回其下标
    pub fn emit(&mut self, op: Op, offset: usize) -> usize {
        self.code.push(op);
        self.offsets.push(offset);
        self.code.len() - 1
    }

    /// 下一条指令的下标
    pub fn here(&self) -> u32 {
        self.code.len() as u32
    }

    /// 把 `at` 处指令的跳转目标设为当前位置
    pub fn patch_here(&mut self, at: usize) {
        let here = self.here();
        self.patch(at, here);
    }

    pub fn patch(&mut self, at: usize, target: u32) {
        if let Some(slot) = self.code.get_mut(at).and_then(Op::target_mut) {
            *slot = target;
        }
    }

    pub fn add_constant(&mut self, value: Value) -> u32 {
        if let Some(idx) = self.constants.iter().position(|c| {
            matches!(
                (c, &value),
                (Value::Int(_), Value::Int(_))
                    | (Value::Str(_), Value::Str(_))
                    | (Value::Char(_), Value::Char(_))
                    | (Value::Bool(_), Value::Bool(_))
            ) && *c == value
        }) {
            return idx as u32;
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    /// 反汇编，用于 `--dump-bytecode`
    pub fn disassemble(&self, name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {name} ==");
        for (idx, op) in self.code.iter().enumerate() {
            let _ = match op {
                Op::Const(c) => writeln!(
                    out,
                    "{idx:04} Const {c} ({})",
                    self.constants
                        .get(*c as usize)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                ),
                other => writeln!(out, "{idx:04} {other:?}"),
            };
        }
        out
    }
}
