//! 编译期上下文：每个函数体一份

use crate::compiler::symbols::{ObjectId, TypeId};
use crate::runtime::bytecode::Chunk;

/// 局部变量
#[derive(Debug, Clone)]
pub struct Local {
    /// 隐藏临时变量的名字为空
    pub name: String,
    pub depth: usize,
    pub slot: u16,
    pub ty: TypeId,
}

/// 局部函数，作用域规则与变量相同
#[derive(Debug, Clone)]
pub struct LocalFunc {
    pub name: String,
    pub depth: usize,
    pub id: ObjectId,
}

#[derive(Debug, Clone)]
pub struct LoopCtx {
    /// continue 的目标
    pub start: u32,
    pub breaks: Vec<usize>,
    /// 进入循环时活动的 try 守卫数
    pub guard_depth: usize,
}

#[derive(Debug, Clone)]
pub struct CatchCtx {
    /// try 之外的守卫数；recover/retry 把守卫栈截断到这里
    pub guard_depth: usize,
    /// TryBegin 指令的位置，retry 从这里重新进入
    pub start: u32,
    /// recover 跳转到 try/catch 之后，待补丁
    pub end_patches: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct FnCtx {
    pub chunk: Chunk,
    pub locals: Vec<Local>,
    pub local_funcs: Vec<LocalFunc>,
    pub scope_depth: usize,
    pub next_slot: u16,
    /// 槽位数的峰值，即帧需要的局部变量数
    pub max_slots: u16,
    pub loops: Vec<LoopCtx>,
    pub guard_depth: usize,
    pub catches: Vec<CatchCtx>,
    pub ret: Option<TypeId>,
    pub name: String,
    pub is_run: bool,
}

impl FnCtx {
    pub fn new(name: &str, ret: Option<TypeId>, is_run: bool) -> Self {
        Self {
            name: name.to_string(),
            ret,
            is_run,
            ..Self::default()
        }
    }
}
