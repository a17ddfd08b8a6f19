//! 字节码定义
//!
//! 编译器输出的 `func`/`native`/`ty` 操作数是全局对象 id，
//! 链接器把它们改写为 [`crate::runtime::Program`] 中的稠密下标。
//! 跳转目标是指令下标（绝对位置）。

pub mod chunk;

pub use chunk::{Chunk, UNPATCHED};

use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // ===== 常量与局部变量 =====
    Const(u32),
    Load(u16),
    /// 普通赋值：共享容器原地覆盖，否则深拷贝
    Store(u16),
    /// 声明初始化：总是深拷贝并替换槽位
    Init(u16),
    /// 不拷贝直接写入（隐藏临时变量）
    StoreRaw(u16),
    /// `&=`：标记句柄为共享并写入槽位
    Alias(u16),
    Pop,
    Dup,
    Dup2,

    // ===== 控制流 =====
    Jump(u32),
    /// 弹出条件
    JumpIfFalse(u32),
    /// 弹出条件
    JumpIfTrue(u32),
    /// 循环回边，同时是挂起点
    Loop(u32),

    // ===== 调用 =====
    /// 栈上 `argc` 个实参按源码顺序排列，`slots[k]` 是第 k 个实参的形参槽位；
    /// `supplied` 的第 i 位表示第 i 个可选参数已由调用方提供
    Call {
        func: u32,
        argc: u16,
        slots: Rc<[u16]>,
        supplied: u64,
    },
    CallNative {
        native: u32,
        argc: u16,
    },
    /// 栈：fn 值，随后是实参
    CallFn {
        argc: u16,
    },
    MakeFn(u32),
    Go {
        func: u32,
        argc: u16,
    },
    Return,
    ReturnVoid,
    /// 可选参数序言：已提供则跳过默认值计算
    SkipIfSupplied {
        bit: u8,
        end: u32,
    },

    // ===== 容器 =====
    MakeArray(u32),
    /// 栈上是 `count` 对 key, value
    MakeMap(u32),
    /// 栈上的值依次写入 `slots` 指定的字段，其余字段取零值
    MakeStruct {
        ty: u32,
        slots: Rc<[u16]>,
    },
    Zero(u32),
    /// 栈：容器, 键
    Index,
    /// 栈：容器, 键, 值
    SetIndex,
    GetField(u16),
    /// 栈：结构体, 值
    SetField(u16),
    /// 栈：数组, 元素
    Append,
    IterNext {
        coll: u16,
        counter: u16,
        value: u16,
        key: Option<u16>,
        end: u32,
    },

    // ===== try/catch =====
    TryBegin {
        catch: u32,
        err_slot: Option<u16>,
    },
    /// try 体正常结束，弹出守卫
    TryEnd,
    /// catch 体执行完毕且未 recover/retry：重新抛出
    CatchEnd,
    /// 弹出守卫直到剩余 `depth` 个，然后跳到 try/catch 之后
    Recover {
        depth: u16,
        end: u32,
    },
    /// 弹出守卫直到剩余 `depth` 个，然后重新进入 try 体
    Retry {
        depth: u16,
        start: u32,
    },
    /// break/continue 跨越 try 块时使用
    PopGuards(u16),
}

impl Op {
    /// 跳转类指令的目标，供补丁与反汇编使用
    pub fn target_mut(&mut self) -> Option<&mut u32> {
        match self {
            Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) | Op::Loop(t) => Some(t),
            Op::SkipIfSupplied { end, .. }
            | Op::IterNext { end, .. }
            | Op::Recover { end, .. } => Some(end),
            Op::TryBegin { catch, .. } => Some(catch),
            Op::Retry { start, .. } => Some(start),
            _ => None,
        }
    }
}
