//! 调用帧、try 守卫与任务

use crate::runtime::fault::Fault;
use crate::runtime::value::Value;
use std::rc::Rc;
use std::time::Duration;

/// 守卫状态：执行 try 体，或正在执行 catch 体
#[derive(Debug, Clone)]
pub enum GuardState {
    Running,
    Caught(Rc<Fault>),
}

/// 一个活动的 try/catch 区域
#[derive(Debug, Clone)]
pub struct Guard {
    /// catch 体的起始指令
    pub catch: usize,
    pub err_slot: Option<u16>,
    /// 进入 try 时操作数栈的高度
    pub stack_len: usize,
    pub state: GuardState,
}

impl Guard {
    pub fn is_running(&self) -> bool {
        matches!(self.state, GuardState::Running)
    }
}

#[derive(Debug)]
pub struct Frame {
    /// `Program::funcs` 中的下标
    pub func: usize,
    pub ip: usize,
    pub locals: Vec<Value>,
    /// 本帧在任务操作数栈上的起点
    pub base: usize,
    /// 调用方提供的可选参数位图
    pub supplied: u64,
    pub guards: Vec<Guard>,
}

impl Frame {
    pub fn new(func: usize, locals: usize, base: usize) -> Self {
        Self {
            func,
            ip: 0,
            locals: vec![Value::Int(0); locals],
            base,
            supplied: 0,
            guards: Vec::new(),
        }
    }
}

/// 一个执行线程：自己的调用栈与操作数栈
#[derive(Debug)]
pub struct Task {
    /// 0 是主任务
    pub id: usize,
    pub frames: Vec<Frame>,
    pub stack: Vec<Value>,
    /// `sleep` 设置的挂起时长，在下一个挂起点被调度器取走
    pub sleep: Option<Duration>,
}

impl Task {
    pub fn new(id: usize, frame: Frame) -> Self {
        Self {
            id,
            frames: vec![frame],
            stack: Vec::with_capacity(64),
            sleep: None,
        }
    }

    pub fn is_main(&self) -> bool {
        self.id == 0
    }
}
