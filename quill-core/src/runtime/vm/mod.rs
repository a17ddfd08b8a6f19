//! 虚拟机
//!
//! 栈式解释器。每个任务拥有自己的调用栈与操作数栈，
//! 所有任务在同一个 OS 线程上由 [`scheduler::Scheduler`] 协作调度。

mod call;
mod execution;
pub mod frame;
mod index;
pub mod scheduler;

use crate::compiler::module::linker::{Program, TypeInfo};
use crate::runtime::fault::{Fault, RunError};
use crate::runtime::stdlib::NativeFn;
use crate::runtime::value::{shared, BitSet, Value};
use frame::{Frame, Task};
use indexmap::IndexMap;
use quill_config::{LimitConfig, VmConfig};
use scheduler::{Next, Scheduler};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

const TARGET: &str = "quill::vm";

/// `Run` 的设置
#[derive(Clone, Default)]
pub struct RunSettings {
    pub vm: VmConfig,
    pub limits: LimitConfig,
    /// 替换原生函数的实现，键由 [`native_key`](crate::runtime::stdlib::native_key) 生成，如 `int(float)`
    pub natives: HashMap<String, NativeFn>,
}

impl std::fmt::Debug for RunSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSettings")
            .field("vm", &self.vm)
            .field("limits", &self.limits)
            .field("natives", &self.natives.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 执行结果
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// run 函数的返回值
    pub value: Option<Value>,
    /// `Print`/`Println` 输出
    pub output: String,
}

/// 一个时间片的结束方式
#[derive(Debug)]
pub(crate) enum Slice {
    Yield,
    Sleep(Duration),
    Done(Option<Value>),
}

/// 单次运行的共享状态
pub struct Vm<'p> {
    pub(crate) program: &'p Program,
    pub(crate) natives: Vec<NativeFn>,
    pub(crate) limits: LimitConfig,
    pub(crate) quantum: u32,
    pub(crate) deadline: Option<Instant>,
    pub(crate) timeout_ms: u64,
    pub(crate) output: String,
    /// 本时间片内 go 创建的任务
    pub(crate) spawned: Vec<Task>,
    pub(crate) scheduler: Scheduler,
}

impl<'p> Vm<'p> {
    pub fn new(program: &'p Program, settings: &RunSettings) -> Self {
        let natives = program
            .natives
            .iter()
            .map(|n| settings.natives.get(&n.key()).copied().unwrap_or(n.func))
            .collect();
        let deadline = (settings.vm.timeout_ms > 0)
            .then(|| Instant::now() + Duration::from_millis(settings.vm.timeout_ms));
        Self {
            program,
            natives,
            limits: settings.limits.clone(),
            quantum: settings.vm.quantum.max(1),
            deadline,
            timeout_ms: settings.vm.timeout_ms,
            output: String::new(),
            spawned: Vec::new(),
            scheduler: Scheduler::new(),
        }
    }

    /// 类型的零值
    pub(crate) fn zero(&self, ty: usize) -> Result<Value, Fault> {
        let info = self
            .program
            .types
            .get(ty)
            .ok_or_else(|| Fault::internal(format!("type {ty} is not linked")))?;
        Ok(match info {
            TypeInfo::Int => Value::Int(0),
            TypeInfo::Float => Value::Float(0.0),
            TypeInfo::Bool => Value::Bool(false),
            TypeInfo::Char => Value::Char('\0'),
            TypeInfo::Str => Value::str(""),
            TypeInfo::Range => Value::Range(0, 0),
            TypeInfo::Buf => Value::buf(Vec::new()),
            TypeInfo::Set => Value::set(BitSet::default()),
            TypeInfo::Obj => Value::obj(Default::default()),
            TypeInfo::Error => Value::Error(std::rc::Rc::new(Fault::custom(0, ""))),
            TypeInfo::Arr => Value::arr(Vec::new()),
            TypeInfo::Map => Value::map(IndexMap::new()),
            TypeInfo::Fn => Value::Fn(None),
            TypeInfo::Struct(fields) => Value::Struct(shared(
                fields
                    .iter()
                    .map(|ty| self.zero(*ty))
                    .collect::<Result<_, _>>()?,
            )),
        })
    }

    /// 任务当前指令的源码位置
    pub(crate) fn location(&self, task: &Task) -> String {
        match task.frames.last() {
            Some(frame) => self.program.location(frame.func, frame.ip.saturating_sub(1)),
            None => "<unknown>".to_string(),
        }
    }

    pub(crate) fn timeout(&self, task: &Task) -> RunError {
        RunError::Timeout {
            location: self.location(task),
            timeout_ms: self.timeout_ms,
        }
    }

    pub(crate) fn new_frame(&self, func: usize, base: usize) -> Result<Frame, Fault> {
        let linked = self
            .program
            .funcs
            .get(func)
            .ok_or_else(|| Fault::internal(format!("function {func} is not linked")))?;
        Ok(Frame::new(func, linked.locals, base))
    }
}

/// 执行程序的 run 函数
pub fn run(program: &Program, settings: &RunSettings) -> Result<RunOutput, RunError> {
    let mut vm = Vm::new(program, settings);
    let id = vm.scheduler.allocate_id();
    let frame = vm.new_frame(program.entry, 0)?;
    vm.scheduler.push(Task::new(id, frame));
    debug!(
        target: TARGET,
        entry = %program.funcs.get(program.entry).map(|f| f.name.as_str()).unwrap_or("?"),
        timeout_ms = settings.vm.timeout_ms,
        "run started"
    );
    loop {
        let mut task = match vm.scheduler.next(vm.deadline) {
            Next::Run(task) => task,
            Next::Deadline => {
                return Err(RunError::Timeout {
                    location: "<scheduler>".to_string(),
                    timeout_ms: vm.timeout_ms,
                })
            }
            Next::Empty => return Err(RunError::Internal("main task has been lost".into())),
        };
        let slice = execution::execute(&mut vm, &mut task);
        for spawned in std::mem::take(&mut vm.spawned) {
            vm.scheduler.push(spawned);
        }
        match slice? {
            Slice::Yield => vm.scheduler.push(task),
            Slice::Sleep(pause) => vm.scheduler.sleep(task, Instant::now() + pause),
            Slice::Done(value) if task.is_main() => {
                debug!(
                    target: TARGET,
                    abandoned = vm.scheduler.len(),
                    output = vm.output.len(),
                    "run finished"
                );
                return Ok(RunOutput {
                    value,
                    output: vm.output,
                });
            }
            Slice::Done(_) => {}
        }
    }
}
