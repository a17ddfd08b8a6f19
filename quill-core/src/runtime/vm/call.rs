//! 函数调用、原生调用、go 与返回

use super::frame::Task;
use super::Vm;
use crate::runtime::fault::Fault;
use crate::runtime::stdlib::NativeCtx;
use crate::runtime::value::Value;
use tracing::trace;

const TARGET: &str = "quill::vm";

/// 从操作数栈顶取出 `argc` 个值，保持源码顺序
pub fn take_args(task: &mut Task, argc: usize) -> Result<Vec<Value>, Fault> {
    let len = task.stack.len();
    let floor = task.frames.last().map_or(0, |f| f.base);
    if len < argc || len - argc < floor {
        return Err(Fault::internal("operand stack underflow"));
    }
    Ok(task.stack.split_off(len - argc))
}

/// 压入新帧；实参按 `slots` 写入形参槽位，容器除非已共享否则深拷贝
pub fn call(
    vm: &mut Vm,
    task: &mut Task,
    func: usize,
    args: Vec<Value>,
    slots: Option<&[u16]>,
    supplied: u64,
) -> Result<(), Fault> {
    if task.frames.len() >= vm.limits.max_recursion_depth {
        return Err(Fault::stack_overflow(vm.limits.max_recursion_depth));
    }
    let mut frame = vm.new_frame(func, task.stack.len())?;
    for (k, arg) in args.iter().enumerate() {
        let slot = slots.map_or(k, |s| s.get(k).copied().unwrap_or(k as u16) as usize);
        let target = frame
            .locals
            .get_mut(slot)
            .ok_or_else(|| Fault::internal(format!("parameter slot {slot} is out of frame")))?;
        *target = arg.copy_shared();
    }
    frame.supplied = supplied;
    task.frames.push(frame);
    Ok(())
}

/// 调用 fn 值：栈上是 fn 值和随后的实参
pub fn call_fn(vm: &mut Vm, task: &mut Task, argc: usize) -> Result<(), Fault> {
    let args = take_args(task, argc)?;
    let callee = task
        .stack
        .pop()
        .ok_or_else(|| Fault::internal("missing fn value"))?;
    match callee {
        Value::Fn(Some(func)) => call(vm, task, func as usize, args, None, 0),
        Value::Fn(None) => Err(Fault::fn_nil()),
        other => Err(Fault::internal(format!("{} is not callable", other.kind_name()))),
    }
}

/// 原生函数直接分派；返回值压栈
pub fn call_native(vm: &mut Vm, task: &mut Task, native: usize, argc: usize) -> Result<(), Fault> {
    let func = *vm
        .natives
        .get(native)
        .ok_or_else(|| Fault::internal(format!("native {native} is not linked")))?;
    let args = take_args(task, argc)?;
    let mut ctx = NativeCtx {
        output: &mut vm.output,
        sleep: &mut task.sleep,
        limits: &vm.limits,
    };
    if let Some(value) = func(&mut ctx, &args)? {
        task.stack.push(value);
    }
    Ok(())
}

/// `go`：新任务拿到实参的独立拷贝
pub fn spawn(vm: &mut Vm, task: &mut Task, func: usize, argc: usize) -> Result<(), Fault> {
    let args = take_args(task, argc)?;
    let id = vm.scheduler.allocate_id();
    let mut frame = vm.new_frame(func, 0)?;
    for (slot, arg) in args.iter().enumerate() {
        if let Some(target) = frame.locals.get_mut(slot) {
            *target = arg.copy_shared();
        }
    }
    trace!(target: TARGET, parent = task.id, task = id, func = %vm.program.funcs[func].name, "task spawned");
    vm.spawned.push(Task::new(id, frame));
    Ok(())
}

/// 弹出当前帧；返回 `Some` 表示任务的最外层函数已返回
pub fn ret(task: &mut Task, value: Option<Value>) -> Result<Option<Option<Value>>, Fault> {
    let frame = task
        .frames
        .pop()
        .ok_or_else(|| Fault::internal("return without frame"))?;
    task.stack.truncate(frame.base);
    if task.frames.is_empty() {
        return Ok(Some(value));
    }
    if let Some(value) = value {
        task.stack.push(value);
    }
    Ok(None)
}
