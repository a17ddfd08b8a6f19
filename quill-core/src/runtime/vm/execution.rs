//! 主执行循环
//!
//! `execute` 运行一个任务直到时间片用尽、任务休眠或结束。
//! 挂起点只有函数调用与循环回边；超时也只在挂起点检查。

use super::frame::{Guard, GuardState, Task};
use super::{call, index, Slice, Vm};
use crate::runtime::bytecode::Op;
use crate::runtime::fault::{Fault, RunError};
use crate::runtime::value::Value;
use indexmap::IndexMap;
use std::rc::Rc;
use std::time::Instant;
use tracing::trace;

const TARGET: &str = "quill::vm";

/// 单条指令执行后的去向
enum Flow {
    Next,
    /// 经过了一个挂起点
    Suspend,
    Finished(Option<Value>),
}

fn pop(task: &mut Task) -> Result<Value, Fault> {
    let floor = task.frames.last().map_or(0, |f| f.base);
    if task.stack.len() <= floor {
        return Err(Fault::internal("operand stack underflow"));
    }
    task.stack
        .pop()
        .ok_or_else(|| Fault::internal("operand stack underflow"))
}

fn peek(task: &Task, depth: usize) -> Result<Value, Fault> {
    let len = task.stack.len();
    if depth >= len {
        return Err(Fault::internal("operand stack underflow"));
    }
    Ok(task.stack[len - 1 - depth].clone())
}

fn local_mut(task: &mut Task, slot: u16) -> Result<&mut Value, Fault> {
    task.frames
        .last_mut()
        .and_then(|f| f.locals.get_mut(slot as usize))
        .ok_or_else(|| Fault::internal(format!("local slot {slot} is out of frame")))
}

fn local(task: &Task, slot: u16) -> Result<&Value, Fault> {
    task.frames
        .last()
        .and_then(|f| f.locals.get(slot as usize))
        .ok_or_else(|| Fault::internal(format!("local slot {slot} is out of frame")))
}

fn jump(task: &mut Task, target: u32) {
    if let Some(frame) = task.frames.last_mut() {
        frame.ip = target as usize;
    }
}

/// 运行一个时间片
pub(crate) fn execute(vm: &mut Vm, task: &mut Task) -> Result<Slice, RunError> {
    let mut budget = vm.quantum;
    loop {
        let flow = match step(vm, task).and_then(|flow| check_stack(vm, task).map(|_| flow)) {
            Ok(flow) => flow,
            Err(fault) => {
                let fault = fault.at(|| vm.location(task));
                throw(task, fault)?;
                Flow::Next
            }
        };
        match flow {
            Flow::Next => {}
            Flow::Finished(value) => return Ok(Slice::Done(value)),
            Flow::Suspend => {
                if vm.deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(vm.timeout(task));
                }
                if let Some(pause) = task.sleep.take() {
                    return Ok(Slice::Sleep(pause));
                }
                budget -= 1;
                if budget == 0 {
                    return Ok(Slice::Yield);
                }
            }
        }
    }
}

/// 当前帧的操作数不能超过 `max_stack_size`
fn check_stack(vm: &Vm, task: &Task) -> Result<(), Fault> {
    let base = task.frames.last().map_or(0, |f| f.base);
    if task.stack.len().saturating_sub(base) > vm.limits.max_stack_size {
        return Err(Fault::operand_overflow(vm.limits.max_stack_size));
    }
    Ok(())
}

/// 沿调用栈寻找处于 try 体中的守卫；找不到则故障结束任务
fn throw(task: &mut Task, fault: Fault) -> Result<(), RunError> {
    if !fault.is_catchable() {
        return Err(fault.into());
    }
    let fault = Rc::new(fault);
    while let Some(frame) = task.frames.last_mut() {
        // catch 体中的故障越过本守卫
        while frame.guards.last().is_some_and(|g| !g.is_running()) {
            frame.guards.pop();
        }
        if let Some(guard) = frame.guards.last_mut() {
            trace!(target: TARGET, task = task.id, id = fault.id, "fault caught");
            guard.state = GuardState::Caught(fault.clone());
            frame.ip = guard.catch;
            let (stack_len, err_slot) = (guard.stack_len, guard.err_slot);
            if let Some(slot) = err_slot.and_then(|s| frame.locals.get_mut(s as usize)) {
                *slot = Value::Error(fault.clone());
            }
            task.stack.truncate(stack_len);
            return Ok(());
        }
        let frame = task.frames.pop();
        if let Some(frame) = frame {
            task.stack.truncate(frame.base);
        }
    }
    Err(RunError::Fault((*fault).clone()))
}

#[cfg(feature = "trace_execution")]
fn trace_instruction(task: &Task, op: &Op) {
    if let Some(frame) = task.frames.last() {
        trace!(target: TARGET, task = task.id, func = frame.func, ip = frame.ip, ?op, stack = task.stack.len());
    }
}

/// 执行一条指令
fn step(vm: &mut Vm, task: &mut Task) -> Result<Flow, Fault> {
    let program = vm.program;
    let frame = task
        .frames
        .last_mut()
        .ok_or_else(|| Fault::internal("task without frame"))?;
    let chunk = &program.funcs[frame.func].chunk;
    let op = chunk
        .code
        .get(frame.ip)
        .ok_or_else(|| Fault::internal(format!("ip {} is out of code", frame.ip)))?;
    frame.ip += 1;

    #[cfg(feature = "trace_execution")]
    trace_instruction(task, op);

    match op {
        // ===== 常量与局部变量 =====
        Op::Const(idx) => {
            let value = chunk
                .constants
                .get(*idx as usize)
                .ok_or_else(|| Fault::internal(format!("constant {idx} is missing")))?;
            task.stack.push(value.deep_copy());
        }
        Op::Load(slot) => {
            let value = local(task, *slot)?.clone();
            task.stack.push(value);
        }
        Op::Store(slot) => {
            let value = pop(task)?;
            Value::assign_into(local_mut(task, *slot)?, &value);
        }
        Op::Init(slot) => {
            let value = pop(task)?.deep_copy();
            *local_mut(task, *slot)? = value;
        }
        Op::StoreRaw(slot) => {
            let value = pop(task)?;
            *local_mut(task, *slot)? = value;
        }
        Op::Alias(slot) => {
            let value = pop(task)?;
            value.mark_aliased();
            *local_mut(task, *slot)? = value;
        }
        Op::Pop => {
            pop(task)?;
        }
        Op::Dup => {
            let top = peek(task, 0)?;
            task.stack.push(top);
        }
        Op::Dup2 => {
            let (a, b) = (peek(task, 1)?, peek(task, 0)?);
            task.stack.push(a);
            task.stack.push(b);
        }

        // ===== 控制流 =====
        Op::Jump(target) => jump(task, *target),
        Op::JumpIfFalse(target) => {
            if !pop(task)?.as_bool()? {
                jump(task, *target);
            }
        }
        Op::JumpIfTrue(target) => {
            if pop(task)?.as_bool()? {
                jump(task, *target);
            }
        }
        Op::Loop(target) => {
            jump(task, *target);
            return Ok(Flow::Suspend);
        }

        // ===== 调用 =====
        Op::Call {
            func,
            argc,
            slots,
            supplied,
        } => {
            let args = call::take_args(task, *argc as usize)?;
            call::call(vm, task, *func as usize, args, Some(&slots[..]), *supplied)?;
            return Ok(Flow::Suspend);
        }
        Op::CallNative { native, argc } => {
            call::call_native(vm, task, *native as usize, *argc as usize)?;
            if task.sleep.is_some() {
                return Ok(Flow::Suspend);
            }
        }
        Op::CallFn { argc } => {
            call::call_fn(vm, task, *argc as usize)?;
            return Ok(Flow::Suspend);
        }
        Op::MakeFn(func) => task.stack.push(Value::Fn(Some(*func))),
        Op::Go { func, argc } => call::spawn(vm, task, *func as usize, *argc as usize)?,
        Op::Return => {
            let value = pop(task)?;
            if let Some(value) = call::ret(task, Some(value))? {
                return Ok(Flow::Finished(value));
            }
        }
        Op::ReturnVoid => {
            if let Some(value) = call::ret(task, None)? {
                return Ok(Flow::Finished(value));
            }
        }
        Op::SkipIfSupplied { bit, end } => {
            let supplied = task.frames.last().map_or(0, |f| f.supplied);
            if supplied & (1u64 << bit) != 0 {
                jump(task, *end);
            }
        }

        // ===== 容器 =====
        Op::MakeArray(count) => {
            let items = call::take_args(task, *count as usize)?;
            let items = items.iter().map(Value::copy_shared).collect();
            task.stack.push(Value::arr(items));
        }
        Op::MakeMap(count) => {
            let flat = call::take_args(task, *count as usize * 2)?;
            let mut items = IndexMap::with_capacity(*count as usize);
            for pair in flat.chunks(2) {
                items.insert(pair[0].as_str()?.to_string(), pair[1].copy_shared());
            }
            task.stack.push(Value::map(items));
        }
        Op::MakeStruct { ty, slots } => {
            let values = call::take_args(task, slots.len())?;
            let value = vm.zero(*ty as usize)?;
            {
                let fields = value.as_struct()?;
                let mut fields = fields.borrow_mut();
                for (slot, field) in slots.iter().zip(values) {
                    if let Some(target) = fields.get_mut(*slot as usize) {
                        *target = field.copy_shared();
                    }
                }
            }
            task.stack.push(value);
        }
        Op::Zero(ty) => {
            let value = vm.zero(*ty as usize)?;
            task.stack.push(value);
        }
        Op::Index => {
            let key = pop(task)?;
            let container = pop(task)?;
            let value = index::get(&container, &key, &vm.limits)?;
            task.stack.push(value);
        }
        Op::SetIndex => {
            let value = pop(task)?;
            let key = pop(task)?;
            let container = pop(task)?;
            index::set(&container, &key, &value, &vm.limits)?;
        }
        Op::GetField(idx) => {
            let target = pop(task)?;
            task.stack.push(index::get_field(&target, *idx as usize)?);
        }
        Op::SetField(idx) => {
            let value = pop(task)?;
            let target = pop(task)?;
            index::set_field(&target, *idx as usize, &value)?;
        }
        Op::Append => {
            let item = pop(task)?;
            let target = pop(task)?;
            index::append(&target, &item)?;
        }
        Op::IterNext {
            coll,
            counter,
            value,
            key,
            end,
        } => {
            let n = local(task, *counter)?.as_int()?;
            let collection = local(task, *coll)?;
            if n as usize >= collection.iter_len()? {
                jump(task, *end);
            } else {
                let (item, item_key) = collection.iter_item(n as usize)?;
                *local_mut(task, *value)? = item;
                if let Some(key) = key {
                    *local_mut(task, *key)? = item_key;
                }
                *local_mut(task, *counter)? = Value::Int(n + 1);
            }
        }

        // ===== try/catch =====
        Op::TryBegin { catch, err_slot } => {
            let stack_len = task.stack.len();
            if let Some(frame) = task.frames.last_mut() {
                frame.guards.push(Guard {
                    catch: *catch as usize,
                    err_slot: *err_slot,
                    stack_len,
                    state: GuardState::Running,
                });
            }
        }
        Op::TryEnd => {
            if let Some(frame) = task.frames.last_mut() {
                frame.guards.pop();
            }
        }
        Op::CatchEnd => {
            let guard = task.frames.last_mut().and_then(|f| f.guards.pop());
            if let Some(Guard {
                state: GuardState::Caught(fault),
                ..
            }) = guard
            {
                return Err((*fault).clone());
            }
        }
        Op::Recover { depth, end } => {
            if let Some(frame) = task.frames.last_mut() {
                frame.guards.truncate(*depth as usize);
            }
            jump(task, *end);
        }
        Op::Retry { depth, start } => {
            if let Some(frame) = task.frames.last_mut() {
                frame.guards.truncate(*depth as usize);
            }
            jump(task, *start);
        }
        Op::PopGuards(depth) => {
            if let Some(frame) = task.frames.last_mut() {
                frame.guards.truncate(*depth as usize);
            }
        }
    }
    Ok(Flow::Next)
}
