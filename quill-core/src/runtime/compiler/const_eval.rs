//! 常量求值
//!
//! 常量表达式在编译期用原生函数直接计算；`IOTA` 取声明块中的序号。
//! 求值按需进行，`Evaluating` 状态用于发现循环引用。

use super::{call, error};
use crate::compiler::error::{CResult, ErrorAt, ErrorKind};
use crate::compiler::module::Workspace;
use crate::compiler::parser::{Expr, ExprKind};
use crate::compiler::symbols::{ConstState, Object, ObjectId, OpKind, TypeId};
use crate::runtime::stdlib::{NativeCtx, NativeFn};
use crate::runtime::value::Value;
use quill_config::LimitConfig;
use tracing::trace;

const TARGET: &str = "quill::compiler";

/// 求常量的值；已求值的直接返回
pub fn evaluate(ws: &mut Workspace, id: ObjectId) -> CResult<(Value, TypeId)> {
    let (state, unit, offset) = match ws.symbols().get(id) {
        Some(Object::Const(c)) => (c.state.clone(), c.unit, c.offset),
        _ => return Err(super::bug(format!("{id} is not a constant"), 0)),
    };
    let (expr, iota) = match state {
        ConstState::Ready { value, ty } => return Ok((value, ty)),
        ConstState::Evaluating => return error(ErrorKind::NotConst, offset),
        ConstState::Pending { expr, iota } => (expr, iota),
    };
    set_state(ws, id, ConstState::Evaluating);
    let (value, ty) = eval_expr(ws, unit, &expr, iota)?;
    trace!(target: TARGET, const_id = %id, value = %value, "constant evaluated");
    set_state(
        ws,
        id,
        ConstState::Ready {
            value: value.clone(),
            ty,
        },
    );
    Ok((value, ty))
}

fn set_state(ws: &mut Workspace, id: ObjectId, state: ConstState) {
    if let Some(Object::Const(c)) = ws.symbols_mut().get_mut(id) {
        c.state = state;
    }
}

fn find_const(ws: &Workspace, ids: &[ObjectId]) -> Option<ObjectId> {
    ids.iter()
        .copied()
        .find(|id| matches!(ws.symbols().get(*id), Some(Object::Const(_))))
}

fn apply(func: NativeFn, args: &[Value], offset: usize) -> CResult<Value> {
    let mut output = String::new();
    let mut sleep = None;
    let limits = LimitConfig::default();
    let mut ctx = NativeCtx {
        output: &mut output,
        sleep: &mut sleep,
        limits: &limits,
    };
    match func(&mut ctx, args) {
        Ok(Some(value)) => Ok(value),
        _ => error(ErrorKind::NotConst, offset),
    }
}

fn native_result(ws: &Workspace, id: ObjectId, args: &[Value], offset: usize) -> CResult<(Value, TypeId)> {
    let native = ws
        .symbols()
        .native(id)
        .ok_or_else(|| ErrorAt::new(ErrorKind::NotConst, offset))?;
    let ty = native
        .ret
        .ok_or_else(|| ErrorAt::new(ErrorKind::NotConst, offset))?;
    Ok((apply(native.func, args, offset)?, ty))
}

fn eval_expr(ws: &mut Workspace, unit: u32, expr: &Expr, iota: Option<i64>) -> CResult<(Value, TypeId)> {
    let b = *ws.symbols().builtins();
    let offset = expr.offset;
    match &expr.kind {
        ExprKind::Int(v) => Ok((Value::Int(*v), b.int)),
        ExprKind::Float(v) => Ok((Value::Float(*v), b.float)),
        ExprKind::Bool(v) => Ok((Value::Bool(*v), b.bool)),
        ExprKind::Char(v) => Ok((Value::Char(*v), b.char)),
        ExprKind::Str(v) => Ok((Value::str(v), b.str)),
        ExprKind::Iota => iota
            .map(|i| (Value::Int(i), b.int))
            .ok_or_else(|| ErrorAt::new(ErrorKind::Iota, offset)),
        ExprKind::Ident(name) => {
            let ids = ws.lookup(unit, name);
            match find_const(ws, &ids) {
                Some(id) => evaluate(ws, id),
                None if ids.is_empty() => error(ErrorKind::UnknownIdent(name.clone()), offset),
                None => error(ErrorKind::NotConst, offset),
            }
        }
        ExprKind::Field { target, name } => {
            let ExprKind::Ident(alias) = &target.kind else {
                return error(ErrorKind::NotConst, offset);
            };
            let ids = ws
                .lookup_qualified(unit, alias, name)
                .ok_or_else(|| ErrorAt::new(ErrorKind::UnknownIdent(alias.clone()), target.offset))?;
            match find_const(ws, &ids) {
                Some(id) => evaluate(ws, id),
                None => error(ErrorKind::UnknownIdent(format!("{alias}.{name}")), offset),
            }
        }
        ExprKind::Unary { op, operand } => {
            let (value, ty) = eval_expr(ws, unit, operand, iota)?;
            let id = ws
                .registry()
                .resolve(ws.symbols(), OpKind::Unary(*op), &[ty])
                .ok_or_else(|| {
                    ErrorAt::new(
                        ErrorKind::Function {
                            name: op.name().to_string(),
                            params: ws.symbols().type_name(ty),
                        },
                        offset,
                    )
                })?;
            native_result(ws, id, &[value], offset)
        }
        ExprKind::Binary { op, left, right } => {
            let (lv, lt) = eval_expr(ws, unit, left, iota)?;
            let (rv, rt) = eval_expr(ws, unit, right, iota)?;
            let id = ws
                .registry()
                .resolve(ws.symbols(), OpKind::Binary(*op), &[lt, rt])
                .ok_or_else(|| {
                    ErrorAt::new(
                        ErrorKind::Function {
                            name: op.name().to_string(),
                            params: ws.symbols().type_names(&[lt, rt]),
                        },
                        offset,
                    )
                })?;
            native_result(ws, id, &[lv, rv], offset)
        }
        ExprKind::Call { callee, args } => {
            let ExprKind::Ident(name) = &callee.kind else {
                return error(ErrorKind::NotConst, offset);
            };
            let mut values = Vec::with_capacity(args.len());
            let mut types = Vec::with_capacity(args.len());
            for arg in args {
                if arg.name.is_some() {
                    return error(ErrorKind::NotConst, arg.offset);
                }
                let (value, ty) = eval_expr(ws, unit, &arg.value, iota)?;
                values.push(value);
                types.push(ty);
            }
            let candidates = ws.lookup(unit, name);
            let id = candidates
                .iter()
                .copied()
                .find(|id| {
                    ws.symbols().native(*id).is_some_and(|native| {
                        native.op == OpKind::Call && call::native_accepts(ws.symbols(), native, &types)
                    })
                })
                .ok_or_else(|| ErrorAt::new(ErrorKind::NotConst, offset))?;
            native_result(ws, id, &values, offset)
        }
        _ => error(ErrorKind::NotConst, offset),
    }
}
