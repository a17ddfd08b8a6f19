//! set 类型：有上限的位集合
//!
//! 下标必须落在 `0..LimitConfig::max_set_size` 内，越界时报 `IndexOut`，集合保持不变。

use super::{arg, binary, call, unary, NativeCtx, NativeDef};
use crate::compiler::parser::{BinaryOp, UnaryOp};
use crate::runtime::fault::Fault;
use crate::runtime::value::Value;

type NativeResult = Result<Option<Value>, Fault>;

/// 校验下标并转换为 usize
pub(crate) fn check_index(ctx: &NativeCtx<'_>, index: i64) -> Result<usize, Fault> {
    set_index(index, ctx.limits.max_set_size)
}

pub(crate) fn set_index(index: i64, max: usize) -> Result<usize, Fault> {
    match usize::try_from(index) {
        Ok(idx) if idx < max => Ok(idx),
        _ => Err(Fault::index_out(index)),
    }
}

fn set_bit(ctx: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let set = arg(args, 0)?;
    let index = check_index(ctx, arg(args, 1)?.as_int()?)?;
    set.as_set()?.borrow_mut().set(index, true);
    Ok(Some(set.clone()))
}

fn unset_bit(ctx: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let set = arg(args, 0)?;
    let index = check_index(ctx, arg(args, 1)?.as_int()?)?;
    set.as_set()?.borrow_mut().set(index, false);
    Ok(Some(set.clone()))
}

/// 翻转指定位，返回翻转前的值
fn toggle_bit(ctx: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let index = check_index(ctx, arg(args, 1)?.as_int()?)?;
    let handle = arg(args, 0)?.as_set()?;
    let mut bits = handle.borrow_mut();
    let previous = bits.get(index);
    bits.set(index, !previous);
    Ok(Some(Value::Bool(previous)))
}

fn and_sets(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let a = arg(args, 0)?.as_set()?;
    let b = arg(args, 1)?.as_set()?;
    let result = a.borrow().combine(&b.borrow(), true);
    Ok(Some(Value::set(result)))
}

fn or_sets(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let a = arg(args, 0)?.as_set()?;
    let b = arg(args, 1)?.as_set()?;
    let result = a.borrow().combine(&b.borrow(), false);
    Ok(Some(Value::set(result)))
}

fn invert_set(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let result = arg(args, 0)?.as_set()?.borrow().invert();
    Ok(Some(Value::set(result)))
}

pub(super) fn register(defs: &mut Vec<NativeDef>) {
    defs.extend([
        call("Set", "set,int", "set", set_bit),
        call("UnSet", "set,int", "set", unset_bit),
        call("Toggle", "set,int", "bool", toggle_bit),
        binary(BinaryOp::BitAnd, "set,set", "set", and_sets),
        binary(BinaryOp::BitOr, "set,set", "set", or_sets),
        unary(UnaryOp::BitNot, "set", "set", invert_set),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fault::FaultKind;
    use crate::runtime::stdlib::testing::{invoke, value};
    use crate::runtime::value::BitSet;

    #[test]
    fn test_out_of_range_does_not_mutate() {
        let set = Value::set(BitSet::default());
        value(set_bit, &[set.clone(), Value::Int(3)]);
        let err = invoke(set_bit, &[set.clone(), Value::Int(1 << 20)]).unwrap_err();
        assert_eq!(err.kind, FaultKind::IndexOut);
        let err = invoke(unset_bit, &[set.clone(), Value::Int(-1)]).unwrap_err();
        assert_eq!(err.kind, FaultKind::IndexOut);
        assert_eq!(set.to_string(), "0001");
    }

    #[test]
    fn test_toggle_returns_previous() {
        let set = Value::set(BitSet::default());
        assert_eq!(value(toggle_bit, &[set.clone(), Value::Int(2)]), Value::Bool(false));
        assert_eq!(value(toggle_bit, &[set.clone(), Value::Int(2)]), Value::Bool(true));
        assert_eq!(set.to_string(), "");
    }

    #[test]
    fn test_and_or() {
        let mut a = BitSet::default();
        a.set(0, true);
        a.set(2, true);
        let mut b = BitSet::default();
        b.set(2, true);
        b.set(3, true);
        let (a, b) = (Value::set(a), Value::set(b));
        assert_eq!(value(and_sets, &[a.clone(), b.clone()]).to_string(), "001");
        assert_eq!(value(or_sets, &[a, b]).to_string(), "1011");
    }
}
