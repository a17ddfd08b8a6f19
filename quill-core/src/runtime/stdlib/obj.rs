//! obj 装箱、拆箱与查询
//!
//! 带第二个参数的拆箱函数是 default 变体：只有当 obj 为 nil 时才返回默认值，
//! 其余转换失败照常抛出。

use super::{arg, call, NativeCtx, NativeDef};
use crate::runtime::fault::Fault;
use crate::runtime::object::Obj;
use crate::runtime::value::Value;
use std::rc::Rc;

type NativeResult = Result<Option<Value>, Fault>;

fn boxed(args: &[Value]) -> Result<&Rc<Obj>, Fault> {
    match arg(args, 0)? {
        Value::Obj(obj) => Ok(obj),
        other => Err(Fault::internal(format!(
            "expecting obj, found {}",
            other.kind_name()
        ))),
    }
}

/// 第一个参数为 nil 且提供了默认值时返回默认值
fn default_for_nil(args: &[Value]) -> Result<Option<Value>, Fault> {
    if args.len() > 1 && boxed(args)?.is_nil() {
        return Ok(Some(arg(args, 1)?.clone()));
    }
    Ok(None)
}

fn to_obj(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::obj(Obj::from_value(arg(args, 0)?)?)))
}

fn int_of(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    if let Some(default) = default_for_nil(args)? {
        return Ok(Some(default));
    }
    Ok(Some(Value::Int(boxed(args)?.to_int()?)))
}

fn float_of(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    if let Some(default) = default_for_nil(args)? {
        return Ok(Some(default));
    }
    Ok(Some(Value::Float(boxed(args)?.to_float()?)))
}

fn str_of(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    if let Some(default) = default_for_nil(args)? {
        return Ok(Some(default));
    }
    Ok(Some(Value::str(boxed(args)?.to_str()?)))
}

fn bool_of(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    if let Some(default) = default_for_nil(args)? {
        return Ok(Some(default));
    }
    Ok(Some(Value::Bool(boxed(args)?.to_bool()?)))
}

/// `arr(obj)`：元素仍是 obj
fn arr_of(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    match &**boxed(args)? {
        Obj::Nil => Err(Fault::obj_nil()),
        Obj::Arr(items) => Ok(Some(Value::arr(
            items.iter().cloned().map(Value::obj).collect(),
        ))),
        _ => Err(Fault::obj_value()),
    }
}

fn map_of(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    match &**boxed(args)? {
        Obj::Nil => Err(Fault::obj_nil()),
        Obj::Map(items) => Ok(Some(Value::map(
            items
                .iter()
                .map(|(k, v)| (k.clone(), Value::obj(v.clone())))
                .collect(),
        ))),
        _ => Err(Fault::obj_value()),
    }
}

fn is_nil(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::Bool(boxed(args)?.is_nil())))
}

fn type_name(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::str(boxed(args)?.type_name())))
}

pub(super) fn register(defs: &mut Vec<NativeDef>) {
    defs.extend([
        call("obj", "bool", "obj", to_obj),
        call("obj", "int", "obj", to_obj),
        call("obj", "float", "obj", to_obj),
        call("obj", "str", "obj", to_obj),
        call("obj", "obj", "obj", to_obj),
        call("obj", "arr*", "obj", to_obj),
        call("obj", "map*", "obj", to_obj),
        call("int", "obj", "int", int_of),
        call("int", "obj,int", "int", int_of),
        call("float", "obj", "float", float_of),
        call("float", "obj,float", "float", float_of),
        call("str", "obj", "str", str_of),
        call("str", "obj,str", "str", str_of),
        call("bool", "obj", "bool", bool_of),
        call("bool", "obj,bool", "bool", bool_of),
        call("arr", "obj", "arr.obj", arr_of),
        call("map", "obj", "map.obj", map_of),
        call("IsNil", "obj", "bool", is_nil),
        call("Type", "obj", "str", type_name),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fault::FaultKind;
    use crate::runtime::stdlib::testing::{invoke, value};

    fn boxed_value(obj: Obj) -> Value {
        Value::obj(obj)
    }

    #[test]
    fn test_int_of_obj() {
        assert_eq!(value(int_of, &[boxed_value(Obj::Str("42".into()))]), Value::Int(42));
        assert_eq!(value(int_of, &[boxed_value(Obj::Float(3.9))]), Value::Int(3));
        let err = invoke(int_of, &[boxed_value(Obj::Nil)]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ObjNil);
        assert_eq!(err.message, "object holds no value");
    }

    #[test]
    fn test_default_variant_only_applies_to_nil() {
        assert_eq!(
            value(int_of, &[boxed_value(Obj::Nil), Value::Int(7)]),
            Value::Int(7)
        );
        assert_eq!(
            value(int_of, &[boxed_value(Obj::Int(1)), Value::Int(7)]),
            Value::Int(1)
        );
        let err = invoke(int_of, &[boxed_value(Obj::Arr(vec![])), Value::Int(7)]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ObjValue);
    }

    #[test]
    fn test_boxing_unsupported_kind_fails() {
        let err = invoke(to_obj, &[Value::arr(vec![Value::Char('x')])]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ObjType);
        let boxed = value(to_obj, &[Value::arr(vec![Value::Int(1), Value::str("a")])]);
        assert_eq!(value(type_name, &[boxed.clone()]), Value::str("arr.obj"));
        assert_eq!(value(arr_of, &[boxed]).to_string(), "[1 a]");
    }
}
