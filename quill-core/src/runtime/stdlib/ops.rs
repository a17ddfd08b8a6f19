//! 标量运算符：int、float、bool、char、str 以及长度运算

use super::{arg, binary, unary, NativeCtx, NativeDef};
use crate::compiler::parser::{BinaryOp, UnaryOp};
use crate::runtime::fault::Fault;
use crate::runtime::value::Value;

type NativeResult = Result<Option<Value>, Fault>;

macro_rules! int_op {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        fn $name(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
            let $a = arg(args, 0)?.as_int()?;
            let $b = arg(args, 1)?.as_int()?;
            Ok(Some($body))
        }
    };
}

macro_rules! float_op {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        fn $name(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
            let $a = arg(args, 0)?.as_float()?;
            let $b = arg(args, 1)?.as_float()?;
            Ok(Some($body))
        }
    };
}

/// 比较运算：按 `$getter` 取出两侧后比较
macro_rules! compare_op {
    ($name:ident, $getter:ident, $op:tt) => {
        fn $name(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
            let a = arg(args, 0)?.$getter()?;
            let b = arg(args, 1)?.$getter()?;
            Ok(Some(Value::Bool(a $op b)))
        }
    };
}

// ===== int =====

int_op!(add_int, |a, b| Value::Int(a.wrapping_add(b)));
int_op!(sub_int, |a, b| Value::Int(a.wrapping_sub(b)));
int_op!(mul_int, |a, b| Value::Int(a.wrapping_mul(b)));
int_op!(bit_and_int, |a, b| Value::Int(a & b));
int_op!(bit_or_int, |a, b| Value::Int(a | b));
int_op!(bit_xor_int, |a, b| Value::Int(a ^ b));
int_op!(shl_int, |a, b| Value::Int(a.wrapping_shl(b as u32)));
int_op!(shr_int, |a, b| Value::Int(a.wrapping_shr(b as u32)));
int_op!(range_int, |a, b| Value::Range(a, b));

fn div_int(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let a = arg(args, 0)?.as_int()?;
    let b = arg(args, 1)?.as_int()?;
    if b == 0 {
        return Err(Fault::div_zero());
    }
    Ok(Some(Value::Int(a.wrapping_div(b))))
}

fn mod_int(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let a = arg(args, 0)?.as_int()?;
    let b = arg(args, 1)?.as_int()?;
    if b == 0 {
        return Err(Fault::div_zero());
    }
    Ok(Some(Value::Int(a.wrapping_rem(b))))
}

compare_op!(eq_int, as_int, ==);
compare_op!(ne_int, as_int, !=);
compare_op!(lt_int, as_int, <);
compare_op!(le_int, as_int, <=);
compare_op!(gt_int, as_int, >);
compare_op!(ge_int, as_int, >=);

fn neg_int(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::Int(arg(args, 0)?.as_int()?.wrapping_neg())))
}

fn bit_not_int(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::Int(!arg(args, 0)?.as_int()?)))
}

// ===== float =====

float_op!(add_float, |a, b| Value::Float(a + b));
float_op!(sub_float, |a, b| Value::Float(a - b));
float_op!(mul_float, |a, b| Value::Float(a * b));

fn div_float(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let a = arg(args, 0)?.as_float()?;
    let b = arg(args, 1)?.as_float()?;
    if b == 0.0 {
        return Err(Fault::div_zero());
    }
    Ok(Some(Value::Float(a / b)))
}

compare_op!(eq_float, as_float, ==);
compare_op!(ne_float, as_float, !=);
compare_op!(lt_float, as_float, <);
compare_op!(le_float, as_float, <=);
compare_op!(gt_float, as_float, >);
compare_op!(ge_float, as_float, >=);

fn neg_float(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::Float(-arg(args, 0)?.as_float()?)))
}

// ===== bool / char =====

compare_op!(eq_bool, as_bool, ==);
compare_op!(ne_bool, as_bool, !=);

fn not_bool(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::Bool(!arg(args, 0)?.as_bool()?)))
}

compare_op!(eq_char, as_char, ==);
compare_op!(ne_char, as_char, !=);
compare_op!(lt_char, as_char, <);
compare_op!(le_char, as_char, <=);
compare_op!(gt_char, as_char, >);
compare_op!(ge_char, as_char, >=);

// ===== str =====

fn add_str(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let a = arg(args, 0)?.as_str()?;
    let b = arg(args, 1)?.as_str()?;
    let mut out = String::with_capacity(a.len() + b.len());
    out.push_str(&a);
    out.push_str(&b);
    Ok(Some(Value::str(out)))
}

fn add_str_char(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let mut out = arg(args, 0)?.as_str()?.to_string();
    out.push(arg(args, 1)?.as_char()?);
    Ok(Some(Value::str(out)))
}

compare_op!(eq_str, as_str, ==);
compare_op!(ne_str, as_str, !=);
compare_op!(lt_str, as_str, <);
compare_op!(le_str, as_str, <=);
compare_op!(gt_str, as_str, >);
compare_op!(ge_str, as_str, >=);

// ===== 长度 =====

fn len(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let count = match arg(args, 0)? {
        Value::Str(s) => s.chars().count() as i64,
        Value::Buf(c) => c.borrow().len() as i64,
        Value::Arr(c) => c.borrow().len() as i64,
        Value::Map(c) => c.borrow().len() as i64,
        Value::Set(c) => c.borrow().iter_set().count() as i64,
        Value::Obj(obj) => obj.len(),
        other => {
            return Err(Fault::internal(format!(
                "length of {} is undefined",
                other.kind_name()
            )))
        }
    };
    Ok(Some(Value::Int(count)))
}

pub(super) fn register(defs: &mut Vec<NativeDef>) {
    use BinaryOp::*;
    defs.extend([
        binary(Add, "int,int", "int", add_int),
        binary(Sub, "int,int", "int", sub_int),
        binary(Mul, "int,int", "int", mul_int),
        binary(Div, "int,int", "int", div_int),
        binary(Mod, "int,int", "int", mod_int),
        binary(BitAnd, "int,int", "int", bit_and_int),
        binary(BitOr, "int,int", "int", bit_or_int),
        binary(BitXor, "int,int", "int", bit_xor_int),
        binary(Shl, "int,int", "int", shl_int),
        binary(Shr, "int,int", "int", shr_int),
        binary(Range, "int,int", "range", range_int),
        binary(Eq, "int,int", "bool", eq_int),
        binary(NotEq, "int,int", "bool", ne_int),
        binary(Lt, "int,int", "bool", lt_int),
        binary(Le, "int,int", "bool", le_int),
        binary(Gt, "int,int", "bool", gt_int),
        binary(Ge, "int,int", "bool", ge_int),
        unary(UnaryOp::Neg, "int", "int", neg_int),
        unary(UnaryOp::BitNot, "int", "int", bit_not_int),
        binary(Add, "float,float", "float", add_float),
        binary(Sub, "float,float", "float", sub_float),
        binary(Mul, "float,float", "float", mul_float),
        binary(Div, "float,float", "float", div_float),
        binary(Eq, "float,float", "bool", eq_float),
        binary(NotEq, "float,float", "bool", ne_float),
        binary(Lt, "float,float", "bool", lt_float),
        binary(Le, "float,float", "bool", le_float),
        binary(Gt, "float,float", "bool", gt_float),
        binary(Ge, "float,float", "bool", ge_float),
        unary(UnaryOp::Neg, "float", "float", neg_float),
        binary(Eq, "bool,bool", "bool", eq_bool),
        binary(NotEq, "bool,bool", "bool", ne_bool),
        unary(UnaryOp::Not, "bool", "bool", not_bool),
        binary(Eq, "char,char", "bool", eq_char),
        binary(NotEq, "char,char", "bool", ne_char),
        binary(Lt, "char,char", "bool", lt_char),
        binary(Le, "char,char", "bool", le_char),
        binary(Gt, "char,char", "bool", gt_char),
        binary(Ge, "char,char", "bool", ge_char),
        binary(Add, "str,str", "str", add_str),
        binary(Add, "str,char", "str", add_str_char),
        binary(Eq, "str,str", "bool", eq_str),
        binary(NotEq, "str,str", "bool", ne_str),
        binary(Lt, "str,str", "bool", lt_str),
        binary(Le, "str,str", "bool", le_str),
        binary(Gt, "str,str", "bool", gt_str),
        binary(Ge, "str,str", "bool", ge_str),
        unary(UnaryOp::Len, "str", "int", len),
        unary(UnaryOp::Len, "buf", "int", len),
        unary(UnaryOp::Len, "set", "int", len),
        unary(UnaryOp::Len, "obj", "int", len),
        unary(UnaryOp::Len, "arr*", "int", len),
        unary(UnaryOp::Len, "map*", "int", len),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fault::FaultKind;
    use crate::runtime::stdlib::testing::{invoke, value};

    #[test]
    fn test_int_division_by_zero() {
        let err = invoke(div_int, &[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind, FaultKind::DivZero);
        assert_eq!(err.id, 3);
        assert_eq!(value(mod_int, &[Value::Int(7), Value::Int(3)]), Value::Int(1));
        assert_eq!(value(div_int, &[Value::Int(-7), Value::Int(2)]), Value::Int(-3));
    }

    #[test]
    fn test_string_concat_and_compare() {
        assert_eq!(
            value(add_str_char, &[Value::str("ab"), Value::Char('c')]),
            Value::str("abc")
        );
        assert_eq!(
            value(lt_str, &[Value::str("abc"), Value::str("abd")]),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_length_counts_runes() {
        assert_eq!(value(len, &[Value::str("héllo")]), Value::Int(5));
        assert_eq!(
            value(len, &[Value::arr(vec![Value::Int(1), Value::Int(2)])]),
            Value::Int(2)
        );
    }
}
