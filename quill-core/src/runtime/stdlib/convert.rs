//! 类型转换函数：`int(...)`、`float(...)`、`str(...)` 等

use super::set::check_index;
use super::{arg, call, NativeCtx, NativeDef};
use crate::runtime::fault::Fault;
use crate::runtime::value::{BitSet, Value};

type NativeResult = Result<Option<Value>, Fault>;

fn parse_int(text: &str) -> Result<i64, Fault> {
    let text = text.trim();
    let (digits, radix, negative) = match text.strip_prefix('-') {
        Some(rest) => (rest, 10, true),
        None => (text, 10, false),
    };
    let (digits, radix) = if let Some(hex) = digits.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        (bin, 2)
    } else if let Some(oct) = digits.strip_prefix("0o") {
        (oct, 8)
    } else {
        (digits, radix)
    };
    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| Fault::invalid_param())?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn int_from(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let value = match arg(args, 0)? {
        Value::Float(f) => *f as i64,
        Value::Str(s) => parse_int(s)?,
        Value::Bool(b) => i64::from(*b),
        Value::Char(c) => *c as i64,
        other => return Err(Fault::internal(format!("int({})", other.kind_name()))),
    };
    Ok(Some(Value::Int(value)))
}

fn float_from(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let value = match arg(args, 0)? {
        Value::Int(i) => *i as f64,
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| Fault::invalid_param())?,
        other => return Err(Fault::internal(format!("float({})", other.kind_name()))),
    };
    Ok(Some(Value::Float(value)))
}

/// 整数、浮点、布尔、字符、buf、set 的文本形式
fn str_from(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::str(arg(args, 0)?.to_string())))
}

/// `""`、`"0"`、`"false"` 为 false
fn bool_from(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let value = match arg(args, 0)? {
        Value::Int(i) => *i != 0,
        Value::Str(s) => !matches!(&**s, "" | "0" | "false"),
        other => return Err(Fault::internal(format!("bool({})", other.kind_name()))),
    };
    Ok(Some(Value::Bool(value)))
}

fn char_from(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let code = arg(args, 0)?.as_int()?;
    let c = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(Fault::invalid_param)?;
    Ok(Some(Value::Char(c)))
}

fn buf_from(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::buf(arg(args, 0)?.as_str()?.as_bytes().to_vec())))
}

/// `set("0101")`：只接受 '0' 与 '1'
fn set_from_str(ctx: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let text = arg(args, 0)?.as_str()?;
    let mut bits = BitSet::default();
    for (i, c) in text.chars().enumerate() {
        match c {
            '0' => {}
            '1' => {
                check_index(ctx, i as i64)?;
                bits.set(i, true);
            }
            _ => return Err(Fault::invalid_param()),
        }
    }
    Ok(Some(Value::set(bits)))
}

fn set_from_arr(ctx: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let items = arg(args, 0)?.as_arr()?;
    let mut bits = BitSet::default();
    for item in items.borrow().iter() {
        let index = check_index(ctx, item.as_int()?)?;
        bits.set(index, true);
    }
    Ok(Some(Value::set(bits)))
}

pub(super) fn register(defs: &mut Vec<NativeDef>) {
    defs.extend([
        call("int", "float", "int", int_from),
        call("int", "str", "int", int_from),
        call("int", "bool", "int", int_from),
        call("int", "char", "int", int_from),
        call("float", "int", "float", float_from),
        call("float", "str", "float", float_from),
        call("str", "int", "str", str_from),
        call("str", "float", "str", str_from),
        call("str", "bool", "str", str_from),
        call("str", "char", "str", str_from),
        call("str", "buf", "str", str_from),
        call("str", "set", "str", str_from),
        call("bool", "int", "bool", bool_from),
        call("bool", "str", "bool", bool_from),
        call("char", "int", "char", char_from),
        call("buf", "str", "buf", buf_from),
        call("set", "str", "set", set_from_str),
        call("set", "arr.int", "set", set_from_arr),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fault::FaultKind;
    use crate::runtime::stdlib::testing::{invoke, value};

    #[test]
    fn test_int_conversions() {
        assert_eq!(value(int_from, &[Value::Float(3.9)]), Value::Int(3));
        assert_eq!(value(int_from, &[Value::str(" -42 ")]), Value::Int(-42));
        assert_eq!(value(int_from, &[Value::str("0x1F")]), Value::Int(31));
        assert_eq!(value(int_from, &[Value::Char('A')]), Value::Int(65));
        let err = invoke(int_from, &[Value::str("4x")]).unwrap_err();
        assert_eq!(err.kind, FaultKind::InvalidParam);
    }

    #[test]
    fn test_bool_from_str() {
        for (text, expected) in [("", false), ("0", false), ("false", false), ("no", true)] {
            assert_eq!(value(bool_from, &[Value::str(text)]), Value::Bool(expected));
        }
    }

    #[test]
    fn test_str_of_float_drops_trailing_zero() {
        assert_eq!(value(str_from, &[Value::Float(3.0)]), Value::str("3"));
        assert_eq!(value(str_from, &[Value::Float(2.5)]), Value::str("2.5"));
    }

    #[test]
    fn test_set_from_str_rejects_other_chars() {
        assert_eq!(value(set_from_str, &[Value::str("0101")]).to_string(), "0101");
        let err = invoke(set_from_str, &[Value::str("012")]).unwrap_err();
        assert_eq!(err.kind, FaultKind::InvalidParam);
    }
}
