//! map 与 arr 的辅助函数

use super::{arg, call, NativeCtx, NativeDef};
use crate::runtime::fault::Fault;
use crate::runtime::value::Value;

type NativeResult = Result<Option<Value>, Fault>;

fn has_key(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let map = arg(args, 0)?.as_map()?;
    let key = arg(args, 1)?.as_str()?;
    let found = map.borrow().contains_key(&*key);
    Ok(Some(Value::Bool(found)))
}

/// 删除键并保持其余键的插入顺序
fn delete(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let target = arg(args, 0)?;
    let key = arg(args, 1)?.as_str()?;
    target.as_map()?.borrow_mut().shift_remove(&*key);
    Ok(None)
}

fn keys(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let map = arg(args, 0)?.as_map()?;
    let keys = map.borrow().keys().map(Value::str).collect();
    Ok(Some(Value::arr(keys)))
}

/// `Join(arr, sep)`：把字符串数组拼接为一个字符串
fn join(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let items = arg(args, 0)?.as_arr()?;
    let sep = arg(args, 1)?.as_str()?;
    let parts = items
        .borrow()
        .iter()
        .map(|item| item.as_str().map(|s| s.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Value::str(parts.join(&sep))))
}

pub(super) fn register(defs: &mut Vec<NativeDef>) {
    defs.extend([
        call("HasKey", "map*,str", "bool", has_key),
        call("Delete", "map*,str", "", delete),
        call("Keys", "map*", "arr.str", keys),
        call("Join", "arr.str,str", "str", join),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::stdlib::testing::{invoke, value};
    use indexmap::IndexMap;

    fn sample() -> Value {
        let mut items = IndexMap::new();
        items.insert("b".to_string(), Value::Int(1));
        items.insert("a".to_string(), Value::Int(2));
        items.insert("c".to_string(), Value::Int(3));
        Value::map(items)
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let map = sample();
        assert_eq!(value(keys, &[map.clone()]).to_string(), "[b a c]");
        invoke(delete, &[map.clone(), Value::str("a")]).unwrap();
        assert_eq!(value(keys, &[map.clone()]).to_string(), "[b c]");
        assert_eq!(value(has_key, &[map, Value::str("a")]), Value::Bool(false));
    }

    #[test]
    fn test_join() {
        let items = Value::arr(vec![Value::str("x"), Value::str("y")]);
        assert_eq!(value(join, &[items, Value::str(", ")]), Value::str("x, y"));
    }
}
