//! 索引、字段与追加

use crate::runtime::fault::Fault;
use crate::runtime::value::Value;
use quill_config::LimitConfig;

fn position(index: i64, len: usize) -> Result<usize, Fault> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| Fault::index_out(index))
}

fn set_position(index: i64, limits: &LimitConfig) -> Result<usize, Fault> {
    position(index, limits.max_set_size)
}

/// `container[key]`；容器元素以共享句柄返回，由使用方决定是否拷贝
pub fn get(container: &Value, key: &Value, limits: &LimitConfig) -> Result<Value, Fault> {
    match (container, key) {
        (Value::Str(s), Value::Int(i)) => {
            let len = s.chars().count();
            let idx = position(*i, len)?;
            s.chars()
                .nth(idx)
                .map(Value::Char)
                .ok_or_else(|| Fault::index_out(*i))
        }
        (Value::Buf(buf), Value::Int(i)) => {
            let buf = buf.borrow();
            Ok(Value::Int(buf[position(*i, buf.len())?] as i64))
        }
        (Value::Set(set), Value::Int(i)) => {
            let idx = set_position(*i, limits)?;
            Ok(Value::Bool(set.borrow().get(idx)))
        }
        (Value::Arr(items), Value::Int(i)) => {
            let items = items.borrow();
            Ok(items[position(*i, items.len())?].clone())
        }
        (Value::Map(items), Value::Str(key)) => items
            .borrow()
            .get(key.as_ref())
            .cloned()
            .ok_or_else(|| Fault::key_not_found(key)),
        (Value::Obj(obj), Value::Int(i)) => Ok(Value::obj(obj.item(*i)?)),
        (Value::Obj(obj), Value::Str(key)) => Ok(Value::obj(obj.field(key)?)),
        (container, key) => Err(Fault::internal(format!(
            "{} cannot be indexed by {}",
            container.kind_name(),
            key.kind_name()
        ))),
    }
}

/// `container[key] = value`；越界时不修改容器
pub fn set(container: &Value, key: &Value, value: &Value, limits: &LimitConfig) -> Result<(), Fault> {
    match (container, key) {
        (Value::Buf(buf), Value::Int(i)) => {
            let byte = value.as_int()?;
            let byte = u8::try_from(byte).map_err(|_| Fault::byte_out(byte))?;
            let mut buf = buf.borrow_mut();
            let idx = position(*i, buf.len())?;
            buf[idx] = byte;
        }
        (Value::Set(set), Value::Int(i)) => {
            let idx = set_position(*i, limits)?;
            set.borrow_mut().set(idx, value.as_bool()?);
        }
        (Value::Arr(items), Value::Int(i)) => {
            let mut items = items.borrow_mut();
            let idx = position(*i, items.len())?;
            Value::assign_into(&mut items[idx], value);
        }
        (Value::Map(items), Value::Str(key)) => {
            let mut items = items.borrow_mut();
            match items.get_mut(key.as_ref()) {
                Some(slot) => Value::assign_into(slot, value),
                None => {
                    items.insert(key.to_string(), value.copy_shared());
                }
            }
        }
        (container, key) => {
            return Err(Fault::internal(format!(
                "{} cannot be assigned by {}",
                container.kind_name(),
                key.kind_name()
            )))
        }
    }
    Ok(())
}

pub fn get_field(target: &Value, idx: usize) -> Result<Value, Fault> {
    let fields = target.as_struct()?;
    let fields = fields.borrow();
    fields
        .get(idx)
        .cloned()
        .ok_or_else(|| Fault::internal(format!("field {idx} is out of struct")))
}

pub fn set_field(target: &Value, idx: usize, value: &Value) -> Result<(), Fault> {
    let fields = target.as_struct()?;
    let mut fields = fields.borrow_mut();
    let slot = fields
        .get_mut(idx)
        .ok_or_else(|| Fault::internal(format!("field {idx} is out of struct")))?;
    Value::assign_into(slot, value);
    Ok(())
}

/// `arr += item`
pub fn append(target: &Value, item: &Value) -> Result<(), Fault> {
    target.as_arr()?.borrow_mut().push(item.copy_shared());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::BitSet;
    use indexmap::IndexMap;

    #[test]
    fn test_array_bounds() {
        let arr = Value::arr(vec![Value::Int(1), Value::Int(2)]);
        let limits = LimitConfig::default();
        assert_eq!(get(&arr, &Value::Int(1), &limits).unwrap(), Value::Int(2));
        assert_eq!(get(&arr, &Value::Int(2), &limits).unwrap_err().id, 2);
        assert_eq!(get(&arr, &Value::Int(-1), &limits).unwrap_err().id, 2);
    }

    #[test]
    fn test_missing_map_key() {
        let map = Value::map(IndexMap::new());
        let err = get(&map, &Value::str("k"), &LimitConfig::default()).unwrap_err();
        assert_eq!(err.id, 10);
        set(&map, &Value::str("k"), &Value::Int(3), &LimitConfig::default()).unwrap();
        assert_eq!(get(&map, &Value::str("k"), &LimitConfig::default()).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_set_index_beyond_limit_does_not_mutate() {
        let limits = LimitConfig {
            max_set_size: 16,
            ..LimitConfig::default()
        };
        let set_value = Value::set(BitSet::default());
        let err = set(&set_value, &Value::Int(16), &Value::Bool(true), &limits).unwrap_err();
        assert_eq!(err.id, 2);
        assert_eq!(*set_value.as_set().unwrap().borrow(), BitSet::default());
    }

    #[test]
    fn test_byte_range() {
        let buf = Value::buf(vec![0]);
        let err = set(&buf, &Value::Int(0), &Value::Int(256), &LimitConfig::default()).unwrap_err();
        assert_eq!(err.id, 8);
    }

    #[test]
    fn test_assigned_element_is_copied() {
        let inner = Value::arr(vec![Value::Int(1)]);
        let outer = Value::arr(vec![Value::arr(Vec::new())]);
        set(&outer, &Value::Int(0), &inner, &LimitConfig::default()).unwrap();
        append(&inner, &Value::Int(2)).unwrap();
        let stored = get(&outer, &Value::Int(0), &LimitConfig::default()).unwrap();
        assert_eq!(stored.as_arr().unwrap().borrow().len(), 1);
    }
}
