//! 运行时值
//!
//! 标量按值存储；容器（buf、arr、map、set、struct）放在 [`Shared`] 句柄里。
//! 普通赋值执行深拷贝，只有 `&=` 会把句柄标记为 aliased 并在两个槽位间共享。

use super::fault::{Fault, FaultKind};
use super::object::Obj;
use indexmap::IndexMap;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

// ==================== 容器句柄 ====================

#[derive(Debug)]
pub struct Container<T> {
    data: RefCell<T>,
    aliased: Cell<bool>,
}

pub type Shared<T> = Rc<Container<T>>;

pub fn shared<T>(data: T) -> Shared<T> {
    Rc::new(Container {
        data: RefCell::new(data),
        aliased: Cell::new(false),
    })
}

impl<T> Container<T> {
    pub fn borrow(&self) -> Ref<'_, T> {
        self.data.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.data.borrow_mut()
    }

    pub fn is_aliased(&self) -> bool {
        self.aliased.get()
    }

    pub fn mark_aliased(&self) {
        self.aliased.set(true);
    }
}

// ==================== set ====================

/// 位集合，按 64 位字按需增长
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|w| w & (1 << (index % 64)) != 0)
    }

    pub fn set(&mut self, index: usize, on: bool) {
        let word = index / 64;
        if word >= self.words.len() {
            if !on {
                return;
            }
            self.words.resize(word + 1, 0);
        }
        if on {
            self.words[word] |= 1 << (index % 64);
        } else {
            self.words[word] &= !(1 << (index % 64));
        }
    }

    /// 容量（按位计）
    pub fn capacity(&self) -> usize {
        self.words.len() * 64
    }

    pub fn combine(&self, other: &BitSet, and: bool) -> BitSet {
        let len = self.words.len().max(other.words.len());
        let words = (0..len)
            .map(|i| {
                let a = self.words.get(i).copied().unwrap_or(0);
                let b = other.words.get(i).copied().unwrap_or(0);
                if and {
                    a & b
                } else {
                    a | b
                }
            })
            .collect();
        BitSet { words }
    }

    pub fn invert(&self) -> BitSet {
        BitSet {
            words: self.words.iter().map(|w| !w).collect(),
        }
    }

    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity()).filter(|i| self.get(*i))
    }
}

impl std::fmt::Display for BitSet {
    /// 形如 `0101`，去掉末尾的 0
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last = self.iter_set().last();
        if let Some(last) = last {
            for i in 0..=last {
                write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
            }
        }
        Ok(())
    }
}

// ==================== Value ====================

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(Rc<str>),
    Range(i64, i64),
    Buf(Shared<Vec<u8>>),
    Arr(Shared<Vec<Value>>),
    Map(Shared<IndexMap<String, Value>>),
    Set(Shared<BitSet>),
    /// 字段顺序与类型声明一致
    Struct(Shared<Vec<Value>>),
    Obj(Rc<Obj>),
    /// 链接后的函数下标；`None` 表示尚未赋值
    Fn(Option<u32>),
    Error(Rc<Fault>),
}

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Result<$ty, Fault> {
            match self {
                Value::$variant(v) => Ok(v.clone()),
                other => Err(Fault::internal(format!(
                    concat!("expecting ", stringify!($variant), ", found {}"),
                    other.kind_name()
                ))),
            }
        }
    };
}

impl Value {
    pub fn str(text: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(text.as_ref()))
    }

    pub fn buf(bytes: Vec<u8>) -> Value {
        Value::Buf(shared(bytes))
    }

    pub fn arr(items: Vec<Value>) -> Value {
        Value::Arr(shared(items))
    }

    pub fn map(items: IndexMap<String, Value>) -> Value {
        Value::Map(shared(items))
    }

    pub fn set(bits: BitSet) -> Value {
        Value::Set(shared(bits))
    }

    pub fn obj(obj: Obj) -> Value {
        Value::Obj(Rc::new(obj))
    }

    accessor!(as_int, Int, i64);
    accessor!(as_float, Float, f64);
    accessor!(as_bool, Bool, bool);
    accessor!(as_char, Char, char);
    accessor!(as_str, Str, Rc<str>);
    accessor!(as_buf, Buf, Shared<Vec<u8>>);
    accessor!(as_arr, Arr, Shared<Vec<Value>>);
    accessor!(as_map, Map, Shared<IndexMap<String, Value>>);
    accessor!(as_set, Set, Shared<BitSet>);
    accessor!(as_struct, Struct, Shared<Vec<Value>>);
    accessor!(as_obj, Obj, Rc<Obj>);
    accessor!(as_error, Error, Rc<Fault>);

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Str(_) => "str",
            Value::Range(..) => "range",
            Value::Buf(_) => "buf",
            Value::Arr(_) => "arr",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Struct(_) => "struct",
            Value::Obj(_) => "obj",
            Value::Fn(_) => "fn",
            Value::Error(_) => "error",
        }
    }

    /// 容器句柄是否已经通过 `&=` 共享
    pub fn is_aliased(&self) -> bool {
        match self {
            Value::Buf(c) => c.is_aliased(),
            Value::Arr(c) | Value::Struct(c) => c.is_aliased(),
            Value::Map(c) => c.is_aliased(),
            Value::Set(c) => c.is_aliased(),
            _ => false,
        }
    }

    /// 标记为共享；非容器返回 false
    pub fn mark_aliased(&self) -> bool {
        match self {
            Value::Buf(c) => c.mark_aliased(),
            Value::Arr(c) | Value::Struct(c) => c.mark_aliased(),
            Value::Map(c) => c.mark_aliased(),
            Value::Set(c) => c.mark_aliased(),
            _ => return false,
        }
        true
    }

    // ==================== 拷贝语义 ====================

    /// 深拷贝；嵌套在内部、已共享的容器保持共享
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Buf(c) => Value::buf(c.borrow().clone()),
            Value::Arr(c) => Value::arr(c.borrow().iter().map(Value::copy_shared).collect()),
            Value::Struct(c) => {
                Value::Struct(shared(c.borrow().iter().map(Value::copy_shared).collect()))
            }
            Value::Map(c) => Value::map(
                c.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.copy_shared()))
                    .collect(),
            ),
            Value::Set(c) => Value::set(c.borrow().clone()),
            other => other.clone(),
        }
    }

    /// 参数传递：共享的句柄原样传递，其余深拷贝
    pub fn copy_shared(&self) -> Value {
        if self.is_aliased() {
            self.clone()
        } else {
            self.deep_copy()
        }
    }

    /// 普通赋值：目标若是共享容器，则原地覆盖其内容
    pub fn assign_into(slot: &mut Value, value: &Value) {
        let in_place = match (&*slot, value) {
            (Value::Buf(dst), Value::Buf(src)) if dst.is_aliased() => {
                if !Rc::ptr_eq(dst, src) {
                    let data = src.borrow().clone();
                    *dst.borrow_mut() = data;
                }
                true
            }
            (Value::Arr(dst), Value::Arr(src)) | (Value::Struct(dst), Value::Struct(src))
                if dst.is_aliased() =>
            {
                if !Rc::ptr_eq(dst, src) {
                    let data: Vec<Value> = src.borrow().iter().map(Value::copy_shared).collect();
                    *dst.borrow_mut() = data;
                }
                true
            }
            (Value::Map(dst), Value::Map(src)) if dst.is_aliased() => {
                if !Rc::ptr_eq(dst, src) {
                    let data = src
                        .borrow()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.copy_shared()))
                        .collect();
                    *dst.borrow_mut() = data;
                }
                true
            }
            (Value::Set(dst), Value::Set(src)) if dst.is_aliased() => {
                if !Rc::ptr_eq(dst, src) {
                    let data = src.borrow().clone();
                    *dst.borrow_mut() = data;
                }
                true
            }
            _ => false,
        };
        if !in_place {
            *slot = value.deep_copy();
        }
    }

    // ==================== 迭代 ====================

    /// 可迭代值的长度
    pub fn iter_len(&self) -> Result<usize, Fault> {
        Ok(match self {
            Value::Str(s) => s.chars().count(),
            Value::Buf(c) => c.borrow().len(),
            Value::Arr(c) => c.borrow().len(),
            Value::Map(c) => c.borrow().len(),
            Value::Range(from, to) => from
                .abs_diff(*to)
                .checked_add(1)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    Fault::new(FaultKind::InvalidParam, format!("range {from}..{to} is too large"))
                })?,
            other => {
                return Err(Fault::internal(format!(
                    "{} is not iterable",
                    other.kind_name()
                )))
            }
        })
    }

    /// 第 `i` 个元素及其键（数组类为下标，map 为键名）
    pub fn iter_item(&self, i: usize) -> Result<(Value, Value), Fault> {
        let index = Value::Int(i as i64);
        let missing = || Fault::internal(format!("iteration index {i} is out of bounds"));
        Ok(match self {
            Value::Str(s) => (Value::Char(s.chars().nth(i).ok_or_else(missing)?), index),
            Value::Buf(c) => (Value::Int(*c.borrow().get(i).ok_or_else(missing)? as i64), index),
            Value::Arr(c) => (c.borrow().get(i).ok_or_else(missing)?.copy_shared(), index),
            Value::Map(c) => {
                let items = c.borrow();
                let (key, value) = items.get_index(i).ok_or_else(missing)?;
                (value.copy_shared(), Value::str(key))
            }
            Value::Range(from, to) => {
                let item = if from <= to {
                    from.checked_add_unsigned(i as u64)
                } else {
                    from.checked_sub_unsigned(i as u64)
                };
                (Value::Int(item.ok_or_else(missing)?), index)
            }
            other => {
                return Err(Fault::internal(format!(
                    "{} is not iterable",
                    other.kind_name()
                )))
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Range(a, b), Value::Range(c, d)) => a == c && b == d,
            (Value::Buf(a), Value::Buf(b)) => *a.borrow() == *b.borrow(),
            (Value::Arr(a), Value::Arr(b)) | (Value::Struct(a), Value::Struct(b)) => {
                *a.borrow() == *b.borrow()
            }
            (Value::Map(a), Value::Map(b)) => *a.borrow() == *b.borrow(),
            (Value::Set(a), Value::Set(b)) => *a.borrow() == *b.borrow(),
            (Value::Obj(a), Value::Obj(b)) => a == b,
            (Value::Fn(a), Value::Fn(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Range(from, to) => write!(f, "{from}..{to}"),
            Value::Buf(c) => write!(f, "{}", String::from_utf8_lossy(&c.borrow())),
            Value::Arr(c) | Value::Struct(c) => {
                write!(f, "[")?;
                for (i, item) in c.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(c) => {
                write!(f, "map[")?;
                for (i, (key, item)) in c.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{key}:{item}")?;
                }
                write!(f, "]")
            }
            Value::Set(c) => write!(f, "{}", c.borrow()),
            Value::Obj(obj) => write!(f, "{obj}"),
            Value::Fn(Some(idx)) => write!(f, "fn#{idx}"),
            Value::Fn(None) => write!(f, "fn#nil"),
            Value::Error(fault) => write!(f, "{}", fault.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_copies() {
        let source = Value::arr(vec![Value::Int(1), Value::Int(2)]);
        let mut slot = Value::Int(0);
        Value::assign_into(&mut slot, &source);
        slot.as_arr().unwrap().borrow_mut().push(Value::Int(3));
        assert_eq!(source.as_arr().unwrap().borrow().len(), 2);
    }

    #[test]
    fn test_assignment_into_alias_updates_both() {
        let target = Value::arr(vec![Value::Int(1)]);
        target.mark_aliased();
        let mut slot = target.clone();
        Value::assign_into(&mut slot, &Value::arr(vec![Value::Int(7), Value::Int(8)]));
        assert_eq!(target.as_arr().unwrap().borrow().len(), 2);
    }

    #[test]
    fn test_copy_shared_keeps_alias() {
        let value = Value::buf(vec![1, 2]);
        assert!(!Rc::ptr_eq(
            &value.copy_shared().as_buf().unwrap(),
            &value.as_buf().unwrap()
        ));
        value.mark_aliased();
        assert!(Rc::ptr_eq(
            &value.copy_shared().as_buf().unwrap(),
            &value.as_buf().unwrap()
        ));
    }

    #[test]
    fn test_bitset() {
        let mut bits = BitSet::default();
        bits.set(3, true);
        bits.set(70, true);
        assert!(bits.get(3) && bits.get(70) && !bits.get(4));
        bits.set(70, false);
        assert_eq!(bits.to_string(), "0001");
        assert_eq!(bits.capacity(), 128);
    }

    #[test]
    fn test_range_iteration_both_directions() {
        let up = Value::Range(1, 3);
        assert_eq!(up.iter_len().unwrap(), 3);
        assert_eq!(up.iter_item(2).unwrap().0, Value::Int(3));
        let down = Value::Range(3, 1);
        assert_eq!(down.iter_item(1).unwrap().0, Value::Int(2));
    }

    #[test]
    fn test_range_with_extreme_bounds() {
        let wide = Value::Range(i64::MIN + 1, i64::MAX);
        assert_eq!(wide.iter_len().unwrap(), usize::MAX);
        assert_eq!(wide.iter_item(0).unwrap().0, Value::Int(i64::MIN + 1));
        assert_eq!(wide.iter_item(usize::MAX - 1).unwrap().0, Value::Int(i64::MAX));
        let down = Value::Range(i64::MAX, i64::MIN + 1);
        assert_eq!(down.iter_item(1).unwrap().0, Value::Int(i64::MAX - 1));

        let err = Value::Range(i64::MIN, i64::MAX).iter_len().unwrap_err();
        assert_eq!(err.kind, FaultKind::InvalidParam);
    }
}
