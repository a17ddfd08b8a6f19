//! 动态对象 `obj`
//!
//! 封闭的和类型：nil、bool、int、float、str、arr.obj、map.obj。
//! 所有转换都是穷尽的 match，失败时返回带类型的 [`Fault`]。

use super::fault::Fault;
use super::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Obj {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Arr(Vec<Obj>),
    Map(IndexMap<String, Obj>),
}

impl Obj {
    /// 把类型化的值装箱；数组和映射逐元素递归装箱
    pub fn from_value(value: &Value) -> Result<Obj, Fault> {
        let obj = match value {
            Value::Bool(v) => Obj::Bool(*v),
            Value::Int(v) => Obj::Int(*v),
            Value::Float(v) => Obj::Float(*v),
            Value::Str(v) => Obj::Str(v.to_string()),
            Value::Arr(items) => Obj::Arr(
                items
                    .borrow()
                    .iter()
                    .map(Obj::from_value)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(items) => Obj::Map(
                items
                    .borrow()
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Obj::from_value(v)?)))
                    .collect::<Result<_, Fault>>()?,
            ),
            Value::Obj(obj) => (**obj).clone(),
            _ => return Err(Fault::obj_type()),
        };
        Ok(obj)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Obj::Nil)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::Nil => "nil",
            Obj::Bool(_) => "bool",
            Obj::Int(_) => "int",
            Obj::Float(_) => "float",
            Obj::Str(_) => "str",
            Obj::Arr(_) => "arr.obj",
            Obj::Map(_) => "map.obj",
        }
    }

    pub fn to_int(&self) -> Result<i64, Fault> {
        match self {
            Obj::Nil => Err(Fault::obj_nil()),
            Obj::Int(v) => Ok(*v),
            Obj::Bool(v) => Ok(*v as i64),
            Obj::Float(v) => Ok(v.trunc() as i64),
            Obj::Str(s) => parse_int(s),
            Obj::Arr(_) | Obj::Map(_) => Err(Fault::obj_value()),
        }
    }

    pub fn to_float(&self) -> Result<f64, Fault> {
        match self {
            Obj::Nil => Err(Fault::obj_nil()),
            Obj::Float(v) => Ok(*v),
            Obj::Int(v) => Ok(*v as f64),
            Obj::Str(s) => s.trim().parse::<f64>().map_err(|_| Fault::obj_value()),
            Obj::Bool(_) | Obj::Arr(_) | Obj::Map(_) => Err(Fault::obj_value()),
        }
    }

    pub fn to_bool(&self) -> Result<bool, Fault> {
        match self {
            Obj::Nil => Err(Fault::obj_nil()),
            Obj::Bool(v) => Ok(*v),
            Obj::Int(v) => Ok(*v != 0),
            Obj::Float(v) => Ok(*v != 0.0),
            Obj::Str(s) => Ok(!s.is_empty() && s != "0" && s != "false"),
            Obj::Arr(items) => Ok(!items.is_empty()),
            Obj::Map(items) => Ok(!items.is_empty()),
        }
    }

    /// 任何非 nil 值都可以转为字符串
    pub fn to_str(&self) -> Result<String, Fault> {
        match self {
            Obj::Nil => Err(Fault::obj_nil()),
            other => Ok(other.to_string()),
        }
    }

    /// `obj[int]`：越界或非数组返回 nil
    pub fn item(&self, index: i64) -> Result<Obj, Fault> {
        match self {
            Obj::Nil => Ok(Obj::Nil),
            Obj::Arr(items) => Ok(usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or_default()),
            _ => Err(Fault::obj_value()),
        }
    }

    /// `obj[str]`：不存在的键返回 nil
    pub fn field(&self, key: &str) -> Result<Obj, Fault> {
        match self {
            Obj::Nil => Ok(Obj::Nil),
            Obj::Map(items) => Ok(items.get(key).cloned().unwrap_or_default()),
            _ => Err(Fault::obj_value()),
        }
    }

    pub fn len(&self) -> i64 {
        match self {
            Obj::Arr(items) => items.len() as i64,
            Obj::Map(items) => items.len() as i64,
            Obj::Str(s) => s.chars().count() as i64,
            _ => 0,
        }
    }
}

fn parse_int(text: &str) -> Result<i64, Fault> {
    let text = text.trim();
    text.parse::<i64>()
        .or_else(|_| text.parse::<f64>().map(|f| f.trunc() as i64))
        .map_err(|_| Fault::obj_value())
}

impl std::fmt::Display for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Obj::Nil => write!(f, "nil"),
            Obj::Bool(v) => write!(f, "{v}"),
            Obj::Int(v) => write!(f, "{v}"),
            Obj::Float(v) => write!(f, "{v}"),
            Obj::Str(v) => write!(f, "{v}"),
            Obj::Arr(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Obj::Map(items) => {
                write!(f, "map[")?;
                for (i, (key, item)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{key}:{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fault::FaultKind;
    use crate::runtime::value::shared;

    #[test]
    fn test_coercions() {
        assert_eq!(Obj::Str("42".into()).to_int().unwrap(), 42);
        assert_eq!(Obj::Float(3.9).to_int().unwrap(), 3);
        assert_eq!(Obj::Bool(true).to_int().unwrap(), 1);
        assert_eq!(Obj::Int(2).to_float().unwrap(), 2.0);
        assert_eq!(Obj::Float(1.5).to_str().unwrap(), "1.5");
    }

    #[test]
    fn test_nil_and_wrong_value() {
        assert_eq!(Obj::Nil.to_int().unwrap_err().kind, FaultKind::ObjNil);
        assert_eq!(
            Obj::Arr(vec![]).to_int().unwrap_err().kind,
            FaultKind::ObjValue
        );
        assert_eq!(
            Obj::Bool(true).to_float().unwrap_err().kind,
            FaultKind::ObjValue
        );
    }

    #[test]
    fn test_boxing_recurses_into_containers() {
        let arr = Value::Arr(shared(vec![Value::Int(1), Value::Str("x".into())]));
        let obj = Obj::from_value(&arr).unwrap();
        assert_eq!(obj, Obj::Arr(vec![Obj::Int(1), Obj::Str("x".into())]));
        assert_eq!(obj.item(5).unwrap(), Obj::Nil);
        assert_eq!(obj.type_name(), "arr.obj");
    }

    #[test]
    fn test_unsupported_boxing() {
        let err = Obj::from_value(&Value::Char('a')).unwrap_err();
        assert_eq!(err.kind, FaultKind::ObjType);
    }
}
