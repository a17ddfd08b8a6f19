//! 类型对象

use super::ObjectId;

pub type TypeId = ObjectId;

/// fn 类型的签名：参数类型与可选的返回类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnSig {
    pub params: Vec<TypeId>,
    pub ret: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Int,
    Float,
    Bool,
    Char,
    Str,
    Range,
    Buf,
    Set,
    Obj,
    Error,
    Arr(TypeId),
    Map(TypeId),
    /// 字段顺序即声明顺序，决定字段偏移和运行时布局
    Struct(Vec<(String, TypeId)>),
    Fn(FnSig),
}

#[derive(Debug, Clone)]
pub struct TypeObject {
    pub name: String,
    pub unit: u32,
    pub public: bool,
    pub kind: TypeKind,
}

impl TypeObject {
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct(_))
    }

    pub fn field(&self, name: &str) -> Option<(usize, TypeId)> {
        match &self.kind {
            TypeKind::Struct(fields) => fields
                .iter()
                .position(|(field, _)| field == name)
                .map(|idx| (idx, fields[idx].1)),
            _ => None,
        }
    }

    /// 值是否存放在共享句柄中（允许 `&=`）
    pub fn is_container(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Buf | TypeKind::Set | TypeKind::Arr(_) | TypeKind::Map(_) | TypeKind::Struct(_)
        )
    }
}

/// 内置类型的 id，在 stdlib 单元中按固定顺序创建
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub int: TypeId,
    pub float: TypeId,
    pub bool: TypeId,
    pub char: TypeId,
    pub str: TypeId,
    pub range: TypeId,
    pub buf: TypeId,
    pub set: TypeId,
    pub obj: TypeId,
    pub error: TypeId,
    /// `arr` == `arr.str`
    pub arr_str: TypeId,
    pub arr_int: TypeId,
    pub map_str: TypeId,
}

/// 索引规则：`container[key]` 的结果类型
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRule {
    pub keys: Vec<TypeId>,
    pub elem: TypeId,
    /// 是否允许 `container[key] = value`
    pub writable: bool,
}

/// `for v, k in x` 中 v 与 k 的类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterRule {
    pub value: TypeId,
    pub key: TypeId,
}
