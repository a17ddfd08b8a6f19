//! 类型与符号表
//!
//! 全局对象表是一个只增不减的 arena：单元与命名空间只保存 [`ObjectId`]，
//! 一旦分配，id 在整个工作区生命周期内保持稳定。

pub mod namespace;
pub mod object;
pub mod types;

pub use namespace::Namespace;
pub use object::{
    ConstObject, ConstState, FuncCode, FuncObject, NativeObject, Object, OpKind, Param,
    ParamPattern,
};
pub use types::{Builtins, FnSig, IndexRule, IterRule, TypeId, TypeKind, TypeObject};

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 内置类型名，按此顺序创建
pub const BUILTIN_TYPES: [&str; 10] = [
    "int", "float", "bool", "char", "str", "range", "buf", "set", "obj", "error",
];

#[derive(Debug)]
pub struct SymbolTable {
    objects: Vec<Object>,
    /// arr.T / map.T 结构化驻留
    interned: HashMap<TypeKind, TypeId>,
    builtins: Builtins,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = SymbolTable {
            objects: Vec::new(),
            interned: HashMap::new(),
            builtins: Builtins {
                int: ObjectId(0),
                float: ObjectId(0),
                bool: ObjectId(0),
                char: ObjectId(0),
                str: ObjectId(0),
                range: ObjectId(0),
                buf: ObjectId(0),
                set: ObjectId(0),
                obj: ObjectId(0),
                error: ObjectId(0),
                arr_str: ObjectId(0),
                arr_int: ObjectId(0),
                map_str: ObjectId(0),
            },
        };
        let kinds = [
            TypeKind::Int,
            TypeKind::Float,
            TypeKind::Bool,
            TypeKind::Char,
            TypeKind::Str,
            TypeKind::Range,
            TypeKind::Buf,
            TypeKind::Set,
            TypeKind::Obj,
            TypeKind::Error,
        ];
        let ids: Vec<TypeId> = BUILTIN_TYPES
            .iter()
            .zip(kinds)
            .map(|(name, kind)| table.push_type(name.to_string(), 0, true, kind))
            .collect();
        table.builtins.int = ids[0];
        table.builtins.float = ids[1];
        table.builtins.bool = ids[2];
        table.builtins.char = ids[3];
        table.builtins.str = ids[4];
        table.builtins.range = ids[5];
        table.builtins.buf = ids[6];
        table.builtins.set = ids[7];
        table.builtins.obj = ids[8];
        table.builtins.error = ids[9];
        table.builtins.arr_str = table.arr_of(ids[4]);
        table.builtins.arr_int = table.arr_of(ids[0]);
        table.builtins.map_str = table.map_of(ids[4]);
        table
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn push(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.index())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.index())
    }

    pub fn func(&self, id: ObjectId) -> Option<&FuncObject> {
        match self.get(id) {
            Some(Object::Func(func)) => Some(func),
            _ => None,
        }
    }

    pub fn func_mut(&mut self, id: ObjectId) -> Option<&mut FuncObject> {
        match self.get_mut(id) {
            Some(Object::Func(func)) => Some(func),
            _ => None,
        }
    }

    pub fn native(&self, id: ObjectId) -> Option<&NativeObject> {
        match self.get(id) {
            Some(Object::Native(native)) => Some(native),
            _ => None,
        }
    }

    pub fn type_obj(&self, id: TypeId) -> Option<&TypeObject> {
        match self.get(id) {
            Some(Object::Type(ty)) => Some(ty),
            _ => None,
        }
    }

    pub fn type_kind(&self, id: TypeId) -> Option<&TypeKind> {
        self.type_obj(id).map(|ty| &ty.kind)
    }

    pub fn type_name(&self, id: TypeId) -> String {
        self.type_obj(id)
            .map(|ty| ty.name.clone())
            .unwrap_or_else(|| format!("<type {id}>"))
    }

    /// 逗号分隔的类型名列表，用于错误信息
    pub fn type_names(&self, ids: &[TypeId]) -> String {
        ids.iter()
            .map(|id| self.type_name(*id))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn type_name_opt(&self, id: Option<TypeId>) -> String {
        id.map(|id| self.type_name(id))
            .unwrap_or_else(|| "nothing".to_string())
    }

    // ==================== 类型构造 ====================

    fn push_type(&mut self, name: String, unit: u32, public: bool, kind: TypeKind) -> TypeId {
        self.push(Object::Type(TypeObject {
            name,
            unit,
            public,
            kind,
        }))
    }

    fn intern(&mut self, kind: TypeKind, name: String) -> TypeId {
        if let Some(id) = self.interned.get(&kind) {
            return *id;
        }
        let id = self.push_type(name, 0, true, kind.clone());
        self.interned.insert(kind, id);
        id
    }

    pub fn arr_of(&mut self, elem: TypeId) -> TypeId {
        let name = format!("arr.{}", self.type_name(elem));
        self.intern(TypeKind::Arr(elem), name)
    }

    pub fn map_of(&mut self, elem: TypeId) -> TypeId {
        let name = format!("map.{}", self.type_name(elem));
        self.intern(TypeKind::Map(elem), name)
    }

    /// 先占位，字段稍后填充，使结构体之间可以前向引用
    pub fn declare_struct(&mut self, name: &str, unit: u32, public: bool) -> TypeId {
        self.push_type(name.to_string(), unit, public, TypeKind::Struct(Vec::new()))
    }

    pub fn set_struct_fields(&mut self, id: TypeId, fields: Vec<(String, TypeId)>) {
        if let Some(Object::Type(ty)) = self.get_mut(id) {
            ty.kind = TypeKind::Struct(fields);
        }
    }

    pub fn declare_fn_type(&mut self, name: &str, unit: u32, public: bool) -> TypeId {
        self.push_type(
            name.to_string(),
            unit,
            public,
            TypeKind::Fn(FnSig {
                params: Vec::new(),
                ret: None,
            }),
        )
    }

    pub fn set_fn_sig(&mut self, id: TypeId, sig: FnSig) {
        if let Some(Object::Type(ty)) = self.get_mut(id) {
            ty.kind = TypeKind::Fn(sig);
        }
    }

    // ==================== 类型查询 ====================

    pub fn index_rule(&self, ty: TypeId) -> Option<IndexRule> {
        let b = &self.builtins;
        let rule = |keys: Vec<TypeId>, elem: TypeId, writable: bool| IndexRule {
            keys,
            elem,
            writable,
        };
        match self.type_kind(ty)? {
            TypeKind::Str => Some(rule(vec![b.int], b.char, false)),
            TypeKind::Buf => Some(rule(vec![b.int], b.int, true)),
            TypeKind::Set => Some(rule(vec![b.int], b.bool, true)),
            TypeKind::Arr(elem) => Some(rule(vec![b.int], *elem, true)),
            TypeKind::Map(elem) => Some(rule(vec![b.str], *elem, true)),
            TypeKind::Obj => Some(rule(vec![b.int, b.str], b.obj, false)),
            _ => None,
        }
    }

    pub fn iter_rule(&self, ty: TypeId) -> Option<IterRule> {
        let b = &self.builtins;
        let rule = |value: TypeId, key: TypeId| IterRule { value, key };
        match self.type_kind(ty)? {
            TypeKind::Str => Some(rule(b.char, b.int)),
            TypeKind::Buf => Some(rule(b.int, b.int)),
            TypeKind::Range => Some(rule(b.int, b.int)),
            TypeKind::Arr(elem) => Some(rule(*elem, b.int)),
            TypeKind::Map(elem) => Some(rule(*elem, b.str)),
            _ => None,
        }
    }

    pub fn is_container(&self, ty: TypeId) -> bool {
        self.type_obj(ty).is_some_and(TypeObject::is_container)
    }

    pub fn pattern_matches(&self, pattern: ParamPattern, ty: TypeId) -> bool {
        match pattern {
            ParamPattern::Exact(expected) => expected == ty,
            ParamPattern::AnyArr => matches!(self.type_kind(ty), Some(TypeKind::Arr(_))),
            ParamPattern::AnyMap => matches!(self.type_kind(ty), Some(TypeKind::Map(_))),
            ParamPattern::Any => true,
        }
    }

    pub fn pattern_name(&self, pattern: ParamPattern) -> String {
        match pattern {
            ParamPattern::Exact(ty) => self.type_name(ty),
            ParamPattern::AnyArr => "arr*".to_string(),
            ParamPattern::AnyMap => "map*".to_string(),
            ParamPattern::Any => "*".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_types_are_interned() {
        let mut table = SymbolTable::new();
        let int = table.builtins().int;
        let a = table.arr_of(int);
        let b = table.arr_of(int);
        assert_eq!(a, b);
        assert_eq!(a, table.builtins().arr_int);
        assert_eq!(table.type_name(a), "arr.int");
        let nested = table.arr_of(a);
        assert_eq!(table.type_name(nested), "arr.arr.int");
        assert_ne!(table.map_of(int), a);
    }

    #[test]
    fn test_struct_field_order_is_declaration_order() {
        let mut table = SymbolTable::new();
        let b = *table.builtins();
        let point = table.declare_struct("Point", 1, false);
        table.set_struct_fields(
            point,
            vec![("A".into(), b.int), ("B".into(), b.str), ("C".into(), b.int)],
        );
        let ty = table.type_obj(point).unwrap();
        assert_eq!(ty.field("C"), Some((2, b.int)));
        assert_eq!(ty.field("A"), Some((0, b.int)));
        assert_eq!(ty.field("D"), None);
    }

    #[test]
    fn test_index_rules() {
        let mut table = SymbolTable::new();
        let b = *table.builtins();
        let map = table.map_of(b.float);
        assert_eq!(table.index_rule(map).unwrap().keys, vec![b.str]);
        assert_eq!(table.index_rule(b.str).unwrap().elem, b.char);
        assert!(!table.index_rule(b.str).unwrap().writable);
        assert!(table.index_rule(b.int).is_none());
        assert_eq!(table.iter_rule(map).unwrap().key, b.str);
        assert!(table.iter_rule(b.set).is_none());
    }
}
