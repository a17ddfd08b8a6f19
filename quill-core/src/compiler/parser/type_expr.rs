//! 类型表达式
//!
//! 类型写在名字之前：`int x`、`arr.int xs`、`map.arr.str groups`、`m.Point p`。

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Named(String),
    /// 通过 import 别名访问的类型 `alias.Name`
    Qualified(String, String),
    /// `arr` 单独出现时元素类型为 str
    Arr(Option<Box<TypeExpr>>),
    /// `map` 单独出现时值类型为 str
    Map(Option<Box<TypeExpr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub offset: usize,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>, offset: usize) -> Self {
        Self {
            kind: TypeExprKind::Named(name.into()),
            offset,
        }
    }
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TypeExprKind::Named(name) => write!(f, "{name}"),
            TypeExprKind::Qualified(alias, name) => write!(f, "{alias}.{name}"),
            TypeExprKind::Arr(None) => write!(f, "arr"),
            TypeExprKind::Arr(Some(elem)) => write!(f, "arr.{elem}"),
            TypeExprKind::Map(None) => write!(f, "map"),
            TypeExprKind::Map(Some(elem)) => write!(f, "map.{elem}"),
        }
    }
}
