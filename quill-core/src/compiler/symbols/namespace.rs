//! 单元命名空间：名字 → 全局对象 id
//!
//! 函数与原生函数可以同名重载，因此一个名字对应一组 id。

use super::ObjectId;
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct Namespace {
    names: IndexMap<String, Vec<ObjectId>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> &[ObjectId] {
        self.names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    /// 追加绑定；同一 id 重复插入时忽略
    pub fn insert(&mut self, name: &str, id: ObjectId) {
        let ids = self.names.entry(name.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ObjectId])> {
        self.names
            .iter()
            .map(|(name, ids)| (name.as_str(), ids.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overloads_share_a_name() {
        let mut ns = Namespace::new();
        ns.insert("f", ObjectId(3));
        ns.insert("f", ObjectId(4));
        ns.insert("f", ObjectId(3));
        assert_eq!(ns.get("f"), &[ObjectId(3), ObjectId(4)]);
        assert!(ns.get("g").is_empty());
        assert_eq!(ns.len(), 1);
    }
}
