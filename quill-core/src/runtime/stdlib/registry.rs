//! 原生函数注册表
//!
//! 运算符按 `(运算类别, 操作数类型列表)` 精确查表；带通配形参（`arr*`、`map*`、`*`）
//! 的绑定放在按运算类别分组的回退列表中，依注册顺序匹配。

use crate::compiler::symbols::{
    ObjectId, OpKind, ParamPattern, SymbolTable, TypeId, BUILTIN_TYPES,
};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct NativeRegistry {
    exact: HashMap<(OpKind, Vec<TypeId>), ObjectId>,
    patterns: HashMap<OpKind, Vec<ObjectId>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个运算符绑定；命名函数走命名空间，不进入此表
    pub fn insert(&mut self, op: OpKind, params: &[ParamPattern], id: ObjectId) {
        let exact: Option<Vec<TypeId>> = params
            .iter()
            .map(|p| match p {
                ParamPattern::Exact(ty) => Some(*ty),
                _ => None,
            })
            .collect();
        match exact {
            Some(types) => {
                self.exact.insert((op, types), id);
            }
            None => self.patterns.entry(op).or_default().push(id),
        }
    }

    pub fn resolve(&self, symbols: &SymbolTable, op: OpKind, args: &[TypeId]) -> Option<ObjectId> {
        if let Some(id) = self.exact.get(&(op, args.to_vec())) {
            return Some(*id);
        }
        self.patterns.get(&op)?.iter().copied().find(|id| {
            symbols.native(*id).is_some_and(|native| {
                native.params.len() == args.len()
                    && native
                        .params
                        .iter()
                        .zip(args)
                        .all(|(p, ty)| symbols.pattern_matches(*p, *ty))
            })
        })
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 解析类型名：内置名、`arr`/`map` 及其 `.T` 形式
pub fn parse_type_name(symbols: &mut SymbolTable, text: &str) -> Option<TypeId> {
    let text = text.trim();
    if let Some(elem) = text.strip_prefix("arr.") {
        let elem = parse_type_name(symbols, elem)?;
        return Some(symbols.arr_of(elem));
    }
    if let Some(elem) = text.strip_prefix("map.") {
        let elem = parse_type_name(symbols, elem)?;
        return Some(symbols.map_of(elem));
    }
    let builtins = *symbols.builtins();
    match text {
        "arr" => Some(builtins.arr_str),
        "map" => Some(builtins.map_str),
        _ => {
            let idx = BUILTIN_TYPES.iter().position(|name| *name == text)?;
            Some(ObjectId(idx as u32))
        }
    }
}

/// 解析形参签名 `"int,arr*"`；空串表示无参数
pub fn parse_params(symbols: &mut SymbolTable, text: &str) -> Result<Vec<ParamPattern>, String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part {
            "*" => Ok(ParamPattern::Any),
            "arr*" => Ok(ParamPattern::AnyArr),
            "map*" => Ok(ParamPattern::AnyMap),
            name => parse_type_name(symbols, name)
                .map(ParamPattern::Exact)
                .ok_or_else(|| name.to_string()),
        })
        .collect()
}

/// 原生函数覆盖的键：`名称(形参类型串)`，如 `int(float)`、`Hex(buf)`
pub fn native_key(name: &str, ins: &str) -> String {
    let params: Vec<&str> = ins
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part {
            "arr" => "arr.str",
            "map" => "map.str",
            other => other,
        })
        .collect();
    format!("{name}({})", params.join(","))
}

/// 已解析形参还原为类型串，与 [`native_key`] 的写法一致
pub fn pattern_names(symbols: &SymbolTable, params: &[ParamPattern]) -> String {
    params
        .iter()
        .map(|p| match p {
            ParamPattern::Exact(ty) => symbols.type_name(*ty),
            ParamPattern::AnyArr => "arr*".to_string(),
            ParamPattern::AnyMap => "map*".to_string(),
            ParamPattern::Any => "*".to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// 解析返回类型；空串表示无返回值
pub fn parse_ret(symbols: &mut SymbolTable, text: &str) -> Result<Option<TypeId>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    parse_type_name(symbols, text)
        .map(Some)
        .ok_or_else(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signature_strings() {
        let mut symbols = SymbolTable::new();
        let b = *symbols.builtins();
        let params = parse_params(&mut symbols, "int, arr.int ,map*").unwrap();
        assert_eq!(
            params,
            vec![
                ParamPattern::Exact(b.int),
                ParamPattern::Exact(b.arr_int),
                ParamPattern::AnyMap
            ]
        );
        assert!(parse_params(&mut symbols, "").unwrap().is_empty());
        assert_eq!(parse_ret(&mut symbols, "").unwrap(), None);
        assert_eq!(parse_params(&mut symbols, "int,widget").unwrap_err(), "widget");
    }
}
