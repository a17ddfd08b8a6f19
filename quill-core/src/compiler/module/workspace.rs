//! 工作区：一次编译会话的全部状态
//!
//! 持有所有单元、全局对象表以及原生函数注册表。单元 0 是 stdlib，
//! 内置类型和原生函数都登记在它的命名空间中，作为名字查找的最后一层。

use super::linker::{self, Program};
use super::resolver::{path_key, SourceResolver};
use crate::compiler::error::{CompileError, ErrorKind};
use crate::compiler::symbols::{
    NativeObject, Namespace, Object, ObjectId, OpKind, SymbolTable, BUILTIN_TYPES,
};
use crate::kit::lexer::{Header, LineIndex};
use crate::runtime::stdlib::{self, registry, NativeDef, NativeFn, NativeRegistry};
use indexmap::IndexMap;
use quill_config::CompilerConfig;
use quill_vfs::{MemoryFileSystem, VirtualFileSystem};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

const TARGET: &str = "quill::compiler";

/// stdlib 单元的下标
pub const STDLIB_UNIT: u32 = 0;

/// 后续声明的可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Private,
    /// 仅下一条声明公开
    NextPublic,
    /// 之后的所有声明公开
    AllPublic,
}

/// 一个已编译的源文件
#[derive(Debug, Clone)]
pub struct Unit {
    pub index: u32,
    pub path: String,
    pub names: Namespace,
    /// include 进来的单元
    pub includes: Vec<u32>,
    /// import 别名 → 单元
    pub imports: IndexMap<String, u32>,
    pub run_id: Option<ObjectId>,
    pub visibility: Visibility,
    pub header: Header,
    pub lines: Rc<LineIndex>,
}

impl Unit {
    pub(crate) fn new(index: u32, path: &str) -> Self {
        Self {
            index,
            path: path.to_string(),
            names: Namespace::new(),
            includes: Vec::new(),
            imports: IndexMap::new(),
            run_id: None,
            visibility: Visibility::Private,
            header: Header::default(),
            lines: Rc::new(LineIndex::new("")),
        }
    }
}

pub struct Workspace {
    symbols: SymbolTable,
    units: Vec<Unit>,
    registry: NativeRegistry,
    config: CompilerConfig,
    vfs: Box<dyn VirtualFileSystem>,
    /// 规范化路径 → 单元
    by_path: HashMap<String, u32>,
    linked: HashMap<u32, Rc<Program>>,
    pub(crate) resolver: SourceResolver,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("units", &self.units.len())
            .field("objects", &self.symbols.len())
            .field("natives", &self.registry.len())
            .finish()
    }
}

impl Workspace {
    pub fn new(config: CompilerConfig, vfs: Box<dyn VirtualFileSystem>) -> Result<Self, CompileError> {
        let resolver = SourceResolver::new(config.max_include_depth);
        let mut ws = Workspace {
            symbols: SymbolTable::new(),
            units: Vec::new(),
            registry: NativeRegistry::new(),
            config,
            vfs,
            by_path: HashMap::new(),
            linked: HashMap::new(),
            resolver,
        };
        let mut stdlib_unit = Unit::new(STDLIB_UNIT, "stdlib");
        for (idx, name) in BUILTIN_TYPES.iter().enumerate() {
            stdlib_unit.names.insert(name, ObjectId(idx as u32));
        }
        let builtins = *ws.symbols.builtins();
        stdlib_unit.names.insert("arr", builtins.arr_str);
        stdlib_unit.names.insert("map", builtins.map_str);
        ws.units.push(stdlib_unit);
        for def in stdlib::definitions() {
            ws.register_def(def)
                .map_err(|kind| CompileError::without_position(kind, "stdlib"))?;
        }
        debug!(
            target: TARGET,
            objects = ws.symbols.len(),
            operators = ws.registry.len(),
            "stdlib registered"
        );
        Ok(ws)
    }

    /// 默认配置 + 空的内存文件系统
    pub fn with_defaults() -> Result<Self, CompileError> {
        Self::new(CompilerConfig::default(), Box::new(MemoryFileSystem::new()))
    }

    // ==================== 原生函数注册 ====================

    /// 注册一个命名原生函数：`ins` 是逗号分隔的形参类型，`out` 是返回类型（空串表示无）
    pub fn register_native(
        &mut self,
        name: &str,
        func: NativeFn,
        ins: &str,
        out: &str,
    ) -> Result<ObjectId, CompileError> {
        self.register_binding(name, OpKind::Call, func, ins, out)
            .map_err(|kind| CompileError::without_position(kind, "stdlib"))
    }

    fn register_def(&mut self, def: NativeDef) -> Result<ObjectId, ErrorKind> {
        self.register_binding(def.name, def.op, def.func, def.params, def.ret)
    }

    fn register_binding(
        &mut self,
        name: &str,
        op: OpKind,
        func: NativeFn,
        ins: &str,
        out: &str,
    ) -> Result<ObjectId, ErrorKind> {
        let params = registry::parse_params(&mut self.symbols, ins).map_err(ErrorKind::UnknownType)?;
        let ret = registry::parse_ret(&mut self.symbols, out).map_err(ErrorKind::UnknownType)?;
        let id = self.symbols.push(Object::Native(NativeObject {
            name: name.to_string(),
            op,
            params: params.clone(),
            ret,
            func,
        }));
        match op {
            OpKind::Call => self.units[STDLIB_UNIT as usize].names.insert(name, id),
            _ => self.registry.insert(op, &params, id),
        }
        Ok(id)
    }

    // ==================== 编译 ====================

    /// 编译一段源码；同名单元已存在时直接返回其下标
    pub fn compile_source(&mut self, name: &str, source: &str) -> Result<u32, CompileError> {
        let key = path_key(Path::new(name));
        if let Some(idx) = self.by_path.get(&key) {
            return Ok(*idx);
        }
        crate::runtime::compiler::compile_unit(self, &key, source)
    }

    /// 通过 VFS 读取并编译文件
    pub fn compile_file(&mut self, path: &str) -> Result<u32, CompileError> {
        let key = path_key(Path::new(path));
        if let Some(idx) = self.by_path.get(&key) {
            return Ok(*idx);
        }
        let source = self
            .resolver
            .load(self.vfs.as_ref(), &key)
            .map_err(|kind| CompileError::without_position(kind, &key))?;
        crate::runtime::compiler::compile_unit(self, &key, &source.text)
    }

    /// 链接单元；同一单元只链接一次
    pub fn link(&mut self, unit: u32) -> Result<Rc<Program>, CompileError> {
        if let Some(program) = self.linked.get(&unit) {
            return Ok(program.clone());
        }
        let path = self
            .unit(unit)
            .map(|u| u.path.clone())
            .unwrap_or_default();
        let program = linker::link(self, unit)
            .map(Rc::new)
            .map_err(|kind| CompileError::without_position(kind, &path))?;
        self.linked.insert(unit, program.clone());
        Ok(program)
    }

    // ==================== 访问器 ====================

    pub fn unit(&self, idx: u32) -> Option<&Unit> {
        self.units.get(idx as usize)
    }

    pub(crate) fn unit_mut(&mut self, idx: u32) -> Option<&mut Unit> {
        self.units.get_mut(idx as usize)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit_by_path(&self, path: &str) -> Option<u32> {
        self.by_path.get(&path_key(Path::new(path))).copied()
    }

    /// 单元文件头中 `key` 对应的值
    pub fn header(&self, unit: u32, key: &str) -> Option<&str> {
        self.unit(unit)?.header.get(key)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub(crate) fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub(crate) fn registry(&self) -> &NativeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub(crate) fn vfs(&self) -> &dyn VirtualFileSystem {
        self.vfs.as_ref()
    }

    /// 为新单元分配下标；编译成功后才通过 [`Self::commit_unit`] 登记路径
    pub(crate) fn push_unit(&mut self, path: &str) -> u32 {
        let idx = self.units.len() as u32;
        self.units.push(Unit::new(idx, path));
        idx
    }

    pub(crate) fn commit_unit(&mut self, idx: u32) {
        if let Some(unit) = self.units.get(idx as usize) {
            self.by_path.insert(unit.path.clone(), idx);
        }
    }

    // ==================== 名字冲突 ====================

    fn same_signature(&self, a: ObjectId, b: ObjectId) -> bool {
        match (self.symbols.get(a), self.symbols.get(b)) {
            (Some(Object::Func(fa)), Some(Object::Func(fb))) => fa.signature() == fb.signature(),
            (Some(Object::Native(na)), Some(Object::Native(nb))) => na.params == nb.params,
            _ => false,
        }
    }

    fn both_callable(&self, a: ObjectId, b: ObjectId) -> bool {
        let callable = |id| self.symbols.get(id).is_some_and(Object::is_callable);
        callable(a) && callable(b)
    }

    /// 登记本单元的声明
    pub(crate) fn declare(&mut self, unit: u32, name: &str, id: ObjectId) -> Result<(), ErrorKind> {
        let existing = self
            .unit(unit)
            .map(|u| u.names.get(name).to_vec())
            .unwrap_or_default();
        for other in existing {
            if other == id {
                continue;
            }
            let from_here = self.symbols.get(other).map(Object::unit) == Some(unit);
            if !from_here {
                if !self.both_callable(id, other) || self.same_signature(id, other) {
                    return Err(ErrorKind::DupObject(name.to_string()));
                }
                continue;
            }
            match (self.symbols.get(id), self.symbols.get(other)) {
                (Some(Object::Type(_)), Some(Object::Type(_))) => {
                    return Err(ErrorKind::TypeExists(name.to_string()))
                }
                (Some(Object::Const(_)), Some(Object::Const(_))) => {
                    return Err(ErrorKind::ConstDef(name.to_string()))
                }
                (Some(Object::Func(func)), Some(Object::Func(_))) => {
                    if self.same_signature(id, other) {
                        let params = func.required().map(|p| p.ty).collect::<Vec<_>>();
                        return Err(ErrorKind::FuncExists {
                            name: name.to_string(),
                            params: self.symbols.type_names(&params),
                        });
                    }
                }
                _ => return Err(ErrorKind::UsedName(name.to_string())),
            }
        }
        if let Some(target) = self.unit_mut(unit) {
            target.names.insert(name, id);
        }
        Ok(())
    }

    /// include：把 `from` 的公开名字并入 `unit`
    pub(crate) fn merge_include(&mut self, unit: u32, from: u32) -> Result<(), ErrorKind> {
        let public: Vec<(String, ObjectId)> = match self.unit(from) {
            Some(source) => source
                .names
                .iter()
                .flat_map(|(name, ids)| ids.iter().map(move |id| (name.to_string(), *id)))
                .filter(|(_, id)| self.symbols.get(*id).is_some_and(Object::is_public))
                .collect(),
            None => return Err(ErrorKind::Compiler(format!("unit {from} does not exist"))),
        };
        for (name, id) in public {
            let existing = self
                .unit(unit)
                .map(|u| u.names.get(&name).to_vec())
                .unwrap_or_default();
            for other in existing {
                if other == id {
                    continue;
                }
                if !self.both_callable(id, other) || self.same_signature(id, other) {
                    return Err(ErrorKind::DupObject(name));
                }
            }
            if let Some(target) = self.unit_mut(unit) {
                target.names.insert(&name, id);
            }
        }
        if let Some(target) = self.unit_mut(unit) {
            if !target.includes.contains(&from) {
                target.includes.push(from);
            }
        }
        Ok(())
    }

    /// 名字查找：先本单元，再 stdlib
    pub(crate) fn lookup(&self, unit: u32, name: &str) -> Vec<ObjectId> {
        let own = self.unit(unit).map(|u| u.names.get(name)).unwrap_or(&[]);
        let stdlib = self.units[STDLIB_UNIT as usize].names.get(name);
        own.iter().chain(stdlib.iter()).copied().collect()
    }

    /// 通过 import 别名查找公开名字
    pub(crate) fn lookup_qualified(&self, unit: u32, alias: &str, name: &str) -> Option<Vec<ObjectId>> {
        let target = *self.unit(unit)?.imports.get(alias)?;
        let ids = self
            .unit(target)?
            .names
            .get(name)
            .iter()
            .copied()
            .filter(|id| self.symbols.get(*id).is_some_and(Object::is_public))
            .collect();
        Some(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::symbols::{FuncObject, Param};

    fn func(ws: &mut Workspace, name: &str, unit: u32, params: &[crate::compiler::symbols::TypeId]) -> ObjectId {
        ws.symbols_mut().push(Object::Func(FuncObject {
            name: name.to_string(),
            unit,
            public: true,
            params: params
                .iter()
                .enumerate()
                .map(|(i, ty)| Param {
                    name: format!("p{i}"),
                    ty: *ty,
                    optional: false,
                })
                .collect(),
            variadic: false,
            ret: None,
            local: false,
            code: None,
        }))
    }

    #[test]
    fn test_stdlib_unit_is_installed() {
        let ws = Workspace::with_defaults().unwrap();
        let stdlib = ws.unit(STDLIB_UNIT).unwrap();
        assert!(stdlib.names.contains("int"));
        assert!(stdlib.names.contains("Base64"));
        assert!(ws.registry().len() > 20);
    }

    #[test]
    fn test_same_signature_in_unit_is_func_exists() {
        let mut ws = Workspace::with_defaults().unwrap();
        let unit = ws.push_unit("/main.ql");
        let int = ws.symbols().builtins().int;
        let a = func(&mut ws, "f", unit, &[int]);
        let b = func(&mut ws, "f", unit, &[int]);
        let c = func(&mut ws, "f", unit, &[]);
        ws.declare(unit, "f", a).unwrap();
        assert!(matches!(ws.declare(unit, "f", b), Err(ErrorKind::FuncExists { .. })));
        ws.declare(unit, "f", c).unwrap();
        assert_eq!(ws.unit(unit).unwrap().names.get("f"), &[a, c]);
    }

    #[test]
    fn test_include_collision_is_dup_object() {
        let mut ws = Workspace::with_defaults().unwrap();
        let lib = ws.push_unit("/lib.ql");
        let main = ws.push_unit("/main.ql");
        let int = ws.symbols().builtins().int;
        let exported = func(&mut ws, "f", lib, &[int]);
        ws.declare(lib, "f", exported).unwrap();
        ws.merge_include(main, lib).unwrap();
        let own = func(&mut ws, "f", main, &[int]);
        assert_eq!(ws.declare(main, "f", own), Err(ErrorKind::DupObject("f".into())));
        let overload = func(&mut ws, "f", main, &[]);
        ws.declare(main, "f", overload).unwrap();
    }

    #[test]
    fn test_register_native_rejects_unknown_type() {
        fn noop(
            _: &mut crate::runtime::stdlib::NativeCtx<'_>,
            _: &[crate::runtime::value::Value],
        ) -> Result<Option<crate::runtime::value::Value>, crate::runtime::fault::Fault> {
            Ok(None)
        }
        let mut ws = Workspace::with_defaults().unwrap();
        ws.register_native("Noop", noop, "int,str", "").unwrap();
        assert!(ws.unit(STDLIB_UNIT).unwrap().names.contains("Noop"));
        let err = ws.register_native("Bad", noop, "widget", "").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownType("widget".into()));
    }
}
