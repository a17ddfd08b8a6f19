//! 链接器
//!
//! 从入口单元的 run 函数出发，沿调用图收集所有可达的函数、原生函数和类型，
//! 把字节码中的全局对象 id 改写为 [`Program`] 内的稠密下标。

use super::workspace::Workspace;
use crate::compiler::error::ErrorKind;
use crate::compiler::symbols::{ObjectId, OpKind, TypeId, TypeKind};
use crate::kit::lexer::LineIndex;
use crate::runtime::bytecode::{Chunk, Op};
use crate::runtime::stdlib::{native_key, registry, NativeFn};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

const TARGET: &str = "quill::linker";

/// 运行时类型描述，用于生成零值
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfo {
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
    Arr,
    Map,
    /// 字段类型在 `Program::types` 中的下标，顺序即声明顺序
    Struct(Vec<usize>),
    Fn,
}

#[derive(Debug, Clone)]
pub struct LinkedFunc {
    pub name: String,
    /// `Program::units` 中的下标
    pub unit: usize,
    pub chunk: Rc<Chunk>,
    pub locals: usize,
    pub params: usize,
}

#[derive(Clone)]
pub struct LinkedNative {
    pub name: String,
    /// 逗号分隔的形参类型串
    pub ins: String,
    pub op: OpKind,
    pub func: NativeFn,
}

impl LinkedNative {
    /// 覆盖表中的键
    pub fn key(&self) -> String {
        native_key(&self.name, &self.ins)
    }
}

impl std::fmt::Debug for LinkedNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedNative")
            .field("name", &self.name)
            .field("ins", &self.ins)
            .field("op", &self.op)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UnitInfo {
    pub path: String,
    pub lines: Rc<LineIndex>,
}

/// 可执行程序
#[derive(Debug, Clone)]
pub struct Program {
    /// 入口函数在 `funcs` 中的下标
    pub entry: usize,
    pub funcs: Vec<LinkedFunc>,
    pub natives: Vec<LinkedNative>,
    pub types: Vec<TypeInfo>,
    pub units: Vec<UnitInfo>,
    /// 入口函数的返回类型名
    pub ret: Option<String>,
}

impl Program {
    /// 指令位置对应的 `path:line:column`
    pub fn location(&self, func: usize, ip: usize) -> String {
        let Some(linked) = self.funcs.get(func) else {
            return "<unknown>".to_string();
        };
        let Some(unit) = self.units.get(linked.unit) else {
            return linked.name.clone();
        };
        let offset = linked.chunk.offsets.get(ip).copied().unwrap_or(0);
        let coord = unit.lines.coordinate(offset);
        format!("{}:{}:{}", unit.path, coord.line, coord.column)
    }

    /// 全部函数的反汇编
    pub fn disassemble(&self) -> String {
        self.funcs
            .iter()
            .map(|f| f.chunk.disassemble(&f.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct Linker<'w> {
    ws: &'w Workspace,
    funcs: Vec<LinkedFunc>,
    func_ids: HashMap<ObjectId, usize>,
    pending: Vec<ObjectId>,
    natives: Vec<LinkedNative>,
    native_ids: HashMap<ObjectId, usize>,
    types: Vec<TypeInfo>,
    type_ids: HashMap<TypeId, usize>,
    units: Vec<UnitInfo>,
    unit_ids: HashMap<u32, usize>,
}

/// 链接一个单元
pub fn link(ws: &Workspace, unit: u32) -> Result<Program, ErrorKind> {
    let entry_unit = ws
        .unit(unit)
        .ok_or_else(|| ErrorKind::Compiler(format!("unit {unit} does not exist")))?;
    let run_id = entry_unit.run_id.ok_or(ErrorKind::NoRun)?;
    let mut linker = Linker {
        ws,
        funcs: Vec::new(),
        func_ids: HashMap::new(),
        pending: Vec::new(),
        natives: Vec::new(),
        native_ids: HashMap::new(),
        types: Vec::new(),
        type_ids: HashMap::new(),
        units: Vec::new(),
        unit_ids: HashMap::new(),
    };
    let entry = linker.func_slot(run_id.0)?;
    while let Some(id) = linker.pending.pop() {
        linker.link_func(id)?;
    }
    let ret = ws
        .symbols()
        .func(run_id)
        .and_then(|f| f.ret)
        .map(|ty| ws.symbols().type_name(ty));
    debug!(
        target: TARGET,
        unit = entry_unit.path.as_str(),
        funcs = linker.funcs.len(),
        natives = linker.natives.len(),
        types = linker.types.len(),
        "linked program"
    );
    Ok(Program {
        entry,
        funcs: linker.funcs,
        natives: linker.natives,
        types: linker.types,
        units: linker.units,
        ret,
    })
}

impl Linker<'_> {
    /// 为函数分配下标，函数体稍后处理
    fn func_slot(&mut self, raw: u32) -> Result<usize, ErrorKind> {
        let id = ObjectId(raw);
        if let Some(idx) = self.func_ids.get(&id) {
            return Ok(*idx);
        }
        let func = self.ws.symbols().func(id).ok_or(ErrorKind::LinkIndex(raw))?;
        let code = func.code.as_ref().ok_or(ErrorKind::LinkIndex(raw))?;
        let unit = self.unit_slot(func.unit);
        let idx = self.funcs.len();
        self.funcs.push(LinkedFunc {
            name: func.name.clone(),
            unit,
            chunk: code.chunk.clone(),
            locals: code.locals,
            params: func.params.len(),
        });
        self.func_ids.insert(id, idx);
        self.pending.push(id);
        Ok(idx)
    }

    fn native_slot(&mut self, raw: u32) -> Result<usize, ErrorKind> {
        let id = ObjectId(raw);
        if let Some(idx) = self.native_ids.get(&id) {
            return Ok(*idx);
        }
        let native = self.ws.symbols().native(id).ok_or(ErrorKind::LinkIndex(raw))?;
        let idx = self.natives.len();
        self.natives.push(LinkedNative {
            name: native.name.clone(),
            ins: registry::pattern_names(self.ws.symbols(), &native.params),
            op: native.op,
            func: native.func,
        });
        self.native_ids.insert(id, idx);
        Ok(idx)
    }

    fn type_slot(&mut self, raw: u32) -> Result<usize, ErrorKind> {
        let id = ObjectId(raw);
        if let Some(idx) = self.type_ids.get(&id) {
            return Ok(*idx);
        }
        let kind = self
            .ws
            .symbols()
            .type_kind(id)
            .ok_or(ErrorKind::LinkIndex(raw))?
            .clone();
        // 先占位，结构体字段再递归分配
        let idx = self.types.len();
        self.types.push(TypeInfo::Int);
        self.type_ids.insert(id, idx);
        let info = match kind {
            TypeKind::Int => TypeInfo::Int,
            TypeKind::Float => TypeInfo::Float,
            TypeKind::Bool => TypeInfo::Bool,
            TypeKind::Char => TypeInfo::Char,
            TypeKind::Str => TypeInfo::Str,
            TypeKind::Range => TypeInfo::Range,
            TypeKind::Buf => TypeInfo::Buf,
            TypeKind::Set => TypeInfo::Set,
            TypeKind::Obj => TypeInfo::Obj,
            TypeKind::Error => TypeInfo::Error,
            TypeKind::Arr(_) => TypeInfo::Arr,
            TypeKind::Map(_) => TypeInfo::Map,
            TypeKind::Fn(_) => TypeInfo::Fn,
            TypeKind::Struct(fields) => TypeInfo::Struct(
                fields
                    .iter()
                    .map(|(_, ty)| self.type_slot(ty.0))
                    .collect::<Result<_, _>>()?,
            ),
        };
        self.types[idx] = info;
        Ok(idx)
    }

    fn unit_slot(&mut self, unit: u32) -> usize {
        if let Some(idx) = self.unit_ids.get(&unit) {
            return *idx;
        }
        let (path, lines) = match self.ws.unit(unit) {
            Some(u) => (u.path.clone(), u.lines.clone()),
            None => ("<stdlib>".to_string(), Rc::new(LineIndex::new(""))),
        };
        let idx = self.units.len();
        self.units.push(UnitInfo { path, lines });
        self.unit_ids.insert(unit, idx);
        idx
    }

    /// 改写函数体中的对象 id
    fn link_func(&mut self, id: ObjectId) -> Result<(), ErrorKind> {
        let idx = *self
            .func_ids
            .get(&id)
            .ok_or_else(|| ErrorKind::Compiler(format!("function {} has no slot", id.0)))?;
        let mut chunk = (*self.funcs[idx].chunk).clone();
        for op in chunk.code.iter_mut() {
            match op {
                Op::Call { func, .. } | Op::Go { func, .. } | Op::MakeFn(func) => {
                    *func = self.func_slot(*func)? as u32;
                }
                Op::CallNative { native, .. } => {
                    *native = self.native_slot(*native)? as u32;
                }
                Op::Zero(ty) | Op::MakeStruct { ty, .. } => {
                    *ty = self.type_slot(*ty)? as u32;
                }
                _ => {}
            }
        }
        trace!(target: TARGET, func = %self.funcs[idx].name, ops = chunk.code.len(), "relocated");
        self.funcs[idx].chunk = Rc::new(chunk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::symbols::Object;

    fn workspace(source: &str) -> (Workspace, u32) {
        let mut ws = Workspace::with_defaults().unwrap();
        let unit = ws.compile_source("main.ql", source).unwrap();
        (ws, unit)
    }

    #[test]
    fn test_unit_without_run() {
        let (ws, unit) = workspace("func f() int { return 1 }");
        assert_eq!(link(&ws, unit).unwrap_err(), ErrorKind::NoRun);
    }

    #[test]
    fn test_only_reachable_functions_are_linked() {
        let (ws, unit) = workspace(
            "func used() int { return 1 }\nfunc unused() int { return 2 }\nrun int { return used() }",
        );
        let program = link(&ws, unit).unwrap();
        let names: Vec<_> = program.funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(program.funcs[program.entry].name, "run");
        assert!(names.contains(&"used"));
        assert!(!names.contains(&"unused"));
        assert_eq!(program.ret.as_deref(), Some("int"));
    }

    #[test]
    fn test_linked_natives_carry_signature_keys() {
        let (ws, unit) = workspace("run int { return int(1.5) + int(\"2\") }");
        let program = link(&ws, unit).unwrap();
        let keys: Vec<_> = program.natives.iter().map(LinkedNative::key).collect();
        assert!(keys.contains(&"int(float)".to_string()));
        assert!(keys.contains(&"int(str)".to_string()));
    }

    #[test]
    fn test_out_of_range_reference() {
        let (mut ws, unit) = workspace("run int { return 1 }");
        let run_id = ws.unit(unit).unwrap().run_id.unwrap();
        let bogus = ws.symbols().len() as u32 + 100;
        let func = ws.symbols_mut().func_mut(run_id).unwrap();
        let code = func.code.as_mut().unwrap();
        let mut chunk = (*code.chunk).clone();
        chunk.code.insert(
            0,
            Op::Call {
                func: bogus,
                argc: 0,
                slots: Rc::from(Vec::new()),
                supplied: 0,
            },
        );
        chunk.offsets.insert(0, 0);
        code.chunk = Rc::new(chunk);
        assert_eq!(link(&ws, unit).unwrap_err(), ErrorKind::LinkIndex(bogus));
    }

    #[test]
    fn test_non_function_reference() {
        let (mut ws, unit) = workspace("run int { return 1 }");
        let run_id = ws.unit(unit).unwrap().run_id.unwrap();
        // 下标 0 是内建类型 int，不是函数
        assert!(matches!(ws.symbols().get(ObjectId(0)), Some(Object::Type(_))));
        let func = ws.symbols_mut().func_mut(run_id).unwrap();
        let code = func.code.as_mut().unwrap();
        let mut chunk = (*code.chunk).clone();
        chunk.code.insert(0, Op::MakeFn(0));
        chunk.offsets.insert(0, 0);
        code.chunk = Rc::new(chunk);
        assert_eq!(link(&ws, unit).unwrap_err(), ErrorKind::LinkIndex(0));
    }

    #[test]
    fn test_location_uses_unit_path() {
        let (ws, unit) = workspace("run int {\n  return 1\n}");
        let program = link(&ws, unit).unwrap();
        let location = program.location(program.entry, 0);
        assert!(location.starts_with("main.ql:2:"), "{location}");
    }
}
