//! AST → Bytecode 编译器
//!
//! 一个单元分几遍处理：依赖单元 → 类型与常量名 → 结构体字段与 fn 签名 →
//! 函数签名 → 常量求值 → 函数体。函数体之前所有顶层名字都已登记，
//! 因此声明顺序不影响前向引用。

pub mod call;
pub mod const_eval;
pub mod context;
pub mod decl;
pub mod expr;
pub mod stmt;
pub mod var;

pub use context::{FnCtx, Local, LocalFunc};

use crate::compiler::error::{CResult, CompileError, ErrorAt, ErrorKind};
use crate::compiler::module::resolver::default_alias;
use crate::compiler::module::Workspace;
use crate::compiler::parser::{DeclKind, Expr, Module, Parser};
use crate::compiler::symbols::{Builtins, FuncCode, ObjectId, TypeId};
use crate::kit::lexer::{tokenize, LexOptions, LineIndex};
use crate::runtime::bytecode::{Op, UNPATCHED};
use crate::runtime::value::Value;
use std::rc::Rc;
use tracing::{debug, trace};

const TARGET: &str = "quill::compiler";

/// 单个函数体的编译器
pub struct Compiler<'w> {
    pub(crate) ws: &'w mut Workspace,
    pub(crate) unit: u32,
    pub(crate) ctx: FnCtx,
}

impl<'w> Compiler<'w> {
    pub fn new(ws: &'w mut Workspace, unit: u32, ctx: FnCtx) -> Self {
        Self { ws, unit, ctx }
    }

    pub(crate) fn emit(&mut self, op: Op, offset: usize) -> usize {
        let offset = if self.ws.config().emit_debug_info {
            offset
        } else {
            0
        };
        self.ctx.chunk.emit(op, offset)
    }

    /// 写入带占位目标的跳转
    pub(crate) fn emit_jump(&mut self, make: fn(u32) -> Op, offset: usize) -> usize {
        self.emit(make(UNPATCHED), offset)
    }

    pub(crate) fn here(&self) -> u32 {
        self.ctx.chunk.here()
    }

    pub(crate) fn patch_here(&mut self, at: usize) {
        self.ctx.chunk.patch_here(at);
    }

    pub(crate) fn emit_const(&mut self, value: Value, offset: usize) {
        let idx = self.ctx.chunk.add_constant(value);
        self.emit(Op::Const(idx), offset);
    }

    pub(crate) fn builtins(&self) -> Builtins {
        *self.ws.symbols().builtins()
    }

    pub(crate) fn type_name(&self, ty: TypeId) -> String {
        self.ws.symbols().type_name(ty)
    }

    pub(crate) fn type_names(&self, types: &[TypeId]) -> String {
        self.ws.symbols().type_names(types)
    }

    /// `Ident` 是否指向 import 别名（且未被局部变量遮蔽）
    pub(crate) fn import_alias<'e>(&self, expr: &'e Expr) -> Option<&'e str> {
        match &expr.kind {
            crate::compiler::parser::ExprKind::Ident(name)
                if var::resolve_local(self, name).is_none()
                    && self
                        .ws
                        .unit(self.unit)
                        .is_some_and(|u| u.imports.contains_key(name)) =>
            {
                Some(name)
            }
            _ => None,
        }
    }

    /// 取出当前函数体的字节码写回函数对象
    pub(crate) fn finish(&mut self, id: ObjectId) {
        let ctx = std::mem::take(&mut self.ctx);
        trace!(
            target: TARGET,
            func = %ctx.name,
            ops = ctx.chunk.code.len(),
            locals = ctx.max_slots,
            "function compiled"
        );
        if let Some(func) = self.ws.symbols_mut().func_mut(id) {
            func.code = Some(FuncCode {
                chunk: Rc::new(ctx.chunk),
                locals: ctx.max_slots as usize,
            });
        }
    }
}

/// 编译一个单元并登记到工作区
pub fn compile_unit(ws: &mut Workspace, key: &str, source: &str) -> Result<u32, CompileError> {
    ws.resolver
        .enter(key)
        .map_err(|kind| CompileError::without_position(kind, key))?;
    let result = compile_entered(ws, key, source);
    ws.resolver.leave();
    result
}

fn compile_entered(ws: &mut Workspace, key: &str, source: &str) -> Result<u32, CompileError> {
    debug!(target: TARGET, unit = key, depth = ws.resolver.depth(), "compiling unit");
    let options = LexOptions {
        expand_env: ws.config().expand_env,
    };
    let lexed = tokenize(source, &options)
        .map_err(|err| ErrorAt::from(err).locate(key, &LineIndex::new(source)))?;
    let lines = Rc::new(lexed.lines);
    let module = Parser::new(lexed.tokens)
        .parse()
        .map_err(|err| err.locate(key, &lines))?;

    let unit = ws.push_unit(key);
    if let Some(target) = ws.unit_mut(unit) {
        target.header = lexed.header;
        target.lines = lines.clone();
    }
    let locate = |err: ErrorAt| err.locate(key, &lines);

    compile_dependencies(ws, unit, key, &module, &lines)?;
    let hoisted = decl::hoist(ws, unit, &module).map_err(locate)?;
    decl::resolve_types(ws, unit, &hoisted).map_err(locate)?;
    let funcs = decl::declare_funcs(ws, unit, &hoisted).map_err(locate)?;
    for id in &hoisted.consts {
        const_eval::evaluate(ws, *id).map_err(locate)?;
    }
    for func in &funcs {
        let mut compiler = Compiler::new(ws, unit, FnCtx::new(&func.name, func.ret, func.is_run));
        stmt::compile_body(&mut compiler, func.id, &func.params, func.body, func.offset)
            .map_err(locate)?;
    }

    ws.commit_unit(unit);
    debug!(target: TARGET, unit = key, index = unit, funcs = funcs.len(), "unit compiled");
    Ok(unit)
}

/// include/import：依赖单元先于本单元的任何声明编译
fn compile_dependencies(
    ws: &mut Workspace,
    unit: u32,
    key: &str,
    module: &Module,
    lines: &LineIndex,
) -> Result<(), CompileError> {
    let locate = |kind: ErrorKind, offset: usize| ErrorAt::new(kind, offset).locate(key, lines);
    for decl in &module.decls {
        let items: Vec<(&crate::compiler::parser::PathLit, Option<&String>, bool)> = match &decl.kind {
            DeclKind::Include(paths) => paths.iter().map(|p| (p, None, true)).collect(),
            DeclKind::Import(items) => items
                .iter()
                .map(|item| (&item.path, item.alias.as_ref(), false))
                .collect(),
            _ => continue,
        };
        for (path, alias, include) in items {
            let target = ws.resolver.locate(key, &path.path);
            let dep = match ws.unit_by_path(&target) {
                Some(idx) => idx,
                None => {
                    ws.resolver
                        .enter(&target)
                        .map_err(|kind| locate(kind, path.offset))?;
                    let loaded = ws.resolver.load(ws.vfs(), &target);
                    let result = match loaded {
                        Ok(source) => compile_entered(ws, &source.key, &source.text),
                        Err(kind) => Err(locate(kind, path.offset)),
                    };
                    ws.resolver.leave();
                    result?
                }
            };
            if include {
                ws.merge_include(unit, dep)
                    .map_err(|kind| locate(kind, path.offset))?;
            } else {
                let alias = alias
                    .cloned()
                    .unwrap_or_else(|| default_alias(&target));
                let taken = ws
                    .unit(unit)
                    .is_some_and(|u| u.imports.get(&alias).is_some_and(|idx| *idx != dep));
                if taken {
                    return Err(locate(ErrorKind::UsedName(alias), path.offset));
                }
                if let Some(target) = ws.unit_mut(unit) {
                    target.imports.insert(alias, dep);
                }
            }
            trace!(target: TARGET, unit = key, dependency = %target, include, "dependency resolved");
        }
    }
    Ok(())
}

/// 编译期内部错误
pub(crate) fn bug(message: impl Into<String>, offset: usize) -> ErrorAt {
    ErrorAt::new(ErrorKind::Compiler(message.into()), offset)
}

/// 偏移为 `offset` 的错误
pub(crate) fn error<T>(kind: ErrorKind, offset: usize) -> CResult<T> {
    Err(ErrorAt::new(kind, offset))
}
