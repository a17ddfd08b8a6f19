//! 语句编译
//!
//! 语句执行前后操作数栈保持平衡；循环与 switch 的中间状态存放在隐藏局部变量中。

use super::context::{CatchCtx, FnCtx, Local, LocalFunc, LoopCtx};
use super::decl::{self, ParamSite};
use super::expr::{self, compile_cond, compile_expect, compile_value};
use super::{error, var, Compiler};
use crate::compiler::error::{CResult, ErrorKind};
use crate::compiler::parser::{
    Arg, AssignOp, BinaryOp, Block, Case, Expr, ExprKind, FuncDecl, Stmt, StmtKind,
};
use crate::compiler::symbols::{FuncObject, Object, ObjectId, OpKind, Param, TypeId, TypeKind};
use crate::runtime::bytecode::{Op, UNPATCHED};
use crate::runtime::value::Value;

/// 编译函数体：形参登记为局部变量，可选参数的默认值在序言中计算
pub fn compile_body(
    compiler: &mut Compiler,
    id: ObjectId,
    params: &[ParamSite],
    body: &Block,
    offset: usize,
) -> CResult<()> {
    let Some(func) = compiler.ws.symbols().func(id).cloned() else {
        return Err(super::bug(format!("{id} is not a function"), offset));
    };
    var::begin_scope(compiler);
    let mut slots = Vec::with_capacity(func.params.len());
    for (param, site) in func.params.iter().zip(params) {
        slots.push(var::add_local(compiler, &param.name, param.ty, site.offset)?);
    }
    let required = func.required().count();
    for (idx, (param, site)) in func.params.iter().zip(params).enumerate().skip(required) {
        let Some(default) = site.default else {
            continue;
        };
        let skip = compiler.emit(
            Op::SkipIfSupplied {
                bit: (idx - required) as u8,
                end: UNPATCHED,
            },
            site.offset,
        );
        compile_expect(compiler, default, param.ty)?;
        compiler.emit(Op::Init(slots[idx]), site.offset);
        compiler.patch_here(skip);
    }
    for stmt in &body.stmts {
        if matches!(stmt.kind, StmtKind::Optional(_)) {
            continue;
        }
        compile_stmt(compiler, stmt)?;
    }
    if func.ret.is_some() && !terminates(body) {
        return error(ErrorKind::MustReturn(func.name.clone()), offset);
    }
    compiler.emit(Op::ReturnVoid, offset);
    var::end_scope(compiler);
    compiler.finish(id);
    Ok(())
}

/// 块的最后一条语句是否保证返回
pub fn terminates(block: &Block) -> bool {
    let Some(last) = block.stmts.last() else {
        return false;
    };
    match &last.kind {
        StmtKind::Return(_) => true,
        StmtKind::Block(inner) => terminates(inner),
        StmtKind::If {
            branches,
            otherwise: Some(otherwise),
        } => branches.iter().all(|(_, b)| terminates(b)) && terminates(otherwise),
        StmtKind::Switch {
            cases,
            default: Some(default),
            ..
        } => cases.iter().all(|c| terminates(&c.body)) && terminates(default),
        StmtKind::Try { body, catch, .. } => terminates(body) && terminates(catch),
        _ => false,
    }
}

fn compile_block(compiler: &mut Compiler, block: &Block) -> CResult<()> {
    var::begin_scope(compiler);
    for stmt in &block.stmts {
        compile_stmt(compiler, stmt)?;
    }
    var::end_scope(compiler);
    Ok(())
}

pub fn compile_stmt(compiler: &mut Compiler, stmt: &Stmt) -> CResult<()> {
    let offset = stmt.offset;
    match &stmt.kind {
        StmtKind::VarDecl { ty, name, init } => {
            let ty = decl::resolve_type(compiler.ws, compiler.unit, ty)?;
            match init {
                Some(init) => {
                    compile_expect(compiler, init, ty)?;
                    let slot = var::add_local(compiler, name, ty, offset)?;
                    compiler.emit(Op::Init(slot), offset);
                }
                None => {
                    compiler.emit(Op::Zero(ty.0), offset);
                    let slot = var::add_local(compiler, name, ty, offset)?;
                    compiler.emit(Op::StoreRaw(slot), offset);
                }
            }
        }
        StmtKind::Assign { target, op, value } => match op {
            AssignOp::Set => compile_set(compiler, target, value)?,
            AssignOp::Compound(op) => compile_compound(compiler, target, *op, value)?,
            AssignOp::Alias => compile_alias(compiler, target, value)?,
        },
        StmtKind::Expr(expr) => {
            if expr::compile_expr(compiler, expr, None)?.is_some() {
                compiler.emit(Op::Pop, offset);
            }
        }
        StmtKind::Return(value) => compile_return(compiler, value.as_ref(), offset)?,
        StmtKind::If {
            branches,
            otherwise,
        } => {
            let mut ends = Vec::with_capacity(branches.len());
            for (cond, body) in branches {
                compile_cond(compiler, cond)?;
                let next = compiler.emit_jump(Op::JumpIfFalse, cond.offset);
                compile_block(compiler, body)?;
                ends.push(compiler.emit_jump(Op::Jump, offset));
                compiler.patch_here(next);
            }
            if let Some(otherwise) = otherwise {
                compile_block(compiler, otherwise)?;
            }
            for end in ends {
                compiler.patch_here(end);
            }
        }
        StmtKind::While { cond, body } => {
            let start = compiler.here();
            compile_cond(compiler, cond)?;
            let exit = compiler.emit_jump(Op::JumpIfFalse, cond.offset);
            compile_loop_body(compiler, start, body, offset)?;
            compiler.patch_here(exit);
        }
        StmtKind::For {
            value,
            index,
            iter,
            body,
        } => compile_for(compiler, value, index.as_deref(), iter, body, offset)?,
        StmtKind::Break => {
            let Some(guard_depth) = compiler.ctx.loops.last().map(|l| l.guard_depth) else {
                return error(ErrorKind::Break, offset);
            };
            pop_guards(compiler, guard_depth, offset);
            let jump = compiler.emit_jump(Op::Jump, offset);
            if let Some(ctx) = compiler.ctx.loops.last_mut() {
                ctx.breaks.push(jump);
            }
        }
        StmtKind::Continue => {
            let Some((start, guard_depth)) = compiler.ctx.loops.last().map(|l| (l.start, l.guard_depth))
            else {
                return error(ErrorKind::Continue, offset);
            };
            pop_guards(compiler, guard_depth, offset);
            compiler.emit(Op::Loop(start), offset);
        }
        StmtKind::Block(block) => compile_block(compiler, block)?,
        StmtKind::Switch {
            value,
            cases,
            default,
        } => compile_switch(compiler, value, cases, default.as_ref(), offset)?,
        StmtKind::Try { body, err, catch } => compile_try(compiler, body, err.as_deref(), catch, offset)?,
        StmtKind::Recover => {
            let Some(catch) = compiler.ctx.catches.last() else {
                return error(ErrorKind::Recover, offset);
            };
            let depth = catch.guard_depth as u16;
            let jump = compiler.emit(
                Op::Recover {
                    depth,
                    end: UNPATCHED,
                },
                offset,
            );
            if let Some(catch) = compiler.ctx.catches.last_mut() {
                catch.end_patches.push(jump);
            }
        }
        StmtKind::Retry => {
            let Some(catch) = compiler.ctx.catches.last() else {
                return error(ErrorKind::Retry, offset);
            };
            let (depth, start) = (catch.guard_depth as u16, catch.start);
            compiler.emit(Op::Retry { depth, start }, offset);
        }
        StmtKind::Go { args, body } => compile_go(compiler, args, body, offset)?,
        StmtKind::Func(func) => compile_local_func(compiler, func)?,
        StmtKind::Optional(_) => return error(ErrorKind::Optional, offset),
    }
    Ok(())
}

// ==================== 赋值 ====================

/// 赋值目标；对应的容器与键已压栈
enum Place {
    Local(u16),
    Index,
    Field(u16),
}

fn compile_place(compiler: &mut Compiler, target: &Expr) -> CResult<(Place, TypeId)> {
    match &target.kind {
        ExprKind::Ident(name) => {
            if let Some((slot, ty)) = var::resolve_local(compiler, name) {
                return Ok((Place::Local(slot), ty));
            }
            if compiler.ws.lookup(compiler.unit, name).is_empty() {
                return error(ErrorKind::UnknownIdent(name.clone()), target.offset);
            }
            error(ErrorKind::LValue, target.offset)
        }
        ExprKind::Index { target: base, index } => {
            if !base.is_place() {
                return error(ErrorKind::VarIndex, base.offset);
            }
            let base_ty = compile_value(compiler, base, None)?;
            let rule = expr::index_rule(compiler, base_ty, base.offset)?;
            if !rule.writable {
                return error(ErrorKind::SupportIndex(compiler.type_name(base_ty)), target.offset);
            }
            expr::check_index(compiler, base_ty, &rule.keys, index)?;
            Ok((Place::Index, rule.elem))
        }
        ExprKind::Field { target: base, name } if base.is_place() => {
            let base_ty = compile_value(compiler, base, None)?;
            let (idx, ty) = expr::struct_field(compiler, base_ty, name, target.offset, |ty, field| {
                ErrorKind::WrongField { field, ty }
            })?;
            Ok((Place::Field(idx), ty))
        }
        _ => error(ErrorKind::LValue, target.offset),
    }
}

fn store_place(compiler: &mut Compiler, place: &Place, offset: usize) {
    match place {
        Place::Local(slot) => compiler.emit(Op::Store(*slot), offset),
        Place::Index => compiler.emit(Op::SetIndex, offset),
        Place::Field(idx) => compiler.emit(Op::SetField(*idx), offset),
    };
}

fn compile_set(compiler: &mut Compiler, target: &Expr, value: &Expr) -> CResult<()> {
    let (place, ty) = compile_place(compiler, target)?;
    compile_expect(compiler, value, ty)?;
    store_place(compiler, &place, target.offset);
    Ok(())
}

/// `x op= v`：读出当前值、运算、写回；`arr += T` 原地追加
fn compile_compound(compiler: &mut Compiler, target: &Expr, op: BinaryOp, value: &Expr) -> CResult<()> {
    let offset = target.offset;
    let (place, ty) = compile_place(compiler, target)?;
    match &place {
        Place::Local(slot) => compiler.emit(Op::Load(*slot), offset),
        Place::Index => {
            compiler.emit(Op::Dup2, offset);
            compiler.emit(Op::Index, offset)
        }
        Place::Field(idx) => {
            compiler.emit(Op::Dup, offset);
            compiler.emit(Op::GetField(*idx), offset)
        }
    };
    let elem = match compiler.ws.symbols().type_kind(ty) {
        Some(TypeKind::Arr(elem)) if op == BinaryOp::Add => Some(*elem),
        _ => None,
    };
    let found = compile_value(compiler, value, elem.or(Some(ty)))?;
    if elem == Some(found) {
        compiler.emit(Op::Append, offset);
        let leftover = match place {
            Place::Local(_) => 0,
            Place::Index => 2,
            Place::Field(_) => 1,
        };
        for _ in 0..leftover {
            compiler.emit(Op::Pop, offset);
        }
        return Ok(());
    }
    let result = expr::emit_operator(compiler, OpKind::Binary(op), op.name(), &[ty, found], value.offset)?;
    expr::coerce(compiler, result, ty, value.offset)?;
    store_place(compiler, &place, offset);
    Ok(())
}

/// `a &= b`：两侧是同一容器类型的变量
fn compile_alias(compiler: &mut Compiler, target: &Expr, value: &Expr) -> CResult<()> {
    let ExprKind::Ident(name) = &target.kind else {
        return error(ErrorKind::Alias, target.offset);
    };
    let Some((slot, ty)) = var::resolve_local(compiler, name) else {
        return error(ErrorKind::Alias, target.offset);
    };
    if !compiler.ws.symbols().is_container(ty) || !value.is_place() {
        return error(ErrorKind::Alias, target.offset);
    }
    if compile_value(compiler, value, None)? != ty {
        return error(ErrorKind::Alias, value.offset);
    }
    compiler.emit(Op::Alias(slot), target.offset);
    Ok(())
}

fn compile_return(compiler: &mut Compiler, value: Option<&Expr>, offset: usize) -> CResult<()> {
    match (compiler.ctx.ret, value) {
        (Some(ret), Some(value)) => {
            compile_expect(compiler, value, ret)?;
            compiler.emit(Op::Return, offset);
        }
        (Some(_), None) => return error(ErrorKind::MustReturn(compiler.ctx.name.clone()), offset),
        (None, Some(value)) => {
            return error(ErrorKind::NoReturnValue(compiler.ctx.name.clone()), value.offset)
        }
        (None, None) => {
            compiler.emit(Op::ReturnVoid, offset);
        }
    }
    Ok(())
}

// ==================== 循环 ====================

fn pop_guards(compiler: &mut Compiler, depth: usize, offset: usize) {
    if compiler.ctx.guard_depth > depth {
        compiler.emit(Op::PopGuards(depth as u16), offset);
    }
}

/// 循环体 + 回边；`start` 是 continue 的目标
fn compile_loop_body(compiler: &mut Compiler, start: u32, body: &Block, offset: usize) -> CResult<()> {
    let guard_depth = compiler.ctx.guard_depth;
    compiler.ctx.loops.push(LoopCtx {
        start,
        breaks: Vec::new(),
        guard_depth,
    });
    compile_block(compiler, body)?;
    compiler.emit(Op::Loop(start), offset);
    if let Some(ctx) = compiler.ctx.loops.pop() {
        for at in ctx.breaks {
            compiler.patch_here(at);
        }
    }
    Ok(())
}

/// `for v, i in x`：遍历开始时的快照
fn compile_for(
    compiler: &mut Compiler,
    value: &str,
    index: Option<&str>,
    iter: &Expr,
    body: &Block,
    offset: usize,
) -> CResult<()> {
    let b = compiler.builtins();
    var::begin_scope(compiler);
    let ty = compile_value(compiler, iter, None)?;
    let Some(rule) = compiler.ws.symbols().iter_rule(ty) else {
        return error(ErrorKind::NotIterable(compiler.type_name(ty)), iter.offset);
    };
    let coll = var::add_hidden(compiler, ty, offset)?;
    compiler.emit(Op::Init(coll), offset);
    let counter = var::add_hidden(compiler, b.int, offset)?;
    compiler.emit_const(Value::Int(0), offset);
    compiler.emit(Op::StoreRaw(counter), offset);
    let value = var::add_local(compiler, value, rule.value, offset)?;
    let key = index
        .map(|name| var::add_local(compiler, name, rule.key, offset))
        .transpose()?;
    let start = compiler.here();
    let next = compiler.emit(
        Op::IterNext {
            coll,
            counter,
            value,
            key,
            end: UNPATCHED,
        },
        offset,
    );
    compile_loop_body(compiler, start, body, offset)?;
    compiler.patch_here(next);
    var::end_scope(compiler);
    Ok(())
}

// ==================== switch ====================

fn compile_switch(
    compiler: &mut Compiler,
    value: &Expr,
    cases: &[Case],
    default: Option<&Block>,
    offset: usize,
) -> CResult<()> {
    let b = compiler.builtins();
    var::begin_scope(compiler);
    let ty = compile_value(compiler, value, None)?;
    if ![b.int, b.float, b.bool, b.char, b.str].contains(&ty) {
        return error(ErrorKind::SwitchType(compiler.type_name(ty)), value.offset);
    }
    let tmp = var::add_hidden(compiler, ty, offset)?;
    compiler.emit(Op::StoreRaw(tmp), offset);
    let mut ends = Vec::with_capacity(cases.len());
    for case in cases {
        let mut matches = Vec::with_capacity(case.values.len());
        for candidate in &case.values {
            compiler.emit(Op::Load(tmp), candidate.offset);
            compile_expect(compiler, candidate, ty)?;
            expr::emit_operator(
                compiler,
                OpKind::Binary(BinaryOp::Eq),
                BinaryOp::Eq.name(),
                &[ty, ty],
                candidate.offset,
            )?;
            matches.push(compiler.emit_jump(Op::JumpIfTrue, candidate.offset));
        }
        let next = compiler.emit_jump(Op::Jump, offset);
        for at in matches {
            compiler.patch_here(at);
        }
        compile_block(compiler, &case.body)?;
        ends.push(compiler.emit_jump(Op::Jump, offset));
        compiler.patch_here(next);
    }
    if let Some(default) = default {
        compile_block(compiler, default)?;
    }
    for at in ends {
        compiler.patch_here(at);
    }
    var::end_scope(compiler);
    Ok(())
}

// ==================== try/catch ====================

/// catch 期间守卫仍在栈上：CatchEnd 弹出并重新抛出，recover/retry 截断到 try 之外
fn compile_try(
    compiler: &mut Compiler,
    body: &Block,
    err: Option<&str>,
    catch: &Block,
    offset: usize,
) -> CResult<()> {
    let error_ty = compiler.builtins().error;
    let outer = compiler.ctx.guard_depth;
    var::begin_scope(compiler);
    let err_slot = match err {
        Some(_) => Some(var::add_hidden(compiler, error_ty, offset)?),
        None => None,
    };
    let start = compiler.here();
    let begin = compiler.emit(
        Op::TryBegin {
            catch: UNPATCHED,
            err_slot,
        },
        offset,
    );
    compiler.ctx.guard_depth = outer + 1;
    compile_block(compiler, body)?;
    compiler.emit(Op::TryEnd, offset);
    let done = compiler.emit_jump(Op::Jump, offset);

    compiler.patch_here(begin);
    compiler.ctx.catches.push(CatchCtx {
        guard_depth: outer,
        start,
        end_patches: Vec::new(),
    });
    var::begin_scope(compiler);
    if let (Some(name), Some(slot)) = (err, err_slot) {
        let depth = compiler.ctx.scope_depth;
        compiler.ctx.locals.push(Local {
            name: name.to_string(),
            depth,
            slot,
            ty: error_ty,
        });
    }
    let result = catch.stmts.iter().try_for_each(|stmt| compile_stmt(compiler, stmt));
    var::end_scope(compiler);
    result?;
    compiler.emit(Op::CatchEnd, catch.offset);
    compiler.ctx.guard_depth = outer;

    compiler.patch_here(done);
    if let Some(ctx) = compiler.ctx.catches.pop() {
        for at in ctx.end_patches {
            compiler.patch_here(at);
        }
    }
    var::end_scope(compiler);
    Ok(())
}

// ==================== go 与局部函数 ====================

/// 在新的函数上下文中编译 `body`，外层的局部函数在新上下文中可见
fn compile_nested(
    compiler: &mut Compiler,
    ctx: FnCtx,
    id: ObjectId,
    sites: &[ParamSite],
    body: &Block,
    offset: usize,
) -> CResult<()> {
    let mut ctx = ctx;
    ctx.local_funcs = compiler
        .ctx
        .local_funcs
        .iter()
        .map(|f| LocalFunc {
            depth: 0,
            ..f.clone()
        })
        .collect();
    let outer = std::mem::replace(&mut compiler.ctx, ctx);
    let result = compile_body(compiler, id, sites, body, offset);
    compiler.ctx = outer;
    result
}

/// `go (name: value, ...) { body }`：body 编译为匿名函数，实参在新任务中拷贝
fn compile_go(compiler: &mut Compiler, args: &[Arg], body: &Block, offset: usize) -> CResult<()> {
    let mut params: Vec<Param> = Vec::with_capacity(args.len());
    for arg in args {
        let Some(name) = &arg.name else {
            return error(ErrorKind::GoParam, arg.offset);
        };
        if params.iter().any(|p| p.name == *name) {
            return error(ErrorKind::UsedName(name.clone()), arg.offset);
        }
        let ty = compile_value(compiler, &arg.value, None)?;
        params.push(Param {
            name: name.clone(),
            ty,
            optional: false,
        });
    }
    let sites: Vec<ParamSite> = args
        .iter()
        .map(|arg| ParamSite {
            offset: arg.offset,
            default: None,
        })
        .collect();
    let id = compiler.ws.symbols_mut().push(Object::Func(FuncObject {
        name: "go".to_string(),
        unit: compiler.unit,
        public: false,
        params,
        variadic: false,
        ret: None,
        local: true,
        code: None,
    }));
    compile_nested(compiler, FnCtx::new("go", None, false), id, &sites, body, offset)?;
    compiler.emit(
        Op::Go {
            func: id.0,
            argc: args.len() as u16,
        },
        offset,
    );
    Ok(())
}

/// 局部函数：声明之后在当前作用域内可见，可以递归调用自己
fn compile_local_func(compiler: &mut Compiler, func: &FuncDecl) -> CResult<()> {
    if func.variadic {
        return error(ErrorKind::LocalVariadic(func.name.clone()), func.offset);
    }
    let (params, sites) = decl::build_params(compiler.ws, compiler.unit, func)?;
    let ret = func
        .ret
        .as_ref()
        .map(|ty| decl::resolve_type(compiler.ws, compiler.unit, ty))
        .transpose()?;
    let id = compiler.ws.symbols_mut().push(Object::Func(FuncObject {
        name: func.name.clone(),
        unit: compiler.unit,
        public: false,
        params,
        variadic: false,
        ret,
        local: true,
        code: None,
    }));
    var::add_local_func(compiler, &func.name, id, func.offset)?;
    compile_nested(
        compiler,
        FnCtx::new(&func.name, ret, false),
        id,
        &sites,
        &func.body,
        func.offset,
    )
}
