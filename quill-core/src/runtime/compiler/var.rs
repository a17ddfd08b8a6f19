//! 局部变量、作用域与局部函数

use super::context::{Local, LocalFunc};
use super::Compiler;
use crate::compiler::error::{CResult, ErrorAt, ErrorKind};
use crate::compiler::symbols::{ObjectId, TypeId};

/// 进入新作用域
pub fn begin_scope(compiler: &mut Compiler) {
    compiler.ctx.scope_depth += 1;
}

/// 退出作用域，释放其中的变量槽位
pub fn end_scope(compiler: &mut Compiler) {
    let ctx = &mut compiler.ctx;
    ctx.scope_depth -= 1;
    while let Some(local) = ctx.locals.last() {
        if local.depth <= ctx.scope_depth {
            break;
        }
        ctx.locals.pop();
    }
    ctx.local_funcs.retain(|f| f.depth <= ctx.scope_depth);
    ctx.next_slot = ctx.locals.last().map_or(0, |l| l.slot + 1);
}

fn alloc_slot(compiler: &mut Compiler, offset: usize) -> CResult<u16> {
    let ctx = &mut compiler.ctx;
    let slot = ctx.next_slot;
    ctx.next_slot = slot
        .checked_add(1)
        .ok_or_else(|| ErrorAt::new(ErrorKind::Compiler("too many local variables".into()), offset))?;
    ctx.max_slots = ctx.max_slots.max(ctx.next_slot);
    Ok(slot)
}

/// 声明局部变量，返回槽位；同一作用域重名报 `UsedName`
pub fn add_local(compiler: &mut Compiler, name: &str, ty: TypeId, offset: usize) -> CResult<u16> {
    let ctx = &compiler.ctx;
    let clash = ctx
        .locals
        .iter()
        .rev()
        .take_while(|l| l.depth == ctx.scope_depth)
        .any(|l| l.name == name)
        || ctx
            .local_funcs
            .iter()
            .any(|f| f.depth == ctx.scope_depth && f.name == name);
    if clash {
        return Err(ErrorAt::new(ErrorKind::UsedName(name.to_string()), offset));
    }
    let slot = alloc_slot(compiler, offset)?;
    compiler.ctx.locals.push(Local {
        name: name.to_string(),
        depth: compiler.ctx.scope_depth,
        slot,
        ty,
    });
    Ok(slot)
}

/// 隐藏临时变量（循环快照、计数器、switch 值）
pub fn add_hidden(compiler: &mut Compiler, ty: TypeId, offset: usize) -> CResult<u16> {
    let slot = alloc_slot(compiler, offset)?;
    compiler.ctx.locals.push(Local {
        name: String::new(),
        depth: compiler.ctx.scope_depth,
        slot,
        ty,
    });
    Ok(slot)
}

pub fn resolve_local(compiler: &Compiler, name: &str) -> Option<(u16, TypeId)> {
    compiler
        .ctx
        .locals
        .iter()
        .rev()
        .find(|l| !l.name.is_empty() && l.name == name)
        .map(|l| (l.slot, l.ty))
}

/// 登记局部函数；同一作用域内重名报 `LocalName`
pub fn add_local_func(compiler: &mut Compiler, name: &str, id: ObjectId, offset: usize) -> CResult<()> {
    let ctx = &mut compiler.ctx;
    if ctx
        .local_funcs
        .iter()
        .any(|f| f.depth == ctx.scope_depth && f.name == name)
    {
        return Err(ErrorAt::new(ErrorKind::LocalName(name.to_string()), offset));
    }
    ctx.local_funcs.push(LocalFunc {
        name: name.to_string(),
        depth: ctx.scope_depth,
        id,
    });
    Ok(())
}

/// 最内层的同名局部函数
pub fn resolve_local_func(compiler: &Compiler, name: &str) -> Option<ObjectId> {
    compiler
        .ctx
        .local_funcs
        .iter()
        .rev()
        .find(|f| f.name == name)
        .map(|f| f.id)
}
