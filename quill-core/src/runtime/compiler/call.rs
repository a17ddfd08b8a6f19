//! 函数调用：重载选择、可选参数、变参打包与 fn 值调用

use super::{error, expr, var, Compiler};
use crate::compiler::error::{CResult, ErrorAt, ErrorKind};
use crate::compiler::parser::{Arg, Expr, ExprKind};
use crate::compiler::symbols::{
    FuncObject, NativeObject, Object, ObjectId, OpKind, SymbolTable, TypeId, TypeKind,
};
use crate::runtime::bytecode::Op;

/// 原生函数形参与实参类型逐一匹配
pub fn native_accepts(symbols: &SymbolTable, native: &NativeObject, args: &[TypeId]) -> bool {
    native.params.len() == args.len()
        && native
            .params
            .iter()
            .zip(args)
            .all(|(p, ty)| symbols.pattern_matches(*p, *ty))
}

/// 位置实参与函数形参精确匹配；位置实参可以依次填充可选参数
pub fn func_accepts(symbols: &SymbolTable, func: &FuncObject, args: &[TypeId]) -> bool {
    if func.variadic {
        let fixed = func.params.len().saturating_sub(1);
        let Some(TypeKind::Arr(elem)) = func.params.last().and_then(|p| symbols.type_kind(p.ty))
        else {
            return false;
        };
        return args.len() >= fixed
            && func.params[..fixed].iter().zip(args).all(|(p, ty)| p.ty == *ty)
            && args[fixed..].iter().all(|ty| ty == elem);
    }
    let required = func.required().count();
    args.len() >= required
        && args.len() <= func.params.len()
        && func.params.iter().zip(args).all(|(p, ty)| p.ty == *ty)
}

fn is_fn_type(compiler: &Compiler, ty: TypeId) -> bool {
    matches!(compiler.ws.symbols().type_kind(ty), Some(TypeKind::Fn(_)))
}

/// 编译调用表达式
pub fn compile_call(
    compiler: &mut Compiler,
    callee: &Expr,
    args: &[Arg],
    offset: usize,
) -> CResult<Option<TypeId>> {
    let positional: Vec<&Arg> = args.iter().filter(|a| a.name.is_none()).collect();
    let named: Vec<&Arg> = args.iter().filter(|a| a.name.is_some()).collect();
    match &callee.kind {
        ExprKind::Ident(name) => {
            if let Some((slot, ty)) = var::resolve_local(compiler, name) {
                if is_fn_type(compiler, ty) {
                    compiler.emit(Op::Load(slot), callee.offset);
                    return call_fn_value(compiler, name, ty, &positional, &named, offset);
                }
            }
            let candidates = match var::resolve_local_func(compiler, name) {
                Some(id) => vec![id],
                None => compiler.ws.lookup(compiler.unit, name),
            };
            let types = compile_positional(compiler, &positional)?;
            dispatch(compiler, name, &candidates, &types, &named, offset)
        }
        ExprKind::Field { target, name } => {
            if let Some(alias) = compiler.import_alias(target) {
                let candidates = compiler
                    .ws
                    .lookup_qualified(compiler.unit, alias, name)
                    .unwrap_or_default();
                let types = compile_positional(compiler, &positional)?;
                return dispatch(compiler, name, &candidates, &types, &named, offset);
            }
            let target_ty = expr::compile_value(compiler, target, None)?;
            let field = compiler
                .ws
                .symbols()
                .type_obj(target_ty)
                .and_then(|ty| ty.field(name));
            if let Some((idx, field_ty)) = field {
                if is_fn_type(compiler, field_ty) {
                    compiler.emit(Op::GetField(idx as u16), callee.offset);
                    return call_fn_value(compiler, name, field_ty, &positional, &named, offset);
                }
            }
            // 方法式调用：x.f(a) 等价于 f(x, a)
            let candidates = match var::resolve_local_func(compiler, name) {
                Some(id) => vec![id],
                None => compiler.ws.lookup(compiler.unit, name),
            };
            let mut types = vec![target_ty];
            types.extend(compile_positional(compiler, &positional)?);
            dispatch(compiler, name, &candidates, &types, &named, offset)
        }
        _ => error(ErrorKind::Unexpected("(".to_string()), offset),
    }
}

fn compile_positional(compiler: &mut Compiler, args: &[&Arg]) -> CResult<Vec<TypeId>> {
    args.iter()
        .map(|arg| expr::compile_value(compiler, &arg.value, None))
        .collect()
}

/// 实参已在栈上，按类型选择候选并生成调用
pub fn dispatch(
    compiler: &mut Compiler,
    name: &str,
    candidates: &[ObjectId],
    types: &[TypeId],
    named: &[&Arg],
    offset: usize,
) -> CResult<Option<TypeId>> {
    let symbols = compiler.ws.symbols();
    let chosen = candidates.iter().copied().find(|id| match symbols.get(*id) {
        Some(Object::Func(func)) => func_accepts(symbols, func, types),
        Some(Object::Native(native)) => {
            native.op == OpKind::Call && native_accepts(symbols, native, types)
        }
        _ => false,
    });
    let Some(id) = chosen else {
        return error(
            ErrorKind::Function {
                name: name.to_string(),
                params: compiler.type_names(types),
            },
            offset,
        );
    };
    match symbols.get(id) {
        Some(Object::Native(native)) => {
            if let Some(arg) = named.first() {
                return error(
                    ErrorKind::FuncOptional {
                        func: name.to_string(),
                        name: arg.name.clone().unwrap_or_default(),
                    },
                    arg.offset,
                );
            }
            let ret = native.ret;
            compiler.emit(
                Op::CallNative {
                    native: id.0,
                    argc: types.len() as u16,
                },
                offset,
            );
            Ok(ret)
        }
        Some(Object::Func(func)) => {
            let func = func.clone();
            emit_func_call(compiler, id, &func, types.len(), named, offset)
        }
        _ => Err(super::bug(format!("{id} is not callable"), offset)),
    }
}

/// 按类型调用并要求有返回值（模板转换、obj 装箱）
pub fn emit_typed_call(
    compiler: &mut Compiler,
    name: &str,
    types: &[TypeId],
    offset: usize,
) -> CResult<TypeId> {
    let candidates = compiler.ws.lookup(compiler.unit, name);
    dispatch(compiler, name, &candidates, types, &[], offset)?
        .ok_or_else(|| ErrorAt::new(ErrorKind::NoReturnValue(name.to_string()), offset))
}

fn emit_func_call(
    compiler: &mut Compiler,
    id: ObjectId,
    func: &FuncObject,
    positional: usize,
    named: &[&Arg],
    offset: usize,
) -> CResult<Option<TypeId>> {
    let required = func.required().count();
    let mut slots: Vec<u16>;
    let mut supplied: u64 = 0;
    if func.variadic {
        let fixed = func.params.len() - 1;
        compiler.emit(Op::MakeArray((positional - fixed) as u32), offset);
        slots = (0..=fixed as u16).collect();
    } else {
        slots = (0..positional as u16).collect();
        for idx in required..positional {
            supplied |= 1 << (idx - required);
        }
    }
    for arg in named {
        let name = arg.name.clone().unwrap_or_default();
        let Some(idx) = func
            .params
            .iter()
            .position(|p| p.optional && p.name == name)
        else {
            return error(
                ErrorKind::FuncOptional {
                    func: func.name.clone(),
                    name,
                },
                arg.offset,
            );
        };
        if slots.contains(&(idx as u16)) {
            return error(ErrorKind::TwiceOptional(name), arg.offset);
        }
        let expected = func.params[idx].ty;
        let found = expr::compile_value(compiler, &arg.value, Some(expected))?;
        if found != expected {
            if expected != compiler.builtins().obj {
                return error(
                    ErrorKind::TypeOptional {
                        name,
                        expected: compiler.type_name(expected),
                        found: compiler.type_name(found),
                    },
                    arg.value.offset,
                );
            }
            expr::coerce(compiler, found, expected, arg.value.offset)?;
        }
        slots.push(idx as u16);
        supplied |= 1 << (idx - required);
    }
    compiler.emit(
        Op::Call {
            func: id.0,
            argc: slots.len() as u16,
            slots: slots.into(),
            supplied,
        },
        offset,
    );
    Ok(func.ret)
}

/// 调用 fn 值：栈顶下方是 fn 值，实参必须与签名一致
fn call_fn_value(
    compiler: &mut Compiler,
    name: &str,
    fn_type: TypeId,
    positional: &[&Arg],
    named: &[&Arg],
    offset: usize,
) -> CResult<Option<TypeId>> {
    let Some(TypeKind::Fn(sig)) = compiler.ws.symbols().type_kind(fn_type).cloned() else {
        return Err(super::bug("fn value without fn type", offset));
    };
    let mismatch = || {
        ErrorAt::new(
            ErrorKind::FnCall {
                name: name.to_string(),
                fn_type: compiler.type_name(fn_type),
            },
            offset,
        )
    };
    if !named.is_empty() || positional.len() != sig.params.len() {
        return Err(mismatch());
    }
    for (arg, expected) in positional.iter().zip(&sig.params) {
        let found = expr::compile_value(compiler, &arg.value, Some(*expected))?;
        if found != *expected {
            return error(
                ErrorKind::FnCall {
                    name: name.to_string(),
                    fn_type: compiler.type_name(fn_type),
                },
                arg.offset,
            );
        }
    }
    compiler.emit(
        Op::CallFn {
            argc: positional.len() as u16,
        },
        offset,
    );
    Ok(sig.ret)
}
