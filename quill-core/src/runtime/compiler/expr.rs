//! 表达式编译
//!
//! 每个表达式把结果压栈并返回其静态类型；无返回值的调用返回 `None`。

use super::{call, const_eval, decl, error, var, Compiler};
use crate::compiler::error::{CResult, ErrorAt, ErrorKind};
use crate::compiler::parser::{BinaryOp, Expr, ExprKind, FieldInit, TemplateSegment, TypeExpr, UnaryOp};
use crate::compiler::symbols::{Object, ObjectId, OpKind, TypeId, TypeKind};
use crate::runtime::bytecode::Op;
use crate::runtime::value::Value;

/// 编译表达式；`hint` 是期望类型，用于推断空容器字面量
pub fn compile_expr(compiler: &mut Compiler, expr: &Expr, hint: Option<TypeId>) -> CResult<Option<TypeId>> {
    let b = compiler.builtins();
    let offset = expr.offset;
    let ty = match &expr.kind {
        ExprKind::Int(v) => {
            compiler.emit_const(Value::Int(*v), offset);
            b.int
        }
        ExprKind::Float(v) => {
            compiler.emit_const(Value::Float(*v), offset);
            b.float
        }
        ExprKind::Bool(v) => {
            compiler.emit_const(Value::Bool(*v), offset);
            b.bool
        }
        ExprKind::Char(v) => {
            compiler.emit_const(Value::Char(*v), offset);
            b.char
        }
        ExprKind::Str(v) => {
            compiler.emit_const(Value::str(v), offset);
            b.str
        }
        ExprKind::Template(segments) => compile_template(compiler, segments, offset)?,
        ExprKind::Ident(name) => compile_ident(compiler, name, offset)?,
        ExprKind::Iota => return error(ErrorKind::Iota, offset),
        ExprKind::Array(items) => compile_array(compiler, items, hint, offset)?,
        ExprKind::Map(pairs) => compile_map(compiler, pairs, hint, offset)?,
        ExprKind::StructLit { ty, fields } => compile_struct_lit(compiler, ty, fields, offset)?,
        ExprKind::Unary { op, operand } => compile_unary(compiler, *op, operand, offset)?,
        ExprKind::Binary { op, left, right } => compile_binary(compiler, *op, left, right, offset)?,
        ExprKind::And(left, right) => compile_logic(compiler, left, right, true, offset)?,
        ExprKind::Or(left, right) => compile_logic(compiler, left, right, false, offset)?,
        ExprKind::Index { target, index } => {
            let target_ty = compile_value(compiler, target, None)?;
            let rule = index_rule(compiler, target_ty, target.offset)?;
            check_index(compiler, target_ty, &rule.keys, index)?;
            compiler.emit(Op::Index, offset);
            rule.elem
        }
        ExprKind::Field { target, name } => compile_field(compiler, target, name, offset)?,
        ExprKind::Call { callee, args } => return call::compile_call(compiler, callee, args, offset),
        ExprKind::Ternary {
            cond,
            then,
            otherwise,
        } => {
            compile_cond(compiler, cond)?;
            let else_jump = compiler.emit_jump(Op::JumpIfFalse, offset);
            let ty = compile_value(compiler, then, hint)?;
            let end_jump = compiler.emit_jump(Op::Jump, offset);
            compiler.patch_here(else_jump);
            compile_expect(compiler, otherwise, ty)?;
            compiler.patch_here(end_jump);
            ty
        }
        ExprKind::AddrFunc { name, fn_type } => compile_addr_func(compiler, name, fn_type, offset)?,
    };
    Ok(Some(ty))
}

/// 编译必须有值的表达式
pub fn compile_value(compiler: &mut Compiler, expr: &Expr, hint: Option<TypeId>) -> CResult<TypeId> {
    compile_expr(compiler, expr, hint)?.ok_or_else(|| {
        let name = match &expr.kind {
            ExprKind::Call { callee, .. } => match &callee.kind {
                ExprKind::Ident(name) | ExprKind::Field { name, .. } => name.clone(),
                _ => "expression".to_string(),
            },
            _ => "expression".to_string(),
        };
        ErrorAt::new(ErrorKind::NoReturnValue(name), expr.offset)
    })
}

/// 编译并转换为 `expected`
pub fn compile_expect(compiler: &mut Compiler, expr: &Expr, expected: TypeId) -> CResult<()> {
    let found = compile_value(compiler, expr, Some(expected))?;
    coerce(compiler, found, expected, expr.offset)
}

/// 条件表达式必须是 bool
pub fn compile_cond(compiler: &mut Compiler, expr: &Expr) -> CResult<()> {
    let ty = compile_value(compiler, expr, None)?;
    if ty != compiler.builtins().bool {
        return error(ErrorKind::BoolExp, expr.offset);
    }
    Ok(())
}

/// 赋值兼容性：类型相同，或装箱到 obj
pub fn coerce(compiler: &mut Compiler, found: TypeId, expected: TypeId, offset: usize) -> CResult<()> {
    if found == expected {
        return Ok(());
    }
    if expected == compiler.builtins().obj {
        call::emit_typed_call(compiler, "obj", &[found], offset)?;
        return Ok(());
    }
    let symbols = compiler.ws.symbols();
    let is_struct = |ty| symbols.type_obj(ty).is_some_and(|t| t.is_struct());
    let structs = is_struct(expected) || is_struct(found);
    let (expected, found) = (compiler.type_name(expected), compiler.type_name(found));
    let kind = if structs {
        ErrorKind::StructAssign { expected, found }
    } else {
        ErrorKind::WrongType { expected, found }
    };
    error(kind, offset)
}

fn compile_ident(compiler: &mut Compiler, name: &str, offset: usize) -> CResult<TypeId> {
    if let Some((slot, ty)) = var::resolve_local(compiler, name) {
        compiler.emit(Op::Load(slot), offset);
        return Ok(ty);
    }
    let ids = compiler.ws.lookup(compiler.unit, name);
    load_const(compiler, &ids, name, offset)
}

fn load_const(compiler: &mut Compiler, ids: &[ObjectId], name: &str, offset: usize) -> CResult<TypeId> {
    let found = ids
        .iter()
        .copied()
        .find(|id| matches!(compiler.ws.symbols().get(*id), Some(Object::Const(_))));
    match found {
        Some(id) => {
            let (value, ty) = const_eval::evaluate(compiler.ws, id)?;
            compiler.emit_const(value, offset);
            Ok(ty)
        }
        None => error(ErrorKind::UnknownIdent(name.to_string()), offset),
    }
}

fn compile_template(compiler: &mut Compiler, segments: &[TemplateSegment], offset: usize) -> CResult<TypeId> {
    let b = compiler.builtins();
    if segments.is_empty() {
        compiler.emit_const(Value::str(""), offset);
        return Ok(b.str);
    }
    let concat = compiler
        .ws
        .registry()
        .resolve(compiler.ws.symbols(), OpKind::Binary(BinaryOp::Add), &[b.str, b.str])
        .ok_or_else(|| super::bug("str concatenation is not registered", offset))?;
    for (idx, segment) in segments.iter().enumerate() {
        match segment {
            TemplateSegment::Text(text) => compiler.emit_const(Value::str(text), offset),
            TemplateSegment::Expr(expr) => {
                let ty = compile_value(compiler, expr, None)?;
                if ty != b.str {
                    let converted = call::emit_typed_call(compiler, "str", &[ty], expr.offset)?;
                    if converted != b.str {
                        return error(
                            ErrorKind::WrongType {
                                expected: compiler.type_name(b.str),
                                found: compiler.type_name(converted),
                            },
                            expr.offset,
                        );
                    }
                }
            }
        }
        if idx > 0 {
            compiler.emit(
                Op::CallNative {
                    native: concat.0,
                    argc: 2,
                },
                offset,
            );
        }
    }
    Ok(b.str)
}

/// 容器字面量的元素类型：来自期望类型，否则取第一个元素的类型
fn element_hint(compiler: &Compiler, hint: Option<TypeId>, arr: bool) -> Option<TypeId> {
    match (hint.and_then(|ty| compiler.ws.symbols().type_kind(ty)), arr) {
        (Some(TypeKind::Arr(elem)), true) | (Some(TypeKind::Map(elem)), false) => Some(*elem),
        _ => None,
    }
}

fn compile_element(compiler: &mut Compiler, expr: &Expr, elem: &mut Option<TypeId>) -> CResult<()> {
    match *elem {
        Some(ty) => compile_expect(compiler, expr, ty),
        None => {
            *elem = Some(compile_value(compiler, expr, None)?);
            Ok(())
        }
    }
}

fn compile_array(compiler: &mut Compiler, items: &[Expr], hint: Option<TypeId>, offset: usize) -> CResult<TypeId> {
    let mut elem = element_hint(compiler, hint, true);
    for item in items {
        compile_element(compiler, item, &mut elem)?;
    }
    let elem = elem.unwrap_or(compiler.builtins().str);
    compiler.emit(Op::MakeArray(items.len() as u32), offset);
    Ok(compiler.ws.symbols_mut().arr_of(elem))
}

fn compile_map(
    compiler: &mut Compiler,
    pairs: &[(Expr, Expr)],
    hint: Option<TypeId>,
    offset: usize,
) -> CResult<TypeId> {
    let b = compiler.builtins();
    let mut elem = element_hint(compiler, hint, false);
    for (key, value) in pairs {
        let key_ty = compile_value(compiler, key, Some(b.str))?;
        if key_ty != b.str {
            return error(
                ErrorKind::WrongType {
                    expected: compiler.type_name(b.str),
                    found: compiler.type_name(key_ty),
                },
                key.offset,
            );
        }
        compile_element(compiler, value, &mut elem)?;
    }
    let elem = elem.unwrap_or(b.str);
    compiler.emit(Op::MakeMap(pairs.len() as u32), offset);
    Ok(compiler.ws.symbols_mut().map_of(elem))
}

/// 结构体字面量：未列出的字段取零值，字段顺序始终是声明顺序
fn compile_struct_lit(
    compiler: &mut Compiler,
    ty: &TypeExpr,
    fields: &[FieldInit],
    offset: usize,
) -> CResult<TypeId> {
    let struct_ty = decl::resolve_type(compiler.ws, compiler.unit, ty)?;
    let Some(TypeKind::Struct(layout)) = compiler.ws.symbols().type_kind(struct_ty).cloned() else {
        return error(ErrorKind::StructType(compiler.type_name(struct_ty)), ty.offset);
    };
    let mut slots: Vec<u16> = Vec::with_capacity(fields.len());
    for init in fields {
        let Some(idx) = layout.iter().position(|(name, _)| *name == init.name) else {
            return error(ErrorKind::InitField(init.name.clone()), init.offset);
        };
        if slots.contains(&(idx as u16)) {
            return error(ErrorKind::StructField(init.name.clone()), init.offset);
        }
        compile_expect(compiler, &init.value, layout[idx].1)?;
        slots.push(idx as u16);
    }
    compiler.emit(
        Op::MakeStruct {
            ty: struct_ty.0,
            slots: slots.into(),
        },
        offset,
    );
    Ok(struct_ty)
}

fn compile_unary(compiler: &mut Compiler, op: UnaryOp, operand: &Expr, offset: usize) -> CResult<TypeId> {
    let ty = compile_value(compiler, operand, None)?;
    emit_operator(compiler, OpKind::Unary(op), op.name(), &[ty], offset)
}

fn compile_binary(
    compiler: &mut Compiler,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    offset: usize,
) -> CResult<TypeId> {
    let lt = compile_value(compiler, left, None)?;
    let rt = compile_value(compiler, right, Some(lt))?;
    emit_operator(compiler, OpKind::Binary(op), op.name(), &[lt, rt], offset)
}

/// 按操作数类型查运算符表并生成原生调用
pub fn emit_operator(
    compiler: &mut Compiler,
    op: OpKind,
    name: &str,
    types: &[TypeId],
    offset: usize,
) -> CResult<TypeId> {
    let native = compiler
        .ws
        .registry()
        .resolve(compiler.ws.symbols(), op, types)
        .and_then(|id| compiler.ws.symbols().native(id).map(|n| (id, n.ret)));
    let Some((id, Some(ret))) = native else {
        return error(
            ErrorKind::Function {
                name: name.to_string(),
                params: compiler.type_names(types),
            },
            offset,
        );
    };
    compiler.emit(
        Op::CallNative {
            native: id.0,
            argc: types.len() as u16,
        },
        offset,
    );
    Ok(ret)
}

/// `&&` / `||` 短路求值
fn compile_logic(compiler: &mut Compiler, left: &Expr, right: &Expr, and: bool, offset: usize) -> CResult<TypeId> {
    let b = compiler.builtins();
    if compile_value(compiler, left, None)? != b.bool {
        return error(ErrorKind::BoolOper, left.offset);
    }
    compiler.emit(Op::Dup, offset);
    let short = if and {
        compiler.emit_jump(Op::JumpIfFalse, offset)
    } else {
        compiler.emit_jump(Op::JumpIfTrue, offset)
    };
    compiler.emit(Op::Pop, offset);
    if compile_value(compiler, right, None)? != b.bool {
        return error(ErrorKind::BoolOper, right.offset);
    }
    compiler.patch_here(short);
    Ok(b.bool)
}

pub fn index_rule(
    compiler: &Compiler,
    ty: TypeId,
    offset: usize,
) -> CResult<crate::compiler::symbols::IndexRule> {
    compiler
        .ws
        .symbols()
        .index_rule(ty)
        .ok_or_else(|| ErrorAt::new(ErrorKind::SupportIndex(compiler.type_name(ty)), offset))
}

/// 编译索引值并检查其类型
pub fn check_index(compiler: &mut Compiler, target: TypeId, keys: &[TypeId], index: &Expr) -> CResult<()> {
    let ty = compile_value(compiler, index, None)?;
    if !keys.contains(&ty) {
        return error(
            ErrorKind::TypeIndex {
                ty: compiler.type_name(target),
                index: compiler.type_name(ty),
            },
            index.offset,
        );
    }
    Ok(())
}

/// 结构体字段的下标与类型
pub fn struct_field(
    compiler: &Compiler,
    ty: TypeId,
    name: &str,
    offset: usize,
    missing: fn(String, String) -> ErrorKind,
) -> CResult<(u16, TypeId)> {
    let Some(obj) = compiler.ws.symbols().type_obj(ty).filter(|t| t.is_struct()) else {
        return error(ErrorKind::StructType(compiler.type_name(ty)), offset);
    };
    obj.field(name)
        .map(|(idx, ty)| (idx as u16, ty))
        .ok_or_else(|| ErrorAt::new(missing(obj.name.clone(), name.to_string()), offset))
}

fn compile_field(compiler: &mut Compiler, target: &Expr, name: &str, offset: usize) -> CResult<TypeId> {
    if let Some(alias) = compiler.import_alias(target) {
        let ids = compiler
            .ws
            .lookup_qualified(compiler.unit, alias, name)
            .unwrap_or_default();
        return load_const(compiler, &ids, &format!("{alias}.{name}"), offset);
    }
    let ty = compile_value(compiler, target, None)?;
    let (idx, field_ty) = struct_field(compiler, ty, name, offset, |ty, field| ErrorKind::Struct {
        ty,
        field,
    })?;
    compiler.emit(Op::GetField(idx), offset);
    Ok(field_ty)
}

/// `&name.FnType`：取函数引用
fn compile_addr_func(compiler: &mut Compiler, name: &str, fn_type: &TypeExpr, offset: usize) -> CResult<TypeId> {
    let ty = decl::resolve_type(compiler.ws, compiler.unit, fn_type)?;
    let Some(TypeKind::Fn(sig)) = compiler.ws.symbols().type_kind(ty).cloned() else {
        return error(ErrorKind::AddrFunc, fn_type.offset);
    };
    let candidates = match var::resolve_local_func(compiler, name) {
        Some(id) => vec![id],
        None => compiler.ws.lookup(compiler.unit, name),
    };
    let symbols = compiler.ws.symbols();
    let funcs: Vec<ObjectId> = candidates
        .iter()
        .copied()
        .filter(|id| symbols.func(*id).is_some())
        .collect();
    if funcs.is_empty() {
        let native = candidates.iter().any(|id| symbols.native(*id).is_some());
        let kind = if native {
            ErrorKind::FnBuildIn(name.to_string())
        } else {
            ErrorKind::UnknownIdent(name.to_string())
        };
        return error(kind, offset);
    }
    let fn_type_name = compiler.type_name(ty);
    let matched = funcs.iter().copied().find(|id| {
        symbols
            .func(*id)
            .is_some_and(|f| f.params.iter().map(|p| p.ty).eq(sig.params.iter().copied()))
    });
    let Some(id) = matched else {
        return error(
            ErrorKind::FnCall {
                name: name.to_string(),
                fn_type: fn_type_name,
            },
            offset,
        );
    };
    let Some(func) = symbols.func(id) else {
        return Err(super::bug("fn candidate vanished", offset));
    };
    let kind = if func.variadic {
        Some(ErrorKind::FnVariadic(name.to_string()))
    } else if func.has_optional() {
        Some(ErrorKind::FnOptional(name.to_string()))
    } else if func.ret != sig.ret {
        Some(ErrorKind::FnReturn {
            name: name.to_string(),
            fn_type: fn_type_name,
            expected: symbols.type_name_opt(sig.ret),
            found: symbols.type_name_opt(func.ret),
        })
    } else {
        None
    };
    if let Some(kind) = kind {
        return error(kind, offset);
    }
    compiler.emit(Op::MakeFn(id.0), offset);
    Ok(ty)
}
