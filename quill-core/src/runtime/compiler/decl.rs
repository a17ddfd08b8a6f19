//! 顶层声明：名字提升、类型解析与函数签名

use super::error;
use crate::compiler::error::{CResult, ErrorAt, ErrorKind};
use crate::compiler::module::{Visibility, Workspace};
use crate::compiler::parser::{
    Block, ConstDecl, DeclKind, Expr, FnTypeDecl, FuncDecl, Module, ParamDecl, StmtKind,
    StructDecl, TypeExpr, TypeExprKind,
};
use crate::compiler::symbols::{
    ConstObject, ConstState, FnSig, FuncObject, Object, ObjectId, Param, SymbolTable, TypeId,
    TypeKind,
};

/// 已登记名字、等待后续各遍处理的声明
#[derive(Debug, Default)]
pub struct Hoisted<'m> {
    pub structs: Vec<(TypeId, &'m StructDecl, usize)>,
    pub fn_types: Vec<(TypeId, &'m FnTypeDecl)>,
    pub consts: Vec<ObjectId>,
    pub funcs: Vec<(&'m FuncDecl, bool)>,
    pub runs: Vec<(&'m Option<TypeExpr>, &'m Block, usize)>,
}

/// 形参的源码位置与默认值
#[derive(Debug, Clone, Copy)]
pub struct ParamSite<'m> {
    pub offset: usize,
    pub default: Option<&'m Expr>,
}

/// 等待编译函数体的函数
#[derive(Debug)]
pub struct FuncBody<'m> {
    pub id: ObjectId,
    pub name: String,
    pub ret: Option<TypeId>,
    pub is_run: bool,
    pub params: Vec<ParamSite<'m>>,
    pub body: &'m Block,
    pub offset: usize,
}

/// 常量名只允许大写字母、数字和下划线
fn is_const_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// 第一遍：登记类型名与常量，收集函数声明
pub fn hoist<'m>(ws: &mut Workspace, unit: u32, module: &'m Module) -> CResult<Hoisted<'m>> {
    let mut hoisted = Hoisted::default();
    let mut all_public = false;
    for decl in &module.decls {
        let public = all_public || decl.public;
        if decl.public && !all_public {
            if let Some(target) = ws.unit_mut(unit) {
                target.visibility = Visibility::NextPublic;
            }
        }
        match &decl.kind {
            DeclKind::PubAll => {
                all_public = true;
                if let Some(target) = ws.unit_mut(unit) {
                    target.visibility = Visibility::AllPublic;
                }
            }
            DeclKind::Struct(item) => {
                let id = ws.symbols_mut().declare_struct(&item.name, unit, public);
                ws.declare(unit, &item.name, id)
                    .map_err(|kind| ErrorAt::new(kind, decl.offset))?;
                hoisted.structs.push((id, item, decl.offset));
            }
            DeclKind::FnType(item) => {
                let id = ws.symbols_mut().declare_fn_type(&item.name, unit, public);
                ws.declare(unit, &item.name, id)
                    .map_err(|kind| ErrorAt::new(kind, decl.offset))?;
                hoisted.fn_types.push((id, item));
            }
            DeclKind::Const(ConstDecl::Items(items)) => {
                for (iota, item) in items.iter().enumerate() {
                    let Some(expr) = &item.value else {
                        return error(ErrorKind::MustAssign(item.name.clone()), item.offset);
                    };
                    let id = declare_const(ws, unit, public, &item.name, expr, iota, item.offset)?;
                    hoisted.consts.push(id);
                }
            }
            DeclKind::Const(ConstDecl::Enum { expr, names }) => {
                for (iota, (name, offset)) in names.iter().enumerate() {
                    let id = declare_const(ws, unit, public, name, expr, iota, *offset)?;
                    hoisted.consts.push(id);
                }
            }
            DeclKind::Func(func) => hoisted.funcs.push((func, public)),
            DeclKind::Run(run) => hoisted.runs.push((&run.ret, &run.body, decl.offset)),
            DeclKind::Include(_) | DeclKind::Import(_) => {}
        }
    }
    Ok(hoisted)
}

fn declare_const(
    ws: &mut Workspace,
    unit: u32,
    public: bool,
    name: &str,
    expr: &Expr,
    iota: usize,
    offset: usize,
) -> CResult<ObjectId> {
    if !is_const_name(name) {
        return error(ErrorKind::ConstName(name.to_string()), offset);
    }
    let id = ws.symbols_mut().push(Object::Const(ConstObject {
        name: name.to_string(),
        unit,
        public,
        offset,
        state: ConstState::Pending {
            expr: expr.clone(),
            iota: Some(iota as i64),
        },
    }));
    ws.declare(unit, name, id)
        .map_err(|kind| ErrorAt::new(kind, offset))?;
    Ok(id)
}

fn find_type(ws: &Workspace, ids: &[ObjectId]) -> Option<TypeId> {
    ids.iter()
        .copied()
        .find(|id| ws.symbols().type_obj(*id).is_some())
}

/// 解析类型表达式
pub fn resolve_type(ws: &mut Workspace, unit: u32, ty: &TypeExpr) -> CResult<TypeId> {
    let unknown = || ErrorAt::new(ErrorKind::UnknownType(ty.to_string()), ty.offset);
    match &ty.kind {
        TypeExprKind::Named(name) => find_type(ws, &ws.lookup(unit, name)).ok_or_else(unknown),
        TypeExprKind::Qualified(alias, name) => ws
            .lookup_qualified(unit, alias, name)
            .and_then(|ids| find_type(ws, &ids))
            .ok_or_else(unknown),
        TypeExprKind::Arr(elem) => {
            let elem = match elem {
                Some(elem) => resolve_type(ws, unit, elem)?,
                None => ws.symbols().builtins().str,
            };
            Ok(ws.symbols_mut().arr_of(elem))
        }
        TypeExprKind::Map(elem) => {
            let elem = match elem {
                Some(elem) => resolve_type(ws, unit, elem)?,
                None => ws.symbols().builtins().str,
            };
            Ok(ws.symbols_mut().map_of(elem))
        }
    }
}

/// 结构体是否直接（经由结构体字段）包含 `target`
fn contains_struct(symbols: &SymbolTable, target: TypeId, current: TypeId, seen: &mut Vec<TypeId>) -> bool {
    let Some(TypeKind::Struct(fields)) = symbols.type_kind(current) else {
        return false;
    };
    fields.iter().any(|(_, ty)| {
        if *ty == target {
            return true;
        }
        if seen.contains(ty) {
            return false;
        }
        seen.push(*ty);
        contains_struct(symbols, target, *ty, seen)
    })
}

/// 第二遍：结构体字段与 fn 签名
pub fn resolve_types(ws: &mut Workspace, unit: u32, hoisted: &Hoisted<'_>) -> CResult<()> {
    for (id, item, _) in &hoisted.structs {
        let mut fields: Vec<(String, TypeId)> = Vec::with_capacity(item.fields.len());
        for field in &item.fields {
            if fields.iter().any(|(name, _)| *name == field.name) {
                return error(ErrorKind::StructField(field.name.clone()), field.offset);
            }
            let ty = resolve_type(ws, unit, &field.ty)?;
            fields.push((field.name.clone(), ty));
        }
        ws.symbols_mut().set_struct_fields(*id, fields);
    }
    for (id, item, offset) in &hoisted.structs {
        if contains_struct(ws.symbols(), *id, *id, &mut Vec::new()) {
            return error(ErrorKind::RecursiveStruct(item.name.clone()), *offset);
        }
    }
    for (id, item) in &hoisted.fn_types {
        let params = item
            .params
            .iter()
            .map(|ty| resolve_type(ws, unit, ty))
            .collect::<CResult<Vec<_>>>()?;
        let ret = item
            .ret
            .as_ref()
            .map(|ty| resolve_type(ws, unit, ty))
            .transpose()?;
        ws.symbols_mut().set_fn_sig(*id, FnSig { params, ret });
    }
    Ok(())
}

/// 形参列表 + 函数体顶层的 `optional {}` 块
pub fn build_params<'m>(
    ws: &mut Workspace,
    unit: u32,
    func: &'m FuncDecl,
) -> CResult<(Vec<Param>, Vec<ParamSite<'m>>)> {
    let mut decls: Vec<&'m ParamDecl> = func.params.iter().collect();
    for stmt in &func.body.stmts {
        if let StmtKind::Optional(extra) = &stmt.kind {
            if func.variadic {
                return error(ErrorKind::EndOptional, stmt.offset);
            }
            decls.extend(extra.iter());
        }
    }
    let last = func.params.len().saturating_sub(1);
    let mut params: Vec<Param> = Vec::with_capacity(decls.len());
    for (idx, decl) in decls.iter().enumerate() {
        let optional = decl.default.is_some();
        if params.iter().any(|p| p.name == decl.name) {
            let kind = if optional {
                ErrorKind::TwiceOptional(decl.name.clone())
            } else {
                ErrorKind::UsedName(decl.name.clone())
            };
            return error(kind, decl.offset);
        }
        let mut ty = resolve_type(ws, unit, &decl.ty)?;
        if func.variadic && idx == last {
            ty = ws.symbols_mut().arr_of(ty);
        }
        params.push(Param {
            name: decl.name.clone(),
            ty,
            optional,
        });
    }
    if params.iter().filter(|p| p.optional).count() > 64 {
        return Err(super::bug("more than 64 optional parameters", func.offset));
    }
    let sites = decls
        .iter()
        .map(|d| ParamSite {
            offset: d.offset,
            default: d.default.as_ref(),
        })
        .collect();
    Ok((params, sites))
}

/// 第三遍：函数签名登记到命名空间，run 函数记录到单元
pub fn declare_funcs<'m>(
    ws: &mut Workspace,
    unit: u32,
    hoisted: &Hoisted<'m>,
) -> CResult<Vec<FuncBody<'m>>> {
    let mut bodies = Vec::new();
    for &(func, public) in &hoisted.funcs {
        let (params, sites) = build_params(ws, unit, func)?;
        let ret = func
            .ret
            .as_ref()
            .map(|ty| resolve_type(ws, unit, ty))
            .transpose()?;
        let id = ws.symbols_mut().push(Object::Func(FuncObject {
            name: func.name.clone(),
            unit,
            public,
            params,
            variadic: func.variadic,
            ret,
            local: false,
            code: None,
        }));
        ws.declare(unit, &func.name, id)
            .map_err(|kind| ErrorAt::new(kind, func.offset))?;
        bodies.push(FuncBody {
            id,
            name: func.name.clone(),
            ret,
            is_run: false,
            params: sites,
            body: &func.body,
            offset: func.offset,
        });
    }
    for &(ret, body, offset) in &hoisted.runs {
        if ws.unit(unit).and_then(|u| u.run_id).is_some() {
            return error(ErrorKind::Run, offset);
        }
        if let Some(stmt) = body
            .stmts
            .iter()
            .find(|s| matches!(s.kind, StmtKind::Optional(_)))
        {
            return error(ErrorKind::Optional, stmt.offset);
        }
        let ret = ret
            .as_ref()
            .map(|ty| resolve_type(ws, unit, ty))
            .transpose()?;
        let id = ws.symbols_mut().push(Object::Func(FuncObject {
            name: "run".to_string(),
            unit,
            public: false,
            params: Vec::new(),
            variadic: false,
            ret,
            local: false,
            code: None,
        }));
        if let Some(target) = ws.unit_mut(unit) {
            target.run_id = Some(id);
        }
        bodies.push(FuncBody {
            id,
            name: "run".to_string(),
            ret,
            is_run: true,
            params: Vec::new(),
            body,
            offset,
        });
    }
    Ok(bodies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_names() {
        assert!(is_const_name("MAX"));
        assert!(is_const_name("MAX_2"));
        assert!(!is_const_name("Max"));
        assert!(!is_const_name("_1"));
    }
}
