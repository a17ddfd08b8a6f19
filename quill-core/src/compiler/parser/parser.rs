use super::expr::{Arg, BinaryOp, Expr, ExprKind, FieldInit, TemplateSegment, UnaryOp};
use super::module::{
    ConstDecl, ConstItem, Decl, DeclKind, FieldDecl, FnTypeDecl, FuncDecl, ImportItem, Module,
    ParamDecl, PathLit, RunDecl, StructDecl,
};
use super::stmt::{AssignOp, Block, Case, Stmt, StmtKind};
use super::type_expr::{TypeExpr, TypeExprKind};
use super::utils::get_precedence;
use crate::compiler::error::{CResult, ErrorAt, ErrorKind};
use crate::kit::lexer::{TemplatePart, Token, TokenKind};
use tracing::debug;

const TARGET: &str = "quill::parser";

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// 为 true 时 `Ident {` 不解析为结构体字面量（if/while/for/switch 的头部）
    no_struct_lit: bool,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let end = tokens.last().map(|t| t.offset).unwrap_or(0);
            tokens.push(Token::new(TokenKind::Eof, end));
        }
        Self {
            tokens,
            pos: 0,
            no_struct_lit: false,
        }
    }

    /// 解析整个源文件
    pub fn parse(&mut self) -> CResult<Module> {
        let mut module = Module::default();
        self.skip_newlines();
        while !self.check(&TokenKind::Eof) {
            let decl = self.parse_decl()?;
            module.decls.push(decl);
            self.end_statement()?;
            self.skip_newlines();
        }
        debug!(target: TARGET, decls = module.decls.len(), "parsed module");
        Ok(module)
    }

    /// 解析一个独立表达式（字符串插值），要求消费全部 token
    pub fn parse_standalone_expr(&mut self) -> CResult<Expr> {
        let expr = self.parse_expr()?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    // ===== token 游标 =====

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ErrorAt {
        ErrorAt::new(ErrorKind::Unexpected(self.peek().describe()), self.offset())
    }

    fn expected(&self, what: &str) -> ErrorAt {
        ErrorAt::new(
            ErrorKind::Expected {
                expected: what.to_string(),
                found: self.peek().describe(),
            },
            self.offset(),
        )
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> CResult<usize> {
        if self.check(kind) {
            Ok(self.advance().offset)
        } else {
            Err(self.expected(what))
        }
    }

    fn expect_ident(&mut self) -> CResult<(String, usize)> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                let offset = self.advance().offset;
                Ok((name, offset))
            }
            _ => Err(self.expected("identifier")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    /// 跳过换行后的 token，不移动游标
    fn peek_past_newlines(&self) -> &TokenKind {
        let mut ahead = 0;
        while self.peek_at(ahead) == &TokenKind::Newline {
            ahead += 1;
        }
        self.peek_at(ahead)
    }

    /// 语句必须以换行、`}` 或文件结束收尾
    fn end_statement(&mut self) -> CResult<()> {
        match self.peek() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ => Err(self.expected("new line")),
        }
    }

    fn with_struct_lit<T>(&mut self, allowed: bool, f: impl FnOnce(&mut Self) -> CResult<T>) -> CResult<T> {
        let saved = self.no_struct_lit;
        self.no_struct_lit = !allowed;
        let result = f(self);
        self.no_struct_lit = saved;
        result
    }

    // ===== 顶层声明 =====

    fn parse_decl(&mut self) -> CResult<Decl> {
        let offset = self.offset();
        let mut public = false;
        if self.check(&TokenKind::Pub) {
            self.advance();
            if matches!(self.peek(), TokenKind::Newline | TokenKind::Eof) {
                return Ok(Decl {
                    kind: DeclKind::PubAll,
                    public: true,
                    offset,
                });
            }
            public = true;
        }
        let kind = match self.peek() {
            TokenKind::Include => {
                self.advance();
                DeclKind::Include(self.parse_paths()?)
            }
            TokenKind::Import => {
                self.advance();
                DeclKind::Import(self.parse_imports()?)
            }
            TokenKind::Const => DeclKind::Const(self.parse_const()?),
            TokenKind::Struct => DeclKind::Struct(self.parse_struct()?),
            TokenKind::Fn => DeclKind::FnType(self.parse_fn_type()?),
            TokenKind::Func => DeclKind::Func(self.parse_func()?),
            TokenKind::Run => {
                self.advance();
                let ret = if self.check(&TokenKind::LBrace) {
                    None
                } else {
                    Some(self.parse_type()?)
                };
                let body = self.parse_block()?;
                DeclKind::Run(RunDecl { ret, body })
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Decl {
            kind,
            public,
            offset,
        })
    }

    fn parse_path(&mut self) -> CResult<PathLit> {
        let offset = self.offset();
        match self.peek().clone() {
            TokenKind::Str(path) => {
                self.advance();
                Ok(PathLit { path, offset })
            }
            TokenKind::Template(_) => Err(ErrorAt::new(ErrorKind::ImportStr, offset)),
            _ => Err(self.expected("string")),
        }
    }

    fn parse_paths(&mut self) -> CResult<Vec<PathLit>> {
        if !self.match_token(&TokenKind::LBrace) {
            return Ok(vec![self.parse_path()?]);
        }
        let mut paths = Vec::new();
        self.skip_newlines();
        while !self.match_token(&TokenKind::RBrace) {
            paths.push(self.parse_path()?);
            self.match_token(&TokenKind::Comma);
            self.skip_newlines();
        }
        Ok(paths)
    }

    fn parse_imports(&mut self) -> CResult<Vec<ImportItem>> {
        let mut items = Vec::new();
        for path in self.parse_paths()? {
            items.push(ImportItem { path, alias: None });
        }
        if items.len() == 1 && self.match_token(&TokenKind::As) {
            let (alias, _) = self.expect_ident()?;
            items[0].alias = Some(alias);
        }
        Ok(items)
    }

    fn parse_const(&mut self) -> CResult<ConstDecl> {
        self.advance();
        match self.peek() {
            TokenKind::LBrace => {
                self.advance();
                let mut items = Vec::new();
                self.skip_newlines();
                while !self.match_token(&TokenKind::RBrace) {
                    items.push(self.parse_const_item()?);
                    self.match_token(&TokenKind::Comma);
                    self.skip_newlines();
                }
                Ok(ConstDecl::Items(items))
            }
            TokenKind::Ident(_)
                if matches!(
                    self.peek_at(1),
                    TokenKind::Eq | TokenKind::Newline | TokenKind::Eof
                ) =>
            {
                Ok(ConstDecl::Items(vec![self.parse_const_item()?]))
            }
            _ => {
                let expr = self.with_struct_lit(false, |p| p.parse_expr())?;
                self.expect(&TokenKind::LBrace, "{")?;
                let mut names = Vec::new();
                self.skip_newlines();
                while !self.match_token(&TokenKind::RBrace) {
                    names.push(self.expect_ident()?);
                    self.match_token(&TokenKind::Comma);
                    self.skip_newlines();
                }
                Ok(ConstDecl::Enum { expr, names })
            }
        }
    }

    fn parse_const_item(&mut self) -> CResult<ConstItem> {
        let (name, offset) = self.expect_ident()?;
        let value = if self.match_token(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(ConstItem {
            name,
            value,
            offset,
        })
    }

    fn parse_struct(&mut self) -> CResult<StructDecl> {
        self.advance();
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::LBrace, "{")?;
        let mut fields = Vec::new();
        self.skip_newlines();
        while !self.match_token(&TokenKind::RBrace) {
            let ty = self.parse_type()?;
            let (field, offset) = self.expect_ident()?;
            fields.push(FieldDecl {
                ty,
                name: field,
                offset,
            });
            self.match_token(&TokenKind::Comma);
            self.skip_newlines();
        }
        Ok(StructDecl { name, fields })
    }

    fn parse_fn_type(&mut self) -> CResult<FnTypeDecl> {
        self.advance();
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::LParen, "(")?;
        let mut params = Vec::new();
        while !self.match_token(&TokenKind::RParen) {
            params.push(self.parse_type()?);
            if !self.match_token(&TokenKind::Comma) && !self.check(&TokenKind::RParen) {
                return Err(self.expected(")"));
            }
        }
        let ret = if matches!(self.peek(), TokenKind::Newline | TokenKind::Eof | TokenKind::RBrace) {
            None
        } else {
            Some(self.parse_type()?)
        };
        Ok(FnTypeDecl { name, params, ret })
    }

    /// `func name(params) [type] { body }`
    fn parse_func(&mut self) -> CResult<FuncDecl> {
        let offset = self.advance().offset;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::LParen, "(")?;
        let mut params: Vec<ParamDecl> = Vec::new();
        let mut variadic = false;
        while !self.match_token(&TokenKind::RParen) {
            if variadic {
                return Err(self.expected(")"));
            }
            let ty = self.parse_type()?;
            let (pname, poffset) = self.expect_ident()?;
            let mut default = None;
            if self.match_token(&TokenKind::Ellipsis) {
                variadic = true;
            } else if self.match_token(&TokenKind::Eq) {
                default = Some(self.parse_expr()?);
            }
            let has_optional = params.iter().any(|p| p.default.is_some());
            if has_optional && (default.is_none() || variadic) {
                return Err(ErrorAt::new(ErrorKind::EndOptional, poffset));
            }
            params.push(ParamDecl {
                ty,
                name: pname,
                default,
                offset: poffset,
            });
            if !self.match_token(&TokenKind::Comma) && !self.check(&TokenKind::RParen) {
                return Err(self.expected(")"));
            }
        }
        let ret = if self.check(&TokenKind::LBrace) {
            None
        } else {
            Some(self.parse_type()?)
        };
        let body = self.parse_block()?;
        Ok(FuncDecl {
            name,
            params,
            variadic,
            ret,
            body,
            offset,
        })
    }

    // ===== 类型 =====

    pub(crate) fn parse_type(&mut self) -> CResult<TypeExpr> {
        let (name, offset) = self.expect_ident()?;
        let is_elem_follow = |p: &Self| {
            p.check(&TokenKind::Dot) && matches!(p.peek_at(1), TokenKind::Ident(_))
        };
        let kind = match name.as_str() {
            "arr" | "map" => {
                let elem = if is_elem_follow(self) {
                    self.advance();
                    Some(Box::new(self.parse_type()?))
                } else {
                    None
                };
                if name == "arr" {
                    TypeExprKind::Arr(elem)
                } else {
                    TypeExprKind::Map(elem)
                }
            }
            _ if is_elem_follow(self) => {
                self.advance();
                let (member, _) = self.expect_ident()?;
                TypeExprKind::Qualified(name, member)
            }
            _ => TypeExprKind::Named(name),
        };
        Ok(TypeExpr { kind, offset })
    }

    /// 试探当前位置是否是 `Type name` 形式的变量声明
    fn looks_like_declaration(&mut self) -> bool {
        if !matches!(self.peek(), TokenKind::Ident(_)) {
            return false;
        }
        let saved = self.pos;
        let result = self.parse_type().is_ok() && matches!(self.peek(), TokenKind::Ident(_));
        self.pos = saved;
        result
    }

    // ===== 语句 =====

    fn parse_block(&mut self) -> CResult<Block> {
        let offset = self.expect(&TokenKind::LBrace, "{")?;
        let saved = self.no_struct_lit;
        self.no_struct_lit = false;
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                self.no_struct_lit = saved;
                return Err(self.expected("}"));
            }
            let stmt = self.parse_statement()?;
            stmts.push(stmt);
            self.end_statement()?;
            self.skip_newlines();
        }
        self.advance();
        self.no_struct_lit = saved;
        Ok(Block { stmts, offset })
    }

    fn parse_statement(&mut self) -> CResult<Stmt> {
        let offset = self.offset();
        let kind = match self.peek().clone() {
            TokenKind::Return => {
                self.advance();
                if matches!(
                    self.peek(),
                    TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof
                ) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expr()?))
                }
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let cond = self.with_struct_lit(false, |p| p.parse_expr())?;
                let body = self.parse_block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StmtKind::Continue
            }
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Try => self.parse_try()?,
            TokenKind::Recover => {
                self.advance();
                StmtKind::Recover
            }
            TokenKind::Retry => {
                self.advance();
                StmtKind::Retry
            }
            TokenKind::Go => self.parse_go()?,
            TokenKind::Func => StmtKind::Func(self.parse_func()?),
            TokenKind::Optional => self.parse_optional()?,
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Case | TokenKind::Default => {
                return Err(ErrorAt::new(ErrorKind::NotCase, offset))
            }
            TokenKind::Catch => return Err(self.unexpected()),
            _ if self.looks_like_declaration() => {
                let ty = self.parse_type()?;
                let (name, _) = self.expect_ident()?;
                let init = if self.match_token(&TokenKind::Eq) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                StmtKind::VarDecl { ty, name, init }
            }
            _ => self.parse_expr_statement()?,
        };
        Ok(Stmt::new(kind, offset))
    }

    fn parse_expr_statement(&mut self) -> CResult<StmtKind> {
        let target = self.parse_expr()?;
        let op = match self.peek() {
            TokenKind::Eq => AssignOp::Set,
            TokenKind::AmpEq => AssignOp::Alias,
            TokenKind::PlusEq => AssignOp::Compound(BinaryOp::Add),
            TokenKind::MinusEq => AssignOp::Compound(BinaryOp::Sub),
            TokenKind::StarEq => AssignOp::Compound(BinaryOp::Mul),
            TokenKind::SlashEq => AssignOp::Compound(BinaryOp::Div),
            TokenKind::PercentEq => AssignOp::Compound(BinaryOp::Mod),
            TokenKind::PipeEq => AssignOp::Compound(BinaryOp::BitOr),
            TokenKind::CaretEq => AssignOp::Compound(BinaryOp::BitXor),
            TokenKind::ShlEq => AssignOp::Compound(BinaryOp::Shl),
            TokenKind::ShrEq => AssignOp::Compound(BinaryOp::Shr),
            _ => return Ok(StmtKind::Expr(target)),
        };
        self.advance();
        let value = self.parse_expr()?;
        Ok(StmtKind::Assign { target, op, value })
    }

    fn parse_if(&mut self) -> CResult<StmtKind> {
        self.advance();
        let mut branches = Vec::new();
        let cond = self.with_struct_lit(false, |p| p.parse_expr())?;
        branches.push((cond, self.parse_block()?));
        let mut otherwise = None;
        loop {
            match self.peek_past_newlines() {
                TokenKind::Elif => {
                    self.skip_newlines();
                    self.advance();
                    let cond = self.with_struct_lit(false, |p| p.parse_expr())?;
                    branches.push((cond, self.parse_block()?));
                }
                TokenKind::Else => {
                    self.skip_newlines();
                    self.advance();
                    otherwise = Some(self.parse_block()?);
                    break;
                }
                _ => break,
            }
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn parse_for(&mut self) -> CResult<StmtKind> {
        self.advance();
        let (value, _) = self.expect_ident()?;
        let index = if self.match_token(&TokenKind::Comma) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        if !self.match_token(&TokenKind::In) {
            return Err(ErrorAt::new(ErrorKind::ForIn, self.offset()));
        }
        let iter = self.with_struct_lit(false, |p| p.parse_expr())?;
        let body = self.parse_block()?;
        Ok(StmtKind::For {
            value,
            index,
            iter,
            body,
        })
    }

    fn parse_switch(&mut self) -> CResult<StmtKind> {
        self.advance();
        let value = self.with_struct_lit(false, |p| p.parse_expr())?;
        self.skip_newlines();
        if !self.check(&TokenKind::Case) {
            return Err(ErrorAt::new(ErrorKind::NotCase, self.offset()));
        }
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            match self.peek_past_newlines() {
                TokenKind::Case => {
                    self.skip_newlines();
                    self.advance();
                    let mut values = vec![self.with_struct_lit(false, |p| p.parse_expr())?];
                    while self.match_token(&TokenKind::Comma) {
                        values.push(self.with_struct_lit(false, |p| p.parse_expr())?);
                    }
                    let body = self.parse_block()?;
                    cases.push(Case { values, body });
                }
                TokenKind::Default => {
                    self.skip_newlines();
                    self.advance();
                    default = Some(self.parse_block()?);
                    break;
                }
                _ => break,
            }
        }
        Ok(StmtKind::Switch {
            value,
            cases,
            default,
        })
    }

    fn parse_try(&mut self) -> CResult<StmtKind> {
        self.advance();
        let body = self.parse_block()?;
        if self.peek_past_newlines() != &TokenKind::Catch {
            self.skip_newlines();
            return Err(ErrorAt::new(ErrorKind::Catch, self.offset()));
        }
        self.skip_newlines();
        self.advance();
        let err = match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };
        let catch = self.parse_block()?;
        Ok(StmtKind::Try { body, err, catch })
    }

    fn parse_go(&mut self) -> CResult<StmtKind> {
        self.advance();
        let mut args = Vec::new();
        if self.match_token(&TokenKind::LParen) {
            while !self.match_token(&TokenKind::RParen) {
                let offset = self.offset();
                let named = matches!(self.peek(), TokenKind::Ident(_))
                    && self.peek_at(1) == &TokenKind::Colon;
                if !named {
                    return Err(ErrorAt::new(ErrorKind::GoParam, offset));
                }
                let (name, _) = self.expect_ident()?;
                self.advance();
                let value = self.parse_expr()?;
                args.push(Arg {
                    name: Some(name),
                    value,
                    offset,
                });
                if !self.match_token(&TokenKind::Comma) && !self.check(&TokenKind::RParen) {
                    return Err(self.expected(")"));
                }
            }
        }
        let body = self.parse_block()?;
        Ok(StmtKind::Go { args, body })
    }

    fn parse_optional(&mut self) -> CResult<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LBrace, "{")?;
        let mut params = Vec::new();
        self.skip_newlines();
        while !self.match_token(&TokenKind::RBrace) {
            let ty = self.parse_type()?;
            let (name, offset) = self.expect_ident()?;
            self.expect(&TokenKind::Eq, "=")?;
            let default = Some(self.parse_expr()?);
            params.push(ParamDecl {
                ty,
                name,
                default,
                offset,
            });
            self.match_token(&TokenKind::Comma);
            self.skip_newlines();
        }
        Ok(StmtKind::Optional(params))
    }

    // ===== 表达式 =====

    pub fn parse_expr(&mut self) -> CResult<Expr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: i32) -> CResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let prec = get_precedence(self.peek());
            if prec == 0 || prec < min_prec {
                break;
            }
            let op_token = self.advance();
            let right = self.parse_binary(prec + 1)?;
            let offset = op_token.offset;
            let kind = match op_token.kind {
                TokenKind::AndAnd => ExprKind::And(Box::new(left), Box::new(right)),
                TokenKind::OrOr => ExprKind::Or(Box::new(left), Box::new(right)),
                other => {
                    let op = match other {
                        TokenKind::EqEq => BinaryOp::Eq,
                        TokenKind::NotEq => BinaryOp::NotEq,
                        TokenKind::Lt => BinaryOp::Lt,
                        TokenKind::Le => BinaryOp::Le,
                        TokenKind::Gt => BinaryOp::Gt,
                        TokenKind::Ge => BinaryOp::Ge,
                        TokenKind::DotDot => BinaryOp::Range,
                        TokenKind::Pipe => BinaryOp::BitOr,
                        TokenKind::Caret => BinaryOp::BitXor,
                        TokenKind::Amp => BinaryOp::BitAnd,
                        TokenKind::Shl => BinaryOp::Shl,
                        TokenKind::Shr => BinaryOp::Shr,
                        TokenKind::Plus => BinaryOp::Add,
                        TokenKind::Minus => BinaryOp::Sub,
                        TokenKind::Star => BinaryOp::Mul,
                        TokenKind::Slash => BinaryOp::Div,
                        TokenKind::Percent => BinaryOp::Mod,
                        _ => {
                            return Err(ErrorAt::new(
                                ErrorKind::Compiler(format!("operator {other:?} has precedence")),
                                offset,
                            ))
                        }
                    };
                    ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }
                }
            };
            left = Expr::new(kind, offset);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> CResult<Expr> {
        let offset = self.offset();
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Caret => UnaryOp::BitNot,
            TokenKind::Star => UnaryOp::Len,
            TokenKind::Amp => return self.parse_addr_func(),
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            offset,
        ))
    }

    /// `&name.FnType`
    fn parse_addr_func(&mut self) -> CResult<Expr> {
        let offset = self.advance().offset;
        let name = match self.peek().clone() {
            TokenKind::Ident(name) if self.peek_at(1) == &TokenKind::Dot => {
                self.advance();
                self.advance();
                name
            }
            _ => return Err(ErrorAt::new(ErrorKind::AddrFunc, offset)),
        };
        let fn_type = self
            .parse_type()
            .map_err(|_| ErrorAt::new(ErrorKind::AddrFunc, offset))?;
        Ok(Expr::new(ExprKind::AddrFunc { name, fn_type }, offset))
    }

    fn parse_postfix(&mut self) -> CResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    let offset = self.advance().offset;
                    let args = self.with_struct_lit(true, |p| p.parse_args())?;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        offset,
                    );
                }
                TokenKind::LBracket => {
                    let offset = self.advance().offset;
                    if self.check(&TokenKind::RBracket) {
                        return Err(ErrorAt::new(ErrorKind::NoIndex, offset));
                    }
                    let index = self.with_struct_lit(true, |p| p.parse_expr())?;
                    self.expect(&TokenKind::RBracket, "]")?;
                    expr = Expr::new(
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        offset,
                    );
                }
                TokenKind::Dot => {
                    let offset = self.advance().offset;
                    let (name, _) = self.expect_ident()?;
                    // `alias.Type{...}`：导入单元中的结构体字面量
                    if let ExprKind::Ident(alias) = &expr.kind {
                        if self.check(&TokenKind::LBrace) && !self.no_struct_lit {
                            let ty = TypeExpr {
                                kind: TypeExprKind::Qualified(alias.clone(), name),
                                offset: expr.offset,
                            };
                            expr = self.parse_struct_lit(ty)?;
                            continue;
                        }
                    }
                    expr = Expr::new(
                        ExprKind::Field {
                            target: Box::new(expr),
                            name,
                        },
                        offset,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> CResult<Vec<Arg>> {
        let mut args = Vec::new();
        let mut seen_named = false;
        while !self.match_token(&TokenKind::RParen) {
            let offset = self.offset();
            let named = matches!(self.peek(), TokenKind::Ident(_))
                && self.peek_at(1) == &TokenKind::Colon;
            let name = if named {
                let (name, _) = self.expect_ident()?;
                self.advance();
                seen_named = true;
                Some(name)
            } else {
                if seen_named {
                    return Err(ErrorAt::new(ErrorKind::PositionalAfterNamed, offset));
                }
                None
            };
            let value = self.parse_expr()?;
            args.push(Arg {
                name,
                value,
                offset,
            });
            if !self.match_token(&TokenKind::Comma) && !self.check(&TokenKind::RParen) {
                return Err(self.expected(")"));
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> CResult<Expr> {
        let offset = self.offset();
        let kind = match self.peek().clone() {
            TokenKind::Int(v) => {
                self.advance();
                ExprKind::Int(v)
            }
            TokenKind::Float(v) => {
                self.advance();
                ExprKind::Float(v)
            }
            TokenKind::Char(c) => {
                self.advance();
                ExprKind::Char(c)
            }
            TokenKind::Str(s) => {
                self.advance();
                ExprKind::Str(s)
            }
            TokenKind::Template(parts) => {
                self.advance();
                ExprKind::Template(self.parse_template(parts)?)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Iota => {
                self.advance();
                ExprKind::Iota
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LBrace) && !self.no_struct_lit {
                    return self.parse_struct_lit(TypeExpr::named(name, offset));
                }
                ExprKind::Ident(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.with_struct_lit(true, |p| p.parse_expr())?;
                self.expect(&TokenKind::RParen, ")")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                ExprKind::Array(self.with_struct_lit(true, |p| p.parse_array_items())?)
            }
            TokenKind::LBrace => {
                self.advance();
                ExprKind::Map(self.with_struct_lit(true, |p| p.parse_map_items())?)
            }
            TokenKind::Question => {
                self.advance();
                self.expect(&TokenKind::LParen, "(")?;
                let (cond, then, otherwise) = self.with_struct_lit(true, |p| {
                    let cond = p.parse_expr()?;
                    p.expect(&TokenKind::Comma, ",")?;
                    let then = p.parse_expr()?;
                    p.expect(&TokenKind::Comma, ",")?;
                    let otherwise = p.parse_expr()?;
                    p.expect(&TokenKind::RParen, ")")?;
                    Ok((cond, then, otherwise))
                })?;
                ExprKind::Ternary {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                }
            }
            _ => return Err(self.expected("value")),
        };
        Ok(Expr::new(kind, offset))
    }

    fn parse_template(&mut self, parts: Vec<TemplatePart>) -> CResult<Vec<TemplateSegment>> {
        parts
            .into_iter()
            .map(|part| match part {
                TemplatePart::Text(text) => Ok(TemplateSegment::Text(text)),
                TemplatePart::Expr(tokens) => {
                    let mut nested = Parser::new(tokens);
                    Ok(TemplateSegment::Expr(nested.parse_standalone_expr()?))
                }
            })
            .collect()
    }

    fn parse_array_items(&mut self) -> CResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.match_token(&TokenKind::RBracket) {
            items.push(self.parse_expr()?);
            if self.check(&TokenKind::Colon) {
                return Err(ErrorAt::new(ErrorKind::KeyValue, self.offset()));
            }
            if !self.match_token(&TokenKind::Comma) && !self.check(&TokenKind::RBracket) {
                return Err(self.expected("]"));
            }
        }
        Ok(items)
    }

    fn parse_map_items(&mut self) -> CResult<Vec<(Expr, Expr)>> {
        let mut items = Vec::new();
        self.skip_newlines();
        while !self.match_token(&TokenKind::RBrace) {
            let key = self.parse_expr()?;
            if !self.match_token(&TokenKind::Colon) {
                return Err(ErrorAt::new(ErrorKind::NotKeyValue, key.offset));
            }
            let value = self.parse_expr()?;
            items.push((key, value));
            self.match_token(&TokenKind::Comma);
            self.skip_newlines();
        }
        Ok(items)
    }

    fn parse_struct_lit(&mut self, ty: TypeExpr) -> CResult<Expr> {
        let offset = ty.offset;
        self.expect(&TokenKind::LBrace, "{")?;
        let fields = self.with_struct_lit(true, |p| {
            let mut fields = Vec::new();
            p.skip_newlines();
            while !p.match_token(&TokenKind::RBrace) {
                let field_offset = p.offset();
                let name = match p.peek().clone() {
                    TokenKind::Ident(name) if p.peek_at(1) == &TokenKind::Colon => name,
                    _ => {
                        return Err(ErrorAt::new(
                            ErrorKind::InitField(p.peek().describe()),
                            field_offset,
                        ))
                    }
                };
                p.advance();
                p.advance();
                let value = p.parse_expr()?;
                fields.push(FieldInit {
                    name,
                    value,
                    offset: field_offset,
                });
                p.match_token(&TokenKind::Comma);
                p.skip_newlines();
            }
            Ok(fields)
        })?;
        Ok(Expr::new(ExprKind::StructLit { ty, fields }, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kit::lexer::{tokenize, LexOptions};

    fn parse(source: &str) -> CResult<Module> {
        let out = tokenize(source, &LexOptions::default()).map_err(ErrorAt::from)?;
        Parser::new(out.tokens).parse()
    }

    fn parse_err(source: &str) -> ErrorKind {
        parse(source).unwrap_err().kind
    }

    fn run_body(source: &str) -> Vec<Stmt> {
        let module = parse(source).unwrap();
        match &module.decls[0].kind {
            DeclKind::Run(run) => run.body.stmts.clone(),
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_function_declaration() {
        let module = parse("func add(int a, int b = 5) int {\n return a + b\n}").unwrap();
        match &module.decls[0].kind {
            DeclKind::Func(func) => {
                assert_eq!(func.name, "add");
                assert_eq!(func.params.len(), 2);
                assert!(func.params[0].default.is_none());
                assert!(func.params[1].default.is_some());
                assert!(!func.variadic);
                assert_eq!(func.ret.as_ref().map(|t| t.to_string()), Some("int".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_optional_before_required() {
        assert_eq!(parse_err("func f(int a = 1, int b) {}"), ErrorKind::EndOptional);
    }

    #[test]
    fn test_declaration_vs_assignment() {
        let stmts = run_body("run {\n arr.int xs = [1, 2]\n p.X = 3\n m.Point q\n}");
        assert!(matches!(stmts[0].kind, StmtKind::VarDecl { .. }));
        assert!(matches!(
            stmts[1].kind,
            StmtKind::Assign {
                op: AssignOp::Set,
                ..
            }
        ));
        match &stmts[2].kind {
            StmtKind::VarDecl { ty, name, .. } => {
                assert_eq!(ty.kind, TypeExprKind::Qualified("m".into(), "Point".into()));
                assert_eq!(name, "q");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let stmts = run_body("run {\n x = 1 + 2 * 3 == 7 && ok\n}");
        match &stmts[0].kind {
            StmtKind::Assign { value, .. } => assert!(matches!(value.kind, ExprKind::And(..))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_struct_literal_not_in_condition() {
        let stmts = run_body("run {\n if flag {\n x = P{X: 1}\n }\n}");
        match &stmts[0].kind {
            StmtKind::If { branches, .. } => {
                assert_eq!(branches[0].0.kind, ExprKind::Ident("flag".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_switch_and_try_shapes() {
        let stmts = run_body(
            "run {\n switch x\n case 1, 2 { y = 1 }\n default { y = 2 }\n try { f() } catch e { recover }\n}",
        );
        match &stmts[0].kind {
            StmtKind::Switch { cases, default, .. } => {
                assert_eq!(cases[0].values.len(), 2);
                assert!(default.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&stmts[1].kind, StmtKind::Try { err: Some(e), .. } if e == "e"));
    }

    #[test]
    fn test_statement_errors() {
        assert_eq!(parse_err("run {\n switch x\n y = 1\n}"), ErrorKind::NotCase);
        assert_eq!(parse_err("run {\n try { x = 1 }\n y = 2\n}"), ErrorKind::Catch);
        assert_eq!(parse_err("run {\n for v items {}\n}"), ErrorKind::ForIn);
        assert_eq!(parse_err("run {\n go (1) {}\n}"), ErrorKind::GoParam);
        assert_eq!(parse_err("run {\n x = a[]\n}"), ErrorKind::NoIndex);
        assert_eq!(parse_err("run {\n x = &f\n}"), ErrorKind::AddrFunc);
        assert_eq!(parse_err("run {\n x = P{1}\n}"), ErrorKind::InitField("1".into()));
        assert_eq!(parse_err("run {\n x = {1, 2}\n}"), ErrorKind::NotKeyValue);
        assert_eq!(parse_err("run {\n x = [\"a\": 1]\n}"), ErrorKind::KeyValue);
        assert_eq!(parse_err("include \"%{x}\""), ErrorKind::ImportStr);
    }

    #[test]
    fn test_const_forms() {
        let module = parse("const A = 1\nconst { B = 2\n C = 3 }\nconst IOTA * 2 { ZERO TWO }").unwrap();
        assert_eq!(module.decls.len(), 3);
        match &module.decls[2].kind {
            DeclKind::Const(ConstDecl::Enum { names, .. }) => assert_eq!(names.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pub_modes() {
        let module = parse("pub func f() {}\npub\nfunc g() {}").unwrap();
        assert!(module.decls[0].public);
        assert_eq!(module.decls[1].kind, DeclKind::PubAll);
        assert!(!module.decls[2].public);
    }

    #[test]
    fn test_template_expression_is_parsed() {
        let stmts = run_body("run {\n s = \"n=%{n + 1}\"\n}");
        match &stmts[0].kind {
            StmtKind::Assign { value, .. } => match &value.kind {
                ExprKind::Template(segments) => {
                    assert!(matches!(segments[1], TemplateSegment::Expr(_)))
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }
}
