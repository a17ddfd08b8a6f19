//! 字符扫描器
//!
//! 逐字符驱动，生成 token。圆括号与方括号内部的换行不作为语句结束符。

use super::error::{LexError, LexErrorKind};
use super::header::Header;
use super::position::LineIndex;
use super::token::{TemplatePart, Token, TokenKind};
use tracing::{debug, trace};

const TARGET: &str = "quill::lexer";

/// 词法选项
#[derive(Debug, Clone)]
pub struct LexOptions {
    /// 是否展开 `${NAME}` 环境变量；关闭时保留原文
    pub expand_env: bool,
}

impl Default for LexOptions {
    fn default() -> Self {
        Self { expand_env: true }
    }
}

/// 词法分析结果
#[derive(Debug, Clone)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub lines: LineIndex,
    pub header: Header,
}

/// 对整段源码做词法分析
pub fn tokenize(source: &str, options: &LexOptions) -> Result<LexOutput, LexError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut scanner = Scanner::new(chars, source.len(), options, 0);
    let header = scanner.scan_header();
    scanner.scan_all()?;
    debug!(
        target: TARGET,
        tokens = scanner.tokens.len(),
        header_keys = header.iter().count(),
        "tokenized source"
    );
    Ok(LexOutput {
        tokens: scanner.tokens,
        lines: LineIndex::new(source),
        header,
    })
}

struct Scanner<'o> {
    chars: Vec<(usize, char)>,
    pos: usize,
    end_offset: usize,
    options: &'o LexOptions,
    tokens: Vec<Token>,
    /// 圆括号/方括号嵌套深度
    depth: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl<'o> Scanner<'o> {
    fn new(chars: Vec<(usize, char)>, end_offset: usize, options: &'o LexOptions, depth: usize) -> Self {
        Self {
            chars,
            pos: 0,
            end_offset,
            options,
            tokens: Vec::new(),
            depth,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.end_offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, kind: LexErrorKind, offset: usize) -> LexError {
        LexError::new(kind, offset)
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        trace!(target: TARGET, ?kind, offset, "token");
        self.tokens.push(Token::new(kind, offset));
    }

    fn newline(&mut self, offset: usize) {
        if self.depth > 0 {
            return;
        }
        match self.tokens.last() {
            None => {}
            Some(last) if last.kind == TokenKind::Newline => {}
            Some(_) => self.push(TokenKind::Newline, offset),
        }
    }

    /// 读取文件开头以 `#` 开始的行
    fn scan_header(&mut self) -> Header {
        let mut header = Header::default();
        loop {
            while matches!(self.peek(0), Some(c) if c.is_whitespace()) {
                self.pos += 1;
            }
            if self.peek(0) != Some('#') {
                break;
            }
            self.pos += 1;
            let mut line = String::new();
            while let Some(c) = self.peek(0) {
                if c == '\n' {
                    break;
                }
                line.push(c);
                self.pos += 1;
            }
            header.push_line(line.trim_end_matches('\r'));
        }
        header
    }

    fn scan_all(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek(0) {
            let start = self.offset();
            match c {
                '\n' | ';' => {
                    self.pos += 1;
                    self.newline(start);
                }
                c if c.is_whitespace() => self.pos += 1,
                '/' if self.peek(1) == Some('/') => {
                    while !matches!(self.peek(0), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                '/' if self.peek(1) == Some('*') => self.block_comment(start)?,
                c if c.is_ascii_digit() => self.number(start)?,
                c if is_ident_start(c) => self.ident(start)?,
                '\'' => self.char_literal(start)?,
                '"' => self.string(start)?,
                '`' => self.raw_string(start)?,
                _ => self.operator(start)?,
            }
        }
        let end = self.end_offset;
        self.newline(end);
        self.push(TokenKind::Eof, end);
        Ok(())
    }

    fn block_comment(&mut self, start: usize) -> Result<(), LexError> {
        self.pos += 2;
        let mut multiline = false;
        loop {
            match self.bump() {
                None => return Err(self.error(LexErrorKind::Comment, start)),
                Some('*') if self.peek(0) == Some('/') => {
                    self.pos += 1;
                    break;
                }
                Some('\n') => multiline = true,
                Some(_) => {}
            }
        }
        if multiline {
            self.newline(start);
        }
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<(), LexError> {
        let radix = match (self.peek(0), self.peek(1)) {
            (Some('0'), Some('x' | 'X')) => 16,
            (Some('0'), Some('b' | 'B')) => 2,
            (Some('0'), Some('o' | 'O')) => 8,
            _ => 10,
        };
        if radix != 10 {
            self.pos += 2;
            let mut digits = String::new();
            while let Some(c) = self.peek(0) {
                if c.is_ascii_alphanumeric() || c == '_' {
                    if c != '_' {
                        digits.push(c);
                    }
                    self.pos += 1;
                } else {
                    break;
                }
            }
            let value = i64::from_str_radix(&digits, radix)
                .map_err(|_| self.error(LexErrorKind::OutOfRange(digits.clone()), start))?;
            self.push(TokenKind::Int(value), start);
            return Ok(());
        }

        let mut text = String::new();
        let mut is_float = false;
        self.digits(&mut text);
        if self.peek(0) == Some('.') && matches!(self.peek(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.pos += 1;
            self.digits(&mut text);
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            let signed = matches!(self.peek(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if matches!(self.peek(digit_at), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                text.push('e');
                self.pos += 1;
                if signed {
                    text.extend(self.bump());
                }
                self.digits(&mut text);
            }
        }

        let kind = if is_float {
            match text.parse::<f64>() {
                Ok(value) if value.is_finite() => TokenKind::Float(value),
                _ => return Err(self.error(LexErrorKind::OutOfRange(text), start)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => TokenKind::Int(value),
                Err(_) => return Err(self.error(LexErrorKind::OutOfRange(text), start)),
            }
        };
        self.push(kind, start);
        Ok(())
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c != '_' {
                break;
            }
            self.pos += 1;
        }
    }

    fn ident(&mut self, start: usize) -> Result<(), LexError> {
        let mut name = String::new();
        while let Some(c) = self.peek(0) {
            if !is_ident_char(c) {
                break;
            }
            name.push(c);
            self.pos += 1;
        }
        // 点号后紧跟数字说明试图把点写进标识符
        if self.peek(0) == Some('.') && matches!(self.peek(1), Some(c) if c.is_ascii_digit()) {
            return Err(self.error(LexErrorKind::Ident, start));
        }
        let kind = TokenKind::keyword(&name).unwrap_or(TokenKind::Ident(name));
        self.push(kind, start);
        Ok(())
    }

    fn escape(&mut self, quote: char) -> Option<char> {
        let c = self.bump()?;
        let value = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '$' if quote == '"' => '$',
            '%' if quote == '"' => '%',
            '"' => '"',
            '\'' => '\'',
            'x' => {
                let hi = self.bump()?.to_digit(16)?;
                let lo = self.bump()?.to_digit(16)?;
                char::from_u32(hi * 16 + lo)?
            }
            'u' => {
                if self.bump()? != '{' {
                    return None;
                }
                let mut code = 0u32;
                let mut count = 0;
                loop {
                    let d = self.bump()?;
                    if d == '}' {
                        break;
                    }
                    code = code.checked_mul(16)?.checked_add(d.to_digit(16)?)?;
                    count += 1;
                }
                if count == 0 {
                    return None;
                }
                char::from_u32(code)?
            }
            _ => return None,
        };
        Some(value)
    }

    fn char_literal(&mut self, start: usize) -> Result<(), LexError> {
        self.pos += 1;
        let value = match self.bump() {
            None | Some('\'') | Some('\n') => None,
            Some('\\') => self.escape('\''),
            Some(c) => Some(c),
        };
        match (value, self.bump()) {
            (Some(c), Some('\'')) => {
                self.push(TokenKind::Char(c), start);
                Ok(())
            }
            _ => Err(self.error(LexErrorKind::Char, start)),
        }
    }

    fn string(&mut self, start: usize) -> Result<(), LexError> {
        self.pos += 1;
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            let here = self.offset();
            match self.bump() {
                None | Some('\n') => return Err(self.error(LexErrorKind::DoubleQuotes, start)),
                Some('"') => break,
                Some('\\') => match self.escape('"') {
                    Some(c) => text.push(c),
                    None => return Err(self.error(LexErrorKind::DoubleQuotes, here)),
                },
                Some('$') if self.peek(0) == Some('{') => {
                    self.pos += 1;
                    let name = self.env_name(here)?;
                    if self.options.expand_env {
                        text.push_str(&std::env::var(&name).unwrap_or_default());
                    } else {
                        text.push_str(&format!("${{{name}}}"));
                    }
                }
                Some('%') if self.peek(0) == Some('{') => {
                    self.pos += 1;
                    let tokens = self.interpolation(here)?;
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(TemplatePart::Expr(tokens));
                }
                Some(c) => text.push(c),
            }
        }
        if parts.is_empty() {
            self.push(TokenKind::Str(text), start);
        } else {
            if !text.is_empty() {
                parts.push(TemplatePart::Text(text));
            }
            self.push(TokenKind::Template(parts), start);
        }
        Ok(())
    }

    fn env_name(&mut self, start: usize) -> Result<String, LexError> {
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('}') => break,
                Some(c) if is_ident_char(c) && c.is_ascii() => name.push(c),
                _ => return Err(self.error(LexErrorKind::EnvName, start)),
            }
        }
        let valid_start = name.chars().next().is_some_and(|c| !c.is_ascii_digit());
        if !valid_start {
            return Err(self.error(LexErrorKind::EnvName, start));
        }
        Ok(name)
    }

    /// 扫描 `%{ ... }` 内部，返回其 token 序列
    fn interpolation(&mut self, start: usize) -> Result<Vec<Token>, LexError> {
        let from = self.pos;
        let mut depth = 1usize;
        let mut in_string = false;
        while depth > 0 {
            match self.bump() {
                None | Some('\n') => return Err(self.error(LexErrorKind::DoubleQuotes, start)),
                Some('\\') if in_string => {
                    self.pos += 1;
                }
                Some('"') => in_string = !in_string,
                Some('{') if !in_string => depth += 1,
                Some('}') if !in_string => depth -= 1,
                Some(_) => {}
            }
        }
        let inner: Vec<(usize, char)> = self.chars[from..self.pos - 1].to_vec();
        if inner.iter().all(|(_, c)| c.is_whitespace()) {
            return Err(self.error(LexErrorKind::DoubleQuotes, start));
        }
        let end = self.chars[self.pos - 1].0;
        let mut nested = Scanner::new(inner, end, self.options, 1);
        nested.scan_all()?;
        Ok(nested.tokens)
    }

    fn raw_string(&mut self, start: usize) -> Result<(), LexError> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error(LexErrorKind::BackQuote, start)),
                Some('`') => break,
                Some(c) => text.push(c),
            }
        }
        self.push(TokenKind::Str(text), start);
        Ok(())
    }

    fn operator(&mut self, start: usize) -> Result<(), LexError> {
        let c0 = self.peek(0).unwrap_or('\0');
        let c1 = self.peek(1).unwrap_or('\0');
        let c2 = self.peek(2).unwrap_or('\0');
        let (kind, len) = match (c0, c1, c2) {
            ('.', '.', '.') => (TokenKind::Ellipsis, 3),
            ('<', '<', '=') => (TokenKind::ShlEq, 3),
            ('>', '>', '=') => (TokenKind::ShrEq, 3),
            ('.', '.', _) => (TokenKind::DotDot, 2),
            ('<', '<', _) => (TokenKind::Shl, 2),
            ('>', '>', _) => (TokenKind::Shr, 2),
            ('<', '=', _) => (TokenKind::Le, 2),
            ('>', '=', _) => (TokenKind::Ge, 2),
            ('=', '=', _) => (TokenKind::EqEq, 2),
            ('!', '=', _) => (TokenKind::NotEq, 2),
            ('&', '&', _) => (TokenKind::AndAnd, 2),
            ('|', '|', _) => (TokenKind::OrOr, 2),
            ('+', '=', _) => (TokenKind::PlusEq, 2),
            ('-', '=', _) => (TokenKind::MinusEq, 2),
            ('*', '=', _) => (TokenKind::StarEq, 2),
            ('/', '=', _) => (TokenKind::SlashEq, 2),
            ('%', '=', _) => (TokenKind::PercentEq, 2),
            ('&', '=', _) => (TokenKind::AmpEq, 2),
            ('|', '=', _) => (TokenKind::PipeEq, 2),
            ('^', '=', _) => (TokenKind::CaretEq, 2),
            ('.', _, _) => (TokenKind::Dot, 1),
            ('<', _, _) => (TokenKind::Lt, 1),
            ('>', _, _) => (TokenKind::Gt, 1),
            ('=', _, _) => (TokenKind::Eq, 1),
            ('!', _, _) => (TokenKind::Bang, 1),
            ('&', _, _) => (TokenKind::Amp, 1),
            ('|', _, _) => (TokenKind::Pipe, 1),
            ('+', _, _) => (TokenKind::Plus, 1),
            ('-', _, _) => (TokenKind::Minus, 1),
            ('*', _, _) => (TokenKind::Star, 1),
            ('/', _, _) => (TokenKind::Slash, 1),
            ('%', _, _) => (TokenKind::Percent, 1),
            ('^', _, _) => (TokenKind::Caret, 1),
            (',', _, _) => (TokenKind::Comma, 1),
            (':', _, _) => (TokenKind::Colon, 1),
            ('?', _, _) => (TokenKind::Question, 1),
            ('(', _, _) => (TokenKind::LParen, 1),
            (')', _, _) => (TokenKind::RParen, 1),
            ('[', _, _) => (TokenKind::LBracket, 1),
            (']', _, _) => (TokenKind::RBracket, 1),
            ('{', _, _) => (TokenKind::LBrace, 1),
            ('}', _, _) => (TokenKind::RBrace, 1),
            _ => return Err(self.error(LexErrorKind::Letter, start)),
        };
        match kind {
            TokenKind::LParen | TokenKind::LBracket => self.depth += 1,
            TokenKind::RParen | TokenKind::RBracket => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        self.pos += len;
        self.push(kind, start);
        Ok(())
    }
}
