//! Token 定义

/// 字符串插值片段：普通文本或 `%{expr}` 中的表达式 token
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ===== 字面量 =====
    Ident(String),
    Int(i64),
    Float(f64),
    Char(char),
    /// 不含插值的字符串（环境变量已展开）
    Str(String),
    /// 含 `%{...}` 插值的字符串
    Template(Vec<TemplatePart>),

    // ===== 关键字 =====
    Func,
    Run,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Recover,
    Retry,
    Go,
    Const,
    Struct,
    Fn,
    Include,
    Import,
    As,
    Pub,
    Optional,
    True,
    False,
    Iota,

    // ===== 分隔符 =====
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    DotDot,
    Ellipsis,
    Question,

    // ===== 运算符 =====
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    Bang,
    AndAnd,
    OrOr,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,

    /// 语句结束（换行或 `;`）
    Newline,
    Eof,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "func" => TokenKind::Func,
            "run" => TokenKind::Run,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "recover" => TokenKind::Recover,
            "retry" => TokenKind::Retry,
            "go" => TokenKind::Go,
            "const" => TokenKind::Const,
            "struct" => TokenKind::Struct,
            "fn" => TokenKind::Fn,
            "include" => TokenKind::Include,
            "import" => TokenKind::Import,
            "as" => TokenKind::As,
            "pub" => TokenKind::Pub,
            "optional" => TokenKind::Optional,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "IOTA" => TokenKind::Iota,
            _ => return None,
        };
        Some(kind)
    }

    /// 用于错误信息的简短描述
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Int(v) => v.to_string(),
            TokenKind::Float(v) => v.to_string(),
            TokenKind::Char(c) => format!("'{c}'"),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Template(_) => "string".to_string(),
            TokenKind::Newline => "new line".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => other.symbol().to_string(),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Func => "func",
            TokenKind::Run => "run",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Recover => "recover",
            TokenKind::Retry => "retry",
            TokenKind::Go => "go",
            TokenKind::Const => "const",
            TokenKind::Struct => "struct",
            TokenKind::Fn => "fn",
            TokenKind::Include => "include",
            TokenKind::Import => "import",
            TokenKind::As => "as",
            TokenKind::Pub => "pub",
            TokenKind::Optional => "optional",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Iota => "IOTA",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::Ellipsis => "...",
            TokenKind::Question => "?",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::Bang => "!",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::ShlEq => "<<=",
            TokenKind::ShrEq => ">>=",
            _ => "",
        }
    }
}

/// Token：类型 + 起始字节偏移
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}
