use crate::kit::lexer::TokenKind;

/// 二元运算符优先级，0 表示不是二元运算符
pub fn get_precedence(op: &TokenKind) -> i32 {
    match op {
        TokenKind::OrOr => 10,
        TokenKind::AndAnd => 20,
        TokenKind::EqEq | TokenKind::NotEq => 30,
        TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => 40,
        TokenKind::DotDot => 50,
        TokenKind::Pipe => 60,
        TokenKind::Caret => 70,
        TokenKind::Amp => 80,
        TokenKind::Shl | TokenKind::Shr => 90,
        TokenKind::Plus | TokenKind::Minus => 100,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 110,
        _ => 0,
    }
}
