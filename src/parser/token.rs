//! Токены лексера Noodle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::SourceLocation;

/// Тип токена.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // === Ключевые слова ===
    Let,
    Def,
    Return,
    If,
    Else,
    For,
    In,
    While,
    Break,
    Continue,
    Import,
    From,
    As,
    Class,
    Struct,
    Interface,
    Implements,
    Extends,
    Type,
    Enum,
    Match,
    Case,
    Default,
    Async,
    Await,
    Yield,
    With,
    True,
    False,
    None,

    // === Литералы и идентификаторы ===
    Identifier,
    Number,
    String,

    // === Операторы ===
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Arrow,
    DoubleColon,
    Range,
    Pipe,
    Ampersand,

    // === Разделители ===
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,

    // === Служебные ===
    Newline,
    Eof,
}

impl TokenKind {
    /// Найти ключевое слово по тексту (без учёта регистра).
    /// Всё, что не в таблице — идентификатор.
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let upper = text.to_ascii_uppercase();
        let kind = match upper.as_str() {
            "LET" => TokenKind::Let,
            "DEF" => TokenKind::Def,
            "RETURN" => TokenKind::Return,
            "IF" => TokenKind::If,
            "ELSE" => TokenKind::Else,
            "FOR" => TokenKind::For,
            "IN" => TokenKind::In,
            "WHILE" => TokenKind::While,
            "BREAK" => TokenKind::Break,
            "CONTINUE" => TokenKind::Continue,
            "IMPORT" => TokenKind::Import,
            "FROM" => TokenKind::From,
            "AS" => TokenKind::As,
            "CLASS" => TokenKind::Class,
            "STRUCT" => TokenKind::Struct,
            "INTERFACE" => TokenKind::Interface,
            "IMPLEMENTS" => TokenKind::Implements,
            "EXTENDS" => TokenKind::Extends,
            "TYPE" => TokenKind::Type,
            "ENUM" => TokenKind::Enum,
            "MATCH" => TokenKind::Match,
            "CASE" => TokenKind::Case,
            "DEFAULT" => TokenKind::Default,
            "ASYNC" => TokenKind::Async,
            "AWAIT" => TokenKind::Await,
            "YIELD" => TokenKind::Yield,
            "WITH" => TokenKind::With,
            "TRUE" => TokenKind::True,
            "FALSE" => TokenKind::False,
            "NONE" => TokenKind::None,
            _ => return Option::None,
        };
        Some(kind)
    }

    /// Является ли токен литералом.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::Number
                | TokenKind::String
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Let => "LET",
            TokenKind::Def => "DEF",
            TokenKind::Return => "RETURN",
            TokenKind::If => "IF",
            TokenKind::Else => "ELSE",
            TokenKind::For => "FOR",
            TokenKind::In => "IN",
            TokenKind::While => "WHILE",
            TokenKind::Break => "BREAK",
            TokenKind::Continue => "CONTINUE",
            TokenKind::Import => "IMPORT",
            TokenKind::From => "FROM",
            TokenKind::As => "AS",
            TokenKind::Class => "CLASS",
            TokenKind::Struct => "STRUCT",
            TokenKind::Interface => "INTERFACE",
            TokenKind::Implements => "IMPLEMENTS",
            TokenKind::Extends => "EXTENDS",
            TokenKind::Type => "TYPE",
            TokenKind::Enum => "ENUM",
            TokenKind::Match => "MATCH",
            TokenKind::Case => "CASE",
            TokenKind::Default => "DEFAULT",
            TokenKind::Async => "ASYNC",
            TokenKind::Await => "AWAIT",
            TokenKind::Yield => "YIELD",
            TokenKind::With => "WITH",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::None => "NONE",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "MULTIPLY",
            TokenKind::Slash => "DIVIDE",
            TokenKind::Percent => "MODULO",
            TokenKind::Assign => "ASSIGN",
            TokenKind::Eq => "EQ",
            TokenKind::Ne => "NE",
            TokenKind::Lt => "LT",
            TokenKind::Gt => "GT",
            TokenKind::Le => "LE",
            TokenKind::Ge => "GE",
            TokenKind::AndAnd => "AND",
            TokenKind::OrOr => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Arrow => "ARROW",
            TokenKind::DoubleColon => "DOUBLE_COLON",
            TokenKind::Range => "RANGE",
            TokenKind::Pipe => "PIPE",
            TokenKind::Ampersand => "AMPERSAND",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::LBracket => "LBRACKET",
            TokenKind::RBracket => "RBRACKET",
            TokenKind::Comma => "COMMA",
            TokenKind::Dot => "DOT",
            TokenKind::Colon => "COLON",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Eof => "EOF",
        };
        write!(f, "{}", name)
    }
}

/// Токен: тип, лексема (дословный срез исходника) и позиция.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
}

impl Token {
    /// Создать новый токен.
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            location,
        }
    }

    /// EOF-токен в заданной позиции.
    pub fn eof(location: SourceLocation) -> Self {
        Self::new(TokenKind::Eof, "", location)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lexeme.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}({})", self.kind, self.lexeme)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_case_insensitive() {
        assert_eq!(TokenKind::keyword("let"), Some(TokenKind::Let));
        assert_eq!(TokenKind::keyword("LET"), Some(TokenKind::Let));
        assert_eq!(TokenKind::keyword("Match"), Some(TokenKind::Match));
        assert_eq!(TokenKind::keyword("async"), Some(TokenKind::Async));
        assert_eq!(TokenKind::keyword("foo"), None);
        assert_eq!(TokenKind::keyword("_"), None);
    }

    #[test]
    fn test_token_kind_display() {
        assert_eq!(TokenKind::Semicolon.to_string(), "SEMICOLON");
        assert_eq!(TokenKind::Star.to_string(), "MULTIPLY");
        assert_eq!(TokenKind::AndAnd.to_string(), "AND");
    }
}
