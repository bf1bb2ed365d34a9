//! Лексер Noodle на основе logos.
//!
//! Сканер не прерывается на первой ошибке: неизвестные символы и
//! незакрытые строки накапливаются как [`Diagnostic`], а лексинг
//! продолжается со следующего символа.

use logos::Logos;

use super::token::{Token, TokenKind};
use crate::diagnostics::{Diagnostic, Phase, SourceLocation};

/// Внутренние токены для logos.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")] // Пропускаем пробелы (но не переводы строк)
#[logos(skip r"#[^\n]*")] // Пропускаем комментарии # до конца строки
enum LogosToken {
    #[token("\n")]
    Newline,

    // Число: целая часть, опциональная дробная, опциональная экспонента
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    Number,

    // Закрытая строка в двойных или одинарных кавычках
    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    #[regex(r"'([^'\\\n]|\\[^\n])*'")]
    String,

    // Незакрытая строка: до конца строки или файла (logos предпочтёт
    // закрытый вариант как более длинное совпадение)
    #[regex(r#""([^"\\\n]|\\[^\n])*"#)]
    #[regex(r"'([^'\\\n]|\\[^\n])*")]
    UnterminatedString,

    // Идентификатор или ключевое слово (разбирается в convert_token)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // Двухсимвольные операторы (до односимвольных!)
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("->")]
    Arrow,
    #[token("::")]
    DoubleColon,
    #[token("..")]
    Range,
    #[token("//")]
    DoubleSlash,

    // Односимвольные операторы
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Assign,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,
    #[token("|")]
    Pipe,
    #[token("&")]
    Ampersand,

    // Разделители
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
}

/// Обработка escape-последовательностей в содержимом строкового литерала.
///
/// Лексема токена хранит дословный срез исходника; значение строки
/// вычисляется по требованию этой функцией.
pub fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('0') => result.push('\0'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Индекс начал строк для перевода байтового смещения в строку/колонку.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    /// Строка и колонка (с 1) для байтового смещения.
    fn line_col(&self, offset: usize) -> (u32, u32) {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = offset - self.starts[line] + 1;
        (line as u32 + 1, column as u32)
    }
}

/// Лексер Noodle.
pub struct Lexer<'a> {
    source: &'a str,
    file: &'a str,
    index: LineIndex,
}

impl<'a> Lexer<'a> {
    /// Создать новый лексер для исходника `source` из файла `file`.
    pub fn new(source: &'a str, file: &'a str) -> Self {
        Self {
            source,
            file,
            index: LineIndex::new(source),
        }
    }

    /// Просканировать весь исходник.
    ///
    /// Возвращает полный список токенов (завершённый EOF) и накопленные
    /// диагностики лексинга.
    pub fn tokenize(&self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        let mut diagnostics = Vec::new();

        let mut logos = LogosToken::lexer(self.source);
        while let Some(result) = logos.next() {
            let span = logos.span();
            let location = self.location_at(span.start);
            let lexeme = &self.source[span.clone()];

            match result {
                Ok(LogosToken::UnterminatedString) => {
                    diagnostics.push(Diagnostic::error(
                        location.clone(),
                        "Unterminated string literal",
                        Phase::Lexing,
                    ));
                    // Частичная лексема всё равно становится токеном
                    tokens.push(Token::new(TokenKind::String, lexeme, location));
                }
                Ok(raw) => {
                    let kind = convert_token(&raw, lexeme);
                    tokens.push(Token::new(kind, lexeme, location));
                }
                Err(()) => {
                    let ch = lexeme.chars().next().unwrap_or('\0');
                    diagnostics.push(Diagnostic::error(
                        location,
                        format!("Unexpected character: '{}'", ch),
                        Phase::Lexing,
                    ));
                }
            }
        }

        tokens.push(Token::eof(self.location_at(self.source.len())));
        (tokens, diagnostics)
    }

    /// Позиция в исходнике для байтового смещения.
    fn location_at(&self, offset: usize) -> SourceLocation {
        let (line, column) = self.index.line_col(offset);
        SourceLocation::new(self.file, line, column, offset)
    }
}

/// Конвертировать внутренний токен logos в публичный тип токена.
fn convert_token(raw: &LogosToken, lexeme: &str) -> TokenKind {
    match raw {
        LogosToken::Newline => TokenKind::Newline,
        LogosToken::Number => TokenKind::Number,
        LogosToken::String | LogosToken::UnterminatedString => TokenKind::String,
        LogosToken::Ident => TokenKind::keyword(lexeme).unwrap_or(TokenKind::Identifier),
        LogosToken::Eq => TokenKind::Eq,
        LogosToken::Ne => TokenKind::Ne,
        LogosToken::Le => TokenKind::Le,
        LogosToken::Ge => TokenKind::Ge,
        LogosToken::AndAnd => TokenKind::AndAnd,
        LogosToken::OrOr => TokenKind::OrOr,
        LogosToken::Arrow => TokenKind::Arrow,
        LogosToken::DoubleColon => TokenKind::DoubleColon,
        LogosToken::Range => TokenKind::Range,
        // `//` лексится как деление, как и `/`
        LogosToken::DoubleSlash | LogosToken::Slash => TokenKind::Slash,
        LogosToken::Plus => TokenKind::Plus,
        LogosToken::Minus => TokenKind::Minus,
        LogosToken::Star => TokenKind::Star,
        LogosToken::Percent => TokenKind::Percent,
        LogosToken::Assign => TokenKind::Assign,
        LogosToken::Lt => TokenKind::Lt,
        LogosToken::Gt => TokenKind::Gt,
        LogosToken::Bang => TokenKind::Not,
        LogosToken::Pipe => TokenKind::Pipe,
        LogosToken::Ampersand => TokenKind::Ampersand,
        LogosToken::LParen => TokenKind::LParen,
        LogosToken::RParen => TokenKind::RParen,
        LogosToken::LBrace => TokenKind::LBrace,
        LogosToken::RBrace => TokenKind::RBrace,
        LogosToken::LBracket => TokenKind::LBracket,
        LogosToken::RBracket => TokenKind::RBracket,
        LogosToken::Comma => TokenKind::Comma,
        LogosToken::Dot => TokenKind::Dot,
        LogosToken::Colon => TokenKind::Colon,
        LogosToken::Semicolon => TokenKind::Semicolon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = Lexer::new(source, "test.nc").tokenize();
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lexer_basic() {
        assert_eq!(
            kinds("let x = 42;"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_keywords_case_insensitive() {
        assert_eq!(
            kinds("LET Def rEtUrN"),
            vec![
                TokenKind::Let,
                TokenKind::Def,
                TokenKind::Return,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_two_char_operators() {
        assert_eq!(
            kinds("== != <= >= && || -> :: .."),
            vec![
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Arrow,
                TokenKind::DoubleColon,
                TokenKind::Range,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_lexeme_roundtrip() {
        // Конкатенация лексем (без EOF) восстанавливает исходник
        // без пробелов и комментариев.
        let source = "let x = 3.14; # comment\nreturn \"a\\nb\";";
        let (tokens, diags) = Lexer::new(source, "test.nc").tokenize();
        assert!(diags.is_empty());
        let joined: String = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        let stripped: String = source
            .split('\n')
            .map(|line| line.split('#').next().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n")
            .chars()
            .filter(|c| *c != ' ' && *c != '\t')
            .collect();
        assert_eq!(joined, stripped);
        // Строковая лексема хранится дословно, с кавычками и escape
        let string = tokens.iter().find(|t| t.kind == TokenKind::String).unwrap();
        assert_eq!(string.lexeme, "\"a\\nb\"");
    }

    #[test]
    fn test_lexer_unknown_chars() {
        // Каждый неизвестный символ даёт отдельную диагностику
        let (tokens, diags) = Lexer::new("let @ $ x", "test.nc").tokenize();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].message, "Unexpected character: '@'");
        assert_eq!(diags[1].message, "Unexpected character: '$'");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Let, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_lexer_unterminated_string() {
        let (tokens, diags) = Lexer::new("let s = \"oops;\nlet y = 1;", "test.nc").tokenize();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Unterminated string literal");
        assert_eq!(diags[0].location.line, 1);
        // Частичная строка всё же попадает в поток токенов
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::String && t.lexeme == "\"oops;"));
    }

    #[test]
    fn test_lexer_positions() {
        let (tokens, _) = Lexer::new("let x;\nlet y;", "test.nc").tokenize();
        let y = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Identifier && t.lexeme == "y")
            .unwrap();
        assert_eq!(y.location.line, 2);
        assert_eq!(y.location.column, 5);
    }

    #[test]
    fn test_lexer_number_forms() {
        let (tokens, diags) = Lexer::new("1 2.5 3e10 4.2E-3", "test.nc").tokenize();
        assert!(diags.is_empty());
        assert_eq!(
            tokens
                .iter()
                .filter(|t| t.kind == TokenKind::Number)
                .count(),
            4
        );
    }

    #[test]
    fn test_unescape_string() {
        assert_eq!(unescape_string(r"a\nb"), "a\nb");
        assert_eq!(unescape_string(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(unescape_string(r"tail\"), "tail\\");
    }
}
