//! Фронтенд Noodle: лексер и рекурсивный спуск.
//!
//! Грамматика едина: паттерны, дженерики и async-формы — расширения
//! одного парсера (модуль pattern дополняет [`Parser`] грамматикой
//! паттернов), а не параллельный путь разбора.

mod lexer;
mod parser;
mod pattern;
mod token;

pub use lexer::{unescape_string, Lexer};
pub use parser::Parser;
pub use token::{Token, TokenKind};
