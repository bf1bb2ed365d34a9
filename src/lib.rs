//! # Noodle
//!
//! Ядро компилятора языка Noodle: пять фаз от исходного текста до
//! байткода NBC.
//!
//! ## Основные модули
//!
//! - [`parser`] - Лексер и рекурсивный спуск (паттерны, дженерики, async)
//! - [`ast`] - Тегированное AST
//! - [`semantic`] - Семантический анализ со стеком областей видимости
//! - [`optimizer`] - Свёртка констант
//! - [`codegen`] - Генерация байткода NBC с source map
//! - [`compiler`] - Оркестрация фаз и [`CompilationResult`]
//!
//! ## Пример
//!
//! ```rust
//! use noodle_lang::Compiler;
//!
//! let result = Compiler::new().compile_source("let x = 2 + 3 * 4;", "demo.nc");
//! assert!(result.success);
//! let bytecode = result.bytecode.unwrap();
//! println!("{}", bytecode.disassemble());
//! ```
//!
//! Исполнение байткода, разрешение меток в смещения и разрешение
//! модулей — вне ядра: внешний линкер принимает инструкции и пул
//! констант как есть.

// === Основные модули ===
pub mod ast;
pub mod bytecode;
pub mod codegen;
pub mod compiler;
pub mod diagnostics;
pub mod error;
pub mod optimizer;
pub mod parser;
pub mod semantic;

// === Re-exports для удобства ===
pub use bytecode::{Bytecode, Constant, ConstantPool, Instruction, Opcode, Operand, SourceMap};
pub use compiler::{CompilationResult, CompilationStats, Compiler};
pub use diagnostics::{Diagnostic, Phase, Severity, SourceLocation};
pub use error::CodeGenError;
pub use parser::{Lexer, Parser, Token, TokenKind};
pub use semantic::{SemanticAnalyzer, Symbol, SymbolKind};
