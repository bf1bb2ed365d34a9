//! Диагностика компиляции: позиции в исходном коде, ошибки и предупреждения.
//!
//! Все фазы компилятора накапливают [`Diagnostic`] в списках вместо
//! прерывания работы; единственное исключение — нечитаемый входной файл.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Позиция в исходном коде.
///
/// Строка и колонка нумеруются с 1 и вычисляются из байтового смещения.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Имя файла (только для диагностики).
    pub file: String,
    /// Строка (с 1).
    pub line: u32,
    /// Колонка (с 1).
    pub column: u32,
    /// Байтовое смещение от начала файла.
    pub offset: usize,
}

impl SourceLocation {
    /// Создать новую позицию.
    pub fn new(file: impl Into<String>, line: u32, column: u32, offset: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Серьёзность диагностики.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Фаза компиляции, породившая диагностику.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lexing,
    Parsing,
    SemanticAnalysis,
    Optimization,
    CodeGeneration,
    Finalization,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lexing => write!(f, "lexing"),
            Phase::Parsing => write!(f, "parsing"),
            Phase::SemanticAnalysis => write!(f, "semantic_analysis"),
            Phase::Optimization => write!(f, "optimization"),
            Phase::CodeGeneration => write!(f, "code_generation"),
            Phase::Finalization => write!(f, "finalization"),
        }
    }
}

/// Одно сообщение компилятора с позицией, серьёзностью и фазой.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub location: SourceLocation,
    pub message: String,
    pub severity: Severity,
    pub phase: Phase,
}

impl Diagnostic {
    /// Создать диагностику-ошибку.
    pub fn error(location: SourceLocation, message: impl Into<String>, phase: Phase) -> Self {
        Self {
            location,
            message: message.into(),
            severity: Severity::Error,
            phase,
        }
    }

    /// Создать диагностику-предупреждение.
    pub fn warning(location: SourceLocation, message: impl Into<String>, phase: Phase) -> Self {
        Self {
            location,
            message: message.into(),
            severity: Severity::Warning,
            phase,
        }
    }

    /// Является ли диагностика ошибкой.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}
