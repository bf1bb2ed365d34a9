//! Внутренние ошибки генерации кода.
//!
//! Пользовательские диагностики накапливаются как [`crate::diagnostics::Diagnostic`];
//! сюда попадают только нарушения инвариантов самого генератора.

use thiserror::Error;

use crate::diagnostics::SourceLocation;

/// Ошибка построения байткода.
#[derive(Error, Debug)]
pub enum CodeGenError {
    /// Переход на метку, не определённую в том же теле функции.
    #[error("Jump to undefined label L{label}")]
    DanglingLabel {
        label: u32,
        location: SourceLocation,
    },

    /// FUNC_END без парного FUNC_START.
    #[error("Unbalanced function markers in instruction stream")]
    UnbalancedFunctionMarkers { location: SourceLocation },
}

impl CodeGenError {
    /// Получить позицию ошибки.
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::DanglingLabel { location, .. } => location,
            Self::UnbalancedFunctionMarkers { location } => location,
        }
    }
}
