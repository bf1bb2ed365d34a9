//! Оркестрация пяти фаз компиляции и итоговый [`CompilationResult`].
//!
//! Фазы идут строго по порядку: лексинг, парсинг, семантика,
//! оптимизация, генерация кода. Ошибки лексера не мешают парсингу
//! (так диагностик больше за один прогон), но любая ошибка двух
//! первых фаз останавливает конвейер перед семантикой, а
//! семантические ошибки — перед оптимизацией и генерацией.

use std::path::Path;
use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::bytecode::{Bytecode, SourceMap};
use crate::codegen::CodeGenerator;
use crate::diagnostics::{Diagnostic, Phase, SourceLocation};
use crate::optimizer::Optimizer;
use crate::parser::{Lexer, Parser};
use crate::semantic::SemanticAnalyzer;

/// Счётчики одной компиляции.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationStats {
    pub tokens: usize,
    pub ast_nodes: usize,
    pub instructions: usize,
    pub constants: usize,
    pub optimizations: usize,
    /// Секунды; дублируется в [`CompilationResult::compilation_time`].
    pub compilation_time: f64,
}

/// Итог компиляции одной единицы.
///
/// Статистика — обычные публичные данные: внешний советующий
/// компонент может дописывать к ней свои аннотации, не влияя на
/// успех или провал.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationResult {
    pub success: bool,
    pub bytecode: Option<Bytecode>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Секунды от начала лексинга до готового результата.
    pub compilation_time: f64,
    pub source_map: Option<SourceMap>,
    pub statistics: CompilationStats,
}

/// Компилятор Noodle.
pub struct Compiler {
    optimize: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Компилятор с включённой свёрткой констант.
    pub fn new() -> Self {
        Self { optimize: true }
    }

    /// Компилятор без оптимизаций (байткод один в один с AST).
    pub fn without_optimization() -> Self {
        Self { optimize: false }
    }

    /// Скомпилировать исходный текст. `filename` используется только
    /// в диагностике.
    pub fn compile_source(&self, source: &str, filename: &str) -> CompilationResult {
        let started = Instant::now();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut stats = CompilationStats::default();

        debug!("compiling {}: lexing", filename);
        let (tokens, lex_errors) = Lexer::new(source, filename).tokenize();
        stats.tokens = tokens.len();
        errors.extend(lex_errors);

        debug!("compiling {}: parsing ({} tokens)", filename, stats.tokens);
        let (program, parse_errors, parse_warnings) = Parser::new(tokens).parse();
        stats.ast_nodes = program.node_count();
        errors.extend(parse_errors);
        warnings.extend(parse_warnings);

        if !errors.is_empty() {
            return finish(false, None, errors, warnings, stats, started);
        }

        debug!(
            "compiling {}: semantic analysis ({} nodes)",
            filename, stats.ast_nodes
        );
        let (ok, sem_errors, sem_warnings) = SemanticAnalyzer::new().analyze(&program);
        errors.extend(sem_errors);
        warnings.extend(sem_warnings);
        if !ok {
            return finish(false, None, errors, warnings, stats, started);
        }

        let program = if self.optimize {
            debug!("compiling {}: optimization", filename);
            let (program, optimizations) = Optimizer::new().optimize(program);
            stats.optimizations = optimizations;
            program
        } else {
            program
        };

        debug!("compiling {}: code generation", filename);
        match CodeGenerator::new().generate(&program) {
            Ok(bytecode) => {
                stats.instructions = bytecode.instructions.len();
                stats.constants = bytecode.constants.len();
                finish(true, Some(bytecode), errors, warnings, stats, started)
            }
            Err(err) => {
                errors.push(Diagnostic::error(
                    err.location().clone(),
                    err.to_string(),
                    Phase::CodeGeneration,
                ));
                finish(false, None, errors, warnings, stats, started)
            }
        }
    }

    /// Скомпилировать файл. Нечитаемый файл — единственный случай
    /// короткого замыкания: результат с одной ошибкой.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> CompilationResult {
        let path = path.as_ref();
        let filename = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(source) => self.compile_source(&source, &filename),
            Err(err) => {
                let started = Instant::now();
                let error = Diagnostic::error(
                    SourceLocation::new(filename.clone(), 1, 1, 0),
                    format!("Cannot read file '{}': {}", filename, err),
                    Phase::Lexing,
                );
                finish(
                    false,
                    None,
                    vec![error],
                    Vec::new(),
                    CompilationStats::default(),
                    started,
                )
            }
        }
    }
}

fn finish(
    success: bool,
    bytecode: Option<Bytecode>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    mut stats: CompilationStats,
    started: Instant,
) -> CompilationResult {
    let compilation_time = started.elapsed().as_secs_f64();
    stats.compilation_time = compilation_time;
    let source_map = bytecode.as_ref().map(|b| b.source_map.clone());
    debug!(
        "compilation finished: success={}, {} errors, {} warnings",
        success,
        errors.len(),
        warnings.len()
    );
    CompilationResult {
        success,
        bytecode,
        errors,
        warnings,
        compilation_time,
        source_map,
        statistics: stats,
    }
}
