//! Семантический анализ: один предпорядковый проход по дереву
//! с явным стеком областей видимости.
//!
//! Объявление проверяется по всему живому стеку: внутренний `let`,
//! совпадающий с внешним именем, это ошибка переобъявления.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ast::{ElseBranch, Expr, FuncDef, MatchCase, Program, Stmt};
use crate::diagnostics::{Diagnostic, Phase, SourceLocation};

/// Встроенные функции, доступные без объявления.
const BUILTINS: &[&str] = &[
    "print", "len", "range", "input", "type", "str", "int", "float", "bool",
];

/// Вид символа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
    Parameter,
}

impl SymbolKind {
    /// Имя вида для сообщений об ошибках.
    fn label(&self) -> &'static str {
        match self {
            SymbolKind::Variable => "Variable",
            SymbolKind::Function => "Function",
            SymbolKind::Class => "Class",
            SymbolKind::Parameter => "Parameter",
        }
    }
}

/// Запись таблицы символов.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub declared_type: Option<String>,
    /// Глубина области видимости (0 — глобальная).
    pub scope: usize,
    pub location: SourceLocation,
}

/// Семантический анализатор.
pub struct SemanticAnalyzer {
    scopes: Vec<HashMap<String, Symbol>>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    /// Объявленные типы возврата объемлющих функций.
    return_types: Vec<Option<String>>,
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        let mut globals = HashMap::new();
        for name in BUILTINS {
            globals.insert(
                name.to_string(),
                Symbol {
                    name: name.to_string(),
                    kind: SymbolKind::Function,
                    declared_type: None,
                    scope: 0,
                    location: SourceLocation::default(),
                },
            );
        }
        Self {
            scopes: vec![globals],
            errors: Vec::new(),
            warnings: Vec::new(),
            return_types: Vec::new(),
        }
    }

    /// Проверить программу. `ok` истинно, только если нет ошибок;
    /// предупреждения не влияют на результат.
    pub fn analyze(mut self, program: &Program) -> (bool, Vec<Diagnostic>, Vec<Diagnostic>) {
        for stmt in &program.statements {
            self.analyze_stmt(stmt);
        }
        (self.errors.is_empty(), self.errors, self.warnings)
    }

    // === Стек областей видимости ===

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Найти символ, просматривая стек сверху вниз.
    fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Объявить символ с проверкой переобъявления по всему живому стеку.
    fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        declared_type: Option<String>,
        location: &SourceLocation,
    ) {
        if let Some(existing) = self.resolve(name) {
            let label = existing.kind.label();
            self.errors.push(Diagnostic::error(
                location.clone(),
                format!("{} '{}' already declared", label, name),
                Phase::SemanticAnalysis,
            ));
            return;
        }
        self.insert(name, kind, declared_type, location);
    }

    /// Объявить без проверки: переменные циклов и связывания паттернов
    /// перекрывают внешние имена.
    fn declare_unchecked(
        &mut self,
        name: &str,
        kind: SymbolKind,
        declared_type: Option<String>,
        location: &SourceLocation,
    ) {
        self.insert(name, kind, declared_type, location);
    }

    fn insert(
        &mut self,
        name: &str,
        kind: SymbolKind,
        declared_type: Option<String>,
        location: &SourceLocation,
    ) {
        let scope = self.depth();
        let symbol = Symbol {
            name: name.to_string(),
            kind,
            declared_type,
            scope,
            location: location.clone(),
        };
        if let Some(top) = self.scopes.last_mut() {
            top.insert(name.to_string(), symbol);
        }
    }

    // === Обход операторов ===

    fn analyze_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let {
                name,
                declared_type,
                value,
                location,
            } => {
                // Инициализатор видит только прежние имена
                if let Some(value) = value {
                    self.analyze_expr(value);
                }
                self.declare(name, SymbolKind::Variable, declared_type.clone(), location);
            }
            Stmt::FuncDef(def) => self.analyze_func(def),
            Stmt::ClassDef {
                name,
                body,
                location,
                ..
            } => {
                self.declare(name, SymbolKind::Class, None, location);
                self.push_scope();
                for stmt in body {
                    self.analyze_stmt(stmt);
                }
                self.pop_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.analyze_expr(condition);
                for stmt in then_branch {
                    self.analyze_stmt(stmt);
                }
                match else_branch {
                    Some(ElseBranch::ElseIf(stmt)) => self.analyze_stmt(stmt),
                    Some(ElseBranch::Else(body)) => {
                        for stmt in body {
                            self.analyze_stmt(stmt);
                        }
                    }
                    None => {}
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.analyze_expr(condition);
                for stmt in body {
                    self.analyze_stmt(stmt);
                }
            }
            Stmt::For {
                variable,
                iterable,
                body,
                location,
                ..
            } => {
                self.analyze_expr(iterable);
                self.declare_unchecked(variable, SymbolKind::Variable, None, location);
                for stmt in body {
                    self.analyze_stmt(stmt);
                }
            }
            Stmt::With { target, body, .. } => {
                self.analyze_expr(target);
                for stmt in body {
                    self.analyze_stmt(stmt);
                }
            }
            Stmt::Return { value, location } => {
                match value {
                    Some(value) => self.analyze_expr(value),
                    None => {
                        // `return;` в функции с объявленным типом возврата
                        let expects_value = matches!(
                            self.return_types.last(),
                            Some(Some(t)) if t != "None"
                        );
                        if expects_value {
                            self.warnings.push(Diagnostic::warning(
                                location.clone(),
                                "Function expects return value but returns None",
                                Phase::SemanticAnalysis,
                            ));
                        }
                    }
                }
            }
            Stmt::Yield { value, .. } => {
                if let Some(value) = value {
                    self.analyze_expr(value);
                }
            }
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
            Stmt::Import {
                module,
                alias,
                location,
            } => {
                // Имя модуля (или алиас) становится видимым символом
                let name = alias.as_deref().unwrap_or(module);
                self.declare_unchecked(name, SymbolKind::Variable, None, location);
            }
            Stmt::Expr { expr, .. } => self.analyze_expr(expr),
        }
    }

    fn analyze_func(&mut self, def: &FuncDef) {
        self.declare(&def.name, SymbolKind::Function, None, &def.location);
        self.push_scope();
        for param in &def.params {
            self.declare(
                &param.name,
                SymbolKind::Parameter,
                param.declared_type.clone(),
                &param.location,
            );
        }
        self.return_types.push(def.return_type.clone());
        for stmt in &def.body {
            self.analyze_stmt(stmt);
        }
        self.return_types.pop();
        self.pop_scope();
    }

    // === Обход выражений ===

    fn analyze_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number { .. }
            | Expr::String { .. }
            | Expr::Bool { .. }
            | Expr::None { .. } => {}
            Expr::Identifier { name, location } => {
                if self.resolve(name).is_none() {
                    self.errors.push(Diagnostic::error(
                        location.clone(),
                        format!("Undefined variable '{}'", name),
                        Phase::SemanticAnalysis,
                    ));
                }
            }
            Expr::Binary { left, right, .. } => {
                self.analyze_expr(left);
                self.analyze_expr(right);
            }
            Expr::Unary { operand, .. } | Expr::Await { operand, .. } => {
                self.analyze_expr(operand)
            }
            Expr::Assign {
                target,
                value,
                location,
            } => {
                self.analyze_expr(value);
                if self.resolve(target).is_none() {
                    self.errors.push(Diagnostic::error(
                        location.clone(),
                        format!("Undefined variable '{}'", target),
                        Phase::SemanticAnalysis,
                    ));
                }
            }
            Expr::Call {
                callee,
                args,
                location,
            } => {
                if self.resolve(callee).is_none() {
                    self.errors.push(Diagnostic::error(
                        location.clone(),
                        format!("Undefined function '{}'", callee),
                        Phase::SemanticAnalysis,
                    ));
                }
                for arg in args {
                    self.analyze_expr(arg);
                }
            }
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.analyze_expr(element);
                }
            }
            Expr::Object { entries, .. } => {
                for (_, value) in entries {
                    self.analyze_expr(value);
                }
            }
            Expr::Match {
                subject,
                cases,
                default,
                ..
            } => {
                self.analyze_expr(subject);
                for case in cases {
                    self.analyze_case(case);
                }
                if let Some(body) = default {
                    for stmt in body {
                        self.analyze_stmt(stmt);
                    }
                }
            }
        }
    }

    /// Guard и тело ветки видят связывания своего паттерна
    /// в свежей области видимости.
    fn analyze_case(&mut self, case: &MatchCase) {
        self.push_scope();
        let location = case.pattern.location().clone();
        for name in case.pattern.bindings() {
            self.declare_unchecked(name, SymbolKind::Variable, None, &location);
        }
        if let Some(guard) = &case.guard {
            self.analyze_expr(guard);
        }
        for stmt in &case.body {
            self.analyze_stmt(stmt);
        }
        self.pop_scope();
    }
}
