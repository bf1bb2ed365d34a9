//! AST языка Noodle.
//!
//! Дерево построено на исчерпывающих тегированных enum: по варианту на
//! вид узла, каждый вариант несёт только свои поля и [`SourceLocation`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::SourceLocation;

/// Корень дерева: список операторов верхнего уровня.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub location: SourceLocation,
}

impl Program {
    /// Общее число узлов дерева (для статистики компиляции).
    pub fn node_count(&self) -> usize {
        1 + self.statements.iter().map(Stmt::node_count).sum::<usize>()
    }
}

/// Параметр функции.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub declared_type: Option<String>,
    pub location: SourceLocation,
}

/// Параметр-дженерик: `T` или `T: Bound`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericParam {
    pub name: String,
    pub bound: Option<String>,
}

impl fmt::Display for GenericParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bound {
            Some(bound) => write!(f, "{}: {}", self.name, bound),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Определение функции (включая async и дженерики).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDef {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub location: SourceLocation,
}

/// Ветка `else` условного оператора: либо `else if`, либо блок.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElseBranch {
    ElseIf(Box<Stmt>),
    Else(Vec<Stmt>),
}

/// Оператор.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let {
        name: String,
        declared_type: Option<String>,
        value: Option<Expr>,
        location: SourceLocation,
    },
    FuncDef(FuncDef),
    ClassDef {
        name: String,
        generics: Vec<GenericParam>,
        extends: Option<String>,
        body: Vec<Stmt>,
        location: SourceLocation,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<ElseBranch>,
        location: SourceLocation,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        location: SourceLocation,
    },
    For {
        variable: String,
        iterable: Expr,
        body: Vec<Stmt>,
        is_async: bool,
        location: SourceLocation,
    },
    With {
        target: Expr,
        body: Vec<Stmt>,
        is_async: bool,
        location: SourceLocation,
    },
    Return {
        value: Option<Expr>,
        location: SourceLocation,
    },
    Yield {
        value: Option<Expr>,
        location: SourceLocation,
    },
    Break {
        location: SourceLocation,
    },
    Continue {
        location: SourceLocation,
    },
    Import {
        module: String,
        alias: Option<String>,
        location: SourceLocation,
    },
    Expr {
        expr: Expr,
        location: SourceLocation,
    },
}

impl Stmt {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Stmt::Let { location, .. }
            | Stmt::ClassDef { location, .. }
            | Stmt::If { location, .. }
            | Stmt::While { location, .. }
            | Stmt::For { location, .. }
            | Stmt::With { location, .. }
            | Stmt::Return { location, .. }
            | Stmt::Yield { location, .. }
            | Stmt::Break { location }
            | Stmt::Continue { location }
            | Stmt::Import { location, .. }
            | Stmt::Expr { location, .. } => location,
            Stmt::FuncDef(def) => &def.location,
        }
    }

    pub fn node_count(&self) -> usize {
        let children = match self {
            Stmt::Let { value, .. } => value.as_ref().map_or(0, Expr::node_count),
            Stmt::FuncDef(def) => def.body.iter().map(Stmt::node_count).sum(),
            Stmt::ClassDef { body, .. } => body.iter().map(Stmt::node_count).sum(),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let else_nodes = match else_branch {
                    Some(ElseBranch::ElseIf(stmt)) => stmt.node_count(),
                    Some(ElseBranch::Else(body)) => body.iter().map(Stmt::node_count).sum(),
                    None => 0,
                };
                condition.node_count()
                    + then_branch.iter().map(Stmt::node_count).sum::<usize>()
                    + else_nodes
            }
            Stmt::While {
                condition, body, ..
            } => condition.node_count() + body.iter().map(Stmt::node_count).sum::<usize>(),
            Stmt::For {
                iterable, body, ..
            } => iterable.node_count() + body.iter().map(Stmt::node_count).sum::<usize>(),
            Stmt::With { target, body, .. } => {
                target.node_count() + body.iter().map(Stmt::node_count).sum::<usize>()
            }
            Stmt::Return { value, .. } | Stmt::Yield { value, .. } => {
                value.as_ref().map_or(0, Expr::node_count)
            }
            Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Import { .. } => 0,
            Stmt::Expr { expr, .. } => expr.node_count(),
        };
        1 + children
    }
}

/// Бинарный оператор.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", s)
    }
}

/// Унарный оператор.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Выражение.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number {
        value: f64,
        location: SourceLocation,
    },
    String {
        value: String,
        location: SourceLocation,
    },
    Bool {
        value: bool,
        location: SourceLocation,
    },
    None {
        location: SourceLocation,
    },
    Identifier {
        name: String,
        location: SourceLocation,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        location: SourceLocation,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        location: SourceLocation,
    },
    Assign {
        target: String,
        value: Box<Expr>,
        location: SourceLocation,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
        location: SourceLocation,
    },
    Array {
        elements: Vec<Expr>,
        location: SourceLocation,
    },
    Object {
        entries: Vec<(String, Expr)>,
        location: SourceLocation,
    },
    Await {
        operand: Box<Expr>,
        location: SourceLocation,
    },
    Match {
        subject: Box<Expr>,
        cases: Vec<MatchCase>,
        default: Option<Vec<Stmt>>,
        location: SourceLocation,
    },
}

impl Expr {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Expr::Number { location, .. }
            | Expr::String { location, .. }
            | Expr::Bool { location, .. }
            | Expr::None { location }
            | Expr::Identifier { location, .. }
            | Expr::Binary { location, .. }
            | Expr::Unary { location, .. }
            | Expr::Assign { location, .. }
            | Expr::Call { location, .. }
            | Expr::Array { location, .. }
            | Expr::Object { location, .. }
            | Expr::Await { location, .. }
            | Expr::Match { location, .. } => location,
        }
    }

    /// Является ли выражение литералом (кандидат на свёртку констант).
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Number { .. } | Expr::String { .. } | Expr::Bool { .. } | Expr::None { .. }
        )
    }

    pub fn node_count(&self) -> usize {
        let children = match self {
            Expr::Number { .. }
            | Expr::String { .. }
            | Expr::Bool { .. }
            | Expr::None { .. }
            | Expr::Identifier { .. } => 0,
            Expr::Binary { left, right, .. } => left.node_count() + right.node_count(),
            Expr::Unary { operand, .. } | Expr::Await { operand, .. } => operand.node_count(),
            Expr::Assign { value, .. } => value.node_count(),
            Expr::Call { args, .. } => args.iter().map(Expr::node_count).sum(),
            Expr::Array { elements, .. } => elements.iter().map(Expr::node_count).sum(),
            Expr::Object { entries, .. } => entries.iter().map(|(_, v)| v.node_count()).sum(),
            Expr::Match {
                subject,
                cases,
                default,
                ..
            } => {
                subject.node_count()
                    + cases.iter().map(MatchCase::node_count).sum::<usize>()
                    + default
                        .as_ref()
                        .map_or(0, |body| body.iter().map(Stmt::node_count).sum())
            }
        };
        1 + children
    }
}

/// Ветка `case` в match-выражении.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
    pub location: SourceLocation,
}

impl MatchCase {
    pub fn node_count(&self) -> usize {
        1 + self.pattern.node_count()
            + self.guard.as_ref().map_or(0, Expr::node_count)
            + self.body.iter().map(Stmt::node_count).sum::<usize>()
    }
}

/// Литеральное значение внутри паттерна.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LitValue {
    Number(f64),
    String(String),
    Bool(bool),
    None,
}

/// Паттерн ветки `case`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// `_` — совпадает со всем.
    Wildcard { location: SourceLocation },
    /// Литерал: число, строка, булево, none.
    Literal {
        value: LitValue,
        location: SourceLocation,
    },
    /// Идентификатор — связывает значение с именем.
    Identifier {
        name: String,
        location: SourceLocation,
    },
    /// `Тип имя` — проверка типа со связыванием.
    Type {
        type_name: String,
        binding: String,
        location: SourceLocation,
    },
    /// `(p1, p2, ...)`.
    Tuple {
        elements: Vec<Pattern>,
        location: SourceLocation,
    },
    /// `[p1, p2, ...]`.
    Array {
        elements: Vec<Pattern>,
        location: SourceLocation,
    },
    /// `{key: p, ...}`.
    Object {
        entries: Vec<(String, Pattern)>,
        location: SourceLocation,
    },
    /// `p1 | p2` (правая часть может быть OR, левая — нет).
    Or {
        left: Box<Pattern>,
        right: Box<Pattern>,
        location: SourceLocation,
    },
    /// `p1 & p2`.
    And {
        left: Box<Pattern>,
        right: Box<Pattern>,
        location: SourceLocation,
    },
    /// `имя if условие`.
    Guard {
        pattern: Box<Pattern>,
        condition: Expr,
        location: SourceLocation,
    },
    /// `start..end` — диапазон двух числовых литералов.
    Range {
        start: f64,
        end: f64,
        location: SourceLocation,
    },
}

impl Pattern {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Pattern::Wildcard { location }
            | Pattern::Literal { location, .. }
            | Pattern::Identifier { location, .. }
            | Pattern::Type { location, .. }
            | Pattern::Tuple { location, .. }
            | Pattern::Array { location, .. }
            | Pattern::Object { location, .. }
            | Pattern::Or { location, .. }
            | Pattern::And { location, .. }
            | Pattern::Guard { location, .. }
            | Pattern::Range { location, .. } => location,
        }
    }

    /// Имена, которые паттерн связывает при совпадении.
    pub fn bindings(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_bindings(&mut names);
        names
    }

    fn collect_bindings<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Pattern::Identifier { name, .. } => names.push(name),
            Pattern::Type { binding, .. } => names.push(binding),
            Pattern::Tuple { elements, .. } | Pattern::Array { elements, .. } => {
                for p in elements {
                    p.collect_bindings(names);
                }
            }
            Pattern::Object { entries, .. } => {
                for (_, p) in entries {
                    p.collect_bindings(names);
                }
            }
            Pattern::Or { left, right, .. } | Pattern::And { left, right, .. } => {
                left.collect_bindings(names);
                right.collect_bindings(names);
            }
            Pattern::Guard { pattern, .. } => pattern.collect_bindings(names),
            Pattern::Wildcard { .. } | Pattern::Literal { .. } | Pattern::Range { .. } => {}
        }
    }

    pub fn node_count(&self) -> usize {
        let children = match self {
            Pattern::Wildcard { .. }
            | Pattern::Literal { .. }
            | Pattern::Identifier { .. }
            | Pattern::Type { .. }
            | Pattern::Range { .. } => 0,
            Pattern::Tuple { elements, .. } | Pattern::Array { elements, .. } => {
                elements.iter().map(Pattern::node_count).sum()
            }
            Pattern::Object { entries, .. } => {
                entries.iter().map(|(_, p)| p.node_count()).sum()
            }
            Pattern::Or { left, right, .. } | Pattern::And { left, right, .. } => {
                left.node_count() + right.node_count()
            }
            Pattern::Guard {
                pattern, condition, ..
            } => pattern.node_count() + condition.node_count(),
        };
        1 + children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::default()
    }

    #[test]
    fn test_node_count() {
        // let x = 1 + 2;  => Let + Binary + Number + Number = 4, плюс Program = 5
        let program = Program {
            statements: vec![Stmt::Let {
                name: "x".into(),
                declared_type: None,
                value: Some(Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(Expr::Number {
                        value: 1.0,
                        location: loc(),
                    }),
                    right: Box::new(Expr::Number {
                        value: 2.0,
                        location: loc(),
                    }),
                    location: loc(),
                }),
                location: loc(),
            }],
            location: loc(),
        };
        assert_eq!(program.node_count(), 5);
    }

    #[test]
    fn test_pattern_bindings() {
        let pattern = Pattern::Or {
            left: Box::new(Pattern::Type {
                type_name: "Int".into(),
                binding: "n".into(),
                location: loc(),
            }),
            right: Box::new(Pattern::Tuple {
                elements: vec![
                    Pattern::Identifier {
                        name: "a".into(),
                        location: loc(),
                    },
                    Pattern::Wildcard { location: loc() },
                ],
                location: loc(),
            }),
            location: loc(),
        };
        assert_eq!(pattern.bindings(), vec!["n", "a"]);
    }

    #[test]
    fn test_generic_param_display() {
        let plain = GenericParam {
            name: "T".into(),
            bound: None,
        };
        let bounded = GenericParam {
            name: "U".into(),
            bound: Some("Comparable".into()),
        };
        assert_eq!(plain.to_string(), "T");
        assert_eq!(bounded.to_string(), "U: Comparable");
    }
}
