//! Свёртка констант: чистое пост-порядковое переписывание AST.
//!
//! Дети сворачиваются раньше родителей, поэтому одного прохода
//! достаточно: `2 + 3 * 4` схлопывается в `14` за один вызов.

use crate::ast::{BinaryOp, ElseBranch, Expr, MatchCase, Program, Stmt, UnaryOp};

/// Оптимизатор AST.
pub struct Optimizer {
    optimizations: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    pub fn new() -> Self {
        Self { optimizations: 0 }
    }

    /// Переписать программу; вернуть её и число выполненных свёрток.
    pub fn optimize(mut self, program: Program) -> (Program, usize) {
        let statements = program
            .statements
            .into_iter()
            .map(|stmt| self.fold_stmt(stmt))
            .collect();
        (
            Program {
                statements,
                location: program.location,
            },
            self.optimizations,
        )
    }

    fn fold_body(&mut self, body: Vec<Stmt>) -> Vec<Stmt> {
        body.into_iter().map(|stmt| self.fold_stmt(stmt)).collect()
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::Let {
                name,
                declared_type,
                value,
                location,
            } => Stmt::Let {
                name,
                declared_type,
                value: value.map(|v| self.fold_expr(v)),
                location,
            },
            Stmt::FuncDef(mut def) => {
                def.body = self.fold_body(def.body);
                Stmt::FuncDef(def)
            }
            Stmt::ClassDef {
                name,
                generics,
                extends,
                body,
                location,
            } => Stmt::ClassDef {
                name,
                generics,
                extends,
                body: self.fold_body(body),
                location,
            },
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                location,
            } => Stmt::If {
                condition: self.fold_expr(condition),
                then_branch: self.fold_body(then_branch),
                else_branch: else_branch.map(|branch| match branch {
                    ElseBranch::ElseIf(stmt) => {
                        ElseBranch::ElseIf(Box::new(self.fold_stmt(*stmt)))
                    }
                    ElseBranch::Else(body) => ElseBranch::Else(self.fold_body(body)),
                }),
                location,
            },
            Stmt::While {
                condition,
                body,
                location,
            } => Stmt::While {
                condition: self.fold_expr(condition),
                body: self.fold_body(body),
                location,
            },
            Stmt::For {
                variable,
                iterable,
                body,
                is_async,
                location,
            } => Stmt::For {
                variable,
                iterable: self.fold_expr(iterable),
                body: self.fold_body(body),
                is_async,
                location,
            },
            Stmt::With {
                target,
                body,
                is_async,
                location,
            } => Stmt::With {
                target: self.fold_expr(target),
                body: self.fold_body(body),
                is_async,
                location,
            },
            Stmt::Return { value, location } => Stmt::Return {
                value: value.map(|v| self.fold_expr(v)),
                location,
            },
            Stmt::Yield { value, location } => Stmt::Yield {
                value: value.map(|v| self.fold_expr(v)),
                location,
            },
            Stmt::Expr { expr, location } => Stmt::Expr {
                expr: self.fold_expr(expr),
                location,
            },
            other @ (Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Import { .. }) => other,
        }
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Binary {
                op,
                left,
                right,
                location,
            } => {
                let left = self.fold_expr(*left);
                let right = self.fold_expr(*right);
                if let Some(folded) = fold_binary(op, &left, &right, &location) {
                    self.optimizations += 1;
                    return folded;
                }
                Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    location,
                }
            }
            Expr::Unary {
                op,
                operand,
                location,
            } => {
                let operand = self.fold_expr(*operand);
                match (op, &operand) {
                    (UnaryOp::Neg, Expr::Number { value, .. }) => {
                        self.optimizations += 1;
                        Expr::Number {
                            value: -value,
                            location,
                        }
                    }
                    (UnaryOp::Not, Expr::Bool { value, .. }) => {
                        self.optimizations += 1;
                        Expr::Bool {
                            value: !value,
                            location,
                        }
                    }
                    _ => Expr::Unary {
                        op,
                        operand: Box::new(operand),
                        location,
                    },
                }
            }
            Expr::Assign {
                target,
                value,
                location,
            } => Expr::Assign {
                target,
                value: Box::new(self.fold_expr(*value)),
                location,
            },
            Expr::Call {
                callee,
                args,
                location,
            } => Expr::Call {
                callee,
                args: args.into_iter().map(|a| self.fold_expr(a)).collect(),
                location,
            },
            Expr::Array { elements, location } => Expr::Array {
                elements: elements.into_iter().map(|e| self.fold_expr(e)).collect(),
                location,
            },
            Expr::Object { entries, location } => Expr::Object {
                entries: entries
                    .into_iter()
                    .map(|(k, v)| (k, self.fold_expr(v)))
                    .collect(),
                location,
            },
            Expr::Await { operand, location } => Expr::Await {
                operand: Box::new(self.fold_expr(*operand)),
                location,
            },
            Expr::Match {
                subject,
                cases,
                default,
                location,
            } => Expr::Match {
                subject: Box::new(self.fold_expr(*subject)),
                cases: cases
                    .into_iter()
                    .map(|case| MatchCase {
                        pattern: case.pattern,
                        guard: case.guard.map(|g| self.fold_expr(g)),
                        body: self.fold_body(case.body),
                        location: case.location,
                    })
                    .collect(),
                default: default.map(|body| self.fold_body(body)),
                location,
            },
            literal => literal,
        }
    }
}

/// Свернуть бинарный узел с двумя литеральными детьми.
///
/// Деление на литеральный ноль намеренно не сворачивается: узел
/// доживает до рантайма. `%` тоже не входит в таблицу свёрток.
fn fold_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    location: &crate::diagnostics::SourceLocation,
) -> Option<Expr> {
    let location = location.clone();
    match (left, right) {
        (Expr::Number { value: a, .. }, Expr::Number { value: b, .. }) => {
            let number = |value: f64| Some(Expr::Number { value, location: location.clone() });
            let boolean = |value: bool| Some(Expr::Bool { value, location: location.clone() });
            match op {
                BinaryOp::Add => number(a + b),
                BinaryOp::Sub => number(a - b),
                BinaryOp::Mul => number(a * b),
                BinaryOp::Div if *b != 0.0 => number(a / b),
                BinaryOp::Div => None,
                BinaryOp::Eq => boolean(a == b),
                BinaryOp::Ne => boolean(a != b),
                BinaryOp::Lt => boolean(a < b),
                BinaryOp::Gt => boolean(a > b),
                BinaryOp::Le => boolean(a <= b),
                BinaryOp::Ge => boolean(a >= b),
                _ => None,
            }
        }
        (Expr::Bool { value: a, .. }, Expr::Bool { value: b, .. }) => {
            let value = match op {
                BinaryOp::And => *a && *b,
                BinaryOp::Or => *a || *b,
                BinaryOp::Eq => a == b,
                BinaryOp::Ne => a != b,
                _ => return None,
            };
            Some(Expr::Bool { value, location })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Lexer, Parser};

    fn optimize_source(source: &str) -> (Program, usize) {
        let (tokens, _) = Lexer::new(source, "test.nc").tokenize();
        let (program, errors, _) = Parser::new(tokens).parse();
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        Optimizer::new().optimize(program)
    }

    fn let_value(program: &Program) -> &Expr {
        match &program.statements[0] {
            Stmt::Let { value, .. } => value.as_ref().unwrap(),
            other => panic!("Expected let, got {:?}", other),
        }
    }

    #[test]
    fn test_fold_arithmetic_chain() {
        // 2 + 3 * 4 => 14, ровно две свёртки
        let (program, count) = optimize_source("let x = 2 + 3 * 4;");
        assert_eq!(count, 2);
        match let_value(&program) {
            Expr::Number { value, .. } => assert_eq!(*value, 14.0),
            other => panic!("Expected folded number, got {:?}", other),
        }
    }

    #[test]
    fn test_division_by_zero_survives() {
        let (program, count) = optimize_source("let x = 1 / 0;");
        assert_eq!(count, 0);
        match let_value(&program) {
            Expr::Binary {
                op: BinaryOp::Div,
                left,
                right,
                ..
            } => {
                assert!(matches!(left.as_ref(), Expr::Number { value, .. } if *value == 1.0));
                assert!(matches!(right.as_ref(), Expr::Number { value, .. } if *value == 0.0));
            }
            other => panic!("Expected surviving div, got {:?}", other),
        }
    }

    #[test]
    fn test_modulo_not_folded() {
        let (_, count) = optimize_source("let x = 10 % 3;");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_fold_comparison_to_bool() {
        let (program, count) = optimize_source("let x = 2 < 3;");
        assert_eq!(count, 1);
        assert!(matches!(
            let_value(&program),
            Expr::Bool { value: true, .. }
        ));
    }

    #[test]
    fn test_fold_boolean_ops() {
        let (program, count) = optimize_source("let x = true && false || true;");
        assert_eq!(count, 2);
        assert!(matches!(
            let_value(&program),
            Expr::Bool { value: true, .. }
        ));
    }

    #[test]
    fn test_fold_unary() {
        let (program, count) = optimize_source("let x = -5; let y = !true;");
        assert_eq!(count, 2);
        match let_value(&program) {
            Expr::Number { value, .. } => assert_eq!(*value, -5.0),
            other => panic!("Expected folded number, got {:?}", other),
        }
    }

    #[test]
    fn test_non_literal_operand_survives() {
        let (program, count) = optimize_source("let x = y + 1;");
        assert_eq!(count, 0);
        assert!(matches!(let_value(&program), Expr::Binary { .. }));
    }

    #[test]
    fn test_folds_inside_bodies() {
        let (_, count) =
            optimize_source("def f() { if 1 < 2 { return 2 * 3; } while x { yield 4 + 4; } }");
        assert_eq!(count, 3);
    }
}
