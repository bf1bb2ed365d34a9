//! Грамматика паттернов для match/case.
//!
//! Единственное место, где парсер откатывается: OR, AND, guard и
//! диапазон различаются через save/rewind по сохранённой позиции.
//! Остальная грамматика детерминирована на один токен вперёд.

use super::parser::{string_value, Parser};
use super::token::TokenKind;
use crate::ast::{LitValue, Pattern};

impl Parser {
    /// Точка входа грамматики паттернов: `case <pattern>`.
    pub(super) fn parse_pattern(&mut self) -> Option<Pattern> {
        self.parse_or_pattern()
    }

    /// `p1 | p2`. Правая часть может быть OR (правоассоциативность),
    /// левая разбирается без OR, чтобы не было левой рекурсии.
    fn parse_or_pattern(&mut self) -> Option<Pattern> {
        let saved = self.save();
        let left = self.parse_and_pattern()?;
        if !self.check(TokenKind::Pipe) {
            return Some(left);
        }
        // Откат и повторный разбор левой части уже как ветки OR
        self.rewind(saved);
        let left = self.parse_and_pattern()?;
        let op = self.advance(); // |
        let right = self.parse_or_pattern()?;
        Some(Pattern::Or {
            left: Box::new(left),
            right: Box::new(right),
            location: op.location,
        })
    }

    /// `p1 & p2`, тот же протокол save/rewind, что и у OR.
    fn parse_and_pattern(&mut self) -> Option<Pattern> {
        let saved = self.save();
        let left = self.parse_single_pattern()?;
        if !self.check(TokenKind::Ampersand) {
            return Some(left);
        }
        self.rewind(saved);
        let left = self.parse_single_pattern()?;
        let op = self.advance(); // &
        let right = self.parse_and_pattern()?;
        Some(Pattern::And {
            left: Box::new(left),
            right: Box::new(right),
            location: op.location,
        })
    }

    fn parse_single_pattern(&mut self) -> Option<Pattern> {
        match self.current().kind {
            TokenKind::Number => self.parse_number_pattern(),
            TokenKind::String => {
                let token = self.advance();
                Some(Pattern::Literal {
                    value: LitValue::String(string_value(&token)),
                    location: token.location,
                })
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance();
                Some(Pattern::Literal {
                    value: LitValue::Bool(token.kind == TokenKind::True),
                    location: token.location,
                })
            }
            TokenKind::None => {
                let token = self.advance();
                Some(Pattern::Literal {
                    value: LitValue::None,
                    location: token.location,
                })
            }
            TokenKind::Identifier => self.parse_identifier_pattern(),
            TokenKind::LParen => self.parse_tuple_pattern(),
            TokenKind::LBracket => self.parse_array_pattern(),
            TokenKind::LBrace => self.parse_object_pattern(),
            found => {
                self.error_here(format!("Unexpected token in pattern: {}", found));
                None
            }
        }
    }

    /// Число: либо литерал, либо диапазон `start..end` из двух
    /// последовательных числовых токенов. Разделитель — токен `..`
    /// или два соседних `.` подряд.
    fn parse_number_pattern(&mut self) -> Option<Pattern> {
        let start_token = self.advance();
        let start = start_token.lexeme.parse::<f64>().unwrap_or(0.0);

        let saved = self.save();
        if self.matches(TokenKind::Range)
            || (self.check(TokenKind::Dot) && self.peek().kind == TokenKind::Dot && {
                self.advance();
                self.advance();
                true
            })
        {
            if self.check(TokenKind::Number) {
                let end_token = self.advance();
                let end = end_token.lexeme.parse::<f64>().unwrap_or(0.0);
                return Some(Pattern::Range {
                    start,
                    end,
                    location: start_token.location,
                });
            }
            // Не диапазон: откат к позиции сразу после числа
            self.rewind(saved);
        }

        Some(Pattern::Literal {
            value: LitValue::Number(start),
            location: start_token.location,
        })
    }

    /// Идентификатор ветвится на три формы:
    /// `Тип имя` (тип-паттерн), `имя if условие` (guard), `имя`.
    /// Тип-паттерн пробуется первым; guard ограничен паттерном-идентификатором.
    fn parse_identifier_pattern(&mut self) -> Option<Pattern> {
        let saved = self.save();
        let first = self.advance();

        if first.lexeme == "_" {
            return Some(Pattern::Wildcard {
                location: first.location,
            });
        }

        if self.check(TokenKind::Identifier) {
            let binding = self.advance();
            return Some(Pattern::Type {
                type_name: first.lexeme,
                binding: binding.lexeme,
                location: first.location,
            });
        }

        if self.check(TokenKind::If) {
            // `имя if условие`: при неудаче разбора условия откатываемся
            // к идентификатору, чтобы внешняя грамматика увидела ошибку
            let if_token = self.advance();
            match self.parse_expression() {
                Some(condition) => {
                    return Some(Pattern::Guard {
                        pattern: Box::new(Pattern::Identifier {
                            name: first.lexeme,
                            location: first.location,
                        }),
                        condition,
                        location: if_token.location,
                    });
                }
                None => self.rewind(saved + 1),
            }
        }

        Some(Pattern::Identifier {
            name: first.lexeme,
            location: first.location,
        })
    }

    fn parse_tuple_pattern(&mut self) -> Option<Pattern> {
        let open = self.advance();
        let mut elements = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                elements.push(self.parse_pattern()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Some(Pattern::Tuple {
            elements,
            location: open.location,
        })
    }

    fn parse_array_pattern(&mut self) -> Option<Pattern> {
        let open = self.advance();
        let mut elements = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                elements.push(self.parse_pattern()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket)?;
        Some(Pattern::Array {
            elements,
            location: open.location,
        })
    }

    fn parse_object_pattern(&mut self) -> Option<Pattern> {
        let open = self.advance();
        let mut entries = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = match self.current().kind {
                    TokenKind::Identifier => self.advance().lexeme,
                    TokenKind::String => string_value(&self.advance()),
                    found => {
                        self.error_here(format!("Expected IDENTIFIER, got {}", found));
                        return None;
                    }
                };
                self.expect(TokenKind::Colon)?;
                let value = self.parse_pattern()?;
                entries.push((key, value));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(Pattern::Object {
            entries,
            location: open.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Stmt};
    use crate::parser::lexer::Lexer;

    /// Разобрать единственный `case`-паттерн из матча по subject `x`.
    fn parse_case_pattern(pattern_src: &str) -> Pattern {
        let source = format!("match x {{ case {}: return; }}", pattern_src);
        let (tokens, lex_errors) = Lexer::new(&source, "test.nc").tokenize();
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        let (program, errors, _) = Parser::new(tokens).parse();
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        match &program.statements[0] {
            Stmt::Expr {
                expr: Expr::Match { cases, .. },
                ..
            } => cases[0].pattern.clone(),
            other => panic!("Expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_wildcard_and_literals() {
        assert!(matches!(parse_case_pattern("_"), Pattern::Wildcard { .. }));
        assert!(matches!(
            parse_case_pattern("42"),
            Pattern::Literal {
                value: LitValue::Number(n),
                ..
            } if n == 42.0
        ));
        assert!(matches!(
            parse_case_pattern("none"),
            Pattern::Literal {
                value: LitValue::None,
                ..
            }
        ));
    }

    #[test]
    fn test_or_pattern_right_assoc() {
        // 1 | 2 | 3 => Or(1, Or(2, 3))
        match parse_case_pattern("1 | 2 | 3") {
            Pattern::Or { left, right, .. } => {
                assert!(matches!(*left, Pattern::Literal { .. }));
                assert!(matches!(*right, Pattern::Or { .. }));
            }
            other => panic!("Expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_and_pattern() {
        match parse_case_pattern("Int n & x") {
            Pattern::And { left, right, .. } => {
                assert!(matches!(*left, Pattern::Type { .. }));
                assert!(matches!(*right, Pattern::Identifier { .. }));
            }
            other => panic!("Expected and, got {:?}", other),
        }
    }

    #[test]
    fn test_type_pattern() {
        match parse_case_pattern("Int n") {
            Pattern::Type {
                type_name, binding, ..
            } => {
                assert_eq!(type_name, "Int");
                assert_eq!(binding, "n");
            }
            other => panic!("Expected type pattern, got {:?}", other),
        }
    }

    #[test]
    fn test_guard_pattern() {
        match parse_case_pattern("n if n > 0") {
            Pattern::Guard {
                pattern, condition, ..
            } => {
                assert!(matches!(*pattern, Pattern::Identifier { ref name, .. } if name == "n"));
                assert!(matches!(condition, Expr::Binary { .. }));
            }
            other => panic!("Expected guard, got {:?}", other),
        }
    }

    #[test]
    fn test_range_pattern() {
        match parse_case_pattern("1..10") {
            Pattern::Range { start, end, .. } => {
                assert_eq!(start, 1.0);
                assert_eq!(end, 10.0);
            }
            other => panic!("Expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_composite_patterns() {
        match parse_case_pattern("(1, x, _)") {
            Pattern::Tuple { elements, .. } => assert_eq!(elements.len(), 3),
            other => panic!("Expected tuple, got {:?}", other),
        }
        match parse_case_pattern("[a, b]") {
            Pattern::Array { elements, .. } => assert_eq!(elements.len(), 2),
            other => panic!("Expected array, got {:?}", other),
        }
        match parse_case_pattern("{kind: k, value: 1}") {
            Pattern::Object { entries, .. } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].0, "kind");
            }
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_match_with_default() {
        let source = "match v { case 1: return; case _: break; default: continue; }";
        let (tokens, _) = Lexer::new(source, "test.nc").tokenize();
        let (program, errors, _) = Parser::new(tokens).parse();
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        match &program.statements[0] {
            Stmt::Expr {
                expr: Expr::Match { cases, default, .. },
                ..
            } => {
                assert_eq!(cases.len(), 2);
                assert!(default.is_some());
            }
            other => panic!("Expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_pattern_message() {
        let source = "match x { case +: return; }";
        let (tokens, _) = Lexer::new(source, "test.nc").tokenize();
        let (_, errors, _) = Parser::new(tokens).parse();
        assert!(errors
            .iter()
            .any(|e| e.message == "Unexpected token in pattern: PLUS"));
    }
}
