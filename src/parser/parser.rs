//! Рекурсивный спуск по грамматике Noodle.
//!
//! Парсер не прерывается на первой ошибке: несоответствие ожиданиям
//! записывается как диагностика, после чего `synchronize` продвигает
//! поток до границы оператора и разбор продолжается.

use super::lexer::unescape_string;
use super::token::{Token, TokenKind};
use crate::ast::{
    BinaryOp, ElseBranch, Expr, FuncDef, GenericParam, MatchCase, Param, Program, Stmt, UnaryOp,
};
use crate::diagnostics::{Diagnostic, Phase, SourceLocation};

// Параметры stacker для глубоко вложенных выражений
const RED_ZONE: usize = 256 * 1024;
const STACK_PER_FRAME: usize = 8 * 1024 * 1024;

/// Парсер Noodle.
pub struct Parser {
    tokens: Vec<Token>,
    pub(super) pos: usize,
    pub(super) errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Parser {
    /// Создать парсер из потока токенов лексера.
    ///
    /// Переводы строк не значимы для грамматики и отбрасываются здесь;
    /// разделение операторов идёт по `;` и `}`.
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .collect();
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Разобрать программу целиком.
    ///
    /// Возвращает AST (возможно частичный) и накопленные диагностики.
    pub fn parse(mut self) -> (Program, Vec<Diagnostic>, Vec<Diagnostic>) {
        let location = self
            .tokens
            .first()
            .map(|t| t.location.clone())
            .unwrap_or_default();

        let mut statements = Vec::new();
        while !self.at_end() {
            let before = self.pos;
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize(before),
            }
        }

        (
            Program {
                statements,
                location,
            },
            self.errors,
            self.warnings,
        )
    }

    // === Навигация по потоку ===

    pub(super) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(super) fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    pub(super) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        token
    }

    pub(super) fn at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    /// Потребить токен, если он нужного типа.
    pub(super) fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Потребить токен нужного типа или записать ошибку.
    pub(super) fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            return Some(self.advance());
        }
        let found = self.current().clone();
        self.errors.push(Diagnostic::error(
            found.location,
            format!("Expected {}, got {}", kind, found.kind),
            Phase::Parsing,
        ));
        None
    }

    /// Записать ошибку в позиции текущего токена.
    pub(super) fn error_here(&mut self, message: impl Into<String>) {
        let location = self.current().location.clone();
        self.errors
            .push(Diagnostic::error(location, message, Phase::Parsing));
    }

    /// Восстановиться после ошибки: гарантированно продвинуться хотя бы
    /// на один токен, затем дойти до `;` (потребляется) или `}` (нет).
    fn synchronize(&mut self, before: usize) {
        if self.pos == before && !self.at_end() {
            self.advance();
        }
        while !self.at_end() {
            match self.current().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // === Операторы ===

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.current().kind {
            TokenKind::Let => self.parse_let(),
            TokenKind::Def => self.parse_func(false),
            TokenKind::Async => self.parse_async(),
            TokenKind::Class => self.parse_class(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(false),
            TokenKind::With => self.parse_with(false),
            TokenKind::Return => self.parse_return(),
            TokenKind::Yield => self.parse_yield(),
            TokenKind::Break => {
                let token = self.advance();
                self.expect(TokenKind::Semicolon)?;
                Some(Stmt::Break {
                    location: token.location,
                })
            }
            TokenKind::Continue => {
                let token = self.advance();
                self.expect(TokenKind::Semicolon)?;
                Some(Stmt::Continue {
                    location: token.location,
                })
            }
            TokenKind::Import => self.parse_import(),
            TokenKind::Match => {
                // match в позиции оператора: выражение без обязательной `;`
                let location = self.current().location.clone();
                let expr = self.parse_match_expr()?;
                self.matches(TokenKind::Semicolon);
                Some(Stmt::Expr { expr, location })
            }
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_let(&mut self) -> Option<Stmt> {
        let keyword = self.advance();
        let name = self.expect(TokenKind::Identifier)?;
        let declared_type = if self.matches(TokenKind::Colon) {
            Some(self.parse_type_string()?)
        } else {
            None
        };
        let value = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt::Let {
            name: name.lexeme,
            declared_type,
            value,
            location: keyword.location,
        })
    }

    /// `async def` / `async for` / `async with`.
    fn parse_async(&mut self) -> Option<Stmt> {
        self.advance();
        match self.current().kind {
            TokenKind::Def => self.parse_func(true),
            TokenKind::For => self.parse_for(true),
            TokenKind::With => self.parse_with(true),
            _ => {
                let found = self.current().kind;
                self.error_here(format!("Expected DEF, FOR or WITH after ASYNC, got {}", found));
                None
            }
        }
    }

    fn parse_func(&mut self, is_async: bool) -> Option<Stmt> {
        let keyword = self.advance(); // def
        let name = self.expect(TokenKind::Identifier)?;
        let generics = if self.check(TokenKind::Lt) {
            self.parse_generics()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        let return_type = if self.matches(TokenKind::Arrow) {
            Some(self.parse_type_string()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Some(Stmt::FuncDef(FuncDef {
            name: name.lexeme,
            generics,
            params,
            return_type,
            body,
            is_async,
            location: keyword.location,
        }))
    }

    /// Список параметров после `(`; закрывающая скобка потребляется.
    fn parse_params(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let name = self.expect(TokenKind::Identifier)?;
                let declared_type = if self.matches(TokenKind::Colon) {
                    Some(self.parse_type_string()?)
                } else {
                    None
                };
                params.push(Param {
                    name: name.lexeme,
                    declared_type,
                    location: name.location,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Some(params)
    }

    /// `<T, U: Bound, ...>` у заголовка функции или класса.
    fn parse_generics(&mut self) -> Option<Vec<GenericParam>> {
        self.expect(TokenKind::Lt)?;
        let mut generics = Vec::new();
        loop {
            let name = self.expect(TokenKind::Identifier)?;
            let bound = if self.matches(TokenKind::Colon) {
                Some(self.parse_type_string()?)
            } else {
                None
            };
            generics.push(GenericParam {
                name: name.lexeme,
                bound,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt)?;
        Some(generics)
    }

    /// Тип как отображаемая строка; вложенные `<...>` разбираются
    /// рекурсивно и конкатенируются: `Map<String, List<Int>>`.
    pub(super) fn parse_type_string(&mut self) -> Option<String> {
        let base = self.expect(TokenKind::Identifier)?;
        let mut display = base.lexeme;
        if self.matches(TokenKind::Lt) {
            let mut args = Vec::new();
            loop {
                args.push(self.parse_type_string()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt)?;
            display.push('<');
            display.push_str(&args.join(", "));
            display.push('>');
        }
        Some(display)
    }

    fn parse_class(&mut self) -> Option<Stmt> {
        let keyword = self.advance();
        let name = self.expect(TokenKind::Identifier)?;
        let generics = if self.check(TokenKind::Lt) {
            self.parse_generics()?
        } else {
            Vec::new()
        };
        let extends = if self.matches(TokenKind::Extends) {
            Some(self.expect(TokenKind::Identifier)?.lexeme)
        } else {
            None
        };
        let body = self.parse_block()?;
        Some(Stmt::ClassDef {
            name: name.lexeme,
            generics,
            extends,
            body,
            location: keyword.location,
        })
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let keyword = self.advance();
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches(TokenKind::Else) {
            if self.check(TokenKind::If) {
                Some(ElseBranch::ElseIf(Box::new(self.parse_if()?)))
            } else {
                Some(ElseBranch::Else(self.parse_block()?))
            }
        } else {
            None
        };
        Some(Stmt::If {
            condition,
            then_branch,
            else_branch,
            location: keyword.location,
        })
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let keyword = self.advance();
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Some(Stmt::While {
            condition,
            body,
            location: keyword.location,
        })
    }

    fn parse_for(&mut self, is_async: bool) -> Option<Stmt> {
        let keyword = self.advance();
        let variable = self.expect(TokenKind::Identifier)?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expression()?;
        let body = self.parse_block()?;
        Some(Stmt::For {
            variable: variable.lexeme,
            iterable,
            body,
            is_async,
            location: keyword.location,
        })
    }

    fn parse_with(&mut self, is_async: bool) -> Option<Stmt> {
        let keyword = self.advance();
        let target = self.parse_expression()?;
        let body = self.parse_block()?;
        Some(Stmt::With {
            target,
            body,
            is_async,
            location: keyword.location,
        })
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let keyword = self.advance();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt::Return {
            value,
            location: keyword.location,
        })
    }

    fn parse_yield(&mut self) -> Option<Stmt> {
        let keyword = self.advance();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt::Yield {
            value,
            location: keyword.location,
        })
    }

    fn parse_import(&mut self) -> Option<Stmt> {
        let keyword = self.advance();
        let module = match self.current().kind {
            TokenKind::String => string_value(&self.advance()),
            TokenKind::Identifier => self.advance().lexeme,
            found => {
                self.error_here(format!("Expected STRING, got {}", found));
                return None;
            }
        };
        let alias = if self.matches(TokenKind::As) {
            Some(self.expect(TokenKind::Identifier)?.lexeme)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt::Import {
            module,
            alias,
            location: keyword.location,
        })
    }

    fn parse_expr_statement(&mut self) -> Option<Stmt> {
        let location = self.current().location.clone();
        let expr = self.parse_expression()?;
        if !self.matches(TokenKind::Semicolon) {
            self.error_here("Expected ';' after expression");
            return None;
        }
        Some(Stmt::Expr { expr, location })
    }

    /// Блок `{ ... }`; операторы внутри восстанавливаются независимо.
    pub(super) fn parse_block(&mut self) -> Option<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let before = self.pos;
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => {
                    self.synchronize(before);
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(statements)
    }

    // === Выражения (приоритет от низкого к высокому) ===

    pub(super) fn parse_expression(&mut self) -> Option<Expr> {
        // Глубоко вложенные выражения растят стек по требованию
        stacker::maybe_grow(RED_ZONE, STACK_PER_FRAME, || self.parse_assignment())
    }

    /// Присваивание правоассоциативно; цель — только идентификатор.
    fn parse_assignment(&mut self) -> Option<Expr> {
        let expr = self.parse_logical_or()?;
        if self.check(TokenKind::Assign) {
            let assign = self.advance();
            let value = self.parse_expression()?;
            return match expr {
                Expr::Identifier { name, location } => Some(Expr::Assign {
                    target: name,
                    value: Box::new(value),
                    location,
                }),
                _ => {
                    self.errors.push(Diagnostic::error(
                        assign.location,
                        "Invalid assignment target",
                        Phase::Parsing,
                    ));
                    None
                }
            };
        }
        Some(expr)
    }

    fn parse_logical_or(&mut self) -> Option<Expr> {
        let mut expr = self.parse_logical_and()?;
        while self.check(TokenKind::OrOr) {
            let op_token = self.advance();
            let right = self.parse_logical_and()?;
            expr = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(expr),
                right: Box::new(right),
                location: op_token.location,
            };
        }
        Some(expr)
    }

    fn parse_logical_and(&mut self) -> Option<Expr> {
        let mut expr = self.parse_equality()?;
        while self.check(TokenKind::AndAnd) {
            let op_token = self.advance();
            let right = self.parse_equality()?;
            expr = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(expr),
                right: Box::new(right),
                location: op_token.location,
            };
        }
        Some(expr)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.parse_comparison()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                location: op_token.location,
            };
        }
        Some(expr)
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.parse_term()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                location: op_token.location,
            };
        }
        Some(expr)
    }

    fn parse_term(&mut self) -> Option<Expr> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.parse_factor()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                location: op_token.location,
            };
        }
        Some(expr)
    }

    fn parse_factor(&mut self) -> Option<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let op_token = self.advance();
            let right = self.parse_unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                location: op_token.location,
            };
        }
        Some(expr)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let op = match self.current().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        let op_token = self.advance();
        let operand = self.parse_unary()?;
        Some(Expr::Unary {
            op,
            operand: Box::new(operand),
            location: op_token.location,
        })
    }

    pub(super) fn parse_primary(&mut self) -> Option<Expr> {
        match self.current().kind {
            TokenKind::Number => {
                let token = self.advance();
                let value = token.lexeme.parse::<f64>().unwrap_or(0.0);
                Some(Expr::Number {
                    value,
                    location: token.location,
                })
            }
            TokenKind::String => {
                let token = self.advance();
                Some(Expr::String {
                    value: string_value(&token),
                    location: token.location,
                })
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance();
                Some(Expr::Bool {
                    value: token.kind == TokenKind::True,
                    location: token.location,
                })
            }
            TokenKind::None => {
                let token = self.advance();
                Some(Expr::None {
                    location: token.location,
                })
            }
            TokenKind::Identifier => {
                let token = self.advance();
                if self.check(TokenKind::LParen) {
                    self.parse_call(token)
                } else {
                    Some(Expr::Identifier {
                        name: token.lexeme,
                        location: token.location,
                    })
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Some(expr)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Await => {
                let token = self.advance();
                let operand = self.parse_primary()?;
                Some(Expr::Await {
                    operand: Box::new(operand),
                    location: token.location,
                })
            }
            TokenKind::Match => self.parse_match_expr(),
            found => {
                self.error_here(format!("Unexpected token: {}", found));
                None
            }
        }
    }

    fn parse_call(&mut self, callee: Token) -> Option<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Some(Expr::Call {
            callee: callee.lexeme,
            args,
            location: callee.location,
        })
    }

    fn parse_array_literal(&mut self) -> Option<Expr> {
        let open = self.advance();
        let mut elements = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket)?;
        Some(Expr::Array {
            elements,
            location: open.location,
        })
    }

    fn parse_object_literal(&mut self) -> Option<Expr> {
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
                let value = self.parse_expression()?;
                entries.push((key, value));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(Expr::Object {
            entries,
            location: open.location,
        })
    }

    /// `match <expr> { case <pattern>: <stmts> ... default: <stmts> }`.
    fn parse_match_expr(&mut self) -> Option<Expr> {
        let keyword = self.advance();
        let subject = self.parse_expression()?;
        self.expect(TokenKind::LBrace)?;

        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            if self.check(TokenKind::Case) {
                let case_token = self.advance();
                let pattern = self.parse_pattern()?;
                let guard = if self.matches(TokenKind::If) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.expect(TokenKind::Colon)?;
                let body = self.parse_case_body();
                cases.push(MatchCase {
                    pattern,
                    guard,
                    body,
                    location: case_token.location,
                });
            } else if self.check(TokenKind::Default) {
                self.advance();
                self.expect(TokenKind::Colon)?;
                default = Some(self.parse_case_body());
            } else {
                let found = self.current().kind;
                self.error_here(format!("Expected CASE, got {}", found));
                return None;
            }
        }
        self.expect(TokenKind::RBrace)?;

        Some(Expr::Match {
            subject: Box::new(subject),
            cases,
            default,
            location: keyword.location,
        })
    }

    /// Тело ветки: операторы до следующего `case`/`default`/`}`.
    fn parse_case_body(&mut self) -> Vec<Stmt> {
        let mut body = Vec::new();
        while !self.check(TokenKind::Case)
            && !self.check(TokenKind::Default)
            && !self.check(TokenKind::RBrace)
            && !self.at_end()
        {
            let before = self.pos;
            match self.parse_statement() {
                Some(stmt) => body.push(stmt),
                None => self.synchronize(before),
            }
        }
        body
    }

    // === Откат (используется только грамматикой паттернов) ===

    pub(super) fn save(&self) -> usize {
        self.pos
    }

    pub(super) fn rewind(&mut self, pos: usize) {
        self.pos = pos;
    }
}

/// Значение строкового литерала: лексема без кавычек, с раскрытыми escape.
///
/// Незакрытая строка хранит лексему без завершающей кавычки;
/// закрывающая отрезается только если она есть.
pub(super) fn string_value(token: &Token) -> String {
    let lexeme = token.lexeme.as_str();
    let quote = lexeme.chars().next().unwrap_or('"');
    let inner = &lexeme[quote.len_utf8()..];
    // Финальная кавычка закрывает строку только при чётном числе
    // обратных слэшей перед ней
    let terminated = inner.ends_with(quote) && {
        let body = &inner[..inner.len() - quote.len_utf8()];
        body.chars().rev().take_while(|c| *c == '\\').count() % 2 == 0
    };
    if terminated {
        unescape_string(&inner[..inner.len() - quote.len_utf8()])
    } else {
        unescape_string(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::Lexer;

    fn parse_source(source: &str) -> (Program, Vec<Diagnostic>) {
        let (tokens, lex_errors) = Lexer::new(source, "test.nc").tokenize();
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        let (program, errors, _) = Parser::new(tokens).parse();
        (program, errors)
    }

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        program
    }

    #[test]
    fn test_parse_let() {
        let program = parse_ok("let x: int = 1 + 2;");
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Stmt::Let {
                name,
                declared_type,
                value,
                ..
            } => {
                assert_eq!(name, "x");
                assert_eq!(declared_type.as_deref(), Some("int"));
                assert!(matches!(value, Some(Expr::Binary { .. })));
            }
            other => panic!("Expected let, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_precedence() {
        // 2 + 3 * 4 разбирается как 2 + (3 * 4)
        let program = parse_ok("let x = 2 + 3 * 4;");
        let value = match &program.statements[0] {
            Stmt::Let { value, .. } => value.as_ref().unwrap(),
            _ => panic!("Expected let"),
        };
        match value {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                right.as_ref(),
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("Expected add at top, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_func_with_generics() {
        let program = parse_ok("def max<T: Comparable>(a: T, b: T) -> T { return a; }");
        match &program.statements[0] {
            Stmt::FuncDef(def) => {
                assert_eq!(def.name, "max");
                assert_eq!(def.generics.len(), 1);
                assert_eq!(def.generics[0].to_string(), "T: Comparable");
                assert_eq!(def.params.len(), 2);
                assert_eq!(def.return_type.as_deref(), Some("T"));
                assert!(!def.is_async);
            }
            other => panic!("Expected func, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_generic_type() {
        let program = parse_ok("def f(m: Map<String, List<Int>>) { return; }");
        match &program.statements[0] {
            Stmt::FuncDef(def) => {
                assert_eq!(
                    def.params[0].declared_type.as_deref(),
                    Some("Map<String, List<Int>>")
                );
            }
            _ => panic!("Expected func"),
        }
    }

    #[test]
    fn test_parse_async_forms() {
        let program = parse_ok(
            "async def fetch(url) { let r = await get(url); async for x in r { yield x; } async with lock { return; } }",
        );
        let def = match &program.statements[0] {
            Stmt::FuncDef(def) => def,
            _ => panic!("Expected func"),
        };
        assert!(def.is_async);
        match &def.body[0] {
            Stmt::Let { value, .. } => {
                assert!(matches!(value, Some(Expr::Await { .. })))
            }
            _ => panic!("Expected let with await"),
        }
        assert!(matches!(def.body[1], Stmt::For { is_async: true, .. }));
        assert!(matches!(def.body[2], Stmt::With { is_async: true, .. }));
    }

    #[test]
    fn test_async_requires_def_for_or_with() {
        let (_, errors) = parse_source("async let x = 1;");
        assert!(!errors.is_empty());
        assert_eq!(
            errors[0].message,
            "Expected DEF, FOR or WITH after ASYNC, got LET"
        );
    }

    #[test]
    fn test_parse_if_else_chain() {
        let program = parse_ok("if a { x = 1; } else if b { x = 2; } else { x = 3; }");
        match &program.statements[0] {
            Stmt::If { else_branch, .. } => match else_branch {
                Some(ElseBranch::ElseIf(inner)) => match inner.as_ref() {
                    Stmt::If { else_branch, .. } => {
                        assert!(matches!(else_branch, Some(ElseBranch::Else(_))))
                    }
                    _ => panic!("Expected nested if"),
                },
                other => panic!("Expected else-if, got {:?}", other),
            },
            _ => panic!("Expected if"),
        }
    }

    #[test]
    fn test_parse_import_alias() {
        let program = parse_ok("import \"math\" as m;");
        match &program.statements[0] {
            Stmt::Import { module, alias, .. } => {
                assert_eq!(module, "math");
                assert_eq!(alias.as_deref(), Some("m"));
            }
            _ => panic!("Expected import"),
        }
    }

    #[test]
    fn test_parse_array_object_literals() {
        let program = parse_ok("let a = [1, 2, 3]; let o = {name: \"x\", size: 2};");
        match &program.statements[0] {
            Stmt::Let { value, .. } => match value.as_ref().unwrap() {
                Expr::Array { elements, .. } => assert_eq!(elements.len(), 3),
                _ => panic!("Expected array"),
            },
            _ => panic!("Expected let"),
        }
        match &program.statements[1] {
            Stmt::Let { value, .. } => match value.as_ref().unwrap() {
                Expr::Object { entries, .. } => {
                    assert_eq!(entries.len(), 2);
                    assert_eq!(entries[0].0, "name");
                }
                _ => panic!("Expected object"),
            },
            _ => panic!("Expected let"),
        }
    }

    #[test]
    fn test_missing_semicolon_message() {
        let (_, errors) = parse_source("print(x)");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Expected ';' after expression");
    }

    #[test]
    fn test_recovery_multiple_errors() {
        // Обе ошибки видны за один проход: восстановление по `;`
        let (program, errors) = parse_source("let = 1; let y = 2; let = 3;");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.message.starts_with("Expected")));
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn test_expected_got_message() {
        let (_, errors) = parse_source("let x 5;");
        assert!(!errors.is_empty());
        assert_eq!(errors[0].message, "Expected SEMICOLON, got NUMBER");
    }

    #[test]
    fn test_newlines_insignificant() {
        let program = parse_ok("let x =\n  1 +\n  2;\n");
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn test_string_value_unescaped() {
        let program = parse_ok("let s = \"a\\nb\";");
        match &program.statements[0] {
            Stmt::Let { value, .. } => match value.as_ref().unwrap() {
                Expr::String { value, .. } => assert_eq!(value, "a\nb"),
                _ => panic!("Expected string"),
            },
            _ => panic!("Expected let"),
        }
    }
}
