//! Генерация байткода NBC из оптимизированного AST.
//!
//! Стековая модель: каждое выражение оставляет на стеке ровно одно
//! значение, операторы выполняются только ради побочных эффектов.
//! Метки символьные, со сквозным счётчиком на компиляцию; их
//! разрешение в смещения — забота внешнего линкера.

use crate::ast::{
    BinaryOp, ElseBranch, Expr, FuncDef, LitValue, MatchCase, Pattern, Program, Stmt, UnaryOp,
};
use crate::bytecode::{Bytecode, Constant, Instruction, Opcode, Operand};
use crate::diagnostics::SourceLocation;
use crate::error::CodeGenError;

/// Генератор кода.
pub struct CodeGenerator {
    bytecode: Bytecode,
    next_label: u32,
    next_temp: u32,
    /// (метка начала, метка конца) объемлющих циклов для break/continue.
    loop_stack: Vec<(u32, u32)>,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self {
            bytecode: Bytecode::new(),
            next_label: 0,
            next_temp: 0,
            loop_stack: Vec::new(),
        }
    }

    /// Сгенерировать модуль байткода для программы.
    pub fn generate(mut self, program: &Program) -> Result<Bytecode, CodeGenError> {
        for stmt in &program.statements {
            self.gen_stmt(stmt);
        }
        self.bytecode.verify_labels()?;
        Ok(self.bytecode)
    }

    // === Примитивы эмиссии ===

    fn emit(&mut self, opcode: Opcode, operand: Operand, location: &SourceLocation) {
        self.bytecode
            .push(Instruction::new(opcode, operand, location.clone()));
    }

    fn fresh_label(&mut self) -> u32 {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    fn fresh_temp(&mut self) -> String {
        let id = self.next_temp;
        self.next_temp += 1;
        format!("$match{}", id)
    }

    fn emit_label(&mut self, id: u32, location: &SourceLocation) {
        self.emit(Opcode::Label, Operand::Label(id), location);
    }

    fn load_const(&mut self, constant: Constant, location: &SourceLocation) {
        let index = self.bytecode.constants.intern(constant);
        self.emit(Opcode::LoadConst, Operand::Const(index), location);
    }

    fn load_none(&mut self, location: &SourceLocation) {
        self.load_const(Constant::None, location);
    }

    // === Операторы ===

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let {
                name,
                value,
                location,
                ..
            } => {
                match value {
                    Some(value) => self.gen_expr(value),
                    // let без инициализатора хранит none
                    None => self.load_none(location),
                }
                self.emit(Opcode::StoreVar, Operand::Name(name.clone()), location);
            }
            Stmt::FuncDef(def) => self.gen_func(def),
            Stmt::ClassDef {
                name,
                body,
                location,
                ..
            } => {
                self.emit(Opcode::ClassStart, Operand::Name(name.clone()), location);
                for member in body {
                    self.gen_stmt(member);
                }
                self.emit(Opcode::ClassEnd, Operand::None, location);
            }
            Stmt::If { .. } => {
                // Все ветки цепочки if/else-if делят одну конечную метку
                let end = self.fresh_label();
                self.gen_if_chain(stmt, end);
                self.emit_label(end, stmt.location());
            }
            Stmt::While {
                condition,
                body,
                location,
            } => {
                let start = self.fresh_label();
                let end = self.fresh_label();
                self.emit_label(start, location);
                self.gen_expr(condition);
                self.emit(Opcode::JumpIfFalse, Operand::Label(end), location);
                self.loop_stack.push((start, end));
                for stmt in body {
                    self.gen_stmt(stmt);
                }
                self.loop_stack.pop();
                self.emit(Opcode::Jump, Operand::Label(start), location);
                self.emit_label(end, location);
            }
            Stmt::For {
                variable,
                iterable,
                body,
                is_async,
                location,
            } => {
                self.gen_expr(iterable);
                self.emit(Opcode::IteratorInit, Operand::None, location);
                let start = self.fresh_label();
                let end = self.fresh_label();
                self.emit_label(start, location);
                self.emit(Opcode::IteratorHasNext, Operand::None, location);
                self.emit(Opcode::JumpIfFalse, Operand::Label(end), location);
                self.emit(Opcode::IteratorNext, Operand::None, location);
                if *is_async {
                    self.emit(Opcode::Await, Operand::None, location);
                }
                self.emit(Opcode::StoreVar, Operand::Name(variable.clone()), location);
                self.loop_stack.push((start, end));
                for stmt in body {
                    self.gen_stmt(stmt);
                }
                self.loop_stack.pop();
                self.emit(Opcode::Jump, Operand::Label(start), location);
                self.emit_label(end, location);
                self.emit(Opcode::IteratorEnd, Operand::None, location);
            }
            Stmt::With {
                target,
                body,
                location,
                ..
            } => {
                self.gen_expr(target);
                self.emit(Opcode::ContextEnter, Operand::None, location);
                for stmt in body {
                    self.gen_stmt(stmt);
                }
                self.emit(Opcode::ContextExit, Operand::None, location);
            }
            Stmt::Return { value, location } => {
                if let Some(value) = value {
                    self.gen_expr(value);
                }
                self.emit(Opcode::Return, Operand::None, location);
            }
            Stmt::Yield { value, location } => {
                match value {
                    Some(value) => self.gen_expr(value),
                    None => self.load_none(location),
                }
                self.emit(Opcode::Yield, Operand::None, location);
            }
            Stmt::Break { location } => {
                if let Some((_, end)) = self.loop_stack.last().copied() {
                    self.emit(Opcode::Jump, Operand::Label(end), location);
                }
            }
            Stmt::Continue { location } => {
                if let Some((start, _)) = self.loop_stack.last().copied() {
                    self.emit(Opcode::Jump, Operand::Label(start), location);
                }
            }
            Stmt::Import {
                module,
                alias,
                location,
            } => {
                self.emit(Opcode::Import, Operand::Name(module.clone()), location);
                let name = alias.as_deref().unwrap_or(module);
                self.emit(Opcode::StoreVar, Operand::Name(name.to_string()), location);
            }
            Stmt::Expr { expr, location } => {
                self.gen_expr(expr);
                // Значение выражения-оператора не нужно
                self.emit(Opcode::Pop, Operand::None, location);
            }
        }
    }

    /// Ветки цепочки if/else-if: у каждого условия своя else-метка,
    /// конечная метка одна на всю цепочку.
    fn gen_if_chain(&mut self, stmt: &Stmt, end: u32) {
        let Stmt::If {
            condition,
            then_branch,
            else_branch,
            location,
        } = stmt
        else {
            return;
        };
        let else_label = self.fresh_label();
        self.gen_expr(condition);
        self.emit(Opcode::JumpIfFalse, Operand::Label(else_label), location);
        for stmt in then_branch {
            self.gen_stmt(stmt);
        }
        self.emit(Opcode::Jump, Operand::Label(end), location);
        self.emit_label(else_label, location);
        match else_branch {
            Some(ElseBranch::ElseIf(inner)) => self.gen_if_chain(inner, end),
            Some(ElseBranch::Else(body)) => {
                for stmt in body {
                    self.gen_stmt(stmt);
                }
            }
            None => {}
        }
    }

    fn gen_func(&mut self, def: &FuncDef) {
        let start = if def.is_async {
            Opcode::AsyncFuncStart
        } else {
            Opcode::FuncStart
        };
        self.emit(start, Operand::Name(def.name.clone()), &def.location);
        for param in &def.params {
            self.emit(
                Opcode::Param,
                Operand::Name(param.name.clone()),
                &param.location,
            );
        }
        // Метки объемлющих циклов лежат вне региона функции: break и
        // continue в её теле не должны их видеть
        let outer_loops = std::mem::take(&mut self.loop_stack);
        for stmt in &def.body {
            self.gen_stmt(stmt);
        }
        self.loop_stack = outer_loops;
        self.emit(Opcode::FuncEnd, Operand::None, &def.location);
    }

    // === Выражения ===

    fn gen_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number { value, location } => {
                self.load_const(Constant::Number(*value), location)
            }
            Expr::String { value, location } => {
                self.load_const(Constant::String(value.clone()), location)
            }
            Expr::Bool { value, location } => self.load_const(Constant::Bool(*value), location),
            Expr::None { location } => self.load_none(location),
            Expr::Identifier { name, location } => {
                self.emit(Opcode::LoadVar, Operand::Name(name.clone()), location)
            }
            Expr::Binary {
                op,
                left,
                right,
                location,
            } => {
                self.gen_expr(left);
                self.gen_expr(right);
                self.emit(binary_opcode(*op), Operand::None, location);
            }
            Expr::Unary {
                op,
                operand,
                location,
            } => {
                self.gen_expr(operand);
                let opcode = match op {
                    UnaryOp::Neg => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                };
                self.emit(opcode, Operand::None, location);
            }
            Expr::Assign {
                target,
                value,
                location,
            } => {
                // Присваивание остаётся выражением: значение кладётся назад
                self.gen_expr(value);
                self.emit(Opcode::StoreVar, Operand::Name(target.clone()), location);
                self.emit(Opcode::LoadVar, Operand::Name(target.clone()), location);
            }
            Expr::Call {
                callee,
                args,
                location,
            } => {
                self.emit(Opcode::LoadVar, Operand::Name(callee.clone()), location);
                for arg in args {
                    self.gen_expr(arg);
                }
                self.emit(Opcode::Call, Operand::Count(args.len() as u32), location);
            }
            Expr::Array { elements, location } => {
                for element in elements {
                    self.gen_expr(element);
                }
                self.emit(
                    Opcode::ArrayCreate,
                    Operand::Count(elements.len() as u32),
                    location,
                );
            }
            Expr::Object { entries, location } => {
                for (key, value) in entries {
                    self.load_const(Constant::String(key.clone()), location);
                    self.gen_expr(value);
                }
                self.emit(
                    Opcode::ObjectCreate,
                    Operand::Count(entries.len() as u32),
                    location,
                );
            }
            Expr::Await { operand, location } => {
                self.gen_expr(operand);
                self.emit(Opcode::Await, Operand::None, location);
            }
            Expr::Match {
                subject,
                cases,
                default,
                location,
            } => self.gen_match(subject, cases, default.as_deref(), location),
        }
    }

    // === Понижение match ===

    /// Субъект сохраняется во временную переменную компилятора;
    /// каждая ветка: связывания, проверка паттерна, guard, тело,
    /// переход на общую конечную метку.
    fn gen_match(
        &mut self,
        subject: &Expr,
        cases: &[MatchCase],
        default: Option<&[Stmt]>,
        location: &SourceLocation,
    ) {
        let temp = self.fresh_temp();
        self.gen_expr(subject);
        self.emit(Opcode::StoreVar, Operand::Name(temp.clone()), location);

        let end = self.fresh_label();
        for case in cases {
            let next = self.fresh_label();
            self.gen_pattern_bindings(&case.pattern, &temp);
            self.gen_pattern_test(&case.pattern, &temp);
            self.emit(Opcode::JumpIfFalse, Operand::Label(next), &case.location);
            if let Some(guard) = &case.guard {
                self.gen_expr(guard);
                self.emit(Opcode::JumpIfFalse, Operand::Label(next), &case.location);
            }
            for stmt in &case.body {
                self.gen_stmt(stmt);
            }
            self.emit(Opcode::Jump, Operand::Label(end), &case.location);
            self.emit_label(next, &case.location);
        }
        if let Some(body) = default {
            for stmt in body {
                self.gen_stmt(stmt);
            }
        }
        self.emit_label(end, location);
        // match как выражение оставляет одно значение
        self.load_none(location);
    }

    /// Разложить составной субъект по детерминированно именованным
    /// временным и записать связывания паттерна.
    fn gen_pattern_bindings(&mut self, pattern: &Pattern, temp: &str) {
        match pattern {
            Pattern::Identifier { name, location } => {
                self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                self.emit(Opcode::StoreVar, Operand::Name(name.clone()), location);
            }
            Pattern::Type {
                binding, location, ..
            } => {
                self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                self.emit(Opcode::StoreVar, Operand::Name(binding.clone()), location);
            }
            Pattern::Tuple { elements, location } | Pattern::Array { elements, location } => {
                for (i, element) in elements.iter().enumerate() {
                    let sub = elem_temp(temp, i);
                    self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                    self.emit(Opcode::ElemLoad, Operand::Count(i as u32), location);
                    self.emit(Opcode::StoreVar, Operand::Name(sub.clone()), location);
                    self.gen_pattern_bindings(element, &sub);
                }
            }
            Pattern::Object { entries, location } => {
                for (key, value) in entries {
                    let sub = field_temp(temp, key);
                    self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                    self.emit(Opcode::FieldLoad, Operand::Name(key.clone()), location);
                    self.emit(Opcode::StoreVar, Operand::Name(sub.clone()), location);
                    self.gen_pattern_bindings(value, &sub);
                }
            }
            Pattern::Or { left, right, .. } | Pattern::And { left, right, .. } => {
                self.gen_pattern_bindings(left, temp);
                self.gen_pattern_bindings(right, temp);
            }
            Pattern::Guard { pattern, .. } => self.gen_pattern_bindings(pattern, temp),
            Pattern::Wildcard { .. } | Pattern::Literal { .. } | Pattern::Range { .. } => {}
        }
    }

    /// Проверка паттерна: оставляет на стеке один bool.
    fn gen_pattern_test(&mut self, pattern: &Pattern, temp: &str) {
        match pattern {
            Pattern::Wildcard { location } | Pattern::Identifier { location, .. } => {
                self.load_const(Constant::Bool(true), location);
            }
            Pattern::Literal { value, location } => {
                self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                let constant = match value {
                    LitValue::Number(n) => Constant::Number(*n),
                    LitValue::String(s) => Constant::String(s.clone()),
                    LitValue::Bool(b) => Constant::Bool(*b),
                    LitValue::None => Constant::None,
                };
                self.load_const(constant, location);
                self.emit(Opcode::Eq, Operand::None, location);
            }
            Pattern::Range {
                start,
                end,
                location,
            } => {
                self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                self.load_const(Constant::Number(*start), location);
                self.emit(Opcode::Ge, Operand::None, location);
                self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                self.load_const(Constant::Number(*end), location);
                self.emit(Opcode::Le, Operand::None, location);
                self.emit(Opcode::And, Operand::None, location);
            }
            Pattern::Type {
                type_name,
                location,
                ..
            } => {
                self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                self.emit(Opcode::TypeTest, Operand::Name(type_name.clone()), location);
            }
            Pattern::Or {
                left,
                right,
                location,
            } => {
                self.gen_pattern_test(left, temp);
                self.gen_pattern_test(right, temp);
                self.emit(Opcode::Or, Operand::None, location);
            }
            Pattern::And {
                left,
                right,
                location,
            } => {
                self.gen_pattern_test(left, temp);
                self.gen_pattern_test(right, temp);
                self.emit(Opcode::And, Operand::None, location);
            }
            Pattern::Guard {
                pattern,
                condition,
                location,
            } => {
                // Связывания уже записаны, условию guard они видны
                self.gen_pattern_test(pattern, temp);
                self.gen_expr(condition);
                self.emit(Opcode::And, Operand::None, location);
            }
            Pattern::Tuple { elements, location } => {
                self.gen_composite_test(Opcode::TupleTest, elements, temp, location);
            }
            Pattern::Array { elements, location } => {
                self.gen_composite_test(Opcode::ArrayTest, elements, temp, location);
            }
            Pattern::Object { entries, location } => {
                self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
                self.emit(
                    Opcode::ObjectTest,
                    Operand::Count(entries.len() as u32),
                    location,
                );
                for (key, value) in entries {
                    let sub = field_temp(temp, key);
                    self.gen_pattern_test(value, &sub);
                    self.emit(Opcode::And, Operand::None, location);
                }
            }
        }
    }

    fn gen_composite_test(
        &mut self,
        test: Opcode,
        elements: &[Pattern],
        temp: &str,
        location: &SourceLocation,
    ) {
        self.emit(Opcode::LoadVar, Operand::Name(temp.to_string()), location);
        self.emit(test, Operand::Count(elements.len() as u32), location);
        for (i, element) in elements.iter().enumerate() {
            let sub = elem_temp(temp, i);
            self.gen_pattern_test(element, &sub);
            self.emit(Opcode::And, Operand::None, location);
        }
    }
}

fn elem_temp(temp: &str, index: usize) -> String {
    format!("{}_{}", temp, index)
}

fn field_temp(temp: &str, key: &str) -> String {
    format!("{}_{}", temp, key)
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::And => Opcode::And,
        BinaryOp::Or => Opcode::Or,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::Optimizer;
    use crate::parser::{Lexer, Parser};

    fn generate_source(source: &str) -> Bytecode {
        let (tokens, lex_errors) = Lexer::new(source, "test.nc").tokenize();
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        let (program, errors, _) = Parser::new(tokens).parse();
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let (program, _) = Optimizer::new().optimize(program);
        CodeGenerator::new().generate(&program).unwrap()
    }

    fn opcodes(bytecode: &Bytecode) -> Vec<Opcode> {
        bytecode.instructions.iter().map(|i| i.opcode).collect()
    }

    #[test]
    fn test_folded_constant_single_load() {
        // 2 + 3 * 4 сворачивается до одного LOAD_CONST 14
        let bytecode = generate_source("let x = 2 + 3 * 4;");
        assert_eq!(
            opcodes(&bytecode),
            vec![Opcode::LoadConst, Opcode::StoreVar]
        );
        assert_eq!(
            bytecode.constants.get(0),
            Some(&Constant::Number(14.0))
        );
        assert_eq!(bytecode.constants.len(), 1);
    }

    #[test]
    fn test_binary_without_folding() {
        let bytecode = generate_source("let x = 1 / 0;");
        assert_eq!(
            opcodes(&bytecode),
            vec![
                Opcode::LoadConst,
                Opcode::LoadConst,
                Opcode::Div,
                Opcode::StoreVar
            ]
        );
    }

    #[test]
    fn test_expr_statement_pops() {
        let bytecode = generate_source("let x = 1; x;");
        assert_eq!(*opcodes(&bytecode).last().unwrap(), Opcode::Pop);
    }

    #[test]
    fn test_if_chain_shares_end_label() {
        let bytecode =
            generate_source("let a = 1; let b = 2; if a { a; } else if b { b; } else { a; }");
        // Все безусловные JUMP ведут на одну конечную метку
        let jump_targets: Vec<_> = bytecode
            .instructions
            .iter()
            .filter(|i| i.opcode == Opcode::Jump)
            .map(|i| i.operand.clone())
            .collect();
        assert_eq!(jump_targets.len(), 2);
        assert_eq!(jump_targets[0], jump_targets[1]);
        // У каждого условия своя else-метка
        let else_targets: Vec<_> = bytecode
            .instructions
            .iter()
            .filter(|i| i.opcode == Opcode::JumpIfFalse)
            .map(|i| i.operand.clone())
            .collect();
        assert_eq!(else_targets.len(), 2);
        assert_ne!(else_targets[0], else_targets[1]);
        assert!(!jump_targets.contains(&else_targets[0]));
    }

    #[test]
    fn test_while_shape() {
        let bytecode = generate_source("let x = 1; while x { break; }");
        let ops = opcodes(&bytecode);
        let while_ops = &ops[2..];
        assert_eq!(
            while_ops,
            &[
                Opcode::Label,
                Opcode::LoadVar,
                Opcode::JumpIfFalse,
                Opcode::Jump, // break -> конечная метка
                Opcode::Jump, // назад к началу
                Opcode::Label,
            ]
        );
        assert!(bytecode.verify_labels().is_ok());
    }

    #[test]
    fn test_for_shape() {
        let bytecode = generate_source("let xs = [1]; for x in xs { x; }");
        let ops = opcodes(&bytecode);
        let for_start = ops
            .iter()
            .position(|op| *op == Opcode::IteratorInit)
            .unwrap();
        assert_eq!(
            &ops[for_start..],
            &[
                Opcode::IteratorInit,
                Opcode::Label,
                Opcode::IteratorHasNext,
                Opcode::JumpIfFalse,
                Opcode::IteratorNext,
                Opcode::StoreVar,
                Opcode::LoadVar,
                Opcode::Pop,
                Opcode::Jump,
                Opcode::Label,
                Opcode::IteratorEnd,
            ]
        );
    }

    #[test]
    fn test_func_def_framing() {
        let bytecode = generate_source("def add(a, b) { return a + b; }");
        assert_eq!(
            opcodes(&bytecode),
            vec![
                Opcode::FuncStart,
                Opcode::Param,
                Opcode::Param,
                Opcode::LoadVar,
                Opcode::LoadVar,
                Opcode::Add,
                Opcode::Return,
                Opcode::FuncEnd,
            ]
        );
    }

    #[test]
    fn test_call_with_arg_count() {
        let bytecode = generate_source("def f(a) { return a; } f(1 + 2);");
        let call = bytecode
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::Call)
            .unwrap();
        assert_eq!(call.operand, Operand::Count(1));
    }

    #[test]
    fn test_async_lowering() {
        let bytecode = generate_source("async def f(u) { let r = await g(u); yield r; }");
        let ops = opcodes(&bytecode);
        assert_eq!(ops[0], Opcode::AsyncFuncStart);
        assert!(ops.contains(&Opcode::Await));
        assert!(ops.contains(&Opcode::Yield));
    }

    #[test]
    fn test_collections_and_object_keys() {
        let bytecode = generate_source("let o = {a: 1, b: 2}; let xs = [1, 2, 3];");
        let object_create = bytecode
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::ObjectCreate)
            .unwrap();
        assert_eq!(object_create.operand, Operand::Count(2));
        let array_create = bytecode
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::ArrayCreate)
            .unwrap();
        assert_eq!(array_create.operand, Operand::Count(3));
    }

    #[test]
    fn test_match_lowering() {
        let bytecode =
            generate_source("let v = 5; match v { case 1..10: v; case Int n: n; default: v; }");
        let ops = opcodes(&bytecode);
        // Субъект сохраняется во временную переменную
        let store = &bytecode.instructions[3];
        assert_eq!(store.opcode, Opcode::StoreVar);
        assert_eq!(store.operand, Operand::Name("$match0".into()));
        assert!(ops.contains(&Opcode::Ge));
        assert!(ops.contains(&Opcode::TypeTest));
        // Обе ветки прыгают на общий конец
        let jump_targets: Vec<_> = bytecode
            .instructions
            .iter()
            .filter(|i| i.opcode == Opcode::Jump)
            .map(|i| i.operand.clone())
            .collect();
        assert_eq!(jump_targets.len(), 2);
        assert_eq!(jump_targets[0], jump_targets[1]);
        assert!(bytecode.verify_labels().is_ok());
        // match как выражение: после конечной метки кладётся none
        assert!(ops.ends_with(&[Opcode::Label, Opcode::LoadConst, Opcode::Pop]));
    }

    #[test]
    fn test_source_map_covers_all_instructions() {
        let bytecode = generate_source("let x = 1;\nlet y = x;\n");
        assert_eq!(bytecode.source_map.len(), bytecode.instructions.len());
        assert_eq!(bytecode.source_map.get(2).map(|l| l.line), Some(2));
    }

    #[test]
    fn test_break_inside_nested_func_ignores_outer_loop() {
        // Функция внутри цикла не видит его меток: break в её теле
        // становится no-op, а не переходом наружу региона
        let bytecode =
            generate_source("let n = 1; while n { def helper() { break; } n = 0; }");
        assert!(bytecode.verify_labels().is_ok());
        let func_start = bytecode
            .instructions
            .iter()
            .position(|i| i.opcode == Opcode::FuncStart)
            .unwrap();
        let func_end = bytecode
            .instructions
            .iter()
            .position(|i| i.opcode == Opcode::FuncEnd)
            .unwrap();
        assert!(bytecode.instructions[func_start..func_end]
            .iter()
            .all(|i| i.opcode != Opcode::Jump));
        // break во вложенном в функцию цикле работает как раньше
        let bytecode =
            generate_source("def f(n) { while n { break; } } let m = 1; while m { break; }");
        assert!(bytecode.verify_labels().is_ok());
    }

    #[test]
    fn test_labels_verified_on_generated_code() {
        let bytecode = generate_source(
            "def f(n) { if n { while n { break; } } else { return n; } } let q = 1; if q { q; }",
        );
        assert!(bytecode.verify_labels().is_ok());
    }
}
