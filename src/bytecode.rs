//! Представление байткода NBC: инструкции, пул констант, source map.
//!
//! Метки символьные: `JUMP`/`JUMP_IF_FALSE` ссылаются на id метки, а
//! разрешение в абсолютные смещения выполняет внешний линкер.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::SourceLocation;
use crate::error::CodeGenError;

/// Код операции NBC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    // === Стек и переменные ===
    LoadConst,
    LoadVar,
    StoreVar,
    Pop,

    // === Арифметика и логика ===
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
    Neg,
    Not,

    // === Поток управления ===
    Label,
    Jump,
    JumpIfFalse,
    Call,
    Return,

    // === Итерация ===
    IteratorInit,
    IteratorHasNext,
    IteratorNext,
    IteratorEnd,

    // === Функции и классы ===
    FuncStart,
    AsyncFuncStart,
    Param,
    FuncEnd,
    ClassStart,
    ClassEnd,

    // === Коллекции ===
    ArrayCreate,
    ObjectCreate,

    // === Асинхронность ===
    Await,
    Yield,
    ContextEnter,
    ContextExit,

    // === Модули ===
    Import,

    // === Проверки паттернов ===
    TypeTest,
    TupleTest,
    ArrayTest,
    ObjectTest,
    ElemLoad,
    FieldLoad,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::LoadConst => "LOAD_CONST",
            Opcode::LoadVar => "LOAD_VAR",
            Opcode::StoreVar => "STORE_VAR",
            Opcode::Pop => "POP",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Lt => "LT",
            Opcode::Gt => "GT",
            Opcode::Le => "LE",
            Opcode::Ge => "GE",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Neg => "NEG",
            Opcode::Not => "NOT",
            Opcode::Label => "LABEL",
            Opcode::Jump => "JUMP",
            Opcode::JumpIfFalse => "JUMP_IF_FALSE",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::IteratorInit => "ITERATOR_INIT",
            Opcode::IteratorHasNext => "ITERATOR_HAS_NEXT",
            Opcode::IteratorNext => "ITERATOR_NEXT",
            Opcode::IteratorEnd => "ITERATOR_END",
            Opcode::FuncStart => "FUNC_START",
            Opcode::AsyncFuncStart => "ASYNC_FUNC_START",
            Opcode::Param => "PARAM",
            Opcode::FuncEnd => "FUNC_END",
            Opcode::ClassStart => "CLASS_START",
            Opcode::ClassEnd => "CLASS_END",
            Opcode::ArrayCreate => "ARRAY_CREATE",
            Opcode::ObjectCreate => "OBJECT_CREATE",
            Opcode::Await => "AWAIT",
            Opcode::Yield => "YIELD",
            Opcode::ContextEnter => "CONTEXT_ENTER",
            Opcode::ContextExit => "CONTEXT_EXIT",
            Opcode::Import => "IMPORT",
            Opcode::TypeTest => "TYPE_TEST",
            Opcode::TupleTest => "TUPLE_TEST",
            Opcode::ArrayTest => "ARRAY_TEST",
            Opcode::ObjectTest => "OBJECT_TEST",
            Opcode::ElemLoad => "ELEM_LOAD",
            Opcode::FieldLoad => "FIELD_LOAD",
        };
        write!(f, "{}", name)
    }
}

/// Операнд инструкции.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    None,
    /// Индекс в пуле констант.
    Const(u32),
    /// Символьное имя: переменная, функция, класс, поле.
    Name(String),
    /// Id символьной метки.
    Label(u32),
    /// Счётчик: аргументы вызова, элементы коллекции.
    Count(u32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Const(index) => write!(f, "{}", index),
            Operand::Name(name) => write!(f, "{}", name),
            Operand::Label(id) => write!(f, "L{}", id),
            Operand::Count(n) => write!(f, "{}", n),
        }
    }
}

/// Одна инструкция NBC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
    pub location: SourceLocation,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: Operand, location: SourceLocation) -> Self {
        Self {
            opcode,
            operand,
            location,
        }
    }
}

/// Константа пула.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constant {
    Number(f64),
    String(String),
    Bool(bool),
    None,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Целые значения печатаются без дробной части: 14, не 14.0
            Constant::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                write!(f, "{}", *n as i64)
            }
            Constant::Number(n) => write!(f, "{}", n),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::None => write!(f, "none"),
        }
    }
}

/// Пул констант с дедупликацией по значению.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantPool {
    constants: Vec<Constant>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Положить константу в пул, вернув индекс; равные значения
    /// получают один индекс.
    pub fn intern(&mut self, constant: Constant) -> u32 {
        if let Some(index) = self.constants.iter().position(|c| *c == constant) {
            return index as u32;
        }
        self.constants.push(constant);
        (self.constants.len() - 1) as u32
    }

    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

/// Source map: позиция в исходнике для каждого индекса инструкции.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMap {
    locations: Vec<SourceLocation>,
}

impl SourceMap {
    pub fn push(&mut self, location: SourceLocation) {
        self.locations.push(location);
    }

    pub fn get(&self, instruction_index: usize) -> Option<&SourceLocation> {
        self.locations.get(instruction_index)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Готовый модуль байткода.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Vec<Instruction>,
    pub constants: ConstantPool,
    pub source_map: SourceMap,
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить инструкцию; source map растёт синхронно.
    pub fn push(&mut self, instruction: Instruction) {
        self.source_map.push(instruction.location.clone());
        self.instructions.push(instruction);
    }

    /// Проверить, что каждый переход ссылается на метку, определённую
    /// в том же теле функции (или на верхнем уровне).
    ///
    /// Висячая метка — ошибка программирования генератора, не
    /// пользовательская диагностика.
    pub fn verify_labels(&self) -> Result<(), CodeGenError> {
        // Регион = тело функции; верхний уровень — регион 0
        let mut regions: Vec<Vec<u32>> = vec![Vec::new()];
        let mut region_stack: Vec<usize> = vec![0];
        let mut jumps: Vec<(usize, u32, &SourceLocation)> = Vec::new();

        for instruction in &self.instructions {
            let current = *region_stack.last().ok_or_else(|| {
                CodeGenError::UnbalancedFunctionMarkers {
                    location: instruction.location.clone(),
                }
            })?;
            match instruction.opcode {
                Opcode::FuncStart | Opcode::AsyncFuncStart => {
                    regions.push(Vec::new());
                    region_stack.push(regions.len() - 1);
                }
                Opcode::FuncEnd => {
                    region_stack.pop();
                    if region_stack.is_empty() {
                        return Err(CodeGenError::UnbalancedFunctionMarkers {
                            location: instruction.location.clone(),
                        });
                    }
                }
                Opcode::Label => {
                    if let Operand::Label(id) = instruction.operand {
                        regions[current].push(id);
                    }
                }
                Opcode::Jump | Opcode::JumpIfFalse => {
                    if let Operand::Label(id) = instruction.operand {
                        jumps.push((current, id, &instruction.location));
                    }
                }
                _ => {}
            }
        }

        for (region, label, location) in jumps {
            if !regions[region].contains(&label) {
                return Err(CodeGenError::DanglingLabel {
                    label,
                    location: location.clone(),
                });
            }
        }
        Ok(())
    }

    /// Человекочитаемый листинг инструкций.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            out.push_str(&format!("{:04} {}", index, instruction.opcode));
            match &instruction.operand {
                Operand::None => {}
                Operand::Const(pool_index) => {
                    out.push_str(&format!(" {}", pool_index));
                    if let Some(constant) = self.constants.get(*pool_index) {
                        out.push_str(&format!(" ({})", constant));
                    }
                }
                operand => out.push_str(&format!(" {}", operand)),
            }
            out.push('\n');
        }
        out
    }

    /// Сериализовать модуль (инструкции, пул, source map) в JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(opcode: Opcode, operand: Operand) -> Instruction {
        Instruction::new(opcode, operand, SourceLocation::default())
    }

    #[test]
    fn test_pool_dedup() {
        let mut pool = ConstantPool::new();
        let a = pool.intern(Constant::Number(14.0));
        let b = pool.intern(Constant::String("x".into()));
        let c = pool.intern(Constant::Number(14.0));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_constant_display() {
        assert_eq!(Constant::Number(14.0).to_string(), "14");
        assert_eq!(Constant::Number(3.5).to_string(), "3.5");
        assert_eq!(Constant::None.to_string(), "none");
    }

    #[test]
    fn test_verify_labels_ok() {
        let mut bytecode = Bytecode::new();
        bytecode.push(instr(Opcode::Jump, Operand::Label(1)));
        bytecode.push(instr(Opcode::Label, Operand::Label(1)));
        assert!(bytecode.verify_labels().is_ok());
    }

    #[test]
    fn test_verify_labels_dangling() {
        let mut bytecode = Bytecode::new();
        bytecode.push(instr(Opcode::Jump, Operand::Label(7)));
        let err = bytecode.verify_labels().unwrap_err();
        assert!(matches!(err, CodeGenError::DanglingLabel { label: 7, .. }));
    }

    #[test]
    fn test_verify_labels_respects_function_regions() {
        // Метка внутри функции не видна переходу снаружи
        let mut bytecode = Bytecode::new();
        bytecode.push(instr(Opcode::FuncStart, Operand::Name("f".into())));
        bytecode.push(instr(Opcode::Label, Operand::Label(1)));
        bytecode.push(instr(Opcode::FuncEnd, Operand::None));
        bytecode.push(instr(Opcode::Jump, Operand::Label(1)));
        assert!(bytecode.verify_labels().is_err());
    }

    #[test]
    fn test_source_map_parallel() {
        let mut bytecode = Bytecode::new();
        let location = SourceLocation::new("a.nc", 3, 1, 20);
        bytecode.push(Instruction::new(
            Opcode::LoadConst,
            Operand::Const(0),
            location.clone(),
        ));
        assert_eq!(bytecode.source_map.len(), bytecode.instructions.len());
        assert_eq!(bytecode.source_map.get(0), Some(&location));
    }

    #[test]
    fn test_disassemble_format() {
        let mut bytecode = Bytecode::new();
        let index = bytecode.constants.intern(Constant::Number(14.0));
        bytecode.push(instr(Opcode::LoadConst, Operand::Const(index)));
        bytecode.push(instr(Opcode::StoreVar, Operand::Name("x".into())));
        let listing = bytecode.disassemble();
        assert!(listing.contains("0000 LOAD_CONST 0 (14)"));
        assert!(listing.contains("0001 STORE_VAR x"));
    }
}
