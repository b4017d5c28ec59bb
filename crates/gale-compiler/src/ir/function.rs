//! Listing Functions
//!
//! The body of one compiled function as recorded by the listing backend.

use serde::Serialize;
use std::any::Any;

use super::instr::{CallKind, Instr};
use crate::emitter::FunctionCode;
use crate::types::DataType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrFunction {
    pub name: String,
    pub class_path: String,
    pub is_static: bool,
    pub return_type: DataType,
    /// Parameters in slot order (captures first for lambdas)
    pub params: Vec<(String, DataType)>,
    /// Every local declared, in declaration order
    pub locals: Vec<(String, DataType)>,
    /// Highest number of local slots live at once
    pub max_locals: u32,
    /// Highest number of temporaries live at once
    pub max_temporaries: u32,
    pub instructions: Vec<Instr>,
}

impl FunctionCode for IrFunction {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl IrFunction {
    pub fn new(name: impl Into<String>, class_path: impl Into<String>, is_static: bool, return_type: DataType) -> Self {
        Self {
            name: name.into(),
            class_path: class_path.into(),
            is_static,
            return_type,
            params: Vec::new(),
            locals: Vec::new(),
            max_locals: 0,
            max_temporaries: 0,
            instructions: Vec::new(),
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Iterate over call instructions of the given kind
    pub fn calls<'a>(&'a self, kind: &'a CallKind) -> impl Iterator<Item = &'a Instr> + 'a {
        self.instructions.iter().filter(move |i| i.is_call_kind(kind))
    }

    pub fn count(&self, predicate: impl Fn(&Instr) -> bool) -> usize {
        self.instructions.iter().filter(|i| predicate(i)).count()
    }

    /// Verify temporaries are released exactly once in reverse acquisition order
    pub fn check_temporaries(&self) -> Result<(), String> {
        let mut stack = Vec::new();
        for (at, instr) in self.instructions.iter().enumerate() {
            match instr {
                Instr::PushTemp { slot, .. } => stack.push(*slot),
                Instr::PopTemp { slot } => match stack.pop() {
                    Some(top) if top == *slot => {}
                    Some(top) => {
                        return Err(format!("instruction {}: released temp[{}] while temp[{}] is on top", at, slot, top));
                    }
                    None => return Err(format!("instruction {}: released temp[{}] with none live", at, slot)),
                },
                _ => {}
            }
        }
        if stack.is_empty() {
            Ok(())
        } else {
            Err(format!("{} temporaries never released: {:?}", stack.len(), stack))
        }
    }

    /// Verify structured control flow is properly nested
    ///
    /// Scope blocks only need to balance: a `match` opens each branch block
    /// before that branch's `if` and closes it before the `else`.
    pub fn validate(&self) -> Result<(), String> {
        #[derive(Debug, PartialEq)]
        enum Open {
            If { has_else: bool },
            For,
            While { has_body: bool },
            Shared,
            And,
            Or,
        }

        let mut stack: Vec<Open> = Vec::new();
        let mut blocks = 0usize;
        for (at, instr) in self.instructions.iter().enumerate() {
            let fail = |what: &str| Err(format!("instruction {}: {}", at, what));
            match instr {
                Instr::If(_) => stack.push(Open::If { has_else: false }),
                Instr::Else => match stack.last_mut() {
                    Some(Open::If { has_else }) if !*has_else => *has_else = true,
                    _ => return fail("else without if"),
                },
                Instr::EndIf => {
                    if !matches!(stack.pop(), Some(Open::If { .. })) {
                        return fail("endif without if");
                    }
                }
                Instr::StartFor { .. } => stack.push(Open::For),
                Instr::EndFor { .. } => {
                    if stack.pop() != Some(Open::For) {
                        return fail("endfor without for");
                    }
                }
                Instr::StartWhileCondition => stack.push(Open::While { has_body: false }),
                Instr::While(_) => match stack.last_mut() {
                    Some(Open::While { has_body }) if !*has_body => *has_body = true,
                    _ => return fail("while without condition start"),
                },
                Instr::EndWhile => {
                    if stack.pop() != Some(Open::While { has_body: true }) {
                        return fail("endwhile without while");
                    }
                }
                Instr::JumpIfShared(_) => stack.push(Open::Shared),
                Instr::EndJumpIfShared => {
                    if stack.pop() != Some(Open::Shared) {
                        return fail("unbalanced shared jump");
                    }
                }
                Instr::StartBlock => blocks += 1,
                Instr::EndBlock => match blocks.checked_sub(1) {
                    Some(depth) => blocks = depth,
                    None => return fail("end of block without start"),
                },
                Instr::AndLeft(_) => stack.push(Open::And),
                Instr::EndAnd(_) => {
                    if stack.pop() != Some(Open::And) {
                        return fail("unbalanced and");
                    }
                }
                Instr::OrLeft(_) => stack.push(Open::Or),
                Instr::EndOr(_) => {
                    if stack.pop() != Some(Open::Or) {
                        return fail("unbalanced or");
                    }
                }
                _ => {}
            }
        }
        if !stack.is_empty() {
            return Err(format!("unterminated structures: {:?}", stack));
        }
        if blocks != 0 {
            return Err(format!("{} blocks never closed", blocks));
        }
        self.check_temporaries()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
