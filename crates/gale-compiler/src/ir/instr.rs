//! Listing Instructions
//!
//! One instruction per emitter operation, in emission order.

use serde::Serialize;

use crate::ast::{BinaryOp, UnaryOp};
use crate::emitter::Address;
use crate::types::{DataType, VariantType};

/// How a call instruction dispatches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CallKind {
    /// Named dispatch on a receiver
    Dynamic,
    /// Named dispatch producing a suspendable call
    Async,
    SelfCall,
    SelfAsync,
    Super,
    /// Host utility function
    Utility,
    /// Language utility function
    ScriptUtility,
    /// Method of a builtin value type
    BuiltinType(VariantType),
    /// Native method by name on the given class
    MethodBind(String),
    /// Native method with an exactly matching signature
    MethodBindValidated(String),
    /// Script function called on a class (static call)
    ScriptFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Instr {
    Line(u32),
    DeclareLocal { slot: u32, name: String, ty: DataType },
    PushTemp { slot: u32, ty: DataType },
    PopTemp { slot: u32 },
    StartParameters,
    EndParameters,
    StartBlock,
    EndBlock,
    Clear(Address),

    Assign { target: Address, source: Address, convert: bool },
    AssignBool { target: Address, value: bool },
    AssignDefault { target: Address, source: Address, convert: bool },
    Unary { target: Address, op: UnaryOp, operand: Address },
    Binary { target: Address, op: BinaryOp, left: Address, right: Address },
    TypeTest { target: Address, source: Address, ty: DataType },
    TypeOf { target: Address, source: Address },
    Cast { target: Address, source: Address, ty: DataType },
    StoreGlobal { target: Address, index: u32 },
    StoreNamedGlobal { target: Address, name: String },

    AndLeft(Address),
    AndRight(Address),
    EndAnd(Address),
    OrLeft(Address),
    OrRight(Address),
    EndOr(Address),
    StartTernary(Address),
    TernaryCondition(Address),
    TernaryTrue(Address),
    TernaryFalse(Address),
    EndTernary,

    Get { target: Address, index: Address, source: Address },
    Set { target: Address, index: Address, source: Address },
    GetNamed { target: Address, name: String, source: Address },
    SetNamed { target: Address, name: String, source: Address },
    Construct { target: Address, ty: VariantType, args: Vec<Address> },
    ConstructArray { target: Address, element: Option<DataType>, elements: Vec<Address> },
    ConstructDictionary { target: Address, pairs: Vec<Address> },

    Call {
        target: Option<Address>,
        kind: CallKind,
        base: Option<Address>,
        name: String,
        args: Vec<Address>,
    },
    Lambda { target: Address, function: String, captures: Vec<Address>, use_self: bool },
    Await { target: Address, operand: Address },

    If(Address),
    Else,
    EndIf,
    JumpIfShared(Address),
    EndJumpIfShared,
    StartFor { iterator_ty: DataType, list_ty: DataType, range: bool },
    ForRange { from: Address, to: Address, step: Address },
    ForList(Address),
    For { variable: Address, convert: bool, range: bool },
    EndFor { range: bool },
    StartWhileCondition,
    While(Address),
    EndWhile,
    Break,
    Continue,
    Breakpoint,
    Return(Address),
    Assert { test: Address, message: Address },
}

impl Instr {
    /// Name of the called function, for call instructions
    pub fn call_name(&self) -> Option<&str> {
        match self {
            Instr::Call { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_call_kind(&self, expected: &CallKind) -> bool {
        matches!(self, Instr::Call { kind, .. } if kind == expected)
    }
}
