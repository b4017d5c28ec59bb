//! Addresses
//!
//! A typed reference to a storage location used while lowering.

use serde::Serialize;
use std::fmt;

use crate::types::{Constant, DataType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AddressMode {
    /// The receiver instance
    SelfRef,
    /// The class being compiled (receiver of static calls)
    Class,
    /// Instance member slot
    Member(u32),
    /// Static member slot of the class at `owner` (fully qualified path)
    StaticMember { index: u32, owner: String },
    Local(u32),
    Temporary(u32),
    Parameter(u32),
    Constant(Constant),
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub mode: AddressMode,
    pub ty: DataType,
}

impl Address {
    pub fn new(mode: AddressMode, ty: DataType) -> Self {
        Self { mode, ty }
    }

    pub fn null() -> Self {
        Self::new(AddressMode::Null, DataType::Variant)
    }

    pub fn self_ref() -> Self {
        Self::new(AddressMode::SelfRef, DataType::Variant)
    }

    pub fn class() -> Self {
        Self::new(AddressMode::Class, DataType::Variant)
    }

    pub fn constant(value: Constant) -> Self {
        let ty = value.data_type();
        Self::new(AddressMode::Constant(value), ty)
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self.mode, AddressMode::Temporary(_))
    }

    pub fn constant_value(&self) -> Option<&Constant> {
        match &self.mode {
            AddressMode::Constant(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mode {
            AddressMode::SelfRef => f.write_str("self"),
            AddressMode::Class => f.write_str("class"),
            AddressMode::Member(i) => write!(f, "member[{}]", i),
            AddressMode::StaticMember { index, owner } => write!(f, "static[{}@{}]", index, owner),
            AddressMode::Local(i) => write!(f, "local[{}]", i),
            AddressMode::Temporary(i) => write!(f, "temp[{}]", i),
            AddressMode::Parameter(i) => write!(f, "param[{}]", i),
            AddressMode::Constant(c) => write!(f, "const({})", c),
            AddressMode::Null => f.write_str("null"),
        }
    }
}
