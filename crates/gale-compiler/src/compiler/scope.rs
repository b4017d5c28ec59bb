//! Scope Tracker
//!
//! Per-function name tables: a fixed parameter map plus a stack of block
//! frames. Lookup scans blocks innermost-first, then parameters.

use rustc_hash::FxHashMap;

use crate::emitter::{Address, AddressMode};

/// One lexical block frame
#[derive(Debug, Default)]
struct BlockFrame {
    names: FxHashMap<String, Address>,
    /// Local slots declared in this frame, in declaration order
    declared: Vec<Address>,
}

#[derive(Debug, Default)]
pub struct FunctionScope {
    parameters: FxHashMap<String, Address>,
    blocks: Vec<BlockFrame>,
    /// Live temporary slots, innermost last
    temporaries: Vec<u32>,
    /// Compiling a static function (no receiver instance)
    pub is_static: bool,
}

impl FunctionScope {
    pub fn new(is_static: bool) -> Self {
        Self {
            is_static,
            ..Self::default()
        }
    }

    pub fn add_parameter(&mut self, name: &str, address: Address) {
        self.parameters.insert(name.to_string(), address);
    }

    pub fn push_block(&mut self) {
        self.blocks.push(BlockFrame::default());
    }

    /// Pop the innermost frame, returning the local slots it declared
    pub fn pop_block(&mut self) -> Vec<Address> {
        self.blocks.pop().map(|frame| frame.declared).unwrap_or_default()
    }

    /// Bind a name in the innermost frame; shadows outer bindings
    pub fn declare(&mut self, name: &str, address: Address) {
        if self.blocks.is_empty() {
            self.push_block();
        }
        if let Some(frame) = self.blocks.last_mut() {
            if matches!(address.mode, AddressMode::Local(_)) {
                frame.declared.push(address.clone());
            }
            frame.names.insert(name.to_string(), address);
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Address> {
        self.parameters.get(name)
    }

    pub fn local(&self, name: &str) -> Option<&Address> {
        self.blocks.iter().rev().find_map(|frame| frame.names.get(name))
    }

    pub fn push_temporary(&mut self, slot: u32) {
        self.temporaries.push(slot);
    }

    /// Retire the innermost temporary; releases must mirror acquisitions
    pub fn pop_temporary(&mut self, slot: u32) {
        let top = self.temporaries.pop();
        debug_assert_eq!(top, Some(slot), "temporary released out of order");
    }

    pub fn live_temporaries(&self) -> usize {
        self.temporaries.len()
    }
}
