//! Instruction Emitter Interface
//!
//! The compiler drives an [`Emitter`] strictly in program order and never
//! inspects what it produced. One emitter builds one function; nested lambdas
//! get a fresh emitter from the [`Backend`].

mod address;
mod listing;

pub use address::{Address, AddressMode};
pub use listing::{ListingBackend, ListingEmitter};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::ast::{BinaryOp, UnaryOp};
use crate::types::{Constant, DataType, VariantType};

/// Encoded body of a compiled function, opaque to the compiler
pub trait FunctionCode: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// Factory of per-function emitters
pub trait Backend: Send + Sync {
    fn create_emitter(&self) -> Box<dyn Emitter>;
}

/// What the emitter needs to know when a function starts
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionHeader {
    pub name: String,
    pub class_path: String,
    pub is_static: bool,
    pub return_type: DataType,
}

/// Low-level instruction sink
pub trait Emitter {
    fn write_start(&mut self, header: &FunctionHeader);
    fn write_end(&mut self) -> Arc<dyn FunctionCode>;

    // Frame
    fn add_parameter(&mut self, name: &str, is_optional: bool, ty: &DataType) -> u32;
    fn add_local(&mut self, name: &str, ty: &DataType) -> u32;
    fn add_temporary(&mut self, ty: &DataType) -> u32;
    fn pop_temporary(&mut self);
    fn start_parameters(&mut self);
    fn end_parameters(&mut self);
    fn start_block(&mut self);
    fn end_block(&mut self);
    /// Reset a slot so it no longer keeps its value alive
    fn clear_address(&mut self, address: &Address);
    fn write_newline(&mut self, line: u32);

    // Values
    fn write_assign(&mut self, target: &Address, source: &Address);
    fn write_assign_with_conversion(&mut self, target: &Address, source: &Address);
    fn write_assign_true(&mut self, target: &Address);
    fn write_assign_default_parameter(&mut self, target: &Address, source: &Address, use_conversion: bool);
    fn write_unary_operator(&mut self, target: &Address, op: UnaryOp, operand: &Address);
    fn write_binary_operator(&mut self, target: &Address, op: BinaryOp, left: &Address, right: &Address);
    fn write_type_test(&mut self, target: &Address, source: &Address, ty: &DataType);
    fn write_typeof(&mut self, target: &Address, source: &Address);
    fn write_cast(&mut self, target: &Address, source: &Address, ty: &DataType);
    fn write_store_global(&mut self, target: &Address, index: u32);
    fn write_store_named_global(&mut self, target: &Address, name: &str);

    // Short-circuit and ternary
    fn write_and_left_operand(&mut self, left: &Address);
    fn write_and_right_operand(&mut self, right: &Address);
    fn write_end_and(&mut self, target: &Address);
    fn write_or_left_operand(&mut self, left: &Address);
    fn write_or_right_operand(&mut self, right: &Address);
    fn write_end_or(&mut self, target: &Address);
    fn write_start_ternary(&mut self, target: &Address);
    fn write_ternary_condition(&mut self, condition: &Address);
    fn write_ternary_true_expr(&mut self, expr: &Address);
    fn write_ternary_false_expr(&mut self, expr: &Address);
    fn write_end_ternary(&mut self);

    // Containers and properties
    fn write_get(&mut self, target: &Address, index: &Address, source: &Address);
    fn write_set(&mut self, target: &Address, index: &Address, source: &Address);
    fn write_get_named(&mut self, target: &Address, name: &str, source: &Address);
    fn write_set_named(&mut self, target: &Address, name: &str, source: &Address);
    fn write_construct(&mut self, target: &Address, ty: VariantType, args: &[Address]);
    fn write_construct_array(&mut self, target: &Address, elements: &[Address]);
    fn write_construct_typed_array(&mut self, target: &Address, element: &DataType, elements: &[Address]);
    fn write_construct_dictionary(&mut self, target: &Address, pairs: &[Address]);

    // Calls; `target` is `None` when the result is discarded
    fn write_call(&mut self, target: Option<&Address>, base: &Address, name: &str, args: &[Address]);
    fn write_call_async(&mut self, target: Option<&Address>, base: &Address, name: &str, args: &[Address]);
    fn write_call_self(&mut self, target: Option<&Address>, name: &str, args: &[Address]);
    fn write_call_self_async(&mut self, target: Option<&Address>, name: &str, args: &[Address]);
    fn write_super_call(&mut self, target: Option<&Address>, name: &str, args: &[Address]);
    fn write_call_utility(&mut self, target: Option<&Address>, name: &str, args: &[Address]);
    fn write_call_script_utility(&mut self, target: Option<&Address>, name: &str, args: &[Address]);
    fn write_call_builtin_type(
        &mut self,
        target: Option<&Address>,
        base: &Address,
        ty: VariantType,
        name: &str,
        args: &[Address],
    );
    fn write_call_method_bind(
        &mut self,
        target: Option<&Address>,
        base: &Address,
        class: &str,
        name: &str,
        args: &[Address],
    );
    fn write_call_method_bind_validated(
        &mut self,
        target: Option<&Address>,
        base: &Address,
        class: &str,
        name: &str,
        args: &[Address],
    );
    fn write_call_script_function(&mut self, target: Option<&Address>, base: &Address, name: &str, args: &[Address]);
    fn write_lambda(&mut self, target: &Address, function: &Arc<FunctionDescriptor>, captures: &[Address], use_self: bool);
    fn write_await(&mut self, target: &Address, operand: &Address);

    // Control flow
    fn write_if(&mut self, condition: &Address);
    fn write_else(&mut self);
    fn write_endif(&mut self);
    /// Skip to the matching end when `value` holds a shared kind at runtime
    fn write_jump_if_shared(&mut self, value: &Address);
    fn write_end_jump_if_shared(&mut self);
    fn start_for(&mut self, iterator_ty: &DataType, list_ty: &DataType, is_range: bool);
    fn write_for_range_assignment(&mut self, from: &Address, to: &Address, step: &Address);
    fn write_for_list_assignment(&mut self, list: &Address);
    fn write_for(&mut self, variable: &Address, use_conversion: bool, is_range: bool);
    fn write_endfor(&mut self, is_range: bool);
    fn start_while_condition(&mut self);
    fn write_while(&mut self, condition: &Address);
    fn write_endwhile(&mut self);
    fn write_break(&mut self);
    fn write_continue(&mut self);
    fn write_breakpoint(&mut self);
    fn write_return(&mut self, value: &Address);
    fn write_assert(&mut self, test: &Address, message: &Address);
}

/// Shape of a lambda used to match identities across recompilations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LambdaShape {
    pub capture_count: u32,
    pub uses_self: bool,
}

/// A compiled function
///
/// Superseded, never mutated, on recompilation.
#[derive(Debug)]
pub struct FunctionDescriptor {
    pub name: String,
    pub class_path: String,
    /// Declared parameters (captures not included)
    pub argument_count: u32,
    pub default_argument_count: u32,
    pub vararg_slot: Option<u32>,
    pub return_type: DataType,
    pub is_static: bool,
    pub is_coroutine: bool,
    pub lambda: Option<LambdaShape>,
    /// Default values of trailing parameters that folded to constants
    pub constant_defaults: Vec<Option<Constant>>,
    pub line: u32,
    /// Lambdas created directly in this function, in source order
    pub lambdas: Vec<Arc<FunctionDescriptor>>,
    pub code: Arc<dyn FunctionCode>,
}

impl FunctionDescriptor {
    pub fn required_argument_count(&self) -> u32 {
        self.argument_count - self.default_argument_count
    }

    pub fn capture_count(&self) -> u32 {
        self.lambda.map_or(0, |l| l.capture_count)
    }

    pub fn uses_self(&self) -> bool {
        self.lambda.is_some_and(|l| l.uses_self)
    }

    /// Downcast the encoded body to the backend's concrete type
    pub fn code_as<T: 'static>(&self) -> Option<&T> {
        self.code.as_any().downcast_ref::<T>()
    }
}
