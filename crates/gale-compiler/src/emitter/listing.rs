//! Listing backend
//!
//! Records every emitter operation into an [`IrFunction`].

use std::sync::Arc;

use super::{Address, Backend, Emitter, FunctionCode, FunctionDescriptor, FunctionHeader};
use crate::ast::{BinaryOp, UnaryOp};
use crate::ir::{CallKind, Instr, IrFunction};
use crate::types::{DataType, VariantType};

#[derive(Debug, Default, Clone, Copy)]
pub struct ListingBackend;

impl Backend for ListingBackend {
    fn create_emitter(&self) -> Box<dyn Emitter> {
        Box::new(ListingEmitter::new())
    }
}

/// Emitter that records a flat instruction listing
#[derive(Debug, Default)]
pub struct ListingEmitter {
    function: Option<IrFunction>,
    /// Live temporaries, innermost last
    temporaries: Vec<u32>,
    /// Live local slot count at the start of each open block
    block_marks: Vec<u32>,
    live_locals: u32,
}

impl ListingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn function_mut(&mut self) -> &mut IrFunction {
        self.function
            .get_or_insert_with(|| IrFunction::new("<unnamed>", "", false, DataType::Variant))
    }

    fn push(&mut self, instr: Instr) {
        self.function_mut().instructions.push(instr);
    }

    fn call(&mut self, target: Option<&Address>, kind: CallKind, base: Option<&Address>, name: &str, args: &[Address]) {
        self.push(Instr::Call {
            target: target.cloned(),
            kind,
            base: base.cloned(),
            name: name.to_string(),
            args: args.to_vec(),
        });
    }
}

impl Emitter for ListingEmitter {
    fn write_start(&mut self, header: &FunctionHeader) {
        self.function = Some(IrFunction::new(
            header.name.clone(),
            header.class_path.clone(),
            header.is_static,
            header.return_type.clone(),
        ));
        self.temporaries.clear();
        self.block_marks.clear();
        self.live_locals = 0;
    }

    fn write_end(&mut self) -> Arc<dyn FunctionCode> {
        let function = self
            .function
            .take()
            .unwrap_or_else(|| IrFunction::new("<unnamed>", "", false, DataType::Variant));
        Arc::new(function)
    }

    fn add_parameter(&mut self, name: &str, _is_optional: bool, ty: &DataType) -> u32 {
        let function = self.function_mut();
        function.params.push((name.to_string(), ty.clone()));
        function.params.len() as u32 - 1
    }

    fn add_local(&mut self, name: &str, ty: &DataType) -> u32 {
        let slot = self.live_locals;
        self.live_locals += 1;
        let live = self.live_locals;
        let function = self.function_mut();
        function.locals.push((name.to_string(), ty.clone()));
        function.max_locals = function.max_locals.max(live);
        self.push(Instr::DeclareLocal {
            slot,
            name: name.to_string(),
            ty: ty.clone(),
        });
        slot
    }

    fn add_temporary(&mut self, ty: &DataType) -> u32 {
        let slot = self.temporaries.len() as u32;
        self.temporaries.push(slot);
        let live = self.temporaries.len() as u32;
        let function = self.function_mut();
        function.max_temporaries = function.max_temporaries.max(live);
        self.push(Instr::PushTemp { slot, ty: ty.clone() });
        slot
    }

    fn pop_temporary(&mut self) {
        if let Some(slot) = self.temporaries.pop() {
            self.push(Instr::PopTemp { slot });
        }
    }

    fn start_parameters(&mut self) {
        self.push(Instr::StartParameters);
    }

    fn end_parameters(&mut self) {
        self.push(Instr::EndParameters);
    }

    fn start_block(&mut self) {
        self.block_marks.push(self.live_locals);
        self.push(Instr::StartBlock);
    }

    fn end_block(&mut self) {
        if let Some(mark) = self.block_marks.pop() {
            self.live_locals = mark;
        }
        self.push(Instr::EndBlock);
    }

    fn clear_address(&mut self, address: &Address) {
        self.push(Instr::Clear(address.clone()));
    }

    fn write_newline(&mut self, line: u32) {
        self.push(Instr::Line(line));
    }

    fn write_assign(&mut self, target: &Address, source: &Address) {
        self.push(Instr::Assign {
            target: target.clone(),
            source: source.clone(),
            convert: false,
        });
    }

    fn write_assign_with_conversion(&mut self, target: &Address, source: &Address) {
        self.push(Instr::Assign {
            target: target.clone(),
            source: source.clone(),
            convert: true,
        });
    }

    fn write_assign_true(&mut self, target: &Address) {
        self.push(Instr::AssignBool {
            target: target.clone(),
            value: true,
        });
    }

    fn write_assign_default_parameter(&mut self, target: &Address, source: &Address, use_conversion: bool) {
        self.push(Instr::AssignDefault {
            target: target.clone(),
            source: source.clone(),
            convert: use_conversion,
        });
    }

    fn write_unary_operator(&mut self, target: &Address, op: UnaryOp, operand: &Address) {
        self.push(Instr::Unary {
            target: target.clone(),
            op,
            operand: operand.clone(),
        });
    }

    fn write_binary_operator(&mut self, target: &Address, op: BinaryOp, left: &Address, right: &Address) {
        self.push(Instr::Binary {
            target: target.clone(),
            op,
            left: left.clone(),
            right: right.clone(),
        });
    }

    fn write_type_test(&mut self, target: &Address, source: &Address, ty: &DataType) {
        self.push(Instr::TypeTest {
            target: target.clone(),
            source: source.clone(),
            ty: ty.clone(),
        });
    }

    fn write_typeof(&mut self, target: &Address, source: &Address) {
        self.push(Instr::TypeOf {
            target: target.clone(),
            source: source.clone(),
        });
    }

    fn write_cast(&mut self, target: &Address, source: &Address, ty: &DataType) {
        self.push(Instr::Cast {
            target: target.clone(),
            source: source.clone(),
            ty: ty.clone(),
        });
    }

    fn write_store_global(&mut self, target: &Address, index: u32) {
        self.push(Instr::StoreGlobal {
            target: target.clone(),
            index,
        });
    }

    fn write_store_named_global(&mut self, target: &Address, name: &str) {
        self.push(Instr::StoreNamedGlobal {
            target: target.clone(),
            name: name.to_string(),
        });
    }

    fn write_and_left_operand(&mut self, left: &Address) {
        self.push(Instr::AndLeft(left.clone()));
    }

    fn write_and_right_operand(&mut self, right: &Address) {
        self.push(Instr::AndRight(right.clone()));
    }

    fn write_end_and(&mut self, target: &Address) {
        self.push(Instr::EndAnd(target.clone()));
    }

    fn write_or_left_operand(&mut self, left: &Address) {
        self.push(Instr::OrLeft(left.clone()));
    }

    fn write_or_right_operand(&mut self, right: &Address) {
        self.push(Instr::OrRight(right.clone()));
    }

    fn write_end_or(&mut self, target: &Address) {
        self.push(Instr::EndOr(target.clone()));
    }

    fn write_start_ternary(&mut self, target: &Address) {
        self.push(Instr::StartTernary(target.clone()));
    }

    fn write_ternary_condition(&mut self, condition: &Address) {
        self.push(Instr::TernaryCondition(condition.clone()));
    }

    fn write_ternary_true_expr(&mut self, expr: &Address) {
        self.push(Instr::TernaryTrue(expr.clone()));
    }

    fn write_ternary_false_expr(&mut self, expr: &Address) {
        self.push(Instr::TernaryFalse(expr.clone()));
    }

    fn write_end_ternary(&mut self) {
        self.push(Instr::EndTernary);
    }

    fn write_get(&mut self, target: &Address, index: &Address, source: &Address) {
        self.push(Instr::Get {
            target: target.clone(),
            index: index.clone(),
            source: source.clone(),
        });
    }

    fn write_set(&mut self, target: &Address, index: &Address, source: &Address) {
        self.push(Instr::Set {
            target: target.clone(),
            index: index.clone(),
            source: source.clone(),
        });
    }

    fn write_get_named(&mut self, target: &Address, name: &str, source: &Address) {
        self.push(Instr::GetNamed {
            target: target.clone(),
            name: name.to_string(),
            source: source.clone(),
        });
    }

    fn write_set_named(&mut self, target: &Address, name: &str, source: &Address) {
        self.push(Instr::SetNamed {
            target: target.clone(),
            name: name.to_string(),
            source: source.clone(),
        });
    }

    fn write_construct(&mut self, target: &Address, ty: VariantType, args: &[Address]) {
        self.push(Instr::Construct {
            target: target.clone(),
            ty,
            args: args.to_vec(),
        });
    }

    fn write_construct_array(&mut self, target: &Address, elements: &[Address]) {
        self.push(Instr::ConstructArray {
            target: target.clone(),
            element: None,
            elements: elements.to_vec(),
        });
    }

    fn write_construct_typed_array(&mut self, target: &Address, element: &DataType, elements: &[Address]) {
        self.push(Instr::ConstructArray {
            target: target.clone(),
            element: Some(element.clone()),
            elements: elements.to_vec(),
        });
    }

    fn write_construct_dictionary(&mut self, target: &Address, pairs: &[Address]) {
        self.push(Instr::ConstructDictionary {
            target: target.clone(),
            pairs: pairs.to_vec(),
        });
    }

    fn write_call(&mut self, target: Option<&Address>, base: &Address, name: &str, args: &[Address]) {
        self.call(target, CallKind::Dynamic, Some(base), name, args);
    }

    fn write_call_async(&mut self, target: Option<&Address>, base: &Address, name: &str, args: &[Address]) {
        self.call(target, CallKind::Async, Some(base), name, args);
    }

    fn write_call_self(&mut self, target: Option<&Address>, name: &str, args: &[Address]) {
        self.call(target, CallKind::SelfCall, None, name, args);
    }

    fn write_call_self_async(&mut self, target: Option<&Address>, name: &str, args: &[Address]) {
        self.call(target, CallKind::SelfAsync, None, name, args);
    }

    fn write_super_call(&mut self, target: Option<&Address>, name: &str, args: &[Address]) {
        self.call(target, CallKind::Super, None, name, args);
    }

    fn write_call_utility(&mut self, target: Option<&Address>, name: &str, args: &[Address]) {
        self.call(target, CallKind::Utility, None, name, args);
    }

    fn write_call_script_utility(&mut self, target: Option<&Address>, name: &str, args: &[Address]) {
        self.call(target, CallKind::ScriptUtility, None, name, args);
    }

    fn write_call_builtin_type(
        &mut self,
        target: Option<&Address>,
        base: &Address,
        ty: VariantType,
        name: &str,
        args: &[Address],
    ) {
        self.call(target, CallKind::BuiltinType(ty), Some(base), name, args);
    }

    fn write_call_method_bind(
        &mut self,
        target: Option<&Address>,
        base: &Address,
        class: &str,
        name: &str,
        args: &[Address],
    ) {
        self.call(target, CallKind::MethodBind(class.to_string()), Some(base), name, args);
    }

    fn write_call_method_bind_validated(
        &mut self,
        target: Option<&Address>,
        base: &Address,
        class: &str,
        name: &str,
        args: &[Address],
    ) {
        self.call(target, CallKind::MethodBindValidated(class.to_string()), Some(base), name, args);
    }

    fn write_call_script_function(&mut self, target: Option<&Address>, base: &Address, name: &str, args: &[Address]) {
        self.call(target, CallKind::ScriptFunction, Some(base), name, args);
    }

    fn write_lambda(&mut self, target: &Address, function: &Arc<FunctionDescriptor>, captures: &[Address], use_self: bool) {
        self.push(Instr::Lambda {
            target: target.clone(),
            function: function.name.clone(),
            captures: captures.to_vec(),
            use_self,
        });
    }

    fn write_await(&mut self, target: &Address, operand: &Address) {
        self.push(Instr::Await {
            target: target.clone(),
            operand: operand.clone(),
        });
    }

    fn write_if(&mut self, condition: &Address) {
        self.push(Instr::If(condition.clone()));
    }

    fn write_else(&mut self) {
        self.push(Instr::Else);
    }

    fn write_endif(&mut self) {
        self.push(Instr::EndIf);
    }

    fn write_jump_if_shared(&mut self, value: &Address) {
        self.push(Instr::JumpIfShared(value.clone()));
    }

    fn write_end_jump_if_shared(&mut self) {
        self.push(Instr::EndJumpIfShared);
    }

    fn start_for(&mut self, iterator_ty: &DataType, list_ty: &DataType, is_range: bool) {
        self.push(Instr::StartFor {
            iterator_ty: iterator_ty.clone(),
            list_ty: list_ty.clone(),
            range: is_range,
        });
    }

    fn write_for_range_assignment(&mut self, from: &Address, to: &Address, step: &Address) {
        self.push(Instr::ForRange {
            from: from.clone(),
            to: to.clone(),
            step: step.clone(),
        });
    }

    fn write_for_list_assignment(&mut self, list: &Address) {
        self.push(Instr::ForList(list.clone()));
    }

    fn write_for(&mut self, variable: &Address, use_conversion: bool, is_range: bool) {
        self.push(Instr::For {
            variable: variable.clone(),
            convert: use_conversion,
            range: is_range,
        });
    }

    fn write_endfor(&mut self, is_range: bool) {
        self.push(Instr::EndFor { range: is_range });
    }

    fn start_while_condition(&mut self) {
        self.push(Instr::StartWhileCondition);
    }

    fn write_while(&mut self, condition: &Address) {
        self.push(Instr::While(condition.clone()));
    }

    fn write_endwhile(&mut self) {
        self.push(Instr::EndWhile);
    }

    fn write_break(&mut self) {
        self.push(Instr::Break);
    }

    fn write_continue(&mut self) {
        self.push(Instr::Continue);
    }

    fn write_breakpoint(&mut self) {
        self.push(Instr::Breakpoint);
    }

    fn write_return(&mut self, value: &Address) {
        self.push(Instr::Return(value.clone()));
    }

    fn write_assert(&mut self, test: &Address, message: &Address) {
        self.push(Instr::Assert {
            test: test.clone(),
            message: message.clone(),
        });
    }
}
