//! Function Compiler
//!
//! Assembles one function: parameters, default-argument pre-pass, body. Also
//! synthesizes the implicit constructor (`@implicit_new`), the implicit ready
//! function (`@implicit_ready`) and the static initializer.

use std::sync::Arc;

use super::class::{ClassData, ClassId};
use super::scope::FunctionScope;
use super::CompileContext;
use crate::ast::{ExprKind, FunctionNode, Pos, VariableNode};
use crate::emitter::{Address, AddressMode, Emitter, FunctionDescriptor, FunctionHeader, LambdaShape};
use crate::error::{CompileError, CompileResult};
use crate::types::{DataType, VariantType};

/// Name of the user hook run last by the static initializer
pub const STATIC_INIT_HOOK: &str = "_static_init";

pub(crate) struct FunctionCompiler<'a> {
    pub(super) ctx: &'a CompileContext<'a>,
    /// Class owning the function
    pub(super) class: ClassId,
    pub(super) emitter: Box<dyn Emitter>,
    pub(super) scope: FunctionScope,
    /// Name of the function being compiled; accessors are not re-entered from themselves
    pub(super) function_name: String,
    /// Lambdas created directly in this function, in source order
    pub(super) lambdas: Vec<Arc<FunctionDescriptor>>,
    /// Line of the statement being lowered
    pub(super) line: u32,
}

impl<'a> FunctionCompiler<'a> {
    pub fn new(ctx: &'a CompileContext<'a>, class: ClassId, name: &str, is_static: bool) -> Self {
        Self {
            ctx,
            class,
            emitter: ctx.backend.create_emitter(),
            scope: FunctionScope::new(is_static),
            function_name: name.to_string(),
            lambdas: Vec::new(),
            line: 0,
        }
    }

    pub(super) fn class_data(&self) -> &'a ClassData<'a> {
        self.ctx.classes.get(self.class)
    }

    pub(super) fn class_path(&self) -> &'a str {
        &self.class_data().node.path
    }

    pub(super) fn pos(&self) -> Pos {
        Pos::new(self.line, 0)
    }

    /// Receiver of self-calls: the instance, or the class inside static functions
    pub(super) fn receiver(&self) -> Address {
        if self.scope.is_static {
            Address::class()
        } else {
            Address::self_ref()
        }
    }

    pub(super) fn add_temporary(&mut self, ty: &DataType) -> Address {
        let slot = self.emitter.add_temporary(ty);
        self.scope.push_temporary(slot);
        Address::new(AddressMode::Temporary(slot), ty.clone())
    }

    /// Release an address if it is a temporary
    pub(super) fn release(&mut self, address: &Address) {
        if let AddressMode::Temporary(slot) = address.mode {
            self.scope.pop_temporary(slot);
            self.emitter.pop_temporary();
        }
    }

    /// Release addresses in reverse acquisition order
    pub(super) fn release_all(&mut self, addresses: &[Address]) {
        for address in addresses.iter().rev() {
            self.release(address);
        }
    }

    fn header(&self, return_type: DataType) -> FunctionHeader {
        FunctionHeader {
            name: self.function_name.clone(),
            class_path: self.class_path().to_string(),
            is_static: self.scope.is_static,
            return_type,
        }
    }

    /// Compile a user function, accessor or lambda
    pub fn compile(mut self, node: &FunctionNode) -> CompileResult<Arc<FunctionDescriptor>> {
        let _span = tracing::debug_span!("function", name = %self.function_name).entered();
        self.line = node.line;

        // A body that never returns a value returns nothing, whatever was declared
        let return_type = if node.body.has_value_return() {
            node.return_type.clone()
        } else {
            DataType::nil()
        };
        self.emitter.write_start(&self.header(return_type.clone()));

        for capture in &node.captures {
            let ExprKind::Identifier(ident) = &capture.kind else {
                return Err(CompileError::internal("lambda capture is not an identifier", capture.pos));
            };
            let slot = self.emitter.add_parameter(&ident.name, false, &capture.ty);
            self.scope
                .add_parameter(&ident.name, Address::new(AddressMode::Parameter(slot), capture.ty.clone()));
        }

        let mut defaulted = Vec::new();
        for param in &node.params {
            let slot = self.emitter.add_parameter(&param.name, param.default.is_some(), &param.ty);
            let address = Address::new(AddressMode::Parameter(slot), param.ty.clone());
            self.scope.add_parameter(&param.name, address.clone());
            if let Some(default) = &param.default {
                defaulted.push((address, default, param.use_conversion));
            }
        }

        let vararg_slot = node.rest.as_ref().map(|rest| {
            let slot = self.emitter.add_parameter(&rest.name, false, &rest.ty);
            self.scope
                .add_parameter(&rest.name, Address::new(AddressMode::Parameter(slot), rest.ty.clone()));
            slot
        });

        if !defaulted.is_empty() {
            self.emitter.start_parameters();
            for (target, default, use_conversion) in &defaulted {
                let value = self.lower_expr(default)?;
                self.emitter.write_assign_default_parameter(target, &value, *use_conversion);
                self.release(&value);
            }
            self.emitter.end_parameters();
        }
        let constant_defaults = defaulted.iter().map(|(_, default, _)| default.folded.clone()).collect();

        self.lower_block(&node.body, false)?;
        self.check_balanced()?;

        let lambda = node.is_lambda.then(|| LambdaShape {
            capture_count: node.captures.len() as u32,
            uses_self: node.uses_self,
        });
        Ok(self.finish(FunctionDescriptor {
            name: String::new(),
            class_path: String::new(),
            argument_count: node.params.len() as u32,
            default_argument_count: node.default_arg_count() as u32,
            vararg_slot,
            return_type,
            is_static: false,
            is_coroutine: node.is_coroutine,
            lambda,
            constant_defaults,
            line: node.line,
            lambdas: Vec::new(),
            code: Arc::new(NoCode),
        }))
    }

    /// Synthesize `@implicit_new` (`onready == false`) or `@implicit_ready`
    pub fn compile_initializer(mut self, onready: bool) -> CompileResult<Arc<FunctionDescriptor>> {
        let _span = tracing::debug_span!("function", name = %self.function_name).entered();
        let node = self.class_data().node;
        self.line = node.line;
        self.emitter.write_start(&self.header(DataType::nil()));
        self.start_block();

        let fields: Vec<&VariableNode> = node.variables().filter(|v| !v.is_static).collect();
        if !onready {
            // Typed fields hold a valid default before any initializer runs
            for field in &fields {
                let target = self.member_address(&field.name)?;
                self.default_initialize(&target);
            }
        }
        for field in fields.iter().filter(|f| f.onready == onready) {
            let Some(initializer) = &field.initializer else {
                continue;
            };
            self.line = field.line;
            self.newline();
            let target = self.member_address(&field.name)?;
            let value = self.lower_initializer(initializer)?;
            self.store(&target, &value, field.use_conversion);
            self.release(&value);
        }

        self.end_block(&[]);
        self.check_balanced()?;
        let descriptor = self.synthesized(false);
        Ok(self.finish(descriptor))
    }

    /// Synthesize the static initializer run when the class loads
    pub fn compile_static_initializer(mut self) -> CompileResult<Arc<FunctionDescriptor>> {
        let _span = tracing::debug_span!("function", name = %self.function_name).entered();
        let node = self.class_data().node;
        self.line = node.line;
        self.emitter.write_start(&self.header(DataType::nil()));
        self.start_block();

        let fields: Vec<&VariableNode> = node.variables().filter(|v| v.is_static).collect();
        for field in &fields {
            let target = self.static_address(&field.name)?;
            self.default_initialize(&target);
        }
        for field in &fields {
            let Some(initializer) = &field.initializer else {
                continue;
            };
            self.line = field.line;
            self.newline();
            let target = self.static_address(&field.name)?;
            let value = self.lower_initializer(initializer)?;
            self.store(&target, &value, field.use_conversion);
            self.release(&value);
        }

        if node.functions().any(|f| f.name == STATIC_INIT_HOOK && f.is_static) {
            self.emitter.write_call(None, &Address::class(), STATIC_INIT_HOOK, &[]);
        }

        self.end_block(&[]);
        self.check_balanced()?;
        let descriptor = self.synthesized(true);
        Ok(self.finish(descriptor))
    }

    /// Compile a lambda with a fresh emitter; it shares this function's class and static-ness
    pub(super) fn compile_lambda(&mut self, node: &FunctionNode) -> CompileResult<Arc<FunctionDescriptor>> {
        let nested = FunctionCompiler::new(self.ctx, self.class, &node.name, self.scope.is_static);
        let descriptor = nested.compile(node)?;
        self.lambdas.push(descriptor.clone());
        Ok(descriptor)
    }

    fn synthesized(&self, is_static: bool) -> FunctionDescriptor {
        FunctionDescriptor {
            name: String::new(),
            class_path: String::new(),
            argument_count: 0,
            default_argument_count: 0,
            vararg_slot: None,
            return_type: DataType::nil(),
            is_static,
            is_coroutine: false,
            lambda: None,
            constant_defaults: Vec::new(),
            line: self.class_data().node.line,
            lambdas: Vec::new(),
            code: Arc::new(NoCode),
        }
    }

    /// Close the emitter and fill in what the compiler tracked
    fn finish(mut self, mut descriptor: FunctionDescriptor) -> Arc<FunctionDescriptor> {
        descriptor.code = self.emitter.write_end();
        descriptor.class_path = self.class_path().to_string();
        descriptor.name = self.function_name;
        descriptor.is_static = self.scope.is_static;
        descriptor.lambdas = self.lambdas;
        tracing::debug!(
            name = %descriptor.name,
            args = descriptor.argument_count,
            lambdas = descriptor.lambdas.len(),
            "compiled function"
        );
        Arc::new(descriptor)
    }

    fn check_balanced(&self) -> CompileResult<()> {
        let live = self.scope.live_temporaries();
        if live == 0 {
            Ok(())
        } else {
            Err(CompileError::internal(
                format!("{} temporaries still live at the end of {}", live, self.function_name),
                self.pos(),
            ))
        }
    }

    pub(super) fn member_address(&self, name: &str) -> CompileResult<Address> {
        self.class_data()
            .members
            .get(name)
            .map(|info| Address::new(AddressMode::Member(info.index), info.ty.clone()))
            .ok_or_else(|| CompileError::IdentifierNotFound {
                name: name.to_string(),
                pos: self.pos(),
            })
    }

    pub(super) fn static_address(&self, name: &str) -> CompileResult<Address> {
        self.class_data()
            .static_members
            .get(name)
            .map(|info| {
                Address::new(
                    AddressMode::StaticMember {
                        index: info.index,
                        owner: info.owner.clone(),
                    },
                    info.ty.clone(),
                )
            })
            .ok_or_else(|| CompileError::IdentifierNotFound {
                name: name.to_string(),
                pos: self.pos(),
            })
    }

    /// Give a typed slot the default value of its type; objects stay null
    pub(super) fn default_initialize(&mut self, target: &Address) {
        match &target.ty {
            DataType::Builtin {
                element: Some(element), ..
            } => self.emitter.write_construct_typed_array(target, element, &[]),
            DataType::Builtin { kind, .. } if !matches!(kind, VariantType::Nil | VariantType::Object) => {
                self.emitter.write_construct(target, *kind, &[])
            }
            _ => {}
        }
    }

    /// Plain or converting store
    pub(super) fn store(&mut self, target: &Address, value: &Address, use_conversion: bool) {
        if use_conversion {
            self.emitter.write_assign_with_conversion(target, value);
        } else {
            self.emitter.write_assign(target, value);
        }
    }

    pub(super) fn newline(&mut self) {
        if self.ctx.options.debug_line_info && self.line > 0 {
            self.emitter.write_newline(self.line);
        }
    }
}

/// Placeholder body, replaced by the emitter output in `finish`
#[derive(Debug)]
struct NoCode;

impl crate::emitter::FunctionCode for NoCode {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
