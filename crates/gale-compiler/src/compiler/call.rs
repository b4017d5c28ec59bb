//! Call Lowering
//!
//! Dispatch order: builtin-type constructor, host utility, language utility,
//! super call, then by callee shape. Calls on a receiver statically typed as a
//! native class use the method-bind form, validated when the argument types
//! match the registered signature exactly.

use super::function::FunctionCompiler;
use crate::ast::{Call, Callee, Expr};
use crate::emitter::{Address, AddressMode};
use crate::error::{CompileError, CompileResult};
use crate::registry::{is_script_utility, MethodSignature};
use crate::types::{Constant, DataType, VariantType};

impl<'a> FunctionCompiler<'a> {
    /// Lower a call; `awaited` marks the one call an enclosing `await` suspends on
    pub(super) fn lower_call(&mut self, expr: &Expr, call: &Call, awaited: bool) -> CompileResult<Address> {
        let discard = expr.ty == DataType::nil() && !awaited;
        let result = if discard {
            None
        } else {
            Some(self.add_temporary(&expr.ty))
        };

        match (&call.callee, call.is_super) {
            (Callee::Attribute { name, .. }, true) => {
                return Err(CompileError::MalformedCallee {
                    callee: name.clone(),
                    reason: "a super call cannot have a receiver".to_string(),
                    pos: expr.pos,
                })
            }
            (Callee::Name(name), _) if name.is_empty() => {
                return Err(CompileError::MalformedCallee {
                    callee: String::new(),
                    reason: "empty callee".to_string(),
                    pos: expr.pos,
                })
            }
            (Callee::Name(name), is_super) => {
                self.lower_named_call(expr, name, &call.args, result.as_ref(), awaited, is_super)?
            }
            (Callee::Attribute { base, name }, false) => {
                self.lower_method_call(base, name, &call.args, result.as_ref(), awaited)?
            }
        }

        Ok(result.unwrap_or_else(Address::null))
    }

    fn lower_named_call(
        &mut self,
        expr: &Expr,
        name: &str,
        args: &[Expr],
        result: Option<&Address>,
        awaited: bool,
        is_super: bool,
    ) -> CompileResult<()> {
        let values = self.lower_list(args)?;

        if let Some(kind) = expr.builtin_constructor() {
            match result {
                Some(target) => self.emitter.write_construct(target, kind, &values),
                None => {
                    return Err(CompileError::internal(
                        format!("constructor {} without a result", kind),
                        expr.pos,
                    ))
                }
            }
        } else if self.ctx.registry.has_utility_function(name) {
            self.emitter.write_call_utility(result, name, &values);
        } else if is_script_utility(name) {
            self.emitter.write_call_script_utility(result, name, &values);
        } else if is_super {
            self.emitter.write_super_call(result, name, &values);
        } else if awaited {
            if self.scope.is_static {
                self.emitter.write_call_async(result, &Address::class(), name, &values);
            } else {
                self.emitter.write_call_self_async(result, name, &values);
            }
        } else if let Some((class, signature)) = self.native_self_method(name) {
            let receiver = Address::self_ref();
            self.write_method_bind(result, &receiver, &class, name, &signature, args, &values);
        } else if self.scope.is_static {
            self.emitter.write_call(result, &Address::class(), name, &values);
        } else {
            self.emitter.write_call_self(result, name, &values);
        }

        self.release_all(&values);
        Ok(())
    }

    /// A method of the native base not overridden by the script
    fn native_self_method(&self, name: &str) -> Option<(String, MethodSignature)> {
        if self.scope.is_static || self.ctx.classes.callable_owner(self.class, name).is_some() {
            return None;
        }
        self.ctx.registry.find_method(&self.class_data().native_base, name)
    }

    fn lower_method_call(
        &mut self,
        base: &Expr,
        name: &str,
        args: &[Expr],
        result: Option<&Address>,
        awaited: bool,
    ) -> CompileResult<()> {
        let receiver = self.lower_expr(base)?;
        let values = self.lower_list(args)?;

        if let AddressMode::Constant(Constant::ScriptClass(_)) = &receiver.mode {
            self.emitter.write_call_script_function(result, &receiver, name, &values);
        } else if awaited {
            self.emitter.write_call_async(result, &receiver, name, &values);
        } else {
            match &base.ty {
                DataType::Builtin { kind, .. } if self.builtin_method(*kind, name) => {
                    self.emitter.write_call_builtin_type(result, &receiver, *kind, name, &values);
                }
                DataType::Native(class) => match self.ctx.registry.find_method(class, name) {
                    Some((declaring, signature)) => {
                        self.write_method_bind(result, &receiver, &declaring, name, &signature, args, &values)
                    }
                    None => self.emitter.write_call(result, &receiver, name, &values),
                },
                _ => self.emitter.write_call(result, &receiver, name, &values),
            }
        }

        self.release_all(&values);
        self.release(&receiver);
        Ok(())
    }

    fn builtin_method(&self, kind: VariantType, name: &str) -> bool {
        self.ctx.registry.builtin_method(kind, name).is_some()
    }

    #[allow(clippy::too_many_arguments)]
    fn write_method_bind(
        &mut self,
        result: Option<&Address>,
        receiver: &Address,
        class: &str,
        name: &str,
        signature: &MethodSignature,
        args: &[Expr],
        values: &[Address],
    ) {
        let arg_types: Vec<DataType> = args.iter().map(|a| a.ty.clone()).collect();
        if self.ctx.options.validated_calls && signature.matches_exactly(&arg_types) {
            self.emitter
                .write_call_method_bind_validated(result, receiver, class, name, values);
        } else {
            self.emitter.write_call_method_bind(result, receiver, class, name, values);
        }
    }
}

