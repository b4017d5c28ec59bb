//! Identifier Resolution
//!
//! Rules are tried in a fixed order, first match wins:
//!
//! 1. function parameter
//! 2. local variable or constant (not while lowering a member's own initializer)
//!
//! Rules 1 and 2 only apply to names the analyzer bound as a parameter or
//! local; every other binding starts at rule 3.
//!
//! 3. instance member, read through its getter unless compiling that getter
//! 4. member function or signal of the class hierarchy, enclosing classes, or native base,
//!    then a property of the native base
//! 5. class constant, then native integer constant
//! 6. static member, with the same getter rule as (3)
//! 7. autoload singleton, global constant, global class, named global, native class

use super::function::FunctionCompiler;
use crate::ast::{Expr, ExprKind, Identifier};
use crate::emitter::{Address, AddressMode};
use crate::error::{CompileError, CompileResult};
use crate::script::MemberInfo;
use crate::types::{Constant, DataType};

/// Where an assignable name is stored
#[derive(Debug, Clone)]
pub(super) struct Storage {
    pub address: Address,
    pub setter: Option<String>,
}

impl<'a> FunctionCompiler<'a> {
    /// Lower an identifier read
    pub(super) fn resolve_identifier(
        &mut self,
        expr: &Expr,
        ident: &Identifier,
        in_initializer: bool,
    ) -> CompileResult<Address> {
        if let Some(value) = &expr.folded {
            return Ok(Address::constant(value.clone()));
        }
        let name = ident.name.as_str();
        let address = self.lookup(name, ident.binding.is_scoped(), &expr.ty, in_initializer)?.ok_or_else(|| {
            CompileError::IdentifierNotFound {
                name: name.to_string(),
                pos: expr.pos,
            }
        })?;
        tracing::trace!(name, binding = ?ident.binding, address = %address, "resolved identifier");
        Ok(address)
    }

    /// `scoped` names may be parameters or locals; any other binding skips
    /// rules 1 and 2 so a later `var` of the same name cannot capture it
    fn lookup(
        &mut self,
        name: &str,
        scoped: bool,
        ty: &DataType,
        in_initializer: bool,
    ) -> CompileResult<Option<Address>> {
        if scoped {
            if let Some(address) = self.scope.parameter(name) {
                return Ok(Some(address.clone()));
            }
            if !in_initializer {
                if let Some(address) = self.scope.local(name) {
                    return Ok(Some(address.clone()));
                }
            }
        }

        let classes = self.ctx.classes;
        if let Some(address) = self.read_member(name) {
            return Ok(Some(address));
        }

        if let Some(owner) = classes.callable_owner(self.class, name) {
            let source = if owner == self.class {
                self.receiver()
            } else {
                Address::constant(Constant::ScriptClass(classes.get(owner).node.path.clone()))
            };
            return Ok(Some(self.load_named(name, ty, &source)));
        }
        let native = self.class_data().native_base.as_str();
        let registry = self.ctx.registry;
        if registry.find_method(native, name).is_some() || registry.has_signal_in_hierarchy(native, name) {
            let source = self.receiver();
            return Ok(Some(self.load_named(name, ty, &source)));
        }
        if self.is_native_property(name) {
            return Ok(Some(self.load_named(name, ty, &Address::self_ref())));
        }

        if let Some(value) = classes.constant(self.class, name, registry) {
            return Ok(Some(Address::constant(value)));
        }

        if let Some(info) = classes.static_member(self.class, name) {
            let direct = Address::new(
                AddressMode::StaticMember {
                    index: info.index,
                    owner: info.owner.clone(),
                },
                info.ty.clone(),
            );
            return Ok(Some(self.read_through_getter(&info, direct, Address::class())));
        }

        Ok(self.lookup_global(name, ty))
    }

    /// Read an instance member of the current class (none inside static functions)
    pub(super) fn read_member(&mut self, name: &str) -> Option<Address> {
        if self.scope.is_static {
            return None;
        }
        let info = self.class_data().members.get(name)?;
        let direct = Address::new(AddressMode::Member(info.index), info.ty.clone());
        Some(self.read_through_getter(info, direct, Address::self_ref()))
    }

    fn lookup_global(&mut self, name: &str, ty: &DataType) -> Option<Address> {
        let globals = self.ctx.globals;
        if let Some(index) = globals.global_index(name) {
            if !globals.is_singleton(name) {
                if let Some(value) = globals.global_value(index) {
                    return Some(Address::constant(value.clone()));
                }
            }
            let temp = self.add_temporary(ty);
            self.emitter.write_store_global(&temp, index);
            return Some(temp);
        }
        if let Some(path) = globals.global_class_path(name) {
            return Some(Address::constant(Constant::ScriptClass(path.to_string())));
        }
        if globals.is_named_global(name) {
            let temp = self.add_temporary(ty);
            self.emitter.write_store_named_global(&temp, name);
            return Some(temp);
        }
        if self.ctx.registry.class_exists(name) {
            return Some(Address::constant(Constant::NativeClass(name.to_string())));
        }
        None
    }

    /// Call the getter unless it is the function being compiled
    fn read_through_getter(&mut self, info: &MemberInfo, direct: Address, receiver: Address) -> Address {
        match &info.getter {
            Some(getter) if *getter != self.function_name => {
                let temp = self.add_temporary(&info.ty);
                self.emitter.write_call(Some(&temp), &receiver, getter, &[]);
                temp
            }
            _ => direct,
        }
    }

    fn load_named(&mut self, name: &str, ty: &DataType, source: &Address) -> Address {
        let temp = self.add_temporary(ty);
        self.emitter.write_get_named(&temp, name, source);
        temp
    }

    /// Storage of an assignable name, bypassing getters
    pub(super) fn resolve_storage(&self, expr: &Expr, name: &str) -> CompileResult<Storage> {
        let scoped = matches!(&expr.kind, ExprKind::Identifier(ident) if ident.binding.is_scoped());
        if let Some(address) = scoped
            .then(|| self.scope.parameter(name).or_else(|| self.scope.local(name)))
            .flatten()
        {
            return Ok(Storage {
                address: address.clone(),
                setter: None,
            });
        }
        if !self.scope.is_static {
            if let Some(info) = self.class_data().members.get(name) {
                return Ok(Storage {
                    address: Address::new(AddressMode::Member(info.index), info.ty.clone()),
                    setter: info.setter.clone(),
                });
            }
        }
        if let Some(info) = self.ctx.classes.static_member(self.class, name) {
            return Ok(Storage {
                address: Address::new(
                    AddressMode::StaticMember {
                        index: info.index,
                        owner: info.owner.clone(),
                    },
                    info.ty.clone(),
                ),
                setter: info.setter,
            });
        }
        Err(CompileError::IdentifierNotFound {
            name: name.to_string(),
            pos: expr.pos,
        })
    }

    /// Property of the native base, reachable only through an instance
    pub(super) fn is_native_property(&self, name: &str) -> bool {
        !self.scope.is_static
            && self
                .ctx
                .registry
                .has_property_in_hierarchy(&self.class_data().native_base, name)
    }

    /// Setter to call when storing, unless compiling that setter
    pub(super) fn active_setter(&self, storage: &Storage) -> Option<String> {
        storage.setter.clone().filter(|setter| *setter != self.function_name)
    }

    /// Receiver for a setter call on `storage`
    pub(super) fn setter_receiver(&self, storage: &Storage) -> Address {
        match storage.address.mode {
            AddressMode::StaticMember { .. } => Address::class(),
            _ => Address::self_ref(),
        }
    }
}
