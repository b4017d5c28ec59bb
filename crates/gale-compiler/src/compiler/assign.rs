//! Assignment Lowering
//!
//! Identifier targets store directly or through the member's setter. Subscript
//! chains (`a.b[c].d = v`) read every intermediate container into a temporary,
//! set the innermost one, then write each container back into its parent
//! because value-type containers are copies. Shared containers are skipped on
//! write-back; containers of unknown type branch on the runtime kind.

use super::function::FunctionCompiler;
use crate::ast::{Assignment, Expr, ExprKind, SubscriptKey};
use crate::emitter::{Address, AddressMode};
use crate::error::{CompileError, CompileResult};

/// One `base.name` or `base[index]` step of an assignment target
struct Link<'e> {
    node: &'e Expr,
    key: &'e SubscriptKey,
}

/// Key of a link once lowered
enum LinkKey<'e> {
    Named(&'e str),
    Index(Address),
}

impl<'a> FunctionCompiler<'a> {
    pub(super) fn lower_assignment(&mut self, expr: &Expr, assignment: &Assignment) -> CompileResult<()> {
        let target = assignment.target.as_ref();
        match &target.kind {
            ExprKind::Identifier(ident) => self.assign_identifier(assignment, &ident.name),
            ExprKind::Subscript {
                base,
                key: SubscriptKey::Attribute(name),
            } if matches!(base.kind, ExprKind::SelfRef) && self.is_own_member(name) => {
                self.assign_identifier(assignment, name)
            }
            ExprKind::Subscript { .. } => self.assign_chain(assignment),
            _ => Err(CompileError::internal("assignment to a non-assignable expression", expr.pos)),
        }
    }

    fn is_own_member(&self, name: &str) -> bool {
        !self.scope.is_static && self.class_data().members.contains_key(name)
    }

    fn assign_identifier(&mut self, assignment: &Assignment, name: &str) -> CompileResult<()> {
        let target = assignment.target.as_ref();
        let storage = match self.resolve_storage(target, name) {
            Ok(storage) => storage,
            Err(_) if self.is_native_property(name) => {
                let value = self.assigned_value(assignment)?;
                self.emitter.write_set_named(&Address::self_ref(), name, &value);
                self.release(&value);
                return Ok(());
            }
            Err(error) => return Err(error),
        };
        let setter = self.active_setter(&storage);
        let value = self.assigned_value(assignment)?;

        match setter {
            Some(setter) => {
                let receiver = self.setter_receiver(&storage);
                if assignment.use_conversion {
                    let converted = self.add_temporary(&storage.address.ty);
                    self.emitter.write_assign_with_conversion(&converted, &value);
                    self.emitter.write_call(None, &receiver, &setter, &[converted.clone()]);
                    self.release(&converted);
                } else {
                    self.emitter.write_call(None, &receiver, &setter, &[value.clone()]);
                }
            }
            None => self.store(&storage.address, &value, assignment.use_conversion),
        }

        self.release(&value);
        Ok(())
    }

    /// Right-hand side, combined with the current target value for compound forms
    fn assigned_value(&mut self, assignment: &Assignment) -> CompileResult<Address> {
        let target = assignment.target.as_ref();
        match assignment.op {
            Some(op) => {
                let result = self.add_temporary(&target.ty);
                let previous = self.lower_expr(target)?;
                let operand = self.lower_expr(&assignment.value)?;
                self.emitter.write_binary_operator(&result, op, &previous, &operand);
                self.release(&operand);
                self.release(&previous);
                Ok(result)
            }
            None => self.lower_expr(&assignment.value),
        }
    }

    fn assign_chain(&mut self, assignment: &Assignment) -> CompileResult<()> {
        let mut links = Vec::new();
        let mut cursor = assignment.target.as_ref();
        while let ExprKind::Subscript { base, key } = &cursor.kind {
            links.push(Link { node: cursor, key });
            cursor = base;
        }
        links.reverse();

        // `self.member.…` roots at the member so its setter runs
        let mut root = cursor;
        let mut root_name = match &root.kind {
            ExprKind::Identifier(ident) => Some(ident.name.as_str()),
            _ => None,
        };
        if matches!(root.kind, ExprKind::SelfRef) && links.len() > 1 {
            let (node, key) = (links[0].node, links[0].key);
            if let SubscriptKey::Attribute(name) = key {
                if self.is_own_member(name) {
                    root = node;
                    root_name = Some(name.as_str());
                    links.remove(0);
                }
            }
        }
        let Some((last, intermediate)) = links.split_last() else {
            return Err(CompileError::internal("assignment chain without a subscript", root.pos));
        };

        let root_setter = match root_name {
            Some(name) => self
                .resolve_storage(root, name)
                .ok()
                .filter(|s| matches!(s.address.mode, AddressMode::Member(_) | AddressMode::StaticMember { .. }))
                .and_then(|storage| {
                    let setter = self.active_setter(&storage)?;
                    Some((self.setter_receiver(&storage), setter))
                }),
            None => None,
        };

        let mut acquired = Vec::new();
        let mut root_address = self.lower_expr(root)?;
        if root_setter.is_some() && !root_address.is_temporary() {
            let copy = self.add_temporary(&root.ty);
            self.emitter.write_assign(&copy, &root_address);
            root_address = copy;
        }
        acquired.push(root_address.clone());

        // Read each intermediate container; `values[i]` is the parent of link `i`
        let mut values = vec![root_address.clone()];
        let mut keys = Vec::with_capacity(intermediate.len());
        for link in intermediate {
            let key = self.lower_link_key(link.key, &mut acquired)?;
            let value = self.add_temporary(&link.node.ty);
            acquired.push(value.clone());
            let parent = values.last().cloned().unwrap_or_else(Address::null);
            self.write_link_get(&value, &key, &parent);
            keys.push(key);
            values.push(value);
        }

        let container = values.last().cloned().unwrap_or_else(Address::null);
        let final_key = self.lower_link_key(last.key, &mut acquired)?;
        let assigned = self.lower_expr(&assignment.value)?;
        acquired.push(assigned.clone());

        let stored = match assignment.op {
            Some(op) => {
                let result = self.add_temporary(&last.node.ty);
                acquired.push(result.clone());
                let previous = self.add_temporary(&last.node.ty);
                self.write_link_get(&previous, &final_key, &container);
                self.emitter.write_binary_operator(&result, op, &previous, &assigned);
                self.release(&previous);
                result
            }
            None => assigned,
        };
        self.write_link_set(&container, &final_key, &stored);

        for (index, link) in intermediate.iter().enumerate().rev() {
            let value = &values[index + 1];
            let parent = &values[index];
            let key = &keys[index];
            match link.node.ty.is_shared() {
                Some(true) => {}
                Some(false) => self.write_link_set(parent, key, value),
                None => {
                    self.emitter.write_jump_if_shared(value);
                    self.write_link_set(parent, key, value);
                    self.emitter.write_end_jump_if_shared();
                }
            }
        }

        if let Some((receiver, setter)) = root_setter {
            self.emitter.write_call(None, &receiver, &setter, &[root_address]);
        }

        self.release_all(&acquired);
        Ok(())
    }

    fn lower_link_key<'e>(&mut self, key: &'e SubscriptKey, acquired: &mut Vec<Address>) -> CompileResult<LinkKey<'e>> {
        match key {
            SubscriptKey::Attribute(name) => Ok(LinkKey::Named(name)),
            SubscriptKey::Index(index) => {
                let address = self.lower_expr(index)?;
                acquired.push(address.clone());
                Ok(LinkKey::Index(address))
            }
        }
    }

    fn write_link_get(&mut self, target: &Address, key: &LinkKey<'_>, source: &Address) {
        match key {
            LinkKey::Named(name) => self.emitter.write_get_named(target, name, source),
            LinkKey::Index(index) => self.emitter.write_get(target, index, source),
        }
    }

    fn write_link_set(&mut self, container: &Address, key: &LinkKey<'_>, value: &Address) {
        match key {
            LinkKey::Named(name) => self.emitter.write_set_named(container, name, value),
            LinkKey::Index(index) => self.emitter.write_set(container, index, value),
        }
    }
}
