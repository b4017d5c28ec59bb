//! Expression Lowering
//!
//! Every expression lowers to an [`Address`]. A result temporary is acquired
//! before the operands so operand temporaries can be released, innermost
//! first, while the result stays live for the caller to release.

use super::function::FunctionCompiler;
use crate::ast::{BinaryOp, Expr, ExprKind, FunctionNode, SubscriptKey};
use crate::emitter::{Address, AddressMode};
use crate::error::CompileResult;
use crate::types::DataType;

impl<'a> FunctionCompiler<'a> {
    pub(super) fn lower_expr(&mut self, expr: &Expr) -> CompileResult<Address> {
        if let Some(value) = &expr.folded {
            return Ok(Address::constant(value.clone()));
        }

        match &expr.kind {
            ExprKind::Literal(value) => Ok(Address::constant(value.clone())),
            ExprKind::Identifier(ident) => self.resolve_identifier(expr, ident, false),
            ExprKind::SelfRef => Ok(Address::new(AddressMode::SelfRef, expr.ty.clone())),
            ExprKind::Array(elements) => {
                let result = self.add_temporary(&expr.ty);
                let values = self.lower_list(elements)?;
                match expr.ty.element_type() {
                    Some(element) => self.emitter.write_construct_typed_array(&result, element, &values),
                    None => self.emitter.write_construct_array(&result, &values),
                }
                self.release_all(&values);
                Ok(result)
            }
            ExprKind::Dictionary(pairs) => {
                let result = self.add_temporary(&expr.ty);
                let mut values = Vec::with_capacity(pairs.len() * 2);
                for (key, value) in pairs {
                    values.push(self.lower_expr(key)?);
                    values.push(self.lower_expr(value)?);
                }
                self.emitter.write_construct_dictionary(&result, &values);
                self.release_all(&values);
                Ok(result)
            }
            ExprKind::Binary { op: BinaryOp::And, lhs, rhs } => {
                let result = self.add_temporary(&DataType::bool());
                let left = self.lower_expr(lhs)?;
                self.emitter.write_and_left_operand(&left);
                let right = self.lower_expr(rhs)?;
                self.emitter.write_and_right_operand(&right);
                self.emitter.write_end_and(&result);
                self.release(&right);
                self.release(&left);
                Ok(result)
            }
            ExprKind::Binary { op: BinaryOp::Or, lhs, rhs } => {
                let result = self.add_temporary(&DataType::bool());
                let left = self.lower_expr(lhs)?;
                self.emitter.write_or_left_operand(&left);
                let right = self.lower_expr(rhs)?;
                self.emitter.write_or_right_operand(&right);
                self.emitter.write_end_or(&result);
                self.release(&right);
                self.release(&left);
                Ok(result)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let result = self.add_temporary(&expr.ty);
                let left = self.lower_expr(lhs)?;
                let right = self.lower_expr(rhs)?;
                self.emitter.write_binary_operator(&result, *op, &left, &right);
                self.release(&right);
                self.release(&left);
                Ok(result)
            }
            ExprKind::Unary { op, operand } => {
                let result = self.add_temporary(&expr.ty);
                let value = self.lower_expr(operand)?;
                self.emitter.write_unary_operator(&result, *op, &value);
                self.release(&value);
                Ok(result)
            }
            ExprKind::Ternary { cond, then, otherwise } => {
                let result = self.add_temporary(&expr.ty);
                self.emitter.write_start_ternary(&result);
                let condition = self.lower_expr(cond)?;
                self.emitter.write_ternary_condition(&condition);
                self.release(&condition);
                let value = self.lower_expr(then)?;
                self.emitter.write_ternary_true_expr(&value);
                self.release(&value);
                let value = self.lower_expr(otherwise)?;
                self.emitter.write_ternary_false_expr(&value);
                self.release(&value);
                self.emitter.write_end_ternary();
                Ok(result)
            }
            ExprKind::TypeTest { operand, test } => {
                let result = self.add_temporary(&DataType::bool());
                let value = self.lower_expr(operand)?;
                self.emitter.write_type_test(&result, &value, test);
                self.release(&value);
                Ok(result)
            }
            ExprKind::Cast { operand, to } => {
                let result = self.add_temporary(to);
                let value = self.lower_expr(operand)?;
                self.emitter.write_cast(&result, &value, to);
                self.release(&value);
                Ok(result)
            }
            ExprKind::Subscript { base, key } => self.lower_subscript(expr, base, key),
            ExprKind::Call(call) => self.lower_call(expr, call, false),
            ExprKind::Await(operand) => {
                let result = self.add_temporary(&expr.ty);
                let value = match &operand.kind {
                    ExprKind::Call(call) => self.lower_call(operand, call, true)?,
                    _ => self.lower_expr(operand)?,
                };
                self.emitter.write_await(&result, &value);
                self.release(&value);
                Ok(result)
            }
            ExprKind::Assignment(assignment) => {
                self.lower_assignment(expr, assignment)?;
                Ok(Address::null())
            }
            ExprKind::Lambda(node) => self.lower_lambda(expr, node),
        }
    }

    /// Lower a member initializer; a bare identifier there never names a local
    pub(super) fn lower_initializer(&mut self, expr: &Expr) -> CompileResult<Address> {
        match &expr.kind {
            ExprKind::Identifier(ident) => self.resolve_identifier(expr, ident, true),
            _ => self.lower_expr(expr),
        }
    }

    pub(super) fn lower_list(&mut self, exprs: &[Expr]) -> CompileResult<Vec<Address>> {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            out.push(self.lower_expr(expr)?);
        }
        Ok(out)
    }

    fn lower_subscript(&mut self, expr: &Expr, base: &Expr, key: &SubscriptKey) -> CompileResult<Address> {
        match key {
            SubscriptKey::Attribute(name) => {
                // `self.member` reads the member like a bare identifier would
                if matches!(base.kind, ExprKind::SelfRef) {
                    if let Some(address) = self.read_member(name) {
                        return Ok(address);
                    }
                }
                let result = self.add_temporary(&expr.ty);
                let source = self.lower_expr(base)?;
                self.emitter.write_get_named(&result, name, &source);
                self.release(&source);
                Ok(result)
            }
            SubscriptKey::Index(index) => {
                let result = self.add_temporary(&expr.ty);
                let source = self.lower_expr(base)?;
                let key = self.lower_expr(index)?;
                self.emitter.write_get(&result, &key, &source);
                self.release(&key);
                self.release(&source);
                Ok(result)
            }
        }
    }

    fn lower_lambda(&mut self, expr: &Expr, node: &FunctionNode) -> CompileResult<Address> {
        let descriptor = self.compile_lambda(node)?;
        let result = self.add_temporary(&expr.ty);
        let captures = self.lower_list(&node.captures)?;
        self.emitter.write_lambda(&result, &descriptor, &captures, node.uses_self);
        self.release_all(&captures);
        Ok(result)
    }
}
