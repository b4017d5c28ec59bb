//! Statement Lowering
//!
//! Block locals are declared when their block starts. Loops and `match` open
//! an extra block holding their hidden locals (the loop variable,
//! `@match_value`, `@match_type`) so those leave scope with the statement.

use super::function::FunctionCompiler;
use crate::ast::{Expr, ForStmt, MatchBranch, Stmt, StmtKind, Suite, SuiteLocalKind, VarDecl};
use crate::emitter::{Address, AddressMode};
use crate::error::{CompileError, CompileResult};
use crate::types::{Constant, DataType, VariantType};

impl<'a> FunctionCompiler<'a> {
    pub(super) fn start_block(&mut self) {
        self.scope.push_block();
        self.emitter.start_block();
    }

    /// Close a block, first clearing the given locals that may hold objects
    pub(super) fn end_block(&mut self, locals: &[Address]) {
        for local in locals.iter().filter(|l| l.ty.can_contain_object()) {
            self.emitter.clear_address(local);
        }
        self.scope.pop_block();
        self.emitter.end_block();
    }

    pub(super) fn add_local(&mut self, name: &str, ty: &DataType) -> Address {
        let slot = self.emitter.add_local(name, ty);
        let address = Address::new(AddressMode::Local(slot), ty.clone());
        self.scope.declare(name, address.clone());
        address
    }

    /// Declare the names of `suite` in the current block; returns the variable slots
    pub(super) fn declare_block_locals(&mut self, suite: &Suite) -> Vec<Address> {
        let mut slots = Vec::new();
        for local in &suite.locals {
            match &local.kind {
                SuiteLocalKind::Variable(ty) | SuiteLocalKind::Bind(ty) => {
                    slots.push(self.add_local(&local.name, ty));
                }
                SuiteLocalKind::Constant(value) => {
                    self.scope.declare(&local.name, Address::constant(value.clone()));
                }
            }
        }
        slots
    }

    pub(super) fn lower_block(&mut self, suite: &Suite, clear_locals: bool) -> CompileResult<()> {
        self.start_block();
        let locals = self.declare_block_locals(suite);
        self.lower_statements(&suite.statements)?;
        self.end_block(if clear_locals { &locals } else { &[] });
        Ok(())
    }

    fn lower_statements(&mut self, statements: &[Stmt]) -> CompileResult<()> {
        for stmt in statements {
            self.lower_statement(stmt)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        self.line = stmt.line;
        self.newline();

        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let value = self.lower_expr(expr)?;
                self.release(&value);
            }
            StmtKind::Var(decl) => self.lower_var(stmt, decl)?,
            StmtKind::Const { .. } | StmtKind::Pass => {}
            StmtKind::If { cond, then, otherwise } => {
                let condition = self.lower_expr(cond)?;
                self.emitter.write_if(&condition);
                self.release(&condition);
                self.lower_block(then, true)?;
                if let Some(otherwise) = otherwise {
                    self.emitter.write_else();
                    self.lower_block(otherwise, true)?;
                }
                self.emitter.write_endif();
            }
            StmtKind::While { cond, body } => {
                self.start_block();
                self.emitter.start_while_condition();
                let condition = self.lower_expr(cond)?;
                self.emitter.write_while(&condition);
                self.release(&condition);
                let locals = self.declare_block_locals(body);
                self.lower_statements(&body.statements)?;
                self.emitter.write_endwhile();
                self.end_block(&locals);
            }
            StmtKind::For(for_stmt) => self.lower_for(for_stmt)?,
            StmtKind::Match { subject, branches } => self.lower_match(subject, branches)?,
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.lower_expr(expr)?,
                    None => Address::null(),
                };
                self.emitter.write_return(&value);
                self.release(&value);
            }
            StmtKind::Assert { cond, message } => {
                if self.ctx.options.emit_asserts {
                    let test = self.lower_expr(cond)?;
                    let message = match message {
                        Some(expr) => self.lower_expr(expr)?,
                        None => Address::null(),
                    };
                    self.emitter.write_assert(&test, &message);
                    self.release(&message);
                    self.release(&test);
                }
            }
            StmtKind::Breakpoint => {
                if self.ctx.options.breakpoints {
                    self.emitter.write_breakpoint();
                }
            }
            StmtKind::Break => self.emitter.write_break(),
            StmtKind::Continue => self.emitter.write_continue(),
        }
        Ok(())
    }

    fn lower_var(&mut self, stmt: &Stmt, decl: &VarDecl) -> CompileResult<()> {
        let Some(target) = self.scope.local(&decl.name).cloned() else {
            return Err(CompileError::internal(
                format!("local {} was not declared by its block", decl.name),
                stmt.pos(),
            ));
        };
        match &decl.initializer {
            Some(initializer) => {
                let value = self.lower_expr(initializer)?;
                self.store(&target, &value, decl.use_conversion);
                self.release(&value);
            }
            // Slots are reused across loop iterations, so an uninitialized var is reset
            None => match &decl.ty {
                DataType::Builtin { kind, .. } if !matches!(kind, VariantType::Nil | VariantType::Object) => {
                    self.default_initialize(&target)
                }
                _ => self.emitter.write_assign(&target, &Address::constant(Constant::Nil)),
            },
        }
        Ok(())
    }

    fn lower_for(&mut self, stmt: &ForStmt) -> CompileResult<()> {
        self.start_block();
        let variable = self.add_local(&stmt.variable, &stmt.variable_ty);

        let range = if self.ctx.options.range_loop_optimization {
            stmt.range_arguments()
        } else {
            None
        };
        let is_range = range.is_some();
        match range {
            Some(args) => {
                self.emitter.start_for(&stmt.variable_ty, &DataType::int(), true);
                let zero = || Address::constant(Constant::Int(0));
                let one = || Address::constant(Constant::Int(1));
                let bounds = match args {
                    [to] => [zero(), self.lower_expr(to)?, one()],
                    [from, to] => [self.lower_expr(from)?, self.lower_expr(to)?, one()],
                    [from, to, step] => [self.lower_expr(from)?, self.lower_expr(to)?, self.lower_expr(step)?],
                    _ => return Err(CompileError::internal("range() takes one to three arguments", stmt.iterable.pos)),
                };
                let [from, to, step] = &bounds;
                self.emitter.write_for_range_assignment(from, to, step);
                self.release_all(&bounds);
            }
            None => {
                self.emitter.start_for(&stmt.variable_ty, &stmt.iterable.ty, false);
                let list = self.lower_expr(&stmt.iterable)?;
                self.emitter.write_for_list_assignment(&list);
                self.release(&list);
            }
        }

        self.emitter.write_for(&variable, stmt.use_conversion, is_range);
        let mut locals = self.declare_block_locals(&stmt.body);
        self.lower_statements(&stmt.body.statements)?;
        self.emitter.write_endfor(is_range);
        locals.insert(0, variable);
        self.end_block(&locals);
        Ok(())
    }

    fn lower_match(&mut self, subject: &Expr, branches: &[MatchBranch]) -> CompileResult<()> {
        self.start_block();
        let value = self.add_local("@match_value", &subject.ty);
        let subject_value = self.lower_expr(subject)?;
        self.emitter.write_assign(&value, &subject_value);
        self.release(&subject_value);
        let type_tag = self.add_local("@match_type", &DataType::int());
        self.emitter.write_typeof(&type_tag, &value);

        for (index, branch) in branches.iter().enumerate() {
            if index > 0 {
                self.emitter.write_else();
            }
            self.start_block();
            let locals = self.declare_block_locals(&branch.block);
            self.newline();

            let result = self.add_temporary(&DataType::bool());
            for (k, pattern) in branch.patterns.iter().enumerate() {
                self.lower_pattern(pattern, &value, &type_tag, &result, k == 0, false)?;
            }
            if let Some(guard) = &branch.guard {
                self.emitter.write_and_left_operand(&result);
                let test = self.lower_expr(guard)?;
                self.emitter.write_and_right_operand(&test);
                self.emitter.write_end_and(&result);
                self.release(&test);
            }
            self.emitter.write_if(&result);
            self.release(&result);

            self.lower_statements(&branch.block.statements)?;
            self.end_block(&locals);
        }
        for _ in branches {
            self.emitter.write_endif();
        }

        self.end_block(&[value]);
        Ok(())
    }
}
