//! Pretty-printing for listings
//!
//! Provides human-readable output for debugging compiled functions.

use super::function::IrFunction;
use super::instr::{CallKind, Instr};
use crate::emitter::Address;
use std::fmt::Write;

/// Trait for pretty-printing listing constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for IrFunction {
    fn pretty_print(&self) -> String {
        let mut output = String::new();

        let params: Vec<String> = self.params.iter().map(|(n, t)| format!("{}: {}", n, t)).collect();
        writeln!(
            output,
            "{}func {}::{}({}) -> {} {{",
            if self.is_static { "static " } else { "" },
            self.class_path,
            self.name,
            params.join(", "),
            self.return_type
        )
        .unwrap();

        if !self.locals.is_empty() {
            let locals: Vec<String> = self.locals.iter().map(|(n, t)| format!("{}: {}", n, t)).collect();
            writeln!(output, "  ; locals: {}", locals.join(", ")).unwrap();
        }

        let mut depth = 1usize;
        for instr in &self.instructions {
            if matches!(
                instr,
                Instr::Else | Instr::EndIf | Instr::EndFor { .. } | Instr::EndWhile | Instr::EndJumpIfShared
            ) {
                depth = depth.saturating_sub(1).max(1);
            }
            let indent = if matches!(instr, Instr::While(_)) { depth.saturating_sub(1).max(1) } else { depth };
            writeln!(output, "{}{}", "  ".repeat(indent), instr.pretty_print()).unwrap();
            if matches!(
                instr,
                Instr::If(_)
                    | Instr::Else
                    | Instr::StartFor { .. }
                    | Instr::StartWhileCondition
                    | Instr::JumpIfShared(_)
            ) {
                depth += 1;
            }
        }

        writeln!(output, "}}").unwrap();
        output
    }
}

fn list(addresses: &[Address]) -> String {
    addresses.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
}

impl PrettyPrint for Instr {
    fn pretty_print(&self) -> String {
        match self {
            Instr::Line(line) => format!("; line {}", line),
            Instr::DeclareLocal { slot, name, ty } => format!("local[{}] = {}: {}", slot, name, ty),
            Instr::PushTemp { slot, ty } => format!("push temp[{}]: {}", slot, ty),
            Instr::PopTemp { slot } => format!("pop temp[{}]", slot),
            Instr::StartParameters => "parameters:".to_string(),
            Instr::EndParameters => "end parameters".to_string(),
            Instr::StartBlock => "block:".to_string(),
            Instr::EndBlock => "end block".to_string(),
            Instr::Clear(a) => format!("clear {}", a),
            Instr::Assign { target, source, convert } => {
                format!("{} = {}{}", target, source, if *convert { " (convert)" } else { "" })
            }
            Instr::AssignBool { target, value } => format!("{} = {}", target, value),
            Instr::AssignDefault { target, source, .. } => format!("{} ?= {}", target, source),
            Instr::Unary { target, op, operand } => format!("{} = {}{}", target, op.symbol(), operand),
            Instr::Binary { target, op, left, right } => format!("{} = {} {} {}", target, left, op.symbol(), right),
            Instr::TypeTest { target, source, ty } => format!("{} = {} is {}", target, source, ty),
            Instr::TypeOf { target, source } => format!("{} = typeof {}", target, source),
            Instr::Cast { target, source, ty } => format!("{} = {} as {}", target, source, ty),
            Instr::StoreGlobal { target, index } => format!("{} = global[{}]", target, index),
            Instr::StoreNamedGlobal { target, name } => format!("{} = global {}", target, name),
            Instr::AndLeft(a) => format!("and.left {}", a),
            Instr::AndRight(a) => format!("and.right {}", a),
            Instr::EndAnd(a) => format!("and.end -> {}", a),
            Instr::OrLeft(a) => format!("or.left {}", a),
            Instr::OrRight(a) => format!("or.right {}", a),
            Instr::EndOr(a) => format!("or.end -> {}", a),
            Instr::StartTernary(a) => format!("ternary -> {}", a),
            Instr::TernaryCondition(a) => format!("ternary.if {}", a),
            Instr::TernaryTrue(a) => format!("ternary.then {}", a),
            Instr::TernaryFalse(a) => format!("ternary.else {}", a),
            Instr::EndTernary => "ternary.end".to_string(),
            Instr::Get { target, index, source } => format!("{} = {}[{}]", target, source, index),
            Instr::Set { target, index, source } => format!("{}[{}] = {}", target, index, source),
            Instr::GetNamed { target, name, source } => format!("{} = {}.{}", target, source, name),
            Instr::SetNamed { target, name, source } => format!("{}.{} = {}", target, name, source),
            Instr::Construct { target, ty, args } => format!("{} = {}({})", target, ty, list(args)),
            Instr::ConstructArray { target, element, elements } => match element {
                Some(element) => format!("{} = Array[{}]([{}])", target, element, list(elements)),
                None => format!("{} = [{}]", target, list(elements)),
            },
            Instr::ConstructDictionary { target, pairs } => format!("{} = {{{}}}", target, list(pairs)),
            Instr::Call { target, kind, base, name, args } => {
                let dest = target.as_ref().map(|t| format!("{} = ", t)).unwrap_or_default();
                let receiver = base.as_ref().map(|b| format!("{}.", b)).unwrap_or_default();
                let tag = match kind {
                    CallKind::Dynamic => "call".to_string(),
                    CallKind::Async => "call.async".to_string(),
                    CallKind::SelfCall => "call.self".to_string(),
                    CallKind::SelfAsync => "call.self.async".to_string(),
                    CallKind::Super => "call.super".to_string(),
                    CallKind::Utility => "call.utility".to_string(),
                    CallKind::ScriptUtility => "call.script_utility".to_string(),
                    CallKind::BuiltinType(ty) => format!("call.builtin<{}>", ty),
                    CallKind::MethodBind(class) => format!("call.method<{}>", class),
                    CallKind::MethodBindValidated(class) => format!("call.validated<{}>", class),
                    CallKind::ScriptFunction => "call.script".to_string(),
                };
                format!("{}{} {}{}({})", dest, tag, receiver, name, list(args))
            }
            Instr::Lambda { target, function, captures, use_self } => format!(
                "{} = lambda {}[{}]{}",
                target,
                function,
                list(captures),
                if *use_self { " +self" } else { "" }
            ),
            Instr::Await { target, operand } => format!("{} = await {}", target, operand),
            Instr::If(a) => format!("if {}:", a),
            Instr::Else => "else:".to_string(),
            Instr::EndIf => "endif".to_string(),
            Instr::JumpIfShared(a) => format!("if not shared {}:", a),
            Instr::EndJumpIfShared => "end shared".to_string(),
            Instr::StartFor { range, .. } => format!("for{}:", if *range { ".range" } else { "" }),
            Instr::ForRange { from, to, step } => format!("range {}..{} step {}", from, to, step),
            Instr::ForList(list) => format!("over {}", list),
            Instr::For { variable, .. } => format!("each -> {}", variable),
            Instr::EndFor { .. } => "endfor".to_string(),
            Instr::StartWhileCondition => "while:".to_string(),
            Instr::While(a) => format!("while {}:", a),
            Instr::EndWhile => "endwhile".to_string(),
            Instr::Break => "break".to_string(),
            Instr::Continue => "continue".to_string(),
            Instr::Breakpoint => "breakpoint".to_string(),
            Instr::Return(a) => format!("return {}", a),
            Instr::Assert { test, message } => format!("assert {}, {}", test, message),
        }
    }
}
