//! Analyzed AST
//!
//! The input contract of the compiler. Nodes are produced by the upstream
//! parser and analyzer: every expression carries its resolved static type and,
//! when folded, its constant value; identifiers carry their binding
//! classification. The compiler trusts these annotations.

mod class;
mod expr;
mod stmt;

pub use class::{Accessor, ClassMember, ClassNode, Extends, FunctionNode, Param, VariableNode};
pub use expr::{
    Assignment, BinaryOp, Binding, Call, Callee, Expr, ExprKind, Identifier, SubscriptKey, UnaryOp,
};
pub use stmt::{
    DictionaryPatternEntry, ForStmt, MatchBranch, Pattern, Stmt, StmtKind, Suite, SuiteLocal,
    SuiteLocalKind, VarDecl,
};

/// Source position (1-based line and column; 0 when unknown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
