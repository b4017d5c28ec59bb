//! Statement and pattern nodes

use super::{Expr, ExprKind, Pos};
use crate::types::{Constant, DataType};

/// A block of statements plus the names it declares
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Suite {
    pub statements: Vec<Stmt>,
    /// Names declared directly in this block (not parameters, not loop variables)
    pub locals: Vec<SuiteLocal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuiteLocal {
    pub name: String,
    pub kind: SuiteLocalKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuiteLocalKind {
    Variable(DataType),
    Constant(Constant),
    /// A `var` bound by a match pattern
    Bind(DataType),
}

impl Suite {
    /// Build a block, collecting its direct `var`/`const` declarations
    pub fn new(statements: Vec<Stmt>) -> Self {
        let locals = statements
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StmtKind::Var(decl) => Some(SuiteLocal {
                    name: decl.name.clone(),
                    kind: SuiteLocalKind::Variable(decl.ty.clone()),
                }),
                StmtKind::Const { name, value } => Some(SuiteLocal {
                    name: name.clone(),
                    kind: SuiteLocalKind::Constant(value.clone()),
                }),
                _ => None,
            })
            .collect();
        Self { statements, locals }
    }

    /// Whether any path of this block returns a value (lambda bodies excluded)
    pub fn has_value_return(&self) -> bool {
        self.statements.iter().any(Stmt::has_value_return)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Var(VarDecl),
    Const {
        name: String,
        value: Constant,
    },
    If {
        cond: Expr,
        then: Suite,
        otherwise: Option<Suite>,
    },
    While {
        cond: Expr,
        body: Suite,
    },
    For(ForStmt),
    Match {
        subject: Expr,
        branches: Vec<MatchBranch>,
    },
    Return(Option<Expr>),
    Assert {
        cond: Expr,
        message: Option<Expr>,
    },
    Break,
    Continue,
    Breakpoint,
    Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: DataType,
    pub initializer: Option<Expr>,
    pub use_conversion: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub variable: String,
    pub variable_ty: DataType,
    pub iterable: Expr,
    pub body: Suite,
    pub use_conversion: bool,
}

impl ForStmt {
    /// Arguments of a `range(...)` iterable with one to three arguments
    pub fn range_arguments(&self) -> Option<&[Expr]> {
        match &self.iterable.kind {
            ExprKind::Call(call)
                if !call.is_super
                    && matches!(&call.callee, super::Callee::Name(n) if n == "range")
                    && (1..=3).contains(&call.args.len()) =>
            {
                Some(&call.args)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchBranch {
    pub patterns: Vec<Pattern>,
    pub guard: Option<Expr>,
    pub block: Suite,
}

impl MatchBranch {
    /// Build a branch; names bound by its patterns become block locals
    pub fn new(patterns: Vec<Pattern>, guard: Option<Expr>, statements: Vec<Stmt>) -> Self {
        let mut block = Suite::new(statements);
        let mut binds = Vec::new();
        for pattern in &patterns {
            pattern.collect_binds(&mut binds);
        }
        for name in binds.into_iter().rev() {
            if !block.locals.iter().any(|l| l.name == name) {
                block.locals.insert(
                    0,
                    SuiteLocal {
                        name,
                        kind: SuiteLocalKind::Bind(DataType::Variant),
                    },
                );
            }
        }
        Self {
            patterns,
            guard,
            block,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Literal(Constant),
    Expression(Expr),
    /// `var name`
    Bind(String),
    /// `_`
    Wildcard,
    Array(Vec<Pattern>),
    Dictionary(Vec<DictionaryPatternEntry>),
    /// `..`, only valid as the last element of an array or dictionary pattern
    Rest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DictionaryPatternEntry {
    Pair { key: Expr, value: Option<Pattern> },
    Rest,
}

impl Pattern {
    fn collect_binds(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Bind(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Pattern::Array(items) => items.iter().for_each(|p| p.collect_binds(out)),
            Pattern::Dictionary(entries) => {
                for entry in entries {
                    if let DictionaryPatternEntry::Pair {
                        value: Some(value), ..
                    } = entry
                    {
                        value.collect_binds(out);
                    }
                }
            }
            _ => {}
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { kind, line: 0 }
    }

    pub fn at(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    pub fn var(name: &str, ty: DataType, initializer: Option<Expr>) -> Self {
        Self::new(StmtKind::Var(VarDecl {
            name: name.to_string(),
            ty,
            initializer,
            use_conversion: false,
        }))
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(value))
    }

    pub fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: 0,
        }
    }

    fn has_value_return(&self) -> bool {
        match &self.kind {
            StmtKind::Return(value) => value.is_some(),
            StmtKind::If { then, otherwise, .. } => {
                then.has_value_return() || otherwise.as_ref().is_some_and(Suite::has_value_return)
            }
            StmtKind::While { body, .. } => body.has_value_return(),
            StmtKind::For(f) => f.body.has_value_return(),
            StmtKind::Match { branches, .. } => branches.iter().any(|b| b.block.has_value_return()),
            _ => false,
        }
    }
}
