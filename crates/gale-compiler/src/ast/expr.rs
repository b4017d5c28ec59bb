//! Expression nodes

use super::{FunctionNode, Pos};
use crate::types::{Constant, DataType, VariantType};

/// An analyzed expression: the node plus its resolved static type and folded value
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Static type inferred by the analyzer
    pub ty: DataType,
    /// Compile-time value when the analyzer folded this expression
    pub folded: Option<Constant>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Constant),
    Identifier(Identifier),
    SelfRef,
    Array(Vec<Expr>),
    Dictionary(Vec<(Expr, Expr)>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `a if cond else b`
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `operand is Type`
    TypeTest {
        operand: Box<Expr>,
        test: DataType,
    },
    /// `operand as Type`
    Cast {
        operand: Box<Expr>,
        to: DataType,
    },
    Subscript {
        base: Box<Expr>,
        key: SubscriptKey,
    },
    Call(Call),
    Await(Box<Expr>),
    Assignment(Assignment),
    Lambda(Box<FunctionNode>),
}

/// How the analyzer bound an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Parameter,
    Local,
    Member,
    /// A member function or signal of the class hierarchy
    MemberFunction,
    /// A class constant, enum value or inner class
    ClassConstant,
    StaticMember,
    /// A variable inherited from a native base
    Inherited,
    /// A native class name
    Native,
    Global,
    UndefinedGlobal,
}

impl Binding {
    /// Bound to a parameter or block local of the enclosing function
    pub fn is_scoped(self) -> bool {
        matches!(self, Binding::Parameter | Binding::Local)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub binding: Binding,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptKey {
    /// `base.name`
    Attribute(String),
    /// `base[index]`
    Index(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Expr>,
    /// `super.method()` or bare `super()`
    pub is_super: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// `name(args)`
    Name(String),
    /// `base.name(args)`
    Attribute { base: Box<Expr>, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Operator of a compound assignment (`+=` carries `Add`)
    pub op: Option<BinaryOp>,
    pub target: Box<Expr>,
    pub value: Box<Expr>,
    /// The analyzer requires a converting store
    pub use_conversion: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    BitXor,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    /// Short-circuit `and`
    And,
    /// Short-circuit `or`
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::In => "in",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Negate,
    Positive,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Positive => "+",
            UnaryOp::Not => "not ",
            UnaryOp::BitNot => "~",
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, ty: DataType) -> Self {
        Self {
            kind,
            ty,
            folded: None,
            pos: Pos::default(),
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.pos = Pos { line, column };
        self
    }

    /// A literal, folded to itself
    pub fn literal(value: Constant) -> Self {
        let ty = value.data_type();
        Self {
            kind: ExprKind::Literal(value.clone()),
            ty,
            folded: Some(value),
            pos: Pos::default(),
        }
    }

    pub fn int(value: i64) -> Self {
        Self::literal(Constant::Int(value))
    }

    pub fn string(value: &str) -> Self {
        Self::literal(Constant::String(value.to_string()))
    }

    pub fn ident(name: &str, binding: Binding, ty: DataType) -> Self {
        Self::new(
            ExprKind::Identifier(Identifier {
                name: name.to_string(),
                binding,
            }),
            ty,
        )
    }

    pub fn local(name: &str, ty: DataType) -> Self {
        Self::ident(name, Binding::Local, ty)
    }

    pub fn self_ref(class_path: &str) -> Self {
        Self::new(ExprKind::SelfRef, DataType::Script(class_path.to_string()))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: DataType) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    pub fn attribute(base: Expr, name: &str, ty: DataType) -> Self {
        Self::new(
            ExprKind::Subscript {
                base: Box::new(base),
                key: SubscriptKey::Attribute(name.to_string()),
            },
            ty,
        )
    }

    pub fn index(base: Expr, index: Expr, ty: DataType) -> Self {
        Self::new(
            ExprKind::Subscript {
                base: Box::new(base),
                key: SubscriptKey::Index(Box::new(index)),
            },
            ty,
        )
    }

    pub fn call(name: &str, args: Vec<Expr>, ty: DataType) -> Self {
        Self::new(
            ExprKind::Call(Call {
                callee: Callee::Name(name.to_string()),
                args,
                is_super: false,
            }),
            ty,
        )
    }

    pub fn method_call(base: Expr, name: &str, args: Vec<Expr>, ty: DataType) -> Self {
        Self::new(
            ExprKind::Call(Call {
                callee: Callee::Attribute {
                    base: Box::new(base),
                    name: name.to_string(),
                },
                args,
                is_super: false,
            }),
            ty,
        )
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::assign_op(None, target, value)
    }

    pub fn assign_op(op: Option<BinaryOp>, target: Expr, value: Expr) -> Self {
        let ty = target.ty.clone();
        Self::new(
            ExprKind::Assignment(Assignment {
                op,
                target: Box::new(target),
                value: Box::new(value),
                use_conversion: false,
            }),
            ty,
        )
    }

    /// Whether this is a call whose callee names a builtin type (`Vector2(1, 2)`)
    pub fn builtin_constructor(&self) -> Option<VariantType> {
        match &self.kind {
            ExprKind::Call(Call {
                callee: Callee::Name(name),
                is_super: false,
                ..
            }) => VariantType::from_name(name),
            _ => None,
        }
    }
}
