//! Class and function nodes

use super::{Expr, Suite};
use crate::types::{Constant, DataType};

/// What a class extends
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Extends {
    /// Implicitly extends the default native base
    #[default]
    Default,
    /// A native class (`extends Node`)
    Native(String),
    /// Another script, resolved through the script cache (`extends "res://base.gd"`)
    Script(String),
    /// A class of this script (outer or inner), by fully qualified path
    Class(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    /// Source-level name (empty for an anonymous root class)
    pub name: String,
    /// Fully qualified path: `res://player.gd` or `res://player.gd::Inner`
    pub path: String,
    pub extends: Extends,
    pub members: Vec<ClassMember>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Variable(VariableNode),
    Constant { name: String, value: Constant },
    Function(FunctionNode),
    Signal { name: String, params: Vec<String> },
    Enum { name: Option<String>, values: Vec<(String, i64)> },
    Class(ClassNode),
}

impl ClassMember {
    pub fn name(&self) -> Option<&str> {
        match self {
            ClassMember::Variable(v) => Some(&v.name),
            ClassMember::Constant { name, .. } => Some(name),
            ClassMember::Function(f) => Some(&f.name),
            ClassMember::Signal { name, .. } => Some(name),
            ClassMember::Enum { name, .. } => name.as_deref(),
            ClassMember::Class(c) => Some(&c.name),
        }
    }
}

impl ClassNode {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            extends: Extends::Default,
            members: Vec::new(),
            line: 0,
        }
    }

    pub fn extends(mut self, extends: Extends) -> Self {
        self.extends = extends;
        self
    }

    pub fn with(mut self, member: ClassMember) -> Self {
        self.members.push(member);
        self
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableNode> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Variable(v) => Some(v),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionNode> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn inner_classes(&self) -> impl Iterator<Item = &ClassNode> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Class(c) => Some(c),
            _ => None,
        })
    }

    /// Find an inner class anywhere below this one by fully qualified path
    pub fn find_class(&self, path: &str) -> Option<&ClassNode> {
        if self.path == path {
            return Some(self);
        }
        self.inner_classes().find_map(|c| c.find_class(path))
    }
}

/// Accessor of a property
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    /// `get = function_name`
    Named(String),
    /// An inline `get:` / `set(value):` body
    Inline(Box<FunctionNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub name: String,
    pub ty: DataType,
    pub initializer: Option<Expr>,
    pub is_static: bool,
    /// Initialized by the implicit ready function instead of the constructor
    pub onready: bool,
    pub getter: Option<Accessor>,
    pub setter: Option<Accessor>,
    pub exported: bool,
    pub use_conversion: bool,
    pub line: u32,
}

impl VariableNode {
    pub fn new(name: &str, ty: DataType, initializer: Option<Expr>) -> Self {
        Self {
            name: name.to_string(),
            ty,
            initializer,
            is_static: false,
            onready: false,
            getter: None,
            setter: None,
            exported: false,
            use_conversion: false,
            line: 0,
        }
    }

    /// Function name that reads this property, if it has a getter
    pub fn getter_name(&self) -> Option<String> {
        self.getter.as_ref().map(|g| match g {
            Accessor::Named(name) => name.clone(),
            Accessor::Inline(_) => format!("@{}_getter", self.name),
        })
    }

    /// Function name that writes this property, if it has a setter
    pub fn setter_name(&self) -> Option<String> {
        self.setter.as_ref().map(|s| match s {
            Accessor::Named(name) => name.clone(),
            Accessor::Inline(_) => format!("@{}_setter", self.name),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: DataType,
    pub default: Option<Expr>,
    pub use_conversion: bool,
}

impl Param {
    pub fn new(name: &str, ty: DataType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            default: None,
            use_conversion: false,
        }
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<Param>,
    /// Trailing `...args` parameter
    pub rest: Option<Param>,
    pub return_type: DataType,
    pub body: Suite,
    pub is_static: bool,
    pub is_coroutine: bool,
    pub is_lambda: bool,
    /// Enclosing locals captured by a lambda, in capture order
    pub captures: Vec<Expr>,
    /// A lambda that refers to the enclosing `self`
    pub uses_self: bool,
    pub line: u32,
}

impl FunctionNode {
    pub fn new(name: &str, params: Vec<Param>, return_type: DataType, body: Suite) -> Self {
        Self {
            name: name.to_string(),
            params,
            rest: None,
            return_type,
            body,
            is_static: false,
            is_coroutine: false,
            is_lambda: false,
            captures: Vec::new(),
            uses_self: false,
            line: 0,
        }
    }

    pub fn lambda(params: Vec<Param>, captures: Vec<Expr>, uses_self: bool, body: Suite) -> Self {
        let mut node = Self::new("<anonymous lambda>", params, DataType::Variant, body);
        node.is_lambda = true;
        node.captures = captures;
        node.uses_self = uses_self;
        node
    }

    pub fn default_arg_count(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_some()).count()
    }
}
