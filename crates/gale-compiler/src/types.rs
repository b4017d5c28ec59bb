//! Static Types and Folded Values
//!
//! The analyzer annotates every expression with a [`DataType`] and, when the
//! expression folded to a compile-time value, a [`Constant`]. The compiler never
//! re-derives these; it only asks the questions defined here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime value kinds known to the VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantType {
    Nil,
    Bool,
    Int,
    Float,
    String,
    StringName,
    NodePath,
    Vector2,
    Vector2i,
    Vector3,
    Vector3i,
    Color,
    Rect2,
    Transform2D,
    Callable,
    Signal,
    Object,
    Dictionary,
    Array,
    PackedByteArray,
    PackedInt32Array,
    PackedFloat32Array,
    PackedStringArray,
}

impl VariantType {
    /// All kinds, in tag order
    pub const ALL: [VariantType; 23] = [
        VariantType::Nil,
        VariantType::Bool,
        VariantType::Int,
        VariantType::Float,
        VariantType::String,
        VariantType::StringName,
        VariantType::NodePath,
        VariantType::Vector2,
        VariantType::Vector2i,
        VariantType::Vector3,
        VariantType::Vector3i,
        VariantType::Color,
        VariantType::Rect2,
        VariantType::Transform2D,
        VariantType::Callable,
        VariantType::Signal,
        VariantType::Object,
        VariantType::Dictionary,
        VariantType::Array,
        VariantType::PackedByteArray,
        VariantType::PackedInt32Array,
        VariantType::PackedFloat32Array,
        VariantType::PackedStringArray,
    ];

    /// Kinds mutated in place through any reference (no write-back needed)
    pub fn is_shared(self) -> bool {
        matches!(
            self,
            VariantType::Object | VariantType::Dictionary | VariantType::Array
        )
    }

    /// `String` and `StringName` compare as the same kind in `match`
    pub fn is_string_like(self) -> bool {
        matches!(self, VariantType::String | VariantType::StringName)
    }

    /// Numeric tag, as returned by the runtime `typeof`
    pub fn tag(self) -> i64 {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0) as i64
    }

    /// Source-level type name
    pub fn name(self) -> &'static str {
        match self {
            VariantType::Nil => "null",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Float => "float",
            VariantType::String => "String",
            VariantType::StringName => "StringName",
            VariantType::NodePath => "NodePath",
            VariantType::Vector2 => "Vector2",
            VariantType::Vector2i => "Vector2i",
            VariantType::Vector3 => "Vector3",
            VariantType::Vector3i => "Vector3i",
            VariantType::Color => "Color",
            VariantType::Rect2 => "Rect2",
            VariantType::Transform2D => "Transform2D",
            VariantType::Callable => "Callable",
            VariantType::Signal => "Signal",
            VariantType::Object => "Object",
            VariantType::Dictionary => "Dictionary",
            VariantType::Array => "Array",
            VariantType::PackedByteArray => "PackedByteArray",
            VariantType::PackedInt32Array => "PackedInt32Array",
            VariantType::PackedFloat32Array => "PackedFloat32Array",
            VariantType::PackedStringArray => "PackedStringArray",
        }
    }

    /// Look up a builtin type by its source name (`"Vector2"`, `"int"`, ...)
    pub fn from_name(name: &str) -> Option<VariantType> {
        if name == "Nil" {
            return None;
        }
        Self::ALL.iter().copied().find(|t| t.name() == name && *t != VariantType::Nil)
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static type attached to an expression, variable or function
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DataType {
    /// Not statically known
    #[default]
    Variant,
    /// A builtin value type, optionally with a typed-container element
    Builtin {
        kind: VariantType,
        element: Option<Box<DataType>>,
    },
    /// An instance of a native (engine) class
    Native(String),
    /// An instance of a script class, by fully qualified class path
    Script(String),
}

impl DataType {
    pub fn builtin(kind: VariantType) -> Self {
        DataType::Builtin {
            kind,
            element: None,
        }
    }

    pub fn typed_array(element: DataType) -> Self {
        DataType::Builtin {
            kind: VariantType::Array,
            element: Some(Box::new(element)),
        }
    }

    pub fn int() -> Self {
        Self::builtin(VariantType::Int)
    }

    pub fn bool() -> Self {
        Self::builtin(VariantType::Bool)
    }

    pub fn nil() -> Self {
        Self::builtin(VariantType::Nil)
    }

    /// Whether the analyzer resolved a static type
    pub fn is_set(&self) -> bool {
        !matches!(self, DataType::Variant)
    }

    /// Runtime kind this type always has, if known
    pub fn variant_type(&self) -> Option<VariantType> {
        match self {
            DataType::Variant => None,
            DataType::Builtin { kind, .. } => Some(*kind),
            DataType::Native(_) | DataType::Script(_) => Some(VariantType::Object),
        }
    }

    /// Element type of a typed array, if any
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Builtin {
                element: Some(element),
                ..
            } => Some(element),
            _ => None,
        }
    }

    /// `Some(shared)` when statically decidable, `None` when the type is unknown
    pub fn is_shared(&self) -> Option<bool> {
        self.variant_type().map(VariantType::is_shared)
    }

    /// Whether a slot of this type may keep an object alive
    pub fn can_contain_object(&self) -> bool {
        match self {
            DataType::Variant | DataType::Native(_) | DataType::Script(_) => true,
            DataType::Builtin { kind, element } => match kind {
                VariantType::Nil | VariantType::Object | VariantType::Dictionary => true,
                VariantType::Array => element.as_ref().map_or(true, |e| e.can_contain_object()),
                _ => false,
            },
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Variant => f.write_str("Variant"),
            DataType::Builtin {
                kind,
                element: Some(element),
            } => write!(f, "{}[{}]", kind, element),
            DataType::Builtin { kind, .. } => write!(f, "{}", kind),
            DataType::Native(name) => f.write_str(name),
            DataType::Script(path) => f.write_str(path),
        }
    }
}

/// A compile-time value: a literal, a folded expression or a class reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringName(String),
    Array(Vec<Constant>),
    Dictionary(Vec<(Constant, Constant)>),
    /// A native class object (`Node`, `RefCounted`, ...)
    NativeClass(String),
    /// A script class, by fully qualified class path
    ScriptClass(String),
}

impl Constant {
    pub fn variant_type(&self) -> VariantType {
        match self {
            Constant::Nil => VariantType::Nil,
            Constant::Bool(_) => VariantType::Bool,
            Constant::Int(_) => VariantType::Int,
            Constant::Float(_) => VariantType::Float,
            Constant::String(_) => VariantType::String,
            Constant::StringName(_) => VariantType::StringName,
            Constant::Array(_) => VariantType::Array,
            Constant::Dictionary(_) => VariantType::Dictionary,
            Constant::NativeClass(_) | Constant::ScriptClass(_) => VariantType::Object,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Constant::Nil => DataType::Variant,
            Constant::NativeClass(name) => DataType::Native(name.clone()),
            Constant::ScriptClass(path) => DataType::Script(path.clone()),
            other => DataType::builtin(other.variant_type()),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Nil => f.write_str("null"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Float(v) => write!(f, "{:?}", v),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::StringName(s) => write!(f, "&{:?}", s),
            Constant::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Constant::Dictionary(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Constant::NativeClass(name) => write!(f, "<native {}>", name),
            Constant::ScriptClass(path) => write!(f, "<class {}>", path),
        }
    }
}
