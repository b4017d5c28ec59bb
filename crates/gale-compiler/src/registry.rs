//! Native Class Registry and Globals
//!
//! The compiler consults the host's native class database through the
//! [`NativeRegistry`] trait. [`StaticRegistry`] is a table-backed
//! implementation for embedders that describe their classes up front.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::types::{Constant, DataType, VariantType};

/// Signature of a native method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub args: Vec<DataType>,
    pub return_type: DataType,
    pub is_static: bool,
    pub is_vararg: bool,
}

impl MethodSignature {
    pub fn new(args: Vec<DataType>, return_type: DataType) -> Self {
        Self {
            args,
            return_type,
            is_static: false,
            is_vararg: false,
        }
    }

    /// Whether a call with these static argument types can use the validated form
    pub fn matches_exactly(&self, args: &[DataType]) -> bool {
        !self.is_vararg
            && self.args.len() == args.len()
            && self.args.iter().zip(args).all(|(expected, actual)| {
                actual.is_set() && (expected == actual || *expected == DataType::Variant)
            })
    }
}

/// Host-side class database
pub trait NativeRegistry: Send + Sync {
    fn class_exists(&self, class: &str) -> bool;
    fn parent_class(&self, class: &str) -> Option<String>;
    /// Method declared directly on `class` (not inherited)
    fn method(&self, class: &str, name: &str) -> Option<MethodSignature>;
    fn has_signal(&self, class: &str, name: &str) -> bool;
    fn has_property(&self, class: &str, name: &str) -> bool;
    fn integer_constant(&self, class: &str, name: &str) -> Option<i64>;
    /// Host utility function (`print`, `abs`, ...)
    fn has_utility_function(&self, name: &str) -> bool;
    /// Method of a builtin value type (`Vector2.length`, `Array.size`)
    fn builtin_method(&self, ty: VariantType, name: &str) -> Option<MethodSignature>;

    /// Find a method on `class` or any native ancestor; returns the declaring class
    fn find_method(&self, class: &str, name: &str) -> Option<(String, MethodSignature)> {
        let mut current = Some(class.to_string());
        while let Some(class) = current {
            if let Some(signature) = self.method(&class, name) {
                return Some((class, signature));
            }
            current = self.parent_class(&class);
        }
        None
    }

    fn has_signal_in_hierarchy(&self, class: &str, name: &str) -> bool {
        let mut current = Some(class.to_string());
        while let Some(class) = current {
            if self.has_signal(&class, name) {
                return true;
            }
            current = self.parent_class(&class);
        }
        false
    }

    fn has_property_in_hierarchy(&self, class: &str, name: &str) -> bool {
        let mut current = Some(class.to_string());
        while let Some(class) = current {
            if self.has_property(&class, name) {
                return true;
            }
            current = self.parent_class(&class);
        }
        false
    }

    fn integer_constant_in_hierarchy(&self, class: &str, name: &str) -> Option<i64> {
        let mut current = Some(class.to_string());
        while let Some(class) = current {
            if let Some(value) = self.integer_constant(&class, name) {
                return Some(value);
            }
            current = self.parent_class(&class);
        }
        None
    }
}

/// Utility functions implemented by the language itself rather than the host
pub const SCRIPT_UTILITY_FUNCTIONS: &[&str] = &[
    "range",
    "len",
    "str",
    "convert",
    "type_exists",
    "print_debug",
    "print_stack",
    "get_stack",
    "inst_to_dict",
    "dict_to_inst",
    "char",
    "load",
    "is_instance_of",
    "Color8",
];

pub fn is_script_utility(name: &str) -> bool {
    SCRIPT_UTILITY_FUNCTIONS.contains(&name)
}

#[derive(Debug, Clone, Default)]
struct NativeClassInfo {
    parent: Option<String>,
    methods: FxHashMap<String, MethodSignature>,
    signals: FxHashSet<String>,
    properties: FxHashSet<String>,
    constants: FxHashMap<String, i64>,
}

/// Table-backed [`NativeRegistry`]
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    classes: FxHashMap<String, NativeClassInfo>,
    utilities: FxHashSet<String>,
    builtin_methods: FxHashMap<(VariantType, String), MethodSignature>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the minimal `Object`/`RefCounted`/`Node` hierarchy and common utilities
    pub fn with_core_classes() -> Self {
        let mut registry = Self::new();
        registry
            .class("Object", None)
            .method("Object", "get_class", MethodSignature::new(vec![], DataType::builtin(VariantType::String)))
            .method(
                "Object",
                "has_method",
                MethodSignature::new(vec![DataType::builtin(VariantType::StringName)], DataType::bool()),
            )
            .method(
                "Object",
                "free",
                MethodSignature::new(vec![], DataType::nil()),
            )
            .signal("Object", "script_changed")
            .constant("Object", "NOTIFICATION_POSTINITIALIZE", 0)
            .class("RefCounted", Some("Object"))
            .class("Node", Some("Object"))
            .method("Node", "get_child_count", MethodSignature::new(vec![], DataType::int()))
            .method(
                "Node",
                "get_child",
                MethodSignature::new(vec![DataType::int()], DataType::Native("Node".into())),
            )
            .method(
                "Node",
                "add_child",
                MethodSignature::new(vec![DataType::Native("Node".into())], DataType::nil()),
            )
            .property("Node", "name")
            .signal("Node", "ready")
            .constant("Node", "NOTIFICATION_READY", 13)
            .utility("print")
            .utility("abs")
            .utility("max")
            .utility("min")
            .builtin_method(VariantType::Array, "size", MethodSignature::new(vec![], DataType::int()))
            .builtin_method(
                VariantType::Array,
                "append",
                MethodSignature::new(vec![DataType::Variant], DataType::nil()),
            )
            .builtin_method(VariantType::Dictionary, "size", MethodSignature::new(vec![], DataType::int()))
            .builtin_method(
                VariantType::Dictionary,
                "has",
                MethodSignature::new(vec![DataType::Variant], DataType::bool()),
            )
            .builtin_method(
                VariantType::Vector2,
                "length",
                MethodSignature::new(vec![], DataType::builtin(VariantType::Float)),
            );
        registry
    }

    pub fn class(&mut self, name: &str, parent: Option<&str>) -> &mut Self {
        self.classes.entry(name.to_string()).or_default().parent = parent.map(str::to_string);
        self
    }

    pub fn method(&mut self, class: &str, name: &str, signature: MethodSignature) -> &mut Self {
        self.classes
            .entry(class.to_string())
            .or_default()
            .methods
            .insert(name.to_string(), signature);
        self
    }

    pub fn signal(&mut self, class: &str, name: &str) -> &mut Self {
        self.classes.entry(class.to_string()).or_default().signals.insert(name.to_string());
        self
    }

    pub fn property(&mut self, class: &str, name: &str) -> &mut Self {
        self.classes.entry(class.to_string()).or_default().properties.insert(name.to_string());
        self
    }

    pub fn constant(&mut self, class: &str, name: &str, value: i64) -> &mut Self {
        self.classes
            .entry(class.to_string())
            .or_default()
            .constants
            .insert(name.to_string(), value);
        self
    }

    pub fn utility(&mut self, name: &str) -> &mut Self {
        self.utilities.insert(name.to_string());
        self
    }

    pub fn builtin_method(&mut self, ty: VariantType, name: &str, signature: MethodSignature) -> &mut Self {
        self.builtin_methods.insert((ty, name.to_string()), signature);
        self
    }
}

impl NativeRegistry for StaticRegistry {
    fn class_exists(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    fn parent_class(&self, class: &str) -> Option<String> {
        self.classes.get(class).and_then(|c| c.parent.clone())
    }

    fn method(&self, class: &str, name: &str) -> Option<MethodSignature> {
        self.classes.get(class).and_then(|c| c.methods.get(name).cloned())
    }

    fn has_signal(&self, class: &str, name: &str) -> bool {
        self.classes.get(class).is_some_and(|c| c.signals.contains(name))
    }

    fn has_property(&self, class: &str, name: &str) -> bool {
        self.classes.get(class).is_some_and(|c| c.properties.contains(name))
    }

    fn integer_constant(&self, class: &str, name: &str) -> Option<i64> {
        self.classes.get(class).and_then(|c| c.constants.get(name).copied())
    }

    fn has_utility_function(&self, name: &str) -> bool {
        self.utilities.contains(name)
    }

    fn builtin_method(&self, ty: VariantType, name: &str) -> Option<MethodSignature> {
        self.builtin_methods.get(&(ty, name.to_string())).cloned()
    }
}

/// Global names visible to every script
#[derive(Debug, Clone, Default)]
pub struct Globals {
    /// Global slot index of every global value (autoloads included)
    global_map: FxHashMap<String, u32>,
    /// Global values known at compile time, by slot
    global_values: FxHashMap<u32, Constant>,
    /// Autoloads loaded lazily as singletons
    singletons: FxHashSet<String>,
    /// Named script classes: name -> script path
    global_classes: FxHashMap<String, String>,
    /// Engine singletons resolved by name at runtime
    named_globals: FxHashSet<String>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_autoload(&mut self, name: &str, is_singleton: bool) -> u32 {
        let index = self.global_map.len() as u32;
        self.global_map.insert(name.to_string(), index);
        if is_singleton {
            self.singletons.insert(name.to_string());
        }
        index
    }

    pub fn add_global_value(&mut self, name: &str, value: Constant) -> u32 {
        let index = self.global_map.len() as u32;
        self.global_map.insert(name.to_string(), index);
        self.global_values.insert(index, value);
        index
    }

    pub fn add_global_class(&mut self, name: &str, path: &str) {
        self.global_classes.insert(name.to_string(), path.to_string());
    }

    pub fn add_named_global(&mut self, name: &str) {
        self.named_globals.insert(name.to_string());
    }

    pub fn global_index(&self, name: &str) -> Option<u32> {
        self.global_map.get(name).copied()
    }

    pub fn global_value(&self, index: u32) -> Option<&Constant> {
        self.global_values.get(&index)
    }

    pub fn is_singleton(&self, name: &str) -> bool {
        self.singletons.contains(name)
    }

    pub fn global_class_path(&self, name: &str) -> Option<&str> {
        self.global_classes.get(name).map(String::as_str)
    }

    pub fn is_named_global(&self, name: &str) -> bool {
        self.named_globals.contains(name)
    }
}
