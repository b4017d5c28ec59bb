//! Compiled Artifacts
//!
//! Immutable output of one compile pass. A `CompiledScript` is published only
//! when every class of the script compiled; a recompilation produces a new
//! version and never mutates the old one.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::emitter::FunctionDescriptor;
use crate::types::{Constant, DataType};

/// Storage and accessor information of one class variable
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    /// Slot in the instance (or static) table of the class version
    pub index: u32,
    pub getter: Option<String>,
    pub setter: Option<String>,
    pub ty: DataType,
    /// Exposed to the editor as a property
    pub exported: bool,
    /// Path of the class that declared the member
    pub owner: String,
}

#[derive(Debug)]
pub struct CompiledClass {
    pub name: String,
    pub path: String,
    /// Script base class, if the class extends one
    pub base: Option<Arc<CompiledClass>>,
    /// First native ancestor
    pub native_base: String,
    /// Instance members, inherited ones included
    pub members: FxHashMap<String, MemberInfo>,
    pub member_count: u32,
    /// Static members declared by this class only
    pub static_members: FxHashMap<String, MemberInfo>,
    pub constants: FxHashMap<String, Constant>,
    pub signals: Vec<String>,
    pub functions: FxHashMap<String, Arc<FunctionDescriptor>>,
    pub implicit_new: Option<Arc<FunctionDescriptor>>,
    pub implicit_ready: Option<Arc<FunctionDescriptor>>,
    pub static_initializer: Option<Arc<FunctionDescriptor>>,
    /// Paths of the inner classes declared directly in this class
    pub subclasses: Vec<String>,
    pub line: u32,
}

impl CompiledClass {
    pub fn function(&self, name: &str) -> Option<&Arc<FunctionDescriptor>> {
        self.functions.get(name)
    }

    /// Walk this class and its script bases, innermost first
    pub fn lineage(&self) -> impl Iterator<Item = &CompiledClass> {
        std::iter::successors(Some(self), |class| class.base.as_deref())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.lineage().any(|class| class.functions.contains_key(name))
    }

    pub fn has_signal(&self, name: &str) -> bool {
        self.lineage().any(|class| class.signals.iter().any(|s| s == name))
    }

    /// Every function of the class, synthesized ones included, keyed by name
    pub fn all_functions(&self) -> Vec<(&str, &Arc<FunctionDescriptor>)> {
        let mut out: Vec<(&str, &Arc<FunctionDescriptor>)> =
            self.functions.iter().map(|(name, f)| (name.as_str(), f)).collect();
        for (name, function) in [
            ("@implicit_new", &self.implicit_new),
            ("@implicit_ready", &self.implicit_ready),
            ("@static_initializer", &self.static_initializer),
        ] {
            if let Some(function) = function {
                out.push((name, function));
            }
        }
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }
}

#[derive(Debug)]
pub struct CompiledScript {
    pub path: String,
    /// Path of the root class (same as the script path)
    pub root: String,
    /// Every class of the script, inner classes included, by path
    pub classes: FxHashMap<String, Arc<CompiledClass>>,
    pub version: u64,
}

impl CompiledScript {
    pub fn class(&self, path: &str) -> Option<&Arc<CompiledClass>> {
        self.classes.get(path)
    }

    pub fn root_class(&self) -> Option<&Arc<CompiledClass>> {
        self.classes.get(&self.root)
    }

    /// Find a function by class path and name
    pub fn function(&self, class_path: &str, name: &str) -> Option<&Arc<FunctionDescriptor>> {
        self.class(class_path)?
            .all_functions()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| f)
    }
}
