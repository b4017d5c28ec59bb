//! Hot Reload
//!
//! Recompiling a script produces new function descriptors while instances,
//! stored callables and suspended calls still point at the old ones. Reload is
//! two-phase: [`ReplacementMap::build`] pairs old and new functions into an
//! immutable map, then [`ReplacementMap::apply`] rewrites every stored
//! reference in one pass.
//!
//! Functions pair by class path and name. Nested lambdas have no name worth
//! trusting and pair by position, and only when both versions create the same
//! number of lambdas. A pair is kept only when the new function can be called
//! the way the old one was: same captures, same use of `self`, and a required
//! argument count the old call sites can still satisfy.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::emitter::FunctionDescriptor;
use crate::script::CompiledScript;

/// Identity fields of a function and, recursively, of the lambdas it creates
#[derive(Debug, Clone)]
pub struct LambdaReplacementInfo {
    pub function: Arc<FunctionDescriptor>,
    pub name: String,
    pub capture_count: u32,
    pub uses_self: bool,
    pub argument_count: u32,
    pub default_argument_count: u32,
    /// Lambdas created directly by this function, in source order
    pub lambdas: Vec<LambdaReplacementInfo>,
}

impl LambdaReplacementInfo {
    pub fn build(function: &Arc<FunctionDescriptor>) -> Self {
        Self {
            function: function.clone(),
            name: function.name.clone(),
            capture_count: function.capture_count(),
            uses_self: function.uses_self(),
            argument_count: function.argument_count,
            default_argument_count: function.default_argument_count,
            lambdas: function.lambdas.iter().map(Self::build).collect(),
        }
    }

    pub fn required_argument_count(&self) -> u32 {
        self.argument_count - self.default_argument_count
    }

    /// Whether `new` can stand in for this function
    pub fn matches(&self, new: &LambdaReplacementInfo) -> bool {
        let required = new.required_argument_count();
        self.name == new.name
            && self.capture_count == new.capture_count
            && self.uses_self == new.uses_self
            && required >= self.required_argument_count()
            && required <= self.argument_count
    }
}

/// Replacement info of every function of a script, keyed by class path and name
#[derive(Debug, Default)]
pub struct ScriptReplacementInfo {
    pub functions: FxHashMap<(String, String), LambdaReplacementInfo>,
}

impl ScriptReplacementInfo {
    pub fn build(script: &CompiledScript) -> Self {
        let mut functions = FxHashMap::default();
        for (path, class) in &script.classes {
            for (name, function) in class.all_functions() {
                functions.insert((path.clone(), name.to_string()), LambdaReplacementInfo::build(function));
            }
        }
        Self { functions }
    }
}

#[derive(Debug)]
struct Replacement {
    /// Held so the address stays unique while the map lives
    _old: Arc<FunctionDescriptor>,
    new: Option<Arc<FunctionDescriptor>>,
}

/// Old function identity to its replacement, `None` when it has none
#[derive(Debug, Default)]
pub struct ReplacementMap {
    entries: FxHashMap<usize, Replacement>,
}

fn identity(function: &Arc<FunctionDescriptor>) -> usize {
    Arc::as_ptr(function) as usize
}

impl ReplacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair every function of `old` with its counterpart in `new`
    pub fn build(old: &CompiledScript, new: &CompiledScript) -> Self {
        let _span = tracing::debug_span!("hot_reload", path = %old.path, from = old.version, to = new.version).entered();
        let old_info = ScriptReplacementInfo::build(old);
        let new_info = ScriptReplacementInfo::build(new);

        let mut map = Self::new();
        for (key, info) in &old_info.functions {
            map.pair(info, new_info.functions.get(key));
        }
        tracing::debug!(
            functions = map.len(),
            invalidated = map.invalidated_count(),
            "built replacement map"
        );
        map
    }

    /// Record `old` and its lambdas against `new`, or as invalidated
    pub fn pair(&mut self, old: &LambdaReplacementInfo, new: Option<&LambdaReplacementInfo>) {
        let new = new.filter(|candidate| old.matches(candidate));
        self.entries.insert(
            identity(&old.function),
            Replacement {
                _old: old.function.clone(),
                new: new.map(|n| n.function.clone()),
            },
        );

        let nested = new
            .map(|n| &n.lambdas)
            .filter(|lambdas| lambdas.len() == old.lambdas.len());
        for (index, lambda) in old.lambdas.iter().enumerate() {
            self.pair(lambda, nested.map(|lambdas| &lambdas[index]));
        }
    }

    /// `Some(None)` when the function is known and has no replacement
    pub fn get(&self, function: &Arc<FunctionDescriptor>) -> Option<Option<&Arc<FunctionDescriptor>>> {
        self.entries.get(&identity(function)).map(|r| r.new.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn invalidated_count(&self) -> usize {
        self.entries.values().filter(|r| r.new.is_none()).count()
    }

    /// Rewrite every function reference in `tables`
    ///
    /// Callers hold exclusive access to the tables for the whole pass, so no
    /// stale reference is observable halfway through.
    pub fn apply(&self, tables: &mut LiveTables) -> ApplyReport {
        let mut report = ApplyReport::default();

        for slot in &mut tables.callables {
            let Some(function) = slot else { continue };
            match self.get(function) {
                Some(Some(new)) => {
                    *slot = Some(new.clone());
                    report.rewritten += 1;
                }
                Some(None) => {
                    *slot = None;
                    report.invalidated += 1;
                }
                None => {}
            }
        }

        for continuation in tables.continuations.iter_mut().filter(|c| !c.cancelled) {
            match self.get(&continuation.function) {
                Some(Some(new)) => {
                    continuation.function = new.clone();
                    report.rewritten += 1;
                }
                Some(None) => {
                    continuation.cancelled = true;
                    report.cancelled += 1;
                }
                None => {}
            }
        }

        if report.invalidated > 0 || report.cancelled > 0 {
            tracing::warn!(
                invalidated = report.invalidated,
                cancelled = report.cancelled,
                "hot reload dropped functions with no compatible replacement"
            );
        }
        report
    }
}

/// A suspended call waiting to resume in `function`
#[derive(Debug, Clone)]
pub struct Continuation {
    pub function: Arc<FunctionDescriptor>,
    pub cancelled: bool,
}

impl Continuation {
    pub fn new(function: Arc<FunctionDescriptor>) -> Self {
        Self {
            function,
            cancelled: false,
        }
    }
}

/// Function references held by live instances of a script
#[derive(Debug, Default)]
pub struct LiveTables {
    /// Stored callables (bound methods, lambdas); `None` once invalidated
    pub callables: Vec<Option<Arc<FunctionDescriptor>>>,
    pub continuations: Vec<Continuation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// References redirected to a new function
    pub rewritten: usize,
    /// Stored callables cleared
    pub invalidated: usize,
    /// Continuations cancelled
    pub cancelled: usize,
}
