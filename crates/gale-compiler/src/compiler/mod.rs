//! Analyzed AST to Instruction Lowering
//!
//! [`Compiler`] turns one analyzed script (a root [`ClassNode`] with its inner
//! classes) into a [`CompiledScript`], driving a backend [`Emitter`] per
//! function.
//!
//! # Structure
//!
//! - `class` - class table, base-first preparation, publication
//! - `function` - per-function compiler, implicit initializers, lambdas
//! - `resolve` - identifier resolution
//! - `expr`, `assign`, `call` - expression lowering
//! - `pattern`, `stmt` - statement and `match` lowering
//! - `scope` - per-function name tables
//!
//! [`Emitter`]: crate::emitter::Emitter

mod assign;
mod call;
mod class;
mod expr;
mod function;
mod pattern;
mod resolve;
mod scope;
mod stmt;

pub use scope::FunctionScope;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::ast::{ClassNode, Pos};
use crate::cache::{CacheError, ScriptCache};
use crate::emitter::Backend;
use crate::error::{CompileError, CompileResult, FirstError};
use crate::options::CompilerOptions;
use crate::registry::{Globals, NativeRegistry};
use crate::script::CompiledScript;

use class::{ClassTable, ScriptCompiler};

/// Native class a script extends when it names no base
pub const DEFAULT_BASE: &str = "RefCounted";

/// Shared, read-only state of one compile pass
pub(crate) struct CompileContext<'a> {
    pub registry: &'a dyn NativeRegistry,
    pub globals: &'a Globals,
    pub backend: &'a dyn Backend,
    pub options: &'a CompilerOptions,
    pub classes: &'a ClassTable<'a>,
}

/// Script compiler
///
/// Thread-safe: different scripts may be compiled concurrently; dependencies
/// are coordinated through the [`ScriptCache`].
pub struct Compiler {
    registry: Arc<dyn NativeRegistry>,
    globals: Arc<Globals>,
    backend: Arc<dyn Backend>,
    cache: Option<Arc<dyn ScriptCache>>,
    options: CompilerOptions,
    next_version: AtomicU64,
    /// Scripts being compiled right now, per thread
    active: Mutex<Vec<(ThreadId, String)>>,
}

impl Compiler {
    pub fn new(registry: Arc<dyn NativeRegistry>, globals: Arc<Globals>, backend: Arc<dyn Backend>) -> Self {
        Self {
            registry,
            globals,
            backend,
            cache: None,
            options: CompilerOptions::default(),
            next_version: AtomicU64::new(1),
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ScriptCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile a script; on failure the first error of the pass is returned
    pub fn compile(&self, root: &ClassNode) -> CompileResult<Arc<CompiledScript>> {
        let _span = tracing::debug_span!("compile", path = %root.path).entered();
        let mut errors = FirstError::new();

        let result = match self.enter(&root.path, Pos::new(root.line, 0)) {
            Ok(_guard) => ScriptCompiler::new(self, root).run(&mut errors),
            Err(error) => Err(error),
        };
        match result {
            Ok(script) => Ok(script),
            Err(error) => {
                errors.report(error);
                Err(errors
                    .take()
                    .unwrap_or_else(|| CompileError::internal("error lost", Pos::default())))
            }
        }
    }

    /// Compile a script through the cache, reusing an already published artifact
    pub fn compile_path(&self, path: &str) -> CompileResult<Arc<CompiledScript>> {
        self.dependency(path, Pos::default())
    }

    pub(crate) fn registry(&self) -> &dyn NativeRegistry {
        self.registry.as_ref()
    }

    pub(crate) fn globals(&self) -> &Globals {
        self.globals.as_ref()
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub(crate) fn next_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    /// Compiled artifact of another script, through the cache
    pub(crate) fn dependency(&self, path: &str, pos: Pos) -> CompileResult<Arc<CompiledScript>> {
        let Some(cache) = &self.cache else {
            return Err(CompileError::MissingBase {
                name: path.to_string(),
                pos,
            });
        };
        cache.compiled(path, self).map_err(|error| match error {
            CacheError::NotFound(name) => CompileError::MissingBase { name, pos },
            CacheError::Cyclic(name) => CompileError::CyclicInheritance { name, pos },
            CacheError::Failed { path, error } => CompileError::Dependency {
                path,
                message: error.to_string(),
                pos,
            },
        })
    }

    fn enter(&self, path: &str, pos: Pos) -> CompileResult<ActiveGuard<'_>> {
        let thread = thread::current().id();
        let mut active = self.active.lock();
        if active.iter().any(|(t, p)| *t == thread && p == path) {
            return Err(CompileError::CyclicInheritance {
                name: path.to_string(),
                pos,
            });
        }
        active.push((thread, path.to_string()));
        Ok(ActiveGuard {
            active: &self.active,
            thread,
            path: path.to_string(),
        })
    }
}

/// Removes its script from the active set when dropped
struct ActiveGuard<'c> {
    active: &'c Mutex<Vec<(ThreadId, String)>>,
    thread: ThreadId,
    path: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock();
        if let Some(at) = active.iter().rposition(|(t, p)| *t == self.thread && *p == self.path) {
            active.remove(at);
        }
    }
}
