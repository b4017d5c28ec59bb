//! Cross-script Cache
//!
//! Scripts reference each other through `extends "path"`. The cache owns the
//! analyzed AST of every known script and guarantees each path is compiled at
//! most once at a time: a thread asking for a path that another thread is
//! compiling blocks until the artifact is published, while a path re-entered on
//! the thread that is already compiling it is a dependency cycle.
//!
//! Threads can also close a cycle between them: A compiles `a.gd` and waits for
//! `b.gd`, which B compiles while asking for `a.gd`. Before waiting, a thread
//! follows the chain of owners and the paths they wait for; reaching itself
//! means the wait would never end, and it fails with [`CacheError::Cyclic`]
//! instead. Its failure is published, which in turn fails every waiter.

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use thiserror::Error;

use crate::ast::ClassNode;
use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::script::CompiledScript;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("script \"{0}\" is not in the cache")]
    NotFound(String),

    #[error("script \"{0}\" depends on itself")]
    Cyclic(String),

    #[error("script \"{path}\" failed to compile: {error}")]
    Failed { path: String, error: CompileError },
}

/// Where a cached script stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStage {
    /// Analyzed AST available, not compiled yet
    Analyzed,
    /// A thread is compiling it
    Compiling,
    Compiled,
    Failed,
}

/// Shared collaborator resolving script dependencies
pub trait ScriptCache: Send + Sync {
    /// Analyzed AST of a script
    fn analyzed(&self, path: &str) -> Result<Arc<ClassNode>, CacheError>;

    /// Compiled artifact of a script, compiling it with `compiler` first if needed
    fn compiled(&self, path: &str, compiler: &Compiler) -> Result<Arc<CompiledScript>, CacheError>;

    /// Record an artifact compiled outside the cache
    fn publish(&self, script: Arc<CompiledScript>);

    fn stage(&self, path: &str) -> Option<SolutionStage>;
}

#[derive(Debug)]
enum EntryState {
    Analyzed,
    Compiling(ThreadId),
    Compiled(Arc<CompiledScript>),
    Failed(CompileError),
}

#[derive(Debug)]
struct Entry {
    ast: Arc<ClassNode>,
    state: EntryState,
}

#[derive(Debug, Default)]
struct Table {
    entries: FxHashMap<String, Entry>,
    /// Path each blocked thread waits for
    waiting: FxHashMap<ThreadId, String>,
}

impl Table {
    /// Whether `current` waiting on `owner` closes a cycle of waiting threads
    fn wait_closes_cycle(&self, current: ThreadId, mut owner: ThreadId) -> bool {
        // each thread waits for one path, so a chain longer than the waiters is a loop elsewhere
        for _ in 0..=self.waiting.len() {
            if owner == current {
                return true;
            }
            let next = self
                .waiting
                .get(&owner)
                .and_then(|path| self.entries.get(path))
                .and_then(|entry| match entry.state {
                    EntryState::Compiling(next) => Some(next),
                    _ => None,
                });
            match next {
                Some(next) => owner = next,
                None => return false,
            }
        }
        false
    }
}

/// In-memory [`ScriptCache`]
#[derive(Debug, Default)]
pub struct MemoryScriptCache {
    table: Mutex<Table>,
    published: Condvar,
}

impl MemoryScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the analyzed AST of a script; the entry restarts as `Analyzed`
    pub fn insert(&self, ast: ClassNode) {
        let path = ast.path.clone();
        let entry = Entry {
            ast: Arc::new(ast),
            state: EntryState::Analyzed,
        };
        self.table.lock().entries.insert(path, entry);
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScriptCache for MemoryScriptCache {
    fn analyzed(&self, path: &str) -> Result<Arc<ClassNode>, CacheError> {
        self.table
            .lock()
            .entries
            .get(path)
            .map(|entry| entry.ast.clone())
            .ok_or_else(|| CacheError::NotFound(path.to_string()))
    }

    fn compiled(&self, path: &str, compiler: &Compiler) -> Result<Arc<CompiledScript>, CacheError> {
        let current = thread::current().id();
        let mut table = self.table.lock();

        let ast = loop {
            let entry = table
                .entries
                .get_mut(path)
                .ok_or_else(|| CacheError::NotFound(path.to_string()))?;
            let owner = match &entry.state {
                EntryState::Compiled(script) => return Ok(script.clone()),
                EntryState::Failed(error) => {
                    return Err(CacheError::Failed {
                        path: path.to_string(),
                        error: error.clone(),
                    })
                }
                EntryState::Compiling(owner) if *owner == current => {
                    return Err(CacheError::Cyclic(path.to_string()));
                }
                EntryState::Compiling(owner) => *owner,
                EntryState::Analyzed => {
                    entry.state = EntryState::Compiling(current);
                    break entry.ast.clone();
                }
            };
            if table.wait_closes_cycle(current, owner) {
                tracing::debug!(path, "waiting would close a cycle between threads");
                return Err(CacheError::Cyclic(path.to_string()));
            }
            tracing::debug!(path, "waiting for script compiled on another thread");
            table.waiting.insert(current, path.to_string());
            self.published.wait(&mut table);
            table.waiting.remove(&current);
        };
        drop(table);

        let result = compiler.compile(&ast);

        let mut table = self.table.lock();
        let entries = &mut table.entries;
        let outcome = match result {
            Ok(script) => {
                if let Some(entry) = entries.get_mut(path) {
                    entry.state = EntryState::Compiled(script.clone());
                }
                Ok(script)
            }
            Err(error) => {
                if let Some(entry) = entries.get_mut(path) {
                    entry.state = EntryState::Failed(error.clone());
                }
                Err(CacheError::Failed {
                    path: path.to_string(),
                    error,
                })
            }
        };
        self.published.notify_all();
        outcome
    }

    fn publish(&self, script: Arc<CompiledScript>) {
        let mut table = self.table.lock();
        if let Some(entry) = table.entries.get_mut(&script.path) {
            entry.state = EntryState::Compiled(script);
        }
        self.published.notify_all();
    }

    fn stage(&self, path: &str) -> Option<SolutionStage> {
        self.table.lock().entries.get(path).map(|entry| match entry.state {
            EntryState::Analyzed => SolutionStage::Analyzed,
            EntryState::Compiling(_) => SolutionStage::Compiling,
            EntryState::Compiled(_) => SolutionStage::Compiled,
            EntryState::Failed(_) => SolutionStage::Failed,
        })
    }
}
