//! Gale Compiler
//!
//! Lowers an analyzed Gale script (a class-based, optionally typed scripting
//! language) into address-oriented instructions for a stack VM:
//! - **Lowering**: identifiers, expressions, assignments, calls, statements and
//!   `match` patterns (`compiler` module)
//! - **Emission**: the `Emitter` interface plus a bundled listing backend
//!   (`emitter` and `ir` modules)
//! - **Scripts**: compiled classes, the cross-script cache and hot reload
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gale_compiler::{ClassNode, Compiler, Globals, ListingBackend, StaticRegistry};
//!
//! let compiler = Compiler::new(
//!     Arc::new(StaticRegistry::with_core_classes()),
//!     Arc::new(Globals::new()),
//!     Arc::new(ListingBackend),
//! );
//! let script = compiler.compile(&ClassNode::new("Player", "res://player.gd"))?;
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]

// ============================================================================
// Core Modules
// ============================================================================

/// Analyzed AST consumed by the compiler
pub mod ast;

/// Static types and folded constants
pub mod types;

/// Native class registry and globals
pub mod registry;

/// Addresses and the emitter interface
pub mod emitter;

/// Instruction listings recorded by the listing backend
pub mod ir;

/// Lowering of classes and functions
pub mod compiler;

/// Compiled artifacts
pub mod script;

/// Cross-script compilation cache
pub mod cache;

/// Function identity remapping after recompilation
pub mod hot_reload;

pub mod diagnostic;
pub mod error;
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use ast::{ClassNode, Expr, FunctionNode, Pos, Stmt, Suite};
pub use cache::{CacheError, MemoryScriptCache, ScriptCache, SolutionStage};
pub use compiler::Compiler;
pub use emitter::{Address, AddressMode, Backend, Emitter, FunctionDescriptor, ListingBackend, ListingEmitter};
pub use error::{CompileError, CompileResult, ErrorKind, FirstError};
pub use hot_reload::{ApplyReport, Continuation, LambdaReplacementInfo, LiveTables, ReplacementMap};
pub use ir::IrFunction;
pub use options::{CompilerOptions, OptionsError};
pub use registry::{Globals, MethodSignature, NativeRegistry, StaticRegistry};
pub use script::{CompiledClass, CompiledScript, MemberInfo};
pub use types::{Constant, DataType, VariantType};
