//! Compilation errors

use crate::ast::Pos;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Broad class of a compilation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown identifier, unresolvable type, missing base class
    Resolution,
    /// Cyclic inheritance, native class shadowing, malformed callee
    Structural,
    /// An AST shape the analyzer should never produce
    Internal,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Identifier not found: {name}")]
    IdentifierNotFound { name: String, pos: Pos },

    #[error("Could not resolve type \"{name}\"")]
    UnresolvedType { name: String, pos: Pos },

    #[error("Could not find base class \"{name}\"")]
    MissingBase { name: String, pos: Pos },

    #[error("Dependency \"{path}\" failed to compile: {message}")]
    Dependency { path: String, message: String, pos: Pos },

    #[error("Cyclic inheritance involving \"{name}\"")]
    CyclicInheritance { name: String, pos: Pos },

    #[error("Class \"{name}\" shadows a native class")]
    ShadowsNativeClass { name: String, pos: Pos },

    #[error("Cannot call \"{callee}\": {reason}")]
    MalformedCallee { callee: String, reason: String, pos: Pos },

    #[error("Internal compiler error: {message}")]
    Internal { message: String, pos: Pos },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::IdentifierNotFound { .. }
            | CompileError::UnresolvedType { .. }
            | CompileError::MissingBase { .. }
            | CompileError::Dependency { .. } => ErrorKind::Resolution,
            CompileError::CyclicInheritance { .. }
            | CompileError::ShadowsNativeClass { .. }
            | CompileError::MalformedCallee { .. } => ErrorKind::Structural,
            CompileError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            CompileError::IdentifierNotFound { pos, .. }
            | CompileError::UnresolvedType { pos, .. }
            | CompileError::MissingBase { pos, .. }
            | CompileError::Dependency { pos, .. }
            | CompileError::CyclicInheritance { pos, .. }
            | CompileError::ShadowsNativeClass { pos, .. }
            | CompileError::MalformedCallee { pos, .. }
            | CompileError::Internal { pos, .. } => *pos,
        }
    }

    pub fn internal(message: impl Into<String>, pos: Pos) -> Self {
        CompileError::Internal {
            message: message.into(),
            pos,
        }
    }
}

/// Sticky first-error sink for one compile pass
///
/// Only the first reported error is retained; later ones are dropped.
#[derive(Debug, Default)]
pub struct FirstError {
    error: Option<CompileError>,
}

impl FirstError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error unless one is already held; returns the retained error
    pub fn report(&mut self, error: CompileError) -> &CompileError {
        if self.error.is_none() {
            tracing::debug!(%error, pos = %error.pos(), "compile error");
        }
        self.error.get_or_insert(error)
    }

    pub fn get(&self) -> Option<&CompileError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn take(&mut self) -> Option<CompileError> {
        self.error.take()
    }
}
