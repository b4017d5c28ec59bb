//! Compiler configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid compiler options: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Options controlling which instruction forms the compiler emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Emit a line marker before every statement
    pub debug_line_info: bool,
    /// Lower `assert` statements (release exports usually disable them)
    pub emit_asserts: bool,
    /// Use the validated native-call form when signatures match exactly
    pub validated_calls: bool,
    /// Lower `for x in range(...)` to the counting loop form
    pub range_loop_optimization: bool,
    /// Lower `breakpoint` statements
    pub breakpoints: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            debug_line_info: true,
            emit_asserts: true,
            validated_calls: true,
            range_loop_optimization: true,
            breakpoints: true,
        }
    }
}

impl CompilerOptions {
    /// Options for release exports: no asserts, no breakpoints
    pub fn release() -> Self {
        Self {
            emit_asserts: false,
            breakpoints: false,
            ..Self::default()
        }
    }

    /// Parse options from a TOML table; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(source)?)
    }
}
