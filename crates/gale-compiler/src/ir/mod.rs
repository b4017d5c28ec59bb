//! Instruction Listings
//!
//! The representation recorded by the bundled listing backend: one flat,
//! structured instruction list per compiled function. It mirrors the emitter
//! interface one-to-one, which makes it suitable for inspection, golden dumps
//! and interpretation in tests.
//!
//! # Structure
//!
//! - `IrFunction` - A compiled function body with its frame layout
//! - `Instr` - One emitter operation
//! - `PrettyPrint` - Human-readable rendering

pub mod function;
pub mod instr;
pub mod pretty;

pub use function::IrFunction;
pub use instr::{CallKind, Instr};
pub use pretty::PrettyPrint;
