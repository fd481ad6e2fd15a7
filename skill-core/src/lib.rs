//! SKilL Core - Schema IR
//!
//! The type-checked intermediate representation of a SKilL schema, plus the
//! seam that language backends plug into. The front-end (`skill-dsl`) builds
//! a `TypeContext`; everything downstream treats it as read-only.

mod ir;
mod restriction;
mod types;

pub mod gen;

pub use ir::*;
pub use restriction::*;
pub use types::*;
