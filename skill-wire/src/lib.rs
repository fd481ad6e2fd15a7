//! SKilL Wire - Binary Protocol Primitives
//!
//! The low-level pieces of the SKilL file format: the `v64` variable-length
//! integer, the little-endian fixed-width codecs, the wire type-ID table,
//! and the buffers the block writer and reader are built on. Everything
//! here is byte-order and layout; file structure lives in `skill-storage`.

mod buffer;
mod error;
pub mod type_ids;
mod v64;

pub use buffer::*;
pub use error::*;
pub use v64::*;
