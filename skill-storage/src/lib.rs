//! SKilL Storage - Pools and the Serialization State Machine
//!
//! The runtime model generated bindings target: per-type storage pools
//! linked by inheritance, the interning string pool, and the `SkillState`
//! lifecycle that reads, writes and appends files in the SKilL binary
//! format.
//!
//! ```text
//! SkillState
//!   ├── StringPool            (interned strings, 1-based ids)
//!   ├── StoragePool per type  (data + new-object regions, block infos)
//!   └── from_path             (the backing file, once read or written)
//! ```
//!
//! A state is single-threaded: one writer at a time, no reads during a
//! `write`/`append`. IR access is read-only and freely shared.

mod error;
mod pool;
mod reader;
mod state;
mod string_pool;
mod value;
mod writer;

pub use error::*;
pub use pool::*;
pub use state::*;
pub use string_pool::*;
pub use value::*;
