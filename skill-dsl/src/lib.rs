//! SKilL DSL - Schema Language Front-End
//!
//! Lexer, parser, include resolver and type checker for the SKilL schema
//! language.
//!
//! Architecture:
//! ```text
//! Schema files (.skill)
//!     ↓
//! Lexer (tokenize)
//!     ↓
//! Parser (build AST)  ←  Include resolver (worklist over files)
//!     ↓
//! Compiler (resolve names, validate, order)
//!     ↓
//! skill_core::TypeContext (the IR)
//! ```

pub mod compiler;
pub mod includes;
pub mod lexer;
pub mod parser;

pub use compiler::*;
pub use includes::*;
pub use lexer::*;
pub use parser::*;

use skill_core::TypeContext;
use std::path::Path;

/// Front-end entry point: resolve includes starting at `entry`, parse
/// everything, type check, and return the IR in type order.
pub fn compile_file(entry: &Path, mode: HintMode) -> Result<TypeContext, CompileError> {
    let resolved = includes::resolve(entry)?;
    compiler::SchemaCompiler::compile(&resolved, mode)
}

/// Compile a single in-memory schema. Includes are not allowed here.
pub fn compile_source(source: &str, mode: HintMode) -> Result<TypeContext, CompileError> {
    let file = parser::parse(source)?;
    if let Some(inc) = file.includes.first() {
        return Err(CompileError::MissingInclude {
            file: inc.clone(),
            dir: "<memory>".to_string(),
        });
    }
    let resolved = ResolvedSchema {
        definitions: file.declarations,
        any_content: !source.trim().is_empty(),
    };
    compiler::SchemaCompiler::compile(&resolved, mode)
}
