//! Generator seam
//!
//! The CLI and the per-language backends live outside this workspace. This
//! module is the hand-off point: the CLI threads a `GeneratorContext` into
//! each selected `Backend`, which consumes the IR and returns source files.
//! No process-wide state is involved.

use crate::TypeContext;
use std::path::PathBuf;
use thiserror::Error;

/// Settings threaded from the CLI into every backend invocation.
#[derive(Debug, Clone)]
pub struct GeneratorContext {
    /// Root directory generated files are written under.
    pub out_dir: PathBuf,
    /// Package or namespace prefix for generated code.
    pub package_prefix: String,
    /// Comment placed at the top of every generated file, if any.
    pub header_comment: Option<String>,
}

/// One generated source file, path relative to `GeneratorContext::out_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum GenError {
    #[error("backend {backend}: cannot express type \"{name}\": {reason}")]
    Unsupported {
        backend: String,
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A language backend. Implementations emit typed object access, file
/// reading, writing, and appending against the binary format for one host
/// language.
pub trait Backend {
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        types: &TypeContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<SourceFile>, GenError>;
}
