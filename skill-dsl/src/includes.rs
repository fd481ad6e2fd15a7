//! Transitive include resolution
//!
//! Schema files pull in other files with `include "x.skill"` / `with
//! "x.skill"`. Resolution keeps a worklist of pending files and a done-set
//! of files already parsed; cycles fall out naturally because a file is
//! only ever parsed once. Paths are resolved relative to the including
//! file's directory.

use crate::compiler::CompileError;
use crate::parser::{self, Definition};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// The flat declaration stream of an entry file and everything it includes.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    /// Declarations in first-seen order across all files.
    pub definitions: Vec<Definition>,
    /// Whether any read file contained anything beyond whitespace. An
    /// entirely empty input is legal and yields an empty IR; a non-empty
    /// input that produces no declarations is not.
    pub any_content: bool,
}

/// Resolve `entry` and its transitive includes into one declaration list.
pub fn resolve(entry: &Path) -> Result<ResolvedSchema, CompileError> {
    let mut definitions = Vec::new();
    let mut any_content = false;
    let mut done: HashSet<PathBuf> = HashSet::new();
    let mut worklist: Vec<PathBuf> = vec![entry.to_path_buf()];

    while let Some(path) = worklist.pop() {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !done.insert(canonical) {
            continue;
        }

        let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let source = fs::read_to_string(&path).map_err(|_| CompileError::MissingInclude {
            file: path.display().to_string(),
            dir: dir.display().to_string(),
        })?;

        if !source.trim().is_empty() {
            any_content = true;
        }

        let file = parser::parse(&source)?;
        definitions.extend(file.declarations);
        for include in file.includes.iter().rev() {
            worklist.push(dir.join(include));
        }
    }

    Ok(ResolvedSchema {
        definitions,
        any_content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn follows_includes_and_breaks_cycles() {
        let dir = std::env::temp_dir().join("skill-include-cycle-test");
        fs::create_dir_all(&dir).unwrap();
        let a = write_file(&dir, "a.skill", "include \"b.skill\"\nA {}");
        write_file(&dir, "b.skill", "include \"a.skill\"\nB {}");

        let resolved = resolve(&a).unwrap();
        let names: Vec<_> = resolved.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn missing_include_names_the_offender() {
        let dir = std::env::temp_dir().join("skill-include-missing-test");
        fs::create_dir_all(&dir).unwrap();
        let a = write_file(&dir, "entry.skill", "include \"nope.skill\"\nA {}");

        let err = resolve(&a).unwrap_err();
        assert!(err.to_string().contains("nope.skill"));
    }
}
