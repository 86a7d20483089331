//! Import loader.
//!
//! Resolves the transitive `import` graph of an entry file into one merged
//! compilation unit. Traversal is depth first and keyed by canonical
//! absolute path, so each file is parsed at most once and cycles terminate;
//! an imported unit's globals and functions land before the importing
//! file's, making definitions visible to everything loaded after them.
//!
//! Import targets are resolved relative to the process working directory,
//! matching how the ledger node launches. Empty targets are ignored.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{Function, Program, VarDecl};
use crate::error::CompileError;
use crate::lexer::tokenize;
use crate::parser::Parser;

/// The merged result of loading an import graph: globals and functions in
/// load order, imports already resolved away.
#[derive(Debug, Clone, Default)]
pub struct LoadedProgram {
    pub globals: Vec<VarDecl>,
    pub functions: Vec<Function>,
}

/// Treat a single parsed file as a complete unit. Import declarations are
/// dropped; use [`load_program`] when they must be resolved.
impl From<Program> for LoadedProgram {
    fn from(program: Program) -> Self {
        LoadedProgram {
            globals: program.globals,
            functions: program.functions,
        }
    }
}

/// Load `entry` and everything it transitively imports.
pub fn load_program(entry: &Path) -> Result<LoadedProgram, CompileError> {
    let mut visited = HashSet::new();
    let mut merged = LoadedProgram::default();
    load_unit(entry, &mut visited, &mut merged)?;
    Ok(merged)
}

fn load_unit(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    merged: &mut LoadedProgram,
) -> Result<(), CompileError> {
    let canonical = path.canonicalize().map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }

    let source = fs::read_to_string(&canonical).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let tokens = tokenize(&source).map_err(|source| CompileError::Lex {
        path: Some(path.to_path_buf()),
        source,
    })?;
    let unit = Parser::new(tokens).parse().map_err(|source| CompileError::Parse {
        path: Some(path.to_path_buf()),
        source,
    })?;

    for target in &unit.imports {
        if target.is_empty() {
            continue;
        }
        load_unit(Path::new(target), visited, merged)?;
    }

    merged.globals.extend(unit.globals);
    merged.functions.extend(unit.functions);
    Ok(())
}
