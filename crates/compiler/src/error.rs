//! Compiler error type.
//!
//! One wrapper enum over the per-stage errors so the pipeline entry points
//! propagate with `?` and the CLI prints a single diagnostic. Errors raised
//! while processing a file carry its path.

use std::io;
use std::path::PathBuf;

use crate::codegen::CodeGenError;
use crate::lexer::LexError;
use crate::parser::ParseError;

#[derive(Debug)]
pub enum CompileError {
    /// A source file could not be read (loader).
    Io { path: PathBuf, source: io::Error },
    Lex { path: Option<PathBuf>, source: LexError },
    Parse { path: Option<PathBuf>, source: ParseError },
    /// Undefined names, bad intrinsic calls, link failures.
    CodeGen(CodeGenError),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Io { path, source } => {
                write!(f, "cannot read '{}': {}", path.display(), source)
            }
            CompileError::Lex { path, source } => match path {
                Some(p) => write!(f, "{}: {}", p.display(), source),
                None => write!(f, "{}", source),
            },
            CompileError::Parse { path, source } => match path {
                Some(p) => write!(f, "{}: {}", p.display(), source),
                None => write!(f, "{}", source),
            },
            CompileError::CodeGen(source) => write!(f, "{}", source),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Io { source, .. } => Some(source),
            CompileError::Lex { source, .. } => Some(source),
            CompileError::Parse { source, .. } => Some(source),
            CompileError::CodeGen(source) => Some(source),
        }
    }
}

impl From<CodeGenError> for CompileError {
    fn from(source: CodeGenError) -> Self {
        CompileError::CodeGen(source)
    }
}
