//! XL Compiler Library
//!
//! Compiles XL source to the flat bytecode image executed by `xl-runtime`.
//! The pipeline is lexer → parser → loader → code generator:
//!
//! ```rust,ignore
//! use xlc::compile_file;
//! use xl_runtime::Vm;
//!
//! let image = compile_file(Path::new("main.xl"))?;
//! let mut vm = Vm::new(&image);
//! let addr = image.function_address("main").unwrap();
//! let result = vm.execute_function(addr, &[])?;
//! ```
//!
//! [`compile_file`] resolves the transitive `import` graph relative to the
//! working directory; [`compile_source`] compiles a single in-memory unit
//! and is what tests and embedding hosts mostly use.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod loader;
pub mod parser;

pub use ast::Program;
pub use codegen::{CodeGen, CodeGenError};
pub use error::CompileError;
pub use lexer::{LexError, Token, TokenKind, tokenize};
pub use loader::{LoadedProgram, load_program};
pub use parser::{ParseError, Parser};

use std::path::Path;

use xl_core::image::Image;

/// Compile an entry file and everything it imports.
pub fn compile_file(entry: &Path) -> Result<Image, CompileError> {
    let program = load_program(entry)?;
    let image = CodeGen::new().generate(&program)?;
    Ok(image)
}

/// Compile one source string as a self-contained unit (imports are not
/// resolved here; see [`compile_file`]).
pub fn compile_source(source: &str) -> Result<Image, CompileError> {
    let tokens = tokenize(source).map_err(|source| CompileError::Lex { path: None, source })?;
    let program = Parser::new(tokens)
        .parse()
        .map_err(|source| CompileError::Parse { path: None, source })?;
    let image = CodeGen::new().generate(&LoadedProgram::from(program))?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_source_end_to_end() {
        let image = compile_source("func main() { return 41 + 1; }").unwrap();
        assert!(image.function_address("main").is_some());
        assert_eq!(image.code.len() % 2, 0);
    }

    #[test]
    fn test_compile_source_surfaces_lex_errors() {
        let err = compile_source("func main() { return 1 ? 2; }").unwrap_err();
        assert!(matches!(err, CompileError::Lex { .. }));
    }

    #[test]
    fn test_compile_source_surfaces_parse_errors() {
        let err = compile_source("func main( { }").unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
    }

    #[test]
    fn test_compile_source_surfaces_link_errors() {
        let err = compile_source("func main() { return missing(); }").unwrap_err();
        assert!(matches!(err, CompileError::CodeGen(CodeGenError::UndefinedFunction { .. })));
    }
}
