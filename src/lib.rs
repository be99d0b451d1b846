//! `liltc` compiles Lilt source text into LLVM-flavoured IR text.
//!
//! The pipeline runs in four stages, each consuming the previous one's
//! output: [`Lexer`] → [`Parser`] → [`type_check`] → [`generate`]. The first
//! error raised by any stage aborts the compilation.

use frontend::{
    ast::{TypedProgram, UntypedProgram},
    lexer::{Lexer, Token},
    parser::Parser,
};

pub mod backend;
pub mod error;
pub mod frontend;
pub mod index;
pub mod middle;

pub use backend::{codegen::generate, preamble::DEFAULT_PREAMBLE};
pub use error::{CompileError, Result};
pub use frontend::{SourceFile, SourceFileOrigin};
pub use middle::type_env::type_check;

/// Everything each stage produced for one source file
#[derive(Debug)]
pub struct Artifacts {
    pub tokens: Vec<Token>,
    pub program: UntypedProgram,
    pub typed: TypedProgram,
    pub module: backend::ir::Module,
}

pub fn run_pipeline(source: &SourceFile) -> Result<Artifacts> {
    let tokens = Lexer::tokenize(source)?;
    let program = Parser::parse_program(source, &tokens)?;
    let typed = type_check(&program)?;
    let module = generate(&typed)?;

    Ok(Artifacts {
        tokens,
        program,
        typed,
        module,
    })
}

/// Final output text: the preamble followed by the generated module
pub fn render(module: &backend::ir::Module, preamble: &str) -> String {
    let mut output = String::with_capacity(preamble.len());

    output.push_str(preamble);

    if !preamble.is_empty() && !preamble.ends_with('\n') {
        output.push('\n');
    }

    if !preamble.is_empty() {
        output.push('\n');
    }

    output.push_str(&module.to_string());
    output
}

pub fn compile(source: &str) -> Result<String> {
    compile_with_preamble(source, DEFAULT_PREAMBLE)
}

pub fn compile_with_preamble(source: &str, preamble: &str) -> Result<String> {
    let artifacts = run_pipeline(&SourceFile::memory(source))?;

    Ok(render(&artifacts.module, preamble))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn preamble_is_separated_from_module() {
        assert_eq!(
            compile_with_preamble("return 3", "; header").unwrap(),
            indoc! {"
                ; header

                define i32 @main() {
                \tret i32 3
                }
            "}
        );
    }

    #[test]
    fn empty_preamble_emits_only_the_module() {
        assert_eq!(
            compile_with_preamble("", "").unwrap(),
            "define i32 @main() {\n\tret i32 0\n}\n"
        );
    }

    #[test]
    fn first_error_aborts() {
        let error = compile("let x = \"open").unwrap_err();

        assert_eq!(error.stage(), "lexer");
        assert_eq!(error.line(), 1);
    }
}
