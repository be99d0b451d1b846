//! Fatal errors raised by each compiler stage. The first error aborts the
//! compilation; there is no recovery.

use thiserror::Error;

use crate::{frontend::intern::InternedSymbol, middle::ty::ValueType};

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl CompileError {
    /// Source line the error is reported against
    pub fn line(&self) -> usize {
        match self {
            CompileError::Lex(LexError::UnterminatedString { line }) => *line,
            CompileError::Parse(error) => error.line(),
            CompileError::Type(error) => error.line,
            CompileError::Codegen(
                CodegenError::VoidOperand { line } | CodegenError::MissingStorage { line, .. },
            ) => *line,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => "lexer",
            CompileError::Parse(_) => "parser",
            CompileError::Type(_) => "type checker",
            CompileError::Codegen(_) => "code generator",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("line {line}: unterminated string literal at end of file")]
    UnterminatedString { line: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: unidentified token `{found}`")]
    UnexpectedToken { line: usize, found: String },
    #[error("line {line}: expected {expected} but found `{found}`")]
    Expected {
        line: usize,
        expected: &'static str,
        found: String,
    },
    #[error("line {line}: expected {expected} but reached end of file")]
    UnexpectedEof { line: usize, expected: &'static str },
    #[error("line {line}: `{name}` is not a declared function and is not being assigned")]
    UndeclaredStatement { line: usize, name: InternedSymbol },
    #[error("line {line}: `{name}` is reserved and cannot name a function")]
    ReservedFunctionName { line: usize, name: InternedSymbol },
    #[error("line {line}: integer literal `{literal}` does not fit in i32")]
    IntegerOutOfRange { line: usize, literal: String },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::Expected { line, .. }
            | ParseError::UnexpectedEof { line, .. }
            | ParseError::UndeclaredStatement { line, .. }
            | ParseError::ReservedFunctionName { line, .. }
            | ParseError::IntegerOutOfRange { line, .. } => *line,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct TypeError {
    pub line: usize,
    pub kind: TypeErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeErrorKind {
    #[error("variable `{name}` already assigned type {existing}, cannot assign {found}")]
    AlreadyAssigned {
        name: InternedSymbol,
        existing: ValueType,
        found: ValueType,
    },
    #[error("missing declaration of `{name}`")]
    MissingDeclaration { name: InternedSymbol },
    #[error("mismatching types for comparison: {lhs} and {rhs}")]
    ComparisonMismatch { lhs: ValueType, rhs: ValueType },
    #[error("numerical operation on non-numeric types {lhs} and {rhs}")]
    NonNumericOperand { lhs: ValueType, rhs: ValueType },
    #[error("conditional must be bool, found {found}")]
    NonBooleanCondition { found: ValueType },
    #[error("cannot apply `!` to non-boolean type {found}")]
    NotOperand { found: ValueType },
    #[error("cannot negate non-integer type {found}")]
    NegateOperand { found: ValueType },
    #[error("argument `{parameter}` of `{function}` expected {existing}, found {found}")]
    ConflictingArgument {
        function: InternedSymbol,
        parameter: InternedSymbol,
        existing: ValueType,
        found: ValueType,
    },
    #[error("signature of `{function}` did not settle")]
    UnstableSignature { function: InternedSymbol },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("line {line}: void value cannot be used as an operand")]
    VoidOperand { line: usize },
    #[error("line {line}: `{name}` has no storage in this function")]
    MissingStorage { line: usize, name: InternedSymbol },
}
