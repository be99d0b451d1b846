//! Lowers the typed syntax tree to LLVM-flavoured IR. Control flow becomes
//! labels and branches, every variable gets a stack slot, and expression
//! trees are flattened into numbered registers.

pub mod codegen;
pub mod ir;
pub mod preamble;
pub mod pretty_print;
