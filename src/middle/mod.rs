//! Type inference. The untyped syntax tree is checked against a tree of
//! scopes and rebuilt with every node carrying its resolved type.

pub mod ty;
pub mod type_env;
