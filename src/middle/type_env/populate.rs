//! Rebuilds the syntax tree with resolved types. Nothing is inferred here:
//! every block is matched positionally with the scope inference created for
//! it, and types are read back out of that scope.

use super::{ScopeId, ScopeKind, TypeEnvironment};
use crate::{
    frontend::{
        ast::{
            Literal, LiteralKind, Node, NodeKind, Parameter, TypedNode, TypedProgram,
            UnaryOperatorKind, UntypedNode,
        },
        intern::InternedSymbol,
    },
    middle::ty::ValueType,
};

impl TypeEnvironment<'_> {
    pub fn populate(&self) -> TypedProgram {
        let program = self.program;

        let functions = program
            .functions
            .iter()
            .map(|function| self.populate_node(self.root, &mut 0, function))
            .collect();

        let result = self.scopes[self.root].result;
        let entry = match &program.entry.kind {
            NodeKind::Block(statements) => TypedNode {
                kind: NodeKind::Block(self.populate_body(
                    self.root,
                    statements,
                    result,
                    program.entry.line,
                )),
                line: program.entry.line,
                ty: result,
            },
            _ => self.populate_node(self.root, &mut 0, &program.entry),
        };

        TypedProgram { functions, entry }
    }

    /// Statements of a function or entry body, terminated by a zero-valued
    /// `return` when they do not end in one already
    fn populate_body(
        &self,
        scope: ScopeId,
        statements: &[UntypedNode],
        result: ValueType,
        line: usize,
    ) -> Vec<TypedNode> {
        let mut cursor = 0;
        let mut typed = statements
            .iter()
            .map(|statement| self.populate_node(scope, &mut cursor, statement))
            .collect::<Vec<_>>();

        if !typed.last().is_some_and(Node::always_returns) {
            typed.push(synthetic_return(result, line));
        }

        typed
    }

    /// Next block scope created under `scope`, skipping function scopes
    fn next_block_child(&self, scope: ScopeId, cursor: &mut usize) -> ScopeId {
        let children = &self.scopes[scope].children;

        while let Some(child) = children.get(*cursor).copied() {
            *cursor += 1;

            if self.scopes[child].kind == ScopeKind::Block {
                return child;
            }
        }

        unreachable!("inference creates a scope for every block it visits")
    }

    fn resolve(&self, scope: ScopeId, name: InternedSymbol) -> ValueType {
        self.owner_of(scope, name)
            .and_then(|owner| self.scopes[owner].bindings.get(&name).copied())
            .unwrap_or_default()
    }

    fn populate_scoped_body(
        &self,
        scope: ScopeId,
        cursor: &mut usize,
        body: &UntypedNode,
    ) -> TypedNode {
        let child = self.next_block_child(scope, cursor);

        match &body.kind {
            NodeKind::Block(statements) => {
                let mut child_cursor = 0;

                TypedNode {
                    kind: NodeKind::Block(
                        statements
                            .iter()
                            .map(|statement| {
                                self.populate_node(child, &mut child_cursor, statement)
                            })
                            .collect(),
                    ),
                    line: body.line,
                    ty: self.scopes[child].result,
                }
            }
            _ => self.populate_node(child, &mut 0, body),
        }
    }

    fn populate_boxed(
        &self,
        scope: ScopeId,
        cursor: &mut usize,
        node: &UntypedNode,
    ) -> Box<TypedNode> {
        Box::new(self.populate_node(scope, cursor, node))
    }

    fn populate_node(&self, scope: ScopeId, cursor: &mut usize, node: &UntypedNode) -> TypedNode {
        let (kind, ty) = match &node.kind {
            NodeKind::Literal(literal) => match literal.kind {
                LiteralKind::Integer => (NodeKind::Literal(*literal), ValueType::I32),
                LiteralKind::String => (NodeKind::Literal(*literal), ValueType::String),
                LiteralKind::Void => (NodeKind::Literal(*literal), ValueType::Void),
                LiteralKind::Boolean => {
                    let value = if literal.value.value() == "true" { "1" } else { "0" };

                    (
                        NodeKind::Literal(Literal {
                            kind: LiteralKind::Boolean,
                            value: InternedSymbol::new(value),
                        }),
                        ValueType::Bool,
                    )
                }
            },
            NodeKind::Block(_) => return self.populate_scoped_body(scope, cursor, node),
            NodeKind::Function {
                name,
                parameters,
                body,
            } => {
                let record = &self.functions[name];
                let Some(function_scope) = record.scope else {
                    unreachable!("every declared function has a scope after inference");
                };
                let result = record.signature.result;

                let parameters = parameters
                    .iter()
                    .zip(&record.signature.parameters)
                    .map(|(parameter, ty)| Parameter {
                        name: parameter.name,
                        ty: *ty,
                    })
                    .collect();

                let statements = match &body.kind {
                    NodeKind::Block(statements) => {
                        self.populate_body(function_scope, statements, result, body.line)
                    }
                    _ => self.populate_body(
                        function_scope,
                        std::slice::from_ref(body.as_ref()),
                        result,
                        body.line,
                    ),
                };

                (
                    NodeKind::Function {
                        name: *name,
                        parameters,
                        body: Box::new(TypedNode {
                            kind: NodeKind::Block(statements),
                            line: body.line,
                            ty: result,
                        }),
                    },
                    result,
                )
            }
            NodeKind::If { condition, body } => {
                let condition = self.populate_boxed(scope, cursor, condition);
                let body = Box::new(self.populate_scoped_body(scope, cursor, body));
                let ty = body.ty;

                (NodeKind::If { condition, body }, ty)
            }
            NodeKind::While { condition, body } => {
                let condition = self.populate_boxed(scope, cursor, condition);
                let body = Box::new(self.populate_scoped_body(scope, cursor, body));
                let ty = body.ty;

                (NodeKind::While { condition, body }, ty)
            }
            NodeKind::Call { name, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.populate_node(scope, cursor, argument))
                    .collect();
                let ty = self
                    .functions
                    .get(name)
                    .map(|record| record.signature.result)
                    .unwrap_or_default();

                (NodeKind::Call { name: *name, arguments }, ty)
            }
            NodeKind::Log(value) => (
                NodeKind::Log(self.populate_boxed(scope, cursor, value)),
                ValueType::Void,
            ),
            NodeKind::Return(value) => {
                let value = self.populate_boxed(scope, cursor, value);
                let ty = value.ty;

                (NodeKind::Return(value), ty)
            }
            NodeKind::Assign {
                name,
                value,
                is_declaration,
            } => (
                NodeKind::Assign {
                    name: *name,
                    value: self.populate_boxed(scope, cursor, value),
                    is_declaration: *is_declaration,
                },
                self.resolve(scope, *name),
            ),
            NodeKind::Ident(name) => (NodeKind::Ident(*name), self.resolve(scope, *name)),
            NodeKind::Binary { operator, lhs, rhs } => {
                let ty = if operator.is_arithmetic() {
                    ValueType::I32
                } else {
                    ValueType::Bool
                };

                (
                    NodeKind::Binary {
                        operator: *operator,
                        lhs: self.populate_boxed(scope, cursor, lhs),
                        rhs: self.populate_boxed(scope, cursor, rhs),
                    },
                    ty,
                )
            }
            NodeKind::Unary { operator, operand } => {
                let ty = match operator {
                    UnaryOperatorKind::Not => ValueType::Bool,
                    UnaryOperatorKind::Negate => ValueType::I32,
                };

                (
                    NodeKind::Unary {
                        operator: *operator,
                        operand: self.populate_boxed(scope, cursor, operand),
                    },
                    ty,
                )
            }
        };

        TypedNode {
            kind,
            line: node.line,
            ty,
        }
    }
}

fn synthetic_return(ty: ValueType, line: usize) -> TypedNode {
    let kind = match ty {
        ValueType::I32 => LiteralKind::Integer,
        ValueType::Bool => LiteralKind::Boolean,
        ValueType::String => LiteralKind::String,
        ValueType::Void => LiteralKind::Void,
    };

    let value = TypedNode {
        kind: NodeKind::Literal(Literal {
            kind,
            value: InternedSymbol::new(ty.zero_value()),
        }),
        line,
        ty,
    };

    TypedNode {
        kind: NodeKind::Return(Box::new(value)),
        line,
        ty,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        frontend::{SourceFile, lexer::Lexer, parser::Parser},
        middle::type_env::type_check,
    };

    fn typed(input: &str) -> TypedProgram {
        let source = SourceFile::memory(input);
        let tokens = Lexer::tokenize(&source).unwrap();
        let program = Parser::parse_program(&source, &tokens).unwrap();

        type_check(&program).unwrap()
    }

    fn body_of(function: &TypedNode) -> &[TypedNode] {
        match &function.kind {
            NodeKind::Function { body, .. } => match &body.kind {
                NodeKind::Block(statements) => statements,
                other => panic!("expected block, found {other:?}"),
            },
            other => panic!("expected function, found {other:?}"),
        }
    }

    fn entry_of(program: &TypedProgram) -> &[TypedNode] {
        match &program.entry.kind {
            NodeKind::Block(statements) => statements,
            other => panic!("expected block, found {other:?}"),
        }
    }

    #[test]
    fn entry_gets_typed_declarations() {
        let program = typed("let x = 5 return x");

        assert_eq!(program.entry.ty, ValueType::I32);
        assert_eq!(entry_of(&program)[0].ty, ValueType::I32);
        assert_eq!(entry_of(&program).len(), 2);
    }

    #[test]
    fn parameters_carry_signature_types() {
        let program = typed(indoc! {"
            fn add: a, b { return a + b }
            let y = add(2, 3)
        "});

        let NodeKind::Function { parameters, .. } = &program.functions[0].kind else {
            panic!("expected function");
        };

        assert_eq!(
            parameters.iter().map(|parameter| parameter.ty).collect::<Vec<_>>(),
            [ValueType::I32, ValueType::I32]
        );
        assert_eq!(program.functions[0].ty, ValueType::I32);
        assert_eq!(entry_of(&program)[0].ty, ValueType::I32);
    }

    #[test]
    fn boolean_literals_become_bits() {
        let program = typed("let t = true let f = false");

        let values = entry_of(&program)
            .iter()
            .filter_map(|statement| match &statement.kind {
                NodeKind::Assign { value, .. } => match value.kind {
                    NodeKind::Literal(literal) => Some(literal.value.value()),
                    _ => None,
                },
                _ => None,
            })
            .collect::<Vec<_>>();

        assert_eq!(values, ["1", "0"]);
    }

    #[test]
    fn synthetic_return_is_appended() {
        let program = typed(indoc! {"
            fn greet: { log 1 }
            fn check: a { if a > 1 { return true } }
            fn nothing: { return void }
        "});

        assert_eq!(
            body_of(&program.functions[0]).last(),
            Some(&synthetic_return(ValueType::I32, 1))
        );
        assert_eq!(
            body_of(&program.functions[1]).last(),
            Some(&synthetic_return(ValueType::Bool, 2))
        );
        assert_eq!(body_of(&program.functions[2]).len(), 1);
        assert_eq!(program.functions[2].ty, ValueType::Void);
        assert_eq!(
            entry_of(&program).last(),
            Some(&synthetic_return(ValueType::I32, 1))
        );
    }

    #[test]
    fn nested_blocks_match_their_scopes() {
        let program = typed(indoc! {"
            let outer = 1
            if outer > 0 {
                let inner = \"text\"
                { let deeper = true }
                log inner
            }
            while outer < 3 { outer = outer + 1 }
        "});

        let NodeKind::If { body, .. } = &entry_of(&program)[1].kind else {
            panic!("expected if");
        };
        let NodeKind::Block(statements) = &body.kind else {
            panic!("expected block");
        };

        assert_eq!(statements[0].ty, ValueType::String);
        assert_eq!(statements[2].ty, ValueType::Void);

        let NodeKind::Block(deeper) = &statements[1].kind else {
            panic!("expected nested block");
        };

        assert_eq!(deeper[0].ty, ValueType::Bool);
    }
}
