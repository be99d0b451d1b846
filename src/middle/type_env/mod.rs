//! Scope-aware type inference. The first traversal mutates binding types in
//! place over an arena of scopes; once every function signature has settled,
//! [`populate`] rebuilds the AST with the resolved types attached.

use hashbrown::HashMap;

use crate::{
    error::{TypeError, TypeErrorKind},
    frontend::{
        ast::{
            BinaryOperatorKind, LiteralKind, NodeKind, Parameter, TypedProgram,
            UnaryOperatorKind, UntypedNode, UntypedProgram,
        },
        intern::InternedSymbol,
    },
    index::{Index, IndexVec, simple_index},
    middle::ty::ValueType,
};

pub mod populate;

pub type Result<T> = std::result::Result<T, TypeError>;

simple_index! {
    /// Identifies a scope inside a [`TypeEnvironment`]
    pub struct ScopeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The top-level statements
    Entry,
    Function(InternedSymbol),
    Block,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub bindings: HashMap<InternedSymbol, ValueType>,
    /// Type of the last `return` visited in this scope or below it
    pub result: ValueType,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            bindings: HashMap::new(),
            result: ValueType::DEFAULT,
        }
    }
}

/// Parameter and result types shared by every call site of a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub parameters: Vec<ValueType>,
    pub result: ValueType,
}

#[derive(Debug)]
struct FunctionRecord<'ast> {
    line: usize,
    parameters: &'ast [Parameter<()>],
    body: &'ast UntypedNode,
    signature: Signature,
    /// Scope retained for re-specialization during the current pass
    scope: Option<ScopeId>,
    in_progress: bool,
}

#[derive(Debug)]
pub struct TypeEnvironment<'ast> {
    program: &'ast UntypedProgram,
    scopes: IndexVec<ScopeId, Scope>,
    root: ScopeId,
    functions: HashMap<InternedSymbol, FunctionRecord<'ast>>,
    /// Function names in declaration order
    declaration_order: Vec<InternedSymbol>,
}

/// Infers the types of `program` and returns the typed rebuild of it
pub fn type_check(program: &UntypedProgram) -> Result<TypedProgram> {
    Ok(TypeEnvironment::infer(program)?.populate())
}

impl<'ast> TypeEnvironment<'ast> {
    /// Runs inference passes over the whole program until no function
    /// signature changes between two consecutive passes.
    pub fn infer(program: &'ast UntypedProgram) -> Result<Self> {
        let mut functions = HashMap::new();
        let mut declaration_order = Vec::new();

        for function in &program.functions {
            let NodeKind::Function {
                name,
                parameters,
                body,
            } = &function.kind
            else {
                continue;
            };

            functions.insert(
                *name,
                FunctionRecord {
                    line: function.line,
                    parameters,
                    body,
                    signature: Signature {
                        parameters: vec![ValueType::DEFAULT; parameters.len()],
                        result: ValueType::DEFAULT,
                    },
                    scope: None,
                    in_progress: false,
                },
            );
            declaration_order.push(*name);
        }

        let mut environment = Self {
            program,
            scopes: IndexVec::new(),
            root: ScopeId::new(0),
            functions,
            declaration_order,
        };

        // Every slot can only move away from the default once
        let pass_limit = 2 + environment
            .functions
            .values()
            .map(|function| function.parameters.len() + 1)
            .sum::<usize>();

        let mut unstable = None;

        for _ in 0..pass_limit {
            let before = environment.signatures();
            environment.run_pass()?;
            let after = environment.signatures();

            unstable = environment
                .declaration_order
                .iter()
                .zip(before.iter().zip(&after))
                .find(|(_, (before, after))| before != after)
                .map(|(name, _)| *name);

            if unstable.is_none() {
                break;
            }
        }

        match unstable {
            None => Ok(environment),
            Some(function) => Err(TypeError {
                line: environment.functions[&function].line,
                kind: TypeErrorKind::UnstableSignature { function },
            }),
        }
    }

    pub fn scopes(&self) -> &IndexVec<ScopeId, Scope> {
        &self.scopes
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn signature(&self, function: InternedSymbol) -> Option<&Signature> {
        self.functions.get(&function).map(|record| &record.signature)
    }

    fn signatures(&self) -> Vec<Signature> {
        self.declaration_order
            .iter()
            .map(|name| self.functions[name].signature.clone())
            .collect()
    }

    fn run_pass(&mut self) -> Result<()> {
        let program = self.program;

        self.scopes = IndexVec::new();
        self.root = self.scopes.push(Scope::new(ScopeKind::Entry, None));

        // Function scopes exist up front so a call can specialize a function
        // declared further down
        for index in 0..self.declaration_order.len() {
            let name = self.declaration_order[index];
            let scope = self.push_scope(self.root, ScopeKind::Function(name));

            self.scopes[self.root]
                .bindings
                .insert(name, ValueType::DEFAULT);

            if let Some(record) = self.functions.get_mut(&name) {
                record.scope = Some(scope);
                record.in_progress = false;
            }
        }

        for function in &program.functions {
            self.infer_node(self.root, function)?;
        }

        match &program.entry.kind {
            NodeKind::Block(statements) => self.infer_statements(self.root, statements),
            _ => self.infer_node(self.root, &program.entry).map(|_| ()),
        }
    }

    fn push_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let scope = self.scopes.push(Scope::new(kind, Some(parent)));
        self.scopes[parent].children.push(scope);
        scope
    }

    /// Finds the nearest scope, starting at `scope`, that owns `name`
    fn owner_of(&self, scope: ScopeId, name: InternedSymbol) -> Option<ScopeId> {
        let mut current = Some(scope);

        while let Some(id) = current {
            if self.scopes[id].bindings.contains_key(&name) {
                return Some(id);
            }

            current = self.scopes[id].parent;
        }

        None
    }

    pub fn lookup(&self, scope: ScopeId, name: InternedSymbol, line: usize) -> Result<ValueType> {
        self.owner_of(scope, name)
            .and_then(|owner| self.scopes[owner].bindings.get(&name).copied())
            .ok_or(TypeError {
                line,
                kind: TypeErrorKind::MissingDeclaration { name },
            })
    }

    /// Pushes `incoming` into the binding of `name` owned by the nearest
    /// enclosing scope
    fn receive(
        &mut self,
        scope: ScopeId,
        name: InternedSymbol,
        incoming: ValueType,
        line: usize,
    ) -> Result<()> {
        let Some(owner) = self.owner_of(scope, name) else {
            return Err(TypeError {
                line,
                kind: TypeErrorKind::MissingDeclaration { name },
            });
        };

        let Some(existing) = self.scopes[owner].bindings.get_mut(&name) else {
            unreachable!("owner_of only returns scopes holding the binding");
        };

        match existing.refine(incoming) {
            Some(refined) => {
                *existing = refined;
                Ok(())
            }
            None => Err(TypeError {
                line,
                kind: TypeErrorKind::AlreadyAssigned {
                    name,
                    existing: *existing,
                    found: incoming,
                },
            }),
        }
    }

    /// A return overwrites the result of every scope up to the enclosing
    /// function or entry scope
    fn set_result(&mut self, scope: ScopeId, ty: ValueType) {
        let mut current = Some(scope);

        while let Some(id) = current {
            self.scopes[id].result = ty;

            if self.scopes[id].kind != ScopeKind::Block {
                break;
            }

            current = self.scopes[id].parent;
        }
    }

    fn infer_statements(&mut self, scope: ScopeId, statements: &'ast [UntypedNode]) -> Result<()> {
        for statement in statements {
            self.infer_node(scope, statement)?;
        }

        Ok(())
    }

    /// Infers `body` in a fresh child scope. A block body becomes that scope
    /// itself rather than nesting a second one.
    fn infer_scoped_body(&mut self, scope: ScopeId, body: &'ast UntypedNode) -> Result<ValueType> {
        let child = self.push_scope(scope, ScopeKind::Block);

        match &body.kind {
            NodeKind::Block(statements) => self.infer_statements(child, statements)?,
            _ => {
                self.infer_node(child, body)?;
            }
        }

        Ok(self.scopes[child].result)
    }

    fn infer_node(&mut self, scope: ScopeId, node: &'ast UntypedNode) -> Result<ValueType> {
        match &node.kind {
            NodeKind::Literal(literal) => Ok(match literal.kind {
                LiteralKind::Integer => ValueType::I32,
                LiteralKind::String => ValueType::String,
                LiteralKind::Boolean => ValueType::Bool,
                LiteralKind::Void => ValueType::Void,
            }),
            NodeKind::Block(_) => self.infer_scoped_body(scope, node),
            NodeKind::Function { name, .. } => {
                self.scopes[scope]
                    .bindings
                    .insert(*name, ValueType::DEFAULT);

                self.specialize(*name)
            }
            NodeKind::If { condition, body } | NodeKind::While { condition, body } => {
                let found = self.infer_node(scope, condition)?;

                if found != ValueType::Bool {
                    return Err(TypeError {
                        line: condition.line,
                        kind: TypeErrorKind::NonBooleanCondition { found },
                    });
                }

                self.infer_scoped_body(scope, body)
            }
            NodeKind::Call { name, arguments } => {
                self.infer_call(scope, *name, arguments, node.line)
            }
            NodeKind::Log(value) => {
                self.infer_node(scope, value)?;

                Ok(ValueType::Void)
            }
            NodeKind::Return(value) => {
                let ty = self.infer_node(scope, value)?;
                self.set_result(scope, ty);

                Ok(ty)
            }
            NodeKind::Assign {
                name,
                value,
                is_declaration,
            } => {
                let ty = self.infer_node(scope, value)?;

                if *is_declaration {
                    self.scopes[scope].bindings.insert(*name, ty);
                } else {
                    self.receive(scope, *name, ty, node.line)?;
                }

                self.lookup(scope, *name, node.line)
            }
            NodeKind::Ident(name) => self.lookup(scope, *name, node.line),
            NodeKind::Binary { operator, lhs, rhs } => {
                self.infer_binary(scope, *operator, lhs, rhs, node.line)
            }
            NodeKind::Unary { operator, operand } => {
                let found = self.infer_node(scope, operand)?;

                match operator {
                    UnaryOperatorKind::Not => {
                        if found != ValueType::Bool && !found.is_default() {
                            return Err(TypeError {
                                line: node.line,
                                kind: TypeErrorKind::NotOperand { found },
                            });
                        }

                        Ok(ValueType::Bool)
                    }
                    UnaryOperatorKind::Negate => {
                        if found != ValueType::I32 {
                            return Err(TypeError {
                                line: node.line,
                                kind: TypeErrorKind::NegateOperand { found },
                            });
                        }

                        Ok(ValueType::I32)
                    }
                }
            }
        }
    }

    /// Bare identifier operands are pinned to the type the operator needs
    fn force_identifier(
        &mut self,
        scope: ScopeId,
        node: &UntypedNode,
        ty: ValueType,
    ) -> Result<()> {
        match node.kind {
            NodeKind::Ident(name) => self.receive(scope, name, ty, node.line),
            _ => Ok(()),
        }
    }

    fn infer_binary(
        &mut self,
        scope: ScopeId,
        operator: BinaryOperatorKind,
        lhs: &'ast UntypedNode,
        rhs: &'ast UntypedNode,
        line: usize,
    ) -> Result<ValueType> {
        let lhs_ty = self.infer_node(scope, lhs)?;
        let rhs_ty = self.infer_node(scope, rhs)?;
        let both_concrete = !lhs_ty.is_default() && !rhs_ty.is_default();

        let mismatch = TypeError {
            line,
            kind: TypeErrorKind::ComparisonMismatch {
                lhs: lhs_ty,
                rhs: rhs_ty,
            },
        };

        if operator.is_logical() {
            if both_concrete && lhs_ty != rhs_ty {
                return Err(mismatch);
            }

            self.force_identifier(scope, lhs, ValueType::Bool)?;
            self.force_identifier(scope, rhs, ValueType::Bool)?;

            Ok(ValueType::Bool)
        } else if operator.is_ordering() {
            self.force_identifier(scope, lhs, ValueType::I32)?;
            self.force_identifier(scope, rhs, ValueType::I32)?;

            Ok(ValueType::Bool)
        } else if operator == BinaryOperatorKind::Equals {
            if both_concrete && lhs_ty != rhs_ty {
                return Err(mismatch);
            }

            Ok(ValueType::Bool)
        } else {
            // Concrete means anything but i32 here
            if both_concrete {
                return Err(TypeError {
                    line,
                    kind: TypeErrorKind::NonNumericOperand {
                        lhs: lhs_ty,
                        rhs: rhs_ty,
                    },
                });
            }

            self.force_identifier(scope, lhs, ValueType::I32)?;
            self.force_identifier(scope, rhs, ValueType::I32)?;

            Ok(ValueType::I32)
        }
    }

    fn infer_call(
        &mut self,
        scope: ScopeId,
        name: InternedSymbol,
        arguments: &'ast [UntypedNode],
        line: usize,
    ) -> Result<ValueType> {
        let mut argument_types = Vec::with_capacity(arguments.len());

        for argument in arguments {
            argument_types.push(self.infer_node(scope, argument)?);
        }

        let Some(record) = self.functions.get_mut(&name) else {
            return Ok(ValueType::DEFAULT);
        };

        let slots = record
            .parameters
            .iter()
            .zip(record.signature.parameters.iter_mut());

        for ((parameter, slot), found) in slots.zip(argument_types) {
            match slot.refine(found) {
                Some(refined) => *slot = refined,
                None => {
                    return Err(TypeError {
                        line,
                        kind: TypeErrorKind::ConflictingArgument {
                            function: name,
                            parameter: parameter.name,
                            existing: *slot,
                            found,
                        },
                    });
                }
            }
        }

        self.specialize(name)
    }

    /// Re-infers the retained scope of `name` under its current signature and
    /// writes the outcome back into the signature. Functions already being
    /// inferred further up the stack answer with their current signature.
    fn specialize(&mut self, name: InternedSymbol) -> Result<ValueType> {
        let Some(record) = self.functions.get_mut(&name) else {
            return Ok(ValueType::DEFAULT);
        };

        let Some(scope) = record.scope.filter(|_| !record.in_progress) else {
            return Ok(record.signature.result);
        };

        record.in_progress = true;

        let parameters = record.parameters;
        let body = record.body;
        let line = record.line;

        let retained = &mut self.scopes[scope];
        retained.children.clear();
        retained.result = ValueType::DEFAULT;
        retained.bindings = parameters
            .iter()
            .map(|parameter| parameter.name)
            .zip(record.signature.parameters.iter().copied())
            .collect();

        let outcome = match &body.kind {
            NodeKind::Block(statements) => self.infer_statements(scope, statements),
            _ => self.infer_node(scope, body).map(|_| ()),
        };

        let retained = &self.scopes[scope];
        let result = retained.result;
        let inferred = parameters
            .iter()
            .map(|parameter| {
                retained
                    .bindings
                    .get(&parameter.name)
                    .copied()
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>();
        let declaring_scope = retained.parent;

        let Some(record) = self.functions.get_mut(&name) else {
            unreachable!("function records are never removed");
        };

        record.in_progress = false;
        outcome?;

        // Recursive calls may have refined the signature while the body was
        // being inferred
        for ((parameter, slot), found) in parameters
            .iter()
            .zip(record.signature.parameters.iter_mut())
            .zip(inferred)
        {
            match slot.unify(found) {
                Some(unified) => *slot = unified,
                None => {
                    return Err(TypeError {
                        line,
                        kind: TypeErrorKind::ConflictingArgument {
                            function: name,
                            parameter: parameter.name,
                            existing: *slot,
                            found,
                        },
                    });
                }
            }
        }

        record.signature.result = result;

        if let Some(declaring_scope) = declaring_scope {
            self.scopes[declaring_scope].bindings.insert(name, result);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::frontend::{SourceFile, lexer::Lexer, parser::Parser};

    fn parse(input: &str) -> UntypedProgram {
        let source = SourceFile::memory(input);
        let tokens = Lexer::tokenize(&source).unwrap();

        Parser::parse_program(&source, &tokens).unwrap()
    }

    fn binding(environment: &TypeEnvironment, scope: ScopeId, name: &str) -> ValueType {
        environment.scopes()[scope].bindings[&InternedSymbol::new(name)]
    }

    fn error_kind(input: &str) -> TypeErrorKind {
        let program = parse(input);

        TypeEnvironment::infer(&program).unwrap_err().kind
    }

    #[test]
    fn integer_declaration_and_entry_result() {
        let program = parse("let x = 5 return x");
        let environment = TypeEnvironment::infer(&program).unwrap();
        let root = environment.root();

        assert_eq!(binding(&environment, root, "x"), ValueType::I32);
        assert_eq!(environment.scopes()[root].result, ValueType::I32);
    }

    #[test]
    fn call_specializes_function() {
        let program = parse(indoc! {"
            fn add: a, b { return a + b }
            let y = add(2, 3)
        "});
        let environment = TypeEnvironment::infer(&program).unwrap();

        assert_eq!(
            environment.signature(InternedSymbol::new("add")),
            Some(&Signature {
                parameters: vec![ValueType::I32, ValueType::I32],
                result: ValueType::I32,
            })
        );
        assert_eq!(binding(&environment, environment.root(), "y"), ValueType::I32);
    }

    #[test]
    fn argument_types_flow_into_result() {
        let program = parse(indoc! {"
            fn id: a { return a }
            let b = id(true)
            let s = id \"not bool\"
        "});

        assert_eq!(
            TypeEnvironment::infer(&program).unwrap_err(),
            TypeError {
                line: 3,
                kind: TypeErrorKind::ConflictingArgument {
                    function: InternedSymbol::new("id"),
                    parameter: InternedSymbol::new("a"),
                    existing: ValueType::Bool,
                    found: ValueType::String,
                },
            }
        );
    }

    #[test]
    fn signature_is_shared_by_earlier_call_sites() {
        let program = parse(indoc! {"
            fn id: a { return a }
            log id(1)
            log id(true)
        "});

        assert_eq!(
            TypeEnvironment::infer(&program).unwrap_err(),
            TypeError {
                line: 2,
                kind: TypeErrorKind::ConflictingArgument {
                    function: InternedSymbol::new("id"),
                    parameter: InternedSymbol::new("a"),
                    existing: ValueType::Bool,
                    found: ValueType::I32,
                },
            }
        );
    }

    #[test]
    fn body_constraints_reach_the_signature() {
        let program = parse(indoc! {"
            fn both: a, b { return a && b }
            let t = both(true, false)
        "});
        let environment = TypeEnvironment::infer(&program).unwrap();

        assert_eq!(
            environment.signature(InternedSymbol::new("both")),
            Some(&Signature {
                parameters: vec![ValueType::Bool, ValueType::Bool],
                result: ValueType::Bool,
            })
        );
    }

    #[test]
    fn recursive_function() {
        let program = parse(indoc! {"
            fn count: n {
                if n > 0 { return count(n - 1) }
                return 0
            }
            log count(3)
        "});
        let environment = TypeEnvironment::infer(&program).unwrap();

        assert_eq!(
            environment.signature(InternedSymbol::new("count")),
            Some(&Signature {
                parameters: vec![ValueType::I32],
                result: ValueType::I32,
            })
        );
    }

    #[test]
    fn function_declared_later_is_resolved() {
        let program = parse(indoc! {"
            fn first: { return second() }
            fn second: { return true }
            let x = first()
        "});
        let environment = TypeEnvironment::infer(&program).unwrap();

        assert_eq!(binding(&environment, environment.root(), "x"), ValueType::Bool);
    }

    #[test]
    fn return_inside_branch_sets_function_result() {
        let program = parse("fn check: a { if a > 1 { return true } }");
        let environment = TypeEnvironment::infer(&program).unwrap();

        assert_eq!(
            environment
                .signature(InternedSymbol::new("check"))
                .map(|signature| signature.result),
            Some(ValueType::Bool)
        );
    }

    #[test]
    fn logical_operator_forces_identifier() {
        let program = parse("let flag = 1 log flag || false");
        let environment = TypeEnvironment::infer(&program).unwrap();

        assert_eq!(binding(&environment, environment.root(), "flag"), ValueType::Bool);
    }

    #[test]
    fn assignment_reaches_enclosing_scope() {
        let program = parse("let x = 0 while x < 3 { x = x + 1 }");
        let environment = TypeEnvironment::infer(&program).unwrap();
        let root = environment.root();

        assert_eq!(binding(&environment, root, "x"), ValueType::I32);

        let x = InternedSymbol::new("x");

        assert!(
            environment.scopes()[root]
                .children
                .iter()
                .all(|child| !environment.scopes()[*child].bindings.contains_key(&x))
        );
    }

    #[test]
    fn bool_then_integer_assignment() {
        assert_eq!(
            error_kind("let x = true\nx = 5"),
            TypeErrorKind::AlreadyAssigned {
                name: InternedSymbol::new("x"),
                existing: ValueType::Bool,
                found: ValueType::I32,
            }
        );
    }

    #[test]
    fn assignment_without_declaration() {
        assert_eq!(
            error_kind("x = 5"),
            TypeErrorKind::MissingDeclaration {
                name: InternedSymbol::new("x"),
            }
        );
    }

    #[test]
    fn block_bindings_do_not_leak() {
        assert_eq!(
            error_kind("{ let inner = 1 } log inner"),
            TypeErrorKind::MissingDeclaration {
                name: InternedSymbol::new("inner"),
            }
        );
    }

    #[test]
    fn non_boolean_condition() {
        assert_eq!(
            error_kind("if 1 { log 1 }"),
            TypeErrorKind::NonBooleanCondition {
                found: ValueType::I32,
            }
        );
    }

    #[test]
    fn operand_errors() {
        assert_eq!(
            error_kind("log \"a\" + \"b\""),
            TypeErrorKind::NonNumericOperand {
                lhs: ValueType::String,
                rhs: ValueType::String,
            }
        );
        assert_eq!(
            error_kind("log true && \"b\""),
            TypeErrorKind::ComparisonMismatch {
                lhs: ValueType::Bool,
                rhs: ValueType::String,
            }
        );
        assert_eq!(
            error_kind("log \"a\" == true"),
            TypeErrorKind::ComparisonMismatch {
                lhs: ValueType::String,
                rhs: ValueType::Bool,
            }
        );
        assert_eq!(
            error_kind("log !\"a\""),
            TypeErrorKind::NotOperand {
                found: ValueType::String,
            }
        );
        assert_eq!(
            error_kind("log -true"),
            TypeErrorKind::NegateOperand {
                found: ValueType::Bool,
            }
        );
    }

    #[test]
    fn inference_is_deterministic() {
        let program = parse(indoc! {"
            fn pick: a, b { if a && true { return b } return b }
            let x = pick(true, 2)
            while x > 0 { x = x - 1 }
        "});

        let first = TypeEnvironment::infer(&program).unwrap().populate();
        let second = TypeEnvironment::infer(&program).unwrap().populate();

        assert_eq!(first, second);
    }
}
