use hashbrown::HashMap;

use super::ir::{
    CastOpcode, Function, Instruction, IrType, LabelId, Module, Opcode, Operand, RegisterId,
    StringId,
};
use crate::{
    error::CodegenError,
    frontend::{
        ast::{
            BinaryOperatorKind, LiteralKind, NodeKind, TypedNode, TypedProgram, UnaryOperatorKind,
        },
        intern::InternedSymbol,
    },
    index::{Index, IndexVec},
};

pub type Result<T> = std::result::Result<T, CodegenError>;

/// A lowered expression. Void expressions carry no usable operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Value {
    ty: IrType,
    operand: Operand,
}

impl Value {
    fn void() -> Self {
        Self {
            ty: IrType::Void,
            operand: Operand::Immediate(InternedSymbol::new("void")),
        }
    }
}

/// Lowers every function of `program` followed by the entry body, which
/// becomes `@main`
pub fn generate(program: &TypedProgram) -> Result<Module> {
    let mut module = Module::default();

    for function in &program.functions {
        let NodeKind::Function {
            name,
            parameters,
            body,
        } = &function.kind
        else {
            continue;
        };

        let parameters = parameters
            .iter()
            .map(|parameter| (parameter.name, IrType::from(parameter.ty)))
            .collect();
        let lowered = FunctionLoweringContext::lower(
            &mut module.strings,
            *name,
            function.ty.into(),
            parameters,
            body,
        )?;

        module.functions.push(lowered);
    }

    let main = FunctionLoweringContext::lower(
        &mut module.strings,
        InternedSymbol::new("main"),
        program.entry.ty.into(),
        Vec::new(),
        &program.entry,
    )?;

    module.functions.push(main);

    Ok(module)
}

struct FunctionLoweringContext<'m> {
    strings: &'m mut IndexVec<StringId, String>,
    function: Function,
    /// Shared by registers and labels, restarting at 1 for every function
    next_number: u32,
    /// Stack slot and slot type of every variable currently in scope
    variables: HashMap<InternedSymbol, (RegisterId, IrType)>,
}

impl<'m> FunctionLoweringContext<'m> {
    fn lower(
        strings: &'m mut IndexVec<StringId, String>,
        name: InternedSymbol,
        return_type: IrType,
        parameters: Vec<(InternedSymbol, IrType)>,
        body: &TypedNode,
    ) -> Result<Function> {
        let mut context = Self {
            strings,
            function: Function {
                name,
                return_type,
                parameters: parameters.clone(),
                instructions: Vec::new(),
                labels: IndexVec::new(),
            },
            next_number: 1,
            variables: HashMap::new(),
        };

        // Spill parameters so they can be read and reassigned like locals
        for (parameter, ty) in parameters {
            let slot = context.allocate(ty);

            context.push(Instruction::Store {
                ty,
                value: Operand::Parameter(parameter),
                destination: slot,
            });
            context.variables.insert(parameter, (slot, ty));
        }

        context.lower_statement(body)?;

        Ok(context.function)
    }

    fn push(&mut self, instruction: Instruction) {
        self.function.instructions.push(instruction);
    }

    fn create_register(&mut self) -> RegisterId {
        let register = RegisterId::new(self.next_number as usize);
        self.next_number += 1;
        register
    }

    fn create_label(&mut self) -> LabelId {
        self.function.labels.push(None)
    }

    /// Places `label` at the current position, giving it the next number
    fn place_label(&mut self, label: LabelId) {
        self.function.labels[label] = Some(self.next_number);
        self.next_number += 1;
        self.push(Instruction::Label(label));
    }

    fn allocate(&mut self, ty: IrType) -> RegisterId {
        let slot = self.create_register();
        self.push(Instruction::Alloca {
            destination: slot,
            ty,
        });
        slot
    }

    fn require(value: Value, line: usize) -> Result<Value> {
        if value.ty == IrType::Void {
            return Err(CodegenError::VoidOperand { line });
        }

        Ok(value)
    }

    /// Converts an `i32` value stored into a slot whose binding was later
    /// refined to another type
    fn coerce(&mut self, value: Value, ty: IrType) -> Value {
        let opcode = match (value.ty, ty) {
            (IrType::I32, IrType::I1) => CastOpcode::Trunc,
            (IrType::I32, IrType::Ptr) => CastOpcode::IntToPtr,
            _ => return value,
        };

        if let (CastOpcode::Trunc, Operand::Immediate(text)) = (opcode, value.operand) {
            let bit = text.value().parse::<i32>().map_or(0, |number| number & 1);

            return Value {
                ty,
                operand: Operand::Immediate(InternedSymbol::new(&bit.to_string())),
            };
        }

        let destination = self.create_register();

        self.push(Instruction::Cast {
            destination,
            opcode,
            from: value.ty,
            value: value.operand,
            to: ty,
        });

        Value {
            ty,
            operand: Operand::Register(destination),
        }
    }

    fn variable(&self, name: InternedSymbol, line: usize) -> Result<(RegisterId, IrType)> {
        self.variables
            .get(&name)
            .copied()
            .ok_or(CodegenError::MissingStorage { line, name })
    }

    /// Returns whether the statement ended in a return, in which case
    /// nothing after it in the same block is reachable
    fn lower_statement(&mut self, node: &TypedNode) -> Result<bool> {
        match &node.kind {
            NodeKind::Block(statements) => {
                let outer = self.variables.clone();
                let mut returned = false;

                for statement in statements {
                    if self.lower_statement(statement)? {
                        returned = true;
                        break;
                    }
                }

                self.variables = outer;

                Ok(returned)
            }
            NodeKind::Assign {
                name,
                value,
                is_declaration,
            } => {
                let value = Self::require(self.lower_expression(value)?, node.line)?;

                let (slot, ty) = if *is_declaration {
                    let ty = IrType::from(node.ty);
                    let slot = self.allocate(ty);
                    self.variables.insert(*name, (slot, ty));
                    (slot, ty)
                } else {
                    self.variable(*name, node.line)?
                };

                let value = self.coerce(value, ty);

                self.push(Instruction::Store {
                    ty,
                    value: value.operand,
                    destination: slot,
                });

                Ok(false)
            }
            NodeKind::Log(value) => {
                let value = Self::require(self.lower_expression(value)?, node.line)?;

                self.push(Instruction::Call {
                    destination: None,
                    return_type: IrType::Void,
                    function: InternedSymbol::new(&format!("print{}", value.ty)),
                    arguments: vec![(value.ty, value.operand)],
                });

                Ok(false)
            }
            NodeKind::Return(value) => {
                let value = self.lower_expression(value)?;

                self.push(Instruction::Return {
                    value: (value.ty != IrType::Void).then_some((value.ty, value.operand)),
                });

                Ok(true)
            }
            NodeKind::If { condition, body } => {
                let condition = Self::require(self.lower_expression(condition)?, node.line)?;
                let positive = self.create_label();
                let continuation = self.create_label();

                self.push(Instruction::Branch {
                    condition: condition.operand,
                    positive,
                    negative: continuation,
                });
                self.place_label(positive);

                if !self.lower_statement(body)? {
                    self.push(Instruction::Jump {
                        destination: continuation,
                    });
                }

                self.place_label(continuation);

                Ok(false)
            }
            NodeKind::While {
                condition: condition_node,
                body,
            } => {
                let condition = Self::require(self.lower_expression(condition_node)?, node.line)?;
                let positive = self.create_label();
                let continuation = self.create_label();

                self.push(Instruction::Branch {
                    condition: condition.operand,
                    positive,
                    negative: continuation,
                });
                self.place_label(positive);

                if !self.lower_statement(body)? {
                    let condition =
                        Self::require(self.lower_expression(condition_node)?, node.line)?;

                    self.push(Instruction::Branch {
                        condition: condition.operand,
                        positive,
                        negative: continuation,
                    });
                }

                self.place_label(continuation);

                Ok(false)
            }
            _ => {
                self.lower_expression(node)?;

                Ok(false)
            }
        }
    }

    fn lower_expression(&mut self, node: &TypedNode) -> Result<Value> {
        match &node.kind {
            NodeKind::Literal(literal) => Ok(match literal.kind {
                LiteralKind::Integer | LiteralKind::Boolean => Value {
                    ty: node.ty.into(),
                    operand: Operand::Immediate(literal.value),
                },
                LiteralKind::String => Value {
                    ty: IrType::Ptr,
                    operand: Operand::String(self.strings.push(literal.value.value().to_owned())),
                },
                LiteralKind::Void => Value::void(),
            }),
            NodeKind::Ident(name) => {
                let (slot, ty) = self.variable(*name, node.line)?;
                let destination = self.create_register();

                self.push(Instruction::Load {
                    destination,
                    ty,
                    source: slot,
                });

                Ok(Value {
                    ty,
                    operand: Operand::Register(destination),
                })
            }
            NodeKind::Binary { operator, lhs, rhs } => {
                let lhs = Self::require(self.lower_expression(lhs)?, node.line)?;
                let rhs = Self::require(self.lower_expression(rhs)?, node.line)?;

                let (opcode, ty) = match operator {
                    BinaryOperatorKind::Add => (Opcode::Add, IrType::I32),
                    BinaryOperatorKind::Subtract => (Opcode::Sub, IrType::I32),
                    BinaryOperatorKind::Multiply => (Opcode::Mul, IrType::I32),
                    BinaryOperatorKind::Divide => (Opcode::SDiv, IrType::I32),
                    BinaryOperatorKind::Modulus => (Opcode::SRem, IrType::I32),
                    BinaryOperatorKind::LogicalAnd => (Opcode::And, IrType::I1),
                    BinaryOperatorKind::LogicalOr => (Opcode::Or, IrType::I1),
                    BinaryOperatorKind::Equals => (Opcode::IcmpEq, lhs.ty),
                    BinaryOperatorKind::LessThan => (Opcode::IcmpSlt, IrType::I32),
                    BinaryOperatorKind::GreaterThan => (Opcode::IcmpSgt, IrType::I32),
                };

                let destination = self.create_register();

                self.push(Instruction::Binary {
                    destination,
                    opcode,
                    ty,
                    lhs: lhs.operand,
                    rhs: rhs.operand,
                });

                Ok(Value {
                    ty: node.ty.into(),
                    operand: Operand::Register(destination),
                })
            }
            NodeKind::Unary { operator, operand } => {
                let operand = Self::require(self.lower_expression(operand)?, node.line)?;

                let (opcode, ty, constant) = match operator {
                    UnaryOperatorKind::Not => (Opcode::IcmpEq, operand.ty, "0"),
                    UnaryOperatorKind::Negate => (Opcode::Mul, IrType::I32, "-1"),
                };

                let destination = self.create_register();

                self.push(Instruction::Binary {
                    destination,
                    opcode,
                    ty,
                    lhs: operand.operand,
                    rhs: Operand::Immediate(InternedSymbol::new(constant)),
                });

                Ok(Value {
                    ty: node.ty.into(),
                    operand: Operand::Register(destination),
                })
            }
            NodeKind::Call { name, arguments } => {
                let mut lowered = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    let value = Self::require(self.lower_expression(argument)?, argument.line)?;
                    lowered.push((value.ty, value.operand));
                }

                let return_type = IrType::from(node.ty);
                let destination = (return_type != IrType::Void).then(|| self.create_register());

                self.push(Instruction::Call {
                    destination,
                    return_type,
                    function: *name,
                    arguments: lowered,
                });

                Ok(match destination {
                    Some(destination) => Value {
                        ty: return_type,
                        operand: Operand::Register(destination),
                    },
                    None => Value::void(),
                })
            }
            _ => {
                self.lower_statement(node)?;

                Ok(Value::void())
            }
        }
    }
}
