//! LLVM-flavoured IR. Instructions are kept structured until rendering so
//! that branch targets can be created before the number of the label they
//! point at is known.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use strum::Display;

use crate::{
    frontend::intern::InternedSymbol,
    index::{Index, IndexVec, simple_index},
    middle::ty::ValueType,
};

#[derive(Debug, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    /// Contents of every string literal, addressed by [`StringId`]
    pub strings: IndexVec<StringId, String>,
}

#[derive(Debug)]
pub struct Function {
    pub name: InternedSymbol,
    pub return_type: IrType,
    pub parameters: Vec<(InternedSymbol, IrType)>,
    pub instructions: Vec<Instruction>,
    /// Number each label received when it was placed
    pub labels: IndexVec<LabelId, Option<u32>>,
}

simple_index! {
    /// A numbered virtual register holding one computed value
    pub struct RegisterId;
}

simple_index! {
    /// A branch target whose number is fixed once the label is placed
    pub struct LabelId;
}

simple_index! {
    /// Identifies a private string constant of the module
    pub struct StringId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum IrType {
    I32,
    I1,
    Ptr,
    Void,
}

impl From<ValueType> for IrType {
    fn from(ty: ValueType) -> Self {
        match ty {
            ValueType::I32 => IrType::I32,
            ValueType::Bool => IrType::I1,
            ValueType::String => IrType::Ptr,
            ValueType::Void => IrType::Void,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Literal text such as `5` or `-1`
    Immediate(InternedSymbol),
    Register(RegisterId),
    /// `%name` of a function parameter
    Parameter(InternedSymbol),
    String(StringId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Opcode {
    #[strum(to_string = "add")]
    Add,
    #[strum(to_string = "sub")]
    Sub,
    #[strum(to_string = "mul")]
    Mul,
    #[strum(to_string = "sdiv")]
    SDiv,
    #[strum(to_string = "srem")]
    SRem,
    #[strum(to_string = "and")]
    And,
    #[strum(to_string = "or")]
    Or,
    #[strum(to_string = "icmp eq")]
    IcmpEq,
    #[strum(to_string = "icmp slt")]
    IcmpSlt,
    #[strum(to_string = "icmp sgt")]
    IcmpSgt,
}

/// Conversions out of `i32`, needed when a binding was refined after its
/// first store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CastOpcode {
    Trunc,
    IntToPtr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Alloca {
        destination: RegisterId,
        ty: IrType,
    },
    Load {
        destination: RegisterId,
        ty: IrType,
        source: RegisterId,
    },
    Store {
        ty: IrType,
        value: Operand,
        destination: RegisterId,
    },
    Binary {
        destination: RegisterId,
        opcode: Opcode,
        /// Type of the operands
        ty: IrType,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        destination: RegisterId,
        opcode: CastOpcode,
        from: IrType,
        value: Operand,
        to: IrType,
    },
    Call {
        destination: Option<RegisterId>,
        return_type: IrType,
        function: InternedSymbol,
        arguments: Vec<(IrType, Operand)>,
    },
    Branch {
        condition: Operand,
        positive: LabelId,
        negative: LabelId,
    },
    Jump {
        destination: LabelId,
    },
    Return {
        value: Option<(IrType, Operand)>,
    },
    Label(LabelId),
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. } | Instruction::Jump { .. } | Instruction::Return { .. }
        )
    }
}

impl Display for RegisterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.index())
    }
}

impl Display for StringId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@.str.{}", self.index())
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Immediate(text) => write!(f, "{text}"),
            Operand::Register(register) => write!(f, "{register}"),
            Operand::Parameter(name) => write!(f, "%{name}"),
            Operand::String(string) => write!(f, "{string}"),
        }
    }
}

impl Function {
    pub(crate) fn label(&self, label: LabelId) -> String {
        match self.labels[label] {
            Some(number) => number.to_string(),
            None => format!("unplaced.{}", label.index()),
        }
    }

    fn write_instruction(&self, f: &mut Formatter<'_>, instruction: &Instruction) -> fmt::Result {
        match instruction {
            Instruction::Label(label) => return writeln!(f, "{}:", self.label(*label)),
            _ => f.write_str("\t")?,
        }

        match instruction {
            Instruction::Alloca { destination, ty } => writeln!(f, "{destination} = alloca {ty}"),
            Instruction::Load {
                destination,
                ty,
                source,
            } => writeln!(f, "{destination} = load {ty}, ptr {source}"),
            Instruction::Store {
                ty,
                value,
                destination,
            } => writeln!(f, "store {ty} {value}, ptr {destination}"),
            Instruction::Binary {
                destination,
                opcode,
                ty,
                lhs,
                rhs,
            } => writeln!(f, "{destination} = {opcode} {ty} {lhs}, {rhs}"),
            Instruction::Cast {
                destination,
                opcode,
                from,
                value,
                to,
            } => writeln!(f, "{destination} = {opcode} {from} {value} to {to}"),
            Instruction::Call {
                destination,
                return_type,
                function,
                arguments,
            } => {
                if let Some(destination) = destination {
                    write!(f, "{destination} = ")?;
                }

                writeln!(
                    f,
                    "call {return_type} @{function}({})",
                    arguments
                        .iter()
                        .map(|(ty, operand)| format!("{ty} {operand}"))
                        .join(", ")
                )
            }
            Instruction::Branch {
                condition,
                positive,
                negative,
            } => writeln!(
                f,
                "br i1 {condition}, label %{}, label %{}",
                self.label(*positive),
                self.label(*negative)
            ),
            Instruction::Jump { destination } => {
                writeln!(f, "br label %{}", self.label(*destination))
            }
            Instruction::Return { value: None } => writeln!(f, "ret void"),
            Instruction::Return {
                value: Some((ty, operand)),
            } => writeln!(f, "ret {ty} {operand}"),
            Instruction::Label(_) => Ok(()),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "define {} @{}({}) {{",
            self.return_type,
            self.name,
            self.parameters
                .iter()
                .map(|(name, ty)| format!("{ty} %{name}"))
                .join(", ")
        )?;

        for instruction in &self.instructions {
            self.write_instruction(f, instruction)?;
        }

        writeln!(f, "}}")
    }
}

/// Escapes `contents` for use inside a `c"..."` constant
pub(crate) fn escape_string(contents: &str) -> String {
    contents
        .bytes()
        .map(|byte| match byte {
            b'"' | b'\\' => format!("\\{byte:02X}"),
            0x20..=0x7e => (byte as char).to_string(),
            _ => format!("\\{byte:02X}"),
        })
        .collect()
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let functions = self.functions.iter().map(|function| function.to_string());

        write!(f, "{}", functions.format("\n"))?;

        if !self.strings.is_empty() {
            writeln!(f)?;
        }

        for (id, contents) in self.strings.enumerate() {
            writeln!(
                f,
                "{id} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
                contents.len() + 1,
                escape_string(contents)
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn labels_render_with_their_placed_number() {
        let mut labels = IndexVec::new();
        let positive = labels.push(Some(2));
        let negative = labels.push(Some(3));

        let function = Function {
            name: InternedSymbol::new("main"),
            return_type: IrType::I32,
            parameters: Vec::new(),
            instructions: vec![
                Instruction::Binary {
                    destination: RegisterId::new(1),
                    opcode: Opcode::IcmpSlt,
                    ty: IrType::I32,
                    lhs: Operand::Immediate(InternedSymbol::new("1")),
                    rhs: Operand::Immediate(InternedSymbol::new("2")),
                },
                Instruction::Branch {
                    condition: Operand::Register(RegisterId::new(1)),
                    positive,
                    negative,
                },
                Instruction::Label(positive),
                Instruction::Jump {
                    destination: negative,
                },
                Instruction::Label(negative),
                Instruction::Return {
                    value: Some((IrType::I32, Operand::Immediate(InternedSymbol::new("0")))),
                },
            ],
            labels,
        };

        assert_eq!(
            function.to_string(),
            indoc! {"
                define i32 @main() {
                \t%1 = icmp slt i32 1, 2
                \tbr i1 %1, label %2, label %3
                2:
                \tbr label %3
                3:
                \tret i32 0
                }
            "}
        );
    }

    #[test]
    fn strings_are_escaped_and_terminated() {
        let mut module = Module::default();
        module.strings.push("say \"hi\"".to_owned());

        assert_eq!(
            module.to_string(),
            "\n@.str.0 = private unnamed_addr constant [9 x i8] c\"say \\22hi\\22\\00\"\n"
        );
    }

    #[test]
    fn value_types_map_to_ir_types() {
        assert_eq!(IrType::from(ValueType::Bool).to_string(), "i1");
        assert_eq!(IrType::from(ValueType::String).to_string(), "ptr");
        assert_eq!(IrType::from(ValueType::Void).to_string(), "void");
    }
}
