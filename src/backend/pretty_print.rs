use colored::Colorize;
use itertools::Itertools;

use super::ir::{self, Instruction};

/// Colored rendering of `module` for the `--emit ir` dump. Layout matches
/// the plain [`Display`](std::fmt::Display) output.
pub fn pretty_print_module(module: &ir::Module) -> String {
    let mut output = module.functions.iter().map(pretty_print_function).join("\n");

    if !module.strings.is_empty() {
        output.push('\n');
    }

    for (id, contents) in module.strings.enumerate() {
        output.push_str(&format!(
            "{} {} {} {}{}\n",
            id.to_string().blue(),
            "=".white(),
            "private unnamed_addr constant".magenta(),
            format!("[{} x i8] ", contents.len() + 1).yellow(),
            format!("c\"{}\\00\"", ir::escape_string(contents)).green()
        ));
    }

    output
}

pub fn pretty_print_function(function: &ir::Function) -> String {
    let mut output = format!(
        "{} {} {}{}{}{}\n",
        "define".magenta(),
        function.return_type.to_string().yellow(),
        format!("@{}", function.name).blue(),
        "(".white(),
        function
            .parameters
            .iter()
            .map(|(name, ty)| format!("{} %{name}", ty.to_string().yellow()))
            .join(", "),
        ") {".white()
    );

    for instruction in &function.instructions {
        if let Instruction::Label(label) = instruction {
            output.push_str(&format!("{}\n", format!("{}:", function.label(*label)).bright_red()));
            continue;
        }

        output.push('\t');
        output.push_str(&pretty_print_instruction(function, instruction));
        output.push('\n');
    }

    output.push_str(&format!("{}\n", "}".white()));
    output
}

fn pretty_print_instruction(function: &ir::Function, instruction: &Instruction) -> String {
    let label = |label: &ir::LabelId| format!("label %{}", function.label(*label)).bright_red();

    match instruction {
        Instruction::Alloca { destination, ty } => format!(
            "{destination} {} {} {}",
            "=".white(),
            "alloca".cyan(),
            ty.to_string().yellow()
        ),
        Instruction::Load {
            destination,
            ty,
            source,
        } => format!(
            "{destination} {} {} {}, {} {source}",
            "=".white(),
            "load".cyan(),
            ty.to_string().yellow(),
            "ptr".yellow()
        ),
        Instruction::Store {
            ty,
            value,
            destination,
        } => format!(
            "{} {} {value}, {} {destination}",
            "store".cyan(),
            ty.to_string().yellow(),
            "ptr".yellow()
        ),
        Instruction::Binary {
            destination,
            opcode,
            ty,
            lhs,
            rhs,
        } => format!(
            "{destination} {} {} {} {lhs}, {rhs}",
            "=".white(),
            opcode.to_string().cyan(),
            ty.to_string().yellow()
        ),
        Instruction::Cast {
            destination,
            opcode,
            from,
            value,
            to,
        } => format!(
            "{destination} {} {} {} {value} {} {}",
            "=".white(),
            opcode.to_string().cyan(),
            from.to_string().yellow(),
            "to".cyan(),
            to.to_string().yellow()
        ),
        Instruction::Call {
            destination,
            return_type,
            function: callee,
            arguments,
        } => {
            let assignment = destination
                .map(|destination| format!("{destination} {} ", "=".white()))
                .unwrap_or_default();

            format!(
                "{assignment}{} {} {}({})",
                "call".cyan(),
                return_type.to_string().yellow(),
                format!("@{callee}").blue(),
                arguments
                    .iter()
                    .map(|(ty, operand)| format!("{} {operand}", ty.to_string().yellow()))
                    .join(", ")
            )
        }
        Instruction::Branch {
            condition,
            positive,
            negative,
        } => format!(
            "{} {} {condition}, {}, {}",
            "br".cyan(),
            "i1".yellow(),
            label(positive),
            label(negative)
        ),
        Instruction::Jump { destination } => format!("{} {}", "br".cyan(), label(destination)),
        Instruction::Return { value: None } => format!("{} {}", "ret".cyan(), "void".yellow()),
        Instruction::Return {
            value: Some((ty, operand)),
        } => format!("{} {} {operand}", "ret".cyan(), ty.to_string().yellow()),
        Instruction::Label(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        backend::codegen::generate,
        frontend::{SourceFile, lexer::Lexer, parser::Parser},
        middle::type_env::type_check,
    };

    #[test]
    fn uncolored_output_matches_display() {
        colored::control::set_override(false);

        let source =
            SourceFile::memory("fn f: a { if a > 1 { return \"big\" } return \"small\" } log f(2)");
        let tokens = Lexer::tokenize(&source).unwrap();
        let program = Parser::parse_program(&source, &tokens).unwrap();
        let module = generate(&type_check(&program).unwrap()).unwrap();

        assert_eq!(pretty_print_module(&module), module.to_string());
    }
}
