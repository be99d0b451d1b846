use indoc::indoc;
use liltc::{
    CompileError, SourceFile, compile, compile_with_preamble,
    backend::ir::Instruction,
    error::{LexError, ParseError, TypeErrorKind},
    frontend::{
        ast::NodeKind,
        intern::InternedSymbol,
        lexer::{Keyword, TokenKind},
    },
    middle::ty::ValueType,
    run_pipeline,
};
use pretty_assertions::assert_eq;

fn pipeline(input: &str) -> liltc::Artifacts {
    run_pipeline(&SourceFile::memory(input)).unwrap()
}

#[test]
fn declaration_then_return() {
    let artifacts = pipeline("let x = 5 return x");

    assert_eq!(
        artifacts
            .tokens
            .iter()
            .map(|token| token.kind)
            .collect::<Vec<_>>(),
        [
            TokenKind::Keyword(Keyword::Let),
            TokenKind::Identifier,
            TokenKind::Equals,
            TokenKind::IntegerLiteral,
            TokenKind::Keyword(Keyword::Return),
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );

    let NodeKind::Block(statements) = &artifacts.typed.entry.kind else {
        panic!("entry is not a block");
    };

    assert_eq!(statements[0].ty, ValueType::I32);
    assert_eq!(artifacts.typed.entry.ty, ValueType::I32);
}

#[test]
fn function_call_with_parenthesized_arguments() {
    let artifacts = pipeline(indoc! {"
        fn add: a, b { return a + b }
        let y = add(2, 3)
    "});

    let NodeKind::Function { parameters, .. } = &artifacts.typed.functions[0].kind else {
        panic!("expected a function");
    };

    assert!(parameters.iter().all(|parameter| parameter.ty == ValueType::I32));
    assert_eq!(artifacts.typed.functions[0].ty, ValueType::I32);

    let output = compile_with_preamble("fn add: a, b { return a + b }\nlet y = add(2, 3)", "")
        .unwrap();

    assert!(output.contains("define i32 @add(i32 %a, i32 %b) {"));
    assert!(output.contains(" = add i32 "));
    assert!(output.contains("call i32 @add(i32 2, i32 3)"));
}

#[test]
fn conditional_targets_follow_the_comparison() {
    let output = compile_with_preamble("if 1 < 2 { log 1 }", "").unwrap();

    assert_eq!(
        output,
        indoc! {"
            define i32 @main() {
            \t%1 = icmp slt i32 1, 2
            \tbr i1 %1, label %2, label %3
            2:
            \tcall void @printi32(i32 1)
            \tbr label %3
            3:
            \tret i32 0
            }
        "}
    );
}

#[test]
fn boolean_variable_rejects_integer() {
    let error = compile("let flag = true\nflag = 5").unwrap_err();

    let CompileError::Type(error) = &error else {
        panic!("expected a type error, found {error:?}");
    };

    assert_eq!(error.line, 2);
    assert_eq!(
        error.kind,
        TypeErrorKind::AlreadyAssigned {
            name: InternedSymbol::new("flag"),
            existing: ValueType::Bool,
            found: ValueType::I32,
        }
    );
    assert!(error.to_string().contains("flag"));
}

#[test]
fn unterminated_string_is_fatal() {
    assert_eq!(
        compile("log \"never closed"),
        Err(CompileError::Lex(LexError::UnterminatedString { line: 1 }))
    );
}

#[test]
fn every_block_ends_in_a_terminator() {
    let artifacts = pipeline(indoc! {"
        fn collatz: n {
            let steps = 0
            while n > 1 {
                if n % 2 == 0 { n = n / 2 }
                if n % 2 == 1 { n = n * 3 + 1 }
                steps = steps + 1
            }
            return steps
        }
        fn check: value { if value > 10 { return true } }
        log collatz(27)
        log check(collatz(7))
        log \"done\"
    "});

    for function in &artifacts.module.functions {
        assert!(
            function
                .instructions
                .last()
                .is_some_and(Instruction::is_terminator),
            "{} does not end in a terminator",
            function.name
        );

        for pair in function.instructions.windows(2) {
            if let Instruction::Label(_) = pair[1] {
                assert!(pair[0].is_terminator(), "fallthrough into a label in {}", function.name);
            }
        }

        let returns = function
            .instructions
            .iter()
            .filter(|instruction| matches!(instruction, Instruction::Return { .. }))
            .count();

        assert!(returns >= 1);
    }
}

#[test]
fn default_preamble_precedes_the_module() {
    let output = compile("log true").unwrap();

    let preamble_end = output.find("define void @printptr").unwrap();
    let main = output.find("define i32 @main()").unwrap();

    assert!(preamble_end < main);
    assert!(output.contains("call void @printi1(i1 1)"));
}

#[test]
fn user_function_cannot_shadow_the_entry_point() {
    assert_eq!(
        compile_with_preamble("fn main: { return 1 }\nlog main", ""),
        Err(CompileError::Parse(ParseError::ReservedFunctionName {
            line: 1,
            name: InternedSymbol::new("main"),
        }))
    );
}

#[test]
fn oversized_integer_is_reported_with_its_line() {
    let error = compile("let x = 1\nlog 99999999999").unwrap_err();

    assert_eq!(error.stage(), "parser");
    assert_eq!(error.line(), 2);
}
