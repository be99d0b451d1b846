use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{CommandFactory, Parser as ClapParser, ValueEnum, error::ErrorKind};
use colored::Colorize;
use liltc::{
    CompileError, DEFAULT_PREAMBLE, SourceFile, SourceFileOrigin, backend::pretty_print, render,
    run_pipeline,
};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Lilt source file to compile
    source: PathBuf,
    /// Where to write the IR. Defaults to the source path with an `.ll`
    /// extension
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Text to place ahead of the generated IR instead of the built-in
    /// print routines
    #[arg(long)]
    preamble: Option<PathBuf>,
    /// Dump the output of a stage to stderr
    #[arg(long, value_enum)]
    emit: Vec<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    Tokens,
    Ast,
    Typed,
    Ir,
}

fn read_input(path: &Path, what: &str) -> String {
    if !path.is_file() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("{what} '{}' does not exist or is not a file!", path.display()),
            )
            .exit()
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => Args::command()
            .error(
                ErrorKind::Io,
                format!("Failed to read '{}': {error}", path.display()),
            )
            .exit(),
    }
}

fn report(source: &SourceFile, error: &CompileError) {
    eprintln!("{}: {error}", "error".red().bold());
    eprintln!(
        "  {} {}:{} ({})",
        "-->".blue().bold(),
        source.origin,
        error.line(),
        error.stage()
    );

    if let Some(text) = source.line_text(error.line()) {
        eprintln!("   {}", "|".blue().bold());
        eprintln!("{:>2} {} {text}", error.line().to_string().blue().bold(), "|".blue().bold());
        eprintln!("   {}", "|".blue().bold());
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let contents = read_input(&args.source, "Source file");
    let preamble = match &args.preamble {
        Some(path) => read_input(path, "Preamble"),
        None => DEFAULT_PREAMBLE.to_owned(),
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.source.with_extension("ll"));

    let source = SourceFile {
        contents,
        origin: SourceFileOrigin::File(args.source.clone()),
    };

    let artifacts = match run_pipeline(&source) {
        Ok(artifacts) => artifacts,
        Err(error) => {
            report(&source, &error);
            return ExitCode::FAILURE;
        }
    };

    for stage in &args.emit {
        eprintln!("{}", format!("=== {stage:?} ===").bright_green());

        match stage {
            Stage::Tokens => eprintln!("{:#?}", artifacts.tokens),
            Stage::Ast => eprintln!("{:#?}", artifacts.program),
            Stage::Typed => eprintln!("{:#?}", artifacts.typed),
            Stage::Ir => eprint!("{}", pretty_print::pretty_print_module(&artifacts.module)),
        }
    }

    if let Err(error) = std::fs::write(&output, render(&artifacts.module, &preamble)) {
        eprintln!(
            "{}: failed to write '{}': {error}",
            "error".red().bold(),
            output.display()
        );
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
