// src/main.rs
use clap::Parser;
use project_tac::{compile, execute, Program, VmOptions};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

/// Compile a small imperative language to three-address quadruples and run them.
#[derive(Parser, Debug)]
#[command(name = "project_tac", version)]
struct Cli {
    /// Source file, or a quadruple file with --quads
    input: PathBuf,

    /// Write the quadruple listing to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Execute the program after translating it
    #[arg(long)]
    run: bool,

    /// Treat INPUT as a quadruple listing and execute it directly
    #[arg(long)]
    quads: bool,

    /// Maximum number of instructions to execute
    #[arg(long, default_value_t = 1_000_000)]
    max_steps: u64,

    /// Disable the instruction budget
    #[arg(long, conflicts_with = "max_steps")]
    no_step_limit: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    if let Err(e) = simple_logger::init_with_level(level) {
        eprintln!("logger unavailable: {}", e);
    }

    let text = match fs::read_to_string(&cli.input) {
        Ok(content) => content,
        Err(e) => fail(format!("Error reading file '{}': {}", cli.input.display(), e)),
    };

    let options = VmOptions {
        max_steps: if cli.no_step_limit { None } else { Some(cli.max_steps) },
    };

    let program: Program = if cli.quads {
        match text.parse() {
            Ok(program) => program,
            Err(e) => fail(e),
        }
    } else {
        let translation = match compile(&text) {
            Ok(translation) => translation,
            Err(e) => fail(e),
        };
        log::info!(
            "{}: {} quadruples, {} variables",
            cli.input.display(),
            translation.program.len(),
            translation.symbols.len()
        );

        let listing = translation.program.to_string();
        match &cli.output {
            Some(path) => {
                if let Err(e) = fs::write(path, &listing) {
                    fail(format!("Error writing '{}': {}", path.display(), e));
                }
            }
            None if !cli.run => print!("{}", listing),
            None => {}
        }
        translation.program
    };

    if cli.run || cli.quads {
        let stdout = io::stdout();
        if let Err(e) = execute(&program, stdout.lock(), options) {
            fail(e);
        }
    }
}
