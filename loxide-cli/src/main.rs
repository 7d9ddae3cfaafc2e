mod completer;
mod report;
mod state;

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use loxide::{Lox, LoxError};
use rustyline::Editor;
use rustyline::error::ReadlineError;

use completer::LoxHelper;
use report::report_error;
use state::ReplState;

#[derive(Parser)]
#[command(name = "loxide")]
#[command(about = "Tree-walking interpreter for the Lox language", long_about = None)]
struct Args {
    /// Script file to execute (REPL when omitted)
    #[arg(value_name = "script")]
    scripts: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.scripts.len() > 1 {
        eprintln!("Usage: loxide [script]");
        return ExitCode::from(64);
    }

    let mut lox = Lox::new();
    let result = match args.scripts.first() {
        Some(path) => run_file(&mut lox, path),
        None => {
            if io::stdin().is_terminal() {
                run_repl(&mut lox)
            } else {
                run_stdin(&mut lox)
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = e.to_string();
            if !message.is_empty() {
                eprintln!("{e}");
            }
            ExitCode::from(65)
        }
    }
}

fn run_file(lox: &mut Lox, path: &Path) -> Result<(), LoxError> {
    let source = fs::read_to_string(path)?;
    let filename = path.to_string_lossy();
    run_source(lox, &source, Some(&filename))
}

fn run_stdin(lox: &mut Lox) -> Result<(), LoxError> {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source)?;
    run_source(lox, &source, None)
}

fn run_source(lox: &mut Lox, source: &str, filename: Option<&str>) -> Result<(), LoxError> {
    let errors = lox.run(source, io::stdout());
    if errors.is_empty() {
        return Ok(());
    }
    for error in &errors {
        report_error(error, source, filename, io::stderr());
    }
    Err(LoxError::ScriptFailed)
}

fn run_repl(lox: &mut Lox) -> Result<(), LoxError> {
    let helper = LoxHelper::new();
    let mut rl: Editor<LoxHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(rustyline::Config::default()).expect("could not start the REPL");
    rl.set_helper(Some(helper));
    let mut state = ReplState::new();

    loop {
        match rl.readline(&state.prompt()) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);

                if state.process_line(&line) {
                    let buffer = state.take_buffer();
                    let source = if ReplState::should_auto_print(&buffer) {
                        ReplState::wrap_for_print(&buffer)
                    } else {
                        buffer
                    };
                    let errors = lox.run(&source, io::stdout());
                    for error in &errors {
                        report_error(error, &source, None, io::stderr());
                    }

                    // Refresh completions with the current variables
                    if let Some(helper) = rl.helper() {
                        helper.set_variables(lox.variable_names());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                if state.is_empty() {
                    break;
                }
                state.cancel();
                println!();
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("REPL read failed: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
