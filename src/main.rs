use anyhow::{Result, anyhow};
use clap::Parser;
use egglang::evaluator::{Environment, create_global_env, eval};
use egglang::json::{ast_to_json_pretty, parse_json_ast};
use egglang::parser::parse;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run Egg programs, or explore the language interactively.
///
/// EXAMPLES:
///     egg program.egg                     Run a program file
///     egg -e 'print(+(1, 2))'             Run an inline program
///     egg --ast -e 'f(4)(5)'              Show the syntax tree as JSON
///     egg                                 Start the REPL
///
/// ENVIRONMENT VARIABLES:
///     RUST_LOG    Enable interpreter logging on stderr (e.g. RUST_LOG=egglang=debug)
#[derive(Parser)]
#[command(name = "egg")]
#[command(version)]
struct Cli {
    /// Program file to run; the REPL starts when neither a file nor --eval is given
    file: Option<PathBuf>,
    /// Run this program text instead of a file and print its result
    #[arg(short, long, value_name = "PROGRAM", conflicts_with = "file")]
    eval: Option<String>,
    /// Print the parsed syntax tree as JSON instead of evaluating
    #[arg(long)]
    ast: bool,
    /// Read the input as a JSON syntax tree instead of Egg source
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Install a stderr subscriber, only if RUST_LOG is set
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run(cli: &Cli) -> Result<()> {
    let source = match (&cli.eval, &cli.file) {
        (Some(program), _) => program.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|e| anyhow!("could not read {}: {e}", path.display()))?,
        (None, None) => return run_repl(cli.ast),
    };

    let node = if cli.json {
        parse_json_ast(&source)?
    } else {
        parse(&source)?
    };

    if cli.ast {
        println!("{}", ast_to_json_pretty(&node)?);
        return Ok(());
    }

    let global = create_global_env();
    let scope = Environment::with_parent(&global);
    let value = eval(&node, &scope)?;
    if cli.eval.is_some() {
        println!("{value}");
    }
    Ok(())
}

fn run_repl(show_ast: bool) -> Result<()> {
    println!("Egg {}", env!("CARGO_PKG_VERSION"));
    println!("Enter expressions like: print(+(1, 2))");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl =
        DefaultEditor::new().map_err(|e| anyhow!("could not initialize the line editor: {e}"))?;
    let global = create_global_env();
    // Definitions persist across inputs
    let session = Environment::with_parent(&global);

    let mut show_ast = show_ast;
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "egg> " } else { "...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    match line.trim() {
                        "" => continue,
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&session);
                            continue;
                        }
                        ":ast" => {
                            show_ast = !show_ast;
                            println!("Syntax tree display {}", if show_ast { "on" } else { "off" });
                            continue;
                        }
                        ":quit" | ":exit" => break,
                        _ => {}
                    }
                }

                pending.push_str(&line);
                pending.push('\n');
                if paren_balance(&pending) > 0 {
                    continue;
                }

                let program = std::mem::take(&mut pending);
                let _ = rl.add_history_entry(program.trim_end());
                evaluate_input(&program, &session, show_ast);
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => break,
            Err(err) => return Err(err.into()),
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn evaluate_input(program: &str, session: &Environment, show_ast: bool) {
    let node = match parse(program) {
        Ok(node) => node,
        Err(e) => {
            println!("Error: {e}");
            return;
        }
    };

    if show_ast {
        match ast_to_json_pretty(&node) {
            Ok(json) => println!("{json}"),
            Err(e) => println!("Error: {e}"),
        }
    }

    match eval(&node, session) {
        Ok(value) => println!("{value}"),
        Err(e) => println!("Error: {e}"),
    }
}

/// Open parentheses left after `text`, ignoring strings and comments
fn paren_balance(text: &str) -> i64 {
    let mut depth = 0;
    let mut in_string = false;
    let mut in_comment = false;

    for c in text.chars() {
        match c {
            '\n' | '\r' if in_comment => in_comment = false,
            _ if in_comment => {}
            '"' => in_string = !in_string,
            _ if in_string => {}
            '#' => in_comment = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn print_help() {
    println!("Commands:");
    println!("  :help        Show this help");
    println!("  :env         List the bindings made in this session");
    println!("  :ast         Toggle printing the syntax tree of each input");
    println!("  :quit :exit  Leave the REPL");
    println!();
    println!("Special forms: if, while, do, define, set, fun");
    println!("Builtins: + - * / == < > print array length element true false");
    println!("Unbalanced input continues on the next line.");
}

fn print_environment(session: &Environment) {
    let names = session.local_names();
    if names.is_empty() {
        println!("(no bindings yet)");
        return;
    }
    for name in names {
        if let Some(value) = session.get(&name) {
            println!("  {name} = {value}");
        }
    }
}
