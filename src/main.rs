use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast::Stmt;
use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::resolver::{LintLevel, Resolver, ResolverOptions};
use rox::scanner::Scanner;
use rox::session::{self, Session};

/// Exit status for lexical, syntax and resolution errors.
const EXIT_STATIC: i32 = 65;
/// Exit status for runtime errors.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// How to report locals that are declared but never read
    #[arg(long, global = true, value_enum, default_value_t = LintLevel::Warn)]
    unused_variables: LintLevel,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a program and prints its AST
    Parse {
        filename: Option<PathBuf>,

        /// Print the syntax tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },

    /// Starts an interactive prompt
    Repl,
}

/// Reads the contents of a file as UTF-8 text
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Configure env_logger to write to file with module and source line
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn no_input() -> ! {
    info!("No filepath provided");
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

/// Print a failed run's diagnostics and pick its exit status.  Errors that
/// are not about the program itself are handed back to `main`.
fn report(error: LoxError) -> Result<i32> {
    match error {
        LoxError::Compile(errors) => {
            for e in &errors {
                eprintln!("{}", e);
            }
            Ok(EXIT_STATIC)
        }
        e @ (LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. }) => {
            eprintln!("{}", e);
            Ok(EXIT_STATIC)
        }
        e @ LoxError::Runtime(_) => {
            eprintln!("{}", e);
            Ok(EXIT_RUNTIME)
        }
        other => Err(other.into()),
    }
}

fn print_warnings(session: &mut Session) {
    for warning in session.take_warnings() {
        eprintln!("Warning: {}", warning);
    }
}

fn tokenize(source: &str, json: bool) -> Result<()> {
    let mut tokens = Vec::new();
    let mut tokenized = true;

    for token in Scanner::new(source) {
        match token {
            Ok(token) => {
                debug!("Scanned token: {}", token);

                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;

                debug!("Tokenization debug: {}", e);

                eprintln!("{}", e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC);

        std::process::exit(EXIT_STATIC);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(source: &str, json: bool) -> Result<()> {
    match session::parse_program(source) {
        Ok(statements) => {
            info!("Parsed {} statements", statements.len());

            if json {
                println!("{}", serde_json::to_string_pretty(&statements)?);
            } else {
                for stmt in &statements {
                    let ast_str = AstPrinter::print_stmt(stmt);
                    debug!("AST: {}", ast_str);
                    println!("{}", ast_str);
                }
            }

            Ok(())
        }

        Err(e) => {
            debug!("Parse debug: {}", e);
            std::process::exit(report(e)?);
        }
    }
}

fn evaluate(source: &str, options: ResolverOptions) -> Result<()> {
    let expr = match session::parse_expression(source) {
        Ok(expr) => expr,
        Err(e) => std::process::exit(report(e)?),
    };

    info!("Expression parsed successfully");

    // Anonymous functions inside the expression still need their locals
    // resolved.
    let wrapped = [Stmt::Expression(expr.clone())];
    let resolution = match Resolver::new(options).resolve(&wrapped) {
        Ok(resolution) => resolution,
        Err(errors) => std::process::exit(report(LoxError::Compile(errors))?),
    };

    let mut interpreter = Interpreter::new();
    interpreter.note_locals(&resolution);

    match interpreter.evaluate(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
            Ok(())
        }

        Err(e) => {
            debug!("Evaluation debug: {}", e);
            std::process::exit(report(e)?);
        }
    }
}

fn run(source: &str, options: ResolverOptions) -> Result<()> {
    info!("Provided input:\n {}", source);

    let mut session = Session::new(options);
    let result = session.run(source);
    print_warnings(&mut session);

    match result {
        Ok(()) => {
            info!("Program executed successfully");
            Ok(())
        }

        Err(e) => {
            debug!("Run debug: {}", e);
            std::process::exit(report(e)?);
        }
    }
}

fn repl(options: ResolverOptions) -> Result<()> {
    let mut session = Session::new(options);
    session.set_repl(true);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;

        let result = session.run(&line);
        print_warnings(&mut session);

        if let Err(e) = result {
            debug!("REPL debug: {}", e);
            report(e)?;
        }
    }

    info!("REPL closed");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let options = ResolverOptions {
        unused_variables: args.unused_variables,
    };

    match args.commands {
        Commands::Tokenize { filename, json } => {
            let filename = filename.unwrap_or_else(|| no_input());
            info!("Running Tokenize subcommand");
            tokenize(&read_file(filename)?, json)
        }

        Commands::Parse { filename, json } => {
            let filename = filename.unwrap_or_else(|| no_input());
            info!("Running Parse subcommand");
            parse(&read_file(filename)?, json)
        }

        Commands::Evaluate { filename } => {
            let filename = filename.unwrap_or_else(|| no_input());
            info!("Running Evaluate subcommand");
            evaluate(&read_file(filename)?, options)
        }

        Commands::Run { filename } => {
            let filename = filename.unwrap_or_else(|| no_input());
            info!("Running Run subcommand");
            run(&read_file(filename)?, options)
        }

        Commands::Repl => {
            info!("Running Repl subcommand");
            repl(options)
        }
    }
}
