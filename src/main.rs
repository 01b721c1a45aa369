use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use slox::ast_printer::AstPrinter;
use slox::parser::Parser;
use slox::repl::run_prompt;
use slox::scanner::{scan_tokens, Scanner};
use slox::session::Session;
use slox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "slox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to slox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Emit the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file and prints it back in canonical form
    Parse { filename: Option<PathBuf> },

    /// Runs input from a file as a slox program
    Run { filename: Option<PathBuf> },

    /// Starts an interactive prompt
    Repl,
}

/// Reads the contents of a file into a String
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
    let log_file = File::create("slox.log").context("Failed to create slox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("slox::")
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
        .init();

    info!("Logger initialized, writing to slox.log");
    Ok(())
}

fn no_input() -> ! {
    println!("No input filepath was provided. Exiting...");
    process::exit(0);
}

fn tokenize(source: String, json: bool) -> Result<()> {
    if json {
        let (tokens, errors) = scan_tokens(&source);

        for e in &errors {
            eprintln!("{}", e);
        }

        let rendered: String =
            serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;
        println!("{}", rendered);

        if !errors.is_empty() {
            debug!("Tokenization failed, exiting with code 65");
            process::exit(65);
        }
        return Ok(());
    }

    let mut tokenized = true;

    for token in Scanner::new(source) {
        match token {
            Ok(token) => {
                let token: Token = token;
                debug!("Scanned token: {}", token);
                println!("{}", token);
            }

            Err(e) => {
                tokenized = false;
                debug!("Tokenization debug: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        process::exit(65);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(source: String) {
    let (tokens, errors) = scan_tokens(&source);

    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{}", e);
        }
        process::exit(65);
    }

    match Parser::new(tokens).parse() {
        Ok(statements) => {
            info!("Parsed {} statement(s)", statements.len());
            println!("{}", AstPrinter::print_program(&statements));
        }

        Err(errors) => {
            for e in &errors {
                debug!("Parse debug: {}", e);
                eprintln!("{}", e);
            }
            process::exit(65);
        }
    }
}

fn run(source: String) {
    let mut session = Session::new();
    session.run(&source);

    if let Some(code) = session.exit_code() {
        process::exit(code);
    }

    if session.had_error() {
        debug!("Static errors, exiting with code 65");
        process::exit(65);
    }

    if session.had_runtime_error() {
        debug!("Runtime error, exiting with code 70");
        process::exit(70);
    }

    info!("Program executed successfully");
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            let Some(filename) = filename else { no_input() };
            info!("Running Tokenize subcommand");
            tokenize(read_file(filename)?, json)?;
        }

        Commands::Parse { filename } => {
            let Some(filename) = filename else { no_input() };
            info!("Running Parse subcommand");
            parse(read_file(filename)?);
        }

        Commands::Run { filename } => {
            let Some(filename) = filename else { no_input() };
            info!("Running Run subcommand");
            run(read_file(filename)?);
        }

        Commands::Repl => {
            info!("Running Repl subcommand");

            let mut session = Session::new();
            let stdin = io::stdin();
            let mut stdout = io::stdout();

            let code = run_prompt(&mut session, stdin.lock(), &mut stdout)
                .context("REPL I/O failed")?;

            if let Some(code) = code {
                process::exit(code);
            }
        }
    }

    Ok(())
}
