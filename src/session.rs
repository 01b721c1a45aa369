//! A persistent run context: one interpreter plus the error flags the CLI
//! turns into exit codes.
//!
//! Every call to [`Session::run`] goes through the whole pipeline
//! (scan → parse → resolve → interpret) against the same globals, so the
//! REPL can define something on one line and use it on the next.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::SloxError;
use crate::interpreter::{InterpretError, Interpreter};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;
use crate::value::Value;

pub struct Session {
    interpreter: Interpreter,
    err: Box<dyn Write>,
    had_error: bool,
    had_runtime_error: bool,
    exit_code: Option<i32>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Program output to stdout, diagnostics to stderr.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_output(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        info!("Session created");

        Self {
            interpreter: Interpreter::with_output(out),
            err,
            had_error: false,
            had_runtime_error: false,
            exit_code: None,
        }
    }

    /// Run one chunk of source. Returns the value of a top‑level `return`,
    /// if one fired. Diagnostics are written to the error sink and recorded
    /// in the flags; nothing runs after the first failing stage.
    pub fn run(&mut self, source: &str) -> Option<Value> {
        let (tokens, scan_errors) = scan_tokens(source);

        if !scan_errors.is_empty() {
            debug!("Scanning produced {} error(s)", scan_errors.len());
            self.report_static(&scan_errors);
            return None;
        }

        let statements = match Parser::new(tokens).parse() {
            Ok(statements) => statements,
            Err(errors) => {
                self.report_static(&errors);
                return None;
            }
        };

        let mark: usize = self.interpreter.transient_mark();

        if let Err(errors) = Resolver::new(&mut self.interpreter).resolve(&statements) {
            self.interpreter.forget_transient(mark);
            self.report_static(&errors);
            return None;
        }

        let result = self.interpreter.interpret(&statements);
        self.interpreter.forget_transient(mark);

        match result {
            Ok(value) => value,

            Err(InterpretError::Exit(code)) => {
                info!("Program requested exit with code {}", code);
                self.exit_code = Some(code);
                None
            }

            Err(error) => {
                self.had_runtime_error = true;
                self.diagnostic(&error.to_string());
                None
            }
        }
    }

    /// Clear both error flags; the REPL does this after every line.
    pub fn reset_errors(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// The code passed to `exit()`, once a program has called it.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    fn report_static(&mut self, errors: &[SloxError]) {
        self.had_error = true;

        for error in errors {
            self.diagnostic(&error.to_string());
        }
    }

    fn diagnostic(&mut self, message: &str) {
        debug!("Diagnostic: {}", message);

        // A broken error sink has nowhere left to report to.
        let _ = writeln!(self.err, "{}", message);
    }
}
