//! Line‑at‑a‑time prompt over a persistent [`Session`].

use std::io::{BufRead, Write};

use log::{debug, info};

use crate::session::Session;

const PROMPT: &str = "> ";

/// Read lines from `input` until EOF, `.exit`, or a program calling
/// `exit()`. Returns the exit code requested by the program, if any.
///
/// * `.exit` leaves the loop.
/// * `.expr` is shorthand for `print expr`.
/// * A value produced by a top‑level `return` is echoed.
///
/// Error flags are cleared after each line so one mistake does not poison
/// the rest of the session.
pub fn run_prompt<R: BufRead, W: Write>(
    session: &mut Session,
    input: R,
    out: &mut W,
) -> std::io::Result<Option<i32>> {
    info!("Starting REPL");

    let mut lines = input.lines();

    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line: String = line?;
        let trimmed: &str = line.trim();

        if trimmed == ".exit" {
            debug!("REPL exit requested");
            break;
        }

        let source: String = match trimmed.strip_prefix('.') {
            Some(expr) => format!("print {};", expr),
            None => line.clone(),
        };

        if let Some(value) = session.run(&source) {
            let text: String = match session.interpreter().stringify(&value) {
                Ok(text) => text,
                Err(error) => error.to_string(),
            };
            writeln!(out, "{}", text)?;
        }

        if let Some(code) = session.exit_code() {
            info!("REPL stopping on exit({})", code);
            return Ok(Some(code));
        }

        session.reset_errors();
    }

    Ok(None)
}
