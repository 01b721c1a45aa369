#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use slox::session::Session;

/// A `Write` sink tests can read back after handing a clone to a session.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Outcome {
    pub out: String,
    pub err: String,
    pub had_error: bool,
    pub had_runtime_error: bool,
    pub exit_code: Option<i32>,
    pub returned: Option<String>,
}

impl Outcome {
    /// Printed lines, without the trailing newline.
    pub fn lines(&self) -> Vec<&str> {
        self.out.lines().collect()
    }
}

pub fn session() -> (Session, SharedBuf, SharedBuf) {
    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let session = Session::with_output(Box::new(out.clone()), Box::new(err.clone()));

    (session, out, err)
}

/// Run `source` in a fresh session and capture everything it produced.
pub fn run(source: &str) -> Outcome {
    let (mut session, out, err) = session();
    let returned = session.run(source).map(|v| v.to_string());

    Outcome {
        out: out.contents(),
        err: err.contents(),
        had_error: session.had_error(),
        had_runtime_error: session.had_runtime_error(),
        exit_code: session.exit_code(),
        returned,
    }
}

/// Run a program expected to succeed; returns its printed lines.
pub fn output_of(source: &str) -> Vec<String> {
    let outcome = run(source);

    assert!(
        !outcome.had_error && !outcome.had_runtime_error,
        "program failed:\n{}",
        outcome.err
    );

    outcome.lines().into_iter().map(str::to_string).collect()
}
