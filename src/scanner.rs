//! Module `scanner` implements a one‑pass, streaming lexer for slox.
//!
//! It transforms source bytes into a sequence of [`Token`]s, skipping whitespace
//! and comments, and emitting exactly one `EOF` token at the end. Designed as a
//! `FusedIterator`, it can be chained safely with other iterator adapters.
//!
//! # Public API
//!
//! - `Scanner::new(src) -> Scanner`
//!   Create a new lexer over a private copy of the input.
//!
//! - `impl Iterator for Scanner`
//!   Yields `Result<Token, SloxError>` on each `.next()`. Errors do not stop
//!   the scan; the caller decides whether the stream is usable.
//!
//! - `scan_tokens(src) -> (Vec<Token>, Vec<SloxError>)`
//!   Drain a scanner, splitting tokens from diagnostics.
//!
//! # Token Recognition
//!
//! - Single‑character tokens: `( ) { } [ ] , . - + : ;`.
//! - One‑or‑two character operators: `* **`, `! !=`, `= ==`, `< <=`, `> >=`.
//! - String literals delimited by `"`, `'` or a backtick (the latter yields a
//!   `COMMAND` token). Only `\<delimiter>` and `\\` are escapes: the backslash
//!   is deleted from the scanner's buffer in place, so the escaped byte becomes
//!   ordinary text and later offsets shift by one.
//! - Numeric literals: integer and optional fractional part, no exponent.
//! - Identifiers/keywords via a perfect‑hash `KEYWORDS` map.
//! - `//` comments skipped with `memchr`.

use crate::error::{Result, SloxError};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"as"     => TokenType::AS,
    b"break"  => TokenType::BREAK,
    b"catch"  => TokenType::CATCH,
    b"class"  => TokenType::CLASS,
    b"each"   => TokenType::EACH,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"for"    => TokenType::FOR,
    b"fun"    => TokenType::FUN,
    b"if"     => TokenType::IF,
    b"import" => TokenType::IMPORT,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"throw"  => TokenType::THROW,
    b"true"   => TokenType::TRUE,
    b"try"    => TokenType::TRY,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// Is `word` a reserved word?
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains_key(word.as_bytes())
}

/// A single pass **scanner / lexer** that converts source bytes into a
/// sequence of [`Token`]s.
///
/// The scanner owns its buffer because string escapes are removed in place.
pub struct Scanner {
    src: Vec<u8>,               // source, mutated by escape removal
    start: usize,               // index of the *first* byte of the current lexeme
    curr: usize,                // index *one past* the last byte examined
    line: usize,                // 1‑based line counter (\n increments)
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
    finished: bool,             // EOF already emitted
}

impl Scanner {
    /// Create a new lexer over `src`.
    pub fn new<S: AsRef<[u8]>>(src: S) -> Self {
        let src: Vec<u8> = src.as_ref().to_vec();

        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
            finished: false,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    fn len(&self) -> usize {
        self.src.len()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it. Callers guard with [`is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Current byte, or `0` past EOF.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.src[self.curr]
        }
    }

    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.src[self.curr + 1]
        }
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn text(&self, from: usize, to: usize) -> String {
        String::from_utf8_lossy(&self.src[from..to]).into_owned()
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* token starting at `self.curr`. If the lexeme produces an
    /// actual token the kind is stored in `self.pending`. Whitespace and
    /// comments are skipped by returning `Ok(())` with `pending = None`.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        match b {
            b'(' => self.pending = Some(TokenType::LEFT_PAREN),
            b')' => self.pending = Some(TokenType::RIGHT_PAREN),
            b'{' => self.pending = Some(TokenType::LEFT_BRACE),
            b'}' => self.pending = Some(TokenType::RIGHT_BRACE),
            b'[' => self.pending = Some(TokenType::LEFT_SQRBRACKET),
            b']' => self.pending = Some(TokenType::RIGHT_SQRBRACKET),
            b',' => self.pending = Some(TokenType::COMMA),
            b'.' => self.pending = Some(TokenType::DOT),
            b'-' => self.pending = Some(TokenType::MINUS),
            b'+' => self.pending = Some(TokenType::PLUS),
            b':' => self.pending = Some(TokenType::COLON),
            b';' => self.pending = Some(TokenType::SEMICOLON),

            b'*' => {
                let tt = if self.match_byte(b'*') {
                    TokenType::DOUBLE_STAR
                } else {
                    TokenType::STAR
                };

                self.pending = Some(tt);
            }

            b'!' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                };

                self.pending = Some(tt);
            }

            b'=' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                };

                self.pending = Some(tt);
            }

            b'<' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                };

                self.pending = Some(tt);
            }

            b'>' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };

                self.pending = Some(tt);
            }

            b' ' | b'\r' | b'\t' => {
                return Ok(());
            }

            b'\n' => {
                self.line += 1;

                return Ok(());
            }

            b'/' => {
                if self.match_byte(b'/') {
                    // Fast‑forward to the next newline; the newline itself is
                    // scanned normally so the line counter stays right.
                    if let Some(pos) = memchr(b'\n', &self.src[self.curr..]) {
                        self.curr += pos;
                    } else {
                        self.curr = self.len();
                    }

                    return Ok(());
                }

                self.pending = Some(TokenType::SLASH);
            }

            b'"' | b'\'' | b'`' => {
                return self.parse_string(b);
            }

            b'0'..=b'9' => {
                self.parse_number();
            }

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.parse_identifier();
            }

            _ => {
                // Report the whole UTF‑8 character, not its leading byte.
                let width: usize = match b {
                    0xC0..=0xDF => 2,
                    0xE0..=0xEF => 3,
                    0xF0..=0xF7 => 4,
                    _ => 1,
                };
                self.curr = (self.start + width).min(self.len());
                let ch: String = self.text(self.start, self.curr);

                return Err(SloxError::lex(
                    self.line,
                    format!("Unexpected character '{}'.", ch),
                ));
            }
        }

        Ok(())
    }

    /// Parse a string literal closed by `delimiter`.
    ///
    /// * `self.start` still points to the opening delimiter.
    /// * When we return, `self.curr` points **past** the closing delimiter.
    fn parse_string(&mut self, delimiter: u8) -> Result<()> {
        while !self.is_at_end() && self.peek() != delimiter {
            match self.peek() {
                b'\n' => self.line += 1,

                b'\\' if self.peek_next() == delimiter || self.peek_next() == b'\\' => {
                    // Drop the backslash; the escaped byte is stepped over below.
                    self.src.remove(self.curr);
                }

                _ => {}
            }

            self.curr += 1;
        }

        if self.is_at_end() {
            return Err(SloxError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // closing delimiter

        let value: String = self.text(self.start + 1, self.curr - 1);

        self.pending = Some(if delimiter == b'`' {
            TokenType::COMMAND(value)
        } else {
            TokenType::STRING(value)
        });

        Ok(())
    }

    /// Parse a numeric literal (`123`, `3.14`). Fractions are optional.
    fn parse_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance(); // "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let n: f64 = self
            .text(self.start, self.curr)
            .parse::<f64>()
            .unwrap_or(0.0); // digits only, cannot fail
        self.pending = Some(TokenType::NUMBER(n));
    }

    /// Parse an identifier and decide if it is a **keyword** or a generic
    /// `IDENTIFIER` token.
    fn parse_identifier(&mut self) {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let slice: &[u8] = &self.src[self.start..self.curr];

        let tt: TokenType = KEYWORDS
            .get(slice)
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER);

        self.pending = Some(tt);
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl Iterator for Scanner {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.is_at_end() {
                self.finished = true;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            self.start = self.curr;
            self.pending = None;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some(tt) = self.pending.take() {
                let lexeme: String = self.text(self.start, self.curr);
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, lexeme, self.line)));
            }
            // Whitespace / comment → continue loop.
        }
    }
}

impl FusedIterator for Scanner {}

/// Scan `src` completely, separating tokens from diagnostics.
pub fn scan_tokens<S: AsRef<[u8]>>(src: S) -> (Vec<Token>, Vec<SloxError>) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<SloxError> = Vec::new();

    for item in Scanner::new(src) {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    info!(
        "Scanned {} token(s) with {} error(s)",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}
