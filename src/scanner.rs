//! Module `scanner` implements a one‑pass, streaming lexer for the Lox language.
//!
//! It transforms a source string into a sequence of [`Token`]s, skipping whitespace
//! and comments, and emitting exactly one `EOF` token at the end. Designed as a `FusedIterator`,
//! it can be chained safely with other iterator adapters.
//!
//! # Public API
//!
//! - `Scanner::new(src: &'a str) -> Scanner<'a>`  
//!   Create a new lexer over the input text.
//!
//! - `impl Iterator for Scanner<'a>`  
//!   Yields `Result<Token, LoxError>` on each `.next()`, where `Ok(token)` is a scanned token
//!   and `Err` reports a lexing error with line information. Scanning continues after an
//!   error so one pass reports every bad character.
//!
//! # Token Recognition (`scan_token`)
//!
//! - Single‑character tokens: `(`, `)`, `{`, `}`, `,`, `.`, `-`, `+`, `;`, `*`.  
//! - Two‑character operators: `!=`, `==`, `<=`, `>=`.  
//! - String literals: `"` … `"`, allowing multi‑line and reporting unterminated errors.  
//! - Numeric literals: integer and optional fractional part.  
//! - Identifiers/keywords: alphanumeric/_ sequences, resolved via a perfect‑hash `KEYWORDS` map.  
//! - Errors: any unexpected character yields `LoxError::lex(line, message)`.  
//!
//! Comments are skipped in bulk with `memchr`. Every slice taken from the source starts
//! and ends on an ASCII byte, so lexemes are always valid `&str` boundaries.
//!
//! # Example
//!
//! ```rust
//! use rox::scanner::Scanner;
//!
//! let scanner = Scanner::new("print 123; // example");
//! for result in scanner {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("Lex error: {}", err),
//!     }
//! }
//! ```

use crate::error::{LoxError, Result};
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
    b"break"  => TokenType::BREAK,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// A single pass **scanner / lexer** that converts source text into a
/// sequence of [`Token`]s.
pub struct Scanner<'a> {
    text: &'a str,              // entire source file
    src: &'a [u8],              // byte view of `text`
    start: usize,               // index of the *first* byte of the current lexeme
    curr: usize,                // index *one past* the last byte examined
    line: usize,                // 1‑based line counter (\n increments)
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `text`.
    #[inline]
    pub fn new(text: &'a str) -> Self {
        info!("Scanner created over {} bytes", text.len());

        Self {
            text,
            src: text.as_bytes(),
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    /// Return the length of the input slice.
    #[inline(always)]
    const fn len(&self) -> usize {
        self.src.len()
    }

    /// Are we at (or past) the end of input?
    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it.  *Panics* if called at EOF – higher‑level
    /// code always guards with [`Self::is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte without consuming it.  Returns `0` if past EOF
    /// to avoid branching at call‑site.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.src[self.curr]
        }
    }

    /// Peek one byte beyond [`Self::peek`].  Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.src[self.curr + 1]
        }
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    /// Returns `true` on success so callers can branch inline without an else.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Lex one lexeme at `self.curr`. Tokens land in `self.pending`; whitespace
    /// and comments leave it `None`.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        self.pending = match b {
            b'(' => Some(TokenType::LEFT_PAREN),
            b')' => Some(TokenType::RIGHT_PAREN),
            b'{' => Some(TokenType::LEFT_BRACE),
            b'}' => Some(TokenType::RIGHT_BRACE),
            b',' => Some(TokenType::COMMA),
            b'.' => Some(TokenType::DOT),
            b'-' => Some(TokenType::MINUS),
            b'+' => Some(TokenType::PLUS),
            b';' => Some(TokenType::SEMICOLON),
            b'*' => Some(TokenType::STAR),

            b'!' => Some(self.with_equal(TokenType::BANG_EQUAL, TokenType::BANG)),
            b'=' => Some(self.with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL)),
            b'<' => Some(self.with_equal(TokenType::LESS_EQUAL, TokenType::LESS)),
            b'>' => Some(self.with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER)),

            b'/' if self.match_byte(b'/') => {
                self.skip_comment();
                None
            }
            b'/' => Some(TokenType::SLASH),

            b' ' | b'\r' | b'\t' => None,
            b'\n' => {
                self.line += 1;
                None
            }

            b'"' => return self.parse_string(),
            b'0'..=b'9' => {
                self.parse_number();
                return Ok(());
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.parse_identifier();
                return Ok(());
            }

            _ => return Err(self.unexpected(b)),
        };

        Ok(())
    }

    /// `long` when the next byte is `=` (consumed), `short` otherwise.
    fn with_equal(&mut self, long: TokenType, short: TokenType) -> TokenType {
        if self.match_byte(b'=') {
            long
        } else {
            short
        }
    }

    /// Jump to the next newline (or EOF) after `//`.
    fn skip_comment(&mut self) {
        self.curr = match memchr(b'\n', &self.src[self.curr..]) {
            Some(pos) => self.curr + pos,
            None => self.len(),
        };
    }

    /// Consume the whole offending char so multi-byte input is reported once
    /// and `start` stays on a char boundary.
    fn unexpected(&mut self, first: u8) -> LoxError {
        let ch = self.text[self.start..]
            .chars()
            .next()
            .unwrap_or(first as char);
        self.curr = self.start + ch.len_utf8();

        LoxError::lex(self.line, format!("Unexpected character: {}", ch))
    }

    /// Parse a double‑quoted string literal.
    ///
    /// * `self.start` still points to the opening `"`.
    /// * When we return, `self.curr` points **past** the closing `"`.
    fn parse_string(&mut self) -> Result<()> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1; // support multi‑line strings (allowed in Lox)
            }
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // consume closing quote

        // Slice excluding the surrounding quotes.
        let s: &str = &self.text[self.start + 1..self.curr - 1];

        self.pending = Some(TokenType::STRING(s.to_owned()));

        Ok(())
    }

    /// Parse a numeric literal (`123`, `3.14`).  Fractions are optional.
    fn parse_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // Optional fractional part.
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance(); // consume "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let s: &str = &self.text[self.start..self.curr];
        let n: f64 = s.parse::<f64>().unwrap_or(0.0); // parse never fails (checked digits)
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

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>; // alias = Result<T, LoxError>

    fn next(&mut self) -> Option<Self::Item> {
        while self.curr < self.len() {
            self.start = self.curr;
            self.pending = None;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some(tt) = self.pending.take() {
                let lex = &self.text[self.start..self.curr];
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, lex, self.line)));
            }
        }

        // One EOF, then `None` forever.
        if self.curr == self.len() {
            self.curr += 1;
            return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
        }

        None // already yielded EOF
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
