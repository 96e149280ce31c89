// src/lexer.rs
use crate::error::{Error, Result};
use std::fmt;

pub const KEYWORDS: &[&str] = &[
    "let", "if", "else", "while", "print", "true", "false", "not", "and", "or", "break",
    "continue",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword, Id, Number, Str,
    Eq, Ne, Le, Ge, Lt, Gt, Assign,
    Plus, Minus, Mult, Div, Mod,
    LParen, RParen, LBrace, RBrace, Semi,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TokenKind::Keyword => "KEYWORD",
            TokenKind::Id => "ID",
            TokenKind::Number => "NUMBER",
            TokenKind::Str => "STRING",
            TokenKind::Eq => "EQ",
            TokenKind::Ne => "NE",
            TokenKind::Le => "LE",
            TokenKind::Ge => "GE",
            TokenKind::Lt => "LT",
            TokenKind::Gt => "GT",
            TokenKind::Assign => "ASSIGN",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Mult => "MULT",
            TokenKind::Div => "DIV",
            TokenKind::Mod => "MOD",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::Semi => "SEMI",
            TokenKind::Eof => "EOF",
        };
        f.write_str(name)
    }
}

/// One lexeme with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, col: usize) -> Self {
        Self { kind, lexeme: lexeme.into(), line, col }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.lexeme == word
    }

    /// Human-friendly description used in diagnostics.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { input: source.as_bytes(), pos: 0, line: 1, col: 1 }
    }

    fn advance(&mut self) {
        let byte = self.cur();
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if byte & 0xC0 != 0x80 {
            // columns count characters; UTF-8 continuation bytes don't start one
            self.col += 1;
        }
        self.pos += 1;
    }
    fn cur(&self) -> u8 { self.input.get(self.pos).copied().unwrap_or(0) }
    fn peek(&self) -> u8 { self.input.get(self.pos + 1).copied().unwrap_or(0) }
    fn peek_at(&self, offset: usize) -> u8 {
        self.input.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            match self.cur() {
                b' ' | b'\t' | b'\n' | b'\r' => self.advance(),
                b'/' if self.peek() == b'/' => self.skip_line_comment(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.input.len() && self.cur() != b'\n' {
            self.advance();
        }
    }

    fn slice(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn number(&mut self) -> String {
        let start = self.pos;
        while self.cur().is_ascii_digit() {
            self.advance();
        }
        if self.cur() == b'.' && self.peek().is_ascii_digit() {
            self.advance();
            while self.cur().is_ascii_digit() {
                self.advance();
            }
        }
        // exponent only when digits follow, so `2e` lexes as `2` then `e`
        if matches!(self.cur(), b'e' | b'E') {
            let digits_at = if matches!(self.peek(), b'+' | b'-') { 2 } else { 1 };
            if self.peek_at(digits_at).is_ascii_digit() {
                for _ in 0..digits_at {
                    self.advance();
                }
                while self.cur().is_ascii_digit() {
                    self.advance();
                }
            }
        }
        self.slice(start)
    }

    pub fn lex(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::with_capacity(self.input.len() / 4);

        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() { break; }
            let (line, col) = (self.line, self.col);

            let (kind, lexeme) = match self.cur() {
                b'0'..=b'9' => (TokenKind::Number, self.number()),
                b'"' => {
                    self.advance();
                    let start = self.pos;
                    while self.pos < self.input.len() && self.cur() != b'"' {
                        self.advance();
                    }
                    if self.pos >= self.input.len() {
                        return Err(Error::lexical("unterminated string literal", line, col));
                    }
                    let text = self.slice(start);
                    self.advance();
                    (TokenKind::Str, format!("\"{text}\""))
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    let start = self.pos;
                    while matches!(self.cur(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
                        self.advance();
                    }
                    let word = self.slice(start);
                    if KEYWORDS.contains(&word.as_str()) {
                        (TokenKind::Keyword, word)
                    } else {
                        (TokenKind::Id, word)
                    }
                }
                b'=' | b'!' | b'<' | b'>' if self.peek() == b'=' => {
                    let kind = match self.cur() {
                        b'=' => TokenKind::Eq,
                        b'!' => TokenKind::Ne,
                        b'<' => TokenKind::Le,
                        _ => TokenKind::Ge,
                    };
                    let start = self.pos;
                    self.advance();
                    self.advance();
                    (kind, self.slice(start))
                }
                c => {
                    let kind = match c {
                        b'<' => TokenKind::Lt,
                        b'>' => TokenKind::Gt,
                        b'=' => TokenKind::Assign,
                        b'+' => TokenKind::Plus,
                        b'-' => TokenKind::Minus,
                        b'*' => TokenKind::Mult,
                        b'/' => TokenKind::Div,
                        b'%' => TokenKind::Mod,
                        b'(' => TokenKind::LParen,
                        b')' => TokenKind::RParen,
                        b'{' => TokenKind::LBrace,
                        b'}' => TokenKind::RBrace,
                        b';' => TokenKind::Semi,
                        _ => {
                            let rest = String::from_utf8_lossy(&self.input[self.pos..]);
                            let ch = rest.chars().next().unwrap_or('\0');
                            return Err(Error::lexical(
                                format!("unexpected character '{ch}'"),
                                line,
                                col,
                            ));
                        }
                    };
                    self.advance();
                    (kind, (c as char).to_string())
                }
            };
            log::trace!("{line}:{col} {kind} {lexeme}");
            tokens.push(Token::new(kind, lexeme, line, col));
        }

        tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));
        log::debug!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }
}
