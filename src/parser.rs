// src/parser.rs
//! Single-pass syntax-directed translator.
//!
//! Recursive descent with one token of lookahead. Every production returns
//! the operand holding its value and emits quadruples as it goes, so there is
//! no syntax tree: by the time the last token is consumed the program is
//! complete and every forward jump has been backpatched.

use crate::codegen::{Codegen, CompileOptions, SymbolTable};
use crate::error::{Error, Result};
use crate::ir::{Number, Op, Operand, Program, Quad};
use crate::lexer::{Token, TokenKind};

type PResult<T> = Result<T>;

/// Output of a successful translation.
#[derive(Debug, Clone)]
pub struct Translation {
    pub program: Program,
    pub symbols: SymbolTable,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    cg: Codegen,
}

fn relop(kind: TokenKind) -> Option<Op> {
    Some(match kind {
        TokenKind::Eq => Op::Eq,
        TokenKind::Ne => Op::Ne,
        TokenKind::Le => Op::Le,
        TokenKind::Ge => Op::Ge,
        TokenKind::Lt => Op::Lt,
        TokenKind::Gt => Op::Gt,
        _ => return None,
    })
}

fn is_valid_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Parser {
    pub fn new(tokens: Vec<Token>, options: CompileOptions) -> Self {
        Self { tokens, pos: 0, cg: Codegen::new(options) }
    }

    fn cur(&self) -> &Token {
        // the lexer always terminates the stream with Eof
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.cur().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        self.cg.locate(token.line, token.col);
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.cur().is_keyword(word)
    }

    fn unexpected(&self, expected: &str) -> Error {
        let tok = self.cur();
        Error::syntax(
            format!("expected {expected}, found {}", tok.describe()),
            tok.line,
            tok.col,
        )
    }

    fn eat(&mut self, kind: TokenKind, expected: &str) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn eat_keyword(&mut self, word: &str) -> PResult<Token> {
        if self.at_keyword(word) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("'{word}'")))
        }
    }

    pub fn translate(mut self) -> PResult<Translation> {
        if self.tokens.is_empty() {
            return Err(Error::syntax("empty token stream", 1, 1));
        }
        while !self.at(TokenKind::Eof) {
            self.stmt()?;
        }
        let (program, symbols) = self.cg.finish()?;
        log::debug!(
            "translated {} quadruples, {} variables",
            program.len(),
            symbols.len()
        );
        Ok(Translation { program, symbols })
    }

    fn stmt(&mut self) -> PResult<()> {
        let kind = self.cur().kind;
        let word = self.cur().lexeme.clone();
        match (kind, word.as_str()) {
            (TokenKind::Keyword, "let") => self.decl(),
            (TokenKind::Keyword, "if") => self.if_stmt(),
            (TokenKind::Keyword, "while") => self.while_stmt(),
            (TokenKind::Keyword, "print") => self.print_stmt(),
            (TokenKind::Keyword, "break") => self.break_stmt(),
            (TokenKind::Keyword, "continue") => self.continue_stmt(),
            (TokenKind::Id, _) => self.assign(),
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn block(&mut self) -> PResult<()> {
        self.eat(TokenKind::LBrace, "'{'")?;
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            self.stmt()?;
        }
        self.eat(TokenKind::RBrace, "'}'")?;
        Ok(())
    }

    fn decl(&mut self) -> PResult<()> {
        self.eat_keyword("let")?;
        let name = self.eat(TokenKind::Id, "an identifier")?;
        if !is_valid_var_name(&name.lexeme) {
            return Err(Error::semantic(
                format!("invalid identifier '{}'", name.lexeme),
                name.line,
                name.col,
            ));
        }
        if self.cg.lookup(&name.lexeme).is_some() {
            return Err(Error::semantic(
                format!("variable '{}' is already defined", name.lexeme),
                name.line,
                name.col,
            ));
        }
        self.eat(TokenKind::Assign, "'='")?;
        let value = self.cond()?;
        self.eat(TokenKind::Semi, "';'")?;

        let addr = self.cg.declare(&name.lexeme, name.line, name.col)?;
        self.cg.emit(Quad::new(Op::Assign, value, Operand::None, Operand::Addr(addr)));
        Ok(())
    }

    fn assign(&mut self) -> PResult<()> {
        let name = self.eat(TokenKind::Id, "an identifier")?;
        let addr = self.cg.lookup(&name.lexeme).ok_or_else(|| {
            Error::semantic(
                format!("variable '{}' is not defined", name.lexeme),
                name.line,
                name.col,
            )
        })?;
        self.eat(TokenKind::Assign, "'='")?;
        let value = self.cond()?;
        self.eat(TokenKind::Semi, "';'")?;
        self.cg.emit(Quad::new(Op::Assign, value, Operand::None, Operand::Addr(addr)));
        Ok(())
    }

    fn print_stmt(&mut self) -> PResult<()> {
        let kw = self.eat_keyword("print")?;
        self.eat(TokenKind::LParen, "'('")?;
        let value = self.cond()?;
        self.eat(TokenKind::RParen, "')'")?;
        self.eat(TokenKind::Semi, "';'")?;
        if !value.is_value() {
            return Err(Error::semantic(
                format!("cannot print '{value}'"),
                kw.line,
                kw.col,
            ));
        }
        self.cg.emit(Quad::new(Op::Print, value, Operand::None, Operand::None));
        Ok(())
    }

    /// `( cond )` as used by `if` and `while`.
    fn paren_cond(&mut self) -> PResult<Operand> {
        self.eat(TokenKind::LParen, "'('")?;
        if self.at(TokenKind::RParen) {
            let tok = self.cur();
            return Err(Error::syntax("empty condition", tok.line, tok.col));
        }
        let cond = self.cond()?;
        self.eat(TokenKind::RParen, "')'")?;
        Ok(cond)
    }

    fn if_stmt(&mut self) -> PResult<()> {
        self.eat_keyword("if")?;
        let cond = self.paren_cond()?;
        let skip_then = self.cg.emit_jump(Op::Jmpf, cond)?;
        self.block()?;

        if self.at_keyword("else") {
            self.advance();
            let skip_else = self.cg.emit_jump(Op::Jmp, Operand::None)?;
            self.cg.patch_here(skip_then);
            if self.at_keyword("if") {
                self.if_stmt()?;
            } else {
                self.block()?;
            }
            self.cg.patch_here(skip_else);
        } else {
            self.cg.patch_here(skip_then);
        }
        Ok(())
    }

    fn while_stmt(&mut self) -> PResult<()> {
        self.eat_keyword("while")?;
        let head = self.cg.next_line();
        let cond = self.paren_cond()?;
        let exit_guard = self.cg.emit_jump(Op::Jmpf, cond)?;

        self.cg.enter_loop(head);
        self.block()?;
        self.cg.emit_jump_to(Op::Jmp, Operand::None, head);

        let exit = self.cg.next_line();
        self.cg.patch(exit_guard, exit);
        self.cg.exit_loop(exit);
        Ok(())
    }

    fn break_stmt(&mut self) -> PResult<()> {
        let kw = self.eat_keyword("break")?;
        if !self.cg.emit_break()? {
            return Err(Error::syntax("'break' outside loop", kw.line, kw.col));
        }
        self.eat(TokenKind::Semi, "';'")?;
        Ok(())
    }

    fn continue_stmt(&mut self) -> PResult<()> {
        let kw = self.eat_keyword("continue")?;
        if !self.cg.emit_continue() {
            return Err(Error::syntax("'continue' outside loop", kw.line, kw.col));
        }
        self.eat(TokenKind::Semi, "';'")?;
        Ok(())
    }

    fn cond(&mut self) -> PResult<Operand> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> PResult<Operand> {
        let mut left = self.and_expr()?;
        while self.at_keyword("or") {
            self.advance();
            let right = self.and_expr()?;
            left = self.cg.binary(Op::Or, left, right)?;
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> PResult<Operand> {
        let mut left = self.not_expr()?;
        while self.at_keyword("and") {
            self.advance();
            let right = self.not_expr()?;
            left = self.cg.binary(Op::And, left, right)?;
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> PResult<Operand> {
        if self.at_keyword("not") {
            self.advance();
            let value = self.not_expr()?;
            self.cg.unary(Op::Not, value)
        } else {
            self.rel_expr()
        }
    }

    fn rel_expr(&mut self) -> PResult<Operand> {
        let left = self.bool_primary()?;
        let Some(op) = relop(self.cur().kind) else {
            return Ok(left);
        };
        self.advance();
        let right = self.bool_primary()?;
        if relop(self.cur().kind).is_some() {
            let tok = self.cur();
            return Err(Error::syntax(
                "comparison operators cannot be chained",
                tok.line,
                tok.col,
            ));
        }
        self.cg.binary(op, left, right)
    }

    fn bool_primary(&mut self) -> PResult<Operand> {
        if self.at(TokenKind::LParen) {
            self.advance();
            let inner = self.cond()?;
            self.eat(TokenKind::RParen, "')'")?;
            // a parenthesised group may still be the left operand of arithmetic
            let term = self.term_tail(inner)?;
            self.expr_tail(term)
        } else {
            self.expr()
        }
    }

    fn expr(&mut self) -> PResult<Operand> {
        let left = self.term()?;
        self.expr_tail(left)
    }

    fn expr_tail(&mut self, mut left: Operand) -> PResult<Operand> {
        loop {
            let op = match self.cur().kind {
                TokenKind::Plus => Op::Add,
                TokenKind::Minus => Op::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = self.cg.binary(op, left, right)?;
        }
    }

    fn term(&mut self) -> PResult<Operand> {
        let left = self.factor()?;
        self.term_tail(left)
    }

    fn term_tail(&mut self, mut left: Operand) -> PResult<Operand> {
        loop {
            let op = match self.cur().kind {
                TokenKind::Mult => Op::Mul,
                TokenKind::Div => Op::Div,
                TokenKind::Mod => Op::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = self.cg.binary(op, left, right)?;
        }
    }

    fn factor(&mut self) -> PResult<Operand> {
        let tok = self.cur().clone();
        match tok.kind {
            TokenKind::Minus => {
                self.advance();
                let value = self.factor()?;
                self.cg.unary(Op::Neg, value)
            }
            TokenKind::Id => {
                self.advance();
                let addr = self.cg.lookup(&tok.lexeme).ok_or_else(|| {
                    Error::semantic(
                        format!("variable '{}' is not defined", tok.lexeme),
                        tok.line,
                        tok.col,
                    )
                })?;
                Ok(Operand::Addr(addr))
            }
            TokenKind::Number => {
                self.advance();
                let number = Number::parse(&tok.lexeme).ok_or_else(|| {
                    Error::syntax(
                        format!("invalid number literal '{}'", tok.lexeme),
                        tok.line,
                        tok.col,
                    )
                })?;
                Ok(Operand::Imm(number))
            }
            TokenKind::Str => {
                self.advance();
                let text = tok.lexeme.trim_matches('"').to_string();
                Ok(Operand::Str(text))
            }
            TokenKind::Keyword if tok.lexeme == "true" || tok.lexeme == "false" => {
                self.advance();
                Ok(Operand::Bool(tok.lexeme == "true"))
            }
            TokenKind::LParen => {
                self.advance();
                let value = self.expr()?;
                self.eat(TokenKind::RParen, "')'")?;
                Ok(value)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}
