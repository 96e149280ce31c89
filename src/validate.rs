// src/validate.rs
//! Grouping pre-pass run over the token stream before translation.

use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};

/// Checks that every `(` and `{` is closed by its own kind of closer.
pub fn validate_braces(tokens: &[Token]) -> Result<()> {
    let mut stack: Vec<&Token> = Vec::new();

    for token in tokens {
        match token.kind {
            TokenKind::LParen | TokenKind::LBrace => stack.push(token),
            TokenKind::RParen | TokenKind::RBrace => {
                let opener = match token.kind {
                    TokenKind::RParen => TokenKind::LParen,
                    _ => TokenKind::LBrace,
                };
                match stack.last() {
                    Some(top) if top.kind == opener => {
                        stack.pop();
                    }
                    _ => {
                        return Err(Error::syntax(
                            format!("unmatched '{}'", token.lexeme),
                            token.line,
                            token.col,
                        ))
                    }
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some(open) => Err(Error::syntax(
            format!("unclosed '{}'", open.lexeme),
            open.line,
            open.col,
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn check(src: &str) -> Result<()> {
        validate_braces(&Lexer::new(src).lex().unwrap())
    }

    #[test]
    fn balanced_nesting_passes() {
        assert!(check("while (a) { if ((b)) { print(a); } }").is_ok());
    }

    #[test]
    fn stray_closer_is_reported_at_its_position() {
        match check("print(a));") {
            Err(Error::Syntax { message, col, .. }) => {
                assert_eq!(message, "unmatched ')'");
                assert_eq!(col, 9);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn crossed_groups_fail() {
        assert!(check("if (a { ) }").is_err());
    }

    #[test]
    fn unclosed_opener_fails() {
        match check("while (a) {") {
            Err(Error::Syntax { message, .. }) => assert_eq!(message, "unclosed '{'"),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
