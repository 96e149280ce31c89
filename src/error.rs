// src/error.rs
//! Error taxonomy shared by every stage of the pipeline.
//!
//! Front-end errors carry the source position of the offending token,
//! runtime errors carry the 1-based instruction line that faulted.

use snafu::Snafu;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("[Lexical Error] {message} at line {line} col {col}"))]
    Lexical {
        message: String,
        line: usize,
        col: usize,
    },

    #[snafu(display("[Syntax Error] {message} at line {line} col {col}"))]
    Syntax {
        message: String,
        line: usize,
        col: usize,
    },

    #[snafu(display("[Semantic Error] {message} at line {line} col {col}"))]
    Semantic {
        message: String,
        line: usize,
        col: usize,
    },

    #[snafu(display("[Runtime Error] {kind} (instruction {line})"))]
    Runtime { kind: RuntimeFault, line: usize },

    #[snafu(display("[I/O Error] {source}"), context(false))]
    Io { source: std::io::Error },
}

impl Error {
    pub fn lexical(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::Lexical {
            message: message.into(),
            line,
            col,
        }
    }

    pub fn syntax(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
            col,
        }
    }

    pub fn semantic(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::Semantic {
            message: message.into(),
            line,
            col,
        }
    }

    pub fn runtime(kind: RuntimeFault, line: usize) -> Self {
        Self::Runtime { kind, line }
    }

    /// Name of the pipeline phase that produced this error.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Lexical { .. } => "lexical",
            Self::Syntax { .. } => "syntax",
            Self::Semantic { .. } => "semantic",
            Self::Runtime { .. } => "runtime",
            Self::Io { .. } => "io",
        }
    }

    /// The runtime fault kind, if this is a runtime error.
    pub fn fault(&self) -> Option<&RuntimeFault> {
        match self {
            Self::Runtime { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Fatal conditions raised while executing a program.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeFault {
    UnknownOperation(String),
    UnknownOperand(String),
    DivisionByZero,
    /// A jump whose target is the jump itself.
    SelfJump,
    /// A jump that still holds a placeholder, or points outside the program.
    UnresolvedJump(String),
    TypeMismatch(String),
    InvalidArithmetic(String),
    StepLimitExceeded(u64),
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperation(op) => write!(f, "unknown operation: {op}"),
            Self::UnknownOperand(operand) => write!(f, "unknown operand: {operand}"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::SelfJump => write!(f, "jump to itself would never terminate"),
            Self::UnresolvedJump(target) => write!(f, "unresolved jump target: {target}"),
            Self::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            Self::InvalidArithmetic(msg) => write!(f, "invalid arithmetic: {msg}"),
            Self::StepLimitExceeded(limit) => {
                write!(f, "maximum steps exceeded ({limit})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_phase_and_position() {
        let err = Error::semantic("variable 'a' is already defined", 3, 5);
        assert_eq!(
            err.to_string(),
            "[Semantic Error] variable 'a' is already defined at line 3 col 5"
        );
        assert_eq!(err.phase(), "semantic");
    }

    #[test]
    fn runtime_display_names_instruction() {
        let err = Error::runtime(RuntimeFault::DivisionByZero, 7);
        assert_eq!(err.to_string(), "[Runtime Error] division by zero (instruction 7)");
        assert_eq!(err.fault(), Some(&RuntimeFault::DivisionByZero));
    }

    #[test]
    fn io_errors_convert() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert_eq!(err.phase(), "io");
    }
}
