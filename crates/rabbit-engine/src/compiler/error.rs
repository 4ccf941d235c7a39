//! Compile-time error taxonomies.
//!
//! Lex and compile errors are separate types and both abort compilation:
//! no partial prototype is ever returned. Runtime faults are a third,
//! unrelated taxonomy ([`VmError`](crate::vm::VmError)).

use thiserror::Error;

use crate::compiler::Span;

/// What went wrong while forming a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
pub enum LexErrorKind {
    /// A string literal ran to end of input without a closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// An unknown escape sequence inside a string literal.
    #[error("invalid escape sequence")]
    InvalidEscape,
    /// A numeric literal that does not parse (overflow, stray characters).
    #[error("invalid numeric literal")]
    InvalidNumber,
    /// A block comment ran to end of input without `*/`.
    #[error("unterminated block comment")]
    UnterminatedComment,
    /// A character with no meaning in the language.
    #[default]
    #[error("unexpected character")]
    UnexpectedCharacter,
}

/// A malformed token, with the offending position.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("{kind} at line {}", span.line)]
pub struct LexError {
    /// The error kind.
    pub kind: LexErrorKind,
    /// Where the bad token starts.
    pub span: Span,
}

/// A malformed program, detected before any execution.
///
/// Note what is absent: using an undeclared name is not a compile error.
/// Global names resolve against the root table at execution time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A token-level failure.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// The token stream does not form a valid program.
    #[error("syntax error at line {line}: {message}")]
    Syntax {
        /// Description of what was expected or found.
        message: String,
        /// One-based source line.
        line: u32,
    },

    /// Two locals with the same name in one scope.
    #[error("duplicate local '{name}' at line {line}")]
    DuplicateLocal {
        /// The redeclared name.
        name: String,
        /// One-based source line.
        line: u32,
    },

    /// The left side of an assignment is not assignable.
    #[error("invalid assignment target at line {line}")]
    InvalidAssignmentTarget {
        /// One-based source line.
        line: u32,
    },

    /// `break` outside any loop or switch.
    #[error("'break' outside of a loop at line {line}")]
    BreakOutsideLoop {
        /// One-based source line.
        line: u32,
    },

    /// `continue` outside any loop.
    #[error("'continue' outside of a loop at line {line}")]
    ContinueOutsideLoop {
        /// One-based source line.
        line: u32,
    },

    /// A function needs more local/temporary slots than a frame can hold.
    #[error("too many locals in function at line {line}")]
    TooManyLocals {
        /// One-based source line.
        line: u32,
    },

    /// A function's constant pool overflowed.
    #[error("too many constants in function at line {line}")]
    TooManyConstants {
        /// One-based source line.
        line: u32,
    },
}

impl CompileError {
    /// The source line the error points at.
    pub fn line(&self) -> u32 {
        match self {
            CompileError::Lex(e) => e.span.line,
            CompileError::Syntax { line, .. }
            | CompileError::DuplicateLocal { line, .. }
            | CompileError::InvalidAssignmentTarget { line }
            | CompileError::BreakOutsideLoop { line }
            | CompileError::ContinueOutsideLoop { line }
            | CompileError::TooManyLocals { line }
            | CompileError::TooManyConstants { line } => *line,
        }
    }
}
