//! Token definitions for the Rabbit language.

use std::fmt;

/// A source region: byte offsets plus the one-based line of its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// One-based source line of `start`.
    pub line: u32,
}

impl Span {
    /// Build a span.
    pub fn new(start: usize, end: usize, line: u32) -> Self {
        Self { start, end, line }
    }
}

/// A token in Rabbit source code.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    /// `local`
    Local,
    /// `function`
    Function,
    /// `class`
    Class,
    /// `extends`
    Extends,
    /// `constructor`
    Constructor,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `foreach`
    Foreach,
    /// `in`
    In,
    /// `switch`
    Switch,
    /// `case`
    Case,
    /// `default`
    Default,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `return`
    Return,
    /// `yield`
    Yield,
    /// `try`
    Try,
    /// `catch`
    Catch,
    /// `throw`
    Throw,
    /// `this`
    This,
    /// `base`
    Base,
    /// `typeof`
    Typeof,
    /// `resume`
    Resume,
    /// `null`
    Null,
    /// `true`
    True,
    /// `false`
    False,

    // Literals
    /// Integer literal
    IntLiteral(i64),
    /// Float literal
    FloatLiteral(f64),
    /// String literal (escapes already processed)
    StringLiteral(String),
    /// Identifier
    Identifier(String),

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=`
    Assign,
    /// `+=`
    PlusAssign,
    /// `-=`
    MinusAssign,
    /// `*=`
    StarAssign,
    /// `/=`
    SlashAssign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `~`
    Tilde,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,

    // Punctuation
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `.`
    Dot,

    /// End of input
    Eof,
}

impl Token {
    /// A short description for syntax-error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::IntLiteral(i) => format!("integer '{i}'"),
            Token::FloatLiteral(f) => format!("float '{f}'"),
            Token::StringLiteral(_) => "string literal".to_string(),
            Token::Identifier(name) => format!("identifier '{name}'"),
            Token::Eof => "end of input".to_string(),
            other => format!("'{other}'"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Local => "local",
            Token::Function => "function",
            Token::Class => "class",
            Token::Extends => "extends",
            Token::Constructor => "constructor",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::Foreach => "foreach",
            Token::In => "in",
            Token::Switch => "switch",
            Token::Case => "case",
            Token::Default => "default",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Return => "return",
            Token::Yield => "yield",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::Throw => "throw",
            Token::This => "this",
            Token::Base => "base",
            Token::Typeof => "typeof",
            Token::Resume => "resume",
            Token::Null => "null",
            Token::True => "true",
            Token::False => "false",
            Token::IntLiteral(_) => "integer",
            Token::FloatLiteral(_) => "float",
            Token::StringLiteral(_) => "string",
            Token::Identifier(_) => "identifier",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Assign => "=",
            Token::PlusAssign => "+=",
            Token::MinusAssign => "-=",
            Token::StarAssign => "*=",
            Token::SlashAssign => "/=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Less => "<",
            Token::LessEq => "<=",
            Token::Greater => ">",
            Token::GreaterEq => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Tilde => "~",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::ShiftLeft => "<<",
            Token::ShiftRight => ">>",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::Eof => "<eof>",
        };
        f.write_str(text)
    }
}
