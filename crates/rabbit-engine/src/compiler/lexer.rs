//! Lexer for the Rabbit language.
//!
//! Built on the logos library: one derived token machine plus manual
//! callbacks where a pattern needs validation (numbers, strings, block
//! comments). Malformed literals surface as typed [`LexError`]s here, never
//! as deferred runtime errors.

use logos::{FilterResult, Logos};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::compiler::error::{LexError, LexErrorKind};
use crate::compiler::token::{Span, Token};

/// Logos-based token enum for lexing.
///
/// Used internally; converted to the public [`Token`] enum after lexing,
/// where identifiers are split from keywords.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
enum LogosToken {
    #[regex(r"/\*", lex_block_comment)]
    BlockComment,

    // Identifiers and keywords; split apart during conversion
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Word(String),

    // Numbers. The decimal pattern deliberately over-matches trailing
    // identifier characters so that `123abc` is a lex error, not two tokens.
    #[regex(r"0[xX][0-9a-zA-Z_]*", parse_hex, priority = 3)]
    #[regex(r"[0-9][0-9a-zA-Z_]*", parse_dec, priority = 2)]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", parse_float, priority = 4)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", parse_float, priority = 4)]
    Float(f64),

    // A closed string wins over the unterminated fallback by match length.
    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    Str(String),

    #[regex(r#""([^"\\\n]|\\.)*"#, unterminated_string)]
    UnterminatedStr(String),

    // Operators (two-character before one-character)
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Assign,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
}

// Keyword table, consulted when converting identifier-shaped words.
// The original interpreter does the same: one shared keyword lookup.
static KEYWORDS: Lazy<FxHashMap<&'static str, Token>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("local", Token::Local);
    map.insert("function", Token::Function);
    map.insert("class", Token::Class);
    map.insert("extends", Token::Extends);
    map.insert("constructor", Token::Constructor);
    map.insert("if", Token::If);
    map.insert("else", Token::Else);
    map.insert("while", Token::While);
    map.insert("for", Token::For);
    map.insert("foreach", Token::Foreach);
    map.insert("in", Token::In);
    map.insert("switch", Token::Switch);
    map.insert("case", Token::Case);
    map.insert("default", Token::Default);
    map.insert("break", Token::Break);
    map.insert("continue", Token::Continue);
    map.insert("return", Token::Return);
    map.insert("yield", Token::Yield);
    map.insert("try", Token::Try);
    map.insert("catch", Token::Catch);
    map.insert("throw", Token::Throw);
    map.insert("this", Token::This);
    map.insert("base", Token::Base);
    map.insert("typeof", Token::Typeof);
    map.insert("resume", Token::Resume);
    map.insert("null", Token::Null);
    map.insert("true", Token::True);
    map.insert("false", Token::False);
    map
});

fn lex_block_comment(lex: &mut logos::Lexer<'_, LogosToken>) -> FilterResult<(), LexErrorKind> {
    // "/*" is consumed; find the matching "*/"
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error(LexErrorKind::UnterminatedComment)
        }
    }
}

fn parse_hex(lex: &mut logos::Lexer<'_, LogosToken>) -> Result<i64, LexErrorKind> {
    let digits = &lex.slice()[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LexErrorKind::InvalidNumber);
    }
    i64::from_str_radix(digits, 16).map_err(|_| LexErrorKind::InvalidNumber)
}

fn parse_dec(lex: &mut logos::Lexer<'_, LogosToken>) -> Result<i64, LexErrorKind> {
    let s = lex.slice();
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(LexErrorKind::InvalidNumber);
    }
    s.parse().map_err(|_| LexErrorKind::InvalidNumber)
}

fn parse_float(lex: &mut logos::Lexer<'_, LogosToken>) -> Result<f64, LexErrorKind> {
    lex.slice().parse().map_err(|_| LexErrorKind::InvalidNumber)
}

fn parse_string(lex: &mut logos::Lexer<'_, LogosToken>) -> Result<String, LexErrorKind> {
    let s = lex.slice();
    unescape(&s[1..s.len() - 1])
}

fn unterminated_string(
    _lex: &mut logos::Lexer<'_, LogosToken>,
) -> Result<String, LexErrorKind> {
    Err(LexErrorKind::UnterminatedString)
}

fn unescape(s: &str) -> Result<String, LexErrorKind> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('0') => result.push('\0'),
            Some('x') => {
                let hi = chars.next().ok_or(LexErrorKind::InvalidEscape)?;
                let lo = chars.next().ok_or(LexErrorKind::InvalidEscape)?;
                let mut hex = String::new();
                hex.push(hi);
                hex.push(lo);
                let code = u8::from_str_radix(&hex, 16).map_err(|_| LexErrorKind::InvalidEscape)?;
                result.push(code as char);
            }
            _ => return Err(LexErrorKind::InvalidEscape),
        }
    }

    Ok(result)
}

/// Main lexer structure.
///
/// Finite and restartable only by re-invocation: one `tokenize` call
/// consumes the lexer and produces the full token sequence or the first
/// error.
pub struct Lexer<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `source`.
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { source, line_starts }
    }

    fn line_of(&self, offset: usize) -> u32 {
        self.line_starts.partition_point(|&s| s <= offset) as u32
    }

    /// Tokenize the whole source, appending an `Eof` token.
    ///
    /// Fails with the first [`LexError`]; no partial token stream is
    /// returned.
    pub fn tokenize(self) -> Result<Vec<(Token, Span)>, LexError> {
        let mut tokens = Vec::new();
        let mut lexer = LogosToken::lexer(self.source);

        while let Some(result) = lexer.next() {
            let range = lexer.span();
            let span = Span::new(range.start, range.end, self.line_of(range.start));
            match result {
                Ok(logos_token) => tokens.push((convert(logos_token), span)),
                Err(kind) => return Err(LexError { kind, span }),
            }
        }

        let end = self.source.len();
        tokens.push((Token::Eof, Span::new(end, end, self.line_of(end.saturating_sub(1)))));
        Ok(tokens)
    }
}

fn convert(token: LogosToken) -> Token {
    match token {
        LogosToken::Word(word) => match KEYWORDS.get(word.as_str()) {
            Some(keyword) => keyword.clone(),
            None => Token::Identifier(word),
        },
        LogosToken::Int(i) => Token::IntLiteral(i),
        LogosToken::Float(f) => Token::FloatLiteral(f),
        LogosToken::Str(s) | LogosToken::UnterminatedStr(s) => Token::StringLiteral(s),
        // Block comments are skipped or error inside the callback.
        LogosToken::BlockComment => unreachable!("block comments never reach conversion"),
        LogosToken::PlusAssign => Token::PlusAssign,
        LogosToken::MinusAssign => Token::MinusAssign,
        LogosToken::StarAssign => Token::StarAssign,
        LogosToken::SlashAssign => Token::SlashAssign,
        LogosToken::EqEq => Token::EqEq,
        LogosToken::NotEq => Token::NotEq,
        LogosToken::LessEq => Token::LessEq,
        LogosToken::GreaterEq => Token::GreaterEq,
        LogosToken::AndAnd => Token::AndAnd,
        LogosToken::OrOr => Token::OrOr,
        LogosToken::ShiftLeft => Token::ShiftLeft,
        LogosToken::ShiftRight => Token::ShiftRight,
        LogosToken::Plus => Token::Plus,
        LogosToken::Minus => Token::Minus,
        LogosToken::Star => Token::Star,
        LogosToken::Slash => Token::Slash,
        LogosToken::Percent => Token::Percent,
        LogosToken::Assign => Token::Assign,
        LogosToken::Less => Token::Less,
        LogosToken::Greater => Token::Greater,
        LogosToken::Bang => Token::Bang,
        LogosToken::Tilde => Token::Tilde,
        LogosToken::Amp => Token::Amp,
        LogosToken::Pipe => Token::Pipe,
        LogosToken::Caret => Token::Caret,
        LogosToken::LParen => Token::LParen,
        LogosToken::RParen => Token::RParen,
        LogosToken::LBrace => Token::LBrace,
        LogosToken::RBrace => Token::RBrace,
        LogosToken::LBracket => Token::LBracket,
        LogosToken::RBracket => Token::RBracket,
        LogosToken::Comma => Token::Comma,
        LogosToken::Semicolon => Token::Semicolon,
        LogosToken::Colon => Token::Colon,
        LogosToken::Dot => Token::Dot,
    }
}
