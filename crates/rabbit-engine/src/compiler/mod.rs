//! Lexer and single-pass compiler.
//!
//! The compiler is a recursive-descent parser driven directly off the token
//! stream. There is no persisted syntax tree: expressions and statements
//! emit bytecode as they parse, with forward jumps recorded and patched once
//! their targets are known. One [`FuncState`] exists per nested function
//! being compiled; upvalue references resolve by walking the enclosing
//! states outward.

mod error;
mod expr;
mod func_state;
mod lexer;
mod stmt;
mod token;

pub use error::{CompileError, LexError, LexErrorKind};
pub use lexer::Lexer;
pub use token::{Span, Token};

use crate::alloc::Heap;
use crate::bytecode::{CaptureSource, FunctionProto, Opcode, ProtoRef};
use func_state::FuncState;

/// Compile `source` as a sequence of statements into a root prototype.
///
/// The root function's single parameter is the implicit receiver (`this`),
/// bound to the root table when the VM executes it. Undeclared names are not
/// errors here; they resolve against the root table at execution time.
pub fn compile(heap: &Heap, source: &str, source_name: &str) -> Result<ProtoRef, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut compiler = Compiler::new(heap.clone(), tokens, source_name);
    compiler.compile_main("<main>")
}

/// Compile `source` as a single expression; the resulting prototype returns
/// the expression's value.
pub fn compile_expression(
    heap: &Heap,
    source: &str,
    source_name: &str,
) -> Result<ProtoRef, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut compiler = Compiler::new(heap.clone(), tokens, source_name);
    compiler.compile_expr_main("<expr>")
}

/// Where a parsed prefix expression lives; drives both reads and stores.
pub(crate) enum Place {
    /// Materialized into a slot already.
    Temp(u8),
    /// A local variable slot.
    Local(u8),
    /// An upvalue index.
    Upvalue(u8),
    /// A root-table slot (operand: name constant index).
    Global(i32),
    /// `obj[key]`, both in slots.
    Index {
        /// Slot holding the container.
        obj: u8,
        /// Slot holding the key.
        key: u8,
    },
    /// `obj.name` (operand: name constant index).
    Member {
        /// Slot holding the object.
        obj: u8,
        /// Name constant index.
        name: i32,
    },
    /// `base.name`: resolved from the current method's base class upward.
    BaseMember {
        /// Name constant index.
        name: i32,
    },
}

pub(crate) struct Compiler {
    heap: Heap,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    source_name: String,
    states: Vec<FuncState>,
}

impl Compiler {
    fn new(heap: Heap, tokens: Vec<(Token, Span)>, source_name: &str) -> Self {
        Self { heap, tokens, pos: 0, source_name: source_name.to_string(), states: Vec::new() }
    }

    fn compile_main(&mut self, name: &str) -> Result<ProtoRef, CompileError> {
        self.push_state(name)?;
        while !self.check(&Token::Eof) {
            self.compile_statement()?;
        }
        if self.fs().is_generator {
            return Err(self.syntax_error("'yield' outside of a function"));
        }
        self.emit_return_null();
        Ok(self.pop_state())
    }

    fn compile_expr_main(&mut self, name: &str) -> Result<ProtoRef, CompileError> {
        self.push_state(name)?;
        let line = self.line();
        let slot = self.fs().alloc_slot(line)?;
        self.compile_expr(slot)?;
        if !self.check(&Token::Eof) {
            let found = self.peek().describe();
            return Err(self.syntax_error(&format!("expected end of expression, found {found}")));
        }
        let line = self.line();
        self.fs().emit(Opcode::Return, slot, 0, 0, line);
        Ok(self.pop_state())
    }

    // ===== Function-state management =====

    fn push_state(&mut self, name: &str) -> Result<(), CompileError> {
        let mut fs = FuncState::new(name);
        fs.params = 1;
        let line = self.line();
        self.states.push(fs);
        // Slot 0 is the implicit receiver.
        self.fs().declare_local("this", line)?;
        Ok(())
    }

    fn pop_state(&mut self) -> ProtoRef {
        let mut fs = self.states.pop().unwrap();
        fs.finish_locals();
        let proto = FunctionProto {
            name: fs.name,
            source: self.source_name.clone(),
            params: fs.params,
            stack_size: fs.stack_size.max(1),
            is_generator: fs.is_generator,
            code: fs.code,
            constants: fs.constants,
            upvalues: fs.upvalues.into_iter().map(|u| u.source).collect(),
            lines: fs.lines,
            locals: fs.debug_locals,
            ticket: None,
        };
        proto.into_ref(&self.heap)
    }

    fn fs(&mut self) -> &mut FuncState {
        self.states.last_mut().unwrap()
    }

    fn fs_ref(&self) -> &FuncState {
        self.states.last().unwrap()
    }

    fn emit_return_null(&mut self) {
        let line = self.line();
        self.fs().emit(Opcode::Return, 0, 0, 1, line);
    }

    // ===== Token stream =====

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1.line
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, context: &str) -> Result<(), CompileError> {
        if self.eat(&token) {
            Ok(())
        } else {
            let found = self.peek().describe();
            Err(self.syntax_error(&format!("expected '{token}' {context}, found {found}")))
        }
    }

    fn expect_identifier(&mut self, context: &str) -> Result<String, CompileError> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => {
                let found = other.describe();
                Err(self.syntax_error(&format!("expected identifier {context}, found {found}")))
            }
        }
    }

    fn syntax_error(&self, message: &str) -> CompileError {
        CompileError::Syntax { message: message.to_string(), line: self.line() }
    }

    // ===== Name resolution =====

    /// Resolve `name` lexically: local, then enclosing-function upvalue,
    /// then (by exclusion) the root table at execution time.
    fn resolve_variable(&mut self, name: &str) -> Result<Place, CompileError> {
        if let Some(slot) = self.fs_ref().resolve_local(name) {
            return Ok(Place::Local(slot));
        }
        let level = self.states.len() - 1;
        if let Some(idx) = self.resolve_upvalue(level, name) {
            return Ok(Place::Upvalue(idx));
        }
        let line = self.line();
        let name_const = self.string_const(name, line)?;
        Ok(Place::Global(name_const))
    }

    fn resolve_upvalue(&mut self, level: usize, name: &str) -> Option<u8> {
        if level == 0 {
            return None;
        }
        if let Some(idx) = self.states[level].resolve_upvalue_name(name) {
            return Some(idx);
        }
        let parent = level - 1;
        if let Some(slot) = self.states[parent].resolve_local(name) {
            self.states[parent].mark_captured(slot);
            return Some(self.states[level].add_upvalue(name, CaptureSource::ParentLocal(slot)));
        }
        if let Some(idx) = self.resolve_upvalue(parent, name) {
            return Some(self.states[level].add_upvalue(name, CaptureSource::ParentUpvalue(idx)));
        }
        None
    }

    fn string_const(&mut self, s: &str, line: u32) -> Result<i32, CompileError> {
        let value = crate::object::RbString::new(&self.heap, s);
        self.fs().add_const(crate::bytecode::Constant::Str(value), line)
    }
}
