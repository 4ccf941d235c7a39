//! Expression compilation.
//!
//! Expressions compile into an explicit target slot. Binary operators use
//! precedence climbing; `&&` and `||` short-circuit by branching on the
//! target slot, so the result is the deciding operand's value. Temporaries
//! allocated while evaluating sub-expressions are released before the
//! expression finishes.

use crate::bytecode::{Constant, Opcode};
use crate::compiler::error::CompileError;
use crate::compiler::token::Token;
use crate::compiler::{Compiler, Place};

impl Compiler {
    /// Compile a full expression into `target`.
    pub(crate) fn compile_expr(&mut self, target: u8) -> Result<(), CompileError> {
        self.compile_expr_prec(target, 1)?;
        Ok(())
    }

    /// Precedence-climbing entry. Returns whether the expression is a bare
    /// string literal, which selects `Concat` over `Add` for `+`.
    fn compile_expr_prec(&mut self, target: u8, min_prec: u8) -> Result<bool, CompileError> {
        let is_str_lit = self.compile_unary(target)?;
        self.continue_binary(target, min_prec, is_str_lit)
    }

    /// The binary-operator loop, entered with the left operand already in
    /// `target`. Exposed separately so expression statements can resume
    /// after deciding the prefix is not an assignment target.
    pub(crate) fn continue_binary(
        &mut self,
        target: u8,
        min_prec: u8,
        mut is_str_lit: bool,
    ) -> Result<bool, CompileError> {
        loop {
            let Some((prec, op)) = binary_op(self.peek()) else { break };
            if prec < min_prec {
                break;
            }
            let line = self.line();
            let token = self.advance();
            match token {
                Token::OrOr => {
                    let skip = self.fs().emit_jump(Opcode::JumpIfTrue, target, line);
                    self.compile_expr_prec(target, prec + 1)?;
                    self.fs().patch_jump(skip);
                    is_str_lit = false;
                }
                Token::AndAnd => {
                    let skip = self.fs().emit_jump(Opcode::JumpIfFalse, target, line);
                    self.compile_expr_prec(target, prec + 1)?;
                    self.fs().patch_jump(skip);
                    is_str_lit = false;
                }
                _ => {
                    let save = self.fs().top_slot();
                    let rhs = self.fs().alloc_slot(line)?;
                    let rhs_is_str = self.compile_expr_prec(rhs, prec + 1)?;
                    let op = if op == Opcode::Add && (is_str_lit || rhs_is_str) {
                        Opcode::Concat
                    } else {
                        op
                    };
                    self.fs().emit(op, target, target as i32, rhs, line);
                    self.fs().free_to(save);
                    // A Concat result is a string, so the chain stays
                    // string-typed for the next `+`.
                    is_str_lit = op == Opcode::Concat;
                }
            }
        }
        Ok(is_str_lit)
    }

    fn compile_unary(&mut self, target: u8) -> Result<bool, CompileError> {
        let line = self.line();
        let op = match self.peek() {
            Token::Minus => Some(Opcode::Neg),
            Token::Bang => Some(Opcode::Not),
            Token::Tilde => Some(Opcode::BitNot),
            Token::Typeof => Some(Opcode::TypeOf),
            Token::Resume => Some(Opcode::Resume),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            self.compile_unary(target)?;
            self.fs().emit(op, target, 0, target, line);
            return Ok(false);
        }
        self.compile_postfix_into(target)
    }

    /// Compile a prefix/postfix chain and materialize it into `target`.
    fn compile_postfix_into(&mut self, target: u8) -> Result<bool, CompileError> {
        let base = self.fs().top_slot();
        let (place, is_str_lit) = self.compile_prefix()?;
        let line = self.line();
        self.load_place(&place, target, line);
        self.fs().free_to(base);
        Ok(is_str_lit)
    }

    /// Parse a primary expression followed by any number of `.name`,
    /// `[expr]`, and call suffixes.
    pub(crate) fn compile_prefix(&mut self) -> Result<(Place, bool), CompileError> {
        let (mut place, mut is_str_lit) = self.compile_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let line = self.line();
                    let name = self.expect_identifier("after '.'")?;
                    let name = self.string_const(&name, line)?;
                    let obj = self.place_to_slot(place, line)?;
                    place = Place::Member { obj, name };
                }
                Token::LBracket => {
                    let line = self.line();
                    let obj = self.place_to_slot(place, line)?;
                    self.advance();
                    let key = self.fs().alloc_slot(line)?;
                    self.compile_expr(key)?;
                    self.expect(Token::RBracket, "after index expression")?;
                    place = Place::Index { obj, key };
                }
                Token::LParen => {
                    self.advance();
                    place = self.compile_call(place)?;
                }
                _ => break,
            }
            is_str_lit = false;
        }
        Ok((place, is_str_lit))
    }

    /// Compile a call. The opening parenthesis is already consumed.
    ///
    /// Frame layout at the call site: callee, receiver, then the arguments
    /// in consecutive slots.
    fn compile_call(&mut self, callee: Place) -> Result<Place, CompileError> {
        let line = self.line();
        let f = self.fs().alloc_slot(line)?;
        let this_slot = self.fs().alloc_slot(line)?;
        match callee {
            Place::Member { obj, name } => {
                self.fs().emit(Opcode::GetMember, f, name, obj, line);
                self.fs().emit(Opcode::Move, this_slot, 0, obj, line);
            }
            Place::BaseMember { name } => {
                self.fs().emit(Opcode::GetBase, f, name, 0, line);
                self.fs().emit(Opcode::Move, this_slot, 0, 0, line);
            }
            other => {
                self.load_place(&other, f, line);
                self.fs().emit(Opcode::LoadNull, this_slot, 0, 0, line);
            }
        }
        let mut nargs: u8 = 0;
        if !self.check(&Token::RParen) {
            loop {
                let line = self.line();
                let slot = self.fs().alloc_slot(line)?;
                self.compile_expr(slot)?;
                nargs += 1;
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "after call arguments")?;
        let line = self.line();
        self.fs().emit(Opcode::Call, f, f as i32, nargs, line);
        self.fs().free_to(this_slot);
        Ok(Place::Temp(f))
    }

    fn compile_primary(&mut self) -> Result<(Place, bool), CompileError> {
        let line = self.line();
        match self.peek().clone() {
            Token::IntLiteral(i) => {
                self.advance();
                let slot = self.fs().alloc_slot(line)?;
                if let Ok(imm) = i32::try_from(i) {
                    self.fs().emit(Opcode::LoadInt, slot, imm, 0, line);
                } else {
                    let idx = self.fs().add_const(Constant::Int(i), line)?;
                    self.fs().emit(Opcode::LoadConst, slot, idx, 0, line);
                }
                Ok((Place::Temp(slot), false))
            }
            Token::FloatLiteral(f) => {
                self.advance();
                let slot = self.fs().alloc_slot(line)?;
                let idx = self.fs().add_const(Constant::Float(f), line)?;
                self.fs().emit(Opcode::LoadConst, slot, idx, 0, line);
                Ok((Place::Temp(slot), false))
            }
            Token::StringLiteral(s) => {
                self.advance();
                let slot = self.fs().alloc_slot(line)?;
                let idx = self.string_const(&s, line)?;
                self.fs().emit(Opcode::LoadConst, slot, idx, 0, line);
                Ok((Place::Temp(slot), true))
            }
            Token::True | Token::False => {
                let truth = self.advance() == Token::True;
                let slot = self.fs().alloc_slot(line)?;
                self.fs().emit(Opcode::LoadBool, slot, 0, truth as u8, line);
                Ok((Place::Temp(slot), false))
            }
            Token::Null => {
                self.advance();
                let slot = self.fs().alloc_slot(line)?;
                self.fs().emit(Opcode::LoadNull, slot, 0, 0, line);
                Ok((Place::Temp(slot), false))
            }
            Token::This => {
                self.advance();
                // The receiver reads from slot 0 but is not assignable.
                Ok((Place::Temp(0), false))
            }
            Token::Base => {
                self.advance();
                self.expect(Token::Dot, "after 'base'")?;
                let line = self.line();
                let name = self.expect_identifier("after 'base.'")?;
                let name = self.string_const(&name, line)?;
                Ok((Place::BaseMember { name }, false))
            }
            Token::Identifier(name) => {
                self.advance();
                let place = self.resolve_variable(&name)?;
                Ok((place, false))
            }
            Token::Function => {
                self.advance();
                let slot = self.fs().alloc_slot(line)?;
                let proto = self.compile_function_body("<anonymous>")?;
                self.fs().emit(Opcode::MakeClosure, slot, proto, 0, line);
                Ok((Place::Temp(slot), false))
            }
            Token::LBrace => {
                self.advance();
                let slot = self.compile_table_literal()?;
                Ok((Place::Temp(slot), false))
            }
            Token::LBracket => {
                self.advance();
                let slot = self.compile_array_literal()?;
                Ok((Place::Temp(slot), false))
            }
            Token::LParen => {
                self.advance();
                let slot = self.fs().alloc_slot(line)?;
                self.compile_expr(slot)?;
                self.expect(Token::RParen, "after expression")?;
                Ok((Place::Temp(slot), false))
            }
            other => {
                let found = other.describe();
                Err(self.syntax_error(&format!("expected expression, found {found}")))
            }
        }
    }

    /// `{ name = expr, [expr] = expr, ... }`, already past the brace.
    fn compile_table_literal(&mut self) -> Result<u8, CompileError> {
        let line = self.line();
        let table = self.fs().alloc_slot(line)?;
        self.fs().emit(Opcode::NewTable, table, 0, 0, line);
        while !self.check(&Token::RBrace) {
            let line = self.line();
            let key = self.fs().alloc_slot(line)?;
            if self.eat(&Token::LBracket) {
                self.compile_expr(key)?;
                self.expect(Token::RBracket, "after table key expression")?;
            } else {
                let name = self.expect_identifier("as table key")?;
                let idx = self.string_const(&name, line)?;
                self.fs().emit(Opcode::LoadConst, key, idx, 0, line);
            }
            self.expect(Token::Assign, "after table key")?;
            let value = self.fs().alloc_slot(line)?;
            self.compile_expr(value)?;
            self.fs().emit(Opcode::SetIndex, table, key as i32, value, line);
            self.fs().free_to(key);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace, "to close table literal")?;
        Ok(table)
    }

    /// `[e1, e2, ...]`, already past the bracket. Elements are evaluated
    /// into consecutive slots so `NewArray` can take them in one sweep.
    fn compile_array_literal(&mut self) -> Result<u8, CompileError> {
        let line = self.line();
        let array = self.fs().alloc_slot(line)?;
        let first = self.fs().top_slot();
        let mut count: i32 = 0;
        while !self.check(&Token::RBracket) {
            let line = self.line();
            let slot = self.fs().alloc_slot(line)?;
            self.compile_expr(slot)?;
            count += 1;
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBracket, "to close array literal")?;
        let line = self.line();
        self.fs().emit(Opcode::NewArray, array, count, first, line);
        self.fs().free_to(first);
        Ok(array)
    }

    // ===== Place access =====

    /// Emit a read of `place` into `dest`.
    pub(crate) fn load_place(&mut self, place: &Place, dest: u8, line: u32) {
        match *place {
            Place::Temp(s) | Place::Local(s) => {
                if s != dest {
                    self.fs().emit(Opcode::Move, dest, 0, s, line);
                }
            }
            Place::Upvalue(i) => {
                self.fs().emit(Opcode::GetUpval, dest, i as i32, 0, line);
            }
            Place::Global(name) => {
                self.fs().emit(Opcode::GetGlobal, dest, name, 0, line);
            }
            Place::Index { obj, key } => {
                self.fs().emit(Opcode::GetIndex, dest, obj as i32, key, line);
            }
            Place::Member { obj, name } => {
                self.fs().emit(Opcode::GetMember, dest, name, obj, line);
            }
            Place::BaseMember { name } => {
                self.fs().emit(Opcode::GetBase, dest, name, 0, line);
            }
        }
    }

    /// Emit a write of slot `src` into `place`.
    pub(crate) fn store_place(&mut self, place: &Place, src: u8, line: u32) -> Result<(), CompileError> {
        match *place {
            Place::Local(s) => {
                if s != src {
                    self.fs().emit(Opcode::Move, s, 0, src, line);
                }
            }
            Place::Upvalue(i) => {
                self.fs().emit(Opcode::SetUpval, src, i as i32, 0, line);
            }
            Place::Global(name) => {
                self.fs().emit(Opcode::SetGlobal, src, name, 0, line);
            }
            Place::Index { obj, key } => {
                self.fs().emit(Opcode::SetIndex, obj, key as i32, src, line);
            }
            Place::Member { obj, name } => {
                self.fs().emit(Opcode::SetMember, obj, name, src, line);
            }
            Place::Temp(_) | Place::BaseMember { .. } => {
                return Err(CompileError::InvalidAssignmentTarget { line });
            }
        }
        Ok(())
    }

    /// Pin a place's object into a readable slot for further suffixes.
    fn place_to_slot(&mut self, place: Place, line: u32) -> Result<u8, CompileError> {
        match place {
            Place::Temp(s) | Place::Local(s) => Ok(s),
            other => {
                let slot = self.fs().alloc_slot(line)?;
                self.load_place(&other, slot, line);
                Ok(slot)
            }
        }
    }
}

/// Binary operator precedence (higher binds tighter) and opcode.
/// `&&`/`||` carry a placeholder opcode; they branch instead.
fn binary_op(token: &Token) -> Option<(u8, Opcode)> {
    match token {
        Token::OrOr => Some((1, Opcode::Nop)),
        Token::AndAnd => Some((2, Opcode::Nop)),
        Token::Pipe => Some((3, Opcode::BitOr)),
        Token::Caret => Some((4, Opcode::BitXor)),
        Token::Amp => Some((5, Opcode::BitAnd)),
        Token::EqEq => Some((6, Opcode::Eq)),
        Token::NotEq => Some((6, Opcode::Ne)),
        Token::Less => Some((7, Opcode::Lt)),
        Token::LessEq => Some((7, Opcode::Le)),
        Token::Greater => Some((7, Opcode::Gt)),
        Token::GreaterEq => Some((7, Opcode::Ge)),
        Token::ShiftLeft => Some((8, Opcode::Shl)),
        Token::ShiftRight => Some((8, Opcode::Shr)),
        Token::Plus => Some((9, Opcode::Add)),
        Token::Minus => Some((9, Opcode::Sub)),
        Token::Star => Some((10, Opcode::Mul)),
        Token::Slash => Some((10, Opcode::Div)),
        Token::Percent => Some((10, Opcode::Mod)),
        _ => None,
    }
}
