//! Statement compilation.
//!
//! Control flow compiles in a single pass: forward branches are emitted with
//! placeholder offsets and patched once their targets are reached. `for`
//! emits its step clause before the body (the clauses parse in source
//! order), with a pair of jumps restoring execution order.

use crate::bytecode::{Constant, Opcode};
use crate::compiler::error::CompileError;
use crate::compiler::func_state::{LoopCtx, LoopKind};
use crate::compiler::token::Token;
use crate::compiler::{Compiler, Place};

impl Compiler {
    pub(crate) fn compile_statement(&mut self) -> Result<(), CompileError> {
        match self.peek() {
            Token::Semicolon => {
                self.advance();
            }
            Token::Local => self.compile_local()?,
            Token::Function => self.compile_function_decl()?,
            Token::Class => self.compile_class_decl()?,
            Token::If => self.compile_if()?,
            Token::While => self.compile_while()?,
            Token::For => self.compile_for()?,
            Token::Foreach => self.compile_foreach()?,
            Token::Switch => self.compile_switch()?,
            Token::Break => self.compile_break()?,
            Token::Continue => self.compile_continue()?,
            Token::Return => self.compile_return()?,
            Token::Yield => self.compile_yield()?,
            Token::Try => self.compile_try()?,
            Token::Throw => self.compile_throw()?,
            Token::LBrace => {
                self.advance();
                let line = self.line();
                self.fs().begin_scope();
                self.compile_block()?;
                self.fs().end_scope(line);
            }
            _ => self.compile_expr_statement()?,
        }
        self.eat(&Token::Semicolon);
        Ok(())
    }

    /// Statements up to (and consuming) the closing brace.
    fn compile_block(&mut self) -> Result<(), CompileError> {
        while !self.check(&Token::RBrace) && !self.check(&Token::Eof) {
            self.compile_statement()?;
        }
        self.expect(Token::RBrace, "to close block")?;
        Ok(())
    }

    // ===== Declarations =====

    /// `local a = expr, b, c = expr`
    fn compile_local(&mut self) -> Result<(), CompileError> {
        self.advance();
        loop {
            let line = self.line();
            let name = self.expect_identifier("after 'local'")?;
            let slot = self.fs().alloc_slot(line)?;
            if self.eat(&Token::Assign) {
                // The initializer runs before the name is visible, so
                // `local x = x` reads the outer x.
                self.compile_expr(slot)?;
            } else {
                self.fs().emit(Opcode::LoadNull, slot, 0, 0, line);
            }
            self.fs().bind_local(&name, slot, line)?;
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(())
    }

    /// `function name(params) { ... }`: a root-table slot at the top level,
    /// a local everywhere else (visible to its own body for recursion).
    fn compile_function_decl(&mut self) -> Result<(), CompileError> {
        self.advance();
        let line = self.line();
        let name = self.expect_identifier("after 'function'")?;
        if self.at_top_level() {
            let slot = self.fs().alloc_slot(line)?;
            let proto = self.compile_function_body(&name)?;
            self.fs().emit(Opcode::MakeClosure, slot, proto, 0, line);
            let name_const = self.string_const(&name, line)?;
            self.fs().emit(Opcode::SetGlobal, slot, name_const, 0, line);
            self.fs().free_to(slot);
        } else {
            let slot = self.fs().declare_local(&name, line)?;
            let proto = self.compile_function_body(&name)?;
            self.fs().emit(Opcode::MakeClosure, slot, proto, 0, line);
        }
        Ok(())
    }

    /// Parse `(params) { body }` into a prototype and intern it in the
    /// enclosing function's constant pool.
    pub(crate) fn compile_function_body(&mut self, name: &str) -> Result<i32, CompileError> {
        self.expect(Token::LParen, "to open parameter list")?;
        self.push_state(name)?;
        if !self.check(&Token::RParen) {
            loop {
                let line = self.line();
                let param = self.expect_identifier("as parameter name")?;
                self.fs().declare_local(&param, line)?;
                self.fs().params += 1;
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "after parameters")?;
        self.expect(Token::LBrace, "to open function body")?;
        self.compile_block()?;
        self.emit_return_null();
        let proto = self.pop_state();
        let line = self.line();
        self.fs().add_const(Constant::Proto(proto), line)
    }

    /// `class Name extends Base { field = expr  function m(p) {}  constructor(p) {} }`
    fn compile_class_decl(&mut self) -> Result<(), CompileError> {
        self.advance();
        let line = self.line();
        let name = self.expect_identifier("after 'class'")?;
        let top_level = self.at_top_level();
        let slot = if top_level {
            self.fs().alloc_slot(line)?
        } else {
            self.fs().declare_local(&name, line)?
        };
        let name_const = self.string_const(&name, line)?;
        let base_slot = if self.eat(&Token::Extends) {
            let line = self.line();
            let base = self.fs().alloc_slot(line)?;
            self.compile_expr(base)?;
            base
        } else {
            u8::MAX
        };
        self.fs().emit(Opcode::NewClass, slot, name_const, base_slot, line);
        if base_slot != u8::MAX {
            self.fs().free_to(base_slot);
        }

        self.expect(Token::LBrace, "to open class body")?;
        while !self.check(&Token::RBrace) {
            let line = self.line();
            match self.peek().clone() {
                Token::Constructor => {
                    self.advance();
                    self.compile_method(slot, "constructor", line)?;
                }
                Token::Function => {
                    self.advance();
                    let method = self.expect_identifier("as method name")?;
                    self.compile_method(slot, &method, line)?;
                }
                Token::Identifier(field) => {
                    self.advance();
                    self.expect(Token::Assign, "after field name")?;
                    let field_const = self.string_const(&field, line)?;
                    let value = self.fs().alloc_slot(line)?;
                    self.compile_expr(value)?;
                    self.fs().emit(Opcode::ClassField, slot, field_const, value, line);
                    self.fs().free_to(value);
                    self.eat(&Token::Semicolon);
                }
                other => {
                    let found = other.describe();
                    return Err(self.syntax_error(&format!(
                        "expected class member, found {found}"
                    )));
                }
            }
        }
        self.expect(Token::RBrace, "to close class body")?;

        if top_level {
            self.fs().emit(Opcode::SetGlobal, slot, name_const, 0, line);
            self.fs().free_to(slot);
        }
        Ok(())
    }

    fn compile_method(&mut self, class_slot: u8, name: &str, line: u32) -> Result<(), CompileError> {
        let name_const = self.string_const(name, line)?;
        let closure = self.fs().alloc_slot(line)?;
        let proto = self.compile_function_body(name)?;
        self.fs().emit(Opcode::MakeClosure, closure, proto, 0, line);
        self.fs().emit(Opcode::ClassMethod, class_slot, name_const, closure, line);
        self.fs().free_to(closure);
        Ok(())
    }

    fn at_top_level(&self) -> bool {
        self.states.len() == 1 && self.fs_ref().scope_depth == 0
    }

    // ===== Control flow =====

    fn compile_if(&mut self) -> Result<(), CompileError> {
        self.advance();
        let line = self.line();
        self.expect(Token::LParen, "after 'if'")?;
        let cond = self.fs().alloc_slot(line)?;
        self.compile_expr(cond)?;
        self.expect(Token::RParen, "after condition")?;
        let line = self.line();
        let jump_false = self.fs().emit_jump(Opcode::JumpIfFalse, cond, line);
        self.fs().free_to(cond);
        self.compile_statement()?;
        if self.eat(&Token::Else) {
            let line = self.line();
            let jump_end = self.fs().emit_jump(Opcode::Jump, 0, line);
            self.fs().patch_jump(jump_false);
            self.compile_statement()?;
            self.fs().patch_jump(jump_end);
        } else {
            self.fs().patch_jump(jump_false);
        }
        Ok(())
    }

    fn compile_while(&mut self) -> Result<(), CompileError> {
        self.advance();
        let line = self.line();
        let loop_start = self.fs().here();
        self.expect(Token::LParen, "after 'while'")?;
        let cond = self.fs().alloc_slot(line)?;
        self.compile_expr(cond)?;
        self.expect(Token::RParen, "after condition")?;
        let line = self.line();
        let exit = self.fs().emit_jump(Opcode::JumpIfFalse, cond, line);
        self.fs().free_to(cond);

        let floor = self.fs().top_slot();
        let trap_floor = self.fs_ref().trap_depth;
        self.fs().loops.push(LoopCtx {
            kind: LoopKind::Loop,
            break_jumps: Vec::new(),
            continue_target: loop_start,
            slot_floor: floor,
            trap_floor,
        });
        self.compile_statement()?;
        let line = self.line();
        self.fs().emit_jump_to(Opcode::Jump, 0, loop_start, line);
        self.fs().patch_jump(exit);
        self.finish_loop();
        Ok(())
    }

    /// `for (init; cond; step) body`. The step clause is emitted before the
    /// body; jumps restore execution order (cond, body, step, cond, ...).
    fn compile_for(&mut self) -> Result<(), CompileError> {
        self.advance();
        self.expect(Token::LParen, "after 'for'")?;
        self.fs().begin_scope();

        if !self.check(&Token::Semicolon) {
            if self.check(&Token::Local) {
                self.compile_local()?;
            } else {
                self.compile_expr_statement()?;
            }
        }
        self.expect(Token::Semicolon, "after for-loop initializer")?;

        let cond_start = self.fs().here();
        let mut exit = None;
        if !self.check(&Token::Semicolon) {
            let line = self.line();
            let cond = self.fs().alloc_slot(line)?;
            self.compile_expr(cond)?;
            exit = Some(self.fs().emit_jump(Opcode::JumpIfFalse, cond, line));
            self.fs().free_to(cond);
        }
        self.expect(Token::Semicolon, "after for-loop condition")?;

        let line = self.line();
        let body_jump = self.fs().emit_jump(Opcode::Jump, 0, line);
        let step_start = self.fs().here();
        if !self.check(&Token::RParen) {
            self.compile_expr_statement()?;
        }
        let line = self.line();
        self.fs().emit_jump_to(Opcode::Jump, 0, cond_start, line);
        self.expect(Token::RParen, "after for-loop clauses")?;
        self.fs().patch_jump(body_jump);

        let floor = self.fs().top_slot();
        let trap_floor = self.fs_ref().trap_depth;
        self.fs().loops.push(LoopCtx {
            kind: LoopKind::Loop,
            break_jumps: Vec::new(),
            continue_target: step_start,
            slot_floor: floor,
            trap_floor,
        });
        self.compile_statement()?;
        let line = self.line();
        self.fs().emit_jump_to(Opcode::Jump, 0, step_start, line);
        if let Some(exit) = exit {
            self.fs().patch_jump(exit);
        }
        self.finish_loop();

        let line = self.line();
        self.fs().end_scope(line);
        Ok(())
    }

    /// `foreach (k, v in expr)` / `foreach (v in expr)`. Iteration state
    /// lives in three hidden locals below the user variables.
    fn compile_foreach(&mut self) -> Result<(), CompileError> {
        self.advance();
        self.expect(Token::LParen, "after 'foreach'")?;
        let first = self.expect_identifier("as foreach variable")?;
        let (key_name, value_name) = if self.eat(&Token::Comma) {
            let value = self.expect_identifier("as foreach value variable")?;
            (first, value)
        } else {
            ("(key)".to_string(), first)
        };
        self.expect(Token::In, "in foreach")?;

        self.fs().begin_scope();
        let line = self.line();
        let container = self.fs().declare_local("(container)", line)?;
        self.compile_expr(container)?;
        self.fs().declare_local("(state)", line)?;
        self.fs().declare_local("(index)", line)?;
        self.fs().declare_local(&key_name, line)?;
        self.fs().declare_local(&value_name, line)?;
        self.expect(Token::RParen, "after foreach clause")?;

        let line = self.line();
        self.fs().emit(Opcode::ForeachPrep, container, 0, 0, line);
        let loop_start = self.fs().here();
        let next = self.fs().emit_jump(Opcode::ForeachNext, container, line);

        let trap_floor = self.fs_ref().trap_depth;
        self.fs().loops.push(LoopCtx {
            kind: LoopKind::Loop,
            break_jumps: Vec::new(),
            continue_target: loop_start,
            slot_floor: container,
            trap_floor,
        });
        self.compile_statement()?;
        let line = self.line();
        self.fs().emit_jump_to(Opcode::Jump, 0, loop_start, line);
        self.fs().patch_jump(next);
        self.finish_loop();

        let line = self.line();
        self.fs().end_scope(line);
        Ok(())
    }

    /// `switch (expr) { case e: ... default: ... }`. Arms never fall
    /// through; `default`, when present, must be the last arm.
    fn compile_switch(&mut self) -> Result<(), CompileError> {
        self.advance();
        let line = self.line();
        self.expect(Token::LParen, "after 'switch'")?;
        let subject = self.fs().alloc_slot(line)?;
        self.compile_expr(subject)?;
        self.expect(Token::RParen, "after switch subject")?;
        self.expect(Token::LBrace, "to open switch body")?;

        let trap_floor = self.fs_ref().trap_depth;
        self.fs().loops.push(LoopCtx {
            kind: LoopKind::Switch,
            break_jumps: Vec::new(),
            continue_target: 0,
            slot_floor: subject,
            trap_floor,
        });
        let mut prev_fail: Option<usize> = None;
        let mut saw_default = false;
        while !self.check(&Token::RBrace) {
            let line = self.line();
            if self.eat(&Token::Case) {
                if saw_default {
                    return Err(self.syntax_error("'default' must be the last switch arm"));
                }
                if let Some(fail) = prev_fail.take() {
                    self.fs().patch_jump(fail);
                }
                let probe = self.fs().alloc_slot(line)?;
                self.compile_expr(probe)?;
                self.expect(Token::Colon, "after case value")?;
                let line = self.line();
                self.fs().emit(Opcode::Eq, probe, subject as i32, probe, line);
                prev_fail = Some(self.fs().emit_jump(Opcode::JumpIfFalse, probe, line));
                self.fs().free_to(probe);
                self.compile_switch_arm_body()?;
                // Arms never fall through.
                let line = self.line();
                let out = self.fs().emit_jump(Opcode::Jump, 0, line);
                self.fs().loops.last_mut().unwrap().break_jumps.push(out);
            } else if self.eat(&Token::Default) {
                if saw_default {
                    return Err(self.syntax_error("duplicate 'default' arm"));
                }
                saw_default = true;
                self.expect(Token::Colon, "after 'default'")?;
                if let Some(fail) = prev_fail.take() {
                    self.fs().patch_jump(fail);
                }
                self.compile_switch_arm_body()?;
            } else {
                let found = self.peek().describe();
                return Err(self.syntax_error(&format!(
                    "expected 'case' or 'default' in switch body, found {found}"
                )));
            }
        }
        self.expect(Token::RBrace, "to close switch body")?;
        if let Some(fail) = prev_fail {
            self.fs().patch_jump(fail);
        }
        self.finish_loop();
        self.fs().free_to(subject);
        Ok(())
    }

    fn compile_switch_arm_body(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Token::Case | Token::Default | Token::RBrace | Token::Eof => break,
                _ => self.compile_statement()?,
            }
        }
        Ok(())
    }

    /// Patch break jumps and pop the loop context.
    fn finish_loop(&mut self) {
        let ctx = self.fs().loops.pop().unwrap();
        for jump in ctx.break_jumps {
            self.fs().patch_jump(jump);
        }
    }

    fn compile_break(&mut self) -> Result<(), CompileError> {
        let line = self.line();
        self.advance();
        let Some(ctx) = self.fs_ref().loops.last() else {
            return Err(CompileError::BreakOutsideLoop { line });
        };
        let (floor, trap_floor) = (ctx.slot_floor, ctx.trap_floor);
        // Jumping out of the construct abandons any traps opened inside it.
        for _ in trap_floor..self.fs_ref().trap_depth {
            self.fs().emit(Opcode::PopTrap, 0, 0, 0, line);
        }
        self.fs().emit(Opcode::CloseUpvals, floor, 0, 0, line);
        let jump = self.fs().emit_jump(Opcode::Jump, 0, line);
        self.fs().loops.last_mut().unwrap().break_jumps.push(jump);
        Ok(())
    }

    fn compile_continue(&mut self) -> Result<(), CompileError> {
        let line = self.line();
        self.advance();
        // continue binds to the innermost loop, skipping switches
        let Some(ctx) = self.fs_ref().loops.iter().rev().find(|c| c.kind == LoopKind::Loop)
        else {
            return Err(CompileError::ContinueOutsideLoop { line });
        };
        let (floor, target, trap_floor) = (ctx.slot_floor, ctx.continue_target, ctx.trap_floor);
        for _ in trap_floor..self.fs_ref().trap_depth {
            self.fs().emit(Opcode::PopTrap, 0, 0, 0, line);
        }
        self.fs().emit(Opcode::CloseUpvals, floor, 0, 0, line);
        self.fs().emit_jump_to(Opcode::Jump, 0, target, line);
        Ok(())
    }

    fn compile_return(&mut self) -> Result<(), CompileError> {
        let line = self.line();
        self.advance();
        if self.ends_statement() {
            self.fs().emit(Opcode::Return, 0, 0, 1, line);
        } else {
            let slot = self.fs().alloc_slot(line)?;
            self.compile_expr(slot)?;
            self.fs().emit(Opcode::Return, slot, 0, 0, line);
            self.fs().free_to(slot);
        }
        Ok(())
    }

    fn compile_yield(&mut self) -> Result<(), CompileError> {
        let line = self.line();
        self.advance();
        self.fs().is_generator = true;
        if self.ends_statement() {
            self.fs().emit(Opcode::Yield, 0, 0, 1, line);
        } else {
            let slot = self.fs().alloc_slot(line)?;
            self.compile_expr(slot)?;
            self.fs().emit(Opcode::Yield, slot, 0, 0, line);
            self.fs().free_to(slot);
        }
        Ok(())
    }

    fn ends_statement(&self) -> bool {
        matches!(
            self.peek(),
            Token::Semicolon | Token::RBrace | Token::Eof | Token::Case | Token::Default
        )
    }

    /// `try stmt catch (name) stmt`
    fn compile_try(&mut self) -> Result<(), CompileError> {
        let line = self.line();
        self.advance();
        // The trap scope holds the hidden error slot the VM writes into.
        self.fs().begin_scope();
        let err_slot = self.fs().declare_local("(trap)", line)?;
        let trap = self.fs().emit_jump(Opcode::PushTrap, err_slot, line);
        self.fs().trap_depth += 1;
        self.compile_statement()?;
        let line = self.line();
        self.fs().emit(Opcode::PopTrap, 0, 0, 0, line);
        self.fs().trap_depth -= 1;
        let done = self.fs().emit_jump(Opcode::Jump, 0, line);

        self.fs().patch_jump(trap);
        self.expect(Token::Catch, "after try block")?;
        self.expect(Token::LParen, "after 'catch'")?;
        let line = self.line();
        let name = self.expect_identifier("as catch variable")?;
        self.expect(Token::RParen, "after catch variable")?;
        self.fs().begin_scope();
        let var = self.fs().declare_local(&name, line)?;
        self.fs().emit(Opcode::Move, var, 0, err_slot, line);
        self.compile_statement()?;
        let line = self.line();
        self.fs().end_scope(line);

        self.fs().patch_jump(done);
        self.fs().end_scope(line);
        Ok(())
    }

    fn compile_throw(&mut self) -> Result<(), CompileError> {
        let line = self.line();
        self.advance();
        let slot = self.fs().alloc_slot(line)?;
        self.compile_expr(slot)?;
        self.fs().emit(Opcode::Throw, slot, 0, 0, line);
        self.fs().free_to(slot);
        Ok(())
    }

    // ===== Expression statements & assignment =====

    /// A call, an assignment, or any other expression evaluated for effect.
    fn compile_expr_statement(&mut self) -> Result<(), CompileError> {
        let base = self.fs().top_slot();
        // A leading unary operator rules out an assignment target.
        if matches!(
            self.peek(),
            Token::Minus | Token::Bang | Token::Tilde | Token::Typeof | Token::Resume
        ) {
            let line = self.line();
            let slot = self.fs().alloc_slot(line)?;
            self.compile_expr(slot)?;
            self.fs().free_to(base);
            return Ok(());
        }
        let (place, is_str_lit) = self.compile_prefix()?;
        let line = self.line();
        match self.peek() {
            Token::Assign => {
                self.advance();
                let src = self.fs().alloc_slot(line)?;
                self.compile_expr(src)?;
                self.store_place(&place, src, line)?;
            }
            Token::PlusAssign | Token::MinusAssign | Token::StarAssign | Token::SlashAssign => {
                let op = match self.advance() {
                    Token::PlusAssign => Opcode::Add,
                    Token::MinusAssign => Opcode::Sub,
                    Token::StarAssign => Opcode::Mul,
                    _ => Opcode::Div,
                };
                let cur = self.fs().alloc_slot(line)?;
                self.load_place(&place, cur, line);
                let rhs = self.fs().alloc_slot(line)?;
                self.compile_expr(rhs)?;
                self.fs().emit(op, cur, cur as i32, rhs, line);
                self.store_place(&place, cur, line)?;
            }
            _ => {
                // Not an assignment: materialize (a missing global is still
                // an error) and finish any trailing binary operators.
                let slot = match place {
                    // Slot 0 is the receiver; never reuse it as scratch.
                    Place::Temp(s) if s != 0 => s,
                    other => {
                        let slot = self.fs().alloc_slot(line)?;
                        self.load_place(&other, slot, line);
                        slot
                    }
                };
                self.continue_binary(slot, 1, is_str_lit)?;
            }
        }
        self.fs().free_to(base);
        Ok(())
    }
}
