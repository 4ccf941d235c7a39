//! Per-function compile state.
//!
//! One `FuncState` exists for every function being compiled, nested
//! lexically like the functions themselves. It owns the scoped local symbol
//! table, the upvalue list, the deduplicating constant pool, and the
//! instruction buffer with its pending-jump patch positions.

use rustc_hash::FxHashMap;

use crate::bytecode::{CaptureSource, Constant, Instr, LineInfo, LocalInfo, Opcode};
use crate::compiler::error::CompileError;

/// Hard limit on frame slots: slot operands are `u8`.
pub(crate) const MAX_SLOTS: u16 = 255;
/// Hard limit on constant-pool entries per function.
pub(crate) const MAX_CONSTANTS: usize = 65_535;

/// A declared local variable.
pub(crate) struct LocalVar {
    pub name: String,
    pub depth: u32,
    pub slot: u8,
    pub captured: bool,
    pub start_ip: u32,
}

/// An upvalue of the function being compiled.
pub(crate) struct UpvalEntry {
    pub name: String,
    pub source: CaptureSource,
}

/// What a `break`/`continue` may currently target.
#[derive(PartialEq, Eq, Clone, Copy)]
pub(crate) enum LoopKind {
    /// `while` / `for` / `foreach`: both break and continue bind here.
    Loop,
    /// `switch`: break binds here, continue skips past it.
    Switch,
}

/// Patch bookkeeping for one enclosing loop or switch.
pub(crate) struct LoopCtx {
    pub kind: LoopKind,
    /// Forward jumps to the end, patched when the end is known.
    pub break_jumps: Vec<usize>,
    /// Backward target for `continue`. Every loop form knows this position
    /// before its body compiles; `switch` carries no continue target.
    pub continue_target: usize,
    /// First slot belonging to the construct; break/continue close upvalues
    /// at or above it before jumping out.
    pub slot_floor: u8,
    /// Trap depth at loop entry; break/continue pop traps opened inside
    /// the loop body before jumping out.
    pub trap_floor: u32,
}

/// Constant-pool dedup key. Floats key by bit pattern.
#[derive(PartialEq, Eq, Hash)]
enum ConstKey {
    Int(i64),
    Float(u64),
    Str(String),
}

/// Compile state for one function scope.
pub(crate) struct FuncState {
    pub name: String,
    pub params: u8,
    pub is_generator: bool,
    pub code: Vec<Instr>,
    pub lines: Vec<LineInfo>,
    last_line: u32,
    pub constants: Vec<Constant>,
    const_map: FxHashMap<ConstKey, usize>,
    pub locals: Vec<LocalVar>,
    pub scope_depth: u32,
    free_slot: u16,
    pub stack_size: u8,
    pub upvalues: Vec<UpvalEntry>,
    pub loops: Vec<LoopCtx>,
    /// Number of traps currently open at the point being compiled.
    pub trap_depth: u32,
    pub debug_locals: Vec<LocalInfo>,
}

impl FuncState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: 0,
            is_generator: false,
            code: Vec::new(),
            lines: Vec::new(),
            last_line: 0,
            constants: Vec::new(),
            const_map: FxHashMap::default(),
            locals: Vec::new(),
            scope_depth: 0,
            free_slot: 0,
            stack_size: 0,
            upvalues: Vec::new(),
            loops: Vec::new(),
            trap_depth: 0,
            debug_locals: Vec::new(),
        }
    }

    // ===== Emission =====

    /// Append an instruction, recording the source line. Returns its
    /// position.
    pub fn emit(&mut self, op: Opcode, a: u8, b: i32, c: u8, line: u32) -> usize {
        if line != self.last_line {
            self.lines.push(LineInfo { ip: self.code.len() as u32, line });
            self.last_line = line;
        }
        self.code.push(Instr::new(op, a, b, c));
        self.code.len() - 1
    }

    /// Emit a jump with a placeholder offset; patch later with
    /// [`patch_jump`](Self::patch_jump).
    pub fn emit_jump(&mut self, op: Opcode, a: u8, line: u32) -> usize {
        self.emit(op, a, 0, 0, line)
    }

    /// Point the jump at `pos` to the next instruction to be emitted.
    pub fn patch_jump(&mut self, pos: usize) {
        let target = self.code.len() as i32;
        self.code[pos].b = target - (pos as i32 + 1);
    }

    /// Emit a backward jump to an already-known position.
    pub fn emit_jump_to(&mut self, op: Opcode, a: u8, target: usize, line: u32) {
        let pos = self.code.len() as i32;
        self.emit(op, a, target as i32 - (pos + 1), 0, line);
    }

    /// Current emission position (the target for backward jumps).
    pub fn here(&self) -> usize {
        self.code.len()
    }

    // ===== Constants =====

    /// Intern a constant, deduplicating identical literals.
    pub fn add_const(&mut self, constant: Constant, line: u32) -> Result<i32, CompileError> {
        let key = match &constant {
            Constant::Int(i) => Some(ConstKey::Int(*i)),
            Constant::Float(f) => Some(ConstKey::Float(f.to_bits())),
            Constant::Str(s) => Some(ConstKey::Str(s.as_str().to_string())),
            Constant::Proto(_) => None,
        };
        if let Some(key) = &key {
            if let Some(&idx) = self.const_map.get(key) {
                return Ok(idx as i32);
            }
        }
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(CompileError::TooManyConstants { line });
        }
        let idx = self.constants.len();
        self.constants.push(constant);
        if let Some(key) = key {
            self.const_map.insert(key, idx);
        }
        Ok(idx as i32)
    }

    // ===== Slots =====

    /// Reserve the next free stack slot.
    pub fn alloc_slot(&mut self, line: u32) -> Result<u8, CompileError> {
        if self.free_slot >= MAX_SLOTS {
            return Err(CompileError::TooManyLocals { line });
        }
        let slot = self.free_slot as u8;
        self.free_slot += 1;
        if self.free_slot as u8 > self.stack_size {
            self.stack_size = self.free_slot as u8;
        }
        Ok(slot)
    }

    /// Release temporaries down to `slot`.
    pub fn free_to(&mut self, slot: u8) {
        debug_assert!(self.free_slot >= slot as u16);
        self.free_slot = slot as u16;
    }

    /// The next slot that would be allocated.
    pub fn top_slot(&self) -> u8 {
        self.free_slot as u8
    }

    // ===== Locals & scopes =====

    /// Declare a local in the current scope. Shadowing an outer scope is
    /// allowed; a duplicate within the same scope is a compile error.
    pub fn declare_local(&mut self, name: &str, line: u32) -> Result<u8, CompileError> {
        let slot = self.alloc_slot(line)?;
        self.bind_local(name, slot, line)?;
        Ok(slot)
    }

    /// Bind `name` to an already-allocated slot. Lets `local x = expr`
    /// evaluate the initializer into the slot before the name is visible.
    pub fn bind_local(&mut self, name: &str, slot: u8, line: u32) -> Result<(), CompileError> {
        for local in self.locals.iter().rev() {
            if local.depth < self.scope_depth {
                break;
            }
            if local.name == name {
                return Err(CompileError::DuplicateLocal { name: name.to_string(), line });
            }
        }
        self.locals.push(LocalVar {
            name: name.to_string(),
            depth: self.scope_depth,
            slot,
            captured: false,
            start_ip: self.code.len() as u32,
        });
        Ok(())
    }

    /// Resolve a name to a visible local slot.
    pub fn resolve_local(&self, name: &str) -> Option<u8> {
        self.locals.iter().rev().find(|l| l.name == name).map(|l| l.slot)
    }

    /// Mark the local occupying `slot` as captured by a closure.
    pub fn mark_captured(&mut self, slot: u8) {
        if let Some(local) = self.locals.iter_mut().rev().find(|l| l.slot == slot) {
            local.captured = true;
        }
    }

    pub fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Leave the current scope: retire its locals (recording debug ranges),
    /// close any captured cells, and release their slots.
    pub fn end_scope(&mut self, line: u32) {
        self.scope_depth -= 1;
        let mut lowest_slot: Option<u8> = None;
        let mut lowest_captured: Option<u8> = None;
        while let Some(local) = self.locals.last() {
            if local.depth <= self.scope_depth {
                break;
            }
            let local = self.locals.pop().unwrap();
            if !local.name.starts_with('(') {
                self.debug_locals.push(LocalInfo {
                    name: local.name.clone(),
                    slot: local.slot,
                    start_ip: local.start_ip,
                    end_ip: self.code.len() as u32,
                });
            }
            if local.captured {
                lowest_captured = Some(local.slot.min(lowest_captured.unwrap_or(u8::MAX)));
            }
            lowest_slot = Some(local.slot.min(lowest_slot.unwrap_or(u8::MAX)));
        }
        if let Some(slot) = lowest_captured {
            self.emit(Opcode::CloseUpvals, slot, 0, 0, line);
        }
        if let Some(slot) = lowest_slot {
            self.free_to(slot);
        }
    }

    /// Retire every remaining local at end of function (debug records).
    pub fn finish_locals(&mut self) {
        let end_ip = self.code.len() as u32;
        for local in self.locals.drain(..) {
            if !local.name.starts_with('(') {
                self.debug_locals.push(LocalInfo {
                    name: local.name,
                    slot: local.slot,
                    start_ip: local.start_ip,
                    end_ip,
                });
            }
        }
    }

    // ===== Upvalues =====

    /// Register an upvalue capture, deduplicating repeated references.
    pub fn add_upvalue(&mut self, name: &str, source: CaptureSource) -> u8 {
        for (i, up) in self.upvalues.iter().enumerate() {
            if up.source == source {
                return i as u8;
            }
        }
        self.upvalues.push(UpvalEntry { name: name.to_string(), source });
        (self.upvalues.len() - 1) as u8
    }

    /// Find an already-registered upvalue by name.
    pub fn resolve_upvalue_name(&self, name: &str) -> Option<u8> {
        self.upvalues.iter().position(|u| u.name == name).map(|i| i as u8)
    }
}
