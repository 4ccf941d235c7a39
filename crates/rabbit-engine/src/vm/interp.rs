//! The dispatch loop.
//!
//! One Rust-level `run_thread` per script thread: resuming a generator
//! recurses into the child's loop, and the child's `yield` unwinds back out
//! of it. Borrows of a thread's `RefCell` are kept short (one fetch, then
//! per-operand accesses) because an instruction may need to touch another
//! thread's stack through an open upvalue cell.

use std::rc::Rc;

use crate::api::NativeCtx;
use crate::bytecode::{CaptureSource, Constant, Opcode};
use crate::object::{
    Array, Class, Closure, ClosureRef, RbString, StringRef, Table, TableKey, Upvalue, UpvalueRef,
    Value,
};
use crate::vm::thread::{CallFrame, Thread, ThreadRef, ThreadState, Trap};
use crate::vm::{Vm, VmError};

/// Deepest script call stack per thread.
const MAX_CALL_DEPTH: usize = 200;
/// Deepest chain of nested resumes.
const MAX_RESUME_DEPTH: usize = 64;
/// Per-thread value stack limit, in slots. Deep stacks of wide frames hit
/// this before the depth limit.
const MAX_STACK: usize = 1 << 15;

/// How a thread's dispatch loop came back to its resumer.
pub(crate) enum Signal {
    /// The bottom frame returned; the thread is done.
    Return(Value),
    /// The thread yielded and can be resumed.
    Yield(Value),
}

/// What one instruction asked the loop to do.
enum Flow {
    Continue,
    Return(Value),
    Yield(Value),
}

fn get_slot(thread: &ThreadRef, index: usize) -> Value {
    thread.borrow().stack.get(index).cloned().unwrap_or(Value::Null)
}

fn set_slot(thread: &ThreadRef, index: usize, value: Value) {
    let mut t = thread.borrow_mut();
    if t.stack.len() <= index {
        t.stack.resize(index + 1, Value::Null);
    }
    t.stack[index] = value;
}

impl Vm {
    /// Build a fresh thread around `closure` and run it to completion.
    pub(crate) fn spawn_and_run(
        &self,
        closure: ClosureRef,
        window: Vec<Value>,
    ) -> Result<Value, VmError> {
        let thread = Thread::new(&self.heap);
        start_frame(&thread, closure, window)?;
        match self.run_thread(&thread)? {
            Signal::Return(v) => Ok(v),
            // Only generator bodies contain Yield, and those always start
            // on their own thread.
            Signal::Yield(v) => Ok(v),
        }
    }

    /// Run `thread` until its bottom frame returns, it yields, or an
    /// uncaught error unwinds it.
    pub(crate) fn run_thread(&self, thread: &ThreadRef) -> Result<Signal, VmError> {
        loop {
            match self.step(thread) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return(v)) => {
                    if let Some(signal) = return_from_frame(thread, v) {
                        return Ok(signal);
                    }
                }
                Ok(Flow::Yield(v)) => {
                    thread.borrow_mut().state = ThreadState::Suspended;
                    return Ok(Signal::Yield(v));
                }
                Err(e) => self.deliver_error(thread, e)?,
            }
        }
    }

    /// Execute one instruction of the thread's top frame.
    fn step(&self, thread: &ThreadRef) -> Result<Flow, VmError> {
        let (closure, base, instr) = {
            let mut t = thread.borrow_mut();
            let Some(frame) = t.frames.last_mut() else {
                return Err(VmError::Native("no active frame".to_string()));
            };
            let Some(&instr) = frame.closure.proto.code.get(frame.ip) else {
                return Ok(Flow::Return(Value::Null));
            };
            frame.ip += 1;
            (frame.closure.clone(), frame.base, instr)
        };
        let (a, b, c) = (instr.a, instr.b, instr.c);
        let da = base + a as usize;

        match instr.op {
            Opcode::Nop => {}

            // ===== Loads & slot moves =====
            Opcode::LoadConst => {
                let v = self
                    .constant(&closure, b)?
                    .to_value()
                    .ok_or_else(|| VmError::Native("prototype used as value".to_string()))?;
                set_slot(thread, da, v);
            }
            Opcode::LoadNull => set_slot(thread, da, Value::Null),
            Opcode::LoadBool => set_slot(thread, da, Value::Bool(c != 0)),
            Opcode::LoadInt => set_slot(thread, da, Value::Int(b as i64)),
            Opcode::Move => {
                let v = get_slot(thread, base + c as usize);
                set_slot(thread, da, v);
            }

            // ===== Arithmetic =====
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                let l = get_slot(thread, base + b as usize);
                let r = get_slot(thread, base + c as usize);
                set_slot(thread, da, self.arith(instr.op, &l, &r)?);
            }
            Opcode::Neg => {
                let v = get_slot(thread, base + c as usize);
                let out = match v {
                    Value::Int(i) => Value::Int(i.wrapping_neg()),
                    Value::Float(f) => Value::Float(-f),
                    other => {
                        return Err(VmError::TypeMismatch(format!(
                            "cannot negate a {}",
                            other.type_name()
                        )))
                    }
                };
                set_slot(thread, da, out);
            }
            Opcode::Concat => {
                let l = get_slot(thread, base + b as usize);
                let r = get_slot(thread, base + c as usize);
                let s = format!("{}{}", l.to_display_string(), r.to_display_string());
                set_slot(thread, da, Value::Str(RbString::new(&self.heap, &s)));
            }

            // ===== Bitwise =====
            Opcode::BitAnd | Opcode::BitOr | Opcode::BitXor | Opcode::Shl | Opcode::Shr => {
                let l = get_slot(thread, base + b as usize);
                let r = get_slot(thread, base + c as usize);
                set_slot(thread, da, bitwise(instr.op, &l, &r)?);
            }
            Opcode::BitNot => {
                let v = get_slot(thread, base + c as usize);
                match v.as_int() {
                    Some(i) => set_slot(thread, da, Value::Int(!i)),
                    None => {
                        return Err(VmError::TypeMismatch(format!(
                            "bitwise operation on a {}",
                            v.type_name()
                        )))
                    }
                }
            }

            // ===== Comparison & logic =====
            Opcode::Eq | Opcode::Ne => {
                let l = get_slot(thread, base + b as usize);
                let r = get_slot(thread, base + c as usize);
                let eq = l.equals(&r);
                set_slot(thread, da, Value::Bool(if instr.op == Opcode::Eq { eq } else { !eq }));
            }
            Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                let l = get_slot(thread, base + b as usize);
                let r = get_slot(thread, base + c as usize);
                let ord = compare(&l, &r)?;
                let res = match instr.op {
                    Opcode::Lt => ord.is_lt(),
                    Opcode::Le => ord.is_le(),
                    Opcode::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                };
                set_slot(thread, da, Value::Bool(res));
            }
            Opcode::Not => {
                let v = get_slot(thread, base + c as usize);
                set_slot(thread, da, Value::Bool(!v.is_truthy()));
            }
            Opcode::TypeOf => {
                let v = get_slot(thread, base + c as usize);
                set_slot(thread, da, Value::Str(RbString::new(&self.heap, v.type_name())));
            }

            // ===== Globals =====
            Opcode::GetGlobal => {
                let name = self.constant_str(&closure, b)?;
                let key = str_key(&name);
                match self.root.borrow().get(&key) {
                    Some(v) => set_slot(thread, da, v),
                    None => {
                        return Err(VmError::UndefinedGlobal(name.as_str().to_string()));
                    }
                }
            }
            Opcode::SetGlobal => {
                let name = self.constant_str(&closure, b)?;
                let v = get_slot(thread, da);
                self.root.borrow_mut().set(str_key(&name), v);
            }

            // ===== Tables, arrays, members =====
            Opcode::NewTable => {
                set_slot(thread, da, Value::Table(Table::new(&self.heap)));
            }
            Opcode::NewArray => {
                let first = base + c as usize;
                let items: Vec<Value> =
                    (0..b as usize).map(|i| get_slot(thread, first + i)).collect();
                set_slot(thread, da, Value::Array(Array::with_items(&self.heap, items)));
            }
            Opcode::GetIndex => {
                let obj = get_slot(thread, base + b as usize);
                let key = get_slot(thread, base + c as usize);
                set_slot(thread, da, get_index(&obj, &key)?);
            }
            Opcode::SetIndex => {
                let obj = get_slot(thread, da);
                let key = get_slot(thread, base + b as usize);
                let v = get_slot(thread, base + c as usize);
                set_index(&obj, key, v)?;
            }
            Opcode::GetMember => {
                let name = self.constant_str(&closure, b)?;
                let obj = get_slot(thread, base + c as usize);
                set_slot(thread, da, get_member(&obj, &name)?);
            }
            Opcode::SetMember => {
                let name = self.constant_str(&closure, b)?;
                let obj = get_slot(thread, da);
                let v = get_slot(thread, base + c as usize);
                set_member(&obj, &name, v)?;
            }

            // ===== Upvalues & closures =====
            Opcode::GetUpval => {
                let cell = upvalue_cell(&closure, b)?;
                set_slot(thread, da, read_upvalue(thread, &cell));
            }
            Opcode::SetUpval => {
                let cell = upvalue_cell(&closure, b)?;
                let v = get_slot(thread, da);
                write_upvalue(thread, &cell, v);
            }
            Opcode::MakeClosure => {
                let proto = match self.constant(&closure, b)? {
                    Constant::Proto(p) => p.clone(),
                    _ => {
                        return Err(VmError::Native("closure over non-prototype".to_string()));
                    }
                };
                let mut cells = Vec::with_capacity(proto.upvalues.len());
                for source in &proto.upvalues {
                    let cell = match *source {
                        CaptureSource::ParentLocal(slot) => {
                            Thread::capture_upvalue(thread, base + slot as usize)
                        }
                        CaptureSource::ParentUpvalue(i) => upvalue_cell(&closure, i as i32)?,
                    };
                    cells.push(cell);
                }
                set_slot(thread, da, Value::Closure(Closure::new(&self.heap, proto, cells)));
            }
            Opcode::CloseUpvals => {
                thread.borrow_mut().close_upvalues(da);
            }

            // ===== Classes =====
            Opcode::NewClass => {
                let name = self.constant_str(&closure, b)?;
                let class_base = if c == u8::MAX {
                    None
                } else {
                    match get_slot(thread, base + c as usize) {
                        Value::Class(cls) => Some(cls),
                        other => {
                            return Err(VmError::TypeMismatch(format!(
                                "'extends' requires a class, got {}",
                                other.type_name()
                            )))
                        }
                    }
                };
                let class = Class::new(&self.heap, name.as_str(), class_base);
                set_slot(thread, da, Value::Class(class));
            }
            Opcode::ClassField => {
                let name = self.constant_str(&closure, b)?;
                let v = get_slot(thread, base + c as usize);
                match get_slot(thread, da) {
                    Value::Class(cls) => cls.borrow_mut().declare_field(name, v),
                    _ => return Err(VmError::Native("field on non-class".to_string())),
                }
            }
            Opcode::ClassMethod => {
                let name = self.constant_str(&closure, b)?;
                let v = get_slot(thread, base + c as usize);
                match (get_slot(thread, da), &v) {
                    (Value::Class(cls), Value::Closure(method)) => {
                        method.set_defining_class(cls.clone());
                        cls.borrow_mut().declare_method(name, v);
                    }
                    _ => return Err(VmError::Native("method on non-class".to_string())),
                }
            }
            Opcode::GetBase => {
                let name = self.constant_str(&closure, b)?;
                let Some(defining) = closure.defining_class() else {
                    return Err(VmError::TypeMismatch(
                        "'base' used outside a method".to_string(),
                    ));
                };
                let Some(parent) = defining.borrow().base() else {
                    return Err(VmError::MissingMember(name.as_str().to_string()));
                };
                match Class::find_method(&parent, &name) {
                    Some(m) => set_slot(thread, da, m),
                    None => return Err(VmError::MissingMember(name.as_str().to_string())),
                }
            }

            // ===== Control flow =====
            Opcode::Jump => {
                jump(thread, b);
            }
            Opcode::JumpIfFalse => {
                if !get_slot(thread, da).is_truthy() {
                    jump(thread, b);
                }
            }
            Opcode::JumpIfTrue => {
                if get_slot(thread, da).is_truthy() {
                    jump(thread, b);
                }
            }

            // ===== Calls & returns =====
            Opcode::Call => {
                self.do_call(thread, base, a, b, c)?;
            }
            Opcode::Return => {
                let v = if c != 0 { Value::Null } else { get_slot(thread, da) };
                return Ok(Flow::Return(v));
            }

            // ===== Generators =====
            Opcode::Yield => {
                let v = if c != 0 { Value::Null } else { get_slot(thread, da) };
                return Ok(Flow::Yield(v));
            }
            Opcode::Resume => {
                let child = match get_slot(thread, base + c as usize) {
                    Value::Thread(t) => t,
                    other => {
                        return Err(VmError::TypeMismatch(format!(
                            "'resume' requires a thread, got {}",
                            other.type_name()
                        )))
                    }
                };
                let v = self.do_resume(thread, &child)?;
                set_slot(thread, da, v);
            }

            // ===== Protected calls =====
            Opcode::PushTrap => {
                let mut t = thread.borrow_mut();
                let frame_index = t.frames.len() - 1;
                let catch_ip = match t.frames.last() {
                    Some(f) => (f.ip as i64 + b as i64) as usize,
                    None => 0,
                };
                t.traps.push(Trap { frame_index, catch_ip, err_slot: a });
            }
            Opcode::PopTrap => {
                thread.borrow_mut().traps.pop();
            }
            Opcode::Throw => {
                return Err(VmError::Thrown(get_slot(thread, da)));
            }

            // ===== Iteration =====
            Opcode::ForeachPrep => {
                foreach_prep(thread, &self.heap, da)?;
            }
            Opcode::ForeachNext => {
                if !foreach_next(thread, da)? {
                    jump(thread, b);
                }
            }
        }
        Ok(Flow::Continue)
    }

    // ===== Calls =====

    fn do_call(
        &self,
        thread: &ThreadRef,
        base: usize,
        a: u8,
        b: i32,
        c: u8,
    ) -> Result<(), VmError> {
        let fpos = base + b as usize;
        let this_pos = fpos + 1;
        let nargs = c as usize;
        let dest = base + a as usize;
        match get_slot(thread, fpos) {
            Value::Closure(closure) => {
                if closure.proto.is_generator {
                    let window = arg_window(thread, this_pos, 1 + nargs);
                    let child = Thread::new_generator(&self.heap, closure, window);
                    set_slot(thread, dest, Value::Thread(child));
                } else {
                    push_frame(thread, closure, this_pos, 1 + nargs, dest, false)?;
                }
            }
            Value::Native(native) => {
                let window = arg_window(thread, this_pos, 1 + nargs);
                let mut ctx = NativeCtx::new(&self.heap, &window);
                let v = (native.func)(&mut ctx)?;
                set_slot(thread, dest, v);
            }
            Value::Class(class) => {
                let instance = Class::instantiate(&self.heap, &class);
                let ctor_name = RbString::new(&self.heap, "constructor");
                match Class::find_method(&class, &ctor_name) {
                    Some(Value::Closure(ctor)) => {
                        set_slot(thread, this_pos, Value::Instance(instance));
                        push_frame(thread, ctor, this_pos, 1 + nargs, dest, true)?;
                    }
                    _ => set_slot(thread, dest, Value::Instance(instance)),
                }
            }
            other => {
                return Err(VmError::NotCallable(other.type_name().to_string()));
            }
        }
        Ok(())
    }

    // ===== Generators =====

    fn do_resume(&self, parent: &ThreadRef, child: &ThreadRef) -> Result<Value, VmError> {
        if Rc::ptr_eq(parent, child) {
            return Err(VmError::ThreadNotResumable);
        }
        let depth = self.resume_depth.get();
        if depth >= MAX_RESUME_DEPTH {
            return Err(VmError::CallDepthExceeded);
        }
        let state = child.borrow().state;
        match state {
            ThreadState::Idle => {
                let pending = child.borrow_mut().pending.take();
                let Some((closure, window)) = pending else {
                    return Err(VmError::ThreadNotResumable);
                };
                start_frame(child, closure, window)?;
            }
            ThreadState::Suspended => {
                child.borrow_mut().state = ThreadState::Running;
            }
            // Running covers resuming an ancestor of the current chain.
            ThreadState::Running | ThreadState::Done | ThreadState::Error => {
                return Err(VmError::ThreadNotResumable);
            }
        }
        self.resume_depth.set(depth + 1);
        let result = self.run_thread(child);
        self.resume_depth.set(depth);
        match result? {
            Signal::Yield(v) | Signal::Return(v) => Ok(v),
        }
    }

    // ===== Errors & traps =====

    /// Render a runtime error as the value a `catch` receives.
    pub(crate) fn error_value(&self, error: &VmError) -> Value {
        match error {
            VmError::Thrown(v) => v.clone(),
            other => Value::Str(RbString::new(&self.heap, &other.to_string())),
        }
    }

    /// Deliver `error` to the innermost trap, unwinding abandoned frames
    /// (closing their upvalues). With no trap installed, the thread dies
    /// and the error propagates to the resumer or the host.
    fn deliver_error(&self, thread: &ThreadRef, error: VmError) -> Result<(), VmError> {
        let trap = thread.borrow_mut().traps.pop();
        let Some(trap) = trap else {
            let mut t = thread.borrow_mut();
            while let Some(frame) = t.frames.pop() {
                t.close_upvalues(frame.base);
                t.stack.truncate(frame.base);
            }
            t.state = ThreadState::Error;
            return Err(error);
        };
        let err_value = self.error_value(&error);
        let mut t = thread.borrow_mut();
        while t.frames.len() > trap.frame_index + 1 {
            if let Some(frame) = t.frames.pop() {
                t.close_upvalues(frame.base);
                t.stack.truncate(frame.base);
            }
        }
        let Some(frame) = t.frames.last_mut() else {
            t.state = ThreadState::Error;
            return Err(error);
        };
        frame.ip = trap.catch_ip;
        let err_index = frame.base + trap.err_slot as usize;
        // Locals of the abandoned try block may have been captured.
        t.close_upvalues(err_index + 1);
        if t.stack.len() <= err_index {
            t.stack.resize(err_index + 1, Value::Null);
        }
        t.stack[err_index] = err_value;
        Ok(())
    }

    // ===== Constant access =====

    fn constant<'a>(&self, closure: &'a ClosureRef, index: i32) -> Result<&'a Constant, VmError> {
        closure
            .proto
            .constants
            .get(index as usize)
            .ok_or_else(|| VmError::Native("constant index out of range".to_string()))
    }

    fn constant_str(&self, closure: &ClosureRef, index: i32) -> Result<StringRef, VmError> {
        match self.constant(closure, index)? {
            Constant::Str(s) => Ok(s.clone()),
            _ => Err(VmError::Native("name constant is not a string".to_string())),
        }
    }
}

// ===== Frame management =====

/// Push the first frame of a thread: the argument window becomes the bottom
/// of the stack.
fn start_frame(thread: &ThreadRef, closure: ClosureRef, window: Vec<Value>) -> Result<(), VmError> {
    let params = closure.proto.params as usize;
    let stack_size = closure.proto.stack_size as usize;
    let mut t = thread.borrow_mut();
    t.stack = window;
    if t.stack.len() < params {
        t.stack.resize(params, Value::Null);
    }
    if t.stack.len() < stack_size {
        t.stack.resize(stack_size, Value::Null);
    }
    t.frames.push(CallFrame { closure, ip: 0, base: 0, ret_slot: 0, is_ctor: false });
    t.state = ThreadState::Running;
    Ok(())
}

/// Push a call frame whose base is `this_pos`. `provided` counts the
/// receiver plus the arguments already sitting at the base; missing
/// parameters are padded with null, extras are ignored.
fn push_frame(
    thread: &ThreadRef,
    closure: ClosureRef,
    this_pos: usize,
    provided: usize,
    ret_slot: usize,
    is_ctor: bool,
) -> Result<(), VmError> {
    let params = closure.proto.params as usize;
    let stack_size = closure.proto.stack_size as usize;
    let mut t = thread.borrow_mut();
    if t.frames.len() >= MAX_CALL_DEPTH {
        return Err(VmError::CallDepthExceeded);
    }
    let needed = this_pos + stack_size.max(params).max(provided);
    if needed > MAX_STACK {
        return Err(VmError::StackOverflow);
    }
    if t.stack.len() < needed {
        t.stack.resize(needed, Value::Null);
    }
    for i in provided..params {
        t.stack[this_pos + i] = Value::Null;
    }
    t.frames.push(CallFrame { closure, ip: 0, base: this_pos, ret_slot, is_ctor });
    Ok(())
}

/// Pop the returning frame. Constructor frames return their receiver.
/// Returns the final signal when the bottom frame returned.
fn return_from_frame(thread: &ThreadRef, value: Value) -> Option<Signal> {
    let mut t = thread.borrow_mut();
    let frame = t.frames.pop()?;
    let result = if frame.is_ctor {
        t.stack.get(frame.base).cloned().unwrap_or(Value::Null)
    } else {
        value
    };
    t.close_upvalues(frame.base);
    t.stack.truncate(frame.base);
    let live = t.frames.len();
    // Traps installed by the dead frame die with it (early return in a try).
    t.traps.retain(|trap| trap.frame_index < live);
    if t.frames.is_empty() {
        t.state = ThreadState::Done;
        return Some(Signal::Return(result));
    }
    if t.stack.len() <= frame.ret_slot {
        t.stack.resize(frame.ret_slot + 1, Value::Null);
    }
    t.stack[frame.ret_slot] = result;
    None
}

fn jump(thread: &ThreadRef, offset: i32) {
    let mut t = thread.borrow_mut();
    if let Some(frame) = t.frames.last_mut() {
        frame.ip = (frame.ip as i64 + offset as i64) as usize;
    }
}

fn arg_window(thread: &ThreadRef, start: usize, len: usize) -> Vec<Value> {
    (0..len).map(|i| get_slot(thread, start + i)).collect()
}

// ===== Upvalue access =====

fn upvalue_cell(closure: &ClosureRef, index: i32) -> Result<UpvalueRef, VmError> {
    closure
        .upvalues
        .get(index as usize)
        .cloned()
        .ok_or_else(|| VmError::Native("upvalue index out of range".to_string()))
}

fn read_upvalue(current: &ThreadRef, cell: &UpvalueRef) -> Value {
    match &*cell.borrow() {
        Upvalue::Closed(v) => v.clone(),
        Upvalue::Open { owner, index } => {
            if owner.as_ptr() == Rc::as_ptr(current) {
                get_slot(current, *index)
            } else if let Some(owner) = owner.upgrade() {
                owner.borrow().stack.get(*index).cloned().unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
    }
}

fn write_upvalue(current: &ThreadRef, cell: &UpvalueRef, value: Value) {
    let mut cell = cell.borrow_mut();
    match &*cell {
        Upvalue::Closed(_) => *cell = Upvalue::Closed(value),
        Upvalue::Open { owner, index } => {
            let index = *index;
            if owner.as_ptr() == Rc::as_ptr(current) {
                set_slot(current, index, value);
            } else if let Some(owner) = owner.upgrade() {
                let mut o = owner.borrow_mut();
                if o.stack.len() <= index {
                    o.stack.resize(index + 1, Value::Null);
                }
                o.stack[index] = value;
            }
        }
    }
}

// ===== Operators =====

impl Vm {
    fn arith(&self, op: Opcode, l: &Value, r: &Value) -> Result<Value, VmError> {
        // String + string concatenates even through the generic Add.
        if op == Opcode::Add {
            if let (Value::Str(a), Value::Str(b)) = (l, r) {
                let s = format!("{}{}", a.as_str(), b.as_str());
                return Ok(Value::Str(RbString::new(&self.heap, &s)));
            }
        }
        match (l, r) {
            (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                // Mixed numerics promote to float.
                let (a, b) = match (l.as_float(), r.as_float()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => unreachable!("both operands are numeric"),
                };
                Ok(Value::Float(match op {
                    Opcode::Add => a + b,
                    Opcode::Sub => a - b,
                    Opcode::Mul => a * b,
                    Opcode::Div => a / b,
                    _ => a % b,
                }))
            }
            _ => Err(VmError::TypeMismatch(format!(
                "cannot apply arithmetic to {} and {}",
                l.type_name(),
                r.type_name()
            ))),
        }
    }
}

fn int_arith(op: Opcode, a: i64, b: i64) -> Result<Value, VmError> {
    Ok(match op {
        Opcode::Add => Value::Int(a.wrapping_add(b)),
        Opcode::Sub => Value::Int(a.wrapping_sub(b)),
        Opcode::Mul => Value::Int(a.wrapping_mul(b)),
        Opcode::Div => {
            if b == 0 {
                return Err(VmError::DivisionByZero);
            }
            // Exact division stays integral, otherwise the result is float.
            if a % b == 0 {
                Value::Int(a.wrapping_div(b))
            } else {
                Value::Float(a as f64 / b as f64)
            }
        }
        _ => {
            if b == 0 {
                return Err(VmError::DivisionByZero);
            }
            Value::Int(a.wrapping_rem(b))
        }
    })
}

fn bitwise(op: Opcode, l: &Value, r: &Value) -> Result<Value, VmError> {
    let (Some(a), Some(b)) = (l.as_int(), r.as_int()) else {
        return Err(VmError::TypeMismatch(format!(
            "bitwise operation on {} and {}",
            l.type_name(),
            r.type_name()
        )));
    };
    Ok(Value::Int(match op {
        Opcode::BitAnd => a & b,
        Opcode::BitOr => a | b,
        Opcode::BitXor => a ^ b,
        Opcode::Shl => a.wrapping_shl(b as u32 & 63),
        _ => a.wrapping_shr(b as u32 & 63),
    }))
}

/// Ordering for `<` `<=` `>` `>=`: numbers compare across int/float,
/// strings compare bytewise. Anything else is a type error.
fn compare(l: &Value, r: &Value) -> Result<std::cmp::Ordering, VmError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = match (l.as_float(), r.as_float()) {
                (Some(a), Some(b)) => (a, b),
                _ => unreachable!("both operands are numeric"),
            };
            a.partial_cmp(&b).ok_or_else(|| {
                VmError::TypeMismatch("cannot order NaN".to_string())
            })
        }
        (Value::Str(a), Value::Str(b)) => Ok(a.as_str().cmp(b.as_str())),
        _ => Err(VmError::TypeMismatch(format!(
            "cannot compare {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

// ===== Indexing & members =====

fn str_key(name: &StringRef) -> TableKey {
    // Strings are always valid keys.
    TableKey::new(Value::Str(name.clone())).unwrap_or_else(|| unreachable!())
}

fn value_key(key: Value) -> Result<TableKey, VmError> {
    TableKey::new(key).ok_or(VmError::InvalidKey)
}

fn get_index(obj: &Value, key: &Value) -> Result<Value, VmError> {
    match obj {
        Value::Array(arr) => {
            let Some(i) = key.as_int() else {
                return Err(VmError::TypeMismatch(format!(
                    "array index must be an integer, got {}",
                    key.type_name()
                )));
            };
            if i < 0 {
                return Err(VmError::IndexOutOfRange(i));
            }
            arr.borrow().get(i as usize).ok_or(VmError::IndexOutOfRange(i))
        }
        Value::Table(t) => {
            let k = value_key(key.clone())?;
            t.borrow()
                .get(&k)
                .ok_or_else(|| VmError::MissingMember(key.to_display_string()))
        }
        Value::Instance(_) | Value::Class(_) => match key {
            Value::Str(name) => get_member(obj, name),
            _ => Err(VmError::TypeMismatch(format!(
                "member key must be a string, got {}",
                key.type_name()
            ))),
        },
        other => Err(VmError::TypeMismatch(format!("cannot index a {}", other.type_name()))),
    }
}

fn set_index(obj: &Value, key: Value, value: Value) -> Result<(), VmError> {
    match obj {
        Value::Array(arr) => {
            let Some(i) = key.as_int() else {
                return Err(VmError::TypeMismatch(format!(
                    "array index must be an integer, got {}",
                    key.type_name()
                )));
            };
            if i < 0 || !arr.borrow_mut().set(i as usize, value) {
                return Err(VmError::IndexOutOfRange(i));
            }
            Ok(())
        }
        Value::Table(t) => {
            let k = value_key(key)?;
            t.borrow_mut().set(k, value);
            Ok(())
        }
        Value::Instance(_) => match key {
            Value::Str(name) => set_member(obj, &name, value),
            _ => Err(VmError::TypeMismatch(format!(
                "member key must be a string, got {}",
                key.type_name()
            ))),
        },
        other => Err(VmError::TypeMismatch(format!("cannot index a {}", other.type_name()))),
    }
}

/// `obj.name` reads: instance fields, then methods up the base chain;
/// table slots with delegate fallback; class methods (static access).
fn get_member(obj: &Value, name: &StringRef) -> Result<Value, VmError> {
    match obj {
        Value::Instance(inst) => {
            let class = inst.borrow().class();
            if let Some(idx) = class.borrow().field_index(name) {
                if let Some(v) = inst.borrow().field(idx) {
                    return Ok(v);
                }
            }
            Class::find_method(&class, name)
                .ok_or_else(|| VmError::MissingMember(name.as_str().to_string()))
        }
        Value::Table(t) => t
            .borrow()
            .get(&str_key(name))
            .ok_or_else(|| VmError::MissingMember(name.as_str().to_string())),
        Value::Class(cls) => Class::find_method(cls, name)
            .ok_or_else(|| VmError::MissingMember(name.as_str().to_string())),
        other => Err(VmError::TypeMismatch(format!(
            "cannot read member '{}' of a {}",
            name.as_str(),
            other.type_name()
        ))),
    }
}

/// `obj.name = v` writes. Instances have a fixed field layout; writing an
/// undeclared member is an error, not a new slot. Classes are frozen after
/// declaration.
fn set_member(obj: &Value, name: &StringRef, value: Value) -> Result<(), VmError> {
    match obj {
        Value::Instance(inst) => {
            let class = inst.borrow().class();
            let idx = class
                .borrow()
                .field_index(name)
                .ok_or_else(|| VmError::MissingMember(name.as_str().to_string()))?;
            inst.borrow_mut().set_field(idx, value);
            Ok(())
        }
        Value::Table(t) => {
            t.borrow_mut().set(str_key(name), value);
            Ok(())
        }
        Value::Class(_) => Err(VmError::TypeMismatch(
            "classes cannot be modified after declaration".to_string(),
        )),
        other => Err(VmError::TypeMismatch(format!(
            "cannot write member '{}' of a {}",
            name.as_str(),
            other.type_name()
        ))),
    }
}

// ===== Iteration =====

/// Set up the hidden iteration slots: `at` holds the container, `at+1` the
/// iteration state (a key snapshot for tables), `at+2` the cursor.
fn foreach_prep(thread: &ThreadRef, heap: &crate::alloc::Heap, at: usize) -> Result<(), VmError> {
    match get_slot(thread, at) {
        Value::Array(_) => {
            set_slot(thread, at + 1, Value::Null);
            set_slot(thread, at + 2, Value::Int(0));
            Ok(())
        }
        Value::Table(t) => {
            let keys: Vec<Value> = t.borrow().entries().into_iter().map(|(k, _)| k).collect();
            set_slot(thread, at + 1, Value::Array(Array::with_items(heap, keys)));
            set_slot(thread, at + 2, Value::Int(0));
            Ok(())
        }
        other => Err(VmError::TypeMismatch(format!(
            "cannot iterate a {}",
            other.type_name()
        ))),
    }
}

/// Advance one step: write key/value into `at+3`/`at+4` and return true,
/// or return false when the container is exhausted. Table entries removed
/// since the snapshot are skipped.
fn foreach_next(thread: &ThreadRef, at: usize) -> Result<bool, VmError> {
    let container = get_slot(thread, at);
    let cursor = get_slot(thread, at + 2).as_int().unwrap_or(0).max(0) as usize;
    match container {
        Value::Array(arr) => {
            let item = arr.borrow().get(cursor);
            match item {
                Some(v) => {
                    set_slot(thread, at + 3, Value::Int(cursor as i64));
                    set_slot(thread, at + 4, v);
                    set_slot(thread, at + 2, Value::Int(cursor as i64 + 1));
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        Value::Table(t) => {
            let Value::Array(keys) = get_slot(thread, at + 1) else {
                return Err(VmError::Native("iteration state missing".to_string()));
            };
            let mut i = cursor;
            loop {
                let Some(key) = keys.borrow().get(i) else {
                    return Ok(false);
                };
                i += 1;
                let entry = TableKey::new(key.clone()).and_then(|k| t.borrow().get(&k));
                if let Some(v) = entry {
                    set_slot(thread, at + 3, key);
                    set_slot(thread, at + 4, v);
                    set_slot(thread, at + 2, Value::Int(i as i64));
                    return Ok(true);
                }
            }
        }
        other => Err(VmError::TypeMismatch(format!(
            "cannot iterate a {}",
            other.type_name()
        ))),
    }
}
