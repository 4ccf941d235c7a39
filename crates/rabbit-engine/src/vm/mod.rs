//! The Rabbit virtual machine.
//!
//! A slot-based interpreter over [`FunctionProto`](crate::bytecode::FunctionProto)
//! bytecode. Every execution happens on a [`Thread`]; generators get their
//! own. The VM owns the root table that global names resolve against and
//! the [`Heap`](crate::alloc::Heap) every object is allocated through.

mod debug;
mod interp;
pub(crate) mod thread;

pub use debug::FrameInfo;
pub use thread::{Thread, ThreadRef, ThreadState};

use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;

use crate::alloc::{AllocHook, Heap, NullHook};
use crate::api::NativeFn;
use crate::bytecode::ProtoRef;
use crate::compiler::{self, CompileError};
use crate::object::{
    Closure, ClosureRef, NativeFunction, RbString, Table, TableKey, TableRef, Value,
};

/// A runtime fault.
///
/// Every variant is catchable by a script `try` (the trap machinery) before
/// it escapes to the host. `Thrown` wraps a value raised by the script
/// itself; everything else originates in the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// An operation applied to operands of the wrong type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// A member or table slot that does not exist.
    #[error("member not found: {0}")]
    MissingMember(String),
    /// A global name with no root-table slot.
    #[error("undefined global '{0}'")]
    UndefinedGlobal(String),
    /// An array access outside the live range.
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
    /// Integer division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Calling a value that is not callable.
    #[error("value of type {0} is not callable")]
    NotCallable(String),
    /// `null` or NaN used as a table key.
    #[error("invalid table key")]
    InvalidKey,
    /// The value stack outgrew its limit.
    #[error("stack overflow")]
    StackOverflow,
    /// Too many nested calls (or resumes).
    #[error("call depth exceeded")]
    CallDepthExceeded,
    /// Resuming a thread that is idle-consumed, running, done, or dead.
    #[error("thread is not resumable")]
    ThreadNotResumable,
    /// A value raised by the script's `throw`.
    #[error("script error: {}", .0.to_display_string())]
    Thrown(Value),
    /// An error raised by a native function.
    #[error("{0}")]
    Native(String),
}

/// An embeddable Rabbit engine instance.
///
/// Owns the heap and the root table. Compile with [`Vm::compile`], run with
/// [`Vm::execute`] or [`Vm::run`], extend with [`Vm::register_native`].
pub struct Vm {
    heap: Heap,
    root: TableRef,
    resume_depth: Cell<usize>,
}

impl Vm {
    /// An engine with the default (no-op) allocation hook.
    pub fn new() -> Self {
        Self::with_hook(Rc::new(NullHook))
    }

    /// An engine whose heap reports to `hook`.
    pub fn with_hook(hook: Rc<dyn AllocHook>) -> Self {
        let heap = Heap::new(hook);
        let root = Table::new(&heap);
        Vm { heap, root, resume_depth: Cell::new(0) }
    }

    /// The heap objects are allocated through.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The root table global names resolve against.
    pub fn root(&self) -> &TableRef {
        &self.root
    }

    /// Compile a script into a root prototype.
    pub fn compile(&self, source: &str, source_name: &str) -> Result<ProtoRef, CompileError> {
        compiler::compile(&self.heap, source, source_name)
    }

    /// Compile a single expression into a prototype returning its value.
    pub fn compile_expression(
        &self,
        source: &str,
        source_name: &str,
    ) -> Result<ProtoRef, CompileError> {
        compiler::compile_expression(&self.heap, source, source_name)
    }

    /// Run a root prototype on a fresh thread, with the root table as the
    /// receiver.
    pub fn execute(&self, proto: &ProtoRef) -> Result<Value, VmError> {
        let closure = Closure::new(&self.heap, proto.clone(), Vec::new());
        self.run(&closure, &[])
    }

    /// Call `closure` with `args` on a fresh thread. The receiver is the
    /// root table. Calling a generator returns its idle [`Thread`] as a
    /// value without running the body.
    pub fn run(&self, closure: &ClosureRef, args: &[Value]) -> Result<Value, VmError> {
        let mut window = Vec::with_capacity(args.len() + 1);
        window.push(Value::Table(self.root.clone()));
        window.extend_from_slice(args);
        if closure.proto.is_generator {
            let thread = thread::Thread::new_generator(&self.heap, closure.clone(), window);
            return Ok(Value::Thread(thread));
        }
        self.spawn_and_run(closure.clone(), window)
    }

    /// Protected call of any callable value. Faults arrive as `Err` instead
    /// of unwinding into the host; a non-callable `func` is
    /// [`VmError::NotCallable`].
    pub fn pcall(&self, func: &Value, args: &[Value]) -> Result<Value, VmError> {
        match func {
            Value::Closure(c) => self.run(c, args),
            Value::Native(native) => {
                let mut window = Vec::with_capacity(args.len() + 1);
                window.push(Value::Table(self.root.clone()));
                window.extend_from_slice(args);
                let mut ctx = crate::api::NativeCtx::new(&self.heap, &window);
                (native.func)(&mut ctx)
            }
            other => Err(VmError::NotCallable(other.type_name().to_string())),
        }
    }

    /// Register a host function in the root table under `name`.
    pub fn register_native(&self, name: &str, func: NativeFn) {
        let native = NativeFunction::new(&self.heap, name, func);
        self.set_global(name, Value::Native(native));
    }

    /// Create or overwrite a root-table slot.
    pub fn set_global(&self, name: &str, value: Value) {
        let key = Value::Str(RbString::new(&self.heap, name));
        if let Some(key) = TableKey::new(key) {
            self.root.borrow_mut().set(key, value);
        }
    }

    /// Read a root-table slot.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let key = Value::Str(RbString::new(&self.heap, name));
        let key = TableKey::new(key)?;
        self.root.borrow().get(&key)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm").finish()
    }
}
