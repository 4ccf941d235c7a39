//! Closures, upvalue cells, and native functions.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::alloc::{AllocTicket, Heap, ObjKind};
use crate::api::NativeFn;
use crate::bytecode::ProtoRef;
use crate::object::{ClassRef, ClosureRef, NativeRef, UpvalueRef, Value};
use crate::vm::thread::Thread;

/// A captured variable cell, shared between the frame that declared the
/// variable and every closure that captured it.
///
/// While the declaring frame is alive the cell is `Open`, aliasing a slot of
/// the owning thread's value stack; reads and writes go through to the slot,
/// so mutations on either side are visible to both. When the frame returns
/// (or its scope ends, or the owning thread is dropped mid-suspension) the
/// cell flips to `Closed`, owning a copy of the last value.
pub enum Upvalue {
    /// Aliases `owner`'s stack at `index`.
    Open {
        /// The thread whose stack holds the live slot.
        owner: Weak<RefCell<Thread>>,
        /// Absolute index into that thread's value stack.
        index: usize,
    },
    /// Owns its value outright.
    Closed(Value),
}

impl Upvalue {
    /// True while the cell still aliases a stack slot.
    pub fn is_open(&self) -> bool {
        matches!(self, Upvalue::Open { .. })
    }
}

impl std::fmt::Debug for Upvalue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upvalue::Open { index, .. } => write!(f, "Open({index})"),
            Upvalue::Closed(v) => write!(f, "Closed({v:?})"),
        }
    }
}

/// A function prototype paired with its resolved upvalue cells.
pub struct Closure {
    /// The compiled function.
    pub proto: ProtoRef,
    /// One cell per upvalue descriptor of the prototype.
    pub upvalues: Vec<UpvalueRef>,
    /// The class this closure was installed on as a method, if any.
    /// Used to resolve `base` dispatch.
    defining_class: RefCell<Option<ClassRef>>,
    _ticket: AllocTicket,
}

impl Closure {
    /// Allocate a closure through `heap`.
    pub fn new(heap: &Heap, proto: ProtoRef, upvalues: Vec<UpvalueRef>) -> ClosureRef {
        Rc::new(Closure {
            proto,
            upvalues,
            defining_class: RefCell::new(None),
            _ticket: heap.ticket(ObjKind::Closure),
        })
    }

    /// The class this closure is a method of, if any.
    pub fn defining_class(&self) -> Option<ClassRef> {
        self.defining_class.borrow().clone()
    }

    /// Record the class this closure was installed on. Set once, when the
    /// class declaration installs the method.
    pub fn set_defining_class(&self, class: ClassRef) {
        *self.defining_class.borrow_mut() = Some(class);
    }
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Closure({})", self.proto.name)
    }
}

/// A host function callable from script.
pub struct NativeFunction {
    /// The name it was registered under (for error messages).
    pub name: String,
    /// The entry point.
    pub func: NativeFn,
    _ticket: AllocTicket,
}

impl NativeFunction {
    /// Allocate a native function object through `heap`.
    pub fn new(heap: &Heap, name: impl Into<String>, func: NativeFn) -> NativeRef {
        Rc::new(NativeFunction {
            name: name.into(),
            func,
            _ticket: heap.ticket(ObjKind::Native),
        })
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}
