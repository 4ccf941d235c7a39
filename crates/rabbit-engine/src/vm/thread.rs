//! Script threads.
//!
//! Every execution runs on a thread: the main thread the host starts, and
//! one child thread per live generator. A thread owns a contiguous value
//! stack, a frame stack, the traps installed by protected calls, and the
//! open upvalue cells that alias its stack slots.

use std::cell::RefCell;
use std::rc::Rc;

use crate::alloc::{AllocTicket, Heap, ObjKind};
use crate::object::{ClosureRef, Upvalue, UpvalueRef, Value};

/// Strong reference to a thread.
pub type ThreadRef = Rc<RefCell<Thread>>;

/// Thread lifecycle. `Done` and `Error` are terminal: resuming a thread in
/// either state fails with `ThreadNotResumable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Created but never resumed.
    Idle,
    /// Currently executing (or suspended at a `resume` of a child).
    Running,
    /// Parked at a `yield`.
    Suspended,
    /// Returned normally.
    Done,
    /// Terminated by an uncaught error.
    Error,
}

/// One activation record.
pub(crate) struct CallFrame {
    pub closure: ClosureRef,
    pub ip: usize,
    /// Absolute stack index of the frame's slot 0 (the receiver).
    pub base: usize,
    /// Absolute stack index the return value is written to.
    pub ret_slot: usize,
    /// Constructor frames return the receiver, not the return value.
    pub is_ctor: bool,
}

/// A protected-call boundary installed by `PushTrap`.
pub(crate) struct Trap {
    /// Frame the handler lives in.
    pub frame_index: usize,
    /// Instruction to continue at when an error is delivered.
    pub catch_ip: usize,
    /// Frame-relative slot receiving the error value.
    pub err_slot: u8,
}

/// A script thread: the main thread or a generator coroutine.
pub struct Thread {
    pub(crate) state: ThreadState,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) traps: Vec<Trap>,
    /// Open upvalue cells into this stack, sorted by stack index.
    pub(crate) open_upvalues: Vec<(usize, UpvalueRef)>,
    /// For an idle generator: the closure and its argument window
    /// (receiver first), consumed on first resume.
    pub(crate) pending: Option<(ClosureRef, Vec<Value>)>,
    _ticket: AllocTicket,
}

impl Thread {
    /// A bare running thread; the caller pushes the first frame.
    pub(crate) fn new(heap: &Heap) -> ThreadRef {
        Rc::new(RefCell::new(Thread {
            state: ThreadState::Running,
            stack: Vec::new(),
            frames: Vec::new(),
            traps: Vec::new(),
            open_upvalues: Vec::new(),
            pending: None,
            _ticket: heap.ticket(ObjKind::Thread),
        }))
    }

    /// An idle generator thread holding its start closure and arguments.
    pub(crate) fn new_generator(heap: &Heap, closure: ClosureRef, args: Vec<Value>) -> ThreadRef {
        Rc::new(RefCell::new(Thread {
            state: ThreadState::Idle,
            stack: Vec::new(),
            frames: Vec::new(),
            traps: Vec::new(),
            open_upvalues: Vec::new(),
            pending: Some((closure, args)),
            _ticket: heap.ticket(ObjKind::Thread),
        }))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Find the open cell for absolute stack index `index`, or create one.
    /// `this` is the owning thread, recorded so the interpreter can tell
    /// own-stack accesses from cross-thread ones.
    pub(crate) fn capture_upvalue(this: &ThreadRef, index: usize) -> UpvalueRef {
        let mut t = this.borrow_mut();
        match t.open_upvalues.binary_search_by_key(&index, |&(i, _)| i) {
            Ok(pos) => t.open_upvalues[pos].1.clone(),
            Err(pos) => {
                let cell = Rc::new(RefCell::new(Upvalue::Open {
                    owner: Rc::downgrade(this),
                    index,
                }));
                t.open_upvalues.insert(pos, (index, cell.clone()));
                cell
            }
        }
    }

    /// Flip every open cell at stack index >= `floor` to closed, detaching
    /// it from the stack.
    pub(crate) fn close_upvalues(&mut self, floor: usize) {
        while let Some((index, cell)) = self.open_upvalues.pop() {
            if index < floor {
                self.open_upvalues.push((index, cell));
                break;
            }
            let value = self.stack.get(index).cloned().unwrap_or(Value::Null);
            *cell.borrow_mut() = Upvalue::Closed(value);
        }
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        // A suspended generator dying mid-execution may still have open
        // cells shared with surviving closures.
        self.close_upvalues(0);
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("state", &self.state)
            .field("frames", &self.frames.len())
            .finish()
    }
}
