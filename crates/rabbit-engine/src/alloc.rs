//! Allocator hook layer.
//!
//! Every heap object the engine creates (strings, tables, arrays, closures,
//! classes, instances, userdata, threads, function prototypes) is born
//! through a [`Heap`] handle. The heap owns an exchangeable [`AllocHook`]
//! that observes every allocation and every free, which lets a host account
//! for engine memory without patching the engine itself.
//!
//! Objects carry an [`AllocTicket`]; dropping the object's payload drops the
//! ticket, which reports the free. Payload destruction happens exactly once,
//! on the final strong-reference release, so a counting hook observes the
//! exact number of live engine objects at any point.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// The kind of engine heap object, reported to the [`AllocHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjKind {
    /// Immutable string
    String,
    /// Key/value table
    Table,
    /// Ordered array
    Array,
    /// Script closure
    Closure,
    /// Native (host) function
    Native,
    /// Class definition
    Class,
    /// Class instance
    Instance,
    /// Host-owned opaque payload
    UserData,
    /// Generator thread
    Thread,
    /// Compiled function prototype
    Proto,
}

impl ObjKind {
    /// All object kinds, in a fixed order usable as an index.
    pub const ALL: [ObjKind; 10] = [
        ObjKind::String,
        ObjKind::Table,
        ObjKind::Array,
        ObjKind::Closure,
        ObjKind::Native,
        ObjKind::Class,
        ObjKind::Instance,
        ObjKind::UserData,
        ObjKind::Thread,
        ObjKind::Proto,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|k| *k == self).unwrap_or(0)
    }
}

/// Observer for engine object lifetimes.
///
/// Implementations must be cheap: the hook fires on every object birth and
/// death. The engine is single-threaded, so no synchronization is required.
pub trait AllocHook {
    /// An object of `kind` was created.
    fn on_alloc(&self, kind: ObjKind);
    /// An object of `kind` was destroyed.
    fn on_free(&self, kind: ObjKind);
}

/// Hook that ignores every event. The default.
#[derive(Debug, Default)]
pub struct NullHook;

impl AllocHook for NullHook {
    fn on_alloc(&self, _kind: ObjKind) {}
    fn on_free(&self, _kind: ObjKind) {}
}

/// Hook that counts live and total allocations, per kind and overall.
///
/// Used by hosts (and the engine's own tests) to assert that creating and
/// discarding objects leaves no leaks behind.
#[derive(Debug, Default)]
pub struct CountingHook {
    live: Cell<usize>,
    total: Cell<usize>,
    per_kind: [Cell<usize>; 10],
}

impl CountingHook {
    /// Create a hook with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of engine objects currently alive.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Number of objects ever allocated.
    pub fn total(&self) -> usize {
        self.total.get()
    }

    /// Number of live objects of one kind.
    pub fn live_of(&self, kind: ObjKind) -> usize {
        self.per_kind[kind.index()].get()
    }
}

impl AllocHook for CountingHook {
    fn on_alloc(&self, kind: ObjKind) {
        self.live.set(self.live.get() + 1);
        self.total.set(self.total.get() + 1);
        let cell = &self.per_kind[kind.index()];
        cell.set(cell.get() + 1);
    }

    fn on_free(&self, kind: ObjKind) {
        self.live.set(self.live.get().saturating_sub(1));
        let cell = &self.per_kind[kind.index()];
        cell.set(cell.get().saturating_sub(1));
    }
}

/// A birth certificate held by every engine heap object.
///
/// Dropping the ticket reports the object's death to the hook that issued
/// it. Tickets are issued only by [`Heap::ticket`].
pub struct AllocTicket {
    hook: Rc<dyn AllocHook>,
    kind: ObjKind,
}

impl fmt::Debug for AllocTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocTicket").field("kind", &self.kind).finish()
    }
}

impl Drop for AllocTicket {
    fn drop(&mut self) {
        self.hook.on_free(self.kind);
    }
}

/// Handle through which all engine objects are allocated.
///
/// Cloning a `Heap` is cheap; clones share the same hook.
#[derive(Clone)]
pub struct Heap {
    hook: Rc<dyn AllocHook>,
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Heap")
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(Rc::new(NullHook))
    }
}

impl Heap {
    /// Create a heap reporting to `hook`.
    pub fn new(hook: Rc<dyn AllocHook>) -> Self {
        Self { hook }
    }

    /// Issue a ticket for a newly created object of `kind`.
    pub(crate) fn ticket(&self, kind: ObjKind) -> AllocTicket {
        self.hook.on_alloc(kind);
        AllocTicket { hook: Rc::clone(&self.hook), kind }
    }
}
