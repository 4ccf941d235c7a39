//! Compiled function prototypes.

use std::rc::Rc;

use crate::alloc::{AllocTicket, Heap, ObjKind};
use crate::bytecode::Instr;
use crate::object::{StringRef, Value};

/// Strong reference to a function prototype.
pub type ProtoRef = Rc<FunctionProto>;

/// A constant-pool entry.
///
/// Nested function prototypes live in the pool too: `MakeClosure` wraps them
/// into closures at the definition site; they are not loadable as values.
#[derive(Debug, Clone)]
pub enum Constant {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(StringRef),
    /// Nested function prototype
    Proto(ProtoRef),
}

impl Constant {
    /// Convert to a runtime value. `None` for prototypes.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Constant::Int(i) => Some(Value::Int(*i)),
            Constant::Float(f) => Some(Value::Float(*f)),
            Constant::Str(s) => Some(Value::Str(s.clone())),
            Constant::Proto(_) => None,
        }
    }
}

/// Where a closure's upvalue cell comes from at instantiation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// A local slot of the enclosing function's frame.
    ParentLocal(u8),
    /// An upvalue of the enclosing closure.
    ParentUpvalue(u8),
}

/// Maps an instruction position to a source line. Entries are emitted only
/// when the line changes, sorted by `ip`.
#[derive(Debug, Clone, Copy)]
pub struct LineInfo {
    /// First instruction position at this line.
    pub ip: u32,
    /// One-based source line.
    pub line: u32,
}

/// Debug record for one named local variable.
#[derive(Debug, Clone)]
pub struct LocalInfo {
    /// The declared name.
    pub name: String,
    /// Frame-relative slot.
    pub slot: u8,
    /// First instruction where the variable is live.
    pub start_ip: u32,
    /// One past the last instruction where the variable is live.
    pub end_ip: u32,
}

/// The immutable compiled representation of one function.
#[derive(Debug)]
pub struct FunctionProto {
    /// Function name, or a marker like `<main>` for top-level code.
    pub name: String,
    /// Source (file) name the function was compiled from.
    pub source: String,
    /// Declared parameter count, including the implicit receiver in slot 0.
    pub params: u8,
    /// Stack slots the frame needs (parameters, locals, temporaries).
    pub stack_size: u8,
    /// True if the body contains `yield`: calling the closure creates a
    /// suspended thread instead of running the body.
    pub is_generator: bool,
    /// The instruction sequence.
    pub code: Vec<Instr>,
    /// The constant pool.
    pub constants: Vec<Constant>,
    /// Upvalue capture descriptors, in cell order.
    pub upvalues: Vec<CaptureSource>,
    /// Line table for diagnostics.
    pub lines: Vec<LineInfo>,
    /// Named-local debug records.
    pub locals: Vec<LocalInfo>,
    pub(crate) ticket: Option<AllocTicket>,
}

impl FunctionProto {
    /// Wrap a finished prototype in a strong reference, reporting the
    /// allocation to `heap`.
    pub fn into_ref(mut self, heap: &Heap) -> ProtoRef {
        self.ticket = Some(heap.ticket(ObjKind::Proto));
        Rc::new(self)
    }

    /// The source line of the instruction at `ip`.
    pub fn line_at(&self, ip: usize) -> u32 {
        let ip = ip as u32;
        match self.lines.binary_search_by(|e| e.ip.cmp(&ip)) {
            Ok(i) => self.lines[i].line,
            Err(0) => self.lines.first().map_or(0, |e| e.line),
            Err(i) => self.lines[i - 1].line,
        }
    }
}
