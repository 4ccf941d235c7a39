//! Immutable engine strings.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::alloc::{AllocTicket, Heap, ObjKind};
use crate::object::StringRef;

/// An immutable string with a precomputed hash.
///
/// Strings are the workhorse table key, so the hash is computed once at
/// creation and comparison checks it before touching the bytes.
pub struct RbString {
    data: Box<str>,
    hash: u64,
    _ticket: AllocTicket,
}

impl RbString {
    /// Allocate a new string through `heap`.
    pub fn new(heap: &Heap, data: impl Into<String>) -> StringRef {
        let data: Box<str> = data.into().into_boxed_str();
        let mut hasher = FxHasher::default();
        data.hash(&mut hasher);
        std::rc::Rc::new(RbString {
            hash: hasher.finish(),
            data,
            _ticket: heap.ticket(ObjKind::String),
        })
    }

    /// The string contents.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Byte length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the string is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The precomputed content hash.
    pub fn precomputed_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for RbString {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.data == other.data
    }
}

impl Eq for RbString {}

impl Hash for RbString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl std::fmt::Debug for RbString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.data)
    }
}

impl std::fmt::Display for RbString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.data)
    }
}
