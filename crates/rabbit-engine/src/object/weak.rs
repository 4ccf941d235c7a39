//! Weak references.
//!
//! A [`WeakRef`] holds the weak side of an object's reference count. The
//! anchor (the `Rc` control block) outlives the payload, so once the last
//! strong reference drops, every outstanding weak ref observes "expired"
//! and resolves to null instead of touching freed memory. Weak refs are the
//! script-facing tool for breaking reference cycles, which plain counting
//! cannot reclaim.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::object::{Array, Class, Closure, Instance, NativeFunction, RbString, Table, UserData};
use crate::object::Value;
use crate::vm::thread::Thread;

/// A non-owning handle to a heap value.
#[derive(Clone)]
pub enum WeakRef {
    /// Weak string handle
    Str(Weak<RbString>),
    /// Weak table handle
    Table(Weak<RefCell<Table>>),
    /// Weak array handle
    Array(Weak<RefCell<Array>>),
    /// Weak closure handle
    Closure(Weak<Closure>),
    /// Weak native-function handle
    Native(Weak<NativeFunction>),
    /// Weak class handle
    Class(Weak<RefCell<Class>>),
    /// Weak instance handle
    Instance(Weak<RefCell<Instance>>),
    /// Weak userdata handle
    UserData(Weak<RefCell<UserData>>),
    /// Weak thread handle
    Thread(Weak<RefCell<Thread>>),
}

impl WeakRef {
    /// Take a weak reference to `value`. Returns `None` for inline scalars
    /// and for values that are already weak refs.
    pub fn acquire(value: &Value) -> Option<WeakRef> {
        match value {
            Value::Str(r) => Some(WeakRef::Str(Rc::downgrade(r))),
            Value::Table(r) => Some(WeakRef::Table(Rc::downgrade(r))),
            Value::Array(r) => Some(WeakRef::Array(Rc::downgrade(r))),
            Value::Closure(r) => Some(WeakRef::Closure(Rc::downgrade(r))),
            Value::Native(r) => Some(WeakRef::Native(Rc::downgrade(r))),
            Value::Class(r) => Some(WeakRef::Class(Rc::downgrade(r))),
            Value::Instance(r) => Some(WeakRef::Instance(Rc::downgrade(r))),
            Value::UserData(r) => Some(WeakRef::UserData(Rc::downgrade(r))),
            Value::Thread(r) => Some(WeakRef::Thread(Rc::downgrade(r))),
            _ => None,
        }
    }

    /// Resolve to a strong value, or `Null` once the target expired.
    pub fn resolve(&self) -> Value {
        match self {
            WeakRef::Str(w) => w.upgrade().map_or(Value::Null, Value::Str),
            WeakRef::Table(w) => w.upgrade().map_or(Value::Null, Value::Table),
            WeakRef::Array(w) => w.upgrade().map_or(Value::Null, Value::Array),
            WeakRef::Closure(w) => w.upgrade().map_or(Value::Null, Value::Closure),
            WeakRef::Native(w) => w.upgrade().map_or(Value::Null, Value::Native),
            WeakRef::Class(w) => w.upgrade().map_or(Value::Null, Value::Class),
            WeakRef::Instance(w) => w.upgrade().map_or(Value::Null, Value::Instance),
            WeakRef::UserData(w) => w.upgrade().map_or(Value::Null, Value::UserData),
            WeakRef::Thread(w) => w.upgrade().map_or(Value::Null, Value::Thread),
        }
    }

    /// True once the target has been destroyed.
    pub fn is_expired(&self) -> bool {
        self.resolve().is_null()
    }

    /// Identity of the anchor, for hashing.
    pub(crate) fn anchor_ident(&self) -> usize {
        match self {
            WeakRef::Str(w) => w.as_ptr() as usize,
            WeakRef::Table(w) => w.as_ptr() as usize,
            WeakRef::Array(w) => w.as_ptr() as usize,
            WeakRef::Closure(w) => w.as_ptr() as usize,
            WeakRef::Native(w) => w.as_ptr() as usize,
            WeakRef::Class(w) => w.as_ptr() as usize,
            WeakRef::Instance(w) => w.as_ptr() as usize,
            WeakRef::UserData(w) => w.as_ptr() as usize,
            WeakRef::Thread(w) => w.as_ptr() as usize,
        }
    }

    /// True if both refs anchor the same object.
    pub fn anchor_eq(&self, other: &WeakRef) -> bool {
        self.anchor_ident() == other.anchor_ident()
    }
}

impl std::fmt::Debug for WeakRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_expired() {
            f.write_str("WeakRef(expired)")
        } else {
            f.write_str("WeakRef(live)")
        }
    }
}
