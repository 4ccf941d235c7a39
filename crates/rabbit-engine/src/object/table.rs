//! Key/value tables with delegate fallback.

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::alloc::{AllocTicket, Heap, ObjKind};
use crate::object::{TableRef, Value};

/// A table key. Wraps a [`Value`] with hashing and equality suitable for
/// map storage: numbers hash consistently across int/float when they denote
/// the same integer, strings hash by content, heap objects by identity.
///
/// `null` and NaN are rejected as keys at construction.
#[derive(Clone, Debug)]
pub struct TableKey(Value);

impl TableKey {
    /// Wrap `value` as a key, or `None` if it cannot be one.
    pub fn new(value: Value) -> Option<TableKey> {
        match &value {
            Value::Null => None,
            Value::Float(f) if f.is_nan() => None,
            _ => Some(TableKey(value)),
        }
    }

    /// The wrapped key value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

fn heap_ident(v: &Value) -> usize {
    match v {
        Value::Str(r) => Rc::as_ptr(r) as usize,
        Value::Table(r) => Rc::as_ptr(r) as usize,
        Value::Array(r) => Rc::as_ptr(r) as usize,
        Value::Closure(r) => Rc::as_ptr(r) as usize,
        Value::Native(r) => Rc::as_ptr(r) as usize,
        Value::Class(r) => Rc::as_ptr(r) as usize,
        Value::Instance(r) => Rc::as_ptr(r) as usize,
        Value::UserData(r) => Rc::as_ptr(r) as usize,
        Value::Thread(r) => Rc::as_ptr(r) as usize,
        _ => 0,
    }
}

impl Hash for TableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Value::Int(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            // Floats that denote an integer hash like that integer, so
            // t[2] and t[2.0] address the same slot.
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    state.write_u8(2);
                    (*f as i64).hash(state);
                } else {
                    state.write_u8(3);
                    f.to_bits().hash(state);
                }
            }
            Value::Str(s) => {
                state.write_u8(4);
                state.write_u64(s.precomputed_hash());
            }
            Value::Weak(w) => {
                state.write_u8(5);
                state.write_usize(w.anchor_ident());
            }
            other => {
                state.write_u8(6);
                state.write_usize(heap_ident(other));
            }
        }
    }
}

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals(&other.0)
    }
}

impl Eq for TableKey {}

/// A heterogeneous map from values to values, with an optional delegate
/// table consulted when a read misses (prototype-style fallback).
pub struct Table {
    map: FxHashMap<TableKey, Value>,
    delegate: Option<TableRef>,
    _ticket: AllocTicket,
}

impl Table {
    /// Allocate an empty table through `heap`.
    pub fn new(heap: &Heap) -> TableRef {
        Rc::new(RefCell::new(Table {
            map: FxHashMap::default(),
            delegate: None,
            _ticket: heap.ticket(ObjKind::Table),
        }))
    }

    /// Read a slot, falling back through the delegate chain on a miss.
    pub fn get(&self, key: &TableKey) -> Option<Value> {
        if let Some(v) = self.map.get(key) {
            return Some(v.clone());
        }
        let mut delegate = self.delegate.clone();
        while let Some(d) = delegate {
            let d = d.borrow();
            if let Some(v) = d.map.get(key) {
                return Some(v.clone());
            }
            delegate = d.delegate.clone();
        }
        None
    }

    /// Read a slot without delegate fallback.
    pub fn get_local(&self, key: &TableKey) -> Option<Value> {
        self.map.get(key).cloned()
    }

    /// Create or overwrite a slot. Writes never touch the delegate.
    pub fn set(&mut self, key: TableKey, value: Value) {
        self.map.insert(key, value);
    }

    /// Remove a slot, returning its value.
    pub fn remove(&mut self, key: &TableKey) -> Option<Value> {
        self.map.remove(key)
    }

    /// Number of slots stored locally (delegates excluded).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no local slots exist.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The current delegate, if any.
    pub fn delegate(&self) -> Option<TableRef> {
        self.delegate.clone()
    }

    /// Snapshot of all local entries, for iteration.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.map.iter().map(|(k, v)| (k.value().clone(), v.clone())).collect()
    }

    /// Install `delegate` as the fallback of `this`. Fails (returns false)
    /// if the chain would contain a cycle or delegate to itself.
    pub fn set_delegate(this: &TableRef, delegate: Option<TableRef>) -> bool {
        if let Some(d) = &delegate {
            if Rc::ptr_eq(this, d) {
                return false;
            }
            let mut walk = Some(d.clone());
            while let Some(t) = walk {
                if Rc::ptr_eq(&t, this) {
                    return false;
                }
                walk = t.borrow().delegate.clone();
            }
        }
        this.borrow_mut().delegate = delegate;
        true
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Table({} slots)", self.map.len())
    }
}
