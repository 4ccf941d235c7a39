//! Ordered, resizable value sequences.

use std::cell::RefCell;
use std::rc::Rc;

use crate::alloc::{AllocTicket, Heap, ObjKind};
use crate::object::{ArrayRef, Value};

/// A zero-based, growable sequence of values.
pub struct Array {
    items: Vec<Value>,
    _ticket: AllocTicket,
}

impl Array {
    /// Allocate an empty array through `heap`.
    pub fn new(heap: &Heap) -> ArrayRef {
        Self::with_items(heap, Vec::new())
    }

    /// Allocate an array with initial contents.
    pub fn with_items(heap: &Heap, items: Vec<Value>) -> ArrayRef {
        Rc::new(RefCell::new(Array { items, _ticket: heap.ticket(ObjKind::Array) }))
    }

    /// Element at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.get(index).cloned()
    }

    /// Overwrite the element at `index`. Returns false when out of range.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Append an element.
    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<Value> {
        self.items.pop()
    }

    /// Insert at `index`, shifting the tail. Returns false when out of range.
    pub fn insert(&mut self, index: usize, value: Value) -> bool {
        if index > self.items.len() {
            return false;
        }
        self.items.insert(index, value);
        true
    }

    /// Remove the element at `index`, shifting the tail.
    pub fn remove(&mut self, index: usize) -> Option<Value> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    /// Grow or shrink to `len`, filling new slots with null.
    pub fn resize(&mut self, len: usize) {
        self.items.resize(len, Value::Null);
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A snapshot of the elements.
    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Array({} items)", self.items.len())
    }
}
