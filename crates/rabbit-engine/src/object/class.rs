//! Classes and instances.
//!
//! A class owns its declared field layout and method table. Creating a
//! derived class copies the base's field layout (so instances hold one flat
//! field vector, inherited slots included), but methods stay on the class
//! that declared them: dispatch walks the base chain and stops at the first
//! match. Single inheritance only.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::alloc::{AllocTicket, Heap, ObjKind};
use crate::object::{ClassRef, InstanceRef, StringRef, Value};

/// A class definition.
pub struct Class {
    /// The declared class name.
    pub name: String,
    base: Option<ClassRef>,
    field_names: Vec<StringRef>,
    field_defaults: Vec<Value>,
    field_map: FxHashMap<StringRef, usize>,
    methods: FxHashMap<StringRef, Value>,
    _ticket: AllocTicket,
}

impl Class {
    /// Allocate a class through `heap`. A derived class inherits the base's
    /// field layout at creation time.
    pub fn new(heap: &Heap, name: impl Into<String>, base: Option<ClassRef>) -> ClassRef {
        let (field_names, field_defaults, field_map) = match &base {
            Some(b) => {
                let b = b.borrow();
                (b.field_names.clone(), b.field_defaults.clone(), b.field_map.clone())
            }
            None => (Vec::new(), Vec::new(), FxHashMap::default()),
        };
        Rc::new(RefCell::new(Class {
            name: name.into(),
            base,
            field_names,
            field_defaults,
            field_map,
            methods: FxHashMap::default(),
            _ticket: heap.ticket(ObjKind::Class),
        }))
    }

    /// The direct base class, if any.
    pub fn base(&self) -> Option<ClassRef> {
        self.base.clone()
    }

    /// Declare a per-instance field with a default value. Redeclaring a
    /// field (including an inherited one) overrides its default.
    pub fn declare_field(&mut self, name: StringRef, default: Value) {
        match self.field_map.get(&name) {
            Some(&idx) => self.field_defaults[idx] = default,
            None => {
                let idx = self.field_names.len();
                self.field_names.push(name.clone());
                self.field_defaults.push(default);
                self.field_map.insert(name, idx);
            }
        }
    }

    /// Install a method on this class.
    pub fn declare_method(&mut self, name: StringRef, method: Value) {
        self.methods.insert(name, method);
    }

    /// The field slot index for `name`, inherited fields included.
    pub fn field_index(&self, name: &StringRef) -> Option<usize> {
        self.field_map.get(name).copied()
    }

    /// Number of instance fields (inherited included).
    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    /// Declared field names in slot order.
    pub fn field_names(&self) -> &[StringRef] {
        &self.field_names
    }

    /// A method declared on this class (no base walk).
    pub fn own_method(&self, name: &StringRef) -> Option<Value> {
        self.methods.get(name).cloned()
    }

    /// Resolve a method, walking the base chain and stopping at the first
    /// match.
    pub fn find_method(class: &ClassRef, name: &StringRef) -> Option<Value> {
        let mut current = Some(class.clone());
        while let Some(c) = current {
            let c = c.borrow();
            if let Some(m) = c.methods.get(name) {
                return Some(m.clone());
            }
            current = c.base.clone();
        }
        None
    }

    /// True if `class` is `target` or derives from it.
    pub fn derives_from(class: &ClassRef, target: &ClassRef) -> bool {
        let mut current = Some(class.clone());
        while let Some(c) = current {
            if Rc::ptr_eq(&c, target) {
                return true;
            }
            current = c.borrow().base.clone();
        }
        false
    }

    /// Create an instance: fields start from the class defaults.
    pub fn instantiate(heap: &Heap, class: &ClassRef) -> InstanceRef {
        let fields = class.borrow().field_defaults.clone();
        Rc::new(RefCell::new(Instance {
            class: class.clone(),
            fields,
            _ticket: heap.ticket(ObjKind::Instance),
        }))
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Class({})", self.name)
    }
}

/// An instance of a class: a flat field vector matching the class layout.
pub struct Instance {
    class: ClassRef,
    fields: Vec<Value>,
    _ticket: AllocTicket,
}

impl Instance {
    /// The instance's class.
    pub fn class(&self) -> ClassRef {
        self.class.clone()
    }

    /// Read a field slot by index.
    pub fn field(&self, index: usize) -> Option<Value> {
        self.fields.get(index).cloned()
    }

    /// Write a field slot by index. Returns false when out of range.
    pub fn set_field(&mut self, index: usize, value: Value) -> bool {
        match self.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Instance({})", self.class.borrow().name)
    }
}
