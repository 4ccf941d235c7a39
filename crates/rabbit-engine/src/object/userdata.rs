//! Host-owned opaque payloads.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::alloc::{AllocTicket, Heap, ObjKind};
use crate::object::UserDataRef;

/// An opaque host payload carried through the engine untouched.
///
/// The `type_tag` is assigned by the host and lets native functions verify
/// they were handed the userdata flavor they expect before downcasting.
pub struct UserData {
    type_tag: u64,
    payload: Box<dyn Any>,
    _ticket: AllocTicket,
}

impl UserData {
    /// Allocate a userdata value through `heap`.
    pub fn new(heap: &Heap, type_tag: u64, payload: Box<dyn Any>) -> UserDataRef {
        Rc::new(RefCell::new(UserData {
            type_tag,
            payload,
            _ticket: heap.ticket(ObjKind::UserData),
        }))
    }

    /// The host-assigned type tag.
    pub fn type_tag(&self) -> u64 {
        self.type_tag
    }

    /// Borrow the payload, downcast to `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Mutably borrow the payload, downcast to `T`.
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.payload.downcast_mut::<T>()
    }
}

impl std::fmt::Debug for UserData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserData(tag={})", self.type_tag)
    }
}
