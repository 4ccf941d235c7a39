//! The dynamic object model.
//!
//! Every heap-resident value shares one ownership discipline: strong
//! reference counting via `Rc`, with the `Rc` control block acting as the
//! weak anchor that outlives the payload so outstanding [`WeakRef`]s observe
//! expiry instead of touching freed memory. Interior mutability is per
//! object (`RefCell`), safe because execution is single-threaded and
//! cooperative.

mod array;
mod class;
mod closure;
mod string;
mod table;
mod userdata;
pub mod value;
mod weak;

use std::cell::RefCell;
use std::rc::Rc;

pub use array::Array;
pub use class::{Class, Instance};
pub use closure::{Closure, NativeFunction, Upvalue};
pub use string::RbString;
pub use table::{Table, TableKey};
pub use userdata::UserData;
pub use value::Value;
pub use weak::WeakRef;

/// Strong reference to an engine string.
pub type StringRef = Rc<RbString>;
/// Strong reference to a table.
pub type TableRef = Rc<RefCell<Table>>;
/// Strong reference to an array.
pub type ArrayRef = Rc<RefCell<Array>>;
/// Strong reference to a closure.
pub type ClosureRef = Rc<Closure>;
/// Strong reference to a native function.
pub type NativeRef = Rc<NativeFunction>;
/// Strong reference to a class.
pub type ClassRef = Rc<RefCell<Class>>;
/// Strong reference to an instance.
pub type InstanceRef = Rc<RefCell<Instance>>;
/// Strong reference to a userdata payload.
pub type UserDataRef = Rc<RefCell<UserData>>;
/// Shared mutable upvalue cell.
pub type UpvalueRef = Rc<RefCell<Upvalue>>;
