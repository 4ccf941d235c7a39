//! Host embedding surface for native functions.
//!
//! A native function receives a [`NativeCtx`]: a read-only view of the call's
//! argument window plus constructors for engine objects. Natives never see
//! engine internals; everything flows through [`Value`].

use std::any::Any;

use crate::alloc::Heap;
use crate::object::{Array, RbString, Table, UserData, Value, WeakRef};
use crate::vm::VmError;

/// The signature of a host function callable from script.
///
/// Returning `Err` raises a runtime error at the call site, catchable by the
/// script's `try` like any other fault.
pub type NativeFn = fn(&mut NativeCtx<'_>) -> Result<Value, VmError>;

/// The call context handed to a native function.
pub struct NativeCtx<'a> {
    heap: &'a Heap,
    /// The receiver followed by the arguments.
    window: &'a [Value],
}

impl<'a> NativeCtx<'a> {
    pub(crate) fn new(heap: &'a Heap, window: &'a [Value]) -> Self {
        Self { heap, window }
    }

    // ===== Arguments =====

    /// The receiver (`this`) of the call. Null for plain calls.
    pub fn this(&self) -> Value {
        self.window.first().cloned().unwrap_or(Value::Null)
    }

    /// Number of arguments (the receiver not included).
    pub fn arg_count(&self) -> usize {
        self.window.len().saturating_sub(1)
    }

    /// Argument `index` (zero-based), or null when absent.
    pub fn arg(&self, index: usize) -> Value {
        self.window.get(index + 1).cloned().unwrap_or(Value::Null)
    }

    /// Argument `index` as an integer.
    pub fn int_arg(&self, index: usize) -> Result<i64, VmError> {
        let v = self.arg(index);
        v.as_int().ok_or_else(|| {
            VmError::TypeMismatch(format!(
                "argument {} must be an integer, got {}",
                index,
                v.type_name()
            ))
        })
    }

    /// Argument `index` as a float, promoting integers.
    pub fn float_arg(&self, index: usize) -> Result<f64, VmError> {
        let v = self.arg(index);
        v.as_float().ok_or_else(|| {
            VmError::TypeMismatch(format!(
                "argument {} must be a number, got {}",
                index,
                v.type_name()
            ))
        })
    }

    /// Argument `index` as a string.
    pub fn str_arg(&self, index: usize) -> Result<&str, VmError> {
        match self.window.get(index + 1) {
            Some(Value::Str(s)) => Ok(s.as_str()),
            other => Err(VmError::TypeMismatch(format!(
                "argument {} must be a string, got {}",
                index,
                other.map_or("nothing", |v| v.type_name())
            ))),
        }
    }

    /// Raise an error from a native function.
    pub fn error(&self, message: impl Into<String>) -> VmError {
        VmError::Native(message.into())
    }

    // ===== Object construction =====

    /// The heap, for constructing engine objects directly.
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Allocate a string value.
    pub fn new_string(&self, s: &str) -> Value {
        Value::Str(RbString::new(self.heap, s))
    }

    /// Allocate an empty table value.
    pub fn new_table(&self) -> Value {
        Value::Table(Table::new(self.heap))
    }

    /// Allocate an array value with initial contents.
    pub fn new_array(&self, items: Vec<Value>) -> Value {
        Value::Array(Array::with_items(self.heap, items))
    }

    /// Allocate a userdata value carrying a host payload.
    pub fn new_userdata(&self, type_tag: u64, payload: Box<dyn Any>) -> Value {
        Value::UserData(UserData::new(self.heap, type_tag, payload))
    }

    /// Take a weak reference to a heap value. `None` for scalars and values
    /// that are already weak.
    pub fn weak_ref(&self, value: &Value) -> Option<Value> {
        WeakRef::acquire(value).map(Value::Weak)
    }
}
