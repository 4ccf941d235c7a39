//! The tagged value type.

use std::fmt;
use std::rc::Rc;

use crate::object::{
    ArrayRef, ClassRef, ClosureRef, InstanceRef, NativeRef, StringRef, TableRef, UserDataRef,
    WeakRef,
};
use crate::vm::thread::ThreadRef;

/// A Rabbit value: an inline scalar or a strong reference to a heap object.
///
/// Cloning a `Value` clones the strong reference (bumping the referent's
/// strong count); dropping it releases the reference. A live `Value` never
/// dangles: its referent has strong-count >= 1 by construction.
#[derive(Clone)]
pub enum Value {
    /// The null value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Immutable string
    Str(StringRef),
    /// Table
    Table(TableRef),
    /// Array
    Array(ArrayRef),
    /// Script closure
    Closure(ClosureRef),
    /// Native function
    Native(NativeRef),
    /// Class
    Class(ClassRef),
    /// Class instance
    Instance(InstanceRef),
    /// Host-owned opaque payload
    UserData(UserDataRef),
    /// Generator thread
    Thread(ThreadRef),
    /// Weak reference
    Weak(WeakRef),
}

impl Value {
    /// The type name reported by `typeof` and used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
            Value::Array(_) => "array",
            Value::Closure(_) => "function",
            Value::Native(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::UserData(_) => "userdata",
            Value::Thread(_) => "thread",
            Value::Weak(_) => "weakref",
        }
    }

    /// Only `null` and `false` are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// The integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float payload, promoting `Int` to float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Equality as observed by the script `==` operator: numbers compare
    /// across int/float, strings by content, other heap objects by identity.
    /// Values of differing kinds are unequal, never an error.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::UserData(a), Value::UserData(b)) => Rc::ptr_eq(a, b),
            (Value::Thread(a), Value::Thread(b)) => Rc::ptr_eq(a, b),
            (Value::Weak(a), Value::Weak(b)) => a.anchor_eq(b),
            _ => false,
        }
    }

    /// Human-readable rendering used by `tostring` and error formatting.
    /// Shallow on purpose: containers print as type markers, never their
    /// contents (which may be cyclic).
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Str(s) => s.as_str().to_string(),
            Value::Closure(c) => format!("<function: {}>", c.proto.name),
            Value::Native(n) => format!("<native: {}>", n.name),
            Value::Class(c) => format!("<class: {}>", c.borrow().name),
            other => format!("<{}>", other.type_name()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

// Shallow on purpose: tables and instances can be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            other => f.write_str(other.type_name()),
        }
    }
}
