//! Standard library for the Rabbit scripting language.
//!
//! Everything here goes through the engine's public embedding surface: each
//! function is a plain [`NativeFn`] registered into the root table by
//! [`install`]. No I/O is included — the engine embeds into a host, and the
//! host decides how scripts talk to the outside world.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use rabbit_engine::{NativeCtx, ThreadState, Value, Vm, VmError};

/// Register the standard library into `vm`'s root table.
pub fn install(vm: &Vm) {
    // containers
    vm.register_native("len", len);
    vm.register_native("push", push);
    vm.register_native("pop", pop);
    vm.register_native("insert", insert);
    vm.register_native("remove", remove);
    vm.register_native("resize", resize);
    // conversions
    vm.register_native("tostring", tostring);
    vm.register_native("tointeger", tointeger);
    vm.register_native("tofloat", tofloat);
    // math
    vm.register_native("abs", abs);
    vm.register_native("floor", floor);
    vm.register_native("ceil", ceil);
    vm.register_native("sqrt", sqrt);
    vm.register_native("min", min);
    vm.register_native("max", max);
    // strings
    vm.register_native("upper", upper);
    vm.register_native("lower", lower);
    vm.register_native("find", find);
    vm.register_native("slice", slice);
    // object model
    vm.register_native("weakref", weakref);
    vm.register_native("setdelegate", setdelegate);
    vm.register_native("getdelegate", getdelegate);
    vm.register_native("status", status);
    vm.register_native("newuserdata", newuserdata);
}

fn type_error(what: &str, got: &Value) -> VmError {
    VmError::TypeMismatch(format!("{what}, got {}", got.type_name()))
}

// ===== Containers =====

fn len(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let v = ctx.arg(0);
    let n = match &v {
        Value::Str(s) => s.len(),
        Value::Array(a) => a.borrow().len(),
        Value::Table(t) => t.borrow().len(),
        other => return Err(type_error("len expects a string, array or table", other)),
    };
    Ok(Value::Int(n as i64))
}

fn array_arg(ctx: &NativeCtx<'_>, index: usize) -> Result<rabbit_engine::object::ArrayRef, VmError> {
    match ctx.arg(index) {
        Value::Array(a) => Ok(a),
        other => Err(type_error("expected an array", &other)),
    }
}

fn push(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let arr = array_arg(ctx, 0)?;
    arr.borrow_mut().push(ctx.arg(1));
    Ok(Value::Null)
}

fn pop(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let arr = array_arg(ctx, 0)?;
    let v = arr.borrow_mut().pop();
    Ok(v.unwrap_or(Value::Null))
}

fn insert(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let arr = array_arg(ctx, 0)?;
    let index = ctx.int_arg(1)?;
    let ok = index >= 0 && arr.borrow_mut().insert(index as usize, ctx.arg(2));
    if !ok {
        return Err(VmError::IndexOutOfRange(index));
    }
    Ok(Value::Null)
}

fn remove(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let arr = array_arg(ctx, 0)?;
    let index = ctx.int_arg(1)?;
    if index < 0 {
        return Err(VmError::IndexOutOfRange(index));
    }
    let v = arr.borrow_mut().remove(index as usize);
    v.ok_or(VmError::IndexOutOfRange(index))
}

fn resize(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let arr = array_arg(ctx, 0)?;
    let len = ctx.int_arg(1)?;
    if len < 0 {
        return Err(VmError::IndexOutOfRange(len));
    }
    arr.borrow_mut().resize(len as usize);
    Ok(Value::Null)
}

// ===== Conversions =====

fn tostring(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Ok(ctx.new_string(&ctx.arg(0).to_display_string()))
}

/// Converts numbers and numeric strings; anything else becomes null.
fn tointeger(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Ok(match ctx.arg(0) {
        Value::Int(i) => Value::Int(i),
        Value::Float(f) => Value::Int(f as i64),
        Value::Str(s) => s
            .as_str()
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or(Value::Null),
        Value::Bool(b) => Value::Int(b as i64),
        _ => Value::Null,
    })
}

/// Converts numbers and numeric strings; anything else becomes null.
fn tofloat(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Ok(match ctx.arg(0) {
        Value::Int(i) => Value::Float(i as f64),
        Value::Float(f) => Value::Float(f),
        Value::Str(s) => s
            .as_str()
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    })
}

// ===== Math =====

fn abs(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    match ctx.arg(0) {
        Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(type_error("abs expects a number", &other)),
    }
}

fn floor(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Ok(Value::Float(ctx.float_arg(0)?.floor()))
}

fn ceil(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Ok(Value::Float(ctx.float_arg(0)?.ceil()))
}

fn sqrt(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Ok(Value::Float(ctx.float_arg(0)?.sqrt()))
}

/// Two integers stay integer; any float operand makes the result float.
fn min(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    numeric_pick(ctx, true)
}

/// Two integers stay integer; any float operand makes the result float.
fn max(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    numeric_pick(ctx, false)
}

fn numeric_pick(ctx: &NativeCtx<'_>, smaller: bool) -> Result<Value, VmError> {
    match (ctx.arg(0), ctx.arg(1)) {
        (Value::Int(a), Value::Int(b)) => {
            Ok(Value::Int(if smaller { a.min(b) } else { a.max(b) }))
        }
        (a, b) => {
            let (x, y) = (
                a.as_float().ok_or_else(|| type_error("expected a number", &a))?,
                b.as_float().ok_or_else(|| type_error("expected a number", &b))?,
            );
            Ok(Value::Float(if smaller { x.min(y) } else { x.max(y) }))
        }
    }
}

// ===== Strings =====

fn upper(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let s = ctx.str_arg(0)?.to_uppercase();
    Ok(ctx.new_string(&s))
}

fn lower(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let s = ctx.str_arg(0)?.to_lowercase();
    Ok(ctx.new_string(&s))
}

/// Byte index of the first occurrence of the needle, or null.
fn find(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let haystack = ctx.str_arg(0)?;
    let needle = ctx.str_arg(1)?;
    Ok(haystack.find(needle).map_or(Value::Null, |i| Value::Int(i as i64)))
}

/// Substring by byte range. Negative indices count from the end; the end
/// index defaults to the string length.
fn slice(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let s = ctx.str_arg(0)?;
    let len = s.len() as i64;
    let normalize = |i: i64| -> usize {
        let i = if i < 0 { len + i } else { i };
        i.clamp(0, len) as usize
    };
    let start = normalize(ctx.int_arg(1)?);
    let end = if ctx.arg_count() > 2 { normalize(ctx.int_arg(2)?) } else { len as usize };
    let out = if start <= end { s.get(start..end) } else { None };
    let out = out.unwrap_or("").to_string();
    Ok(ctx.new_string(&out))
}

// ===== Object model =====

/// A weak reference to a heap value; scalars yield null.
fn weakref(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Ok(ctx.weak_ref(&ctx.arg(0)).unwrap_or(Value::Null))
}

fn setdelegate(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    use rabbit_engine::object::Table;
    let table = match ctx.arg(0) {
        Value::Table(t) => t,
        other => return Err(type_error("setdelegate expects a table", &other)),
    };
    let delegate = match ctx.arg(1) {
        Value::Table(d) => Some(d),
        Value::Null => None,
        other => return Err(type_error("delegate must be a table or null", &other)),
    };
    if !Table::set_delegate(&table, delegate) {
        return Err(ctx.error("delegate chain would contain a cycle"));
    }
    Ok(Value::Null)
}

fn getdelegate(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    match ctx.arg(0) {
        Value::Table(t) => {
            let d = t.borrow().delegate();
            Ok(d.map_or(Value::Null, Value::Table))
        }
        other => Err(type_error("getdelegate expects a table", &other)),
    }
}

/// The lifecycle state of a thread, as a string.
fn status(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    match ctx.arg(0) {
        Value::Thread(t) => {
            let state = t.borrow().state();
            let name = match state {
                ThreadState::Idle => "idle",
                ThreadState::Running => "running",
                ThreadState::Suspended => "suspended",
                ThreadState::Done => "done",
                ThreadState::Error => "error",
            };
            Ok(ctx.new_string(name))
        }
        other => Err(type_error("status expects a thread", &other)),
    }
}

/// A userdata value with the given type tag and an empty payload. Mostly a
/// test aid; hosts build userdata with real payloads through `NativeCtx`.
fn newuserdata(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let tag = ctx.int_arg(0)? as u64;
    Ok(ctx.new_userdata(tag, Box::new(())))
}
