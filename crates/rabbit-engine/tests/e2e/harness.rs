//! Test harness: compile a source string on a fresh VM, execute it, and
//! assert on the returned value.

#![allow(dead_code)]

use rabbit_engine::{Value, Vm, VmError};

/// Compile and execute `source` on a fresh VM.
///
/// Compilation failures panic (the compile-error tests live elsewhere);
/// runtime faults are returned for inspection.
pub fn run(source: &str) -> Result<Value, VmError> {
    let vm = Vm::new();
    let proto = vm
        .compile(source, "test.rbt")
        .unwrap_or_else(|e| panic!("compilation failed: {e}\nsource:\n{source}"));
    vm.execute(&proto)
}

/// Compile and execute, panicking on any failure.
pub fn eval(source: &str) -> Value {
    match run(source) {
        Ok(v) => v,
        Err(e) => panic!("execution failed: {e}\nsource:\n{source}"),
    }
}

pub fn expect_int(source: &str, expected: i64) {
    let v = eval(source);
    match v.as_int() {
        Some(actual) => assert_eq!(actual, expected, "wrong result for:\n{source}"),
        None => panic!("expected Int({expected}), got {v:?} for:\n{source}"),
    }
}

pub fn expect_float(source: &str, expected: f64) {
    let v = eval(source);
    match v {
        Value::Float(actual) => assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual} for:\n{source}"
        ),
        other => panic!("expected Float({expected}), got {other:?} for:\n{source}"),
    }
}

pub fn expect_bool(source: &str, expected: bool) {
    let v = eval(source);
    match v {
        Value::Bool(actual) => assert_eq!(actual, expected, "wrong result for:\n{source}"),
        other => panic!("expected Bool({expected}), got {other:?} for:\n{source}"),
    }
}

pub fn expect_str(source: &str, expected: &str) {
    let v = eval(source);
    match v.as_str() {
        Some(actual) => assert_eq!(actual, expected, "wrong result for:\n{source}"),
        None => panic!("expected Str({expected:?}), got {v:?} for:\n{source}"),
    }
}

pub fn expect_null(source: &str) {
    let v = eval(source);
    assert!(v.is_null(), "expected null, got {v:?} for:\n{source}");
}

/// Execute expecting a runtime fault; returns it for closer inspection.
pub fn expect_error(source: &str) -> VmError {
    match run(source) {
        Ok(v) => panic!("expected a runtime error, got {v:?} for:\n{source}"),
        Err(e) => e,
    }
}
