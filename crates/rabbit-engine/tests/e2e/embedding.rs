//! The host embedding surface: native functions, globals, the allocator
//! hook, weak references, and frame inspection.

use std::rc::Rc;

use rabbit_engine::{CountingHook, NativeCtx, ObjKind, Value, Vm, VmError, WeakRef};

use super::harness::eval;

fn run_on(vm: &Vm, source: &str) -> Result<Value, VmError> {
    let proto = vm
        .compile(source, "test.rbt")
        .unwrap_or_else(|e| panic!("compilation failed: {e}\nsource:\n{source}"));
    vm.execute(&proto)
}

// ============================================================================
// Native functions
// ============================================================================

fn native_double(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Ok(Value::Int(ctx.int_arg(0)? * 2))
}

fn native_describe(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let label = ctx.str_arg(0)?.to_string();
    let n = ctx.int_arg(1)?;
    Ok(ctx.new_string(&format!("{label}:{n}")))
}

fn native_fail(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    Err(ctx.error("nope"))
}

fn native_pair(ctx: &mut NativeCtx<'_>) -> Result<Value, VmError> {
    let a = ctx.arg(0);
    let b = ctx.arg(1);
    Ok(ctx.new_array(vec![a, b]))
}

#[test]
fn test_native_call() {
    let vm = Vm::new();
    vm.register_native("double", native_double);
    let v = run_on(&vm, "return double(21);").unwrap();
    assert_eq!(v.as_int(), Some(42));
}

#[test]
fn test_native_argument_accessors() {
    let vm = Vm::new();
    vm.register_native("describe", native_describe);
    let v = run_on(&vm, r#"return describe("id", 7);"#).unwrap();
    assert_eq!(v.as_str(), Some("id:7"));
}

#[test]
fn test_native_type_error_is_catchable() {
    let vm = Vm::new();
    vm.register_native("double", native_double);
    let v = run_on(
        &vm,
        r#"try { return double("x"); } catch (e) { return "bad arg"; }"#,
    )
    .unwrap();
    assert_eq!(v.as_str(), Some("bad arg"));
}

#[test]
fn test_native_error_is_catchable() {
    let vm = Vm::new();
    vm.register_native("fail", native_fail);
    let v = run_on(&vm, "try { fail(); } catch (e) { return e; }").unwrap();
    assert_eq!(v.as_str(), Some("nope"));
}

#[test]
fn test_native_constructed_objects_flow_into_script() {
    let vm = Vm::new();
    vm.register_native("pair", native_pair);
    let v = run_on(&vm, "local p = pair(3, 4); return p[0] + p[1];").unwrap();
    assert_eq!(v.as_int(), Some(7));
}

#[test]
fn test_missing_native_argument_is_null() {
    let vm = Vm::new();
    vm.register_native("pair", native_pair);
    let v = run_on(&vm, "return pair(1)[1] == null;").unwrap();
    assert!(matches!(v, Value::Bool(true)), "got {v:?}");
}

// ============================================================================
// Globals
// ============================================================================

#[test]
fn test_host_set_global_is_visible_to_script() {
    let vm = Vm::new();
    vm.set_global("answer", Value::Int(42));
    let v = run_on(&vm, "return answer + 1;").unwrap();
    assert_eq!(v.as_int(), Some(43));
}

#[test]
fn test_script_globals_are_visible_to_host() {
    let vm = Vm::new();
    run_on(&vm, "x = 9;").unwrap();
    assert_eq!(vm.get_global("x").and_then(|v| v.as_int()), Some(9));
    assert!(vm.get_global("y").is_none());
}

#[test]
fn test_globals_persist_across_executions() {
    let vm = Vm::new();
    run_on(&vm, "count = 1;").unwrap();
    run_on(&vm, "count += 1;").unwrap();
    let v = run_on(&vm, "return count;").unwrap();
    assert_eq!(v.as_int(), Some(2));
}

#[test]
fn test_pcall_invokes_a_script_function() {
    let vm = Vm::new();
    run_on(&vm, "function add(a, b) { return a + b; }").unwrap();
    let f = vm.get_global("add").unwrap();
    let v = vm.pcall(&f, &[Value::Int(2), Value::Int(40)]).unwrap();
    assert_eq!(v.as_int(), Some(42));
}

#[test]
fn test_pcall_returns_faults_instead_of_unwinding() {
    let vm = Vm::new();
    run_on(&vm, "function boom() { throw \"kaboom\"; }").unwrap();
    let f = vm.get_global("boom").unwrap();
    match vm.pcall(&f, &[]) {
        Err(VmError::Thrown(v)) => assert_eq!(v.as_str(), Some("kaboom")),
        other => panic!("expected a thrown value, got {other:?}"),
    }
}

#[test]
fn test_pcall_rejects_non_callables() {
    let vm = Vm::new();
    let err = vm.pcall(&Value::Int(5), &[]).unwrap_err();
    assert!(matches!(err, VmError::NotCallable(_)), "got {err:?}");
}

#[test]
fn test_compile_expression() {
    let vm = Vm::new();
    let proto = vm.compile_expression("1 + 2 * 3", "expr").unwrap();
    let v = vm.execute(&proto).unwrap();
    assert_eq!(v.as_int(), Some(7));
}

// ============================================================================
// Allocator hook
// ============================================================================

#[test]
fn test_counting_hook_sees_script_objects_die() {
    let hook = Rc::new(CountingHook::new());
    let vm = Vm::with_hook(hook.clone());
    let baseline = hook.live();

    let proto = vm
        .compile(
            r#"
            local a = [1, 2, 3];
            local t = {x = a, s = "he" + "llo"};
            "#,
            "test.rbt",
        )
        .unwrap();
    assert!(hook.live() > baseline, "compilation allocates the prototype");

    let v = vm.execute(&proto).unwrap();
    assert!(v.is_null());
    drop(proto);
    assert_eq!(hook.live(), baseline, "no leaks after proto and locals die");
}

#[test]
fn test_counting_hook_tracks_rooted_objects() {
    let hook = Rc::new(CountingHook::new());
    let vm = Vm::with_hook(hook.clone());

    let proto = vm.compile("keep = {};", "test.rbt").unwrap();
    vm.execute(&proto).unwrap();
    drop(proto);
    assert_eq!(hook.live_of(ObjKind::Table), 2, "root table plus the global");

    vm.set_global("keep", Value::Null);
    assert_eq!(hook.live_of(ObjKind::Table), 1, "only the root table remains");
}

// ============================================================================
// Weak references
// ============================================================================

#[test]
fn test_weak_ref_resolves_while_strong_refs_exist() {
    let vm = Vm::new();
    run_on(&vm, "t = {n = 5};").unwrap();
    let strong = vm.get_global("t").unwrap();
    let weak = WeakRef::acquire(&strong).unwrap();
    assert!(!weak.is_expired());
    assert!(matches!(weak.resolve(), Value::Table(_)));
}

#[test]
fn test_weak_ref_expires_when_last_strong_ref_drops() {
    let vm = Vm::new();
    run_on(&vm, "t = {};").unwrap();
    let strong = vm.get_global("t").unwrap();
    let weak = WeakRef::acquire(&strong).unwrap();

    vm.set_global("t", Value::Null);
    assert!(!weak.is_expired(), "host still holds a strong ref");

    drop(strong);
    assert!(weak.is_expired());
    assert!(weak.resolve().is_null());
}

#[test]
fn test_scalars_have_no_weak_refs() {
    assert!(WeakRef::acquire(&Value::Int(1)).is_none());
    assert!(WeakRef::acquire(&Value::Null).is_none());
    assert!(WeakRef::acquire(&Value::Bool(true)).is_none());
}

// ============================================================================
// Frame inspection
// ============================================================================

#[test]
fn test_stack_frames_of_a_suspended_generator() {
    let source = "function worker(n) {\n    local total = n * 2;\n    yield total;\n}\nlocal g = worker(5);\nresume g;\nreturn g;";
    let Value::Thread(thread) = eval(source) else {
        panic!("expected a thread");
    };

    let frames = thread.borrow().stack_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].function, "worker");
    assert_eq!(frames[0].line, 3, "parked at the yield");

    let find = |name: &str| {
        frames[0]
            .locals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(find("n").and_then(|v| v.as_int()), Some(5));
    assert_eq!(find("total").and_then(|v| v.as_int()), Some(10));
}
