//! Function declaration, calls, recursion, and closures.

use rabbit_engine::VmError;

use super::harness::*;

#[test]
fn test_basic_call() {
    expect_int(
        r#"
        function add(a, b) { return a + b; }
        return add(2, 3);
        "#,
        5,
    );
}

#[test]
fn test_missing_arguments_are_null() {
    expect_bool(
        r#"
        function f(a, b) { return b == null; }
        return f(1);
        "#,
        true,
    );
}

#[test]
fn test_extra_arguments_are_dropped() {
    expect_int(
        r#"
        function f(a) { return a; }
        return f(1, 2, 3);
        "#,
        1,
    );
}

#[test]
fn test_function_without_return_yields_null() {
    expect_null(
        r#"
        function f() { local x = 1; }
        return f();
        "#,
    );
}

#[test]
fn test_recursion() {
    expect_int(
        r#"
        function fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        return fib(10);
        "#,
        55,
    );
}

#[test]
fn test_nested_function_is_local_and_recursive() {
    expect_int(
        r#"
        function outer() {
            function fact(n) {
                if (n <= 1) return 1;
                return n * fact(n - 1);
            }
            return fact(5);
        }
        return outer();
        "#,
        120,
    );
}

#[test]
fn test_anonymous_function() {
    expect_int(
        r#"
        local f = function(x) { return x * 2; };
        return f(21);
        "#,
        42,
    );
}

#[test]
fn test_functions_are_first_class() {
    expect_int(
        r#"
        function apply(f, x) { return f(x); }
        return apply(function(n) { return n + 1; }, 41);
        "#,
        42,
    );
}

// ============================================================================
// Closures & upvalues
// ============================================================================

#[test]
fn test_closure_counter() {
    expect_int(
        r#"
        function counter() {
            local n = 0;
            return function() { n += 1; return n; };
        }
        local c = counter();
        c();
        c();
        return c();
        "#,
        3,
    );
}

#[test]
fn test_counters_are_independent() {
    expect_int(
        r#"
        function counter() {
            local n = 0;
            return function() { n += 1; return n; };
        }
        local a = counter();
        local b = counter();
        a();
        a();
        b();
        return a() * 10 + b();
        "#,
        32,
    );
}

#[test]
fn test_closures_share_one_upvalue_cell() {
    expect_int(
        r#"
        function make() {
            local n = 0;
            local t = {};
            t.inc = function() { n += 1; };
            t.get = function() { return n; };
            return t;
        }
        local t = make();
        t.inc();
        t.inc();
        return t.get();
        "#,
        2,
    );
}

#[test]
fn test_capture_through_two_levels() {
    expect_int(
        r#"
        function outer() {
            local x = 10;
            function middle() {
                function inner() { return x + 1; }
                return inner();
            }
            return middle();
        }
        return outer();
        "#,
        11,
    );
}

#[test]
fn test_loop_closures_capture_live_variable() {
    // One `local i` cell per loop entry is not promised; the loop variable
    // is shared, so late calls see its final value.
    expect_int(
        r#"
        local fs = [0, 0, 0];
        for (local i = 0; i < 3; i += 1) {
            fs[i] = function() { return i; };
        }
        return fs[0]() + fs[1]() + fs[2]();
        "#,
        9,
    );
}

// ============================================================================
// Globals & call errors
// ============================================================================

#[test]
fn test_assignment_creates_global() {
    expect_int("g = 5; return g + 1;", 6);
}

#[test]
fn test_reading_undefined_global_fails() {
    let err = expect_error("return nothing_here;");
    assert!(
        matches!(err, VmError::UndefinedGlobal(ref n) if n == "nothing_here"),
        "got {err:?}"
    );
}

#[test]
fn test_calling_a_non_function_fails() {
    let err = expect_error("local x = 5; return x();");
    assert!(matches!(err, VmError::NotCallable(_)), "got {err:?}");
}

#[test]
fn test_unbounded_recursion_is_cut_off() {
    let err = expect_error(
        r#"
        function f() { return f(); }
        return f();
        "#,
    );
    assert_eq!(err, VmError::CallDepthExceeded);
}

#[test]
fn test_wide_frames_overflow_the_value_stack() {
    // Every frame reserves a slot per local, so recursion through a wide
    // frame exhausts the value stack before the call-depth limit trips.
    let mut body = String::new();
    for i in 0..200 {
        body.push_str(&format!("local v{i} = {i}; "));
    }
    let source = format!("function wide() {{ {body} wide(); }} wide();");
    let err = expect_error(&source);
    assert_eq!(err, VmError::StackOverflow);
}
