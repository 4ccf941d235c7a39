//! throw / try / catch and the delivery of engine faults to script traps.

use rabbit_engine::{Value, VmError};

use super::harness::*;

#[test]
fn test_throw_is_caught() {
    expect_str(r#"try { throw "boom"; } catch (e) { return e; }"#, "boom");
}

#[test]
fn test_try_without_error_skips_catch() {
    expect_int(
        r#"
        local r = 0;
        try { r = 1; } catch (e) { r = 2; }
        return r;
        "#,
        1,
    );
}

#[test]
fn test_uncaught_throw_reaches_the_host() {
    let err = expect_error("throw 42;");
    match err {
        VmError::Thrown(v) => assert_eq!(v.as_int(), Some(42)),
        other => panic!("expected Thrown, got {other:?}"),
    }
}

#[test]
fn test_thrown_values_can_be_structured() {
    expect_int(
        r#"
        try { throw {code = 7}; } catch (e) { return e.code; }
        "#,
        7,
    );
}

#[test]
fn test_engine_faults_arrive_as_messages() {
    expect_str(
        r#"try { return 1 / 0; } catch (e) { return e; }"#,
        "division by zero",
    );
    expect_str(
        r#"try { return nope; } catch (e) { return e; }"#,
        "undefined global 'nope'",
    );
}

#[test]
fn test_unwinding_closes_upvalues_of_removed_frames() {
    // The mid frame dies during unwinding; the closure it published must
    // still see the captured local afterwards.
    expect_int(
        r#"
        function deep() { throw "boom"; }
        function mid() {
            local kept = 7;
            saved = function() { return kept; };
            deep();
        }
        try { mid(); } catch (e) { }
        return saved();
        "#,
        7,
    );
}

#[test]
fn test_catch_across_call_frames() {
    expect_str(
        r#"
        function deep() { throw "deep"; }
        function mid() { return deep(); }
        function top() {
            try { return mid(); } catch (e) { return "caught " + e; }
        }
        return top();
        "#,
        "caught deep",
    );
}

#[test]
fn test_innermost_trap_wins() {
    expect_str(
        r#"
        try {
            try { throw "x"; } catch (e) { return "inner"; }
        } catch (e) {
            return "outer";
        }
        "#,
        "inner",
    );
}

#[test]
fn test_rethrow_reaches_the_outer_trap() {
    expect_str(
        r#"
        try {
            try { throw "x"; } catch (e) { throw e + "y"; }
        } catch (e) {
            return e;
        }
        "#,
        "xy",
    );
}

#[test]
fn test_execution_continues_after_catch() {
    expect_int(
        r#"
        local n = 0;
        try { throw "x"; } catch (e) { n = 1; }
        n += 10;
        return n;
        "#,
        11,
    );
}

#[test]
fn test_state_is_consistent_after_caught_fault() {
    expect_int(
        r#"
        local x = 1;
        try { x = 2 + (1 / 0); } catch (e) { }
        return x;
        "#,
        1,
    );
}

#[test]
fn test_catch_variable_is_scoped_to_the_handler() {
    let err = expect_error(
        r#"
        try { throw 1; } catch (e) { }
        return e;
        "#,
    );
    assert!(matches!(err, VmError::UndefinedGlobal(_)), "got {err:?}");
}

#[test]
fn test_return_through_a_try_clears_the_trap() {
    // The frame's trap dies with the frame; the later throw must not be
    // routed back into it.
    expect_str(
        r#"
        function f() {
            try { return 1; } catch (e) { return "wrong"; }
        }
        f();
        try { throw "after"; } catch (e) { return e; }
        "#,
        "after",
    );
}

#[test]
fn test_break_out_of_a_try_clears_the_trap() {
    expect_str(
        r#"
        function f() {
            while (true) {
                try { break; } catch (e) { return "wrong"; }
            }
            throw "after";
        }
        try { f(); } catch (e) { return e; }
        "#,
        "after",
    );
}

#[test]
fn test_continue_out_of_a_try_clears_the_trap() {
    expect_str(
        r#"
        function f() {
            for (local i = 0; i < 2; i += 1) {
                try { continue; } catch (e) { return "wrong"; }
            }
            throw "after";
        }
        try { f(); } catch (e) { return e; }
        "#,
        "after",
    );
}

#[test]
fn test_trap_catches_fault_from_a_closure_call() {
    expect_str(
        r#"
        function make(n) {
            return function() {
                if (n == 0) throw "zero";
                return n;
            };
        }
        local f = make(0);
        try { f(); } catch (e) { return e; }
        "#,
        "zero",
    );
}

#[test]
fn test_missing_member_is_catchable() {
    expect_str(
        r#"
        local t = {a = 1};
        try { return t.b; } catch (e) { return "no b"; }
        "#,
        "no b",
    );
}

#[test]
fn test_throw_null() {
    let err = expect_error("throw null;");
    match err {
        VmError::Thrown(v) => assert!(matches!(v, Value::Null)),
        other => panic!("expected Thrown, got {other:?}"),
    }
}
