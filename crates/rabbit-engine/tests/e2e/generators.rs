//! Generator threads: creation, resumption, completion, and state.

use rabbit_engine::{ThreadState, Value, VmError};

use super::harness::*;

#[test]
fn test_calling_a_generator_returns_a_thread() {
    expect_str(
        r#"
        function gen() { yield 1; }
        return typeof gen();
        "#,
        "thread",
    );
}

#[test]
fn test_yields_arrive_in_order() {
    expect_int(
        r#"
        function gen() { yield 1; yield 2; yield 3; }
        local g = gen();
        local a = resume g;
        local b = resume g;
        local c = resume g;
        return a * 100 + b * 10 + c;
        "#,
        123,
    );
}

#[test]
fn test_generator_receives_arguments() {
    expect_int(
        r#"
        function upto(n) {
            for (local i = 0; i < n; i += 1) { yield i; }
        }
        local g = upto(3);
        return (resume g) + (resume g) + (resume g);
        "#,
        3,
    );
}

#[test]
fn test_completion_returns_the_return_value() {
    expect_int(
        r#"
        function gen() { yield 1; return 42; }
        local g = gen();
        resume g;
        return resume g;
        "#,
        42,
    );
}

#[test]
fn test_falling_off_the_end_returns_null() {
    expect_null(
        r#"
        function gen() { yield 1; }
        local g = gen();
        resume g;
        return resume g;
        "#,
    );
}

#[test]
fn test_resuming_a_done_thread_fails() {
    let err = expect_error(
        r#"
        function gen() { yield 1; }
        local g = gen();
        resume g;
        resume g;
        return resume g;
        "#,
    );
    assert_eq!(err, VmError::ThreadNotResumable);
}

#[test]
fn test_resume_requires_a_thread() {
    let err = expect_error("return resume 5;");
    assert!(matches!(err, VmError::TypeMismatch(_)), "got {err:?}");
}

#[test]
fn test_generator_keeps_local_state_across_yields() {
    expect_int(
        r#"
        function acc() {
            local total = 0;
            while (true) {
                total += 10;
                yield total;
            }
        }
        local g = acc();
        resume g;
        resume g;
        return resume g;
        "#,
        30,
    );
}

#[test]
fn test_generator_resuming_another_generator() {
    expect_int(
        r#"
        function inner() { yield 10; yield 20; }
        function outer() {
            local i = inner();
            yield (resume i) + 1;
            yield (resume i) + 1;
        }
        local o = outer();
        return (resume o) + (resume o);
        "#,
        32,
    );
}

#[test]
fn test_error_inside_generator_reaches_the_resumer() {
    expect_str(
        r#"
        function gen() { yield 1; throw "inside"; }
        local g = gen();
        resume g;
        try { resume g; } catch (e) { return e; }
        "#,
        "inside",
    );
}

#[test]
fn test_dead_generator_is_not_resumable() {
    let err = expect_error(
        r#"
        function gen() { throw "boom"; }
        local g = gen();
        try { resume g; } catch (e) { }
        return resume g;
        "#,
    );
    assert_eq!(err, VmError::ThreadNotResumable);
}

// ============================================================================
// State observed from the host
// ============================================================================

fn thread_state(source: &str) -> ThreadState {
    match eval(source) {
        Value::Thread(t) => t.borrow().state(),
        other => panic!("expected a thread, got {other:?}"),
    }
}

#[test]
fn test_fresh_generator_is_idle() {
    let state = thread_state(
        r#"
        function gen() { yield 1; }
        return gen();
        "#,
    );
    assert_eq!(state, ThreadState::Idle);
}

#[test]
fn test_yielded_generator_is_suspended() {
    let state = thread_state(
        r#"
        function gen() { yield 1; }
        local g = gen();
        resume g;
        return g;
        "#,
    );
    assert_eq!(state, ThreadState::Suspended);
}

#[test]
fn test_finished_generator_is_done() {
    let state = thread_state(
        r#"
        function gen() { yield 1; }
        local g = gen();
        resume g;
        resume g;
        return g;
        "#,
    );
    assert_eq!(state, ThreadState::Done);
}

#[test]
fn test_failed_generator_is_in_error_state() {
    let state = thread_state(
        r#"
        function gen() { throw "boom"; }
        local g = gen();
        try { resume g; } catch (e) { }
        return g;
        "#,
    );
    assert_eq!(state, ThreadState::Error);
}
