//! Branches, loops, foreach iteration, and switch dispatch.

use rabbit_engine::VmError;

use super::harness::*;

// ============================================================================
// if / else
// ============================================================================

#[test]
fn test_if_taken() {
    expect_int("if (1 < 2) return 1; return 0;", 1);
}

#[test]
fn test_if_not_taken() {
    expect_int("if (2 < 1) return 1; return 0;", 0);
}

#[test]
fn test_if_else() {
    expect_str(r#"if (false) return "a"; else return "b";"#, "b");
}

#[test]
fn test_else_if_chain() {
    expect_str(
        r#"
        function grade(n) {
            if (n >= 90) return "A";
            else if (n >= 80) return "B";
            else return "C";
        }
        return grade(85) + grade(95) + grade(10);
        "#,
        "BAC",
    );
}

// ============================================================================
// while / for
// ============================================================================

#[test]
fn test_while_loop() {
    expect_int(
        r#"
        local s = 0;
        local i = 1;
        while (i <= 10) { s += i; i += 1; }
        return s;
        "#,
        55,
    );
}

#[test]
fn test_while_false_never_runs() {
    expect_int("local n = 0; while (false) { n = 1; } return n;", 0);
}

#[test]
fn test_for_loop() {
    expect_int(
        "local s = 0; for (local i = 1; i <= 5; i += 1) { s += i; } return s;",
        15,
    );
}

#[test]
fn test_for_loop_variable_is_scoped() {
    let err = expect_error(
        "for (local i = 0; i < 3; i += 1) { } return i;",
    );
    assert!(matches!(err, VmError::UndefinedGlobal(_)), "got {err:?}");
}

#[test]
fn test_break() {
    expect_int(
        r#"
        local s = 0;
        for (local i = 0; i < 100; i += 1) {
            if (i == 5) break;
            s += i;
        }
        return s;
        "#,
        10,
    );
}

#[test]
fn test_continue() {
    expect_int(
        r#"
        local s = 0;
        for (local i = 0; i < 10; i += 1) {
            if (i % 2 == 0) continue;
            s += i;
        }
        return s;
        "#,
        25,
    );
}

#[test]
fn test_nested_loops_break_inner_only() {
    expect_int(
        r#"
        local n = 0;
        for (local i = 0; i < 3; i += 1) {
            for (local j = 0; j < 10; j += 1) {
                if (j == 2) break;
                n += 1;
            }
        }
        return n;
        "#,
        6,
    );
}

// ============================================================================
// foreach
// ============================================================================

#[test]
fn test_foreach_array_values() {
    expect_int(
        "local s = 0; foreach (v in [10, 20, 30]) { s += v; } return s;",
        60,
    );
}

#[test]
fn test_foreach_array_indices() {
    expect_int(
        r#"
        local s = 0;
        foreach (i, v in [5, 6, 7]) { s += i * v; }
        return s;
        "#,
        20,
    );
}

#[test]
fn test_foreach_table() {
    expect_int(
        r#"
        local t = {a = 1, b = 2, c = 3};
        local s = 0;
        foreach (k, v in t) { s += v; }
        return s;
        "#,
        6,
    );
}

#[test]
fn test_foreach_empty_array() {
    expect_int("local n = 0; foreach (v in []) { n += 1; } return n;", 0);
}

#[test]
fn test_foreach_with_break_and_continue() {
    expect_int(
        r#"
        local s = 0;
        foreach (v in [1, 2, 3, 4, 5]) {
            if (v == 2) continue;
            if (v == 5) break;
            s += v;
        }
        return s;
        "#,
        8,
    );
}

#[test]
fn test_foreach_non_container_fails() {
    let err = expect_error("foreach (v in 42) { }");
    assert!(matches!(err, VmError::TypeMismatch(_)), "got {err:?}");
}

// ============================================================================
// switch
// ============================================================================

#[test]
fn test_switch_dispatch() {
    let source = r#"
        function pick(n) {
            local out = 0;
            switch (n) {
                case 1: out = 10;
                case 2: out = 20;
                default: out = 99;
            }
            return out;
        }
        return pick(%N%);
    "#;
    expect_int(&source.replace("%N%", "1"), 10);
    expect_int(&source.replace("%N%", "2"), 20);
    expect_int(&source.replace("%N%", "7"), 99);
}

#[test]
fn test_switch_arms_do_not_fall_through() {
    expect_int(
        r#"
        local hits = 0;
        switch (1) {
            case 1: hits += 1;
            case 2: hits += 10;
            default: hits += 100;
        }
        return hits;
        "#,
        1,
    );
}

#[test]
fn test_switch_on_strings() {
    expect_int(
        r#"
        switch ("b") {
            case "a": return 1;
            case "b": return 2;
            default: return 3;
        }
        "#,
        2,
    );
}

#[test]
fn test_switch_without_default_falls_past() {
    expect_int("switch (9) { case 1: return 1; } return 0;", 0);
}

#[test]
fn test_break_inside_switch() {
    expect_int(
        r#"
        local n = 0;
        switch (1) {
            case 1:
                n = 1;
                break;
        }
        return n;
        "#,
        1,
    );
}

#[test]
fn test_continue_skips_switch_to_loop() {
    expect_int(
        r#"
        local s = 0;
        for (local i = 0; i < 5; i += 1) {
            switch (i % 2) {
                case 0: continue;
            }
            s += i;
        }
        return s;
        "#,
        4,
    );
}

// ============================================================================
// Scoping
// ============================================================================

#[test]
fn test_block_shadowing() {
    expect_int(
        r#"
        local x = 1;
        {
            local x = 2;
            x += 10;
        }
        return x;
        "#,
        1,
    );
}

#[test]
fn test_local_initializer_sees_outer_binding() {
    expect_int(
        r#"
        local x = 7;
        {
            local x = x + 1;
            return x;
        }
        "#,
        8,
    );
}
