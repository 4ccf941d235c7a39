//! Arithmetic, comparison, logic, and bitwise operator semantics.

use rabbit_engine::VmError;

use super::harness::*;

// ============================================================================
// Integer arithmetic
// ============================================================================

#[test]
fn test_integer_add() {
    expect_int("return 10 + 5;", 15);
}

#[test]
fn test_integer_subtract() {
    expect_int("return 10 - 15;", -5);
}

#[test]
fn test_integer_multiply() {
    expect_int("return 6 * 7;", 42);
}

#[test]
fn test_precedence() {
    expect_int("return 2 + 3 * 4;", 14);
    expect_int("return (2 + 3) * 4;", 20);
}

#[test]
fn test_exact_division_stays_integer() {
    expect_int("return 6 / 2;", 3);
    expect_int("return -9 / 3;", -3);
}

#[test]
fn test_inexact_division_promotes_to_float() {
    expect_float("return 7 / 2;", 3.5);
    expect_float("return 1 / 4;", 0.25);
}

#[test]
fn test_division_by_zero() {
    assert_eq!(expect_error("return 1 / 0;"), VmError::DivisionByZero);
}

#[test]
fn test_modulo() {
    expect_int("return 10 % 3;", 1);
    expect_int("return -7 % 2;", -1);
}

#[test]
fn test_modulo_by_zero() {
    assert_eq!(expect_error("return 5 % 0;"), VmError::DivisionByZero);
}

#[test]
fn test_integer_overflow_wraps() {
    expect_int(
        "return 9223372036854775807 + 1;",
        i64::MIN,
    );
}

// ============================================================================
// Float arithmetic & numeric promotion
// ============================================================================

#[test]
fn test_float_arithmetic() {
    expect_float("return 1.5 + 2.25;", 3.75);
    expect_float("return 10.0 / 4.0;", 2.5);
}

#[test]
fn test_mixed_arithmetic_promotes() {
    expect_float("return 1 + 2.0;", 3.0);
    expect_float("return 2.5 * 2;", 5.0);
}

#[test]
fn test_unary_negation() {
    expect_int("return -5;", -5);
    expect_float("return -(1.5);", -1.5);
    expect_int("return -(2 + 3);", -5);
}

#[test]
fn test_negating_non_number_fails() {
    let err = expect_error(r#"return -"abc";"#);
    assert!(matches!(err, VmError::TypeMismatch(_)), "got {err:?}");
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_string_concatenation() {
    expect_str(r#"return "foo" + "bar";"#, "foobar");
}

#[test]
fn test_string_literal_concat_coerces_numbers() {
    expect_str(r#"return "n = " + 42;"#, "n = 42");
    expect_str(r#"return 2.0 + "";"#, "2.0");
    expect_str(r#"return "" + true;"#, "true");
}

#[test]
fn test_concat_chain_stays_a_string() {
    // A concat result is a string, so a left-associated chain led by a
    // string literal keeps concatenating.
    expect_str(r#"return "a" + 1 + 2;"#, "a12");
    expect_str(r#"return 1 + "a" + 2;"#, "1a2");
    expect_str(r#"return "v" + 1 + 2 + 3 + true;"#, "v123true");
    // Statement position follows the same rule.
    eval(r#""a" + 1 + 2;"#);
}

#[test]
fn test_runtime_string_add_concats() {
    expect_str(
        r#"
        function id(x) { return x; }
        return id("a") + id("b");
        "#,
        "ab",
    );
}

#[test]
fn test_runtime_string_plus_number_fails() {
    // Without a literal operand there is no coercion.
    let err = expect_error(
        r#"
        function id(x) { return x; }
        return id("a") + id(1);
        "#,
    );
    assert!(matches!(err, VmError::TypeMismatch(_)), "got {err:?}");
}

#[test]
fn test_string_ordering_is_bytewise() {
    expect_bool(r#"return "abc" < "abd";"#, true);
    expect_bool(r#"return "b" > "ab";"#, true);
}

// ============================================================================
// Comparison & equality
// ============================================================================

#[test]
fn test_integer_comparison() {
    expect_bool("return 1 < 2;", true);
    expect_bool("return 2 <= 2;", true);
    expect_bool("return 3 > 4;", false);
    expect_bool("return 4 >= 5;", false);
}

#[test]
fn test_cross_type_numeric_comparison() {
    expect_bool("return 1 < 1.5;", true);
    expect_bool("return 2.0 >= 2;", true);
}

#[test]
fn test_comparing_unordered_types_fails() {
    let err = expect_error("return true < false;");
    assert!(matches!(err, VmError::TypeMismatch(_)), "got {err:?}");
}

#[test]
fn test_equality_never_errors() {
    expect_bool(r#"return 1 == "1";"#, false);
    expect_bool("return null == false;", false);
    expect_bool("return null == null;", true);
    expect_bool(r#"return "x" != 3;"#, true);
}

#[test]
fn test_numeric_equality_crosses_types() {
    expect_bool("return 1 == 1.0;", true);
}

#[test]
fn test_string_equality_is_by_content() {
    expect_bool(
        r#"
        function id(x) { return x; }
        return id("ab") == "a" + "b";
        "#,
        true,
    );
}

#[test]
fn test_container_equality_is_identity() {
    expect_bool("local a = [1]; local b = [1]; return a == b;", false);
    expect_bool("local a = [1]; local c = a; return a == c;", true);
}

// ============================================================================
// Logic & truthiness
// ============================================================================

#[test]
fn test_short_circuit_results() {
    // The deciding operand is the result, not a coerced boolean.
    expect_int("return null || 5;", 5);
    expect_int("return 3 || 5;", 3);
    expect_null("return null && 5;");
    expect_int("return 1 && 2;", 2);
}

#[test]
fn test_short_circuit_skips_evaluation() {
    expect_int(
        r#"
        x = 0;
        function bump() { x = x + 1; return true; }
        local a = false && bump();
        local b = true || bump();
        return x;
        "#,
        0,
    );
}

#[test]
fn test_only_null_and_false_are_falsy() {
    expect_int("if (0) return 1; return 0;", 1);
    expect_int(r#"if ("") return 1; return 0;"#, 1);
    expect_int("if (null) return 1; return 0;", 0);
    expect_int("if (false) return 1; return 0;", 0);
}

#[test]
fn test_logical_not() {
    expect_bool("return !null;", true);
    expect_bool("return !0;", false);
    expect_bool("return !!true;", true);
}

// ============================================================================
// Bitwise
// ============================================================================

#[test]
fn test_bitwise_operators() {
    expect_int("return 6 & 3;", 2);
    expect_int("return 6 | 3;", 7);
    expect_int("return 6 ^ 3;", 5);
    expect_int("return ~5;", -6);
}

#[test]
fn test_shifts() {
    expect_int("return 1 << 4;", 16);
    expect_int("return 256 >> 4;", 16);
    // Arithmetic right shift on a signed value.
    expect_int("return -8 >> 1;", -4);
}

#[test]
fn test_bitwise_requires_integers() {
    let err = expect_error("return 1.5 & 1;");
    assert!(matches!(err, VmError::TypeMismatch(_)), "got {err:?}");
}

// ============================================================================
// typeof & compound assignment
// ============================================================================

#[test]
fn test_typeof() {
    expect_str("return typeof 1;", "integer");
    expect_str("return typeof 1.5;", "float");
    expect_str(r#"return typeof "s";"#, "string");
    expect_str("return typeof true;", "bool");
    expect_str("return typeof null;", "null");
    expect_str("return typeof [];", "array");
    expect_str("return typeof {};", "table");
    expect_str("return typeof function() {};", "function");
}

#[test]
fn test_compound_assignment() {
    expect_int("local x = 10; x += 5; return x;", 15);
    expect_int("local x = 10; x -= 3; return x;", 7);
    expect_int("local x = 10; x *= 2; return x;", 20);
    expect_float("local x = 10; x /= 4; return x;", 2.5);
}

#[test]
fn test_compound_assignment_on_members() {
    expect_int("local t = {n = 1}; t.n += 9; return t.n;", 10);
    expect_int("local a = [5]; a[0] *= 3; return a[0];", 15);
}
