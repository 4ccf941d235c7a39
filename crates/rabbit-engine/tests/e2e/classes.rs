//! Class declaration, instantiation, dispatch, and inheritance.

use rabbit_engine::VmError;

use super::harness::*;

#[test]
fn test_constructor_and_method() {
    expect_int(
        r#"
        class Point {
            x = 0
            y = 0
            constructor(x, y) { this.x = x; this.y = y; }
            function sum() { return this.x + this.y; }
        }
        local p = Point(3, 4);
        return p.sum();
        "#,
        7,
    );
}

#[test]
fn test_field_defaults_without_constructor() {
    expect_int(
        r#"
        class Config {
            retries = 3
            verbose = false
        }
        local c = Config();
        return c.retries;
        "#,
        3,
    );
}

#[test]
fn test_field_default_is_an_expression() {
    expect_int("class C { n = 2 * 21 } return C().n;", 42);
}

#[test]
fn test_field_assignment() {
    expect_int(
        r#"
        class Box { v = 0 }
        local b = Box();
        b.v = 9;
        b.v += 1;
        return b.v;
        "#,
        10,
    );
}

#[test]
fn test_index_access_reaches_members() {
    expect_int(
        r#"
        class Box { v = 5 }
        local b = Box();
        return b["v"];
        "#,
        5,
    );
}

#[test]
fn test_writing_undeclared_field_fails() {
    // Instances have a fixed field layout.
    let err = expect_error(
        r#"
        class C { }
        local c = C();
        c.z = 1;
        "#,
    );
    assert!(matches!(err, VmError::MissingMember(ref n) if n == "z"), "got {err:?}");
}

#[test]
fn test_missing_method_fails() {
    let err = expect_error(
        r#"
        class C { }
        local c = C();
        return c.run();
        "#,
    );
    assert!(matches!(err, VmError::MissingMember(_)), "got {err:?}");
}

#[test]
fn test_classes_are_frozen_after_declaration() {
    let err = expect_error(
        r#"
        class C { function m() { return 1; } }
        C.m = 2;
        "#,
    );
    assert!(matches!(err, VmError::TypeMismatch(_)), "got {err:?}");
}

#[test]
fn test_method_taken_from_class() {
    expect_int(
        r#"
        class C { function m() { return 7; } }
        return C.m();
        "#,
        7,
    );
}

#[test]
fn test_typeof_class_and_instance() {
    expect_str("class C { } return typeof C;", "class");
    expect_str("class C { } return typeof C();", "instance");
}

// ============================================================================
// Inheritance
// ============================================================================

#[test]
fn test_override_dispatches_on_instance_class() {
    expect_str(
        r#"
        class Animal {
            name = ""
            constructor(name) { this.name = name; }
            function speak() { return this.name + ": " + this.sound(); }
            function sound() { return "..."; }
        }
        class Dog extends Animal {
            constructor(name) { base.constructor(name); }
            function sound() { return "woof"; }
        }
        local d = Dog("Rex");
        return d.speak();
        "#,
        "Rex: woof",
    );
}

#[test]
fn test_inherited_method_without_override() {
    expect_str(
        r#"
        class Animal {
            function sound() { return "..."; }
        }
        class Cat extends Animal { }
        return Cat().sound();
        "#,
        "...",
    );
}

#[test]
fn test_inherited_fields() {
    expect_int(
        r#"
        class Base { a = 1 }
        class Derived extends Base { b = 2 }
        local d = Derived();
        return d.a + d.b;
        "#,
        3,
    );
}

#[test]
fn test_base_method_call() {
    expect_int(
        r#"
        class Base {
            function value() { return 10; }
        }
        class Derived extends Base {
            function value() { return base.value() + 1; }
        }
        return Derived().value();
        "#,
        11,
    );
}

#[test]
fn test_base_resolution_in_three_level_chain() {
    expect_str(
        r#"
        class A { function who() { return "A"; } }
        class B extends A { function who() { return base.who() + "B"; } }
        class C extends B { function who() { return base.who() + "C"; } }
        return C().who();
        "#,
        "ABC",
    );
}

#[test]
fn test_constructor_returns_receiver() {
    expect_bool(
        r#"
        class C {
            constructor() { local ignored = 42; }
        }
        local c = C();
        return c != null && typeof c == "instance";
        "#,
        true,
    );
}

#[test]
fn test_class_local_to_a_function() {
    expect_int(
        r#"
        function make() {
            class Local { n = 1 }
            return Local();
        }
        return make().n;
        "#,
        1,
    );
}

#[test]
fn test_extends_non_class_fails() {
    let err = expect_error("class C extends 5 { }");
    assert!(matches!(err, VmError::TypeMismatch(_)), "got {err:?}");
}
