//! Rabbit Language Engine
//!
//! This crate provides the complete Rabbit language implementation:
//! - **Compiler**: Lexer and single-pass bytecode compiler (`compiler` module)
//! - **Bytecode**: Instruction set and function prototypes (`bytecode` module)
//! - **Objects**: Values, tables, arrays, classes, closures, weak refs (`object` module)
//! - **VM**: Interpreter, generator threads, and debug surface (`vm` module)
//!
//! Rabbit is embeddable: the engine is a library linked into a host
//! application. The host compiles source text to a function prototype,
//! executes it on a [`Vm`], and extends the language by registering native
//! functions into the root table.
//!
//! # Example
//!
//! ```rust,ignore
//! use rabbit_engine::Vm;
//!
//! let vm = Vm::new();
//! let proto = vm.compile("return 2 + 3 * 4", "example.rbt").unwrap();
//! let result = vm.execute(&proto).unwrap();
//! assert_eq!(result.as_int(), Some(14));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Allocator hook layer: every engine heap object is created through a
/// [`Heap`](alloc::Heap) and reports its lifetime to an exchangeable hook.
pub mod alloc;

/// Embedding surface: native function registration and the argument view
/// passed to native calls.
pub mod api;

/// Bytecode instruction set and compiled function prototypes.
pub mod bytecode;

/// Lexer and single-pass compiler.
pub mod compiler;

/// The dynamic object model: values, strings, tables, arrays, classes,
/// closures, userdata, and weak references.
pub mod object;

/// The virtual machine: dispatch loop, threads, and debug introspection.
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use alloc::{AllocHook, CountingHook, Heap, ObjKind};
pub use api::{NativeCtx, NativeFn};
pub use bytecode::{Constant, FunctionProto, Instr, Opcode};
pub use compiler::{compile, compile_expression, CompileError, LexError, LexErrorKind};
pub use compiler::{Lexer, Span, Token};
pub use object::{Value, WeakRef};
pub use vm::{FrameInfo, ThreadState, Vm, VmError};
