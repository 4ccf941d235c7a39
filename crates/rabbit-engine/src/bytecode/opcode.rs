//! Bytecode opcodes for the Rabbit VM.
//!
//! Every instruction is one fixed-size [`Instr`](super::Instr) record: an
//! opcode plus up to three operands. Operand meaning is per-opcode; by
//! convention `a` and `c` are stack-slot indices (frame-relative) and `b`
//! carries wider payloads: constant-pool indices, signed jump offsets, or
//! small integer immediates. Jump offsets are relative to the instruction
//! after the jump.

/// Bytecode opcode enumeration.
///
/// Opcodes are organized into categories:
/// - Loads & slot moves
/// - Arithmetic, comparison, bitwise
/// - Globals, tables, arrays, members
/// - Upvalues & closures
/// - Classes
/// - Control flow, calls, generators
/// - Protected calls (traps)
/// - Iteration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Loads & slot moves =====
    /// No operation
    Nop,
    /// a = constant b
    LoadConst,
    /// a = null
    LoadNull,
    /// a = bool(c != 0)
    LoadBool,
    /// a = b (b as a small integer immediate)
    LoadInt,
    /// a = slot c
    Move,

    // ===== Arithmetic =====
    /// a = b + c (numeric promotion; string+string concatenates)
    Add,
    /// a = b - c
    Sub,
    /// a = b * c
    Mul,
    /// a = b / c (int/int stays int only when exact)
    Div,
    /// a = b % c
    Mod,
    /// a = -c
    Neg,
    /// a = b .. c (string concatenation; non-strings are rendered)
    Concat,

    // ===== Bitwise (integers only) =====
    /// a = b & c
    BitAnd,
    /// a = b | c
    BitOr,
    /// a = b ^ c
    BitXor,
    /// a = b << c
    Shl,
    /// a = b >> c
    Shr,
    /// a = ~c
    BitNot,

    // ===== Comparison & logic =====
    /// a = b == c
    Eq,
    /// a = b != c
    Ne,
    /// a = b < c
    Lt,
    /// a = b <= c
    Le,
    /// a = b > c
    Gt,
    /// a = b >= c
    Ge,
    /// a = !c
    Not,
    /// a = typeof c (a type-name string)
    TypeOf,

    // ===== Globals =====
    /// a = root[name constant b]; missing name is a runtime error
    GetGlobal,
    /// root[name constant b] = a (creates the slot if absent)
    SetGlobal,

    // ===== Tables, arrays, members =====
    /// a = new empty table
    NewTable,
    /// a = new array of b elements taken from slots c, c+1, ...
    NewArray,
    /// a = obj b indexed by key c
    GetIndex,
    /// obj a indexed by key b = value c
    SetIndex,
    /// a = member (name constant b) of obj c, with base-chain fallback
    GetMember,
    /// member (name constant b) of obj a = value c
    SetMember,

    // ===== Upvalues & closures =====
    /// a = upvalue b
    GetUpval,
    /// upvalue b = a
    SetUpval,
    /// a = closure over prototype constant b, capturing per its descriptors
    MakeClosure,
    /// Flip open upvalue cells at stack slots >= a to closed
    CloseUpvals,

    // ===== Classes =====
    /// a = new class named by constant b; base class from slot c,
    /// or no base when c == 255
    NewClass,
    /// class a: declare field (name constant b) with default from slot c
    ClassField,
    /// class a: install method (name constant b) from closure slot c
    ClassMethod,
    /// a = method (name constant b) resolved from the current method's
    /// base class upward
    GetBase,

    // ===== Control flow =====
    /// ip += b
    Jump,
    /// if slot a is false: ip += b
    JumpIfFalse,
    /// if slot a is true: ip += b
    JumpIfTrue,

    // ===== Calls & returns =====
    /// a = call slot b with c args; layout: b=callee, b+1=this, b+2..=args
    Call,
    /// Return slot a to the caller, or null when c != 0
    Return,

    // ===== Generators =====
    /// Suspend the running thread, yielding slot a (null when c != 0)
    Yield,
    /// a = resume thread in slot c, running it to its next yield or return
    Resume,

    // ===== Protected calls =====
    /// Install a trap: on error, jump ip += b and store the error in slot a
    PushTrap,
    /// Remove the innermost trap
    PopTrap,
    /// Raise slot a as a script error
    Throw,

    // ===== Iteration =====
    /// Prepare iteration state at slots a..a+2 (container, state, index)
    ForeachPrep,
    /// Load next key/value into a+3/a+4 and continue, or ip += b when done
    ForeachNext,
}

/// One fixed-size instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    /// The opcode.
    pub op: Opcode,
    /// First operand, usually a destination slot.
    pub a: u8,
    /// Wide operand: constant index, jump offset, or immediate.
    pub b: i32,
    /// Third operand, usually a source slot or count.
    pub c: u8,
}

impl Instr {
    /// Build an instruction.
    pub fn new(op: Opcode, a: u8, b: i32, c: u8) -> Self {
        Self { op, a, b, c }
    }

    /// An instruction with only an opcode.
    pub fn op(op: Opcode) -> Self {
        Self { op, a: 0, b: 0, c: 0 }
    }
}
