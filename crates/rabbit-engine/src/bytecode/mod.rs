//! Bytecode instruction set and compiled artifacts.

mod opcode;
mod proto;

pub use opcode::{Instr, Opcode};
pub use proto::{CaptureSource, Constant, FunctionProto, LineInfo, LocalInfo, ProtoRef};
