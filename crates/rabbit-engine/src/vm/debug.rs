//! Read-only frame inspection.
//!
//! A host can snapshot the live frames of a thread — typically a generator
//! parked at a `yield`, or from an error handler — without disturbing
//! execution. The view is built from the prototype's debug records: hidden
//! compiler temporaries never appear.

use crate::object::Value;
use crate::vm::thread::Thread;

/// One live frame of a thread, innermost first in [`Thread::stack_frames`].
#[derive(Debug)]
pub struct FrameInfo {
    /// The function name (`<main>` for top-level code).
    pub function: String,
    /// The source line currently executing.
    pub line: u32,
    /// Named locals in scope at the current instruction, with their values.
    pub locals: Vec<(String, Value)>,
}

impl Thread {
    /// Snapshot the live frames, innermost first.
    pub fn stack_frames(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let proto = &frame.closure.proto;
                // ip already points at the next instruction
                let ip = frame.ip.saturating_sub(1);
                let line = proto.line_at(ip);
                let locals = proto
                    .locals
                    .iter()
                    .filter(|l| (l.start_ip as usize) <= ip && ip < l.end_ip as usize)
                    .map(|l| {
                        let value = self
                            .stack
                            .get(frame.base + l.slot as usize)
                            .cloned()
                            .unwrap_or(Value::Null);
                        (l.name.clone(), value)
                    })
                    .collect();
                FrameInfo { function: proto.name.clone(), line, locals }
            })
            .collect()
    }
}
