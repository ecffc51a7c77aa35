//! Requests handed to a `gc::thread::Thread`, one per suspended process
//! collection (4.B collection).

use crate::process::RcProcess;

/// Which generation (or mailbox arena) a collection request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Young,
    Mature,
    Mailbox,
}

pub struct Request {
    pub generation: Generation,
    pub process: RcProcess,
}

impl Request {
    pub fn new(generation: Generation, process: RcProcess) -> Self {
        Request { generation, process }
    }
}
