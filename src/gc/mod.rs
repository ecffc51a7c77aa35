//! Per-process garbage collection (4.B collection).
//!
//! `tracer` runs the parallel, allocation-free mark phase mature
//! collections use; `collector` performs the actual (always single-threaded,
//! since a process is fully suspended while it runs) moving work for both
//! generations and the mailbox arena; `request`/`thread` wire those into a
//! background worker the scheduler hands suspended processes to.

pub mod collector;
pub mod request;
pub mod statistics;
pub mod thread;
pub mod tracer;
