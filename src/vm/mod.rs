//! The bytecode interpreter (Component E): shared state, the instruction
//! dispatch loop, process-management opcodes, and the foreign-function
//! interface.

pub mod ffi;
pub mod instructions;
pub mod machine;
pub mod process_instructions;
pub mod state;
