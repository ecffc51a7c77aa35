//! Aeon: a concurrent, process-oriented virtual machine.
//!
//! This crate implements the runtime core described in the project's
//! design documents: the tagged value/object model, the per-process
//! generational collector, the process/mailbox actor layer, the
//! work-stealing scheduler, the bytecode interpreter, and the I/O
//! reactor/timer wheel that ties suspended processes back into the
//! scheduler. The bytecode compiler front-end and the Aeon-level standard
//! library are out of scope for this crate; it only consumes an already
//! compiled bytecode image.

#[macro_use]
mod macros;

pub mod arc_without_weak;
pub mod binding;
pub mod block;
pub mod broadcast;
pub mod bytecode_parser;
pub mod catch_table;
pub mod compiled_code;
pub mod config;
pub mod deref_pointer;
pub mod error;
pub mod execution_context;
pub mod gc;
pub mod generator;
pub mod global_scope;
pub mod header;
pub mod immix;
pub mod instruction;
pub mod mailbox;
pub mod object;
pub mod object_pointer;
pub mod object_value;
pub mod platform;
pub mod process;
pub mod process_table;
pub mod reactor;
pub mod register;
pub mod scheduler;
pub mod stacktrace;
pub mod tagged_pointer;
pub mod vm;
