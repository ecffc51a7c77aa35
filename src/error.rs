//! Errors produced while bootstrapping the virtual machine.
//!
//! These are distinct from in-language `throw`/`panic`: they can only occur
//! before any process starts running (bad bytecode file, thread pool
//! construction failure) and are reported straight to the error stream
//! followed by a non-zero exit, never routed through a process's catch
//! table.

use crate::bytecode_parser::ParserError;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum RuntimeError {
    /// The bytecode image path could not be opened or read.
    Io(io::Error),

    /// The bytecode image was malformed.
    Parser(ParserError),

    /// A worker pool's OS thread could not be spawned.
    ThreadSpawn(io::Error),

    /// A configuration value was rejected outright (as opposed to being
    /// warned about and defaulted, see `config::Config::from_env`).
    InvalidConfig(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::Io(error) => {
                write!(f, "failed to read the bytecode image: {}", error)
            }
            RuntimeError::Parser(error) => {
                write!(f, "failed to parse the bytecode image: {:?}", error)
            }
            RuntimeError::ThreadSpawn(error) => {
                write!(f, "failed to spawn a worker thread: {}", error)
            }
            RuntimeError::InvalidConfig(message) => {
                write!(f, "invalid configuration: {}", message)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<io::Error> for RuntimeError {
    fn from(error: io::Error) -> Self {
        RuntimeError::Io(error)
    }
}

impl From<ParserError> for RuntimeError {
    fn from(error: ParserError) -> Self {
        RuntimeError::Parser(error)
    }
}
