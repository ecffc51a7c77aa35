//! The payload carried by a boxed `Object`.
//!
//! Every prototype kind named in the data model (strings, byte arrays,
//! floats, arrays, blocks, process handles, files, sockets, FFI resources,
//! hashers, child processes) maps to exactly one `ObjectValue` variant. An
//! object without a payload (a plain attribute bag) is `ObjectValue::None`.

use crate::block::Block;
use crate::generator::Generator;
use crate::process::RcProcess;
use num_bigint::BigInt;
use std::fs;
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::process::Child;

pub enum ObjectValue {
    None,
    Integer(i64),
    BigInt(Box<BigInt>),
    Float(f64),
    String(Box<String>),
    Array(Box<Vec<crate::object_pointer::ObjectPointer>>),
    ByteArray(Box<Vec<u8>>),
    Block(Box<Block>),
    Generator(Box<Generator>),
    Process(RcProcess),
    File(Box<fs::File>),
    TcpListener(Box<TcpListener>),
    TcpStream(Box<TcpStream>),
    UdpSocket(Box<UdpSocket>),
    ChildProcess(Box<Child>),
    /// A dynamic library opened by `LoadLibrary`, kept alive for as long as
    /// any `ObjectPointer` might still call into it. The per-call `Cif`
    /// describing a symbol's argument/return shape is built fresh by
    /// `vm::ffi` for each `ExternalCall*`, since it is cheap and the same
    /// library is routinely called with more than one signature.
    Library(Box<libloading::Library>),
}

impl ObjectValue {
    pub fn is_none(&self) -> bool {
        matches!(self, ObjectValue::None)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ObjectValue::Integer(_))
    }

    pub fn is_bigint(&self) -> bool {
        matches!(self, ObjectValue::BigInt(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ObjectValue::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ObjectValue::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ObjectValue::Array(_))
    }

    pub fn is_block(&self) -> bool {
        matches!(self, ObjectValue::Block(_))
    }

    pub fn is_generator(&self) -> bool {
        matches!(self, ObjectValue::Generator(_))
    }

    pub fn is_process(&self) -> bool {
        matches!(self, ObjectValue::Process(_))
    }

    pub fn is_library(&self) -> bool {
        matches!(self, ObjectValue::Library(_))
    }

    /// Returns whether this value's prototype needs a finalizer run before
    /// its memory can be reclaimed (4.B Finalization).
    pub fn needs_finalization(&self) -> bool {
        matches!(
            self,
            ObjectValue::File(_)
                | ObjectValue::TcpListener(_)
                | ObjectValue::TcpStream(_)
                | ObjectValue::UdpSocket(_)
                | ObjectValue::ChildProcess(_)
                | ObjectValue::Library(_)
        )
    }

    pub fn as_integer(&self) -> i64 {
        match self {
            ObjectValue::Integer(value) => *value,
            _ => panic!("ObjectValue::as_integer called on a non-integer value"),
        }
    }

    pub fn as_float(&self) -> f64 {
        match self {
            ObjectValue::Float(value) => *value,
            _ => panic!("ObjectValue::as_float called on a non-float value"),
        }
    }

    pub fn as_string(&self) -> &str {
        match self {
            ObjectValue::String(value) => value,
            _ => panic!("ObjectValue::as_string called on a non-string value"),
        }
    }

    /// Returns the `BigInt` payload as an `i64`, or `None` if it doesn't fit.
    /// Used when a previously-boxed integer (e.g. the result of subtracting
    /// two big integers) ends up back in range.
    pub fn as_integer_checked(&self) -> Option<i64> {
        match self {
            ObjectValue::BigInt(value) => {
                use num_traits::cast::ToPrimitive;

                value.to_i64()
            }
            _ => None,
        }
    }

    pub fn take(&mut self) -> ObjectValue {
        std::mem::replace(self, ObjectValue::None)
    }
}

pub fn none() -> ObjectValue {
    ObjectValue::None
}

pub fn integer(value: i64) -> ObjectValue {
    ObjectValue::Integer(value)
}

pub fn bigint(value: BigInt) -> ObjectValue {
    ObjectValue::BigInt(Box::new(value))
}

pub fn float(value: f64) -> ObjectValue {
    ObjectValue::Float(value)
}

pub fn string(value: String) -> ObjectValue {
    ObjectValue::String(Box::new(value))
}

pub fn array(value: Vec<crate::object_pointer::ObjectPointer>) -> ObjectValue {
    ObjectValue::Array(Box::new(value))
}

pub fn byte_array(value: Vec<u8>) -> ObjectValue {
    ObjectValue::ByteArray(Box::new(value))
}

pub fn block(value: Block) -> ObjectValue {
    ObjectValue::Block(Box::new(value))
}

pub fn generator(value: Generator) -> ObjectValue {
    ObjectValue::Generator(Box::new(value))
}

pub fn process(value: RcProcess) -> ObjectValue {
    ObjectValue::Process(value)
}

pub fn library(value: libloading::Library) -> ObjectValue {
    ObjectValue::Library(Box::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_helpers() {
        assert!(integer(10).is_integer());
        assert!(float(1.0).is_float());
        assert!(string("x".to_string()).is_string());
        assert!(none().is_none());
    }

    #[test]
    fn test_needs_finalization() {
        assert!(!none().needs_finalization());
        assert!(!integer(1).needs_finalization());
    }

    #[test]
    fn test_take_leaves_none_behind() {
        let mut value = integer(42);
        let taken = value.take();

        assert!(value.is_none());
        assert_eq!(taken.as_integer(), 42);
    }
}
