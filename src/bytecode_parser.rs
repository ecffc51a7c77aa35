//! A parser for Aeon bytecode images.
//!
//! Parses the serialized form of a `CompiledCode` tree produced by the
//! compiler: a four-byte signature, a version byte, then the root code
//! object and everything it references recursively (nested code objects,
//! literal pools, the instruction stream, the catch table).
//!
//!     let mut bytes = File::open("path/to/file.aeonc").unwrap().bytes();
//!     let result = bytecode_parser::parse(&mut bytes);
//!
//! Alternatively you can also parse a file directly:
//!
//!     let result = bytecode_parser::parse_file("path/to/file.aeonc");

use std::fs::File;
use std::io::prelude::*;
use std::io::Bytes;
use std::sync::Arc;

use crate::catch_table::{CatchEntry, CatchTable};
use crate::compiled_code::{CompiledCode, RcCompiledCode};
use crate::instruction::{Instruction, InstructionType};

const SIGNATURE_BYTES: [u8; 4] = [97, 101, 111, 110]; // "aeon"

const VERSION: u8 = 1;

#[derive(Debug)]
pub enum ParserError {
    InvalidFile,
    InvalidSignature,
    InvalidVersion,
    InvalidString,
    InvalidInteger,
    InvalidFloat,
    InvalidInstruction,
    MissingByte,
}

pub type ParserResult<T> = Result<T, ParserError>;
pub type BytecodeResult = ParserResult<RcCompiledCode>;

/// Parses a file.
///
///     let result = bytecode_parser::parse_file("path/to/file.aeonc");
pub fn parse_file(path: &str) -> BytecodeResult {
    match File::open(path) {
        Ok(file) => parse(&mut file.bytes()),
        Err(_) => Err(ParserError::InvalidFile),
    }
}

/// Parses a stream of bytes.
///
///     let mut bytes = File::open("path/to/file.aeonc").unwrap().bytes();
///     let result = bytecode_parser::parse(&mut bytes);
pub fn parse<T: Read>(bytes: &mut Bytes<T>) -> BytecodeResult {
    for expected in SIGNATURE_BYTES.iter() {
        if next_byte(bytes)? != *expected {
            return Err(ParserError::InvalidSignature);
        }
    }

    if next_byte(bytes)? != VERSION {
        return Err(ParserError::InvalidVersion);
    }

    read_compiled_code(bytes)
}

fn next_byte<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<u8> {
    match bytes.next() {
        Some(Ok(byte)) => Ok(byte),
        Some(Err(_)) => Err(ParserError::MissingByte),
        None => Err(ParserError::MissingByte),
    }
}

fn read_string<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<String> {
    let size = read_u64(bytes)?;
    let mut buff: Vec<u8> = Vec::with_capacity(size as usize);

    for _ in 0..size {
        match bytes.next() {
            Some(Ok(byte)) => buff.push(byte),
            _ => return Err(ParserError::InvalidString),
        }
    }

    String::from_utf8(buff).map_err(|_| ParserError::InvalidString)
}

fn read_u8<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<u8> {
    next_byte(bytes).map_err(|_| ParserError::InvalidInteger)
}

fn read_u16<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<u16> {
    let mut buff = [0u8; 2];

    for slot in buff.iter_mut() {
        *slot = next_byte(bytes).map_err(|_| ParserError::InvalidInteger)?;
    }

    Ok(u16::from_be_bytes(buff))
}

fn read_i32<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<i32> {
    let mut buff = [0u8; 4];

    for slot in buff.iter_mut() {
        *slot = next_byte(bytes).map_err(|_| ParserError::InvalidInteger)?;
    }

    Ok(i32::from_be_bytes(buff))
}

fn read_u32<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<u32> {
    Ok(read_i32(bytes)? as u32)
}

fn read_i64<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<i64> {
    let mut buff = [0u8; 8];

    for slot in buff.iter_mut() {
        *slot = next_byte(bytes).map_err(|_| ParserError::InvalidInteger)?;
    }

    Ok(i64::from_be_bytes(buff))
}

fn read_u64<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<u64> {
    Ok(read_i64(bytes)? as u64)
}

fn read_f64<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<f64> {
    let mut buff = [0u8; 8];

    for slot in buff.iter_mut() {
        *slot = next_byte(bytes).map_err(|_| ParserError::InvalidFloat)?;
    }

    Ok(f64::from_be_bytes(buff))
}

fn read_vector<V, T: Read>(
    bytes: &mut Bytes<T>,
    reader: fn(&mut Bytes<T>) -> ParserResult<V>,
) -> ParserResult<Vec<V>> {
    let amount = read_u64(bytes)?;
    let mut buff = Vec::with_capacity(amount as usize);

    for _ in 0..amount {
        buff.push(reader(bytes)?);
    }

    Ok(buff)
}

fn read_instruction<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<Instruction> {
    let raw_type = read_u16(bytes)?;
    let instruction_type =
        InstructionType::from_u16(raw_type).ok_or(ParserError::InvalidInstruction)?;

    let args = read_vector(bytes, read_u32)?;
    let line = read_u32(bytes)?;
    let column = read_u32(bytes)?;

    Ok(Instruction::new(instruction_type, args, line, column))
}

fn read_catch_entry<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<CatchEntry> {
    let start = read_u32(bytes)?;
    let end = read_u32(bytes)?;
    let jump_to = read_u32(bytes)?;
    let register = read_u32(bytes)?;

    Ok(CatchEntry::new(start, end, jump_to, register))
}

fn read_catch_table<T: Read>(bytes: &mut Bytes<T>) -> ParserResult<CatchTable> {
    read_vector(bytes, read_catch_entry)
}

fn read_compiled_code<T: Read>(bytes: &mut Bytes<T>) -> BytecodeResult {
    let name = read_string(bytes)?;
    let file = read_string(bytes)?;
    let line = read_u32(bytes)?;
    let arguments = read_u32(bytes)?;
    let required_arguments = read_u32(bytes)?;
    let rest_argument = read_u8(bytes)? == 1;
    let is_generator = read_u8(bytes)? == 1;

    let locals = read_vector(bytes, read_string)?;
    let instructions = read_vector(bytes, read_instruction)?;
    let integer_literals = read_vector(bytes, read_i64)?;
    let float_literals = read_vector(bytes, read_f64)?;
    let string_literals = read_vector(bytes, read_string)?;
    let code_objects = read_vector(bytes, read_compiled_code)?;
    let catch_table = read_catch_table(bytes)?;

    Ok(Arc::new(CompiledCode::new(
        name,
        file,
        line,
        arguments,
        required_arguments,
        rest_argument,
        locals,
        instructions,
        integer_literals,
        float_literals,
        string_literals,
        code_objects,
        catch_table,
        is_generator,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstructionType;
    use std::io::prelude::*;

    macro_rules! unwrap {
        ($expr:expr) => {
            match $expr {
                Ok(value) => value,
                Err(error) => panic!("Failed to parse input: {:?}", error),
            }
        };
    }

    macro_rules! read {
        ($name:ident, $buffer:expr) => {
            super::$name(&mut $buffer.bytes())
        };
    }

    fn pack_u8(num: u8, buffer: &mut Vec<u8>) {
        buffer.push(num);
    }

    fn pack_u16(num: u16, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&num.to_be_bytes());
    }

    fn pack_u32(num: u32, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&num.to_be_bytes());
    }

    fn pack_u64(num: u64, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&num.to_be_bytes());
    }

    fn pack_f64(num: f64, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&num.to_be_bytes());
    }

    fn pack_string(string: &str, buffer: &mut Vec<u8>) {
        pack_u64(string.len() as u64, buffer);
        buffer.extend_from_slice(string.as_bytes());
    }

    #[test]
    fn test_parse_empty() {
        let buffer = Vec::new();
        let output = super::parse(&mut buffer.bytes());

        assert!(output.is_err());
    }

    #[test]
    fn test_parse_invalid_signature() {
        let mut buffer = Vec::new();

        pack_string("cats", &mut buffer);

        let output = super::parse(&mut buffer.bytes());

        assert!(output.is_err());
    }

    #[test]
    fn test_parse_invalid_version() {
        let mut buffer = Vec::new();

        buffer.extend_from_slice(&SIGNATURE_BYTES);
        buffer.push(super::VERSION + 1);

        let output = super::parse(&mut buffer.bytes());

        assert!(output.is_err());
    }

    fn empty_code_header(buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&SIGNATURE_BYTES);
        buffer.push(super::VERSION);

        pack_string("main", buffer);
        pack_string("test.aeon", buffer);
        pack_u32(4, buffer); // line
        pack_u32(0, buffer); // arguments
        pack_u32(0, buffer); // required arguments
        pack_u8(0, buffer); // rest argument
        pack_u8(0, buffer); // generator marker
        pack_u64(0, buffer); // locals
        pack_u64(0, buffer); // instructions
        pack_u64(0, buffer); // integer literals
        pack_u64(0, buffer); // float literals
        pack_u64(0, buffer); // string literals
        pack_u64(0, buffer); // code objects
        pack_u64(0, buffer); // catch table
    }

    #[test]
    fn test_parse() {
        let mut buffer = Vec::new();

        empty_code_header(&mut buffer);

        let object = unwrap!(super::parse(&mut buffer.bytes()));

        assert_eq!(object.name, "main");
        assert_eq!(object.file, "test.aeon");
        assert_eq!(object.line, 4);
        assert!(!object.is_generator);
    }

    #[test]
    fn test_read_string() {
        let mut buffer = Vec::new();

        pack_string("aeon", &mut buffer);

        let output = unwrap!(read!(read_string, buffer));

        assert_eq!(output, "aeon");
    }

    #[test]
    fn test_read_string_longer_than_size() {
        let mut buffer = Vec::new();

        pack_u64(2, &mut buffer);
        buffer.extend_from_slice("aeon".as_bytes());

        let output = unwrap!(read!(read_string, buffer));

        assert_eq!(output, "ae");
    }

    #[test]
    fn test_read_string_invalid_utf8() {
        let mut buffer = Vec::new();
        let bytes: [u8; 4] = [0, 159, 146, 150];

        pack_u64(4, &mut buffer);
        buffer.extend_from_slice(&bytes);

        let output = read!(read_string, buffer);

        assert!(output.is_err());
    }

    #[test]
    fn test_read_string_empty() {
        let output = read!(read_string, Vec::<u8>::new());

        assert!(output.is_err());
    }

    #[test]
    fn test_read_u8() {
        let mut buffer = Vec::new();

        pack_u8(2, &mut buffer);

        assert_eq!(unwrap!(read!(read_u8, buffer)), 2);
    }

    #[test]
    fn test_read_u16() {
        let mut buffer = Vec::new();

        pack_u16(2, &mut buffer);

        assert_eq!(unwrap!(read!(read_u16, buffer)), 2);
    }

    #[test]
    fn test_read_i32() {
        let mut buffer = Vec::new();

        pack_u32(2, &mut buffer);

        assert_eq!(unwrap!(read!(read_i32, buffer)), 2);
    }

    #[test]
    fn test_read_u32() {
        let mut buffer = Vec::new();

        pack_u32(2, &mut buffer);

        assert_eq!(unwrap!(read!(read_u32, buffer)), 2);
    }

    #[test]
    fn test_read_i64() {
        let mut buffer = Vec::new();

        pack_u64(2, &mut buffer);

        assert_eq!(unwrap!(read!(read_i64, buffer)), 2);
    }

    #[test]
    fn test_read_u64() {
        let mut buffer = Vec::new();

        pack_u64(2, &mut buffer);

        assert_eq!(unwrap!(read!(read_u64, buffer)), 2);
    }

    #[test]
    fn test_read_f64() {
        let mut buffer = Vec::new();

        pack_f64(2.123456, &mut buffer);

        let output = unwrap!(read!(read_f64, buffer));

        assert!((2.123456 - output).abs() < 0.00001);
    }

    #[test]
    fn test_read_vector() {
        let mut buffer = Vec::new();

        pack_u64(2, &mut buffer);
        pack_string("hello", &mut buffer);
        pack_string("world", &mut buffer);

        let output = unwrap!(super::read_vector::<String, &[u8]>(
            &mut buffer.bytes(),
            super::read_string
        ));

        assert_eq!(output, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn test_read_instruction() {
        let mut buffer = Vec::new();

        pack_u16(0, &mut buffer); // SetInteger
        pack_u64(1, &mut buffer); // one argument
        pack_u32(6, &mut buffer);
        pack_u32(2, &mut buffer); // line
        pack_u32(4, &mut buffer); // column

        let ins = unwrap!(super::read_instruction(&mut buffer.bytes()));

        assert_eq!(ins.instruction_type, InstructionType::SetInteger);
        assert_eq!(ins.arguments[0], 6);
        assert_eq!(ins.line, 2);
        assert_eq!(ins.column, 4);
    }

    #[test]
    fn test_read_instruction_invalid_opcode() {
        let mut buffer = Vec::new();

        pack_u16(9999, &mut buffer);

        let output = super::read_instruction(&mut buffer.bytes());

        assert!(output.is_err());
    }

    #[test]
    fn test_read_catch_entry() {
        let mut buffer = Vec::new();

        pack_u32(1, &mut buffer); // start
        pack_u32(4, &mut buffer); // end
        pack_u32(10, &mut buffer); // jump_to
        pack_u32(2, &mut buffer); // register

        let entry = unwrap!(super::read_catch_entry(&mut buffer.bytes()));

        assert_eq!(entry.start, 1);
        assert_eq!(entry.end, 4);
        assert_eq!(entry.jump_to, 10);
        assert_eq!(entry.register, 2);
    }

    #[test]
    fn test_read_compiled_code() {
        let mut buffer = Vec::new();

        pack_string("main", &mut buffer); // name
        pack_string("test.aeon", &mut buffer); // file
        pack_u32(4, &mut buffer); // line
        pack_u32(3, &mut buffer); // arguments
        pack_u32(2, &mut buffer); // required args
        pack_u8(1, &mut buffer); // rest argument
        pack_u8(1, &mut buffer); // generator marker
        pack_u64(0, &mut buffer); // locals

        pack_u64(1, &mut buffer); // instructions
        pack_u16(0, &mut buffer); // SetInteger
        pack_u64(1, &mut buffer); // args
        pack_u32(6, &mut buffer);
        pack_u32(2, &mut buffer); // line
        pack_u32(4, &mut buffer); // column

        pack_u64(1, &mut buffer); // integer literals
        pack_u64(10, &mut buffer);

        pack_u64(1, &mut buffer); // float literals
        pack_f64(1.2, &mut buffer);

        pack_u64(1, &mut buffer); // string literals
        pack_string("foo", &mut buffer);

        pack_u64(0, &mut buffer); // code objects

        pack_u64(1, &mut buffer); // catch table
        pack_u32(0, &mut buffer); // start
        pack_u32(1, &mut buffer); // end
        pack_u32(5, &mut buffer); // jump_to
        pack_u32(3, &mut buffer); // register

        let object = unwrap!(super::read_compiled_code(&mut buffer.bytes()));

        assert_eq!(object.name, "main");
        assert_eq!(object.file, "test.aeon");
        assert_eq!(object.line, 4);
        assert_eq!(object.arguments, 3);
        assert_eq!(object.required_arguments, 2);
        assert!(object.rest_argument);
        assert!(object.is_generator);

        assert_eq!(object.locals.len(), 0);
        assert_eq!(object.instructions.len(), 1);

        let ins = &object.instructions[0];

        assert_eq!(ins.instruction_type, InstructionType::SetInteger);
        assert_eq!(ins.arguments[0], 6);
        assert_eq!(ins.line, 2);
        assert_eq!(ins.column, 4);

        assert_eq!(object.integer_literals, vec![10]);
        assert!((object.float_literals[0] - 1.2).abs() < 0.001);
        assert_eq!(object.string_literals, vec!["foo".to_string()]);
        assert_eq!(object.code_objects.len(), 0);

        assert_eq!(object.catch_table.len(), 1);
        assert_eq!(object.catch_table[0].jump_to, 5);
        assert_eq!(object.catch_table[0].register, 3);
    }
}
