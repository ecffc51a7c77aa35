//! Leaf instruction handlers: arithmetic, array/string primitives, blocking
//! file and stream I/O, and the numeric/string conversions (4.E Interpreter
//! & VM).
//!
//! Grounded on the teacher's `bytecode_parser`'s `InstructionType` for the
//! opcode vocabulary and on `immix::copy_object`'s allocation idiom for how
//! a handler turns a computed value into a heap `ObjectPointer`. None of
//! these touch control flow (no context push/pop, no catch-table lookups);
//! `vm::machine` owns that and calls into this module for the rest.
//!
//! Every operand here is a register index unless documented otherwise. A
//! register argument of `NONE` (`u32::MAX`) means "no value" where an
//! instruction takes an optional operand (e.g. `SetObject`'s prototype).

use num_bigint::BigInt;

use crate::compiled_code::CompiledCode;
use crate::instruction::Instruction;
use crate::object_pointer::ObjectPointer;
use crate::object_value::{self, ObjectValue};
use crate::process::RcProcess;
use crate::vm::state::RcState;

/// Sentinel used by instructions with an optional register operand.
pub const NONE: u32 = u32::MAX;

/// What a handler couldn't finish with a plain value.
#[derive(Debug)]
pub enum Signal {
    /// An Aeon-level exception to unwind via the catch table.
    Throw(ObjectPointer),
    /// A host-level error with no Aeon representation (bad register, wrong
    /// operand type); terminates the whole VM.
    Panic(String),
}

pub type InstructionResult = Result<(), Signal>;

fn read_register(process: &RcProcess, register: usize) -> Result<ObjectPointer, Signal> {
    process
        .get_register(register)
        .ok_or_else(|| Signal::Panic(format!("register {} is empty", register)))
}

fn read_register_integer(process: &RcProcess, register: usize) -> Result<i64, Signal> {
    read_register(process, register)?
        .integer_value()
        .map_err(Signal::Panic)
}

fn read_register_float(process: &RcProcess, register: usize) -> Result<f64, Signal> {
    read_register(process, register)?
        .float_value()
        .map_err(Signal::Panic)
}

fn read_register_string(process: &RcProcess, register: usize) -> Result<String, Signal> {
    read_register(process, register)?
        .string_value()
        .map(|value| value.to_string())
        .map_err(Signal::Panic)
}

fn io_throw(error: std::io::Error) -> Signal {
    Signal::Throw(ObjectPointer::integer(i64::from(
        error.raw_os_error().unwrap_or(-1),
    )))
}

// --- allocation --------------------------------------------------------

pub fn set_integer(
    state: &RcState,
    process: &RcProcess,
    code: &CompiledCode,
    ins: &Instruction,
) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let literal = code.integer(ins.arg(1) as usize);

    let value = if ObjectPointer::integer_too_large(literal) {
        process.allocate(object_value::bigint(BigInt::from(literal)), state.integer_prototype)
    } else {
        ObjectPointer::integer(literal)
    };

    process.set_register(dest, value);
    Ok(())
}

pub fn set_float(
    state: &RcState,
    process: &RcProcess,
    code: &CompiledCode,
    ins: &Instruction,
) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let literal = code.float(ins.arg(1) as usize);
    let value = process.allocate(object_value::float(literal), state.float_prototype);

    process.set_register(dest, value);
    Ok(())
}

pub fn set_string(
    state: &RcState,
    process: &RcProcess,
    code: &CompiledCode,
    ins: &Instruction,
) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let literal = code.string(ins.arg(1) as usize).to_string();
    let value = process.allocate(object_value::string(literal), state.string_prototype);

    process.set_register(dest, value);
    Ok(())
}

pub fn set_object(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let prototype_reg = ins.arg(1);

    let value = if prototype_reg == NONE {
        process.allocate_empty()
    } else {
        let prototype = read_register(process, prototype_reg as usize)?;
        process.allocate(object_value::none(), prototype)
    };

    process.set_register(dest, value);
    Ok(())
}

pub fn set_array(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let count = ins.arg(1) as usize;

    let mut elements = Vec::with_capacity(count);

    for i in 0..count {
        elements.push(read_register(process, ins.arg(2 + i) as usize)?);
    }

    let value = process.allocate(object_value::array(elements), state.array_prototype);

    process.set_register(dest, value);
    Ok(())
}

pub fn set_byte_array(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let count = ins.arg(1) as usize;
    let bytes = (0..count).map(|i| ins.arg(2 + i) as u8).collect();

    let value = process.allocate(object_value::byte_array(bytes), state.byte_array_prototype);

    process.set_register(dest, value);
    Ok(())
}

// --- attributes and prototypes ------------------------------------------

pub fn set_attribute(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let receiver = read_register(process, ins.arg(1) as usize)?;
    let name = read_register(process, ins.arg(2) as usize)?;
    let value = read_register(process, ins.arg(3) as usize)?;

    if !receiver.is_boxed() {
        return Err(Signal::Panic(
            "attributes can only be set on boxed objects".to_string(),
        ));
    }

    receiver.add_attribute(process, name, value);
    process.write_barrier(receiver, value);
    process.write_barrier(receiver, name);

    process.set_register(dest, value);
    Ok(())
}

pub fn get_attribute(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let receiver = read_register(process, ins.arg(1) as usize)?;
    let name = read_register(process, ins.arg(2) as usize)?;

    let value = if receiver.is_boxed() {
        receiver.get_attribute(&name).unwrap_or_else(ObjectPointer::null)
    } else {
        ObjectPointer::null()
    };

    process.set_register(dest, value);
    Ok(())
}

pub fn set_prototype(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let receiver = read_register(process, ins.arg(1) as usize)?;
    let prototype = read_register(process, ins.arg(2) as usize)?;

    if !receiver.is_boxed() {
        return Err(Signal::Panic(
            "a prototype can only be set on a boxed object".to_string(),
        ));
    }

    receiver.get_mut().set_prototype(prototype);
    process.write_barrier(receiver, prototype);

    process.set_register(dest, receiver);
    Ok(())
}

pub fn get_prototype(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let receiver = read_register(process, ins.arg(1) as usize)?;
    let value = receiver.prototype(state).unwrap_or_else(ObjectPointer::null);

    process.set_register(dest, value);
    Ok(())
}

// --- integer arithmetic --------------------------------------------------

fn integer_binary_op(
    state: &RcState,
    process: &RcProcess,
    ins: &Instruction,
    checked: fn(i64, i64) -> Option<i64>,
    overflowing: fn(i64, i64) -> BigInt,
) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    let value = match checked(lhs, rhs) {
        Some(result) if !ObjectPointer::integer_too_large(result) => ObjectPointer::integer(result),
        Some(result) => {
            process.allocate(object_value::bigint(BigInt::from(result)), state.integer_prototype)
        }
        None => process.allocate(
            object_value::bigint(overflowing(lhs, rhs)),
            state.integer_prototype,
        ),
    };

    process.set_register(dest, value);
    Ok(())
}

fn integer_compare(
    state: &RcState,
    process: &RcProcess,
    ins: &Instruction,
    compare: fn(i64, i64) -> bool,
) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    let value = if compare(lhs, rhs) {
        state.true_object
    } else {
        state.false_object
    };

    process.set_register(dest, value);
    Ok(())
}

pub fn integer_add(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    integer_binary_op(state, process, ins, i64::checked_add, |a, b| {
        BigInt::from(a) + BigInt::from(b)
    })
}

pub fn integer_sub(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    integer_binary_op(state, process, ins, i64::checked_sub, |a, b| {
        BigInt::from(a) - BigInt::from(b)
    })
}

pub fn integer_mul(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    integer_binary_op(state, process, ins, i64::checked_mul, |a, b| {
        BigInt::from(a) * BigInt::from(b)
    })
}

pub fn integer_div(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    if rhs == 0 {
        let message = process.allocate(
            object_value::string("division by zero".to_string()),
            state.string_prototype,
        );

        return Err(Signal::Throw(message));
    }

    process.set_register(dest, ObjectPointer::integer(lhs.wrapping_div(rhs)));
    Ok(())
}

pub fn integer_mod(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    if rhs == 0 {
        let message = process.allocate(
            object_value::string("modulo by zero".to_string()),
            state.string_prototype,
        );

        return Err(Signal::Throw(message));
    }

    process.set_register(dest, ObjectPointer::integer(lhs.wrapping_rem(rhs)));
    Ok(())
}

pub fn integer_bitwise_and(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    process.set_register(dest, ObjectPointer::integer(lhs & rhs));
    Ok(())
}

pub fn integer_bitwise_or(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    process.set_register(dest, ObjectPointer::integer(lhs | rhs));
    Ok(())
}

pub fn integer_bitwise_xor(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    process.set_register(dest, ObjectPointer::integer(lhs ^ rhs));
    Ok(())
}

pub fn integer_shift_left(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    process.set_register(dest, ObjectPointer::integer(lhs.wrapping_shl(rhs as u32)));
    Ok(())
}

pub fn integer_shift_right(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_integer(process, ins.arg(1) as usize)?;
    let rhs = read_register_integer(process, ins.arg(2) as usize)?;

    process.set_register(dest, ObjectPointer::integer(lhs.wrapping_shr(rhs as u32)));
    Ok(())
}

pub fn integer_smaller(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    integer_compare(state, process, ins, |a, b| a < b)
}

pub fn integer_greater(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    integer_compare(state, process, ins, |a, b| a > b)
}

pub fn integer_equals(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    integer_compare(state, process, ins, |a, b| a == b)
}

// --- float arithmetic -----------------------------------------------------

fn float_binary_op(
    state: &RcState,
    process: &RcProcess,
    ins: &Instruction,
    op: fn(f64, f64) -> f64,
) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_float(process, ins.arg(1) as usize)?;
    let rhs = read_register_float(process, ins.arg(2) as usize)?;

    let value = process.allocate(object_value::float(op(lhs, rhs)), state.float_prototype);

    process.set_register(dest, value);
    Ok(())
}

fn float_compare(
    state: &RcState,
    process: &RcProcess,
    ins: &Instruction,
    compare: fn(f64, f64) -> bool,
) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_float(process, ins.arg(1) as usize)?;
    let rhs = read_register_float(process, ins.arg(2) as usize)?;

    let value = if compare(lhs, rhs) {
        state.true_object
    } else {
        state.false_object
    };

    process.set_register(dest, value);
    Ok(())
}

pub fn float_add(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    float_binary_op(state, process, ins, |a, b| a + b)
}

pub fn float_sub(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    float_binary_op(state, process, ins, |a, b| a - b)
}

pub fn float_mul(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    float_binary_op(state, process, ins, |a, b| a * b)
}

pub fn float_div(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    float_binary_op(state, process, ins, |a, b| a / b)
}

pub fn float_mod(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    float_binary_op(state, process, ins, |a, b| a % b)
}

pub fn float_smaller(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    float_compare(state, process, ins, |a, b| a < b)
}

pub fn float_greater(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    float_compare(state, process, ins, |a, b| a > b)
}

pub fn float_equals(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    float_compare(state, process, ins, |a, b| (a - b).abs() < f64::EPSILON)
}

// --- arrays ---------------------------------------------------------------

pub fn array_set(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let array_ptr = read_register(process, ins.arg(1) as usize)?;
    let index = read_register_integer(process, ins.arg(2) as usize)? as usize;
    let value = read_register(process, ins.arg(3) as usize)?;

    match &mut array_ptr.get_mut().value {
        ObjectValue::Array(array) => {
            if index >= array.len() {
                array.resize(index + 1, ObjectPointer::null());
            }

            array[index] = value;
        }
        _ => return Err(Signal::Panic("ArraySet expects an Array".to_string())),
    }

    process.write_barrier(array_ptr, value);
    process.set_register(dest, value);
    Ok(())
}

pub fn array_at(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let array_ptr = read_register(process, ins.arg(1) as usize)?;
    let index = read_register_integer(process, ins.arg(2) as usize)? as usize;

    let value = match &array_ptr.get().value {
        ObjectValue::Array(array) => array.get(index).copied().unwrap_or_else(ObjectPointer::null),
        _ => return Err(Signal::Panic("ArrayAt expects an Array".to_string())),
    };

    process.set_register(dest, value);
    Ok(())
}

pub fn array_length(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let array_ptr = read_register(process, ins.arg(1) as usize)?;

    let length = match &array_ptr.get().value {
        ObjectValue::Array(array) => array.len() as i64,
        _ => return Err(Signal::Panic("ArrayLength expects an Array".to_string())),
    };

    process.set_register(dest, ObjectPointer::integer(length));
    Ok(())
}

pub fn array_clear(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let array_ptr = read_register(process, ins.arg(0) as usize)?;

    match &mut array_ptr.get_mut().value {
        ObjectValue::Array(array) => array.clear(),
        _ => return Err(Signal::Panic("ArrayClear expects an Array".to_string())),
    }

    Ok(())
}

// --- strings ---------------------------------------------------------------

pub fn string_concat(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_string(process, ins.arg(1) as usize)?;
    let rhs = read_register_string(process, ins.arg(2) as usize)?;

    let mut combined = String::with_capacity(lhs.len() + rhs.len());
    combined.push_str(&lhs);
    combined.push_str(&rhs);

    let value = process.allocate(object_value::string(combined), state.string_prototype);

    process.set_register(dest, value);
    Ok(())
}

pub fn string_length(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let text = read_register_string(process, ins.arg(1) as usize)?;

    process.set_register(dest, ObjectPointer::integer(text.chars().count() as i64));
    Ok(())
}

pub fn string_slice(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let text = read_register_string(process, ins.arg(1) as usize)?;
    let start = read_register_integer(process, ins.arg(2) as usize)? as usize;
    let length = read_register_integer(process, ins.arg(3) as usize)? as usize;

    let sliced: String = text.chars().skip(start).take(length).collect();
    let value = process.allocate(object_value::string(sliced), state.string_prototype);

    process.set_register(dest, value);
    Ok(())
}

pub fn string_equals(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let lhs = read_register_string(process, ins.arg(1) as usize)?;
    let rhs = read_register_string(process, ins.arg(2) as usize)?;

    let value = if lhs == rhs { state.true_object } else { state.false_object };

    process.set_register(dest, value);
    Ok(())
}

// --- I/O --------------------------------------------------------------

pub fn stdout_write(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    use std::io::Write;

    let dest = ins.arg(0) as usize;
    let text = read_register_string(process, ins.arg(1) as usize)?;
    let written = std::io::stdout().write(text.as_bytes()).map_err(io_throw)?;

    process.set_register(dest, ObjectPointer::integer(written as i64));
    Ok(())
}

pub fn stderr_write(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    use std::io::Write;

    let dest = ins.arg(0) as usize;
    let text = read_register_string(process, ins.arg(1) as usize)?;
    let written = std::io::stderr().write(text.as_bytes()).map_err(io_throw)?;

    process.set_register(dest, ObjectPointer::integer(written as i64));
    Ok(())
}

pub fn stdin_read(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    use std::io::Read;

    let dest = ins.arg(0) as usize;
    let size_ptr = read_register(process, ins.arg(1) as usize)?;

    let size = if size_ptr.is_null() {
        None
    } else {
        Some(size_ptr.usize_value().map_err(Signal::Panic)?)
    };

    let mut buffer = file_reading_buffer!(size);

    let result = match size {
        Some(amount) => std::io::stdin().take(amount as u64).read_to_string(&mut buffer),
        None => std::io::stdin().read_to_string(&mut buffer),
    };

    result.map_err(io_throw)?;

    let value = process.allocate(object_value::string(buffer), state.string_prototype);
    process.set_register(dest, value);
    Ok(())
}

pub fn file_open(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let path = read_register_string(process, ins.arg(1) as usize)?;
    let mode = read_register_integer(process, ins.arg(2) as usize)?;

    let mut options = std::fs::OpenOptions::new();

    match mode {
        0 => {
            options.read(true);
        }
        1 => {
            options.write(true).create(true).truncate(true);
        }
        2 => {
            options.append(true).create(true);
        }
        3 => {
            options.read(true).write(true).create(true);
        }
        _ => return Err(Signal::Panic(format!("unknown file open mode {}", mode))),
    }

    let file = options.open(&path).map_err(io_throw)?;
    let value = process.allocate(ObjectValue::File(Box::new(file)), state.file_prototype);

    process.set_register(dest, value);
    Ok(())
}

pub fn file_read(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    use std::io::Read;

    let dest = ins.arg(0) as usize;
    let file_ptr = read_register(process, ins.arg(1) as usize)?;
    let size_ptr = read_register(process, ins.arg(2) as usize)?;

    let size = if size_ptr.is_null() {
        None
    } else {
        Some(size_ptr.usize_value().map_err(Signal::Panic)?)
    };

    let mut buffer = file_reading_buffer!(size);

    let result = match &mut file_ptr.get_mut().value {
        ObjectValue::File(file) => {
            let file_ref: &mut std::fs::File = file;

            match size {
                Some(amount) => file_ref.take(amount as u64).read_to_string(&mut buffer),
                None => file_ref.read_to_string(&mut buffer),
            }
        }
        _ => return Err(Signal::Panic("FileRead expects a File".to_string())),
    };

    result.map_err(io_throw)?;

    let value = process.allocate(object_value::string(buffer), state.string_prototype);
    process.set_register(dest, value);
    Ok(())
}

pub fn file_write(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    use std::io::Write;

    let dest = ins.arg(0) as usize;
    let file_ptr = read_register(process, ins.arg(1) as usize)?;
    let content = read_register_string(process, ins.arg(2) as usize)?;

    let written = match &mut file_ptr.get_mut().value {
        ObjectValue::File(file) => file.write(content.as_bytes()),
        _ => return Err(Signal::Panic("FileWrite expects a File".to_string())),
    }
    .map_err(io_throw)?;

    process.set_register(dest, ObjectPointer::integer(written as i64));
    Ok(())
}

pub fn file_flush(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    use std::io::Write;

    let dest = ins.arg(0) as usize;
    let file_ptr = read_register(process, ins.arg(1) as usize)?;

    match &mut file_ptr.get_mut().value {
        ObjectValue::File(file) => file.flush(),
        _ => return Err(Signal::Panic("FileFlush expects a File".to_string())),
    }
    .map_err(io_throw)?;

    process.set_register(dest, ObjectPointer::null());
    Ok(())
}

pub fn file_size(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let file_ptr = read_register(process, ins.arg(1) as usize)?;

    let size = match &file_ptr.get().value {
        ObjectValue::File(file) => file.metadata().map(|metadata| metadata.len()),
        _ => return Err(Signal::Panic("FileSize expects a File".to_string())),
    }
    .map_err(io_throw)?;

    process.set_register(dest, ObjectPointer::integer(size as i64));
    Ok(())
}

pub fn file_seek(process: &RcProcess, ins: &Instruction) -> InstructionResult {
    use std::io::Seek;

    let dest = ins.arg(0) as usize;
    let file_ptr = read_register(process, ins.arg(1) as usize)?;
    let offset = read_register_integer(process, ins.arg(2) as usize)?;

    let position = match &mut file_ptr.get_mut().value {
        ObjectValue::File(file) => file.seek(std::io::SeekFrom::Start(offset as u64)),
        _ => return Err(Signal::Panic("FileSeek expects a File".to_string())),
    }
    .map_err(io_throw)?;

    process.set_register(dest, ObjectPointer::integer(position as i64));
    Ok(())
}

// --- conversions ------------------------------------------------------

pub fn integer_to_float(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let value = read_register_integer(process, ins.arg(1) as usize)? as f64;

    let result = process.allocate(object_value::float(value), state.float_prototype);
    process.set_register(dest, result);
    Ok(())
}

pub fn float_to_integer(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let value = read_register_float(process, ins.arg(1) as usize)?;
    let truncated = value as i64;

    let result = if ObjectPointer::integer_too_large(truncated) {
        process.allocate(object_value::bigint(BigInt::from(truncated)), state.integer_prototype)
    } else {
        ObjectPointer::integer(truncated)
    };

    process.set_register(dest, result);
    Ok(())
}

pub fn integer_to_string(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let value = read_register_integer(process, ins.arg(1) as usize)?;

    let result = process.allocate(object_value::string(value.to_string()), state.string_prototype);
    process.set_register(dest, result);
    Ok(())
}

pub fn float_to_string(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let value = read_register_float(process, ins.arg(1) as usize)?;

    let result = process.allocate(object_value::string(value.to_string()), state.string_prototype);
    process.set_register(dest, result);
    Ok(())
}

pub fn string_to_integer(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let text = read_register_string(process, ins.arg(1) as usize)?;

    let value = text.trim().parse::<i64>().map_err(|_| {
        Signal::Throw(process.allocate(
            object_value::string(format!("invalid integer: {}", text)),
            state.string_prototype,
        ))
    })?;

    process.set_register(dest, ObjectPointer::integer(value));
    Ok(())
}

pub fn string_to_float(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let text = read_register_string(process, ins.arg(1) as usize)?;

    let value = text.trim().parse::<f64>().map_err(|_| {
        Signal::Throw(process.allocate(
            object_value::string(format!("invalid float: {}", text)),
            state.string_prototype,
        ))
    })?;

    let result = process.allocate(object_value::float(value), state.float_prototype);
    process.set_register(dest, result);
    Ok(())
}

// --- misc ------------------------------------------------------------

/// `IsError`: true when `value` is a boxed object tagged with the `@error`
/// marker attribute, the convention this port's standard error types use
/// instead of a dedicated `Error` variant on `ObjectValue`.
pub fn is_error(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let value = read_register(process, ins.arg(1) as usize)?;

    let marker = state.intern("@error");
    let tagged = value.is_boxed() && value.get_attribute(&marker) == Some(state.true_object);

    process.set_register(dest, if tagged { state.true_object } else { state.false_object });
    Ok(())
}

pub fn time_monotonic(state: &RcState, process: &RcProcess, ins: &Instruction) -> InstructionResult {
    let dest = ins.arg(0) as usize;
    let elapsed = state.start_time.elapsed().as_millis() as i64;

    process.set_register(dest, ObjectPointer::integer(elapsed));
    Ok(())
}
