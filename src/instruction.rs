//! Bytecode instructions.
//!
//! An `Instruction` pairs an opcode with its raw `u32` operands plus the
//! source line/column it was compiled from (used for stack traces and
//! runtime error messages). Operand meaning is opcode-specific and decoded
//! by the interpreter, not here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InstructionType {
    SetInteger,
    SetFloat,
    SetString,
    SetObject,
    SetArray,
    SetByteArray,
    SetNil,
    SetTrue,
    SetFalse,
    SetLocal,
    GetLocal,
    SetGlobal,
    GetGlobal,
    SetAttribute,
    GetAttribute,
    SetPrototype,
    GetPrototype,
    SetBlock,
    RunBlock,
    Return,
    GotoIfFalse,
    GotoIfTrue,
    Goto,
    IntegerAdd,
    IntegerSub,
    IntegerMul,
    IntegerDiv,
    IntegerMod,
    IntegerBitwiseAnd,
    IntegerBitwiseOr,
    IntegerBitwiseXor,
    IntegerShiftLeft,
    IntegerShiftRight,
    IntegerSmaller,
    IntegerGreater,
    IntegerEquals,
    FloatAdd,
    FloatSub,
    FloatMul,
    FloatDiv,
    FloatMod,
    FloatSmaller,
    FloatGreater,
    FloatEquals,
    ArraySet,
    ArrayAt,
    ArrayLength,
    ArrayClear,
    StringConcat,
    StringLength,
    StringSlice,
    StringEquals,
    StdoutWrite,
    StderrWrite,
    StdinRead,
    FileOpen,
    FileRead,
    FileWrite,
    FileFlush,
    FileSize,
    FileSeek,
    SpawnProcess,
    SendMessage,
    ReceiveMessage,
    ProcessTerminateCurrent,
    GetCurrentPid,
    SetParentLocal,
    GetParentLocal,
    Throw,
    SetupParentCatchTable,
    Panic,
    AddDefer,
    PinThread,
    UnpinThread,
    ExternalCallNonBlocking,
    ExternalCallBlocking,
    LoadLibrary,
    GetBlockPrototype,
    IsError,
    IntegerToFloat,
    FloatToInteger,
    IntegerToString,
    FloatToString,
    StringToInteger,
    StringToFloat,
    GeneratorAllocate,
    GeneratorYield,
    GeneratorResume,
    ProcessSuspendCurrent,
    Sleep,
    TimeMonotonic,
}

impl InstructionType {
    /// The full dispatch table, in the exact order its `u16` bytecode
    /// encoding assigns discriminants -- used by `bytecode_parser` to decode
    /// an opcode without resorting to an unchecked transmute.
    pub const ALL: &'static [InstructionType] = &[
        InstructionType::SetInteger,
        InstructionType::SetFloat,
        InstructionType::SetString,
        InstructionType::SetObject,
        InstructionType::SetArray,
        InstructionType::SetByteArray,
        InstructionType::SetNil,
        InstructionType::SetTrue,
        InstructionType::SetFalse,
        InstructionType::SetLocal,
        InstructionType::GetLocal,
        InstructionType::SetGlobal,
        InstructionType::GetGlobal,
        InstructionType::SetAttribute,
        InstructionType::GetAttribute,
        InstructionType::SetPrototype,
        InstructionType::GetPrototype,
        InstructionType::SetBlock,
        InstructionType::RunBlock,
        InstructionType::Return,
        InstructionType::GotoIfFalse,
        InstructionType::GotoIfTrue,
        InstructionType::Goto,
        InstructionType::IntegerAdd,
        InstructionType::IntegerSub,
        InstructionType::IntegerMul,
        InstructionType::IntegerDiv,
        InstructionType::IntegerMod,
        InstructionType::IntegerBitwiseAnd,
        InstructionType::IntegerBitwiseOr,
        InstructionType::IntegerBitwiseXor,
        InstructionType::IntegerShiftLeft,
        InstructionType::IntegerShiftRight,
        InstructionType::IntegerSmaller,
        InstructionType::IntegerGreater,
        InstructionType::IntegerEquals,
        InstructionType::FloatAdd,
        InstructionType::FloatSub,
        InstructionType::FloatMul,
        InstructionType::FloatDiv,
        InstructionType::FloatMod,
        InstructionType::FloatSmaller,
        InstructionType::FloatGreater,
        InstructionType::FloatEquals,
        InstructionType::ArraySet,
        InstructionType::ArrayAt,
        InstructionType::ArrayLength,
        InstructionType::ArrayClear,
        InstructionType::StringConcat,
        InstructionType::StringLength,
        InstructionType::StringSlice,
        InstructionType::StringEquals,
        InstructionType::StdoutWrite,
        InstructionType::StderrWrite,
        InstructionType::StdinRead,
        InstructionType::FileOpen,
        InstructionType::FileRead,
        InstructionType::FileWrite,
        InstructionType::FileFlush,
        InstructionType::FileSize,
        InstructionType::FileSeek,
        InstructionType::SpawnProcess,
        InstructionType::SendMessage,
        InstructionType::ReceiveMessage,
        InstructionType::ProcessTerminateCurrent,
        InstructionType::GetCurrentPid,
        InstructionType::SetParentLocal,
        InstructionType::GetParentLocal,
        InstructionType::Throw,
        InstructionType::SetupParentCatchTable,
        InstructionType::Panic,
        InstructionType::AddDefer,
        InstructionType::PinThread,
        InstructionType::UnpinThread,
        InstructionType::ExternalCallNonBlocking,
        InstructionType::ExternalCallBlocking,
        InstructionType::LoadLibrary,
        InstructionType::GetBlockPrototype,
        InstructionType::IsError,
        InstructionType::IntegerToFloat,
        InstructionType::FloatToInteger,
        InstructionType::IntegerToString,
        InstructionType::FloatToString,
        InstructionType::StringToInteger,
        InstructionType::StringToFloat,
        InstructionType::GeneratorAllocate,
        InstructionType::GeneratorYield,
        InstructionType::GeneratorResume,
        InstructionType::ProcessSuspendCurrent,
        InstructionType::Sleep,
        InstructionType::TimeMonotonic,
    ];

    /// Decodes a raw opcode from its position in `ALL`, the safe counterpart
    /// to the transmute the teacher's original parser used.
    pub fn from_u16(value: u16) -> Option<InstructionType> {
        InstructionType::ALL.get(value as usize).copied()
    }

    pub fn to_u16(self) -> u16 {
        InstructionType::ALL
            .iter()
            .position(|variant| *variant == self)
            .expect("every InstructionType variant is listed in ALL") as u16
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub instruction_type: InstructionType,
    pub arguments: Vec<u32>,
    pub line: u32,
    pub column: u32,
}

impl Instruction {
    pub fn new(
        instruction_type: InstructionType,
        arguments: Vec<u32>,
        line: u32,
        column: u32,
    ) -> Self {
        Instruction {
            instruction_type,
            arguments,
            line,
            column,
        }
    }

    pub fn arg(&self, index: usize) -> u32 {
        self.arguments[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let ins = Instruction::new(InstructionType::SetInteger, vec![1, 2], 3, 4);

        assert_eq!(ins.instruction_type, InstructionType::SetInteger);
        assert_eq!(ins.arg(0), 1);
        assert_eq!(ins.line, 3);
        assert_eq!(ins.column, 4);
    }

    #[test]
    fn test_u16_roundtrip_for_every_variant() {
        for (index, variant) in InstructionType::ALL.iter().enumerate() {
            assert_eq!(variant.to_u16(), index as u16);
            assert_eq!(InstructionType::from_u16(index as u16), Some(*variant));
        }
    }

    #[test]
    fn test_from_u16_out_of_range() {
        assert_eq!(InstructionType::from_u16(9999), None);
    }
}
