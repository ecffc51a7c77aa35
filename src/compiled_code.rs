//! Compiled blocks of bytecode.
//!
//! A `CompiledCode` is the unit produced by the compiler for every block,
//! method, and closure: its instructions, the literal pools those
//! instructions index into, and the exception handler ranges covering it.
//! Nested blocks (closures defined inside a method) are stored inline in
//! `code_objects` and referenced by index from a `SetBlock` instruction.

use crate::catch_table::CatchTable;
use crate::instruction::Instruction;
use std::sync::Arc;

pub struct CompiledCode {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub arguments: u32,
    pub required_arguments: u32,
    pub rest_argument: bool,
    pub locals: Vec<String>,
    pub instructions: Vec<Instruction>,
    pub integer_literals: Vec<i64>,
    pub float_literals: Vec<f64>,
    pub string_literals: Vec<String>,
    pub code_objects: Vec<RcCompiledCode>,
    pub catch_table: CatchTable,

    /// Whether `GeneratorAllocate` should treat this code object as a
    /// generator body rather than a plain block. Set by the compiler; read
    /// by `vm::instructions` when allocating a block's runtime value.
    pub is_generator: bool,
}

pub type RcCompiledCode = Arc<CompiledCode>;

impl CompiledCode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        file: String,
        line: u32,
        arguments: u32,
        required_arguments: u32,
        rest_argument: bool,
        locals: Vec<String>,
        instructions: Vec<Instruction>,
        integer_literals: Vec<i64>,
        float_literals: Vec<f64>,
        string_literals: Vec<String>,
        code_objects: Vec<RcCompiledCode>,
        catch_table: CatchTable,
        is_generator: bool,
    ) -> Self {
        CompiledCode {
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
        }
    }

    /// Convenience constructor for a block with no literals, locals, or
    /// nested code objects, used heavily by tests that just need something
    /// to run instructions against.
    pub fn with_rc(
        name: String,
        file: String,
        line: u32,
        instructions: Vec<Instruction>,
    ) -> RcCompiledCode {
        Arc::new(CompiledCode::new(
            name,
            file,
            line,
            0,
            0,
            false,
            Vec::new(),
            instructions,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            false,
        ))
    }

    pub fn locals_count(&self) -> usize {
        self.locals.len()
    }

    pub fn integer(&self, index: usize) -> i64 {
        self.integer_literals[index]
    }

    pub fn float(&self, index: usize) -> f64 {
        self.float_literals[index]
    }

    pub fn string(&self, index: usize) -> &str {
        &self.string_literals[index]
    }

    pub fn code_object(&self, index: usize) -> RcCompiledCode {
        self.code_objects[index].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_rc() {
        let code = CompiledCode::with_rc("main".to_string(), "main.aeon".to_string(), 1, Vec::new());

        assert_eq!(code.name, "main");
        assert_eq!(code.locals_count(), 0);
    }
}
