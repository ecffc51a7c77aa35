//! Runnable block values (methods, closures, and lambdas).
//!
//! A `Block` pairs a `CompiledCode` with the receiver and (for closures) the
//! captured binding it should run in. Running the same `CompiledCode` twice
//! with different receivers/captures produces two independent `Block`
//! values, which is how methods are turned into first-class objects without
//! recompiling them.

use crate::binding::RcBinding;
use crate::compiled_code::RcCompiledCode;
use crate::object_pointer::{ObjectPointer, ObjectPointerPointer};

pub struct Block {
    pub code: RcCompiledCode,
    pub receiver: ObjectPointer,
    pub captured_binding: Option<RcBinding>,
}

impl Block {
    pub fn new(code: RcCompiledCode, receiver: ObjectPointer, captured_binding: Option<RcBinding>) -> Self {
        Block {
            code,
            receiver,
            captured_binding,
        }
    }

    pub fn without_capture(code: RcCompiledCode, receiver: ObjectPointer) -> Self {
        Block::new(code, receiver, None)
    }

    pub fn each_pointer<F: FnMut(ObjectPointerPointer)>(&self, callback: &mut F) {
        callback(self.receiver.pointer());

        if let Some(binding) = &self.captured_binding {
            binding.each_pointer(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled_code::CompiledCode;

    fn new_code() -> RcCompiledCode {
        CompiledCode::with_rc("x".to_string(), "x.aeon".to_string(), 1, Vec::new())
    }

    #[test]
    fn test_without_capture_has_no_binding() {
        let block = Block::without_capture(new_code(), ObjectPointer::integer(1));

        assert!(block.captured_binding.is_none());
    }

    #[test]
    fn test_each_pointer_visits_receiver() {
        let block = Block::without_capture(new_code(), ObjectPointer::integer(7));
        let mut seen = Vec::new();

        block.each_pointer(&mut |pointer| seen.push(pointer.get().integer_value().unwrap()));

        assert_eq!(seen, vec![7]);
    }
}
