//! Virtual machine registers.
//!
//! Every execution context owns a flat register file addressed by the
//! bytecode's register operands. Registers start out empty (`None`) and are
//! populated as instructions run; reading an empty register is a bytecode
//! bug, not a recoverable runtime error, so `get` returns an `Option` and
//! callers that know better panic via `expect` at the instruction level.

use crate::object_pointer::ObjectPointer;

pub struct Register {
    values: Vec<Option<ObjectPointer>>,
}

impl Register {
    pub fn new() -> Self {
        Register { values: Vec::new() }
    }

    pub fn set(&mut self, index: usize, value: ObjectPointer) {
        if index >= self.values.len() {
            self.values.resize(index + 1, None);
        }

        self.values[index] = Some(value);
    }

    pub fn get(&self, index: usize) -> Option<ObjectPointer> {
        self.values.get(index).and_then(|value| *value)
    }

    /// Appends every occupied register's pointer to `pointers`, used when
    /// collecting GC roots for a suspended context.
    pub fn push_pointers(&self, pointers: &mut Vec<crate::object_pointer::ObjectPointerPointer>) {
        for value in self.values.iter().flatten() {
            pointers.push(value.pointer());
        }
    }
}

impl Default for Register {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut register = Register::new();
        let pointer = ObjectPointer::integer(5);

        register.set(2, pointer);

        assert_eq!(register.get(2), Some(pointer));
        assert!(register.get(0).is_none());
        assert!(register.get(10).is_none());
    }

    #[test]
    fn test_push_pointers() {
        let mut register = Register::new();
        register.set(0, ObjectPointer::integer(1));
        register.set(3, ObjectPointer::integer(2));

        let mut pointers = Vec::new();
        register.push_pointers(&mut pointers);

        assert_eq!(pointers.len(), 2);
    }
}
