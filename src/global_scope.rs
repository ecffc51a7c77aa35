//! Per-module global variable storage.
//!
//! Globals are one of the few pieces of state shared across every process
//! running code from the same module (9. Implementation Constraints:
//! "Global mutable state" is an explicit, narrow allow-list). Access is
//! synchronized with a lock since any process executing the module's code
//! may read or write a global concurrently.

use crate::object_pointer::ObjectPointer;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct GlobalScope {
    variables: Mutex<Vec<Option<ObjectPointer>>>,
}

pub type RcGlobalScope = Arc<GlobalScope>;

impl GlobalScope {
    pub fn new() -> RcGlobalScope {
        Arc::new(GlobalScope {
            variables: Mutex::new(Vec::new()),
        })
    }

    pub fn get(&self, index: usize) -> Option<ObjectPointer> {
        self.variables.lock().get(index).and_then(|value| *value)
    }

    pub fn set(&self, index: usize, value: ObjectPointer) {
        let mut variables = self.variables.lock();

        if index >= variables.len() {
            variables.resize(index + 1, None);
        }

        variables[index] = Some(value);
    }

    pub fn push_pointers(&self, pointers: &mut Vec<crate::object_pointer::ObjectPointerPointer>) {
        for value in self.variables.lock().iter().flatten() {
            pointers.push(value.pointer());
        }
    }
}

impl Default for GlobalScope {
    fn default() -> Self {
        GlobalScope {
            variables: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let scope = GlobalScope::new();

        assert!(scope.get(0).is_none());

        scope.set(0, ObjectPointer::integer(42));

        assert_eq!(scope.get(0), Some(ObjectPointer::integer(42)));
    }
}
