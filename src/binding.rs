//! Local variable bindings.
//!
//! A `Binding` is the local-variable scope of a single execution context. A
//! block literal captures its defining context's binding by reference
//! (`RcBinding`, shared via `Arc`) so mutations made inside a closure are
//! visible to the scope that created it, matching how method and block
//! contexts alias their enclosing locals rather than copying them.

use crate::object_pointer::{ObjectPointer, ObjectPointerPointer};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Binding {
    locals: Mutex<Vec<Option<ObjectPointer>>>,
    pub self_object: ObjectPointer,
    parent: Option<RcBinding>,
}

pub type RcBinding = Arc<Binding>;

impl Binding {
    pub fn new(self_object: ObjectPointer) -> RcBinding {
        Arc::new(Binding {
            locals: Mutex::new(Vec::new()),
            self_object,
            parent: None,
        })
    }

    pub fn with_parent(self_object: ObjectPointer, parent: RcBinding) -> RcBinding {
        Arc::new(Binding {
            locals: Mutex::new(Vec::new()),
            self_object,
            parent: Some(parent),
        })
    }

    pub fn get_local(&self, index: usize) -> Result<ObjectPointer, String> {
        self.locals
            .lock()
            .get(index)
            .and_then(|value| *value)
            .ok_or_else(|| format!("undefined local variable index {}", index))
    }

    pub fn set_local(&self, index: usize, value: ObjectPointer) {
        let mut locals = self.locals.lock();

        if index >= locals.len() {
            locals.resize(index + 1, None);
        }

        locals[index] = Some(value);
    }

    pub fn local_exists(&self, index: usize) -> bool {
        matches!(self.locals.lock().get(index), Some(Some(_)))
    }

    pub fn parent(&self) -> Option<&RcBinding> {
        self.parent.as_ref()
    }

    /// Walks at most `depth` parent bindings up the capture chain.
    pub fn find_parent(&self, depth: usize) -> Option<&RcBinding> {
        let mut found = self.parent.as_ref();

        for _ in 0..depth.saturating_sub(1) {
            found = found.and_then(|binding| binding.parent.as_ref());
        }

        found
    }

    pub fn each_pointer<F: FnMut(ObjectPointerPointer)>(&self, callback: &mut F) {
        callback(self.self_object.pointer());

        for local in self.locals.lock().iter().flatten() {
            callback(local.pointer());
        }

        if let Some(parent) = &self.parent {
            parent.each_pointer(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_local() {
        let binding = Binding::new(ObjectPointer::null());

        assert!(binding.get_local(0).is_err());

        binding.set_local(0, ObjectPointer::integer(5));

        assert_eq!(binding.get_local(0).unwrap(), ObjectPointer::integer(5));
        assert!(binding.local_exists(0));
        assert!(!binding.local_exists(1));
    }

    #[test]
    fn test_with_parent() {
        let parent = Binding::new(ObjectPointer::integer(1));
        let child = Binding::with_parent(ObjectPointer::integer(2), parent.clone());

        assert!(child.parent().is_some());
        assert_eq!(child.parent().unwrap().self_object, parent.self_object);
    }

    #[test]
    fn test_each_pointer_visits_parent() {
        let parent = Binding::new(ObjectPointer::integer(1));
        parent.set_local(0, ObjectPointer::integer(10));

        let child = Binding::with_parent(ObjectPointer::integer(2), parent);
        child.set_local(0, ObjectPointer::integer(20));

        let mut seen = Vec::new();
        child.each_pointer(&mut |pointer| seen.push(pointer.get().integer_value().unwrap()));

        assert!(seen.contains(&2));
        assert!(seen.contains(&20));
        assert!(seen.contains(&1));
        assert!(seen.contains(&10));
    }
}
