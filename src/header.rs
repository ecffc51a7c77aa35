//! The attribute map attached to a boxed object.
//!
//! Kept as a small open-addressing table keyed by interned attribute names
//! (themselves `ObjectPointer`s to permanent strings), separate from
//! `Object` so objects without any attributes (the common case for numbers,
//! strings, and array elements) pay nothing for it.

use crate::object_pointer::{ObjectPointer, ObjectPointerPointer};
use std::collections::HashMap;

pub struct Header {
    attributes: HashMap<ObjectPointer, ObjectPointer>,
}

impl Header {
    pub fn new() -> Self {
        Header {
            attributes: HashMap::new(),
        }
    }

    pub fn add_attribute(&mut self, name: ObjectPointer, value: ObjectPointer) {
        self.attributes.insert(name, value);
    }

    pub fn get_attribute(&self, name: &ObjectPointer) -> Option<ObjectPointer> {
        self.attributes.get(name).copied()
    }

    pub fn has_attribute(&self, name: &ObjectPointer) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attribute_names(&self) -> Vec<ObjectPointer> {
        self.attributes.keys().copied().collect()
    }

    /// Invokes `callback` for every name and value stored in this map,
    /// pointing directly at the live `HashMap` entries rather than at copies,
    /// so a tracer can mark (or a mover can rewrite) the actual slots.
    pub fn each_pointer<F: FnMut(ObjectPointerPointer)>(&self, callback: &mut F) {
        for (name, value) in self.attributes.iter() {
            callback(ObjectPointerPointer::new(name));
            callback(ObjectPointerPointer::new(value));
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_pointer::ObjectPointer;

    #[test]
    fn test_add_and_get_attribute() {
        let mut header = Header::new();
        let name = ObjectPointer::integer(1);
        let value = ObjectPointer::integer(2);

        header.add_attribute(name, value);

        assert_eq!(header.get_attribute(&name), Some(value));
        assert!(header.has_attribute(&name));
    }

    #[test]
    fn test_missing_attribute() {
        let header = Header::new();
        let name = ObjectPointer::integer(1);

        assert_eq!(header.get_attribute(&name), None);
    }
}
