//! Tagged object pointers.
//!
//! An `ObjectPointer` is either an *immediate* integer packed directly into
//! the pointer's bits, or a tagged pointer to a boxed `Object` living in some
//! process's heap (or in the permanent space). The lowest bit of the raw
//! word is the integer tag; the next bit records whether a *boxed* pointer
//! targets the mature generation (checked via the pointed-to `Object`'s own
//! flags, not via pointer tagging, since mature-ness changes over an
//! object's lifetime while its address does not need to).

use crate::object::Object;

pub type RawObjectPointer = *mut Object;

const INTEGER_BIT: usize = 0;
const INTEGER_SHIFT: usize = 1;

/// The largest (and smallest, negated) integer that still fits in a tagged
/// immediate once the tag bit is accounted for.
pub const MAX_INTEGER: i64 = i64::max_value() >> INTEGER_SHIFT;
pub const MIN_INTEGER: i64 = i64::min_value() >> INTEGER_SHIFT;

/// A bare tagged pointer, without any reference counting. Kept as its own
/// type (instead of folding the tag bit handling into `ObjectPointer`
/// directly) so tests and the collector can poke at the raw bits directly,
/// mirroring `pointer.raw.raw` style access used throughout the VM's test
/// suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaggedObjectPointer {
    pub raw: RawObjectPointer,
}

impl TaggedObjectPointer {
    pub fn new(raw: RawObjectPointer) -> Self {
        TaggedObjectPointer { raw }
    }

    fn with_integer(value: i64) -> Self {
        let tagged = ((value << INTEGER_SHIFT) | 1) as RawObjectPointer;

        TaggedObjectPointer { raw: tagged }
    }

    fn is_integer(&self) -> bool {
        (self.raw as usize) & (1 << INTEGER_BIT) != 0
    }

    fn integer_value(&self) -> i64 {
        (self.raw as isize >> INTEGER_SHIFT) as i64
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectPointer {
    pub raw: TaggedObjectPointer,
}

unsafe impl Send for ObjectPointer {}
unsafe impl Sync for ObjectPointer {}

impl ObjectPointer {
    pub fn new(raw: RawObjectPointer) -> Self {
        ObjectPointer {
            raw: TaggedObjectPointer::new(raw),
        }
    }

    pub fn null() -> Self {
        ObjectPointer::new(std::ptr::null_mut())
    }

    pub fn is_null(&self) -> bool {
        self.raw.raw.is_null()
    }

    /// Packs `value` as a tagged immediate. Callers must ensure
    /// `integer_too_large` is false for `value`, otherwise use a boxed
    /// `BigInt` instead (see `Process::allocate_i64`).
    pub fn integer(value: i64) -> Self {
        ObjectPointer {
            raw: TaggedObjectPointer::with_integer(value),
        }
    }

    pub fn is_integer(&self) -> bool {
        self.raw.is_integer()
    }

    pub fn integer_too_large(value: i64) -> bool {
        value > MAX_INTEGER || value < MIN_INTEGER
    }

    pub fn unsigned_integer_too_large(value: u64) -> bool {
        value > MAX_INTEGER as u64
    }

    pub fn unsigned_integer_as_big_integer(value: u64) -> bool {
        value > i64::max_value() as u64
    }

    pub fn integer_value(&self) -> Result<i64, String> {
        if self.is_integer() {
            Ok(self.raw.integer_value())
        } else if self.is_bigint() {
            self.get()
                .value
                .as_integer_checked()
                .ok_or_else(|| "Integer value out of range".to_string())
        } else {
            Err("ObjectPointer does not contain an integer".to_string())
        }
    }

    pub fn usize_value(&self) -> Result<usize, String> {
        self.integer_value().and_then(|value| {
            if value < 0 {
                Err("Integer value must not be negative".to_string())
            } else {
                Ok(value as usize)
            }
        })
    }

    pub fn u8_value(&self) -> Result<u8, String> {
        self.integer_value().and_then(|value| {
            if !(0..=u8::max_value() as i64).contains(&value) {
                Err("Integer value does not fit in a u8".to_string())
            } else {
                Ok(value as u8)
            }
        })
    }

    pub fn is_boxed(&self) -> bool {
        !self.is_integer() && !self.is_null()
    }

    /// Returns whether the boxed value is itself a `BigInt` (a boxed integer
    /// that did not fit in the tagged-immediate range).
    pub fn is_bigint(&self) -> bool {
        self.is_boxed() && self.get().value.is_bigint()
    }

    pub fn float_value(&self) -> Result<f64, String> {
        if self.is_boxed() && self.get().value.is_float() {
            Ok(self.get().value.as_float())
        } else {
            Err("ObjectPointer does not contain a Float".to_string())
        }
    }

    pub fn string_value(&self) -> Result<&str, String> {
        if self.is_boxed() && self.get().value.is_string() {
            Ok(self.get().value.as_string())
        } else {
            Err("ObjectPointer does not contain a String".to_string())
        }
    }

    pub fn block_value(&self) -> Result<&crate::block::Block, String> {
        if self.is_boxed() {
            if let crate::object_value::ObjectValue::Block(block) =
                &self.get().value
            {
                return Ok(block);
            }
        }

        Err("ObjectPointer does not contain a Block".to_string())
    }

    pub fn get(&self) -> &Object {
        unsafe { &*self.raw.raw }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn get_mut(&self) -> &mut Object {
        unsafe { &mut *self.raw.raw }
    }

    pub fn prototype(&self, state: &crate::vm::state::RcState) -> Option<ObjectPointer> {
        if self.is_integer() {
            Some(state.integer_prototype)
        } else if self.is_null() {
            None
        } else {
            self.get().prototype()
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.is_integer() || self.is_null() || self.get().is_permanent()
    }

    pub fn is_mature(&self) -> bool {
        self.is_boxed() && self.get().is_mature()
    }

    pub fn is_young(&self) -> bool {
        self.is_boxed() && !self.get().is_mature() && !self.get().is_permanent()
    }

    /// Returns whether this pointer is *local* to the process that currently
    /// holds it, i.e. it is not permanent and thus needs a deep copy before
    /// it can safely be handed to another process.
    pub fn is_local(&self) -> bool {
        !self.is_permanent()
    }

    pub fn is_marked(&self) -> bool {
        self.is_boxed() && self.get().is_marked()
    }

    pub fn mark(&self) {
        if self.is_boxed() {
            self.get_mut().mark();
        }
    }

    pub fn status(&self, promote: bool, fragmented: bool) -> crate::object::ObjectStatus {
        self.get().status(promote, fragmented)
    }

    pub fn resolve_forwarding_pointer(&mut self) {
        if let Some(forwarded) = self.get().forwarding_pointer() {
            *self = forwarded;
        }
    }

    pub fn add_attribute(
        &self,
        _process: &crate::process::RcProcess,
        name: ObjectPointer,
        value: ObjectPointer,
    ) {
        self.get_mut().add_attribute(name, value);
    }

    pub fn get_attribute(&self, name: &ObjectPointer) -> Option<ObjectPointer> {
        self.get().get_attribute(name)
    }

    pub fn is_finalizable(&self) -> bool {
        self.is_boxed() && self.get().is_finalizable()
    }

    /// Returns a raw pointer usable as a root when scanning, wrapped so the
    /// collector can rewrite it in place (used for forwarding-pointer
    /// resolution during evacuation).
    pub fn pointer(&self) -> ObjectPointerPointer {
        ObjectPointerPointer::new(self)
    }
}

impl std::fmt::Debug for ObjectPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ObjectPointer({:p})", self.raw.raw)
    }
}

/// A raw pointer to an `ObjectPointer` slot (a register, a local, an
/// attribute value, a mailbox entry). Used by the collector to update
/// pointers in place after moving the objects they point to, without owning
/// (and thus outliving) the slot itself.
#[derive(Clone, Copy)]
pub struct ObjectPointerPointer {
    raw: *mut ObjectPointer,
}

unsafe impl Send for ObjectPointerPointer {}
unsafe impl Sync for ObjectPointerPointer {}

impl ObjectPointerPointer {
    pub fn new(pointer: &ObjectPointer) -> Self {
        ObjectPointerPointer {
            raw: pointer as *const ObjectPointer as *mut ObjectPointer,
        }
    }

    pub fn get(&self) -> &ObjectPointer {
        unsafe { &*self.raw }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn get_mut(&self) -> &mut ObjectPointer {
        unsafe { &mut *self.raw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_roundtrip() {
        let pointer = ObjectPointer::integer(42);

        assert!(pointer.is_integer());
        assert_eq!(pointer.integer_value().unwrap(), 42);
    }

    #[test]
    fn test_integer_negative_roundtrip() {
        let pointer = ObjectPointer::integer(-42);

        assert_eq!(pointer.integer_value().unwrap(), -42);
    }

    #[test]
    fn test_integer_too_large() {
        assert!(ObjectPointer::integer_too_large(i64::max_value()));
        assert!(!ObjectPointer::integer_too_large(100));
    }

    #[test]
    fn test_null() {
        let pointer = ObjectPointer::null();

        assert!(pointer.is_null());
        assert!(!pointer.is_integer());
    }

    #[test]
    fn test_pointer_pointer_mutation() {
        let pointer = ObjectPointer::integer(1);
        let pointer_pointer = pointer.pointer();

        *pointer_pointer.get_mut() = ObjectPointer::integer(2);

        assert_eq!(pointer.integer_value().unwrap(), 2);
    }
}
