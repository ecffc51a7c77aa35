//! Process execution contexts.
//!
//! An execution context is one call frame: the registers, the binding chain,
//! the code currently running, the instruction to resume at, the stack of
//! deferred blocks registered in this frame, and a link to the parent frame
//! that called into it.

use crate::binding::{Binding, RcBinding};
use crate::compiled_code::RcCompiledCode;
use crate::global_scope::RcGlobalScope;
use crate::object_pointer::ObjectPointer;
use crate::register::Register;

pub struct ExecutionContext {
    /// The registers for this context.
    pub register: Register,

    /// The binding to evaluate this context in.
    pub binding: RcBinding,

    /// The CompiledCode object associated with this context.
    pub code: RcCompiledCode,

    /// The parent execution context.
    pub parent: Option<Box<ExecutionContext>>,

    /// The index of the instruction to execute next, saved before
    /// suspending a process so it can resume exactly where it left off.
    pub instruction_index: usize,

    /// The register to store this context's return value in, in the
    /// parent context.
    pub return_register: Option<usize>,

    /// Blocks registered via `AddDefer`, run latest-registered-first on
    /// normal return or a caught throw (never on panic or `terminate`; see
    /// 6. Internal Behavior, Resource Safety).
    deferred_blocks: Vec<ObjectPointer>,

    /// The global scope of the module this context's code belongs to.
    pub globals: RcGlobalScope,

    /// The generator object this context is the suspended body of, if any.
    /// Set once by `GeneratorAllocate`/`GeneratorResume` and carried along
    /// whenever the context is parked back into its generator by
    /// `GeneratorYield`.
    pub generator: Option<ObjectPointer>,

    /// Catch entries pushed by a child context's `SetupParentCatchTable`,
    /// covering a `try` body the child is about to run on this context's
    /// behalf. Consulted, innermost-first, before this context's own static
    /// catch table when a throw unwinds into it.
    pub dynamic_catches: Vec<(u32, u32)>,
}

/// Iterates over an `ExecutionContext` and its ancestors, innermost first.
pub struct ExecutionContextIterator<'a> {
    current: Option<&'a ExecutionContext>,
}

impl ExecutionContext {
    pub fn new(
        binding: RcBinding,
        code: RcCompiledCode,
        return_register: Option<usize>,
        globals: RcGlobalScope,
    ) -> ExecutionContext {
        ExecutionContext {
            register: Register::new(),
            binding,
            code,
            parent: None,
            instruction_index: 0,
            return_register,
            deferred_blocks: Vec::new(),
            globals,
            generator: None,
            dynamic_catches: Vec::new(),
        }
    }

    pub fn push_parent_catch(&mut self, jump_to: u32, register: u32) {
        self.dynamic_catches.push((jump_to, register));
    }

    pub fn set_generator(&mut self, generator: ObjectPointer) {
        self.generator = Some(generator);
    }

    /// Returns a new context using a fresh binding created from `object`.
    pub fn with_object(
        object: ObjectPointer,
        code: RcCompiledCode,
        return_register: Option<usize>,
        globals: RcGlobalScope,
    ) -> ExecutionContext {
        ExecutionContext::new(Binding::new(object), code, return_register, globals)
    }

    /// Returns a new context whose binding captures `parent_binding` (used
    /// when running a closure).
    pub fn with_binding(
        parent_binding: RcBinding,
        code: RcCompiledCode,
        return_register: Option<usize>,
        globals: RcGlobalScope,
    ) -> ExecutionContext {
        let object = parent_binding.self_object;
        let binding = Binding::with_parent(object, parent_binding);

        ExecutionContext::new(binding, code, return_register, globals)
    }

    pub fn set_parent(&mut self, parent: Box<ExecutionContext>) {
        self.parent = Some(parent);
    }

    pub fn parent(&self) -> Option<&ExecutionContext> {
        self.parent.as_deref()
    }

    pub fn parent_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.parent.as_deref_mut()
    }

    pub fn self_object(&self) -> ObjectPointer {
        self.binding.self_object
    }

    pub fn get_register(&self, register: usize) -> Option<ObjectPointer> {
        self.register.get(register)
    }

    pub fn set_register(&mut self, register: usize, value: ObjectPointer) {
        self.register.set(register, value);
    }

    pub fn get_local(&self, index: usize) -> Result<ObjectPointer, String> {
        self.binding.get_local(index)
    }

    pub fn set_local(&mut self, index: usize, value: ObjectPointer) {
        self.binding.set_local(index, value);
    }

    pub fn binding(&self) -> RcBinding {
        self.binding.clone()
    }

    pub fn add_defer(&mut self, block: ObjectPointer) {
        self.deferred_blocks.push(block);
    }

    /// Drains the deferred blocks registered in this frame, latest first.
    /// Called on normal return and on a caught throw; never on panic or
    /// `terminate`.
    pub fn take_deferred_blocks(&mut self) -> Vec<ObjectPointer> {
        let mut blocks = std::mem::take(&mut self.deferred_blocks);
        blocks.reverse();
        blocks
    }

    /// Finds a parent context at most `depth` contexts up the ancestor
    /// chain.
    pub fn find_parent(&self, depth: usize) -> Option<&ExecutionContext> {
        let mut found = self.parent();

        for _ in 0..depth.saturating_sub(1) {
            if let Some(unwrapped) = found {
                found = unwrapped.parent();
            } else {
                return None;
            }
        }

        found
    }

    /// Returns an iterator for traversing the context chain, including the
    /// current context.
    pub fn contexts(&self) -> ExecutionContextIterator {
        ExecutionContextIterator { current: Some(self) }
    }

    pub fn each_pointer<F: FnMut(crate::object_pointer::ObjectPointerPointer)>(
        &self,
        mut callback: F,
    ) {
        let mut register_pointers = Vec::new();
        self.register.push_pointers(&mut register_pointers);

        for pointer in register_pointers {
            callback(pointer);
        }

        self.binding.each_pointer(&mut callback);

        for block in &self.deferred_blocks {
            callback(block.pointer());
        }

        if let Some(generator) = &self.generator {
            callback(generator.pointer());
        }
    }
}

impl<'a> Iterator for ExecutionContextIterator<'a> {
    type Item = &'a ExecutionContext;

    fn next(&mut self) -> Option<&'a ExecutionContext> {
        if let Some(ctx) = self.current {
            self.current = ctx.parent();

            return Some(ctx);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::compiled_code::CompiledCode;
    use crate::global_scope::GlobalScope;
    use crate::object_pointer::{ObjectPointer, RawObjectPointer};

    fn new_binding() -> RcBinding {
        Binding::new(ObjectPointer::null())
    }

    fn new_compiled_code() -> RcCompiledCode {
        CompiledCode::with_rc("a".to_string(), "a.aeon".to_string(), 1, Vec::new())
    }

    fn new_context() -> ExecutionContext {
        ExecutionContext::new(new_binding(), new_compiled_code(), None, GlobalScope::new())
    }

    #[test]
    fn test_new() {
        let context = ExecutionContext::new(
            new_binding(),
            new_compiled_code(),
            Some(4),
            GlobalScope::new(),
        );

        assert!(context.parent.is_none());
        assert_eq!(context.instruction_index, 0);
        assert_eq!(context.return_register, Some(4));
    }

    #[test]
    fn test_with_object() {
        let context = ExecutionContext::with_object(
            ObjectPointer::null(),
            new_compiled_code(),
            Some(4),
            GlobalScope::new(),
        );

        assert!(context.parent.is_none());
        assert_eq!(context.return_register, Some(4));
    }

    #[test]
    fn test_with_binding() {
        let binding = new_binding();
        let context =
            ExecutionContext::with_binding(binding, new_compiled_code(), None, GlobalScope::new());

        assert!(context.binding.parent().is_some());
    }

    #[test]
    fn test_set_parent() {
        let context1 = new_context();
        let mut context2 = new_context();

        context2.set_parent(Box::new(context1));

        assert!(context2.parent.is_some());
    }

    #[test]
    fn test_self_object() {
        let binding = new_binding();
        let context = ExecutionContext::new(
            binding.clone(),
            new_compiled_code(),
            None,
            GlobalScope::new(),
        );

        assert_eq!(context.self_object().raw.raw, binding.self_object.raw.raw);
    }

    #[test]
    fn test_get_register_invalid() {
        let context = new_context();

        assert!(context.get_register(0).is_none());
    }

    #[test]
    fn test_get_set_register_valid() {
        let mut context = new_context();
        let pointer = ObjectPointer::new(0x4 as RawObjectPointer);

        context.set_register(0, pointer);

        assert!(context.get_register(0).is_some());
    }

    #[test]
    fn test_get_local_invalid() {
        let context = new_context();

        assert!(context.get_local(0).is_err());
    }

    #[test]
    fn test_get_set_local_valid() {
        let mut context = new_context();
        let pointer = ObjectPointer::null();

        context.set_local(0, pointer);

        assert!(context.get_local(0).is_ok());
    }

    #[test]
    fn test_find_parent() {
        let context1 = new_context();
        let mut context2 = new_context();
        let mut context3 = new_context();

        context2.set_parent(Box::new(context1));
        context3.set_parent(Box::new(context2));

        let found = context3.find_parent(1);

        assert!(found.is_some());
        assert!(found.unwrap().parent().is_some());
        assert!(found.unwrap().parent().unwrap().parent().is_none());
    }

    #[test]
    fn test_contexts() {
        let context1 = new_context();
        let mut context2 = new_context();
        let mut context3 = new_context();

        context2.set_parent(Box::new(context1));
        context3.set_parent(Box::new(context2));

        let mut contexts = context3.contexts();

        assert!(contexts.next().is_some());
        assert!(contexts.next().is_some());
        assert!(contexts.next().is_some());
        assert!(contexts.next().is_none());
    }

    #[test]
    fn test_add_and_take_deferred_blocks_reverses_order() {
        let mut context = new_context();

        context.add_defer(ObjectPointer::integer(1));
        context.add_defer(ObjectPointer::integer(2));

        let drained = context.take_deferred_blocks();

        assert_eq!(drained[0].integer_value().unwrap(), 2);
        assert_eq!(drained[1].integer_value().unwrap(), 1);
        assert!(context.take_deferred_blocks().is_empty());
    }
}
