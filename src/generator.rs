//! Generator values: blocks that can suspend mid-run and be resumed later
//! (4.G Generators).
//!
//! A generator wraps a `CompiledCode` the way a `Block` does, but instead of
//! running to completion in one call it parks its `ExecutionContext` on
//! `GeneratorYield` and picks it back up on the next `GeneratorResume`. The
//! frame itself is reused as-is (same registers, same binding); only the
//! instruction index and the parent link move each time it is parked and
//! restarted, courtesy of `Process::take_context`/`Process::push_context`.

use crate::execution_context::ExecutionContext;
use crate::object_pointer::{ObjectPointer, ObjectPointerPointer};

pub struct Generator {
    /// The generator's suspended body, or `None` before the first resume and
    /// after it has run to completion.
    pub context: Option<Box<ExecutionContext>>,

    /// Set once the generator's body has returned normally; every resume
    /// after that immediately yields nothing instead of restarting it.
    pub finished: bool,
}

impl Generator {
    pub fn new() -> Self {
        Generator {
            context: None,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn finish(&mut self) {
        self.context = None;
        self.finished = true;
    }

    pub fn park(&mut self, context: Box<ExecutionContext>) {
        self.context = Some(context);
    }

    pub fn take_context(&mut self) -> Option<Box<ExecutionContext>> {
        self.context.take()
    }

    pub fn each_pointer<F: FnMut(ObjectPointerPointer)>(&self, callback: &mut F) {
        if let Some(context) = &self.context {
            context.each_pointer(|pointer| callback(pointer));
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generator_is_not_finished() {
        let generator = Generator::new();

        assert!(!generator.is_finished());
        assert!(generator.context.is_none());
    }

    #[test]
    fn test_finish_clears_context() {
        let mut generator = Generator::new();

        generator.finish();

        assert!(generator.is_finished());
        assert!(generator.context.is_none());
    }

    #[test]
    fn test_park_and_take_context_roundtrip() {
        use crate::binding::Binding;
        use crate::compiled_code::CompiledCode;
        use crate::global_scope::GlobalScope;

        let code = CompiledCode::with_rc("g".to_string(), "g.aeon".to_string(), 1, Vec::new());
        let context = ExecutionContext::new(
            Binding::new(ObjectPointer::null()),
            code,
            None,
            GlobalScope::new(),
        );

        let mut generator = Generator::new();

        generator.park(Box::new(context));

        assert!(generator.context.is_some());
        assert!(generator.take_context().is_some());
        assert!(generator.context.is_none());
    }
}
