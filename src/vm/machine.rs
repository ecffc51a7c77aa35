//! The bytecode dispatch loop (4.E Interpreter & VM).
//!
//! `Machine::run` is what a `scheduler::worker::Worker` calls for every
//! process it pops. It drives one process through a fixed reduction budget,
//! decoding and dispatching one `Instruction` at a time, then returns control
//! to the worker -- either because the budget ran out (the process gets
//! rescheduled at the back of the queue) or because the process finished,
//! suspended, or blew up.
//!
//! Control flow (`RunBlock`/`Return`/`Throw`/`SetupParentCatchTable`/
//! generators) lives here; everything else is a one-line dispatch into
//! `vm::instructions` or `vm::process_instructions`.

use std::sync::Arc;

use log::error;

use crate::block::Block;
use crate::catch_table;
use crate::execution_context::ExecutionContext;
use crate::generator;
use crate::instruction::{Instruction, InstructionType};
use crate::object_pointer::ObjectPointer;
use crate::object_value;
use crate::process::RcProcess;
use crate::stacktrace;
use crate::vm::ffi;
use crate::vm::instructions::{self as ins, Signal};
use crate::vm::process_instructions as process_ins;
use crate::vm::state::RcState;

/// What the outer `run` loop should do once `execute` returns.
enum Action {
    /// Keep running; more instructions (or a rescheduled generator resume)
    /// are immediately available.
    Continue,

    /// The process' reduction budget is spent for this quantum; reschedule
    /// it and let the worker pick up something else.
    Reschedule,

    /// The process parked itself (suspend, sleep, receive, FFI-blocking
    /// hand-off); nothing further to do this quantum.
    Yielded,

    /// The process ran its top-level context to completion, or called
    /// `ProcessTerminateCurrent`.
    Finished,

    /// A panic, or a throw nothing caught, took the whole VM down with it.
    Stopped,
}

pub struct Machine {
    pub state: RcState,
}

impl Machine {
    pub fn new(state: RcState) -> Arc<Self> {
        Arc::new(Machine { state })
    }

    /// Runs `process` for up to `state.config.reductions` instructions.
    pub fn run(&self, process: &RcProcess, worker_id: u8) {
        process.no_longer_waiting_for_message();
        process.running();

        let mut reductions = self.state.config.reductions;

        loop {
            if reductions == 0 {
                process.set_status_without_overwriting_gc_status(
                    crate::process::ProcessStatus::Scheduled,
                );
                self.state.process_pools.schedule(process.clone());
                return;
            }

            reductions -= 1;

            match self.execute(process, worker_id) {
                Action::Continue => continue,
                Action::Reschedule => {
                    self.state.process_pools.schedule(process.clone());
                    return;
                }
                Action::Yielded | Action::Finished | Action::Stopped => return,
            }
        }
    }

    /// Decodes and runs the single instruction at the current context's
    /// instruction pointer, advancing it first so control-flow instructions
    /// (`Goto*`, `RunBlock`, `Return`) can simply overwrite it afterwards.
    fn execute(&self, process: &RcProcess, worker_id: u8) -> Action {
        let code = process.compiled_code();
        let index = process.instruction_index();

        let instruction = match code.instructions.get(index) {
            Some(instruction) => instruction.clone(),
            None => return self.leave_context(process),
        };

        process.set_instruction_index(index + 1);

        let state = &self.state;

        let result: Result<(), Signal> = match instruction.instruction_type {
            InstructionType::SetInteger => ins::set_integer(state, process, &code, &instruction),
            InstructionType::SetFloat => ins::set_float(state, process, &code, &instruction),
            InstructionType::SetString => ins::set_string(state, process, &code, &instruction),
            InstructionType::SetObject => ins::set_object(process, &instruction),
            InstructionType::SetArray => ins::set_array(state, process, &instruction),
            InstructionType::SetByteArray => ins::set_byte_array(state, process, &instruction),
            InstructionType::SetNil => {
                process.set_register(instruction.arg(0) as usize, ObjectPointer::null());
                Ok(())
            }
            InstructionType::SetTrue => {
                process.set_register(instruction.arg(0) as usize, state.true_object);
                Ok(())
            }
            InstructionType::SetFalse => {
                process.set_register(instruction.arg(0) as usize, state.false_object);
                Ok(())
            }
            // Every other opcode, including `SetLocal`, is handled below in
            // `dispatch`; this match only covers the handful of inline
            // allocation opcodes that don't need their own function.
            _ => Ok(()),
        };

        let result = if matches!(instruction.instruction_type, InstructionType::SetLocal) {
            self.set_local(process, &instruction)
        } else {
            result
        };

        match self.dispatch(process, worker_id, &code, &instruction, result) {
            Some(action) => action,
            None => Action::Continue,
        }
    }

    fn set_local(&self, process: &RcProcess, instruction: &Instruction) -> Result<(), Signal> {
        let index = instruction.arg(0) as usize;
        let value = self.read_register(process, instruction.arg(1) as usize)?;

        process.set_local(index, value);
        Ok(())
    }

    fn read_register(
        &self,
        process: &RcProcess,
        register: usize,
    ) -> Result<ObjectPointer, Signal> {
        process
            .get_register(register)
            .ok_or_else(|| Signal::Panic(format!("register {} is empty", register)))
    }

    /// Handles every instruction not inlined directly in `execute`: the
    /// leaf opcodes (delegated to `vm::instructions`), process-management
    /// opcodes (delegated to `vm::process_instructions`), and the
    /// control-flow opcodes implemented in this module. Returns `Some` when
    /// the quantum loop should stop or reschedule, `None` to keep running.
    #[allow(clippy::too_many_lines)]
    fn dispatch(
        &self,
        process: &RcProcess,
        worker_id: u8,
        code: &crate::compiled_code::CompiledCode,
        instruction: &Instruction,
        inline_result: Result<(), Signal>,
    ) -> Option<Action> {
        use InstructionType::*;

        let state = &self.state;

        // SetLocal and every other "inline" arm resolved in `execute`
        // already produced their final `Result`; everything else starts
        // from a fresh dispatch keyed on the opcode.
        let result: Result<(), Signal> = match instruction.instruction_type {
            SetInteger | SetFloat | SetString | SetObject | SetArray | SetByteArray | SetNil
            | SetTrue | SetFalse | SetLocal => inline_result,

            GetLocal => {
                let dest = instruction.arg(0) as usize;
                process
                    .get_local(instruction.arg(1) as usize)
                    .map(|value| process.set_register(dest, value))
                    .map_err(Signal::Panic)
            }

            SetGlobal => {
                (|| -> Result<(), Signal> {
                    let dest = instruction.arg(0) as usize;
                    let value = self.read_register(process, instruction.arg(1) as usize)?;
                    let stored = process_ins::set_global(
                        state,
                        process,
                        instruction.arg(2) as usize,
                        value,
                    );

                    process.set_register(dest, stored);
                    Ok(())
                })()
            }

            GetGlobal => {
                let dest = instruction.arg(0) as usize;
                let value = process_ins::get_global(process, instruction.arg(1) as usize);

                process.set_register(dest, value);
                Ok(())
            }

            SetAttribute => ins::set_attribute(process, instruction),
            GetAttribute => ins::get_attribute(process, instruction),
            SetPrototype => ins::set_prototype(process, instruction),
            GetPrototype => ins::get_prototype(state, process, instruction),

            SetBlock => {
                let dest = instruction.arg(0) as usize;
                let code_index = instruction.arg(1) as usize;
                let receiver_reg = instruction.arg(2);
                let captures = instruction.arg(3) != 0;

                (|| -> Result<(), Signal> {
                    let receiver = if receiver_reg == ins::NONE {
                        process.self_object()
                    } else {
                        self.read_register(process, receiver_reg as usize)?
                    };

                    let block_code = code.code_object(code_index);

                    let binding = if captures {
                        Some(process.binding())
                    } else {
                        None
                    };

                    let block = Block::new(block_code, receiver, binding);
                    let value = process.allocate(
                        object_value::block(block),
                        state.block_prototype,
                    );

                    process.set_register(dest, value);
                    Ok(())
                })()
            }

            GetBlockPrototype => {
                process.set_register(instruction.arg(0) as usize, state.block_prototype);
                Ok(())
            }

            RunBlock => return Some(self.run_block(process, instruction)),

            Return => return Some(self.leave_context(process)),

            GotoIfFalse => {
                (|| -> Result<(), Signal> {
                    let value = self.read_register(process, instruction.arg(0) as usize)?;

                    if !self.is_truthy(value) {
                        process.set_instruction_index(instruction.arg(1) as usize);
                    }

                    Ok(())
                })()
            }

            GotoIfTrue => {
                (|| -> Result<(), Signal> {
                    let value = self.read_register(process, instruction.arg(0) as usize)?;

                    if self.is_truthy(value) {
                        process.set_instruction_index(instruction.arg(1) as usize);
                    }

                    Ok(())
                })()
            }

            Goto => {
                process.set_instruction_index(instruction.arg(0) as usize);
                Ok(())
            }

            IntegerAdd => ins::integer_add(state, process, instruction),
            IntegerSub => ins::integer_sub(state, process, instruction),
            IntegerMul => ins::integer_mul(state, process, instruction),
            IntegerDiv => ins::integer_div(state, process, instruction),
            IntegerMod => ins::integer_mod(state, process, instruction),
            IntegerBitwiseAnd => ins::integer_bitwise_and(process, instruction),
            IntegerBitwiseOr => ins::integer_bitwise_or(process, instruction),
            IntegerBitwiseXor => ins::integer_bitwise_xor(process, instruction),
            IntegerShiftLeft => ins::integer_shift_left(process, instruction),
            IntegerShiftRight => ins::integer_shift_right(process, instruction),
            IntegerSmaller => ins::integer_smaller(state, process, instruction),
            IntegerGreater => ins::integer_greater(state, process, instruction),
            IntegerEquals => ins::integer_equals(state, process, instruction),

            FloatAdd => ins::float_add(state, process, instruction),
            FloatSub => ins::float_sub(state, process, instruction),
            FloatMul => ins::float_mul(state, process, instruction),
            FloatDiv => ins::float_div(state, process, instruction),
            FloatMod => ins::float_mod(state, process, instruction),
            FloatSmaller => ins::float_smaller(state, process, instruction),
            FloatGreater => ins::float_greater(state, process, instruction),
            FloatEquals => ins::float_equals(state, process, instruction),

            ArraySet => ins::array_set(process, instruction),
            ArrayAt => ins::array_at(process, instruction),
            ArrayLength => ins::array_length(process, instruction),
            ArrayClear => ins::array_clear(process, instruction),

            StringConcat => ins::string_concat(state, process, instruction),
            StringLength => ins::string_length(process, instruction),
            StringSlice => ins::string_slice(state, process, instruction),
            StringEquals => ins::string_equals(state, process, instruction),

            StdoutWrite => ins::stdout_write(process, instruction),
            StderrWrite => ins::stderr_write(process, instruction),
            StdinRead => ins::stdin_read(state, process, instruction),
            FileOpen => ins::file_open(state, process, instruction),
            FileRead => ins::file_read(state, process, instruction),
            FileWrite => ins::file_write(process, instruction),
            FileFlush => ins::file_flush(process, instruction),
            FileSize => ins::file_size(process, instruction),
            FileSeek => ins::file_seek(process, instruction),

            SpawnProcess => {
                let dest = instruction.arg(0) as usize;

                (|| -> Result<(), Signal> {
                    let block = self.read_register(process, instruction.arg(1) as usize)?;
                    let pid = process_ins::spawn(state, block).map_err(Signal::Panic)?;

                    process.set_register(dest, pid);
                    Ok(())
                })()
            }

            SendMessage => {
                let dest = instruction.arg(0) as usize;

                (|| -> Result<(), Signal> {
                    let pid = self.read_register(process, instruction.arg(1) as usize)?;
                    let message = self.read_register(process, instruction.arg(2) as usize)?;

                    let sent = process_ins::send_message(state, process, pid, message)
                        .map_err(Signal::Panic)?;

                    process.set_register(dest, sent);
                    Ok(())
                })()
            }

            ReceiveMessage => {
                if let Some(message) = process.receive_message() {
                    process.set_register(instruction.arg(0) as usize, message);
                    Ok(())
                } else {
                    let timeout_ptr = self
                        .read_register(process, instruction.arg(1) as usize)
                        .unwrap_or_else(|_| ObjectPointer::null());

                    // Retry this same instruction once rescheduled.
                    process.set_instruction_index(process.instruction_index() - 1);

                    let timeout = process_ins::optional_timeout(timeout_ptr);
                    process_ins::wait_for_message(state, process, timeout);

                    return Some(Action::Yielded);
                }
            }

            ProcessTerminateCurrent => return Some(self.terminate_process(process)),

            GetCurrentPid => {
                process.set_register(
                    instruction.arg(0) as usize,
                    process_ins::current_pid(process),
                );
                Ok(())
            }

            SetParentLocal => {
                (|| -> Result<(), Signal> {
                    let value = self.read_register(process, instruction.arg(0) as usize)?;
                    let local = instruction.arg(1) as usize;
                    let depth = instruction.arg(2) as usize;

                    process_ins::set_parent_local(process, local, depth, value)
                        .map_err(Signal::Panic)
                })()
            }

            GetParentLocal => {
                let dest = instruction.arg(0) as usize;
                let local = instruction.arg(1) as usize;
                let depth = instruction.arg(2) as usize;

                process_ins::get_parent_local(process, local, depth)
                    .map(|value| process.set_register(dest, value))
                    .map_err(Signal::Panic)
            }

            Throw => {
                let value = match self.read_register(process, instruction.arg(0) as usize) {
                    Ok(value) => value,
                    Err(signal) => return Some(self.handle_signal(process, signal)),
                };

                return Some(self.unwind_throw(process, value));
            }

            SetupParentCatchTable => {
                let jump_to = instruction.arg(0);
                let register = instruction.arg(1);

                if let Some(parent) = process.context_mut().parent_mut() {
                    parent.push_parent_catch(jump_to, register);
                }

                Ok(())
            }

            Panic => {
                let message = self
                    .read_register(process, instruction.arg(0) as usize)
                    .ok()
                    .and_then(|pointer| pointer.string_value().ok().map(|value| value.to_string()))
                    .unwrap_or_else(|| "explicit panic".to_string());

                return Some(self.panic_process(process, &message));
            }

            AddDefer => {
                let dest = instruction.arg(0) as usize;

                (|| -> Result<(), Signal> {
                    let block = self.read_register(process, instruction.arg(1) as usize)?;
                    let stored = process_ins::add_defer(process, block).map_err(Signal::Panic)?;

                    process.set_register(dest, stored);
                    Ok(())
                })()
            }

            PinThread => {
                process.set_register(
                    instruction.arg(0) as usize,
                    process_ins::pin_thread(state, process, worker_id),
                );
                Ok(())
            }

            UnpinThread => {
                process.set_register(
                    instruction.arg(0) as usize,
                    process_ins::unpin_thread(state, process, worker_id),
                );
                Ok(())
            }

            LoadLibrary => {
                let dest = instruction.arg(0) as usize;

                (|| -> Result<(), Signal> {
                    let path = self
                        .read_register(process, instruction.arg(1) as usize)?
                        .string_value()
                        .map_err(Signal::Panic)?
                        .to_string();

                    let library =
                        ffi::load_library(state, process, &path).map_err(Signal::Panic)?;

                    process.set_register(dest, library);
                    Ok(())
                })()
            }

            ExternalCallNonBlocking | ExternalCallBlocking => {
                return Some(self.external_call(process, instruction));
            }

            IsError => ins::is_error(state, process, instruction),
            IntegerToFloat => ins::integer_to_float(state, process, instruction),
            FloatToInteger => ins::float_to_integer(state, process, instruction),
            IntegerToString => ins::integer_to_string(state, process, instruction),
            FloatToString => ins::float_to_string(state, process, instruction),
            StringToInteger => ins::string_to_integer(state, process, instruction),
            StringToFloat => ins::string_to_float(state, process, instruction),

            GeneratorAllocate => self.generator_allocate(process, instruction),
            GeneratorYield => return Some(self.generator_yield(process, instruction)),
            GeneratorResume => return Some(self.generator_resume(process, instruction)),

            ProcessSuspendCurrent => {
                let timeout_ptr = self
                    .read_register(process, instruction.arg(0) as usize)
                    .unwrap_or_else(|_| ObjectPointer::null());

                let timeout = process_ins::optional_timeout(timeout_ptr);
                process_ins::suspend(state, process, timeout);

                return Some(Action::Yielded);
            }

            Sleep => {
                let timeout_ptr = match self.read_register(process, instruction.arg(0) as usize) {
                    Ok(value) => value,
                    Err(signal) => return Some(self.handle_signal(process, signal)),
                };

                let timeout = process_ins::optional_timeout(timeout_ptr);
                process_ins::suspend(state, process, timeout);

                return Some(Action::Yielded);
            }

            TimeMonotonic => ins::time_monotonic(state, process, instruction),
        };

        match result {
            Ok(()) => {
                self.check_collections(process);
                None
            }
            Err(signal) => Some(self.handle_signal(process, signal)),
        }
    }

    /// `false`/`nil` are the only falsy values; everything else, including
    /// `0` and the empty string, is truthy.
    fn is_truthy(&self, value: ObjectPointer) -> bool {
        !(value.is_null() || value == self.state.false_object)
    }

    fn handle_signal(&self, process: &RcProcess, signal: Signal) -> Action {
        match signal {
            Signal::Throw(value) => self.unwind_throw(process, value),
            Signal::Panic(message) => self.panic_process(process, &message),
        }
    }

    /// Requests a GC collection for whichever generation has crossed its
    /// threshold, highest-priority first -- a mailbox overflow blocks
    /// incoming messages the longest, so it's checked first; a young
    /// collection is cheap and checked last since it fires constantly.
    fn check_collections(&self, process: &RcProcess) {
        use crate::gc::request::{Generation, Request};

        if process.should_collect_mailbox() {
            self.state
                .gc_thread
                .schedule(Request::new(Generation::Mailbox, process.clone()));
        } else if process.should_collect_mature_generation() {
            self.state
                .gc_thread
                .schedule(Request::new(Generation::Mature, process.clone()));
        } else if process.should_schedule_gc() {
            process.gc_scheduled();
            self.state
                .gc_thread
                .schedule(Request::new(Generation::Young, process.clone()));
        }
    }

    /// Runs `block` in a freshly-pushed context. A `NONE` receiver-override
    /// operand keeps the block's own receiver; anything else replaces it,
    /// which is how this single opcode covers both a plain block call and
    /// invoking a method with an explicit receiver.
    fn run_block(&self, process: &RcProcess, instruction: &Instruction) -> Action {
        let block_reg = instruction.arg(0);
        let return_reg = instruction.arg(1);
        let receiver_override = instruction.arg(2);
        let arg_count = instruction.arg(3) as usize;

        let block_ptr = match self.read_register(process, block_reg as usize) {
            Ok(value) => value,
            Err(signal) => return self.handle_signal(process, signal),
        };

        let block = match block_ptr.block_value() {
            Ok(block) => block,
            Err(message) => return self.panic_process(process, &message),
        };

        let receiver = if receiver_override == ins::NONE {
            block.receiver
        } else {
            match self.read_register(process, receiver_override as usize) {
                Ok(value) => value,
                Err(signal) => return self.handle_signal(process, signal),
            }
        };

        let return_register = if return_reg == ins::NONE {
            None
        } else {
            Some(return_reg as usize)
        };

        let mut context = if let Some(captured) = &block.captured_binding {
            ExecutionContext::with_binding(
                captured.clone(),
                block.code.clone(),
                return_register,
                process.context().globals.clone(),
            )
        } else {
            let mut context = ExecutionContext::with_object(
                receiver,
                block.code.clone(),
                return_register,
                process.context().globals.clone(),
            );
            context.binding.set_local(0, receiver);
            context
        };

        for i in 0..arg_count {
            let arg_reg = instruction.arg(4 + i) as usize;

            match self.read_register(process, arg_reg) {
                Ok(value) => context.set_local(i, value),
                Err(signal) => return self.handle_signal(process, signal),
            }
        }

        process.push_context(context);
        Action::Continue
    }

    /// `Return`, or falling off the end of a context's instructions.
    /// Captures what the parent needs (the return value's destination
    /// register, whether this was a generator body) before popping, then
    /// drains and runs this frame's own deferred blocks.
    fn leave_context(&self, process: &RcProcess) -> Action {
        let return_value = process
            .context()
            .get_register(0)
            .unwrap_or_else(ObjectPointer::null);

        let return_register = process.context().return_register;
        let generator = process.context().generator;
        let defers = process.context_mut().take_deferred_blocks();

        if let Some(action) = self.run_defers(process, defers) {
            return action;
        }

        if process.pop_context() {
            if let Some(generator_ptr) = generator {
                if let object_value::ObjectValue::Generator(generator) =
                    &mut generator_ptr.get_mut().value
                {
                    generator.finish();
                }
            }

            return self.terminate_process(process);
        }

        if let Some(generator_ptr) = generator {
            if let object_value::ObjectValue::Generator(generator) =
                &mut generator_ptr.get_mut().value
            {
                generator.finish();
            }
        }

        if let Some(register) = return_register {
            process.set_register(register, return_value);
        }

        Action::Continue
    }

    /// Runs each deferred block to completion, in the frame they were
    /// registered in's parent (they already popped out of that frame), bounded
    /// by the process' own context depth so a deferred block that itself
    /// pushes contexts can't recurse forever.
    fn run_defers(&self, process: &RcProcess, defers: Vec<ObjectPointer>) -> Option<Action> {
        for defer in defers {
            let block = match defer.block_value() {
                Ok(block) => block,
                Err(message) => return Some(self.panic_process(process, &message)),
            };

            let context = ExecutionContext::with_object(
                block.receiver,
                block.code.clone(),
                None,
                process.context().globals.clone(),
            );

            process.push_context(context);

            let depth_before_defer = process.contexts().len();

            loop {
                match self.execute(process, 0) {
                    Action::Continue => {
                        if process.contexts().len() < depth_before_defer {
                            break;
                        }
                    }
                    Action::Reschedule => {}
                    other => return Some(other),
                }

                if process.contexts().len() < depth_before_defer {
                    break;
                }
            }
        }

        None
    }

    /// Unwinds a throw: checks the current context's dynamic catches
    /// (innermost-first, installed by a child's `SetupParentCatchTable`)
    /// before its own static catch table. Neither check pops or drains
    /// defers, since control resumes in the very same frame; only when
    /// nothing in the current frame catches it does the frame actually pop
    /// (running its defers) and the search continue in the parent.
    fn unwind_throw(&self, process: &RcProcess, value: ObjectPointer) -> Action {
        loop {
            let instruction_index = process.instruction_index() as u32;

            // Dynamic catches cover "the child block this context is about
            // to run", so the innermost entry present applies regardless of
            // where inside the child's own code the throw originated --
            // unlike a static catch table entry, there's no instruction
            // range to test it against here.
            let dynamic_catch = process.context().dynamic_catches.last().copied();
            if let Some((jump_to, register)) = dynamic_catch {
                process.context_mut().dynamic_catches.pop();
                process.set_instruction_index(jump_to as usize);
                process.set_register(register as usize, value);
                return Action::Continue;
            }

            let code = process.compiled_code();

            if let Some(entry) = catch_table::entry_for(&code.catch_table, instruction_index) {
                process.set_instruction_index(entry.jump_to as usize);
                process.set_register(entry.register as usize, value);
                return Action::Continue;
            }

            let defers = process.context_mut().take_deferred_blocks();

            if let Some(action) = self.run_defers(process, defers) {
                return action;
            }

            if process.pop_context() {
                let message = value
                    .string_value()
                    .map(|text| text.to_string())
                    .unwrap_or_else(|_| "unhandled throw".to_string());

                return self.panic_process(process, &message);
            }
        }
    }

    /// `GeneratorAllocate`: wraps `block` as a not-yet-started generator
    /// value. The generator's context isn't built until the first
    /// `GeneratorResume`, since that's when the receiver/arguments it should
    /// run with are actually known.
    fn generator_allocate(
        &self,
        process: &RcProcess,
        instruction: &Instruction,
    ) -> Result<(), Signal> {
        let dest = instruction.arg(0) as usize;
        let block_ptr = self.read_register(process, instruction.arg(1) as usize)?;

        block_ptr.block_value().map_err(Signal::Panic)?;

        let value = process.allocate(
            object_value::generator(crate::generator::Generator::new()),
            self.state.generator_prototype,
        );

        value.get_mut().add_attribute(
            self.state.intern("@block"),
            block_ptr,
        );

        process.set_register(dest, value);
        Ok(())
    }

    /// `GeneratorResume`: starts the generator's body on its first resume,
    /// or picks its parked context back up on every resume after that.
    fn generator_resume(&self, process: &RcProcess, instruction: &Instruction) -> Action {
        let dest = instruction.arg(0) as usize;
        let generator_reg = instruction.arg(1);
        let resume_value_reg = instruction.arg(2);

        let generator_ptr = match self.read_register(process, generator_reg as usize) {
            Ok(value) => value,
            Err(signal) => return self.handle_signal(process, signal),
        };

        let resume_value = if resume_value_reg == ins::NONE {
            ObjectPointer::null()
        } else {
            match self.read_register(process, resume_value_reg as usize) {
                Ok(value) => value,
                Err(signal) => return self.handle_signal(process, signal),
            }
        };

        let finished = matches!(
            &generator_ptr.get().value,
            object_value::ObjectValue::Generator(generator) if generator.is_finished()
        );

        if finished {
            process.set_register(dest, ObjectPointer::null());
            return Action::Continue;
        }

        let parked = match &mut generator_ptr.get_mut().value {
            object_value::ObjectValue::Generator(generator) => generator.take_context(),
            _ => return self.panic_process(process, "GeneratorResume expects a Generator"),
        };

        let context = if let Some(mut context) = parked {
            context.set_register(0, resume_value);
            context.return_register = Some(dest);
            *context
        } else {
            let marker = self.state.intern("@block");

            let block_ptr = match generator_ptr.get_attribute(&marker) {
                Some(block_ptr) => block_ptr,
                None => {
                    return self.panic_process(process, "generator has no underlying block")
                }
            };

            let block = match block_ptr.block_value() {
                Ok(block) => block,
                Err(message) => return self.panic_process(process, &message),
            };

            let mut context = if let Some(captured) = &block.captured_binding {
                ExecutionContext::with_binding(
                    captured.clone(),
                    block.code.clone(),
                    Some(dest),
                    process.context().globals.clone(),
                )
            } else {
                ExecutionContext::with_object(
                    block.receiver,
                    block.code.clone(),
                    Some(dest),
                    process.context().globals.clone(),
                )
            };

            context.set_generator(generator_ptr);
            context
        };

        process.push_context(context);
        Action::Continue
    }

    /// `GeneratorYield`: parks the current context back onto its generator
    /// without running its deferred blocks -- a yield is a pause, not a
    /// return, so anything deferred stays registered for when the body
    /// eventually does return or throw.
    fn generator_yield(&self, process: &RcProcess, instruction: &Instruction) -> Action {
        let yielded_value_reg = instruction.arg(0);

        let yielded_value = if yielded_value_reg == ins::NONE {
            ObjectPointer::null()
        } else {
            match self.read_register(process, yielded_value_reg as usize) {
                Ok(value) => value,
                Err(signal) => return self.handle_signal(process, signal),
            }
        };

        let generator_ptr = match process.context().generator {
            Some(generator) => generator,
            None => {
                return self
                    .panic_process(process, "GeneratorYield used outside a generator body")
            }
        };

        let return_register = process.context().return_register;
        let mut context = process.take_context();

        context.set_register(0, yielded_value);

        match &mut generator_ptr.get_mut().value {
            object_value::ObjectValue::Generator(generator) => generator.park(context),
            _ => return self.panic_process(process, "GeneratorYield expects a Generator"),
        }

        if let Some(register) = return_register {
            process.set_register(register, yielded_value);
        }

        Action::Continue
    }

    /// `ExternalCallNonBlocking`/`ExternalCallBlocking`: resolves `symbol`
    /// in the library at the receiver register and calls it. The blocking
    /// variant brackets the call with `set_blocking`, migrating the process
    /// to the blocking pool for the duration -- a simplification, since a
    /// true OS-thread hand-off for the syscall itself isn't implemented,
    /// but it does keep a slow FFI call from starving the primary pool's
    /// workers the way a real blocking syscall would.
    fn external_call(&self, process: &RcProcess, instruction: &Instruction) -> Action {
        let dest = instruction.arg(0) as usize;
        let library_reg = instruction.arg(1);
        let symbol_reg = instruction.arg(2);
        let arg_count = instruction.arg(3) as usize;

        let blocking = instruction.instruction_type == InstructionType::ExternalCallBlocking;

        let outcome = (|| -> Result<ObjectPointer, Signal> {
            let library = self.read_register(process, library_reg as usize)?;
            let symbol = self
                .read_register(process, symbol_reg as usize)?
                .string_value()
                .map_err(Signal::Panic)?
                .to_string();

            let mut arguments = Vec::with_capacity(arg_count);

            for i in 0..arg_count {
                arguments.push(self.read_register(process, instruction.arg(4 + i) as usize)?);
            }

            if blocking {
                process.set_blocking(true);
            }

            let result = ffi::call(library, &symbol, &arguments).map_err(Signal::Panic);

            if blocking {
                process.set_blocking(false);
            }

            result.map(ObjectPointer::integer)
        })();

        match outcome {
            Ok(value) => {
                process.set_register(dest, value);
                Action::Continue
            }
            Err(signal) => self.handle_signal(process, signal),
        }
    }

    /// `ProcessTerminateCurrent`, or the main process' top-level context
    /// returning. A non-main process simply stops; the main process
    /// finishing takes the whole VM down (4.H: the program's lifetime is the
    /// main process' lifetime).
    fn terminate_process(&self, process: &RcProcess) -> Action {
        process.finished();
        self.state.process_table.write().remove(process.pid);

        if process.is_main() {
            self.state.process_pools.shutdown();
            self.state.gc_thread.stop();
            self.state.reactor.stop();
        }

        Action::Finished
    }

    /// An unrecovered panic or unhandled throw. Per 4.H this terminates the
    /// whole VM cooperatively: every pool and the GC thread are told to
    /// stop, but nothing is force-killed, so in-flight work finishes
    /// draining on its own.
    fn panic_process(&self, process: &RcProcess, message: &str) -> Action {
        error!("{}", stacktrace::format(process, message));

        process.set_status_without_overwriting_gc_status(crate::process::ProcessStatus::Failed);
        self.state.process_table.write().remove(process.pid);

        self.state.set_panicked();
        self.state.process_pools.shutdown();
        self.state.gc_thread.stop();
        self.state.reactor.stop();

        Action::Stopped
    }
}

trait IntoResultExt {
    fn into_result(self) -> Result<(), Signal>;
}

impl IntoResultExt for Signal {
    fn into_result(self) -> Result<(), Signal> {
        Err(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catch_table::CatchEntry;
    use crate::compiled_code::{CompiledCode, RcCompiledCode};
    use crate::config::Config;
    use crate::instruction::InstructionType;
    use crate::process::Process;
    use crate::vm::state::{ExitStatus, State};

    fn state() -> RcState {
        State::new(Config::new())
    }

    fn process(state: &RcState, code: RcCompiledCode) -> RcProcess {
        Process::from_code(
            0,
            code,
            ObjectPointer::null(),
            state.globals.clone(),
            state.global_allocator.clone(),
            &state.config,
        )
    }

    fn instr(kind: InstructionType, args: Vec<u32>) -> Instruction {
        Instruction::new(kind, args, 1, 1)
    }

    #[allow(clippy::too_many_arguments)]
    fn code(
        instructions: Vec<Instruction>,
        integers: Vec<i64>,
        code_objects: Vec<RcCompiledCode>,
        catch_table: catch_table::CatchTable,
    ) -> RcCompiledCode {
        Arc::new(CompiledCode::new(
            "main".to_string(),
            "main.aeon".to_string(),
            1,
            0,
            0,
            false,
            Vec::new(),
            instructions,
            integers,
            Vec::new(),
            Vec::new(),
            code_objects,
            catch_table,
            false,
        ))
    }

    #[test]
    fn test_integer_arithmetic_falls_off_the_end() {
        let state = state();
        let root = code(
            vec![
                instr(InstructionType::SetInteger, vec![0, 0]),
                instr(InstructionType::SetInteger, vec![1, 1]),
                instr(InstructionType::IntegerAdd, vec![2, 0, 1]),
            ],
            vec![40, 2],
            Vec::new(),
            Vec::new(),
        );

        let process = process(&state, root);
        let machine = Machine::new(state);

        machine.run(&process, 0);

        assert_eq!(process.get_register(2), Some(ObjectPointer::integer(42)));
    }

    #[test]
    fn test_goto_if_false_skips_the_branch() {
        let state = state();
        let root = code(
            vec![
                instr(InstructionType::SetFalse, vec![0]),
                instr(InstructionType::GotoIfFalse, vec![0, 3]),
                instr(InstructionType::SetInteger, vec![1, 0]),
                instr(InstructionType::SetInteger, vec![1, 1]),
            ],
            vec![999, 7],
            Vec::new(),
            Vec::new(),
        );

        let process = process(&state, root);
        let machine = Machine::new(state);

        machine.run(&process, 0);

        assert_eq!(process.get_register(1), Some(ObjectPointer::integer(7)));
    }

    #[test]
    fn test_run_block_returns_to_the_caller_register() {
        let state = state();

        let block = code(
            vec![
                instr(InstructionType::SetInteger, vec![0, 0]),
                instr(InstructionType::Return, vec![]),
            ],
            vec![55],
            Vec::new(),
            Vec::new(),
        );

        let root = code(
            vec![
                instr(InstructionType::SetBlock, vec![0, 0, ins::NONE, 0]),
                instr(InstructionType::RunBlock, vec![0, 1, ins::NONE, 0]),
            ],
            Vec::new(),
            vec![block],
            Vec::new(),
        );

        let process = process(&state, root);
        let machine = Machine::new(state);

        machine.run(&process, 0);

        assert_eq!(process.get_register(1), Some(ObjectPointer::integer(55)));
    }

    #[test]
    fn test_throw_unwinds_to_the_static_catch_table_entry() {
        let state = state();
        let root = code(
            vec![
                instr(InstructionType::SetInteger, vec![0, 0]),
                instr(InstructionType::Throw, vec![0]),
                instr(InstructionType::SetInteger, vec![2, 1]),
            ],
            vec![99, 77],
            Vec::new(),
            vec![CatchEntry::new(0, 3, 3, 1)],
        );

        let process = process(&state, root);
        let machine = Machine::new(state);

        machine.run(&process, 0);

        // The handler landed at the jump target and bound the thrown value.
        assert_eq!(process.get_register(1), Some(ObjectPointer::integer(99)));
        // The instruction between the throw and the jump target never ran.
        assert_eq!(process.get_register(2), None);
    }

    #[test]
    fn test_unhandled_throw_panics_the_vm_and_removes_the_process_from_the_table() {
        let state = state();
        let root = code(
            vec![
                instr(InstructionType::SetInteger, vec![0, 0]),
                instr(InstructionType::Throw, vec![0]),
            ],
            vec![5],
            Vec::new(),
            Vec::new(),
        );

        let pid = state.process_table.write().reserve().unwrap();
        let process = Process::from_code(
            pid,
            root,
            ObjectPointer::null(),
            state.globals.clone(),
            state.global_allocator.clone(),
            &state.config,
        );

        state.process_table.write().map(pid, process.clone());

        let machine = Machine::new(state.clone());

        machine.run(&process, 0);

        assert_eq!(state.exit_status(), ExitStatus::Panic);
        assert!(state.process_table.read().get(pid).is_none());
    }
}
