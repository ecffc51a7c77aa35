//! Process-management instruction handlers (4.C Mailbox, 4.D Scheduler,
//! 4.G Process Table & Identifiers).
//!
//! Grounded on Inko's own `vm::process` helper module, adapted to this
//! port's single shared `RcGlobalScope`, lock-free `process_table` access
//! via `parking_lot`, and `Pools::schedule`'s blocking-flag routing (no
//! explicit pool id is passed around any more -- a spawned process always
//! starts on the primary pool and migrates to the blocking pool itself via
//! `ExternalCallBlocking`, see `vm::ffi`).

use crate::block::Block;
use crate::object_pointer::ObjectPointer;
use crate::process::{Process, ProcessStatus, RcProcess};
use crate::stacktrace;
use crate::vm::state::RcState;

/// Allocates a PID and a `Process` for `block`, registering it in the
/// process table without yet scheduling it for execution.
pub fn allocate(state: &RcState, block: &Block) -> Result<RcProcess, String> {
    let mut process_table = state.process_table.write();

    let pid = process_table
        .reserve()
        .ok_or_else(|| "no PID could be reserved".to_string())?;

    let process = Process::from_block(
        pid,
        block,
        state.globals.clone(),
        state.global_allocator.clone(),
        &state.config,
    );

    process_table.map(pid, process.clone());

    Ok(process)
}

/// `SpawnProcess`: allocates and schedules a new process running `block`,
/// returning its PID as an integer.
pub fn spawn(state: &RcState, block_ptr: ObjectPointer) -> Result<ObjectPointer, String> {
    let block = block_ptr.block_value()?;
    let new_process = allocate(state, block)?;
    let pid = ObjectPointer::integer(new_process.pid as i64);

    state.process_pools.schedule(new_process);

    Ok(pid)
}

/// `SendMessage`: delivers `message` to the process identified by `pid_ptr`,
/// if it still exists, waking it if it was parked waiting for exactly this.
pub fn send_message(
    state: &RcState,
    sender: &RcProcess,
    pid_ptr: ObjectPointer,
    message: ObjectPointer,
) -> Result<ObjectPointer, String> {
    let pid = pid_ptr.usize_value()?;

    if let Some(receiver) = state.process_table.read().get(pid) {
        receiver.send_message(sender, message);

        if receiver.is_waiting_for_message() {
            state.suspension_list.wake_up();
        }
    }

    Ok(message)
}

/// `ReceiveMessage`: parks `process` until a message arrives, or until
/// `timeout_ms` elapses if given.
pub fn wait_for_message(state: &RcState, process: &RcProcess, timeout_ms: Option<u64>) {
    process.waiting_for_message();
    state.suspension_list.suspend(process.clone(), timeout_ms);
}

pub fn current_pid(process: &RcProcess) -> ObjectPointer {
    ObjectPointer::integer(process.pid as i64)
}

/// Reads the status of the process identified by `pid_ptr`. A PID that no
/// longer maps to a live process reports `Finished`, matching what a
/// process that already ran to completion and was reaped would report.
pub fn status(state: &RcState, pid_ptr: ObjectPointer) -> Result<ObjectPointer, String> {
    let pid = pid_ptr.usize_value()?;
    let table = state.process_table.read();

    let status = table
        .get(pid)
        .map(|process| process.status_integer())
        .unwrap_or_else(|| ProcessStatus::Finished.as_integer());

    Ok(ObjectPointer::integer(i64::from(status)))
}

/// `ProcessSuspendCurrent`: suspends `process` until rescheduled, optionally
/// with a timeout.
pub fn suspend(state: &RcState, process: &RcProcess, timeout_ms: Option<u64>) {
    process.suspend();
    state.suspension_list.suspend(process.clone(), timeout_ms);
}

pub fn set_parent_local(
    process: &RcProcess,
    local: usize,
    depth: usize,
    value: ObjectPointer,
) -> Result<(), String> {
    let binding = process
        .context()
        .binding
        .find_parent(depth)
        .ok_or_else(|| format!("no binding exists at depth {}", depth))?;

    binding.set_local(local, value);

    Ok(())
}

pub fn get_parent_local(
    process: &RcProcess,
    local: usize,
    depth: usize,
) -> Result<ObjectPointer, String> {
    let binding = process
        .context()
        .binding
        .find_parent(depth)
        .ok_or_else(|| format!("no binding exists at depth {}", depth))?;

    binding.get_local(local)
}

/// `SetGlobal`: a global read by any process must never be collected out
/// from under it, so a value that isn't already permanent is promoted
/// before being stored (3. Invariant 2).
pub fn set_global(
    state: &RcState,
    process: &RcProcess,
    index: usize,
    value: ObjectPointer,
) -> ObjectPointer {
    let stored = state.promote_to_permanent(value);

    process.context().globals.set(index, stored);

    stored
}

pub fn get_global(process: &RcProcess, index: usize) -> ObjectPointer {
    process.context().globals.get(index).unwrap_or_else(ObjectPointer::null)
}

/// `AddDefer`: registers `block` to run, latest-first, when the current
/// context returns normally or a throw is caught past it.
pub fn add_defer(process: &RcProcess, block: ObjectPointer) -> Result<ObjectPointer, String> {
    if block.block_value().is_err() {
        return Err("only blocks can be deferred".to_string());
    }

    process.context_mut().add_defer(block);

    Ok(block)
}

/// `PinThread`: pins `process` to the worker currently running it, so
/// nothing else schedules it onto a different OS thread until unpinned.
/// Used before an FFI call that relies on thread-local state (4.D pinning).
pub fn pin_thread(state: &RcState, process: &RcProcess, worker_id: u8) -> ObjectPointer {
    if process.pin_to_thread(worker_id) {
        state.true_object
    } else {
        state.false_object
    }
}

pub fn unpin_thread(state: &RcState, process: &RcProcess, worker_id: u8) -> ObjectPointer {
    process.unpin_from_thread(worker_id);

    state.false_object
}

/// `GetCurrentPid`'s `Throw`-adjacent sibling: builds the stack trace object
/// exposed to bytecode via the `StackTrace` helpers, bounded by an optional
/// `limit` and a `skip` count of innermost frames to omit.
pub fn stacktrace(
    state: &RcState,
    process: &RcProcess,
    limit_ptr: ObjectPointer,
    skip_ptr: ObjectPointer,
) -> Result<Vec<ObjectPointer>, String> {
    let limit = if limit_ptr.is_null() {
        0
    } else {
        limit_ptr.usize_value()?
    };

    let skip = skip_ptr.usize_value()?;

    let frames = stacktrace::trace(process, skip, limit)
        .into_iter()
        .map(|frame| {
            process.allocate(
                crate::object_value::string(frame.to_string()),
                state.string_prototype,
            )
        })
        .collect();

    Ok(frames)
}

/// Converts a register holding either an integer millisecond count or `nil`
/// into the `Option<u64>` the suspension list expects. A non-positive
/// timeout is treated the same as no timeout at all.
pub fn optional_timeout(pointer: ObjectPointer) -> Option<u64> {
    if pointer.is_null() {
        return None;
    }

    match pointer.integer_value() {
        Ok(time) if time > 0 => Some(time as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled_code::CompiledCode;
    use crate::config::Config;

    fn state() -> RcState {
        crate::vm::state::State::new(Config::new())
    }

    fn main_process(state: &RcState) -> RcProcess {
        let code = CompiledCode::with_rc("main".to_string(), "main.aeon".to_string(), 1, Vec::new());

        Process::from_code(
            0,
            code,
            ObjectPointer::null(),
            state.globals.clone(),
            state.global_allocator.clone(),
            &state.config,
        )
    }

    #[test]
    fn test_status_reports_finished_for_unknown_pid() {
        let state = state();
        let status_ptr = status(&state, ObjectPointer::integer(999)).unwrap();

        assert_eq!(
            status_ptr.integer_value().unwrap(),
            i64::from(ProcessStatus::Finished.as_integer())
        );
    }

    #[test]
    fn test_set_and_get_global_roundtrip() {
        let state = state();
        let process = main_process(&state);

        set_global(&state, &process, 0, ObjectPointer::integer(42));

        assert_eq!(get_global(&process, 0), ObjectPointer::integer(42));
    }

    #[test]
    fn test_add_defer_rejects_non_blocks() {
        let state = state();
        let process = main_process(&state);

        assert!(add_defer(&process, ObjectPointer::integer(1)).is_err());
    }

    #[test]
    fn test_optional_timeout() {
        assert_eq!(optional_timeout(ObjectPointer::integer(10)), Some(10));
        assert_eq!(optional_timeout(ObjectPointer::integer(0)), None);
        assert_eq!(optional_timeout(ObjectPointer::null()), None);
    }
}
