//! Building human-readable stack traces from a process' execution context
//! chain, used by the `StackTrace` helpers exposed to bytecode (4.H panics)
//! and by the VM's own panic/unhandled-throw reporting on exit.

use crate::process::RcProcess;

#[derive(Debug, Clone)]
pub struct StackFrame {
    pub name: String,
    pub file: String,
    pub line: u32,
}

impl std::fmt::Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{} in {}", self.file, self.line, self.name)
    }
}

/// Walks `process`'s context chain from the currently executing frame
/// outward, skipping `skip` of the innermost frames and stopping after
/// `limit` frames have been collected (a limit of `0` means unbounded).
pub fn trace(process: &RcProcess, skip: usize, limit: usize) -> Vec<StackFrame> {
    let mut frames = Vec::new();

    for (index, context) in process.context().contexts().enumerate() {
        if index < skip {
            continue;
        }

        let code = context.code.clone();

        frames.push(StackFrame {
            name: code.name.clone(),
            file: code.file.clone(),
            line: code.line,
        });

        if limit > 0 && frames.len() >= limit {
            break;
        }
    }

    frames
}

/// Formats a full trace the way it is printed to stderr when a process
/// panics without a registered panic handler (4.H).
pub fn format(process: &RcProcess, message: &str) -> String {
    let mut output = format!("A process panicked: {}\n", message);

    for frame in trace(process, 0, 0) {
        output.push_str("  ");
        output.push_str(&frame.to_string());
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled_code::CompiledCode;
    use crate::config::Config;
    use crate::global_scope::GlobalScope;
    use crate::immix::global_allocator::GlobalAllocator;
    use crate::object_pointer::ObjectPointer;
    use crate::process::Process;

    fn process() -> RcProcess {
        let code = CompiledCode::with_rc(
            "main".to_string(),
            "main.aeon".to_string(),
            3,
            Vec::new(),
        );

        Process::from_code(
            0,
            code,
            ObjectPointer::integer(1),
            GlobalScope::new(),
            GlobalAllocator::new(),
            &Config::new(),
        )
    }

    #[test]
    fn test_trace_includes_top_frame() {
        let process = process();
        let frames = trace(&process, 0, 0);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, "main");
        assert_eq!(frames[0].line, 3);
    }

    #[test]
    fn test_trace_respects_limit() {
        let process = process();
        let frames = trace(&process, 0, 0);

        assert!(frames.len() <= 1);

        let limited = trace(&process, 0, 1);

        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_format_includes_message() {
        let process = process();
        let message = format(&process, "boom");

        assert!(message.contains("boom"));
        assert!(message.contains("main.aeon"));
    }
}
