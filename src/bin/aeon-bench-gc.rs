//! A standalone microbenchmark for root collection and young-generation
//! collection, kept around from the project's own development history.
//! Not part of the VM proper -- it builds a process by hand instead of
//! loading a bytecode image, and reports timings to stdout.

use std::time::Instant;

use libaeon::compiled_code::CompiledCode;
use libaeon::config::Config;
use libaeon::execution_context::ExecutionContext;
use libaeon::gc::collector;
use libaeon::global_scope::GlobalScope;
use libaeon::immix::global_allocator::GlobalAllocator;
use libaeon::immix::permanent_allocator::PermanentAllocator;
use libaeon::object_value;
use libaeon::process::{Process, RcProcess};

const CONTEXTS: usize = 500;
const OBJECTS_PER_CONTEXT: usize = 5000;

fn measure_roots(process: &RcProcess) {
    let mut timings = Vec::with_capacity(50);

    for _ in 0..50 {
        let start = Instant::now();

        process.roots();

        timings.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    println!(
        "Root collection average: {:.2} ms",
        timings.iter().sum::<f64>() / timings.len() as f64
    );
}

fn measure_young_collections(process: &RcProcess) {
    let mut timings = Vec::with_capacity(4);

    for _ in 0..4 {
        let start = Instant::now();

        collector::collect_young(process);

        timings.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    println!(
        "Young collection average: {:.2} ms",
        timings.iter().sum::<f64>() / timings.len() as f64
    );
}

fn main() {
    let config = Config::new();
    let global_allocator = GlobalAllocator::new();
    let mut perm_alloc = PermanentAllocator::new(global_allocator.clone());
    let self_obj = perm_alloc.allocate_empty();
    let globals = GlobalScope::new();

    let code = CompiledCode::with_rc(
        "bench".to_string(),
        "bench.aeonc".to_string(),
        1,
        Vec::new(),
    );

    let process = Process::from_code(
        0,
        code.clone(),
        self_obj,
        globals.clone(),
        global_allocator,
        &config,
    );

    for _ in 0..CONTEXTS {
        for index in 0..OBJECTS_PER_CONTEXT {
            let string_ptr =
                process.allocate_without_prototype(object_value::string("Hello".to_string()));
            let other_ptr =
                process.allocate_without_prototype(object_value::string("World".to_string()));

            process.set_local(index, string_ptr);
            process.set_register(index, other_ptr);
        }

        let context = ExecutionContext::with_object(self_obj, code.clone(), None, globals.clone());

        process.push_context(context);
    }

    measure_roots(&process);
    measure_young_collections(&process);
}
