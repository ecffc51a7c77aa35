//! The `aeonvm` executable: loads a bytecode image, boots every background
//! service (scheduler pools, GC thread, reactor), runs the image's root
//! code object as the main process, and blocks until the VM has fully
//! drained before translating the final `vm::state::ExitStatus` into a
//! process exit code (6. External Interfaces, 4.H Panic & Shutdown).

use std::process::exit;

use getopts::Options;
use log::error;

use libaeon::bytecode_parser;
use libaeon::config::Config;
use libaeon::error::RuntimeError;
use libaeon::object_value;
use libaeon::process::Process;
use libaeon::vm::machine::Machine;
use libaeon::vm::state::State;

const USAGE: &str = "Usage: aeonvm [OPTIONS] FILE [ARGUMENTS]";

/// Parses argv, stopping at the first non-option argument: everything
/// before the bytecode image path is an `aeonvm` flag, everything from the
/// image path onward (including the path itself) is left untouched so it
/// can be forwarded to the running program unmodified.
fn parse_args() -> Result<(String, Vec<String>), RuntimeError> {
    let args: Vec<String> = std::env::args().collect();

    let mut opts = Options::new();

    opts.parsing_style(getopts::ParsingStyle::StopAtFirstFree);
    opts.optflag("h", "help", "Shows this help message");
    opts.optflag("v", "version", "Shows the current version");

    let matches = opts
        .parse(&args[1..])
        .map_err(|error| RuntimeError::InvalidConfig(error.to_string()))?;

    if matches.opt_present("h") {
        print!("{}", opts.usage(USAGE));
        exit(0);
    }

    if matches.opt_present("v") {
        println!("aeonvm {}", env!("CARGO_PKG_VERSION"));
        exit(0);
    }

    let mut free = matches.free.into_iter();

    let path = free
        .next()
        .ok_or_else(|| RuntimeError::InvalidConfig("no bytecode image given".to_string()))?;

    Ok((path, free.collect()))
}

fn run(path: &str, arguments: Vec<String>) -> Result<i32, RuntimeError> {
    let code = bytecode_parser::parse_file(path)?;
    let config = Config::from_env();
    let state = State::new(config);

    let argv_elements = arguments
        .into_iter()
        .map(|argument| {
            state
                .permanent_allocator
                .lock()
                .allocate_with_prototype(object_value::string(argument), state.string_prototype)
        })
        .collect();

    let pid = {
        let mut process_table = state.process_table.write();

        process_table
            .reserve()
            .ok_or_else(|| RuntimeError::InvalidConfig("no PID could be reserved".to_string()))?
    };

    let main_process = Process::from_code(
        pid,
        code,
        state.top_level,
        state.globals.clone(),
        state.global_allocator.clone(),
        &state.config,
    );

    main_process.set_main();

    // The bytecode image's root code object reads its forwarded command
    // line arguments from local 0, the one calling convention this port
    // defines for the environment interface (6. External Interfaces: "the
    // Inko program via the environment interface"); there is no dedicated
    // opcode for it since the image format carries no module table entry
    // to bind it through.
    let argv = main_process.allocate(object_value::array(argv_elements), state.array_prototype);
    main_process.set_local(0, argv);

    state.process_table.write().map(pid, main_process.clone());

    let machine = Machine::new(state.clone());

    state.process_pools.start(machine.clone());
    state.gc_thread.clone().start();
    state.reactor.clone().start(state.clone());

    state.process_pools.schedule(main_process);

    state.process_pools.join();

    Ok(state.exit_status().code())
}

fn main() {
    env_logger::init();

    let (path, arguments) = match parse_args() {
        Ok(parsed) => parsed,
        Err(error) => {
            eprintln!("{}", error);
            eprintln!("{}", USAGE);
            exit(1);
        }
    };

    match run(&path, arguments) {
        Ok(code) => exit(code),
        Err(error) => {
            error!("{}", error);
            exit(1);
        }
    }
}
