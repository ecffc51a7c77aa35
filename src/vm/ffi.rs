//! Foreign-function calls (4.E Interpreter & VM, `LoadLibrary` /
//! `ExternalCallNonBlocking` / `ExternalCallBlocking`).
//!
//! The teacher snapshot never grew an FFI layer, so this is built from the
//! spec's description using the two crates the rest of the pack reaches for
//! dynamic linking with: `libloading` to open the library and resolve a
//! symbol, `libffi::middle` to build a calling-convention-correct `Cif` and
//! invoke it. Arguments and return values are restricted to integers: a
//! deliberate simplification (Open Question, see DESIGN.md) since the
//! bytecode format carries no type information a `Cif` could be built from
//! ahead of time.

use std::ffi::c_void;

use libffi::middle::{Arg, Cif, CodePtr, Type};
use libloading::Library;

use crate::object_pointer::ObjectPointer;
use crate::object_value;
use crate::object_value::ObjectValue;
use crate::process::RcProcess;
use crate::vm::state::RcState;

/// `LoadLibrary`: opens the shared library at `path`, keeping it alive on
/// the heap for as long as anything holds a pointer to it.
pub fn load_library(state: &RcState, process: &RcProcess, path: &str) -> Result<ObjectPointer, String> {
    let library =
        unsafe { Library::new(path) }.map_err(|error| format!("failed to load library \"{}\": {}", path, error))?;

    Ok(process.allocate(object_value::library(library), state.library_prototype))
}

/// Resolves `symbol` in the library at `library_ptr` and calls it with
/// `arguments`, all of which (and the return value) are treated as `i64`.
pub fn call(
    library_ptr: ObjectPointer,
    symbol: &str,
    arguments: &[ObjectPointer],
) -> Result<i64, String> {
    let values = arguments
        .iter()
        .map(|pointer| pointer.integer_value())
        .collect::<Result<Vec<i64>, String>>()?;

    let code_ptr = match &library_ptr.get().value {
        ObjectValue::Library(library) => unsafe {
            let symbol_ptr = library
                .get::<unsafe extern "C" fn()>(symbol.as_bytes())
                .map_err(|error| format!("unknown symbol \"{}\": {}", symbol, error))?;

            CodePtr::from_ptr(*symbol_ptr as *const c_void)
        },
        _ => return Err("ExternalCall expects a loaded library".to_string()),
    };

    let arg_types = vec![Type::i64(); values.len()];
    let cif = Cif::new(arg_types, Type::i64());
    let args: Vec<Arg> = values.iter().map(Arg::new).collect();

    let result: i64 = unsafe { cif.call(code_ptr, &args) };

    Ok(result)
}
