#![macro_use]

/// Returns a string with enough spare capacity to read `size` bytes into,
/// or an empty string if no size hint was given (read to EOF).
macro_rules! file_reading_buffer {
    ($size: expr) => {
        match $size {
            Some(size) => String::with_capacity(size),
            None => String::new(),
        }
    };
}
