#![macro_use]

//! Small helper macros shared across the VM.
//!
//! `unlock!` centralises the `.lock().unwrap()` dance so call sites read like
//! ordinary field access instead of repeating poison-handling boilerplate.

macro_rules! unlock {
    ($value: expr) => {
        $value.lock().unwrap()
    };
}

macro_rules! read_lock {
    ($value: expr) => {
        $value.read().unwrap()
    };
}

macro_rules! write_lock {
    ($value: expr) => {
        $value.write().unwrap()
    };
}

pub mod files;
