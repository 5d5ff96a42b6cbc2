//! Background work owned by the relay process.

pub mod timer;
