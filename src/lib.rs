// Event bridge between a single-threaded interpreter and the
// notification-driven device components around it.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod config;
pub mod drivers;
pub mod kernel;
pub mod queue;
