//! # splice-utils
//!
//! Configuration shared by the splice crates.

#[macro_use]
extern crate tracing;

pub mod config;
