//! TLS wire-format substrate for the ECH engine.

#[macro_use]
mod macros;

pub mod base;
pub mod codec;
pub mod enums;

pub mod client_hello;
pub mod config;
pub mod ech;
