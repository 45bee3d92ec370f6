//! Courier - addressed-event microservice runtime.
//!
//! Each named service instance exposes create/update/delete over a small
//! HTTP surface and reacts to commands addressed to it by name on a shared
//! broadcast bus, publishing an acknowledgement event back to the common
//! manager channel after each operation.

pub mod bus;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod runtime;
pub mod triggers;
