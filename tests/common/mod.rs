//! Common test utilities for mail-harvest integration tests

#[allow(dead_code)]
pub mod gmail;
#[allow(dead_code)]
pub mod server;

pub use gmail::*;
pub use server::*;
