//! Command-line interface: argument parsing, logging setup, and dispatch.

pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod start;

pub use start::start;
