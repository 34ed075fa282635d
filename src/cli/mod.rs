//! CLI module for guardhouse

pub mod args;

pub use args::{Args, Commands, Verbosity};
