//! CLI module for groundqa
//!
//! Handles command-line argument parsing and verbosity control.

pub mod args;

pub use args::{Args, Commands, QuestionArgs, Verbosity};
