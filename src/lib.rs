//! A small interactive shell that starts external programs in the foreground or
//! the background and keeps track of the background ones so they can be killed
//! later, one by one or all at once.
//!
//! The main entry point is [`Interpreter`], which reads command lines, splits
//! them into words and dispatches on the first word. The process handling itself
//! lives in [`supervisor`]: it works on an explicit [`ProcessRegistry`] and can be
//! used without the interactive front end.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
mod interpreter;
pub mod lexer;
pub mod registry;
pub mod spawner;
pub mod supervisor;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{DEFAULT_PROMPT, Interpreter};
pub use registry::ProcessRegistry;
