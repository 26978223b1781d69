// Session command parser module

pub mod command;
pub mod lexer;

// Public API re-exports
pub use command::{parse_command_line, parse_filter_arg, SessionCommand};
