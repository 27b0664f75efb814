//! Library components of the docpipe command-line tool.

pub mod input;
pub mod logging;
pub mod render;
