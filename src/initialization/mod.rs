//! Process initialization helpers.

mod logger;

pub use logger::init_logger_with;
