//! Counter and echo app driven one stdin line at a time.

pub mod app;
pub mod command;
pub mod input;

pub use app::{App, Counter, CounterAction, Echo};
pub use command::Command;
pub use input::{publish_line, use_input, InputBus, INPUT_BUS};

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod app_tests;
