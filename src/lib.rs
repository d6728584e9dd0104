pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod types;
pub mod ui;
pub mod util;

#[cfg(test)]
mod test_support;
