pub mod api;
pub mod catalog;
pub mod cli;
pub mod model;
pub mod orchestrator;
pub mod poller;
pub mod roster;
pub mod status;
#[cfg(feature = "tui")]
pub mod tui;
