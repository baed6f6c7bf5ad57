//! Form orchestration: validation, job submission, and the command loop
//! that UI layers drive.

mod controller;

pub use controller::{
    caption_for, next_run_from, next_run_label, run_controller, today_stamp, BusyFlags, Console,
    ConsoleConfig, UiCommand,
};
