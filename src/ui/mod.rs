//! Ratatui front end. `App` owns the catalog and turns key presses into
//! catalog calls; `run_app` drives the terminal.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
