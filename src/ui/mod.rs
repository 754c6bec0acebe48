//! Terminal User Interface module.
//!
//! This module provides the TUI for the entry reader, including:
//! - Main event loop (`run`)
//! - Input handling for the list, detail pane and search prompt
//! - Rendering for the entry list, detail pane and footer
//! - Background task event processing
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task event processing
//! - `helpers` - Task spawning, refresh/pagination and effect execution
//! - `render` - Layout and render dispatch
//! - `entries` - Entry list widget
//! - `detail` - Entry detail widget
//! - `footer` - Status/footer line
//! - `help` - Keybinding overlay

mod detail;
mod entries;
mod events;
mod footer;
mod help;
mod helpers;
mod input;
mod loop_runner;
mod render;

pub use helpers::start_refresh;
pub use loop_runner::{run, Action};
