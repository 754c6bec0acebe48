//! Terminal client for Miniflux-compatible feed services.
//!
//! The core keeps a local cache of entries consistent with the server while
//! status changes are applied optimistically. The binary wires it to a
//! ratatui front end.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod keybindings;
pub mod nav;
pub mod store;
pub mod sync;
pub mod ui;
pub mod util;
