//! Armada control plane service library.
//!
//! Exposes the modules so integration tests can assemble an in-process
//! control plane without the binary entry point.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod observability;
pub mod secrets;
pub mod watcher;

pub use app::{AppState, build_router};
