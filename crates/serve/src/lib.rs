//! Tutorial example server
//!
//! Serves the tutorial example site from a directory so the browser
//! scenarios in `tutorial-e2e` have something to drive.

pub mod config;
pub mod server;
pub mod static_files;

pub use config::{ServeConfig, DEFAULT_PORT};
pub use server::{router, serve};
pub use static_files::StaticFiles;
