//! Server configuration

use std::path::PathBuf;

/// Port the tutorial examples are served on unless told otherwise
pub const DEFAULT_PORT: u16 = 5566;

#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Directory containing the example site (`index.html` at its top)
    pub root: PathBuf,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            root: PathBuf::from("tutorial"),
        }
    }
}
