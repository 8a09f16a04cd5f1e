//! Error types for the scenario harness

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server entry point not found at {}; build it with `cargo build -p tutorial-serve`", .0.display())]
    EntryPointMissing(PathBuf),

    #[error("Site root not found at {}", .0.display())]
    SiteRootMissing(PathBuf),

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server exited during startup ({status}); stderr:\n{stderr}")]
    ServerExited { status: String, stderr: String },

    #[error("Playwright not found. Install with: npm install @playwright/test && npx playwright install chromium")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("No scenario named '{0}'")]
    ScenarioNotFound(String),

    #[error("Step failed on {page}: {step} - {reason}")]
    StepFailed {
        page: String,
        step: String,
        reason: String,
    },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Errors that mean the server could not be brought up for the session
    pub fn is_server_startup(&self) -> bool {
        matches!(
            self,
            E2eError::EntryPointMissing(_)
                | E2eError::SiteRootMissing(_)
                | E2eError::ServerStartup(_)
                | E2eError::ServerExited { .. }
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
