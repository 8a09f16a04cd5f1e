//! Tutorial Examples E2E Test Framework
//!
//! This crate drives the tutorial example pages in a real browser:
//! - Reuses a server already listening on the session port, or spawns
//!   `tutorial-serve` and terminates it at the end of the session
//! - Controls Playwright by generating one Node script per scenario
//! - Ships the tutorial scenarios and loads extra ones from YAML
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Runner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_server() -> ServerHandle  (probe, then spawn)  │
//! │    ├── run_scenarios([Scenario]) -> SuiteResult             │
//! │    └── stop_server()                   (owned handles only) │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario                                                   │
//! │    ├── name, page (index link), timeout_ms                  │
//! │    └── steps: [Step]                                        │
//! │          ├── goto { path }                                  │
//! │          ├── click_role { role, name }                      │
//! │          ├── click_placeholder / fill / press               │
//! │          ├── expect_title { pattern }                       │
//! │          ├── expect_text { selector, text, exact }          │
//! │          └── expect_focus { selector, focused }             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod harness;
pub mod playwright;
pub mod poll;
pub mod probe;
pub mod runner;
pub mod scenario;
pub mod server;
pub mod tutorial;

pub use error::{E2eError, E2eResult};
pub use harness::HarnessArgs;
pub use probe::probe;
pub use runner::{RunnerConfig, SuiteResult, TestRunner};
pub use scenario::{Scenario, Step};
pub use server::{ServerConfig, ServerHandle};
