//! Main test runner that orchestrates the server fixture and Playwright

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{E2eError, E2eResult};
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, ScriptOutcome, StepResult};
use crate::scenario::Scenario;
use crate::server::{ServerConfig, ServerHandle};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub page: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Fold a script's step reports into a result for `scenario`
    pub fn from_outcome(scenario: &Scenario, outcome: ScriptOutcome, duration_ms: u64) -> Self {
        let mut steps = Vec::with_capacity(outcome.reports.len());
        let mut error = None;

        for report in outcome.reports {
            let step_name = scenario
                .steps
                .get(report.step)
                .map(|s| s.describe())
                .unwrap_or_else(|| format!("step {}", report.step));

            if !report.success && error.is_none() {
                error = Some(
                    E2eError::StepFailed {
                        page: scenario.page_label().to_string(),
                        step: step_name.clone(),
                        reason: report
                            .error
                            .clone()
                            .unwrap_or_else(|| "unknown error".to_string()),
                    }
                    .to_string(),
                );
            }

            steps.push(StepResult {
                success: report.success,
                step_name,
                duration_ms: report.duration_ms,
                error: report.error,
            });
        }

        if error.is_none() {
            if let Some(crash) = outcome.crash {
                error = Some(format!("{} on {}: {}", scenario.name, scenario.page_label(), crash));
            } else if steps.len() < scenario.steps.len() {
                error = Some(format!(
                    "{} on {}: only {} of {} steps reported",
                    scenario.name,
                    scenario.page_label(),
                    steps.len(),
                    scenario.steps.len()
                ));
            }
        }

        Self {
            name: scenario.name.clone(),
            page: scenario.page_label().to_string(),
            success: error.is_none(),
            duration_ms,
            steps,
            error,
        }
    }

    fn failed(scenario: &Scenario, error: &E2eError, duration_ms: u64) -> Self {
        Self {
            name: scenario.name.clone(),
            page: scenario.page_label().to_string(),
            success: false,
            duration_ms,
            steps: vec![],
            error: Some(error.to_string()),
        }
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub base_url: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn new(
        started_at: DateTime<Utc>,
        base_url: String,
        duration_ms: u64,
        results: Vec<ScenarioResult>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            started_at,
            base_url,
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Main scenario runner
pub struct TestRunner {
    /// Server configuration
    server_config: ServerConfig,

    /// Playwright configuration
    playwright_config: PlaywrightConfig,

    /// Session server handle (if acquired)
    server: Option<ServerHandle>,

    /// Output directory for results
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            server_config: config.server,
            playwright_config: config.playwright,
            server: None,
            output_dir: config.output_dir,
        }
    }

    /// Acquire the session server
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(());
        }

        let server = ServerHandle::acquire(&self.server_config).await?;
        self.playwright_config.base_url = server.base_url().to_string();
        self.server = Some(server);
        Ok(())
    }

    /// Release the session server
    pub fn stop_server(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.release();
        }
    }

    /// Run one scenario by name from `scenarios`
    pub async fn run_named(&mut self, scenarios: &[Scenario], name: &str) -> E2eResult<SuiteResult> {
        let scenario = scenarios
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::ScenarioNotFound(name.to_string()))?;
        self.run_scenarios(std::slice::from_ref(scenario)).await
    }

    /// Run scenarios carrying `tag`
    pub async fn run_tagged(&mut self, scenarios: &[Scenario], tag: &str) -> E2eResult<SuiteResult> {
        let filtered: Vec<Scenario> = scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .cloned()
            .collect();
        self.run_scenarios(&filtered).await
    }

    /// Run a list of scenarios.
    ///
    /// Errors only for session-level problems (no server, no Playwright); a
    /// failing scenario is recorded in the result and the rest still run.
    pub async fn run_scenarios(&mut self, scenarios: &[Scenario]) -> E2eResult<SuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.start_server().await?;
        let playwright = PlaywrightHandle::new(self.playwright_config.clone())?;

        info!("Running {} scenario(s)...", scenarios.len());

        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let result = self.run_scenario(&playwright, scenario).await;
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let suite = SuiteResult::new(
            started_at,
            self.playwright_config.base_url.clone(),
            start.elapsed().as_millis() as u64,
            results,
        );

        info!("");
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );

        Ok(suite)
    }

    async fn run_scenario(&self, playwright: &PlaywrightHandle, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let outcome = playwright.run_scenario(scenario).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(outcome) => ScenarioResult::from_outcome(scenario, outcome, duration_ms),
            Err(e) => ScenarioResult::failed(scenario, &e, duration_ms),
        }
    }

    /// Write results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("e2e-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        self.stop_server();
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: ServerConfig,
    pub playwright: PlaywrightConfig,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        let playwright = PlaywrightConfig {
            base_url: server.base_url(),
            ..Default::default()
        };
        Self {
            server,
            playwright,
            output_dir: PathBuf::from("test-results"),
        }
    }
}
