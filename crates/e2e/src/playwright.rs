//! Playwright browser automation
//!
//! Each scenario becomes one Node script run against a fresh browser page.
//! The script prints a JSON line per finished step, which is how results get
//! back to Rust. Text, title and focus assertions retry inside Playwright
//! until they hold or the scenario timeout elapses.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::scenario::{Scenario, Step};

/// Playwright browser handle
pub struct PlaywrightHandle {
    /// Base URL of the server
    base_url: String,

    /// Browser type
    browser: Browser,

    headless: bool,

    /// Viewport dimensions
    viewport_width: u32,
    viewport_height: u32,

    /// Where `@playwright/test` is installed, exported as `NODE_PATH`
    node_modules: Option<PathBuf>,

    /// Hard limit for one scenario script
    script_timeout: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

/// Result of executing a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// One line of script output
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepReport {
    pub step: usize,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Everything a scenario script reported
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub reports: Vec<StepReport>,
    /// Failure text when the script died without reporting a failed step
    pub crash: Option<String>,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        if !Self::is_installed(config.node_modules.as_deref()) {
            return Err(E2eError::PlaywrightNotFound);
        }

        Ok(Self {
            base_url: config.base_url,
            browser: config.browser,
            headless: config.headless,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            node_modules: config.node_modules,
            script_timeout: config.script_timeout,
        })
    }

    /// Whether `node` can load `@playwright/test`
    pub fn is_installed(node_modules: Option<&Path>) -> bool {
        let mut cmd = Command::new("node");
        cmd.args(["-e", "require.resolve('@playwright/test')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = node_modules {
            cmd.env("NODE_PATH", dir);
        }

        matches!(cmd.status(), Ok(status) if status.success())
    }

    /// Build the Node script for a scenario
    pub fn build_script(&self, scenario: &Scenario) -> String {
        let mut script = String::new();

        // Header
        script.push_str(&format!(
            r#"
const {{ {browser}, expect }} = require('@playwright/test');

const report = (line) => console.log(JSON.stringify(line));

async function step(index, body) {{
  const started = Date.now();
  try {{
    await body();
    report({{ step: index, success: true, duration_ms: Date.now() - started }});
  }} catch (error) {{
    report({{ step: index, success: false, duration_ms: Date.now() - started, error: String(error && error.message || error) }});
    throw error;
  }}
}}

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const baseUrl = {base_url};
  const timeout = {timeout};
  let failed = false;

  try {{
"#,
            browser = self.browser.as_str(),
            headless = self.headless,
            width = self.viewport_width,
            height = self.viewport_height,
            base_url = js_str(&self.base_url),
            timeout = scenario.timeout_ms,
        ));

        for (i, s) in scenario.steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, s.describe()));
            script.push_str(&format!("    await step({}, async () => {{\n", i));
            script.push_str(&step_to_js(s));
            script.push_str("\n    });\n");
        }

        // Footer
        script.push_str(
            r#"
  } catch (error) {
    failed = true;
  } finally {
    await browser.close();
  }
  process.exit(failed ? 1 : 0);
})().catch((error) => {
  console.error(error && error.stack || error);
  process.exit(2);
});
"#,
        );

        script
    }

    /// Run a scenario in a fresh browser page
    pub async fn run_scenario(&self, scenario: &Scenario) -> E2eResult<ScriptOutcome> {
        let script = self.build_script(scenario);
        self.run_script(&script).await
    }

    /// Execute a script via Node
    pub async fn run_script(&self, script: &str) -> E2eResult<ScriptOutcome> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path)
            .current_dir(temp_dir.path())
            .kill_on_drop(true);
        if let Some(dir) = &self.node_modules {
            cmd.env("NODE_PATH", dir);
        }

        let output = tokio::time::timeout(self.script_timeout, cmd.output())
            .await
            .map_err(|_| {
                E2eError::Timeout(format!("Playwright script ({:?})", self.script_timeout))
            })?
            .map_err(|e| E2eError::Playwright(format!("failed to run node: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut reports = Vec::new();
        for line in stdout.lines() {
            match serde_json::from_str::<StepReport>(line.trim()) {
                Ok(mut report) => {
                    report.error = report.error.map(|e| strip_ansi(&e));
                    reports.push(report);
                }
                Err(_) if !line.trim().is_empty() => info!("[browser] {}", line),
                Err(_) => {}
            }
        }

        let step_failed = reports.iter().any(|r| !r.success);
        let crash = if output.status.success() || step_failed {
            None
        } else {
            Some(format!(
                "script exited with {}:\n{}",
                output.status,
                strip_ansi(stderr.trim())
            ))
        };

        Ok(ScriptOutcome { reports, crash })
    }
}

/// Convert a step to JavaScript code
fn step_to_js(step: &Step) -> String {
    match step {
        Step::Goto { path } => format!("      await page.goto(baseUrl + {});", js_str(path)),
        Step::ClickRole { role, name, exact } => format!(
            "      await page.getByRole({}, {{ name: {}, exact: {} }}).click({{ timeout }});",
            js_str(role),
            js_str(name),
            exact
        ),
        Step::ClickPlaceholder { placeholder } => format!(
            "      await page.getByPlaceholder({}).click({{ timeout }});",
            js_str(placeholder)
        ),
        Step::Fill { placeholder, value } => format!(
            "      await page.getByPlaceholder({}).fill({}, {{ timeout }});",
            js_str(placeholder),
            js_str(value)
        ),
        Step::Press {
            placeholder: Some(placeholder),
            key,
        } => format!(
            "      await page.getByPlaceholder({}).press({}, {{ timeout }});",
            js_str(placeholder),
            js_str(key)
        ),
        Step::Press {
            placeholder: None,
            key,
        } => format!("      await page.keyboard.press({});", js_str(key)),
        Step::ExpectTitle { pattern } => format!(
            "      await expect(page).toHaveTitle(new RegExp({}), {{ timeout }});",
            js_str(pattern)
        ),
        Step::ExpectText {
            selector,
            text,
            exact,
        } => format!(
            "      await expect(page.locator({}).first()).{}({}, {{ timeout }});",
            js_str(selector),
            if *exact { "toHaveText" } else { "toContainText" },
            js_str(text)
        ),
        Step::ExpectFocus { selector, focused } => format!(
            "      await expect.poll(\n        () => page.evaluate((selector) => document.querySelector(selector) === document.activeElement, {}),\n        {{ timeout, message: {} }}\n      ).toBe({});",
            js_str(selector),
            js_str(&step.describe()),
            focused
        ),
        Step::Log { message } => format!("      console.log('[scenario] ' + {});", js_str(message)),
    }
}

/// A JavaScript string literal for `s`
fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

fn strip_ansi(s: &str) -> String {
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    match ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").ok()) {
        Some(re) => re.replace_all(s, "").into_owned(),
        None => s.to_string(),
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub node_modules: Option<PathBuf>,
    pub script_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5566".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_modules: None,
            script_timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutorial;

    fn handle() -> PlaywrightHandle {
        let config = PlaywrightConfig::default();
        PlaywrightHandle {
            base_url: config.base_url,
            browser: config.browser,
            headless: config.headless,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            node_modules: None,
            script_timeout: config.script_timeout,
        }
    }

    #[test]
    fn test_js_str_escapes_quotes() {
        assert_eq!(
            js_str("[placeholder='Type a word']"),
            r#""[placeholder='Type a word']""#
        );
        assert_eq!(js_str(r#"say "hi""#), r#""say \"hi\"""#);
    }

    #[test]
    fn test_script_wraps_every_step() {
        let scenario = tutorial::counter();
        let script = handle().build_script(&scenario);

        for i in 0..scenario.steps.len() {
            assert!(script.contains(&format!("await step({}, async", i)));
        }
        assert!(script.contains(r#"const baseUrl = "http://localhost:5566";"#));
        assert!(script.contains(r#"const timeout = 5000;"#));
        assert!(script.contains(
            r#"page.getByRole("link", { name: "Example 3: Counter", exact: false })"#
        ));
        assert!(script.contains(r#"page.getByRole("button", { name: "-", exact: true })"#));
        assert!(script.contains(r#"toHaveText("-1", { timeout })"#));
    }

    #[test]
    fn test_focus_step_compares_active_element() {
        let js = step_to_js(&Step::expect_focus("[placeholder='Type a word']", false));
        assert!(js.contains("document.querySelector(selector) === document.activeElement"));
        assert!(js.contains(r#""[placeholder='Type a word']""#));
        assert!(js.ends_with(".toBe(false);"));
    }

    #[test]
    fn test_press_without_placeholder_uses_keyboard() {
        let js = step_to_js(&Step::Press {
            placeholder: None,
            key: "Enter".to_string(),
        });
        assert_eq!(js.trim(), r#"await page.keyboard.press("Enter");"#);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(
            strip_ansi("\u{1b}[31mExpected\u{1b}[39m: \"2\""),
            "Expected: \"2\""
        );
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("Firefox".parse::<Browser>(), Ok(Browser::Firefox));
        assert!("lynx".parse::<Browser>().is_err());
    }
}
