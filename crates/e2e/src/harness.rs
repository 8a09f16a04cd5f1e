//! Command line of the browser suite binary
//!
//! The suite is a `harness = false` test, so cargo hands it whatever it would
//! hand libtest: a positional name filter and flags like `--nocapture`. The
//! filter, `--exact`, `--skip`, `--list` and `--ignored` are honoured; the
//! remaining libtest flags are accepted and have no effect.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{E2eError, E2eResult};
use crate::playwright::Browser;
use crate::scenario::Scenario;
use crate::server::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(name = "tutorial-e2e")]
#[command(about = "Browser scenarios for the tutorial examples")]
pub struct HarnessArgs {
    /// Run only scenarios whose name contains this text
    pub filter: Option<String>,

    /// Match the filter and `--skip` against whole names
    #[arg(long)]
    pub exact: bool,

    /// Leave out scenarios whose name contains this text
    #[arg(long)]
    pub skip: Vec<String>,

    /// Print the selected scenario names and exit
    #[arg(long)]
    pub list: bool,

    /// Run only ignored scenarios (there are none)
    #[arg(long)]
    pub ignored: bool,

    /// Port the example server listens on
    #[arg(long, env = "TUTORIAL_E2E_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Run only the scenario with this name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Run only scenarios carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Directory of extra YAML scenarios to run after the built-in ones
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,

    /// Server binary, relative to the repository root unless absolute
    #[arg(long, env = "TUTORIAL_E2E_ENTRY_POINT")]
    pub entry_point: Option<PathBuf>,

    /// Site directory, relative to the repository root
    #[arg(long, default_value = "tutorial")]
    pub site_root: PathBuf,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    pub browser: Browser,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Directory containing node_modules/@playwright/test
    #[arg(long, env = "TUTORIAL_E2E_NODE_MODULES")]
    pub node_modules: Option<PathBuf>,

    /// Fail instead of skipping when Playwright is not installed
    #[arg(long, env = "TUTORIAL_E2E_REQUIRE_BROWSER")]
    pub require_browser: bool,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,

    // libtest flags with no effect on a browser suite
    #[arg(long, hide = true)]
    pub nocapture: bool,
    #[arg(long, hide = true)]
    pub show_output: bool,
    #[arg(long, hide = true)]
    pub include_ignored: bool,
    #[arg(short, long, hide = true)]
    pub quiet: bool,
    #[arg(long, hide = true)]
    pub test_threads: Option<usize>,
    #[arg(long, hide = true)]
    pub format: Option<String>,
    #[arg(long, hide = true)]
    pub color: Option<String>,
    #[arg(short = 'Z', hide = true)]
    pub unstable: Vec<String>,
}

impl HarnessArgs {
    /// The scenarios this invocation asks for, in their given order.
    ///
    /// `--name` must name an existing scenario; the positional filter and
    /// `--tag` may select nothing.
    pub fn select(&self, scenarios: Vec<Scenario>) -> E2eResult<Vec<Scenario>> {
        if self.ignored {
            return Ok(Vec::new());
        }

        if let Some(name) = &self.name {
            let scenario = scenarios
                .into_iter()
                .find(|s| &s.name == name)
                .ok_or_else(|| E2eError::ScenarioNotFound(name.clone()))?;
            return Ok(vec![scenario]);
        }

        Ok(scenarios
            .into_iter()
            .filter(|s| self.tag.as_ref().map_or(true, |tag| s.tags.contains(tag)))
            .filter(|s| {
                self.filter
                    .as_deref()
                    .map_or(true, |filter| self.matches(&s.name, filter))
            })
            .filter(|s| !self.skip.iter().any(|skip| self.matches(&s.name, skip)))
            .collect())
    }

    fn matches(&self, name: &str, pattern: &str) -> bool {
        if self.exact {
            name == pattern
        } else {
            name.contains(pattern)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutorial;
    use test_case::test_case;

    fn parse(args: &[&str]) -> HarnessArgs {
        HarnessArgs::try_parse_from(std::iter::once("examples").chain(args.iter().copied()))
            .unwrap()
    }

    fn selected(args: &[&str]) -> Vec<String> {
        parse(args)
            .select(tutorial::scenarios())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect()
    }

    #[test_case(&["--nocapture"] ; "nocapture")]
    #[test_case(&["--test-threads", "4"] ; "test threads")]
    #[test_case(&["--test-threads=1", "--quiet"] ; "inline value")]
    #[test_case(&["-q", "--format", "terse", "--color", "never"] ; "output flags")]
    #[test_case(&["-Z", "unstable-options", "--show-output"] ; "unstable")]
    #[test_case(&["--include-ignored"] ; "include ignored")]
    fn test_libtest_flags_are_accepted(args: &[&str]) {
        assert_eq!(selected(args).len(), tutorial::scenarios().len());
    }

    #[test]
    fn test_filter_selects_by_substring() {
        assert_eq!(selected(&["hello"]), ["hello_world", "hello_name"]);
        assert_eq!(selected(&["refs_", "--nocapture"]), ["refs_problem", "refs_solution"]);
    }

    #[test]
    fn test_unrelated_filter_selects_nothing() {
        assert!(selected(&["probe_"]).is_empty());
    }

    #[test]
    fn test_exact_and_skip() {
        assert_eq!(selected(&["counter", "--exact"]), ["counter"]);
        assert!(selected(&["count", "--exact"]).is_empty());
        assert_eq!(selected(&["refs", "--skip", "problem"]), ["refs_solution"]);
    }

    #[test]
    fn test_ignored_selects_nothing() {
        assert!(selected(&["--ignored"]).is_empty());
    }

    #[test]
    fn test_tag_and_name() {
        assert_eq!(selected(&["--tag", "smoke"]), ["has_title", "hello_world"]);
        assert_eq!(selected(&["--name", "counter"]), ["counter"]);

        let err = parse(&["--name", "count"])
            .select(tutorial::scenarios())
            .unwrap_err();
        assert!(matches!(err, E2eError::ScenarioNotFound(_)));
    }

    #[test]
    fn test_unknown_flag_is_still_rejected() {
        let args = ["examples", "--no-such-flag"];
        assert!(HarnessArgs::try_parse_from(args).is_err());
    }
}
