//! Scenario definitions: ordered browser steps against one example page

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Default timeout for auto-retrying assertions
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// One end-to-end navigation, interaction and assertion sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Accessible name of the index link leading to the example page
    #[serde(default)]
    pub page: Option<String>,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// How long each assertion keeps retrying before it fails
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a path relative to the base URL
    Goto { path: String },

    /// Click the element with this ARIA role and accessible name
    ClickRole {
        role: String,
        name: String,
        #[serde(default)]
        exact: bool,
    },

    /// Click the input with this placeholder
    ClickPlaceholder { placeholder: String },

    /// Replace the value of the input with this placeholder
    Fill { placeholder: String, value: String },

    /// Press a key, on the input with this placeholder or on the page
    Press {
        #[serde(default)]
        placeholder: Option<String>,
        key: String,
    },

    /// The page title matches a regular expression
    ExpectTitle { pattern: String },

    /// The text of the first element matching `selector` contains `text`,
    /// or equals it when `exact` is set
    ExpectText {
        selector: String,
        text: String,
        #[serde(default)]
        exact: bool,
    },

    /// `document.querySelector(selector) === document.activeElement`
    /// evaluates to `focused`
    ExpectFocus { selector: String, focused: bool },

    /// Log a message (for debugging)
    Log { message: String },
}

impl Step {
    pub fn goto(path: impl Into<String>) -> Self {
        Step::Goto { path: path.into() }
    }

    pub fn click_link(name: impl Into<String>) -> Self {
        Step::ClickRole {
            role: "link".to_string(),
            name: name.into(),
            exact: false,
        }
    }

    pub fn click_button(name: impl Into<String>) -> Self {
        Step::ClickRole {
            role: "button".to_string(),
            name: name.into(),
            exact: true,
        }
    }

    pub fn click_placeholder(placeholder: impl Into<String>) -> Self {
        Step::ClickPlaceholder {
            placeholder: placeholder.into(),
        }
    }

    pub fn fill(placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        Step::Fill {
            placeholder: placeholder.into(),
            value: value.into(),
        }
    }

    pub fn press(placeholder: impl Into<String>, key: impl Into<String>) -> Self {
        Step::Press {
            placeholder: Some(placeholder.into()),
            key: key.into(),
        }
    }

    pub fn expect_title(pattern: impl Into<String>) -> Self {
        Step::ExpectTitle {
            pattern: pattern.into(),
        }
    }

    pub fn expect_contains(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Step::ExpectText {
            selector: selector.into(),
            text: text.into(),
            exact: false,
        }
    }

    pub fn expect_exact(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Step::ExpectText {
            selector: selector.into(),
            text: text.into(),
            exact: true,
        }
    }

    pub fn expect_focus(selector: impl Into<String>, focused: bool) -> Self {
        Step::ExpectFocus {
            selector: selector.into(),
            focused,
        }
    }

    /// Short label used in logs and failure messages
    pub fn describe(&self) -> String {
        match self {
            Step::Goto { path } => format!("goto:{}", path),
            Step::ClickRole { role, name, .. } => format!("click:{} {:?}", role, name),
            Step::ClickPlaceholder { placeholder } => format!("click:placeholder {:?}", placeholder),
            Step::Fill { placeholder, value } => {
                format!("fill:placeholder {:?} with {:?}", placeholder, value)
            }
            Step::Press { placeholder: Some(p), key } => format!("press:{} on placeholder {:?}", key, p),
            Step::Press { placeholder: None, key } => format!("press:{}", key),
            Step::ExpectTitle { pattern } => format!("expect title /{}/", pattern),
            Step::ExpectText { selector, text, exact: true } => {
                format!("expect {} to have text {:?}", selector, text)
            }
            Step::ExpectText { selector, text, exact: false } => {
                format!("expect {} to contain {:?}", selector, text)
            }
            Step::ExpectFocus { selector, focused: true } => format!("expect {} focused", selector),
            Step::ExpectFocus { selector, focused: false } => {
                format!("expect {} not focused", selector)
            }
            Step::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl Scenario {
    /// An empty scenario
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            page: None,
            tags: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            steps: Vec::new(),
        }
    }

    /// A scenario that starts at the index and follows the link named `link`
    pub fn on_example(name: impl Into<String>, link: impl Into<String>) -> Self {
        let link = link.into();
        let mut scenario = Self::new(name);
        scenario.steps = vec![Step::goto("/"), Step::click_link(link.clone())];
        scenario.page = Some(link);
        scenario
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Which page failures are reported against
    pub fn page_label(&self) -> &str {
        self.page.as_deref().unwrap_or("index")
    }

    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::ScenarioParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scenarios)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::ScenarioParse("scenario name is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::ScenarioParse(format!(
                "scenario '{}' has no steps",
                self.name
            )));
        }
        Ok(())
    }
}
