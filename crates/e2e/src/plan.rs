//! Declarative UI flow plans
//!
//! A [`UiFlow`] is an ordered list of [`UiStep`]s. Plans are plain data: they
//! serialize to YAML for inspection and compile to a single Playwright script
//! in [`crate::playwright`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{E2eError, E2eResult};

/// A complete UI flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiFlow {
    /// Unique name for this flow
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Steps to execute in order
    pub steps: Vec<UiStep>,
}

/// A string value used by a step.
///
/// Literals are emitted verbatim. Variables and templates refer to values
/// captured earlier in the same run; templates substitute `{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Text {
    Literal(String),
    Var { var: String },
    Template { template: String },
}

impl Text {
    pub fn lit(value: impl Into<String>) -> Self {
        Text::Literal(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Text::Var { var: name.into() }
    }

    pub fn template(template: impl Into<String>) -> Self {
        Text::Template {
            template: template.into(),
        }
    }

    /// Names of captured values this text depends on
    pub fn references(&self) -> Vec<String> {
        match self {
            Text::Literal(_) => Vec::new(),
            Text::Var { var } => vec![var.clone()],
            Text::Template { template } => template_vars(template),
        }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Text::Literal(s) => f.write_str(s),
            Text::Var { var } => write!(f, "{{{}}}", var),
            Text::Template { template } => f.write_str(template),
        }
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::Literal(s.to_string())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Text::Literal(s)
    }
}

/// Extract `{name}` placeholders from a template
fn template_vars(template: &str) -> Vec<String> {
    let mut vars = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    vars.push(name.to_string());
                }
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    vars
}

/// A single step in a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UiStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        completion: Option<Completion>,
    },

    /// Click an element, then wait for its completion condition
    Click {
        selector: Text,
        #[serde(default)]
        completion: Option<Completion>,
    },

    /// Fill an input field
    Fill { selector: Text, value: Text },

    /// Select an option from a dropdown
    Select {
        selector: Text,
        #[serde(default)]
        by: SelectBy,
        option: Text,
    },

    /// Select the first option whose value differs from `excluding`, and
    /// capture the chosen value
    SelectFirstOther {
        selector: Text,
        excluding: Text,
        capture: String,
    },

    /// Block until a named condition holds
    WaitFor { completion: Completion },

    /// Assert that some text is visible on the page
    ExpectText { text: Text },

    /// Assert something about an element
    Assert { selector: Text, expect: Expectation },

    /// Read an element's inner text into a named value
    Capture { name: String, selector: Text },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectBy {
    #[default]
    Value,
    Label,
}

/// Expected state of an element
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    Visible,
    Text { value: Text },
    ContainsText { value: Text },
    Matches { pattern: String },
}

/// A named condition a step waits for before it is considered done
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub name: String,
    #[serde(flatten)]
    pub condition: Condition,
    /// Overrides the default expect timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Completion {
    pub fn new(name: impl Into<String>, condition: Condition) -> Self {
        Self {
            name: name.into(),
            condition,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "until", rename_all = "snake_case")]
pub enum Condition {
    /// Element is rendered and visible
    Visible { selector: Text },
    /// Element exists in the DOM (e.g. a populated `<option>`)
    Attached { selector: Text },
    /// Text is visible somewhere on the page
    TextVisible { text: Text },
    /// A response whose URL contains the fragment has arrived
    Response { url_contains: String },
    /// Page load state reached
    LoadState { state: LoadState },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

impl UiStep {
    /// Short human-readable name used in logs and step reports
    pub fn name(&self) -> String {
        match self {
            UiStep::Navigate { url, .. } => format!("navigate:{}", url),
            UiStep::Click { selector, completion } => match completion {
                Some(c) => format!("click:{} until {}", selector, c.name),
                None => format!("click:{}", selector),
            },
            UiStep::Fill { selector, .. } => format!("fill:{}", selector),
            UiStep::Select { selector, .. } => format!("select:{}", selector),
            UiStep::SelectFirstOther { selector, .. } => format!("select-other:{}", selector),
            UiStep::WaitFor { completion } => format!("wait:{}", completion.name),
            UiStep::ExpectText { text } => format!("expect-text:{}", text),
            UiStep::Assert { selector, .. } => format!("assert:{}", selector),
            UiStep::Capture { name, .. } => format!("capture:{}", name),
        }
    }

    /// Texts whose values must be known before this step runs
    fn texts(&self) -> Vec<&Text> {
        match self {
            UiStep::Navigate { .. } => Vec::new(),
            UiStep::Click { selector, .. } => vec![selector],
            UiStep::Fill { selector, value } => vec![selector, value],
            UiStep::Select { selector, option, .. } => vec![selector, option],
            UiStep::SelectFirstOther {
                selector,
                excluding,
                ..
            } => vec![selector, excluding],
            UiStep::WaitFor { .. } => Vec::new(),
            UiStep::ExpectText { text } => vec![text],
            UiStep::Assert { selector, expect } => match expect {
                Expectation::Text { value } | Expectation::ContainsText { value } => {
                    vec![selector, value]
                }
                _ => vec![selector],
            },
            UiStep::Capture { selector, .. } => vec![selector],
        }
    }

    fn completion(&self) -> Option<&Completion> {
        match self {
            UiStep::Navigate { completion, .. } | UiStep::Click { completion, .. } => {
                completion.as_ref()
            }
            UiStep::WaitFor { completion } => Some(completion),
            _ => None,
        }
    }

    /// Name of the value this step captures, if any
    pub fn captures(&self) -> Option<&str> {
        match self {
            UiStep::SelectFirstOther { capture, .. } => Some(capture),
            UiStep::Capture { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl Condition {
    fn texts(&self) -> Vec<&Text> {
        match self {
            Condition::Visible { selector } | Condition::Attached { selector } => vec![selector],
            Condition::TextVisible { text } => vec![text],
            Condition::Response { .. } | Condition::LoadState { .. } => Vec::new(),
        }
    }
}

impl UiFlow {
    /// Parse a flow from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let flow: Self = serde_yaml::from_str(yaml)?;
        flow.validate()?;
        Ok(flow)
    }

    pub fn to_yaml(&self) -> E2eResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check that every referenced value is captured by an earlier step
    pub fn validate(&self) -> E2eResult<()> {
        let mut known: Vec<&str> = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            let mut texts = step.texts();
            if let Some(c) = step.completion() {
                texts.extend(c.condition.texts());
            }

            for text in texts {
                for var in text.references() {
                    if !known.contains(&var.as_str()) {
                        return Err(E2eError::FlowParse(format!(
                            "step {} ({}) uses '{}' before it is captured",
                            i + 1,
                            step.name(),
                            var
                        )));
                    }
                }
            }

            if let Some(name) = step.captures() {
                known.push(name);
            }
        }

        Ok(())
    }

    /// Names of all values captured by this flow, in order
    pub fn capture_names(&self) -> Vec<&str> {
        self.steps.iter().filter_map(|s| s.captures()).collect()
    }
}
