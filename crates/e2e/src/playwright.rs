//! Playwright browser automation
//!
//! A [`UiFlow`] is compiled into one Node.js script so the browser session
//! (cookies, login state) survives from the first step to the last. The script
//! reports progress on stdout as `@@event {json}` lines which are parsed back
//! into a [`ScriptReport`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::plan::{Completion, Condition, Expectation, SelectBy, Text, UiFlow, UiStep};

/// Prefix of every machine-readable line printed by the generated script
pub const EVENT_PREFIX: &str = "@@event ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Result of executing a flow step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Everything the script reported about one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptReport {
    pub success: bool,
    pub steps: Vec<StepResult>,
    pub captures: BTreeMap<String, String>,
    pub error: Option<String>,
}

impl ScriptReport {
    /// The first failed step, if any
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ScriptEvent {
    Step {
        index: usize,
        name: String,
        success: bool,
        duration_ms: u64,
        #[serde(default)]
        error: Option<String>,
    },
    Capture {
        name: String,
        value: String,
    },
    Done {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Parse the stdout of a generated script.
///
/// Lines without the event prefix are console noise from the page or
/// Playwright itself and are only logged.
pub fn parse_output(stdout: &str) -> E2eResult<ScriptReport> {
    let event_line = Regex::new(&format!(r"^{}(\{{.*\}})\s*$", regex::escape(EVENT_PREFIX)))
        .map_err(|e| E2eError::Playwright(e.to_string()))?;

    let mut report = ScriptReport::default();
    let mut done = false;

    for line in stdout.lines() {
        let Some(caps) = event_line.captures(line) else {
            if !line.trim().is_empty() {
                debug!("[playwright] {}", line);
            }
            continue;
        };

        match serde_json::from_str::<ScriptEvent>(&caps[1])? {
            ScriptEvent::Step {
                index,
                name,
                success,
                duration_ms,
                error,
            } => {
                if success {
                    debug!("step {} ok: {} ({} ms)", index + 1, name, duration_ms);
                } else {
                    warn!("step {} failed: {}", index + 1, name);
                }
                report.steps.push(StepResult {
                    success,
                    step_name: name,
                    duration_ms,
                    error,
                });
            }
            ScriptEvent::Capture { name, value } => {
                debug!("captured {} = {}", name, value);
                report.captures.insert(name, value);
            }
            ScriptEvent::Done { success, error } => {
                done = true;
                report.success = success;
                report.error = error;
            }
        }
    }

    if !done {
        report.success = false;
        report
            .error
            .get_or_insert_with(|| "script exited without reporting completion".to_string());
    }

    Ok(report)
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
    base_url: String,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub async fn new(config: PlaywrightConfig, base_url: impl Into<String>) -> E2eResult<Self> {
        // Verify playwright is installed
        Self::check_playwright_installed().await?;

        Ok(Self {
            config,
            base_url: base_url.into(),
        })
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed() -> E2eResult<()> {
        let output = TokioCommand::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Compile and run a whole flow in one browser session
    pub async fn run_flow(&self, flow: &UiFlow) -> E2eResult<ScriptReport> {
        flow.validate()?;
        info!("Running UI flow '{}' ({} steps)", flow.name, flow.steps.len());
        let script = build_script(&self.config, &self.base_url, flow);
        self.run_script(&script).await
    }

    /// Execute a script via node and collect its events
    pub async fn run_script(&self, script: &str) -> E2eResult<ScriptReport> {
        // Write script to temp file
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut cmd = TokioCommand::new(&self.config.node_binary);
        cmd.arg(&script_path)
            .current_dir(temp_dir.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(modules) = &self.config.node_modules {
            cmd.env("NODE_PATH", modules);
        }

        let limit = Duration::from_secs(self.config.script_timeout_secs);
        let output = tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| {
                E2eError::Timeout(format!("Playwright script after {}s", limit.as_secs()))
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("[playwright stderr] {}", stderr.trim());
        }

        let report = parse_output(&stdout)?;

        // A script that never got to run a step (missing module, syntax error)
        // is a harness problem rather than a failed flow.
        if !output.status.success() && report.steps.is_empty() {
            return Err(E2eError::Playwright(format!(
                "Script failed:\nstdout: {}\nstderr: {}",
                stdout, stderr
            )));
        }

        Ok(report)
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Bound on every visibility, text and load wait
    pub expect_timeout_ms: u64,
    /// Bound on the whole script, node startup and browser launch included
    pub script_timeout_secs: u64,
    pub node_binary: String,
    /// Exported as `NODE_PATH` so the script can resolve `playwright`
    pub node_modules: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            expect_timeout_ms: 5000,
            script_timeout_secs: 120,
            node_binary: "node".to_string(),
            node_modules: None,
        }
    }
}

const SCRIPT_PRELUDE: &str = r#"
const { chromium, firefox, webkit } = require('playwright');
const { expect } = require('@playwright/test');

const vars = {};

function emit(event) {
  console.log('@@event ' + JSON.stringify(event));
}

function render(template) {
  return template.replace(/\{([A-Za-z0-9_]+)\}/g, (m, name) => (name in vars ? vars[name] : m));
}

function capture(name, value) {
  vars[name] = value;
  emit({ event: 'capture', name, value });
}

async function step(index, name, body) {
  const started = Date.now();
  try {
    await body();
  } catch (error) {
    emit({ event: 'step', index, name, success: false, duration_ms: Date.now() - started, error: error.message });
    throw error;
  }
  emit({ event: 'step', index, name, success: true, duration_ms: Date.now() - started });
}
"#;

/// Build the Playwright script for a flow
pub fn build_script(config: &PlaywrightConfig, base_url: &str, flow: &UiFlow) -> String {
    let mut script = String::from(SCRIPT_PRELUDE);
    let timeout = config.expect_timeout_ms;

    script.push_str(&format!(
        r#"
(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  page.setDefaultTimeout({timeout});
  const baseUrl = {base_url};

  try {{
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        width = config.viewport_width,
        height = config.viewport_height,
        timeout = timeout,
        base_url = js_str(base_url.trim_end_matches('/')),
    ));

    for (i, step) in flow.steps.iter().enumerate() {
        script.push_str(&format!(
            "\n    // Step {}: {}\n    await step({}, {}, async () => {{\n",
            i + 1,
            step.name().replace('\n', " "),
            i,
            js_str(&step.name())
        ));
        for line in step_to_js(step, timeout).lines() {
            script.push_str("      ");
            script.push_str(line);
            script.push('\n');
        }
        script.push_str("    });\n");
    }

    script.push_str(
        r#"
    emit({ event: 'done', success: true });
  } catch (error) {
    emit({ event: 'done', success: false, error: error.message });
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#,
    );

    script
}

/// JSON string literals are valid JavaScript string literals
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn js_text(text: &Text) -> String {
    match text {
        Text::Literal(s) => js_str(s),
        Text::Var { var } => format!("vars[{}]", js_str(var)),
        Text::Template { template } => format!("render({})", js_str(template)),
    }
}

fn locator(selector: &Text) -> String {
    format!("page.locator({}).first()", js_text(selector))
}

/// Convert a step to the body of its `step(...)` callback
fn step_to_js(step: &UiStep, default_timeout: u64) -> String {
    match step {
        UiStep::Navigate { url, completion } => {
            let mut js = format!("await page.goto(baseUrl + {});", js_str(url));
            if let Some(c) = completion {
                js.push('\n');
                js.push_str(&completion_to_js(c, default_timeout));
            }
            js
        }
        UiStep::Click { selector, completion } => match completion {
            Some(c) => match &c.condition {
                // Arm the response wait before clicking so a fast reply is not missed
                Condition::Response { url_contains } => format!(
                    "await Promise.all([\n  page.waitForResponse(r => r.url().includes({}), {{ timeout: {} }}),\n  {}.click(),\n]);",
                    js_str(url_contains),
                    c.timeout_ms.unwrap_or(default_timeout),
                    locator(selector)
                ),
                _ => format!(
                    "await {}.click();\n{}",
                    locator(selector),
                    completion_to_js(c, default_timeout)
                ),
            },
            None => format!("await {}.click();", locator(selector)),
        },
        UiStep::Fill { selector, value } => {
            format!("await {}.fill({});", locator(selector), js_text(value))
        }
        UiStep::Select { selector, by, option } => {
            let key = match by {
                SelectBy::Value => "value",
                SelectBy::Label => "label",
            };
            format!(
                "await {}.selectOption({{ {}: {} }});",
                locator(selector),
                key,
                js_text(option)
            )
        }
        UiStep::SelectFirstOther {
            selector,
            excluding,
            capture,
        } => format!(
            r#"const select = {select};
await select.locator('option').first().waitFor({{ state: 'attached', timeout: {timeout} }});
const excluded = {excluded};
const candidates = select.locator('option:not([value="' + excluded + '"])');
if (await candidates.count() === 0) {{
  throw new Error('no option in ' + {selector_str} + ' other than ' + excluded);
}}
const chosen = await candidates.first().getAttribute('value');
if (!chosen) {{
  throw new Error('first option other than ' + excluded + ' has no value');
}}
await select.selectOption({{ value: chosen }});
capture({name}, chosen);"#,
            select = locator(selector),
            timeout = default_timeout,
            excluded = js_text(excluding),
            selector_str = js_text(selector),
            name = js_str(capture),
        ),
        UiStep::WaitFor { completion } => completion_to_js(completion, default_timeout),
        UiStep::ExpectText { text } => format!(
            "await expect(page.getByText({}).first()).toBeVisible({{ timeout: {} }});",
            js_text(text),
            default_timeout
        ),
        UiStep::Assert { selector, expect } => {
            let matcher = match expect {
                Expectation::Visible => "toBeVisible(".to_string(),
                Expectation::Text { value } => format!("toHaveText({}, ", js_text(value)),
                Expectation::ContainsText { value } => {
                    format!("toContainText({}, ", js_text(value))
                }
                Expectation::Matches { pattern } => {
                    format!("toHaveText(new RegExp({}), ", js_str(pattern))
                }
            };
            format!(
                "await expect({}).{}{{ timeout: {} }});",
                locator(selector),
                matcher,
                default_timeout
            )
        }
        UiStep::Capture { name, selector } => format!(
            "const element = {};\nawait element.waitFor({{ state: 'visible', timeout: {} }});\ncapture({}, (await element.innerText()).trim());",
            locator(selector),
            default_timeout,
            js_str(name)
        ),
    }
}

/// Wait code for a named completion condition
fn completion_to_js(completion: &Completion, default_timeout: u64) -> String {
    let timeout = completion.timeout_ms.unwrap_or(default_timeout);
    let wait = match &completion.condition {
        Condition::Visible { selector } => format!(
            "await {}.waitFor({{ state: 'visible', timeout: {} }});",
            locator(selector),
            timeout
        ),
        Condition::Attached { selector } => format!(
            "await {}.waitFor({{ state: 'attached', timeout: {} }});",
            locator(selector),
            timeout
        ),
        Condition::TextVisible { text } => format!(
            "await page.getByText({}).first().waitFor({{ state: 'visible', timeout: {} }});",
            js_text(text),
            timeout
        ),
        Condition::Response { url_contains } => format!(
            "await page.waitForResponse(r => r.url().includes({}), {{ timeout: {} }});",
            js_str(url_contains),
            timeout
        ),
        Condition::LoadState { state } => format!(
            "await page.waitForLoadState('{}', {{ timeout: {} }});",
            state.as_str(),
            timeout
        ),
    };
    format!("// until: {}\n{}", completion.name, wait)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::LoadState;

    fn flow(steps: Vec<UiStep>) -> UiFlow {
        UiFlow {
            name: "unit".to_string(),
            description: String::new(),
            steps,
        }
    }

    #[test]
    fn test_parse_output_collects_steps_and_captures() {
        let stdout = r#"
some page console noise
@@event {"event":"step","index":0,"name":"navigate:/","success":true,"duration_ms":120}
@@event {"event":"capture","name":"savingsAccount","value":"54321"}
@@event {"event":"step","index":1,"name":"capture:savingsAccount","success":true,"duration_ms":8}
@@event {"event":"done","success":true}
"#;
        let report = parse_output(stdout).unwrap();
        assert!(report.success);
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.captures.get("savingsAccount").map(String::as_str), Some("54321"));
        assert!(report.failed_step().is_none());
    }

    #[test]
    fn test_parse_output_failed_step() {
        let stdout = r#"@@event {"event":"step","index":0,"name":"expect-text:Transfer Complete!","success":false,"duration_ms":5003,"error":"Timed out 5000ms waiting for expect(locator).toBeVisible()"}
@@event {"event":"done","success":false,"error":"Timed out 5000ms waiting for expect(locator).toBeVisible()"}"#;
        let report = parse_output(stdout).unwrap();
        assert!(!report.success);
        let failed = report.failed_step().unwrap();
        assert_eq!(failed.step_name, "expect-text:Transfer Complete!");
        assert!(failed.error.as_deref().unwrap().contains("Timed out"));
    }

    #[test]
    fn test_parse_output_without_done_is_failure() {
        let stdout = r#"@@event {"event":"step","index":0,"name":"navigate:/","success":true,"duration_ms":1}"#;
        let report = parse_output(stdout).unwrap();
        assert!(!report.success);
        assert!(report.error.unwrap().contains("without reporting completion"));
    }

    #[test]
    fn test_literals_are_escaped() {
        let step = UiStep::Fill {
            selector: Text::lit(r#"input[name="customer.password"]"#),
            value: Text::lit("it's a \"quote\""),
        };
        let js = step_to_js(&step, 5000);
        assert_eq!(
            js,
            r#"await page.locator("input[name=\"customer.password\"]").first().fill("it's a \"quote\"");"#
        );
    }

    #[test]
    fn test_click_with_response_arms_wait_first() {
        let step = UiStep::Click {
            selector: Text::lit(r#"input[value="Open New Account"]"#),
            completion: Some(
                Completion::new(
                    "account created",
                    Condition::Response {
                        url_contains: "createAccount".to_string(),
                    },
                )
                .with_timeout(10000),
            ),
        };
        let js = step_to_js(&step, 5000);
        let wait_at = js.find("waitForResponse").unwrap();
        let click_at = js.find(".click()").unwrap();
        assert!(wait_at < click_at);
        assert!(js.contains("timeout: 10000"));
    }

    #[test]
    fn test_build_script_wraps_every_step() {
        let f = flow(vec![
            UiStep::Navigate {
                url: "/".to_string(),
                completion: Some(Completion::new(
                    "landing page loaded",
                    Condition::LoadState {
                        state: LoadState::DomContentLoaded,
                    },
                )),
            },
            UiStep::Capture {
                name: "savingsAccount".to_string(),
                selector: Text::lit("#newAccountId"),
            },
            UiStep::Assert {
                selector: Text::template(r#"#accountTable tr:has(a:text("{savingsAccount}"))"#),
                expect: Expectation::Visible,
            },
        ]);
        let config = PlaywrightConfig {
            browser: Browser::Firefox,
            ..Default::default()
        };
        let script = build_script(&config, "https://parabank.parasoft.com/", &f);

        assert!(script.contains("await firefox.launch({ headless: true })"));
        assert!(script.contains(r#"const baseUrl = "https://parabank.parasoft.com";"#));
        assert_eq!(script.matches("await step(").count(), 3);
        assert!(script.contains("// until: landing page loaded"));
        assert!(script.contains(r##"render("#accountTable tr:has(a:text(\"{savingsAccount}\"))")"##));
        assert!(script.contains("emit({ event: 'done', success: true });"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_install_check_runs_on_the_runtime() {
        // Either outcome is fine; a missing npx must map to PlaywrightNotFound
        let result = PlaywrightHandle::new(PlaywrightConfig::default(), "http://127.0.0.1").await;
        assert!(matches!(result, Ok(_) | Err(E2eError::PlaywrightNotFound)));
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("webkit".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("netscape".parse::<Browser>().is_err());
    }
}
