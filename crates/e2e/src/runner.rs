//! Scenario runner that sequences identity generation, the UI flow and API verification

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use parabank_common::{ActorIdentity, IdentityGenerator, ScenarioContext};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::{ApiConfig, ApiVerification, ApiVerifier};
use crate::error::{E2eError, E2eResult};
use crate::parabank::{build_flow, UiPhaseOutput, BILL_AMOUNT};
use crate::plan::UiFlow;
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, ScriptReport, StepResult};

/// Result of one scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub actor: ActorIdentity,
    pub ui_duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub captures: BTreeMap<String, String>,
    pub ui: Option<UiPhaseOutput>,
    pub api_duration_ms: Option<u64>,
    pub api: Option<ApiVerification>,
    pub error: Option<String>,
}

impl ScenarioReport {
    fn new(name: &str, actor: &ActorIdentity) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms: 0,
            actor: actor.clone(),
            ui_duration_ms: 0,
            steps: Vec::new(),
            captures: BTreeMap::new(),
            ui: None,
            api_duration_ms: None,
            api: None,
            error: None,
        }
    }

    fn fail(mut self, err: E2eError, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self.success = false;
        error!("✗ {} - {}", self.name, err);
        self.error = Some(err.to_string());
        self
    }

    fn pass(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self.success = true;
        info!("✓ {} ({} ms)", self.name, self.duration_ms);
        self
    }
}

/// Runs the ParaBank scenario end to end
pub struct ScenarioRunner {
    config: RunnerConfig,
}

impl ScenarioRunner {
    /// Create a new runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Generate the actor for this run, reproducibly when a seed is configured
    pub fn generate_actor(&self) -> ActorIdentity {
        match self.config.seed {
            Some(seed) => IdentityGenerator::seeded(seed).generate(),
            None => IdentityGenerator::new().generate(),
        }
    }

    /// Run the whole scenario.
    ///
    /// Failures of the scenario itself, timeouts included, are recorded in the
    /// report. Errors are returned only when Playwright could not run the script.
    pub async fn run(&self) -> E2eResult<ScenarioReport> {
        let started = Instant::now();
        let actor = self.generate_actor();
        let flow = build_flow(&actor);
        let mut report = ScenarioReport::new(&flow.name, &actor);

        info!("Running scenario '{}' as {}", flow.name, actor.username);

        if self.config.keep_script {
            self.write_script(&flow)?;
        }

        let ui_started = Instant::now();
        let script = match self.run_ui_phase(&flow).await {
            Ok(script) => script,
            Err(e @ (E2eError::PlaywrightNotFound | E2eError::Playwright(_))) => return Err(e),
            Err(e) => return Ok(report.fail(e, started)),
        };
        report.ui_duration_ms = ui_started.elapsed().as_millis() as u64;
        report.steps = script.steps.clone();
        report.captures = script.captures.clone();

        let ui = match ui_output(&actor, &script) {
            Ok(ui) => ui,
            Err(e) => return Ok(report.fail(e, started)),
        };
        let context = ui.context.clone();
        report.ui = Some(ui);

        let api_started = Instant::now();
        let verification = self.run_api_phase(&context).await;
        report.api_duration_ms = Some(api_started.elapsed().as_millis() as u64);

        match verification {
            Ok(v) => {
                report.api = Some(v);
                Ok(report.pass(started))
            }
            Err(e) => Ok(report.fail(e, started)),
        }
    }

    /// Drive the browser through the flow and return what it reported
    pub async fn run_ui_phase(&self, flow: &UiFlow) -> E2eResult<ScriptReport> {
        let playwright = PlaywrightHandle::new(self.config.playwright.clone(), &self.config.base_url).await?;
        playwright.run_flow(flow).await
    }

    /// Confirm the bill payment server-side using the UI phase's context
    pub async fn run_api_phase(&self, context: &ScenarioContext) -> E2eResult<ApiVerification> {
        info!("Verifying transactions for account {}", context.savings_account());
        let verifier = ApiVerifier::new(&self.config.base_url, self.config.api.clone())?;
        verifier.verify_bill_payment(context, BILL_AMOUNT).await
    }

    /// The script that would run for an actor, without running it
    pub fn script_for(&self, flow: &UiFlow) -> String {
        crate::playwright::build_script(&self.config.playwright, &self.config.base_url, flow)
    }

    /// Write the generated script and flow plan next to the results
    pub fn write_script(&self, flow: &UiFlow) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("scenario.js");
        std::fs::write(&path, self.script_for(flow))?;
        std::fs::write(self.config.output_dir.join("scenario-flow.yaml"), flow.to_yaml()?)?;

        info!("Script written to: {}", path.display());
        Ok(path)
    }

    /// Write the scenario report to JSON file
    pub fn write_report(&self, report: &ScenarioReport) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("scenario-report.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a finished script run into the UI phase's output
pub fn ui_output(actor: &ActorIdentity, script: &ScriptReport) -> E2eResult<UiPhaseOutput> {
    if !script.success {
        return Err(match script.failed_step() {
            Some(step) => E2eError::StepFailed {
                step: step.step_name.clone(),
                reason: step.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            },
            None => E2eError::Playwright(
                script
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
        });
    }
    UiPhaseOutput::from_captures(actor, &script.captures)
}

/// Configuration for the scenario runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Root of the site under test
    pub base_url: String,
    /// Seed for the identity generator; random when unset
    pub seed: Option<u64>,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Also write the generated script and flow plan to `output_dir`
    pub keep_script: bool,
    pub playwright: PlaywrightConfig,
    pub api: ApiConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://parabank.parasoft.com".to_string(),
            seed: None,
            output_dir: PathBuf::from("test-results"),
            keep_script: false,
            playwright: PlaywrightConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(E2eError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.playwright.expect_timeout_ms == 0 {
            return Err(E2eError::Config("expect_timeout_ms must be positive".to_string()));
        }
        if self.playwright.script_timeout_secs == 0 || self.api.request_timeout_secs == 0 {
            return Err(E2eError::Config("timeouts must be positive".to_string()));
        }
        Ok(())
    }
}
