//! ParaBank E2E Scenario Runner
//!
//! This crate provides a Rust-controlled end-to-end scenario that:
//! - Generates a fresh actor identity
//! - Drives the ParaBank UI through Playwright via a generated Node script
//! - Hands the captured account and credentials to an API verifier
//! - Confirms the bill payment server-side through the transactions API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Scenario Runner (Rust)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── generate_actor() -> ActorIdentity                    │
//! │    ├── run_ui_phase(flow) -> ScriptReport                   │
//! │    │     └── ui_output() -> UiPhaseOutput { context, .. }   │
//! │    └── run_api_phase(&context) -> ApiVerification           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  UiFlow (YAML-serializable)                                 │
//! │    └── steps: [UiStep]                                      │
//! │          ├── navigate / click { completion? }               │
//! │          ├── fill / select / select_first_other             │
//! │          ├── wait_for { completion }                        │
//! │          ├── expect_text / assert                           │
//! │          └── capture { name, selector }                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod error;
pub mod parabank;
pub mod plan;
pub mod playwright;
pub mod runner;

pub use error::{E2eError, E2eResult};
pub use plan::{UiFlow, UiStep};
pub use runner::{RunnerConfig, ScenarioReport, ScenarioRunner};
