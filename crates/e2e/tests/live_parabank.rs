use std::process::Command;

use parabank_e2e::{RunnerConfig, ScenarioRunner};

fn in_path(bin: &str) -> bool {
    Command::new("sh")
        .arg("-lc")
        .arg(format!("command -v {bin} >/dev/null 2>&1"))
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Full Scenario Against the Public Demo Site
///
/// Registers a fresh customer, opens a savings account, transfers $50,
/// pays a $25 bill, then confirms the bill payment through the API.
///
/// Marked ignored because it needs Node, Playwright browsers and network access.
#[tokio::test]
#[ignore]
async fn parabank_scenario_passes_end_to_end() {
    if !in_path("node") || !in_path("npx") {
        eprintln!("Skipping: node/npx not available in PATH");
        return;
    }

    let output = tempfile::tempdir().expect("create output dir");
    let runner = ScenarioRunner::with_config(RunnerConfig {
        output_dir: output.path().to_path_buf(),
        keep_script: true,
        ..Default::default()
    });

    let report = runner.run().await.expect("playwright tooling available");
    runner.write_report(&report).expect("write report");

    assert!(report.success, "scenario failed: {:?}", report.error);

    let ui = report.ui.as_ref().expect("ui phase output");
    assert!(ui.context.savings_account().as_str().bytes().all(|b| b.is_ascii_digit()));
    assert_eq!(ui.opened.balance.to_string(), "$100.00");
    assert_eq!(ui.opened.available.to_string(), "$100.00");
    assert_eq!(ui.balance_after_transfer.to_string(), "$50.00");
    assert_ne!(ui.transfer.destination(), ui.transfer.source());

    let api = report.api.as_ref().expect("api verification");
    assert!(api.transaction_count > 0);
    assert_eq!(api.bill_payment.amount_text().as_deref(), Some("25.00"));
}
