use parabank_common::IdentityGenerator;
use parabank_e2e::parabank::{build_flow, captures, MENU_ITEMS};
use parabank_e2e::plan::{Condition, UiStep};
use parabank_e2e::playwright::{build_script, PlaywrightConfig};
use parabank_e2e::UiFlow;

/// Flow Plan Survives a YAML Round Trip
///
/// The dumped plan is what `--dump-flow` prints; loading it back must yield
/// the same steps so the dump shows exactly what the script will run.
#[test]
fn dumped_flow_loads_back() {
    let actor = IdentityGenerator::seeded(11).generate();
    let flow = build_flow(&actor);

    let yaml = flow.to_yaml().expect("serialize flow");
    let loaded = UiFlow::from_yaml(&yaml).expect("parse dumped flow");

    assert_eq!(loaded.name, flow.name);
    assert_eq!(loaded.steps.len(), flow.steps.len());
    assert_eq!(loaded.capture_names(), flow.capture_names());
}

/// Every wait in the flow has a name and none relies on network idle
#[test]
fn waits_are_named_conditions() {
    let flow = build_flow(&IdentityGenerator::seeded(4).generate());

    for step in &flow.steps {
        let completion = match step {
            UiStep::WaitFor { completion } => Some(completion),
            UiStep::Click { completion, .. } | UiStep::Navigate { completion, .. } => {
                completion.as_ref()
            }
            _ => None,
        };
        if let Some(c) = completion {
            assert!(!c.name.is_empty(), "unnamed completion in {}", step.name());
            assert!(
                !matches!(c.condition, Condition::LoadState { .. }),
                "{} waits on a load state",
                step.name()
            );
        }
    }
}

#[test]
fn transfer_destination_is_chosen_after_account_is_captured() {
    let flow = build_flow(&IdentityGenerator::seeded(4).generate());

    let capture_at = flow
        .steps
        .iter()
        .position(|s| s.captures() == Some(captures::SAVINGS_ACCOUNT))
        .expect("savings account captured");
    let select_at = flow
        .steps
        .iter()
        .position(|s| matches!(s, UiStep::SelectFirstOther { .. }))
        .expect("destination selected");
    assert!(capture_at < select_at);
}

#[test]
fn generated_script_covers_the_scenario() {
    let actor = IdentityGenerator::seeded(21).generate();
    let flow = build_flow(&actor);
    let script = build_script(&PlaywrightConfig::default(), "https://parabank.parasoft.com", &flow);

    assert_eq!(script.matches("await step(").count(), flow.steps.len());
    assert!(script.contains(&actor.username));
    for item in MENU_ITEMS {
        assert!(script.contains(item), "script lacks menu item {}", item);
    }
    assert!(script.contains("selectOption({ label: \"SAVINGS\" })"));
    assert!(script.contains("waitForResponse"));
    assert!(script.contains("fill(\"1234567890\")"));
    assert!(script.contains("no option in "));
}
