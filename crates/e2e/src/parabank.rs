//! The ParaBank scenario: registration, savings account, transfer, bill pay
//!
//! [`build_flow`] turns an actor into the UI plan. [`UiPhaseOutput::from_captures`]
//! turns what the browser captured back into typed values, re-checking the
//! balances the page showed.

use std::collections::BTreeMap;

use parabank_common::{
    AccountId, AccountRecord, ActorIdentity, BillPayment, Money, ScenarioContext,
    TransferInstruction,
};
use serde::Serialize;
use tracing::info;

use crate::error::{E2eError, E2eResult};
use crate::plan::{Completion, Condition, Expectation, SelectBy, Text, UiFlow, UiStep};

pub const OPENING_DEPOSIT: Money = Money::from_cents(100_00);
pub const TRANSFER_AMOUNT: Money = Money::from_cents(50_00);
pub const BILL_AMOUNT: Money = Money::from_cents(25_00);
pub const PAYEE_NAME: &str = "Test Payee";
pub const PAYEE_ACCOUNT: &str = "1234567890";
pub const ACCOUNT_TYPE: &str = "SAVINGS";

/// Navigation affordances shown to a logged-in customer
pub const MENU_ITEMS: [&str; 8] = [
    "Open New Account",
    "Accounts Overview",
    "Transfer Funds",
    "Bill Pay",
    "Find Transactions",
    "Update Contact Info",
    "Request Loan",
    "Log Out",
];

pub const REGISTRATION_CONFIRMATION: &str =
    "Your account was created successfully. You are now logged in.";
pub const ACCOUNT_OPENED: &str = "Congratulations, your account is now open.";
pub const TRANSFER_COMPLETE: &str = "Transfer Complete!";
pub const BILL_PAYMENT_COMPLETE: &str = "Bill Payment Complete";

/// Names of values the flow captures
pub mod captures {
    pub const SAVINGS_ACCOUNT: &str = "savingsAccount";
    pub const OPENING_BALANCE: &str = "openingBalance";
    pub const OPENING_AVAILABLE: &str = "openingAvailable";
    pub const TRANSFER_DESTINATION: &str = "transferDestination";
    pub const BALANCE_AFTER_TRANSFER: &str = "balanceAfterTransfer";
}

const ACCOUNT_ROW: &str = r#"#accountTable tr:has(a:text("{savingsAccount}"))"#;

/// Builds the ParaBank UI flow step by step
struct FlowBuilder {
    steps: Vec<UiStep>,
}

impl FlowBuilder {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn push(&mut self, step: UiStep) -> &mut Self {
        self.steps.push(step);
        self
    }

    fn click_until(&mut self, selector: &str, completion: Completion) -> &mut Self {
        self.push(UiStep::Click {
            selector: Text::lit(selector),
            completion: Some(completion),
        })
    }

    fn fill(&mut self, field: &str, value: impl Into<Text>) -> &mut Self {
        self.push(UiStep::Fill {
            selector: Text::lit(format!(r#"input[name="{}"]"#, field)),
            value: value.into(),
        })
    }

    fn expect_text(&mut self, text: impl Into<Text>) -> &mut Self {
        self.push(UiStep::ExpectText { text: text.into() })
    }

    fn wait_attached(&mut self, name: &str, selector: Text) -> &mut Self {
        self.push(UiStep::WaitFor {
            completion: Completion::new(name, Condition::Attached { selector }),
        })
    }

    fn open_overview(&mut self) -> &mut Self {
        self.click_until(
            "text=Accounts Overview",
            Completion::new(
                "accounts table rendered",
                Condition::Visible {
                    selector: Text::lit("#accountTable"),
                },
            ),
        )
        .push(UiStep::Assert {
            selector: Text::template(ACCOUNT_ROW),
            expect: Expectation::Visible,
        })
    }

    /// Balance cell (`column` 1) or available cell (`column` 2) of the new account's row
    fn account_cell(column: usize) -> Text {
        Text::template(format!("{} >> td >> nth={}", ACCOUNT_ROW, column))
    }

    fn build(self, name: &str, description: &str) -> UiFlow {
        UiFlow {
            name: name.to_string(),
            description: description.to_string(),
            steps: self.steps,
        }
    }
}

/// The full UI flow for one actor
pub fn build_flow(actor: &ActorIdentity) -> UiFlow {
    let bill = BillPayment::for_actor(actor, PAYEE_NAME, PAYEE_ACCOUNT, BILL_AMOUNT);
    let mut b = FlowBuilder::new();

    // Landing page
    b.push(UiStep::Navigate {
        url: "/".to_string(),
        completion: Some(Completion::new(
            "register link visible",
            Condition::Visible {
                selector: Text::lit("text=Register"),
            },
        )),
    });

    // Registration
    b.click_until(
        "text=Register",
        Completion::new(
            "registration form rendered",
            Condition::Visible {
                selector: Text::lit(r#"input[name="customer.firstName"]"#),
            },
        ),
    )
    .fill("customer.firstName", actor.first_name.as_str())
    .fill("customer.lastName", actor.last_name.as_str())
    .fill("customer.address.street", actor.street.as_str())
    .fill("customer.address.city", actor.city.as_str())
    .fill("customer.address.state", actor.state.as_str())
    .fill("customer.address.zipCode", actor.zip_code.as_str())
    .fill("customer.phoneNumber", actor.phone.as_str())
    .fill("customer.ssn", actor.ssn.as_str())
    .fill("customer.username", actor.username.as_str())
    .fill("customer.password", actor.password.as_str())
    .fill("repeatedPassword", actor.password.as_str())
    .click_until(
        r#"input[value="Register"]"#,
        Completion::new(
            "registration confirmed",
            Condition::TextVisible {
                text: Text::lit(REGISTRATION_CONFIRMATION),
            },
        ),
    )
    .expect_text(format!("Welcome {}", actor.username))
    .push(UiStep::Assert {
        selector: Text::lit("ul.button"),
        expect: Expectation::Visible,
    });
    for item in MENU_ITEMS {
        b.push(UiStep::Assert {
            selector: Text::lit(format!("text={}", item)),
            expect: Expectation::Visible,
        });
    }

    // Savings account
    b.click_until(
        "text=Open New Account",
        Completion::new(
            "account type selector rendered",
            Condition::Visible {
                selector: Text::lit("#type"),
            },
        ),
    )
    .push(UiStep::Select {
        selector: Text::lit("#type"),
        by: SelectBy::Label,
        option: Text::lit(ACCOUNT_TYPE),
    })
    .wait_attached("funding accounts loaded", Text::lit("#fromAccountId option"))
    .click_until(
        r#"input[value="Open New Account"]"#,
        Completion::new(
            "account creation response",
            Condition::Response {
                url_contains: "createAccount".to_string(),
            },
        ),
    )
    .expect_text(ACCOUNT_OPENED)
    .push(UiStep::WaitFor {
        completion: Completion::new(
            "new account id rendered",
            Condition::Visible {
                selector: Text::lit("#newAccountId"),
            },
        ),
    })
    .push(UiStep::Capture {
        name: captures::SAVINGS_ACCOUNT.to_string(),
        selector: Text::lit("#newAccountId"),
    })
    .push(UiStep::Assert {
        selector: Text::lit("#newAccountId"),
        expect: Expectation::Matches {
            pattern: r"^\d+$".to_string(),
        },
    });

    // Opening balance
    b.open_overview();
    for (column, name) in [
        (1, captures::OPENING_BALANCE),
        (2, captures::OPENING_AVAILABLE),
    ] {
        b.push(UiStep::Assert {
            selector: FlowBuilder::account_cell(column),
            expect: Expectation::Text {
                value: Text::lit(OPENING_DEPOSIT.to_string()),
            },
        })
        .push(UiStep::Capture {
            name: name.to_string(),
            selector: FlowBuilder::account_cell(column),
        });
    }

    // Transfer
    b.click_until(
        "text=Transfer Funds",
        Completion::new(
            "transfer form rendered",
            Condition::Visible {
                selector: Text::lit("input#amount"),
            },
        ),
    )
    .wait_attached(
        "source account listed",
        Text::template(r#"select#fromAccountId option[value="{savingsAccount}"]"#),
    )
    .push(UiStep::Fill {
        selector: Text::lit("input#amount"),
        value: Text::lit(TRANSFER_AMOUNT.plain().trim_end_matches(".00")),
    })
    .push(UiStep::Select {
        selector: Text::lit("select#fromAccountId"),
        by: SelectBy::Value,
        option: Text::var(captures::SAVINGS_ACCOUNT),
    })
    .push(UiStep::SelectFirstOther {
        selector: Text::lit("select#toAccountId"),
        excluding: Text::var(captures::SAVINGS_ACCOUNT),
        capture: captures::TRANSFER_DESTINATION.to_string(),
    })
    .click_until(
        r#"input[value="Transfer"]"#,
        Completion::new(
            "transfer confirmed",
            Condition::TextVisible {
                text: Text::lit(TRANSFER_COMPLETE),
            },
        ),
    )
    .expect_text(Text::template(format!(
        "{} has been transferred from account #{{savingsAccount}} to account #{{transferDestination}}",
        TRANSFER_AMOUNT
    )));

    // Balance after transfer
    let remaining = Money::from_cents(OPENING_DEPOSIT.cents() - TRANSFER_AMOUNT.cents());
    b.open_overview()
        .push(UiStep::Assert {
            selector: FlowBuilder::account_cell(1),
            expect: Expectation::Text {
                value: Text::lit(remaining.to_string()),
            },
        })
        .push(UiStep::Capture {
            name: captures::BALANCE_AFTER_TRANSFER.to_string(),
            selector: FlowBuilder::account_cell(1),
        });

    // Bill pay
    b.click_until(
        "text=Bill Pay",
        Completion::new(
            "bill pay form rendered",
            Condition::Visible {
                selector: Text::lit(r#"input[name="payee.name"]"#),
            },
        ),
    )
    .fill("payee.name", bill.payee.name.as_str())
    .fill("payee.address.street", bill.payee.street.as_str())
    .fill("payee.address.city", bill.payee.city.as_str())
    .fill("payee.address.state", bill.payee.state.as_str())
    .fill("payee.address.zipCode", bill.payee.zip_code.as_str())
    .fill("payee.phoneNumber", bill.payee.phone.as_str())
    .fill("payee.accountNumber", bill.payee.account_number.as_str())
    .fill("verifyAccount", bill.payee.account_number.as_str())
    .fill("amount", bill.amount.plain())
    .wait_attached(
        "bill pay source account listed",
        Text::template(r#"select[name="fromAccountId"] option[value="{savingsAccount}"]"#),
    )
    .push(UiStep::Select {
        selector: Text::lit(r#"select[name="fromAccountId"]"#),
        by: SelectBy::Value,
        option: Text::var(captures::SAVINGS_ACCOUNT),
    })
    .click_until(
        r#"input[value="Send Payment"]"#,
        Completion::new(
            "payment confirmed",
            Condition::TextVisible {
                text: Text::lit(BILL_PAYMENT_COMPLETE),
            },
        ),
    )
    .expect_text(Text::template(format!(
        "Bill Payment to {} in the amount of {} from account {{savingsAccount}}",
        bill.payee.name, bill.amount
    )));

    b.build(
        "parabank-register-transfer-billpay",
        "Register a fresh customer, open a savings account, transfer funds and pay a bill",
    )
}

/// What the UI phase hands to the rest of the scenario
#[derive(Debug, Clone, Serialize)]
pub struct UiPhaseOutput {
    pub context: ScenarioContext,
    pub opened: AccountRecord,
    pub transfer: TransferInstruction,
    pub balance_after_transfer: Money,
    pub bill_payment: BillPayment,
}

impl UiPhaseOutput {
    /// Rebuild typed values from the flow's captures and re-check balances
    pub fn from_captures(
        actor: &ActorIdentity,
        captured: &BTreeMap<String, String>,
    ) -> E2eResult<Self> {
        let get = |name: &str| {
            captured
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| E2eError::MissingCapture(name.to_string()))
        };

        let account = AccountId::parse(get(captures::SAVINGS_ACCOUNT)?)?;
        let opened = AccountRecord {
            id: account.clone(),
            balance: get(captures::OPENING_BALANCE)?.parse()?,
            available: get(captures::OPENING_AVAILABLE)?.parse()?,
        };
        expect_money("opening balance", OPENING_DEPOSIT, opened.balance)?;
        expect_money("opening available balance", OPENING_DEPOSIT, opened.available)?;

        let destination = AccountId::parse(get(captures::TRANSFER_DESTINATION)?)?;
        let transfer = TransferInstruction::new(account.clone(), destination, TRANSFER_AMOUNT)?;

        let balance_after_transfer: Money = get(captures::BALANCE_AFTER_TRANSFER)?.parse()?;
        let expected = opened.balance.checked_sub(transfer.amount())?;
        expect_money("balance after transfer", expected, balance_after_transfer)?;

        info!(
            account = %account,
            destination = %transfer.destination(),
            "UI phase complete"
        );

        Ok(Self {
            context: ScenarioContext::for_actor(actor, account),
            opened,
            transfer,
            balance_after_transfer,
            bill_payment: BillPayment::for_actor(actor, PAYEE_NAME, PAYEE_ACCOUNT, BILL_AMOUNT),
        })
    }
}

fn expect_money(what: &str, expected: Money, actual: Money) -> E2eResult<()> {
    if expected != actual {
        return Err(E2eError::AssertionFailed {
            what: what.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}
