//! Server-side verification over the banking HTTP API

use std::time::Duration;

use chrono::NaiveDate;
use parabank_common::{transaction_date, Money, ScenarioContext, TransactionRecord};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

pub const BILL_PAYMENT_DESCRIPTION: &str = "Bill Payment";

/// Configuration for the API verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Path prefix of the application under the base URL
    pub app_path: String,
    /// Client-side bound on each request
    pub request_timeout_secs: u64,
    /// Query date; today (local time) when unset
    pub transaction_date: Option<NaiveDate>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            app_path: "/parabank".to_string(),
            request_timeout_secs: 30,
            transaction_date: None,
        }
    }
}

/// Outcome of a successful verification
#[derive(Debug, Clone, Serialize)]
pub struct ApiVerification {
    pub date: String,
    pub transaction_count: usize,
    pub bill_payment: TransactionRecord,
}

/// Confirms server-side effects of the UI phase
pub struct ApiVerifier {
    client: reqwest::Client,
    base_url: String,
    config: ApiConfig,
}

impl ApiVerifier {
    pub fn new(base_url: &str, config: ApiConfig) -> E2eResult<Self> {
        // The login response sets the session cookie the query relies on
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                config.app_path.trim_end_matches('/')
            ),
            config,
        })
    }

    fn login_url(&self) -> String {
        format!("{}/login.htm", self.base_url)
    }

    fn transactions_url(&self, ctx: &ScenarioContext, date: &str) -> String {
        format!(
            "{}/services_proxy/bank/accounts/{}/transactions/onDate/{}",
            self.base_url,
            ctx.savings_account(),
            date
        )
    }

    /// Establish a session with the actor's credentials
    pub async fn login(&self, ctx: &ScenarioContext) -> E2eResult<()> {
        let url = self.login_url();
        info!("Logging in as {} via API", ctx.username());

        let resp = self
            .client
            .post(&url)
            .form(&[("username", ctx.username()), ("password", ctx.password())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(E2eError::HttpStatus {
                endpoint: url,
                status: status.as_u16(),
            });
        }
        debug!("Login returned {}", status);
        Ok(())
    }

    /// Fetch the raw transactions payload for the context's account on `date`
    pub async fn transactions_on(&self, ctx: &ScenarioContext, date: &str) -> E2eResult<String> {
        let url = self.transactions_url(ctx, date);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(E2eError::HttpStatus {
                endpoint: url,
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }

    /// Log in, query today's transactions and locate the bill payment
    pub async fn verify_bill_payment(
        &self,
        ctx: &ScenarioContext,
        amount: Money,
    ) -> E2eResult<ApiVerification> {
        let date = transaction_date(
            self.config
                .transaction_date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
        );

        self.login(ctx).await?;
        let body = self.transactions_on(ctx, &date).await?;
        let transactions = parse_transactions(&body)?;
        let bill_payment = find_bill_payment(ctx, &transactions, amount)?;

        info!(
            account = %ctx.savings_account(),
            date = %date,
            "Found bill payment transaction"
        );

        Ok(ApiVerification {
            date,
            transaction_count: transactions.len(),
            bill_payment,
        })
    }
}

/// A transaction with the JSON text it was parsed from, kept for diagnostics
#[derive(Debug, Clone)]
pub struct ReturnedTransaction {
    pub raw: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub record: TransactionRecord,
}

/// Parse a transactions payload, requiring a defined, non-empty sequence
pub fn parse_transactions(body: &str) -> E2eResult<Vec<ReturnedTransaction>> {
    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| E2eError::DataShape(format!("response is not JSON: {}", e)))?;

    match &payload {
        serde_json::Value::Null => {
            return Err(E2eError::DataShape("response payload is null".to_string()))
        }
        serde_json::Value::Array(items) if items.is_empty() => {
            return Err(E2eError::AssertionFailed {
                what: "transactions for the day".to_string(),
                expected: "at least one".to_string(),
                actual: "0".to_string(),
            })
        }
        serde_json::Value::Array(_) => {}
        other => {
            return Err(E2eError::DataShape(format!(
                "expected a list of transactions, got {}",
                kind_of(other)
            )))
        }
    }

    let entries: Vec<Box<RawValue>> = serde_json::from_str(body)?;
    entries
        .into_iter()
        .map(|entry| -> E2eResult<ReturnedTransaction> {
            let raw = entry.get().to_string();
            let fields = match serde_json::from_str::<serde_json::Value>(&raw)? {
                serde_json::Value::Object(map) => map,
                other => {
                    return Err(E2eError::DataShape(format!(
                        "transaction entry is {}, not an object",
                        kind_of(&other)
                    )))
                }
            };
            let record = TransactionRecord::from_json(&raw)?;
            Ok(ReturnedTransaction {
                raw,
                fields,
                record,
            })
        })
        .collect()
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Locate the single bill payment of `amount` and check its fields.
///
/// When nothing matches, every returned entry is logged before failing.
pub fn find_bill_payment(
    ctx: &ScenarioContext,
    transactions: &[ReturnedTransaction],
    amount: Money,
) -> E2eResult<TransactionRecord> {
    let matches: Vec<&ReturnedTransaction> = transactions
        .iter()
        .filter(|t| {
            t.record.description_contains(BILL_PAYMENT_DESCRIPTION)
                && t.record.amount_value() == Some(amount.as_f64())
        })
        .collect();

    let found = match matches.as_slice() {
        [found] => *found,
        [] => {
            warn!(
                "No bill payment of {} among {} transaction(s); returned entries:",
                amount,
                transactions.len()
            );
            for t in transactions {
                warn!("  {}", t.raw);
            }
            return Err(E2eError::BillPaymentNotFound {
                account: ctx.savings_account().to_string(),
                amount: amount.plain(),
                count: transactions.len(),
            });
        }
        several => {
            for t in several {
                warn!("  duplicate bill payment: {}", t.raw);
            }
            return Err(E2eError::AssertionFailed {
                what: "bill payment entries".to_string(),
                expected: "1".to_string(),
                actual: several.len().to_string(),
            });
        }
    };

    if !found.fields.contains_key("date") {
        return Err(E2eError::AssertionFailed {
            what: "bill payment date field".to_string(),
            expected: "present".to_string(),
            actual: "missing".to_string(),
        });
    }

    let description = found.record.description.clone().unwrap_or_default();
    if !description.contains(BILL_PAYMENT_DESCRIPTION) {
        return Err(E2eError::AssertionFailed {
            what: "bill payment description".to_string(),
            expected: format!("containing {:?}", BILL_PAYMENT_DESCRIPTION),
            actual: format!("{:?}", description),
        });
    }

    let amount_text = found.record.amount_text().unwrap_or_default();
    if amount_text != amount.plain() {
        return Err(E2eError::AssertionFailed {
            what: "bill payment amount".to_string(),
            expected: format!("{:?}", amount.plain()),
            actual: format!("{:?}", amount_text),
        });
    }

    debug!("Bill payment transaction: {}", found.raw);
    Ok(found.record.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parabank_common::AccountId;
    use std::sync::{Arc, Mutex};
    use test_case::test_case;

    /// Collects formatted log output for assertions
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn ctx() -> ScenarioContext {
        ScenarioContext::new(AccountId::parse("54321").unwrap(), "12345678_river", "pw")
    }

    const BILL: Money = Money::from_cents(25_00);

    #[test]
    fn test_finds_bill_payment() {
        let body = r#"[
            {"id":1,"accountId":54321,"type":"Debit","date":1760486400000,"amount":50.00,"description":"Funds Transfer Sent"},
            {"id":2,"accountId":54321,"type":"Debit","date":1760486400000,"amount":25.00,"description":"Bill Payment to Test Payee"}
        ]"#;
        let transactions = parse_transactions(body).unwrap();
        assert_eq!(transactions.len(), 2);
        let found = find_bill_payment(&ctx(), &transactions, BILL).unwrap();
        assert_eq!(found.amount_text().as_deref(), Some("25.00"));
    }

    #[test]
    fn test_missing_bill_payment_fails() {
        let body = r#"[{"date":1760486400000,"amount":50.00,"description":"Funds Transfer Sent"}]"#;
        let transactions = parse_transactions(body).unwrap();
        let err = find_bill_payment(&ctx(), &transactions, BILL).unwrap_err();
        assert!(matches!(err, E2eError::BillPaymentNotFound { count: 1, .. }));
    }

    #[test]
    fn test_missing_bill_payment_logs_every_entry() {
        let body = r#"[
            {"id":7,"date":1760486400000,"amount":100.00,"description":"Funds Transfer Received"},
            {"id":8,"date":1760486400000,"amount":50.00,"description":"Funds Transfer Sent"}
        ]"#;
        let transactions = parse_transactions(body).unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let err = tracing::subscriber::with_default(subscriber, || {
            find_bill_payment(&ctx(), &transactions, BILL).unwrap_err()
        });
        assert!(matches!(err, E2eError::BillPaymentNotFound { count: 2, .. }));

        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("No bill payment of $25.00 among 2"));
        for t in &transactions {
            assert!(output.contains(&t.raw), "entry not logged: {}", t.raw);
        }
    }

    #[test]
    fn test_duplicate_bill_payments_fail() {
        let body = r#"[
            {"id":1,"date":1760486400000,"amount":25.00,"description":"Bill Payment to Test Payee"},
            {"id":2,"date":1760486400000,"amount":25.00,"description":"Bill Payment to Test Payee"}
        ]"#;
        let transactions = parse_transactions(body).unwrap();
        match find_bill_payment(&ctx(), &transactions, BILL).unwrap_err() {
            E2eError::AssertionFailed {
                what,
                expected,
                actual,
            } => {
                assert_eq!(what, "bill payment entries");
                assert_eq!(expected, "1");
                assert_eq!(actual, "2");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_amount_must_read_exactly() {
        // Numerically equal but not the literal "25.00"
        let body = r#"[{"date":1760486400000,"amount":25.0,"description":"Bill Payment to Test Payee"}]"#;
        let transactions = parse_transactions(body).unwrap();
        let err = find_bill_payment(&ctx(), &transactions, BILL).unwrap_err();
        match err {
            E2eError::AssertionFailed { what, actual, .. } => {
                assert_eq!(what, "bill payment amount");
                assert_eq!(actual, "\"25.0\"");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_date_field_required() {
        let body = r#"[{"amount":"25.00","description":"Bill Payment to Test Payee"}]"#;
        let transactions = parse_transactions(body).unwrap();
        let err = find_bill_payment(&ctx(), &transactions, BILL).unwrap_err();
        assert!(err.to_string().contains("date"));
    }

    #[test_case("null" ; "null")]
    #[test_case(r#"{"error":"not found"}"# ; "object")]
    #[test_case("<html>" ; "not json")]
    #[test_case("[1, 2]" ; "non-object entries")]
    fn test_malformed_payload_is_data_shape(body: &str) {
        assert!(matches!(
            parse_transactions(body),
            Err(E2eError::DataShape(_))
        ));
    }

    #[test]
    fn test_empty_day_is_assertion_failure() {
        assert!(matches!(
            parse_transactions("[]"),
            Err(E2eError::AssertionFailed { .. })
        ));
    }
}
