//! Core types shared by the UI and API phases of a scenario

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::identity::ActorIdentity;

/// Server-assigned account identifier. Always non-empty ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Validate and wrap a raw identifier as read from the page
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAccountId(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

/// Fixed-point currency amount in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn checked_sub(self, other: Money) -> Result<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| Error::AmountOverflow(format!("{} - {}", self, other)))
    }

    /// Render without currency sign, e.g. `25.00`
    pub fn plain(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }

    /// Approximate value as a float, for comparing against JSON numbers
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        if self.0 < 0 {
            write!(f, "-${}.{:02}", abs / 100, abs % 100)
        } else {
            write!(f, "${}.{:02}", abs / 100, abs % 100)
        }
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Accepts `$100.00`, `-$25.00`, `$-25.00`, `25.00`, `50` and `$1,000.50`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAmount(s.to_string());
        let raw = s.trim();

        let (mut negative, rest) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        let rest = match rest.strip_prefix('-') {
            Some(_) if negative => return Err(invalid()),
            Some(rest) => {
                negative = true;
                rest
            }
            None => rest,
        };

        let digits: String = rest.chars().filter(|c| *c != ',').collect();
        let (whole, frac) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .ok_or_else(invalid)?;
        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl TryFrom<String> for Money {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(m: Money) -> Self {
        m.to_string()
    }
}

/// An account row as observed on the accounts overview page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub balance: Money,
    pub available: Money,
}

/// Funds moved between two accounts owned by the same actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstruction {
    source: AccountId,
    destination: AccountId,
    amount: Money,
}

impl TransferInstruction {
    pub fn new(source: AccountId, destination: AccountId, amount: Money) -> Result<Self> {
        if source == destination {
            return Err(Error::SameAccountTransfer(source.to_string()));
        }
        Ok(Self {
            source,
            destination,
            amount,
        })
    }

    pub fn source(&self) -> &AccountId {
        &self.source
    }

    pub fn destination(&self) -> &AccountId {
        &self.destination
    }

    pub fn amount(&self) -> Money {
        self.amount
    }
}

/// Payee contact details for a bill payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payee {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone: String,
    pub account_number: String,
}

/// A bill payment to submit through the bill pay form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPayment {
    pub payee: Payee,
    pub amount: Money,
}

impl BillPayment {
    /// Build a payment whose payee reuses the actor's address and phone
    pub fn for_actor(
        actor: &ActorIdentity,
        payee_name: &str,
        account_number: &str,
        amount: Money,
    ) -> Self {
        Self {
            payee: Payee {
                name: payee_name.to_string(),
                street: actor.street.clone(),
                city: actor.city.clone(),
                state: actor.state.clone(),
                zip_code: actor.zip_code.clone(),
                phone: actor.phone.clone(),
                account_number: account_number.to_string(),
            },
            amount,
        }
    }
}

/// Values produced by the UI phase and consumed by the API phase.
///
/// Built once when the UI phase completes and handed to the API phase by
/// reference; there are no setters.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioContext {
    savings_account: AccountId,
    username: String,
    #[serde(skip_serializing)]
    password: String,
}

impl ScenarioContext {
    pub fn new(savings_account: AccountId, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            savings_account,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Context for an actor whose savings account has been opened
    pub fn for_actor(actor: &ActorIdentity, savings_account: AccountId) -> Self {
        Self::new(savings_account, actor.username.clone(), actor.password.clone())
    }

    pub fn savings_account(&self) -> &AccountId {
        &self.savings_account
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// A transaction as returned by the banking API.
///
/// The amount is kept as raw JSON so its exact text survives (`25.00` and
/// `25.0` are different to the bill-payment check).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub date: Option<serde_json::Value>,
    #[serde(default)]
    pub amount: Option<Box<RawValue>>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TransactionRecord {
    /// Parse a single transaction object from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The amount exactly as written in the payload, without quotes for strings
    pub fn amount_text(&self) -> Option<String> {
        let raw = self.amount.as_ref()?.get();
        if raw.starts_with('"') {
            serde_json::from_str::<String>(raw).ok()
        } else {
            Some(raw.to_string())
        }
    }

    /// Numeric amount, accepting both JSON numbers and numeric strings
    pub fn amount_value(&self) -> Option<f64> {
        self.amount_text()?.trim().parse().ok()
    }

    pub fn description_contains(&self, needle: &str) -> bool {
        self.description
            .as_deref()
            .map(|d| d.contains(needle))
            .unwrap_or(false)
    }
}

/// Format a date the way the transactions-by-date endpoint expects (`MM-DD-YYYY`)
pub fn transaction_date(date: chrono::NaiveDate) -> String {
    date.format("%m-%d-%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("54321", true ; "digits")]
    #[test_case(" 13344\n", true ; "surrounding whitespace")]
    #[test_case("", false ; "empty")]
    #[test_case("12a45", false ; "letter")]
    #[test_case("-123", false ; "sign")]
    fn test_account_id_parse(raw: &str, ok: bool) {
        assert_eq!(AccountId::parse(raw).is_ok(), ok);
    }

    #[test_case("$100.00", 10000 ; "currency")]
    #[test_case("25.00", 2500 ; "plain")]
    #[test_case("50", 5000 ; "whole")]
    #[test_case("-$25.00", -2500 ; "negative before sign")]
    #[test_case("$-25.00", -2500 ; "negative after sign")]
    #[test_case("$1,000.5", 100050 ; "thousands and one decimal")]
    fn test_money_parse(raw: &str, cents: i64) {
        assert_eq!(raw.parse::<Money>().unwrap(), Money::from_cents(cents));
    }

    #[test_case("" ; "empty")]
    #[test_case("$" ; "sign only")]
    #[test_case("1.234" ; "three decimals")]
    #[test_case("--5" ; "double negative")]
    #[test_case("abc" ; "letters")]
    fn test_money_parse_rejects(raw: &str) {
        assert!(raw.parse::<Money>().is_err());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(5000).to_string(), "$50.00");
        assert_eq!(Money::from_cents(-2500).to_string(), "-$25.00");
        assert_eq!(Money::from_cents(2500).plain(), "25.00");
        assert_eq!(Money::from_cents(7).plain(), "0.07");
    }

    #[test]
    fn test_transfer_balance_arithmetic() {
        let opening: Money = "$100.00".parse().unwrap();
        let transfer: Money = "50".parse().unwrap();
        assert_eq!(opening.checked_sub(transfer).unwrap().to_string(), "$50.00");
    }

    #[test]
    fn test_transfer_rejects_same_account() {
        let a = AccountId::parse("54321").unwrap();
        let err = TransferInstruction::new(a.clone(), a, Money::from_cents(5000)).unwrap_err();
        assert!(matches!(err, Error::SameAccountTransfer(_)));
    }

    #[test]
    fn test_transaction_amount_text() {
        let record = TransactionRecord::from_json(
            r#"{"id":1,"date":1700000000000,"amount":25.00,"description":"Bill Payment to Test Payee"}"#,
        )
        .unwrap();
        assert_eq!(record.amount_text().as_deref(), Some("25.00"));
        assert_eq!(record.amount_value(), Some(25.0));
        assert!(record.description_contains("Bill Payment"));

        let record = TransactionRecord::from_json(r#"{"amount":"25.00"}"#).unwrap();
        assert_eq!(record.amount_text().as_deref(), Some("25.00"));
        assert!(record.date.is_none());
    }

    #[test]
    fn test_context_does_not_serialize_password() {
        let ctx = ScenarioContext::new(AccountId::parse("54321").unwrap(), "12345678_river", "s3cret");
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("12345678_river"));
        assert!(!json.contains("s3cret"));
        assert_eq!(ctx.password(), "s3cret");
    }

    #[test]
    fn test_transaction_date_format() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(transaction_date(date), "03-07-2026");
    }
}
