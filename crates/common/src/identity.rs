//! Randomized actor identities
//!
//! Every scenario registers a fresh user. The username combines eight random
//! digits with a random word so repeated runs against a shared demo site do
//! not collide with accounts created earlier.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Serialize, Serializer};
use tracing::debug;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bruno", "Carmen", "Dmitri", "Elena", "Farid", "Grace", "Hiro", "Ines", "Jonas",
    "Keiko", "Liam", "Maya", "Nikolai", "Olivia", "Pablo", "Quinn", "Rosa", "Sven", "Tara",
];

const LAST_NAMES: &[&str] = &[
    "Abbott", "Barros", "Chen", "Dubois", "Eriksen", "Fischer", "Garcia", "Haddad", "Ivanova",
    "Jensen", "Kowalski", "Lindqvist", "Moreau", "Nakamura", "Okafor", "Petrov", "Rossi",
    "Schmidt", "Tanaka", "Walsh",
];

const STREET_NAMES: &[&str] = &[
    "Maple", "Oak", "Cedar", "Elm", "Willow", "Birch", "Harbor", "Hillcrest", "Lakeview",
    "Meadow", "Orchard", "Ridge", "Sunset", "Valley",
];

const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Lane", "Drive", "Court", "Way"];

const CITIES: &[&str] = &[
    "Springfield", "Riverton", "Fairview", "Georgetown", "Madison", "Clinton", "Ashland",
    "Franklin", "Greenville", "Salem", "Bristol", "Dover",
];

const STATES: &[&str] = &[
    "Alabama", "Colorado", "Delaware", "Florida", "Georgia", "Idaho", "Kansas", "Maine",
    "Nevada", "Ohio", "Oregon", "Texas", "Utah", "Vermont",
];

const WORDS: &[&str] = &[
    "river", "lantern", "harbor", "meadow", "pebble", "canyon", "ember", "falcon", "glacier",
    "island", "juniper", "kettle", "lagoon", "marble", "nectar", "orbit", "prairie", "quartz",
    "summit", "thicket", "velvet", "willow", "zephyr",
];

const PASSWORD_LEN: usize = 15;

/// A synthetic user registered at the start of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorIdentity {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone: String,
    pub ssn: String,
    pub username: String,
    #[serde(serialize_with = "redact")]
    pub password: String,
}

fn redact<S: Serializer>(_: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("********")
}

/// Produces actor identities from a seedable RNG
pub struct IdentityGenerator {
    rng: StdRng,
}

impl IdentityGenerator {
    /// Generator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self) -> ActorIdentity {
        let username = format!("{}_{}", self.digits(8), self.word());
        let street = format!(
            "{} {} {}",
            self.rng.gen_range(1..=9999),
            self.pick(STREET_NAMES),
            self.pick(STREET_SUFFIXES)
        );
        let phone = format!("({}) {}-{}", self.digits(3), self.digits(3), self.digits(4));

        let identity = ActorIdentity {
            first_name: self.pick(FIRST_NAMES),
            last_name: self.pick(LAST_NAMES),
            street,
            city: self.pick(CITIES),
            state: self.pick(STATES),
            zip_code: self.digits(5),
            phone,
            ssn: self.digits(9),
            username,
            password: self.password(),
        };

        debug!(username = %identity.username, "generated actor identity");
        identity
    }

    fn pick(&mut self, list: &[&str]) -> String {
        list.choose(&mut self.rng).copied().unwrap_or_default().to_string()
    }

    fn digits(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(b'0' + self.rng.gen_range(0..10u8)))
            .collect()
    }

    /// A random word with anything but ASCII letters stripped
    fn word(&mut self) -> String {
        let word: String = self
            .pick(WORDS)
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        if word.is_empty() {
            "actor".to_string()
        } else {
            word
        }
    }

    fn password(&mut self) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(PASSWORD_LEN)
            .map(char::from)
            .collect()
    }
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}
