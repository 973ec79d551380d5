//! ParaBank Common Library
//!
//! Actor identities, account and money types, and the scenario context that
//! the UI phase hands to the API phase.

pub mod error;
pub mod identity;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use identity::{ActorIdentity, IdentityGenerator};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
