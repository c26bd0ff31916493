//! Account (tenant) identifier
//!
//! Every API key is owned by exactly one account. The account context is
//! established by the surrounding authentication layer; the lifecycle
//! service only checks ownership against it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during account ID validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccountValidationError {
    #[error("Account ID cannot be empty")]
    Empty,

    #[error("Account ID exceeds maximum length of {0} characters")]
    TooLong(usize),

    #[error("Account ID contains invalid character: '{0}'. Only alphanumeric characters and hyphens are allowed")]
    InvalidCharacter(char),
}

const MAX_ACCOUNT_ID_LENGTH: usize = 64;

/// Account identifier - alphanumeric + hyphens, max 64 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Create a new AccountId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, AccountValidationError> {
        let id = id.into();

        if id.is_empty() {
            return Err(AccountValidationError::Empty);
        }

        if id.len() > MAX_ACCOUNT_ID_LENGTH {
            return Err(AccountValidationError::TooLong(MAX_ACCOUNT_ID_LENGTH));
        }

        for c in id.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' {
                return Err(AccountValidationError::InvalidCharacter(c));
            }
        }

        Ok(Self(id))
    }

    /// The reserved account used for platform-operator credentials
    pub fn platform() -> Self {
        Self("platform".to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
