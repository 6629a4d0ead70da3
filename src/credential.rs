use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::otp::{HashAlgorithm, OtpError};

pub const DEFAULT_ALGORITHM: &str = "SHA1";
pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_PERIOD: u64 = 30;

fn default_algorithm() -> String {
    DEFAULT_ALGORITHM.to_string()
}

fn default_digits() -> u32 {
    DEFAULT_DIGITS
}

fn default_period() -> u64 {
    DEFAULT_PERIOD
}

/// One account's OTP parameters, as persisted.
///
/// `algorithm` is kept as the raw string it was imported with; an
/// unrecognised value survives storage and only fails at generation time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub issuer: String,
    pub secret: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String, // "SHA1"
    #[serde(default = "default_digits")]
    pub digits: u32,
    #[serde(default = "default_period")]
    pub period: u64,
    #[serde(default)]
    pub base_password: String,
    #[serde(default)]
    pub use_base_password: bool,
}

impl Credential {
    /// New credential with a fresh id and the default TOTP parameters.
    pub fn new(name: impl Into<String>, issuer: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            issuer: issuer.into(),
            secret: secret.into(),
            algorithm: default_algorithm(),
            digits: DEFAULT_DIGITS,
            period: DEFAULT_PERIOD,
            base_password: String::new(),
            use_base_password: false,
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }

    pub fn with_base_password(mut self, base_password: impl Into<String>) -> Self {
        self.base_password = base_password.into();
        self.use_base_password = true;
        self
    }

    /// `"{issuer} ({name})"`, or just the name when there is no issuer.
    pub fn display_name(&self) -> String {
        if self.issuer.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.issuer, self.name)
        }
    }

    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, OtpError> {
        self.algorithm.parse()
    }

    /// What a copy action puts on the clipboard for `code`.
    pub fn copy_payload(&self, code: &str) -> String {
        if self.use_base_password {
            format!("{}{}", self.base_password, code)
        } else {
            code.to_string()
        }
    }
}
