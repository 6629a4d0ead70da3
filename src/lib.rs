//! Multi-account TOTP authenticator core: Base32 secrets, HOTP/TOTP
//! generation, `otpauth://` import and a persisted credential store with a
//! single selected credential.

pub mod base32;
pub mod config;
pub mod credential;
pub mod kv;
pub mod otp;
pub mod otpauth;
pub mod store;

pub use credential::Credential;
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, PersistenceError};
pub use otp::{GeneratedCode, HashAlgorithm, OtpError};
pub use store::{CredentialStore, StoreError, StoreEvent};
