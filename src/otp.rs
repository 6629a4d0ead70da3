//! HOTP (RFC 4226) and TOTP (RFC 6238) code generation.
//!
//! Everything here is pure: the caller supplies the key and the current
//! time, so a refresh pass can run for any number of credentials without
//! shared state.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use thiserror::Error;
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::base32::{self, DecodeError};
use crate::credential::Credential;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("invalid OTP secret (base32): {0}")]
    Decode(#[from] DecodeError),
    #[error("OTP secret decoded to empty byte string")]
    EmptyKey,
    #[error("unsupported OTP algo '{0}', expected SHA1/SHA256/SHA512")]
    UnsupportedAlgorithm(String),
    #[error("OTP period must be greater than zero")]
    InvalidPeriod,
    #[error("OTP digits must be between 1 and 19")]
    InvalidDigits,
    #[error("system clock is before the unix epoch")]
    ClockBeforeEpoch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            other => Err(OtpError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

fn mac(key: &[u8], message: &[u8], algorithm: HashAlgorithm) -> Vec<u8> {
    macro_rules! digest {
        ($hash:ty) => {{
            let mut mac =
                Hmac::<$hash>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }};
    }

    match algorithm {
        HashAlgorithm::Sha1 => digest!(Sha1),
        HashAlgorithm::Sha256 => digest!(Sha256),
        HashAlgorithm::Sha512 => digest!(Sha512),
    }
}

/// Dynamic truncation, RFC 4226 §5.3.
fn truncate(mac: &[u8], digits: u32) -> String {
    let offset = (mac[mac.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        mac[offset],
        mac[offset + 1],
        mac[offset + 2],
        mac[offset + 3],
    ]) & 0x7fff_ffff;

    let code = binary as u64 % 10u64.pow(digits);
    format!("{:0>width$}", code, width = digits as usize)
}

/// Longest code whose modulus `10^digits` still fits in a `u64`.
pub const MAX_DIGITS: u32 = 19;

/// HOTP code for a raw key and counter.
pub fn hotp(key: &[u8], counter: u64, digits: u32, algorithm: HashAlgorithm) -> Result<String, OtpError> {
    if key.is_empty() {
        return Err(OtpError::EmptyKey);
    }
    if digits == 0 || digits > MAX_DIGITS {
        return Err(OtpError::InvalidDigits);
    }

    let mac = mac(key, &counter.to_be_bytes(), algorithm);
    Ok(truncate(&mac, digits))
}

fn unix_seconds(now: OffsetDateTime) -> Result<u64, OtpError> {
    u64::try_from(now.unix_timestamp()).map_err(|_| OtpError::ClockBeforeEpoch)
}

/// TOTP time-step counter: `floor(unix_seconds / period)`.
pub fn counter_at(now: OffsetDateTime, period: u64) -> Result<u64, OtpError> {
    if period == 0 {
        return Err(OtpError::InvalidPeriod);
    }
    Ok(unix_seconds(now)? / period)
}

/// TOTP code for `now`.
pub fn totp(
    key: &[u8],
    now: OffsetDateTime,
    period: u64,
    digits: u32,
    algorithm: HashAlgorithm,
) -> Result<String, OtpError> {
    let counter = counter_at(now, period)?;
    hotp(key, counter, digits, algorithm)
}

/// Seconds left in the current window, in `1..=period`.
///
/// On a window boundary this is the full `period`, never 0.
pub fn seconds_remaining(now: OffsetDateTime, period: u64) -> Result<u64, OtpError> {
    if period == 0 {
        return Err(OtpError::InvalidPeriod);
    }
    Ok(period - unix_seconds(now)? % period)
}

/// Fraction of the current window already elapsed, in `0.0..1.0`.
pub fn progress(now: OffsetDateTime, period: u64) -> Result<f64, OtpError> {
    if period == 0 {
        return Err(OtpError::InvalidPeriod);
    }
    let elapsed = unix_seconds(now)? % period;
    Ok(elapsed as f64 / period as f64)
}

/// One credential's output for a refresh tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub seconds_remaining: u64,
    pub period: u64,
    pub counter: u64,
}

/// Generate the current code and countdown for a stored credential.
pub fn generate(credential: &Credential, now: OffsetDateTime) -> Result<GeneratedCode, OtpError> {
    let algorithm = credential.hash_algorithm()?;
    let key = Zeroizing::new(base32::decode(&credential.secret)?);

    let counter = counter_at(now, credential.period)?;
    let code = hotp(&key, counter, credential.digits, algorithm)?;

    Ok(GeneratedCode {
        code,
        seconds_remaining: seconds_remaining(now, credential.period)?,
        period: credential.period,
        counter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const RFC4226_KEY: &[u8] = b"12345678901234567890";

    #[test]
    fn hotp_matches_rfc4226_appendix_d() {
        let expected = [
            "755224", "287082", "359152", "969429", "338314", "254676", "287922", "162583",
            "399871", "520489",
        ];
        for (counter, code) in expected.iter().enumerate() {
            assert_eq!(
                hotp(RFC4226_KEY, counter as u64, 6, HashAlgorithm::Sha1).unwrap(),
                *code,
                "counter {counter}"
            );
        }
    }

    #[test]
    fn totp_matches_rfc6238_vectors() {
        let sha256_key = b"12345678901234567890123456789012";
        let sha512_key = b"1234567890123456789012345678901234567890123456789012345678901234";

        let cases = [
            (59, "94287082", "46119246", "90693936"),
            (1111111109, "07081804", "68084774", "25091201"),
            (1111111111, "14050471", "67062674", "99943326"),
            (1234567890, "89005924", "91819424", "93441116"),
            (2000000000, "69279037", "90698825", "38618901"),
            (20000000000, "65353130", "77737706", "47863826"),
        ];

        for (ts, sha1, sha256, sha512) in cases {
            let now = OffsetDateTime::from_unix_timestamp(ts).unwrap();
            assert_eq!(totp(RFC4226_KEY, now, 30, 8, HashAlgorithm::Sha1).unwrap(), sha1);
            assert_eq!(totp(sha256_key, now, 30, 8, HashAlgorithm::Sha256).unwrap(), sha256);
            assert_eq!(totp(sha512_key, now, 30, 8, HashAlgorithm::Sha512).unwrap(), sha512);
        }
    }

    #[test]
    fn same_window_yields_same_code() {
        let a = datetime!(2024-05-01 12:00:00 UTC);
        let b = datetime!(2024-05-01 12:00:29 UTC);
        let next = datetime!(2024-05-01 12:00:30 UTC);

        let code_a = totp(RFC4226_KEY, a, 30, 6, HashAlgorithm::Sha1).unwrap();
        let code_b = totp(RFC4226_KEY, b, 30, 6, HashAlgorithm::Sha1).unwrap();
        let code_next = totp(RFC4226_KEY, next, 30, 6, HashAlgorithm::Sha1).unwrap();

        assert_eq!(code_a, code_b);
        assert_ne!(code_a, code_next);
        assert_eq!(counter_at(a, 30).unwrap() + 1, counter_at(next, 30).unwrap());
    }

    #[test]
    fn seconds_remaining_is_full_period_on_boundary() {
        let boundary = OffsetDateTime::from_unix_timestamp(1_700_000_010).unwrap();
        assert_eq!(1_700_000_010 % 30, 0);
        assert_eq!(seconds_remaining(boundary, 30).unwrap(), 30);

        let later = OffsetDateTime::from_unix_timestamp(1_700_000_039).unwrap();
        assert_eq!(seconds_remaining(later, 30).unwrap(), 1);
        assert_eq!(progress(boundary, 30).unwrap(), 0.0);
    }

    #[test]
    fn empty_key_and_zero_period_are_rejected() {
        let now = datetime!(2024-05-01 12:00:00 UTC);
        assert_eq!(hotp(b"", 0, 6, HashAlgorithm::Sha1), Err(OtpError::EmptyKey));
        assert_eq!(hotp(RFC4226_KEY, 0, 0, HashAlgorithm::Sha1), Err(OtpError::InvalidDigits));
        assert_eq!(seconds_remaining(now, 0), Err(OtpError::InvalidPeriod));
        assert_eq!(
            totp(RFC4226_KEY, now, 0, 6, HashAlgorithm::Sha1),
            Err(OtpError::InvalidPeriod)
        );
    }

    #[test]
    fn long_codes_are_zero_padded() {
        let code = hotp(RFC4226_KEY, 0, 10, HashAlgorithm::Sha1).unwrap();
        assert_eq!(code.len(), 10);
        assert!(code.ends_with("755224"));

        let code = hotp(RFC4226_KEY, 0, MAX_DIGITS, HashAlgorithm::Sha1).unwrap();
        assert_eq!(code.len(), 19);
        assert!(code.starts_with("000000000"));
    }

    #[test]
    fn oversized_digits_are_rejected() {
        for digits in [MAX_DIGITS + 1, 24, 4_000_000_000] {
            assert_eq!(
                hotp(RFC4226_KEY, 0, digits, HashAlgorithm::Sha1),
                Err(OtpError::InvalidDigits),
                "digits {digits}"
            );
        }
    }

    #[test]
    fn algorithm_parsing_is_case_insensitive() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert_eq!(
            "MD5".parse::<HashAlgorithm>(),
            Err(OtpError::UnsupportedAlgorithm("MD5".into()))
        );
    }

    #[test]
    fn generate_reports_code_and_countdown() {
        let credential = Credential::new("alice@example.com", "Example", "JBSWY3DPEHPK3PXP");
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_020).unwrap();

        let generated = generate(&credential, now).unwrap();
        assert_eq!(generated.code.len(), 6);
        assert_eq!(generated.seconds_remaining, 20);
        assert_eq!(generated.period, 30);
        assert_eq!(generated.counter, 1_700_000_020 / 30);
    }

    #[test]
    fn generate_fails_for_bad_secret_or_algorithm() {
        let now = datetime!(2024-05-01 12:00:00 UTC);

        let bad_secret = Credential::new("bad", "", "NOT-BASE32!");
        assert!(matches!(generate(&bad_secret, now), Err(OtpError::Decode(_))));

        let mut bad_algo = Credential::new("algo", "", "JBSWY3DPEHPK3PXP");
        bad_algo.algorithm = "MD5".into();
        assert!(matches!(
            generate(&bad_algo, now),
            Err(OtpError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn generate_agrees_with_totp_rs() {
        let mut credential = Credential::new("oracle", "", "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ");
        credential.digits = 8;
        credential.period = 60;
        credential.algorithm = "SHA256".into();

        let key = base32::decode(&credential.secret).unwrap();
        let oracle = totp_rs::TOTP::new_unchecked(totp_rs::Algorithm::SHA256, 8, 1, 60, key);

        for ts in [0u64, 59, 60, 1_234_567_890, 1_700_000_000] {
            let now = OffsetDateTime::from_unix_timestamp(ts as i64).unwrap();
            assert_eq!(generate(&credential, now).unwrap().code, oracle.generate(ts));
        }
    }
}
