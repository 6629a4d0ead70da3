//! `otpauth://` provisioning URI handling.
//!
//! Two tiers: [`parse`] is lenient and accepts any URI whose query carries a
//! `secret`, [`is_valid_otpauth_url`] is the strict save-time check.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::base32;
use crate::credential::{Credential, DEFAULT_ALGORITHM, DEFAULT_DIGITS, DEFAULT_PERIOD};
use crate::otp::HashAlgorithm;

pub const TOTP_PREFIX: &str = "otpauth://totp/";
pub const UNKNOWN_SERVICE_NAME: &str = "Unknown Service";

/// A default the lenient parser fell back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    UnrecognizedAlgorithm(String),
    NonNumericDigits(String),
    NonNumericPeriod(String),
    UndecodableSecret,
    EmptyName,
}

#[derive(Debug, Clone)]
pub struct ParsedUri {
    pub credential: Credential,
    pub warnings: Vec<ParseWarning>,
}

/// First value for `name`, matching parameter names case-insensitively.
/// Values are percent-decoded only: a literal `+` stays a `+`.
fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        percent_decode_str(key)
            .decode_utf8_lossy()
            .eq_ignore_ascii_case(name)
            .then(|| percent_decode_str(value).decode_utf8_lossy().into_owned())
    })
}

fn label(url: &Url) -> String {
    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Parse a provisioning URI, reporting every lenient default taken.
///
/// Returns `None` when the input is not a URI, has no query, or has no
/// `secret` parameter.
pub fn parse_with_diagnostics(uri: &str) -> Option<ParsedUri> {
    let url = Url::parse(uri.trim()).ok()?;
    url.query()?;

    let secret = query_value(&url, "secret")?;
    let mut warnings = Vec::new();

    if base32::decode(&secret).is_err() {
        warnings.push(ParseWarning::UndecodableSecret);
    }

    let name = label(&url);
    if name.is_empty() {
        warnings.push(ParseWarning::EmptyName);
    }

    let issuer = query_value(&url, "issuer").unwrap_or_default();

    let algorithm = query_value(&url, "algorithm")
        .map(|a| a.to_uppercase())
        .unwrap_or_else(|| DEFAULT_ALGORITHM.to_string());
    if algorithm.parse::<HashAlgorithm>().is_err() {
        warnings.push(ParseWarning::UnrecognizedAlgorithm(algorithm.clone()));
    }

    let digits = match query_value(&url, "digits") {
        Some(raw) => raw.parse::<u32>().unwrap_or_else(|_| {
            warnings.push(ParseWarning::NonNumericDigits(raw));
            DEFAULT_DIGITS
        }),
        None => DEFAULT_DIGITS,
    };

    let period = match query_value(&url, "period") {
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
            warnings.push(ParseWarning::NonNumericPeriod(raw));
            DEFAULT_PERIOD
        }),
        None => DEFAULT_PERIOD,
    };

    let credential = Credential::new(name, issuer, secret)
        .with_algorithm(algorithm)
        .with_digits(digits)
        .with_period(period);

    Some(ParsedUri {
        credential,
        warnings,
    })
}

/// Lenient parse. Defaults taken along the way are logged, not returned.
pub fn parse(uri: &str) -> Option<Credential> {
    let parsed = parse_with_diagnostics(uri)?;
    for warning in &parsed.warnings {
        tracing::warn!(?warning, name = %parsed.credential.name, "otpauth URI parsed with fallback");
    }
    Some(parsed.credential)
}

/// Strict check: literal `otpauth://totp/` prefix and a `secret` parameter
/// that carries a value (`secret=` counts, a bare `secret` does not).
pub fn is_valid_otpauth_url(uri: &str) -> bool {
    if !uri.starts_with(TOTP_PREFIX) {
        return false;
    }
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    let Some(query) = url.query() else {
        return false;
    };

    query.split('&').any(|pair| match pair.split_once('=') {
        Some((key, _)) => key.eq_ignore_ascii_case("secret"),
        None => false,
    })
}

pub fn extract_secret(uri: &str) -> Option<String> {
    let url = Url::parse(uri.trim()).ok()?;
    query_value(&url, "secret")
}

/// The URI's label, or [`UNKNOWN_SERVICE_NAME`] when it has none.
pub fn service_name(uri: &str) -> String {
    match Url::parse(uri.trim()) {
        Ok(url) => {
            let name = label(&url);
            if name.is_empty() {
                UNKNOWN_SERVICE_NAME.to_string()
            } else {
                name
            }
        }
        Err(_) => UNKNOWN_SERVICE_NAME.to_string(),
    }
}
