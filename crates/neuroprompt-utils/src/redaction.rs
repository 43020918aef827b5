//! Secret redaction for log lines and user-facing error text.
//!
//! Provider errors can echo request URLs and header values back at us. Anything
//! that leaves the process through `tracing` or stderr goes through
//! [`redact_secrets`] first.

use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern to match URLs with embedded credentials
static URL_WITH_CREDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(https?://)[^:@\s/]+:[^@\s]+@").expect("static credential pattern is valid")
});

/// Pattern to match bearer tokens in echoed headers
static BEARER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+").expect("static bearer pattern is valid")
});

/// Pattern to match potential API keys (long alphanumeric strings)
///
/// Matches sequences of 32+ characters that are alphanumeric, underscore, or dash.
static POTENTIAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^A-Za-z0-9_-])[A-Za-z0-9_-]{32,}([^A-Za-z0-9_-]|$)")
        .expect("static key pattern is valid")
});

/// Redact sensitive information from a message.
///
/// Redaction rules:
/// - URLs with embedded credentials keep the scheme and lose `user:pass`
/// - `Bearer <token>` keeps the scheme word and loses the token
/// - Any 32+ character key-like run is replaced by `[REDACTED_KEY]`
#[must_use]
pub fn redact_secrets(message: &str) -> String {
    let redacted = URL_WITH_CREDS.replace_all(message, "$1[REDACTED]@");
    let redacted = BEARER_TOKEN.replace_all(&redacted, "$1[REDACTED]");
    let redacted = POTENTIAL_KEY.replace_all(&redacted, "$1[REDACTED_KEY]$2");
    redacted.into_owned()
}
