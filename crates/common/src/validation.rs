//! Input validation helpers for camera connection attributes
//!
//! Every helper returns `anyhow::Result<()>` with a human-readable message so
//! callers can either short-circuit with `?` or run all of them and collect
//! the messages into a single report.

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::net::IpAddr;

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for camera display names
pub const MAX_CAMERA_NAME_LENGTH: usize = 100;

/// Maximum length for URIs (RTSP, HTTP, ONVIF)
pub const MAX_URI_LENGTH: usize = 4096;

/// Maximum length of a DNS hostname
pub const MAX_HOSTNAME_LENGTH: usize = 253;

/// Maximum length of a single DNS label
pub const MAX_LABEL_LENGTH: usize = 63;

lazy_static! {
    static ref HOSTNAME_LABEL: Regex =
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?$").expect("valid hostname label pattern");
}

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum (in characters)
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    let length = value.chars().count();
    if length > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} characters (got {})",
            field_name,
            max_length,
            length
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate a camera display name
pub fn validate_name(name: &str, field_name: &str) -> Result<()> {
    validate_non_empty(name, field_name)?;
    validate_length(name, MAX_CAMERA_NAME_LENGTH, field_name)?;
    Ok(())
}

/// Validate URI (RTSP, HTTP, ONVIF)
pub fn validate_uri(uri: &str, field_name: &str) -> Result<()> {
    validate_non_empty(uri, field_name)?;
    validate_length(uri, MAX_URI_LENGTH, field_name)?;

    if !uri.contains("://") {
        return Err(anyhow!("{} must be an absolute URI with a scheme", field_name));
    }

    // Prevent shell metacharacters (command injection)
    let dangerous_chars = ['`', '$', ';', '|', '\n', '\r'];
    if uri.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!(
            "{} contains dangerous shell metacharacters",
            field_name
        ));
    }

    Ok(())
}

// ============================================================================
// Network Validation
// ============================================================================

/// Returns true if `value` parses as an IPv4 or IPv6 literal.
///
/// Bracketed IPv6 (`[::1]`) is accepted as well.
pub fn is_ip_literal(value: &str) -> bool {
    let trimmed = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    trimmed.parse::<IpAddr>().is_ok()
}

/// Validate a DNS hostname (RFC 1123 syntax, no resolution)
pub fn validate_hostname(host: &str, field_name: &str) -> Result<()> {
    validate_non_empty(host, field_name)?;
    validate_length(host, MAX_HOSTNAME_LENGTH, field_name)?;

    let host = host.strip_suffix('.').unwrap_or(host);
    for label in host.split('.') {
        if label.is_empty() {
            return Err(anyhow!("{} contains an empty label", field_name));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(anyhow!(
                "{} label '{}' exceeds {} characters",
                field_name,
                label,
                MAX_LABEL_LENGTH
            ));
        }
        if !HOSTNAME_LABEL.is_match(label) {
            return Err(anyhow!(
                "{} label '{}' is not a valid hostname label",
                field_name,
                label
            ));
        }
    }

    // All-numeric names that failed the IP parse are malformed addresses
    if host.split('.').all(|label| label.chars().all(|c| c.is_ascii_digit())) {
        return Err(anyhow!("{} is not a valid IP address", field_name));
    }

    Ok(())
}

/// Validate a host: either an IP literal or a syntactically valid hostname
pub fn validate_host(host: &str, field_name: &str) -> Result<()> {
    validate_non_empty(host, field_name)?;
    if is_ip_literal(host.trim()) {
        return Ok(());
    }
    validate_hostname(host.trim(), field_name)
        .map_err(|e| anyhow!("{} must be an IP address or hostname: {}", field_name, e))
}

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate port number (1-65535)
pub fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port number must be between 1 and 65535, got 0"));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
