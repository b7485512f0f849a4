//! Destination address normalization
//!
//! Transfer targets arrive as whatever the requester typed: with or without a
//! leading `+`, with spaces, dashes or parentheses. Everything handed to the
//! provider is canonical E.164 (`+` followed by 7 to 15 digits, no leading
//! zero). National numbers of the configured length get the default country
//! code; any other number without `+` is assumed to already carry one.

use crate::config::AddressPolicy;
use crate::error::{QueueError, Result};

const MIN_DIGITS: usize = 7;
const MAX_E164_DIGITS: usize = 15;

/// Normalize a destination into E.164 form.
///
/// # Examples
///
/// ```
/// use holdline_transfer_engine::{address::normalize_destination, AddressPolicy};
///
/// let policy = AddressPolicy::default();
/// assert_eq!(normalize_destination("5559999999", &policy).unwrap(), "+15559999999");
/// assert_eq!(normalize_destination("+44 20 7946 0958", &policy).unwrap(), "+442079460958");
/// assert!(normalize_destination("", &policy).is_err());
/// ```
pub fn normalize_destination(raw: &str, policy: &AddressPolicy) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QueueError::invalid_destination(raw, "destination is empty"));
    }

    let (has_plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => {
                return Err(QueueError::invalid_destination(
                    raw,
                    format!("unexpected character '{}'", c),
                ));
            }
        }
    }

    if digits.is_empty() {
        return Err(QueueError::invalid_destination(raw, "no digits"));
    }

    if !has_plus && digits.len() == policy.national_number_length {
        if let Some(code) = &policy.default_country_code {
            digits.insert_str(0, code);
        }
    }

    if digits.starts_with('0') {
        return Err(QueueError::invalid_destination(raw, "country code cannot start with 0"));
    }

    if !(MIN_DIGITS..=MAX_E164_DIGITS).contains(&digits.len()) {
        return Err(QueueError::invalid_destination(
            raw,
            format!("expected {}-{} digits, got {}", MIN_DIGITS, MAX_E164_DIGITS, digits.len()),
        ));
    }

    Ok(format!("+{}", digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nanp() -> AddressPolicy {
        AddressPolicy::default()
    }

    #[test]
    fn test_national_number_gets_country_code() {
        assert_eq!(normalize_destination("5559999999", &nanp()).unwrap(), "+15559999999");
        assert_eq!(normalize_destination("(555) 999-9999", &nanp()).unwrap(), "+15559999999");
    }

    #[test]
    fn test_already_canonical_is_unchanged() {
        assert_eq!(normalize_destination("+15551230000", &nanp()).unwrap(), "+15551230000");
        assert_eq!(normalize_destination("  +15551230000\n", &nanp()).unwrap(), "+15551230000");
    }

    #[test]
    fn test_international_without_plus_gets_prefix_only() {
        assert_eq!(normalize_destination("21658828532", &nanp()).unwrap(), "+21658828532");
        assert_eq!(normalize_destination("15559999999", &nanp()).unwrap(), "+15559999999");
    }

    #[test]
    fn test_plus_suppresses_country_code() {
        // Ten digits after '+' is already international
        assert_eq!(normalize_destination("+4420794609", &nanp()).unwrap(), "+4420794609");
    }

    #[test]
    fn test_without_default_country_code() {
        let policy = AddressPolicy {
            default_country_code: None,
            ..AddressPolicy::default()
        };
        assert_eq!(normalize_destination("5559999999", &policy).unwrap(), "+5559999999");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "   ", "+", "abc", "555-CALL-NOW", "+0123456789", "12345", "+1234567890123456", "sip:alice@example.com"] {
            let err = normalize_destination(bad, &nanp()).unwrap_err();
            assert!(
                matches!(err, QueueError::InvalidDestination { .. }),
                "expected InvalidDestination for {:?}, got {:?}",
                bad,
                err
            );
        }
    }
}
