//! Value parsing for security settings.

use chrono::{Duration, Utc};

use super::ConfigError;

/// Parse a lifetime such as `15m`, `7d`, `12h`, `30s` or a bare number of
/// seconds. Zero and negative lifetimes are rejected.
pub fn parse_lifetime(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        name,
        reason: format!("'{raw}' {reason}"),
    };

    let trimmed = raw.trim();
    let (digits, unit) = match trimmed.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&trimmed[..idx], Some(c)),
        Some(_) => (trimmed, None),
        None => return Err(invalid("is empty")),
    };

    let amount: i64 = digits
        .trim()
        .parse()
        .map_err(|_| invalid("is not a duration"))?;
    if amount <= 0 {
        return Err(invalid("must be positive"));
    }

    let lifetime = match unit.map(|c| c.to_ascii_lowercase()) {
        None | Some('s') => Duration::try_seconds(amount),
        Some('m') => Duration::try_minutes(amount),
        Some('h') => Duration::try_hours(amount),
        Some('d') => Duration::try_days(amount),
        Some(_) => return Err(invalid("has an unknown unit (use s, m, h or d)")),
    }
    .ok_or_else(|| invalid("is out of range"))?;

    check_lifetime(name, lifetime)?;
    Ok(lifetime)
}

/// A lifetime must be positive and give a representable expiry from now.
pub fn check_lifetime(name: &'static str, lifetime: Duration) -> Result<(), ConfigError> {
    let out_of_range = |reason: &str| ConfigError::InvalidValue {
        name,
        reason: reason.to_string(),
    };
    if lifetime <= Duration::zero() {
        return Err(out_of_range("lifetime must be positive"));
    }
    Utc::now()
        .checked_add_signed(lifetime)
        .map(|_| ())
        .ok_or_else(|| out_of_range("lifetime is too far in the future"))
}

/// bcrypt accepts costs 4 through 31.
pub fn check_bcrypt_cost(cost: u32) -> Result<(), ConfigError> {
    if (4..=31).contains(&cost) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name: "BCRYPT_ROUNDS",
            reason: format!("{cost} is outside 4..=31"),
        })
    }
}
