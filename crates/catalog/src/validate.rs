use stockroom_core::{DomainError, DomainResult};

/// Trimmed, non-empty, bounded text.
pub(crate) fn required(field: &str, value: &str, max_chars: usize) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    bounded(field, value, max_chars)
}

/// Trimmed, possibly empty, bounded text.
pub(crate) fn bounded(field: &str, value: &str, max_chars: usize) -> DomainResult<String> {
    let value = value.trim();
    if value.chars().count() > max_chars {
        return Err(DomainError::validation(format!(
            "{field} cannot be longer than {max_chars} characters"
        )));
    }
    Ok(value.to_string())
}

pub(crate) fn email(value: &str) -> DomainResult<String> {
    let value = bounded("email", value, 254)?;
    if value.is_empty() {
        return Ok(value);
    }
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("'{value}' is not a valid email")));
    }
    Ok(value)
}

/// Non-negative integer count (stock, thresholds) as stored in the catalog.
pub fn parse_count(field: &str, value: i64) -> DomainResult<u32> {
    if value < 0 {
        return Err(DomainError::validation(format!(
            "{field} cannot be negative (got {value})"
        )));
    }
    u32::try_from(value)
        .map_err(|_| DomainError::validation(format!("{field} is too large (got {value})")))
}
