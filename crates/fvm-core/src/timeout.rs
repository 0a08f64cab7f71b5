//! Step timeout strings such as `"30s"`, `"10m"`, `"2h"` or `"1d"`.

use crate::error::{FvmError, Result};
use std::time::Duration;

/// Parse `<n><unit>` with unit one of `s`, `m`, `h`, `d`.
pub fn parse_timeout(text: &str) -> Result<Duration> {
    let text = text.trim();
    let invalid = || FvmError::InvalidTimeout(text.to_string());

    let unit = text.chars().last().ok_or_else(invalid)?;
    let digits = &text[..text.len() - unit.len_utf8()];
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }

    let scale: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        _ => return Err(invalid()),
    };
    let secs = value.checked_mul(scale).ok_or_else(invalid)?;
    Ok(Duration::from_secs(secs))
}

/// Render a duration back to the most compact `<n><unit>` form.
pub fn format_timeout(duration: Duration) -> String {
    let secs = duration.as_secs();
    for (unit, size) in [('d', 86_400), ('h', 3_600), ('m', 60)] {
        if secs >= size && secs % size == 0 {
            return format!("{}{}", secs / size, unit);
        }
    }
    format!("{secs}s")
}
