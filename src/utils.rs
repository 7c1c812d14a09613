use crate::config::{
    MAX_ANIMATION_SPEED, MAX_NAME_LEN, MAX_SPIN_DURATION_SECS, MAX_TITLE_LEN, MIN_NAME_LEN,
    MIN_SPIN_DURATION_SECS,
};
use crate::model::Participant;
use crate::WheelError;
use chrono::{DateTime, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;

// `#rgb` or `#rrggbb`, as produced by the palette and the native color picker
static HEX_COLOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9A-Fa-f]{3}){1,2}$").unwrap());

/// Trim a candidate name and check its length and case-insensitive uniqueness
/// among `existing`. `exclude_id` skips the participant being edited.
///
/// Returns the trimmed name on success.
pub fn validate_name(
    input: &str,
    existing: &[Participant],
    exclude_id: Option<&str>,
) -> Result<String, WheelError> {
    let name = input.trim();
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(WheelError::NameLength { len });
    }

    let lowered = name.to_lowercase();
    let duplicate = existing
        .iter()
        .filter(|p| Some(p.id.as_str()) != exclude_id)
        .any(|p| p.name.to_lowercase() == lowered);
    if duplicate {
        return Err(WheelError::DuplicateName(name.to_string()));
    }

    Ok(name.to_string())
}

pub fn validate_color(input: &str) -> Result<String, WheelError> {
    let color = input.trim();
    if HEX_COLOR_REGEX.is_match(color) {
        Ok(color.to_string())
    } else {
        Err(WheelError::InvalidColor(color.to_string()))
    }
}

/// Generic numeric range check
pub fn validate_numeric_input<T>(
    value: T,
    min: Option<T>,
    max: Option<T>,
    field_name: &str,
) -> Result<T, WheelError>
where
    T: std::fmt::Display + PartialOrd,
{
    if let Some(min_val) = min {
        if value < min_val {
            return Err(WheelError::InvalidSetting {
                field: field_name.to_string(),
                reason: format!("must be at least {}", min_val),
            });
        }
    }
    if let Some(max_val) = max {
        if value > max_val {
            return Err(WheelError::InvalidSetting {
                field: field_name.to_string(),
                reason: format!("cannot exceed {}", max_val),
            });
        }
    }
    Ok(value)
}

pub fn validate_spin_duration(secs: f64) -> Result<f64, WheelError> {
    if !secs.is_finite() {
        return Err(WheelError::InvalidSetting {
            field: "spinDuration".to_string(),
            reason: "must be a number".to_string(),
        });
    }
    validate_numeric_input(
        secs,
        Some(MIN_SPIN_DURATION_SECS),
        Some(MAX_SPIN_DURATION_SECS),
        "spinDuration",
    )
}

/// The multiplier must be strictly positive.
pub fn validate_animation_speed(speed: f64) -> Result<f64, WheelError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(WheelError::InvalidSetting {
            field: "animationSpeed".to_string(),
            reason: "must be a positive number".to_string(),
        });
    }
    validate_numeric_input(speed, None, Some(MAX_ANIMATION_SPEED), "animationSpeed")
}

pub fn validate_title(title: &str) -> Result<(), WheelError> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err(WheelError::InvalidSetting {
            field: "wheelTitle".to_string(),
            reason: "cannot be empty".to_string(),
        });
    }
    validate_numeric_input(len, None, Some(MAX_TITLE_LEN), "wheelTitle").map(|_| ())
}

/// Fresh opaque identifier for participants and history entries.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(target_arch = "wasm32")]
pub fn now_millis() -> i64 {
    js_sys::Date::now() as i64
}

/// RFC 3339 timestamp with millisecond precision, e.g. `2024-05-01T09:30:00.123Z`.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(now_millis())
}

/// Round to one decimal place.
#[inline]
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
