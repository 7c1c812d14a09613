//! Persisted entities: participants, history entries, session markers and settings.
//!
//! Field names on the wire follow the namespaced storage layout (`users`,
//! `history`, `settings`, ...) so records written by earlier versions of the
//! wheel load unchanged.

use crate::config::{
    DEFAULT_ANIMATION_SPEED, DEFAULT_SPIN_DURATION_SECS, DEFAULT_WHEEL_TITLE,
};
use crate::utils::{validate_animation_speed, validate_spin_duration, validate_title};
use crate::WheelError;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

fn enabled_by_default() -> bool {
    true
}

/// A participant on the wheel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Opaque identity; never changes after creation.
    pub id: String,
    pub name: String,
    pub color: String,
    /// Disabled participants stay in the store but are left off the wheel.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: String,
}

/// Partial update for a participant. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// One recorded spin outcome.
///
/// `participant_id` is a weak reference: the participant may be deleted later
/// while the entry (and its name snapshot) is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(rename = "userId")]
    pub participant_id: String,
    #[serde(rename = "userName")]
    pub participant_name: String,
    pub timestamp: String,
    /// 1-based, dense when written, never renumbered after eviction.
    #[serde(rename = "spinNumber")]
    pub sequence_number: u64,
}

/// Sections of the presentation layer that can be restored on the next visit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewSection {
    #[default]
    Wheel,
    Users,
    History,
    Settings,
    /// First-run onboarding; shown but never persisted.
    Welcome,
}

impl ViewSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewSection::Wheel => "wheel",
            ViewSection::Users => "users",
            ViewSection::History => "history",
            ViewSection::Settings => "settings",
            ViewSection::Welcome => "welcome",
        }
    }
}

impl fmt::Display for ViewSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewSection {
    type Err = WheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wheel" => Ok(ViewSection::Wheel),
            "users" => Ok(ViewSection::Users),
            "history" => Ok(ViewSection::History),
            "settings" => Ok(ViewSection::Settings),
            "welcome" => Ok(ViewSection::Welcome),
            other => Err(WheelError::InvalidSetting {
                field: "lastView".to_string(),
                reason: format!("unknown view '{}'", other),
            }),
        }
    }
}

/// Process-wide markers persisted next to the entity collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMarkers {
    pub last_selected_participant_id: Option<String>,
    pub last_viewed_section: ViewSection,
    pub first_run_completed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationDirection {
    #[default]
    Clockwise,
    CounterClockwise,
}

impl RotationDirection {
    /// `+1.0` for clockwise, `-1.0` for counter-clockwise.
    pub fn sign(&self) -> f64 {
        match self {
            RotationDirection::Clockwise => 1.0,
            RotationDirection::CounterClockwise => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceAnimation {
    #[default]
    None,
    Pulse,
    Glow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinnerEffect {
    #[default]
    Confetti,
    Fireworks,
    None,
}

/// User-tunable configuration of the wheel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "spinDuration")]
    pub spin_duration_secs: f64,
    #[serde(rename = "animationSpeed")]
    pub animation_speed: f64,
    pub rotation_direction: RotationDirection,
    #[serde(rename = "wheelTitle")]
    pub title: String,
    pub slice_animation: SliceAnimation,
    pub sound_enabled: bool,
    pub dark_mode: bool,
    pub winner_effect: WinnerEffect,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            spin_duration_secs: DEFAULT_SPIN_DURATION_SECS,
            animation_speed: DEFAULT_ANIMATION_SPEED,
            rotation_direction: RotationDirection::default(),
            title: DEFAULT_WHEEL_TITLE.to_string(),
            slice_animation: SliceAnimation::default(),
            sound_enabled: true,
            dark_mode: false,
            winner_effect: WinnerEffect::default(),
        }
    }
}

impl Settings {
    /// Length of the presentation animation: duration scaled by the speed multiplier.
    pub fn animation_duration_secs(&self) -> f64 {
        self.spin_duration_secs * self.animation_speed
    }

    pub fn validate(&self) -> Result<(), WheelError> {
        validate_spin_duration(self.spin_duration_secs)?;
        validate_animation_speed(self.animation_speed)?;
        validate_title(&self.title)?;
        Ok(())
    }

    /// Build settings from a stored record, falling back to the default for
    /// every key that is missing, unknown or malformed.
    pub fn from_stored(stored: Option<&Value>) -> Self {
        let stored = match stored {
            Some(Value::Object(map)) => map,
            Some(other) => {
                warn!("Ignoring non-object settings record: {}", other);
                return Self::default();
            }
            None => return Self::default(),
        };

        let mut merged = Self::default_map();
        for (key, value) in stored {
            if !merged.contains_key(key) {
                continue;
            }
            let previous = merged.insert(key.clone(), value.clone());
            let accepted = serde_json::from_value::<Self>(Value::Object(merged.clone()))
                .map(|candidate| candidate.validate().is_ok())
                .unwrap_or(false);
            if !accepted {
                warn!("Stored setting '{}' is invalid, using default", key);
                if let Some(previous) = previous {
                    merged.insert(key.clone(), previous);
                }
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }

    /// Apply a partial patch (same key names as the stored record) and validate
    /// the result. Unknown keys are rejected.
    pub fn merged_with(&self, patch: &Value) -> Result<Self, WheelError> {
        let patch = patch.as_object().ok_or_else(|| WheelError::InvalidSetting {
            field: "settings".to_string(),
            reason: "expected an object".to_string(),
        })?;

        let mut merged = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Self::default_map(),
        };
        for (key, value) in patch {
            if !merged.contains_key(key) {
                return Err(WheelError::InvalidSetting {
                    field: key.clone(),
                    reason: "unknown setting".to_string(),
                });
            }
            merged.insert(key.clone(), value.clone());
        }

        let mut updated: Self =
            serde_json::from_value(Value::Object(merged)).map_err(|e| WheelError::InvalidSetting {
                field: "settings".to_string(),
                reason: e.to_string(),
            })?;
        if updated.title.trim().is_empty() {
            updated.title = DEFAULT_WHEEL_TITLE.to_string();
        }
        updated.validate()?;
        Ok(updated)
    }

    fn default_map() -> Map<String, Value> {
        match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn participant_without_enabled_flag_is_enabled() {
        let p: Participant = serde_json::from_value(json!({
            "id": "1700000000000",
            "name": "Alice",
            "color": "#FF6B6B",
            "createdAt": "2024-01-01T00:00:00.000Z"
        }))
        .unwrap();
        assert!(p.enabled);
    }

    #[test]
    fn history_entry_uses_stored_field_names() {
        let entry = HistoryEntry {
            id: "h1".into(),
            participant_id: "p1".into(),
            participant_name: "Alice".into(),
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            sequence_number: 3,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["userId"], "p1");
        assert_eq!(value["userName"], "Alice");
        assert_eq!(value["spinNumber"], 3);
    }

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        assert_eq!(Settings::from_stored(None), Settings::default());

        let stored = json!({ "spinDuration": 3, "darkMode": true });
        let settings = Settings::from_stored(Some(&stored));
        assert_eq!(settings.spin_duration_secs, 3.0);
        assert!(settings.dark_mode);
        assert_eq!(settings.title, DEFAULT_WHEEL_TITLE);
        assert_eq!(settings.rotation_direction, RotationDirection::Clockwise);
    }

    #[test]
    fn malformed_settings_keys_are_replaced_individually() {
        let stored = json!({
            "rotationDirection": "sideways",
            "animationSpeed": -2.0,
            "wheelTitle": "Standup",
            "appTitle": "ignored"
        });
        let settings = Settings::from_stored(Some(&stored));
        assert_eq!(settings.rotation_direction, RotationDirection::Clockwise);
        assert_eq!(settings.animation_speed, DEFAULT_ANIMATION_SPEED);
        assert_eq!(settings.title, "Standup");
    }

    #[test]
    fn counter_clockwise_round_trips_with_kebab_case() {
        let stored = json!({ "rotationDirection": "counter-clockwise" });
        let settings = Settings::from_stored(Some(&stored));
        assert_eq!(settings.rotation_direction, RotationDirection::CounterClockwise);
        assert_eq!(settings.rotation_direction.sign(), -1.0);
    }

    #[test]
    fn merge_rejects_unknown_keys_and_bad_ranges() {
        let base = Settings::default();
        assert!(matches!(
            base.merged_with(&json!({ "volume": 3 })),
            Err(WheelError::InvalidSetting { .. })
        ));
        assert!(base.merged_with(&json!({ "spinDuration": 0 })).is_err());

        let updated = base
            .merged_with(&json!({ "spinDuration": 4, "wheelTitle": "  " }))
            .unwrap();
        assert_eq!(updated.spin_duration_secs, 4.0);
        assert_eq!(updated.title, DEFAULT_WHEEL_TITLE);
    }

    #[test]
    fn animation_duration_scales_with_speed() {
        let settings = Settings {
            spin_duration_secs: 6.0,
            animation_speed: 0.5,
            ..Settings::default()
        };
        assert_eq!(settings.animation_duration_secs(), 3.0);
    }

    #[test]
    fn view_section_parses_known_names() {
        assert_eq!("history".parse::<ViewSection>().unwrap(), ViewSection::History);
        assert!("attic".parse::<ViewSection>().is_err());
    }
}
