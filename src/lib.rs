//! Selection and statistics engine for a spin-the-wheel participant picker.
//!
//! The presentation layer (JavaScript, through [`bindings`]) asks for a spin,
//! animates the returned [`SpinPlan`], then commits the winner back into the
//! [`EntityStore`]. Statistics are recomputed from the history log on demand.

use std::fmt;

pub mod bindings;
pub mod config;
pub mod export;
pub mod model;
pub mod selection;
pub mod share;
pub mod stats;
pub mod store;
pub mod utils;

pub use model::{
    HistoryEntry, Participant, ParticipantPatch, RotationDirection, SessionMarkers, Settings,
    SliceAnimation, ViewSection, WinnerEffect,
};
pub use selection::{normalize_rotation, rotation_target, select, Selection, SpinPlan, Spinner};
pub use share::SharedState;
pub use stats::{compute_statistics, ParticipantStats, Statistics};
pub use store::{Backend, EntityStore, LocalStorageBackend, MemoryBackend};

#[derive(Debug, Clone, PartialEq)]
pub enum WheelError {
    /// Participant name outside the allowed length (in characters).
    NameLength { len: usize },
    DuplicateName(String),
    CapacityExceeded { max: usize },
    InvalidColor(String),
    InvalidSetting { field: String, reason: String },
    ParticipantNotFound(String),
    /// A spin needs at least two enabled participants.
    InsufficientParticipants { needed: usize, available: usize },
    Encode(String),
    /// Malformed share token; callers ignore the link.
    Decode(String),
    /// Read or write against the storage substrate failed.
    Persistence(String),
    InvalidImport(String),
}

impl WheelError {
    /// Name, color, capacity and setting problems the user can correct.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WheelError::NameLength { .. }
                | WheelError::DuplicateName(_)
                | WheelError::CapacityExceeded { .. }
                | WheelError::InvalidColor(_)
                | WheelError::InvalidSetting { .. }
        )
    }
}

impl fmt::Display for WheelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WheelError::NameLength { len } => write!(
                f,
                "Name must be between {} and {} characters (got {})",
                config::MIN_NAME_LEN,
                config::MAX_NAME_LEN,
                len
            ),
            WheelError::DuplicateName(name) => write!(f, "The name '{}' already exists", name),
            WheelError::CapacityExceeded { max } => {
                write!(f, "Maximum {} participants reached", max)
            }
            WheelError::InvalidColor(color) => write!(f, "Invalid color '{}'", color),
            WheelError::InvalidSetting { field, reason } => {
                write!(f, "Invalid setting {}: {}", field, reason)
            }
            WheelError::ParticipantNotFound(id) => write!(f, "No participant with id '{}'", id),
            WheelError::InsufficientParticipants { needed, available } => write!(
                f,
                "Add at least {} participants before spinning ({} enabled)",
                needed, available
            ),
            WheelError::Encode(msg) => write!(f, "Failed to encode wheel state: {}", msg),
            WheelError::Decode(msg) => write!(f, "Invalid shared wheel: {}", msg),
            WheelError::Persistence(msg) => write!(f, "Storage error: {}", msg),
            WheelError::InvalidImport(msg) => write!(f, "Invalid import data: {}", msg),
        }
    }
}

impl std::error::Error for WheelError {}
