//! Application-level configuration constants.

// Persistence
pub const STORAGE_NAMESPACE: &str = "SpinningWheel";
pub const SHARE_QUERY_PARAM: &str = "share";
pub const EXPORT_VERSION: &str = "1.0";

// Participant limits
pub const MAX_PARTICIPANTS: usize = 20;
pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 15;
pub const MIN_SPIN_PARTICIPANTS: usize = 2;

// History
pub const HISTORY_CAPACITY: usize = 500;

// Selection & rotation
pub const MAX_REROLLS: usize = 10;
pub const FULL_ROTATIONS: f64 = 5.0;
pub const POINTER_ANGLE_DEG: f64 = 90.0;
pub const DEGREES_PER_TURN: f64 = 360.0;

// Default values for settings
pub const DEFAULT_SPIN_DURATION_SECS: f64 = 7.0;
pub const DEFAULT_ANIMATION_SPEED: f64 = 1.0;
pub const DEFAULT_WHEEL_TITLE: &str = "Pick a Winner";

// Min/Max limits for settings inputs
pub const MIN_SPIN_DURATION_SECS: f64 = 1.0;
pub const MAX_SPIN_DURATION_SECS: f64 = 20.0;
pub const MAX_ANIMATION_SPEED: f64 = 5.0;
pub const MAX_TITLE_LEN: usize = 40;

/// Colors offered to the user when adding a participant.
pub const COLOR_PALETTE: [&str; 22] = [
    "#FF6B6B", "#4ECDC4", "#FFE66D", "#95E1D3", "#C7CEEA", "#FF8C42", "#FB5607", "#06D6A0",
    "#EF476F", "#FFD166", "#06FFA5", "#FF006E", "#9B59B6", "#3498DB", "#E74C3C", "#F39C12",
    "#1ABC9C", "#2ECC71", "#E91E63", "#00BCD4", "#FF5722", "#8E44AD",
];
