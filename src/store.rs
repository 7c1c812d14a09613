//! Entity store over a namespaced key/value persistence substrate.
//!
//! Every call reads the full namespaced record, mutates an in-memory copy and
//! writes the whole record back. Mutating calls take `&mut self`, so one
//! logical operation can never interleave with another mid-write.
//!
//! Persistence failures never escalate: reads degrade to defaults and writes
//! are best-effort, both logged.

use crate::config::{HISTORY_CAPACITY, MAX_PARTICIPANTS, STORAGE_NAMESPACE};
use crate::model::{
    HistoryEntry, Participant, ParticipantPatch, SessionMarkers, Settings, ViewSection,
};
use crate::share::SharedState;
use crate::stats::{compute_statistics, Statistics};
use crate::utils::{new_id, now_timestamp, validate_color, validate_name};
use crate::WheelError;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

pub(crate) const KEY_USERS: &str = "users";
pub(crate) const KEY_HISTORY: &str = "history";
pub(crate) const KEY_SETTINGS: &str = "settings";
pub(crate) const KEY_LAST_VIEW: &str = "lastView";
pub(crate) const KEY_FIRST_VISIT: &str = "firstVisit";
pub(crate) const KEY_LAST_SELECTED: &str = "lastSelected";

/// Key/value persistence substrate holding one structured record per namespace.
pub trait Backend {
    fn get(&self, namespace: &str) -> Result<Option<Value>, WheelError>;
    fn set(&mut self, namespace: &str, value: &Value) -> Result<(), WheelError>;
    fn remove(&mut self, namespace: &str) -> Result<(), WheelError>;
}

/// In-process backend, used by tests and non-browser hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: HashMap<String, Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, namespace: &str) -> Result<Option<Value>, WheelError> {
        Ok(self.records.get(namespace).cloned())
    }

    fn set(&mut self, namespace: &str, value: &Value) -> Result<(), WheelError> {
        self.records.insert(namespace.to_string(), value.clone());
        Ok(())
    }

    fn remove(&mut self, namespace: &str) -> Result<(), WheelError> {
        self.records.remove(namespace);
        Ok(())
    }
}

/// Browser `localStorage`, one JSON document per namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorageBackend;

impl Backend for LocalStorageBackend {
    fn get(&self, namespace: &str) -> Result<Option<Value>, WheelError> {
        use gloo_storage::errors::StorageError;
        use gloo_storage::{LocalStorage, Storage};

        match LocalStorage::get::<Value>(namespace) {
            Ok(value) => Ok(Some(value)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(WheelError::Persistence(e.to_string())),
        }
    }

    fn set(&mut self, namespace: &str, value: &Value) -> Result<(), WheelError> {
        use gloo_storage::{LocalStorage, Storage};

        LocalStorage::set(namespace, value).map_err(|e| WheelError::Persistence(e.to_string()))
    }

    fn remove(&mut self, namespace: &str) -> Result<(), WheelError> {
        use gloo_storage::{LocalStorage, Storage};

        LocalStorage::delete(namespace);
        Ok(())
    }
}

/// `firstVisit` was historically stored as the strings `"false"`/`"true"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum FirstVisitFlag {
    Flag(bool),
    Legacy(String),
}

impl FirstVisitFlag {
    pub(crate) fn completed(&self) -> bool {
        match self {
            FirstVisitFlag::Flag(done) => *done,
            FirstVisitFlag::Legacy(text) => text == "true",
        }
    }
}

/// Decoded namespaced record. Keys this crate does not know are carried in
/// `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Snapshot {
    pub users: Vec<Participant>,
    pub history: Vec<HistoryEntry>,
    /// Raw so that defaults are resolved on read and never written eagerly.
    pub settings: Option<Value>,
    pub last_view: Option<String>,
    pub first_visit: Option<FirstVisitFlag>,
    pub last_selected: Option<String>,
    pub extra: Map<String, Value>,
}

impl Snapshot {
    /// Decode key by key so one corrupt section does not discard the others.
    pub(crate) fn from_record(record: Value) -> Self {
        let mut map = match record {
            Value::Object(map) => map,
            other => {
                warn!("Namespaced record is not an object ({}), using defaults", other);
                return Self::default();
            }
        };

        Self {
            users: take_rows(&mut map, KEY_USERS),
            history: take_rows(&mut map, KEY_HISTORY),
            settings: map.remove(KEY_SETTINGS).filter(|v| !v.is_null()),
            last_view: take_key(&mut map, KEY_LAST_VIEW),
            first_visit: take_key(&mut map, KEY_FIRST_VISIT),
            last_selected: take_key(&mut map, KEY_LAST_SELECTED),
            extra: map,
        }
    }

    pub(crate) fn to_record(&self) -> Result<Value, WheelError> {
        let encode = |value: Result<Value, serde_json::Error>| {
            value.map_err(|e| WheelError::Persistence(e.to_string()))
        };

        let mut map = self.extra.clone();
        map.insert(KEY_USERS.to_string(), encode(serde_json::to_value(&self.users))?);
        map.insert(KEY_HISTORY.to_string(), encode(serde_json::to_value(&self.history))?);
        if let Some(settings) = &self.settings {
            map.insert(KEY_SETTINGS.to_string(), settings.clone());
        }
        if let Some(view) = &self.last_view {
            map.insert(KEY_LAST_VIEW.to_string(), Value::String(view.clone()));
        }
        if let Some(flag) = &self.first_visit {
            map.insert(KEY_FIRST_VISIT.to_string(), encode(serde_json::to_value(flag))?);
        }
        if let Some(id) = &self.last_selected {
            map.insert(KEY_LAST_SELECTED.to_string(), Value::String(id.clone()));
        }
        Ok(Value::Object(map))
    }

    pub(crate) fn settings(&self) -> Settings {
        Settings::from_stored(self.settings.as_ref())
    }

    pub(crate) fn last_view(&self) -> ViewSection {
        self.last_view
            .as_deref()
            .and_then(|view| view.parse().ok())
            .filter(|view| *view != ViewSection::Welcome)
            .unwrap_or_default()
    }

    pub(crate) fn first_run_completed(&self) -> bool {
        self.first_visit
            .as_ref()
            .map(FirstVisitFlag::completed)
            .unwrap_or(false)
    }
}

fn take_key<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.remove(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!("Discarding unreadable '{}' section: {}", key, e);
            None
        }
    }
}

/// Decode a list section row by row. Unreadable rows are skipped so that one
/// bad entry cannot take the rest of the section down with it on the next write.
fn take_rows<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Vec<T> {
    let rows = match map.remove(key) {
        Some(Value::Array(rows)) => rows,
        None | Some(Value::Null) => return Vec::new(),
        Some(other) => {
            warn!("Discarding '{}' section that is not a list: {}", key, other);
            return Vec::new();
        }
    };

    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(i, row)| match serde_json::from_value(row) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Skipping unreadable '{}' row {}: {}", key, i, e);
                None
            }
        })
        .collect();
    if decoded.len() < total {
        warn!("Kept {} of {} '{}' rows", decoded.len(), total, key);
    }
    decoded
}

/// Check a whole participant roster: names, colors, ids and capacity.
pub(crate) fn validate_roster(participants: &[Participant]) -> Result<(), WheelError> {
    if participants.len() > MAX_PARTICIPANTS {
        return Err(WheelError::CapacityExceeded {
            max: MAX_PARTICIPANTS,
        });
    }
    let mut ids = HashSet::new();
    for (i, participant) in participants.iter().enumerate() {
        if !ids.insert(participant.id.as_str()) {
            return Err(WheelError::InvalidImport(format!(
                "duplicate participant id '{}'",
                participant.id
            )));
        }
        let name = validate_name(&participant.name, &participants[..i], None)?;
        if name != participant.name {
            return Err(WheelError::InvalidImport(format!(
                "participant name '{}' has surrounding whitespace",
                participant.name
            )));
        }
        validate_color(&participant.color)?;
    }
    Ok(())
}

/// Check an imported log and trim it to the newest [`HISTORY_CAPACITY`] entries.
pub(crate) fn normalize_history(
    mut history: Vec<HistoryEntry>,
) -> Result<Vec<HistoryEntry>, WheelError> {
    let mut previous = 0;
    for entry in &history {
        if entry.sequence_number <= previous {
            return Err(WheelError::InvalidImport(format!(
                "spin number {} does not follow {}",
                entry.sequence_number, previous
            )));
        }
        previous = entry.sequence_number;
    }
    if history.len() > HISTORY_CAPACITY {
        let excess = history.len() - HISTORY_CAPACITY;
        history.drain(..excess);
    }
    Ok(history)
}

/// Participants, history, settings and session markers of one wheel.
pub struct EntityStore<B: Backend> {
    backend: B,
    namespace: String,
}

impl<B: Backend> EntityStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_namespace(backend, STORAGE_NAMESPACE)
    }

    pub fn with_namespace(backend: B, namespace: &str) -> Self {
        Self {
            backend,
            namespace: namespace.to_string(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn load(&self) -> Snapshot {
        match self.backend.get(&self.namespace) {
            Ok(Some(record)) => Snapshot::from_record(record),
            Ok(None) => Snapshot::default(),
            Err(e) => {
                warn!("Error reading namespaced storage, using defaults: {}", e);
                Snapshot::default()
            }
        }
    }

    fn save(&mut self, snapshot: &Snapshot) {
        let written = snapshot
            .to_record()
            .and_then(|record| self.backend.set(&self.namespace, &record));
        if let Err(e) = written {
            warn!("Error saving namespaced storage: {}", e);
        }
    }

    /// Read-modify-write cycle. Nothing is written when `f` fails.
    pub(crate) fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut Snapshot) -> Result<T, WheelError>,
    ) -> Result<T, WheelError> {
        let mut snapshot = self.load();
        let out = f(&mut snapshot)?;
        self.save(&snapshot);
        Ok(out)
    }

    // ==================== PARTICIPANTS ====================

    pub fn participants(&self) -> Vec<Participant> {
        self.load().users
    }

    /// Participants currently on the wheel, in wheel order.
    pub fn enabled_participants(&self) -> Vec<Participant> {
        self.load().users.into_iter().filter(|p| p.enabled).collect()
    }

    pub fn get_participant(&self, id: &str) -> Option<Participant> {
        self.load().users.into_iter().find(|p| p.id == id)
    }

    /// Case-insensitive lookup among current participants.
    pub fn participant_exists(&self, name: &str) -> bool {
        let lowered = name.trim().to_lowercase();
        self.load()
            .users
            .iter()
            .any(|p| p.name.to_lowercase() == lowered)
    }

    pub fn add_participant(&mut self, name: &str, color: &str) -> Result<Participant, WheelError> {
        self.mutate(|snapshot| {
            let name = validate_name(name, &snapshot.users, None)?;
            if snapshot.users.len() >= MAX_PARTICIPANTS {
                return Err(WheelError::CapacityExceeded {
                    max: MAX_PARTICIPANTS,
                });
            }
            let color = validate_color(color)?;

            let participant = Participant {
                id: new_id(),
                name,
                color,
                enabled: true,
                created_at: now_timestamp(),
            };
            info!("Added participant '{}'", participant.name);
            snapshot.users.push(participant.clone());
            Ok(participant)
        })
    }

    pub fn update_participant(
        &mut self,
        id: &str,
        patch: &ParticipantPatch,
    ) -> Result<Participant, WheelError> {
        self.mutate(|snapshot| {
            let name = patch
                .name
                .as_deref()
                .map(|name| validate_name(name, &snapshot.users, Some(id)))
                .transpose()?;
            let color = patch.color.as_deref().map(validate_color).transpose()?;

            let participant = snapshot
                .users
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| WheelError::ParticipantNotFound(id.to_string()))?;
            if let Some(name) = name {
                participant.name = name;
            }
            if let Some(color) = color {
                participant.color = color;
            }
            Ok(participant.clone())
        })
    }

    pub fn toggle_participant_enabled(&mut self, id: &str) -> Result<Participant, WheelError> {
        self.mutate(|snapshot| {
            let participant = snapshot
                .users
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| WheelError::ParticipantNotFound(id.to_string()))?;
            participant.enabled = !participant.enabled;
            debug!(
                "Participant '{}' is now {}",
                participant.name,
                if participant.enabled { "enabled" } else { "disabled" }
            );
            Ok(participant.clone())
        })
    }

    /// Remove a participant. Their history entries are kept. Returns whether
    /// anything was removed.
    pub fn delete_participant(&mut self, id: &str) -> bool {
        let mut snapshot = self.load();
        let before = snapshot.users.len();
        snapshot.users.retain(|p| p.id != id);
        if snapshot.users.len() == before {
            return false;
        }
        self.save(&snapshot);
        info!("Deleted participant {}", id);
        true
    }

    /// Full replace of the roster after validating it as a whole.
    pub fn replace_participants(&mut self, participants: Vec<Participant>) -> Result<(), WheelError> {
        validate_roster(&participants)?;
        self.mutate(|snapshot| {
            snapshot.users = participants;
            Ok(())
        })
    }

    // ==================== HISTORY ====================

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.load().history
    }

    /// Append an entry for `participant`, evicting the oldest entries beyond
    /// [`HISTORY_CAPACITY`]. Retained entries keep their spin numbers.
    pub fn append_history(&mut self, participant: &Participant) -> HistoryEntry {
        let mut snapshot = self.load();
        let entry = push_entry(&mut snapshot.history, participant);
        self.save(&snapshot);
        entry
    }

    /// Commit a finished spin: append to history and remember the winner for
    /// the anti-repeat policy, in one write.
    pub fn record_spin(&mut self, participant: &Participant) -> HistoryEntry {
        let mut snapshot = self.load();
        let entry = push_entry(&mut snapshot.history, participant);
        snapshot.last_selected = Some(participant.id.clone());
        self.save(&snapshot);
        info!(
            "Spin #{}: '{}' recorded",
            entry.sequence_number, entry.participant_name
        );
        entry
    }

    pub fn clear_history(&mut self) {
        let mut snapshot = self.load();
        snapshot.history.clear();
        self.save(&snapshot);
        info!("History cleared");
    }

    /// Full replace of the log (bulk import).
    pub fn replace_history(&mut self, history: Vec<HistoryEntry>) -> Result<(), WheelError> {
        let history = normalize_history(history)?;
        self.mutate(|snapshot| {
            snapshot.history = history;
            Ok(())
        })
    }

    pub fn statistics(&self) -> Statistics {
        let snapshot = self.load();
        compute_statistics(&snapshot.users, &snapshot.history)
    }

    // ==================== SETTINGS ====================

    pub fn settings(&self) -> Settings {
        self.load().settings()
    }

    /// Merge a partial settings record (stored key names) into the current
    /// settings and persist the result.
    pub fn update_settings(&mut self, patch: &Value) -> Result<Settings, WheelError> {
        self.mutate(|snapshot| {
            let updated = snapshot.settings().merged_with(patch)?;
            snapshot.settings = Some(settings_record(&updated)?);
            Ok(updated)
        })
    }

    pub fn set_settings(&mut self, settings: &Settings) -> Result<(), WheelError> {
        settings.validate()?;
        let record = settings_record(settings)?;
        self.mutate(|snapshot| {
            snapshot.settings = Some(record);
            Ok(())
        })
    }

    // ==================== SESSION MARKERS ====================

    pub fn session_markers(&self) -> SessionMarkers {
        let snapshot = self.load();
        SessionMarkers {
            last_selected_participant_id: snapshot.last_selected.clone(),
            last_viewed_section: snapshot.last_view(),
            first_run_completed: snapshot.first_run_completed(),
        }
    }

    pub fn last_selected(&self) -> Option<String> {
        self.load().last_selected
    }

    pub fn set_last_selected(&mut self, id: Option<&str>) {
        let mut snapshot = self.load();
        snapshot.last_selected = id.map(str::to_string);
        self.save(&snapshot);
    }

    pub fn last_view(&self) -> ViewSection {
        self.load().last_view()
    }

    /// The transient welcome section is never persisted.
    pub fn set_last_view(&mut self, view: ViewSection) {
        if view == ViewSection::Welcome {
            return;
        }
        let mut snapshot = self.load();
        snapshot.last_view = Some(view.as_str().to_string());
        self.save(&snapshot);
    }

    /// First visit until onboarding is completed or someone has been added.
    pub fn is_first_visit(&self) -> bool {
        let snapshot = self.load();
        !snapshot.first_run_completed() && snapshot.users.is_empty()
    }

    pub fn mark_first_visit_done(&mut self) {
        let mut snapshot = self.load();
        snapshot.first_visit = Some(FirstVisitFlag::Flag(true));
        self.save(&snapshot);
    }

    // ==================== SHARING & RESET ====================

    /// Replace participants and settings with a decoded shared wheel.
    pub fn apply_shared_state(&mut self, state: SharedState) -> Result<(), WheelError> {
        validate_roster(&state.participants)?;
        state.settings.validate()?;
        let settings = settings_record(&state.settings)?;
        self.mutate(|snapshot| {
            snapshot.users = state.participants;
            snapshot.settings = Some(settings);
            Ok(())
        })?;
        info!("Applied shared wheel configuration");
        Ok(())
    }

    /// Drop the whole namespaced record.
    pub fn reset_all(&mut self) {
        if let Err(e) = self.backend.remove(&self.namespace) {
            warn!("Error clearing namespaced storage: {}", e);
        }
        info!("All wheel data reset");
    }
}

fn push_entry(history: &mut Vec<HistoryEntry>, participant: &Participant) -> HistoryEntry {
    let sequence_number = history.last().map(|e| e.sequence_number + 1).unwrap_or(1);
    let entry = HistoryEntry {
        id: new_id(),
        participant_id: participant.id.clone(),
        participant_name: participant.name.clone(),
        timestamp: now_timestamp(),
        sequence_number,
    };
    history.push(entry.clone());

    if history.len() > HISTORY_CAPACITY {
        let excess = history.len() - HISTORY_CAPACITY;
        history.drain(..excess);
        debug!("Evicted {} oldest history entries", excess);
    }
    entry
}

fn settings_record(settings: &Settings) -> Result<Value, WheelError> {
    serde_json::to_value(settings).map_err(|e| WheelError::Persistence(e.to_string()))
}
