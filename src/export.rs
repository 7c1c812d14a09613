//! JSON backups of the whole wheel and bulk import (full replace).

use crate::config::EXPORT_VERSION;
use crate::model::{HistoryEntry, Participant, Settings, ViewSection};
use crate::stats::{compute_statistics, Statistics};
use crate::store::{
    normalize_history, validate_roster, Backend, EntityStore, FirstVisitFlag, KEY_FIRST_VISIT,
    KEY_HISTORY, KEY_LAST_SELECTED, KEY_LAST_VIEW, KEY_SETTINGS, KEY_USERS,
};
use crate::utils::now_timestamp;
use crate::WheelError;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Everything the store holds, plus derived statistics for convenience.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    pub users: Vec<Participant>,
    pub history: Vec<HistoryEntry>,
    pub settings: Settings,
    pub last_selected: Option<String>,
    pub last_view: ViewSection,
    /// Whether onboarding has been completed.
    pub first_visit: bool,
    pub statistics: Statistics,
    pub export_date: String,
    pub version: String,
}

/// History-only export: the log with the participants it is tallied against.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryExport {
    pub export_date: String,
    pub users: Vec<Participant>,
    pub history: Vec<HistoryEntry>,
    pub statistics: Statistics,
}

pub fn export_all<B: Backend>(store: &EntityStore<B>) -> DataExport {
    let snapshot = store.load();
    let statistics = compute_statistics(&snapshot.users, &snapshot.history);
    DataExport {
        settings: snapshot.settings(),
        last_view: snapshot.last_view(),
        first_visit: snapshot.first_run_completed(),
        last_selected: snapshot.last_selected,
        users: snapshot.users,
        history: snapshot.history,
        statistics,
        export_date: now_timestamp(),
        version: EXPORT_VERSION.to_string(),
    }
}

pub fn export_history<B: Backend>(store: &EntityStore<B>) -> HistoryExport {
    let snapshot = store.load();
    HistoryExport {
        export_date: now_timestamp(),
        statistics: compute_statistics(&snapshot.users, &snapshot.history),
        users: snapshot.users,
        history: snapshot.history,
    }
}

/// Replace every section present in `data`. All sections are validated before
/// anything is written, so a rejected import leaves the store untouched.
pub fn import_all<B: Backend>(store: &mut EntityStore<B>, data: &Value) -> Result<(), WheelError> {
    let data = data
        .as_object()
        .ok_or_else(|| WheelError::InvalidImport("expected a JSON object".to_string()))?;

    let users: Option<Vec<Participant>> = section(data, KEY_USERS)?;
    if let Some(users) = &users {
        validate_roster(users)?;
    }
    let history = section::<Vec<HistoryEntry>>(data, KEY_HISTORY)?
        .map(normalize_history)
        .transpose()?;
    let settings = match data.get(KEY_SETTINGS) {
        Some(value @ Value::Object(_)) => {
            let settings = Settings::from_stored(Some(value));
            Some(serde_json::to_value(&settings).map_err(|e| WheelError::Encode(e.to_string()))?)
        }
        Some(Value::Null) | None => None,
        Some(_) => {
            return Err(WheelError::InvalidImport(
                "settings must be an object".to_string(),
            ))
        }
    };
    let last_selected: Option<String> = section(data, KEY_LAST_SELECTED)?;
    let last_view = section::<String>(data, KEY_LAST_VIEW)?.and_then(|view| {
        match view.parse::<ViewSection>() {
            Ok(ViewSection::Welcome) => None,
            Ok(parsed) => Some(parsed.as_str().to_string()),
            Err(e) => {
                warn!("Skipping imported view: {}", e);
                None
            }
        }
    });
    let first_visit: Option<FirstVisitFlag> = section(data, KEY_FIRST_VISIT)?;

    store.mutate(|snapshot| {
        if let Some(users) = users {
            snapshot.users = users;
        }
        if let Some(history) = history {
            snapshot.history = history;
        }
        if settings.is_some() {
            snapshot.settings = settings;
        }
        if last_selected.is_some() {
            snapshot.last_selected = last_selected;
        }
        if last_view.is_some() {
            snapshot.last_view = last_view;
        }
        if first_visit.is_some() {
            snapshot.first_visit = first_visit;
        }
        Ok(())
    })?;

    info!("Imported wheel data");
    Ok(())
}

fn section<T: DeserializeOwned>(data: &Map<String, Value>, key: &str) -> Result<Option<T>, WheelError> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| WheelError::InvalidImport(format!("'{}': {}", key, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use serde_json::json;

    fn populated() -> EntityStore<MemoryBackend> {
        let mut store = EntityStore::new(MemoryBackend::new());
        let alice = store.add_participant("Alice", "#FF6B6B").unwrap();
        let bob = store.add_participant("Bob", "#4ECDC4").unwrap();
        store.record_spin(&alice);
        store.record_spin(&bob);
        store.record_spin(&bob);
        store.set_last_view(ViewSection::History);
        store.mark_first_visit_done();
        store
    }

    #[test]
    fn export_carries_every_section() {
        let store = populated();
        let export = export_all(&store);
        assert_eq!(export.users.len(), 2);
        assert_eq!(export.history.len(), 3);
        assert_eq!(export.last_view, ViewSection::History);
        assert!(export.first_visit);
        assert_eq!(export.version, "1.0");
        assert_eq!(export.statistics.total_spins, 3);
        assert_eq!(export.last_selected, Some(export.users[1].id.clone()));

        let value = serde_json::to_value(&export).unwrap();
        assert!(value.get("exportDate").is_some());
        assert_eq!(value["history"][0]["spinNumber"], 1);
    }

    #[test]
    fn export_then_import_restores_a_fresh_store() {
        let source = populated();
        let backup = serde_json::to_value(export_all(&source)).unwrap();

        let mut target = EntityStore::new(MemoryBackend::new());
        import_all(&mut target, &backup).unwrap();

        assert_eq!(target.participants(), source.participants());
        assert_eq!(target.history(), source.history());
        assert_eq!(target.settings(), source.settings());
        assert_eq!(target.session_markers(), source.session_markers());
        assert_eq!(target.statistics(), source.statistics());
    }

    #[test]
    fn history_export_includes_statistics() {
        let store = populated();
        let export = export_history(&store);
        assert_eq!(export.history.len(), 3);
        let bob = &export.users[1];
        assert_eq!(export.statistics.get(&bob.id).unwrap().current_streak, 2);
    }

    #[test]
    fn partial_import_keeps_other_sections() {
        let mut store = populated();
        let before = store.participants();
        import_all(&mut store, &json!({ "history": [] })).unwrap();
        assert!(store.history().is_empty());
        assert_eq!(store.participants(), before);
    }

    #[test]
    fn rejected_import_changes_nothing() {
        let mut store = populated();
        let before = export_all(&store);

        let dupes = json!({
            "users": [
                { "id": "1", "name": "Alice", "color": "#FF6B6B" },
                { "id": "2", "name": "ALICE", "color": "#FF6B6B" }
            ],
            "history": []
        });
        assert!(matches!(
            import_all(&mut store, &dupes),
            Err(WheelError::DuplicateName(_))
        ));
        assert!(import_all(&mut store, &json!({ "history": "nope" })).is_err());
        assert!(import_all(&mut store, &json!([1, 2, 3])).is_err());

        assert_eq!(store.participants(), before.users);
        assert_eq!(store.history(), before.history);
    }

    #[test]
    fn imports_legacy_string_flags() {
        let mut store = EntityStore::new(MemoryBackend::new());
        import_all(
            &mut store,
            &json!({ "users": [], "firstVisit": "true", "lastView": "welcome" }),
        )
        .unwrap();
        assert!(store.session_markers().first_run_completed);
        assert_eq!(store.last_view(), ViewSection::Wheel);
    }
}
