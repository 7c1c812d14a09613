//! JavaScript entry points.
//!
//! The page script owns rendering, timers and dialogs; it drives the engine
//! through [`WheelEngine`] and receives plain JSON-compatible objects back.
//! Engine errors cross the boundary as string exceptions.

use crate::config::COLOR_PALETTE;
use crate::export::{export_all, export_history, import_all};
use crate::model::{Participant, ParticipantPatch, ViewSection};
use crate::selection::Spinner;
use crate::share::{decode, decode_or_ignore, encode, share_link, token_from_query};
use crate::store::{EntityStore, LocalStorageBackend};
use crate::WheelError;
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    // JSON-compatible so maps arrive as plain objects, not `Map`s
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

fn from_js(value: JsValue) -> Result<Value, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(JsValue::from)
}

fn js_error(e: WheelError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Install the panic hook so Rust panics show up in the browser console.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen(js_name = colorPalette)]
pub fn color_palette() -> Result<JsValue, JsValue> {
    to_js(&COLOR_PALETTE[..])
}

/// Engine handle backed by `localStorage`.
#[wasm_bindgen]
pub struct WheelEngine {
    store: EntityStore<LocalStorageBackend>,
    spinner: Spinner,
    /// Winner of the spin currently being animated.
    pending: Option<Participant>,
}

impl Default for WheelEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WheelEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WheelEngine {
        WheelEngine {
            store: EntityStore::new(LocalStorageBackend),
            spinner: Spinner::new(),
            pending: None,
        }
    }

    // ==================== SPINNING ====================

    /// Pick a winner and return `{ index, participant, startRotation,
    /// targetRotation, durationSecs }`. Nothing is recorded until
    /// [`WheelEngine::complete_spin`] is called after the animation.
    ///
    /// # Errors
    /// Throws when a spin is already running or fewer than two participants
    /// are enabled.
    pub fn spin(&mut self) -> Result<JsValue, JsValue> {
        if self.pending.is_some() {
            return Err(JsValue::from_str("A spin is already in progress"));
        }
        let enabled = self.store.enabled_participants();
        let last_selected = self.store.last_selected();
        let settings = self.store.settings();

        let plan = self
            .spinner
            .plan(&enabled, last_selected.as_deref(), &settings, &mut rand::rng())
            .map_err(js_error)?;
        self.pending = Some(plan.participant.clone());
        to_js(&plan)
    }

    /// Record the pending winner in history and return the new entry.
    #[wasm_bindgen(js_name = completeSpin)]
    pub fn complete_spin(&mut self) -> Result<JsValue, JsValue> {
        let winner = self
            .pending
            .take()
            .ok_or_else(|| JsValue::from_str("No spin in progress"))?;
        let entry = self.store.record_spin(&winner);
        to_js(&entry)
    }

    #[wasm_bindgen(js_name = isSpinning)]
    pub fn is_spinning(&self) -> bool {
        self.pending.is_some()
    }

    #[wasm_bindgen(js_name = canSpin)]
    pub fn can_spin(&self) -> bool {
        self.pending.is_none()
            && self.store.enabled_participants().len() >= crate::config::MIN_SPIN_PARTICIPANTS
    }

    /// Current wheel rotation in degrees, already normalized.
    pub fn rotation(&self) -> f64 {
        self.spinner.rotation()
    }

    // ==================== PARTICIPANTS ====================

    pub fn participants(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.participants())
    }

    #[wasm_bindgen(js_name = enabledParticipants)]
    pub fn enabled_participants(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.enabled_participants())
    }

    #[wasm_bindgen(js_name = participantExists)]
    pub fn participant_exists(&self, name: &str) -> bool {
        self.store.participant_exists(name)
    }

    #[wasm_bindgen(js_name = addParticipant)]
    pub fn add_participant(&mut self, name: &str, color: &str) -> Result<JsValue, JsValue> {
        let participant = self.store.add_participant(name, color).map_err(js_error)?;
        to_js(&participant)
    }

    /// `patch` is `{ name?, color? }`.
    #[wasm_bindgen(js_name = updateParticipant)]
    pub fn update_participant(&mut self, id: &str, patch: JsValue) -> Result<JsValue, JsValue> {
        let patch: ParticipantPatch = serde_wasm_bindgen::from_value(patch)?;
        let participant = self
            .store
            .update_participant(id, &patch)
            .map_err(js_error)?;
        to_js(&participant)
    }

    #[wasm_bindgen(js_name = toggleParticipant)]
    pub fn toggle_participant(&mut self, id: &str) -> Result<JsValue, JsValue> {
        let participant = self
            .store
            .toggle_participant_enabled(id)
            .map_err(js_error)?;
        to_js(&participant)
    }

    #[wasm_bindgen(js_name = deleteParticipant)]
    pub fn delete_participant(&mut self, id: &str) -> bool {
        self.store.delete_participant(id)
    }

    // ==================== HISTORY & STATISTICS ====================

    pub fn history(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.history())
    }

    #[wasm_bindgen(js_name = clearHistory)]
    pub fn clear_history(&mut self) {
        self.store.clear_history();
    }

    /// `{ totalSpins, byParticipant: { [id]: { participant, winCount,
    /// percentage, currentStreak, longestStreak } } }`
    pub fn statistics(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.statistics())
    }

    /// Statistics records sorted by win count, most wins first.
    #[wasm_bindgen(js_name = rankedStatistics)]
    pub fn ranked_statistics(&self) -> Result<JsValue, JsValue> {
        let statistics = self.store.statistics();
        to_js(&statistics.ranked())
    }

    // ==================== SETTINGS & MARKERS ====================

    pub fn settings(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.settings())
    }

    #[wasm_bindgen(js_name = updateSettings)]
    pub fn update_settings(&mut self, patch: JsValue) -> Result<JsValue, JsValue> {
        let patch = from_js(patch)?;
        let settings = self.store.update_settings(&patch).map_err(js_error)?;
        to_js(&settings)
    }

    #[wasm_bindgen(js_name = lastView)]
    pub fn last_view(&self) -> String {
        self.store.last_view().to_string()
    }

    #[wasm_bindgen(js_name = setLastView)]
    pub fn set_last_view(&mut self, view: &str) -> Result<(), JsValue> {
        let view: ViewSection = view.parse().map_err(js_error)?;
        self.store.set_last_view(view);
        Ok(())
    }

    #[wasm_bindgen(js_name = isFirstVisit)]
    pub fn is_first_visit(&self) -> bool {
        self.store.is_first_visit()
    }

    #[wasm_bindgen(js_name = markFirstVisitDone)]
    pub fn mark_first_visit_done(&mut self) {
        self.store.mark_first_visit_done();
    }

    // ==================== SHARING ====================

    /// Link to the current page carrying participants and settings.
    #[wasm_bindgen(js_name = shareLink)]
    pub fn share_link(&self) -> Result<String, JsValue> {
        let token =
            encode(&self.store.participants(), &self.store.settings()).map_err(js_error)?;
        let location = gloo_utils::window().location();
        let base_url = format!("{}{}", location.origin()?, location.pathname()?);
        Ok(share_link(&base_url, &token))
    }

    /// Decoded shared wheel from the page URL, or `null` when there is none
    /// or it cannot be read.
    #[wasm_bindgen(js_name = sharedStateFromUrl)]
    pub fn shared_state_from_url(&self) -> Result<JsValue, JsValue> {
        let search = gloo_utils::window().location().search()?;
        match token_from_query(&search).and_then(decode_or_ignore) {
            Some(state) => to_js(&state),
            None => Ok(JsValue::NULL),
        }
    }

    /// Replace participants and settings with the wheel in `token`.
    #[wasm_bindgen(js_name = applySharedState)]
    pub fn apply_shared_state(&mut self, token: &str) -> Result<(), JsValue> {
        let state = decode(token).map_err(js_error)?;
        self.store.apply_shared_state(state).map_err(js_error)
    }

    // ==================== BACKUP & RESET ====================

    #[wasm_bindgen(js_name = exportData)]
    pub fn export_data(&self) -> Result<JsValue, JsValue> {
        to_js(&export_all(&self.store))
    }

    #[wasm_bindgen(js_name = exportHistory)]
    pub fn export_history(&self) -> Result<JsValue, JsValue> {
        to_js(&export_history(&self.store))
    }

    /// Bulk replace from a backup produced by [`WheelEngine::export_data`].
    /// Returns `false` (and changes nothing) when the data is rejected.
    #[wasm_bindgen(js_name = importData)]
    pub fn import_data(&mut self, data: JsValue) -> bool {
        let imported = from_js(data)
            .map_err(|e| WheelError::InvalidImport(format!("{:?}", e)))
            .and_then(|data| import_all(&mut self.store, &data));
        match imported {
            Ok(()) => true,
            Err(e) => {
                warn!("Error importing data: {}", e);
                false
            }
        }
    }

    /// Forget every participant, spin and setting.
    pub fn reset(&mut self) {
        self.store.reset_all();
        self.spinner = Spinner::new();
        self.pending = None;
        info!("Wheel engine reset");
    }
}
