//! Per-participant statistics derived from the history log.

use crate::model::{HistoryEntry, Participant};
use crate::utils::round_to_tenth;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    pub participant: Participant,
    pub win_count: u32,
    /// Share of all logged spins, one decimal place.
    pub percentage: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl ParticipantStats {
    fn zeroed(participant: &Participant) -> Self {
        Self {
            participant: participant.clone(),
            win_count: 0,
            percentage: 0.0,
            current_streak: 0,
            longest_streak: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_spins: usize,
    /// Keyed by participant id; one record per current participant.
    pub by_participant: BTreeMap<String, ParticipantStats>,
}

impl Statistics {
    pub fn get(&self, participant_id: &str) -> Option<&ParticipantStats> {
        self.by_participant.get(participant_id)
    }

    /// Records ordered by win count (descending), ties broken by name.
    pub fn ranked(&self) -> Vec<&ParticipantStats> {
        let mut ranked: Vec<&ParticipantStats> = self.by_participant.values().collect();
        ranked.sort_by(|a, b| {
            b.win_count
                .cmp(&a.win_count)
                .then_with(|| a.participant.name.cmp(&b.participant.name))
        });
        ranked
    }
}

/// Derive win counts, percentages and streaks in one pass over `history`,
/// oldest entry first. Log order is authoritative; timestamps are ignored.
///
/// Entries of deleted participants are not tallied, but they still end the
/// run that precedes them.
pub fn compute_statistics(participants: &[Participant], history: &[HistoryEntry]) -> Statistics {
    let mut by_participant: BTreeMap<String, ParticipantStats> = participants
        .iter()
        .map(|p| (p.id.clone(), ParticipantStats::zeroed(p)))
        .collect();

    // (participant id, run length) of the run still open at this point
    let mut run: Option<(&str, u32)> = None;

    for entry in history {
        let id = entry.participant_id.as_str();
        if let Some(stats) = by_participant.get_mut(id) {
            stats.win_count += 1;
        }

        run = match run {
            Some((run_id, len)) if run_id == id => Some((run_id, len + 1)),
            Some((run_id, len)) => {
                commit_longest(&mut by_participant, run_id, len);
                Some((id, 1))
            }
            None => Some((id, 1)),
        };
    }

    if let Some((run_id, len)) = run {
        if let Some(stats) = by_participant.get_mut(run_id) {
            stats.current_streak = len;
        }
        commit_longest(&mut by_participant, run_id, len);
    }

    let total_spins = history.len();
    if total_spins > 0 {
        for stats in by_participant.values_mut() {
            stats.percentage = round_to_tenth(stats.win_count as f64 / total_spins as f64 * 100.0);
        }
    }

    debug!(
        "Computed statistics for {} participants over {} spins",
        by_participant.len(),
        total_spins
    );

    Statistics {
        total_spins,
        by_participant,
    }
}

fn commit_longest(stats: &mut BTreeMap<String, ParticipantStats>, id: &str, len: u32) {
    if let Some(s) = stats.get_mut(id) {
        s.longest_streak = s.longest_streak.max(len);
    }
}
