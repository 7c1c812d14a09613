//! Random participant selection and wheel rotation targets.
//!
//! Selection and commit are split: [`select`] only picks, the caller records
//! the outcome (history entry, last-selected marker) once the presentation
//! animation has finished.

use crate::config::{
    DEGREES_PER_TURN, FULL_ROTATIONS, MAX_REROLLS, MIN_SPIN_PARTICIPANTS, POINTER_ANGLE_DEG,
};
use crate::model::{Participant, RotationDirection, Settings};
use crate::WheelError;
use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::Serialize;

/// Outcome of a draw: position on the wheel and the participant there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<'a> {
    pub index: usize,
    pub participant: &'a Participant,
}

/// Draw a participant uniformly from `enabled`, re-drawing up to
/// [`MAX_REROLLS`] times when the draw hits `last_selected_id`.
///
/// The anti-repeat policy is best-effort: if every re-draw collides the last
/// draw is accepted.
pub fn select<'a, R: Rng + ?Sized>(
    enabled: &'a [Participant],
    last_selected_id: Option<&str>,
    rng: &mut R,
) -> Result<Selection<'a>, WheelError> {
    if enabled.len() < MIN_SPIN_PARTICIPANTS {
        return Err(WheelError::InsufficientParticipants {
            needed: MIN_SPIN_PARTICIPANTS,
            available: enabled.len(),
        });
    }

    let dist = Uniform::new(0, enabled.len()).map_err(|_| WheelError::InsufficientParticipants {
        needed: MIN_SPIN_PARTICIPANTS,
        available: enabled.len(),
    })?;
    let mut index = dist.sample(rng);

    let last_index =
        last_selected_id.and_then(|id| enabled.iter().position(|p| p.id == id));
    if let Some(last_index) = last_index {
        let mut rerolls = 0;
        while index == last_index && rerolls < MAX_REROLLS {
            index = dist.sample(rng);
            rerolls += 1;
        }
        if index == last_index {
            debug!(
                "Re-roll budget of {} exhausted, accepting repeat of '{}'",
                MAX_REROLLS, enabled[index].name
            );
        } else if rerolls > 0 {
            debug!("Avoided repeat winner after {} re-roll(s)", rerolls);
        }
    }

    Ok(Selection {
        index,
        participant: &enabled[index],
    })
}

/// Angular width of one slice in degrees.
#[inline]
pub fn slice_angle(participant_count: usize) -> f64 {
    DEGREES_PER_TURN / participant_count as f64
}

/// Angle of the middle of slice `index`; slice `i` spans `[i·w, (i+1)·w)`.
#[inline]
pub fn slice_center_angle(index: usize, participant_count: usize) -> f64 {
    let width = slice_angle(participant_count);
    index as f64 * width + width / 2.0
}

/// Absolute rotation that brings the center of slice `chosen_index` under the
/// pointer after [`FULL_ROTATIONS`] full turns in `direction`.
///
/// Pure: identical inputs always produce the identical angle.
pub fn rotation_target(
    chosen_index: usize,
    participant_count: usize,
    current_rotation_deg: f64,
    direction: RotationDirection,
) -> f64 {
    let spin = FULL_ROTATIONS * DEGREES_PER_TURN
        + (POINTER_ANGLE_DEG - slice_center_angle(chosen_index, participant_count));
    current_rotation_deg + spin * direction.sign()
}

/// Fold an accumulated rotation back into `(-360, 360)`. Only relative
/// offsets matter to the next [`rotation_target`], so this keeps the angle
/// bounded without changing where the wheel points.
#[inline]
pub fn normalize_rotation(rotation_deg: f64) -> f64 {
    rotation_deg % DEGREES_PER_TURN
}

/// Everything the presentation layer needs to animate one spin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinPlan {
    pub index: usize,
    pub participant: Participant,
    /// Rotation the wheel starts from.
    pub start_rotation: f64,
    /// Absolute rotation the wheel ends on.
    pub target_rotation: f64,
    pub duration_secs: f64,
}

/// Tracks the accumulated wheel rotation across spins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spinner {
    rotation: f64,
}

impl Spinner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Select a winner and compute its rotation target. The stored rotation is
    /// normalized afterwards so it never grows without bound.
    pub fn plan<R: Rng + ?Sized>(
        &mut self,
        enabled: &[Participant],
        last_selected_id: Option<&str>,
        settings: &Settings,
        rng: &mut R,
    ) -> Result<SpinPlan, WheelError> {
        let selection = select(enabled, last_selected_id, rng)?;
        let start_rotation = self.rotation;
        let target_rotation = rotation_target(
            selection.index,
            enabled.len(),
            start_rotation,
            settings.rotation_direction,
        );
        self.rotation = normalize_rotation(target_rotation);

        debug!(
            "Planned spin: '{}' at slice {}/{}, {:.1}° -> {:.1}°",
            selection.participant.name,
            selection.index,
            enabled.len(),
            start_rotation,
            target_rotation
        );

        Ok(SpinPlan {
            index: selection.index,
            participant: selection.participant.clone(),
            start_rotation,
            target_rotation,
            duration_secs: settings.animation_duration_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn roster(names: &[&str]) -> Vec<Participant> {
        names
            .iter()
            .map(|name| Participant {
                id: format!("id-{}", name),
                name: name.to_string(),
                color: "#3498DB".to_string(),
                enabled: true,
                created_at: String::new(),
            })
            .collect()
    }

    /// Yields the same bits forever, so every uniform draw lands on the same index.
    struct StuckRng;

    impl RngCore for StuckRng {
        fn next_u32(&mut self) -> u32 {
            0x8000_0000
        }

        fn next_u64(&mut self) -> u64 {
            0x8000_0000_8000_0000
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0x80);
        }
    }

    #[test]
    fn refuses_fewer_than_two_participants() {
        let mut rng = StdRng::seed_from_u64(1);
        let one = roster(&["Solo"]);
        assert!(matches!(
            select(&one, None, &mut rng),
            Err(WheelError::InsufficientParticipants { needed: 2, available: 1 })
        ));
        assert!(select(&[], None, &mut rng).is_err());
    }

    #[test]
    fn last_winner_is_picked_less_often() {
        let people = roster(&["A", "B", "C"]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0usize; 3];
        let trials = 1000;
        for _ in 0..trials {
            let selection = select(&people, Some("id-A"), &mut rng).unwrap();
            counts[selection.index] += 1;
        }
        assert!(counts[0] * 3 < trials, "A picked too often: {:?}", counts);
        assert!(counts[1] * 3 > trials, "B picked too rarely: {:?}", counts);
        assert!(counts[2] * 3 > trials, "C picked too rarely: {:?}", counts);
    }

    #[test]
    fn reroll_loop_is_bounded_and_accepts_the_repeat() {
        let people = roster(&["A", "B", "C"]);
        let stuck = select(&people, None, &mut StuckRng).unwrap();
        let last_id = stuck.participant.id.clone();

        let repeat = select(&people, Some(&last_id), &mut StuckRng).unwrap();
        assert_eq!(repeat.index, stuck.index);
    }

    #[test]
    fn unknown_last_selected_is_ignored() {
        let people = roster(&["A", "B"]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let selection = select(&people, Some("deleted"), &mut rng).unwrap();
            assert!(selection.index < people.len());
        }
    }

    #[test]
    fn rotation_target_aligns_slice_center_with_pointer() {
        // four slices of 90°, slice 0 centered at 45°
        let target = rotation_target(0, 4, 0.0, RotationDirection::Clockwise);
        assert_eq!(target, 1800.0 + 45.0);

        let target = rotation_target(3, 4, 10.0, RotationDirection::CounterClockwise);
        assert_eq!(target, 10.0 - (1800.0 + (90.0 - 315.0)));
    }

    #[test]
    fn normalization_keeps_pointer_position() {
        let target = rotation_target(1, 3, 250.0, RotationDirection::Clockwise);
        let normalized = normalize_rotation(target);
        assert!(normalized.abs() < 360.0);
        assert_eq!((target - normalized) % 360.0, 0.0);
        assert_eq!(normalize_rotation(-725.0), -5.0);
    }

    #[test]
    fn spinner_plans_from_previous_rotation() {
        let people = roster(&["A", "B", "C", "D"]);
        let settings = Settings::default();
        let mut spinner = Spinner::new();
        let mut rng = StdRng::seed_from_u64(3);

        let first = spinner.plan(&people, None, &settings, &mut rng).unwrap();
        assert_eq!(first.start_rotation, 0.0);
        assert_eq!(spinner.rotation(), normalize_rotation(first.target_rotation));
        assert_eq!(first.duration_secs, settings.animation_duration_secs());

        let second = spinner
            .plan(&people, Some(&first.participant.id), &settings, &mut rng)
            .unwrap();
        assert_eq!(second.start_rotation, normalize_rotation(first.target_rotation));
        assert_ne!(second.participant.id, "");
    }
}
