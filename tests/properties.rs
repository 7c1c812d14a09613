use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spin_wheel::config::HISTORY_CAPACITY;
use spin_wheel::share::{decode, encode};
use spin_wheel::{
    compute_statistics, rotation_target, select, EntityStore, HistoryEntry, MemoryBackend,
    Participant, RotationDirection, Settings, SliceAnimation, WinnerEffect,
};

fn roster(count: usize) -> Vec<Participant> {
    (0..count)
        .map(|i| Participant {
            id: format!("p{}", i),
            name: format!("Player{}", i),
            color: "#1ABC9C".to_string(),
            enabled: true,
            created_at: String::new(),
        })
        .collect()
}

/// Slots `>= participant count` stand for participants that have been deleted.
fn log_from_slots(slots: &[usize]) -> Vec<HistoryEntry> {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| HistoryEntry {
            id: format!("h{}", i),
            participant_id: format!("p{}", slot),
            participant_name: format!("Player{}", slot),
            timestamp: String::new(),
            sequence_number: i as u64 + 1,
        })
        .collect()
}

fn direction() -> impl Strategy<Value = RotationDirection> {
    prop_oneof![
        Just(RotationDirection::Clockwise),
        Just(RotationDirection::CounterClockwise)
    ]
}

fn settings() -> impl Strategy<Value = Settings> {
    (
        1u32..=20,
        1u32..=50,
        direction(),
        "[A-Za-z ]{1,20}",
        prop_oneof![
            Just(SliceAnimation::None),
            Just(SliceAnimation::Pulse),
            Just(SliceAnimation::Glow)
        ],
        any::<bool>(),
        any::<bool>(),
        prop_oneof![
            Just(WinnerEffect::Confetti),
            Just(WinnerEffect::Fireworks),
            Just(WinnerEffect::None)
        ],
    )
        .prop_filter("title must not be blank", |t| !t.3.trim().is_empty())
        .prop_map(
            |(secs, speed_tenths, rotation_direction, title, slice_animation, sound, dark, effect)| {
                Settings {
                    spin_duration_secs: secs as f64,
                    animation_speed: speed_tenths as f64 / 10.0,
                    rotation_direction,
                    title,
                    slice_animation,
                    sound_enabled: sound,
                    dark_mode: dark,
                    winner_effect: effect,
                }
            },
        )
}

fn participants() -> impl Strategy<Value = Vec<Participant>> {
    prop::collection::vec(("[a-z]{2,12}", any::<bool>(), "#[0-9A-F]{6}"), 0..20).prop_map(
        |rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (name, enabled, color))| Participant {
                    id: format!("id-{}", i),
                    name: format!("{}{}", name, i),
                    color,
                    enabled,
                    created_at: "2024-03-01T12:00:00.000Z".to_string(),
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn selection_stays_in_bounds(
        count in 2usize..=20,
        last in proptest::option::of(0usize..25),
        seed in any::<u64>(),
    ) {
        let people = roster(count);
        let last_id = last.map(|i| format!("p{}", i));
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..20 {
            let selection = select(&people, last_id.as_deref(), &mut rng).unwrap();
            prop_assert!(selection.index < count);
            prop_assert_eq!(&people[selection.index], selection.participant);
        }
    }

    #[test]
    fn rotation_target_is_pure(
        count in 1usize..=20,
        index_seed in any::<usize>(),
        current in -720.0f64..720.0,
        direction in direction(),
    ) {
        let index = index_seed % count;
        let first = rotation_target(index, count, current, direction);
        let second = rotation_target(index, count, current, direction);
        prop_assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn win_counts_sum_to_known_entries(
        count in 0usize..8,
        slots in prop::collection::vec(0usize..10, 0..200),
    ) {
        let people = roster(count);
        let stats = compute_statistics(&people, &log_from_slots(&slots));
        let total: u32 = stats.by_participant.values().map(|s| s.win_count).sum();
        let known = slots.iter().filter(|slot| **slot < count).count();
        prop_assert_eq!(total as usize, known);
        prop_assert_eq!(stats.by_participant.len(), count);
        prop_assert_eq!(stats.total_spins, slots.len());
    }

    #[test]
    fn only_the_latest_winner_has_a_current_streak(
        count in 1usize..8,
        slots in prop::collection::vec(0usize..10, 0..200),
    ) {
        let people = roster(count);
        let stats = compute_statistics(&people, &log_from_slots(&slots));
        let streaking: Vec<&str> = stats
            .by_participant
            .values()
            .filter(|s| s.current_streak > 0)
            .map(|s| s.participant.id.as_str())
            .collect();
        prop_assert!(streaking.len() <= 1);

        match slots.last() {
            Some(&last) if last < count => {
                let expected = format!("p{}", last);
                prop_assert_eq!(streaking, vec![expected.as_str()]);
            }
            _ => prop_assert!(streaking.is_empty()),
        }

        for record in stats.by_participant.values() {
            prop_assert!(record.current_streak <= record.longest_streak);
            prop_assert!(record.longest_streak <= record.win_count);
        }
    }

    #[test]
    fn share_token_round_trips(people in participants(), settings in settings()) {
        let token = encode(&people, &settings).unwrap();
        let state = decode(&token).unwrap();
        prop_assert_eq!(state.participants, people);
        prop_assert_eq!(state.settings, settings);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn history_cap_evicts_oldest_without_renumbering(appends in 480usize..530) {
        let mut store = EntityStore::new(MemoryBackend::new());
        let alice = store.add_participant("Alice", "#FF6B6B").unwrap();
        for _ in 0..appends {
            store.append_history(&alice);
        }

        let history = store.history();
        prop_assert_eq!(history.len(), appends.min(HISTORY_CAPACITY));
        let first = history.first().unwrap().sequence_number;
        prop_assert_eq!(first, (appends.saturating_sub(HISTORY_CAPACITY) + 1) as u64);
        for (offset, entry) in history.iter().enumerate() {
            prop_assert_eq!(entry.sequence_number, first + offset as u64);
        }
    }
}
