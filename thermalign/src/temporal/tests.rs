use super::*;
use crate::sensor::Modality;

fn visible(name: &str) -> SensorFile {
    SensorFile::new(name, Modality::Visible, &TimestampFormat::default())
}

fn thermal(name: &str) -> SensorFile {
    SensorFile::new(name, Modality::Thermal, &TimestampFormat::default())
}

fn minutes(m: i64) -> TimeDelta {
    TimeDelta::minutes(m)
}

#[test]
fn test_closer_candidate_wins() {
    let target = visible("v201017020400000.jpg");
    let candidates = vec![
        thermal("m201017021400000.csv"), // +10
        thermal("m201017020900000.csv"), // +5
    ];

    let found = find_nearest(&target, &candidates, minutes(20)).unwrap();
    assert_eq!(found.file.name(), "m201017020900000.csv");
    assert_eq!(found.delta, minutes(5));
}

#[test]
fn test_nothing_within_window() {
    let target = visible("v201017020400000.jpg");
    let candidates = vec![
        thermal("m201017022900000.csv"), // +25
        thermal("m201017013000000.csv"), // -34
    ];

    assert!(find_nearest(&target, &candidates, minutes(20)).is_none());
}

#[test]
fn test_delta_equal_to_tolerance_is_eligible() {
    let target = visible("v201017020400000.jpg");
    let candidates = vec![thermal("m201017022400000.csv")];

    let found = find_nearest(&target, &candidates, minutes(20)).unwrap();
    assert_eq!(found.delta, minutes(20));
}

#[test]
fn test_earlier_candidates_count_by_absolute_delta() {
    let target = visible("v201017020400000.jpg");
    let candidates = vec![
        thermal("m201017021000000.csv"), // +6
        thermal("m201017020000000.csv"), // -4
    ];

    let found = find_nearest(&target, &candidates, minutes(20)).unwrap();
    assert_eq!(found.file.name(), "m201017020000000.csv");
}

#[test]
fn test_unparseable_candidate_is_skipped() {
    let target = visible("v201017020400000.jpg");
    let candidates = vec![
        thermal("m2010.csv"),
        thermal("m201317020400000.csv"),
        thermal("m201017021000594.csv"),
    ];

    let found = find_nearest(&target, &candidates, minutes(20)).unwrap();
    assert_eq!(found.file.name(), "m201017021000594.csv");
}

#[test]
fn test_target_without_timestamp() {
    let target = visible("IMG_0001.jpg");
    let candidates = vec![thermal("m201017020400000.csv")];
    assert!(find_nearest(&target, &candidates, minutes(20)).is_none());
}

#[test]
fn test_tie_resolves_to_first_in_order() {
    let target = visible("v201017020400000.jpg");
    let candidates = vec![
        thermal("m201017020900111.csv"), // +5
        thermal("m201017015900000.csv"), // -5
    ];

    let found = find_nearest(&target, &candidates, minutes(20)).unwrap();
    assert_eq!(found.file.name(), "m201017020900111.csv");
}

#[test]
fn test_never_returns_candidate_outside_window() {
    let target = visible("v201017120000000.jpg");
    let candidates: Vec<SensorFile> = (0..60)
        .map(|m| thermal(&format!("m2010171{:01}{:02}00000.csv", 1 + m / 60, m % 60)))
        .collect();

    for window in [0, 1, 5, 30, 59] {
        if let Some(found) = find_nearest(&target, &candidates, minutes(window)) {
            assert!(found.delta <= minutes(window));
        }
    }
}

#[test]
fn test_index_groups_across_sensor_tags() {
    let index = CandidateIndex::build(
        vec![
            thermal("m201017021000594.csv"),
            thermal("m201117021000594.csv"),
            thermal("short.csv"),
        ],
        &TimestampFormat::default(),
    );

    assert_eq!(index.len(), 3);
    assert_eq!(index.group_count(), 2);

    let primary = visible("v201017020400000.jpg");
    let candidates = index.candidates_for(&primary);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].name(), "m201017021000594.csv");
}

#[test]
fn test_index_tie_break_is_lexicographic() {
    let index = CandidateIndex::build(
        vec![
            thermal("m201017020900zzz.csv"),
            thermal("m201017015900aaa.csv"),
        ],
        &TimestampFormat::default(),
    );

    let pairing = index.pair(&visible("v201017020400000.jpg"), minutes(20));
    assert_eq!(pairing.outcome(), PairingOutcome::Matched);
    assert_eq!(pairing.matched.unwrap().name(), "m201017015900aaa.csv");
    assert_eq!(pairing.delta, Some(minutes(5)));
}

#[test]
fn test_pair_all_outcomes() {
    let index = CandidateIndex::build(
        vec![
            thermal("m201017021000594.csv"),
            thermal("m201017033000000.csv"),
        ],
        &TimestampFormat::default(),
    );
    let primaries = vec![
        visible("v201017020400000.jpg"),
        visible("v201017050000000.jpg"),
        visible("IMG_0001.jpg"),
    ];

    let pairings = pair_all(&primaries, &index, minutes(20));
    let outcomes: Vec<_> = pairings.iter().map(FilePairing::outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            PairingOutcome::Matched,
            PairingOutcome::NoMatch,
            PairingOutcome::NoTimestamp
        ]
    );
    assert_eq!(pairings[0].delta, Some(minutes(6)));
}
