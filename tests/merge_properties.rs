mod common;
use common::*;

use peer_chat_sync::*;

fn batches() -> Vec<Vec<Message>> {
    vec![
        vec![msg("A_100_a", "A", 100), msg("B_100_b", "B", 100)],
        vec![msg("B_100_b", "B", 100), msg("C_50_c", "C", 50)],
        vec![
            msg("A_100_a", "A", 100),
            msg("C_300_c", "C", 300),
            msg("A_100_0", "A", 100),
        ],
    ]
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return vec![vec![]];
    }
    let mut out = Vec::new();
    for rest in permutations(n - 1) {
        for i in 0..=rest.len() {
            let mut p = rest.clone();
            p.insert(i, n - 1);
            out.push(p);
        }
    }
    out
}

#[test]
fn any_arrival_order_converges_to_the_same_log() {
    let batches = batches();
    let mut reference: Option<Vec<Message>> = None;
    for order in permutations(batches.len()) {
        let mut log = MessageLog::new();
        for i in order {
            log.merge(batches[i].clone());
        }
        let snapshot = log.snapshot();
        match &reference {
            None => reference = Some(snapshot),
            Some(expected) => assert_eq!(&snapshot, expected),
        }
    }
    let reference = reference.unwrap();
    assert_eq!(
        ids(&reference),
        vec!["C_50_c", "A_100_0", "A_100_a", "B_100_b", "C_300_c"]
    );
}

#[test]
fn replaying_merges_changes_nothing() {
    let mut log = MessageLog::new();
    for batch in batches() {
        log.merge(batch);
    }
    let once = log.snapshot();
    for batch in batches() {
        assert!(log.merge(batch).is_empty());
    }
    assert_eq!(log.snapshot(), once);
    assert_eq!(log.len(), 5);
}

#[test]
fn merge_reports_only_new_messages() {
    let mut log = MessageLog::new();
    let batches = batches();
    assert_eq!(ids(&log.merge(batches[0].clone())), vec!["A_100_a", "B_100_b"]);
    assert_eq!(ids(&log.merge(batches[1].clone())), vec!["C_50_c"]);
    assert_eq!(
        ids(&log.merge(batches[2].clone())),
        vec!["C_300_c", "A_100_0"]
    );
}

#[test]
fn snapshot_is_sorted_after_appends_and_merges() {
    let mut log = MessageLog::new();
    let me = PeerId::from("me");
    log.append("now", &me).unwrap();
    log.merge(vec![msg("old_1_x", "old", 1)]);
    log.append("later", &me).unwrap();
    log.merge(vec![msg("future_x", "future", u64::MAX)]);

    let snapshot = log.snapshot();
    assert!(snapshot.windows(2).all(|w| {
        (w[0].timestamp, &w[0].id) <= (w[1].timestamp, &w[1].id)
    }));
    assert_eq!(snapshot.first().unwrap().id, "old_1_x");
    assert_eq!(snapshot.last().unwrap().id, "future_x");
}
