//! Edge case tests: capacity policy, terminal immutability, and
//! reconciliation boundaries

use chrono::Utc;
use std::sync::Arc;
use tps_panel::backend::{MemoryBackend, RemoteCheckin, RosterVoter, StationBackend};
use tps_panel::station::{
    ActivityFeed, CheckinQueue, NotificationKind, RotationTrigger, StationPanel,
    TokenRotator, TransitionOptions,
};
use tps_panel::types::{AdmissionRequest, QueueEntry, QueueStatus, VotingMode};
use tps_panel::{Error, Result};

const STATION: &str = "TPS-01";

fn entry(id: &str, voter_id: &str, status: QueueStatus, minutes_ago: i64) -> QueueEntry {
    QueueEntry {
        id: id.to_string(),
        voter_id: voter_id.to_string(),
        name: format!("Voter {voter_id}"),
        faculty: "Engineering".to_string(),
        program: "Informatics".to_string(),
        cohort: "2021".to_string(),
        voter_standing: "Active".to_string(),
        mode: VotingMode::Station,
        status,
        token_used: "tps_01_feed".to_string(),
        checked_in_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
        voted_at: None,
        note: None,
    }
}

#[test]
fn test_capacity_scenario_never_drops_active_entries() {
    println!("📦 Testing capacity policy (Scenario E)...");

    // Capacity 3; two non-terminal and two terminal entries exist
    let feed = Arc::new(ActivityFeed::for_testing());
    let queue = CheckinQueue::new(3, feed);
    queue
        .replace_all(vec![
            entry("a1", "111", QueueStatus::CheckedIn, 5),
            entry("a2", "222", QueueStatus::Verified, 4),
            entry("t-old", "901", QueueStatus::Voted, 60),
            entry("t-new", "902", QueueStatus::Rejected, 20),
        ])
        .unwrap();
    assert_eq!(queue.len(), 4);

    // Inserting one more non-terminal entry succeeds
    queue
        .insert(entry("a3", "333", QueueStatus::CheckedIn, 0))
        .unwrap();

    // Terminal entries were evicted oldest-first to respect the bound,
    // and every non-terminal entry survived
    assert!(queue.len() <= 3);
    assert!(queue.get("t-old").is_none(), "oldest terminal evicted first");
    assert!(queue.get("a1").is_some());
    assert!(queue.get("a2").is_some());
    assert!(queue.get("a3").is_some());
    assert_eq!(queue.stats().active, 3);
    println!("✅ Only terminal entries evicted; active voters retained");
}

#[test]
fn test_capacity_exhausted_by_active_entries_is_loud_error() {
    println!("🚨 Testing active-overflow invariant...");

    let feed = Arc::new(ActivityFeed::for_testing());
    let queue = CheckinQueue::new(2, feed.clone());

    queue.insert(entry("a1", "111", QueueStatus::CheckedIn, 2)).unwrap();
    queue.insert(entry("a2", "222", QueueStatus::CheckedIn, 1)).unwrap();

    let err = queue
        .insert(entry("a3", "333", QueueStatus::CheckedIn, 0))
        .unwrap_err();
    assert!(matches!(err, Error::Queue { .. }));

    // Invariant violations are not surfaced as operator notifications
    assert!(feed.latest_notification().is_none());
    assert_eq!(queue.len(), 2);
    println!("✅ Active overflow refused without dropping voters");
}

#[test]
fn test_terminal_immutability_for_all_terminal_states() {
    println!("🔒 Testing terminal immutability...");

    for terminal in [QueueStatus::Voted, QueueStatus::Rejected, QueueStatus::Cancelled] {
        let queue = CheckinQueue::for_testing();
        queue.insert(entry("a", "111", QueueStatus::CheckedIn, 0)).unwrap();
        queue
            .transition("a", terminal, TransitionOptions::default())
            .unwrap();

        for attempt in [
            QueueStatus::Pending,
            QueueStatus::CheckedIn,
            QueueStatus::Verified,
            QueueStatus::Voted,
            QueueStatus::Rejected,
            QueueStatus::Cancelled,
        ] {
            let result = queue.transition("a", attempt, TransitionOptions::default());
            if attempt == terminal {
                // Matching terminal request is a warning-level no-op
                assert_eq!(result.unwrap().status, terminal);
            } else {
                assert!(result.is_err(), "{terminal} -> {attempt} must fail");
            }
            assert_eq!(queue.get("a").unwrap().status, terminal);
        }
    }
    println!("✅ No transition escapes a terminal state");
}

#[test]
fn test_vote_time_stamped_exactly_once() {
    println!("🕐 Testing vote-time stamping...");

    let queue = CheckinQueue::for_testing();
    queue.insert(entry("a", "111", QueueStatus::CheckedIn, 0)).unwrap();

    let voted = queue
        .transition("a", QueueStatus::Voted, TransitionOptions::default())
        .unwrap();
    let stamped = voted.voted_at.expect("vote time expected");

    // The matching-terminal no-op must not restamp
    let again = queue
        .transition("a", QueueStatus::Voted, TransitionOptions::default())
        .unwrap();
    assert_eq!(again.voted_at, Some(stamped));
    println!("✅ Vote time stamped once");
}

#[test]
fn test_token_uniqueness_over_time() {
    println!("🎫 Testing token uniqueness property...");

    let rotator =
        TokenRotator::new(STATION, 30, Arc::new(ActivityFeed::for_testing())).unwrap();

    let mut seen = std::collections::HashSet::new();
    seen.insert(rotator.current().unwrap().value);
    for _ in 0..200 {
        let token = rotator.rotate(RotationTrigger::Auto).unwrap();
        assert!(
            seen.insert(token.value.clone()),
            "token {} repeated",
            token.value
        );
    }
    println!("✅ {} rotations produced distinct tokens", seen.len());
}

#[tokio::test]
async fn test_reconciliation_replace_is_exact() -> Result<()> {
    println!("🔁 Testing full-replace reconciliation property...");

    let backend = Arc::new(MemoryBackend::for_testing(STATION));
    let panel =
        StationPanel::for_testing(STATION, backend.clone() as Arc<dyn StationBackend>).unwrap();

    // The panel holds one admitted entry whose backend row then vanishes
    let token = panel.current_token()?.value;
    backend.register_voter(RosterVoter::new("999", "Ghost Voter", STATION));
    backend.stage_scan(&token, "999");
    panel.admit(AdmissionRequest::Scan { token }).await?;
    backend.clear_checkins(STATION);

    // The backend now reports exactly two other entries
    for (id, voter) in [("300", "111"), ("301", "222")] {
        backend.push_checkin(
            STATION,
            RemoteCheckin {
                checkin_id: id.to_string(),
                voter_id: voter.to_string(),
                name: format!("Voter {voter}"),
                faculty: String::new(),
                program: String::new(),
                cohort: String::new(),
                standing: String::new(),
                status: "CHECKED_IN".to_string(),
                assigned_station: STATION.to_string(),
                has_voted: false,
                checkin_time: Some(Utc::now()),
                voted_time: None,
            },
        );
    }

    panel.sync().await?;

    let mut ids: Vec<String> = panel.queue().iter().map(|e| e.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["300".to_string(), "301".to_string()]);
    println!("✅ Local queue equals the backend-returned set exactly");

    Ok(())
}

#[tokio::test]
async fn test_consecutive_failures_do_not_stack_notifications() -> Result<()> {
    println!("🔕 Testing single-slot notification behavior...");

    let backend = Arc::new(MemoryBackend::for_testing(STATION));
    let panel =
        StationPanel::for_testing(STATION, backend.clone() as Arc<dyn StationBackend>).unwrap();

    for _ in 0..3 {
        let err = panel
            .admit(AdmissionRequest::Manual {
                code: "unknown".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Admission(_)));
    }

    // One slot: the latest warning replaced its predecessors
    let notification = panel.notification().expect("notification expected");
    assert_eq!(notification.kind, NotificationKind::Warning);
    assert_eq!(notification.title, "Check-in rejected");

    panel.dismiss_notification();
    assert!(panel.notification().is_none());
    println!("✅ Failures share one replaceable notification slot");

    Ok(())
}

#[tokio::test]
async fn test_removed_entry_is_gone_for_good() -> Result<()> {
    println!("🗑️  Testing operator removal...");

    let backend = Arc::new(MemoryBackend::for_testing(STATION));
    let panel =
        StationPanel::for_testing(STATION, backend.clone() as Arc<dyn StationBackend>).unwrap();

    backend.register_voter(RosterVoter::new("2110510023", "Roni Saputra", STATION));
    let entry = panel
        .admit(AdmissionRequest::Manual {
            code: "2110510023".to_string(),
        })
        .await?;

    panel.remove(&entry.id).await?;
    assert!(panel.queue().is_empty());

    let notification = panel.notification().expect("warning expected");
    assert_eq!(notification.kind, NotificationKind::Warning);

    // Removing again fails: the entry is unrecoverable
    assert!(panel.remove(&entry.id).await.is_err());
    println!("✅ Removal audited, warned, and unrecoverable");

    Ok(())
}

#[test]
fn test_feed_retention_bounds_hold_under_load() {
    println!("📋 Testing feed retention bounds...");

    let feed = ActivityFeed::new(20, 100, 5);
    for i in 0..500 {
        feed.log(format!("line {i}"));
        feed.history(
            tps_panel::station::HistoryKind::CheckIn,
            Some("111"),
            Some("A"),
            format!("record {i}"),
        );
    }

    assert_eq!(feed.logs().len(), 20);
    assert_eq!(feed.history_records().len(), 100);
    assert_eq!(feed.logs()[0].message, "line 499");
    println!("✅ Oldest records dropped silently at the bound");
}
