//! Cross-thread behavior of a single record: one writer publishing snapshots,
//! readers and a consumer polling concurrently.

use server_browser::extension::SourceExtension;
use server_browser::models::server::{CellValue, Rule, ServerInfo};
use server_browser::players::JoinStatus;
use server_browser::record::ServerRecord;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn endpoint() -> SocketAddr {
    "10.1.2.3:27015".parse().unwrap()
}

fn info(players: u32) -> ServerInfo {
    serde_json::from_value(serde_json::json!({
        "address": "10.1.2.3:27015",
        "name": "stress",
        "players": players,
        "max_players": 16,
    }))
    .unwrap()
}

fn rules(prefix: &str) -> Vec<Rule> {
    (0..10)
        .map(|i| Rule::new(format!("{}{}", prefix, i), prefix))
        .chain(std::iter::once(Rule::new("shared", prefix)))
        .collect()
}

#[test]
fn every_mark_is_observed_by_the_consumer() {
    const ROUNDS: usize = 2_000;
    let record = Arc::new(ServerRecord::new(endpoint(), Arc::new(SourceExtension)));
    let acks = Arc::new(AtomicUsize::new(0));

    let writer = {
        let record = record.clone();
        let acks = acks.clone();
        thread::spawn(move || {
            for i in 0..ROUNDS {
                record.mark_modified();
                let deadline = Instant::now() + Duration::from_secs(10);
                while acks.load(Ordering::Acquire) <= i {
                    assert!(Instant::now() < deadline, "mark {} was lost", i);
                    std::hint::spin_loop();
                }
            }
        })
    };

    let deadline = Instant::now() + Duration::from_secs(20);
    while acks.load(Ordering::Acquire) < ROUNDS {
        assert!(Instant::now() < deadline, "consumer timed out");
        if record.consume_modified() {
            acks.fetch_add(1, Ordering::AcqRel);
        }
    }

    writer.join().unwrap();
    assert!(!record.consume_modified());
}

#[test]
fn racing_marks_leave_a_signal() {
    let record = Arc::new(ServerRecord::new(endpoint(), Arc::new(SourceExtension)));
    let done = Arc::new(AtomicBool::new(false));

    let consumer = {
        let record = record.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut seen = 0usize;
            while !done.load(Ordering::Acquire) {
                if record.consume_modified() {
                    seen += 1;
                }
            }
            seen
        })
    };

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let record = record.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    record.mark_modified();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let seen = consumer.join().unwrap();

    // Whatever the consumer missed must still be pending.
    let pending = record.consume_modified();
    assert!(seen > 0 || pending);
    assert!(!record.consume_modified());
}

#[test]
fn readers_never_see_a_half_built_snapshot() {
    let record = Arc::new(ServerRecord::new(endpoint(), Arc::new(SourceExtension)));
    record.update(Some(info(4)), None, Some(rules("a")));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let record = record.clone();
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    assert_eq!(record.rule_count(), 11);
                    assert!(record.player_count().real_players.is_some());
                    assert_ne!(record.join_status(), JoinStatus::Indeterminate);
                    let value = record.extender_field_value("shared");
                    assert!(matches!(value, Some(CellValue::Text(_))));
                }
            })
        })
        .collect();

    for i in 0..2_000u32 {
        let prefix = if i % 2 == 0 { "b" } else { "a" };
        record.update(Some(info(i % 16)), None, Some(rules(prefix)));
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(record.consume_modified());
}
