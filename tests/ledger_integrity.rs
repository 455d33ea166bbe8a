//! Ledger Integrity Tests
//!
//! Build chains through the public API, tamper with stored blocks and check
//! that verification names the first bad block.

use aerotwin::config::{ChannelBaseline, MachineBaseline, MonitorConfig};
use aerotwin::ledger::{
    verify_chain, Block, ChainFault, ChainVerdict, Ledger, LedgerError, LedgerPayload,
};
use aerotwin::pipeline::Monitor;
use aerotwin::simulation::TelemetryGenerator;
use aerotwin::types::{AnomalyEvent, AnomalyFlags, Channel, Reading};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

fn anomaly(machine: &str, vibration: f64) -> LedgerPayload {
    let flags: AnomalyFlags = [(Channel::Vibration, vibration)].into_iter().collect();
    LedgerPayload::Anomaly(AnomalyEvent {
        machine_id: machine.to_string(),
        reading: Reading::new(Utc::now(), BTreeMap::from([(Channel::Vibration, vibration)])),
        recommendation: aerotwin::advisory::recommend(&flags),
        flags,
    })
}

fn ledger_with(n: usize) -> Ledger {
    let ledger = Ledger::new();
    for i in 0..n {
        ledger.append(anomaly("compressor-1", 1.0 + i as f64)).unwrap();
    }
    ledger
}

// ============================================================================
// Valid chains
// ============================================================================

#[test]
fn three_appends_give_four_valid_blocks() {
    let ledger = ledger_with(3);
    let chain = ledger.snapshot();

    assert_eq!(chain.iter().map(|b| b.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert!(chain[0].is_genesis());
    assert_eq!(ledger.verify(), ChainVerdict::Valid { length: 4 });
}

#[test]
fn every_block_links_to_its_predecessor() {
    let chain = ledger_with(10).snapshot();
    for k in 1..chain.len() {
        assert_eq!(chain[k].index, k as u64);
        assert_eq!(chain[k].previous_hash, chain[k - 1].hash);
    }
}

#[test]
fn snapshot_round_trips_through_json() {
    let chain = ledger_with(2).snapshot();
    let json = serde_json::to_string(&chain).unwrap();
    let restored: Vec<Block> = serde_json::from_str(&json).unwrap();
    assert_eq!(verify_chain(&restored), ChainVerdict::Valid { length: 3 });
}

#[test]
fn gaussian_chain_still_verifies_after_json_round_trip() {
    // PR around 10.5 keeps the surge margin under the floor most cycles
    let mut baseline = MachineBaseline::default_compressor();
    baseline.insert(Channel::PressureRatio, ChannelBaseline::new(10.5, 0.3));
    let monitor = Monitor::new(&MonitorConfig::default());
    let mut generator = TelemetryGenerator::new("compressor-1", &baseline, 10.0, Some(2024)).unwrap();
    for _ in 0..500 {
        monitor.ingest("compressor-1", generator.next_reading()).unwrap();
    }

    let chain = monitor.get_ledger();
    assert!(chain.len() > 100, "only {} blocks", chain.len());

    let json = serde_json::to_string(&chain).unwrap();
    let restored: Vec<Block> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, chain);
    assert_eq!(
        verify_chain(&restored),
        ChainVerdict::Valid { length: chain.len() }
    );
}

#[test]
fn ledger_refuses_non_finite_payloads() {
    let ledger = Ledger::new();
    for bad in [f64::NAN, f64::INFINITY] {
        let err = ledger.append(anomaly("compressor-1", bad)).unwrap_err();
        assert!(matches!(err, LedgerError::NonFiniteValue { .. }));
    }
    assert_eq!(ledger.len(), 1);
    assert!(ledger.verify().is_valid());
}

// ============================================================================
// Tampering
// ============================================================================

#[test]
fn edited_payload_in_block_two_is_reported_at_two() {
    let mut chain = ledger_with(3).snapshot();
    if let LedgerPayload::Anomaly(event) = &mut chain[2].payload {
        event.recommendation.push('!');
    }
    assert_eq!(
        verify_chain(&chain),
        ChainVerdict::Invalid {
            index: 2,
            fault: ChainFault::HashMismatch
        }
    );
}

#[test]
fn any_single_field_edit_is_detected_at_that_block() {
    let pristine = ledger_with(4).snapshot();

    for target in 1..pristine.len() {
        let mut chain = pristine.clone();
        chain[target].timestamp += chrono::Duration::nanoseconds(1);
        assert_eq!(verify_chain(&chain).first_invalid(), Some(target as u64));

        let mut chain = pristine.clone();
        chain[target].previous_hash = "0".repeat(64);
        assert_eq!(verify_chain(&chain).first_invalid(), Some(target as u64));

        let mut chain = pristine.clone();
        chain[target].hash = "f".repeat(64);
        assert_eq!(verify_chain(&chain).first_invalid(), Some(target as u64));

        let mut chain = pristine.clone();
        if let LedgerPayload::Anomaly(event) = &mut chain[target].payload {
            event.reading.values.insert(Channel::Vibration, 0.0);
        }
        assert_eq!(verify_chain(&chain).first_invalid(), Some(target as u64));
    }
}

#[test]
fn removed_block_is_reported_as_index_mismatch() {
    let mut chain = ledger_with(3).snapshot();
    chain.remove(1);
    assert_eq!(
        verify_chain(&chain),
        ChainVerdict::Invalid {
            index: 1,
            fault: ChainFault::IndexMismatch
        }
    );
}

#[test]
fn replaced_genesis_is_bad_genesis() {
    let mut chain = ledger_with(1).snapshot();
    chain[0].payload = anomaly("intruder", 9.0);
    assert_eq!(
        verify_chain(&chain),
        ChainVerdict::Invalid {
            index: 0,
            fault: ChainFault::BadGenesis
        }
    );
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_are_linearizable() {
    let ledger = Arc::new(Ledger::new());
    let mut handles = Vec::new();
    for m in 0..3 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::task::spawn_blocking(move || {
            for i in 0..50 {
                ledger.append(anomaly(&format!("compressor-{m}"), i as f64)).unwrap();
            }
        }));
    }

    // Readers run alongside the writers and never see a broken chain
    for _ in 0..20 {
        assert!(ledger.verify().is_valid());
        tokio::task::yield_now().await;
    }

    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(ledger.verify(), ChainVerdict::Valid { length: 151 });
}
