// World-state benchmarks for the ledger protocol.
//
// Covers composite key encoding, simulated range scans, and commit
// validation on the in-memory and sled-backed stores.

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ledger_protocol::keys;
use ledger_protocol::storage::{LedgerDb, MemoryStore, TxSimulator, VersionedStore};
use ledger_protocol::{Caller, TxContext};

/// Writes `n` ledger entries for token GLD in one transaction.
fn populate(store: &dyn VersionedStore, n: usize) {
    let mut tx = TxSimulator::new(store, Caller::super_admin("root"), "seed", Utc::now());
    for i in 0..n {
        let key = keys::ledger_key("GLD", &format!("holder-{i}")).unwrap();
        tx.put_state(&key, br#"{"Amount":1.0}"#.to_vec()).unwrap();
    }
    store.commit(&tx.finish().unwrap()).unwrap();
}

fn bench_key_encoding(c: &mut Criterion) {
    c.bench_function("keys/ledger_key", |b| {
        b.iter(|| keys::ledger_key("gld", "alice").unwrap());
    });

    let key = keys::ledger_key("GLD", "ALICE").unwrap();
    c.bench_function("keys/split", |b| {
        b.iter(|| keys::split_composite_key(&key).unwrap());
    });
}

fn bench_prefix_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage/prefix_scan");

    for n in [10usize, 100, 1000] {
        let store = MemoryStore::new();
        populate(&store, n);
        let prefix = keys::ledger_prefix("GLD").unwrap();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut tx = TxSimulator::new(&store, Caller::user("bench"), "scan", Utc::now());
                let count = tx.state_by_prefix(&prefix).unwrap().count();
                tx.finish().unwrap();
                count
            });
        });
    }
    group.finish();
}

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage/commit");

    let memory = MemoryStore::new();
    let sled = LedgerDb::open_temporary().unwrap();
    let stores: [(&str, &dyn VersionedStore); 2] = [("memory", &memory), ("sled", &sled)];
    let key = keys::ledger_key("GLD", "alice").unwrap();

    for (name, store) in stores {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut tx = TxSimulator::new(store, Caller::user("alice"), "bench", Utc::now());
                tx.get_state(&key).unwrap();
                tx.put_state(&key, br#"{"Amount":2.0}"#.to_vec()).unwrap();
                store.commit(&tx.finish().unwrap()).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_key_encoding, bench_prefix_scan, bench_commit);
criterion_main!(benches);
