//! Backpressure, timeout and construction tests

use seqring::ring::{Operation, RingBuffer, RingError, WaitGranularity};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn ring(capacity: usize) -> Arc<RingBuffer> {
    Arc::new(
        RingBuffer::builder()
            .capacity(capacity)
            .parallelism(4)
            .build()
            .unwrap(),
    )
}

#[test]
fn test_construction_errors() {
    assert_eq!(RingBuffer::new(0).unwrap_err(), RingError::InvalidCapacity(0));

    let err = RingBuffer::builder()
        .capacity(16)
        .parallelism(3)
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        RingError::InsufficientParallelism {
            required: 4,
            available: 3
        }
    ));
}

#[test]
fn test_blocked_writers_released_one_lap_at_a_time() {
    let ring = ring(2);
    for _ in 0..2 {
        let sequence = ring.reserve_write(0);
        ring.commit_write(0, sequence).unwrap();
    }

    // Buffer is full: the next two writers must wait for readers
    let granted = Arc::new(AtomicU64::new(0));
    let writers: Vec<_> = (1..=2)
        .map(|id| {
            let ring = Arc::clone(&ring);
            let granted = Arc::clone(&granted);
            thread::spawn(move || {
                let sequence = ring.reserve_write(id);
                granted.fetch_add(1, Ordering::SeqCst);
                ring.commit_write(id, sequence).unwrap();
                sequence
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    assert_eq!(granted.load(Ordering::SeqCst), 0);

    let first = ring.reserve_read(9);
    ring.commit_read(9, first).unwrap();

    // Exactly one slot freed, so exactly one writer can proceed
    let deadline = Instant::now() + Duration::from_secs(5);
    while granted.load(Ordering::SeqCst) < 1 && Instant::now() < deadline {
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(30));
    assert_eq!(granted.load(Ordering::SeqCst), 1);

    let second = ring.reserve_read(9);
    ring.commit_read(9, second).unwrap();

    let mut sequences: Vec<u64> = writers.into_iter().map(|h| h.join().unwrap()).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, vec![2, 3]);
    assert_eq!(ring.snapshot().write_commit, 4);
}

#[test]
fn test_commit_out_of_order_waits_for_predecessor() {
    let ring = ring(8);
    let first = ring.reserve_write(1);
    let second = ring.reserve_write(2);

    let late = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || ring.commit_write(2, second))
    };

    thread::sleep(Duration::from_millis(20));
    // sequence 1 finished its work first but must not be visible yet
    assert_eq!(ring.snapshot().write_commit, 0);

    ring.commit_write(1, first).unwrap();
    late.join().unwrap().unwrap();
    assert_eq!(ring.snapshot().write_commit, 2);
}

#[test]
fn test_read_commit_out_of_order_waits_for_predecessor() {
    let ring = ring(4);
    for _ in 0..2 {
        let sequence = ring.reserve_write(0);
        ring.commit_write(0, sequence).unwrap();
    }
    let first = ring.reserve_read(1);
    let second = ring.reserve_read(2);

    assert!(matches!(
        ring.commit_read_timeout(2, second, Duration::from_millis(10)),
        Err(RingError::Timeout {
            operation: Operation::CommitRead,
            sequence: 1
        })
    ));

    ring.commit_read(1, first).unwrap();
    ring.commit_read(2, second).unwrap();
    assert_eq!(ring.snapshot().read_commit, 2);
}

#[test]
fn test_timed_out_reservation_is_still_owned() {
    let ring = ring(1);
    let sequence = ring.reserve_write(1);
    ring.commit_write(1, sequence).unwrap();

    let pending = match ring.reserve_write_timeout(2, Duration::from_millis(10)) {
        Err(RingError::Timeout { sequence, .. }) => sequence,
        other => panic!("expected timeout, got {other:?}"),
    };
    assert_eq!(pending, 1);

    // Another writer queues behind the abandoned-for-now reservation
    let third = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let sequence = ring.reserve_write(3);
            ring.commit_write(3, sequence).unwrap();
            sequence
        })
    };

    let reader = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            for _ in 0..3 {
                let sequence = ring.reserve_read(4);
                ring.commit_read(4, sequence).unwrap();
            }
        })
    };

    // Finish the pending reservation; only then can the queue drain
    let granted = ring
        .await_write_slot(2, pending, Duration::from_secs(5))
        .unwrap();
    ring.commit_write(2, granted).unwrap();

    assert_eq!(third.join().unwrap(), 2);
    reader.join().unwrap();
    let snapshot = ring.snapshot();
    assert_eq!(snapshot.write_commit, 3);
    assert_eq!(snapshot.read_commit, 3);
}

#[test]
fn test_timed_out_reservations_cannot_commit_early() {
    let ring = ring(1);
    let write = ring.reserve_write(1);
    ring.commit_write(1, write).unwrap();

    // Full on the writer side
    let pending_write = match ring.reserve_write_timeout(2, Duration::from_millis(5)) {
        Err(RingError::Timeout { sequence, .. }) => sequence,
        other => panic!("expected timeout, got {other:?}"),
    };
    assert!(matches!(
        ring.commit_write(2, pending_write),
        Err(RingError::NotGranted {
            operation: Operation::CommitWrite,
            sequence: 1
        })
    ));

    let read = ring.reserve_read(3);
    ring.commit_read(3, read).unwrap();

    // Empty on the reader side
    let pending_read = match ring.reserve_read_timeout(4, Duration::from_millis(5)) {
        Err(RingError::Timeout { sequence, .. }) => sequence,
        other => panic!("expected timeout, got {other:?}"),
    };
    assert!(matches!(
        ring.commit_read(4, pending_read),
        Err(RingError::NotGranted {
            operation: Operation::CommitRead,
            sequence: 1
        })
    ));

    let snapshot = ring.snapshot();
    assert!(snapshot.is_ordered());
    assert!(snapshot.occupied() <= 1);

    // Both reservations complete once granted
    let granted = ring
        .await_write_slot(2, pending_write, Duration::from_secs(1))
        .unwrap();
    ring.commit_write(2, granted).unwrap();
    let granted = ring
        .await_read_slot(4, pending_read, Duration::from_secs(1))
        .unwrap();
    ring.commit_read(4, granted).unwrap();

    let snapshot = ring.snapshot();
    assert_eq!(snapshot.write_commit, 2);
    assert_eq!(snapshot.read_commit, 2);
}

#[test]
fn test_misuse_is_rejected_on_both_sides() {
    let ring = ring(2);
    let write = ring.reserve_write(1);
    ring.commit_write(1, write).unwrap();
    let read = ring.reserve_read(2);
    ring.commit_read(2, read).unwrap();

    assert!(matches!(
        ring.commit_read(2, read),
        Err(RingError::AlreadyCommitted { .. })
    ));
    assert!(matches!(
        ring.commit_write(1, 10),
        Err(RingError::NotReserved { reserved: 1, .. })
    ));

    // The ring keeps working after rejected calls
    let write = ring.reserve_write(1);
    ring.commit_write(1, write).unwrap();
    assert_eq!(ring.reserve_read(2), 1);
}

#[test]
fn test_coarse_ring_handles_timeouts() {
    let ring = RingBuffer::builder()
        .capacity(1)
        .granularity(WaitGranularity::Coarse)
        .parallelism(4)
        .build()
        .unwrap();

    let started = Instant::now();
    assert!(ring
        .reserve_read_timeout(1, Duration::from_millis(15))
        .is_err());
    assert!(started.elapsed() >= Duration::from_millis(15));
}
