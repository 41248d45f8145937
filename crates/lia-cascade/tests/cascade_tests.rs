//! Behavioural tests for the cascade batcher
//!
//! ```bash
//! cargo test -p lia-cascade --test cascade_tests
//! ```

use lia_cascade::{Cascade, CascadeConfig, CascadeError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

/// Cascade whose callback records every batch it sees
fn recording_cascade(config: CascadeConfig) -> (Arc<Cascade<u64>>, Arc<Mutex<Vec<Vec<u64>>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cascade = Cascade::new(config, move |batch: Vec<u64>| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().await.push(batch);
        }
    })
    .unwrap();
    (Arc::new(cascade), seen)
}

#[tokio::test]
async fn test_concurrent_producers_no_loss_no_duplicates() {
    let (cascade, seen) = recording_cascade(CascadeConfig::new(Duration::from_millis(20), 16));
    cascade.start().unwrap();

    let mut producers = Vec::new();
    for producer in 0..8u64 {
        let cascade = Arc::clone(&cascade);
        producers.push(tokio::spawn(async move {
            for i in 0..250u64 {
                cascade.put(producer * 1_000 + i).unwrap();
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    cascade.stop(true).await;
    // batches flushed before stop run on detached tasks
    tokio::time::sleep(Duration::from_millis(50)).await;

    let batches = seen.lock().await;
    assert!(batches.iter().all(|b| !b.is_empty()));
    assert!(batches.iter().all(|b| b.len() <= 16));

    let all: Vec<u64> = batches.iter().flatten().copied().collect();
    let unique: HashSet<u64> = all.iter().copied().collect();
    assert_eq!(all.len(), 2_000);
    assert_eq!(unique.len(), 2_000);
}

#[tokio::test(start_paused = true)]
async fn test_stop_drains_queue_in_chunks() {
    let (cascade, seen) = recording_cascade(
        CascadeConfig::new(Duration::from_secs(60), 4)
            .with_max_wait_finalize(Duration::from_secs(1)),
    );
    cascade.start().unwrap();

    for i in 0..3 {
        cascade.put(i).unwrap();
    }
    // let the loop pull the first items into its in-progress batch
    tokio::task::yield_now().await;
    // these stay queued: the loop does not run again before stop
    for i in 3..11 {
        cascade.put(i).unwrap();
    }

    cascade.stop(true).await;

    let batches = seen.lock().await;
    let mut sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![3, 4, 4]);

    let mut all: Vec<u64> = batches.iter().flatten().copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..11).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_finalize_timeout_cancels_slow_callbacks() {
    let completed = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));

    let done = Arc::clone(&completed);
    let begun = Arc::clone(&started);
    let cascade = Cascade::new(
        CascadeConfig::new(Duration::from_secs(60), 2)
            .with_max_wait_finalize(Duration::from_millis(200)),
        move |_batch: Vec<u32>| {
            let done = Arc::clone(&done);
            let begun = Arc::clone(&begun);
            async move {
                begun.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(30)).await;
                done.fetch_add(1, Ordering::SeqCst);
            }
        },
    )
    .unwrap();
    cascade.start().unwrap();

    for i in 0..5 {
        cascade.put(i).unwrap();
    }

    let stop_started = Instant::now();
    cascade.stop(true).await;
    let waited = stop_started.elapsed();

    assert!(waited >= Duration::from_millis(200));
    assert!(waited < Duration::from_secs(1));
    assert_eq!(started.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 0, "aborted callbacks must not finish");
}

#[tokio::test]
async fn test_panicking_callback_does_not_stop_loop() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cascade = Cascade::new(
        CascadeConfig::new(Duration::from_millis(10), 1),
        move |batch: Vec<u32>| {
            let tx = tx.clone();
            async move {
                assert!(batch[0] != 13, "unlucky batch");
                let _ = tx.send(batch[0]);
            }
        },
    )
    .unwrap();
    cascade.start().unwrap();

    cascade.put(13).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    cascade.put(14).unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("loop should survive a panicking callback");
    assert_eq!(delivered, Some(14));
    assert!(cascade.is_running());

    cascade.stop(true).await;
}

#[tokio::test]
async fn test_stop_without_wait_still_delivers() {
    let (cascade, seen) = recording_cascade(CascadeConfig::new(Duration::from_secs(60), 100));
    cascade.start().unwrap();
    for i in 0..5 {
        cascade.put(i).unwrap();
    }

    cascade.stop(false).await;
    assert_eq!(cascade.put(99), Err(CascadeError::NotRunning));

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let delivered: usize = seen.lock().await.iter().map(Vec::len).sum();
        if delivered == 5 {
            break;
        }
        assert!(Instant::now() < deadline, "background drain never delivered");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_latency_bounded_by_window() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cascade = Cascade::new(
        CascadeConfig::new(Duration::from_millis(100), 1_000),
        move |batch: Vec<Instant>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((Instant::now(), batch));
            }
        },
    )
    .unwrap();
    cascade.start().unwrap();

    // trickle items in slower than the window so several batches form
    for _ in 0..10 {
        cascade.put(Instant::now()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    cascade.stop(true).await;

    let mut total = 0;
    while let Ok((flushed_at, batch)) = rx.try_recv() {
        let oldest = batch.iter().min().copied().unwrap();
        assert!(flushed_at.duration_since(oldest) <= Duration::from_millis(100));
        total += batch.len();
    }
    assert_eq!(total, 10);
}
