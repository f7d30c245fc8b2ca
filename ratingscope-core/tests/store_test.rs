//! Integration tests for the rating store's atomic replace.

use ratingscope_core::data::RatingStore;
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn interrupted_write_leaves_canonical_file_intact() {
    let dir = tempfile::tempdir().unwrap();
    let store = RatingStore::new(dir.path().join("ratings.csv"));
    store.write(&[1500, 1600, 1700]).unwrap();
    let before = fs::read(store.path()).unwrap();

    // A writer that died mid-write leaves a truncated temp file behind.
    let leftover = dir.path().join("ratings.csv.crashed.tmp");
    fs::write(&leftover, "Rating\n1800\n19").unwrap();

    assert_eq!(fs::read(store.path()).unwrap(), before);
    assert_eq!(store.read().unwrap().values(), &[1500, 1600, 1700]);
    assert_eq!(store.temp_paths(), vec![leftover.clone()]);

    // The next write goes through its own temp file and ignores the leftover.
    store.write(&[10, 20]).unwrap();
    assert_eq!(store.read().unwrap().values(), &[10, 20]);
    assert_eq!(store.temp_paths(), vec![leftover]);
}

#[test]
fn readers_only_see_whole_generations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ratings.csv");
    let gen_a: Vec<u32> = vec![111; 5_000];
    let gen_b: Vec<u32> = vec![222; 7_000];
    RatingStore::new(&path).write(&gen_a).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let store = RatingStore::new(&path);
        let done = Arc::clone(&done);
        let (a, b) = (gen_a.clone(), gen_b.clone());
        thread::spawn(move || {
            for i in 0..40 {
                let next = if i % 2 == 0 { &b } else { &a };
                store.write(next).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let reader = RatingStore::new(&path);
    let mut reads = 0;
    while !done.load(Ordering::SeqCst) || reads == 0 {
        let set = reader.read().unwrap();
        let values = set.values();
        let whole_a = values.len() == gen_a.len() && values.iter().all(|&v| v == 111);
        let whole_b = values.len() == gen_b.len() && values.iter().all(|&v| v == 222);
        assert!(whole_a || whole_b, "torn read of {} values", values.len());
        reads += 1;
    }

    writer.join().unwrap();
}

#[test]
fn concurrent_writers_never_tear_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ratings.csv");
    let gen_a: Vec<u32> = vec![111; 20_000];
    let gen_b: Vec<u32> = vec![2222; 30_000];
    RatingStore::new(&path).write(&gen_a).unwrap();

    let writers_left = Arc::new(AtomicUsize::new(2));
    let writers: Vec<_> = [gen_a.clone(), gen_b.clone()]
        .into_iter()
        .map(|set| {
            let store = RatingStore::new(&path);
            let writers_left = Arc::clone(&writers_left);
            thread::spawn(move || {
                let failures = (0..30).filter(|_| store.write(&set).is_err()).count();
                writers_left.fetch_sub(1, Ordering::SeqCst);
                failures
            })
        })
        .collect();

    let reader = RatingStore::new(&path);
    let mut reads = 0;
    while writers_left.load(Ordering::SeqCst) > 0 || reads == 0 {
        let set = reader.read().unwrap();
        let values = set.values();
        let whole_a = values.len() == gen_a.len() && values.iter().all(|&v| v == 111);
        let whole_b = values.len() == gen_b.len() && values.iter().all(|&v| v == 2222);
        assert!(whole_a || whole_b, "torn read of {} values", values.len());
        reads += 1;
    }

    for writer in writers {
        assert_eq!(writer.join().unwrap(), 0, "writes failed");
    }
    assert!(reader.temp_paths().is_empty());
}

#[test]
fn metadata_follows_latest_write() {
    let dir = tempfile::tempdir().unwrap();
    let store = RatingStore::new(dir.path().join("ratings.csv"));

    store.write(&[5, 6, 7]).unwrap();
    let first = store.meta().unwrap();
    store.write(&[1, 9]).unwrap();
    let second = store.meta().unwrap();

    assert_eq!(first.sample_count, 3);
    assert_eq!(second.sample_count, 2);
    assert_eq!((second.min, second.max), (1, 9));
    assert_ne!(first.data_hash, second.data_hash);
    assert!(second.written_at >= first.written_at);
}
