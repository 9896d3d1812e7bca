//! Integration tests for the metadata stores driven by the snapshot builder

use super::test_utils::Fixture;
use mirror::error::{MirrorError, StorageError};
use mirror::snapshot::create_db;
use mirror::store::{with_store, MemoryMetadataStore, MetadataStore, SledMetadataStore};
use mirror::tree::probe::MetadataProbe;
use mirror::tree::scanner::TreeScanner;
use mirror::types::DirectorySet;

fn sample_tree() -> Fixture {
    let fixture = Fixture::new();
    fixture.write("top.txt", "top");
    fixture.write("src/main.rs", "fn main() {}");
    fixture.write("src/nested/deep.txt", "deep");
    fixture.mkdir("empty");
    fixture
}

#[test]
fn test_sled_and_memory_record_the_same_snapshot() {
    let fixture = sample_tree();
    let scanner = TreeScanner::default();
    let probe = MetadataProbe::default();

    let mut memory = MemoryMetadataStore::new();
    create_db(&fixture.root, &mut memory, &scanner, probe).unwrap();

    let mut sled = SledMetadataStore::open(&fixture.db).unwrap();
    create_db(&fixture.root, &mut sled, &scanner, probe).unwrap();

    let dirs = sled.read_all_directories().unwrap();
    let expected: DirectorySet = ["", "empty", "src", "src/nested"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(dirs, expected);
    assert_eq!(memory.read_all_directories().unwrap(), dirs);

    for dir in &dirs {
        assert_eq!(
            sled.read_files_of(dir).unwrap(),
            memory.read_files_of(dir).unwrap(),
            "files of {:?}",
            dir
        );
    }
    assert_eq!(sled.entry_count().unwrap(), 7);
    sled.close().unwrap();
}

#[test]
fn test_snapshot_survives_reopen() {
    let fixture = sample_tree();
    fixture.snapshot();

    let store = SledMetadataStore::open(&fixture.db).unwrap();
    let record = store.lookup_file("src/nested", "deep.txt").unwrap().unwrap();
    assert_eq!(record.size, 4);
    assert!(store.lookup_file("src", "deep.txt").unwrap().is_none());
    let info = store.snapshot_info().unwrap().unwrap();
    assert_eq!(info.files, 3);
    assert_eq!(info.directories, 4);
    store.close().unwrap();
}

#[test]
fn test_store_failure_closes_once_and_keeps_prior_snapshot() {
    let fixture = sample_tree();
    let scanner = TreeScanner::default();
    let probe = MetadataProbe::default();

    let store = MemoryMetadataStore::new();
    with_store(store.clone(), |s| create_db(&fixture.root, s, &scanner, probe)).unwrap();
    let before = store.committed_entries().unwrap();
    assert_eq!(store.close_count(), 1);

    fixture.write("extra.txt", "more");
    store.fail_writes_after(2);
    let err = with_store(store.clone(), |s| create_db(&fixture.root, s, &scanner, probe))
        .unwrap_err();

    assert!(matches!(err, MirrorError::Storage(StorageError::Write(_))));
    assert_eq!(store.close_count(), 2);
    assert_eq!(store.committed_entries().unwrap(), before);
}

#[test]
fn test_repeated_runs_on_one_store_under_parallel_load() {
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            std::thread::spawn(move || {
                let fixture = sample_tree();
                for round in 0..8 {
                    fixture.snapshot();
                    let (summary, findings) = fixture.verify();
                    assert!(
                        summary.is_clean(),
                        "worker {} round {}: {:?}",
                        worker,
                        round,
                        findings.findings
                    );
                    fixture.write(&format!("round/{}.txt", round), "r");
                    fixture.snapshot();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
}
