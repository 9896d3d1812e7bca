//! End-to-end snapshot and verification against a sled store

use super::test_utils::{snapshot_into, verify_from, Fixture};
use filetime::{set_file_mtime, FileTime};
use mirror::error::MirrorError;
use mirror::store::{MetadataStore, SledMetadataStore};
use mirror::tree::hasher::compute_digest;
use mirror::types::{EntryKind, MetadataRecord};
use mirror::verify::Finding;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Rewrite a file while keeping its modification time.
fn rewrite_keeping_mtime(path: &Path, content: &str) {
    let mtime = FileTime::from_last_modification_time(&fs::metadata(path).unwrap());
    fs::write(path, content).unwrap();
    set_file_mtime(path, mtime).unwrap();
}

fn hello_tree() -> Fixture {
    let fixture = Fixture::new();
    fixture.write("a.txt", "hello");
    fixture.write("b/c.txt", "x");
    fixture
}

fn store_contents(db: &Path) -> BTreeMap<String, Vec<(String, MetadataRecord)>> {
    let store = SledMetadataStore::open(db).unwrap();
    let mut contents = BTreeMap::new();
    for dir in store.read_all_directories().unwrap() {
        let mut files: Vec<_> = store.read_files_of(&dir).unwrap().into_iter().collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        contents.insert(dir, files);
    }
    store.close().unwrap();
    contents
}

#[test]
fn test_unchanged_tree_verifies_clean() {
    let fixture = hello_tree();
    fixture.mkdir("empty");
    let created = fixture.snapshot();
    assert_eq!(created.files, 2);
    assert_eq!(created.directories, 3);

    let (summary, findings) = fixture.verify();
    assert!(summary.is_clean(), "unexpected findings: {:?}", findings.findings);
    assert_eq!(summary.files_checked, 2);
    assert_eq!(summary.directories_seen, 3);
}

#[test]
fn test_same_length_edit_reports_one_digest_mismatch() {
    let fixture = hello_tree();
    fixture.snapshot();

    rewrite_keeping_mtime(&fixture.path("a.txt"), "Hello");

    let (summary, findings) = fixture.verify();
    assert_eq!(summary.findings, 1);
    assert!(matches!(
        &findings.findings[0],
        Finding::DigestMismatch { path, .. } if path == "a.txt"
    ));
}

#[test]
fn test_length_change_reports_size_and_digest() {
    let fixture = hello_tree();
    fixture.snapshot();

    rewrite_keeping_mtime(&fixture.path("b/c.txt"), "longer");

    let (_, findings) = fixture.verify();
    assert_eq!(findings.findings.len(), 2);
    assert!(matches!(
        &findings.findings[0],
        Finding::SizeMismatch { path, expected: 1, actual: 6 } if path == "b/c.txt"
    ));
    assert!(matches!(&findings.findings[1], Finding::DigestMismatch { .. }));
}

#[test]
fn test_touched_file_reports_modified_mismatch() {
    let fixture = hello_tree();
    fixture.snapshot();

    set_file_mtime(fixture.path("a.txt"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

    let (_, findings) = fixture.verify();
    assert_eq!(findings.findings.len(), 1);
    match &findings.findings[0] {
        Finding::ModifiedMismatch { path, actual, .. } => {
            assert_eq!(path, "a.txt");
            assert_eq!(*actual, 1_000_000_000_000);
        }
        other => panic!("unexpected finding {:?}", other),
    }
}

#[test]
fn test_deleted_file_reported_once() {
    let fixture = hello_tree();
    fixture.snapshot();

    fs::remove_file(fixture.path("b/c.txt")).unwrap();

    let (_, findings) = fixture.verify();
    assert_eq!(
        findings.findings,
        vec![Finding::FileNotFound {
            path: "b/c.txt".to_string()
        }]
    );
}

#[test]
fn test_added_file_reported_once() {
    let fixture = hello_tree();
    fixture.snapshot();

    fixture.write("b/d.txt", "new");

    let (_, findings) = fixture.verify();
    assert_eq!(
        findings.findings,
        vec![Finding::NewFile {
            path: "b/d.txt".to_string()
        }]
    );
}

#[test]
fn test_removed_empty_directory_reported() {
    let fixture = hello_tree();
    fixture.mkdir("d");
    fixture.snapshot();

    fs::remove_dir(fixture.path("d")).unwrap();

    let (_, findings) = fixture.verify();
    assert_eq!(
        findings.findings,
        vec![Finding::DirectoryNotFound {
            path: "d".to_string()
        }]
    );
}

#[test]
fn test_removed_subtree_reports_directories_only() {
    let fixture = hello_tree();
    fixture.write("b/e/f.txt", "f");
    fixture.snapshot();

    fs::remove_dir_all(fixture.path("b")).unwrap();

    let (_, findings) = fixture.verify();
    assert_eq!(
        findings.findings,
        vec![
            Finding::DirectoryNotFound {
                path: "b".to_string()
            },
            Finding::DirectoryNotFound {
                path: "b/e".to_string()
            },
        ]
    );
}

#[test]
fn test_file_turned_into_directory() {
    let fixture = hello_tree();
    fixture.snapshot();

    fs::remove_file(fixture.path("a.txt")).unwrap();
    fixture.write("a.txt/inner", "i");

    let (_, findings) = fixture.verify();
    assert_eq!(
        findings.findings,
        vec![
            Finding::TypeMismatch {
                path: "a.txt".to_string(),
                expected: EntryKind::File,
                actual: EntryKind::Directory,
            },
            Finding::NewFile {
                path: "a.txt/inner".to_string()
            },
        ]
    );
}

#[test]
fn test_recorded_digest_matches_file_bytes() {
    let fixture = hello_tree();
    fixture.snapshot();

    let store = SledMetadataStore::open(&fixture.db).unwrap();
    let record = store.lookup_file("", "a.txt").unwrap().unwrap();
    let info = store.snapshot_info().unwrap().unwrap();
    store.close().unwrap();

    let bytes = fs::read(fixture.path("a.txt")).unwrap();
    assert_eq!(record.digest, compute_digest(&bytes));
    assert_eq!(record.size, 5);
    assert_eq!(info.files, 2);
    assert_eq!(info.directories, 2);
}

#[test]
fn test_rebuild_is_idempotent() {
    let fixture = hello_tree();
    fixture.mkdir("b/empty");

    fixture.snapshot();
    let first = store_contents(&fixture.db);
    fixture.snapshot();
    let second = store_contents(&fixture.db);

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_resnapshot_drops_stale_entries() {
    let fixture = hello_tree();
    fixture.snapshot();

    fs::remove_dir_all(fixture.path("b")).unwrap();
    fixture.snapshot();

    let contents = store_contents(&fixture.db);
    assert_eq!(contents.keys().cloned().collect::<Vec<_>>(), vec![String::new()]);
    let (summary, _) = fixture.verify();
    assert!(summary.is_clean());
}

#[test]
fn test_failed_snapshot_keeps_previous_one() {
    let fixture = hello_tree();
    fixture.snapshot();

    let missing = fixture.path("missing");
    let err = snapshot_into(&missing, &fixture.db).unwrap_err();
    assert!(matches!(err, MirrorError::Scan { .. }));

    let (summary, _) = verify_from(&fixture.root, &fixture.db).unwrap();
    assert!(summary.is_clean());
}
