//! The digest depends only on the bytes, never on how they were chunked

use mirror::tree::hasher::{compute_digest, digest_reader, DigestBuilder};
use proptest::prelude::*;
use std::io::Cursor;

proptest! {
    #[test]
    fn digest_is_independent_of_chunk_size(
        content in proptest::collection::vec(any::<u8>(), 0..20_000),
        chunk_size in 1usize..9_000,
    ) {
        let whole = compute_digest(&content);
        let (bytes, chunked) = digest_reader(&mut Cursor::new(&content), chunk_size).unwrap();
        prop_assert_eq!(bytes, content.len() as u64);
        prop_assert_eq!(chunked, whole);
    }

    #[test]
    fn builder_matches_split_updates(
        content in proptest::collection::vec(any::<u8>(), 0..4_096),
        split in any::<prop::sample::Index>(),
    ) {
        let at = split.index(content.len() + 1);
        let mut builder = DigestBuilder::new();
        builder.update(&content[..at]);
        builder.update(&content[at..]);
        let (bytes, digest) = builder.finish();
        prop_assert_eq!(bytes, content.len() as u64);
        prop_assert_eq!(digest, compute_digest(&content));
    }
}

/// Distinct contents should digest differently
#[test]
fn test_distinct_content_distinct_digest() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(
            &(any::<Vec<u8>>(), any::<Vec<u8>>()),
            |(first, second)| {
                prop_assume!(first != second);
                prop_assert_ne!(compute_digest(&first), compute_digest(&second));
                Ok(())
            },
        )
        .unwrap();
}
