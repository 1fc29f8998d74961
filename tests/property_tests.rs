//! Property-based tests for the frontier's codec and partitioning
//! invariants.
//!
//! Unlike example-based tests that check specific known values, these
//! express universal truths that must hold for all valid inputs, which is
//! where a corrupted codec or a partitioning scheme that drops/duplicates
//! a domain would actually show up.
//!
//! # How to run
//!
//! ```bash
//! cargo test --test property_tests
//! PROPTEST_CASES=10000 cargo test --test property_tests
//! ```

use frontier::codec;
use frontier::partitioner;
use frontier::request::Request;
use proptest::prelude::*;
use std::collections::HashSet;

// == Codec Properties ==========================================================
// `codec::encode`/`codec::decode` are the only thing standing between a
// `Request` and a sorted-set member in the shared store. A roundtrip bug
// here means requests that silently change priority or depth on the way
// back out, which is worse than losing them outright.
// ==============================================================================

fn url_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,10}\\.[a-z]{2,4}/[a-z0-9]{0,10}".prop_map(|s| format!("http://{}", s))
}

proptest! {
    /// Verifies `decode(encode(r)) == r` for any priority/depth within
    /// `i16` bounds, where saturation is a no-op (spec §8).
    #[test]
    fn prop_codec_roundtrips_within_i16_depth(
        url in url_strategy(),
        priority in i32::MIN..i32::MAX,
        depth in i16::MIN as i32..=i16::MAX as i32,
    ) {
        let request = Request::new(url, priority, depth);
        let decoded = codec::decode(&codec::encode(&request, false), false).unwrap();
        prop_assert_eq!(decoded, request);
    }

    /// Verifies depth saturates toward `i16::MAX` rather than wrapping,
    /// for any depth at or above `2^16`.
    #[test]
    fn prop_depth_saturates_high(
        url in url_strategy(),
        priority in any::<i32>(),
        depth in (1i32 << 16)..i32::MAX,
    ) {
        let request = Request::new(url, priority, depth);
        let decoded = codec::decode(&codec::encode(&request, false), false).unwrap();
        prop_assert!(decoded.depth >= (1 << 15) - 1,
            "depth {} encoded from {} did not saturate high", decoded.depth, depth);
    }

    /// Verifies depth saturates toward `i16::MIN` rather than wrapping,
    /// for any depth at or below `-2^16`.
    #[test]
    fn prop_depth_saturates_low(
        url in url_strategy(),
        priority in any::<i32>(),
        depth in i32::MIN..=-(1i32 << 16),
    ) {
        let request = Request::new(url, priority, depth);
        let decoded = codec::decode(&codec::encode(&request, false), false).unwrap();
        prop_assert!(decoded.depth <= -(1 << 15),
            "depth {} encoded from {} did not saturate low", decoded.depth, depth);
    }

    /// Verifies URL compression is lossless for arbitrary percent-encoded
    /// non-ASCII byte sequences that decode to valid UTF-8 (spec §4.1).
    #[test]
    fn prop_url_compress_roundtrips_percent_encoded_utf8(
        chars in prop::collection::vec(any::<char>(), 1..12),
    ) {
        let word: String = chars.into_iter().collect();
        let mut encoded = String::from("http://example.com/");
        for byte in word.as_bytes() {
            encoded.push('%');
            encoded.push_str(&format!("{:02X}", byte));
        }
        let compressed = codec::compress(&encoded);
        prop_assert_eq!(codec::decompress(&compressed), encoded);
    }
}

// == Domain Partitioner Properties =============================================
// `partitioner::owns` decides which of many live workers is responsible for
// a domain. If the partition weren't exhaustive and disjoint, some domains
// would never be crawled (dropped) or would race between two workers far
// more often than the brief churn window the spec accepts.
// ==============================================================================

proptest! {
    /// Verifies every queue key is owned by exactly one worker index, for
    /// any fixed worker count (spec §8: "for any fixed (idx, n) the set of
    /// owned queue keys is exactly { q | crc32(q) mod n == idx }").
    #[test]
    fn prop_partitioning_is_exhaustive_and_disjoint(
        n_keys in 1usize..200,
        n_workers in 1u32..16,
    ) {
        let keys: Vec<String> = (0..n_keys).map(|i| format!("P:domain:d{}.example.com", i)).collect();
        let mut seen = HashSet::new();
        for idx in 0..n_workers {
            for k in partitioner::partition(&keys, idx, n_workers) {
                prop_assert!(seen.insert(k.clone()), "key {} assigned to more than one worker index", k);
            }
        }
        prop_assert_eq!(seen.len(), keys.len());
    }

    /// Verifies exactly one worker index out of `n_workers` owns any given
    /// key — the single-key mirror of the exhaustive-and-disjoint property
    /// above, stated without building a whole key list.
    #[test]
    fn prop_exactly_one_owner_per_key(
        key in "[a-z]{1,20}\\.example\\.com",
        n in 1u32..16,
    ) {
        let owners: Vec<u32> = (0..n).filter(|&idx| partitioner::owns(&key, idx, n)).collect();
        prop_assert_eq!(owners.len(), 1, "key {} had owners {:?} out of {} workers", key, owners, n);
    }
}
