//! Deterministic mapping from a per-domain queue key to the worker that owns
//! it, given the current set of live workers.
//!
//! `crc32(key) mod n_workers == my_index` is pure and stateless: any worker
//! can decide ownership of any key without a round-trip to the store once it
//! knows `(my_index, n_workers)` from the [`crate::worker_directory`]. The
//! polynomial is fixed (CRC-32/ISO-HDLC, the same one `crc32fast` and Python's
//! `zlib.crc32` compute) so ownership stays stable across a fleet mixing
//! implementations in different languages.

/// Returns true if `key` belongs to the worker at `my_index` out of
/// `n_workers` total live workers.
///
/// `n_workers` of 0 is treated as 1 (the degenerate single-worker case from
/// [`crate::worker_directory::WorkerDirectory::discover`]).
pub fn owns(key: &str, my_index: u32, n_workers: u32) -> bool {
    let n = n_workers.max(1);
    crc32fast::hash(key.as_bytes()) % n == my_index % n
}

/// Filter an iterator of queue keys down to the ones this worker owns.
pub fn partition<'a, I>(keys: I, my_index: u32, n_workers: u32) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    keys.into_iter()
        .filter(|k| owns(k, my_index, n_workers))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn partitioning_is_exhaustive_and_disjoint() {
        let keys: Vec<String> = (0..200).map(|i| format!("P:domain:d{}.com", i)).collect();
        let n_workers = 4;
        let mut seen = HashSet::new();
        for idx in 0..n_workers {
            for k in partition(&keys, idx, n_workers) {
                assert!(seen.insert(k), "key assigned to more than one worker");
            }
        }
        assert_eq!(seen.len(), keys.len());
    }

    #[test]
    fn owns_matches_direct_crc32_formula() {
        let key = "P:domain:example.com";
        let hash = crc32fast::hash(key.as_bytes());
        for n in 1..8u32 {
            for idx in 0..n {
                assert_eq!(owns(key, idx, n), hash % n == idx);
            }
        }
    }

    #[test]
    fn single_worker_owns_everything() {
        assert!(owns("P:domain:a.com", 0, 1));
        assert!(owns("P:domain:b.com", 0, 0));
    }
}
