//! Lexicographic byte order

use std::cmp::Ordering;

use super::{shared_prefix_len, Comparator};

/// Plain `memcmp` order. The default for every engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl BytewiseComparator {
    pub const NAME: &'static str = "sortkv.BytewiseComparator";
}

impl Comparator for BytewiseComparator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        a == b
    }

    fn abbreviated_key(&self, key: &[u8]) -> u64 {
        bytewise_abbreviation(key)
    }

    fn separator(&self, a: &[u8], b: &[u8]) -> Vec<u8> {
        if a >= b {
            return a.to_vec();
        }

        let shared = shared_prefix_len(a, b);
        if shared >= a.len().min(b.len()) {
            // One key is a prefix of the other; nothing shorter fits.
            return a.to_vec();
        }

        let diff = a[shared];
        if diff < u8::MAX && diff + 1 < b[shared] {
            let mut sep = a[..=shared].to_vec();
            sep[shared] += 1;
            return sep;
        }
        a.to_vec()
    }

    fn successor(&self, key: &[u8]) -> Option<Vec<u8>> {
        bytewise_successor(key)
    }

    fn immediate_successor(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut next = Vec::with_capacity(key.len() + 1);
        next.extend_from_slice(key);
        next.push(0);
        Some(next)
    }
}

/// First eight bytes as a big-endian integer, zero padded.
pub(crate) fn bytewise_abbreviation(key: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = key.len().min(8);
    buf[..n].copy_from_slice(&key[..n]);
    u64::from_be_bytes(buf)
}

/// Smallest key greater than every key starting with `prefix`:
/// "hello" -> "hellp", "ab\xff" -> "ac". All-0xff (or empty) has none.
pub(crate) fn bytewise_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let pos = prefix.iter().rposition(|&b| b != u8::MAX)?;
    let mut end = prefix[..=pos].to_vec();
    end[pos] += 1;
    Some(end)
}
