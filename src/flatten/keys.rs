/// Synthetic integer identifier linking a row to the rows exploded from it.
pub type SurrogateKey = i64;

/// Hands out surrogate keys. The offset/stride constructor lets parallel
/// workers draw from disjoint ranges (worker `i` of `n` takes offset `i`,
/// stride `n`) so flattening needs no shared counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAllocator {
    next: SurrogateKey,
    stride: i64,
}

impl KeyAllocator {
    pub fn new() -> Self {
        KeyAllocator::with_offset_and_stride(0, 1)
    }

    pub fn with_offset_and_stride(offset: SurrogateKey, stride: i64) -> Self {
        debug_assert!(stride >= 1, "stride must be positive");
        KeyAllocator {
            next: offset,
            stride,
        }
    }

    /// Take the next key. Keys are handed out exactly once and never reused.
    pub fn next_key(&mut self) -> SurrogateKey {
        let key = self.next;
        self.next += self.stride;
        key
    }
}

impl Default for KeyAllocator {
    fn default() -> Self {
        KeyAllocator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sequential_by_default() {
        let mut keys = KeyAllocator::new();
        assert_eq!(keys.next_key(), 0);
        assert_eq!(keys.next_key(), 1);
        assert_eq!(keys.next_key(), 2);
    }

    #[test]
    fn strided_ranges_are_disjoint() {
        let mut a = KeyAllocator::with_offset_and_stride(0, 3);
        let mut b = KeyAllocator::with_offset_and_stride(1, 3);
        let mut c = KeyAllocator::with_offset_and_stride(2, 3);

        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(a.next_key()));
            assert!(seen.insert(b.next_key()));
            assert!(seen.insert(c.next_key()));
        }
        assert_eq!(seen.len(), 300);
    }
}
