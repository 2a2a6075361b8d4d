/// Out-of-order packet buffer
///
/// Sparse store of raw frames that arrived ahead of the next expected
/// sequence, keyed and iterated in ascending sequence order. Bounded: on
/// overflow the entry with the smallest sequence is evicted first, since it
/// sits furthest behind the highest sequence seen and is the least likely
/// to be resequenced in time.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored,
    /// The buffer was full; the entry with this sequence was evicted to
    /// make room.
    EvictedOldest(u64),
}

#[derive(Debug)]
pub struct ReorderBuffer {
    entries: BTreeMap<u64, Vec<u8>>,
    cap: usize,
}

impl ReorderBuffer {
    pub fn new(cap: usize) -> Self {
        ReorderBuffer {
            entries: BTreeMap::new(),
            cap,
        }
    }

    /// Store a copy of `frame` under `seq`.
    pub fn insert(&mut self, seq: u64, frame: &[u8]) -> InsertOutcome {
        let mut outcome = InsertOutcome::Stored;
        if !self.entries.contains_key(&seq) && self.entries.len() >= self.cap {
            if let Some((evicted, _)) = self.entries.pop_first() {
                outcome = InsertOutcome::EvictedOldest(evicted);
            }
        }
        self.entries.insert(seq, frame.to_vec());
        outcome
    }

    /// Remove and return the frame stored under `seq`, if any.
    pub fn take(&mut self, seq: u64) -> Option<Vec<u8>> {
        self.entries.remove(&seq)
    }

    pub fn contains(&self, seq: u64) -> bool {
        self.entries.contains_key(&seq)
    }

    /// Consume the contiguous run of frames starting at `next`.
    pub fn drain_contiguous_from(&mut self, next: u64) -> DrainContiguous<'_> {
        DrainContiguous { buf: self, next }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub struct DrainContiguous<'a> {
    buf: &'a mut ReorderBuffer,
    next: u64,
}

impl Iterator for DrainContiguous<'_> {
    type Item = (u64, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.buf.take(self.next)?;
        let seq = self.next;
        self.next += 1;
        Some((seq, frame))
    }
}
