//! Hash index of the shared dictionary.
//!
//! Buckets map a hash of three consecutive pixels to the segment slot and
//! pixel offset where those pixels were last seen. Encoders read and write
//! buckets concurrently without taking the dictionary lock; each entry is one
//! atomic word, and readers validate every candidate before using it, so a
//! stale or racing entry only costs a missed match.

use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "chained-hash")]
use std::sync::atomic::AtomicU8;

use crate::config::{HASH_CHAIN_SIZE, HASH_MASK, HASH_SIZE};

/// One candidate reference: a segment slot and a pixel (unit) offset in it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HashEntry {
    pub image_seg_idx: u32,
    pub ref_pix_idx: u32,
}

impl HashEntry {
    #[inline]
    fn pack(self) -> u64 {
        ((self.image_seg_idx as u64) << 32) | self.ref_pix_idx as u64
    }

    #[inline]
    fn unpack(v: u64) -> Self {
        HashEntry { image_seg_idx: (v >> 32) as u32, ref_pix_idx: v as u32 }
    }
}

pub(crate) struct HashTable {
    entries: Box<[AtomicU64]>,
    /// Next chain position to overwrite, per bucket.
    #[cfg(feature = "chained-hash")]
    counters: Box<[AtomicU8]>,
}

impl HashTable {
    pub(crate) fn new() -> Self {
        HashTable {
            entries: (0..HASH_SIZE * HASH_CHAIN_SIZE).map(|_| AtomicU64::new(0)).collect(),
            #[cfg(feature = "chained-hash")]
            counters: (0..HASH_SIZE).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Zero every bucket. Entries then point at slot 0, offset 0, which the
    /// match validation rejects unless that slot really holds usable pixels.
    pub(crate) fn reset(&self) {
        for e in self.entries.iter() {
            e.store(0, Ordering::Relaxed);
        }
        #[cfg(feature = "chained-hash")]
        for c in self.counters.iter() {
            c.store(0, Ordering::Relaxed);
        }
    }

    /// Record the newest occurrence for bucket `hval`.
    #[inline]
    pub(crate) fn update(&self, hval: u32, image_seg_idx: u32, ref_pix_idx: u32) {
        let h = (hval & HASH_MASK) as usize;
        let entry = HashEntry { image_seg_idx, ref_pix_idx }.pack();
        #[cfg(feature = "chained-hash")]
        {
            // u8 wrap-around keeps the ring order since 256 is a multiple of the chain size
            let pos = self.counters[h].fetch_add(1, Ordering::Relaxed) as usize & (HASH_CHAIN_SIZE - 1);
            self.entries[h * HASH_CHAIN_SIZE + pos].store(entry, Ordering::Relaxed);
        }
        #[cfg(not(feature = "chained-hash"))]
        self.entries[h].store(entry, Ordering::Relaxed);
    }

    /// Snapshot of the candidates in bucket `hval`, in chain order.
    #[inline]
    pub(crate) fn bucket(&self, hval: u32) -> [HashEntry; HASH_CHAIN_SIZE] {
        let base = (hval & HASH_MASK) as usize * HASH_CHAIN_SIZE;
        let mut out = [HashEntry::default(); HASH_CHAIN_SIZE];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = HashEntry::unpack(self.entries[base + i].load(Ordering::Relaxed));
        }
        out
    }
}
