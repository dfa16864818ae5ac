//! # Chunk Allocator
//!
//! Hands out aligned byte ranges inside one fixed-capacity arena. Freed
//! ranges go to an insertion-ordered free list and are reused first-fit
//! before the arena's tail grows. Adjacent free ranges are not coalesced.
//!
//! The allocator only does bookkeeping; it never touches GPU memory.

use std::collections::BTreeMap;

/// One live or freed range inside an arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemChunk {
    /// Byte offset from the start of the arena
    pub offset: u64,
    /// Size in bytes (already rounded to `alignment`)
    pub size: u64,
    /// Alignment the chunk was allocated with
    pub alignment: u64,
}

impl MemChunk {
    /// One past the last byte of the chunk
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Whether two chunks share at least one byte
    pub fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Round `value` up to the next multiple of `alignment` (a power of two)
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Interval allocator over a fixed-capacity arena
#[derive(Debug, Clone)]
pub struct ChunkAllocator {
    capacity: u64,
    alignment: u64,
    /// Live chunks keyed by offset, so the tail is the last entry
    allocated: BTreeMap<u64, MemChunk>,
    /// Freed chunks in release order; always below the tail
    free: Vec<MemChunk>,
    allocated_size: u64,
}

impl ChunkAllocator {
    /// Create an allocator for `capacity` bytes.
    ///
    /// # Panics
    /// If `alignment` is not a power of two.
    pub fn new(capacity: u64, alignment: u64) -> Self {
        assert!(
            alignment.is_power_of_two(),
            "chunk alignment must be a power of two, got {alignment}"
        );
        Self {
            capacity,
            alignment,
            allocated: BTreeMap::new(),
            free: Vec::new(),
            allocated_size: 0,
        }
    }

    /// Arena size in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Alignment granularity in bytes
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Sum of the sizes of all live chunks
    pub fn allocated_size(&self) -> u64 {
        self.allocated_size
    }

    /// Whether no chunk is live
    pub fn is_empty(&self) -> bool {
        self.allocated.is_empty()
    }

    /// Live chunks in offset order
    pub fn allocated_chunks(&self) -> impl Iterator<Item = &MemChunk> {
        self.allocated.values()
    }

    /// Free-list chunks in release order
    pub fn free_chunks(&self) -> &[MemChunk] {
        &self.free
    }

    /// Round a request up to this allocator's granularity
    pub fn aligned_size(&self, size: u64) -> u64 {
        align_up(size, self.alignment)
    }

    /// Capacity check: `size < capacity && capacity - size >= allocated`.
    ///
    /// This only compares byte totals. With a fragmented free list it can
    /// report room that no contiguous range provides; see [`Self::can_allocate`].
    pub fn has_available(&self, size: u64) -> bool {
        size < self.capacity && self.capacity - size >= self.allocated_size
    }

    /// Whether `allocate(size)` would succeed: the capacity check holds and
    /// either a free chunk or the tail offers a contiguous range.
    pub fn can_allocate(&self, size: u64) -> bool {
        let size = self.aligned_size(size);
        size > 0
            && self.has_available(size)
            && (self.free.iter().any(|chunk| chunk.size >= size) || self.tail() + size <= self.capacity)
    }

    /// Allocate `size` bytes and return the chunk's offset.
    ///
    /// Free chunks are tried first-fit in release order; a larger chunk is
    /// split and its remainder stays on the free list. Otherwise the range
    /// right after the highest live chunk is used.
    ///
    /// # Panics
    /// If `size` is zero, or no contiguous range of `size` bytes exists.
    /// Callers check [`Self::can_allocate`] first.
    pub fn allocate(&mut self, size: u64) -> u64 {
        assert!(size > 0, "zero-sized chunk requested");
        let size = self.aligned_size(size);
        assert!(
            self.has_available(size),
            "arena exhausted: {size} bytes requested, {} of {} in use",
            self.allocated_size,
            self.capacity
        );

        let offset = match self.free.iter().position(|chunk| chunk.size >= size) {
            Some(index) if self.free[index].size == size => self.free.remove(index).offset,
            Some(index) => {
                let chunk = &mut self.free[index];
                let offset = chunk.offset;
                chunk.offset += size;
                chunk.size -= size;
                offset
            }
            None => {
                let offset = self.tail();
                assert!(
                    offset + size <= self.capacity,
                    "no contiguous range of {size} bytes: tail at {offset}, capacity {}, {} free chunks",
                    self.capacity,
                    self.free.len()
                );
                offset
            }
        };

        self.allocated.insert(
            offset,
            MemChunk {
                offset,
                size,
                alignment: self.alignment,
            },
        );
        self.allocated_size += size;
        log::trace!("allocated {size} bytes at {offset} ({}/{})", self.allocated_size, self.capacity);
        offset
    }

    /// Release the chunk starting at `offset`.
    ///
    /// # Panics
    /// If `offset` is outside the arena or no live chunk starts there.
    pub fn deallocate(&mut self, offset: u64) -> MemChunk {
        assert!(
            offset < self.capacity,
            "offset {offset} outside arena of {} bytes",
            self.capacity
        );
        let chunk = self
            .allocated
            .remove(&offset)
            .unwrap_or_else(|| panic!("no live chunk at offset {offset}"));
        self.allocated_size -= chunk.size;
        self.free.push(chunk);

        // Anything at or past the new tail is reclaimed by tail growth;
        // leaving it listed would let a later tail allocation overlap it.
        let tail = self.tail();
        self.free.retain(|free| free.offset < tail);

        log::trace!("released {} bytes at {offset}", chunk.size);
        chunk
    }

    /// End of the highest live chunk, or 0
    fn tail(&self) -> u64 {
        self.allocated.values().next_back().map_or(0, MemChunk::end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiny xorshift for a reproducible sequence
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }
    }

    fn assert_consistent(allocator: &ChunkAllocator) {
        let live: Vec<MemChunk> = allocator.allocated_chunks().copied().collect();
        for (i, a) in live.iter().enumerate() {
            assert!(a.end() <= allocator.capacity());
            for b in &live[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
            for free in allocator.free_chunks() {
                assert!(!a.overlaps(free), "live {a:?} overlaps free {free:?}");
            }
        }
        let total: u64 = live.iter().map(|chunk| chunk.size).sum();
        assert_eq!(total, allocator.allocated_size());
    }

    #[test]
    fn test_sizes_are_rounded_to_alignment() {
        let mut allocator = ChunkAllocator::new(1024, 16);
        let a = allocator.allocate(5);
        let b = allocator.allocate(17);

        assert_eq!(a, 0);
        assert_eq!(b, 16);
        assert_eq!(allocator.allocated_size(), 48);
    }

    #[test]
    fn test_has_available_is_strict_on_capacity() {
        let allocator = ChunkAllocator::new(256, 16);
        assert!(allocator.has_available(240));
        assert!(!allocator.has_available(256));
        assert!(!allocator.has_available(300));
    }

    #[test]
    fn test_round_trip_restores_availability() {
        let mut allocator = ChunkAllocator::new(1024, 16);
        allocator.allocate(100);
        let probes = [16, 500, 896, 900, 1008];
        let before: Vec<bool> = probes.iter().map(|&size| allocator.has_available(size)).collect();

        let offset = allocator.allocate(300);
        allocator.deallocate(offset);

        let after: Vec<bool> = probes.iter().map(|&size| allocator.has_available(size)).collect();
        assert_eq!(before, after);
        assert_eq!(allocator.allocated_size(), 112);
    }

    #[test]
    fn test_freed_chunk_is_reused_before_tail() {
        let mut allocator = ChunkAllocator::new(4096, 16);
        let _a = allocator.allocate(256);
        let b = allocator.allocate(512);
        let _c = allocator.allocate(128);

        allocator.deallocate(b);
        let reused = allocator.allocate(300);

        assert_eq!(reused, b);
        // Remainder of the split stays on the free list past the new chunk.
        assert_eq!(
            allocator.free_chunks(),
            &[MemChunk { offset: b + 304, size: 208, alignment: 16 }]
        );
    }

    #[test]
    fn test_exact_fit_consumes_free_chunk() {
        let mut allocator = ChunkAllocator::new(4096, 16);
        let a = allocator.allocate(64);
        let _b = allocator.allocate(64);
        allocator.deallocate(a);

        assert_eq!(allocator.allocate(64), a);
        assert!(allocator.free_chunks().is_empty());
    }

    #[test]
    fn test_releasing_tail_chunk_shrinks_tail() {
        let mut allocator = ChunkAllocator::new(1024, 16);
        let a = allocator.allocate(64);
        let b = allocator.allocate(64);
        let c = allocator.allocate(64);

        allocator.deallocate(b);
        allocator.deallocate(c);
        assert!(allocator.free_chunks().is_empty());

        // The next big request starts right after `a`, overlapping nothing.
        assert_eq!(allocator.allocate(512), a + 64);
        assert_consistent(&allocator);
    }

    #[test]
    fn test_can_allocate_sees_fragmentation() {
        let mut allocator = ChunkAllocator::new(256, 16);
        let offsets: Vec<u64> = (0..4).map(|_| allocator.allocate(48)).collect();
        allocator.deallocate(offsets[0]);
        allocator.deallocate(offsets[2]);

        // 96 bytes are in use and 96 are free, but in two separate 48-byte holes
        // with only 64 bytes of tail room.
        assert!(allocator.has_available(96));
        assert!(allocator.can_allocate(64));
        assert!(!allocator.can_allocate(80));
    }

    #[test]
    #[should_panic(expected = "arena exhausted")]
    fn test_allocate_past_capacity_panics() {
        let mut allocator = ChunkAllocator::new(128, 16);
        allocator.allocate(112);
        allocator.allocate(32);
    }

    #[test]
    #[should_panic(expected = "no live chunk")]
    fn test_double_free_panics() {
        let mut allocator = ChunkAllocator::new(128, 16);
        let offset = allocator.allocate(32);
        allocator.deallocate(offset);
        allocator.deallocate(offset);
    }

    #[test]
    fn test_random_sequences_never_overlap() {
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        let mut allocator = ChunkAllocator::new(64 * 1024, 64);
        let mut live = Vec::new();

        for _ in 0..2000 {
            let release = !live.is_empty() && rng.next() % 3 == 0;
            if release {
                let index = (rng.next() % live.len() as u64) as usize;
                allocator.deallocate(live.swap_remove(index));
            } else {
                let size = 1 + rng.next() % 2048;
                if allocator.can_allocate(size) {
                    live.push(allocator.allocate(size));
                }
            }
            assert_consistent(&allocator);
        }
    }
}
