//! Fixed-depth store of reusable frame buffers.
//!
//! The store has no synchronisation of its own: every method takes
//! `&self`/`&mut self` and is only ever called by the
//! [`Pipeline`](crate::pipeline::coordinator::Pipeline) while it holds
//! its lock.
//!
//! Buffers are reserved once, at full capacity, and never grow. The
//! reservation is not written to up front: a buffer's length is the
//! frame it currently holds, so pages are only touched when a frame is
//! written into them. Handing a buffer out moves the `Vec` out of its
//! slot (the slot keeps an empty placeholder) and handing it back moves
//! it in again, so the payload bytes are never copied between holders.

use std::mem;

use crate::error::FramecastError;

// ── SlotState ────────────────────────────────────────────────────

/// Lifecycle of a single slot.
///
/// ```text
/// Empty ──begin_write──► Writing ──finish_write──► Ready
///   ▲                       │                        │
///   └──────abandon_write────┘                    begin_read
///   ▲                                                │
///   └───────────finish_read──────── Reading ◄────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Free for the producer.
    Empty,
    /// Checked out by the producer, not yet published.
    Writing,
    /// Published, waiting for the consumer.
    Ready,
    /// Checked out by the consumer, not yet released.
    Reading,
}

impl SlotState {
    /// `Ready` and `Reading` slots hold a frame the producer must not
    /// overwrite.
    pub const fn is_filled(self) -> bool {
        matches!(self, SlotState::Ready | SlotState::Reading)
    }
}

// ── Slot ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct Slot {
    buffer: Vec<u8>,
    len: usize,
    sequence: u64,
    state: SlotState,
}

// ── SlotStore ────────────────────────────────────────────────────

/// Ordered ring of `depth` slots, each backed by a buffer with room
/// for `capacity` bytes.
#[derive(Debug)]
pub struct SlotStore {
    slots: Vec<Slot>,
    capacity: usize,
}

impl SlotStore {
    /// Reserve `depth` buffers of `capacity` bytes each.
    ///
    /// Fails with [`FramecastError::Allocation`] if any reservation is
    /// refused, and with [`FramecastError::Config`] for a zero depth.
    pub fn allocate(depth: usize, capacity: usize) -> Result<Self, FramecastError> {
        if depth == 0 {
            return Err(FramecastError::Config("buffer depth must be at least 1".into()));
        }

        let mut slots = Vec::with_capacity(depth);
        for index in 0..depth {
            let mut buffer = Vec::new();
            buffer
                .try_reserve_exact(capacity)
                .map_err(|_| FramecastError::Allocation {
                    slot: index,
                    bytes: capacity,
                })?;
            slots.push(Slot {
                buffer,
                len: 0,
                sequence: 0,
                state: SlotState::Empty,
            });
        }

        Ok(Self { slots, capacity })
    }

    /// Reserved size of every slot buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current state of slot `index`.
    pub fn state(&self, index: usize) -> SlotState {
        self.slots[index].state
    }

    /// Logical length recorded for slot `index` (0 when empty).
    pub fn frame_len(&self, index: usize) -> usize {
        self.slots[index].len
    }

    /// How many slots hold a frame (`Ready` or `Reading`).
    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state.is_filled()).count()
    }

    /// The index after `index`, wrapping at `depth`.
    pub fn next(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    // ── Transitions ──────────────────────────────────────────────

    /// `Empty → Writing`; moves the (empty) buffer out.
    pub fn begin_write(&mut self, index: usize) -> Vec<u8> {
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.state, SlotState::Empty, "slot {index} not empty");
        slot.state = SlotState::Writing;
        mem::take(&mut slot.buffer)
    }

    /// `Writing → Ready`; moves the buffer back in holding its frame.
    pub fn finish_write(&mut self, index: usize, buffer: Vec<u8>, sequence: u64) {
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.state, SlotState::Writing, "slot {index} not writing");
        debug_assert!(buffer.len() <= self.capacity);
        slot.len = buffer.len();
        slot.buffer = buffer;
        slot.sequence = sequence;
        slot.state = SlotState::Ready;
    }

    /// `Writing → Empty`; the producer gave up on this slot.
    pub fn abandon_write(&mut self, index: usize, mut buffer: Vec<u8>) {
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.state, SlotState::Writing, "slot {index} not writing");
        buffer.clear();
        slot.buffer = buffer;
        slot.len = 0;
        slot.state = SlotState::Empty;
    }

    /// `Ready → Reading`; returns the buffer (holding exactly the frame)
    /// and its sequence number.
    pub fn begin_read(&mut self, index: usize) -> (Vec<u8>, u64) {
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.state, SlotState::Ready, "slot {index} not ready");
        slot.state = SlotState::Reading;
        (mem::take(&mut slot.buffer), slot.sequence)
    }

    /// `Reading → Empty`; moves the buffer back in.
    pub fn finish_read(&mut self, index: usize, mut buffer: Vec<u8>) {
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.state, SlotState::Reading, "slot {index} not reading");
        buffer.clear();
        slot.buffer = buffer;
        slot.len = 0;
        slot.state = SlotState::Empty;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_reserves_without_filling() {
        let mut store = SlotStore::allocate(3, 64).unwrap();
        assert_eq!(store.capacity(), 64);
        assert_eq!(store.filled_count(), 0);
        for i in 0..3 {
            assert_eq!(store.state(i), SlotState::Empty);
            assert_eq!(store.frame_len(i), 0);
        }

        let buf = store.begin_write(0);
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 64);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = SlotStore::allocate(0, 64).unwrap_err();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[test]
    fn huge_capacity_fails_as_allocation() {
        let err = SlotStore::allocate(2, usize::MAX).unwrap_err();
        assert!(matches!(err, FramecastError::Allocation { slot: 0, .. }));
    }

    #[test]
    fn next_wraps() {
        let store = SlotStore::allocate(3, 8).unwrap();
        assert_eq!(store.next(0), 1);
        assert_eq!(store.next(2), 0);
    }

    #[test]
    fn write_then_read_cycle() {
        let mut store = SlotStore::allocate(2, 16).unwrap();

        let mut buf = store.begin_write(0);
        assert_eq!(store.state(0), SlotState::Writing);
        assert_eq!(store.filled_count(), 0);

        buf.extend_from_slice(b"abc");
        store.finish_write(0, buf, 7);
        assert_eq!(store.state(0), SlotState::Ready);
        assert_eq!(store.filled_count(), 1);
        assert_eq!(store.frame_len(0), 3);

        let (buf, seq) = store.begin_read(0);
        assert_eq!(buf, b"abc");
        assert_eq!(seq, 7);
        assert_eq!(store.state(0), SlotState::Reading);
        assert_eq!(store.filled_count(), 1);

        store.finish_read(0, buf);
        assert_eq!(store.state(0), SlotState::Empty);
        assert_eq!(store.filled_count(), 0);
        assert_eq!(store.frame_len(0), 0);
    }

    #[test]
    fn abandon_leaves_slot_empty() {
        let mut store = SlotStore::allocate(1, 4).unwrap();
        let mut buf = store.begin_write(0);
        buf.extend_from_slice(b"xy");
        store.abandon_write(0, buf);
        assert_eq!(store.state(0), SlotState::Empty);
        assert_eq!(store.frame_len(0), 0);

        // The buffer came back cleared, with its reservation intact.
        let buf = store.begin_write(0);
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 4);
    }
}
