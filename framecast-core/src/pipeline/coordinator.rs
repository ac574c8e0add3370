//! Pipeline coordinator: one lock, one condition variable, two cursors.
//!
//! The producer and the consumer never talk to each other directly.
//! Each one checks a slot out of the [`SlotStore`] through the
//! [`Pipeline`], works on its buffer **without** holding the lock, and
//! hands it back:
//!
//! ```text
//! producer: acquire_producer_slot ─► write bytes ─► publish(len)
//! consumer: acquire_consumer_slot ─► upload bytes ─► release
//! ```
//!
//! A checked-out buffer is owned by its handle ([`WriteSlot`] /
//! [`ReadSlot`]). `publish` and `release` take the handle by value, so
//! a handle cannot be finished twice. A [`ReadSlot`] can lend its frame
//! out as [`Bytes`] for the upload; the allocation is reclaimed into the
//! slot on release.
//!
//! Both wait conditions (space available, data available) share one
//! `Condvar`. Every state change calls `notify_all`, and every waiter
//! re-checks its own predicate together with the `running` flag.

use std::mem;
use std::ptr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::FramecastError;
use crate::pipeline::slot::{SlotState, SlotStore};

// ── PipelineState ────────────────────────────────────────────────

#[derive(Debug)]
struct PipelineState {
    running: bool,
    slots: SlotStore,
    producer_index: usize,
    consumer_index: usize,
    next_sequence: u64,
}

// ── Pipeline ─────────────────────────────────────────────────────

/// Shared context owned jointly by the producer and consumer loops.
///
/// Supports exactly one producer and one consumer; a second concurrent
/// producer (or consumer) would wait on a slot its sibling holds.
#[derive(Debug)]
pub struct Pipeline {
    state: Mutex<PipelineState>,
    cond: Condvar,
}

impl Pipeline {
    /// Allocate `depth` slots of `capacity` bytes. The pipeline starts
    /// in the running state with both cursors at slot 0.
    pub fn new(depth: usize, capacity: usize) -> Result<Self, FramecastError> {
        let slots = SlotStore::allocate(depth, capacity)?;
        Ok(Self {
            state: Mutex::new(PipelineState {
                running: true,
                slots,
                producer_index: 0,
                consumer_index: 0,
                next_sequence: 0,
            }),
            cond: Condvar::new(),
        })
    }

    /// Block until the slot under the producer cursor is empty.
    ///
    /// Returns `None` once shutdown has been requested; the caller must
    /// stop producing.
    pub fn acquire_producer_slot(&self) -> Option<WriteSlot<'_>> {
        let guard = self.lock();
        let mut state = self
            .cond
            .wait_while(guard, |s| {
                s.running && s.slots.state(s.producer_index) != SlotState::Empty
            })
            .unwrap_or_else(PoisonError::into_inner);

        if !state.running {
            return None;
        }

        let index = state.producer_index;
        let capacity = state.slots.capacity();
        let buffer = state.slots.begin_write(index);
        trace!(slot = index, "producer slot acquired");
        Some(WriteSlot {
            pipeline: self,
            index,
            capacity,
            buffer,
            finished: false,
        })
    }

    /// Mark the slot filled with `len` bytes, advance the producer
    /// cursor and wake waiters.
    ///
    /// `len` is clamped to the number of bytes written.
    pub fn publish(&self, mut slot: WriteSlot<'_>, len: usize) {
        debug_assert!(ptr::eq(slot.pipeline, self), "slot from another pipeline");
        let mut buffer = mem::take(&mut slot.buffer);
        slot.finished = true;
        buffer.truncate(len);
        let len = buffer.len();

        let mut state = self.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.slots.finish_write(slot.index, buffer, sequence);
        state.producer_index = state.slots.next(slot.index);
        drop(state);

        trace!(slot = slot.index, seq = sequence, bytes = len, "frame published");
        self.cond.notify_all();
    }

    /// Block until the slot under the consumer cursor holds a frame.
    ///
    /// Returns `None` once shutdown has been requested, even if frames
    /// remain queued.
    pub fn acquire_consumer_slot(&self) -> Option<ReadSlot<'_>> {
        let guard = self.lock();
        let mut state = self
            .cond
            .wait_while(guard, |s| {
                s.running && s.slots.state(s.consumer_index) != SlotState::Ready
            })
            .unwrap_or_else(PoisonError::into_inner);

        if !state.running {
            return None;
        }

        let index = state.consumer_index;
        let capacity = state.slots.capacity();
        let (buffer, sequence) = state.slots.begin_read(index);
        trace!(slot = index, seq = sequence, "consumer slot acquired");
        Some(ReadSlot {
            pipeline: self,
            index,
            capacity,
            buffer,
            shared: None,
            sequence,
            finished: false,
        })
    }

    /// Mark the slot empty, advance the consumer cursor and wake
    /// waiters. Call only after the frame bytes are no longer needed.
    pub fn release(&self, mut slot: ReadSlot<'_>) {
        debug_assert!(ptr::eq(slot.pipeline, self), "slot from another pipeline");
        slot.finished = true;
        let buffer = slot.reclaim();
        self.finish_read(slot.index, buffer);
    }

    /// Stop both loops. Returns `true` only for the call that actually
    /// flipped the flag.
    pub fn request_shutdown(&self) -> bool {
        let mut state = self.lock();
        if !state.running {
            return false;
        }
        state.running = false;
        drop(state);

        debug!("pipeline shutdown requested");
        self.cond.notify_all();
        true
    }

    /// Whether shutdown has not been requested yet.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Sleep for `timeout`, returning early if shutdown is requested.
    ///
    /// Returns `true` if the pipeline is still running afterwards.
    pub fn sleep_unless_stopped(&self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return self.is_running();
        }
        let guard = self.lock();
        let (state, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |s| s.running)
            .unwrap_or_else(PoisonError::into_inner);
        state.running
    }

    // ── Introspection ────────────────────────────────────────────

    /// Largest frame a slot can hold.
    pub fn slot_capacity(&self) -> usize {
        self.lock().slots.capacity()
    }

    /// Slots currently holding a frame (published or being uploaded).
    pub fn filled_count(&self) -> usize {
        self.lock().slots.filled_count()
    }

    /// `(producer_index, consumer_index)`.
    pub fn cursors(&self) -> (usize, usize) {
        let state = self.lock();
        (state.producer_index, state.consumer_index)
    }

    /// State of slot `index`.
    pub fn slot_state(&self, index: usize) -> SlotState {
        self.lock().slots.state(index)
    }

    // ── Internal ─────────────────────────────────────────────────

    /// The state is consistent at every unlock point, so a poisoned
    /// lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_read(&self, index: usize, buffer: Vec<u8>) {
        let mut state = self.lock();
        state.slots.finish_read(index, buffer);
        state.consumer_index = state.slots.next(index);
        drop(state);

        trace!(slot = index, "consumer slot released");
        self.cond.notify_all();
    }

    fn abandon_write(&self, index: usize, buffer: Vec<u8>) {
        self.lock().slots.abandon_write(index, buffer);
        debug!(slot = index, "producer slot abandoned");
        self.cond.notify_all();
    }
}

// ── WriteSlot ────────────────────────────────────────────────────

/// Exclusive write access to one slot buffer, obtained from
/// [`Pipeline::acquire_producer_slot`].
///
/// Dropping it without calling [`Pipeline::publish`] returns the
/// buffer, leaves the slot empty and keeps the producer cursor where it
/// was.
#[derive(Debug)]
pub struct WriteSlot<'a> {
    pipeline: &'a Pipeline,
    index: usize,
    capacity: usize,
    buffer: Vec<u8>,
    finished: bool,
}

impl WriteSlot<'_> {
    /// Ring index of this slot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bytes available for writing.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the buffer contents with `bytes`, returning the length to
    /// publish. Stays within the reservation made at startup.
    pub fn fill(&mut self, bytes: &[u8]) -> Result<usize, FramecastError> {
        if bytes.len() > self.capacity {
            return Err(FramecastError::FrameTooLarge {
                size: bytes.len(),
                max: self.capacity,
            });
        }
        self.buffer.clear();
        self.buffer.extend_from_slice(bytes);
        Ok(bytes.len())
    }
}

impl Drop for WriteSlot<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let buffer = mem::take(&mut self.buffer);
            self.pipeline.abandon_write(self.index, buffer);
        }
    }
}

// ── ReadSlot ─────────────────────────────────────────────────────

/// Read access to one published frame, obtained from
/// [`Pipeline::acquire_consumer_slot`].
///
/// Dropping it without calling [`Pipeline::release`] releases it.
#[derive(Debug)]
pub struct ReadSlot<'a> {
    pipeline: &'a Pipeline,
    index: usize,
    capacity: usize,
    /// The frame while it is held locally.
    buffer: Vec<u8>,
    /// The frame once lent out through [`to_bytes`](Self::to_bytes).
    shared: Option<Bytes>,
    sequence: u64,
    finished: bool,
}

impl ReadSlot<'_> {
    /// Ring index of this slot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Publish order of this frame, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Encoded frame length.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The encoded frame.
    pub fn bytes(&self) -> &[u8] {
        match &self.shared {
            Some(bytes) => bytes,
            None => &self.buffer,
        }
    }

    /// A reference-counted view of the frame backed by the slot's own
    /// allocation. Nothing is copied; the allocation returns to the
    /// slot on release.
    pub fn to_bytes(&mut self) -> Bytes {
        self.shared
            .get_or_insert_with(|| Bytes::from(mem::take(&mut self.buffer)))
            .clone()
    }

    /// Take the buffer back for the store. If a lent-out view is still
    /// alive elsewhere the frame is copied out instead and the
    /// reservation is restored.
    fn reclaim(&mut self) -> Vec<u8> {
        let Some(shared) = self.shared.take() else {
            return mem::take(&mut self.buffer);
        };
        if !shared.is_unique() {
            warn!(slot = self.index, "frame still referenced at release; reallocating slot buffer");
        }
        let mut buffer = Vec::from(shared);
        buffer.clear();
        buffer.reserve_exact(self.capacity);
        buffer
    }
}

impl Drop for ReadSlot<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let buffer = self.reclaim();
            self.pipeline.finish_read(self.index, buffer);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
