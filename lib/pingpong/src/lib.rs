// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-slot handoff buffer for interrupt-to-task transfer.
//!
//! A `SlotStorage<S>` is a pair of equal `S`-byte buffers passed back and
//! forth between one producer and one consumer that do not share a
//! byte-granular cursor: the producer fills a whole slot and publishes it,
//! the consumer drains a whole slot and frees it. Each slot is
//! independently in one of four states:
//!
//! ```text
//!     free -> writing -> occupied -> reading -> free
//! ```
//!
//! The producer and consumer may each hold one slot at the same time, so a
//! fill and a drain can overlap. A `last_finished` tiebreaker records which
//! slot was published most recently; when both slots are occupied the
//! consumer takes the _older_ one first, preserving publication order.
//!
//! # Overwrite-oldest
//!
//! When the producer needs a slot and both are occupied, it reclaims the
//! older one and its contents are lost. This is deliberate: the intended
//! use is telemetry-flavored traffic where the freshest data matters most.
//! Lost publications are visible in [`SlotWriter::overwrites`], and a
//! consumer that keeps up never loses anything.
//!
//! # Publication and claiming
//!
//! A slot's state byte is the publication point: it is stored with Release
//! and loaded with Acquire, so slot contents written before `complete` are
//! visible to the peer that observes the new state. State transitions that
//! *claim* a slot (free/occupied -> writing, occupied -> reading) use a
//! compare-exchange, so if the peer got there first the acquire simply
//! reports nothing available instead of both sides holding the same slot.

#![cfg_attr(not(test), no_std)]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU8, Ordering};

const FREE: u8 = 0;
const WRITING: u8 = 1;
const OCCUPIED: u8 = 2;
const READING: u8 = 3;

/// Shared storage for one two-slot buffer: the two half-buffers plus their
/// state bytes. Designed to live in a `static` reachable from both an ISR
/// and a task.
pub struct SlotStorage<const S: usize> {
    slots: [UnsafeCell<[u8; S]>; 2],
    state: [AtomicU8; 2],
    /// Index of the slot most recently published. Written by the producer
    /// only, before the Release store that publishes the slot.
    last_finished: AtomicU8,
}

// Safety: slot contents are only reachable through a claimed slot, and the
// compare-exchange claims guarantee a slot has at most one holder; the
// state bytes themselves are atomics.
unsafe impl<const S: usize> Sync for SlotStorage<S> {}

impl<const S: usize> SlotStorage<S> {
    /// Creates storage with both slots free and zeroed.
    pub const fn new() -> Self {
        assert!(S >= 1, "slots need at least one byte");
        Self {
            slots: [UnsafeCell::new([0; S]), UnsafeCell::new([0; S])],
            state: [AtomicU8::new(FREE), AtomicU8::new(FREE)],
            last_finished: AtomicU8::new(0),
        }
    }

    /// Size of each slot in bytes.
    pub const fn slot_size(&self) -> usize {
        S
    }

    /// Zeroes both slots and returns them to `free`. Requires exclusive
    /// access, so it cannot race the endpoint handles.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot.get_mut() = [0; S];
        }
        for state in &mut self.state {
            *state.get_mut() = FREE;
        }
        *self.last_finished.get_mut() = 0;
    }

    /// Splits the storage into its producer and consumer handles. The
    /// exclusive borrow enforces that only one such pair exists at a time.
    pub fn split(&mut self) -> (SlotWriter<'_, S>, SlotReader<'_, S>) {
        self.clear();
        let shared = &*self;
        (
            SlotWriter {
                shared,
                writing: None,
                overwrites: 0,
            },
            SlotReader {
                shared,
                reading: None,
            },
        )
    }

    /// Maps slot `idx` as a mutable slice.
    ///
    /// Safety: the caller must hold the claim on slot `idx` (it set the
    /// state byte to `WRITING` or `READING` via compare-exchange and has
    /// not yet released it).
    #[allow(clippy::mut_from_ref)]
    unsafe fn slot_mut(&self, idx: usize) -> &mut [u8] {
        core::slice::from_raw_parts_mut(self.slots[idx].get() as *mut u8, S)
    }
}

impl<const S: usize> Default for SlotStorage<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// The producer endpoint: fills slots and publishes them.
pub struct SlotWriter<'a, const S: usize> {
    shared: &'a SlotStorage<S>,
    /// Slot currently claimed for writing, if any.
    writing: Option<usize>,
    overwrites: u32,
}

impl<const S: usize> SlotWriter<'_, S> {
    /// Claims a slot for writing and returns it.
    ///
    /// Slot choice, in order of preference: a free slot (A before B); when
    /// both are occupied, the one that was *not* published last, so the
    /// consumer still gets the newest data (the older publication is lost
    /// and counted); when one slot is being read, the other one if it is
    /// occupied. Returns `None` when this writer already holds a slot or no
    /// slot is claimable.
    ///
    /// The returned slice stays claimed after it is dropped; publish it
    /// with [`Self::complete`].
    pub fn acquire(&mut self) -> Option<&mut [u8]> {
        if self.writing.is_some() {
            return None;
        }
        let a = self.shared.state[0].load(Ordering::Acquire);
        let b = self.shared.state[1].load(Ordering::Acquire);
        let last = self.shared.last_finished.load(Ordering::Relaxed) as usize;

        let (idx, current) = if a == FREE {
            (0, FREE)
        } else if b == FREE {
            (1, FREE)
        } else if a == OCCUPIED && b == OCCUPIED {
            (1 - last, OCCUPIED)
        } else if a == OCCUPIED && b == READING {
            (0, OCCUPIED)
        } else if b == OCCUPIED && a == READING {
            (1, OCCUPIED)
        } else {
            return None;
        };

        // Claim the slot. If the consumer snatched it between our load and
        // here, report nothing available rather than sharing the slot.
        if self.shared.state[idx]
            .compare_exchange(
                current,
                WRITING,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return None;
        }
        if current == OCCUPIED {
            self.overwrites = self.overwrites.wrapping_add(1);
        }
        self.writing = Some(idx);
        // Safety: the compare-exchange above made us the sole holder.
        Some(unsafe { self.shared.slot_mut(idx) })
    }

    /// Publishes the slot claimed by the last [`Self::acquire`], making it
    /// the most recently finished slot. No-op if nothing is claimed.
    pub fn complete(&mut self) {
        if let Some(idx) = self.writing.take() {
            self.shared
                .last_finished
                .store(idx as u8, Ordering::Relaxed);
            // Release: slot contents and the tiebreaker update above become
            // visible to a reader that observes OCCUPIED.
            self.shared.state[idx].store(OCCUPIED, Ordering::Release);
        }
    }

    /// Number of occupied slots that were reclaimed unread because the
    /// consumer fell behind.
    pub fn overwrites(&self) -> u32 {
        self.overwrites
    }
}

/// The consumer endpoint: drains published slots in publication order.
pub struct SlotReader<'a, const S: usize> {
    shared: &'a SlotStorage<S>,
    /// Slot currently claimed for reading, if any.
    reading: Option<usize>,
}

impl<const S: usize> SlotReader<'_, S> {
    /// Claims the oldest published slot for reading and returns it.
    ///
    /// When both slots are occupied the one *not* published last is taken,
    /// so publications are observed in order. Returns `None` when this
    /// reader already holds a slot or nothing is published.
    ///
    /// The returned slice stays claimed after it is dropped; free it with
    /// [`Self::complete`].
    pub fn acquire(&mut self) -> Option<&[u8]> {
        if self.reading.is_some() {
            return None;
        }
        let a = self.shared.state[0].load(Ordering::Acquire);
        let b = self.shared.state[1].load(Ordering::Acquire);
        let last = self.shared.last_finished.load(Ordering::Relaxed) as usize;

        let idx = if a == OCCUPIED && b == OCCUPIED {
            1 - last
        } else if a == OCCUPIED {
            0
        } else if b == OCCUPIED {
            1
        } else {
            return None;
        };

        // Claim the slot; lose the race gracefully if the producer is
        // reclaiming it for overwrite at this very moment.
        if self.shared.state[idx]
            .compare_exchange(
                OCCUPIED,
                READING,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return None;
        }
        self.reading = Some(idx);
        // Safety: the compare-exchange above made us the sole holder.
        Some(unsafe { &*self.shared.slot_mut(idx) })
    }

    /// Frees the slot claimed by the last [`Self::acquire`]. No-op if
    /// nothing is claimed.
    pub fn complete(&mut self) {
        if let Some(idx) = self.reading.take() {
            // Release: our reads of the slot happen-before the producer can
            // observe it as free and start overwriting.
            self.shared.state[idx].store(FREE, Ordering::Release);
        }
    }
}
