//! Module `epoch` implement the revision tracker and the per-resource
//! write gate.
//!
//! Every open read transaction registers the revision it is pinned to
//! in a fixed array of slots. The minimum over the active slots is the
//! watermark below which page fragments are safe to evict. Writers are
//! serialized through a one-permit gate with a bounded wait.

use parking_lot::{Condvar, Mutex};

use std::{
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering::SeqCst},
        Arc,
    },
    time,
};

use crate::Result;

/// Default number of tracker slots, bounds concurrent readers.
pub const MAX_CONCURRENT_READERS: usize = 128;

// slot encoding: 0 = free, else revision + 1.
#[inline]
fn to_slot(revision: u32) -> u64 {
    u64::from(revision) + 1
}

/// Epoch based revision tracker.
pub struct EpochTracker {
    slots: Vec<AtomicU64>,
    last_committed: AtomicU32,
}

impl EpochTracker {
    pub fn new(n_slots: usize) -> Arc<EpochTracker> {
        let slots = (0..n_slots).map(|_| AtomicU64::new(0)).collect();
        Arc::new(EpochTracker {
            slots,
            last_committed: AtomicU32::new(0),
        })
    }

    /// Pin `revision` into a free slot. Fails with `TooManyReaders` when
    /// all slots are taken.
    pub fn register(self: &Arc<Self>, revision: u32) -> Result<Ticket> {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot
                .compare_exchange(0, to_slot(revision), SeqCst, SeqCst)
                .is_ok()
            {
                return Ok(Ticket {
                    tracker: Arc::clone(self),
                    idx,
                });
            }
        }
        err_at!(TooManyReaders, msg: "all {} slots active", self.slots.len())
    }

    /// Smallest revision still pinned by a reader; `last_committed`
    /// when no reader is active. A page fragment written for revision
    /// `r` is safe to evict iff `r < min_active_revision()`.
    pub fn min_active_revision(&self) -> u32 {
        let mut min: Option<u32> = None;
        for slot in self.slots.iter() {
            match slot.load(SeqCst) {
                0 => (),
                val => {
                    let rev = (val - 1) as u32;
                    min = Some(match min {
                        Some(m) if m < rev => m,
                        _ => rev,
                    });
                }
            }
        }
        min.unwrap_or_else(|| self.last_committed.load(SeqCst))
    }

    pub fn set_last_committed(&self, revision: u32) {
        self.last_committed.store(revision, SeqCst);
    }

    pub fn last_committed(&self) -> u32 {
        self.last_committed.load(SeqCst)
    }
}

/// Registration handle, clears its slot on drop.
pub struct Ticket {
    tracker: Arc<EpochTracker>,
    idx: usize,
}

impl Ticket {
    pub fn revision(&self) -> u32 {
        (self.tracker.slots[self.idx].load(SeqCst) - 1) as u32
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.tracker.slots[self.idx].store(0, SeqCst);
    }
}

/// Default bounded wait for the write permit.
pub const WRITE_PERMIT_TIMEOUT: time::Duration = time::Duration::from_secs(5);

/// One-permit gate serializing writers on a resource.
pub struct WriteGate {
    held: Mutex<bool>,
    cv: Condvar,
}

impl Default for WriteGate {
    fn default() -> WriteGate {
        WriteGate {
            held: Mutex::new(false),
            cv: Condvar::new(),
        }
    }
}

impl WriteGate {
    /// Acquire the single write permit, waiting up to `timeout`.
    pub fn acquire(self: &Arc<Self>, timeout: time::Duration) -> Result<WritePermit> {
        let mut held = self.held.lock();
        let deadline = time::Instant::now() + timeout;
        while *held {
            if self.cv.wait_until(&mut held, deadline).timed_out() {
                return err_at!(
                    WriteLockHeld, msg: "timed out after {:?}", timeout
                );
            }
        }
        *held = true;
        Ok(WritePermit {
            gate: Arc::clone(self),
        })
    }
}

/// Exclusive write permit, released on drop.
pub struct WritePermit {
    gate: Arc<WriteGate>,
}

impl Drop for WritePermit {
    fn drop(&mut self) {
        let mut held = self.gate.held.lock();
        *held = false;
        self.gate.cv.notify_one();
    }
}

#[cfg(test)]
#[path = "epoch_test.rs"]
mod epoch_test;
