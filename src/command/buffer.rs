//! Owned command buffers and the pool that accounts for them.
//!
//! A [`CmdBuffer`] is move-only: whoever holds it last releases it, and
//! the release happens in `Drop`, so every exit path of a handler frees
//! exactly once.  The [`BufferPool`] models the device heap with a byte
//! budget and keeps live/released counters that tests use to prove the
//! single-release rule.

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    pub requested: usize,
    pub available: usize,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot allocate {} bytes ({} available)",
            self.requested, self.available
        )
    }
}

// ── Pool ──────────────────────────────────────────────────────

#[derive(Debug)]
struct PoolInner {
    budget: usize,
    live_bytes: AtomicUsize,
    live_buffers: AtomicUsize,
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl PoolInner {
    fn release(&self, bytes: usize) {
        self.live_bytes.fetch_sub(bytes, Ordering::AcqRel);
        self.live_buffers.fetch_sub(1, Ordering::AcqRel);
        self.released.fetch_add(1, Ordering::AcqRel);
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub live_buffers: usize,
    pub live_bytes: usize,
    pub total_allocated: usize,
    pub total_released: usize,
}

/// Shared, cloneable handle on the command-buffer budget.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                budget: budget_bytes,
                live_bytes: AtomicUsize::new(0),
                live_buffers: AtomicUsize::new(0),
                allocated: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            }),
        }
    }

    /// Allocate a zero-filled buffer of `len` bytes.
    pub fn alloc(&self, len: usize) -> Result<CmdBuffer, AllocError> {
        self.reserve(len)?;
        Ok(CmdBuffer {
            bytes: vec![0u8; len],
            reserved: len,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Allocate a buffer holding a copy of `data`.
    pub fn alloc_from(&self, data: &[u8]) -> Result<CmdBuffer, AllocError> {
        self.reserve(data.len())?;
        Ok(CmdBuffer {
            bytes: data.to_vec(),
            reserved: data.len(),
            pool: Arc::clone(&self.inner),
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live_buffers: self.inner.live_buffers.load(Ordering::Acquire),
            live_bytes: self.inner.live_bytes.load(Ordering::Acquire),
            total_allocated: self.inner.allocated.load(Ordering::Acquire),
            total_released: self.inner.released.load(Ordering::Acquire),
        }
    }

    pub fn budget(&self) -> usize {
        self.inner.budget
    }

    fn reserve(&self, len: usize) -> Result<(), AllocError> {
        let budget = self.inner.budget;
        self.inner
            .live_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                live.checked_add(len).filter(|&total| total <= budget)
            })
            .map_err(|live| AllocError {
                requested: len,
                available: budget.saturating_sub(live),
            })?;
        self.inner.live_buffers.fetch_add(1, Ordering::AcqRel);
        self.inner.allocated.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

// ── Buffer ────────────────────────────────────────────────────

/// Heap buffer with exactly one owner.  Not `Clone`; use
/// [`duplicate`](Self::duplicate) for an independently owned copy.
pub struct CmdBuffer {
    bytes: Vec<u8>,
    /// Bytes charged against the pool; fixed at allocation.
    reserved: usize,
    pool: Arc<PoolInner>,
}

impl CmdBuffer {
    /// Fresh copy charged against the same pool.
    pub fn duplicate(&self) -> Result<CmdBuffer, AllocError> {
        BufferPool {
            inner: Arc::clone(&self.pool),
        }
        .alloc_from(&self.bytes)
    }

    /// Shorten the visible contents.  The reservation is unchanged.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Deref for CmdBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for CmdBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for CmdBuffer {
    fn drop(&mut self) {
        self.pool.release(self.reserved);
    }
}

impl fmt::Debug for CmdBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CmdBuffer({} bytes: {:02x?})", self.bytes.len(), self.bytes)
    }
}

impl PartialEq<[u8]> for CmdBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}
