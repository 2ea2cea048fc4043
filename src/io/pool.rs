//! Module `pool` implement the striped read-buffer pool.
//!
//! Readers borrow a scratch buffer for the span of one read plus
//! deserialize. The pool is bounded at `2 * num_cpus` buffers, each
//! behind its own lock, so buffer memory stays constant however many
//! tasks read concurrently.

use parking_lot::Mutex;

use std::sync::Arc;

use crate::Result;

/// Bounded pool of reusable read buffers.
pub struct BufferPool {
    stripes: Vec<Mutex<Vec<u8>>>,
}

impl BufferPool {
    /// Pool with the reference stripe count, `2 * num_cpus`.
    pub fn new() -> Arc<BufferPool> {
        BufferPool::with_stripes(2 * num_cpus::get())
    }

    pub fn with_stripes(n: usize) -> Arc<BufferPool> {
        let stripes = (0..usize::max(1, n)).map(|_| Mutex::new(vec![])).collect();
        Arc::new(BufferPool { stripes })
    }

    pub fn stripes(&self) -> usize {
        self.stripes.len()
    }

    /// Run `exec` with a pooled buffer. The stripe lock spans the whole
    /// closure, covering read and deserialize of a borrowed view.
    pub fn with_buffer<T, F>(&self, hint: u64, exec: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<T>,
    {
        let stripe = (hint as usize) % self.stripes.len();
        let mut buf = self.stripes[stripe].lock();
        buf.clear();
        exec(&mut buf)
    }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
