//! Module `arena` implement the transaction-scoped bump allocator.
//!
//! A write transaction stages byte payloads here, blocks of a fixed
//! size are filled in order and never reallocated. `reset` rewinds the
//! arena without returning blocks to the allocator, dropping the arena
//! frees everything.

/// Default block size, 1 MiB.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Handle into an [Arena], valid until the next `reset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArenaRef {
    blk: u32,
    off: u32,
    len: u32,
}

impl ArenaRef {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Bump allocator over a list of fixed-size blocks.
pub struct Arena {
    blocks: Vec<Vec<u8>>,
    block_size: usize,
}

impl Default for Arena {
    fn default() -> Arena {
        Arena::new(BLOCK_SIZE)
    }
}

impl Arena {
    pub fn new(block_size: usize) -> Arena {
        Arena {
            blocks: vec![Vec::with_capacity(block_size)],
            block_size,
        }
    }

    /// Copy `bytes` into the arena, return a handle to the copy.
    pub fn copy_in(&mut self, bytes: &[u8]) -> ArenaRef {
        let need = bytes.len();
        let fits = {
            let blk = self.blocks.last().unwrap();
            blk.capacity() - blk.len() >= need
        };
        if !fits {
            // oversized payloads get a dedicated block.
            let cap = usize::max(self.block_size, need);
            self.blocks.push(Vec::with_capacity(cap));
        }

        let blk = self.blocks.len() - 1;
        let block = self.blocks.last_mut().unwrap();
        let off = block.len();
        block.extend_from_slice(bytes);

        ArenaRef {
            blk: blk as u32,
            off: off as u32,
            len: need as u32,
        }
    }

    pub fn get(&self, aref: ArenaRef) -> &[u8] {
        let (off, len) = (aref.off as usize, aref.len as usize);
        &self.blocks[aref.blk as usize][off..off + len]
    }

    /// Rewind without freeing blocks.
    pub fn reset(&mut self) {
        self.blocks.truncate(1);
        self.blocks[0].clear();
    }

    /// Bytes currently staged.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes reserved across all blocks.
    pub fn footprint(&self) -> usize {
        self.blocks.iter().map(|b| b.capacity()).sum()
    }
}

#[cfg(test)]
#[path = "arena_test.rs"]
mod arena_test;
