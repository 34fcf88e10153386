// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File data chains.  Reading walks the chain through the block
//! cache, skipping whole blocks to the requested offset.
//! Writing always produces a fresh chain: the new blocks are
//! reserved and written first, the old chain is freed after, and
//! the directory entry is updated last, so a failed allocation
//! rolls back without touching the file.

use super::{
    BLOCK_PAYLOAD, BLOCK_SIZE, DIR_ENTRIES_MAX, DirEntry, Eynfs, Superblock,
    rd32, wr32,
};
use crate::blockdev::BlockDevice;
use crate::result::{Error, Result};
use alloc::vec::Vec;

impl Eynfs {
    /// Reads from a file's chain starting at `offset`, up to
    /// `buf.len()` bytes.  Returns the byte count, zero when the
    /// offset is at or past the end.  A chain that ends before
    /// the entry's recorded size is a structural error.
    pub fn read_file(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        entry: &DirEntry,
        buf: &mut [u8],
        offset: u32,
    ) -> Result<usize> {
        if !entry.is_file() {
            return Err(Error::FsIsDir);
        }
        if offset >= entry.size {
            return Ok(0);
        }
        let want = buf.len().min((entry.size - offset) as usize);
        let mut block_buf = [0u8; BLOCK_SIZE];
        let mut block = entry.first_block;
        let mut skip = offset as usize;
        let mut steps = 0u32;

        // Whole blocks before the offset.
        while block != 0 && skip >= BLOCK_PAYLOAD {
            if !sb.contains(block) {
                return Err(Error::FsBlockRange);
            }
            if steps >= sb.total_blocks {
                return Err(Error::FsChainLoop);
            }
            self.read_block(dev, block, &mut block_buf)?;
            block = rd32(&block_buf, 0);
            skip -= BLOCK_PAYLOAD;
            steps += 1;
        }

        let mut done = 0;
        while done < want {
            if block == 0 {
                return Err(Error::FsTruncated);
            }
            if !sb.contains(block) {
                return Err(Error::FsBlockRange);
            }
            if steps >= sb.total_blocks {
                return Err(Error::FsChainLoop);
            }
            self.read_block(dev, block, &mut block_buf)?;
            let next = rd32(&block_buf, 0);
            let chunk = (BLOCK_PAYLOAD - skip).min(want - done);
            buf[done..done + chunk]
                .copy_from_slice(&block_buf[4 + skip..4 + skip + chunk]);
            done += chunk;
            skip = 0;
            block = next;
            steps += 1;
        }
        Ok(done)
    }

    /// Replaces a file's contents.  The new chain is fully
    /// reserved and written before the old one is freed; the
    /// entry and its directory slot are updated afterwards.
    pub fn write_file(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        entry: &mut DirEntry,
        data: &[u8],
        parent_head: u32,
        entry_index: u32,
    ) -> Result<usize> {
        if !entry.is_file() {
            return Err(Error::FsIsDir);
        }

        // Reserve the whole new chain.
        let needed = data.len().div_ceil(BLOCK_PAYLOAD);
        let mut fresh: Vec<u32> = Vec::with_capacity(needed);
        for _ in 0..needed {
            match self.alloc_block(dev, sb) {
                Ok(block) => fresh.push(block),
                Err(e) => {
                    self.rollback(dev, sb, &fresh);
                    return Err(e);
                }
            }
        }

        // The parent table must be sound before anything is
        // destroyed.
        let count = self
            .count_dir_entries(dev, sb, parent_head)?
            .min(DIR_ENTRIES_MAX);
        let mut entries =
            self.read_dir_table(dev, sb, parent_head, count)?;
        if entry_index as usize >= entries.len() {
            self.rollback(dev, sb, &fresh);
            return Err(Error::FsBadIndex);
        }

        // Write the new chain.
        let mut buf = [0u8; BLOCK_SIZE];
        for (i, &block) in fresh.iter().enumerate() {
            let next = if i + 1 < fresh.len() { fresh[i + 1] } else { 0 };
            buf.fill(0);
            wr32(&mut buf, 0, next);
            let start = i * BLOCK_PAYLOAD;
            let end = data.len().min(start + BLOCK_PAYLOAD);
            buf[4..4 + end - start].copy_from_slice(&data[start..end]);
            if let Err(e) = self.write_block(dev, block, &buf) {
                self.rollback(dev, sb, &fresh);
                return Err(e);
            }
        }

        // Point of no return: drop the old chain as recorded on
        // disk, then commit the entry.
        let old_first = entries[entry_index as usize].first_block;
        if old_first != 0 {
            self.free_chain(dev, sb, old_first);
        }
        entry.first_block = fresh.first().copied().unwrap_or(0);
        entry.size = data.len() as u32;
        entries[entry_index as usize] = *entry;
        self.write_dir_table(dev, sb, parent_head, &entries)?;
        Ok(data.len())
    }

    fn rollback(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        fresh: &[u32],
    ) {
        for &block in fresh {
            let _ = self.free_block(dev, sb, block);
        }
    }
}
