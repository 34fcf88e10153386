// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The free-block bitmap and its allocation cache.
//!
//! One block of bits covers the whole region (bit `i` is block
//! `sb.lba + i`; set means used).  To avoid a full bitmap scan
//! per allocation, up to 64 known-free block numbers are kept in
//! a small last-in-first-out cache, refilled by one scan when it
//! runs dry.  Freeing clears the bit and leaves the cache alone;
//! it repopulates on the next refill.

use super::{BITMAP_BITS, BLOCK_SIZE, Eynfs, RESERVED_BLOCKS, Superblock};
use crate::blockdev::BlockDevice;
use crate::result::{Error, Result};
use bit_field::BitField;

/// Capacity of the free-block cache.
pub const FREE_CACHE_SIZE: usize = 64;

pub struct FreeCache {
    blocks: [u32; FREE_CACHE_SIZE],
    count: usize,
    valid: bool,
}

impl FreeCache {
    pub fn new() -> FreeCache {
        FreeCache { blocks: [0; FREE_CACHE_SIZE], count: 0, valid: false }
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
        self.count = 0;
    }

    fn pop(&mut self) -> Option<u32> {
        if !self.valid || self.count == 0 {
            return None;
        }
        self.count -= 1;
        Some(self.blocks[self.count])
    }
}

impl Default for FreeCache {
    fn default() -> Self {
        Self::new()
    }
}

fn bit_of(bitmap: &[u8; BLOCK_SIZE], index: u32) -> bool {
    bitmap[index as usize / 8].get_bit(index as usize % 8)
}

fn set_bit_of(bitmap: &mut [u8; BLOCK_SIZE], index: u32, used: bool) {
    bitmap[index as usize / 8].set_bit(index as usize % 8, used);
}

impl Eynfs {
    fn read_bitmap(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        bitmap: &mut [u8; BLOCK_SIZE],
    ) -> Result<()> {
        self.read_block(dev, sb.free_block_map, bitmap)
    }

    fn write_bitmap(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        bitmap: &[u8; BLOCK_SIZE],
    ) -> Result<()> {
        self.write_block(dev, sb.free_block_map, bitmap)
    }

    /// Refills the free cache with the first free bits of the
    /// bitmap.
    fn refill_free_cache(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
    ) -> Result<()> {
        let mut bitmap = [0u8; BLOCK_SIZE];
        self.read_bitmap(dev, sb, &mut bitmap)?;
        self.free.count = 0;
        let limit = sb.total_blocks.min(BITMAP_BITS);
        for i in RESERVED_BLOCKS..limit {
            if self.free.count == FREE_CACHE_SIZE {
                break;
            }
            if !bit_of(&bitmap, i) {
                self.free.blocks[self.free.count] = sb.lba + i;
                self.free.count += 1;
            }
        }
        self.free.valid = self.free.count > 0;
        Ok(())
    }

    /// Allocates one block: marks its bit used and returns its
    /// absolute block number.
    pub fn alloc_block(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
    ) -> Result<u32> {
        if !self.free.valid || self.free.count == 0 {
            self.refill_free_cache(dev, sb)?;
        }
        let Some(block) = self.free.pop() else {
            return Err(Error::NoSpace);
        };
        let index = block - sb.lba;
        let mut bitmap = [0u8; BLOCK_SIZE];
        self.read_bitmap(dev, sb, &mut bitmap)?;
        set_bit_of(&mut bitmap, index, true);
        self.write_bitmap(dev, sb, &bitmap)?;
        Ok(block)
    }

    /// Frees one block.  The reserved head blocks can never be
    /// freed.
    pub fn free_block(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        block: u32,
    ) -> Result<()> {
        let Some(index) = block.checked_sub(sb.lba) else {
            return Err(Error::FsBlockRange);
        };
        if index < RESERVED_BLOCKS
            || index >= sb.total_blocks
            || index >= BITMAP_BITS
        {
            return Err(Error::FsBlockRange);
        }
        let mut bitmap = [0u8; BLOCK_SIZE];
        self.read_bitmap(dev, sb, &mut bitmap)?;
        set_bit_of(&mut bitmap, index, false);
        self.write_bitmap(dev, sb, &bitmap)
    }

    /// True if the block's bitmap bit is set.  Diagnostic use.
    pub fn block_used(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        block: u32,
    ) -> Result<bool> {
        let Some(index) = block.checked_sub(sb.lba) else {
            return Err(Error::FsBlockRange);
        };
        if index >= sb.total_blocks || index >= BITMAP_BITS {
            return Err(Error::FsBlockRange);
        }
        let mut bitmap = [0u8; BLOCK_SIZE];
        self.read_bitmap(dev, sb, &mut bitmap)?;
        Ok(bit_of(&bitmap, index))
    }

    /// Number of used bits beyond the reserved head blocks.
    /// Diagnostic use.
    pub fn used_block_count(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
    ) -> Result<u32> {
        let mut bitmap = [0u8; BLOCK_SIZE];
        self.read_bitmap(dev, sb, &mut bitmap)?;
        let limit = sb.total_blocks.min(BITMAP_BITS);
        let mut used = 0;
        for i in RESERVED_BLOCKS..limit {
            if bit_of(&bitmap, i) {
                used += 1;
            }
        }
        Ok(used)
    }
}
