// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The block cache and the directory cache.
//!
//! The block cache is small and fixed: sixteen 512-byte slots.
//! Hits are served from memory and writes to cached blocks are
//! buffered (write-back); writes to uncached blocks go straight
//! through.  Eviction picks the valid slot with the smallest
//! block number, a cheap stand-in for recency that works because
//! access patterns here are spatial.
//!
//! The directory cache keeps up to eight fully concatenated
//! entry tables keyed by the directory's head block.  It is
//! invalidated wholesale by any mutating directory operation.

use super::{BLOCK_SIZE, DirEntry};
use crate::blockdev::BlockDevice;
use crate::result::Result;
use alloc::vec::Vec;
use bitstruct::bitstruct;

/// Number of block-cache slots.
pub const CACHE_SIZE: usize = 16;

/// Number of cached directory tables.
pub const DIR_CACHE_SIZE: usize = 8;

bitstruct! {
    /// Per-slot state bits.
    #[derive(Clone, Copy)]
    pub struct SlotState(u8) {
        valid: bool = 0;
        dirty: bool = 1;
    }
}

struct Slot {
    block: u32,
    state: SlotState,
    data: [u8; BLOCK_SIZE],
}

impl Slot {
    fn new() -> Slot {
        Slot { block: 0, state: SlotState(0), data: [0; BLOCK_SIZE] }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

pub struct BlockCache {
    slots: [Slot; CACHE_SIZE],
    hits: u32,
    misses: u32,
}

impl BlockCache {
    pub fn new() -> BlockCache {
        BlockCache {
            slots: core::array::from_fn(|_| Slot::new()),
            hits: 0,
            misses: 0,
        }
    }

    fn lookup(&self, block: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.state.valid() && s.block == block)
    }

    /// Victim selection: any invalid slot first, otherwise the
    /// valid slot with the smallest block number.
    fn victim(&self) -> usize {
        let mut victim = 0;
        let mut oldest = u32::MAX;
        for (i, slot) in self.slots.iter().enumerate() {
            if !slot.state.valid() {
                return i;
            }
            if slot.block < oldest {
                oldest = slot.block;
                victim = i;
            }
        }
        victim
    }

    pub fn read(
        &mut self,
        dev: &mut dyn BlockDevice,
        block: u32,
        buf: &mut [u8; BLOCK_SIZE],
    ) -> Result<()> {
        if let Some(i) = self.lookup(block) {
            buf.copy_from_slice(&self.slots[i].data);
            self.hits += 1;
            return Ok(());
        }
        dev.read_sector(block, buf)?;
        let i = self.victim();
        if self.slots[i].state.valid() && self.slots[i].state.dirty() {
            dev.write_sector(self.slots[i].block, &self.slots[i].data)?;
        }
        let slot = &mut self.slots[i];
        slot.block = block;
        slot.data.copy_from_slice(buf);
        slot.state = SlotState(0).with_valid(true);
        self.misses += 1;
        Ok(())
    }

    pub fn write(
        &mut self,
        dev: &mut dyn BlockDevice,
        block: u32,
        buf: &[u8; BLOCK_SIZE],
    ) -> Result<()> {
        if let Some(i) = self.lookup(block) {
            let slot = &mut self.slots[i];
            slot.data.copy_from_slice(buf);
            slot.state.set_dirty(true);
            return Ok(());
        }
        dev.write_sector(block, buf)
    }

    pub fn flush(&mut self, dev: &mut dyn BlockDevice) -> Result<()> {
        for slot in self.slots.iter_mut() {
            if slot.state.valid() && slot.state.dirty() {
                dev.write_sector(slot.block, &slot.data)?;
                slot.state.set_dirty(false);
            }
        }
        Ok(())
    }

    pub fn invalidate_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.state = SlotState(0);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits, misses: self.misses }
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }
}

struct DirSlot {
    head: u32,
    entries: Vec<DirEntry>,
}

pub struct DirCache {
    slots: [Option<DirSlot>; DIR_CACHE_SIZE],
}

impl DirCache {
    pub fn new() -> DirCache {
        DirCache { slots: core::array::from_fn(|_| None) }
    }

    pub fn find(&self, head: u32) -> Option<&[DirEntry]> {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.head == head)
            .map(|s| s.entries.as_slice())
    }

    pub fn insert(&mut self, head: u32, entries: Vec<DirEntry>) {
        let slot = Some(DirSlot { head, entries });
        if let Some(existing) =
            self.slots.iter_mut().find(|s| {
                s.as_ref().is_some_and(|s| s.head == head)
            })
        {
            *existing = slot;
            return;
        }
        if let Some(empty) = self.slots.iter_mut().find(|s| s.is_none()) {
            *empty = slot;
            return;
        }
        self.slots[0] = slot;
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}
