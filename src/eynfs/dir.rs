// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Directory chains: reading, searching, and the mutating
//! operations.  A directory is a chain of blocks, each holding a
//! next link and seven 64-byte entries.  Mutations rewrite the
//! table over the existing chain where possible, reserving any
//! overflow blocks up front so a failed reservation leaves the
//! directory untouched.  Every mutation drops the directory
//! cache before returning.

use super::{
    BLOCK_SIZE, DIR_ENTRIES_MAX, DIR_WALK_MAX, DirEntry, ENTRIES_PER_BLOCK,
    ENTRY_SIZE, Eynfs, Superblock, TYPE_DIR, TYPE_FILE, rd32, validate_name,
    wr32,
};
use crate::blockdev::BlockDevice;
use crate::result::{Error, Result};
use alloc::vec::Vec;

impl Eynfs {
    /// Reads a directory chain into a concatenated entry table,
    /// empty slots included, up to `max_entries`.
    pub fn read_dir_table(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        head: u32,
        max_entries: usize,
    ) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut block = head;
        let mut walked = 0;
        let mut buf = [0u8; BLOCK_SIZE];
        while block != 0 && entries.len() < max_entries {
            if !sb.contains(block) {
                return Err(Error::FsBlockRange);
            }
            if walked >= DIR_WALK_MAX {
                return Err(Error::FsChainLoop);
            }
            self.read_block(dev, block, &mut buf)?;
            let next = rd32(&buf, 0);
            for i in 0..ENTRIES_PER_BLOCK {
                if entries.len() == max_entries {
                    break;
                }
                let off = 4 + i * ENTRY_SIZE;
                entries.push(DirEntry::decode(&buf[off..off + ENTRY_SIZE]));
            }
            block = next;
            walked += 1;
        }
        Ok(entries)
    }

    /// Counts the entry capacity of a directory chain without
    /// loading it.  Bounded; overflow is reported as a warning
    /// and the count truncated.
    pub fn count_dir_entries(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        head: u32,
    ) -> Result<usize> {
        let mut total = 0;
        let mut block = head;
        let mut walked = 0;
        let mut buf = [0u8; BLOCK_SIZE];
        while block != 0 && walked < DIR_WALK_MAX {
            if !sb.contains(block) {
                return Err(Error::FsBlockRange);
            }
            self.read_block(dev, block, &mut buf)?;
            total += ENTRIES_PER_BLOCK;
            block = rd32(&buf, 0);
            walked += 1;
        }
        if walked == DIR_WALK_MAX && block != 0 {
            self.warn_dir_overflow(head);
        }
        Ok(total)
    }

    /// Looks up `name` in the directory headed at `head`.
    /// Returns the entry and its table index.  Consults the
    /// directory cache first; a cached table is authoritative
    /// because every mutation invalidates it.
    pub fn find_in_dir(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        head: u32,
        name: &str,
    ) -> Result<(DirEntry, u32)> {
        if let Some(entries) = self.dirs.find(head) {
            for (i, entry) in entries.iter().enumerate() {
                if entry.matches(name) {
                    return Ok((*entry, i as u32));
                }
            }
            return Err(Error::FsNoFile);
        }
        let count =
            self.count_dir_entries(dev, sb, head)?.min(DIR_ENTRIES_MAX);
        let entries = self.read_dir_table(dev, sb, head, count)?;
        let found = entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.matches(name))
            .map(|(i, entry)| (*entry, i as u32));
        match found {
            Some(hit) => {
                self.dirs.insert(head, entries);
                Ok(hit)
            }
            None => Err(Error::FsNoFile),
        }
    }

    /// Rewrites a directory table over its chain.  Phase one
    /// walks the existing chain and reserves any extra blocks
    /// the new table needs; phase two writes every block with
    /// its link.  A failed reservation frees the fresh blocks
    /// and leaves the directory as it was.
    pub fn write_dir_table(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        head: u32,
        entries: &[DirEntry],
    ) -> Result<()> {
        let needed = entries.len().div_ceil(ENTRIES_PER_BLOCK).max(1);
        if needed > DIR_WALK_MAX {
            return Err(Error::NoSpace);
        }

        let mut chain = Vec::new();
        let mut block = head;
        let mut buf = [0u8; BLOCK_SIZE];
        while block != 0 && chain.len() < DIR_WALK_MAX {
            if !sb.contains(block) {
                return Err(Error::FsBlockRange);
            }
            self.read_block(dev, block, &mut buf)?;
            chain.push(block);
            block = rd32(&buf, 0);
        }

        let existing = chain.len();
        while chain.len() < needed {
            match self.alloc_block(dev, sb) {
                Ok(fresh) => chain.push(fresh),
                Err(e) => {
                    for &fresh in &chain[existing..] {
                        let _ = self.free_block(dev, sb, fresh);
                    }
                    self.dirs.clear();
                    return Err(e);
                }
            }
        }

        for (i, &block) in chain[..needed].iter().enumerate() {
            let next =
                if i + 1 < needed { chain[i + 1] } else { 0 };
            buf.fill(0);
            wr32(&mut buf, 0, next);
            let start = i * ENTRIES_PER_BLOCK;
            let end = entries.len().min(start + ENTRIES_PER_BLOCK);
            for (j, entry) in entries[start..end].iter().enumerate() {
                let off = 4 + j * ENTRY_SIZE;
                entry.encode(&mut buf[off..off + ENTRY_SIZE]);
            }
            self.write_block(dev, block, &buf)?;
        }

        // A shrunken table strands its tail blocks; release them.
        for &surplus in &chain[needed..existing.max(needed)] {
            let _ = self.free_block(dev, sb, surplus);
        }

        self.dirs.clear();
        Ok(())
    }

    /// Creates a file or directory entry under `parent_head`.
    /// The fresh entry gets one zeroed block (for directories,
    /// an empty directory block).  Rolled back on failure.
    pub fn create_entry(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        parent_head: u32,
        name: &str,
        kind: u8,
    ) -> Result<()> {
        validate_name(name)?;
        if kind != TYPE_FILE && kind != TYPE_DIR {
            return Err(Error::FsBadEntryType);
        }
        let count = self
            .count_dir_entries(dev, sb, parent_head)?
            .min(DIR_ENTRIES_MAX);
        let mut entries =
            self.read_dir_table(dev, sb, parent_head, count)?;
        if entries.iter().any(|e| e.matches(name)) {
            return Err(Error::FsExists);
        }
        let slot = match entries.iter().position(|e| e.is_empty()) {
            Some(i) => i,
            None => {
                if (entries.len() + 1) * ENTRY_SIZE > super::DIR_BYTES_MAX {
                    return Err(Error::NoSpace);
                }
                entries.push(DirEntry::empty());
                entries.len() - 1
            }
        };

        let first = self.alloc_block(dev, sb)?;
        let zero = [0u8; BLOCK_SIZE];
        if let Err(e) = self.write_block(dev, first, &zero) {
            let _ = self.free_block(dev, sb, first);
            return Err(e);
        }
        entries[slot] = DirEntry::new(name, kind, first)?;
        if let Err(e) = self.write_dir_table(dev, sb, parent_head, &entries)
        {
            let _ = self.free_block(dev, sb, first);
            return Err(e);
        }
        Ok(())
    }

    /// Deletes an entry by name: frees its chain, zeroes its
    /// slot, rewrites the parent table.
    pub fn delete_entry(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        parent_head: u32,
        name: &str,
    ) -> Result<()> {
        let count = self
            .count_dir_entries(dev, sb, parent_head)?
            .min(DIR_ENTRIES_MAX);
        let mut entries =
            self.read_dir_table(dev, sb, parent_head, count)?;
        let Some(slot) =
            entries.iter().position(|e| e.matches(name))
        else {
            return Err(Error::FsNoFile);
        };
        self.free_chain(dev, sb, entries[slot].first_block);
        entries[slot] = DirEntry::empty();
        self.write_dir_table(dev, sb, parent_head, &entries)
    }

    /// Frees every block of a chain.  Tolerates a broken next
    /// pointer by stopping at it.
    pub fn free_chain(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        first: u32,
    ) {
        let mut block = first;
        let mut steps = 0;
        let mut buf = [0u8; BLOCK_SIZE];
        while block != 0 && steps < sb.total_blocks {
            if !sb.contains(block) {
                break;
            }
            let next = match self.read_block(dev, block, &mut buf) {
                Ok(()) => rd32(&buf, 0),
                Err(_) => break,
            };
            let _ = self.free_block(dev, sb, block);
            block = next;
            steps += 1;
        }
    }

    /// Non-empty entries of the directory headed at `head`.
    pub fn list_dir(
        &mut self,
        dev: &mut dyn BlockDevice,
        sb: &Superblock,
        head: u32,
    ) -> Result<Vec<DirEntry>> {
        let count =
            self.count_dir_entries(dev, sb, head)?.min(DIR_ENTRIES_MAX);
        let entries = self.read_dir_table(dev, sb, head, count)?;
        Ok(entries.into_iter().filter(|e| !e.is_empty()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn create_find_delete() {
        let (mut disk, mut fs, sb) = fakes::volume(128);
        let root = sb.root_dir_block;
        fs.create_entry(&mut disk, &sb, root, "hello.txt", TYPE_FILE)
            .unwrap();
        let (entry, index) =
            fs.find_in_dir(&mut disk, &sb, root, "hello.txt").unwrap();
        assert_eq!(entry.name(), "hello.txt");
        assert!(entry.is_file());
        assert_eq!(entry.size, 0);
        assert_eq!(index, 0);
        assert!(entry.first_block >= sb.lba + super::super::RESERVED_BLOCKS);

        fs.delete_entry(&mut disk, &sb, root, "hello.txt").unwrap();
        assert_eq!(
            fs.find_in_dir(&mut disk, &sb, root, "hello.txt"),
            Err(Error::FsNoFile)
        );
        // The entry's block went back to the bitmap.
        assert!(!fs.block_used(&mut disk, &sb, entry.first_block).unwrap());
    }

    #[test]
    fn duplicate_names_are_refused() {
        let (mut disk, mut fs, sb) = fakes::volume(128);
        let root = sb.root_dir_block;
        fs.create_entry(&mut disk, &sb, root, "a", TYPE_FILE).unwrap();
        assert_eq!(
            fs.create_entry(&mut disk, &sb, root, "a", TYPE_DIR),
            Err(Error::FsExists)
        );
    }

    #[test]
    fn directory_grows_past_one_block() {
        let (mut disk, mut fs, sb) = fakes::volume(256);
        let root = sb.root_dir_block;
        // 7 entries fit in the head block; the rest chain.
        for i in 0..12 {
            let name = alloc::format!("f{i}");
            fs.create_entry(&mut disk, &sb, root, &name, TYPE_FILE)
                .unwrap();
        }
        let listed = fs.list_dir(&mut disk, &sb, root).unwrap();
        assert_eq!(listed.len(), 12);
        for i in 0..12 {
            let name = alloc::format!("f{i}");
            assert!(listed.iter().any(|e| e.name() == name), "{name}");
        }
        assert!(
            fs.count_dir_entries(&mut disk, &sb, root).unwrap()
                > ENTRIES_PER_BLOCK
        );
    }

    #[test]
    fn deleted_slot_is_reused() {
        let (mut disk, mut fs, sb) = fakes::volume(128);
        let root = sb.root_dir_block;
        fs.create_entry(&mut disk, &sb, root, "one", TYPE_FILE).unwrap();
        fs.create_entry(&mut disk, &sb, root, "two", TYPE_FILE).unwrap();
        fs.delete_entry(&mut disk, &sb, root, "one").unwrap();
        fs.create_entry(&mut disk, &sb, root, "three", TYPE_FILE).unwrap();
        let (_, index) =
            fs.find_in_dir(&mut disk, &sb, root, "three").unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn subdirectories_nest() {
        let (mut disk, mut fs, sb) = fakes::volume(128);
        let root = sb.root_dir_block;
        fs.create_entry(&mut disk, &sb, root, "docs", TYPE_DIR).unwrap();
        let (docs, _) =
            fs.find_in_dir(&mut disk, &sb, root, "docs").unwrap();
        assert!(docs.is_dir());
        fs.create_entry(&mut disk, &sb, docs.first_block, "n.txt", TYPE_FILE)
            .unwrap();
        let (entry, parent, _) =
            fs.traverse_path(&mut disk, &sb, "/docs/n.txt").unwrap();
        assert!(entry.is_file());
        assert_eq!(parent, docs.first_block);
        // A file used as an intermediate component fails.
        assert_eq!(
            fs.traverse_path(&mut disk, &sb, "/docs/n.txt/x"),
            Err(Error::FsNotDir)
        );
    }

    #[test]
    fn bad_names_are_refused() {
        let (mut disk, mut fs, sb) = fakes::volume(128);
        let root = sb.root_dir_block;
        assert_eq!(
            fs.create_entry(&mut disk, &sb, root, "a/b", TYPE_FILE),
            Err(Error::FsBadName)
        );
        assert_eq!(
            fs.create_entry(&mut disk, &sb, root, "", TYPE_FILE),
            Err(Error::FsBadName)
        );
    }

    #[test]
    fn mutation_invalidates_dir_cache() {
        let (mut disk, mut fs, sb) = fakes::volume(128);
        let root = sb.root_dir_block;
        fs.create_entry(&mut disk, &sb, root, "a", TYPE_FILE).unwrap();
        // Populate the cache with a successful lookup.
        fs.find_in_dir(&mut disk, &sb, root, "a").unwrap();
        fs.create_entry(&mut disk, &sb, root, "b", TYPE_FILE).unwrap();
        // The cached table must not hide the new entry.
        fs.find_in_dir(&mut disk, &sb, root, "b").unwrap();
    }
}
