// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The kernel root object.  Everything process-wide and mutable
//! hangs off a `Kernel`: attached drives and the current-drive
//! selector, the filesystem caches, the open-handle table, and
//! the process slots.  The shell and the tests drive the same
//! surface.

use crate::blockdev::DriveTable;
use crate::eynfs::{
    DirEntry, Eynfs, SUPERBLOCK_LBA, Superblock, TYPE_DIR,
};
use crate::fd::{self, HandleTable, Mode, split_path};
use crate::process::ProcessTable;
use crate::result::{Error, Result};
use alloc::vec::Vec;

pub struct Kernel {
    pub drives: DriveTable,
    pub fs: Eynfs,
    pub handles: HandleTable,
    pub procs: ProcessTable,
}

impl Kernel {
    pub fn new() -> Kernel {
        Kernel {
            drives: DriveTable::new(),
            fs: Eynfs::new(),
            handles: HandleTable::new(),
            procs: ProcessTable::new(),
        }
    }

    /// The mounted superblock of the current drive, or `FsNoFs`.
    pub fn superblock(&mut self) -> Result<Superblock> {
        let Kernel { drives, fs, .. } = self;
        let dev = drives.current_mut()?;
        fs.mount(dev, SUPERBLOCK_LBA).map_err(fd::nofs)
    }

    /// Re-reads and validates the superblock, reporting the
    /// precise structural failure.
    pub fn fscheck(&mut self) -> Result<Superblock> {
        let Kernel { drives, fs, .. } = self;
        let dev = drives.current_mut()?;
        fs.mount(dev, SUPERBLOCK_LBA)
    }

    pub fn format(&mut self, total_blocks: u32) -> Result<()> {
        let Kernel { drives, fs, .. } = self;
        let dev = drives.current_mut()?;
        fs.format(dev, SUPERBLOCK_LBA, total_blocks)
    }

    /// Switches the current drive.  The caches hold blocks of
    /// the old drive, so they are flushed and dropped first.
    pub fn drive_select(&mut self, index: u8) -> Result<()> {
        if index != self.drives.current() {
            let Kernel { drives, fs, .. } = self;
            if let Ok(dev) = drives.current_mut() {
                fs.cache_clear(dev)?;
            }
        }
        self.drives.select(index)
    }

    pub fn open(&mut self, path: &str, mode: Mode) -> Result<usize> {
        let Kernel { drives, fs, handles, .. } = self;
        let drive = drives.current();
        let dev = drives.current_mut()?;
        handles.open(fs, dev, drive, path, mode)
    }

    pub fn close(&mut self, fd: usize) -> Result<()> {
        self.handles.close(fd)
    }

    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let Kernel { drives, fs, handles, .. } = self;
        let drive = handles.handle(fd)?.drive;
        let dev = drives.get_mut(drive)?;
        handles.read(fs, dev, fd, buf)
    }

    pub fn write(&mut self, fd: usize, data: &[u8]) -> Result<usize> {
        let Kernel { drives, fs, handles, .. } = self;
        let drive = handles.handle(fd)?.drive;
        let dev = drives.get_mut(drive)?;
        handles.write(fs, dev, fd, data)
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let sb = self.superblock()?;
        let Kernel { drives, fs, .. } = self;
        let dev = drives.current_mut()?;
        match fs.traverse_path(dev, &sb, path) {
            Ok(_) => return Err(Error::FsExists),
            Err(Error::FsNoFile) => {}
            Err(e) => return Err(e),
        }
        let (parent_path, name) = split_path(path)?;
        let (parent, _, _) = fs
            .traverse_path(dev, &sb, parent_path)
            .map_err(|_| Error::FsNotDir)?;
        if !parent.is_dir() {
            return Err(Error::FsNotDir);
        }
        fs.create_entry(dev, &sb, parent.first_block, name, TYPE_DIR)
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let sb = self.superblock()?;
        if path == "/" {
            return Err(Error::FsBadPath);
        }
        let Kernel { drives, fs, .. } = self;
        let dev = drives.current_mut()?;
        let (entry, parent_head, _) = fs.traverse_path(dev, &sb, path)?;
        if !entry.is_dir() {
            return Err(Error::FsNotDir);
        }
        if !fs.list_dir(dev, &sb, entry.first_block)?.is_empty() {
            return Err(Error::FsNotEmpty);
        }
        let (_, name) = split_path(path)?;
        fs.delete_entry(dev, &sb, parent_head, name)
    }

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let sb = self.superblock()?;
        let Kernel { drives, fs, .. } = self;
        let dev = drives.current_mut()?;
        let (entry, parent_head, _) = fs.traverse_path(dev, &sb, path)?;
        if entry.is_dir() {
            return Err(Error::FsIsDir);
        }
        let (_, name) = split_path(path)?;
        fs.delete_entry(dev, &sb, parent_head, name)
    }

    pub fn stat(&mut self, path: &str) -> Result<DirEntry> {
        let sb = self.superblock()?;
        let Kernel { drives, fs, .. } = self;
        let dev = drives.current_mut()?;
        let (entry, _, _) = fs.traverse_path(dev, &sb, path)?;
        Ok(entry)
    }

    pub fn readdir(&mut self, head: u32) -> Result<Vec<DirEntry>> {
        let sb = self.superblock()?;
        let Kernel { drives, fs, .. } = self;
        let dev = drives.current_mut()?;
        fs.list_dir(dev, &sb, head)
    }

    /// Reads a whole file into memory, bounded by `cap`.
    pub fn read_file_to_vec(
        &mut self,
        path: &str,
        cap: usize,
    ) -> Result<Vec<u8>> {
        let fd = self.open(path, Mode::Read)?;
        let entry = self.handles.handle(fd)?.entry;
        if entry.is_dir() {
            self.close(fd)?;
            return Err(Error::FsIsDir);
        }
        let size = (entry.size as usize).min(cap);
        let mut buf = alloc::vec![0u8; size];
        let result = self.read(fd, &mut buf);
        self.close(fd)?;
        let n = result?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Creates or replaces a file with the given bytes.
    pub fn write_file_from(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let fd = self.open(path, Mode::Write)?;
        let result = self.write(fd, data);
        self.close(fd)?;
        result.map(|_| ())
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;
    use alloc::format;

    #[test]
    fn fresh_volume_has_an_empty_root() {
        let mut kernel = fakes::kernel(1024);
        let entry = kernel.stat("/").unwrap();
        assert!(entry.is_dir());
        assert_eq!(entry.first_block, SUPERBLOCK_LBA + 3);
        let listing = kernel.readdir(entry.first_block).unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn nested_write_and_stat() {
        let mut kernel = fakes::kernel(1024);
        kernel.mkdir("/docs").unwrap();
        let fd = kernel.open("/docs/note.txt", Mode::Write).unwrap();
        assert_eq!(kernel.write(fd, b"hello").unwrap(), 5);
        kernel.close(fd).unwrap();

        let fd = kernel.open("/docs/note.txt", Mode::Read).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(kernel.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        kernel.close(fd).unwrap();

        let entry = kernel.stat("/docs/note.txt").unwrap();
        assert_eq!(entry.size, 5);
        assert!(entry.is_file());
    }

    #[test]
    fn mkdir_guards() {
        let mut kernel = fakes::kernel(1024);
        kernel.mkdir("/d").unwrap();
        assert_eq!(kernel.mkdir("/d"), Err(Error::FsExists));
        assert_eq!(kernel.mkdir("/missing/sub"), Err(Error::FsNotDir));
        kernel.write_file_from("/f", b"x").unwrap();
        assert_eq!(kernel.mkdir("/f/sub"), Err(Error::FsNotDir));
    }

    #[test]
    fn rmdir_requires_an_empty_directory() {
        let mut kernel = fakes::kernel(1024);
        kernel.mkdir("/d").unwrap();
        kernel.write_file_from("/d/f", b"x").unwrap();
        assert_eq!(kernel.rmdir("/d"), Err(Error::FsNotEmpty));
        kernel.unlink("/d/f").unwrap();
        kernel.rmdir("/d").unwrap();
        assert_eq!(kernel.stat("/d"), Err(Error::FsNoFile));
        assert_eq!(kernel.rmdir("/"), Err(Error::FsBadPath));
    }

    #[test]
    fn unlink_refuses_directories_and_frees_blocks() {
        let mut kernel = fakes::kernel(1024);
        kernel.mkdir("/d").unwrap();
        assert_eq!(kernel.unlink("/d"), Err(Error::FsIsDir));
        kernel.write_file_from("/big", &[7u8; 1500]).unwrap();
        let entry = kernel.stat("/big").unwrap();
        kernel.unlink("/big").unwrap();
        assert_eq!(
            kernel.open("/big", Mode::Read),
            Err(Error::FsNoFile)
        );
        // Every block of the dead chain is free again.
        let sb = kernel.superblock().unwrap();
        let Kernel { drives, fs, .. } = &mut kernel;
        let dev = drives.current_mut().unwrap();
        assert!(!fs.block_used(dev, &sb, entry.first_block).unwrap());
    }

    #[test]
    fn two_hundred_files_then_half_deleted() {
        let mut kernel = fakes::kernel(1024);
        for i in 0..200 {
            kernel
                .write_file_from(&format!("/f{i:03}"), b"x")
                .unwrap();
        }
        let root = kernel.stat("/").unwrap().first_block;
        assert_eq!(kernel.readdir(root).unwrap().len(), 200);

        for i in (0..200).step_by(2) {
            kernel.unlink(&format!("/f{i:03}")).unwrap();
        }
        let names = kernel.readdir(root).unwrap();
        assert_eq!(names.len(), 100);
        for i in 0..200 {
            let name = format!("f{i:03}");
            assert_eq!(
                names.iter().any(|e| e.name() == name),
                i % 2 == 1,
                "{name}"
            );
        }

        // 100 file chain blocks plus the root directory's
        // overflow blocks stay used; nothing else.
        let sb = kernel.superblock().unwrap();
        let Kernel { drives, fs, .. } = &mut kernel;
        let dev = drives.current_mut().unwrap();
        let dir_blocks = 200u32.div_ceil(7) - 1;
        assert_eq!(
            fs.used_block_count(dev, &sb).unwrap(),
            100 + dir_blocks
        );
    }

    #[test]
    fn drive_selector_switches_volumes() {
        let mut kernel = fakes::kernel(256);
        let mut other = crate::blockdev::MemDisk::new(SUPERBLOCK_LBA + 256);
        let mut scratch = Eynfs::new();
        scratch.format(&mut other, SUPERBLOCK_LBA, 256).unwrap();
        kernel.drives.attach(1, alloc::boxed::Box::new(other));

        kernel.write_file_from("/only-on-zero", b"0").unwrap();
        kernel.drive_select(1).unwrap();
        assert_eq!(
            kernel.stat("/only-on-zero"),
            Err(Error::FsNoFile)
        );
        kernel.drive_select(0).unwrap();
        kernel.stat("/only-on-zero").unwrap();
    }
}
