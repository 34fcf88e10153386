// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Unix-flavored handle table over EYNFS: open, close,
//! read, write against numbered descriptors.  A handle caches
//! the superblock and the directory entry it was opened with,
//! plus where that entry lives so size updates can be persisted
//! after writes.  Reading a directory handle yields a text
//! listing, produced once.

use crate::blockdev::BlockDevice;
use crate::eynfs::{DirEntry, Eynfs, SUPERBLOCK_LBA, Superblock, TYPE_FILE};
use crate::result::{Error, Result};
use alloc::vec;

/// Concurrent open-handle limit.
pub const MAX_HANDLES: usize = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Read = 0,
    Write = 1,
    Append = 2,
}

impl Mode {
    pub fn from_raw(raw: u32) -> Result<Mode> {
        match raw {
            0 => Ok(Mode::Read),
            1 => Ok(Mode::Write),
            2 => Ok(Mode::Append),
            _ => Err(Error::BadMode),
        }
    }
}

pub struct FileHandle {
    pub drive: u8,
    pub sb: Superblock,
    pub entry: DirEntry,
    pub offset: u32,
    pub mode: Mode,
    pub parent_head: u32,
    pub entry_index: u32,
}

pub struct HandleTable {
    slots: [Option<FileHandle>; MAX_HANDLES],
}

/// Splits an absolute path into its parent directory and final
/// component.
pub fn split_path(path: &str) -> Result<(&str, &str)> {
    if !path.starts_with('/') {
        return Err(Error::FsBadPath);
    }
    let cut = path.rfind('/').unwrap_or(0);
    let name = &path[cut + 1..];
    if name.is_empty() {
        return Err(Error::FsBadPath);
    }
    let parent = if cut == 0 { "/" } else { &path[..cut] };
    Ok((parent, name))
}

/// Narrows superblock validation failures to the "no
/// filesystem" answer the shell expects.
pub(crate) fn nofs(e: Error) -> Error {
    match e {
        Error::FsBadMagic
        | Error::FsBadVersion
        | Error::FsBadBlockSize
        | Error::FsBlockRange => Error::FsNoFs,
        other => other,
    }
}

impl HandleTable {
    pub fn new() -> HandleTable {
        HandleTable { slots: core::array::from_fn(|_| None) }
    }

    fn handle_mut(&mut self, fd: usize) -> Result<&mut FileHandle> {
        self.slots
            .get_mut(fd)
            .and_then(|s| s.as_mut())
            .ok_or(Error::BadFd)
    }

    pub fn handle(&self, fd: usize) -> Result<&FileHandle> {
        self.slots.get(fd).and_then(|s| s.as_ref()).ok_or(Error::BadFd)
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn open(
        &mut self,
        fs: &mut Eynfs,
        dev: &mut dyn BlockDevice,
        drive: u8,
        path: &str,
        mode: Mode,
    ) -> Result<usize> {
        let fd = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(Error::NoHandles)?;
        let sb = fs.mount(dev, SUPERBLOCK_LBA).map_err(nofs)?;

        if path == "/" {
            if mode != Mode::Read {
                return Err(Error::BadMode);
            }
            self.slots[fd] = Some(FileHandle {
                drive,
                sb,
                entry: DirEntry::root(&sb),
                offset: 0,
                mode,
                parent_head: 0,
                entry_index: 0,
            });
            return Ok(fd);
        }

        let resolved = fs.traverse_path(dev, &sb, path);
        let (mut entry, parent_head, entry_index) = match resolved {
            Ok(found) => found,
            Err(Error::FsNoFile) if mode != Mode::Read => {
                // Create on open for write and append.
                let (parent_path, name) = split_path(path)?;
                let (parent, _, _) =
                    fs.traverse_path(dev, &sb, parent_path)?;
                if !parent.is_dir() {
                    return Err(Error::FsNotDir);
                }
                fs.create_entry(
                    dev,
                    &sb,
                    parent.first_block,
                    name,
                    TYPE_FILE,
                )?;
                let (entry, index) =
                    fs.find_in_dir(dev, &sb, parent.first_block, name)?;
                (entry, parent.first_block, index)
            }
            Err(e) => return Err(e),
        };

        let mut offset = 0;
        match mode {
            Mode::Read => {}
            Mode::Write => {
                // Truncate in the handle's copy; the chain on
                // disk is replaced on the next write.
                entry.size = 0;
                entry.first_block = 0;
            }
            Mode::Append => offset = entry.size,
        }
        self.slots[fd] = Some(FileHandle {
            drive,
            sb,
            entry,
            offset,
            mode,
            parent_head,
            entry_index,
        });
        Ok(fd)
    }

    pub fn close(&mut self, fd: usize) -> Result<()> {
        let slot = self.slots.get_mut(fd).ok_or(Error::BadFd)?;
        if slot.is_none() {
            return Err(Error::BadFd);
        }
        *slot = None;
        Ok(())
    }

    pub fn read(
        &mut self,
        fs: &mut Eynfs,
        dev: &mut dyn BlockDevice,
        fd: usize,
        buf: &mut [u8],
    ) -> Result<usize> {
        let h = self.handle_mut(fd)?;
        if h.entry.is_dir() {
            if h.offset != 0 {
                return Ok(0);
            }
            let entries =
                fs.list_dir(dev, &h.sb, h.entry.first_block)?;
            let mut written = 0;
            for entry in entries {
                let name = entry.name();
                let suffix: &str = if entry.is_dir() { "/" } else { "" };
                let need = name.len() + suffix.len() + 1;
                if written + need > buf.len() {
                    break;
                }
                buf[written..written + name.len()]
                    .copy_from_slice(name.as_bytes());
                written += name.len();
                buf[written..written + suffix.len()]
                    .copy_from_slice(suffix.as_bytes());
                written += suffix.len();
                buf[written] = b'\n';
                written += 1;
            }
            h.offset = 1;
            return Ok(written);
        }
        let n = fs.read_file(dev, &h.sb, &h.entry, buf, h.offset)?;
        h.offset += n as u32;
        Ok(n)
    }

    pub fn write(
        &mut self,
        fs: &mut Eynfs,
        dev: &mut dyn BlockDevice,
        fd: usize,
        data: &[u8],
    ) -> Result<usize> {
        let h = self.handle_mut(fd)?;
        if h.mode == Mode::Read || h.entry.is_dir() {
            return Err(Error::BadMode);
        }
        if h.mode == Mode::Append && h.offset > 0 {
            // Single-call append: read back, concatenate,
            // rewrite the whole chain.
            let mut combined = vec![0u8; h.entry.size as usize];
            let got =
                fs.read_file(dev, &h.sb, &h.entry, &mut combined, 0)?;
            combined.truncate(got);
            combined.extend_from_slice(data);
            fs.write_file(
                dev,
                &h.sb,
                &mut h.entry,
                &combined,
                h.parent_head,
                h.entry_index,
            )?;
        } else {
            fs.write_file(
                dev,
                &h.sb,
                &mut h.entry,
                data,
                h.parent_head,
                h.entry_index,
            )?;
        }
        h.offset = h.entry.size;
        Ok(data.len())
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn split_path_cases() {
        assert_eq!(split_path("/a").unwrap(), ("/", "a"));
        assert_eq!(split_path("/a/b.txt").unwrap(), ("/a", "b.txt"));
        assert_eq!(split_path("/a/b/c").unwrap(), ("/a/b", "c"));
        assert_eq!(split_path("/"), Err(Error::FsBadPath));
        assert_eq!(split_path("a/b"), Err(Error::FsBadPath));
    }

    #[test]
    fn create_write_read_round_trip() {
        let (mut disk, mut fs, _) = fakes::volume(128);
        let mut handles = HandleTable::new();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/note.txt", Mode::Write)
            .unwrap();
        assert_eq!(
            handles.write(&mut fs, &mut disk, fd, b"hello").unwrap(),
            5
        );
        handles.close(fd).unwrap();

        let fd = handles
            .open(&mut fs, &mut disk, 0, "/note.txt", Mode::Read)
            .unwrap();
        let mut buf = [0u8; 16];
        let n = handles.read(&mut fs, &mut disk, fd, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        // A second read continues from the offset: nothing left.
        assert_eq!(
            handles.read(&mut fs, &mut disk, fd, &mut buf).unwrap(),
            0
        );
        handles.close(fd).unwrap();
    }

    #[test]
    fn read_mode_cannot_write_or_create() {
        let (mut disk, mut fs, _) = fakes::volume(128);
        let mut handles = HandleTable::new();
        assert_eq!(
            handles.open(&mut fs, &mut disk, 0, "/ghost", Mode::Read),
            Err(Error::FsNoFile)
        );
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/f", Mode::Write)
            .unwrap();
        handles.write(&mut fs, &mut disk, fd, b"x").unwrap();
        handles.close(fd).unwrap();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/f", Mode::Read)
            .unwrap();
        assert_eq!(
            handles.write(&mut fs, &mut disk, fd, b"y"),
            Err(Error::BadMode)
        );
    }

    #[test]
    fn write_mode_truncates() {
        let (mut disk, mut fs, _) = fakes::volume(128);
        let mut handles = HandleTable::new();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/t", Mode::Write)
            .unwrap();
        handles.write(&mut fs, &mut disk, fd, b"a longer first pass")
            .unwrap();
        handles.close(fd).unwrap();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/t", Mode::Write)
            .unwrap();
        handles.write(&mut fs, &mut disk, fd, b"short").unwrap();
        handles.close(fd).unwrap();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/t", Mode::Read)
            .unwrap();
        let mut buf = [0u8; 64];
        let n = handles.read(&mut fs, &mut disk, fd, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"short");
    }

    #[test]
    fn append_concatenates() {
        let (mut disk, mut fs, _) = fakes::volume(128);
        let mut handles = HandleTable::new();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/log", Mode::Append)
            .unwrap();
        handles.write(&mut fs, &mut disk, fd, b"one ").unwrap();
        handles.close(fd).unwrap();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/log", Mode::Append)
            .unwrap();
        handles.write(&mut fs, &mut disk, fd, b"two").unwrap();
        handles.close(fd).unwrap();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/log", Mode::Read)
            .unwrap();
        let mut buf = [0u8; 32];
        let n = handles.read(&mut fs, &mut disk, fd, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"one two");
    }

    #[test]
    fn directory_reads_list_once() {
        let (mut disk, mut fs, sb) = fakes::volume(128);
        let mut handles = HandleTable::new();
        fs.create_entry(&mut disk, &sb, sb.root_dir_block, "d", 2).unwrap();
        fs.create_entry(&mut disk, &sb, sb.root_dir_block, "f", 1).unwrap();
        let fd = handles
            .open(&mut fs, &mut disk, 0, "/", Mode::Read)
            .unwrap();
        let mut buf = [0u8; 128];
        let n = handles.read(&mut fs, &mut disk, fd, &mut buf).unwrap();
        let listing = core::str::from_utf8(&buf[..n]).unwrap();
        assert_eq!(listing, "d/\nf\n");
        assert_eq!(
            handles.read(&mut fs, &mut disk, fd, &mut buf).unwrap(),
            0
        );
    }

    #[test]
    fn root_opens_read_only() {
        let (mut disk, mut fs, _) = fakes::volume(128);
        let mut handles = HandleTable::new();
        assert_eq!(
            handles.open(&mut fs, &mut disk, 0, "/", Mode::Write),
            Err(Error::BadMode)
        );
    }

    #[test]
    fn handles_run_out_at_the_cap() {
        let (mut disk, mut fs, _) = fakes::volume(128);
        let mut handles = HandleTable::new();
        for _ in 0..MAX_HANDLES {
            handles.open(&mut fs, &mut disk, 0, "/", Mode::Read).unwrap();
        }
        assert_eq!(
            handles.open(&mut fs, &mut disk, 0, "/", Mode::Read),
            Err(Error::NoHandles)
        );
        handles.close(0).unwrap();
        assert_eq!(handles.close(0), Err(Error::BadFd));
        handles.open(&mut fs, &mut disk, 0, "/", Mode::Read).unwrap();
    }

    #[test]
    fn unformatted_drive_reports_no_filesystem() {
        let mut disk = crate::blockdev::MemDisk::new(SUPERBLOCK_LBA + 16);
        let mut fs = Eynfs::new();
        let mut handles = HandleTable::new();
        assert_eq!(
            handles.open(&mut fs, &mut disk, 0, "/x", Mode::Read),
            Err(Error::FsNoFs)
        );
    }
}
