// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The sector-level I/O boundary.  The ATA PIO driver proper
//! lives outside this crate; everything above it sees storage
//! as numbered drives of 512-byte sectors.  No caching and no
//! retries here: timeouts and hardware faults surface to the
//! caller as device errors.

use crate::result::{Error, Result};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

/// The size of a device sector, in bytes.  EYNFS blocks are
/// the same size.
pub const SECTOR_SIZE: usize = 512;

/// Number of drive slots addressable by the drive selector.
pub const MAX_DRIVES: usize = 8;

pub trait BlockDevice: Send {
    fn read_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_SIZE])
    -> Result<()>;
    fn write_sector(&mut self, lba: u32, buf: &[u8; SECTOR_SIZE])
    -> Result<()>;

    /// Total number of addressable sectors.
    fn sectors(&self) -> u32;
}

/// A RAM-backed block device.  Used directly for ramdisks and
/// as the storage double in tests.
pub struct MemDisk {
    data: Vec<u8>,
}

impl MemDisk {
    pub fn new(sectors: u32) -> MemDisk {
        MemDisk { data: vec![0u8; sectors as usize * SECTOR_SIZE] }
    }

    /// Wraps an existing image.  The length must be a whole
    /// number of sectors.
    pub fn from_image(data: Vec<u8>) -> Result<MemDisk> {
        if data.len() % SECTOR_SIZE != 0 {
            return Err(Error::DevBus);
        }
        Ok(MemDisk { data })
    }

    fn range(&self, lba: u32) -> Result<core::ops::Range<usize>> {
        let start = lba as usize * SECTOR_SIZE;
        let end = start + SECTOR_SIZE;
        if end > self.data.len() {
            return Err(Error::DevBus);
        }
        Ok(start..end)
    }

    /// Raw view of the backing image, for callers that need to
    /// inspect on-disk bytes (format verification and the like).
    pub fn image(&self) -> &[u8] {
        &self.data
    }
}

impl BlockDevice for MemDisk {
    fn read_sector(
        &mut self,
        lba: u32,
        buf: &mut [u8; SECTOR_SIZE],
    ) -> Result<()> {
        let range = self.range(lba)?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_sector(
        &mut self,
        lba: u32,
        buf: &[u8; SECTOR_SIZE],
    ) -> Result<()> {
        let range = self.range(lba)?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    fn sectors(&self) -> u32 {
        (self.data.len() / SECTOR_SIZE) as u32
    }
}

/// The set of attached drives plus the shell's current-drive
/// selector.
pub struct DriveTable {
    drives: [Option<Box<dyn BlockDevice>>; MAX_DRIVES],
    current: u8,
}

impl DriveTable {
    pub fn new() -> DriveTable {
        DriveTable { drives: core::array::from_fn(|_| None), current: 0 }
    }

    pub fn attach(&mut self, index: u8, dev: Box<dyn BlockDevice>) {
        self.drives[index as usize % MAX_DRIVES] = Some(dev);
    }

    pub fn detach(&mut self, index: u8) -> Option<Box<dyn BlockDevice>> {
        self.drives[index as usize % MAX_DRIVES].take()
    }

    /// Switches the current drive.  The target must exist.
    pub fn select(&mut self, index: u8) -> Result<()> {
        if index as usize >= MAX_DRIVES {
            return Err(Error::BadArgs);
        }
        if self.drives[index as usize].is_none() {
            return Err(Error::DevNotPresent);
        }
        self.current = index;
        Ok(())
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn get_mut(&mut self, index: u8) -> Result<&mut (dyn BlockDevice + '_)> {
        let slot = self.drives.get_mut(index as usize).ok_or(Error::DevNotPresent)?;
        let boxed: &mut Box<dyn BlockDevice> =
            slot.as_mut().ok_or(Error::DevNotPresent)?;
        Ok(boxed.as_mut())
    }

    pub fn current_mut(&mut self) -> Result<&mut (dyn BlockDevice + '_)> {
        self.get_mut(self.current)
    }
}

impl Default for DriveTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memdisk_round_trip() {
        let mut disk = MemDisk::new(8);
        let mut buf = [0u8; SECTOR_SIZE];
        buf[0] = 0xa5;
        buf[511] = 0x5a;
        disk.write_sector(3, &buf).unwrap();
        let mut out = [0u8; SECTOR_SIZE];
        disk.read_sector(3, &mut out).unwrap();
        assert_eq!(buf, out);
    }

    #[test]
    fn memdisk_bounds() {
        let mut disk = MemDisk::new(4);
        let mut buf = [0u8; SECTOR_SIZE];
        assert_eq!(disk.read_sector(4, &mut buf), Err(Error::DevBus));
        assert_eq!(disk.write_sector(100, &buf), Err(Error::DevBus));
    }

    #[test]
    fn drive_selection() {
        let mut drives = DriveTable::new();
        assert_eq!(drives.select(1), Err(Error::DevNotPresent));
        drives.attach(1, Box::new(MemDisk::new(4)));
        drives.select(1).unwrap();
        assert_eq!(drives.current(), 1);
        assert!(drives.current_mut().is_ok());
        assert_eq!(drives.select(9), Err(Error::BadArgs));
    }
}
