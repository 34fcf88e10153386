// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared test fixtures: formatted in-memory volumes, kernels
//! wired to them, and a scripted console.

use crate::blockdev::MemDisk;
use crate::cons::Console;
use crate::eynfs::{Eynfs, SUPERBLOCK_LBA, Superblock};
use crate::kernel::Kernel;
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// A freshly formatted volume: disk, filesystem state, and its
/// mounted superblock.
pub fn volume(total_blocks: u32) -> (MemDisk, Eynfs, Superblock) {
    let mut disk = MemDisk::new(SUPERBLOCK_LBA + total_blocks);
    let mut fs = Eynfs::new();
    fs.format(&mut disk, SUPERBLOCK_LBA, total_blocks).unwrap();
    let sb = fs.mount(&mut disk, SUPERBLOCK_LBA).unwrap();
    (disk, fs, sb)
}

/// A kernel with the formatted volume attached as drive 0.
pub fn kernel(total_blocks: u32) -> Kernel {
    let (disk, fs, _) = volume(total_blocks);
    let mut kernel = Kernel::new();
    kernel.fs = fs;
    kernel.drives.attach(0, Box::new(disk));
    kernel
}

/// A console that replays scripted keystrokes and captures
/// everything printed at it.
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    output: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedConsole {
    pub fn new(script: &[u8]) -> (ScriptedConsole, Arc<Mutex<Vec<u8>>>) {
        let output = Arc::new(Mutex::new(Vec::new()));
        let cons = ScriptedConsole {
            input: script.iter().copied().collect(),
            output: Arc::clone(&output),
        };
        (cons, output)
    }
}

impl Console for ScriptedConsole {
    fn putb(&mut self, b: u8) {
        self.output.lock().push(b);
    }

    fn getb(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(b'\n')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cons;

    #[test]
    fn readline_edits_the_line() {
        let (scripted, _out) = ScriptedConsole::new(b"ab\x08c\n");
        cons::set_console(Box::new(scripted));
        let mut buf = [0u8; 64];
        let line = cons::readline("> ", &mut buf).unwrap();
        assert_eq!(line, "ac");
    }
}
