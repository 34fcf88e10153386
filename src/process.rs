// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process sandbox state.  Two fixed slots, each describing
//! pre-partitioned windows in the user address span: a code
//! window (shared base, since assembled programs carry absolute
//! addresses against it), and per-slot stack and heap windows.
//! Isolation is bounds checking at load time plus the loader's
//! opcode screen; there is no paging.

use crate::cons;
use crate::exec::{self, Image};
use crate::println;
use crate::result::{Error, Result};
use alloc::string::String;

/// Number of process slots.
pub const MAX_PROCESSES: usize = 2;

/// Where user code is loaded.  The assembler bakes absolute
/// label addresses against this base, so it is the same for
/// every slot.
pub const USER_CODE_ADDR: u32 = 0x0020_0000;

/// Cap on loadable code, one code window's worth.
pub const USER_CODE_MAX: u32 = 0x4000;

/// Initialised data lands at this offset from the code base.
pub const USER_DATA_OFFSET: u32 = 0x1000;

/// Stack windows: 32 KiB per slot from here.
pub const USER_STACK_ADDR: u32 = 0x0030_0000;
pub const USER_STACK_SIZE: u32 = 0x8000;

/// Heap windows: 32 KiB per slot from here.
pub const USER_HEAP_ADDR: u32 = 0x0040_0000;
pub const USER_HEAP_SIZE: u32 = 0x8000;

/// End of the span user programs may touch.
pub const USER_SPAN_END: u32 =
    USER_HEAP_ADDR + MAX_PROCESSES as u32 * USER_HEAP_SIZE;

#[derive(Clone, Debug)]
pub struct Process {
    pub pid: u32,
    pub name: String,
    pub code_start: u32,
    pub code_size: u32,
    pub stack_start: u32,
    pub stack_size: u32,
    pub heap_start: u32,
    pub heap_size: u32,
    pub entry_point: u32,
}

impl Process {
    /// Absolute entry address.
    pub fn entry_addr(&self) -> u32 {
        self.code_start + self.entry_point
    }
}

/// True if `[addr, addr + len)` lies inside the user span.
pub fn validate_user_span(addr: u32, len: u32) -> Result<()> {
    let end = addr.checked_add(len).ok_or(Error::ProcBounds)?;
    if addr < USER_CODE_ADDR || end > USER_SPAN_END {
        return Err(Error::ProcBounds);
    }
    Ok(())
}

pub struct ProcessTable {
    slots: [Option<Process>; MAX_PROCESSES],
    next_pid: u32,
}

impl ProcessTable {
    pub fn new() -> ProcessTable {
        ProcessTable { slots: core::array::from_fn(|_| None), next_pid: 1 }
    }

    pub fn active(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter().flatten()
    }

    /// Claims a slot and lays out its fixed windows.
    pub fn spawn(
        &mut self,
        name: &str,
        code_size: u32,
        entry_point: u32,
    ) -> Result<usize> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(Error::ProcNoSlots)?;
        let pid = self.next_pid;
        self.next_pid += 1;
        self.slots[slot] = Some(Process {
            pid,
            name: String::from(name),
            code_start: USER_CODE_ADDR,
            code_size,
            stack_start: USER_STACK_ADDR + slot as u32 * USER_STACK_SIZE,
            stack_size: USER_STACK_SIZE,
            heap_start: USER_HEAP_ADDR + slot as u32 * USER_HEAP_SIZE,
            heap_size: USER_HEAP_SIZE,
            entry_point,
        });
        Ok(slot)
    }

    pub fn get(&self, slot: usize) -> Result<&Process> {
        self.slots.get(slot).and_then(|s| s.as_ref()).ok_or(Error::BadArgs)
    }

    pub fn release(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = None;
        }
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates an image against a slot's windows: screened code,
/// code and data spans inside the region.  Nothing is copied
/// here; `enter` does the irreversible part.
pub fn prepare(
    procs: &mut ProcessTable,
    name: &str,
    image: &Image,
) -> Result<usize> {
    if image.header.code_size > USER_CODE_MAX {
        return Err(Error::ExeTooBig);
    }
    exec::screen(image.code)?;
    let slot = procs.spawn(name, image.header.code_size, image.header.entry_point)?;
    let proc = match procs.get(slot) {
        Ok(p) => p,
        Err(e) => return Err(e),
    };
    let checks = [
        validate_user_span(proc.code_start, image.header.code_size),
        if image.header.data_size > 0 {
            validate_user_span(
                proc.code_start + USER_DATA_OFFSET,
                image.header.data_size,
            )
        } else {
            Ok(())
        },
    ];
    for check in checks {
        if let Err(e) = check {
            procs.release(slot);
            return Err(e);
        }
    }
    Ok(slot)
}

/// Copies the program into its windows and calls the entry
/// point, then releases the slot and reports the outcome.
///
/// # Safety
/// The user span must be identity mapped and writable, and the
/// image must have passed `prepare`.  This transfers control to
/// foreign code; there is no way back except its return or the
/// user-interrupt flag.
pub unsafe fn enter(procs: &mut ProcessTable, slot: usize, image: &Image) {
    let Ok(proc) = procs.get(slot) else {
        return;
    };
    let code = core::ptr::with_exposed_provenance_mut::<u8>(
        proc.code_start as usize,
    );
    let entry_addr = proc.entry_addr() as usize;
    unsafe {
        core::ptr::copy_nonoverlapping(
            image.code.as_ptr(),
            code,
            image.code.len(),
        );
        if !image.data.is_empty() {
            let data = core::ptr::with_exposed_provenance_mut::<u8>(
                (proc.code_start + USER_DATA_OFFSET) as usize,
            );
            core::ptr::copy_nonoverlapping(
                image.data.as_ptr(),
                data,
                image.data.len(),
            );
        }
    }
    cons::reset_interrupt();
    let entry: extern "C" fn() = unsafe { core::mem::transmute(entry_addr) };
    entry();
    if cons::interrupted() {
        println!("run: program interrupted by user");
        cons::reset_interrupt();
    } else {
        println!("run: program returned");
    }
    procs.release(slot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExeHeader;
    use alloc::vec::Vec;

    fn image_bytes(code: &[u8], entry: u32) -> Vec<u8> {
        let header = ExeHeader::new(entry, code.len() as u32, 0);
        let mut out = Vec::new();
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(code);
        out
    }

    #[test]
    fn windows_do_not_overlap() {
        let mut procs = ProcessTable::new();
        let a = procs.spawn("a", 64, 0).unwrap();
        let b = procs.spawn("b", 64, 0).unwrap();
        let pa = procs.get(a).unwrap().clone();
        let pb = procs.get(b).unwrap().clone();
        assert_ne!(pa.pid, pb.pid);
        // Stacks and heaps are distinct windows.
        assert!(
            pa.stack_start + pa.stack_size <= pb.stack_start
                || pb.stack_start + pb.stack_size <= pa.stack_start
        );
        assert!(
            pa.heap_start + pa.heap_size <= pb.heap_start
                || pb.heap_start + pb.heap_size <= pa.heap_start
        );
        assert_eq!(procs.spawn("c", 64, 0), Err(Error::ProcNoSlots));
        procs.release(a);
        procs.spawn("c", 64, 0).unwrap();
    }

    #[test]
    fn span_validation() {
        validate_user_span(USER_CODE_ADDR, USER_CODE_MAX).unwrap();
        assert_eq!(
            validate_user_span(USER_CODE_ADDR - 4, 4),
            Err(Error::ProcBounds)
        );
        assert_eq!(
            validate_user_span(USER_SPAN_END - 4, 8),
            Err(Error::ProcBounds)
        );
        assert_eq!(
            validate_user_span(u32::MAX - 1, 8),
            Err(Error::ProcBounds)
        );
    }

    #[test]
    fn prepare_screens_and_claims_a_slot() {
        let mut procs = ProcessTable::new();
        let bytes = image_bytes(&[0xb8, 0x2a, 0, 0, 0, 0xc3], 0);
        let image = Image::parse(&bytes).unwrap();
        let slot = prepare(&mut procs, "ok.eyn", &image).unwrap();
        let proc = procs.get(slot).unwrap();
        assert_eq!(proc.entry_addr(), USER_CODE_ADDR);
        assert_eq!(proc.code_size, 6);
        assert_eq!(procs.active(), 1);
    }

    #[test]
    fn prepare_refuses_blocked_code() {
        let mut procs = ProcessTable::new();
        let bytes = image_bytes(&[0xf4], 0);
        let image = Image::parse(&bytes).unwrap();
        assert_eq!(
            prepare(&mut procs, "bad.eyn", &image),
            Err(Error::ExeBlockedOp)
        );
        // The failed load held no slot.
        assert_eq!(procs.active(), 0);
    }

    #[test]
    fn prepare_refuses_oversized_code() {
        let mut procs = ProcessTable::new();
        let code = alloc::vec![0x90u8; USER_CODE_MAX as usize + 1];
        let bytes = image_bytes(&code, 0);
        let image = Image::parse(&bytes).unwrap();
        assert_eq!(
            prepare(&mut procs, "big.eyn", &image),
            Err(Error::ExeTooBig)
        );
    }
}
