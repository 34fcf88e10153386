// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adapts the kernel heap as the crate's global allocator on
//! target.  Under `cargo test` the host allocator is used and
//! this stays a plain locked handle.

use crate::heap::Heap;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use spin::Mutex;

pub struct LockedHeap(Mutex<Option<Heap>>);

impl LockedHeap {
    pub const fn empty() -> LockedHeap {
        LockedHeap(Mutex::new(None))
    }

    /// Installs the backing heap.  Until this runs, every
    /// allocation fails.
    pub fn init(&self, heap: Heap) {
        *self.0.lock() = Some(heap);
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Heap) -> R) -> Option<R> {
        self.0.lock().as_mut().map(f)
    }
}

// The heap hands out 4-byte-aligned payloads.  Stricter layouts
// are served by over-allocating and stashing the displacement in
// the word just below the returned pointer.
unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let mut guard = self.0.lock();
        let Some(heap) = guard.as_mut() else {
            return ptr::null_mut();
        };
        let size = layout.size().max(1);
        let align = layout.align();
        if align <= 4 {
            return heap.alloc(size);
        }
        let raw = heap.alloc(size + align);
        if raw.is_null() {
            return raw;
        }
        let addr = raw as usize + 4;
        let aligned = (addr + align - 1) & !(align - 1);
        let shift = (aligned - raw as usize) as u32;
        unsafe {
            let p = raw.add(aligned - raw as usize);
            ptr::write_unaligned(p.sub(4).cast::<u32>(), shift);
            p
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let mut guard = self.0.lock();
        let Some(heap) = guard.as_mut() else {
            return;
        };
        if layout.align() <= 4 {
            heap.free(ptr);
            return;
        }
        unsafe {
            let shift = ptr::read_unaligned(ptr.sub(4).cast::<u32>());
            heap.free(ptr.sub(shift as usize));
        }
    }
}

#[cfg_attr(not(any(test, clippy)), global_allocator)]
pub static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Diagnostic access to the live heap counters, if the heap
/// has been installed.
pub fn stats() -> Option<crate::heap::HeapStats> {
    ALLOCATOR.with(|heap| heap.stats())
}
