// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EYN-OS kernel core: the EYNFS block filesystem, the kernel
//! heap allocator, the EYN executable loader with its process
//! sandbox, and the runtime x86 assembler, tied together by an
//! interactive shell.
//!
//! The crate is freestanding on target and hosted under `cargo
//! test`.  Hardware surfaces (the ATA PIO driver, the
//! framebuffer renderer, the PS/2 keyboard) stay outside; the
//! core consumes them through the `blockdev::BlockDevice` and
//! `cons::Console` traits and a multiboot memory map.

#![cfg_attr(not(any(test, clippy)), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod allocator;
pub mod asm;
pub mod blockdev;
pub mod cons;
pub mod eynfs;
pub mod exec;
pub mod fd;
pub mod heap;
pub mod kernel;
pub mod multiboot;
pub mod process;
pub mod repl;
pub mod result;

#[cfg(test)]
mod fakes;
