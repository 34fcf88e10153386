// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::exec::Image;
use crate::kernel::Kernel;
use crate::println;
use crate::process;
use crate::repl::Repl;
use crate::result::{Error, Result};

/// Cap on the executable file size `run` will load.
const LOAD_CAP: usize = 64 * 1024;

/// `run <program.eyn>`: read, validate, screen, load, and
/// transfer control.
pub fn run(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("usage: run <program.eyn>");
        return Err(Error::BadArgs);
    };
    let path = repl.resolve(arg);
    let bytes = kernel.read_file_to_vec(&path, LOAD_CAP)?;
    let image = Image::parse(&bytes)?;
    let name = path.rsplit('/').next().unwrap_or(&path);
    let slot = process::prepare(&mut kernel.procs, name, &image)?;
    let proc = kernel.procs.get(slot)?;
    println!(
        "run: pid {} code {:#x}+{:#x} entry {:#x}",
        proc.pid,
        proc.code_start,
        proc.code_size,
        proc.entry_addr(),
    );
    unsafe {
        process::enter(&mut kernel.procs, slot, &image);
    }
    Ok(())
}
