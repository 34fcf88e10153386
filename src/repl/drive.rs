// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::eynfs::BITMAP_BITS;
use crate::kernel::Kernel;
use crate::println;
use crate::repl::Repl;
use crate::result::{Error, Result};

pub fn run(kernel: &mut Kernel, _repl: &mut Repl, args: &[&str]) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("current drive: {}", kernel.drives.current());
        return Ok(());
    };
    let index: u8 = arg.parse().map_err(|_| Error::BadArgs)?;
    kernel.drive_select(index)?;
    println!("switched to drive {index}");
    Ok(())
}

pub fn format(
    kernel: &mut Kernel,
    _repl: &mut Repl,
    args: &[&str],
) -> Result<()> {
    let total = match args.first() {
        Some(arg) => arg.parse::<u32>().map_err(|_| Error::BadArgs)?,
        None => BITMAP_BITS,
    };
    kernel.format(total)?;
    println!(
        "formatted drive {} with {total} blocks",
        kernel.drives.current()
    );
    Ok(())
}
