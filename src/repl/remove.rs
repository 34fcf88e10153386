// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::kernel::Kernel;
use crate::println;
use crate::repl::Repl;
use crate::result::{Error, Result};

pub fn del(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("usage: del <file>");
        return Err(Error::BadArgs);
    };
    let path = repl.resolve(arg);
    kernel.unlink(&path)?;
    println!("deleted {path}");
    Ok(())
}

pub fn rmdir(
    kernel: &mut Kernel,
    repl: &mut Repl,
    args: &[&str],
) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("usage: rmdir <directory>");
        return Err(Error::BadArgs);
    };
    let path = repl.resolve(arg);
    kernel.rmdir(&path)?;
    println!("removed {path}");
    Ok(())
}
