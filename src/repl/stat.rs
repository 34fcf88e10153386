// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::kernel::Kernel;
use crate::println;
use crate::repl::Repl;
use crate::result::{Error, Result};

pub fn run(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("usage: stat <path>");
        return Err(Error::BadArgs);
    };
    let path = repl.resolve(arg);
    let entry = kernel.stat(&path)?;
    let kind = if entry.is_dir() { "directory" } else { "file" };
    println!("{path}: {kind}, {} bytes, first block {}", entry.size,
        entry.first_block);
    Ok(())
}

pub fn fscheck(
    kernel: &mut Kernel,
    _repl: &mut Repl,
    _args: &[&str],
) -> Result<()> {
    let sb = kernel.fscheck()?;
    println!(
        "EYNFS v{} at {}: {} blocks of {} bytes, root at {}, bitmap at {}",
        sb.version,
        sb.lba,
        sb.total_blocks,
        sb.block_size,
        sb.root_dir_block,
        sb.free_block_map,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn stat_and_fscheck_report() {
        let mut kernel = fakes::kernel(512);
        let mut repl = Repl::new();
        kernel.write_file_from("/f", b"abcd").unwrap();
        run(&mut kernel, &mut repl, &["f"]).unwrap();
        run(&mut kernel, &mut repl, &["/"]).unwrap();
        fscheck(&mut kernel, &mut repl, &[]).unwrap();
        assert_eq!(
            run(&mut kernel, &mut repl, &["ghost"]),
            Err(Error::FsNoFile)
        );
    }
}
