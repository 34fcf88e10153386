// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::cons;
use crate::kernel::Kernel;
use crate::println;
use crate::repl::Repl;
use crate::result::{Error, Result};

pub fn run(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let path = match args.first() {
        Some(arg) => repl.resolve(arg),
        None => repl.cwd.clone(),
    };
    let depth = match args.get(1) {
        Some(n) => n.parse::<u32>().map_err(|_| Error::BadArgs)?,
        None => 0,
    };
    let entry = kernel.stat(&path)?;
    if !entry.is_dir() {
        println!("{:>8}  {}", entry.size, path);
        return Ok(());
    }
    list_dir(kernel, entry.first_block, 0, depth)
}

fn list_dir(
    kernel: &mut Kernel,
    head: u32,
    indent: usize,
    depth: u32,
) -> Result<()> {
    if cons::interrupted() {
        return Err(Error::Interrupted);
    }
    let entries = kernel.readdir(head)?;
    for entry in entries {
        let pad = indent * 2;
        let suffix = if entry.is_dir() { "/" } else { "" };
        println!(
            "{:>8}  {:pad$}{}{}",
            entry.size,
            "",
            entry.name(),
            suffix,
            pad = pad
        );
        if entry.is_dir() && depth > 0 {
            list_dir(kernel, entry.first_block, indent + 1, depth - 1)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn lists_files_and_recurses() {
        let mut kernel = fakes::kernel(512);
        let mut repl = Repl::new();
        kernel.mkdir("/d").unwrap();
        kernel.write_file_from("/d/inner", b"ab").unwrap();
        kernel.write_file_from("/top", b"abc").unwrap();
        run(&mut kernel, &mut repl, &[]).unwrap();
        run(&mut kernel, &mut repl, &["/", "2"]).unwrap();
        run(&mut kernel, &mut repl, &["top"]).unwrap();
        assert_eq!(
            run(&mut kernel, &mut repl, &["/", "x"]),
            Err(Error::BadArgs)
        );
    }
}
