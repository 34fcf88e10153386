// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::kernel::Kernel;
use crate::print;
use crate::println;
use crate::repl::Repl;
use crate::result::{Error, Result};

/// Cap on how much `cat` will read in one go.
const CAT_CAP: usize = 64 * 1024;

pub fn run(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("usage: cat <file>");
        return Err(Error::BadArgs);
    };
    let path = repl.resolve(arg);
    let bytes = kernel.read_file_to_vec(&path, CAT_CAP)?;
    print!("{}", alloc::string::String::from_utf8_lossy(&bytes));
    if !bytes.ends_with(b"\n") {
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn cats_files_not_directories() {
        let mut kernel = fakes::kernel(512);
        let mut repl = Repl::new();
        kernel.write_file_from("/a", b"text\n").unwrap();
        run(&mut kernel, &mut repl, &["a"]).unwrap();
        kernel.mkdir("/d").unwrap();
        assert_eq!(
            run(&mut kernel, &mut repl, &["d"]),
            Err(Error::FsIsDir)
        );
        assert_eq!(run(&mut kernel, &mut repl, &[]), Err(Error::BadArgs));
    }
}
