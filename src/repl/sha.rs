// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::kernel::Kernel;
use crate::print;
use crate::println;
use crate::repl::Repl;
use crate::result::{Error, Result};
use sha2::{Digest, Sha256};

const HASH_CAP: usize = 1024 * 1024;

pub fn run(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("usage: sha256 <file>");
        return Err(Error::BadArgs);
    };
    let path = repl.resolve(arg);
    let bytes = kernel.read_file_to_vec(&path, HASH_CAP)?;
    let mut sum = Sha256::new();
    sum.update(&bytes);
    let hash = sum.finalize();
    for b in hash {
        print!("{b:02x}");
    }
    println!("  {path}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn hashes_files() {
        let mut kernel = fakes::kernel(512);
        let mut repl = Repl::new();
        kernel.write_file_from("/f", b"abc").unwrap();
        run(&mut kernel, &mut repl, &["f"]).unwrap();
        assert_eq!(
            run(&mut kernel, &mut repl, &["ghost"]),
            Err(Error::FsNoFile)
        );
    }
}
