// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::asm;
use crate::kernel::Kernel;
use crate::println;
use crate::repl::Repl;
use crate::result::{Error, Result};

pub fn run(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let [input, output] = args else {
        println!("usage: assemble <input.asm> <output.eyn>");
        return Err(Error::BadArgs);
    };
    let input = repl.resolve(input);
    let output = repl.resolve(output);
    asm::assemble(kernel, &input, &output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn assembles_through_the_shell() {
        let mut kernel = fakes::kernel(1024);
        let mut repl = Repl::new();
        kernel
            .write_file_from(
                "/p.asm",
                b"section .text\n_start:\nmov eax, 7\n\nret\n",
            )
            .unwrap();
        run(&mut kernel, &mut repl, &["p.asm", "p.eyn"]).unwrap();
        let bytes = kernel.read_file_to_vec("/p.eyn", 4096).unwrap();
        assert_eq!(&bytes[..4], b"EYN\0");
        assert_eq!(run(&mut kernel, &mut repl, &[]), Err(Error::BadArgs));
    }
}
