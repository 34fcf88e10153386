// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::kernel::Kernel;
use crate::println;
use crate::repl::Repl;
use crate::result::{Error, Result};
use alloc::string::String;

pub fn run(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let Some((file, words)) = args.split_first() else {
        println!("usage: write <file> <text>");
        return Err(Error::BadArgs);
    };
    let path = repl.resolve(file);
    let mut text = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(word);
    }
    text.push('\n');
    kernel.write_file_from(&path, text.as_bytes())?;
    println!("wrote {} bytes to {path}", text.len());
    Ok(())
}
