// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::exec::Image;
use crate::kernel::Kernel;
use crate::println;
use crate::process::USER_CODE_ADDR;
use crate::repl::Repl;
use crate::result::{Error, Result};
use alloc::string::String;
use iced_x86::{Decoder, DecoderOptions, Formatter, GasFormatter, Instruction};

const INFO_CAP: usize = 64 * 1024;

fn load_image(
    kernel: &mut Kernel,
    repl: &mut Repl,
    arg: &str,
) -> Result<alloc::vec::Vec<u8>> {
    let path = repl.resolve(arg);
    kernel.read_file_to_vec(&path, INFO_CAP)
}

/// `eyninfo <file.eyn>`: dump the container header.
pub fn run(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("usage: eyninfo <file.eyn>");
        return Err(Error::BadArgs);
    };
    let bytes = load_image(kernel, repl, arg)?;
    let image = Image::parse(&bytes)?;
    let header = image.header;
    println!("EYN executable (version {})", header.version);
    println!(
        "flags: {:?}\tentry: {:#x}\tcode: {} bytes\tdata: {} bytes\t\
         bss: {} bytes",
        header.flags,
        header.entry_point,
        header.code_size,
        header.data_size,
        header.bss_size,
    );
    if header.dyn_table_size != 0 {
        println!(
            "dynamic table at {:#x}, {} bytes",
            header.dyn_table_off, header.dyn_table_size
        );
    }
    Ok(())
}

/// `disasm <file.eyn>`: decode the code section at its load
/// address.
pub fn disasm(
    kernel: &mut Kernel,
    repl: &mut Repl,
    args: &[&str],
) -> Result<()> {
    let Some(arg) = args.first() else {
        println!("usage: disasm <file.eyn>");
        return Err(Error::BadArgs);
    };
    let bytes = load_image(kernel, repl, arg)?;
    let image = Image::parse(&bytes)?;
    let mut decoder = Decoder::with_ip(
        32,
        image.code,
        USER_CODE_ADDR as u64,
        DecoderOptions::NONE,
    );
    let mut formatter = GasFormatter::new();
    let mut instruction = Instruction::default();
    let mut line = String::new();
    while decoder.can_decode() {
        decoder.decode_out(&mut instruction);
        line.clear();
        formatter.format(&instruction, &mut line);
        println!("{:08x}  {line}", instruction.ip());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::fakes;

    #[test]
    fn header_and_disassembly_of_assembled_output() {
        let mut kernel = fakes::kernel(1024);
        let mut repl = Repl::new();
        let image = asm::assemble_source(
            "section .text\n_start:\nmov eax, 1\n\nret\n",
            "t.asm",
        )
        .unwrap();
        kernel.write_file_from("/t.eyn", &image).unwrap();
        run(&mut kernel, &mut repl, &["t.eyn"]).unwrap();
        disasm(&mut kernel, &mut repl, &["t.eyn"]).unwrap();
        assert_eq!(
            run(&mut kernel, &mut repl, &["missing.eyn"]),
            Err(Error::FsNoFile)
        );
    }
}
