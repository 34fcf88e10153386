// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-pass code generation.  The first pass measures each text
//! instruction by mnemonic and operand shape and pins every
//! label to an absolute address: text labels against the code
//! base, data labels against the data base.  The second pass
//! emits the encodings, resolving label operands through the
//! symbol table and computing PC-relative displacements against
//! absolute addresses.
//!
//! Errors never stop emission: the offending instruction
//! becomes a NOP and the error is recorded against its source
//! line, so one run reports them all.

use super::lexer::register_encoding;
use super::parser::{Ast, Instruction, OperandKind, Section};
use crate::println;
use crate::process::{USER_CODE_ADDR, USER_DATA_OFFSET};
use crate::result::{Error, Result};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// Code buffer cap.
pub const CODE_CAP: usize = 16 * 1024;

/// Combined code+data cap.
pub const TOTAL_CAP: usize = 8 * 1024;

/// The absolute load addresses emitted code assumes.  These
/// must agree with the process sandbox layout; they are carried
/// as explicit configuration so that agreement is visible.
#[derive(Clone, Copy, Debug)]
pub struct Bases {
    pub code: u32,
    pub data: u32,
}

impl Default for Bases {
    fn default() -> Self {
        Bases {
            code: USER_CODE_ADDR,
            data: USER_CODE_ADDR + USER_DATA_OFFSET,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub section: Section,
    pub address: u32,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    fn add(&mut self, name: &str, section: Section, address: u32) {
        self.symbols.push(Symbol {
            name: String::from(name),
            section,
            address,
        });
    }

    pub fn lookup(&self, name: &str, section: Section) -> Option<u32> {
        self.symbols
            .iter()
            .find(|s| s.section == section && s.name == name)
            .map(|s| s.address)
    }

    /// Text first, then data; the order `mov r32, label` uses.
    pub fn lookup_any(&self, name: &str) -> Option<u32> {
        self.lookup(name, Section::Text)
            .or_else(|| self.lookup(name, Section::Data))
    }
}

#[derive(Clone, Debug)]
pub struct AsmError {
    pub line: u32,
    pub message: String,
}

#[derive(Debug)]
pub struct Output {
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub symbols: SymbolTable,
    pub errors: Vec<AsmError>,
}

fn shape2(inst: &Instruction) -> (Option<OperandKind>, Option<OperandKind>) {
    (
        inst.operand(0).map(|o| o.kind),
        inst.operand(1).map(|o| o.kind),
    )
}

/// Estimated encoded length, by mnemonic and operand shape.
/// Must agree with what `generate` emits for the supported
/// shapes, since label addresses are assigned from these.
fn estimate_size(inst: &Instruction) -> usize {
    use OperandKind::{Immediate, Label, Register};
    let shape = shape2(inst);
    match inst.mnemonic.as_str() {
        "mov" => match shape {
            (Some(Register), Some(Immediate)) => 5,
            (Some(Register), Some(Register)) => 2,
            (Some(Register), Some(Label)) => 5,
            _ => 1,
        },
        "add" | "sub" | "and" | "or" | "xor" | "cmp" => match shape {
            (Some(Register), Some(Immediate)) => 6,
            _ => 1,
        },
        "shl" | "shr" => match shape {
            (Some(Register), Some(Immediate)) => 3,
            _ => 1,
        },
        "jg" => 6,
        "jmp" | "call" => 5,
        "int" => 2,
        "push" => match shape.0 {
            Some(Register) => 1,
            _ => 5,
        },
        _ => 1,
    }
}

/// Pass one: measure the sections and pin label addresses.
pub fn build_symbol_table(ast: &Ast, bases: &Bases) -> SymbolTable {
    let mut symbols = SymbolTable::default();
    let mut text_bytes = 0u32;
    let mut index = 0usize;
    for inst in ast.instructions.iter().filter(|i| i.section == Section::Text)
    {
        for label in &ast.labels {
            if label.section == Section::Text && label.index == index {
                symbols.add(&label.name, Section::Text, bases.code + text_bytes);
            }
        }
        text_bytes += estimate_size(inst) as u32;
        index += 1;
    }
    for label in &ast.labels {
        if label.section == Section::Text && label.index == index {
            symbols.add(&label.name, Section::Text, bases.code + text_bytes);
        }
    }

    let mut data_bytes = 0u32;
    for (index, def) in ast.data.iter().enumerate() {
        for label in &ast.labels {
            if label.section == Section::Data && label.index == index {
                symbols.add(&label.name, Section::Data, bases.data + data_bytes);
            }
        }
        data_bytes += def.directive.width() as u32;
    }
    symbols
}

/// Decimal or `0x`-prefixed hex immediate.
pub fn parse_imm(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
    {
        return u32::from_str_radix(hex, 16).ok();
    }
    if let Some(neg) = text.strip_prefix('-') {
        return neg.parse::<u32>().ok().map(u32::wrapping_neg);
    }
    text.parse::<u32>().ok()
}

struct Emitter<'a> {
    bases: &'a Bases,
    symbols: &'a SymbolTable,
    input: &'a str,
    code: Vec<u8>,
    errors: Vec<AsmError>,
}

impl Emitter<'_> {
    fn error(&mut self, line: u32, message: String) {
        println!("[error] {}:{line}: {message}", self.input);
        self.errors.push(AsmError { line, message });
    }

    fn imm32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    fn reg32(&mut self, inst: &Instruction, operand: usize) -> Option<u8> {
        let text = &inst.operands[operand].text;
        let enc = register_encoding(text);
        if enc.is_none() {
            self.error(
                inst.line,
                format!("expected a 32-bit register, found {text}"),
            );
        }
        enc
    }

    fn imm(&mut self, inst: &Instruction, operand: usize) -> Option<u32> {
        let text = &inst.operands[operand].text;
        let value = parse_imm(text);
        if value.is_none() {
            self.error(inst.line, format!("bad immediate {text}"));
        }
        value
    }

    /// `target − pc_after`: displacement for the rel32 control
    /// transfers.  The pc is absolute, past the encoded bytes.
    fn rel32(&mut self, inst: &Instruction, length: u32) -> u32 {
        let name = &inst.operands[0].text;
        let after = self.bases.code + self.code.len() as u32 + length;
        match self.symbols.lookup(name, Section::Text) {
            Some(target) => target.wrapping_sub(after),
            None => {
                self.error(inst.line, format!("undefined label {name}"));
                0
            }
        }
    }

    fn nop_fallback(&mut self, inst: &Instruction, what: &str) {
        self.error(
            inst.line,
            format!("{what}: {}", inst.mnemonic),
        );
        self.code.push(0x90);
    }

    fn instruction(&mut self, inst: &Instruction) {
        use OperandKind::{Immediate, Label, Register};
        let shape = shape2(inst);
        match (inst.mnemonic.as_str(), shape) {
            ("mov", (Some(Register), Some(Immediate))) => {
                let (Some(reg), Some(imm)) =
                    (self.reg32(inst, 0), self.imm(inst, 1))
                else {
                    self.code.push(0x90);
                    return;
                };
                self.code.push(0xb8 + reg);
                self.imm32(imm);
            }
            ("mov", (Some(Register), Some(Register))) => {
                let (Some(dst), Some(src)) =
                    (self.reg32(inst, 0), self.reg32(inst, 1))
                else {
                    self.code.push(0x90);
                    return;
                };
                self.code.push(0x88);
                self.code.push(0xc0 | (src << 3) | dst);
            }
            ("mov", (Some(Register), Some(Label))) => {
                let Some(reg) = self.reg32(inst, 0) else {
                    self.code.push(0x90);
                    return;
                };
                let name = &inst.operands[1].text;
                let address = match self.symbols.lookup_any(name) {
                    Some(address) => address,
                    None => {
                        self.error(
                            inst.line,
                            format!("undefined label {name}"),
                        );
                        0
                    }
                };
                self.code.push(0xb8 + reg);
                self.imm32(address);
            }
            (
                op @ ("add" | "sub" | "and" | "or" | "xor" | "cmp"),
                (Some(Register), Some(Immediate)),
            ) => {
                let (Some(reg), Some(imm)) =
                    (self.reg32(inst, 0), self.imm(inst, 1))
                else {
                    self.code.push(0x90);
                    return;
                };
                let modrm = match op {
                    "add" => 0xc0,
                    "or" => 0xc8,
                    "and" => 0xe0,
                    "sub" => 0xe8,
                    "xor" => 0xf0,
                    _ => 0xf8, // cmp
                };
                self.code.push(0x81);
                self.code.push(modrm | reg);
                self.imm32(imm);
            }
            (op @ ("shl" | "shr"), (Some(Register), Some(Immediate))) => {
                let (Some(reg), Some(imm)) =
                    (self.reg32(inst, 0), self.imm(inst, 1))
                else {
                    self.code.push(0x90);
                    return;
                };
                let modrm: u8 = if op == "shl" { 0xe0 } else { 0xe8 };
                self.code.push(0xc1);
                self.code.push(modrm | reg);
                self.code.push(imm as u8);
            }
            ("jmp", (Some(Label), None)) => {
                let rel = self.rel32(inst, 5);
                self.code.push(0xe9);
                self.imm32(rel);
            }
            ("call", (Some(Label), None)) => {
                let rel = self.rel32(inst, 5);
                self.code.push(0xe8);
                self.imm32(rel);
            }
            ("jg", (Some(Label), None)) => {
                let rel = self.rel32(inst, 6);
                self.code.push(0x0f);
                self.code.push(0x8f);
                self.imm32(rel);
            }
            ("ret", (None, None)) => self.code.push(0xc3),
            ("int", (Some(Immediate), None)) => {
                let Some(imm) = self.imm(inst, 0) else {
                    self.code.push(0x90);
                    return;
                };
                self.code.push(0xcd);
                self.code.push(imm as u8);
            }
            ("push", (Some(Register), None)) => {
                let Some(reg) = self.reg32(inst, 0) else {
                    self.code.push(0x90);
                    return;
                };
                self.code.push(0x50 + reg);
            }
            ("push", (Some(Immediate), None)) => {
                let Some(imm) = self.imm(inst, 0) else {
                    self.code.push(0x90);
                    return;
                };
                self.code.push(0x68);
                self.imm32(imm);
            }
            ("pop", (Some(Register), None)) => {
                let Some(reg) = self.reg32(inst, 0) else {
                    self.code.push(0x90);
                    return;
                };
                self.code.push(0x58 + reg);
            }
            ("inc", (Some(Register), None)) => {
                let Some(reg) = self.reg32(inst, 0) else {
                    self.code.push(0x90);
                    return;
                };
                self.code.push(0x40 + reg);
            }
            ("dec", (Some(Register), None)) => {
                let Some(reg) = self.reg32(inst, 0) else {
                    self.code.push(0x90);
                    return;
                };
                self.code.push(0x48 + reg);
            }
            ("nop", _) => self.code.push(0x90),
            ("hlt", _) => self.code.push(0xf4),
            ("cli", _) => self.code.push(0xfa),
            ("sti", _) => self.code.push(0xfb),
            (
                "mov" | "add" | "sub" | "and" | "or" | "xor" | "cmp" | "shl"
                | "shr" | "jmp" | "call" | "jg" | "ret" | "int" | "push"
                | "pop" | "inc" | "dec",
                _,
            ) => self.nop_fallback(inst, "unsupported operand shape for"),
            _ => self.nop_fallback(inst, "unsupported instruction"),
        }
    }
}

/// Pass two: emit code and data.  Returns the buffers, the
/// symbol table, and every error collected along the way; only
/// the size caps abort.
pub fn generate(ast: &Ast, bases: &Bases, input: &str) -> Result<Output> {
    let symbols = build_symbol_table(ast, bases);
    let mut emitter = Emitter {
        bases,
        symbols: &symbols,
        input,
        code: Vec::new(),
        errors: Vec::new(),
    };
    for inst in ast.instructions.iter().filter(|i| i.section == Section::Text)
    {
        emitter.instruction(inst);
        if emitter.code.len() > CODE_CAP {
            return Err(Error::AsmTooBig);
        }
    }
    let Emitter { code, mut errors, .. } = emitter;

    let mut data = Vec::new();
    for def in &ast.data {
        let value = match parse_imm(&def.value) {
            Some(value) => value,
            None => {
                println!(
                    "[error] {input}:{}: bad data value {}",
                    def.line, def.value
                );
                errors.push(AsmError {
                    line: def.line,
                    message: format!("bad data value {}", def.value),
                });
                0
            }
        };
        data.extend_from_slice(&value.to_le_bytes()[..def.directive.width()]);
    }
    if code.len() + data.len() > TOTAL_CAP {
        return Err(Error::AsmTooBig);
    }
    Ok(Output { code, data, symbols, errors })
}
