// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser: builds the flat AST the emitter walks.  Labels are
//! recorded with their positional index inside their section
//! (instruction index in text, definition index in data) so the
//! resolver can assign addresses in one measuring pass.
//!
//! Operand scanning is forgiving about commas: after each
//! operand one token is consumed looking for a comma, and a
//! non-comma there cannot be pushed back.  A zero-operand
//! instruction directly after a one-operand instruction is
//! therefore swallowed by the scan.  Programs written with the
//! conventional one-instruction-per-line layout and trailing
//! operands are unaffected.

use super::lexer::{Lexer, TokenKind};
use crate::println;
use alloc::string::String;
use alloc::vec::Vec;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Section {
    None,
    Text,
    Data,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperandKind {
    Register,
    Immediate,
    Label,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Operand {
    pub kind: OperandKind,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct Instruction {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
    pub section: Section,
    pub line: u32,
}

impl Instruction {
    pub fn operand(&self, i: usize) -> Option<&Operand> {
        self.operands.get(i)
    }

    /// Shape probe: operand kinds as a slice for matching.
    pub fn shape(&self) -> Vec<OperandKind> {
        self.operands.iter().map(|o| o.kind).collect()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Directive {
    Db,
    Dw,
    Dd,
}

impl Directive {
    pub fn width(self) -> usize {
        match self {
            Directive::Db => 1,
            Directive::Dw => 2,
            Directive::Dd => 4,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DataDef {
    pub directive: Directive,
    pub value: String,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub struct LabelDef {
    pub name: String,
    pub section: Section,
    /// Positional index within the section at the point of
    /// definition.
    pub index: usize,
    pub line: u32,
}

/// The AST: three arenas owned together, freed together.
#[derive(Debug, Default)]
pub struct Ast {
    pub instructions: Vec<Instruction>,
    pub labels: Vec<LabelDef>,
    pub data: Vec<DataDef>,
}

pub fn parse(src: &str) -> Ast {
    let mut lexer = Lexer::new(src);
    let mut ast = Ast::default();
    let mut section = Section::None;
    let mut text_index = 0usize;
    let mut data_index = 0usize;

    loop {
        let token = lexer.next_token();
        match token.kind {
            TokenKind::Eof => break,
            TokenKind::Newline => {}
            TokenKind::Section => {
                let name = lexer.next_token();
                section = match name.text.as_str() {
                    ".text" => Section::Text,
                    ".data" => Section::Data,
                    other => {
                        println!("parse: unknown section {other}");
                        Section::None
                    }
                };
            }
            TokenKind::Label => {
                let index = match section {
                    Section::Text => text_index,
                    Section::Data => data_index,
                    Section::None => 0,
                };
                ast.labels.push(LabelDef {
                    name: token.text,
                    section,
                    index,
                    line: lexer.line(),
                });
            }
            TokenKind::Mnemonic => {
                let line = lexer.line();
                let mut operands = Vec::new();
                while operands.len() < 2 {
                    let next = lexer.next_token();
                    let kind = match next.kind {
                        TokenKind::Comma => continue,
                        TokenKind::Register => OperandKind::Register,
                        TokenKind::Immediate => OperandKind::Immediate,
                        TokenKind::Label | TokenKind::Unknown => {
                            OperandKind::Label
                        }
                        _ => break,
                    };
                    operands.push(Operand { kind, text: next.text });
                    // Look for a separating comma.  There is no
                    // pushback: whatever else sits here is
                    // dropped from the stream.
                    let _ = lexer.next_token();
                }
                ast.instructions.push(Instruction {
                    mnemonic: token.text,
                    operands,
                    section,
                    line,
                });
                if section == Section::Text {
                    text_index += 1;
                }
            }
            TokenKind::Directive => {
                if token.text == "global" {
                    // Recognised, ignored.
                    let _ = lexer.next_token();
                    continue;
                }
                let directive = match token.text.as_str() {
                    "db" => Directive::Db,
                    "dw" => Directive::Dw,
                    _ => Directive::Dd,
                };
                let value = lexer.next_token();
                ast.data.push(DataDef {
                    directive,
                    value: value.text,
                    line: lexer.line(),
                });
                if section == Section::Data {
                    data_index += 1;
                }
            }
            // Stray tokens are skipped.
            TokenKind::Register
            | TokenKind::Immediate
            | TokenKind::Comma
            | TokenKind::Unknown => {}
        }
    }
    ast
}
