// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The console seam.  The framebuffer text renderer and the
//! PS/2 keyboard live outside this crate; the core talks to
//! them through the `Console` trait registered here.  All
//! diagnostic output funnels through `print!`/`println!`.

use crate::result::{Error, Result};
use alloc::boxed::Box;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

/// A byte-oriented text sink and key source.
pub trait Console: Send {
    fn putb(&mut self, b: u8);
    fn getb(&mut self) -> u8;
}

static CONSOLE: Mutex<Option<Box<dyn Console>>> = Mutex::new(None);

/// Set when the user requests cancellation of the running
/// operation (Ctrl+C from the keyboard driver).  Long-running
/// walks poll this and unwind at their next check point.
pub static USER_INTERRUPT: AtomicBool = AtomicBool::new(false);

pub fn interrupted() -> bool {
    USER_INTERRUPT.load(Ordering::Relaxed)
}

pub fn reset_interrupt() {
    USER_INTERRUPT.store(false, Ordering::Relaxed);
}

/// Installs the console device.  Replaces any previous one.
pub fn set_console(cons: Box<dyn Console>) {
    *CONSOLE.lock() = Some(cons);
}

pub struct Writer;

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut guard = CONSOLE.lock();
        if let Some(cons) = guard.as_mut() {
            for &b in s.as_bytes() {
                cons.putb(b);
            }
        }
        Ok(())
    }
}

pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    let _ = Writer.write_fmt(args);
}

/// A simple println!().
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[macro_export]
macro_rules! print {
    ($($args:tt)*) => ({
        $crate::cons::_print(format_args!($($args)*));
    })
}

pub fn readline<'a>(prompt: &str, line: &'a mut [u8]) -> Result<&'a str> {
    const BS: u8 = 8;
    const TAB: u8 = 9;
    const NL: u8 = 10;
    const CR: u8 = 13;
    const CTLU: u8 = 21;
    const CTLW: u8 = 23;
    const DEL: u8 = 127;

    fn find_prev_col(line: &[u8], start: usize) -> usize {
        line.iter()
            .fold(start, |v, &b| v + if b == TAB { 8 - (v & 0b111) } else { 1 })
    }

    fn backspace(
        cons: &mut dyn Console,
        line: &[u8],
        start: usize,
        col: usize,
    ) -> (usize, usize) {
        if line.is_empty() || col == start {
            return (start, 0);
        }
        let (pcol, overstrike) = match line.last() {
            Some(&b' ') => (col - 1, false),
            Some(&b'\t') => {
                (find_prev_col(&line[..line.len() - 1], start), false)
            }
            _ => (col - 1, true),
        };
        for _ in pcol..col {
            cons.putb(BS);
            if overstrike {
                cons.putb(b' ');
                cons.putb(BS);
            }
        }
        (pcol, line.len() - 1)
    }

    fn isword(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_'
    }

    if line.is_empty() {
        return Ok("");
    }

    let mut guard = CONSOLE.lock();
    let boxed = guard.as_mut().ok_or(Error::Reader)?;
    let cons: &mut dyn Console = &mut **boxed;

    let start = prompt.len();
    for &b in prompt.as_bytes() {
        cons.putb(b);
    }

    let mut k = 0;
    let mut col = start;
    while k < line.len() {
        match cons.getb() {
            CR | NL => {
                cons.putb(CR);
                cons.putb(NL);
                break;
            }
            BS | DEL => {
                if k > 0 {
                    (col, k) = backspace(cons, &line[..k], start, col);
                }
            }
            CTLU => {
                while k > 0 {
                    (col, k) = backspace(cons, &line[..k], start, col);
                }
            }
            CTLW => {
                while k > 0 && line[k - 1].is_ascii_whitespace() {
                    (col, k) = backspace(cons, &line[..k], start, col);
                }
                if k > 0 {
                    let cond = isword(line[k - 1]);
                    while k > 0
                        && !line[k - 1].is_ascii_whitespace()
                        && isword(line[k - 1]) == cond
                    {
                        (col, k) = backspace(cons, &line[..k], start, col);
                    }
                }
            }
            TAB => {
                line[k] = TAB;
                k += 1;
                let ncol = (8 + col) & !0b111;
                for _ in col..ncol {
                    cons.putb(b' ');
                }
                col = ncol;
            }
            b => {
                line[k] = b;
                k += 1;
                cons.putb(b);
                col += 1;
            }
        }
    }

    core::str::from_utf8(&line[..k]).map_err(|_| Error::Utf8)
}

pub fn clear() {
    let mut guard = CONSOLE.lock();
    if let Some(cons) = guard.as_mut() {
        const ESC: u8 = 27;
        cons.putb(ESC);
        cons.putb(b'[');
        cons.putb(b'H');
        cons.putb(ESC);
        cons.putb(b'[');
        cons.putb(b'2');
        cons.putb(b'J');
    }
}
