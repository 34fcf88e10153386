// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The interactive shell: a thin line-at-a-time loop over the
//! kernel surface.  Each command lives in its own module with a
//! `run(kernel, repl, args)` entry.  Paths are normalised here,
//! against the shell's working directory, before they reach the
//! filesystem (which matches components literally).

use crate::cons;
use crate::kernel::Kernel;
use crate::println;
use crate::result::{Error, Result};
use alloc::string::String;
use alloc::vec::Vec;

mod assemble;
mod cat;
mod drive;
mod exeinfo;
mod list;
mod memory;
mod mkdir;
mod remove;
mod run;
mod sha;
mod stat;
mod write;

/// Shell state that is not kernel state: the working directory.
pub struct Repl {
    pub cwd: String,
}

impl Repl {
    pub fn new() -> Repl {
        Repl { cwd: String::from("/") }
    }

    /// Absolute, normalised form of a command argument.
    pub fn resolve(&self, input: &str) -> String {
        resolve_path(&self.cwd, input)
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins `input` to `cwd` when relative and folds away `.`,
/// `..`, and repeated slashes.
pub fn resolve_path(cwd: &str, input: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let base = if input.starts_with('/') { "" } else { cwd };
    for component in base.split('/').chain(input.split('/')) {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return String::from("/");
    }
    let mut out = String::new();
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

pub(crate) fn evalcmd(
    kernel: &mut Kernel,
    repl: &mut Repl,
    cmd: &str,
    args: &[&str],
) -> Result<()> {
    match cmd {
        "assemble" => assemble::run(kernel, repl, args),
        "cat" | "read" => cat::run(kernel, repl, args),
        "cd" => cd(kernel, repl, args),
        "clear" => {
            cons::clear();
            Ok(())
        }
        "del" | "rm" => remove::del(kernel, repl, args),
        "disasm" => exeinfo::disasm(kernel, repl, args),
        "drive" => drive::run(kernel, repl, args),
        "eyninfo" => exeinfo::run(kernel, repl, args),
        "format" => drive::format(kernel, repl, args),
        "fscheck" => stat::fscheck(kernel, repl, args),
        "fsstat" => memory::fsstat(kernel, repl, args),
        "help" | "man" => {
            help();
            Ok(())
        }
        "ls" | "list" => list::run(kernel, repl, args),
        "makedir" | "mkdir" => mkdir::run(kernel, repl, args),
        "memstat" => memory::memstat(kernel, repl, args),
        "pwd" => {
            println!("{}", repl.cwd);
            Ok(())
        }
        "rmdir" | "deldir" => remove::rmdir(kernel, repl, args),
        "run" => run::run(kernel, repl, args),
        "sha256" => sha::run(kernel, repl, args),
        "size" | "stat" => stat::run(kernel, repl, args),
        "write" => write::run(kernel, repl, args),
        _ => Err(Error::NoCommand),
    }
}

fn cd(kernel: &mut Kernel, repl: &mut Repl, args: &[&str]) -> Result<()> {
    let target = match args.first() {
        Some(arg) => repl.resolve(arg),
        None => String::from("/"),
    };
    let entry = kernel.stat(&target)?;
    if !entry.is_dir() {
        return Err(Error::FsNotDir);
    }
    repl.cwd = target;
    Ok(())
}

/// The interactive loop.  Returns when the user types `exit`.
pub fn shell(kernel: &mut Kernel) {
    let mut repl = Repl::new();
    let mut buf = [0u8; 256];
    loop {
        cons::reset_interrupt();
        let line = match cons::readline("> ", &mut buf) {
            Ok(line) => line,
            Err(e) => {
                println!("reader: {e:?}");
                continue;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut words = line.split_ascii_whitespace();
        let Some(cmd) = words.next() else {
            continue;
        };
        if cmd == "exit" || cmd == "quit" {
            break;
        }
        let args: Vec<&str> = words.collect();
        if let Err(e) = evalcmd(kernel, &mut repl, cmd, &args) {
            println!("{cmd}: {e:?}");
        }
    }
}

fn help() {
    println!(
        r#"Commands:
  ls [path] [depth]     list a directory, optionally recursing
  cat <file>            print a file
  write <file> <text>   write the given text to a file
  del <file>            delete a file
  mkdir <path>          create a directory
  rmdir <path>          delete an empty directory
  stat <path>           show type, size, and first block
  cd [path] / pwd       change or show the working directory
  drive <n>             switch the current drive
  format [blocks]       write a fresh filesystem to the drive
  fscheck               re-read and validate the superblock
  assemble <in> <out>   assemble source into an executable
  run <file.eyn>        load and run an executable
  eyninfo <file.eyn>    show an executable's header
  disasm <file.eyn>     disassemble an executable's code
  sha256 <file>         hash a file
  memstat / fsstat      heap and cache statistics
  clear / help / exit"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn path_resolution() {
        assert_eq!(resolve_path("/", "a"), "/a");
        assert_eq!(resolve_path("/a", "b/c"), "/a/b/c");
        assert_eq!(resolve_path("/a/b", ".."), "/a");
        assert_eq!(resolve_path("/a/b", "../.."), "/");
        assert_eq!(resolve_path("/a", "/x"), "/x");
        assert_eq!(resolve_path("/a", "./b//c/."), "/a/b/c");
        assert_eq!(resolve_path("/", "../.."), "/");
    }

    #[test]
    fn commands_round_trip_through_dispatch() {
        let mut kernel = fakes::kernel(1024);
        let mut repl = Repl::new();
        evalcmd(&mut kernel, &mut repl, "mkdir", &["docs"]).unwrap();
        evalcmd(&mut kernel, &mut repl, "cd", &["docs"]).unwrap();
        assert_eq!(repl.cwd, "/docs");
        evalcmd(&mut kernel, &mut repl, "write", &["note", "hi", "there"])
            .unwrap();
        evalcmd(&mut kernel, &mut repl, "cat", &["note"]).unwrap();
        evalcmd(&mut kernel, &mut repl, "stat", &["note"]).unwrap();
        evalcmd(&mut kernel, &mut repl, "cd", &[".."]).unwrap();
        evalcmd(&mut kernel, &mut repl, "ls", &[]).unwrap();
        evalcmd(&mut kernel, &mut repl, "del", &["/docs/note"]).unwrap();
        evalcmd(&mut kernel, &mut repl, "rmdir", &["docs"]).unwrap();
        assert_eq!(
            evalcmd(&mut kernel, &mut repl, "nonsense", &[]),
            Err(Error::NoCommand)
        );
    }

    #[test]
    fn cd_refuses_files() {
        let mut kernel = fakes::kernel(1024);
        let mut repl = Repl::new();
        kernel.write_file_from("/f", b"x").unwrap();
        assert_eq!(
            evalcmd(&mut kernel, &mut repl, "cd", &["f"]),
            Err(Error::FsNotDir)
        );
        assert_eq!(repl.cwd, "/");
    }
}
